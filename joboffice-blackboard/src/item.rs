//  ITEM.rs
//    by Ray Plante
//
//  Description:
//!   Defines `BlackboardItem`, the polymorphic value stored in every
//!   `BlackboardQueue`: a data product observation, a job at some stage of
//!   its life, or a pipeline that has announced it's ready for work.

use std::collections::BTreeMap;

use enum_debug::EnumDebug;
use specifications::Dataset;
use specifications::record::{self, RecordError};


/***** CONSTANTS *****/
/// Property-map key names, kept as constants so the scheduler and the job
/// office loop never have to spell a key literal (and risk a typo breaking
/// a lookup silently).
pub mod keys {
    pub const KIND: &str = "kind";
    pub const DATASET: &str = "dataset";
    pub const SUCCESS: &str = "success";
    pub const JOB_IDENTITY: &str = "jobIdentity";
    pub const NAME: &str = "name";
    pub const INPUTS: &str = "inputs";
    pub const OUTPUTS: &str = "outputs";
    pub const ASSIGNED_PIPELINE_ID: &str = "assignedPipelineId";
    pub const RETRIES_REMAINING: &str = "retriesRemaining";
    pub const PIPELINE_NAME: &str = "pipelineName";
    pub const RUN_ID: &str = "runId";
    pub const ORIGINATOR_ID: &str = "originatorId";
}


/***** LIBRARY *****/
/// A data product observed by the job office: the announced [`Dataset`]
/// plus whether it was reported valid.
#[derive(Clone, Debug, PartialEq)]
pub struct DataProductItem {
    pub dataset: Dataset,
    pub success: bool,
}

/// A job at some stage between being first hinted at by a dataset and being
/// recorded as done.
///
/// The `TriggerHandler` that tracks which prerequisite datasets a
/// still-forming job is waiting on is deliberately *not* a field here: it
/// only matters while the job sits in `jobsPossible`, is never written to
/// disk, and would otherwise force this crate to depend on
/// `joboffice-scheduler` (which depends on this crate for its queues).
/// Instead the scheduler keeps trigger handlers in its own in-memory map,
/// keyed by a job's `job_identity` canonical string, for exactly as long as
/// the job is unformed.
#[derive(Clone, Debug, PartialEq)]
pub struct JobItem {
    pub job_identity: Dataset,
    pub name: String,
    pub inputs: Vec<Dataset>,
    pub outputs: Vec<Dataset>,
    pub assigned_pipeline_id: Option<String>,
    pub success: Option<bool>,
    pub retries_remaining: u32,
}

/// A pipeline instance that has announced it is ready to take a job.
#[derive(Clone, Debug, PartialEq)]
pub struct PipelineItem {
    pub pipeline_name: String,
    pub run_id: String,
    pub originator_id: String,
}

/// The value stored in a `BlackboardQueue`: one of the three kinds of thing
/// the job office tracks.
#[derive(Clone, Debug, EnumDebug, PartialEq)]
pub enum BlackboardItem {
    DataProduct(DataProductItem),
    Job(JobItem),
    Pipeline(PipelineItem),
}

impl BlackboardItem {
    /// Renders this item as a name/value property record, using the same
    /// sigil-tagged encoding as a standalone `Dataset`, tagged with a `kind`
    /// field so [`BlackboardItem::from_record`] knows which variant to
    /// reconstruct.
    pub fn to_record(&self) -> String {
        let mut lines = Vec::new();
        match self {
            Self::DataProduct(item) => {
                lines.push(format!("{}=s:data_product", keys::KIND));
                lines.push(format!("{}=i:{}", keys::SUCCESS, if item.success { 1 } else { 0 }));
                lines.push(dataset_block(keys::DATASET, &item.dataset));
            },
            Self::Job(item) => {
                lines.push(format!("{}=s:job", keys::KIND));
                lines.push(format!("{}=s:{}", keys::NAME, item.name));
                lines.push(format!("{}=i:{}", keys::RETRIES_REMAINING, item.retries_remaining));
                if let Some(pid) = &item.assigned_pipeline_id {
                    lines.push(format!("{}=s:{}", keys::ASSIGNED_PIPELINE_ID, pid));
                }
                if let Some(success) = item.success {
                    lines.push(format!("{}=i:{}", keys::SUCCESS, if success { 1 } else { 0 }));
                }
                lines.push(dataset_block(keys::JOB_IDENTITY, &item.job_identity));
                lines.push(dataset_list_block(keys::INPUTS, &item.inputs));
                lines.push(dataset_list_block(keys::OUTPUTS, &item.outputs));
            },
            Self::Pipeline(item) => {
                lines.push(format!("{}=s:pipeline", keys::KIND));
                lines.push(format!("{}=s:{}", keys::PIPELINE_NAME, item.pipeline_name));
                lines.push(format!("{}=s:{}", keys::RUN_ID, item.run_id));
                lines.push(format!("{}=s:{}", keys::ORIGINATOR_ID, item.originator_id));
            },
        }
        lines.join("\n")
    }

    /// Parses a record produced by [`BlackboardItem::to_record`].
    pub fn from_record(text: &str) -> Result<Self, RecordError> {
        let fields = flat_fields(text);
        let kind = fields.get(keys::KIND).cloned().unwrap_or_default();
        match kind.as_str() {
            "data_product" => {
                let dataset = extract_dataset_block(text, keys::DATASET)?;
                let success = fields.get(keys::SUCCESS).map(|v| v == "1").unwrap_or(true);
                Ok(Self::DataProduct(DataProductItem { dataset, success }))
            },
            "job" => {
                let job_identity = extract_dataset_block(text, keys::JOB_IDENTITY)?;
                let inputs = extract_dataset_list_block(text, keys::INPUTS)?;
                let outputs = extract_dataset_list_block(text, keys::OUTPUTS)?;
                let name = fields.get(keys::NAME).cloned().unwrap_or_default();
                let retries_remaining = fields.get(keys::RETRIES_REMAINING).and_then(|v| v.parse().ok()).unwrap_or(0);
                let assigned_pipeline_id = fields.get(keys::ASSIGNED_PIPELINE_ID).cloned();
                let success = fields.get(keys::SUCCESS).map(|v| v == "1");
                Ok(Self::Job(JobItem {
                    job_identity, name, inputs, outputs,
                    assigned_pipeline_id, success, retries_remaining,
                }))
            },
            "pipeline" => {
                Ok(Self::Pipeline(PipelineItem {
                    pipeline_name: fields.get(keys::PIPELINE_NAME).cloned().unwrap_or_default(),
                    run_id: fields.get(keys::RUN_ID).cloned().unwrap_or_default(),
                    originator_id: fields.get(keys::ORIGINATOR_ID).cloned().unwrap_or_default(),
                }))
            },
            other => Err(RecordError::UnknownSigil(format!("unrecognized blackboard item kind '{}'", other))),
        }
    }
}

/// Encodes a single nested `Dataset` under `prefix` as one flattened line
/// per field, so it can live alongside the item's own top-level fields in
/// one record without a full nested-record parser.
fn dataset_block(prefix: &str, ds: &Dataset) -> String {
    record::dataset_to_record(ds)
        .lines()
        .map(|line| format!("{}.{}", prefix, line))
        .collect::<Vec<_>>()
        .join("\n")
}

fn dataset_list_block(prefix: &str, datasets: &[Dataset]) -> String {
    datasets.iter().enumerate()
        .map(|(i, ds)| dataset_block(&format!("{}.{}", prefix, i), ds))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Reverses [`dataset_block`]: pulls every line prefixed `<prefix>.` back
/// out, strips the prefix, and decodes the result as a dataset record.
fn extract_dataset_block(text: &str, prefix: &str) -> Result<Dataset, RecordError> {
    let needle = format!("{}.", prefix);
    let nested: String = text.lines()
        .filter(|line| line.starts_with(&needle))
        .map(|line| line[needle.len()..].to_string())
        .collect::<Vec<_>>()
        .join("\n");
    record::dataset_from_record(&nested)
}

/// Extracts a list of datasets encoded under `<prefix>.0`, `<prefix>.1`, ...
/// by [`dataset_list_block`]. Relies on each dataset block contributing a
/// `._type` line, so presence of `<prefix>.<index>._type` is what signals
/// one more element exists.
fn extract_dataset_list_block(text: &str, prefix: &str) -> Result<Vec<Dataset>, RecordError> {
    let mut index = 0;
    let mut out = Vec::new();
    loop {
        let sub_prefix = format!("{}.{}", prefix, index);
        let marker = format!("{}._type=", sub_prefix);
        if !text.lines().any(|line| line.starts_with(&marker)) { break; }
        out.push(extract_dataset_block(text, &sub_prefix)?);
        index += 1;
    }
    Ok(out)
}

/// Parses the item's own top-level (non-nested, non-list) fields into a
/// flat string map for convenience lookups.
fn flat_fields(text: &str) -> BTreeMap<String, String> {
    let mut out = BTreeMap::new();
    for line in text.lines() {
        let line = line.trim();
        if line.is_empty() { continue; }
        let Some((key, raw_value)) = line.split_once('=') else { continue; };
        if key.contains('.') { continue; }
        let value = raw_value.split_once(':').map(|(_, v)| v).unwrap_or(raw_value);
        out.insert(key.to_string(), value.to_string());
    }
    out
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn data_product_round_trips() {
        let item = BlackboardItem::DataProduct(DataProductItem {
            dataset: Dataset::new("raw").with_id("visit", 1i64),
            success: true,
        });
        let back = BlackboardItem::from_record(&item.to_record()).unwrap();
        assert_eq!(item, back);
    }

    #[test]
    fn job_item_round_trips_including_lists() {
        let item = BlackboardItem::Job(JobItem {
            job_identity: Dataset::new("visitJob").with_id("visit", 1i64),
            name: "visitJob-1".to_string(),
            inputs: vec![Dataset::new("raw").with_id("visit", 1i64)],
            outputs: vec![Dataset::new("postISRCCD").with_id("visit", 1i64).with_id("ccd", 3i64)],
            assigned_pipeline_id: Some("pipeline-7".to_string()),
            success: None,
            retries_remaining: 2,
        });
        let back = BlackboardItem::from_record(&item.to_record()).unwrap();
        assert_eq!(item, back);
    }

    #[test]
    fn pipeline_item_round_trips() {
        let item = BlackboardItem::Pipeline(PipelineItem {
            pipeline_name: "ISR".to_string(),
            run_id: "run7".to_string(),
            originator_id: "ISR-3".to_string(),
        });
        let back = BlackboardItem::from_record(&item.to_record()).unwrap();
        assert_eq!(item, back);
    }
}
