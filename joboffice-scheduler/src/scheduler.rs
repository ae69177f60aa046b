//  SCHEDULER.rs
//    by Ray Plante
//
//  Description:
//!   Implements the data-triggered job-formation algorithm: `DataTriggeredScheduler`
//!   (and its `ButlerTriggeredScheduler` variant), which turn a stream of
//!   announced datasets into fully-specified `JobItem`s on the `Blackboard`,
//!   and promote a job to `jobsAvailable` once its `TriggerHandler` is
//!   satisfied.

use std::collections::HashMap;
use std::fmt::{Display, Formatter, Result as FResult};

use log::{debug, info, warn};
use serde::{Deserialize, Serialize};

use joboffice_blackboard::blackboard::{self, Blackboard};
use joboffice_blackboard::item::{BlackboardItem, JobItem};
use specifications::dataset::Dataset;

use crate::trigger::{self, Trigger, TriggerConfig};
use crate::trigger_handler::TriggerHandler;


/***** ERRORS *****/
#[derive(Debug)]
pub enum Error {
    /// A mutation of the blackboard itself failed.
    Blackboard(blackboard::Error),
    /// A trigger couldn't expand a template into its implied dataset list.
    Trigger(trigger::Error),
    /// `schedule.className` didn't name a registered scheduler kind.
    UnknownClassName { class_name: String },
}

impl Display for Error {
    fn fmt(&self, f: &mut Formatter<'_>) -> FResult {
        match self {
            Self::Blackboard(err) => write!(f, "{}", err),
            Self::Trigger(err) => write!(f, "{}", err),
            Self::UnknownClassName { class_name } => write!(f, "unrecognized scheduler className '{}'", class_name),
        }
    }
}
impl std::error::Error for Error {}
impl From<blackboard::Error> for Error {
    fn from(err: blackboard::Error) -> Self { Self::Blackboard(err) }
}
impl From<trigger::Error> for Error {
    fn from(err: trigger::Error) -> Self { Self::Trigger(err) }
}
impl From<joboffice_blackboard::transactional::Error> for Error {
    fn from(err: joboffice_blackboard::transactional::Error) -> Self { Self::Blackboard(blackboard::Error::from(err)) }
}


/***** CONFIG *****/
/// The `schedule.job.identity` configuration block: how to compute the
/// synthetic dataset that names a job.
#[derive(Clone, Debug, Default, Deserialize, Serialize)]
pub struct IdentityConfig {
    #[serde(default, rename = "templateType")]
    pub template_type: Option<String>,
    #[serde(default, rename = "type")]
    pub dataset_type: Option<String>,
    #[serde(default)]
    pub id: Vec<String>,
}

/// The `schedule.job.name` configuration block: how to render a job's
/// human-readable name.
#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct NameConfig {
    pub default: String,
    #[serde(default)]
    pub template: Option<String>,
    #[serde(default, rename = "initCounter")]
    pub init_counter: u64,
}

impl Default for NameConfig {
    fn default() -> Self { Self { default: "Job".to_string(), template: None, init_counter: 1 } }
}

/// The `schedule` configuration block in full.
#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct SchedulerConfig {
    #[serde(rename = "className", default = "SchedulerConfig::default_class_name")]
    pub class_name: String,
    #[serde(default)]
    pub trigger: Vec<TriggerConfig>,
    #[serde(default)]
    pub job: JobConfig,
}

impl SchedulerConfig {
    fn default_class_name() -> String { "DataTriggered".to_string() }
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self { class_name: Self::default_class_name(), trigger: Vec::new(), job: JobConfig::default() }
    }
}

#[derive(Clone, Debug, Default, Deserialize, Serialize)]
pub struct JobConfig {
    #[serde(default)]
    pub input: Vec<TriggerConfig>,
    #[serde(default)]
    pub output: Vec<TriggerConfig>,
    #[serde(default)]
    pub identity: IdentityConfig,
    #[serde(default)]
    pub name: NameConfig,
    /// Number of times a job may be retried after a failed `job:done`
    /// report before it's given up on and landed in `jobsDone` marked
    /// failed. `0` means no retry.
    #[serde(default)]
    pub retries: u32,
}


/***** HELPERS (shared by both scheduler kinds) *****/
/// Computes the synthetic identity dataset for a newly-formed job, per the
/// job identity rule: picks a template dataset from the outputs (falling
/// back to the inputs), optionally overrides its type, and optionally
/// restricts which identifiers are copied.
fn compute_identity(cfg: &IdentityConfig, inputs: &[Dataset], outputs: &[Dataset]) -> Dataset {
    let template = if let Some(template_type) = &cfg.template_type {
        outputs.iter().find(|d| &d.dataset_type == template_type)
            .or_else(|| inputs.iter().find(|d| &d.dataset_type == template_type))
            .or_else(|| outputs.first())
            .or_else(|| inputs.first())
    } else {
        outputs.first().or_else(|| inputs.first())
    };

    let Some(template) = template else {
        return Dataset::new("unknown");
    };

    let dataset_type = cfg.dataset_type.clone().unwrap_or_else(|| template.dataset_type.clone());
    let mut identity = Dataset::new(dataset_type);
    if cfg.id.is_empty() {
        identity.ids = template.ids.clone();
    } else {
        for name in &cfg.id {
            if let Some(value) = template.ids.get(name) {
                identity.ids.insert(name.clone(), value.clone());
            }
        }
    }
    identity
}

/// Renders a job's name per the name rule: substitutes a configured
/// template string with `{type, ...ids}`, falling back to `<default>-<counter>`
/// (incrementing `counter`) if no template is configured or a substitution
/// key is missing.
///
/// The fallback counter is not persisted across restarts (see
/// `DESIGN.md`), so job names assigned via the fallback can collide after
/// a crash mid-run; this mirrors the original scheduler this was
/// distilled from rather than inventing a persistence scheme the
/// specification doesn't call for.
fn compute_name(cfg: &NameConfig, identity: &Dataset, counter: &mut u64) -> String {
    if let Some(template) = &cfg.template {
        if let Some(rendered) = substitute_template(template, identity) {
            return rendered;
        }
    }
    let name = format!("{}-{}", cfg.default, counter);
    *counter += 1;
    name
}

/// Substitutes `{type}` and `{<id-name>}` placeholders in `template` using
/// `identity`. Returns `None` (signalling a fallback to the counter-based
/// name) if any placeholder names something `identity` doesn't carry.
fn substitute_template(template: &str, identity: &Dataset) -> Option<String> {
    let mut out = String::with_capacity(template.len());
    let mut rest = template;
    while let Some(start) = rest.find('{') {
        let Some(end) = rest[start..].find('}') else { return None; };
        let end = start + end;
        out.push_str(&rest[..start]);
        let key = &rest[start + 1..end];
        if key == "type" {
            out.push_str(&identity.dataset_type);
        } else if let Some(value) = identity.ids.get(key) {
            out.push_str(&value.to_string());
        } else {
            return None;
        }
        rest = &rest[end + 1..];
    }
    out.push_str(rest);
    Some(out)
}


/***** DATA-TRIGGERED SCHEDULER *****/
/// Converts dataset announcements into candidate jobs by recognizing them
/// against a flat list of triggers, one of which names the prerequisite
/// set for the job it starts.
pub struct DataTriggeredScheduler {
    triggers: Vec<Trigger>,
    input_triggers: Vec<Trigger>,
    output_triggers: Vec<Trigger>,
    identity: IdentityConfig,
    name: NameConfig,
    retries_max: u32,
    counter: u64,
    /// Per-job prerequisite trackers, keyed by the job's identity dataset's
    /// canonical string. Deliberately not persisted (see `joboffice_blackboard::item`'s
    /// `JobItem` docs); reconstructed on startup by [`DataTriggeredScheduler::rehydrate`].
    handlers: HashMap<String, TriggerHandler>,
}

impl DataTriggeredScheduler {
    pub fn from_config(cfg: &SchedulerConfig) -> Result<Self, Error> {
        let triggers = cfg.trigger.iter().map(Trigger::from_config).collect::<Result<Vec<_>, _>>()?;
        let input_triggers = cfg.job.input.iter().map(Trigger::from_config).collect::<Result<Vec<_>, _>>()?;
        let output_triggers = cfg.job.output.iter().map(Trigger::from_config).collect::<Result<Vec<_>, _>>()?;
        Ok(Self {
            triggers, input_triggers, output_triggers,
            identity: cfg.job.identity.clone(),
            name: cfg.job.name.clone(),
            retries_max: cfg.job.retries,
            counter: cfg.job.name.init_counter,
            handlers: HashMap::new(),
        })
    }

    /// Rebuilds the in-memory trigger-handler map after a restart, using
    /// only durable state: `jobsPossible` names which jobs are still
    /// forming, and `dataAvailable` is the append-only audit log of every
    /// dataset ever announced. For each possible job, re-derives its full
    /// prerequisite list by running the trigger that would have produced
    /// it against the job's own identity dataset, then replays every
    /// announced dataset through the resulting handler. This is what lets
    /// `dataAvailable` double as a crash-recovery log instead of requiring
    /// the trigger handler itself to be written to disk.
    pub fn rehydrate(&mut self, bb: &Blackboard) {
        let announced: Vec<Dataset> = bb.data_available.iter()
            .filter_map(|item| match item {
                BlackboardItem::DataProduct(dp) => Some(dp.dataset.clone()),
                _ => None,
            })
            .collect();

        for item in bb.jobs_possible.iter() {
            let BlackboardItem::Job(job) = item else { continue };
            let key = job.job_identity.to_canonical_string(false);
            if self.handlers.contains_key(&key) { continue; }

            let needed = self.triggers.iter()
                .find_map(|t| t.list_datasets(&job.job_identity).ok());
            let Some(needed) = needed else {
                warn!("could not reconstruct the prerequisite set for possible job '{}' on restart; leaving it unready", job.name);
                continue;
            };

            let mut handler = TriggerHandler::new(&needed);
            for ds in &announced { handler.add_dataset(ds); }
            debug!("rehydrated trigger handler for job '{}': {} datasets still missing", job.name, handler.missing_count());
            self.handlers.insert(key, handler);
        }
    }

    /// Implements `processDataset`: recognizes `ds` against the configured
    /// triggers, records it, feeds every still-forming job's handler, and
    /// -- if nothing was waiting on it -- opens a new job. Returns `false`
    /// if no trigger recognized `ds` at all.
    pub fn process_dataset(&mut self, bb: &mut Blackboard, ds: &Dataset, success: Option<bool>) -> Result<bool, Error> {
        let Some(trigger) = self.triggers.iter().find(|t| t.recognize(ds).is_some()) else {
            debug!("no trigger recognized dataset '{}'; ignoring", ds);
            return Ok(false);
        };
        let success = success.unwrap_or(ds.valid);

        let needed_for_new_job = trigger.list_datasets(ds)?;
        let inputs: Vec<Dataset> = self.input_triggers.iter()
            .map(|t| t.list_datasets(ds))
            .collect::<Result<Vec<_>, _>>()?
            .into_iter().flatten().collect();
        let outputs: Vec<Dataset> = self.output_triggers.iter()
            .map(|t| t.list_datasets(ds))
            .collect::<Result<Vec<_>, _>>()?
            .into_iter().flatten().collect();

        let handlers = &mut self.handlers;
        let identity_cfg = &self.identity;
        let name_cfg = &self.name;
        let retries_max = self.retries_max;
        let counter = &mut self.counter;

        bb.transaction::<(), Error>(|bb| {
            // A dataset already present in the audit log is a repeat
            // delivery: some handler already consumed it (or never needed
            // it), so it must never start a second job on its own.
            let key = ds.to_canonical_string(false);
            let already_seen = bb.data_available.iter().any(|item| matches!(
                item,
                BlackboardItem::DataProduct(dp) if dp.dataset.to_canonical_string(false) == key
            ));

            bb.data_available.append(BlackboardItem::DataProduct(joboffice_blackboard::item::DataProductItem {
                dataset: ds.clone(),
                success,
            }));

            let mut needed = false;
            for idx in 0..bb.jobs_possible.len() {
                let key = match bb.jobs_possible.get(idx)? {
                    BlackboardItem::Job(job) => job.job_identity.to_canonical_string(false),
                    _ => continue,
                };
                if let Some(handler) = handlers.get_mut(&key) {
                    if handler.add_dataset(ds) { needed = true; }
                }
            }

            if !needed && !already_seen {
                let identity = compute_identity(identity_cfg, &inputs, &outputs);
                let name = compute_name(name_cfg, &identity, counter);
                let mut handler = TriggerHandler::new(&needed_for_new_job);
                handler.add_dataset(ds);
                let ready = handler.is_ready();
                handlers.insert(identity.to_canonical_string(false), handler);

                let job = JobItem {
                    job_identity: identity,
                    name,
                    inputs,
                    outputs,
                    assigned_pipeline_id: None,
                    success: None,
                    retries_remaining: retries_max,
                };
                info!("formed new job '{}' ({} prerequisite(s) outstanding)", job.name, needed_for_new_job.len().saturating_sub(1));
                let _ = ready;
                bb.jobs_possible.append(BlackboardItem::Job(job));
            }
            Ok(())
        })?;
        Ok(true)
    }

    /// Implements `makeJobsAvailable`: moves every job in `jobsPossible`
    /// whose handler reports ready into `jobsAvailable`, preserving the
    /// relative order of everything left behind.
    pub fn make_jobs_available(&mut self, bb: &mut Blackboard) -> Result<usize, Error> {
        let handlers = &mut self.handlers;
        bb.transaction::<usize, Error>(|bb| {
            let mut moved = 0;
            let mut i = 0;
            while i < bb.jobs_possible.len() {
                let ready = match bb.jobs_possible.get(i)? {
                    BlackboardItem::Job(job) => {
                        let key = job.job_identity.to_canonical_string(false);
                        handlers.get(&key).map(TriggerHandler::is_ready).unwrap_or(false)
                    },
                    _ => false,
                };
                if ready {
                    let item = bb.jobs_possible.pop(i)?;
                    if let BlackboardItem::Job(job) = &item {
                        handlers.remove(&job.job_identity.to_canonical_string(false));
                    }
                    bb.jobs_available.append(item);
                    moved += 1;
                } else {
                    i += 1;
                }
            }
            Ok(moved)
        })
    }
}


/***** BUTLER-TRIGGERED SCHEDULER *****/
/// A variant of [`DataTriggeredScheduler`] whose triggers emit candidate
/// job identities rather than merely recognizing a dataset: an announced
/// dataset is matched to an existing job in `jobsPossible` by identity
/// equality, or else starts a new job whose handler is seeded with that
/// trigger's own listed prerequisites (computed against the candidate
/// identity, which doubles as both the job's name and its input template).
pub struct ButlerTriggeredScheduler {
    triggers: Vec<Trigger>,
    identity: IdentityConfig,
    name: NameConfig,
    retries_max: u32,
    counter: u64,
    handlers: HashMap<String, TriggerHandler>,
}

impl ButlerTriggeredScheduler {
    pub fn from_config(cfg: &SchedulerConfig) -> Result<Self, Error> {
        let triggers = cfg.trigger.iter().map(Trigger::from_config).collect::<Result<Vec<_>, _>>()?;
        Ok(Self {
            triggers,
            identity: cfg.job.identity.clone(),
            name: cfg.job.name.clone(),
            retries_max: cfg.job.retries,
            counter: cfg.job.name.init_counter,
            handlers: HashMap::new(),
        })
    }

    pub fn rehydrate(&mut self, bb: &Blackboard) {
        let announced: Vec<Dataset> = bb.data_available.iter()
            .filter_map(|item| match item {
                BlackboardItem::DataProduct(dp) => Some(dp.dataset.clone()),
                _ => None,
            })
            .collect();
        for item in bb.jobs_possible.iter() {
            let BlackboardItem::Job(job) = item else { continue };
            let key = job.job_identity.to_canonical_string(false);
            if self.handlers.contains_key(&key) { continue; }
            let needed = self.triggers.iter().find_map(|t| t.list_datasets(&job.job_identity).ok());
            let Some(needed) = needed else { continue };
            let mut handler = TriggerHandler::new(&needed);
            for ds in &announced { handler.add_dataset(ds); }
            self.handlers.insert(key, handler);
        }
    }

    pub fn process_dataset(&mut self, bb: &mut Blackboard, ds: &Dataset, success: Option<bool>) -> Result<bool, Error> {
        let Some(trigger) = self.triggers.iter().find(|t| t.recognize(ds).is_some()) else {
            return Ok(false);
        };
        let success = success.unwrap_or(ds.valid);
        let candidate_prereqs = trigger.list_datasets(ds)?;
        let candidate_identity = compute_identity(&self.identity, &candidate_prereqs, &[]);
        let candidate_key = candidate_identity.to_canonical_string(false);

        let handlers = &mut self.handlers;
        let name_cfg = &self.name;
        let retries_max = self.retries_max;
        let counter = &mut self.counter;

        bb.transaction::<(), Error>(|bb| {
            bb.data_available.append(BlackboardItem::DataProduct(joboffice_blackboard::item::DataProductItem {
                dataset: ds.clone(),
                success,
            }));

            let existing = bb.jobs_possible.iter().any(|item| matches!(
                item,
                BlackboardItem::Job(job) if job.job_identity == candidate_identity
            ));

            if existing {
                if let Some(handler) = handlers.get_mut(&candidate_key) {
                    handler.add_dataset(ds);
                }
            } else {
                let name = compute_name(name_cfg, &candidate_identity, counter);
                let mut handler = TriggerHandler::new(&candidate_prereqs);
                handler.add_dataset(ds);
                handlers.insert(candidate_key, handler);

                let job = JobItem {
                    job_identity: candidate_identity.clone(),
                    name,
                    inputs: candidate_prereqs.clone(),
                    outputs: Vec::new(),
                    assigned_pipeline_id: None,
                    success: None,
                    retries_remaining: retries_max,
                };
                bb.jobs_possible.append(BlackboardItem::Job(job));
            }
            Ok(())
        })?;
        Ok(true)
    }

    pub fn make_jobs_available(&mut self, bb: &mut Blackboard) -> Result<usize, Error> {
        let handlers = &mut self.handlers;
        bb.transaction::<usize, Error>(|bb| {
            let mut moved = 0;
            let mut i = 0;
            while i < bb.jobs_possible.len() {
                let ready = match bb.jobs_possible.get(i)? {
                    BlackboardItem::Job(job) => {
                        let key = job.job_identity.to_canonical_string(false);
                        handlers.get(&key).map(TriggerHandler::is_ready).unwrap_or(false)
                    },
                    _ => false,
                };
                if ready {
                    let item = bb.jobs_possible.pop(i)?;
                    if let BlackboardItem::Job(job) = &item {
                        handlers.remove(&job.job_identity.to_canonical_string(false));
                    }
                    bb.jobs_available.append(item);
                    moved += 1;
                } else {
                    i += 1;
                }
            }
            Ok(moved)
        })
    }
}


/***** REGISTRY *****/
/// Either scheduler kind, looked up by `schedule.className` the way
/// `IDFilter` variants are looked up by their own `className`.
pub enum Scheduler {
    DataTriggered(DataTriggeredScheduler),
    ButlerTriggered(ButlerTriggeredScheduler),
}

impl Scheduler {
    /// Builds whichever scheduler kind `cfg.class_name` names. An
    /// unrecognized name is a configuration error raised at startup, per
    /// the "dynamic class lookup by name" design note.
    pub fn from_config(cfg: &SchedulerConfig) -> Result<Self, Error> {
        match cfg.class_name.as_str() {
            "DataTriggered" | "DataTriggeredScheduler" => Ok(Self::DataTriggered(DataTriggeredScheduler::from_config(cfg)?)),
            "ButlerTriggered" | "ButlerTriggeredScheduler" => Ok(Self::ButlerTriggered(ButlerTriggeredScheduler::from_config(cfg)?)),
            other => Err(Error::UnknownClassName { class_name: other.to_string() }),
        }
    }

    pub fn rehydrate(&mut self, bb: &Blackboard) {
        match self {
            Self::DataTriggered(s) => s.rehydrate(bb),
            Self::ButlerTriggered(s) => s.rehydrate(bb),
        }
    }

    pub fn process_dataset(&mut self, bb: &mut Blackboard, ds: &Dataset, success: Option<bool>) -> Result<bool, Error> {
        match self {
            Self::DataTriggered(s) => s.process_dataset(bb, ds, success),
            Self::ButlerTriggered(s) => s.process_dataset(bb, ds, success),
        }
    }

    pub fn make_jobs_available(&mut self, bb: &mut Blackboard) -> Result<usize, Error> {
        match self {
            Self::DataTriggered(s) => s.make_jobs_available(bb),
            Self::ButlerTriggered(s) => s.make_jobs_available(bb),
        }
    }
}


#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap as Map;

    /// A trigger that only enumerates over `amp` (0..16): `ccd` and `visit`
    /// ride along as fixed identifiers carried from whichever dataset first
    /// formed the job, matching the "16 amps assemble into one CCD" scenario.
    fn postisr_cfg() -> SchedulerConfig {
        let amp_trigger = TriggerConfig {
            class_name: "Trigger".to_string(),
            dataset_type: vec!["PostISR".to_string()],
            id: vec![
                crate::id_filter::IdFilterConfig { class_name: "Integer".to_string(), name: "amp".to_string(), outname: None, is_static: false, min: Some(0), lim: Some(16), value: vec![] },
            ],
        };
        SchedulerConfig {
            class_name: "DataTriggered".to_string(),
            trigger: vec![amp_trigger.clone()],
            job: JobConfig {
                input: vec![amp_trigger],
                output: vec![],
                identity: IdentityConfig::default(),
                name: NameConfig { default: "Job".to_string(), template: None, init_counter: 1 },
                retries: 0,
            },
        }
    }

    fn ds(visit: i64, ccd: i64, amp: i64) -> Dataset {
        Dataset::new("PostISR").with_id("visit", visit).with_id("ccd", ccd).with_id("amp", amp)
    }

    #[test]
    fn s1_ccd_assembly_forms_one_job() {
        let dir = tempfile::tempdir().unwrap();
        let mut bb = Blackboard::open(dir.path()).unwrap();
        let mut sched = DataTriggeredScheduler::from_config(&postisr_cfg()).unwrap();

        for amp in 0..16 {
            let recognized = sched.process_dataset(&mut bb, &ds(88, 22, amp), None).unwrap();
            assert!(recognized);
        }

        assert_eq!(bb.data_available.len(), 16);
        assert_eq!(bb.jobs_possible.len(), 1);
        let BlackboardItem::Job(job) = bb.jobs_possible.get(0).unwrap() else { panic!("expected a job") };
        assert_eq!(job.name, "Job-1");

        sched.make_jobs_available(&mut bb).unwrap();
        assert_eq!(bb.jobs_possible.len(), 0);
        assert_eq!(bb.jobs_available.len(), 1);
    }

    #[test]
    fn repeated_announcement_does_not_double_count() {
        let dir = tempfile::tempdir().unwrap();
        let mut bb = Blackboard::open(dir.path()).unwrap();
        let mut sched = DataTriggeredScheduler::from_config(&postisr_cfg()).unwrap();

        sched.process_dataset(&mut bb, &ds(88, 22, 0), None).unwrap();
        sched.process_dataset(&mut bb, &ds(88, 22, 0), None).unwrap();

        assert_eq!(bb.jobs_possible.len(), 1, "a repeated dataset must not create a second job");
        assert_eq!(bb.data_available.len(), 2, "dataAvailable is an audit log; it still records the repeat");
    }

    #[test]
    fn rehydrate_reconstructs_missing_count_after_restart() {
        let dir = tempfile::tempdir().unwrap();
        {
            let mut bb = Blackboard::open(dir.path()).unwrap();
            let mut sched = DataTriggeredScheduler::from_config(&postisr_cfg()).unwrap();
            for amp in 0..10 {
                sched.process_dataset(&mut bb, &ds(88, 22, amp), None).unwrap();
            }
            assert_eq!(bb.jobs_possible.len(), 1);
        }

        let bb = Blackboard::open(dir.path()).unwrap();
        let mut sched = DataTriggeredScheduler::from_config(&postisr_cfg()).unwrap();
        sched.rehydrate(&bb);
        let BlackboardItem::Job(job) = bb.jobs_possible.get(0).unwrap() else { panic!("expected a job") };
        let handler = sched.handlers.get(&job.job_identity.to_canonical_string(false)).unwrap();
        assert_eq!(handler.missing_count(), 16 - 10);
    }

    #[test]
    fn identity_falls_back_to_unknown_with_no_inputs_or_outputs() {
        let identity = compute_identity(&IdentityConfig::default(), &[], &[]);
        assert_eq!(identity, Dataset::new("unknown"));
    }

    #[test]
    fn identity_prefers_output_then_input_then_override_type() {
        let cfg = IdentityConfig { template_type: None, dataset_type: Some("visitJob".to_string()), id: vec!["visit".to_string()] };
        let inputs = vec![Dataset::new("raw").with_id("visit", 1i64).with_id("ccd", 2i64)];
        let identity = compute_identity(&cfg, &inputs, &[]);
        assert_eq!(identity.dataset_type, "visitJob");
        let mut expected = Map::new();
        expected.insert("visit".to_string(), specifications::id_value::IdValue::Int(1));
        assert_eq!(identity.ids, expected);
    }

    #[test]
    fn name_template_substitutes_and_falls_back_on_missing_key() {
        let identity = Dataset::new("visitJob").with_id("visit", 7i64);
        let mut counter = 1;
        let cfg = NameConfig { default: "Job".to_string(), template: Some("{type}-{visit}".to_string()), init_counter: 1 };
        assert_eq!(compute_name(&cfg, &identity, &mut counter), "visitJob-7");

        let cfg_missing = NameConfig { default: "Job".to_string(), template: Some("{type}-{ccd}".to_string()), init_counter: 1 };
        let mut counter2 = 1;
        assert_eq!(compute_name(&cfg_missing, &identity, &mut counter2), "Job-1");
        assert_eq!(counter2, 2);
    }

    #[test]
    fn unknown_scheduler_class_name_is_a_configuration_error() {
        let mut cfg = postisr_cfg();
        cfg.class_name = "Bogus".to_string();
        assert!(matches!(Scheduler::from_config(&cfg), Err(Error::UnknownClassName { .. })));
    }
}
