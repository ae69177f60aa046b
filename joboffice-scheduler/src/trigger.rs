//  TRIGGER.rs
//    by Ray Plante
//
//  Description:
//!   Implements `Trigger`: a rule that matches incoming datasets against a
//!   set of `IDFilter`s (disjunction within an identifier name, conjunction
//!   across names) and, given a template dataset, expands a match into the
//!   full, deterministic list of related datasets it implies.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt::{Display, Formatter, Result as FResult};

use serde::{Deserialize, Serialize};
use specifications::dataset::Dataset;
use specifications::id_value::IdValue;

use crate::id_filter::{Error as IdFilterError, IDFilter, IdFilterConfig};


/***** ERRORS *****/
#[derive(Debug)]
pub enum Error {
    /// An `id_filter::Error` encountered while building filters from config.
    Filter(IdFilterError),
    /// `listDatasets` needed the enumerable set for an identifier whose
    /// filter isn't closed, and the template didn't supply a value either.
    NonClosedSet { name: String },
    /// The trigger's configuration named an unrecognized `className`.
    UnknownClassName { class_name: String },
}

impl Display for Error {
    fn fmt(&self, f: &mut Formatter<'_>) -> FResult {
        match self {
            Self::Filter(err) => write!(f, "{}", err),
            Self::NonClosedSet { name } => write!(
                f,
                "identifier '{}' has no enumerable set of values and the template dataset didn't supply one either",
                name,
            ),
            Self::UnknownClassName { class_name } => write!(f, "unrecognized trigger className '{}'", class_name),
        }
    }
}
impl std::error::Error for Error {}
impl From<IdFilterError> for Error {
    fn from(err: IdFilterError) -> Self { Self::Filter(err) }
}


/***** CONFIG *****/
/// The configuration-file shape of a `Trigger`, as it appears in
/// `schedule.trigger`, `schedule.job.input`, and `schedule.job.output`.
#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct TriggerConfig {
    /// Picks the trigger implementation; only `Trigger` (or the fully
    /// qualified `DatasetTrigger`) is recognized today.
    #[serde(rename = "className", default = "TriggerConfig::default_class_name")]
    pub class_name: String,
    /// If set, restricts this trigger to datasets of one of these types.
    #[serde(default, rename = "datasetType")]
    pub dataset_type: Vec<String>,
    /// The per-identifier filters. Several entries may name the same
    /// identifier; they're OR'd together at match time.
    #[serde(default)]
    pub id: Vec<IdFilterConfig>,
}

impl TriggerConfig {
    fn default_class_name() -> String { "Trigger".to_string() }
}


/***** LIBRARY *****/
/// A typed set of dataset-type names plus a mapping of identifier-name to a
/// list of filters. See the crate root docs for the trigger-mode/IO-mode
/// distinction.
#[derive(Clone, Debug)]
pub struct Trigger {
    dataset_types: BTreeSet<String>,
    filters: BTreeMap<String, Vec<IDFilter>>,
}

impl Trigger {
    /// Builds a `Trigger` from its configuration-record form.
    pub fn from_config(cfg: &TriggerConfig) -> Result<Self, Error> {
        match cfg.class_name.as_str() {
            "Trigger" | "DatasetTrigger" => {},
            other => return Err(Error::UnknownClassName { class_name: other.to_string() }),
        }
        let mut filters: BTreeMap<String, Vec<IDFilter>> = BTreeMap::new();
        for filter_cfg in &cfg.id {
            let filter = IDFilter::from_config(filter_cfg)?;
            filters.entry(filter.name().to_string()).or_default().push(filter);
        }
        Ok(Self { dataset_types: cfg.dataset_type.iter().cloned().collect(), filters })
    }

    /// Builds a `Trigger` programmatically, bypassing the config-record path.
    pub fn new(dataset_types: impl IntoIterator<Item = String>, filters: BTreeMap<String, Vec<IDFilter>>) -> Self {
        Self { dataset_types: dataset_types.into_iter().collect(), filters }
    }

    /// True iff every filter this trigger holds is closed, meaning
    /// `list_datasets` produces a finite, deterministic cartesian product
    /// with no dependence on the template's identifier values.
    pub fn is_closed(&self) -> bool {
        self.filters.values().all(|fs| fs.iter().any(IDFilter::is_closed))
    }

    /// Attempts to recognize `ds` as matching this trigger: the dataset
    /// type (if restricted) must be one of this trigger's types, and every
    /// identifier this trigger cares about must be present on `ds` and
    /// accepted by at least one of the filters registered for that name.
    /// Returns the (unchanged) dataset on success.
    pub fn recognize(&self, ds: &Dataset) -> Option<Dataset> {
        if !self.dataset_types.is_empty() && !self.dataset_types.contains(&ds.dataset_type) {
            return None;
        }
        for (name, filters) in &self.filters {
            let value = ds.ids.get(name)?;
            if !filters.iter().any(|f| f.recognize(value).is_some()) {
                return None;
            }
        }
        Some(ds.clone())
    }

    /// Expands `template` into the full, deterministic list of datasets
    /// this trigger implies: for each identifier this trigger filters on,
    /// uses the filter's full enumeration if closed, else falls back to the
    /// single value carried by `template` (failing with
    /// [`Error::NonClosedSet`] if neither is available). The cartesian
    /// product of those per-identifier value lists is crossed with each of
    /// this trigger's dataset types (or, if unrestricted, `template`'s own
    /// type -- "trigger mode").
    pub fn list_datasets(&self, template: &Dataset) -> Result<Vec<Dataset>, Error> {
        let mut names: Vec<&String> = self.filters.keys().collect();
        names.sort();

        let mut axes: Vec<(String, Vec<IdValue>)> = Vec::with_capacity(names.len());
        for name in names {
            let filters = &self.filters[name];
            let closed = filters.iter().find(|f| f.is_closed());
            let values = if let Some(filter) = closed {
                filter.allowed_values()?
            } else if let Some(v) = template.ids.get(name) {
                vec![v.clone()]
            } else {
                return Err(Error::NonClosedSet { name: name.clone() });
            };
            let outname = filters.first().map(|f| f.outname().to_string()).unwrap_or_else(|| name.clone());
            axes.push((outname, values));
        }

        let mut types: Vec<String> = if self.dataset_types.is_empty() {
            vec![template.dataset_type.clone()]
        } else {
            self.dataset_types.iter().cloned().collect()
        };
        types.sort();

        // Seed from the template's own identifiers so that an identifier this
        // trigger doesn't filter on (e.g. `visit`, when only `amp`/`ccd` vary)
        // still ends up on every expanded dataset -- only the filtered axes
        // get overwritten below.
        let mut combos: Vec<BTreeMap<String, IdValue>> = vec![template.ids.clone()];
        for (name, values) in &axes {
            let mut next = Vec::with_capacity(combos.len() * values.len());
            for combo in &combos {
                for value in values {
                    let mut extended = combo.clone();
                    extended.insert(name.clone(), value.clone());
                    next.push(extended);
                }
            }
            combos = next;
        }

        let mut out = Vec::with_capacity(types.len() * combos.len());
        for dataset_type in &types {
            for ids in &combos {
                out.push(Dataset { dataset_type: dataset_type.clone(), ids: ids.clone(), path: None, valid: true });
            }
        }
        Ok(out)
    }
}


#[cfg(test)]
mod tests {
    use super::*;

    fn closed_filter(name: &str, min: i64, lim: i64) -> IDFilter {
        IDFilter::Integer { name: name.to_string(), outname: name.to_string(), is_static: false, min: Some(min), lim: Some(lim), values: None }
    }

    fn ccd_trigger() -> Trigger {
        let mut filters = BTreeMap::new();
        filters.insert("amp".to_string(), vec![closed_filter("amp", 0, 16)]);
        filters.insert("ccd".to_string(), vec![closed_filter("ccd", 0, 9)]);
        Trigger::new(vec!["PostISR".to_string()], filters)
    }

    #[test]
    fn recognize_checks_type_and_every_filter() {
        let t = ccd_trigger();
        let ok = Dataset::new("PostISR").with_id("amp", 3i64).with_id("ccd", 5i64).with_id("visit", 88i64);
        assert!(t.recognize(&ok).is_some());

        let wrong_type = Dataset::new("Raw").with_id("amp", 3i64).with_id("ccd", 5i64);
        assert!(t.recognize(&wrong_type).is_none());

        let out_of_range = Dataset::new("PostISR").with_id("amp", 99i64).with_id("ccd", 5i64);
        assert!(t.recognize(&out_of_range).is_none());

        let missing_id = Dataset::new("PostISR").with_id("amp", 3i64);
        assert!(t.recognize(&missing_id).is_none());
    }

    #[test]
    fn list_datasets_size_matches_closed_cartesian_product() {
        let t = ccd_trigger();
        let template = Dataset::new("PostISR").with_id("visit", 88i64).with_id("ccd", 5i64).with_id("amp", 0i64);
        let datasets = t.list_datasets(&template).unwrap();
        assert_eq!(datasets.len(), 16 * 9);
    }

    #[test]
    fn list_datasets_is_deterministically_ordered() {
        let t = ccd_trigger();
        let template = Dataset::new("PostISR").with_id("visit", 1i64).with_id("ccd", 0i64).with_id("amp", 0i64);
        let a = t.list_datasets(&template).unwrap();
        let b = t.list_datasets(&template).unwrap();
        assert_eq!(a, b);
        assert_eq!(a.first().unwrap().ids.get("amp"), Some(&IdValue::Int(0)));
        assert_eq!(a.first().unwrap().ids.get("ccd"), Some(&IdValue::Int(0)));
    }

    #[test]
    fn non_closed_filter_without_template_value_fails() {
        let mut filters = BTreeMap::new();
        filters.insert("visit".to_string(), vec![IDFilter::Integer { name: "visit".to_string(), outname: "visit".to_string(), is_static: false, min: None, lim: None, values: None }]);
        let t = Trigger::new(vec!["Raw".to_string()], filters);
        let template = Dataset::new("Raw");
        assert!(matches!(t.list_datasets(&template), Err(Error::NonClosedSet { .. })));
    }

    #[test]
    fn non_closed_filter_falls_back_to_template_value() {
        let mut filters = BTreeMap::new();
        filters.insert("visit".to_string(), vec![IDFilter::Integer { name: "visit".to_string(), outname: "visit".to_string(), is_static: false, min: None, lim: None, values: None }]);
        let t = Trigger::new(vec!["Raw".to_string()], filters);
        let template = Dataset::new("Raw").with_id("visit", 42i64);
        let datasets = t.list_datasets(&template).unwrap();
        assert_eq!(datasets, vec![Dataset::new("Raw").with_id("visit", 42i64)]);
    }

    #[test]
    fn unrestricted_type_falls_back_to_template_type() {
        let filters = BTreeMap::new();
        let t = Trigger::new(Vec::<String>::new(), filters);
        let template = Dataset::new("Whatever").with_id("visit", 1i64);
        let datasets = t.list_datasets(&template).unwrap();
        assert_eq!(datasets, vec![template]);
    }
}
