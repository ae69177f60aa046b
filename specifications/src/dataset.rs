//  DATASET.rs
//    by Ray Plante
//
//  Description:
//!   Defines `Dataset`, the value type that flows through the job office:
//!   a named dataset type plus the identifiers that distinguish one
//!   instance of that type from another, an optional filesystem path,
//!   and a validity flag set by whoever announced it.

use std::collections::BTreeMap;
use std::fmt::{Display, Formatter, Result as FResult};

use serde::{Deserialize, Serialize};

use crate::id_value::IdValue;


/***** LIBRARY *****/
/// A single dataset as seen by the job office.
///
/// `ids` is kept as a `BTreeMap` rather than a `HashMap`: the canonical string
/// form of a dataset (used for `dids` membership tests and for log output)
/// requires the identifiers in lexicographic key order, and a `BTreeMap`
/// gives us that ordering for free instead of requiring a sort at every call
/// site.
#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct Dataset {
    /// The dataset type name (e.g. `"postISRCCD"`).
    #[serde(rename = "type")]
    pub dataset_type: String,

    /// The identifiers that, together with `dataset_type`, name this dataset
    /// (e.g. `visit`, `ccd`, `raft`).
    #[serde(default)]
    pub ids: BTreeMap<String, IdValue>,

    /// The filesystem path associated with this dataset, if any. Not part of
    /// dataset identity; carried along for convenience and logging.
    #[serde(default)]
    pub path: Option<String>,

    /// Whether this dataset is usable. An announced dataset that failed
    /// validation downstream (e.g. the producing pipeline detected a
    /// corrupt file) is still forwarded with `valid = false` so that job
    /// formation can account for the gap rather than wait on it forever.
    #[serde(default = "Dataset::default_valid")]
    pub valid: bool,
}

impl Dataset {
    fn default_valid() -> bool { true }

    /// Creates a new dataset with no identifiers, no path, and `valid = true`.
    pub fn new<S: Into<String>>(dataset_type: S) -> Self {
        Self { dataset_type: dataset_type.into(), ids: BTreeMap::new(), path: None, valid: true }
    }

    /// Sets an identifier, returning `self` for chained construction.
    pub fn with_id<K: Into<String>, V: Into<IdValue>>(mut self, key: K, value: V) -> Self {
        self.ids.insert(key.into(), value.into());
        self
    }

    /// Sets the path, returning `self` for chained construction.
    pub fn with_path<S: Into<String>>(mut self, path: S) -> Self {
        self.path = Some(path.into());
        self
    }

    /// Renders the canonical string form of this dataset's identity:
    /// `<type>{key1=val1,key2=val2,...}`, keys in lexicographic order. Two
    /// datasets with the same type and the same identifiers render to the
    /// same string regardless of the order in which their identifiers were
    /// set, which is what lets a `TriggerHandler` use this string as a set
    /// membership key.
    ///
    /// When `with_path` is `true` and a path is set, the path is appended as
    /// a trailing `@<path>` so that log output can distinguish two datasets
    /// with identical identity but different source files.
    pub fn to_canonical_string(&self, with_path: bool) -> String {
        let mut out = String::new();
        out.push_str(&self.dataset_type);
        out.push('{');
        let mut first = true;
        for (key, value) in &self.ids {
            if !first { out.push(','); }
            first = false;
            out.push_str(key);
            out.push('=');
            out.push_str(&value.to_string());
        }
        out.push('}');
        if with_path {
            if let Some(path) = &self.path {
                out.push('@');
                out.push_str(path);
            }
        }
        out
    }
}

/// Two datasets are equal iff their type and identifiers agree; `path` and
/// `valid` play no part in identity, so a dataset re-announced as invalid
/// still matches the same job slot as its earlier, valid incarnation.
impl PartialEq for Dataset {
    fn eq(&self, other: &Self) -> bool {
        self.dataset_type == other.dataset_type && self.ids == other.ids
    }
}

impl Display for Dataset {
    fn fmt(&self, f: &mut Formatter<'_>) -> FResult {
        write!(f, "{}", self.to_canonical_string(false))
    }
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn canonical_string_is_order_independent() {
        let a = Dataset::new("raw").with_id("visit", 44291i64).with_id("ccd", 12i64);
        let b = Dataset::new("raw").with_id("ccd", 12i64).with_id("visit", 44291i64);
        assert_eq!(a.to_canonical_string(false), b.to_canonical_string(false));
        assert_eq!(a.to_canonical_string(false), "raw{ccd=12,visit=44291}");
    }

    #[test]
    fn path_only_appears_when_requested() {
        let d = Dataset::new("raw").with_id("visit", 1i64).with_path("/data/raw/1.fits");
        assert_eq!(d.to_canonical_string(false), "raw{visit=1}");
        assert_eq!(d.to_canonical_string(true), "raw{visit=1}@/data/raw/1.fits");
    }

    #[test]
    fn equality_is_type_and_ids_only() {
        let a = Dataset::new("raw").with_id("visit", 1i64);
        let mut b = a.clone();
        assert_eq!(a, b);
        b.valid = false;
        assert_eq!(a, b, "valid flag must not affect identity");
        b.path = Some("/elsewhere.fits".into());
        assert_eq!(a, b, "path must not affect identity");
    }

    #[test]
    fn equality_differs_on_type_or_ids() {
        let a = Dataset::new("raw").with_id("visit", 1i64);
        assert_ne!(a, Dataset::new("other").with_id("visit", 1i64));
        assert_ne!(a, Dataset::new("raw").with_id("visit", 2i64));
    }
}
