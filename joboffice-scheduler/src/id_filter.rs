//  ID_FILTER.rs
//    by Ray Plante
//
//  Description:
//!   Implements `IDFilter`, the predicate-plus-enumerator over a single
//!   dataset identifier that a `Trigger` uses both to recognize incoming
//!   datasets and, when closed, to enumerate the full set of values a job's
//!   inputs or outputs range over.

use std::fmt::{Display, Formatter, Result as FResult};

use enum_debug::EnumDebug;
use serde::{Deserialize, Serialize};
use specifications::id_value::IdValue;


/***** ERRORS *****/
/// Defines errors that relate to constructing or evaluating an `IDFilter`.
#[derive(Debug)]
pub enum Error {
    /// The config record's `className` didn't name a registered filter kind.
    UnknownClassName { class_name: String },
    /// `allowedValues()` was called on a filter that isn't closed.
    NotClosed { kind: &'static str, name: String },
}

impl Display for Error {
    fn fmt(&self, f: &mut Formatter<'_>) -> FResult {
        match self {
            Self::UnknownClassName { class_name } => write!(f, "unrecognized IDFilter className '{}'", class_name),
            Self::NotClosed { kind, name } => write!(f, "{} IDFilter for identifier '{}' is not closed; it has no enumerable set of values", kind, name),
        }
    }
}
impl std::error::Error for Error {}


/***** CONFIG *****/
/// The configuration-file shape of an `IDFilter`, as it appears under a
/// trigger's `id` list in the job office policy file (see `schedule.trigger[].id[]`
/// in the configuration schema).
#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct IdFilterConfig {
    /// Picks the filter variant: `Integer` / `String` (or the fully qualified
    /// names `IntegerIDFilter` / `StringIDFilter`).
    #[serde(rename = "className")]
    pub class_name: String,
    /// The input identifier this filter recognizes.
    pub name: String,
    /// The identifier name to use for the recognized value in output
    /// datasets; defaults to `name`.
    #[serde(default)]
    pub outname: Option<String>,
    /// Whether this identifier is carried as a fixed, non-enumerated value
    /// (reserved for future trigger kinds; this crate's triggers don't yet
    /// special-case it, but config files may set it).
    #[serde(default, rename = "static")]
    pub is_static: bool,
    /// Integer range lower bound (inclusive).
    #[serde(default)]
    pub min: Option<i64>,
    /// Integer range upper bound (exclusive).
    #[serde(default)]
    pub lim: Option<i64>,
    /// Explicit allowed values, repeated. Parsed against the filter's own
    /// variant (`i64` for `Integer`, raw strings for `String`).
    #[serde(default)]
    pub value: Vec<String>,
}


/***** LIBRARY *****/
/// A predicate plus optional enumerator over a single dataset identifier.
#[derive(Clone, Debug, EnumDebug, PartialEq)]
pub enum IDFilter {
    Integer {
        name: String,
        outname: String,
        is_static: bool,
        min: Option<i64>,
        lim: Option<i64>,
        values: Option<Vec<i64>>,
    },
    Str {
        name: String,
        outname: String,
        is_static: bool,
        values: Option<Vec<String>>,
    },
}

impl IDFilter {
    /// Builds an `IDFilter` from its configuration-record form. Looks up
    /// `class_name` in the small registry of known filter kinds; an
    /// unrecognized name is a configuration error, matching the original
    /// class-registry lookup this was distilled from.
    pub fn from_config(cfg: &IdFilterConfig) -> Result<Self, Error> {
        let outname = cfg.outname.clone().unwrap_or_else(|| cfg.name.clone());
        match cfg.class_name.as_str() {
            "Integer" | "IntegerIDFilter" => {
                let values = if cfg.value.is_empty() {
                    None
                } else {
                    Some(cfg.value.iter().filter_map(|v| v.parse::<i64>().ok()).collect())
                };
                Ok(Self::Integer { name: cfg.name.clone(), outname, is_static: cfg.is_static, min: cfg.min, lim: cfg.lim, values })
            },
            "String" | "StringIDFilter" => {
                let values = if cfg.value.is_empty() { None } else { Some(cfg.value.clone()) };
                Ok(Self::Str { name: cfg.name.clone(), outname, is_static: cfg.is_static, values })
            },
            other => Err(Error::UnknownClassName { class_name: other.to_string() }),
        }
    }

    /// The input identifier name this filter recognizes.
    pub fn name(&self) -> &str {
        match self {
            Self::Integer { name, .. } => name,
            Self::Str { name, .. } => name,
        }
    }

    /// The identifier name to use for this value in an expanded dataset.
    pub fn outname(&self) -> &str {
        match self {
            Self::Integer { outname, .. } => outname,
            Self::Str { outname, .. } => outname,
        }
    }

    pub fn is_static(&self) -> bool {
        match self {
            Self::Integer { is_static, .. } => *is_static,
            Self::Str { is_static, .. } => *is_static,
        }
    }

    /// Attempts to recognize `value`, coercing it first if needed. Returns
    /// the coerced value on acceptance.
    pub fn recognize(&self, value: &IdValue) -> Option<IdValue> {
        match self {
            Self::Integer { min, lim, values, .. } => {
                let v = value.as_int()?;
                let unconstrained = min.is_none() && lim.is_none() && values.is_none();
                let in_range = match (min, lim) {
                    (Some(min), Some(lim)) => v >= *min && v < *lim,
                    (Some(min), None)      => v >= *min,
                    (None, Some(lim))      => v < *lim,
                    (None, None)           => false,
                };
                let in_values = values.as_ref().map(|vs| vs.contains(&v)).unwrap_or(false);
                if unconstrained || in_range || in_values { Some(IdValue::Int(v)) } else { None }
            },
            Self::Str { values, .. } => {
                let v = value.as_str_value();
                let accepted = values.as_ref().map(|vs| vs.contains(&v)).unwrap_or(true);
                if accepted { Some(IdValue::Str(v)) } else { None }
            },
        }
    }

    /// True iff this filter's enumeration is finite: an integer filter with
    /// both bounds set, or either variant with an explicit, non-empty value list.
    pub fn is_closed(&self) -> bool {
        match self {
            Self::Integer { min, lim, values, .. } => {
                (min.is_some() && lim.is_some()) || values.as_ref().map(|v| !v.is_empty()).unwrap_or(false)
            },
            Self::Str { values, .. } => values.as_ref().map(|v| !v.is_empty()).unwrap_or(false),
        }
    }

    /// The full, sorted list of values this filter enumerates, if closed.
    pub fn allowed_values(&self) -> Result<Vec<IdValue>, Error> {
        if !self.is_closed() { return Err(Error::NotClosed { kind: self.variant(), name: self.name().to_string() }); }
        match self {
            Self::Integer { min, lim, values, .. } => {
                if let Some(values) = values {
                    let mut vs: Vec<i64> = values.clone();
                    vs.sort_unstable();
                    vs.dedup();
                    Ok(vs.into_iter().map(IdValue::Int).collect())
                } else {
                    let (min, lim) = (min.unwrap(), lim.unwrap());
                    Ok((min..lim).map(IdValue::Int).collect())
                }
            },
            Self::Str { values, .. } => {
                let mut vs = values.clone().unwrap_or_default();
                vs.sort();
                vs.dedup();
                Ok(vs.into_iter().map(IdValue::Str).collect())
            },
        }
    }
}


#[cfg(test)]
mod tests {
    use super::*;

    fn int_filter(name: &str, min: Option<i64>, lim: Option<i64>) -> IDFilter {
        IDFilter::Integer { name: name.to_string(), outname: name.to_string(), is_static: false, min, lim, values: None }
    }

    #[test]
    fn closed_integer_filter_recognizes_its_range() {
        let f = int_filter("ccd", Some(0), Some(9));
        assert!(f.is_closed());
        assert_eq!(f.recognize(&IdValue::Int(0)), Some(IdValue::Int(0)));
        assert_eq!(f.recognize(&IdValue::Int(8)), Some(IdValue::Int(8)));
        assert_eq!(f.recognize(&IdValue::Int(9)), None);
        assert_eq!(f.recognize(&IdValue::Int(-1)), None);
    }

    #[test]
    fn half_open_integer_filter_is_not_closed() {
        let f = int_filter("visit", Some(0), None);
        assert!(!f.is_closed());
        assert!(f.allowed_values().is_err());
    }

    #[test]
    fn unconstrained_integer_filter_accepts_anything() {
        let f = int_filter("visit", None, None);
        assert!(!f.is_closed());
        assert_eq!(f.recognize(&IdValue::Int(999)), Some(IdValue::Int(999)));
    }

    #[test]
    fn string_filter_with_no_values_accepts_anything() {
        let f = IDFilter::Str { name: "band".to_string(), outname: "band".to_string(), is_static: false, values: None };
        assert!(!f.is_closed());
        assert_eq!(f.recognize(&IdValue::Str("r".to_string())), Some(IdValue::Str("r".to_string())));
    }

    #[test]
    fn string_filter_with_values_is_closed_and_membership_gated() {
        let f = IDFilter::Str { name: "band".to_string(), outname: "band".to_string(), is_static: false, values: Some(vec!["g".to_string(), "r".to_string()]) };
        assert!(f.is_closed());
        assert_eq!(f.recognize(&IdValue::Str("r".to_string())), Some(IdValue::Str("r".to_string())));
        assert_eq!(f.recognize(&IdValue::Str("i".to_string())), None);
        assert_eq!(f.allowed_values().unwrap(), vec![IdValue::Str("g".to_string()), IdValue::Str("r".to_string())]);
    }

    #[test]
    fn unknown_class_name_is_a_configuration_error() {
        let cfg = IdFilterConfig { class_name: "Bogus".to_string(), name: "x".to_string(), outname: None, is_static: false, min: None, lim: None, value: vec![] };
        assert!(matches!(IDFilter::from_config(&cfg), Err(Error::UnknownClassName { .. })));
    }

    #[test]
    fn from_config_parses_integer_variant() {
        let cfg = IdFilterConfig { class_name: "Integer".to_string(), name: "amp".to_string(), outname: None, is_static: false, min: Some(0), lim: Some(16), value: vec![] };
        let f = IDFilter::from_config(&cfg).unwrap();
        assert!(f.is_closed());
        assert_eq!(f.allowed_values().unwrap().len(), 16);
    }
}
