//  RECORD.rs
//    by Ray Plante
//
//  Description:
//!   A small text encoding for round-trippable key/value records. This is
//!   the on-disk and on-the-wire form used for `Dataset`s (and, in the
//!   blackboard, for the property maps attached to queue items): one
//!   `key=sigil:value` pair per line, where the sigil records which
//!   `IdValue` variant the value decodes back into.

use std::collections::BTreeMap;
use std::fmt::{Display, Formatter, Result as FResult};

use crate::dataset::Dataset;
use crate::id_value::IdValue;


/***** ERRORS *****/
/// Failure to parse a record line or an encoded scalar.
#[derive(Debug)]
pub enum RecordError {
    /// A line did not contain a `key=sigil:value` triple.
    MalformedLine(String),
    /// A value carried a sigil that isn't one of `i`, `f`, or `s`.
    UnknownSigil(String),
    /// A value tagged `i:` or `f:` did not parse as that numeric type.
    BadScalar { sigil: char, value: String },
}

impl Display for RecordError {
    fn fmt(&self, f: &mut Formatter<'_>) -> FResult {
        match self {
            Self::MalformedLine(line) => write!(f, "malformed record line: '{}'", line),
            Self::UnknownSigil(sigil) => write!(f, "unknown value sigil: '{}'", sigil),
            Self::BadScalar { sigil, value } => {
                write!(f, "value '{}' does not parse as a '{}' scalar", value, sigil)
            },
        }
    }
}
impl std::error::Error for RecordError {}


/***** LIBRARY *****/
/// Encodes a single `IdValue` as a sigil-tagged string: `i:<int>`, `f:<float>`,
/// or `s:<string>`. The sigil makes the encoding self-describing, so a record
/// file can be read back without an external schema telling it which
/// identifiers are numeric.
pub fn encode_value(value: &IdValue) -> String {
    match value {
        IdValue::Int(i)   => format!("i:{}", i),
        IdValue::Float(v) => format!("f:{}", v),
        IdValue::Str(s)   => format!("s:{}", s),
    }
}

/// Decodes a sigil-tagged value string produced by [`encode_value`].
pub fn decode_value(raw: &str) -> Result<IdValue, RecordError> {
    let (sigil, value) = raw.split_once(':').ok_or_else(|| RecordError::MalformedLine(raw.to_string()))?;
    match sigil {
        "i" => value.parse::<i64>().map(IdValue::Int)
            .map_err(|_| RecordError::BadScalar { sigil: 'i', value: value.to_string() }),
        "f" => value.parse::<f64>().map(IdValue::Float)
            .map_err(|_| RecordError::BadScalar { sigil: 'f', value: value.to_string() }),
        "s" => Ok(IdValue::Str(value.to_string())),
        other => Err(RecordError::UnknownSigil(other.to_string())),
    }
}

/// Encodes a set of key/value pairs as a record: one `key=sigil:value` line
/// per entry, in the order the caller provides them. Callers that need a
/// deterministic encoding (e.g. for a `Dataset`'s `ids`) should pass an
/// already-sorted map, such as the `BTreeMap` `Dataset::ids` uses.
pub fn encode_fields<'a, I>(fields: I) -> String
where
    I: IntoIterator<Item = (&'a String, &'a IdValue)>,
{
    let mut lines = Vec::new();
    for (key, value) in fields {
        lines.push(format!("{}={}", key, encode_value(value)));
    }
    lines.join("\n")
}

/// Decodes a record produced by [`encode_fields`] back into a map.
pub fn decode_fields(text: &str) -> Result<BTreeMap<String, IdValue>, RecordError> {
    let mut out = BTreeMap::new();
    for line in text.lines() {
        let line = line.trim();
        if line.is_empty() { continue; }
        let (key, raw_value) = line.split_once('=')
            .ok_or_else(|| RecordError::MalformedLine(line.to_string()))?;
        out.insert(key.to_string(), decode_value(raw_value)?);
    }
    Ok(out)
}

/// Encodes a [`Dataset`] as a record. The dataset type, path, and validity
/// flag are carried as reserved fields (`_type`, `_path`, `_valid`) ahead of
/// the identifier fields, so a record file is self-contained: it carries
/// everything needed to reconstruct the `Dataset` with [`dataset_from_record`].
pub fn dataset_to_record(ds: &Dataset) -> String {
    let mut lines = vec![
        format!("_type=s:{}", ds.dataset_type),
        format!("_valid=i:{}", if ds.valid { 1 } else { 0 }),
    ];
    if let Some(path) = &ds.path {
        lines.push(format!("_path=s:{}", path));
    }
    for (key, value) in &ds.ids {
        lines.push(format!("{}={}", key, encode_value(value)));
    }
    lines.join("\n")
}

/// Decodes a record produced by [`dataset_to_record`] back into a [`Dataset`].
pub fn dataset_from_record(text: &str) -> Result<Dataset, RecordError> {
    let mut dataset_type = None;
    let mut path = None;
    let mut valid = true;
    let mut ids = BTreeMap::new();

    for line in text.lines() {
        let line = line.trim();
        if line.is_empty() { continue; }
        let (key, raw_value) = line.split_once('=')
            .ok_or_else(|| RecordError::MalformedLine(line.to_string()))?;
        match key {
            "_type" => {
                if let IdValue::Str(s) = decode_value(raw_value)? { dataset_type = Some(s); }
            },
            "_path" => {
                if let IdValue::Str(s) = decode_value(raw_value)? { path = Some(s); }
            },
            "_valid" => {
                valid = matches!(decode_value(raw_value)?, IdValue::Int(1));
            },
            _ => { ids.insert(key.to_string(), decode_value(raw_value)?); },
        }
    }

    let dataset_type = dataset_type
        .ok_or_else(|| RecordError::MalformedLine("missing '_type' field".to_string()))?;
    Ok(Dataset { dataset_type, ids, path, valid })
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn value_round_trips_through_each_sigil() {
        for value in [IdValue::Int(7), IdValue::Float(3.5), IdValue::Str("x".into())] {
            let encoded = encode_value(&value);
            assert_eq!(decode_value(&encoded).unwrap(), value);
        }
    }

    #[test]
    fn dataset_round_trips() {
        let ds = Dataset::new("raw")
            .with_id("visit", 44291i64)
            .with_id("ccd", 12i64)
            .with_path("/data/raw/44291-12.fits");
        let text = dataset_to_record(&ds);
        let back = dataset_from_record(&text).unwrap();
        assert_eq!(ds, back);
    }

    #[test]
    fn invalid_dataset_round_trips_its_flag() {
        let mut ds = Dataset::new("raw").with_id("visit", 1i64);
        ds.valid = false;
        let back = dataset_from_record(&dataset_to_record(&ds)).unwrap();
        assert!(!back.valid);
    }

    #[test]
    fn malformed_line_is_rejected() {
        assert!(decode_fields("no-equals-sign").is_err());
    }

    #[test]
    fn unknown_sigil_is_rejected() {
        assert!(decode_value("x:1").is_err());
    }
}
