//  ID_VALUE.rs
//    by Ray Plante
//
//  Description:
//!   Defines the scalar value type used for dataset identifiers.

use std::cmp::Ordering;
use std::fmt::{Display, Formatter, Result as FResult};

use enum_debug::EnumDebug;
use serde::{Deserialize, Serialize};


/***** LIBRARY *****/
/// The value of a single dataset identifier (e.g. the `44291` in `visit=44291`).
///
/// Equality is variant-sensitive: `Int(3)` is not equal to `Float(3.0)` or `Str("3")`.
/// This mirrors the untyped-but-variant-sensitive comparison of the system this was
/// distilled from, and keeps `Dataset` equality a pure structural comparison with no
/// implicit coercion between the scalar kinds.
#[derive(Clone, Debug, Deserialize, EnumDebug, Serialize)]
#[serde(untagged)]
pub enum IdValue {
    Int(i64),
    Float(f64),
    Str(String),
}

impl IdValue {
    /// Attempts to coerce this value to an `i64`, the way an `Integer` ID filter does
    /// when it receives a `Str` or `Float` identifier.
    ///
    /// # Returns
    /// `Some(i64)` if the value is already an integer, or a string/float that parses
    /// cleanly as one; `None` otherwise.
    pub fn as_int(&self) -> Option<i64> {
        match self {
            Self::Int(i) => Some(*i),
            Self::Float(f) if f.fract() == 0.0 => Some(*f as i64),
            Self::Str(s) => s.parse().ok(),
        }
    }

    /// Coerces this value to its string form, the way a `String` ID filter does.
    pub fn as_str_value(&self) -> String { self.to_string() }
}

impl Display for IdValue {
    fn fmt(&self, f: &mut Formatter<'_>) -> FResult {
        match self {
            Self::Int(i)   => write!(f, "{}", i),
            Self::Float(v) => write!(f, "{}", v),
            Self::Str(s)   => write!(f, "{}", s),
        }
    }
}

impl PartialEq for IdValue {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Int(a), Self::Int(b))     => a == b,
            (Self::Float(a), Self::Float(b)) => a == b,
            (Self::Str(a), Self::Str(b))     => a == b,
            _ => false,
        }
    }
}
impl Eq for IdValue {}

impl PartialOrd for IdValue {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> { Some(self.cmp(other)) }
}
impl Ord for IdValue {
    /// Orders values so cartesian-product enumerations over a mix of variants are
    /// still deterministic: `Int < Float < Str` as a tie-break across variants,
    /// natural order within a variant.
    fn cmp(&self, other: &Self) -> Ordering {
        match (self, other) {
            (Self::Int(a), Self::Int(b))     => a.cmp(b),
            (Self::Float(a), Self::Float(b)) => a.partial_cmp(b).unwrap_or(Ordering::Equal),
            (Self::Str(a), Self::Str(b))     => a.cmp(b),

            (Self::Int(_), _)   => Ordering::Less,
            (_, Self::Int(_))   => Ordering::Greater,
            (Self::Float(_), _) => Ordering::Less,
            (_, Self::Float(_)) => Ordering::Greater,
        }
    }
}

impl From<i64> for IdValue {
    #[inline]
    fn from(v: i64) -> Self { Self::Int(v) }
}
impl From<f64> for IdValue {
    #[inline]
    fn from(v: f64) -> Self { Self::Float(v) }
}
impl From<String> for IdValue {
    #[inline]
    fn from(v: String) -> Self { Self::Str(v) }
}
impl From<&str> for IdValue {
    #[inline]
    fn from(v: &str) -> Self { Self::Str(v.into()) }
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn equality_is_variant_sensitive() {
        assert_ne!(IdValue::Int(3), IdValue::Float(3.0));
        assert_ne!(IdValue::Int(3), IdValue::Str("3".into()));
        assert_eq!(IdValue::Int(3), IdValue::Int(3));
    }

    #[test]
    fn as_int_coerces_strings_and_whole_floats() {
        assert_eq!(IdValue::Str("42".into()).as_int(), Some(42));
        assert_eq!(IdValue::Float(42.0).as_int(), Some(42));
        assert_eq!(IdValue::Float(42.5).as_int(), None);
        assert_eq!(IdValue::Str("nope".into()).as_int(), None);
    }

    #[test]
    fn ordering_ties_break_by_variant() {
        let mut vals = vec![IdValue::Str("a".into()), IdValue::Int(9), IdValue::Float(1.0)];
        vals.sort();
        assert_eq!(vals, vec![IdValue::Int(9), IdValue::Float(1.0), IdValue::Str("a".into())]);
    }
}
