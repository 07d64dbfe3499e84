//! Identifier types for COCO records.
//!
//! Licenses and categories are keyed by integers. Images and annotations
//! accept integer, float or string ids, so they use [`RecordId`], which keeps
//! the original JSON form for re-serialization while comparing `1` and `1.0`
//! as the same key.

use serde::{Serialize, Serializer};
use serde_json::Value;
use std::fmt;
use std::hash::{Hash, Hasher};

/// A unique identifier for a license in the dataset.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(transparent)]
pub struct LicenseId(pub i64);

impl LicenseId {
    /// Creates a new LicenseId.
    #[inline]
    pub fn new(id: i64) -> Self {
        Self(id)
    }

    /// Returns the underlying value.
    #[inline]
    pub fn as_i64(&self) -> i64 {
        self.0
    }
}

impl fmt::Debug for LicenseId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "LicenseId({})", self.0)
    }
}

impl fmt::Display for LicenseId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<i64> for LicenseId {
    fn from(id: i64) -> Self {
        Self(id)
    }
}

/// A unique identifier for a category in the dataset.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(transparent)]
pub struct CategoryId(pub i64);

impl CategoryId {
    /// Creates a new CategoryId.
    #[inline]
    pub fn new(id: i64) -> Self {
        Self(id)
    }

    /// Returns the underlying value.
    #[inline]
    pub fn as_i64(&self) -> i64 {
        self.0
    }
}

impl fmt::Debug for CategoryId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "CategoryId({})", self.0)
    }
}

impl fmt::Display for CategoryId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<i64> for CategoryId {
    fn from(id: i64) -> Self {
        Self(id)
    }
}

/// An image or annotation id: integer, float or string.
#[derive(Clone, Debug)]
pub enum RecordId {
    Int(i64),
    /// Integers above `i64::MAX`.
    UInt(u64),
    Float(f64),
    Str(String),
}

/// The comparison key of a [`RecordId`]. Integral floats collapse onto the
/// matching integer.
#[derive(PartialEq, Eq, Hash)]
enum IdKey<'a> {
    Int(i64),
    UInt(u64),
    Float(u64),
    Str(&'a str),
}

impl RecordId {
    /// Reads an id from JSON. Returns `None` for anything other than a
    /// finite number or a string.
    pub fn from_value(value: &Value) -> Option<Self> {
        match value {
            Value::Number(n) => {
                if let Some(i) = n.as_i64() {
                    Some(RecordId::Int(i))
                } else if let Some(u) = n.as_u64() {
                    Some(RecordId::UInt(u))
                } else {
                    n.as_f64().filter(|f| f.is_finite()).map(RecordId::Float)
                }
            }
            Value::String(s) => Some(RecordId::Str(s.clone())),
            _ => None,
        }
    }

    fn key(&self) -> IdKey<'_> {
        match self {
            RecordId::Int(i) => IdKey::Int(*i),
            RecordId::UInt(u) => IdKey::UInt(*u),
            RecordId::Float(f) => {
                if f.fract() == 0.0 && *f >= i64::MIN as f64 && *f < i64::MAX as f64 {
                    IdKey::Int(*f as i64)
                } else {
                    IdKey::Float(f.to_bits())
                }
            }
            RecordId::Str(s) => IdKey::Str(s),
        }
    }
}

impl PartialEq for RecordId {
    fn eq(&self, other: &Self) -> bool {
        self.key() == other.key()
    }
}

impl Eq for RecordId {}

impl Hash for RecordId {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.key().hash(state);
    }
}

impl fmt::Display for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RecordId::Int(i) => write!(f, "{}", i),
            RecordId::UInt(u) => write!(f, "{}", u),
            RecordId::Float(x) => write!(f, "{}", x),
            RecordId::Str(s) => write!(f, "{}", s),
        }
    }
}

impl Serialize for RecordId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            RecordId::Int(i) => serializer.serialize_i64(*i),
            RecordId::UInt(u) => serializer.serialize_u64(*u),
            RecordId::Float(x) => serializer.serialize_f64(*x),
            RecordId::Str(s) => serializer.serialize_str(s),
        }
    }
}

impl From<i64> for RecordId {
    fn from(id: i64) -> Self {
        RecordId::Int(id)
    }
}

impl From<&str> for RecordId {
    fn from(id: &str) -> Self {
        RecordId::Str(id.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::collections::HashSet;

    #[test]
    fn test_id_ordering() {
        assert!(CategoryId(1) < CategoryId(2));
        assert!(LicenseId(10) > LicenseId(5));
    }

    #[test]
    fn test_record_id_from_value() {
        assert_eq!(RecordId::from_value(&json!(3)), Some(RecordId::Int(3)));
        assert_eq!(RecordId::from_value(&json!("a")), Some(RecordId::from("a")));
        assert!(matches!(
            RecordId::from_value(&json!(1.5)),
            Some(RecordId::Float(_))
        ));
        assert_eq!(RecordId::from_value(&json!(true)), None);
        assert_eq!(RecordId::from_value(&json!(null)), None);
    }

    #[test]
    fn test_integral_float_matches_int() {
        assert_eq!(RecordId::Float(1.0), RecordId::Int(1));
        assert_ne!(RecordId::Float(1.5), RecordId::Int(1));
        assert_ne!(RecordId::from("1"), RecordId::Int(1));

        let mut set = HashSet::new();
        set.insert(RecordId::Int(1));
        set.insert(RecordId::Float(1.0));
        set.insert(RecordId::from("1"));
        assert_eq!(set.len(), 2);
    }

    #[test]
    fn test_large_unsigned_ids_stay_distinct() {
        let a = RecordId::from_value(&json!(18446744073709551614u64)).unwrap();
        let b = RecordId::from_value(&json!(18446744073709551615u64)).unwrap();
        assert_eq!(a, RecordId::UInt(18446744073709551614));
        assert_ne!(a, b);
        assert_eq!(b.to_string(), "18446744073709551615");
        assert_eq!(serde_json::to_value(&b).unwrap(), json!(18446744073709551615u64));
    }

    #[test]
    fn test_record_id_keeps_json_form() {
        let ids = vec![RecordId::Int(1), RecordId::Float(2.5), RecordId::from("x")];
        let json = serde_json::to_value(&ids).unwrap();
        assert_eq!(json, json!([1, 2.5, "x"]));
    }
}
