//! Scalar attribute types and values
//!
//! Supported types:
//! - boolean: 1 bit, bit-addressable
//! - integer(n): n ∈ {1, 2, 4, 8} bytes, signed, little-endian
//! - float / double: IEEE-754, 4 / 8 bytes
//! - char(n): fixed-width UTF-8, zero padded
//! - date / datetime: 4 / 8 byte signed integers
//!
//! Byte-sized types are aligned to their own width (char to one byte).

use std::cmp::Ordering;
use std::fmt;

use serde::{Deserialize, Serialize};

/// A scalar attribute type with a fixed physical width
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "type", content = "width", rename_all = "lowercase")]
pub enum Type {
    Boolean,
    /// Signed integer of the given byte width
    Integer(u8),
    Float,
    Double,
    /// Fixed-length character sequence of the given byte length
    Char(u32),
    Date,
    DateTime,
}

impl Type {
    /// Whether the type's parameters describe a representable type
    pub fn is_valid(&self) -> bool {
        match self {
            Type::Integer(width) => matches!(width, 1 | 2 | 4 | 8),
            Type::Char(len) => *len > 0,
            _ => true,
        }
    }

    /// Physical width of one value
    pub fn size_in_bits(&self) -> u64 {
        match self {
            Type::Boolean => 1,
            Type::Integer(width) => u64::from(*width) * 8,
            Type::Float | Type::Date => 32,
            Type::Double | Type::DateTime => 64,
            Type::Char(len) => u64::from(*len) * 8,
        }
    }

    /// Required alignment of a value, in bits
    pub fn alignment_in_bits(&self) -> u64 {
        match self {
            Type::Boolean => 1,
            Type::Char(_) => 8,
            other => other.size_in_bits(),
        }
    }

    /// Required alignment of a value, in bytes (at least 1)
    pub fn alignment(&self) -> u64 {
        (self.alignment_in_bits() / 8).max(1)
    }

    /// Whether values of this type are stored as signed integers
    pub fn is_integral(&self) -> bool {
        matches!(self, Type::Integer(_) | Type::Date | Type::DateTime)
    }

    /// Whether `value` can be stored in an attribute of this type
    pub fn accepts(&self, value: &Value) -> bool {
        match (self, value) {
            (Type::Boolean, Value::Bool(_)) => true,
            (t, Value::Int(_)) if t.is_integral() => true,
            (Type::Float, Value::Float(_)) => true,
            (Type::Double, Value::Double(_)) => true,
            (Type::Char(_), Value::Char(_)) => true,
            _ => false,
        }
    }
}

impl fmt::Display for Type {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Type::Boolean => write!(f, "BOOL"),
            Type::Integer(width) => write!(f, "INT({})", width),
            Type::Float => write!(f, "FLOAT"),
            Type::Double => write!(f, "DOUBLE"),
            Type::Char(len) => write!(f, "CHAR({})", len),
            Type::Date => write!(f, "DATE"),
            Type::DateTime => write!(f, "DATETIME"),
        }
    }
}

/// A single attribute value
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Value {
    Bool(bool),
    Int(i64),
    Float(f32),
    Double(f64),
    Char(String),
}

impl Value {
    /// Compare two values of compatible kinds.
    ///
    /// Numeric kinds compare across each other; anything else across kinds is
    /// incomparable.
    pub fn compare(&self, other: &Value) -> Option<Ordering> {
        match (self, other) {
            (Value::Bool(a), Value::Bool(b)) => Some(a.cmp(b)),
            (Value::Int(a), Value::Int(b)) => Some(a.cmp(b)),
            (Value::Char(a), Value::Char(b)) => Some(a.cmp(b)),
            (a, b) => a.as_f64()?.partial_cmp(&b.as_f64()?),
        }
    }

    fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Int(v) => Some(*v as f64),
            Value::Float(v) => Some(f64::from(*v)),
            Value::Double(v) => Some(*v),
            _ => None,
        }
    }

    /// Short kind name for error messages
    pub fn kind(&self) -> &'static str {
        match self {
            Value::Bool(_) => "bool",
            Value::Int(_) => "int",
            Value::Float(_) => "float",
            Value::Double(_) => "double",
            Value::Char(_) => "char",
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Bool(v) => write!(f, "{}", if *v { "TRUE" } else { "FALSE" }),
            Value::Int(v) => write!(f, "{}", v),
            Value::Float(v) => write!(f, "{}", v),
            Value::Double(v) => write!(f, "{}", v),
            Value::Char(v) => write!(f, "\"{}\"", v),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sizes() {
        assert_eq!(Type::Boolean.size_in_bits(), 1);
        assert_eq!(Type::Integer(4).size_in_bits(), 32);
        assert_eq!(Type::Double.size_in_bits(), 64);
        assert_eq!(Type::Char(50).size_in_bits(), 400);
        assert_eq!(Type::Date.size_in_bits(), 32);
    }

    #[test]
    fn test_alignment() {
        assert_eq!(Type::Boolean.alignment_in_bits(), 1);
        assert_eq!(Type::Boolean.alignment(), 1);
        assert_eq!(Type::Char(50).alignment(), 1);
        assert_eq!(Type::Integer(2).alignment(), 2);
        assert_eq!(Type::DateTime.alignment(), 8);
    }

    #[test]
    fn test_validity() {
        assert!(Type::Integer(8).is_valid());
        assert!(!Type::Integer(3).is_valid());
        assert!(!Type::Char(0).is_valid());
    }

    #[test]
    fn test_accepts() {
        assert!(Type::Date.accepts(&Value::Int(19_000)));
        assert!(Type::Integer(4).accepts(&Value::Int(-1)));
        assert!(!Type::Integer(4).accepts(&Value::Double(1.0)));
        assert!(!Type::Double.accepts(&Value::Float(1.0)));
        assert!(Type::Char(3).accepts(&Value::Char("abc".into())));
    }

    #[test]
    fn test_compare_numeric_kinds() {
        assert_eq!(Value::Int(3).compare(&Value::Double(2.5)), Some(Ordering::Greater));
        assert_eq!(Value::Float(1.5).compare(&Value::Double(1.5)), Some(Ordering::Equal));
        assert_eq!(Value::Int(1).compare(&Value::Char("1".into())), None);
    }

    #[test]
    fn test_type_serde_shape() {
        let json = serde_json::to_string(&Type::Integer(4)).unwrap();
        assert_eq!(json, r#"{"type":"integer","width":4}"#);
        let back: Type = serde_json::from_str(r#"{"type":"boolean"}"#).unwrap();
        assert_eq!(back, Type::Boolean);
    }
}
