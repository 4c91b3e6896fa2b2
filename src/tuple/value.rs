use std::fmt;

use super::DataType;

/// A typed field value held by a tuple.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Boolean(bool),
    TinyInt(i8),
    SmallInt(i16),
    Integer(i32),
    BigInt(i64),
    Float(f32),
    Double(f64),
    /// String value stored in a Char(n) column
    String(String),
    /// Timestamp value (microseconds since Unix epoch)
    Timestamp(i64),
}

impl Value {
    /// Returns true if this value can be stored in a column of the given type.
    pub fn matches(&self, data_type: &DataType) -> bool {
        match (self, data_type) {
            (Value::String(s), DataType::Char(n)) => fits_char(s, *n),
            (Value::Boolean(_), DataType::Boolean)
            | (Value::TinyInt(_), DataType::TinyInt)
            | (Value::SmallInt(_), DataType::SmallInt)
            | (Value::Integer(_), DataType::Integer)
            | (Value::BigInt(_), DataType::BigInt)
            | (Value::Float(_), DataType::Float)
            | (Value::Double(_), DataType::Double)
            | (Value::Timestamp(_), DataType::Timestamp) => true,
            _ => false,
        }
    }

    /// Appends the on-page encoding of this value to `out`.
    /// Returns false if the value is incompatible with the type.
    pub fn serialize_into(&self, data_type: &DataType, out: &mut Vec<u8>) -> bool {
        match (self, data_type) {
            (Value::Boolean(b), DataType::Boolean) => out.push(u8::from(*b)),
            (Value::TinyInt(v), DataType::TinyInt) => out.extend_from_slice(&v.to_be_bytes()),
            (Value::SmallInt(v), DataType::SmallInt) => out.extend_from_slice(&v.to_be_bytes()),
            (Value::Integer(v), DataType::Integer) => out.extend_from_slice(&v.to_be_bytes()),
            (Value::BigInt(v), DataType::BigInt) => out.extend_from_slice(&v.to_be_bytes()),
            (Value::Float(v), DataType::Float) => out.extend_from_slice(&v.to_be_bytes()),
            (Value::Double(v), DataType::Double) => out.extend_from_slice(&v.to_be_bytes()),
            (Value::Timestamp(v), DataType::Timestamp) => out.extend_from_slice(&v.to_be_bytes()),
            (Value::String(s), DataType::Char(n)) => {
                if !fits_char(s, *n) {
                    return false;
                }
                let bytes = s.as_bytes();
                out.extend_from_slice(bytes);
                out.resize(out.len() + (*n as usize - bytes.len()), 0);
            }
            _ => return false,
        }
        true
    }

    /// Decodes a value of the given type from the front of `data`.
    pub fn deserialize(data: &[u8], data_type: &DataType) -> Option<Self> {
        let bytes = data.get(..data_type.size())?;
        let value = match data_type {
            DataType::Boolean => Value::Boolean(bytes[0] != 0),
            DataType::TinyInt => Value::TinyInt(bytes[0] as i8),
            DataType::SmallInt => Value::SmallInt(i16::from_be_bytes(bytes.try_into().ok()?)),
            DataType::Integer => Value::Integer(i32::from_be_bytes(bytes.try_into().ok()?)),
            DataType::BigInt => Value::BigInt(i64::from_be_bytes(bytes.try_into().ok()?)),
            DataType::Float => Value::Float(f32::from_be_bytes(bytes.try_into().ok()?)),
            DataType::Double => Value::Double(f64::from_be_bytes(bytes.try_into().ok()?)),
            DataType::Timestamp => Value::Timestamp(i64::from_be_bytes(bytes.try_into().ok()?)),
            DataType::Char(_) => {
                let len = bytes.iter().rposition(|&b| b != 0).map_or(0, |last| last + 1);
                Value::String(String::from_utf8_lossy(&bytes[..len]).into_owned())
            }
        };
        Some(value)
    }
}

/// A Char(n) value is NUL-padded on the page, so a trailing NUL cannot be stored.
fn fits_char(s: &str, n: u16) -> bool {
    s.len() <= n as usize && !s.ends_with('\0')
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Boolean(b) => write!(f, "{}", b),
            Value::TinyInt(v) => write!(f, "{}", v),
            Value::SmallInt(v) => write!(f, "{}", v),
            Value::Integer(v) => write!(f, "{}", v),
            Value::BigInt(v) => write!(f, "{}", v),
            Value::Float(v) => write!(f, "{}", v),
            Value::Double(v) => write!(f, "{}", v),
            Value::String(s) => write!(f, "{}", s),
            Value::Timestamp(v) => write!(f, "TIMESTAMP({})", v),
        }
    }
}

// Convenience conversions
impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Boolean(v)
    }
}

impl From<i8> for Value {
    fn from(v: i8) -> Self {
        Value::TinyInt(v)
    }
}

impl From<i16> for Value {
    fn from(v: i16) -> Self {
        Value::SmallInt(v)
    }
}

impl From<i32> for Value {
    fn from(v: i32) -> Self {
        Value::Integer(v)
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::BigInt(v)
    }
}

impl From<f32> for Value {
    fn from(v: f32) -> Self {
        Value::Float(v)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Double(v)
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::String(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::String(v.to_string())
    }
}
