use std::fmt;

/// Field types that can be stored in a fixed-length record.
/// Every type has a fixed on-page width.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DataType {
    /// Boolean type: 1 byte (0 = false, 1 = true)
    Boolean,

    /// 8-bit signed integer: 1 byte
    TinyInt,

    /// 16-bit signed integer: 2 bytes, big-endian
    SmallInt,

    /// 32-bit signed integer: 4 bytes, big-endian
    Integer,

    /// 64-bit signed integer: 8 bytes, big-endian
    BigInt,

    /// 32-bit floating point: 4 bytes, IEEE 754
    Float,

    /// 64-bit floating point: 8 bytes, IEEE 754
    Double,

    /// Fixed-length character string: exactly n bytes, NUL-padded
    Char(u16),

    /// Timestamp: 8 bytes, microseconds since Unix epoch
    Timestamp,
}

impl DataType {
    /// Returns the width of this type in bytes.
    pub fn size(&self) -> usize {
        match self {
            DataType::Boolean => 1,
            DataType::TinyInt => 1,
            DataType::SmallInt => 2,
            DataType::Integer => 4,
            DataType::BigInt => 8,
            DataType::Float => 4,
            DataType::Double => 8,
            DataType::Char(n) => *n as usize,
            DataType::Timestamp => 8,
        }
    }
}

impl fmt::Display for DataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DataType::Boolean => write!(f, "BOOLEAN"),
            DataType::TinyInt => write!(f, "TINYINT"),
            DataType::SmallInt => write!(f, "SMALLINT"),
            DataType::Integer => write!(f, "INTEGER"),
            DataType::BigInt => write!(f, "BIGINT"),
            DataType::Float => write!(f, "FLOAT"),
            DataType::Double => write!(f, "DOUBLE"),
            DataType::Char(n) => write!(f, "CHAR({})", n),
            DataType::Timestamp => write!(f, "TIMESTAMP"),
        }
    }
}
