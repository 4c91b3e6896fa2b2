use std::fmt;
use std::sync::Arc;

use crate::common::RecordId;

use super::{Schema, Value};

/// Represents a single fixed-length record.
///
/// A tuple holds one value per column of its schema and, once stored, the
/// location it was stored at.
///
/// ## Tuple Binary Format
///
/// ```text
/// +-----------+-----------+-----+-----------+
/// | Field 0   | Field 1   | ... | Field N-1 |
/// +-----------+-----------+-----+-----------+
/// ```
///
/// Fields are written in schema order, each taking exactly the width of its
/// column type, so every tuple of a schema has the same size.
#[derive(Debug, Clone)]
pub struct Tuple {
    /// The schema defining the structure of this tuple
    schema: Arc<Schema>,

    /// The values for each column (in schema order)
    values: Vec<Value>,

    /// Where this tuple is stored, if anywhere
    record_id: Option<RecordId>,
}

impl Tuple {
    /// Creates a new tuple with the given schema and values.
    ///
    /// # Panics
    /// Panics if the number of values doesn't match the schema column count.
    pub fn new(schema: Arc<Schema>, values: Vec<Value>) -> Self {
        assert_eq!(
            values.len(),
            schema.column_count(),
            "Value count must match schema column count"
        );
        Self {
            schema,
            values,
            record_id: None,
        }
    }

    /// Creates a tuple from raw bytes using the given schema.
    pub fn from_bytes(schema: Arc<Schema>, data: &[u8]) -> Option<Self> {
        if data.len() < schema.record_size() {
            return None;
        }

        let mut values = Vec::with_capacity(schema.column_count());
        let mut offset = 0;
        for col in schema.columns() {
            values.push(Value::deserialize(&data[offset..], col.data_type())?);
            offset += col.size();
        }

        Some(Self {
            schema,
            values,
            record_id: None,
        })
    }

    /// Returns the schema of this tuple.
    pub fn schema(&self) -> &Arc<Schema> {
        &self.schema
    }

    /// Returns the value at the given column index.
    pub fn value(&self, index: usize) -> Option<&Value> {
        self.values.get(index)
    }

    /// Returns all values in this tuple.
    pub fn values(&self) -> &[Value] {
        &self.values
    }

    /// Returns the number of columns/values in this tuple.
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Returns true if this tuple has no columns.
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Returns where this tuple is stored.
    pub fn record_id(&self) -> Option<RecordId> {
        self.record_id
    }

    pub fn set_record_id(&mut self, record_id: Option<RecordId>) {
        self.record_id = record_id;
    }

    /// Returns true if every value fits its column type.
    pub fn conforms(&self) -> bool {
        self.schema
            .columns()
            .zip(&self.values)
            .all(|(col, value)| value.matches(col.data_type()))
    }

    /// Serializes the tuple to exactly `schema.record_size()` bytes.
    /// Returns None if a value does not match its column type.
    pub fn to_bytes(&self) -> Option<Vec<u8>> {
        let mut bytes = Vec::with_capacity(self.schema.record_size());
        for (col, value) in self.schema.columns().zip(&self.values) {
            if !value.serialize_into(col.data_type(), &mut bytes) {
                return None;
            }
        }
        Some(bytes)
    }
}

impl PartialEq for Tuple {
    fn eq(&self, other: &Self) -> bool {
        self.schema == other.schema && self.values == other.values
    }
}

impl fmt::Display for Tuple {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parts: Vec<String> = self.values.iter().map(|v| v.to_string()).collect();
        write!(f, "{}", parts.join("\t"))
    }
}

/// Builder for constructing tuples fluently.
pub struct TupleBuilder {
    schema: Arc<Schema>,
    values: Vec<Value>,
}

impl TupleBuilder {
    /// Creates a new tuple builder for the given schema.
    pub fn new(schema: Arc<Schema>) -> Self {
        let count = schema.column_count();
        Self {
            schema,
            values: Vec::with_capacity(count),
        }
    }

    /// Sets the value at the next position.
    pub fn value(mut self, value: impl Into<Value>) -> Self {
        self.values.push(value.into());
        self
    }

    /// Builds the tuple.
    pub fn build(self) -> Tuple {
        Tuple::new(self.schema, self.values)
    }
}
