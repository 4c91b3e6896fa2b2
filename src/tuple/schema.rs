use std::fmt;
use std::sync::Arc;

use super::DataType;

/// Represents a single column in a record schema.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Column {
    /// Column name (may be empty)
    name: String,

    /// Column data type
    data_type: DataType,

    /// Column position in the schema (0-indexed)
    ordinal: usize,
}

impl Column {
    /// Creates a new column definition.
    pub fn new(name: impl Into<String>, data_type: DataType) -> Self {
        Self {
            name: name.into(),
            data_type,
            ordinal: 0, // Will be set by Schema
        }
    }

    /// Returns the column name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the column data type.
    pub fn data_type(&self) -> &DataType {
        &self.data_type
    }

    /// Returns the column's ordinal position in the schema.
    pub fn ordinal(&self) -> usize {
        self.ordinal
    }

    /// Returns the number of bytes this column occupies in a record.
    pub fn size(&self) -> usize {
        self.data_type.size()
    }
}

/// Describes the fixed-length records stored on a page.
///
/// Two schemas are equal when they have the same column types in the same
/// order; column names are not compared.
#[derive(Debug, Clone)]
pub struct Schema {
    /// Ordered list of columns
    columns: Vec<Column>,

    /// Total width of a record in bytes
    record_size: usize,
}

impl Schema {
    /// Creates a new schema from a list of columns.
    pub fn new(columns: Vec<Column>) -> Self {
        let mut columns = columns;
        let mut record_size = 0;

        for (i, col) in columns.iter_mut().enumerate() {
            col.ordinal = i;
            record_size += col.size();
        }

        Self {
            columns,
            record_size,
        }
    }

    /// Creates a schema builder for fluent construction.
    pub fn builder() -> SchemaBuilder {
        SchemaBuilder::new()
    }

    /// Returns the number of columns in the schema.
    pub fn column_count(&self) -> usize {
        self.columns.len()
    }

    /// Returns the column at the given index.
    pub fn column(&self, index: usize) -> Option<&Column> {
        self.columns.get(index)
    }

    /// Returns an iterator over all columns.
    pub fn columns(&self) -> impl Iterator<Item = &Column> {
        self.columns.iter()
    }

    /// Returns the size in bytes of one record.
    pub fn record_size(&self) -> usize {
        self.record_size
    }
}

impl PartialEq for Schema {
    fn eq(&self, other: &Self) -> bool {
        self.columns.len() == other.columns.len()
            && self
                .columns
                .iter()
                .zip(&other.columns)
                .all(|(a, b)| a.data_type == b.data_type)
    }
}

impl Eq for Schema {}

impl fmt::Display for Schema {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parts: Vec<String> = self
            .columns
            .iter()
            .map(|c| format!("{}({})", c.name, c.data_type))
            .collect();
        write!(f, "{}", parts.join(", "))
    }
}

/// Builder for constructing schemas fluently.
pub struct SchemaBuilder {
    columns: Vec<Column>,
}

impl SchemaBuilder {
    /// Creates a new schema builder.
    pub fn new() -> Self {
        Self {
            columns: Vec::new(),
        }
    }

    /// Adds a column.
    pub fn column(mut self, name: impl Into<String>, data_type: DataType) -> Self {
        self.columns.push(Column::new(name, data_type));
        self
    }

    /// Builds the schema.
    pub fn build(self) -> Schema {
        Schema::new(self.columns)
    }

    /// Builds the schema wrapped in an Arc for shared ownership.
    pub fn build_arc(self) -> Arc<Schema> {
        Arc::new(self.build())
    }
}

impl Default for SchemaBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn create_test_schema() -> Schema {
        Schema::builder()
            .column("id", DataType::Integer)
            .column("name", DataType::Char(16))
            .column("age", DataType::SmallInt)
            .build()
    }

    #[test]
    fn test_schema_creation() {
        let schema = create_test_schema();

        assert_eq!(schema.column_count(), 3);
        assert_eq!(schema.column(0).unwrap().name(), "id");
        assert_eq!(schema.column(1).unwrap().name(), "name");
        assert_eq!(schema.column(2).unwrap().name(), "age");
        assert!(schema.column(3).is_none());
    }

    #[test]
    fn test_record_size() {
        // id (4) + name (16) + age (2)
        assert_eq!(create_test_schema().record_size(), 22);
    }

    #[test]
    fn test_duplicate_names_keep_their_ordinals() {
        let schema = Schema::builder()
            .column("a", DataType::Integer)
            .column("a", DataType::BigInt)
            .build();

        assert_eq!(schema.column(1).map(|c| *c.data_type()), Some(DataType::BigInt));
        for (i, col) in schema.columns().enumerate() {
            assert_eq!(col.ordinal(), i);
        }
    }

    #[test]
    fn test_equality_ignores_names() {
        let a = Schema::builder()
            .column("x", DataType::Integer)
            .column("y", DataType::Char(4))
            .build();
        let b = Schema::builder()
            .column("p", DataType::Integer)
            .column("q", DataType::Char(4))
            .build();
        let c = Schema::builder()
            .column("x", DataType::Integer)
            .column("y", DataType::Char(5))
            .build();

        assert_eq!(a, b);
        assert_ne!(a, c);
    }

    #[test]
    fn test_display() {
        let schema = create_test_schema();
        assert_eq!(
            schema.to_string(),
            "id(INTEGER), name(CHAR(16)), age(SMALLINT)"
        );
    }
}
