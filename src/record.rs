use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::Error;

/// Declared type of a source column
///
/// Decided once per run from the [`Schema`]; the codec never inspects cell
/// contents to pick an attribute type.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ColumnKind {
    /// Decimal number, sent as a numeric attribute
    Number,
    /// UTF-8 text, sent as a string attribute (or decoded from base64 when flagged binary)
    Text,
    /// Raw bytes, sent as a binary attribute
    Binary,
}

impl fmt::Display for ColumnKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ColumnKind::Number => write!(f, "number"),
            ColumnKind::Text => write!(f, "text"),
            ColumnKind::Binary => write!(f, "binary"),
        }
    }
}

/// A named, typed column
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Column {
    /// Column name, also used as the attribute name for non-key columns
    pub name: String,
    /// Declared type
    pub kind: ColumnKind,
}

/// Ordered set of columns describing every record of a source
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Schema {
    columns: Vec<Column>,
}

impl Schema {
    /// Create a schema from columns
    pub fn new(columns: Vec<Column>) -> Self {
        Self { columns }
    }

    /// Append a column
    pub fn with_column(mut self, name: impl Into<String>, kind: ColumnKind) -> Self {
        self.columns.push(Column {
            name: name.into(),
            kind,
        });
        self
    }

    /// All columns in declaration order
    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    /// Position and definition of a column by name
    pub fn column(&self, name: &str) -> Option<(usize, &Column)> {
        self.columns
            .iter()
            .enumerate()
            .find(|(_, column)| column.name == name)
    }

    /// Number of columns
    pub fn len(&self) -> usize {
        self.columns.len()
    }

    /// Check if the schema has no columns
    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }
}

/// A single cell value
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum Value {
    /// Decimal number kept as text so no precision is lost
    Number(String),
    /// Text
    Text(String),
    /// Bytes
    Binary(Vec<u8>),
}

impl Value {
    /// Numeric value from anything that formats as a number
    pub fn number(n: impl fmt::Display) -> Self {
        Value::Number(n.to_string())
    }

    /// Text value
    pub fn text(s: impl Into<String>) -> Self {
        Value::Text(s.into())
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Text(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Text(s)
    }
}

impl From<i64> for Value {
    fn from(n: i64) -> Self {
        Value::number(n)
    }
}

impl From<f64> for Value {
    fn from(n: f64) -> Self {
        Value::number(n)
    }
}

impl From<Vec<u8>> for Value {
    fn from(bytes: Vec<u8>) -> Self {
        Value::Binary(bytes)
    }
}

/// One row from a tabular source, positionally aligned with its [`Schema`]
///
/// `None` cells are missing values. Cells past the end of the record are
/// treated as missing too.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Record {
    cells: Vec<Option<Value>>,
}

impl Record {
    /// Create a record from cells
    pub fn new(cells: Vec<Option<Value>>) -> Self {
        Self { cells }
    }

    /// Value at a column position, `None` when missing
    pub fn get(&self, index: usize) -> Option<&Value> {
        self.cells.get(index).and_then(Option::as_ref)
    }

    /// Number of cells
    pub fn len(&self) -> usize {
        self.cells.len()
    }

    /// Check if the record has no cells
    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }
}

impl FromIterator<Option<Value>> for Record {
    fn from_iter<I: IntoIterator<Item = Option<Value>>>(iter: I) -> Self {
        Self {
            cells: iter.into_iter().collect(),
        }
    }
}

/// Supplier of records for a run
///
/// A lazy, finite, single-pass sequence. Failures to read a record are yielded
/// in place of it and end the run.
pub trait RecordSource: Iterator<Item = Result<Record, Error>> {
    /// Columns available in every record
    fn schema(&self) -> &Schema;
}

impl<S> RecordSource for &mut S
where
    S: RecordSource + ?Sized,
{
    fn schema(&self) -> &Schema {
        (**self).schema()
    }
}

/// In-memory record source
#[derive(Debug)]
pub struct VecSource {
    schema: Schema,
    records: std::vec::IntoIter<Record>,
}

impl VecSource {
    /// Create a source yielding the given records in order
    pub fn new(schema: Schema, records: Vec<Record>) -> Self {
        Self {
            schema,
            records: records.into_iter(),
        }
    }
}

impl Iterator for VecSource {
    type Item = Result<Record, Error>;

    fn next(&mut self) -> Option<Self::Item> {
        self.records.next().map(Ok)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.records.size_hint()
    }
}

impl RecordSource for VecSource {
    fn schema(&self) -> &Schema {
        &self.schema
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_schema_lookup() {
        let schema = Schema::default()
            .with_column("id", ColumnKind::Text)
            .with_column("age", ColumnKind::Number);

        let (index, column) = schema.column("age").unwrap();
        assert_eq!(index, 1);
        assert_eq!(column.kind, ColumnKind::Number);
        assert!(schema.column("missing").is_none());
        assert_eq!(schema.len(), 2);
    }

    #[test]
    fn test_record_missing_cells() {
        let record: Record = vec![Some(Value::from("a")), None].into_iter().collect();
        assert_eq!(record.get(0), Some(&Value::Text("a".to_string())));
        assert_eq!(record.get(1), None);
        assert_eq!(record.get(5), None);
    }

    #[test]
    fn test_number_keeps_text() {
        assert_eq!(Value::from(42i64), Value::Number("42".to_string()));
        assert_eq!(Value::from(2.5f64), Value::Number("2.5".to_string()));
    }

    #[test]
    fn test_vec_source_order() {
        let schema = Schema::default().with_column("id", ColumnKind::Number);
        let records = (0..3)
            .map(|i| Record::new(vec![Some(Value::from(i as i64))]))
            .collect::<Vec<_>>();
        let source = VecSource::new(schema, records.clone());

        let read: Vec<Record> = source.map(|r| r.unwrap()).collect();
        assert_eq!(read, records);
    }
}
