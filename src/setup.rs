use serde::Deserialize;

use crate::codec::{KeyColumn, KeySpec};
use crate::error::Error;
use crate::record::{ColumnKind, Schema};

/// Scalar type of a key attribute
#[derive(Clone, Copy, Debug, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum KeyAttributeKind {
    /// String key
    String,
    /// Numeric key
    Number,
    /// Binary key
    Binary,
}

/// Name and type of a key attribute
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct KeyAttribute {
    /// Attribute name in the table
    pub name: String,
    /// Scalar type
    pub kind: KeyAttributeKind,
}

/// Provisioned read and write capacity
#[derive(Clone, Copy, Debug, PartialEq, Eq, Deserialize)]
pub struct Throughput {
    /// Read capacity units
    pub read_capacity_units: i64,
    /// Write capacity units
    pub write_capacity_units: i64,
}

/// Table to create: name, primary key and capacity mode
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TableDefinition {
    /// Table name
    pub name: String,
    /// Hash key attribute
    pub hash: KeyAttribute,
    /// Range key attribute
    pub range: Option<KeyAttribute>,
    /// Provisioned capacity; `None` creates an on-demand table
    pub throughput: Option<Throughput>,
}

impl TableDefinition {
    /// Derive a table definition from the key spec of a load
    ///
    /// Key attribute names follow the key columns' attribute names, and key
    /// types follow the schema: number columns become numeric keys,
    /// binary-flagged and binary columns become binary keys, everything else a
    /// string key. Tables are created with 10/10 provisioned capacity.
    pub fn for_key_spec(name: &str, key_spec: &KeySpec, schema: &Schema) -> Result<Self, Error> {
        let key_attribute = |key: &KeyColumn| -> Result<KeyAttribute, Error> {
            let (_, column) = schema.column(&key.column).ok_or_else(|| {
                Error::Configuration(format!(
                    "key column '{}' is not in the record schema",
                    key.column
                ))
            })?;

            let kind = match column.kind {
                _ if key.binary => KeyAttributeKind::Binary,
                ColumnKind::Number => KeyAttributeKind::Number,
                ColumnKind::Text => KeyAttributeKind::String,
                ColumnKind::Binary => KeyAttributeKind::Binary,
            };

            Ok(KeyAttribute {
                name: key.attribute_name().to_string(),
                kind,
            })
        };

        Ok(Self {
            name: name.to_string(),
            hash: key_attribute(&key_spec.hash)?,
            range: key_spec.range.as_ref().map(key_attribute).transpose()?,
            throughput: Some(Throughput {
                read_capacity_units: 10,
                write_capacity_units: 10,
            }),
        })
    }

    /// Create the table on demand instead of with provisioned capacity
    pub fn on_demand(mut self) -> Self {
        self.throughput = None;
        self
    }
}
