//! Record to attribute-map encoding
//!
//! A [`Codec`] is built once per run from the record [`Schema`] and the
//! [`KeySpec`]. Building it fixes, for every column, which attribute it lands in
//! and how its cells are encoded, so encoding a record is a straight walk over
//! that plan.

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use serde::Deserialize;
use std::collections::HashMap;

use crate::batch::{Batch, Operation};
use crate::error::Error;
use crate::record::{ColumnKind, Record, Schema, Value};

/// Typed attribute value understood by every bulk store
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum AttributeValue {
    /// Number, as decimal text
    N(String),
    /// String
    S(String),
    /// Bytes
    B(Vec<u8>),
}

/// Attribute map: a write item or a delete key
pub type Item = HashMap<String, AttributeValue>;

/// A column used as part of the primary key
#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
pub struct KeyColumn {
    /// Source column supplying the value
    pub column: String,
    /// Attribute name in the store; defaults to the column name
    #[serde(default)]
    pub attribute: Option<String>,
    /// Treat the column text as base64 and send the decoded bytes
    #[serde(default)]
    pub binary: bool,
}

impl KeyColumn {
    /// Key column stored under its own name
    pub fn new(column: impl Into<String>) -> Self {
        Self {
            column: column.into(),
            attribute: None,
            binary: false,
        }
    }

    /// Flag the column as base64 encoded
    pub fn binary(mut self) -> Self {
        self.binary = true;
        self
    }

    /// Store the key under a different attribute name
    pub fn renamed(mut self, attribute: impl Into<String>) -> Self {
        self.attribute = Some(attribute.into());
        self
    }

    /// Attribute name the key is stored under
    pub fn attribute_name(&self) -> &str {
        self.attribute.as_deref().unwrap_or(&self.column)
    }
}

/// Primary key layout: a mandatory hash key and an optional range key
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct KeySpec {
    /// Hash (partition) key
    pub hash: KeyColumn,
    /// Range (sort) key. When configured every record must supply it
    pub range: Option<KeyColumn>,
}

impl KeySpec {
    /// Key spec with only a hash key
    pub fn hash(hash: KeyColumn) -> Self {
        Self { hash, range: None }
    }

    /// Add a range key
    pub fn with_range(mut self, range: KeyColumn) -> Self {
        self.range = Some(range);
        self
    }

    fn is_key_column(&self, column: &str) -> bool {
        self.hash.column == column || self.range.as_ref().is_some_and(|r| r.column == column)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Encoding {
    Number,
    Text,
    Base64,
    Binary,
}

#[derive(Clone, Debug)]
struct Slot {
    column: String,
    attribute: String,
    // None when the column is not in the schema; only possible for keys
    index: Option<usize>,
    encoding: Encoding,
}

impl Slot {
    fn encode(&self, record_index: usize, value: &Value) -> Result<AttributeValue, Error> {
        match (self.encoding, value) {
            (Encoding::Number, Value::Number(n)) => Ok(AttributeValue::N(n.clone())),
            (Encoding::Text, Value::Text(s)) => Ok(AttributeValue::S(s.clone())),
            (Encoding::Base64, Value::Text(s)) => STANDARD
                .decode(s)
                .map(AttributeValue::B)
                .map_err(|e| Error::MalformedBinary {
                    column: self.column.clone(),
                    record: record_index,
                    reason: e.to_string(),
                }),
            (Encoding::Binary, Value::Binary(bytes)) => Ok(AttributeValue::B(bytes.clone())),
            (encoding, _) => Err(Error::TypeMismatch {
                column: self.column.clone(),
                record: record_index,
                expected: match encoding {
                    Encoding::Number => ColumnKind::Number,
                    Encoding::Text | Encoding::Base64 => ColumnKind::Text,
                    Encoding::Binary => ColumnKind::Binary,
                },
            }),
        }
    }

    fn encode_key(&self, record_index: usize, record: &Record) -> Result<AttributeValue, Error> {
        let value = self
            .index
            .and_then(|index| record.get(index))
            .ok_or_else(|| Error::MissingKey {
                column: self.column.clone(),
                record: record_index,
            })?;

        self.encode(record_index, value)
    }
}

/// Encoder from records to store items, planned once from the schema
#[derive(Clone, Debug)]
pub struct Codec {
    hash: Slot,
    range: Option<Slot>,
    attributes: Vec<Slot>,
}

impl Codec {
    /// Plan the encoding of records described by `schema`
    ///
    /// `binary_columns` names non-key text columns holding base64 payloads.
    ///
    /// Fails with [`Error::Configuration`] when a binary-flagged column is not a
    /// text column, or when a binary column is not in the schema. A key column
    /// missing from the schema is not a configuration error: every record then
    /// fails with [`Error::MissingKey`].
    ///
    /// Key attribute names must be unique: the hash and range keys may not
    /// share a column or an attribute name, and no non-key column may be
    /// stored under a key attribute name.
    pub fn new(schema: &Schema, key_spec: &KeySpec, binary_columns: &[String]) -> Result<Self, Error> {
        check_key_names(schema, key_spec)?;

        let hash = key_slot(schema, &key_spec.hash)?;
        let range = key_spec
            .range
            .as_ref()
            .map(|range| key_slot(schema, range))
            .transpose()?;

        for name in binary_columns {
            match schema.column(name) {
                None => {
                    return Err(Error::Configuration(format!(
                        "binary column '{name}' is not in the record schema"
                    )));
                }
                Some((_, column)) if column.kind != ColumnKind::Text => {
                    return Err(Error::Configuration(format!(
                        "binary column '{name}' must be a text column, found {}",
                        column.kind
                    )));
                }
                Some(_) => {}
            }
        }

        let attributes = schema
            .columns()
            .iter()
            .enumerate()
            .filter(|(_, column)| !key_spec.is_key_column(&column.name))
            .map(|(index, column)| Slot {
                column: column.name.clone(),
                attribute: column.name.clone(),
                index: Some(index),
                encoding: match column.kind {
                    ColumnKind::Text if binary_columns.contains(&column.name) => Encoding::Base64,
                    ColumnKind::Text => Encoding::Text,
                    ColumnKind::Number => Encoding::Number,
                    ColumnKind::Binary => Encoding::Binary,
                },
            })
            .collect();

        Ok(Self {
            hash,
            range,
            attributes,
        })
    }

    /// Encode the key attributes of a record
    pub fn encode_delete(&self, record_index: usize, record: &Record) -> Result<Item, Error> {
        let mut key = Item::with_capacity(2);
        let _ = key.insert(
            self.hash.attribute.clone(),
            self.hash.encode_key(record_index, record)?,
        );
        if let Some(range) = &self.range {
            let _ = key.insert(range.attribute.clone(), range.encode_key(record_index, record)?);
        }
        Ok(key)
    }

    /// Encode a full item: the key plus every non-missing, non-key cell
    pub fn encode_write(&self, record_index: usize, record: &Record) -> Result<Item, Error> {
        let mut item = self.encode_delete(record_index, record)?;
        item.reserve(self.attributes.len());

        for slot in &self.attributes {
            let Some(value) = slot.index.and_then(|index| record.get(index)) else {
                continue;
            };
            let _ = item.insert(slot.attribute.clone(), slot.encode(record_index, value)?);
        }

        Ok(item)
    }

    /// Encode one record for the given operation
    pub fn encode(&self, op: Operation, record_index: usize, record: &Record) -> Result<Item, Error> {
        match op {
            Operation::Write => self.encode_write(record_index, record),
            Operation::Delete => self.encode_delete(record_index, record),
        }
    }

    /// Encode every record of a batch, stopping at the first failure
    pub fn encode_batch(&self, op: Operation, batch: &Batch) -> Result<Vec<Item>, Error> {
        batch
            .records
            .iter()
            .enumerate()
            .map(|(offset, record)| self.encode(op, batch.first_record + offset, record))
            .collect()
    }

    /// Attribute names of the primary key, hash first
    pub fn key_attributes(&self) -> (&str, Option<&str>) {
        (
            &self.hash.attribute,
            self.range.as_ref().map(|range| range.attribute.as_str()),
        )
    }
}

fn check_key_names(schema: &Schema, key_spec: &KeySpec) -> Result<(), Error> {
    let hash = &key_spec.hash;
    let mut keys = vec![hash];

    if let Some(range) = &key_spec.range {
        if range.column == hash.column {
            return Err(Error::Configuration(format!(
                "hash and range keys both use column '{}'",
                hash.column
            )));
        }
        if range.attribute_name() == hash.attribute_name() {
            return Err(Error::Configuration(format!(
                "hash and range keys both use attribute '{}'",
                hash.attribute_name()
            )));
        }
        keys.push(range);
    }

    for key in keys {
        let attribute = key.attribute_name();
        if schema.column(attribute).is_some() && !key_spec.is_key_column(attribute) {
            return Err(Error::Configuration(format!(
                "key attribute '{attribute}' of column '{}' collides with non-key column '{attribute}'",
                key.column
            )));
        }
    }

    Ok(())
}

fn key_slot(schema: &Schema, key: &KeyColumn) -> Result<Slot, Error> {
    let column = schema.column(&key.column);

    let encoding = match column {
        Some((_, column)) if key.binary && column.kind != ColumnKind::Text => {
            return Err(Error::Configuration(format!(
                "key column '{}' is flagged binary but is a {} column",
                key.column, column.kind
            )));
        }
        Some(_) if key.binary => Encoding::Base64,
        Some((_, column)) => match column.kind {
            ColumnKind::Number => Encoding::Number,
            ColumnKind::Text => Encoding::Text,
            ColumnKind::Binary => Encoding::Binary,
        },
        None if key.binary => Encoding::Base64,
        None => Encoding::Text,
    };

    Ok(Slot {
        column: key.column.clone(),
        attribute: key.attribute_name().to_string(),
        index: column.map(|(index, _)| index),
        encoding,
    })
}
