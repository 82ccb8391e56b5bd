use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};

use super::{BatchResponse, BulkStore, TableAdmin, TableDescription};
use crate::codec::{AttributeValue, Item};
use crate::error::StoreError;
use crate::setup::TableDefinition;

type PrimaryKey = (AttributeValue, Option<AttributeValue>);

#[derive(Debug)]
struct MemoryTable {
    hash_key: String,
    range_key: Option<String>,
    items: HashMap<PrimaryKey, Item>,
}

impl MemoryTable {
    fn primary_key(&self, table: &str, item: &Item) -> Result<PrimaryKey, StoreError> {
        let attribute = |name: &str| {
            item.get(name).cloned().ok_or_else(|| {
                StoreError::other(format!(
                    "table '{table}': item is missing key attribute '{name}'"
                ))
            })
        };

        let hash = attribute(&self.hash_key)?;
        let range = self.range_key.as_deref().map(attribute).transpose()?;
        Ok((hash, range))
    }
}

/// In-memory store
///
/// Every request is processed in full and no capacity is reported. Created
/// tables are `ACTIVE` immediately and deleted tables disappear immediately.
/// Useful for dry runs and tests.
#[derive(Debug, Default)]
pub struct MemoryStore {
    tables: Mutex<HashMap<String, MemoryTable>>,
}

impl MemoryStore {
    /// Create an empty store with no tables
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an empty table with the given key attributes
    pub fn with_table(self, name: &str, hash_key: &str, range_key: Option<&str>) -> Self {
        let _ = self.lock().insert(
            name.to_string(),
            MemoryTable {
                hash_key: hash_key.to_string(),
                range_key: range_key.map(str::to_string),
                items: HashMap::new(),
            },
        );
        self
    }

    /// All items of a table, in no particular order. Empty if the table does not exist
    pub fn items(&self, table: &str) -> Vec<Item> {
        self.lock()
            .get(table)
            .map(|t| t.items.values().cloned().collect())
            .unwrap_or_default()
    }

    /// Number of items in a table
    pub fn len(&self, table: &str) -> usize {
        self.lock().get(table).map_or(0, |t| t.items.len())
    }

    /// Check if a table exists
    pub fn has_table(&self, table: &str) -> bool {
        self.lock().contains_key(table)
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<String, MemoryTable>> {
        self.tables.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn apply<F>(&self, table: &str, items: &[Item], mut f: F) -> Result<BatchResponse, StoreError>
    where
        F: FnMut(&mut MemoryTable, PrimaryKey, &Item),
    {
        let mut tables = self.lock();
        let target = tables
            .get_mut(table)
            .ok_or_else(|| StoreError::not_found(format!("table '{table}' not found")))?;

        // Validate the whole request before touching anything
        let keys = items
            .iter()
            .map(|item| target.primary_key(table, item))
            .collect::<Result<Vec<_>, _>>()?;

        for (key, item) in keys.into_iter().zip(items) {
            f(target, key, item);
        }

        Ok(BatchResponse::complete(None))
    }
}

impl BulkStore for MemoryStore {
    async fn write(&self, table: &str, items: &[Item]) -> Result<BatchResponse, StoreError> {
        self.apply(table, items, |target, key, item| {
            let _ = target.items.insert(key, item.clone());
        })
    }

    async fn delete(&self, table: &str, keys: &[Item]) -> Result<BatchResponse, StoreError> {
        self.apply(table, keys, |target, key, _| {
            let _ = target.items.remove(&key);
        })
    }

    async fn describe(&self, table: &str) -> Result<TableDescription, StoreError> {
        if self.has_table(table) {
            Ok(TableDescription {
                name: table.to_string(),
                status: "ACTIVE".to_string(),
            })
        } else {
            Err(StoreError::not_found(format!("table '{table}' not found")))
        }
    }
}

impl TableAdmin for MemoryStore {
    async fn create_table(&self, definition: &TableDefinition) -> Result<(), StoreError> {
        let _ = self
            .lock()
            .entry(definition.name.clone())
            .or_insert_with(|| MemoryTable {
                hash_key: definition.hash.name.clone(),
                range_key: definition.range.as_ref().map(|r| r.name.clone()),
                items: HashMap::new(),
            });
        Ok(())
    }

    async fn delete_table(&self, table: &str) -> Result<(), StoreError> {
        let _ = self.lock().remove(table);
        Ok(())
    }
}
