//! Bulk store backends
//!
//! [`BulkStore`] is the seam between the engine and a concrete key-value store.
//! The engine only needs bulk write, bulk delete and describe with
//! partial-failure semantics; [`TableAdmin`] adds table lifecycle calls for the
//! create/drop workflows.

mod dynamodb;
mod memory;

pub use dynamodb::{DynamoStore, StoreConfig};
pub use memory::MemoryStore;

use crate::codec::Item;
use crate::error::StoreError;
use crate::setup::TableDefinition;

/// Outcome of a single bulk call
#[derive(Clone, Debug, Default, PartialEq)]
pub struct BatchResponse {
    /// Items or keys the store did not process; they must be resent
    pub unprocessed: Vec<Item>,
    /// Capacity units consumed by the call, when the store reports them
    pub consumed_capacity: Option<f64>,
}

impl BatchResponse {
    /// Every item was processed
    pub fn complete(consumed_capacity: Option<f64>) -> Self {
        Self {
            unprocessed: Vec::new(),
            consumed_capacity,
        }
    }
}

/// What a describe call reports about a table
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TableDescription {
    /// Table name
    pub name: String,
    /// Lifecycle status, e.g. `CREATING`, `ACTIVE`, `DELETING`
    pub status: String,
}

/// A store exposing bulk write, bulk delete and describe
///
/// Failures carry a [`StoreErrorKind`](crate::error::StoreErrorKind) so callers
/// can tell a missing table from throttling from anything else.
pub trait BulkStore: Send + Sync {
    /// Put items. Returns the subset the store did not process
    fn write(
        &self,
        table: &str,
        items: &[Item],
    ) -> impl Future<Output = Result<BatchResponse, StoreError>> + Send;

    /// Delete items by key. Returns the keys the store did not process
    fn delete(
        &self,
        table: &str,
        keys: &[Item],
    ) -> impl Future<Output = Result<BatchResponse, StoreError>> + Send;

    /// Describe a table. A missing table is a `NotFound` error
    fn describe(
        &self,
        table: &str,
    ) -> impl Future<Output = Result<TableDescription, StoreError>> + Send;

    /// Release the connection. Called once when the owning engine is closed
    fn close(&self) -> impl Future<Output = Result<(), StoreError>> + Send {
        async { Ok(()) }
    }
}

/// Table lifecycle operations
pub trait TableAdmin: BulkStore {
    /// Start creating a table. Succeeds if the table already exists
    fn create_table(
        &self,
        definition: &TableDefinition,
    ) -> impl Future<Output = Result<(), StoreError>> + Send;

    /// Start deleting a table. Succeeds if the table does not exist
    fn delete_table(&self, table: &str) -> impl Future<Output = Result<(), StoreError>> + Send;
}
