mod batcher;
mod dispatcher;

pub use batcher::{Batcher, MAX_BATCH, validate_batch_size};
pub use dispatcher::{BatchResult, Dispatcher, RetryPolicy};

use serde::Deserialize;
use std::fmt;

use crate::record::Record;

/// Bulk operation applied to every record of a run
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Operation {
    /// Put full items
    #[default]
    Write,
    /// Delete items by key
    Delete,
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Operation::Write => write!(f, "write"),
            Operation::Delete => write!(f, "delete"),
        }
    }
}

/// Consecutive records submitted together
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Batch {
    /// Zero-based position of the batch in the run
    pub index: usize,
    /// Source position of the first record
    pub first_record: usize,
    /// The records, in source order
    pub records: Vec<Record>,
}

impl Batch {
    /// Number of records
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Check if the batch has no records
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}
