//! # DynamoDB Bulk Loader
//!
//! A batched, rate-aware bulk write/delete engine for DynamoDB-style stores,
//! plus a poller that waits for a table to reach a lifecycle state.
//!
//! - Records from any [`RecordSource`] are sliced into batches of at most 25
//! - Each record is encoded into a write item or a delete key, with optional
//!   base64 decoding of text columns into binary attributes
//! - Unprocessed items and throttled requests are resent with exponential
//!   backoff, one batch at a time or several concurrently
//! - Consumed capacity is summed over the whole run
//! - Progress is reported and cancellation observed through a [`ProgressSink`]
//!
//! ## Quick Start
//!
//! ```rust
//! use dynamo_bulk::{
//!     ColumnKind, Engine, Error, KeyColumn, KeySpec, MemoryStore, NoProgress, Operation,
//!     Record, Schema, Value, VecSource,
//! };
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Error> {
//!     let schema = Schema::default()
//!         .with_column("user_id", ColumnKind::Text)
//!         .with_column("visits", ColumnKind::Number);
//!     let records = vec![
//!         Record::new(vec![Some(Value::text("u1")), Some(Value::number(3))]),
//!         Record::new(vec![Some(Value::text("u2")), None]),
//!     ];
//!
//!     let store = MemoryStore::new().with_table("users", "user_id", None);
//!     let engine = Engine::new(store, "users");
//!
//!     let summary = engine
//!         .run(
//!             VecSource::new(schema, records),
//!             &KeySpec::hash(KeyColumn::new("user_id")),
//!             25,
//!             Operation::Write,
//!             &NoProgress,
//!         )
//!         .await?;
//!     assert_eq!(summary.records, 2);
//!
//!     engine.close().await
//! }
//! ```
//!
//! Against DynamoDB, build the store with [`DynamoStore::connect`] and load
//! the settings with [`config::load_config`].
#![deny(
    warnings,
    bad_style,
    dead_code,
    improper_ctypes,
    non_shorthand_field_patterns,
    no_mangle_generic_items,
    overflowing_literals,
    path_statements,
    patterns_in_fns_without_body,
    unconditional_recursion,
    unused,
    unused_allocation,
    unused_comparisons,
    unused_parens,
    while_true,
    missing_debug_implementations,
    missing_docs,
    trivial_casts,
    trivial_numeric_casts,
    unreachable_pub,
    unused_extern_crates,
    unused_import_braces,
    unused_qualifications,
    unused_results,
    deprecated,
    unknown_lints,
    unreachable_code,
    unused_mut
)]

/// Exponential backoff delays
pub mod backoff;
/// Batching records and dispatching batches with retry
pub mod batch;
/// Consumed capacity accounting
pub mod capacity;
pub mod codec;
pub mod config;
pub mod engine;
mod error;
pub mod poller;
/// Progress reporting and cancellation
pub mod progress;
/// Records, schemas and record sources
pub mod record;
/// Table definitions for setup
pub mod setup;
pub mod store;

pub use error::{Error, StoreError, StoreErrorKind};

// Re-export main types for convenience
pub use batch::{MAX_BATCH, Operation};
pub use codec::{AttributeValue, Item, KeyColumn, KeySpec};
pub use engine::{Engine, EngineOptions, RunSummary};
pub use poller::{ResourceState, TargetState};
pub use progress::{NoProgress, ProgressSink, TracingProgress};
pub use record::{ColumnKind, Record, RecordSource, Schema, Value, VecSource};
pub use store::{BulkStore, DynamoStore, MemoryStore, StoreConfig, TableAdmin};
