#![allow(dead_code)]
/// Test helpers shared by the integration tests
///
/// A scripted [`StubStore`] that records every call, a [`RecordingProgress`]
/// sink, and record fixtures.
pub mod fixtures;

pub use fixtures::{
    FailingSource, key_spec, keyed_source, user_records, user_schema, user_source,
};

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::sync::atomic::{AtomicBool, Ordering};

use dynamo_bulk::setup::TableDefinition;
use dynamo_bulk::store::{BatchResponse, TableDescription};
use dynamo_bulk::{BulkStore, Item, ProgressSink, StoreError, TableAdmin};
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

/// Kind of store call
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CallKind {
    Write,
    Delete,
    Describe,
    CreateTable,
    DeleteTable,
}

/// One recorded store call
#[derive(Clone, Debug)]
pub struct Call {
    pub kind: CallKind,
    pub items: Vec<Item>,
    pub at: Instant,
}

/// Scripted answer to a write or delete call
#[derive(Clone, Debug)]
pub enum Reply {
    /// Process everything
    Accept { capacity: Option<f64> },
    /// Leave the last `count` submitted items unprocessed
    Unprocessed { count: usize, capacity: Option<f64> },
    /// Fail the call
    Fail(StoreError),
}

impl Reply {
    pub fn accept() -> Self {
        Reply::Accept { capacity: None }
    }

    pub fn unprocessed(count: usize) -> Self {
        Reply::Unprocessed {
            count,
            capacity: None,
        }
    }
}

/// Store stub answering from scripts
///
/// Write and delete calls take the next [`Reply`] and accept everything once
/// the script runs out. Describe calls take the next scripted answer and
/// report the table as missing once the script runs out.
#[derive(Debug, Default)]
pub struct StubStore {
    replies: Mutex<VecDeque<Reply>>,
    describes: Mutex<VecDeque<Result<String, StoreError>>>,
    calls: Mutex<Vec<Call>>,
    accepted: Mutex<Vec<Item>>,
    cancel_on_call: Option<(usize, CancellationToken)>,
    closed: Arc<AtomicBool>,
}

impl StubStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_replies(self, replies: impl IntoIterator<Item = Reply>) -> Self {
        self.replies.lock().unwrap().extend(replies);
        self
    }

    pub fn with_statuses<'a>(self, statuses: impl IntoIterator<Item = &'a str>) -> Self {
        self.describes
            .lock()
            .unwrap()
            .extend(statuses.into_iter().map(|s| Ok(s.to_string())));
        self
    }

    pub fn with_describe_error(self, error: StoreError) -> Self {
        self.describes.lock().unwrap().push_back(Err(error));
        self
    }

    /// Cancel `token` while serving call number `call` (1-based)
    pub fn cancel_on_call(mut self, call: usize, token: CancellationToken) -> Self {
        self.cancel_on_call = Some((call, token));
        self
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }

    pub fn calls_of(&self, kind: CallKind) -> Vec<Call> {
        self.calls()
            .into_iter()
            .filter(|c| c.kind == kind)
            .collect()
    }

    /// Items the stub processed, in the order it processed them
    pub fn accepted(&self) -> Vec<Item> {
        self.accepted.lock().unwrap().clone()
    }

    /// Flag set by `close`, still readable once the engine consumed the store
    pub fn closed_flag(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.closed)
    }

    fn record(&self, kind: CallKind, items: &[Item]) {
        let mut calls = self.calls.lock().unwrap();
        calls.push(Call {
            kind,
            items: items.to_vec(),
            at: Instant::now(),
        });

        if let Some((call, token)) = &self.cancel_on_call {
            if calls.len() == *call {
                token.cancel();
            }
        }
    }

    fn answer(&self, kind: CallKind, items: &[Item]) -> Result<BatchResponse, StoreError> {
        self.record(kind, items);

        let reply = self
            .replies
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(Reply::accept);

        match reply {
            Reply::Accept { capacity } => {
                self.accepted.lock().unwrap().extend_from_slice(items);
                Ok(BatchResponse::complete(capacity))
            }
            Reply::Unprocessed { count, capacity } => {
                let split = items.len().saturating_sub(count);
                self.accepted
                    .lock()
                    .unwrap()
                    .extend_from_slice(&items[..split]);
                Ok(BatchResponse {
                    unprocessed: items[split..].to_vec(),
                    consumed_capacity: capacity,
                })
            }
            Reply::Fail(error) => Err(error),
        }
    }
}

impl BulkStore for StubStore {
    async fn write(&self, _table: &str, items: &[Item]) -> Result<BatchResponse, StoreError> {
        self.answer(CallKind::Write, items)
    }

    async fn delete(&self, _table: &str, keys: &[Item]) -> Result<BatchResponse, StoreError> {
        self.answer(CallKind::Delete, keys)
    }

    async fn describe(&self, table: &str) -> Result<TableDescription, StoreError> {
        self.record(CallKind::Describe, &[]);

        match self.describes.lock().unwrap().pop_front() {
            Some(Ok(status)) => Ok(TableDescription {
                name: table.to_string(),
                status,
            }),
            Some(Err(error)) => Err(error),
            None => Err(StoreError::not_found(format!("table '{table}' not found"))),
        }
    }

    async fn close(&self) -> Result<(), StoreError> {
        self.closed.store(true, Ordering::SeqCst);
        Ok(())
    }
}

impl TableAdmin for StubStore {
    async fn create_table(&self, _definition: &TableDefinition) -> Result<(), StoreError> {
        self.record(CallKind::CreateTable, &[]);
        Ok(())
    }

    async fn delete_table(&self, _table: &str) -> Result<(), StoreError> {
        self.record(CallKind::DeleteTable, &[]);
        Ok(())
    }
}

/// Progress sink keeping every message, cancelled through a token
#[derive(Debug, Default)]
pub struct RecordingProgress {
    messages: Mutex<Vec<String>>,
    token: CancellationToken,
}

impl RecordingProgress {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn token(&self) -> CancellationToken {
        self.token.clone()
    }

    pub fn messages(&self) -> Vec<String> {
        self.messages.lock().unwrap().clone()
    }
}

impl ProgressSink for RecordingProgress {
    fn report(&self, message: &str) {
        self.messages.lock().unwrap().push(message.to_string());
    }

    fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }

    async fn cancelled(&self) {
        self.token.cancelled().await;
    }
}
