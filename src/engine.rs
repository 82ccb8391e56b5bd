//! The bulk engine
//!
//! [`Engine::run`] drives a whole load: records are batched, encoded and
//! dispatched, retries happen per batch, capacity is summed, and the table can
//! optionally be polled afterwards. The table lifecycle workflows
//! ([`Engine::create_table`], [`Engine::drop_table`]) reuse the same poller.

use std::fmt;
use std::future;
use std::time::Duration;

use futures_util::{StreamExt, TryStreamExt};
use tokio::time::Instant;
use tokio_stream as stream;
use tracing::{debug, info};

use crate::batch::{Batcher, Dispatcher, Operation, RetryPolicy, validate_batch_size};
use crate::capacity::CapacityAggregator;
use crate::codec::{Codec, KeySpec};
use crate::error::Error;
use crate::poller::{PollPolicy, Poller, ResourceState, TargetState};
use crate::progress::{ProgressSink, check_cancelled};
use crate::record::RecordSource;
use crate::setup::TableDefinition;
use crate::store::{BulkStore, TableAdmin};

/// Tuning for runs and waits
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EngineOptions {
    /// Per batch retry pacing
    pub retry: RetryPolicy,
    /// Table poll pacing
    pub poll: PollPolicy,
    /// Batches in flight at once. Results are still consumed in source order
    pub concurrency: usize,
    /// Non-key text columns holding base64 payloads
    pub binary_columns: Vec<String>,
    /// State to wait for once every batch is accepted
    pub wait_for: Option<TargetState>,
}

impl Default for EngineOptions {
    fn default() -> Self {
        Self {
            retry: RetryPolicy::default(),
            poll: PollPolicy::default(),
            concurrency: 1,
            binary_columns: Vec::new(),
            wait_for: None,
        }
    }
}

/// What a completed run did
#[derive(Clone, Debug, PartialEq)]
pub struct RunSummary {
    /// Target table
    pub table: String,
    /// Operation applied
    pub operation: Operation,
    /// Records accepted by the store
    pub records: usize,
    /// Batches dispatched
    pub batches: usize,
    /// Store calls beyond the first, over all batches
    pub retries: u64,
    /// Capacity units reported by the store
    pub consumed_capacity: f64,
    /// Wall time of the run
    pub duration: Duration,
    /// Table state observed after the run, when a wait was requested
    pub final_state: Option<ResourceState>,
}

impl fmt::Display for RunSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {} records to '{}' in {} batches ({} retries, {:.1} capacity units, {:.2?})",
            self.operation,
            self.records,
            self.table,
            self.batches,
            self.retries,
            self.consumed_capacity,
            self.duration
        )?;
        if let Some(state) = &self.final_state {
            write!(f, ", table {state}")?;
        }
        Ok(())
    }
}

#[derive(Debug, Default)]
struct Totals {
    records: usize,
    batches: usize,
    retries: u64,
}

/// Bulk engine bound to one store and one table
///
/// The engine owns the store handle; [`close`](Engine::close) releases it.
#[derive(Debug)]
pub struct Engine<S> {
    store: S,
    table: String,
    options: EngineOptions,
}

impl<S> Engine<S>
where
    S: BulkStore,
{
    /// Create an engine with default options
    pub fn new(store: S, table: impl Into<String>) -> Self {
        Self {
            store,
            table: table.into(),
            options: EngineOptions::default(),
        }
    }

    /// Replace the options
    pub fn with_options(mut self, options: EngineOptions) -> Self {
        self.options = options;
        self
    }

    /// Target table
    pub fn table(&self) -> &str {
        &self.table
    }

    /// Current options
    pub fn options(&self) -> &EngineOptions {
        &self.options
    }

    /// Store handle
    pub fn store(&self) -> &S {
        &self.store
    }

    /// Apply `op` to every record of `source`
    ///
    /// The batch size is validated before any record is read, and a run that
    /// is already cancelled makes no store call. The first record, batch or
    /// store failure ends the run; batches accepted before it stay applied.
    pub async fn run<R, P>(
        &self,
        mut source: R,
        key_spec: &KeySpec,
        batch_size: usize,
        op: Operation,
        progress: &P,
    ) -> Result<RunSummary, Error>
    where
        R: RecordSource,
        P: ProgressSink + ?Sized,
    {
        let started = Instant::now();

        validate_batch_size(batch_size)?;
        if self.options.concurrency == 0 {
            return Err(Error::Configuration(
                "concurrency must be at least 1".to_string(),
            ));
        }
        check_cancelled(progress)?;

        let codec = Codec::new(source.schema(), key_spec, &self.options.binary_columns)?;
        let batcher = Batcher::new(&mut source, batch_size)?;
        let capacity = CapacityAggregator::new();
        let dispatcher = Dispatcher::new(
            &self.store,
            &self.table,
            self.options.retry,
            &capacity,
            progress,
        );

        info!(
            table = %self.table,
            %op,
            batch_size,
            concurrency = self.options.concurrency,
            "Starting bulk run"
        );

        let codec = &codec;
        let dispatcher = &dispatcher;
        let totals = stream::iter(batcher)
            .map(|batch| async move {
                let batch = batch?;
                let items = codec.encode_batch(op, &batch)?;
                let result = dispatcher.dispatch(items, op).await?;
                Ok::<_, Error>((batch.index, result))
            })
            .buffered(self.options.concurrency)
            .try_fold(Totals::default(), |mut totals, (index, result)| {
                totals.records += result.submitted;
                totals.batches += 1;
                totals.retries += u64::from(result.retries());

                debug!(
                    table = %self.table,
                    batch = index,
                    items = result.submitted,
                    attempts = result.attempts,
                    consumed_capacity = result.consumed_capacity,
                    "Batch accepted"
                );
                progress.report(&format!(
                    "Batch {}: {} {} records ({} total)",
                    index + 1,
                    op,
                    result.submitted,
                    totals.records
                ));

                future::ready(Ok(totals))
            })
            .await?;

        let final_state = match &self.options.wait_for {
            Some(target) => Some(self.wait_for_state(&self.table, target, progress).await?),
            None => None,
        };

        let summary = RunSummary {
            table: self.table.clone(),
            operation: op,
            records: totals.records,
            batches: totals.batches,
            retries: totals.retries,
            consumed_capacity: capacity.snapshot(),
            duration: started.elapsed(),
            final_state,
        };
        info!(table = %self.table, "{summary}");

        Ok(summary)
    }

    /// Poll `table` until it reaches `target`
    pub async fn wait_for_state<P>(
        &self,
        table: &str,
        target: &TargetState,
        progress: &P,
    ) -> Result<ResourceState, Error>
    where
        P: ProgressSink + ?Sized,
    {
        Poller::new(&self.store, self.options.poll, progress)
            .wait_for_state(table, target)
            .await
    }

    /// Release the store
    pub async fn close(self) -> Result<(), Error> {
        self.store.close().await?;
        Ok(())
    }
}

impl<S> Engine<S>
where
    S: TableAdmin,
{
    /// Create a table and wait until it is `ACTIVE`
    ///
    /// An existing table is not an error; the wait then returns at once.
    pub async fn create_table<P>(
        &self,
        definition: &TableDefinition,
        progress: &P,
    ) -> Result<ResourceState, Error>
    where
        P: ProgressSink + ?Sized,
    {
        check_cancelled(progress)?;
        info!(table = %definition.name, "Creating table");
        self.store.create_table(definition).await?;

        self.wait_for_state(&definition.name, &TargetState::active(), progress)
            .await
    }

    /// Delete a table and wait until it is gone
    ///
    /// A table that does not exist is already in the target state.
    pub async fn drop_table<P>(&self, table: &str, progress: &P) -> Result<ResourceState, Error>
    where
        P: ProgressSink + ?Sized,
    {
        check_cancelled(progress)?;
        info!(table, "Deleting table");
        self.store.delete_table(table).await?;

        self.wait_for_state(table, &TargetState::Absent, progress)
            .await
    }
}
