use std::fmt;
use std::time::Duration;

use tokio::time::Instant;
use tracing::{debug, warn};

use super::Operation;
use crate::backoff::Backoff;
use crate::capacity::CapacityAggregator;
use crate::codec::Item;
use crate::error::{Error, StoreErrorKind};
use crate::progress::{ProgressSink, check_cancelled, sleep_unless_cancelled};
use crate::store::BulkStore;

/// How a batch is resubmitted after throttling or a partial failure
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Delay before retry `n` is `backoff.delay(n)`
    pub backoff: Backoff,
    /// Total attempts allowed per batch, including the first. `None` retries
    /// until the store accepts everything or the run is cancelled
    pub max_attempts: Option<u32>,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            backoff: Backoff::new(Duration::from_millis(100)),
            max_attempts: None,
        }
    }
}

/// Outcome of a fully processed batch
#[must_use]
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct BatchResult {
    /// Items in the batch
    pub submitted: usize,
    /// Store calls made, including the first
    pub attempts: u32,
    /// Capacity units the store reported for this batch
    pub consumed_capacity: f64,
    /// Wall time from the first call to full acceptance
    pub duration: Duration,
}

impl BatchResult {
    /// Store calls beyond the first
    pub fn retries(&self) -> u32 {
        self.attempts.saturating_sub(1)
    }
}

/// Submits one encoded batch and resubmits whatever the store leaves unprocessed
pub struct Dispatcher<'a, S, P: ?Sized> {
    store: &'a S,
    table: &'a str,
    policy: RetryPolicy,
    capacity: &'a CapacityAggregator,
    progress: &'a P,
}

impl<S, P: ?Sized> fmt::Debug for Dispatcher<'_, S, P> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Dispatcher")
            .field("table", &self.table)
            .field("policy", &self.policy)
            .field("capacity", &self.capacity)
            .finish_non_exhaustive()
    }
}

impl<'a, S, P> Dispatcher<'a, S, P>
where
    S: BulkStore,
    P: ProgressSink + ?Sized,
{
    /// Create a dispatcher for `table`
    ///
    /// Consumed capacity of every call is added to `capacity`.
    pub fn new(
        store: &'a S,
        table: &'a str,
        policy: RetryPolicy,
        capacity: &'a CapacityAggregator,
        progress: &'a P,
    ) -> Self {
        Self {
            store,
            table,
            policy,
            capacity,
            progress,
        }
    }

    /// Submit `items` until the store has processed all of them
    ///
    /// Only the items the store reports as unprocessed are resent, and
    /// throttled calls resend the same items. Retry `n` waits
    /// `backoff.delay(n)` first. Cancellation is checked before every call and
    /// every sleep, and cuts a running sleep short. A missing table fails with
    /// [`Error::Configuration`]; any other non-transient store failure is
    /// returned as [`Error::Store`].
    pub async fn dispatch(&self, items: Vec<Item>, op: Operation) -> Result<BatchResult, Error> {
        let submitted = items.len();
        let started = Instant::now();
        let mut pending = items;
        let mut consumed = 0.0;
        let mut attempts: u32 = 0;

        loop {
            check_cancelled(self.progress)?;
            attempts += 1;

            debug!(
                table = self.table,
                %op,
                items = pending.len(),
                attempt = attempts,
                "Submitting batch"
            );

            let response = match op {
                Operation::Write => self.store.write(self.table, &pending).await,
                Operation::Delete => self.store.delete(self.table, &pending).await,
            };

            match response {
                Ok(response) => {
                    if let Some(units) = response.consumed_capacity {
                        self.capacity.add(units);
                        consumed += units;
                    }

                    if response.unprocessed.is_empty() {
                        return Ok(BatchResult {
                            submitted,
                            attempts,
                            consumed_capacity: consumed,
                            duration: started.elapsed(),
                        });
                    }

                    warn!(
                        table = self.table,
                        unprocessed = response.unprocessed.len(),
                        attempt = attempts,
                        "Store left items unprocessed, retrying them"
                    );
                    pending = response.unprocessed;
                }
                Err(e) => match e.kind {
                    StoreErrorKind::Throttled => {
                        warn!(table = self.table, attempt = attempts, error = %e, "Batch throttled");
                    }
                    StoreErrorKind::NotFound => {
                        return Err(Error::Configuration(format!(
                            "table '{}' does not exist or is not accessible: {}",
                            self.table, e.message
                        )));
                    }
                    StoreErrorKind::Other => return Err(Error::Store(e)),
                },
            }

            if self.policy.max_attempts.is_some_and(|max| attempts >= max) {
                return Err(Error::RetriesExhausted {
                    table: self.table.to_string(),
                    remaining: pending.len(),
                    attempts,
                });
            }

            check_cancelled(self.progress)?;
            let delay = self.policy.backoff.delay(attempts - 1);
            debug!(
                table = self.table,
                attempt = attempts,
                delay_ms = delay.as_millis() as u64,
                "Backing off before retry"
            );
            sleep_unless_cancelled(self.progress, delay).await?;
        }
    }
}
