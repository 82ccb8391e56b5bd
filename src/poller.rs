//! Waiting for a table to reach a lifecycle state
//!
//! The poller describes the table, reports what it saw and sleeps with
//! exponential backoff until the target is observed, the run is cancelled, or
//! the optional poll limit runs out.

use std::fmt;
use std::time::Duration;

use tracing::{debug, info};

use crate::backoff::Backoff;
use crate::error::Error;
use crate::progress::{ProgressSink, check_cancelled, sleep_unless_cancelled};
use crate::store::BulkStore;

/// Table status reported once creation has finished
pub const ACTIVE: &str = "ACTIVE";

/// Last known state of a polled table
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub enum ResourceState {
    /// Not described yet
    #[default]
    Unknown,
    /// The store reported this status
    Observed(String),
    /// The store reported the table as missing
    Absent,
}

impl fmt::Display for ResourceState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ResourceState::Unknown => write!(f, "UNKNOWN"),
            ResourceState::Observed(status) => write!(f, "{status}"),
            ResourceState::Absent => write!(f, "ABSENT"),
        }
    }
}

/// State to wait for
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum TargetState {
    /// The table reports exactly this status
    Status(String),
    /// The table no longer exists
    Absent,
}

impl TargetState {
    /// Wait for `ACTIVE`
    pub fn active() -> Self {
        TargetState::Status(ACTIVE.to_string())
    }

    /// Check if `state` satisfies this target
    pub fn is_reached(&self, state: &ResourceState) -> bool {
        match (self, state) {
            (TargetState::Status(target), ResourceState::Observed(status)) => target == status,
            (TargetState::Absent, ResourceState::Absent) => true,
            _ => false,
        }
    }
}

impl fmt::Display for TargetState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TargetState::Status(status) => write!(f, "{status}"),
            TargetState::Absent => write!(f, "ABSENT"),
        }
    }
}

/// Poll pacing
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PollPolicy {
    /// Sleep after poll `n` (0-based) is `backoff.delay(n)`
    pub backoff: Backoff,
    /// Describe calls allowed before giving up. `None` polls until the target
    /// is reached or the run is cancelled
    pub max_polls: Option<u32>,
}

impl Default for PollPolicy {
    fn default() -> Self {
        Self {
            backoff: Backoff::new(Duration::from_millis(500)),
            max_polls: None,
        }
    }
}

/// Polls a table until it reaches a target state
pub struct Poller<'a, S, P: ?Sized> {
    store: &'a S,
    policy: PollPolicy,
    progress: &'a P,
}

impl<S, P: ?Sized> fmt::Debug for Poller<'_, S, P> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Poller")
            .field("policy", &self.policy)
            .finish_non_exhaustive()
    }
}

impl<'a, S, P> Poller<'a, S, P>
where
    S: BulkStore,
    P: ProgressSink + ?Sized,
{
    /// Create a poller
    pub fn new(store: &'a S, policy: PollPolicy, progress: &'a P) -> Self {
        Self {
            store,
            policy,
            progress,
        }
    }

    /// Describe `table` until it reaches `target`
    ///
    /// Every describe call is followed by exactly one progress report of the
    /// form `Table <name>: <state>`. A `NotFound` answer is the `Absent` state;
    /// any other store failure ends the wait. Waiting for a status while the
    /// table is absent fails with [`Error::Configuration`].
    pub async fn wait_for_state(
        &self,
        table: &str,
        target: &TargetState,
    ) -> Result<ResourceState, Error> {
        let mut polls: u32 = 0;

        loop {
            check_cancelled(self.progress)?;

            let state = match self.store.describe(table).await {
                Ok(description) => ResourceState::Observed(description.status),
                Err(e) if e.is_not_found() => ResourceState::Absent,
                Err(e) => return Err(Error::Store(e)),
            };
            polls += 1;

            debug!(table, %state, %target, poll = polls, "Polled table state");
            self.progress.report(&format!("Table {table}: {state}"));

            if target.is_reached(&state) {
                info!(table, %state, polls, "Table reached target state");
                return Ok(state);
            }

            if state == ResourceState::Absent {
                return Err(Error::Configuration(format!(
                    "table '{table}' does not exist while waiting for {target}"
                )));
            }

            if self.policy.max_polls.is_some_and(|max| polls >= max) {
                return Err(Error::PollExhausted {
                    table: table.to_string(),
                    polls,
                    last: state.to_string(),
                });
            }

            check_cancelled(self.progress)?;
            let delay = self.policy.backoff.delay(polls - 1);
            debug!(table, poll = polls, delay_ms = delay.as_millis() as u64, "Waiting before next poll");
            sleep_unless_cancelled(self.progress, delay).await?;
        }
    }
}
