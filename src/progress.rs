use std::time::Duration;

use tokio::time::sleep;
use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::error::Error;

/// Progress and cancellation bridge to the caller
///
/// The engine calls [`report`](ProgressSink::report) at most once per batch or
/// poll, and [`is_cancelled`](ProgressSink::is_cancelled) before every store
/// call and every backoff sleep. Backoff sleeps end early once
/// [`cancelled`](ProgressSink::cancelled) resolves. `report` cannot fail;
/// implementations must swallow their own I/O problems rather than abort the
/// run.
pub trait ProgressSink: Send + Sync {
    /// Publish a human readable progress message
    fn report(&self, message: &str);

    /// Check if the caller asked to stop
    fn is_cancelled(&self) -> bool;

    /// Resolve once the caller asked to stop
    ///
    /// The default checks [`is_cancelled`](ProgressSink::is_cancelled) every
    /// [`CANCEL_CHECK_INTERVAL`]. Sinks with a wakeup source should override it.
    fn cancelled(&self) -> impl Future<Output = ()> + Send {
        async move {
            while !self.is_cancelled() {
                sleep(CANCEL_CHECK_INTERVAL).await;
            }
        }
    }
}

/// How often the default [`ProgressSink::cancelled`] checks for cancellation
pub const CANCEL_CHECK_INTERVAL: Duration = Duration::from_millis(50);

/// Return [`Error::Cancelled`] once cancellation was requested
pub fn check_cancelled<P>(progress: &P) -> Result<(), Error>
where
    P: ProgressSink + ?Sized,
{
    if progress.is_cancelled() {
        return Err(Error::Cancelled);
    }
    Ok(())
}

/// Wait `delay`, or fail with [`Error::Cancelled`] as soon as cancellation is
/// requested
pub async fn sleep_unless_cancelled<P>(progress: &P, delay: Duration) -> Result<(), Error>
where
    P: ProgressSink + ?Sized,
{
    tokio::select! {
        biased;
        () = progress.cancelled() => Err(Error::Cancelled),
        () = sleep(delay) => Ok(()),
    }
}

/// Progress sink that logs through `tracing` and cancels via a token
///
/// Clones share the same token, so a clone can be handed to a signal handler.
#[derive(Clone, Debug, Default)]
pub struct TracingProgress {
    token: CancellationToken,
}

impl TracingProgress {
    /// Create a sink with a fresh token
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a sink observing an existing token
    pub fn with_token(token: CancellationToken) -> Self {
        Self { token }
    }

    /// Token observed by this sink
    pub fn token(&self) -> &CancellationToken {
        &self.token
    }

    /// Request cancellation
    pub fn cancel(&self) {
        self.token.cancel();
    }
}

impl ProgressSink for TracingProgress {
    fn report(&self, message: &str) {
        info!(target: "dynamo_bulk::progress", "{message}");
    }

    fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }

    async fn cancelled(&self) {
        self.token.cancelled().await;
    }
}

/// Progress sink that discards messages and is never cancelled
#[derive(Clone, Copy, Debug, Default)]
pub struct NoProgress;

impl ProgressSink for NoProgress {
    fn report(&self, _message: &str) {}

    fn is_cancelled(&self) -> bool {
        false
    }

    async fn cancelled(&self) {
        std::future::pending().await
    }
}
