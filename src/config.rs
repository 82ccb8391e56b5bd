//! Loader configuration
//!
//! Settings come from `DYNAMO_BULK_*` environment variables, with nested keys
//! separated by `__` (`DYNAMO_BULK_RETRY__MAX_ATTEMPTS=8`), merged with an
//! optional TOML file. The file wins on conflicts.
//!
//! ```toml
//! table = "events"
//! operation = "write"
//! batch_size = 25
//! binary_columns = ["payload"]
//!
//! [hash_key]
//! column = "user_id"
//! attribute = "pk"
//!
//! [retry]
//! base_delay_ms = 100
//! max_attempts = 10
//!
//! [store]
//! region = "eu-west-1"
//! ```

use std::path::Path;
use std::time::Duration;

use figment::Figment;
use figment::providers::{Env, Format, Toml};
use serde::Deserialize;
use tracing::info;

use crate::backoff::Backoff;
use crate::batch::{MAX_BATCH, Operation, RetryPolicy, validate_batch_size};
use crate::codec::{KeyColumn, KeySpec};
use crate::engine::EngineOptions;
use crate::error::Error;
use crate::poller::{PollPolicy, TargetState};
use crate::store::StoreConfig;

/// Prefix of the environment variables read by [`load_config`]
pub const ENV_PREFIX: &str = "DYNAMO_BULK_";

fn backoff(base_delay_ms: u64, max_delay_ms: Option<u64>) -> Backoff {
    let backoff = Backoff::new(Duration::from_millis(base_delay_ms));
    match max_delay_ms {
        Some(max) => backoff.with_max(Duration::from_millis(max)),
        None => backoff,
    }
}

/// `[retry]` section
#[derive(Clone, Copy, Debug, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct RetrySettings {
    /// Delay before the first retry, in milliseconds
    pub base_delay_ms: u64,
    /// Cap on any single delay, in milliseconds
    pub max_delay_ms: Option<u64>,
    /// Attempts per batch, including the first. Unlimited when unset
    pub max_attempts: Option<u32>,
}

impl Default for RetrySettings {
    fn default() -> Self {
        Self {
            base_delay_ms: 100,
            max_delay_ms: None,
            max_attempts: None,
        }
    }
}

impl From<RetrySettings> for RetryPolicy {
    fn from(settings: RetrySettings) -> Self {
        Self {
            backoff: backoff(settings.base_delay_ms, settings.max_delay_ms),
            max_attempts: settings.max_attempts,
        }
    }
}

/// `[poll]` section
#[derive(Clone, Copy, Debug, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct PollSettings {
    /// Delay after the first poll, in milliseconds
    pub base_delay_ms: u64,
    /// Cap on any single delay, in milliseconds
    pub max_delay_ms: Option<u64>,
    /// Describe calls before giving up. Unlimited when unset
    pub max_polls: Option<u32>,
}

impl Default for PollSettings {
    fn default() -> Self {
        Self {
            base_delay_ms: 500,
            max_delay_ms: None,
            max_polls: None,
        }
    }
}

impl From<PollSettings> for PollPolicy {
    fn from(settings: PollSettings) -> Self {
        Self {
            backoff: backoff(settings.base_delay_ms, settings.max_delay_ms),
            max_polls: settings.max_polls,
        }
    }
}

/// Everything needed to run a load
#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
pub struct LoaderConfig {
    /// Target table
    pub table: String,
    /// Write or delete
    #[serde(default)]
    pub operation: Operation,
    /// Records per batch, `1..=25`
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
    /// Batches in flight at once
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,
    /// Hash key column
    pub hash_key: KeyColumn,
    /// Range key column
    #[serde(default)]
    pub range_key: Option<KeyColumn>,
    /// Non-key text columns holding base64 payloads
    #[serde(default)]
    pub binary_columns: Vec<String>,
    /// Poll the table until `ACTIVE` after the run
    #[serde(default)]
    pub wait_for_active: bool,
    /// Batch retry pacing
    #[serde(default)]
    pub retry: RetrySettings,
    /// Table poll pacing
    #[serde(default)]
    pub poll: PollSettings,
    /// Store connection
    #[serde(default)]
    pub store: StoreConfig,
}

fn default_batch_size() -> usize {
    MAX_BATCH
}

fn default_concurrency() -> usize {
    1
}

impl LoaderConfig {
    /// Key spec of the configured key columns
    pub fn key_spec(&self) -> KeySpec {
        KeySpec {
            hash: self.hash_key.clone(),
            range: self.range_key.clone(),
        }
    }

    /// Engine options derived from the configuration
    pub fn engine_options(&self) -> EngineOptions {
        EngineOptions {
            retry: self.retry.into(),
            poll: self.poll.into(),
            concurrency: self.concurrency,
            binary_columns: self.binary_columns.clone(),
            wait_for: self.wait_for_active.then(TargetState::active),
        }
    }

    fn validate(&self) -> Result<(), Error> {
        if self.table.is_empty() {
            return Err(Error::Configuration("table name is empty".to_string()));
        }
        validate_batch_size(self.batch_size)?;
        if self.concurrency == 0 {
            return Err(Error::Configuration(
                "concurrency must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

/// Load the configuration from the environment and an optional TOML file
///
/// Without a file only `DYNAMO_BULK_*` variables are read. Fails with
/// [`Error::Config`] when the sources cannot be parsed and with
/// [`Error::Configuration`] when values are out of range.
pub fn load_config(path: Option<&Path>) -> Result<LoaderConfig, Error> {
    info!(path = ?path, "Loading configuration");

    let figment = Figment::new().merge(Env::prefixed(ENV_PREFIX).split("__"));
    let figment = match path {
        Some(path) => figment.merge(Toml::file(path)),
        None => figment,
    };

    let config: LoaderConfig = figment.extract().map_err(Box::new)?;
    config.validate()?;
    Ok(config)
}
