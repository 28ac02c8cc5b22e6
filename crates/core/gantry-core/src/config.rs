//! Runtime settings for the connector runtime.
//!
//! Settings are layered with the `config` crate: built-in defaults first, then
//! an optional TOML or JSON file, then `GANTRY_`-prefixed environment variables.
//! Nested keys use a double underscore, e.g. `GANTRY_LOGGING__LEVEL=debug`.

use crate::{traits::Validatable, GantryError, GantryResult};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Environment variable prefix for settings overrides
pub const ENV_PREFIX: &str = "GANTRY";

/// Default budget for attribute reads, writes and operation invocations
pub const DEFAULT_TIMEOUT_MS: u64 = 5_000;

/// How notification listeners are dispatched when a descriptor fires
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InvokerKind {
    /// Listeners run one after another on the firing thread
    #[default]
    Sequential,
    /// Listeners are spread across a bounded set of worker threads
    Parallel,
}

/// Logging settings consumed by [`crate::observability::init_tracing`]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoggingSettings {
    /// Default filter directive, overridden by `RUST_LOG` when set
    pub level: String,
    /// Emit JSON lines instead of human readable output
    pub json: bool,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json: false,
        }
    }
}

/// Settings shared by every connector instance in one process
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RuntimeSettings {
    /// Default read/write/invoke timeout in milliseconds
    pub default_timeout_ms: u64,
    /// Notification dispatch strategy
    pub invoker: InvokerKind,
    /// Worker threads used by the parallel invoker
    pub invoker_parallelism: usize,
    /// Logging configuration
    pub logging: LoggingSettings,
}

impl Default for RuntimeSettings {
    fn default() -> Self {
        Self {
            default_timeout_ms: DEFAULT_TIMEOUT_MS,
            invoker: InvokerKind::Sequential,
            invoker_parallelism: 4,
            logging: LoggingSettings::default(),
        }
    }
}

impl RuntimeSettings {
    /// Load settings from defaults, an optional file and the environment
    pub fn load(path: Option<&Path>) -> GantryResult<Self> {
        let defaults = Self::default();
        let mut builder = config::Config::builder()
            .set_default("default_timeout_ms", defaults.default_timeout_ms as i64)?
            .set_default("invoker", "sequential")?
            .set_default("invoker_parallelism", defaults.invoker_parallelism as i64)?
            .set_default("logging.level", defaults.logging.level.clone())?
            .set_default("logging.json", defaults.logging.json)?;

        if let Some(path) = path {
            if !path.exists() {
                return Err(GantryError::config(format!(
                    "settings file '{}' does not exist",
                    path.display()
                )));
            }
            builder = builder.add_source(config::File::from(path).required(true));
        }

        let settings: Self = builder
            .add_source(
                config::Environment::with_prefix(ENV_PREFIX)
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?
            .try_deserialize()?;

        settings.validate()?;
        tracing::debug!(
            timeout_ms = settings.default_timeout_ms,
            invoker = ?settings.invoker,
            "Runtime settings loaded"
        );
        Ok(settings)
    }

    /// The default timeout as a [`Duration`]
    #[must_use]
    pub fn default_timeout(&self) -> Duration {
        Duration::from_millis(self.default_timeout_ms)
    }
}

impl Validatable for RuntimeSettings {
    fn validate(&self) -> GantryResult<()> {
        if self.default_timeout_ms == 0 {
            return Err(GantryError::config("default_timeout_ms must be greater than zero"));
        }
        if self.invoker_parallelism == 0 {
            return Err(GantryError::config("invoker_parallelism must be greater than zero"));
        }
        if self.logging.level.trim().is_empty() {
            return Err(GantryError::config("logging.level must not be empty"));
        }
        Ok(())
    }
}
