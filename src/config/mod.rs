//! Configuration management module for the cell logger.
//!
//! Provides hierarchical configuration loading and validation with:
//! - Default values as code base
//! - Environment variable overrides
//! - Configuration file support
//! - Component-wise validation
mod runtime;
mod scheduler;
mod transaction;
mod visibility;
pub use runtime::*;
pub use scheduler::*;
pub use transaction::*;
pub use visibility::*;

use std::env;

use config::Config;
use config::Environment;
use config::File;
use serde::Deserialize;
use serde::Serialize;

use crate::Result;

pub(crate) const ENV_PREFIX: &str = "CELL_LOGGER";
pub(crate) const CONFIG_PATH_ENV: &str = "CONFIG_PATH";

/// Main configuration container for one logger engine instance
///
/// Combines all subsystem configurations with hierarchical override support:
/// 1. Default values from code implementation
/// 2. Configuration file specified by `CONFIG_PATH`
/// 3. Environment variables (highest priority)
#[derive(Debug, Serialize, Deserialize, Clone, Default)]
pub struct LoggerConfig {
    /// Transaction grouping parameters
    #[serde(default)]
    pub transaction: TransactionConfig,
    /// Emission scheduling parameters
    #[serde(default)]
    pub scheduler: SchedulerConfig,
    /// Cell filtering applied before recording
    #[serde(default)]
    pub visibility: VisibilityConfig,
    /// Background task parameters
    #[serde(default)]
    pub runtime: RuntimeConfig,
}

impl LoggerConfig {
    /// Loads configuration from hierarchical sources without validation.
    ///
    /// Configuration sources are merged in the following order (later sources override earlier):
    /// 1. Type defaults (lowest priority)
    /// 2. Configuration file from `CONFIG_PATH` environment variable (if set)
    /// 3. Environment variables with `CELL_LOGGER__` prefix (highest priority)
    ///
    /// # Note
    /// This method does NOT validate the configuration. Callers MUST call `validate()`
    /// before handing the configuration to an engine.
    ///
    /// # Examples
    /// ```ignore
    /// std::env::set_var("CELL_LOGGER__TRANSACTION__DEBOUNCE_MS", "100");
    /// let cfg = LoggerConfig::new()?.validate()?;
    /// ```
    pub fn new() -> Result<Self> {
        let mut builder = Config::builder().add_source(Config::try_from(&Self::default())?);

        if let Ok(config_path) = env::var(CONFIG_PATH_ENV) {
            builder = builder.add_source(File::with_name(&config_path).required(true));
        }

        builder = builder.add_source(
            Environment::with_prefix(ENV_PREFIX)
                .separator("__")
                .ignore_empty(true)
                .try_parsing(true),
        );

        let config: Self = builder.build()?.try_deserialize()?;
        Ok(config)
    }

    /// Applies additional configuration overrides from file without validation.
    ///
    /// Merging order (later sources override earlier):
    /// 1. Current configuration values
    /// 2. New configuration file
    /// 3. Latest environment variables (highest priority)
    pub fn with_override_config(
        &self,
        path: &str,
    ) -> Result<Self> {
        let config: Self = Config::builder()
            .add_source(Config::try_from(self)?)
            .add_source(File::with_name(path))
            .add_source(
                Environment::with_prefix(ENV_PREFIX)
                    .separator("__")
                    .ignore_empty(true)
                    .try_parsing(true),
            )
            .build()?
            .try_deserialize()?;
        Ok(config)
    }

    /// Validates configuration and returns validated instance.
    pub fn validate(self) -> Result<Self> {
        self.transaction.validate()?;
        self.scheduler.validate()?;
        self.visibility.validate()?;
        self.runtime.validate()?;
        Ok(self)
    }
}
