use std::time::Duration;

use config::ConfigError;
use serde::Deserialize;
use serde::Serialize;

use crate::Error;
use crate::Result;

/// Transaction grouping parameters
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct TransactionConfig {
    /// Quiet period (milliseconds) after the last event before an open
    /// transaction is closed and handed to the scheduler
    #[serde(default = "default_debounce_ms")]
    pub debounce_ms: u64,
}

impl Default for TransactionConfig {
    fn default() -> Self {
        Self {
            debounce_ms: default_debounce_ms(),
        }
    }
}

impl TransactionConfig {
    pub(super) fn validate(&self) -> Result<()> {
        if self.debounce_ms == 0 {
            return Err(Error::Config(ConfigError::Message(
                "transaction.debounce_ms must be greater than 0".into(),
            )));
        }
        Ok(())
    }

    pub fn debounce(&self) -> Duration {
        Duration::from_millis(self.debounce_ms)
    }
}

fn default_debounce_ms() -> u64 {
    250
}
