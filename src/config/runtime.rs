use config::ConfigError;
use serde::Deserialize;
use serde::Serialize;

use crate::Error;
use crate::Result;

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct RuntimeConfig {
    /// Capacity of the command channel feeding the logger task
    #[serde(default = "default_command_buffer")]
    pub command_buffer: usize,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            command_buffer: default_command_buffer(),
        }
    }
}

impl RuntimeConfig {
    pub(super) fn validate(&self) -> Result<()> {
        if self.command_buffer == 0 {
            return Err(Error::Config(ConfigError::Message(
                "runtime.command_buffer must be > 0".into(),
            )));
        }
        Ok(())
    }
}

fn default_command_buffer() -> usize {
    1024
}
