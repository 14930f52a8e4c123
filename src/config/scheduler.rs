use std::time::Duration;

use config::ConfigError;
use serde::Deserialize;
use serde::Serialize;

use crate::Error;
use crate::Result;

/// How the scheduler yields between slices
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum SchedulingMode {
    /// Yield to the host between slices and resume when idle (or when the
    /// idle timeout forces it)
    #[default]
    Idle,
    /// Never yield: every `add` drains the queue synchronously
    Immediate,
}

/// Emission scheduling parameters
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct SchedulerConfig {
    #[serde(default)]
    pub mode: SchedulingMode,

    /// Processing time allowed per slice (milliseconds). 0 disables budgeting
    /// and drains the whole queue in one pass.
    #[serde(default = "default_slice_budget_ms")]
    pub slice_budget_ms: u64,

    /// Longest a pending slice may wait for an idle turn (milliseconds)
    #[serde(default = "default_idle_timeout_ms")]
    pub idle_timeout_ms: u64,

    /// Minimal delay before the next slice is attempted (milliseconds)
    #[serde(default = "default_resume_delay_ms")]
    pub resume_delay_ms: u64,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            mode: SchedulingMode::default(),
            slice_budget_ms: default_slice_budget_ms(),
            idle_timeout_ms: default_idle_timeout_ms(),
            resume_delay_ms: default_resume_delay_ms(),
        }
    }
}

impl SchedulerConfig {
    pub(super) fn validate(&self) -> Result<()> {
        if self.idle_timeout_ms == 0 {
            return Err(Error::Config(ConfigError::Message(
                "scheduler.idle_timeout_ms must be greater than 0".into(),
            )));
        }

        if self.resume_delay_ms > self.idle_timeout_ms {
            return Err(Error::Config(ConfigError::Message(format!(
                "scheduler.resume_delay_ms ({}) must not exceed scheduler.idle_timeout_ms ({})",
                self.resume_delay_ms, self.idle_timeout_ms
            ))));
        }
        Ok(())
    }

    /// `None` when budgeting is disabled
    pub fn slice_budget(&self) -> Option<Duration> {
        match self.slice_budget_ms {
            0 => None,
            ms => Some(Duration::from_millis(ms)),
        }
    }

    pub fn idle_timeout(&self) -> Duration {
        Duration::from_millis(self.idle_timeout_ms)
    }

    pub fn resume_delay(&self) -> Duration {
        Duration::from_millis(self.resume_delay_ms)
    }
}

fn default_slice_budget_ms() -> u64 {
    16
}
fn default_idle_timeout_ms() -> u64 {
    250
}
fn default_resume_delay_ms() -> u64 {
    1
}
