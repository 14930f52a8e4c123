use config::ConfigError;
use serde::Deserialize;
use serde::Serialize;

use crate::Error;
use crate::Result;

/// Label-based cell filtering
#[derive(Debug, Serialize, Deserialize, Clone, Default)]
pub struct VisibilityConfig {
    /// Cells whose label starts with any of these prefixes are not logged
    #[serde(default)]
    pub hidden_prefixes: Vec<String>,
}

impl VisibilityConfig {
    pub(super) fn validate(&self) -> Result<()> {
        if self.hidden_prefixes.iter().any(|p| p.is_empty()) {
            return Err(Error::Config(ConfigError::Message(
                "visibility.hidden_prefixes cannot contain an empty prefix".into(),
            )));
        }
        Ok(())
    }
}
