use std::{fs::File, io::BufReader, path::Path};

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),
    #[error("Failed to parse config file: {0}")]
    Parse(#[from] serde_json::Error),
}

/// Engine-wide execution policy.
///
/// Individual rules can still opt into halting via
/// [`Rule::with_halt_on_failure`](crate::rule::Rule::with_halt_on_failure);
/// the engine halts when either the global flag or the rule's flag is set.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Abort the whole run on the first failed rule instead of continuing
    /// with the next one.
    #[serde(default)]
    pub halt_on_failure: bool,

    /// Reset the parameter store when moving to the next rule, so condition
    /// captures never leak across rule boundaries.
    #[serde(default = "default_clear_parameters")]
    pub clear_parameters_between_rules: bool,
}

fn default_clear_parameters() -> bool {
    true
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            halt_on_failure: false,
            clear_parameters_between_rules: default_clear_parameters(),
        }
    }
}

impl EngineConfig {
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let file = File::open(path)?;
        let reader = BufReader::new(file);
        let config = serde_json::from_reader(reader)?;
        Ok(config)
    }
}
