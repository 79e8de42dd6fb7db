//! # Dispatch Configuration
//!
//! Constructor-time settings for a [`Dispatcher`](crate::dispatch::Dispatcher).
//!
//! ## Usage
//!
//! ```rust,no_run
//! use callback_dispatch::config::DispatchConfig;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! // Defaults, then an optional file, then CALLBACK_DISPATCH_* environment variables
//! let config = DispatchConfig::load()?;
//! assert!(config.completion_callback_id > 0);
//! # Ok(())
//! # }
//! ```

pub mod loader;

use crate::constants::callback_ids;
use crate::error::ConfigurationError;
use crate::types::CallbackId;
use serde::{Deserialize, Serialize};

pub use loader::ConfigLoader;

/// Settings consumed by the dispatcher at construction
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DispatchConfig {
    /// Absorb subscriber faults instead of propagating them to the drain caller
    pub isolate_faults: bool,
    /// Message id of the "asynchronous call completed" notification
    pub completion_callback_id: i32,
    /// Emit a debug event for every message no subscriber handled
    pub log_unhandled_messages: bool,
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            isolate_faults: true,
            completion_callback_id: callback_ids::CALL_COMPLETED.0,
            log_unhandled_messages: false,
        }
    }
}

impl DispatchConfig {
    /// Load from the default file location and environment
    pub fn load() -> Result<Self, ConfigurationError> {
        ConfigLoader::new().load()
    }

    /// Load from an explicit file, still honoring environment overrides
    pub fn from_file(path: impl Into<std::path::PathBuf>) -> Result<Self, ConfigurationError> {
        ConfigLoader::new().with_file(path).load()
    }

    /// Load from environment variables only
    pub fn from_env() -> Result<Self, ConfigurationError> {
        ConfigLoader::new().without_file().load()
    }

    pub fn completion_callback_id(&self) -> CallbackId {
        CallbackId(self.completion_callback_id)
    }

    pub fn validate(&self) -> Result<(), ConfigurationError> {
        if self.completion_callback_id <= 0 {
            return Err(ConfigurationError::invalid_value(
                "completion_callback_id",
                format!("must be positive, got {}", self.completion_callback_id),
            ));
        }
        Ok(())
    }

    /// Builder-style toggle for fault isolation
    pub fn with_fault_isolation(mut self, isolate_faults: bool) -> Self {
        self.isolate_faults = isolate_faults;
        self
    }
}
