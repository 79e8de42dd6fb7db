//! # Error Types
//!
//! Structured error handling for the dispatch core using thiserror.
//!
//! Routine conditions on the dispatch hot path (invalid handles, double
//! unregistration, reentrant drains, stale completions) are not errors and never
//! surface here. The only failure that propagates out of a drain is a subscriber
//! fault while fault isolation is disabled.

use crate::types::CallbackId;
use thiserror::Error;

/// Failure raised by a subscriber while handling a payload
#[derive(Error, Debug)]
pub enum SubscriberError {
    #[error("Malformed payload for callback {callback_id}: {actual} bytes, expected {expected}")]
    MalformedPayload {
        callback_id: CallbackId,
        expected: usize,
        actual: usize,
    },

    #[error("Subscriber '{subscriber}' failed: {message}")]
    Failed { subscriber: String, message: String },

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl SubscriberError {
    /// Convenience constructor for handler-level failures
    pub fn failed(subscriber: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Failed {
            subscriber: subscriber.into(),
            message: message.into(),
        }
    }
}

/// Configuration loading and validation errors
#[derive(Error, Debug)]
pub enum ConfigurationError {
    #[error("Failed to load configuration: {0}")]
    Load(#[from] config::ConfigError),

    #[error("Invalid configuration value for '{field}': {reason}")]
    InvalidValue { field: String, reason: String },
}

impl ConfigurationError {
    pub fn invalid_value(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidValue {
            field: field.into(),
            reason: reason.into(),
        }
    }
}

/// Errors surfaced by the dispatcher
#[derive(Error, Debug)]
pub enum DispatchError {
    /// A subscriber failed while fault isolation was disabled. The drain that
    /// observed it was abandoned with its dispatch state still marked running.
    #[error("Subscriber '{subscriber}' faulted while handling callback {callback_id}: {source}")]
    SubscriberFault {
        callback_id: CallbackId,
        subscriber: String,
        #[source]
        source: SubscriberError,
    },

    #[error("Configuration error: {0}")]
    Configuration(#[from] ConfigurationError),
}

pub type SubscriberResult = std::result::Result<(), SubscriberError>;

pub type Result<T> = std::result::Result<T, DispatchError>;
