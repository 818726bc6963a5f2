use std::time::Duration;

use crate::domain::ResourceKind;

/// Errors raised by the initialization service.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum InitError {
    /// Extensions can only be initialized with an extension installer.
    #[error("An extension installer is required to initialize {0}")]
    MissingCapability(ResourceKind),

    #[error("Timed out after {after:?} while {operation}")]
    Timeout {
        operation: &'static str,
        after: Duration,
    },
}

/// Result type for initialization operations that can fail to the caller
pub type InitResult<T> = std::result::Result<T, InitError>;
