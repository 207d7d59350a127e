//! Core shared types for the Postmesh relay node.
//!
//! This crate defines the request envelope ([`RpcMessage`] /
//! [`MessageBody`]) and the central error type. Every other crate in
//! the workspace converts its failures into [`PostmeshError`] instead
//! of growing its own error surface.

pub mod message;

use thiserror::Error;

pub use message::{MessageBody, MessageType, RpcMessage};

// ---------------------------------------------------------------------------
// PostmeshError
// ---------------------------------------------------------------------------

/// Central error type for the Postmesh system.
///
/// All crates in the workspace convert their internal errors into variants
/// of this enum, ensuring a unified error handling surface.
#[derive(Debug, Error)]
pub enum PostmeshError {
    /// An `RpcMessage` or its body is malformed, carries a disallowed
    /// service/method, or fails validation.
    #[error("invalid message: {reason}")]
    InvalidMessage {
        /// Human-readable description of the validation failure.
        reason: String,
    },

    /// A configuration value is invalid or missing.
    #[error("config error: {reason}")]
    ConfigError {
        /// Human-readable description of the configuration problem.
        reason: String,
    },

    /// A networking or transport operation failed.
    #[error("network error: {reason}")]
    NetworkError {
        /// Human-readable description of the network failure.
        reason: String,
    },

    /// A business-service or store operation failed.
    #[error("store error: {reason}")]
    StoreError {
        /// Human-readable description of the store failure.
        reason: String,
    },

    /// The caller has exceeded the allowed request rate.
    #[error("rate limit exceeded: {reason}")]
    RateLimitExceeded {
        /// Human-readable description including the limit and window.
        reason: String,
    },
}

// ---------------------------------------------------------------------------
// Result alias
// ---------------------------------------------------------------------------

/// Convenience result type using [`PostmeshError`].
pub type Result<T> = std::result::Result<T, PostmeshError>;

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_display_includes_reason() {
        let err = PostmeshError::InvalidMessage {
            reason: "missing wallet".into(),
        };
        assert_eq!(err.to_string(), "invalid message: missing wallet");
    }

    #[test]
    fn config_error_display() {
        let err = PostmeshError::ConfigError {
            reason: "empty topic".into(),
        };
        assert!(err.to_string().contains("config error"));
    }
}
