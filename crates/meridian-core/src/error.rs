//! Core errors

use std::time::Duration;

use thiserror::Error;

/// Errors surfaced by the external credential and configuration services
#[derive(Error, Debug)]
pub enum ProviderError {
    /// Wrong email/password or two-factor code
    #[error("invalid credentials")]
    InvalidCredentials,

    /// Token is malformed, expired, or revoked
    #[error("invalid token")]
    InvalidToken,

    /// The remote service rejected the request
    #[error("request rejected: {0}")]
    Rejected(String),

    /// Transport-level failure
    #[error("network error: {0}")]
    Network(String),

    /// The bounded request timeout elapsed
    #[error("request timed out")]
    Timeout,
}

impl ProviderError {
    /// Returns true for transient failures worth retrying on the next tick
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Network(_) | Self::Timeout)
    }
}

/// Authentication errors
#[derive(Error, Debug)]
pub enum AuthError {
    /// Wrong email/password or two-factor code
    #[error("invalid credentials")]
    InvalidCredentials,

    /// Login is rate-limited after repeated failures
    #[error("login locked out for {retry_after:?}")]
    LockedOut {
        /// Remaining cool-down time
        retry_after: Duration,
    },

    /// Transport-level failure during a user-initiated call
    #[error("network error: {0}")]
    Network(String),

    /// Internal error
    #[error("internal error: {0}")]
    Internal(String),
}

impl AuthError {
    /// Get error code for API consumers
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::InvalidCredentials => "INVALID_CREDENTIALS",
            Self::LockedOut { .. } => "LOGIN_LOCKED_OUT",
            Self::Network(_) => "NETWORK_ERROR",
            Self::Internal(_) => "INTERNAL_ERROR",
        }
    }
}

/// Access controller errors
///
/// Configuration fetch failures never appear here: they are absorbed into
/// the cache/fail-closed fallback. Insufficient tier is a signaled switch
/// outcome, not an error.
#[derive(Error, Debug)]
pub enum AccessError {
    /// The remote service rejected a tier upgrade
    #[error("tier upgrade rejected: {0}")]
    UpgradeRejected(String),

    /// Transport-level failure during a tier upgrade
    #[error("network error: {0}")]
    Network(String),

    /// No principal configuration has been loaded
    #[error("no configuration loaded")]
    NotLoaded,
}

impl AccessError {
    /// Get error code for API consumers
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::UpgradeRejected(_) => "UPGRADE_REJECTED",
            Self::Network(_) => "NETWORK_ERROR",
            Self::NotLoaded => "NOT_LOADED",
        }
    }
}
