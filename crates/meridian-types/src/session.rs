//! Session types

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::Principal;

/// Session state machine states
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionState {
    /// No authenticated principal
    Anonymous,
    /// Login in flight
    Authenticating,
    /// Authenticated and within the idle deadline
    Active,
    /// Approaching expiry; awaiting a stay-logged-in confirmation
    Warning,
    /// Idle deadline passed without confirmation
    Expired,
    /// Login locked out after repeated failures
    Locked,
}

impl SessionState {
    /// True for states holding an authenticated principal
    pub fn is_authenticated(&self) -> bool {
        matches!(self, Self::Active | Self::Warning)
    }
}

/// An authenticated session
///
/// Exactly one exists per process lifetime, or none (anonymous). Mutated
/// only by the session manager.
#[derive(Debug, Clone)]
pub struct Session {
    /// The authenticated principal
    pub principal: Principal,
    /// When the session was established
    pub issued_at: DateTime<Utc>,
    /// When the session expires absent further activity
    pub idle_deadline: DateTime<Utc>,
    /// When the next background token refresh is due
    pub refresh_deadline: DateTime<Utc>,
}

/// Why a session was terminated
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogoutReason {
    /// User-initiated logout
    Manual,
    /// Idle deadline reached without confirmation
    SessionExpired,
    /// Persisted token failed re-validation
    TokenInvalid,
}

impl LogoutReason {
    /// Get the reason tag string
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Manual => "manual",
            Self::SessionExpired => "session_expired",
            Self::TokenInvalid => "token_invalid",
        }
    }
}

impl std::fmt::Display for LogoutReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
