//! Configuration types for the session manager and access controller

use std::time::Duration;

/// Session manager configuration
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Idle duration after which a session expires
    pub session_duration: Duration,
    /// How long before expiry the stay-logged-in warning is raised
    pub warning_time: Duration,
    /// Interval between background token refreshes
    pub token_refresh_interval: Duration,
    /// Bounded timeout applied to every credential service call
    pub request_timeout: Duration,
    /// Consecutive failed logins before lockout
    pub max_login_attempts: u32,
    /// Minimum spacing between idle-timer resets from the activity probe
    pub activity_throttle: Duration,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            session_duration: Duration::from_secs(30 * 60),
            warning_time: Duration::from_secs(60),
            token_refresh_interval: Duration::from_secs(10 * 60),
            request_timeout: Duration::from_secs(10),
            max_login_attempts: 5,
            activity_throttle: Duration::from_secs(1),
        }
    }
}

impl SessionConfig {
    /// Create a session config with default values
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the idle session duration
    #[must_use]
    pub fn with_session_duration(mut self, duration: Duration) -> Self {
        self.session_duration = duration;
        self
    }

    /// Set the pre-expiry warning window
    #[must_use]
    pub fn with_warning_time(mut self, duration: Duration) -> Self {
        self.warning_time = duration;
        self
    }

    /// Set the token refresh interval
    #[must_use]
    pub fn with_token_refresh_interval(mut self, interval: Duration) -> Self {
        self.token_refresh_interval = interval;
        self
    }

    /// Set the credential service request timeout
    #[must_use]
    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    /// Set the failed-login lockout threshold
    #[must_use]
    pub fn with_max_login_attempts(mut self, attempts: u32) -> Self {
        self.max_login_attempts = attempts;
        self
    }
}

/// Access controller configuration
#[derive(Debug, Clone)]
pub struct AccessConfig {
    /// Bounded timeout applied to every configuration service call
    pub fetch_timeout: Duration,
    /// Periodic configuration re-fetch interval; `None` disables resync
    pub resync_interval: Option<Duration>,
}

impl Default for AccessConfig {
    fn default() -> Self {
        Self {
            fetch_timeout: Duration::from_secs(10),
            resync_interval: None,
        }
    }
}

impl AccessConfig {
    /// Create an access config with default values
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the configuration service fetch timeout
    #[must_use]
    pub fn with_fetch_timeout(mut self, timeout: Duration) -> Self {
        self.fetch_timeout = timeout;
        self
    }

    /// Enable periodic configuration resync
    #[must_use]
    pub fn with_resync_interval(mut self, interval: Duration) -> Self {
        self.resync_interval = Some(interval);
        self
    }
}

/// Combined configuration for the identity service facade
#[derive(Debug, Clone, Default)]
pub struct CoreConfig {
    /// Session manager configuration
    pub session: SessionConfig,
    /// Access controller configuration
    pub access: AccessConfig,
}
