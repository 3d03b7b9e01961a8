//! Persisted logical keys

/// Opaque credential token
pub const AUTH_TOKEN: &str = "auth.token";
/// Authenticated principal snapshot
pub const AUTH_PRINCIPAL: &str = "auth.principal";
/// Current (preferred) mode
pub const MODE_CURRENT: &str = "mode.current";
/// Cached tier definition
pub const TIER_CURRENT: &str = "tier.current";
/// Cached feature flag set
pub const TIER_FEATURES_CACHE: &str = "tier.features.cache";
/// Cached per-principal limit overrides
pub const TIER_LIMITS_CACHE: &str = "tier.limits.cache";
/// Lockout expiry timestamp
pub const SESSION_LOCKOUT_UNTIL: &str = "session.lockoutUntil";
/// Consecutive failed login attempts
pub const SESSION_LOGIN_ATTEMPTS: &str = "session.loginAttempts";
