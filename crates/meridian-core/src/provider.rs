//! Provider traits for the external credential and configuration services
//!
//! These are the seams to the out-of-scope collaborators: the credential
//! service that issues and validates tokens, and the remote configuration
//! service that supplies tier, feature flags, and usage limits.

use std::collections::HashMap;
use std::future::Future;
use std::time::Duration;

use async_trait::async_trait;

use meridian_types::{Mode, Principal, PrincipalId, Tier};

use crate::error::ProviderError;

/// Login call input
#[derive(Debug, Clone)]
pub struct LoginRequest {
    /// Account email
    pub email: String,
    /// Account password
    pub password: String,
    /// Two-factor code, when completing a challenged login
    pub two_factor_code: Option<String>,
}

impl LoginRequest {
    /// Create a password-only login request
    pub fn new(email: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            email: email.into(),
            password: password.into(),
            two_factor_code: None,
        }
    }

    /// Attach a two-factor code
    #[must_use]
    pub fn with_two_factor_code(mut self, code: impl Into<String>) -> Self {
        self.two_factor_code = Some(code.into());
        self
    }
}

/// Successful login call result
#[derive(Debug, Clone)]
pub enum LoginResponse {
    /// Credentials accepted
    Granted {
        /// Opaque session token
        token: String,
        /// The authenticated principal
        principal: Principal,
    },
    /// A second factor is required before a token is issued
    TwoFactorRequired {
        /// Short-lived token identifying the pending challenge
        temp_token: String,
    },
}

/// Credential service: issues, validates, and refreshes tokens
#[async_trait]
pub trait CredentialProvider: Send + Sync {
    /// Authenticate with credentials
    async fn login(&self, request: &LoginRequest) -> Result<LoginResponse, ProviderError>;

    /// Exchange a token for a fresh one
    async fn refresh(&self, token: &str) -> Result<String, ProviderError>;

    /// Invalidate a token server-side
    async fn logout(&self, token: &str) -> Result<(), ProviderError>;

    /// Fetch the principal a token belongs to
    async fn me(&self, token: &str) -> Result<Principal, ProviderError>;
}

/// Remote configuration service: tier, feature flags, and usage limits
#[async_trait]
pub trait ConfigProvider: Send + Sync {
    /// Fetch the principal's subscription tier
    async fn get_tier(&self, principal: PrincipalId) -> Result<Tier, ProviderError>;

    /// Fetch the principal's feature flags (string-keyed; validated by the
    /// caller against the known feature set)
    async fn get_features(
        &self,
        principal: PrincipalId,
    ) -> Result<HashMap<String, bool>, ProviderError>;

    /// Fetch the principal's limit overrides (`-1` = unlimited)
    async fn get_limits(
        &self,
        principal: PrincipalId,
    ) -> Result<HashMap<String, i64>, ProviderError>;

    /// Request a tier upgrade
    async fn upgrade_tier(&self, principal: PrincipalId, tier: Tier) -> Result<(), ProviderError>;

    /// Persist the preferred mode remotely (best-effort at call sites)
    async fn save_preference(
        &self,
        principal: PrincipalId,
        mode: Mode,
    ) -> Result<(), ProviderError>;
}

/// Bound a provider call with the configured request timeout
///
/// An elapsed timeout maps to [`ProviderError::Timeout`] and is classified
/// like any other transient network failure.
pub(crate) async fn with_timeout<T, F>(limit: Duration, fut: F) -> Result<T, ProviderError>
where
    F: Future<Output = Result<T, ProviderError>>,
{
    match tokio::time::timeout(limit, fut).await {
        Ok(result) => result,
        Err(_) => Err(ProviderError::Timeout),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn test_with_timeout_elapses() {
        let slow = async {
            tokio::time::sleep(Duration::from_secs(60)).await;
            Ok::<_, ProviderError>(1u8)
        };
        let result = with_timeout(Duration::from_secs(5), slow).await;
        assert!(matches!(result, Err(ProviderError::Timeout)));
    }

    #[tokio::test]
    async fn test_with_timeout_passes_through() {
        let fast = async { Ok::<_, ProviderError>(7u8) };
        assert_eq!(with_timeout(Duration::from_secs(5), fast).await.unwrap(), 7);
    }
}
