//! Mock providers for testing

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use dashmap::DashMap;

use meridian_core::{
    ConfigProvider, CredentialProvider, LoginRequest, LoginResponse, ProviderError,
};
use meridian_types::{KycLevel, Mode, Principal, PrincipalId, Role, Tier};

/// Build a principal for tests
pub fn test_principal(tier: Tier) -> Principal {
    Principal {
        id: PrincipalId::new(),
        email: format!("test-{}@example.com", PrincipalId::new()),
        role: Role::User,
        tier,
        kyc_level: KycLevel::Basic,
        permissions: vec![],
    }
}

/// In-memory credential service for testing
#[derive(Default)]
pub struct MockCredentialProvider {
    /// email -> (password, principal)
    accounts: DashMap<String, (String, Principal)>,
    /// email -> required two-factor code
    two_factor: DashMap<String, String>,
    /// valid tokens -> principal
    tokens: DashMap<String, Principal>,
    network_down: AtomicBool,
    refresh_down: AtomicBool,
    login_calls: AtomicU32,
    refresh_calls: AtomicU32,
    token_seq: AtomicU32,
}

impl MockCredentialProvider {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an account
    pub fn add_account(&self, email: &str, password: &str, principal: Principal) {
        self.accounts
            .insert(email.to_string(), (password.to_string(), principal));
    }

    /// Require a two-factor code for an account
    pub fn require_two_factor(&self, email: &str, code: &str) {
        self.two_factor.insert(email.to_string(), code.to_string());
    }

    /// Register an already-issued token (for restore tests)
    pub fn insert_token(&self, token: &str, principal: Principal) {
        self.tokens.insert(token.to_string(), principal);
    }

    /// Simulate total network failure
    pub fn set_network_down(&self, down: bool) {
        self.network_down.store(down, Ordering::SeqCst);
    }

    /// Simulate refresh-only failure
    pub fn set_refresh_down(&self, down: bool) {
        self.refresh_down.store(down, Ordering::SeqCst);
    }

    /// Number of login calls that reached the provider
    pub fn login_calls(&self) -> u32 {
        self.login_calls.load(Ordering::SeqCst)
    }

    /// Number of refresh calls that reached the provider
    pub fn refresh_calls(&self) -> u32 {
        self.refresh_calls.load(Ordering::SeqCst)
    }

    fn issue_token(&self) -> String {
        let n = self.token_seq.fetch_add(1, Ordering::SeqCst) + 1;
        format!("token-{n}")
    }
}

#[async_trait]
impl CredentialProvider for MockCredentialProvider {
    async fn login(&self, request: &LoginRequest) -> Result<LoginResponse, ProviderError> {
        self.login_calls.fetch_add(1, Ordering::SeqCst);
        if self.network_down.load(Ordering::SeqCst) {
            return Err(ProviderError::Network("connection refused".into()));
        }

        let Some(entry) = self.accounts.get(&request.email) else {
            return Err(ProviderError::InvalidCredentials);
        };
        let (password, principal) = entry.value();
        if *password != request.password {
            return Err(ProviderError::InvalidCredentials);
        }

        if let Some(required) = self.two_factor.get(&request.email) {
            match &request.two_factor_code {
                None => {
                    return Ok(LoginResponse::TwoFactorRequired {
                        temp_token: format!("2fa-{}", request.email),
                    })
                }
                Some(code) if code != required.value() => {
                    return Err(ProviderError::InvalidCredentials)
                }
                Some(_) => {}
            }
        }

        let token = self.issue_token();
        self.tokens.insert(token.clone(), principal.clone());
        Ok(LoginResponse::Granted {
            token,
            principal: principal.clone(),
        })
    }

    async fn refresh(&self, token: &str) -> Result<String, ProviderError> {
        self.refresh_calls.fetch_add(1, Ordering::SeqCst);
        if self.network_down.load(Ordering::SeqCst) || self.refresh_down.load(Ordering::SeqCst) {
            return Err(ProviderError::Network("connection refused".into()));
        }
        let Some((_, principal)) = self.tokens.remove(token) else {
            return Err(ProviderError::InvalidToken);
        };
        let fresh = self.issue_token();
        self.tokens.insert(fresh.clone(), principal);
        Ok(fresh)
    }

    async fn logout(&self, token: &str) -> Result<(), ProviderError> {
        self.tokens.remove(token);
        Ok(())
    }

    async fn me(&self, token: &str) -> Result<Principal, ProviderError> {
        if self.network_down.load(Ordering::SeqCst) {
            return Err(ProviderError::Network("connection refused".into()));
        }
        self.tokens
            .get(token)
            .map(|r| r.value().clone())
            .ok_or(ProviderError::InvalidToken)
    }
}

/// In-memory configuration service for testing
pub struct MockConfigProvider {
    tier: Mutex<Tier>,
    features: Mutex<HashMap<String, bool>>,
    limits: Mutex<HashMap<String, i64>>,
    network_down: AtomicBool,
    upgrade_rejected: AtomicBool,
    fetch_calls: AtomicU32,
    saved_preferences: Mutex<Vec<Mode>>,
}

impl Default for MockConfigProvider {
    fn default() -> Self {
        Self {
            tier: Mutex::new(Tier::Basic),
            features: Mutex::new(HashMap::new()),
            limits: Mutex::new(HashMap::new()),
            network_down: AtomicBool::new(false),
            upgrade_rejected: AtomicBool::new(false),
            fetch_calls: AtomicU32::new(0),
            saved_preferences: Mutex::new(Vec::new()),
        }
    }
}

impl MockConfigProvider {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_tier(tier: Tier) -> Self {
        let provider = Self::default();
        provider.set_tier(tier);
        provider
    }

    pub fn set_tier(&self, tier: Tier) {
        *self.tier.lock().unwrap() = tier;
    }

    pub fn set_feature(&self, key: &str, enabled: bool) {
        self.features
            .lock()
            .unwrap()
            .insert(key.to_string(), enabled);
    }

    pub fn set_limit(&self, key: &str, value: i64) {
        self.limits.lock().unwrap().insert(key.to_string(), value);
    }

    pub fn clear_limits(&self) {
        self.limits.lock().unwrap().clear();
    }

    pub fn set_network_down(&self, down: bool) {
        self.network_down.store(down, Ordering::SeqCst);
    }

    pub fn set_upgrade_rejected(&self, rejected: bool) {
        self.upgrade_rejected.store(rejected, Ordering::SeqCst);
    }

    pub fn fetch_calls(&self) -> u32 {
        self.fetch_calls.load(Ordering::SeqCst)
    }

    pub fn saved_preferences(&self) -> Vec<Mode> {
        self.saved_preferences.lock().unwrap().clone()
    }

    fn check_network(&self) -> Result<(), ProviderError> {
        if self.network_down.load(Ordering::SeqCst) {
            Err(ProviderError::Network("connection refused".into()))
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl ConfigProvider for MockConfigProvider {
    async fn get_tier(&self, _principal: PrincipalId) -> Result<Tier, ProviderError> {
        self.fetch_calls.fetch_add(1, Ordering::SeqCst);
        self.check_network()?;
        Ok(*self.tier.lock().unwrap())
    }

    async fn get_features(
        &self,
        _principal: PrincipalId,
    ) -> Result<HashMap<String, bool>, ProviderError> {
        self.check_network()?;
        Ok(self.features.lock().unwrap().clone())
    }

    async fn get_limits(
        &self,
        _principal: PrincipalId,
    ) -> Result<HashMap<String, i64>, ProviderError> {
        self.check_network()?;
        Ok(self.limits.lock().unwrap().clone())
    }

    async fn upgrade_tier(
        &self,
        _principal: PrincipalId,
        tier: Tier,
    ) -> Result<(), ProviderError> {
        self.check_network()?;
        if self.upgrade_rejected.load(Ordering::SeqCst) {
            return Err(ProviderError::Rejected("payment required".into()));
        }
        *self.tier.lock().unwrap() = tier;
        Ok(())
    }

    async fn save_preference(
        &self,
        _principal: PrincipalId,
        mode: Mode,
    ) -> Result<(), ProviderError> {
        self.check_network()?;
        self.saved_preferences.lock().unwrap().push(mode);
        Ok(())
    }
}
