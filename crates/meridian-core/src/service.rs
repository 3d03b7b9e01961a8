//! Identity service - ties together the session manager, access controller,
//! and event bus
//!
//! One instance is constructed per process and handed to consumers
//! explicitly; nothing in this crate is reachable through a global.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::broadcast;

use meridian_store::LocalStore;
use meridian_types::{
    AppEvent, Feature, LimitKind, LogoutReason, Mode, Principal, Session, SessionState, Tier,
};

use crate::access::{AccessController, SwitchOutcome};
use crate::bus::EventBus;
use crate::config::CoreConfig;
use crate::error::{AccessError, AuthError};
use crate::provider::{ConfigProvider, CredentialProvider, LoginRequest};
use crate::session::{LoginOutcome, SessionManager};

/// Facade over the session and access state machines
///
/// Coordinates the edges that cross the two machines: a successful login
/// loads configuration, and a logout clears any pending mode switch before
/// the session is torn down.
pub struct IdentityService<C, P, S> {
    session: SessionManager<C, S>,
    access: AccessController<P, S>,
    bus: EventBus,
}

impl<C, P, S> IdentityService<C, P, S>
where
    C: CredentialProvider + 'static,
    P: ConfigProvider + 'static,
    S: LocalStore + 'static,
{
    /// Create the identity service
    ///
    /// Must be called inside a Tokio runtime.
    pub fn new(
        config: CoreConfig,
        credentials: Arc<C>,
        configuration: Arc<P>,
        store: Arc<S>,
    ) -> Self {
        let bus = EventBus::new();
        let session = SessionManager::new(
            config.session,
            credentials,
            Arc::clone(&store),
            bus.clone(),
        );
        let access = AccessController::new(config.access, configuration, store, bus.clone());
        Self {
            session,
            access,
            bus,
        }
    }

    /// Authenticate and, on success, load the principal's configuration
    pub async fn login(&self, request: &LoginRequest) -> Result<LoginOutcome, AuthError> {
        let outcome = self.session.login(request).await?;
        if let LoginOutcome::LoggedIn(session) = &outcome {
            self.access.load_configuration(&session.principal).await;
            self.access.start_resync(&session.principal);
        }
        Ok(outcome)
    }

    /// User-initiated logout
    pub fn logout(&self) {
        self.logout_with(LogoutReason::Manual);
    }

    /// Terminate the session with an explicit reason
    ///
    /// A pending mode switch never survives a logout.
    pub fn logout_with(&self, reason: LogoutReason) {
        self.access.reset();
        self.session.logout(reason);
    }

    /// Restore a session from the persisted token
    pub async fn check_auth(&self) -> bool {
        if !self.session.check_auth().await {
            return false;
        }
        if let Some(principal) = self.session.principal() {
            self.access.load_configuration(&principal).await;
            self.access.start_resync(&principal);
        }
        true
    }

    /// Feed from the external activity probe
    pub fn record_activity(&self) {
        self.session.record_activity();
    }

    /// Confirm the stay-logged-in prompt
    pub fn stay_logged_in(&self) -> bool {
        self.session.stay_logged_in()
    }

    /// Request a mode switch
    pub fn switch_mode(&self, target: Mode, require_confirmation: bool) -> SwitchOutcome {
        self.access.switch_mode(target, require_confirmation)
    }

    /// Confirm the pending mode switch
    pub fn confirm_switch(&self) -> SwitchOutcome {
        self.access.confirm_switch()
    }

    /// Cancel the pending mode switch
    pub fn cancel_switch(&self) -> bool {
        self.access.cancel_switch()
    }

    /// Check a feature gate
    pub fn has_feature(&self, feature: Feature) -> bool {
        self.access.has_feature(feature)
    }

    /// Check a usage limit
    pub fn is_limit_reached(&self, kind: LimitKind, current: i64) -> bool {
        self.access.is_limit_reached(kind, current)
    }

    /// Request a tier upgrade
    pub async fn upgrade_tier(&self, tier: Tier) -> Result<(), AccessError> {
        self.access.upgrade_tier(tier).await
    }

    /// Subscribe to committed session and access changes
    pub fn subscribe(&self) -> broadcast::Receiver<AppEvent> {
        self.bus.subscribe()
    }

    /// Current session state
    pub fn state(&self) -> SessionState {
        self.session.state()
    }

    /// The authenticated principal, if any
    pub fn principal(&self) -> Option<Principal> {
        self.session.principal()
    }

    /// The current session, if any
    pub fn session(&self) -> Option<Session> {
        self.session.session()
    }

    /// Current mode
    pub fn mode(&self) -> Mode {
        self.access.mode()
    }

    /// Current tier
    pub fn tier(&self) -> Tier {
        self.access.tier()
    }

    /// Remaining lockout cool-down, if any
    pub fn remaining_lockout(&self) -> Option<Duration> {
        self.session.remaining_lockout()
    }

    /// Cancel every timer owned by either state machine
    pub fn shutdown(&self) {
        self.session.shutdown();
        self.access.shutdown();
    }

    /// The underlying session manager
    pub fn session_manager(&self) -> &SessionManager<C, S> {
        &self.session
    }

    /// The underlying access controller
    pub fn access_controller(&self) -> &AccessController<P, S> {
        &self.access
    }
}

impl<C, P, S> std::fmt::Debug for IdentityService<C, P, S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IdentityService").finish_non_exhaustive()
    }
}
