//! Session management
//!
//! Owns the authenticated [`Principal`] and its temporal validity: idle
//! timeout with a pre-expiry warning, background token refresh, and login
//! lockout after repeated failures.
//!
//! Timer discipline: every (re)arm bumps a generation counter and each
//! spawned task re-checks its captured generation under the state lock
//! before acting, so a late callback can never touch a newer or destroyed
//! session. The idle and refresh timers are cancelled together, atomically,
//! on logout.

use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::task::JoinHandle;
use tokio::time::Instant;

use meridian_store::{keys, LocalStore, StoreExt};
use meridian_types::{AppEvent, LogoutReason, Principal, Session, SessionState};

use crate::bus::EventBus;
use crate::config::SessionConfig;
use crate::error::{AuthError, ProviderError};
use crate::provider::{with_timeout, CredentialProvider, LoginRequest, LoginResponse};

/// Outcome of a login call
#[derive(Debug, Clone)]
pub enum LoginOutcome {
    /// A session was established
    LoggedIn(Session),
    /// A second factor is required; repeat the login with the code attached
    TwoFactorRequired {
        /// Short-lived token identifying the pending challenge
        temp_token: String,
    },
}

struct SessionData {
    phase: SessionState,
    session: Option<Session>,
    token: Option<String>,
    attempts: u32,
    lockout_until: Option<DateTime<Utc>>,
    last_activity: Option<Instant>,
    /// Session generation; bumped on establish and logout
    epoch: u64,
    /// Idle-timer generation; additionally bumped on every idle reset
    idle_gen: u64,
    idle_task: Option<JoinHandle<()>>,
    refresh_task: Option<JoinHandle<()>>,
    unlock_task: Option<JoinHandle<()>>,
}

impl SessionData {
    fn remaining_lockout(&self) -> Option<Duration> {
        let until = self.lockout_until?;
        (until - Utc::now()).to_std().ok().filter(|d| !d.is_zero())
    }

    fn abort_session_timers(&mut self) {
        if let Some(task) = self.idle_task.take() {
            task.abort();
        }
        if let Some(task) = self.refresh_task.take() {
            task.abort();
        }
    }
}

struct SessionInner<C, S> {
    config: SessionConfig,
    provider: Arc<C>,
    store: Arc<S>,
    bus: EventBus,
    state: Mutex<SessionData>,
}

/// Session manager: the authentication state machine
///
/// States: `Anonymous`, `Authenticating`, `Active`, `Warning`, `Expired`,
/// `Locked`. Cheap to clone; clones share state. Must be constructed inside
/// a Tokio runtime (timers are spawned tasks).
pub struct SessionManager<C, S> {
    inner: Arc<SessionInner<C, S>>,
}

impl<C, S> Clone for SessionManager<C, S> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<C, S> SessionManager<C, S>
where
    C: CredentialProvider + 'static,
    S: LocalStore + 'static,
{
    /// Create a session manager
    ///
    /// A lockout persisted by a previous process lifetime is restored and
    /// its unlock timer re-armed for the remaining time.
    pub fn new(config: SessionConfig, provider: Arc<C>, store: Arc<S>, bus: EventBus) -> Self {
        let attempts = store.get_json::<u32>(keys::SESSION_LOGIN_ATTEMPTS).unwrap_or(0);
        let lockout_until = store
            .get_json::<DateTime<Utc>>(keys::SESSION_LOCKOUT_UNTIL)
            .filter(|until| *until > Utc::now());

        let phase = if lockout_until.is_some() {
            SessionState::Locked
        } else {
            SessionState::Anonymous
        };

        let manager = Self {
            inner: Arc::new(SessionInner {
                config,
                provider,
                store,
                bus,
                state: Mutex::new(SessionData {
                    phase,
                    session: None,
                    token: None,
                    attempts,
                    lockout_until,
                    last_activity: None,
                    epoch: 0,
                    idle_gen: 0,
                    idle_task: None,
                    refresh_task: None,
                    unlock_task: None,
                }),
            }),
        };

        if let Some(until) = lockout_until {
            tracing::info!(%until, "restoring persisted login lockout");
            let clone = manager.clone();
            manager.lock().unlock_task = Some(tokio::spawn(clone.unlock_loop(until)));
        }

        manager
    }

    /// Authenticate with credentials
    ///
    /// While a lockout is active the credential service is never contacted.
    /// Transport failures surface as [`AuthError::Network`] and do not count
    /// toward the lockout threshold; only rejected credentials do.
    pub async fn login(&self, request: &LoginRequest) -> Result<LoginOutcome, AuthError> {
        {
            let mut data = self.lock();
            if let Some(retry_after) = data.remaining_lockout() {
                return Err(AuthError::LockedOut { retry_after });
            }
            // A lockout that elapsed while the process was running
            if data.lockout_until.is_some() {
                self.clear_lockout(&mut data);
            }
            if !data.phase.is_authenticated() {
                data.phase = SessionState::Authenticating;
            }
        }

        let result = with_timeout(
            self.inner.config.request_timeout,
            self.inner.provider.login(request),
        )
        .await;

        match result {
            Ok(LoginResponse::Granted { token, principal }) => {
                let session = self.establish(token, principal);
                Ok(LoginOutcome::LoggedIn(session))
            }
            Ok(LoginResponse::TwoFactorRequired { temp_token }) => {
                let mut data = self.lock();
                if data.phase == SessionState::Authenticating {
                    data.phase = SessionState::Anonymous;
                }
                Ok(LoginOutcome::TwoFactorRequired { temp_token })
            }
            Err(ProviderError::InvalidCredentials | ProviderError::InvalidToken) => {
                metrics::counter!("meridian_login_failures").increment(1);
                match self.record_failed_attempt() {
                    Some(retry_after) => Err(AuthError::LockedOut { retry_after }),
                    None => Err(AuthError::InvalidCredentials),
                }
            }
            Err(err) => {
                // Connectivity must not count toward lockout
                tracing::warn!(%err, "login failed with transport error");
                let mut data = self.lock();
                if data.phase == SessionState::Authenticating {
                    data.phase = SessionState::Anonymous;
                }
                Err(AuthError::Network(err.to_string()))
            }
        }
    }

    /// Terminate the session from any state
    ///
    /// Cancels the idle and refresh timers atomically, clears the principal
    /// and persisted auth state (lockout keys are untouched), publishes
    /// [`AppEvent::SessionEnded`], and fires a best-effort remote logout.
    pub fn logout(&self, reason: LogoutReason) {
        self.clear_session(reason, true);
    }

    /// Re-validate the persisted token against the credential service
    ///
    /// Idempotent. On success the session is (re)built and the principal
    /// replaced with the freshly fetched one. An invalid token clears the
    /// persisted auth state silently; a transient network failure leaves it
    /// in place for a later retry. Never returns an error.
    pub async fn check_auth(&self) -> bool {
        let token = {
            let data = self.lock();
            data.token.clone()
        }
        .or_else(|| self.inner.store.get(keys::AUTH_TOKEN));

        let Some(token) = token else {
            return false;
        };

        match with_timeout(
            self.inner.config.request_timeout,
            self.inner.provider.me(&token),
        )
        .await
        {
            Ok(principal) => {
                let authenticated = {
                    let mut data = self.lock();
                    if data.phase.is_authenticated() {
                        if let Some(session) = data.session.as_mut() {
                            session.principal = principal.clone();
                        }
                        true
                    } else {
                        false
                    }
                };
                if authenticated {
                    self.inner.store.set_json(keys::AUTH_PRINCIPAL, &principal);
                } else {
                    self.establish(token, principal);
                }
                true
            }
            Err(err) if err.is_retryable() => {
                tracing::warn!(%err, "auth check failed with transport error");
                false
            }
            Err(err) => {
                tracing::debug!(%err, "persisted token rejected");
                let was_authenticated = self.lock().phase.is_authenticated();
                if was_authenticated {
                    self.clear_session(LogoutReason::TokenInvalid, false);
                } else {
                    self.inner.store.remove(keys::AUTH_TOKEN);
                    self.inner.store.remove(keys::AUTH_PRINCIPAL);
                    self.lock().token = None;
                }
                false
            }
        }
    }

    /// Reset the idle timer from the external activity probe
    ///
    /// Throttled to once per [`SessionConfig::activity_throttle`] to bound
    /// timer churn. Only acts in `Active`: dismissing the expiry warning
    /// requires an explicit [`Self::stay_logged_in`].
    pub fn record_activity(&self) {
        let mut data = self.lock();
        if data.phase != SessionState::Active {
            return;
        }
        if let Some(last) = data.last_activity {
            if last.elapsed() < self.inner.config.activity_throttle {
                return;
            }
        }
        data.last_activity = Some(Instant::now());
        self.rearm_idle_timer(&mut data);
    }

    /// Confirm the stay-logged-in prompt
    ///
    /// Returns to `Active` with a fresh idle timer; `false` when no warning
    /// is pending.
    pub fn stay_logged_in(&self) -> bool {
        let mut data = self.lock();
        if data.phase != SessionState::Warning {
            return false;
        }
        data.phase = SessionState::Active;
        data.last_activity = Some(Instant::now());
        self.rearm_idle_timer(&mut data);
        true
    }

    /// Current state machine phase
    pub fn state(&self) -> SessionState {
        self.lock().phase
    }

    /// The authenticated principal, if any
    pub fn principal(&self) -> Option<Principal> {
        self.lock().session.as_ref().map(|s| s.principal.clone())
    }

    /// The current session, if any
    pub fn session(&self) -> Option<Session> {
        self.lock().session.clone()
    }

    /// Remaining lockout cool-down, if a lockout is active
    pub fn remaining_lockout(&self) -> Option<Duration> {
        self.lock().remaining_lockout()
    }

    /// Cancel every timer without touching persisted state
    ///
    /// Component teardown; [`Self::logout`] performs the same cancellation
    /// as a side effect.
    pub fn shutdown(&self) {
        let mut data = self.lock();
        data.epoch += 1;
        data.abort_session_timers();
        if let Some(task) = data.unlock_task.take() {
            task.abort();
        }
    }

    // =========================================================================
    // Internals
    // =========================================================================

    fn lock(&self) -> MutexGuard<'_, SessionData> {
        self.inner.state.lock().expect("session state lock poisoned")
    }

    fn idle_deadline_from(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        now + chrono::Duration::seconds(self.inner.config.session_duration.as_secs() as i64)
    }

    fn refresh_deadline_from(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        now + chrono::Duration::seconds(self.inner.config.token_refresh_interval.as_secs() as i64)
    }

    /// Install a fresh session: reset counters, persist, arm timers, publish
    fn establish(&self, token: String, principal: Principal) -> Session {
        let now = Utc::now();
        let session = Session {
            principal: principal.clone(),
            issued_at: now,
            idle_deadline: self.idle_deadline_from(now),
            refresh_deadline: self.refresh_deadline_from(now),
        };

        {
            let mut data = self.lock();
            self.clear_lockout(&mut data);
            data.epoch += 1;
            data.idle_gen += 1;
            data.abort_session_timers();
            data.phase = SessionState::Active;
            data.session = Some(session.clone());
            data.token = Some(token.clone());
            data.last_activity = None;

            let epoch = data.epoch;
            let idle_gen = data.idle_gen;
            data.idle_task = Some(tokio::spawn(self.clone().idle_loop(epoch, idle_gen)));
            data.refresh_task = Some(tokio::spawn(self.clone().refresh_loop(epoch)));
        }

        // Persist before broadcast
        self.inner.store.set(keys::AUTH_TOKEN, &token);
        self.inner.store.set_json(keys::AUTH_PRINCIPAL, &principal);
        self.inner.bus.publish(AppEvent::SessionStarted { principal });

        session
    }

    /// Shared logout core
    fn clear_session(&self, reason: LogoutReason, notify_remote: bool) {
        let (token, had_session) = {
            let mut data = self.lock();
            data.epoch += 1;
            data.abort_session_timers();
            let had_session = data.session.take().is_some();
            // Lockout state survives a logout
            if data.phase != SessionState::Locked {
                data.phase = SessionState::Anonymous;
            }
            data.last_activity = None;
            (data.token.take(), had_session)
        };

        self.inner.store.remove(keys::AUTH_TOKEN);
        self.inner.store.remove(keys::AUTH_PRINCIPAL);

        if !had_session && token.is_none() {
            return;
        }

        tracing::info!(reason = reason.as_str(), "session cleared");
        self.inner.bus.publish(AppEvent::SessionEnded { reason });

        if notify_remote {
            if let Some(token) = token {
                let provider = Arc::clone(&self.inner.provider);
                tokio::spawn(async move {
                    if let Err(err) = provider.logout(&token).await {
                        tracing::warn!(%err, "remote logout failed");
                    }
                });
            }
        }
    }

    /// Count a rejected-credentials login; returns the cool-down when the
    /// attempt crossed the lockout threshold
    fn record_failed_attempt(&self) -> Option<Duration> {
        let mut data = self.lock();
        data.attempts += 1;
        let attempts = data.attempts;
        self.inner.store.set_json(keys::SESSION_LOGIN_ATTEMPTS, &attempts);

        if attempts < self.inner.config.max_login_attempts {
            if data.phase == SessionState::Authenticating {
                data.phase = SessionState::Anonymous;
            }
            return None;
        }

        let minutes = (i64::from(attempts) * 5).min(30);
        let until = Utc::now() + chrono::Duration::minutes(minutes);
        data.phase = SessionState::Locked;
        data.lockout_until = Some(until);
        self.inner.store.set_json(keys::SESSION_LOCKOUT_UNTIL, &until);

        if let Some(task) = data.unlock_task.take() {
            task.abort();
        }
        data.unlock_task = Some(tokio::spawn(self.clone().unlock_loop(until)));

        metrics::counter!("meridian_login_lockouts").increment(1);
        tracing::warn!(attempts, %until, "login locked out");
        Some(Duration::from_secs(minutes as u64 * 60))
    }

    fn clear_lockout(&self, data: &mut SessionData) {
        data.attempts = 0;
        data.lockout_until = None;
        if let Some(task) = data.unlock_task.take() {
            task.abort();
        }
        self.inner.store.remove(keys::SESSION_LOGIN_ATTEMPTS);
        self.inner.store.remove(keys::SESSION_LOCKOUT_UNTIL);
    }

    /// Abort and respawn the idle task under the current epoch
    fn rearm_idle_timer(&self, data: &mut SessionData) {
        data.idle_gen += 1;
        if let Some(task) = data.idle_task.take() {
            task.abort();
        }
        let now = Utc::now();
        if let Some(session) = data.session.as_mut() {
            session.idle_deadline = self.idle_deadline_from(now);
        }
        data.idle_task = Some(tokio::spawn(
            self.clone().idle_loop(data.epoch, data.idle_gen),
        ));
    }

    /// Idle countdown: warn at `session_duration - warning_time`, expire at
    /// the deadline
    async fn idle_loop(self, epoch: u64, idle_gen: u64) {
        let warn_after = self
            .inner
            .config
            .session_duration
            .saturating_sub(self.inner.config.warning_time);
        tokio::time::sleep(warn_after).await;

        let deadline = {
            let mut data = self.lock();
            if data.epoch != epoch || data.idle_gen != idle_gen {
                return;
            }
            if data.phase != SessionState::Active {
                return;
            }
            data.phase = SessionState::Warning;
            match data.session.as_ref() {
                Some(session) => session.idle_deadline,
                None => return,
            }
        };
        tracing::debug!(%deadline, "session expiry warning");
        self.inner.bus.publish(AppEvent::SessionWarning { deadline });

        tokio::time::sleep(self.inner.config.warning_time).await;

        {
            let mut data = self.lock();
            if data.epoch != epoch || data.idle_gen != idle_gen {
                return;
            }
            if data.phase != SessionState::Warning {
                return;
            }
            data.phase = SessionState::Expired;
        }
        metrics::counter!("meridian_session_expiries").increment(1);
        self.clear_session(LogoutReason::SessionExpired, true);
    }

    /// Background token refresh; failures are non-fatal and retried on the
    /// next tick
    async fn refresh_loop(self, epoch: u64) {
        let mut ticker = tokio::time::interval(self.inner.config.token_refresh_interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        // The first tick completes immediately; the first refresh waits a
        // full interval
        ticker.tick().await;

        loop {
            ticker.tick().await;
            let token = {
                let data = self.lock();
                if data.epoch != epoch {
                    return;
                }
                match data.token.clone() {
                    Some(token) => token,
                    None => return,
                }
            };

            match with_timeout(
                self.inner.config.request_timeout,
                self.inner.provider.refresh(&token),
            )
            .await
            {
                Ok(new_token) => {
                    {
                        let mut data = self.lock();
                        if data.epoch != epoch {
                            return;
                        }
                        data.token = Some(new_token.clone());
                        if let Some(session) = data.session.as_mut() {
                            session.refresh_deadline = self.refresh_deadline_from(Utc::now());
                        }
                    }
                    self.inner.store.set(keys::AUTH_TOKEN, &new_token);
                    tracing::debug!("token refreshed");
                }
                Err(err) => {
                    // The existing token and timer stay untouched
                    tracing::warn!(%err, "token refresh failed");
                }
            }
        }
    }

    /// Lockout countdown: back to `Anonymous` with a reset attempt counter
    async fn unlock_loop(self, until: DateTime<Utc>) {
        let wait = (until - Utc::now()).to_std().unwrap_or(Duration::ZERO);
        tokio::time::sleep(wait).await;

        let mut data = self.lock();
        if data.lockout_until != Some(until) {
            return;
        }
        data.attempts = 0;
        data.lockout_until = None;
        if data.phase == SessionState::Locked {
            data.phase = SessionState::Anonymous;
        }
        drop(data);

        self.inner.store.remove(keys::SESSION_LOGIN_ATTEMPTS);
        self.inner.store.remove(keys::SESSION_LOCKOUT_UNTIL);
        tracing::info!("login lockout elapsed");
    }
}

impl<C, S> std::fmt::Debug for SessionManager<C, S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionManager")
            .field("config", &self.inner.config)
            .finish_non_exhaustive()
    }
}
