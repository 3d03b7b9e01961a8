//! Access control
//!
//! Owns the current mode, tier definition, and feature flag set; validates
//! mode switches against the tier; mediates the confirm/cancel switch
//! protocol; and answers feature/limit queries. Denies by default: when the
//! remote configuration service is unreachable the last cache snapshot is
//! served, and with no cache the most restrictive defaults apply.
//!
//! Persistence policy: the local store write is authoritative and happens
//! synchronously before any broadcast; the remote preference write is
//! fire-and-forget with a logged failure.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

use chrono::Utc;
use tokio::task::JoinHandle;

use meridian_store::{keys, LocalStore, StoreExt};
use meridian_types::{
    AppEvent, Feature, FeatureFlags, LimitKind, Mode, ModeDefinition, PendingModeSwitch,
    Principal, PrincipalId, Tier, TierDefinition, UNLIMITED,
};

use crate::bus::EventBus;
use crate::config::AccessConfig;
use crate::error::{AccessError, ProviderError};
use crate::provider::{with_timeout, ConfigProvider};

/// Where the active configuration came from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigSource {
    /// Freshly fetched from the remote service
    Remote,
    /// Served from the last successful cache snapshot
    Cache,
    /// No cache existed; most restrictive defaults
    FailClosed,
}

/// Outcome of a mode switch request
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SwitchOutcome {
    /// Target equals the current mode
    NoOp,
    /// The switch was committed
    Switched,
    /// A [`PendingModeSwitch`] awaits confirmation
    ConfirmationRequired,
    /// The tier does not allow the target; the mode was not touched
    UpgradeRequired {
        /// Requested mode
        target: Mode,
        /// Lowest tier that reaches the target
        required_tier: Tier,
    },
    /// A confirmed switch is executing; retry after it completes
    Busy,
}

struct AccessData {
    mode: Mode,
    tier_def: TierDefinition,
    features: FeatureFlags,
    limit_overrides: HashMap<LimitKind, i64>,
    pending: Option<PendingModeSwitch>,
    switching: bool,
    principal: Option<PrincipalId>,
    resync_gen: u64,
    resync_task: Option<JoinHandle<()>>,
}

struct AccessInner<P, S> {
    config: AccessConfig,
    provider: Arc<P>,
    store: Arc<S>,
    bus: EventBus,
    state: Mutex<AccessData>,
}

/// Access controller: mode/tier gating and the switch protocol
///
/// Cheap to clone; clones share state.
pub struct AccessController<P, S> {
    inner: Arc<AccessInner<P, S>>,
}

impl<P, S> Clone for AccessController<P, S> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<P, S> AccessController<P, S>
where
    P: ConfigProvider + 'static,
    S: LocalStore + 'static,
{
    /// Create an access controller in the fail-closed state
    pub fn new(config: AccessConfig, provider: Arc<P>, store: Arc<S>, bus: EventBus) -> Self {
        Self {
            inner: Arc::new(AccessInner {
                config,
                provider,
                store,
                bus,
                state: Mutex::new(AccessData {
                    mode: Mode::default_mode(),
                    tier_def: TierDefinition::fail_closed(),
                    features: FeatureFlags::new(),
                    limit_overrides: HashMap::new(),
                    pending: None,
                    switching: false,
                    principal: None,
                    resync_gen: 0,
                    resync_task: None,
                }),
            }),
        }
    }

    /// Load tier, feature flags, and limits for a principal
    ///
    /// On success the in-memory state and the local cache are overwritten;
    /// on any failure the last cache snapshot is used, or the fail-closed
    /// defaults when none exists. The persisted mode preference is restored
    /// when the resulting tier allows it. Never fails.
    pub async fn load_configuration(&self, principal: &Principal) -> ConfigSource {
        let (tier_def, features, overrides, source) = match self.fetch_remote(principal.id).await {
            Ok((tier_def, features, overrides)) => {
                self.inner.store.set_json(keys::TIER_CURRENT, &tier_def);
                self.inner.store.set_json(keys::TIER_FEATURES_CACHE, &features);
                self.inner.store.set_json(keys::TIER_LIMITS_CACHE, &overrides);
                (tier_def, features, overrides, ConfigSource::Remote)
            }
            Err(err) => {
                tracing::warn!(%err, "configuration fetch failed, falling back");
                metrics::counter!("meridian_config_fallbacks").increment(1);
                match self.cached_snapshot() {
                    Some((tier_def, features, overrides)) => {
                        (tier_def, features, overrides, ConfigSource::Cache)
                    }
                    None => (
                        TierDefinition::fail_closed(),
                        FeatureFlags::new(),
                        HashMap::new(),
                        ConfigSource::FailClosed,
                    ),
                }
            }
        };

        let changed = {
            let mut data = self.lock();
            let before = (data.mode, data.tier_def.tier, data.features.clone());
            data.principal = Some(principal.id);
            data.tier_def = tier_def;
            data.features = features;
            data.limit_overrides = overrides;

            // Restore the persisted preference when the tier allows it, and
            // re-establish the mode/tier invariant either way
            let preferred = self.inner.store.get_json::<Mode>(keys::MODE_CURRENT);
            let candidate = preferred.unwrap_or(data.mode);
            data.mode = if data.tier_def.allows(candidate) {
                candidate
            } else if data.tier_def.allows(data.mode) {
                data.mode
            } else {
                Mode::default_mode()
            };

            self.inner.store.set_json(keys::MODE_CURRENT, &data.mode);
            let after = (data.mode, data.tier_def.tier, data.features.clone());
            (before != after).then_some(after)
        };

        if let Some((mode, tier, features)) = changed {
            self.inner.bus.publish(AppEvent::AccessChanged {
                mode,
                tier,
                features,
            });
        }

        tracing::debug!(?source, "configuration loaded");
        source
    }

    /// Request a switch to another mode
    ///
    /// Re-entrant: a second request while one awaits confirmation replaces
    /// the pending target. A target outside the tier's allowed modes never
    /// mutates the mode; it signals [`SwitchOutcome::UpgradeRequired`].
    pub fn switch_mode(&self, target: Mode, require_confirmation: bool) -> SwitchOutcome {
        let mut data = self.lock();
        if data.mode == target {
            return SwitchOutcome::NoOp;
        }
        if !data.tier_def.allows(target) {
            metrics::counter!("meridian_mode_switch_denied").increment(1);
            tracing::debug!(%target, tier = %data.tier_def.tier, "mode switch requires upgrade");
            return SwitchOutcome::UpgradeRequired {
                target,
                required_tier: TierDefinition::min_tier_for(target),
            };
        }
        if data.switching {
            return SwitchOutcome::Busy;
        }
        if require_confirmation {
            data.pending = Some(PendingModeSwitch {
                target,
                requested_at: Utc::now(),
            });
            return SwitchOutcome::ConfirmationRequired;
        }
        self.commit_switch(&mut data, target);
        SwitchOutcome::Switched
    }

    /// Confirm the pending mode switch
    pub fn confirm_switch(&self) -> SwitchOutcome {
        let mut data = self.lock();
        if data.switching {
            return SwitchOutcome::Busy;
        }
        let Some(pending) = data.pending.take() else {
            return SwitchOutcome::NoOp;
        };
        // The tier may have changed while the prompt was up
        if !data.tier_def.allows(pending.target) {
            return SwitchOutcome::UpgradeRequired {
                target: pending.target,
                required_tier: TierDefinition::min_tier_for(pending.target),
            };
        }
        if data.mode == pending.target {
            return SwitchOutcome::NoOp;
        }
        self.commit_switch(&mut data, pending.target);
        SwitchOutcome::Switched
    }

    /// Cancel the pending mode switch; returns whether one existed
    pub fn cancel_switch(&self) -> bool {
        self.lock().pending.take().is_some()
    }

    /// Check a feature: the remote flag must be on and the feature must not
    /// be restricted in the current mode
    pub fn has_feature(&self, feature: Feature) -> bool {
        let data = self.lock();
        data.features.enabled(feature) && !ModeDefinition::of(data.mode).restricts(feature)
    }

    /// Check a usage limit against a current value
    ///
    /// The effective limit prefers the per-user remote override and falls
    /// back to the tier default. The two levels are deliberately kept
    /// separate: tier defaults change independently of per-user grants.
    /// `-1` means unlimited; an unknown kind is a zero limit.
    pub fn is_limit_reached(&self, kind: LimitKind, current: i64) -> bool {
        let data = self.lock();
        let effective = match data.limit_overrides.get(&kind) {
            Some(value) => *value,
            None => data.tier_def.limits.get(&kind).copied().unwrap_or(0),
        };
        if effective == UNLIMITED {
            return false;
        }
        current >= effective
    }

    /// Request a tier upgrade from the remote service
    ///
    /// Local tier state mutates only on explicit success; on failure the
    /// prior tier is untouched.
    pub async fn upgrade_tier(&self, new_tier: Tier) -> Result<(), AccessError> {
        let principal = self.lock().principal.ok_or(AccessError::NotLoaded)?;

        let result = with_timeout(
            self.inner.config.fetch_timeout,
            self.inner.provider.upgrade_tier(principal, new_tier),
        )
        .await;

        match result {
            Ok(()) => {
                let (mode, tier, features) = {
                    let mut data = self.lock();
                    data.tier_def = TierDefinition::builtin(new_tier);
                    if !data.tier_def.allows(data.mode) {
                        data.mode = Mode::default_mode();
                    }
                    self.inner.store.set_json(keys::TIER_CURRENT, &data.tier_def);
                    self.inner.store.set_json(keys::MODE_CURRENT, &data.mode);
                    (data.mode, data.tier_def.tier, data.features.clone())
                };
                tracing::info!(%tier, "tier upgraded");
                self.inner.bus.publish(AppEvent::AccessChanged {
                    mode,
                    tier,
                    features,
                });
                Ok(())
            }
            Err(err) if err.is_retryable() => Err(AccessError::Network(err.to_string())),
            Err(err) => Err(AccessError::UpgradeRejected(err.to_string())),
        }
    }

    /// Start the periodic configuration resync, when configured
    pub fn start_resync(&self, principal: &Principal) {
        let Some(interval) = self.inner.config.resync_interval else {
            return;
        };
        let mut data = self.lock();
        data.resync_gen += 1;
        if let Some(task) = data.resync_task.take() {
            task.abort();
        }
        data.resync_task = Some(tokio::spawn(self.clone().resync_loop(
            principal.clone(),
            data.resync_gen,
            interval,
        )));
    }

    /// Logout hook: cancel the resync timer, drop any pending switch, and
    /// revert to the fail-closed defaults
    ///
    /// The persisted mode preference is kept; it is re-validated on the next
    /// [`Self::load_configuration`].
    pub fn reset(&self) {
        let mut data = self.lock();
        data.resync_gen += 1;
        if let Some(task) = data.resync_task.take() {
            task.abort();
        }
        data.pending = None;
        data.switching = false;
        data.principal = None;
        data.mode = Mode::default_mode();
        data.tier_def = TierDefinition::fail_closed();
        data.features = FeatureFlags::new();
        data.limit_overrides.clear();
    }

    /// Cancel the resync timer without touching state
    pub fn shutdown(&self) {
        let mut data = self.lock();
        data.resync_gen += 1;
        if let Some(task) = data.resync_task.take() {
            task.abort();
        }
    }

    /// Current mode
    pub fn mode(&self) -> Mode {
        self.lock().mode
    }

    /// Current tier
    pub fn tier(&self) -> Tier {
        self.lock().tier_def.tier
    }

    /// Current tier definition
    pub fn tier_definition(&self) -> TierDefinition {
        self.lock().tier_def.clone()
    }

    /// Current feature flag set
    pub fn features(&self) -> FeatureFlags {
        self.lock().features.clone()
    }

    /// The pending mode switch, if any
    pub fn pending_switch(&self) -> Option<PendingModeSwitch> {
        self.lock().pending
    }

    // =========================================================================
    // Internals
    // =========================================================================

    fn lock(&self) -> MutexGuard<'_, AccessData> {
        self.inner.state.lock().expect("access state lock poisoned")
    }

    /// Fetch tier, flags, and limits; any failure fails the whole load
    async fn fetch_remote(
        &self,
        principal: PrincipalId,
    ) -> Result<(TierDefinition, FeatureFlags, HashMap<LimitKind, i64>), ProviderError> {
        let timeout = self.inner.config.fetch_timeout;
        let (tier, raw_features, raw_limits) = tokio::try_join!(
            with_timeout(timeout, self.inner.provider.get_tier(principal)),
            with_timeout(timeout, self.inner.provider.get_features(principal)),
            with_timeout(timeout, self.inner.provider.get_limits(principal)),
        )?;

        let (features, unknown) = FeatureFlags::from_remote(&raw_features);
        if !unknown.is_empty() {
            tracing::warn!(?unknown, "dropping unknown feature keys");
        }

        let mut overrides = HashMap::with_capacity(raw_limits.len());
        for (key, value) in &raw_limits {
            match key.parse::<LimitKind>() {
                Ok(kind) => {
                    overrides.insert(kind, *value);
                }
                Err(_) => tracing::warn!(key = %key, "dropping unknown limit kind"),
            }
        }

        Ok((TierDefinition::builtin(tier), features, overrides))
    }

    fn cached_snapshot(
        &self,
    ) -> Option<(TierDefinition, FeatureFlags, HashMap<LimitKind, i64>)> {
        let tier_def = self.inner.store.get_json::<TierDefinition>(keys::TIER_CURRENT)?;
        let features = self
            .inner
            .store
            .get_json::<FeatureFlags>(keys::TIER_FEATURES_CACHE)
            .unwrap_or_default();
        let overrides = self
            .inner
            .store
            .get_json::<HashMap<LimitKind, i64>>(keys::TIER_LIMITS_CACHE)
            .unwrap_or_default();
        Some((tier_def, features, overrides))
    }

    /// Commit sequence: clear pending, set mode, persist, broadcast,
    /// navigate, then sync the preference remotely best-effort
    ///
    /// Runs to completion under the state lock; no other switch can begin
    /// until it returns.
    fn commit_switch(&self, data: &mut AccessData, target: Mode) {
        data.switching = true;
        data.pending = None;
        data.mode = target;

        // Persist before broadcast
        self.inner.store.set_json(keys::MODE_CURRENT, &target);
        self.inner.bus.publish(AppEvent::AccessChanged {
            mode: target,
            tier: data.tier_def.tier,
            features: data.features.clone(),
        });
        self.inner.bus.publish(AppEvent::Navigate {
            route: ModeDefinition::of(target).default_route,
        });
        metrics::counter!("meridian_mode_switches").increment(1);
        tracing::info!(mode = %target, "mode switched");
        data.switching = false;

        if let Some(principal) = data.principal {
            let provider = Arc::clone(&self.inner.provider);
            tokio::spawn(async move {
                if let Err(err) = provider.save_preference(principal, target).await {
                    tracing::warn!(%err, "failed to sync mode preference");
                }
            });
        }
    }

    /// Periodic configuration re-fetch
    async fn resync_loop(
        self,
        principal: Principal,
        generation: u64,
        interval: std::time::Duration,
    ) {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        ticker.tick().await;

        loop {
            ticker.tick().await;
            {
                let data = self.lock();
                if data.resync_gen != generation {
                    return;
                }
            }
            let source = self.load_configuration(&principal).await;
            tracing::trace!(?source, "configuration resynced");
        }
    }
}

impl<P, S> std::fmt::Debug for AccessController<P, S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AccessController")
            .field("config", &self.inner.config)
            .finish_non_exhaustive()
    }
}
