//! Events broadcast on the in-process bus

use chrono::{DateTime, Utc};

use crate::{FeatureFlags, LogoutReason, Mode, Principal, Tier};

/// Committed session and access changes, broadcast to any number of
/// observers (UI, notification layer) with no coupling back into the state
/// machines.
#[derive(Debug, Clone)]
pub enum AppEvent {
    /// A session was established
    SessionStarted {
        /// The authenticated principal
        principal: Principal,
    },
    /// The session approaches expiry; the consumer should prompt to stay
    /// logged in before the deadline
    SessionWarning {
        /// When the session will expire absent confirmation
        deadline: DateTime<Utc>,
    },
    /// The session was terminated
    SessionEnded {
        /// Why the session ended
        reason: LogoutReason,
    },
    /// A mode or tier change was committed
    AccessChanged {
        /// Current mode
        mode: Mode,
        /// Current tier
        tier: Tier,
        /// Current feature flags
        features: FeatureFlags,
    },
    /// The UI should navigate to a mode's default destination
    Navigate {
        /// Destination route
        route: &'static str,
    },
}
