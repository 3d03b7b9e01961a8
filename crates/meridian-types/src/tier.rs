//! Subscription tier types

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::{LimitKind, Mode};

/// Subscription tier levels
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Tier {
    /// Entry tier - lite mode only
    Basic,
    /// Pro tier - unlocks the pro mode
    Pro,
    /// Premium tier - all modes
    Premium,
}

impl Tier {
    /// Get numeric tier level for comparison
    pub const fn level(&self) -> u8 {
        match self {
            Self::Basic => 1,
            Self::Pro => 2,
            Self::Premium => 3,
        }
    }

    /// Modes reachable on this tier
    pub const fn allowed_modes(&self) -> &'static [Mode] {
        match self {
            Self::Basic => &[Mode::Lite],
            Self::Pro => &[Mode::Lite, Mode::Pro],
            Self::Premium => &[Mode::Lite, Mode::Pro, Mode::Advanced],
        }
    }

    /// Default usage limits for this tier (`-1` = unlimited)
    pub fn default_limits(&self) -> HashMap<LimitKind, i64> {
        let entries: &[(LimitKind, i64)] = match self {
            Self::Basic => &[
                (LimitKind::Wallets, 1),
                (LimitKind::DailyTransactions, 10),
                (LimitKind::AlertRules, 3),
                (LimitKind::ApiRequests, 100),
            ],
            Self::Pro => &[
                (LimitKind::Wallets, 5),
                (LimitKind::DailyTransactions, 100),
                (LimitKind::AlertRules, 25),
                (LimitKind::ApiRequests, 5_000),
            ],
            Self::Premium => &[
                (LimitKind::Wallets, crate::UNLIMITED),
                (LimitKind::DailyTransactions, crate::UNLIMITED),
                (LimitKind::AlertRules, 100),
                (LimitKind::ApiRequests, 50_000),
            ],
        };
        entries.iter().copied().collect()
    }
}

impl std::fmt::Display for Tier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Basic => write!(f, "basic"),
            Self::Pro => write!(f, "pro"),
            Self::Premium => write!(f, "premium"),
        }
    }
}

impl std::str::FromStr for Tier {
    type Err = TierParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "basic" => Ok(Self::Basic),
            "pro" => Ok(Self::Pro),
            "premium" => Ok(Self::Premium),
            _ => Err(TierParseError(s.to_string())),
        }
    }
}

/// Error parsing a tier string
#[derive(Debug, Clone)]
pub struct TierParseError(pub String);

impl std::fmt::Display for TierParseError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "invalid tier: {}", self.0)
    }
}

impl std::error::Error for TierParseError {}

/// Tier definition: which modes a tier may reach and its usage limits
///
/// Fetched remotely and cached locally; read-only to consumers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TierDefinition {
    /// The tier this definition describes
    pub tier: Tier,
    /// Modes reachable on this tier
    pub allowed_modes: Vec<Mode>,
    /// Usage limits keyed by kind (`-1` = unlimited)
    pub limits: HashMap<LimitKind, i64>,
}

impl TierDefinition {
    /// Built-in definition for a tier
    pub fn builtin(tier: Tier) -> Self {
        Self {
            tier,
            allowed_modes: tier.allowed_modes().to_vec(),
            limits: tier.default_limits(),
        }
    }

    /// Most restrictive definition: basic tier, lite mode only, zero limits
    ///
    /// Used when remote configuration was never successfully fetched and no
    /// cache snapshot exists.
    pub fn fail_closed() -> Self {
        Self {
            tier: Tier::Basic,
            allowed_modes: vec![Mode::Lite],
            limits: [
                (LimitKind::Wallets, 0),
                (LimitKind::DailyTransactions, 0),
                (LimitKind::AlertRules, 0),
                (LimitKind::ApiRequests, 0),
            ]
            .into_iter()
            .collect(),
        }
    }

    /// Check whether a mode is reachable under this definition
    pub fn allows(&self, mode: Mode) -> bool {
        self.allowed_modes.contains(&mode)
    }

    /// Lowest tier whose built-in definition allows a mode
    pub fn min_tier_for(mode: Mode) -> Tier {
        [Tier::Basic, Tier::Pro, Tier::Premium]
            .into_iter()
            .find(|t| t.allowed_modes().contains(&mode))
            .unwrap_or(Tier::Premium)
    }
}
