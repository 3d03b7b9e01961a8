//! Feature flag types

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// Known features in the system
///
/// Remote flag maps are validated against this closed set at the fetch
/// boundary; unknown keys are dropped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Feature {
    /// Order placement and execution
    Trading,
    /// Advanced charting package
    AdvancedCharts,
    /// Data export (CSV, JSON)
    Export,
    /// Price and balance alerts
    Alerts,
    /// More than one wallet per account
    MultiWallet,
    /// Priority support channel
    PrioritySupport,
}

impl Feature {
    /// Get the feature key string
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Trading => "trading",
            Self::AdvancedCharts => "advanced_charts",
            Self::Export => "export",
            Self::Alerts => "alerts",
            Self::MultiWallet => "multi_wallet",
            Self::PrioritySupport => "priority_support",
        }
    }

    /// All known features
    pub const ALL: &'static [Feature] = &[
        Self::Trading,
        Self::AdvancedCharts,
        Self::Export,
        Self::Alerts,
        Self::MultiWallet,
        Self::PrioritySupport,
    ];
}

impl std::fmt::Display for Feature {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for Feature {
    type Err = FeatureParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .iter()
            .find(|f| f.as_str() == s)
            .copied()
            .ok_or_else(|| FeatureParseError(s.to_string()))
    }
}

/// Error parsing a feature key
#[derive(Debug, Clone)]
pub struct FeatureParseError(pub String);

impl std::fmt::Display for FeatureParseError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "unknown feature key: {}", self.0)
    }
}

impl std::error::Error for FeatureParseError {}

/// Per-principal feature flag set
///
/// A feature absent from the set is disabled: the empty set is the
/// fail-closed default when flags were never successfully fetched.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FeatureFlags {
    flags: HashMap<Feature, bool>,
}

impl FeatureFlags {
    /// Empty (fail-closed) flag set
    pub fn new() -> Self {
        Self::default()
    }

    /// Validate a remote string-keyed map against the known feature set
    ///
    /// Unknown keys are returned alongside the flags so the caller can log
    /// them; they never enter the set.
    pub fn from_remote(raw: &HashMap<String, bool>) -> (Self, Vec<String>) {
        let mut flags = HashMap::with_capacity(raw.len());
        let mut unknown = Vec::new();
        for (key, enabled) in raw {
            match key.parse::<Feature>() {
                Ok(feature) => {
                    flags.insert(feature, *enabled);
                }
                Err(_) => unknown.push(key.clone()),
            }
        }
        (Self { flags }, unknown)
    }

    /// Check whether a feature flag is on
    pub fn enabled(&self, feature: Feature) -> bool {
        self.flags.get(&feature).copied().unwrap_or(false)
    }

    /// Set a flag
    pub fn set(&mut self, feature: Feature, enabled: bool) {
        self.flags.insert(feature, enabled);
    }

    /// True when no flags were ever set
    pub fn is_empty(&self) -> bool {
        self.flags.is_empty()
    }

    /// Number of known flags in the set
    pub fn len(&self) -> usize {
        self.flags.len()
    }
}
