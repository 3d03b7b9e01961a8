//! Product mode types

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::Feature;

/// Selectable operating mode of the product, constrained by tier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    /// Simplified view, reduced feature surface
    Lite,
    /// Full trading surface
    Pro,
    /// Pro surface plus advanced analytics
    Advanced,
}

impl Mode {
    /// The mode every session starts in
    pub const fn default_mode() -> Self {
        Self::Lite
    }
}

impl std::fmt::Display for Mode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Lite => write!(f, "lite"),
            Self::Pro => write!(f, "pro"),
            Self::Advanced => write!(f, "advanced"),
        }
    }
}

impl std::str::FromStr for Mode {
    type Err = ModeParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "lite" => Ok(Self::Lite),
            "pro" => Ok(Self::Pro),
            "advanced" => Ok(Self::Advanced),
            _ => Err(ModeParseError(s.to_string())),
        }
    }
}

/// Error parsing a mode string
#[derive(Debug, Clone)]
pub struct ModeParseError(pub String);

impl std::fmt::Display for ModeParseError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "invalid mode: {}", self.0)
    }
}

impl std::error::Error for ModeParseError {}

/// Static definition of a mode: restricted features and default destination
///
/// Statically known, not user data.
#[derive(Debug, Clone, Copy)]
pub struct ModeDefinition {
    /// The mode this definition describes
    pub mode: Mode,
    /// Features unavailable in this mode even when the remote flag is on
    pub restricted: &'static [Feature],
    /// Route the UI navigates to after switching into this mode
    pub default_route: &'static str,
}

impl ModeDefinition {
    /// Look up the definition for a mode
    pub const fn of(mode: Mode) -> Self {
        match mode {
            Mode::Lite => Self {
                mode: Mode::Lite,
                restricted: &[Feature::Trading, Feature::AdvancedCharts, Feature::Export],
                default_route: "/overview",
            },
            Mode::Pro => Self {
                mode: Mode::Pro,
                restricted: &[Feature::AdvancedCharts],
                default_route: "/trade",
            },
            Mode::Advanced => Self {
                mode: Mode::Advanced,
                restricted: &[],
                default_route: "/workspace",
            },
        }
    }

    /// Check whether a feature is restricted in this mode
    pub fn restricts(&self, feature: Feature) -> bool {
        self.restricted.contains(&feature)
    }
}

/// A mode switch awaiting confirmation
///
/// At most one instance exists at a time; it lives only between a switch
/// request requiring confirmation and its resolution.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PendingModeSwitch {
    /// Mode the switch will commit to
    pub target: Mode,
    /// When the switch was requested
    pub requested_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mode_parse_roundtrip() {
        for mode in [Mode::Lite, Mode::Pro, Mode::Advanced] {
            let parsed: Mode = mode.to_string().parse().unwrap();
            assert_eq!(parsed, mode);
        }
        assert!("turbo".parse::<Mode>().is_err());
    }

    #[test]
    fn test_lite_restricts_trading() {
        assert!(ModeDefinition::of(Mode::Lite).restricts(Feature::Trading));
        assert!(!ModeDefinition::of(Mode::Pro).restricts(Feature::Trading));
    }

    #[test]
    fn test_every_mode_has_a_route() {
        for mode in [Mode::Lite, Mode::Pro, Mode::Advanced] {
            assert!(ModeDefinition::of(mode).default_route.starts_with('/'));
        }
    }
}
