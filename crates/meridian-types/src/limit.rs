//! Usage limit types

use serde::{Deserialize, Serialize};

/// Sentinel limit value meaning "unlimited"
pub const UNLIMITED: i64 = -1;

/// Known usage limit kinds
///
/// Remote limit maps are validated against this closed set at the fetch
/// boundary; unknown keys are dropped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LimitKind {
    /// Wallets per account
    Wallets,
    /// Transactions per day
    DailyTransactions,
    /// Configured alert rules
    AlertRules,
    /// API requests per day
    ApiRequests,
}

impl LimitKind {
    /// Get the limit key string
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Wallets => "wallets",
            Self::DailyTransactions => "daily_transactions",
            Self::AlertRules => "alert_rules",
            Self::ApiRequests => "api_requests",
        }
    }

    /// All known limit kinds
    pub const ALL: &'static [LimitKind] = &[
        Self::Wallets,
        Self::DailyTransactions,
        Self::AlertRules,
        Self::ApiRequests,
    ];
}

impl std::fmt::Display for LimitKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for LimitKind {
    type Err = LimitKindParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .iter()
            .find(|k| k.as_str() == s)
            .copied()
            .ok_or_else(|| LimitKindParseError(s.to_string()))
    }
}

/// Error parsing a limit kind key
#[derive(Debug, Clone)]
pub struct LimitKindParseError(pub String);

impl std::fmt::Display for LimitKindParseError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "unknown limit kind: {}", self.0)
    }
}

impl std::error::Error for LimitKindParseError {}
