//! Principal identity types

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::Tier;

/// Unique principal identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PrincipalId(pub Uuid);

impl PrincipalId {
    /// Create a new random principal ID
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Parse a principal ID from a string
    pub fn parse(s: &str) -> Result<Self, uuid::Error> {
        Ok(Self(Uuid::parse_str(s)?))
    }
}

impl Default for PrincipalId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for PrincipalId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<Uuid> for PrincipalId {
    fn from(uuid: Uuid) -> Self {
        Self(uuid)
    }
}

/// Principal role
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// Regular account holder
    User,
    /// Administrative account
    Admin,
}

/// KYC verification level, ordered from least to most verified
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum KycLevel {
    /// No identity documents submitted
    Unverified,
    /// Identity document verified
    Basic,
    /// Identity and address verified
    Full,
}

impl KycLevel {
    /// Check whether this level satisfies a required level
    pub fn meets(&self, required: KycLevel) -> bool {
        *self >= required
    }
}

/// Authenticated identity and its claims
///
/// Owned exclusively by the session manager: created on successful login,
/// replaced on refresh or profile update, destroyed on logout.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Principal {
    /// Principal ID
    pub id: PrincipalId,
    /// Email address
    pub email: String,
    /// Account role
    pub role: Role,
    /// Subscription tier
    pub tier: Tier,
    /// KYC verification level
    pub kyc_level: KycLevel,
    /// Granted permission identifiers
    pub permissions: Vec<String>,
}

impl Principal {
    /// Check whether the principal holds the admin role
    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }

    /// Check whether a permission has been granted
    pub fn has_permission(&self, permission: &str) -> bool {
        self.permissions.iter().any(|p| p == permission)
    }
}
