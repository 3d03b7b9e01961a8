//! Meridian Types - Shared domain types
//!
//! This crate contains domain types used across the Meridian identity and
//! entitlement core:
//! - Principal identity and session state
//! - Subscription tiers, modes, and their definitions
//! - Feature flags and usage limits
//! - Events broadcast on the in-process bus

pub mod event;
pub mod feature;
pub mod limit;
pub mod mode;
pub mod principal;
pub mod session;
pub mod tier;

pub use event::*;
pub use feature::*;
pub use limit::*;
pub use mode::*;
pub use principal::*;
pub use session::*;
pub use tier::*;
