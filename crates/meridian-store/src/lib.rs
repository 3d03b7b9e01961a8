//! Meridian Store - Durable local key/value persistence
//!
//! Synchronous key/value storage surviving reloads, shared by the session
//! manager (token, lockout state) and the access controller (mode, tier and
//! feature caches). Writes are last-write-wins; the subsystem assumes a
//! single active runtime context.

pub mod keys;
pub mod memory;
pub mod store;

pub use memory::MemoryStore;
pub use store::{LocalStore, StoreExt};
