//! Local store trait and typed helpers

use serde::de::DeserializeOwned;
use serde::Serialize;

/// Synchronous key/value persistence surviving reloads
///
/// No transactions; `set` overwrites unconditionally.
pub trait LocalStore: Send + Sync {
    /// Read a value
    fn get(&self, key: &str) -> Option<String>;

    /// Write a value, overwriting any previous one
    fn set(&self, key: &str, value: &str);

    /// Remove a value
    fn remove(&self, key: &str);
}

/// JSON codec helpers over any [`LocalStore`]
///
/// A value that fails to decode is treated as a cache miss, never an error.
pub trait StoreExt: LocalStore {
    /// Read and decode a JSON value
    fn get_json<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        let raw = self.get(key)?;
        match serde_json::from_str(&raw) {
            Ok(value) => Some(value),
            Err(err) => {
                tracing::warn!(key, %err, "discarding undecodable store value");
                None
            }
        }
    }

    /// Encode and write a JSON value
    fn set_json<T: Serialize>(&self, key: &str, value: &T) {
        match serde_json::to_string(value) {
            Ok(raw) => self.set(key, &raw),
            Err(err) => tracing::error!(key, %err, "failed to encode store value"),
        }
    }
}

impl<S: LocalStore + ?Sized> StoreExt for S {}
