use serde::Serialize;
use serde::de::DeserializeOwned;

use crate::io::kv::{KvError, KvStore};
use crate::io::recovery::RecoveryCategory;

/// Blob keys. Each maps to one JSON document.
pub const TASKS_KEY: &str = "ticknote-tasks";
pub const LISTS_KEY: &str = "ticknote-lists";
pub const THEME_KEY: &str = "ticknote-theme";
pub const SORT_KEY: &str = "ticknote-sort";
pub const SESSION_KEY: &str = "ticknote-focus-session";
pub const VIEW_KEY: &str = "ticknote-ui-state";
pub const PENDING_ACTION_KEY: &str = "ticknote-pending-action";

/// Read and decode a blob. Absent blobs and blobs that fail to decode both
/// come back as `None`; a bad blob is preserved before it gets overwritten.
pub fn read_blob<T, K>(kv: &K, key: &str) -> Option<T>
where
    T: DeserializeOwned,
    K: KvStore + ?Sized,
{
    let raw = kv.get(key)?;
    match serde_json::from_str(&raw) {
        Ok(value) => Some(value),
        Err(e) => {
            tracing::warn!(key, error = %e, "discarding malformed blob");
            kv.preserve(RecoveryCategory::Malformed, key, &raw, &e.to_string());
            None
        }
    }
}

/// Encode and store a blob. Writes are fire-and-forget: a failure is logged
/// and the encoded value is preserved, but never returned to the caller.
pub fn write_blob<T, K>(kv: &K, key: &str, value: &T)
where
    T: Serialize + ?Sized,
    K: KvStore + ?Sized,
{
    let encoded = match serde_json::to_string(value) {
        Ok(s) => s,
        Err(source) => {
            let e = KvError::SerializeError {
                key: key.to_string(),
                source,
            };
            tracing::warn!(error = %e, "blob not saved");
            return;
        }
    };
    if let Err(e) = kv.set(key, &encoded) {
        tracing::warn!(error = %e, "blob not saved");
        kv.preserve(RecoveryCategory::Write, key, &encoded, &e.to_string());
    } else {
        tracing::debug!(key, bytes = encoded.len(), "blob saved");
    }
}

/// Erase a blob, logging (not returning) any failure.
pub fn remove_blob<K: KvStore + ?Sized>(kv: &K, key: &str) {
    if let Err(e) = kv.remove(key) {
        tracing::warn!(error = %e, "blob not removed");
    }
}
