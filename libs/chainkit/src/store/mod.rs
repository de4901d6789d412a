//! Namespaced storage.
//!
//! A single backing [`KvStore`] is shared by the whole application. Modules
//! never see it directly: the [`StoreAllocator`] hands each of them a
//! [`StoreHandle`] confined to its own key range.

mod allocator;
mod handle;
mod memory;

pub use allocator::StoreAllocator;
pub use handle::StoreHandle;
pub use memory::MemKvStore;

/// Ordered, synchronous key/value backing store.
///
/// Implementations must be safe to share between threads, but the
/// orchestrator only ever calls them from one thread at a time.
pub trait KvStore: Send + Sync {
    fn get(&self, key: &[u8]) -> Option<Vec<u8>>;

    fn set(&self, key: &[u8], value: &[u8]);

    fn delete(&self, key: &[u8]);

    /// Writes `value` only if `key` is unset, atomically with the check.
    /// Returns whether the write happened.
    fn set_if_absent(&self, key: &[u8], value: &[u8]) -> bool;

    /// All entries with `start <= key < end` (unbounded when `end` is `None`),
    /// in ascending key order.
    fn range(&self, start: &[u8], end: Option<&[u8]>) -> Vec<(Vec<u8>, Vec<u8>)>;
}

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("corrupt value under key {key} in store '{namespace}': {source}")]
    Decode {
        namespace: String,
        key: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("failed to encode value for key {key} in store '{namespace}': {source}")]
    Encode {
        namespace: String,
        key: String,
        #[source]
        source: serde_json::Error,
    },
}

/// Smallest key strictly greater than every key starting with `prefix`,
/// or `None` when no such bound exists (all bytes `0xff`).
pub(crate) fn prefix_end(prefix: &[u8]) -> Option<Vec<u8>> {
    let mut end = prefix.to_vec();
    while let Some(last) = end.pop() {
        if last < u8::MAX {
            end.push(last + 1);
            return Some(end);
        }
    }
    None
}
