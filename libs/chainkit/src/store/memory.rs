use parking_lot::RwLock;
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;
use std::collections::btree_map::Entry;
use std::ops::Bound;

use super::KvStore;

/// In-memory ordered backing store.
///
/// Also serves as the reference for what "deterministic state" means: two
/// stores with equal contents produce equal [`MemKvStore::root_hash`] values.
#[derive(Debug, Default)]
pub struct MemKvStore {
    inner: RwLock<BTreeMap<Vec<u8>, Vec<u8>>>,
}

impl MemKvStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.inner.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.read().is_empty()
    }

    /// SHA-256 over every `(key, value)` pair in key order, each part
    /// length-prefixed so that entry boundaries are unambiguous.
    pub fn root_hash(&self) -> [u8; 32] {
        let mut hasher = Sha256::new();
        for (k, v) in self.inner.read().iter() {
            hasher.update((k.len() as u64).to_be_bytes());
            hasher.update(k);
            hasher.update((v.len() as u64).to_be_bytes());
            hasher.update(v);
        }
        hasher.finalize().into()
    }

    /// Hex form of [`MemKvStore::root_hash`], as printed by drivers.
    pub fn root_hash_hex(&self) -> String {
        hex::encode(self.root_hash())
    }
}

impl KvStore for MemKvStore {
    fn get(&self, key: &[u8]) -> Option<Vec<u8>> {
        self.inner.read().get(key).cloned()
    }

    fn set(&self, key: &[u8], value: &[u8]) {
        self.inner.write().insert(key.to_vec(), value.to_vec());
    }

    fn delete(&self, key: &[u8]) {
        self.inner.write().remove(key);
    }

    fn set_if_absent(&self, key: &[u8], value: &[u8]) -> bool {
        match self.inner.write().entry(key.to_vec()) {
            Entry::Occupied(_) => false,
            Entry::Vacant(slot) => {
                slot.insert(value.to_vec());
                true
            }
        }
    }

    fn range(&self, start: &[u8], end: Option<&[u8]>) -> Vec<(Vec<u8>, Vec<u8>)> {
        let upper = match end {
            Some(e) => Bound::Excluded(e.to_vec()),
            None => Bound::Unbounded,
        };
        self.inner
            .read()
            .range((Bound::Included(start.to_vec()), upper))
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect()
    }
}
