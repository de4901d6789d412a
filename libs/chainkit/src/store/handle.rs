use serde::Serialize;
use serde::de::DeserializeOwned;
use std::fmt;
use std::sync::Arc;

use super::{KvStore, StoreError, prefix_end};

/// Exclusive view of one namespace inside the shared backing store.
///
/// Keys passed to a handle are relative to its namespace; the handle
/// prepends its prefix on the way in and strips it on the way out, so a
/// module cannot address another module's keys.
#[derive(Clone)]
pub struct StoreHandle {
    namespace: Arc<str>,
    prefix: Arc<[u8]>,
    backing: Arc<dyn KvStore>,
}

impl fmt::Debug for StoreHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StoreHandle")
            .field("namespace", &self.namespace)
            .finish_non_exhaustive()
    }
}

impl StoreHandle {
    pub(super) fn new(namespace: &str, backing: Arc<dyn KvStore>) -> Self {
        Self {
            namespace: Arc::from(namespace),
            prefix: Arc::from(namespace_prefix(namespace)),
            backing,
        }
    }

    #[inline]
    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    fn full_key(&self, key: &[u8]) -> Vec<u8> {
        let mut full = Vec::with_capacity(self.prefix.len() + key.len());
        full.extend_from_slice(&self.prefix);
        full.extend_from_slice(key);
        full
    }

    pub fn get(&self, key: &[u8]) -> Option<Vec<u8>> {
        self.backing.get(&self.full_key(key))
    }

    pub fn has(&self, key: &[u8]) -> bool {
        self.get(key).is_some()
    }

    pub fn set(&self, key: &[u8], value: &[u8]) {
        self.backing.set(&self.full_key(key), value);
    }

    pub fn delete(&self, key: &[u8]) {
        self.backing.delete(&self.full_key(key));
    }

    /// Entries whose relative key starts with `prefix`, in key order, with
    /// the namespace stripped from returned keys.
    pub fn iter_prefix(&self, prefix: &[u8]) -> Vec<(Vec<u8>, Vec<u8>)> {
        let start = self.full_key(prefix);
        let end = prefix_end(&start);
        let strip = self.prefix.len();
        self.backing
            .range(&start, end.as_deref())
            .into_iter()
            .map(|(k, v)| (k[strip..].to_vec(), v))
            .collect()
    }

    /// Reads a JSON-encoded value.
    ///
    /// # Errors
    /// `StoreError::Decode` if the stored bytes are not a valid `T`.
    pub fn get_json<T: DeserializeOwned>(&self, key: &[u8]) -> Result<Option<T>, StoreError> {
        let Some(raw) = self.get(key) else {
            return Ok(None);
        };
        serde_json::from_slice(&raw)
            .map(Some)
            .map_err(|source| StoreError::Decode {
                namespace: self.namespace.to_string(),
                key: String::from_utf8_lossy(key).into_owned(),
                source,
            })
    }

    /// Writes a JSON-encoded value.
    ///
    /// # Errors
    /// `StoreError::Encode` if `T` cannot be serialized.
    pub fn set_json<T: Serialize + ?Sized>(&self, key: &[u8], value: &T) -> Result<(), StoreError> {
        let raw = serde_json::to_vec(value).map_err(|source| StoreError::Encode {
            namespace: self.namespace.to_string(),
            key: String::from_utf8_lossy(key).into_owned(),
            source,
        })?;
        self.set(key, &raw);
        Ok(())
    }

    /// Decodes every value under `prefix`.
    ///
    /// # Errors
    /// `StoreError::Decode` on the first value that is not a valid `T`.
    pub fn iter_json<T: DeserializeOwned>(
        &self,
        prefix: &[u8],
    ) -> Result<Vec<(Vec<u8>, T)>, StoreError> {
        self.iter_prefix(prefix)
            .into_iter()
            .map(|(k, v)| {
                serde_json::from_slice(&v)
                    .map(|t| (k.clone(), t))
                    .map_err(|source| StoreError::Decode {
                        namespace: self.namespace.to_string(),
                        key: String::from_utf8_lossy(&k).into_owned(),
                        source,
                    })
            })
            .collect()
    }
}

/// `[len][name]`: a length-prefixed encoding keeps namespaces disjoint even
/// when one name is a prefix of another (`bank` vs `bank2`).
fn namespace_prefix(namespace: &str) -> Vec<u8> {
    let bytes = namespace.as_bytes();
    let mut prefix = Vec::with_capacity(bytes.len() + 1);
    #[allow(clippy::cast_possible_truncation)]
    prefix.push(bytes.len() as u8);
    prefix.extend_from_slice(bytes);
    prefix
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use super::*;
    use crate::store::MemKvStore;

    fn handle(name: &str, backing: &Arc<MemKvStore>) -> StoreHandle {
        StoreHandle::new(name, backing.clone())
    }

    #[test]
    fn keys_are_isolated_between_namespaces() {
        let backing = Arc::new(MemKvStore::new());
        let bank = handle("bank", &backing);
        let acc = handle("acc", &backing);

        bank.set(b"k", b"bank-value");
        acc.set(b"k", b"acc-value");

        assert_eq!(bank.get(b"k"), Some(b"bank-value".to_vec()));
        assert_eq!(acc.get(b"k"), Some(b"acc-value".to_vec()));
        assert_eq!(backing.len(), 2);
    }

    #[test]
    fn prefix_named_namespaces_do_not_overlap() {
        let backing = Arc::new(MemKvStore::new());
        let bank = handle("bank", &backing);
        let bank2 = handle("bank2", &backing);

        bank2.set(b"x", b"1");
        bank.set(b"2x", b"2");

        assert_eq!(bank.iter_prefix(b"").len(), 1);
        assert_eq!(bank2.iter_prefix(b"").len(), 1);
        assert_eq!(bank.get(b"2x"), Some(b"2".to_vec()));
        assert!(bank2.get(b"2x").is_none());
    }

    #[test]
    fn iter_prefix_strips_namespace_and_filters() {
        let backing = Arc::new(MemKvStore::new());
        let store = handle("staking", &backing);
        store.set(b"val/a", b"1");
        store.set(b"val/b", b"2");
        store.set(b"del/a", b"3");

        let got = store.iter_prefix(b"val/");
        assert_eq!(
            got,
            vec![
                (b"val/a".to_vec(), b"1".to_vec()),
                (b"val/b".to_vec(), b"2".to_vec())
            ]
        );
    }

    #[test]
    fn json_helpers_round_trip_and_report_corruption() {
        let backing = Arc::new(MemKvStore::new());
        let store = handle("auth", &backing);

        store.set_json(b"n", &42u64).unwrap();
        assert_eq!(store.get_json::<u64>(b"n").unwrap(), Some(42));
        assert_eq!(store.get_json::<u64>(b"missing").unwrap(), None);

        store.set(b"bad", b"not json");
        let err = store.get_json::<u64>(b"bad").unwrap_err();
        assert!(err.to_string().contains("auth"));
    }
}
