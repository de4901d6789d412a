use std::collections::BTreeSet;
use std::sync::Arc;

use super::{KvStore, StoreHandle, prefix_end};
use crate::error::ConfigurationError;

const MAX_NAMESPACE_LEN: usize = 64;

/// Reservation records live under `[0x00]`. Namespace prefixes start with
/// the name length, which is never 0, so no handle can reach this range.
const RESERVED_PREFIX: &[u8] = &[0x00];

fn reservation_key(name: &str) -> Vec<u8> {
    let mut key = RESERVED_PREFIX.to_vec();
    key.extend_from_slice(name.as_bytes());
    key
}

/// Hands out disjoint [`StoreHandle`]s from one backing store.
///
/// Every allocated namespace is recorded in the backing store itself, so
/// a name is refused even when another allocator over the same store
/// handed it out.
pub struct StoreAllocator {
    backing: Arc<dyn KvStore>,
}

impl StoreAllocator {
    pub fn new(backing: Arc<dyn KvStore>) -> Self {
        Self { backing }
    }

    /// Allocates one handle per requested name, in request order.
    ///
    /// All-or-nothing: if any name is invalid, repeated in the request, or
    /// already allocated, nothing is allocated.
    ///
    /// # Errors
    /// `ConfigurationError::InvalidNamespace` or
    /// `ConfigurationError::DuplicateNamespace`.
    pub fn allocate(&self, names: &[&str]) -> Result<Vec<StoreHandle>, ConfigurationError> {
        let mut requested = BTreeSet::new();
        for name in names {
            validate_namespace(name)?;
            if !requested.insert(*name) {
                return Err(ConfigurationError::DuplicateNamespace((*name).to_owned()));
            }
        }

        for (i, name) in names.iter().enumerate() {
            if !self.backing.set_if_absent(&reservation_key(name), b"") {
                for reserved in &names[..i] {
                    self.backing.delete(&reservation_key(reserved));
                }
                return Err(ConfigurationError::DuplicateNamespace((*name).to_owned()));
            }
        }

        Ok(names
            .iter()
            .map(|name| {
                tracing::debug!(namespace = %name, "Allocated store namespace");
                StoreHandle::new(name, Arc::clone(&self.backing))
            })
            .collect())
    }

    /// Names allocated so far on the backing store, sorted.
    pub fn namespaces(&self) -> Vec<String> {
        let end = prefix_end(RESERVED_PREFIX);
        self.backing
            .range(RESERVED_PREFIX, end.as_deref())
            .into_iter()
            .map(|(key, _)| String::from_utf8_lossy(&key[RESERVED_PREFIX.len()..]).into_owned())
            .collect()
    }
}

fn validate_namespace(name: &str) -> Result<(), ConfigurationError> {
    let reason = if name.is_empty() {
        Some("must not be empty")
    } else if name.len() > MAX_NAMESPACE_LEN {
        Some("longer than 64 bytes")
    } else if !name
        .bytes()
        .all(|b| b.is_ascii_alphanumeric() || b == b'_' || b == b'-')
    {
        Some("only ASCII letters, digits, '_' and '-' are allowed")
    } else {
        None
    };

    match reason {
        Some(reason) => Err(ConfigurationError::InvalidNamespace {
            name: name.to_owned(),
            reason,
        }),
        None => Ok(()),
    }
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use super::*;
    use crate::store::MemKvStore;

    fn allocator() -> StoreAllocator {
        StoreAllocator::new(Arc::new(MemKvStore::new()))
    }

    #[test]
    fn allocates_one_handle_per_name_in_order() {
        let alloc = allocator();
        let handles = alloc.allocate(&["acc", "bank"]).unwrap();
        let names: Vec<_> = handles.iter().map(StoreHandle::namespace).collect();
        assert_eq!(names, vec!["acc", "bank"]);
        assert_eq!(alloc.namespaces(), vec!["acc", "bank"]);
    }

    #[test]
    fn rejects_previously_allocated_name() {
        let alloc = allocator();
        alloc.allocate(&["bank"]).unwrap();

        let err = alloc.allocate(&["bank"]).unwrap_err();
        assert!(matches!(err, ConfigurationError::DuplicateNamespace(ref n) if n == "bank"));
    }

    #[test]
    fn rejects_duplicates_within_one_request_and_allocates_nothing() {
        let alloc = allocator();
        let err = alloc.allocate(&["staking", "crisis", "staking"]).unwrap_err();
        assert!(matches!(err, ConfigurationError::DuplicateNamespace(_)));
        assert!(
            alloc.namespaces().is_empty(),
            "failed request must not leave partial allocations"
        );
        alloc.allocate(&["staking"]).unwrap();
    }

    #[test]
    fn rejects_invalid_names() {
        let alloc = allocator();
        for bad in ["", "with space", "slash/name", &"x".repeat(65)] {
            let err = alloc.allocate(&[bad]).unwrap_err();
            assert!(
                matches!(err, ConfigurationError::InvalidNamespace { .. }),
                "expected {bad:?} to be rejected"
            );
        }
    }

    #[test]
    fn handles_from_one_allocator_share_backing_but_not_keys() {
        let backing = Arc::new(MemKvStore::new());
        let alloc = StoreAllocator::new(backing.clone());
        let handles = alloc.allocate(&["a", "b"]).unwrap();

        handles[0].set(b"key", b"1");
        assert!(handles[1].get(b"key").is_none());
        assert_eq!(handles[0].iter_prefix(b"").len(), 1);
        assert!(handles[1].iter_prefix(b"").is_empty());
    }

    #[test]
    fn second_allocator_over_same_backing_cannot_reuse_a_name() {
        let backing = Arc::new(MemKvStore::new());
        let first = StoreAllocator::new(backing.clone());
        let second = StoreAllocator::new(backing.clone());

        let bank = first.allocate(&["bank"]).unwrap().remove(0);
        bank.set(b"k", b"from-first");

        let err = second.allocate(&["bank"]).unwrap_err();
        assert!(matches!(err, ConfigurationError::DuplicateNamespace(ref n) if n == "bank"));
        assert_eq!(second.namespaces(), vec!["bank"]);
    }

    #[test]
    fn conflict_with_other_allocator_rolls_back_whole_request() {
        let backing = Arc::new(MemKvStore::new());
        let first = StoreAllocator::new(backing.clone());
        let second = StoreAllocator::new(backing.clone());
        first.allocate(&["crisis"]).unwrap();

        assert!(second.allocate(&["acc", "crisis"]).is_err());
        assert_eq!(second.namespaces(), vec!["crisis"]);
        second.allocate(&["acc"]).unwrap();
    }
}
