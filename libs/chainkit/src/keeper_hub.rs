//! Type-keyed registry of keepers.
//!
//! Wiring flow:
//! - While a module is built, it may publish its keeper under an interface
//!   type (usually `dyn SomeKeeperApi`). The hub records which module owns it.
//! - Later modules resolve keepers by interface type. Through
//!   [`crate::context::BuildCtx::keeper`] a module can only reach keepers
//!   owned by modules it declared as dependencies.
//!
//! Implementation details:
//! - Key = `type_name::<T>()`, which works for `T = dyn Trait`.
//! - Value = `Arc<T>` stored as `Box<dyn Any + Send + Sync>` (downcast on read).
//! - Each interface can be provided once; keepers are never replaced.

use parking_lot::RwLock;
use std::{any::Any, collections::HashMap, fmt, sync::Arc};

use crate::error::ConfigurationError;

/// Stable type key for trait objects, the fully-qualified `type_name::<T>()`.
#[derive(Clone, Copy, Eq, PartialEq, Hash)]
pub struct TypeKey(&'static str);

impl TypeKey {
    #[inline]
    #[must_use]
    pub fn of<T: ?Sized + 'static>() -> Self {
        TypeKey(std::any::type_name::<T>())
    }

    #[inline]
    #[must_use]
    pub fn name(self) -> &'static str {
        self.0
    }
}

impl fmt::Debug for TypeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.0)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum KeeperHubError {
    #[error("keeper not found: type={0:?}")]
    NotFound(TypeKey),

    #[error("type mismatch in hub for type={0:?}")]
    TypeMismatch(TypeKey),
}

struct Provided {
    owner: Arc<str>,
    keeper: Box<dyn Any + Send + Sync>,
}

/// Keepers published by modules, keyed by interface type.
#[derive(Default)]
pub struct KeeperHub {
    map: RwLock<HashMap<TypeKey, Provided>>,
}

impl fmt::Debug for KeeperHub {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_map().entries(self.keepers()).finish()
    }
}

impl KeeperHub {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Publishes `keeper` under interface `T` on behalf of `owner`.
    ///
    /// # Errors
    /// `ConfigurationError::DuplicateKeeper` if `T` is already provided.
    pub fn provide<T>(&self, owner: &str, keeper: Arc<T>) -> Result<(), ConfigurationError>
    where
        T: ?Sized + Send + Sync + 'static,
    {
        let key = TypeKey::of::<T>();
        let mut w = self.map.write();
        if let Some(existing) = w.get(&key) {
            return Err(ConfigurationError::DuplicateKeeper {
                keeper: key.name().to_owned(),
                first: existing.owner.to_string(),
                second: owner.to_owned(),
            });
        }
        tracing::debug!(module = owner, keeper = key.name(), "Keeper provided");
        w.insert(
            key,
            Provided {
                owner: Arc::from(owner),
                keeper: Box::new(keeper),
            },
        );
        Ok(())
    }

    /// Fetches a keeper by interface type, without ownership checks.
    ///
    /// # Errors
    /// `KeeperHubError::NotFound` if nothing provides `T`.
    pub fn get<T>(&self) -> Result<Arc<T>, KeeperHubError>
    where
        T: ?Sized + Send + Sync + 'static,
    {
        self.get_with_owner::<T>().map(|(k, _)| k)
    }

    /// Fetches a keeper together with the name of the module that owns it.
    ///
    /// # Errors
    /// `KeeperHubError::NotFound` if nothing provides `T`.
    pub fn get_with_owner<T>(&self) -> Result<(Arc<T>, Arc<str>), KeeperHubError>
    where
        T: ?Sized + Send + Sync + 'static,
    {
        let key = TypeKey::of::<T>();
        let r = self.map.read();
        let provided = r.get(&key).ok_or(KeeperHubError::NotFound(key))?;

        // Stored value is exactly `Arc<T>`.
        provided
            .keeper
            .downcast_ref::<Arc<T>>()
            .map(|k| (Arc::clone(k), Arc::clone(&provided.owner)))
            .ok_or(KeeperHubError::TypeMismatch(key))
    }

    /// Owning module of interface `T`, if provided.
    pub fn owner_of<T: ?Sized + 'static>(&self) -> Option<String> {
        self.map
            .read()
            .get(&TypeKey::of::<T>())
            .map(|p| p.owner.to_string())
    }

    /// `(interface, owner)` pairs, sorted by interface name.
    pub fn keepers(&self) -> Vec<(&'static str, String)> {
        let mut out: Vec<_> = self
            .map
            .read()
            .iter()
            .map(|(k, p)| (k.name(), p.owner.to_string()))
            .collect();
        out.sort();
        out
    }

    pub fn len(&self) -> usize {
        self.map.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.map.read().is_empty()
    }
}
