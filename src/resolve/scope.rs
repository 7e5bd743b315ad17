//! # Resolution scope of one top-level call.
//!
//! A [`Scope`] is opened by every `publish`, `dispatch` and `handle` call and lives until
//! the call returns. It caches scoped instances and resolves auxiliary [`Services`]
//! (for example settings a pipeline hook reads to configure a middleware).
//!
//! The scope is a cheap handle; clones share the same cache.

use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering as AtomicOrdering};
use std::sync::{Arc, Mutex, PoisonError};

use super::registration::Registration;

static NEXT_SCOPE: AtomicU64 = AtomicU64::new(1);

type Shared = Arc<dyn Any + Send + Sync>;

/// Registered auxiliary services, keyed by type.
#[derive(Clone, Default)]
pub struct Services {
    entries: HashMap<TypeId, Shared>,
}

impl Services {
    /// Registers (or replaces) the registration for `T`.
    pub fn insert<T: Send + Sync + 'static>(&mut self, registration: Registration<T>) {
        self.entries.insert(TypeId::of::<T>(), Arc::new(registration));
    }

    /// Registers `T` only if nothing is registered yet.
    pub fn insert_if_absent<T: Send + Sync + 'static>(&mut self, registration: Registration<T>) {
        self.entries
            .entry(TypeId::of::<T>())
            .or_insert_with(|| Arc::new(registration));
    }

    fn registration<T: Send + Sync + 'static>(&self) -> Option<&Registration<T>> {
        self.entries.get(&TypeId::of::<T>())?.downcast_ref()
    }
}

/// Per-call resolution scope.
#[derive(Clone)]
pub struct Scope {
    id: u64,
    cache: Arc<Mutex<HashMap<u64, Shared>>>,
    services: Arc<Services>,
}

impl Scope {
    /// Opens a scope backed by `services`.
    pub fn new(services: Arc<Services>) -> Self {
        Self {
            id: NEXT_SCOPE.fetch_add(1, AtomicOrdering::Relaxed),
            cache: Arc::new(Mutex::new(HashMap::new())),
            services,
        }
    }

    /// Opens a scope without services.
    pub fn detached() -> Self {
        Self::new(Arc::new(Services::default()))
    }

    /// Process-unique scope id (diagnostics).
    pub fn id(&self) -> u64 {
        self.id
    }

    /// Resolves a registered service of type `T`.
    pub fn resolve<T: Send + Sync + 'static>(&self) -> Option<Arc<T>> {
        self.services.registration::<T>().map(|r| r.resolve(self))
    }

    /// Returns the instance cached under `key`, creating it with `make` on first use.
    ///
    /// `make` runs without the cache lock held, so factories may resolve other scoped
    /// components. If two callers race, the first stored instance wins.
    pub(crate) fn get_or_create<T, F>(&self, key: u64, make: F) -> Arc<T>
    where
        T: Send + Sync + 'static,
        F: FnOnce() -> Arc<T>,
    {
        if let Some(found) = self.cached::<T>(key) {
            return found;
        }
        let created = make();
        let mut cache = self.cache.lock().unwrap_or_else(PoisonError::into_inner);
        let stored = cache
            .entry(key)
            .or_insert_with(|| Arc::new(Arc::clone(&created)) as Shared);
        stored.downcast_ref::<Arc<T>>().cloned().unwrap_or(created)
    }

    fn cached<T: Send + Sync + 'static>(&self, key: u64) -> Option<Arc<T>> {
        let cache = self.cache.lock().unwrap_or_else(PoisonError::into_inner);
        cache.get(&key)?.downcast_ref::<Arc<T>>().cloned()
    }
}

impl std::fmt::Debug for Scope {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Scope").field("id", &self.id).finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resolve::Lifetime;

    #[derive(Default)]
    struct Settings {
        attempts: u32,
    }

    #[test]
    fn test_resolve_service() {
        let mut services = Services::default();
        services.insert(Registration::instance(Settings { attempts: 3 }));
        let scope = Scope::new(Arc::new(services));
        assert_eq!(scope.resolve::<Settings>().map(|s| s.attempts), Some(3));
        assert!(scope.resolve::<String>().is_none());
    }

    #[test]
    fn test_insert_if_absent_keeps_existing() {
        let mut services = Services::default();
        services.insert(Registration::instance(Settings { attempts: 1 }));
        services.insert_if_absent(Registration::instance(Settings { attempts: 9 }));
        let scope = Scope::new(Arc::new(services));
        assert_eq!(scope.resolve::<Settings>().map(|s| s.attempts), Some(1));
    }

    #[test]
    fn test_scoped_factory_may_resolve_other_scoped() {
        let inner = Registration::<Settings>::scoped();
        let inner_for_outer = inner.clone();
        let outer = Registration::factory(Lifetime::Scoped, move |scope| {
            inner_for_outer.resolve(scope).attempts + 1
        });
        let scope = Scope::detached();
        assert_eq!(*outer.resolve(&scope), 1);
        assert!(Arc::ptr_eq(&inner.resolve(&scope), &inner.resolve(&scope)));
    }
}
