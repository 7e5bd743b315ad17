//! # Registrations and lifetimes.
//!
//! A [`Registration`] describes how to obtain an instance of `T`. Cloning a registration
//! shares its identity: the same singleton is returned through every clone, and the same
//! scoped instance within one [`Scope`]. The dispatcher keeps one registration per
//! observer type, so an observer bound to several event types resolves one instance.

use std::sync::atomic::{AtomicU64, Ordering as AtomicOrdering};
use std::sync::{Arc, OnceLock};

use super::scope::Scope;

static NEXT_REGISTRATION: AtomicU64 = AtomicU64::new(1);

/// Instance-reuse policy of a registration.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Lifetime {
    /// Fresh instance on every resolution (default).
    #[default]
    Transient,
    /// One instance per [`Scope`], i.e. per top-level publish call.
    Scoped,
    /// One instance shared by every resolution.
    Singleton,
}

/// How a registration was declared.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RegistrationKind {
    /// By type (`T: Default`).
    Type,
    /// By factory closure.
    Factory,
    /// By pre-built instance.
    Instance,
}

type Factory<T> = Arc<dyn Fn(&Scope) -> Arc<T> + Send + Sync>;

enum Source<T> {
    Instance(Arc<T>),
    Factory {
        make: Factory<T>,
        lifetime: Lifetime,
        kind: RegistrationKind,
        singleton: OnceLock<Arc<T>>,
    },
}

struct Inner<T> {
    id: u64,
    source: Source<T>,
}

/// Recipe for resolving instances of `T`.
pub struct Registration<T> {
    inner: Arc<Inner<T>>,
}

impl<T> Clone for Registration<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<T: Send + Sync + 'static> Registration<T> {
    /// Registration by type with the default (transient) lifetime.
    pub fn of() -> Self
    where
        T: Default,
    {
        Self::typed(Lifetime::Transient)
    }

    /// Registration by type with an explicit lifetime.
    pub fn with_lifetime(lifetime: Lifetime) -> Self
    where
        T: Default,
    {
        Self::typed(lifetime)
    }

    /// Shorthand for `with_lifetime(Lifetime::Scoped)`.
    pub fn scoped() -> Self
    where
        T: Default,
    {
        Self::typed(Lifetime::Scoped)
    }

    /// Shorthand for `with_lifetime(Lifetime::Singleton)`.
    pub fn singleton() -> Self
    where
        T: Default,
    {
        Self::typed(Lifetime::Singleton)
    }

    /// Registration by factory closure.
    pub fn factory<F>(lifetime: Lifetime, make: F) -> Self
    where
        F: Fn(&Scope) -> T + Send + Sync + 'static,
    {
        Self::from_source(Source::Factory {
            make: Arc::new(move |scope: &Scope| Arc::new(make(scope))),
            lifetime,
            kind: RegistrationKind::Factory,
            singleton: OnceLock::new(),
        })
    }

    /// Registration of a pre-built instance.
    pub fn instance(value: T) -> Self {
        Self::from_arc(Arc::new(value))
    }

    /// Registration of a pre-built shared instance.
    pub fn from_arc(value: Arc<T>) -> Self {
        Self::from_source(Source::Instance(value))
    }

    fn typed(lifetime: Lifetime) -> Self
    where
        T: Default,
    {
        Self::from_source(Source::Factory {
            make: Arc::new(|_: &Scope| Arc::new(T::default())),
            lifetime,
            kind: RegistrationKind::Type,
            singleton: OnceLock::new(),
        })
    }

    fn from_source(source: Source<T>) -> Self {
        Self {
            inner: Arc::new(Inner {
                id: NEXT_REGISTRATION.fetch_add(1, AtomicOrdering::Relaxed),
                source,
            }),
        }
    }

    /// Effective lifetime (instances are always singletons).
    pub fn lifetime(&self) -> Lifetime {
        match &self.inner.source {
            Source::Instance(_) => Lifetime::Singleton,
            Source::Factory { lifetime, .. } => *lifetime,
        }
    }

    /// How this registration was declared.
    pub fn kind(&self) -> RegistrationKind {
        match &self.inner.source {
            Source::Instance(_) => RegistrationKind::Instance,
            Source::Factory { kind, .. } => *kind,
        }
    }

    /// Resolves an instance according to the lifetime.
    pub fn resolve(&self, scope: &Scope) -> Arc<T> {
        match &self.inner.source {
            Source::Instance(value) => Arc::clone(value),
            Source::Factory { make, lifetime, singleton, .. } => match lifetime {
                Lifetime::Transient => make(scope),
                Lifetime::Scoped => scope.get_or_create(self.inner.id, || make(scope)),
                Lifetime::Singleton => Arc::clone(singleton.get_or_init(|| make(scope))),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    #[derive(Default)]
    struct Counter {
        hits: AtomicUsize,
    }

    #[test]
    fn test_transient_is_fresh_every_time() {
        let reg = Registration::<Counter>::of();
        let scope = Scope::detached();
        assert!(!Arc::ptr_eq(&reg.resolve(&scope), &reg.resolve(&scope)));
        assert_eq!(reg.lifetime(), Lifetime::Transient);
        assert_eq!(reg.kind(), RegistrationKind::Type);
    }

    #[test]
    fn test_scoped_is_shared_within_scope_only() {
        let reg = Registration::<Counter>::scoped();
        let a = Scope::detached();
        let b = Scope::detached();
        assert!(Arc::ptr_eq(&reg.resolve(&a), &reg.resolve(&a)));
        assert!(!Arc::ptr_eq(&reg.resolve(&a), &reg.resolve(&b)));
    }

    #[test]
    fn test_singleton_shared_through_clones() {
        let reg = Registration::<Counter>::singleton();
        let copy = reg.clone();
        let first = reg.resolve(&Scope::detached());
        first.hits.fetch_add(1, AtomicOrdering::Relaxed);
        let second = copy.resolve(&Scope::detached());
        assert_eq!(second.hits.load(AtomicOrdering::Relaxed), 1);
    }

    #[test]
    fn test_instance_and_factory() {
        let inst = Registration::instance(Counter::default());
        assert_eq!(inst.lifetime(), Lifetime::Singleton);
        assert_eq!(inst.kind(), RegistrationKind::Instance);

        let fac = Registration::factory(Lifetime::Scoped, |_| Counter::default());
        let scope = Scope::detached();
        assert!(Arc::ptr_eq(&fac.resolve(&scope), &fac.resolve(&scope)));
        assert_eq!(fac.kind(), RegistrationKind::Factory);
    }
}
