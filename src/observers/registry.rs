//! Observer registrations and their resolution into bound invocations.

use std::any::{Any, TypeId, type_name};
use std::collections::HashMap;
use std::sync::Arc;

use futures::future;
use tokio_util::sync::CancellationToken;

use super::observer::Observer;
use crate::error::DispatchError;
use crate::events::{AnyEvent, Event, EventType, TypeHierarchy};
use crate::middleware::{
    Chain, DispatchFuture, MiddlewareTable, PipelineBuilder, PipelineCallback, PipelineHook,
    Terminal,
};
use crate::resolve::{Lifetime, Registration, Scope};
use crate::strategies::Invocation;

type Key = (TypeId, TypeId);
type Shared = Arc<dyn Any + Send + Sync>;
type TerminalFactory =
    Arc<dyn Fn(&Shared, &Scope, &Arc<TypeHierarchy>) -> Option<Terminal> + Send + Sync>;

/// Read-only description of one observer registration.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ObserverInfo {
    /// Observer type name.
    pub observer: &'static str,
    /// Observed event type name.
    pub event: &'static str,
    /// Effective lifetime.
    pub lifetime: Lifetime,
}

/// Type-erased `Registration<O>` shared by every event entry of `O`.
struct ObserverSource {
    registration: Shared,
    lifetime: Lifetime,
}

impl ObserverSource {
    fn new<O: Send + Sync + 'static>(registration: Registration<O>) -> Self {
        Self {
            lifetime: registration.lifetime(),
            registration: Arc::new(registration),
        }
    }
}

struct ObserverEntry {
    key: Key,
    event: EventType,
    observer: &'static str,
    event_name: &'static str,
    hook: Option<PipelineHook>,
    terminal: TerminalFactory,
}

/// Observer entries in registration order, plus the per-observer pipeline callbacks.
///
/// Instances are resolved per observer type: one registration of `O` serves every event
/// `O` is bound to.
#[derive(Default)]
pub(crate) struct ObserverRegistry {
    entries: Vec<ObserverEntry>,
    sources: HashMap<TypeId, ObserverSource>,
    callbacks: HashMap<Key, Vec<PipelineCallback>>,
    hierarchy: Arc<TypeHierarchy>,
    middlewares: Arc<MiddlewareTable>,
}

impl ObserverRegistry {
    /// Registers `O` for `E`, replacing an existing `(O, E)` entry in place.
    ///
    /// The registration replaces the provider of `O` for every event it observes.
    pub(crate) fn register<E: Event, O: Observer<E>>(&mut self, registration: Registration<O>) {
        self.sources
            .insert(TypeId::of::<O>(), ObserverSource::new(registration));
        let entry = Self::entry::<E, O>();
        match self.position(entry.key) {
            Some(index) => self.entries[index] = entry,
            None => self.entries.push(entry),
        }
    }

    /// Registers `O` for `E` unless an `(O, E)` entry already exists.
    ///
    /// An existing provider of `O` is kept.
    pub(crate) fn register_scanned<E: Event, O: Observer<E>>(
        &mut self,
        registration: Registration<O>,
    ) {
        self.sources
            .entry(TypeId::of::<O>())
            .or_insert_with(|| ObserverSource::new(registration));
        let key = (TypeId::of::<O>(), TypeId::of::<E>());
        if self.position(key).is_none() {
            self.entries.push(Self::entry::<E, O>());
        }
    }

    /// Appends an external pipeline callback for `(O, E)`.
    pub(crate) fn configure<E: Event, O: Observer<E>>(&mut self, callback: PipelineCallback) {
        self.callbacks
            .entry((TypeId::of::<O>(), TypeId::of::<E>()))
            .or_default()
            .push(callback);
    }

    /// Freezes the registry with the hierarchy and middleware table it resolves against.
    pub(crate) fn seal(
        mut self,
        hierarchy: Arc<TypeHierarchy>,
        middlewares: Arc<MiddlewareTable>,
    ) -> Self {
        self.hierarchy = hierarchy;
        self.middlewares = middlewares;
        self
    }

    /// Registrations whose event type is `event` or one of its ancestors.
    pub(crate) fn observers_of(&self, event: EventType) -> Vec<ObserverInfo> {
        let lineage = self.hierarchy.lineage(event);
        self.entries
            .iter()
            .filter(|e| lineage.contains(&e.event))
            .map(|e| ObserverInfo {
                observer: e.observer,
                event: e.event_name,
                lifetime: self
                    .sources
                    .get(&e.key.0)
                    .map_or(Lifetime::default(), |s| s.lifetime),
            })
            .collect()
    }

    /// Resolves every observer of `event` into an invocation bound to its own chain.
    pub(crate) fn invocations(
        &self,
        event: &AnyEvent,
        scope: &Scope,
        token: &CancellationToken,
    ) -> Result<Vec<Invocation>, DispatchError> {
        let lineage = self.hierarchy.lineage(event.event_type());
        let mut out: Vec<Invocation> = Vec::new();

        for entry in self.entries.iter().filter(|e| lineage.contains(&e.event)) {
            let chain = self.chain(entry, scope)?;
            let (event, token) = (event.clone(), token.clone());
            out.push(Box::new(move || chain.execute(event, token)));
        }
        Ok(out)
    }

    /// Chain of one specific `(O, E)` registration.
    pub(crate) fn chain_of<E: Event, O: Observer<E>>(
        &self,
        scope: &Scope,
    ) -> Result<Chain, DispatchError> {
        let key = (TypeId::of::<O>(), TypeId::of::<E>());
        let index = self
            .position(key)
            .ok_or(DispatchError::ObserverNotRegistered {
                observer: type_name::<O>(),
                event: type_name::<E>(),
            })?;
        self.chain(&self.entries[index], scope)
    }

    fn chain(&self, entry: &ObserverEntry, scope: &Scope) -> Result<Chain, DispatchError> {
        let terminal = self
            .sources
            .get(&entry.key.0)
            .and_then(|source| (entry.terminal)(&source.registration, scope, &self.hierarchy))
            .ok_or(DispatchError::ObserverNotRegistered {
                observer: entry.observer,
                event: entry.event_name,
            })?;
        let callbacks = self
            .callbacks
            .get(&entry.key)
            .map(Vec::as_slice)
            .unwrap_or_default();
        PipelineBuilder::assemble(
            entry.observer,
            scope,
            &self.middlewares,
            entry.hook,
            callbacks,
            terminal,
        )
    }

    fn position(&self, key: Key) -> Option<usize> {
        self.entries.iter().position(|e| e.key == key)
    }

    fn entry<E: Event, O: Observer<E>>() -> ObserverEntry {
        let terminal: TerminalFactory = Arc::new(
            |registration: &Shared, scope: &Scope, hierarchy: &Arc<TypeHierarchy>| {
                let registration = registration.downcast_ref::<Registration<O>>()?.clone();
                let (scope, hierarchy) = (scope.clone(), Arc::clone(hierarchy));
                Some(Arc::new(move |event: AnyEvent, token: CancellationToken| -> DispatchFuture {
                    let typed = match deliverable::<E>(&event, &hierarchy) {
                        Ok(typed) => typed,
                        Err(err) => return Box::pin(future::ready(Err(err))),
                    };
                    let observer = registration.resolve(&scope);
                    Box::pin(async move { <O as Observer<E>>::handle(&observer, &typed, token).await })
                }) as Terminal)
            },
        );

        ObserverEntry {
            key: (TypeId::of::<O>(), TypeId::of::<E>()),
            event: EventType::of::<E>(),
            observer: type_name::<O>(),
            event_name: type_name::<E>(),
            hook: <O as Observer<E>>::pipeline(),
            terminal,
        }
    }
}

/// Views `event` as an `E`, converting through the hierarchy when it is a subtype.
fn deliverable<E: Event>(
    event: &AnyEvent,
    hierarchy: &TypeHierarchy,
) -> Result<Arc<E>, DispatchError> {
    event
        .downcast_arc::<E>()
        .or_else(|| hierarchy.upcast(event, TypeId::of::<E>())?.downcast_arc::<E>())
        .ok_or(DispatchError::EventTypeMismatch {
            expected: type_name::<E>(),
            actual: event.type_name(),
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct Base(u32);
    struct Derived(u32);
    struct Pong;

    type Seen = Arc<Mutex<Vec<String>>>;

    struct Recorder {
        seen: Seen,
        tag: &'static str,
    }

    #[async_trait]
    impl Observer<Base> for Recorder {
        async fn handle(&self, event: &Base, _t: CancellationToken) -> Result<(), DispatchError> {
            self.seen.lock().unwrap().push(format!("{}:base:{}", self.tag, event.0));
            Ok(())
        }
    }

    #[async_trait]
    impl Observer<Derived> for Recorder {
        async fn handle(&self, event: &Derived, _t: CancellationToken) -> Result<(), DispatchError> {
            self.seen.lock().unwrap().push(format!("{}:derived:{}", self.tag, event.0));
            Ok(())
        }
    }

    struct Other {
        seen: Seen,
    }

    #[async_trait]
    impl Observer<Base> for Other {
        async fn handle(&self, event: &Base, _t: CancellationToken) -> Result<(), DispatchError> {
            self.seen.lock().unwrap().push(format!("other:base:{}", event.0));
            Ok(())
        }
    }

    #[derive(Default)]
    struct Hits(AtomicUsize);

    impl Hits {
        fn bump(&self) -> usize {
            self.0.fetch_add(1, Ordering::SeqCst) + 1
        }
    }

    #[async_trait]
    impl Observer<Base> for Hits {
        async fn handle(&self, _e: &Base, _t: CancellationToken) -> Result<(), DispatchError> {
            assert_eq!(self.bump(), 1);
            Ok(())
        }
    }

    #[async_trait]
    impl Observer<Pong> for Hits {
        async fn handle(&self, _e: &Pong, _t: CancellationToken) -> Result<(), DispatchError> {
            assert_eq!(self.bump(), 2);
            Ok(())
        }
    }

    fn recorder(seen: &Seen, tag: &'static str) -> Registration<Recorder> {
        Registration::instance(Recorder {
            seen: Arc::clone(seen),
            tag,
        })
    }

    fn sealed(registry: ObserverRegistry) -> ObserverRegistry {
        let mut hierarchy = TypeHierarchy::new();
        hierarchy.extends::<Derived, Base, _>(|d: &Derived| Base(d.0 * 10));
        registry.seal(Arc::new(hierarchy), Arc::new(MiddlewareTable::default()))
    }

    async fn run_all(registry: &ObserverRegistry, event: AnyEvent) {
        let scope = Scope::detached();
        let invs = registry
            .invocations(&event, &scope, &CancellationToken::new())
            .unwrap();
        for inv in invs {
            inv().await.unwrap();
        }
    }

    #[tokio::test]
    async fn test_reregistration_replaces_in_place() {
        let seen: Seen = Default::default();
        let mut registry = ObserverRegistry::default();
        registry.register::<Base, Recorder>(recorder(&seen, "first"));
        registry.register::<Base, Other>(Registration::instance(Other { seen: seen.clone() }));
        registry.register::<Base, Recorder>(recorder(&seen, "second"));
        let registry = sealed(registry);

        assert_eq!(registry.observers_of(EventType::of::<Base>()).len(), 2);
        run_all(&registry, AnyEvent::new(Base(1))).await;
        assert_eq!(*seen.lock().unwrap(), vec!["second:base:1", "other:base:1"]);
    }

    #[tokio::test]
    async fn test_scanned_keeps_explicit_registration() {
        let seen: Seen = Default::default();
        let mut registry = ObserverRegistry::default();
        registry.register::<Base, Recorder>(recorder(&seen, "explicit"));
        registry.register_scanned::<Base, Recorder>(recorder(&seen, "scanned"));
        let registry = sealed(registry);

        run_all(&registry, AnyEvent::new(Base(2))).await;
        assert_eq!(*seen.lock().unwrap(), vec!["explicit:base:2"]);
    }

    #[tokio::test]
    async fn test_derived_event_reaches_base_observers_in_registration_order() {
        let seen: Seen = Default::default();
        let mut registry = ObserverRegistry::default();
        registry.register::<Base, Other>(Registration::instance(Other { seen: seen.clone() }));
        registry.register::<Derived, Recorder>(recorder(&seen, "r"));
        let registry = sealed(registry);

        run_all(&registry, AnyEvent::new(Derived(3))).await;
        assert_eq!(*seen.lock().unwrap(), vec!["other:base:30", "r:derived:3"]);

        seen.lock().unwrap().clear();
        run_all(&registry, AnyEvent::new(Base(4))).await;
        assert_eq!(*seen.lock().unwrap(), vec!["other:base:4"]);
    }

    #[tokio::test]
    async fn test_singleton_is_shared_across_observed_events() {
        let mut registry = ObserverRegistry::default();
        registry.register::<Base, Hits>(Registration::singleton());
        registry.register::<Pong, Hits>(Registration::singleton());
        let registry = sealed(registry);

        run_all(&registry, AnyEvent::new(Base(1))).await;
        run_all(&registry, AnyEvent::new(Pong)).await;
    }

    #[test]
    fn test_reregistration_updates_lifetime_for_every_event() {
        let mut registry = ObserverRegistry::default();
        registry.register::<Base, Hits>(Registration::singleton());
        registry.register::<Pong, Hits>(Registration::singleton());
        registry.register::<Base, Hits>(Registration::of());
        registry.register_scanned::<Pong, Hits>(Registration::scoped());
        let registry = sealed(registry);

        let base = registry.observers_of(EventType::of::<Base>());
        let pong = registry.observers_of(EventType::of::<Pong>());
        assert_eq!(base.len(), 1);
        assert_eq!(pong.len(), 1);
        assert_eq!(base[0].lifetime, Lifetime::Transient);
        assert_eq!(pong[0].lifetime, Lifetime::Transient);
    }

    #[tokio::test]
    async fn test_chain_of_unknown_observer_fails() {
        let registry = sealed(ObserverRegistry::default());
        let err = registry
            .chain_of::<Base, Other>(&Scope::detached())
            .unwrap_err();
        assert!(matches!(err, DispatchError::ObserverNotRegistered { .. }));
    }

    #[tokio::test]
    async fn test_unrelated_event_is_a_type_mismatch_at_the_terminal() {
        let seen: Seen = Default::default();
        let mut registry = ObserverRegistry::default();
        registry.register::<Base, Other>(Registration::instance(Other { seen }));
        let registry = sealed(registry);

        let chain = registry.chain_of::<Base, Other>(&Scope::detached()).unwrap();
        let err = chain
            .execute(AnyEvent::new("not a base"), CancellationToken::new())
            .await
            .unwrap_err();
        assert!(matches!(err, DispatchError::EventTypeMismatch { .. }));
    }
}
