use std::any::TypeId;
use std::collections::HashMap;
use std::sync::Arc;

use super::{config::Config, dispatcher::Dispatcher};
use crate::error::DispatchError;
use crate::events::{Event, TransportMap, TypeHierarchy};
use crate::middleware::{Middleware, MiddlewareTable, PipelineBuilder};
use crate::observers::{Observer, ObserverRegistry};
use crate::publishers::{InMemoryPublisher, Publisher, PublisherRegistry};
use crate::resolve::{Registration, Services};
use crate::strategies::{BroadcastStrategy, StrategyTable};

/// Builder wiring observers, publishers, middleware and services into a [`Dispatcher`].
///
/// Registration order matters: observers of one event are broadcast in the order they
/// were first registered.
pub struct DispatcherBuilder {
    cfg: Config,
    observers: ObserverRegistry,
    publishers: PublisherRegistry,
    middlewares: MiddlewareTable,
    services: Services,
    transports: TransportMap,
    hierarchy: TypeHierarchy,
    strategies: HashMap<TypeId, Arc<dyn BroadcastStrategy>>,
}

impl DispatcherBuilder {
    /// Creates a new builder with the given configuration.
    pub fn new(cfg: Config) -> Self {
        Self {
            cfg,
            observers: ObserverRegistry::default(),
            publishers: PublisherRegistry::default(),
            middlewares: MiddlewareTable::default(),
            services: Services::default(),
            transports: TransportMap::default(),
            hierarchy: TypeHierarchy::new(),
            strategies: HashMap::new(),
        }
    }

    /// Registers observer `O` for event type `E` (replaces an earlier `(O, E)` registration).
    ///
    /// The registration provides `O`'s instances for every event `O` observes.
    pub fn observe<E: Event, O: Observer<E>>(mut self, registration: Registration<O>) -> Self {
        self.observers.register::<E, O>(registration);
        self
    }

    /// Registers observer `O` for `E` unless it is already registered.
    ///
    /// Meant for discovery-style bulk registration that must not override explicit wiring.
    pub fn observe_scanned<E: Event, O: Observer<E>>(
        mut self,
        registration: Registration<O>,
    ) -> Self {
        self.observers.register_scanned::<E, O>(registration);
        self
    }

    /// Registers publisher `P` as a transport for marker `M`.
    ///
    /// Registering the same publisher for another marker adds the marker; the latest
    /// registration provides the instances.
    pub fn publisher<P: Publisher, M: 'static>(mut self, registration: Registration<P>) -> Self {
        self.publishers.register::<P, M>(registration);
        self
    }

    /// Registers publisher `P` for marker `M`, keeping an existing provider for `P`.
    pub fn publisher_scanned<P: Publisher, M: 'static>(
        mut self,
        registration: Registration<P>,
    ) -> Self {
        self.publishers.register_scanned::<P, M>(registration);
        self
    }

    /// Registers middleware `M` (replaces an earlier registration).
    pub fn middleware<M: Middleware>(mut self, registration: Registration<M>) -> Self {
        self.middlewares.register(registration);
        self
    }

    /// Registers middleware `M` unless it is already registered.
    pub fn middleware_scanned<M: Middleware>(mut self, registration: Registration<M>) -> Self {
        self.middlewares.register_scanned(registration);
        self
    }

    /// Registers an auxiliary service resolvable through [`Scope::resolve`](crate::Scope::resolve).
    pub fn service<T: Send + Sync + 'static>(mut self, registration: Registration<T>) -> Self {
        self.services.insert(registration);
        self
    }

    /// Registers service `T` unless it is already registered.
    pub fn service_scanned<T: Send + Sync + 'static>(
        mut self,
        registration: Registration<T>,
    ) -> Self {
        self.services.insert_if_absent(registration);
        self
    }

    /// Binds event type `E` to transport marker `M`.
    pub fn transport<E: Event, M: 'static>(mut self) -> Self {
        self.transports.declare::<E, M>();
        self
    }

    /// Declares `S` as a subtype of `B`; observers of `B` then receive `S` events.
    pub fn extends<S, B, F>(mut self, upcast: F) -> Self
    where
        S: Event,
        B: Event,
        F: Fn(&S) -> B + Send + Sync + 'static,
    {
        self.hierarchy.extends::<S, B, F>(upcast);
        self
    }

    /// Overrides the broadcasting strategy for event type `E`.
    pub fn broadcast_for<E: Event>(mut self, strategy: impl BroadcastStrategy) -> Self {
        self.strategies.insert(TypeId::of::<E>(), Arc::new(strategy));
        self
    }

    /// Adds an external pipeline callback for observer `O` of event type `E`.
    ///
    /// Callbacks run after the observer's own [`Observer::pipeline`] hook, in the order
    /// they were added.
    pub fn configure_observer<E, O, F>(mut self, callback: F) -> Self
    where
        E: Event,
        O: Observer<E>,
        F: Fn(&mut PipelineBuilder) -> Result<(), DispatchError> + Send + Sync + 'static,
    {
        self.observers.configure::<E, O>(Arc::new(callback));
        self
    }

    /// Adds an external pipeline callback for publisher `P`.
    pub fn configure_publisher<P, F>(mut self, callback: F) -> Self
    where
        P: Publisher,
        F: Fn(&mut PipelineBuilder) -> Result<(), DispatchError> + Send + Sync + 'static,
    {
        self.publishers.configure::<P>(Arc::new(callback));
        self
    }

    /// Builds and returns the dispatcher.
    pub fn build(self) -> Arc<Dispatcher> {
        let middlewares = Arc::new(self.middlewares);
        let observers = Arc::new(
            self.observers
                .seal(Arc::new(self.hierarchy), Arc::clone(&middlewares)),
        );
        let strategies = Arc::new(StrategyTable::new(self.cfg.strategy(), self.strategies));
        let in_memory = InMemoryPublisher::new(Arc::clone(&observers), strategies);
        let publishers = self.publishers.seal(in_memory, middlewares);

        tracing::debug!(
            broadcast = ?self.cfg.broadcast,
            errors = ?self.cfg.errors,
            max_parallelism = self.cfg.max_parallelism,
            "dispatcher built"
        );
        Arc::new(Dispatcher::new_internal(
            self.cfg,
            observers,
            publishers,
            Arc::new(self.services),
            self.transports,
        ))
    }
}
