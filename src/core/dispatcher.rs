//! # Dispatcher: entry point for publishing events.
//!
//! The [`Dispatcher`] owns every registration made on the [`DispatcherBuilder`] and
//! turns each `publish` call into publisher invocations.
//!
//! ## High-level architecture
//! ```text
//! publish(event, token)
//!   └─► Scope::new(services)                           (one per call)
//!   └─► markers(event) ─► publishers (dedup by type)   (UnknownPublisher if a marker has none)
//!   └─► join_all:
//!         Publisher chain ─► Publisher::publish
//!           └─ InMemoryPublisher ─► observers(lineage(event))
//!                                     └─► BroadcastStrategy::execute
//!                                           └─► Observer chain ─► Observer::handle
//!   └─► combine(failures)
//!
//! handle::<E, O>(event, token)
//!   └─► Observer chain of (O, E) ─► Observer::handle   (no publishers, no strategy)
//! ```
//!
//! ## Example
//! ```rust
//! use async_trait::async_trait;
//! use eventvisor::{Config, DispatchError, Dispatcher, Observer, Registration};
//! use tokio_util::sync::CancellationToken;
//!
//! struct Ping(u32);
//!
//! #[derive(Default)]
//! struct Pong;
//!
//! #[async_trait]
//! impl Observer<Ping> for Pong {
//!     async fn handle(&self, event: &Ping, _token: CancellationToken) -> Result<(), DispatchError> {
//!         println!("pong {}", event.0);
//!         Ok(())
//!     }
//! }
//!
//! #[tokio::main(flavor = "current_thread")]
//! async fn main() -> Result<(), DispatchError> {
//!     let dispatcher = Dispatcher::builder(Config::default())
//!         .observe::<Ping, Pong>(Registration::of())
//!         .build();
//!
//!     dispatcher.publish(Ping(1)).await
//! }
//! ```

use std::sync::Arc;

use futures::future;
use tokio_util::sync::CancellationToken;

use super::{builder::DispatcherBuilder, config::Config};
use crate::error::{DispatchError, combine};
use crate::events::{AnyEvent, Event, EventType, TransportMap};
use crate::middleware::Chain;
use crate::observers::{Observer, ObserverInfo, ObserverRegistry};
use crate::publishers::{PublisherInfo, PublisherRegistry};
use crate::resolve::{Scope, Services};

/// Publishes events through the registered publishers and observers.
pub struct Dispatcher {
    cfg: Config,
    observers: Arc<ObserverRegistry>,
    publishers: PublisherRegistry,
    services: Arc<Services>,
    transports: TransportMap,
}

impl Dispatcher {
    /// Starts building a dispatcher with the given configuration.
    pub fn builder(cfg: Config) -> DispatcherBuilder {
        DispatcherBuilder::new(cfg)
    }

    pub(crate) fn new_internal(
        cfg: Config,
        observers: Arc<ObserverRegistry>,
        publishers: PublisherRegistry,
        services: Arc<Services>,
        transports: TransportMap,
    ) -> Self {
        Self {
            cfg,
            observers,
            publishers,
            services,
            transports,
        }
    }

    /// Configuration the dispatcher was built with.
    pub fn config(&self) -> &Config {
        &self.cfg
    }

    /// Publishes `event` with a fresh, never-cancelled token.
    pub async fn publish<E: Event>(&self, event: E) -> Result<(), DispatchError> {
        self.publish_with(event, CancellationToken::new()).await
    }

    /// Publishes `event` to every publisher bound to its type.
    pub async fn publish_with<E: Event>(
        &self,
        event: E,
        token: CancellationToken,
    ) -> Result<(), DispatchError> {
        self.dispatch_with(AnyEvent::new(event), token).await
    }

    /// Publishes a type-erased event with a fresh token.
    pub async fn dispatch(&self, event: AnyEvent) -> Result<(), DispatchError> {
        self.dispatch_with(event, CancellationToken::new()).await
    }

    /// Publishes a type-erased event; routing uses the event's runtime type.
    ///
    /// Publishers run concurrently; their failures are folded with
    /// [`combine`](crate::error::combine).
    pub async fn dispatch_with(
        &self,
        event: AnyEvent,
        token: CancellationToken,
    ) -> Result<(), DispatchError> {
        let scope = Scope::new(Arc::clone(&self.services));
        let invocations = self
            .publishers
            .invocations(&event, &self.transports, &scope, &token)?;

        tracing::debug!(
            event = event.type_name(),
            publishers = invocations.len(),
            scope = scope.id(),
            "dispatching"
        );
        let results = future::join_all(invocations.into_iter().map(|invoke| invoke())).await;
        let failures: Vec<DispatchError> = results.into_iter().filter_map(Result::err).collect();
        if !failures.is_empty() {
            tracing::debug!(event = event.type_name(), failures = failures.len(), "dispatch failed");
        }
        combine(failures)
    }

    /// Runs `event` through observer `O` only, with a fresh token.
    pub async fn handle<E: Event, O: Observer<E>>(&self, event: E) -> Result<(), DispatchError> {
        self.handle_with::<E, O>(event, CancellationToken::new()).await
    }

    /// Runs `event` through the middleware chain of observer `O`, bypassing publishers
    /// and broadcasting.
    ///
    /// Fails with `ObserverNotRegistered` when `O` is not registered for `E`.
    pub async fn handle_with<E: Event, O: Observer<E>>(
        &self,
        event: E,
        token: CancellationToken,
    ) -> Result<(), DispatchError> {
        let chain = self.observer_chain::<E, O>()?;
        tracing::debug!(observer = chain.owner(), "handling");
        chain.execute(AnyEvent::new(event), token).await
    }

    /// Builds the middleware chain of observer `O` for `E` in a fresh scope.
    ///
    /// The chain can be inspected, reconfigured per middleware type and executed any
    /// number of times; scoped instances are shared across those executions.
    pub fn observer_chain<E: Event, O: Observer<E>>(&self) -> Result<Chain, DispatchError> {
        let scope = Scope::new(Arc::clone(&self.services));
        self.observers.chain_of::<E, O>(&scope)
    }

    /// Observers that receive events of type `E`, in broadcast order.
    pub fn observers_of<E: Event>(&self) -> Vec<ObserverInfo> {
        self.observers.observers_of(EventType::of::<E>())
    }

    /// Registered publishers, in registration order.
    pub fn publishers(&self) -> Vec<PublisherInfo> {
        self.publishers.publishers()
    }
}
