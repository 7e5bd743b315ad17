//! Publisher registrations and marker-based resolution.

use std::any::{TypeId, type_name};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use super::in_memory::InMemoryPublisher;
use super::publisher::Publisher;
use crate::error::DispatchError;
use crate::events::{AnyEvent, InMemory, MarkerKey, TransportMap};
use crate::middleware::{
    Chain, DispatchFuture, MiddlewareTable, PipelineBuilder, PipelineCallback, PipelineHook,
    Terminal,
};
use crate::resolve::{Lifetime, Registration, Scope};
use crate::strategies::Invocation;

type TerminalFactory = Arc<dyn Fn(&Scope) -> Terminal + Send + Sync>;

/// Read-only description of one publisher registration.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PublisherInfo {
    /// Publisher type name.
    pub publisher: &'static str,
    /// Markers the publisher serves, in registration order.
    pub markers: Vec<&'static str>,
    /// Effective lifetime.
    pub lifetime: Lifetime,
}

struct PublisherEntry {
    publisher: TypeId,
    name: &'static str,
    lifetime: Lifetime,
    markers: Vec<MarkerKey>,
    hook: Option<PipelineHook>,
    terminal: TerminalFactory,
}

impl PublisherEntry {
    fn new<P: Publisher>(registration: Registration<P>, marker: MarkerKey) -> Self {
        let lifetime = registration.lifetime();
        let terminal: TerminalFactory = Arc::new(move |scope: &Scope| {
            let (registration, scope) = (registration.clone(), scope.clone());
            Arc::new(move |event: AnyEvent, token: CancellationToken| -> DispatchFuture {
                let publisher = registration.resolve(&scope);
                let scope = scope.clone();
                Box::pin(async move { publisher.publish(event, token, &scope).await })
            }) as Terminal
        });
        Self {
            publisher: TypeId::of::<P>(),
            name: type_name::<P>(),
            lifetime,
            markers: vec![marker],
            hook: P::pipeline(),
            terminal,
        }
    }

    fn serves(&self, marker: MarkerKey) -> bool {
        self.markers.contains(&marker)
    }

    fn add_marker(&mut self, marker: MarkerKey) {
        if !self.serves(marker) {
            self.markers.push(marker);
        }
    }
}

/// Publisher entries in registration order, plus the built-in in-memory fallback.
#[derive(Default)]
pub(crate) struct PublisherRegistry {
    entries: Vec<PublisherEntry>,
    callbacks: HashMap<TypeId, Vec<PipelineCallback>>,
    fallback: Option<PublisherEntry>,
    middlewares: Arc<MiddlewareTable>,
}

impl PublisherRegistry {
    /// Registers `P` for marker `M`.
    ///
    /// Re-registering `P` replaces its provider and adds `M` to the markers it serves.
    pub(crate) fn register<P: Publisher, M: 'static>(&mut self, registration: Registration<P>) {
        let marker = MarkerKey::of::<M>();
        let mut entry = PublisherEntry::new(registration, marker);
        match self.position(TypeId::of::<P>()) {
            Some(index) => {
                let existing = &mut self.entries[index];
                entry.markers = std::mem::take(&mut existing.markers);
                entry.add_marker(marker);
                *existing = entry;
            }
            None => self.entries.push(entry),
        }
    }

    /// Registers `P` for marker `M`, keeping an existing provider for `P`.
    pub(crate) fn register_scanned<P: Publisher, M: 'static>(
        &mut self,
        registration: Registration<P>,
    ) {
        let marker = MarkerKey::of::<M>();
        match self.position(TypeId::of::<P>()) {
            Some(index) => self.entries[index].add_marker(marker),
            None => self.entries.push(PublisherEntry::new(registration, marker)),
        }
    }

    /// Appends an external pipeline callback for `P`.
    pub(crate) fn configure<P: Publisher>(&mut self, callback: PipelineCallback) {
        self.callbacks
            .entry(TypeId::of::<P>())
            .or_default()
            .push(callback);
    }

    /// Freezes the registry with the built-in in-memory publisher and the middleware table.
    pub(crate) fn seal(
        mut self,
        in_memory: InMemoryPublisher,
        middlewares: Arc<MiddlewareTable>,
    ) -> Self {
        self.fallback = Some(PublisherEntry::new(
            Registration::instance(in_memory),
            MarkerKey::of::<InMemory>(),
        ));
        self.middlewares = middlewares;
        self
    }

    /// Registered publishers (the built-in fallback is not listed).
    pub(crate) fn publishers(&self) -> Vec<PublisherInfo> {
        self.entries
            .iter()
            .map(|e| PublisherInfo {
                publisher: e.name,
                markers: e.markers.iter().map(|m| m.name()).collect(),
                lifetime: e.lifetime,
            })
            .collect()
    }

    /// Resolves the publishers of `event` into invocations bound to their chains.
    pub(crate) fn invocations(
        &self,
        event: &AnyEvent,
        transports: &TransportMap,
        scope: &Scope,
        token: &CancellationToken,
    ) -> Result<Vec<Invocation>, DispatchError> {
        let mut out: Vec<Invocation> = Vec::new();
        for entry in self.resolve(event, transports)? {
            let chain = self.chain(entry, scope)?;
            let (event, token) = (event.clone(), token.clone());
            out.push(Box::new(move || chain.execute(event, token)));
        }
        Ok(out)
    }

    fn resolve(
        &self,
        event: &AnyEvent,
        transports: &TransportMap,
    ) -> Result<Vec<&PublisherEntry>, DispatchError> {
        let mut seen = HashSet::new();
        let mut out = Vec::new();

        for marker in transports.markers_for(event.type_id()) {
            let mut serving: Vec<&PublisherEntry> =
                self.entries.iter().filter(|e| e.serves(marker)).collect();
            if serving.is_empty() && marker == MarkerKey::of::<InMemory>() {
                serving.extend(self.fallback.as_ref());
            }
            if serving.is_empty() {
                tracing::warn!(event = event.type_name(), marker = marker.name(), "no publisher for marker");
                return Err(DispatchError::UnknownPublisher {
                    marker: marker.name(),
                });
            }
            out.extend(serving.into_iter().filter(|e| seen.insert(e.publisher)));
        }
        Ok(out)
    }

    fn chain(&self, entry: &PublisherEntry, scope: &Scope) -> Result<Chain, DispatchError> {
        let callbacks = self
            .callbacks
            .get(&entry.publisher)
            .map(Vec::as_slice)
            .unwrap_or_default();
        PipelineBuilder::assemble(
            entry.name,
            scope,
            &self.middlewares,
            entry.hook,
            callbacks,
            (entry.terminal)(scope),
        )
    }

    fn position(&self, publisher: TypeId) -> Option<usize> {
        self.entries.iter().position(|e| e.publisher == publisher)
    }
}
