//! # Built-in in-memory transport.
//!
//! Broadcasts an event to the observers registered for its type (or any ancestor type)
//! using the broadcasting strategy selected for the event type.

use std::sync::Arc;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use super::publisher::Publisher;
use crate::error::DispatchError;
use crate::events::AnyEvent;
use crate::observers::ObserverRegistry;
use crate::resolve::Scope;
use crate::strategies::StrategyTable;

/// Publisher serving the [`InMemory`](crate::InMemory) marker.
///
/// Created by the dispatcher; it can be targeted by
/// [`DispatcherBuilder::configure_publisher`](crate::DispatcherBuilder::configure_publisher)
/// like any other publisher.
pub struct InMemoryPublisher {
    observers: Arc<ObserverRegistry>,
    strategies: Arc<StrategyTable>,
}

impl InMemoryPublisher {
    pub(crate) fn new(observers: Arc<ObserverRegistry>, strategies: Arc<StrategyTable>) -> Self {
        Self {
            observers,
            strategies,
        }
    }
}

#[async_trait]
impl Publisher for InMemoryPublisher {
    async fn publish(
        &self,
        event: AnyEvent,
        token: CancellationToken,
        scope: &Scope,
    ) -> Result<(), DispatchError> {
        let invocations = self.observers.invocations(&event, scope, &token)?;
        if invocations.is_empty() {
            tracing::trace!(event = event.type_name(), "no observers");
            return Ok(());
        }

        let strategy = self.strategies.for_event(event.type_id());
        tracing::debug!(
            event = event.type_name(),
            observers = invocations.len(),
            strategy = strategy.name(),
            "broadcasting"
        );
        strategy.execute(invocations, token).await
    }
}
