//! # Publisher: transport extension point.
//!
//! Implement [`Publisher`] to hand events to an external transport (message broker,
//! outbox table, webhook). Publishers receive the type-erased [`AnyEvent`] and the
//! [`Scope`] of the current call, through which they may resolve services.
//!
//! # Example
//! ```
//! use async_trait::async_trait;
//! use eventvisor::{AnyEvent, DispatchError, Publisher, Scope};
//! use tokio_util::sync::CancellationToken;
//!
//! #[derive(Default)]
//! struct Outbox;
//!
//! #[async_trait]
//! impl Publisher for Outbox {
//!     async fn publish(
//!         &self,
//!         event: AnyEvent,
//!         _token: CancellationToken,
//!         _scope: &Scope,
//!     ) -> Result<(), DispatchError> {
//!         println!("[outbox] stored {}", event.type_name());
//!         Ok(())
//!     }
//! }
//! ```

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use crate::error::DispatchError;
use crate::events::AnyEvent;
use crate::middleware::PipelineHook;
use crate::resolve::Scope;

/// # Transport for events bound to one or more markers.
#[async_trait]
pub trait Publisher: Send + Sync + 'static {
    /// Delivers one event.
    async fn publish(
        &self,
        event: AnyEvent,
        token: CancellationToken,
        scope: &Scope,
    ) -> Result<(), DispatchError>;

    /// Pipeline declared by the publisher type itself (locks external `use_*` calls).
    fn pipeline() -> Option<PipelineHook>
    where
        Self: Sized,
    {
        None
    }
}
