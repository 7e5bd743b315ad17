//! # Observer: user-facing event handlers
//!
//! The [`Observer`] trait is the main **extension point** for end users.
//! One type may observe several event types by implementing `Observer<E>` once per type.
//!
//! # Example: custom observer
//! ```
//! use async_trait::async_trait;
//! use eventvisor::{DispatchError, Observer, PipelineBuilder, PipelineHook};
//! use tokio_util::sync::CancellationToken;
//!
//! struct OrderPlaced {
//!     id: u64,
//! }
//!
//! #[derive(Default)]
//! struct Audit;
//!
//! #[async_trait]
//! impl Observer<OrderPlaced> for Audit {
//!     async fn handle(&self, event: &OrderPlaced, token: CancellationToken) -> Result<(), DispatchError> {
//!         if token.is_cancelled() {
//!             return Err(DispatchError::Canceled);
//!         }
//!         println!("[audit] order {}", event.id);
//!         Ok(())
//!     }
//!
//!     fn pipeline() -> Option<PipelineHook> {
//!         Some(audit_pipeline as PipelineHook)
//!     }
//! }
//!
//! fn audit_pipeline(p: &mut PipelineBuilder) -> Result<(), DispatchError> {
//!     tracing::debug!(owner = p.owner(), "audit pipeline");
//!     Ok(())
//! }
//! ```

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use crate::error::DispatchError;
use crate::events::Event;
use crate::middleware::PipelineHook;

/// # Handler for events of type `E`.
///
/// Called once per delivered event, after the observer's middleware chain. Returning an
/// error reports the failure to the broadcasting strategy; cancellation is signalled
/// with [`DispatchError::Canceled`].
#[async_trait]
pub trait Observer<E: Event>: Send + Sync + 'static {
    /// Handles one event.
    async fn handle(&self, event: &E, token: CancellationToken) -> Result<(), DispatchError>;

    /// Pipeline declared by the observer type itself.
    ///
    /// Returning a hook locks the pipeline: external `use_*` calls are then rejected,
    /// while configuring middleware already in the chain is still allowed.
    fn pipeline() -> Option<PipelineHook>
    where
        Self: Sized,
    {
        None
    }
}
