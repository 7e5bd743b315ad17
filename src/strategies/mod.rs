//! Broadcasting strategies.
//!
//! A strategy receives the invocations resolved for one event (each already bound to the
//! event, the token and its observer's full middleware chain) and decides **how** they
//! are awaited and **how** their failures are combined.
//!
//! ## Contents
//! - [`BroadcastStrategy`] the seam; custom strategies implement it
//! - [`Sequential`] registration order, one at a time, with an [`ErrorPolicy`]
//! - [`Parallel`] bounded fan-out, always runs everything before reporting
//!
//! ## Defaults
//! - `Sequential { errors: ErrorPolicy::Immediate }` when nothing is configured.
//!
//! ## Failure folding
//! Both built-ins fold collected failures with [`combine`](crate::error::combine):
//! one failure passes through, several become an aggregate, pure cancellations collapse.

mod parallel;
mod sequential;

use std::any::TypeId;
use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use crate::error::DispatchError;
use crate::middleware::DispatchFuture;

pub use parallel::Parallel;
pub use sequential::{ErrorPolicy, Sequential};

/// One bound observer invocation: calling it starts the observer's chain.
pub type Invocation = Box<dyn FnOnce() -> DispatchFuture + Send>;

/// Policy deciding how the invocations of one event are awaited.
#[async_trait]
pub trait BroadcastStrategy: Send + Sync + 'static {
    /// Runs `invocations` and reports their combined outcome.
    ///
    /// `token` is the token shared by all invocations; strategies must not skip
    /// invocations because it is cancelled, observers react to it themselves.
    async fn execute(
        &self,
        invocations: Vec<Invocation>,
        token: CancellationToken,
    ) -> Result<(), DispatchError>;

    /// Human-readable name (for logs).
    fn name(&self) -> &'static str {
        std::any::type_name::<Self>()
    }
}

/// Global strategy plus per-event-type overrides.
#[derive(Clone)]
pub(crate) struct StrategyTable {
    default: Arc<dyn BroadcastStrategy>,
    per_event: HashMap<TypeId, Arc<dyn BroadcastStrategy>>,
}

impl StrategyTable {
    pub(crate) fn new(
        default: Arc<dyn BroadcastStrategy>,
        per_event: HashMap<TypeId, Arc<dyn BroadcastStrategy>>,
    ) -> Self {
        Self { default, per_event }
    }

    pub(crate) fn for_event(&self, event: TypeId) -> &Arc<dyn BroadcastStrategy> {
        self.per_event.get(&event).unwrap_or(&self.default)
    }
}
