//! # LogMiddleware: tracing around a pipeline step
//!
//! A minimal middleware that records entry, exit and failures of the downstream chain
//! through `tracing`. Attach a [`LogConfig`] to tag the records.
//!
//! ## Example output (fmt subscriber, `RUST_LOG=eventvisor=debug`)
//! ```text
//! DEBUG eventvisor::middleware::log: pipeline step entered event="demo::Ping" label="audit"
//! DEBUG eventvisor::middleware::log: pipeline step completed event="demo::Ping" label="audit"
//! WARN  eventvisor::middleware::log: pipeline step failed event="demo::Ping" label="audit" error=boom kind="dispatch_failed"
//! ```

use async_trait::async_trait;

use super::middleware::{Middleware, MiddlewareContext};
use crate::error::DispatchError;

/// Optional tag attached to every record of [`LogMiddleware`].
#[derive(Clone, Debug, Default)]
pub struct LogConfig {
    /// Free-form label (e.g. the owning observer).
    pub label: String,
}

/// Tracing middleware.
#[derive(Default)]
pub struct LogMiddleware;

impl LogMiddleware {
    /// Construct a new [`LogMiddleware`].
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Middleware for LogMiddleware {
    async fn execute(&self, ctx: MiddlewareContext) -> Result<(), DispatchError> {
        let config = ctx.config::<LogConfig>();
        let label = config.as_deref().map_or("", |c| c.label.as_str());
        let event = ctx.event().type_name();

        tracing::debug!(event, label, "pipeline step entered");
        let res = ctx.next().await;
        match &res {
            Ok(()) => tracing::debug!(event, label, "pipeline step completed"),
            Err(e) if e.is_cancellation() => tracing::debug!(event, label, "pipeline step cancelled"),
            Err(e) => tracing::warn!(event, label, error = %e, kind = e.as_label(), "pipeline step failed"),
        }
        res
    }
}
