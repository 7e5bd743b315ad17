//! # Middleware chains around observers and publishers.
//!
//! Every observer invocation and every publisher invocation runs through an ordered
//! chain of [`Middleware`] ending in a terminal action.
//!
//! ## Architecture
//! ```text
//! Chain::execute(event, token)
//!   └─► M1.execute(ctx{event, token, config₁, next})
//!          └─► ctx.next_with(event', token')          (zero, one or many times)
//!                 └─► M2.execute(ctx{event', token', config₂, next})
//!                        └─► ... └─► terminal(event'', token'')
//! ```
//!
//! ## Rules
//! - Declaration order is execution order (outer-to-inner).
//! - Every `next` call re-enters the remainder of the chain independently, resolving
//!   each downstream middleware again through its registration lifetime.
//! - Substituted events/tokens are seen by everything downstream, never upstream.
//! - Config is read from a shared slot when the middleware runs, so reconfiguring a
//!   built chain is honoured by later executions.
//! - The chain catches nothing; errors propagate to the caller unchanged.

mod chain;
#[cfg(feature = "logging")]
mod log;
mod middleware;
mod middleware_fn;
mod pipeline;

pub use chain::Chain;
#[cfg(feature = "logging")]
pub use log::{LogConfig, LogMiddleware};
pub use middleware::{DispatchFuture, Middleware, MiddlewareContext};
pub use middleware_fn::MiddlewareFn;
pub use pipeline::{PipelineBuilder, PipelineCallback, PipelineHook};

pub(crate) use chain::Terminal;
pub(crate) use pipeline::MiddlewareTable;
