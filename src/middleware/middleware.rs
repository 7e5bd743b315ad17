//! # Middleware trait and execution context.
//!
//! A [`Middleware`] receives a [`MiddlewareContext`] carrying the current event, the
//! current cancellation token, its bound configuration and the continuation into the
//! rest of the chain.
//!
//! ## Example
//! ```rust
//! use async_trait::async_trait;
//! use eventvisor::{DispatchError, Middleware, MiddlewareContext};
//!
//! /// Runs the rest of the chain up to three times.
//! #[derive(Default)]
//! struct Retry;
//!
//! #[async_trait]
//! impl Middleware for Retry {
//!     async fn execute(&self, ctx: MiddlewareContext) -> Result<(), DispatchError> {
//!         let mut last = Ok(());
//!         for _ in 0..3 {
//!             last = ctx.next().await;
//!             if last.is_ok() {
//!                 break;
//!             }
//!         }
//!         last
//!     }
//! }
//! ```

use std::sync::Arc;

use async_trait::async_trait;
use futures::future::BoxFuture;
use tokio_util::sync::CancellationToken;

use super::chain::{ConfigSlot, Link, Terminal};
use crate::error::DispatchError;
use crate::events::{AnyEvent, Event};

/// Future returned by every pipeline step.
pub type DispatchFuture = BoxFuture<'static, Result<(), DispatchError>>;

/// Interceptor wrapped around an observer's or publisher's terminal action.
#[async_trait]
pub trait Middleware: Send + Sync + 'static {
    /// Runs this step. Call [`MiddlewareContext::next`] (any number of times) to
    /// continue down the chain.
    async fn execute(&self, ctx: MiddlewareContext) -> Result<(), DispatchError>;
}

/// Continuation into the remainder of a chain.
///
/// Every `run` call is an independent execution of all downstream steps and the
/// terminal action.
pub(crate) struct Next {
    links: Arc<[Link]>,
    terminal: Terminal,
    index: usize,
}

impl Next {
    pub(crate) fn new(links: Arc<[Link]>, terminal: Terminal, index: usize) -> Self {
        Self {
            links,
            terminal,
            index,
        }
    }

    /// Runs the remainder of the chain with the given event and token.
    pub(crate) fn run(&self, event: AnyEvent, token: CancellationToken) -> DispatchFuture {
        let Some(link) = self.links.get(self.index) else {
            return (self.terminal)(event, token);
        };

        let middleware = link.resolve();
        let ctx = MiddlewareContext {
            event,
            token,
            config: link.config.clone(),
            next: Next::new(Arc::clone(&self.links), Arc::clone(&self.terminal), self.index + 1),
        };
        Box::pin(async move { middleware.execute(ctx).await })
    }
}

/// Execution context handed to [`Middleware::execute`].
pub struct MiddlewareContext {
    event: AnyEvent,
    token: CancellationToken,
    config: ConfigSlot,
    next: Next,
}

impl MiddlewareContext {
    /// Event as received from the previous step.
    pub fn event(&self) -> &AnyEvent {
        &self.event
    }

    /// Event downcast to `E`, if it is exactly an `E`.
    pub fn event_as<E: Event>(&self) -> Option<&E> {
        self.event.downcast_ref()
    }

    /// Cancellation token as received from the previous step.
    pub fn token(&self) -> &CancellationToken {
        &self.token
    }

    /// Configuration currently bound to this step, if it is a `C`.
    ///
    /// Read at call time: reconfiguration after chain construction is visible here.
    pub fn config<C: Send + Sync + 'static>(&self) -> Option<Arc<C>> {
        self.config.get()
    }

    /// Continues with the current event and token.
    pub fn next(&self) -> DispatchFuture {
        self.next.run(self.event.clone(), self.token.clone())
    }

    /// Continues with a substituted event and/or token.
    pub fn next_with(&self, event: AnyEvent, token: CancellationToken) -> DispatchFuture {
        self.next.run(event, token)
    }
}
