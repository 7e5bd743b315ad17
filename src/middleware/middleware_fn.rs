//! # Function-backed middleware (`MiddlewareFn`)
//!
//! [`MiddlewareFn`] wraps a closure `F: Fn(MiddlewareContext) -> Fut`, producing a fresh
//! future per execution. Handy for one-off interceptors that do not deserve a named type.
//!
//! ## Example
//! ```rust
//! use std::sync::Arc;
//! use eventvisor::{AnyEvent, MiddlewareContext, MiddlewareFn};
//!
//! // Doubles every `u32` event before passing it on.
//! let doubler = MiddlewareFn::arc("doubler", |ctx: MiddlewareContext| async move {
//!     let value = ctx.event_as::<u32>().copied().unwrap_or_default();
//!     ctx.next_with(AnyEvent::new(value * 2), ctx.token().clone()).await
//! });
//! assert_eq!(doubler.name(), "doubler");
//! ```

use std::borrow::Cow;
use std::future::Future;
use std::sync::Arc;

use async_trait::async_trait;

use super::middleware::{Middleware, MiddlewareContext};
use crate::error::DispatchError;

/// Closure-backed [`Middleware`].
#[derive(Debug)]
pub struct MiddlewareFn<F> {
    name: Cow<'static, str>,
    f: F,
}

impl<F> MiddlewareFn<F> {
    /// Creates a new function-backed middleware.
    pub fn new(name: impl Into<Cow<'static, str>>, f: F) -> Self {
        Self { name: name.into(), f }
    }

    /// Creates the middleware behind an `Arc`, ready for `use_instance`.
    pub fn arc(name: impl Into<Cow<'static, str>>, f: F) -> Arc<Self> {
        Arc::new(Self::new(name, f))
    }

    /// Human-readable name.
    pub fn name(&self) -> &str {
        &self.name
    }
}

#[async_trait]
impl<F, Fut> Middleware for MiddlewareFn<F>
where
    F: Fn(MiddlewareContext) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<(), DispatchError>> + Send + 'static,
{
    async fn execute(&self, ctx: MiddlewareContext) -> Result<(), DispatchError> {
        (self.f)(ctx).await
    }
}
