//! # Pipeline construction surface.
//!
//! A [`PipelineBuilder`] is opened for every observer/publisher invocation inside the
//! current [`Scope`]. It is fed, in order, by:
//!
//! 1. the type's own hook ([`PipelineHook`], returned by `Observer::pipeline` /
//!    `Publisher::pipeline`), if it declares one;
//! 2. external callbacks ([`PipelineCallback`]) registered on the dispatcher builder.
//!
//! ## Rules
//! - `use_*` appends a step; declaration order is execution order.
//! - `configure*` rebinds the config of the first step of the given middleware type and
//!   fails with `MiddlewareNotInPipeline` when there is none.
//! - Once a type hook has run, the pipeline is **locked**: external `use_*` calls fail
//!   with `PipelineLocked`, `configure*` calls are still accepted.
//! - `use_middleware::<M>()` resolves `M` through its registration and fails with
//!   `MiddlewareNotRegistered` when there is none.
//!
//! ## Example
//! ```rust
//! use eventvisor::{DispatchError, PipelineBuilder};
//! # use async_trait::async_trait;
//! # use eventvisor::{Middleware, MiddlewareContext};
//! # #[derive(Default)] struct Retry;
//! # #[async_trait] impl Middleware for Retry {
//! #     async fn execute(&self, ctx: MiddlewareContext) -> Result<(), DispatchError> { ctx.next().await }
//! # }
//! #[derive(Clone, Default)]
//! struct RetryConfig { attempts: u32 }
//!
//! fn pipeline(p: &mut PipelineBuilder) -> Result<(), DispatchError> {
//!     p.use_middleware_with::<Retry, _>(RetryConfig { attempts: 3 })?;
//!     Ok(())
//! }
//! ```

use std::any::TypeId;
use std::collections::HashMap;
use std::sync::Arc;

use super::chain::{Chain, ConfigSlot, Link, Terminal, find_slot};
use super::middleware::Middleware;
use crate::error::DispatchError;
use crate::resolve::{Registration, Scope};

/// Static pipeline declaration of an observer or publisher type.
pub type PipelineHook = fn(&mut PipelineBuilder) -> Result<(), DispatchError>;

/// External pipeline configuration callback.
pub type PipelineCallback =
    Arc<dyn Fn(&mut PipelineBuilder) -> Result<(), DispatchError> + Send + Sync>;

type MakeMiddleware = Arc<dyn Fn(&Scope) -> Arc<dyn Middleware> + Send + Sync>;

#[derive(Clone)]
struct MiddlewareEntry {
    name: &'static str,
    make: MakeMiddleware,
}

/// Registered middleware types.
#[derive(Clone, Default)]
pub(crate) struct MiddlewareTable {
    entries: HashMap<TypeId, MiddlewareEntry>,
}

impl MiddlewareTable {
    /// Registers `M`, replacing any earlier registration.
    pub(crate) fn register<M: Middleware>(&mut self, registration: Registration<M>) {
        self.entries.insert(TypeId::of::<M>(), Self::entry(registration));
    }

    /// Registers `M` only if it has no registration yet.
    pub(crate) fn register_scanned<M: Middleware>(&mut self, registration: Registration<M>) {
        self.entries
            .entry(TypeId::of::<M>())
            .or_insert_with(|| Self::entry(registration));
    }

    #[cfg(test)]
    pub(crate) fn contains<M: Middleware>(&self) -> bool {
        self.entries.contains_key(&TypeId::of::<M>())
    }

    fn entry<M: Middleware>(registration: Registration<M>) -> MiddlewareEntry {
        MiddlewareEntry {
            name: std::any::type_name::<M>(),
            make: Arc::new(move |scope: &Scope| registration.resolve(scope) as Arc<dyn Middleware>),
        }
    }
}

/// Builder of one observer's or publisher's middleware chain.
pub struct PipelineBuilder {
    owner: &'static str,
    scope: Scope,
    table: Arc<MiddlewareTable>,
    links: Vec<Link>,
    locked: bool,
}

impl PipelineBuilder {
    pub(crate) fn new(owner: &'static str, scope: Scope, table: Arc<MiddlewareTable>) -> Self {
        Self {
            owner,
            scope,
            table,
            links: Vec::new(),
            locked: false,
        }
    }

    /// Builds a chain: type hook first (locking the pipeline), then external callbacks.
    pub(crate) fn assemble(
        owner: &'static str,
        scope: &Scope,
        table: &Arc<MiddlewareTable>,
        hook: Option<PipelineHook>,
        callbacks: &[PipelineCallback],
        terminal: Terminal,
    ) -> Result<Chain, DispatchError> {
        let mut builder = Self::new(owner, scope.clone(), Arc::clone(table));
        if let Some(hook) = hook {
            hook(&mut builder)?;
            builder.locked = true;
        }
        for callback in callbacks {
            callback(&mut builder)?;
        }
        tracing::trace!(owner, steps = builder.links.len(), "pipeline assembled");
        Ok(Chain::new(owner, builder.links, terminal))
    }

    /// Observer or publisher type this pipeline belongs to.
    pub fn owner(&self) -> &'static str {
        self.owner
    }

    /// Resolution scope of the current call.
    pub fn scope(&self) -> &Scope {
        &self.scope
    }

    /// Number of steps declared so far.
    pub fn len(&self) -> usize {
        self.links.len()
    }

    /// True when no step has been declared.
    pub fn is_empty(&self) -> bool {
        self.links.is_empty()
    }

    /// True once the owning type's own hook has declared the pipeline.
    pub fn is_locked(&self) -> bool {
        self.locked
    }

    /// Appends registered middleware `M` without configuration.
    pub fn use_middleware<M: Middleware>(&mut self) -> Result<&mut Self, DispatchError> {
        self.push_registered::<M>(ConfigSlot::default())
    }

    /// Appends registered middleware `M` with an initial configuration.
    pub fn use_middleware_with<M, C>(&mut self, config: C) -> Result<&mut Self, DispatchError>
    where
        M: Middleware,
        C: Send + Sync + 'static,
    {
        let slot = ConfigSlot::default();
        slot.set(config);
        self.push_registered::<M>(slot)
    }

    /// Appends a pre-built middleware instance (no registration needed).
    pub fn use_instance<M: Middleware>(&mut self, middleware: Arc<M>) -> Result<&mut Self, DispatchError> {
        self.push_instance(middleware, ConfigSlot::default())
    }

    /// Appends a pre-built middleware instance with an initial configuration.
    pub fn use_instance_with<M, C>(&mut self, middleware: Arc<M>, config: C) -> Result<&mut Self, DispatchError>
    where
        M: Middleware,
        C: Send + Sync + 'static,
    {
        let slot = ConfigSlot::default();
        slot.set(config);
        self.push_instance(middleware, slot)
    }

    /// Replaces the configuration of the first `M` step.
    pub fn configure<M, C>(&mut self, config: C) -> Result<&mut Self, DispatchError>
    where
        M: Middleware,
        C: Send + Sync + 'static,
    {
        find_slot::<M>(&self.links, self.owner)?.set(config);
        Ok(self)
    }

    /// Mutates the configuration of the first `M` step (starting from `C::default()` if unset).
    pub fn configure_with<M, C, F>(&mut self, mutate: F) -> Result<&mut Self, DispatchError>
    where
        M: Middleware,
        C: Clone + Default + Send + Sync + 'static,
        F: FnOnce(&mut C),
    {
        find_slot::<M>(&self.links, self.owner)?.update(mutate);
        Ok(self)
    }

    fn push_registered<M: Middleware>(&mut self, config: ConfigSlot) -> Result<&mut Self, DispatchError> {
        self.ensure_unlocked::<M>()?;
        let entry = self
            .table
            .entries
            .get(&TypeId::of::<M>())
            .cloned()
            .ok_or(DispatchError::MiddlewareNotRegistered {
                middleware: std::any::type_name::<M>(),
            })?;

        let scope = self.scope.clone();
        let make = entry.make;
        self.links.push(Link {
            middleware: TypeId::of::<M>(),
            name: entry.name,
            resolver: Arc::new(move || make(&scope)),
            config,
        });
        Ok(self)
    }

    fn push_instance<M: Middleware>(&mut self, middleware: Arc<M>, config: ConfigSlot) -> Result<&mut Self, DispatchError> {
        self.ensure_unlocked::<M>()?;
        self.links.push(Link {
            middleware: TypeId::of::<M>(),
            name: std::any::type_name::<M>(),
            resolver: Arc::new(move || Arc::clone(&middleware) as Arc<dyn Middleware>),
            config,
        });
        Ok(self)
    }

    fn ensure_unlocked<M: Middleware>(&self) -> Result<(), DispatchError> {
        if self.locked {
            tracing::warn!(owner = self.owner, middleware = std::any::type_name::<M>(), "external middleware rejected: pipeline declared by type");
            return Err(DispatchError::PipelineLocked {
                owner: self.owner,
                middleware: std::any::type_name::<M>(),
            });
        }
        Ok(())
    }
}
