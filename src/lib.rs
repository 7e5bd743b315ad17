//! # eventvisor
//!
//! **Eventvisor** is an in-process event dispatch library for Rust.
//!
//! Events are plain values. Publishing one routes it to the transport publishers bound
//! to its type; the built-in in-memory transport broadcasts it to typed observers.
//! Every observer and every publisher runs behind its own ordered middleware chain.
//!
//! ## Architecture
//! ### Overview
//! ```text
//!                     publish(event, token)
//!                              │
//! ┌────────────────────────────▼──────────────────────────────────────┐
//! │  Dispatcher                                                       │
//! │  - TransportMap     (event type → markers, default [InMemory])    │
//! │  - PublisherRegistry(marker → publishers, dedup by type)          │
//! │  - Scope            (per call; scoped instances, services)        │
//! └──────┬──────────────────────┬──────────────────────┬──────────────┘
//!        ▼                      ▼                      ▼
//!   ┌──────────┐           ┌──────────┐           ┌──────────┐
//!   │ M1 ─► M2 │           │ M1       │           │          │   publisher chains
//!   └────┬─────┘           └────┬─────┘           └────┬─────┘   (join_all)
//!        ▼                      ▼                      ▼
//!  InMemoryPublisher        BrokerPublisher        OutboxPublisher
//!        │
//!        ▼
//!  observers(lineage(event)) in registration order
//!        │
//!        ▼
//!  BroadcastStrategy (Sequential | Parallel{K})
//!        ├──► [M1 ─► M2] ─► ObserverA::handle(&E)
//!        ├──► [M3]       ─► ObserverB::handle(&E)
//!        └──► []         ─► ObserverC::handle(&Base)    (Derived upcast to Base)
//!
//! failures ──► combine: none → Ok, one → as is, only cancellations → Canceled,
//!                       otherwise → Aggregate
//! ```
//!
//! ### Middleware
//! ```text
//! Chain::execute(event, token)
//!   └─► M1.execute(ctx) ─► ctx.next_with(event', token) ─► M2.execute(ctx) ─► terminal
//!                       └─► ctx.next() again (retry)   ─► M2 re-resolved ─► terminal
//! ```
//!
//! ## Features
//! | Area              | Description                                                  | Key types / traits                           |
//! |-------------------|--------------------------------------------------------------|----------------------------------------------|
//! | **Observers**     | Typed in-memory handlers, polymorphic through a hierarchy.   | [`Observer`], [`TypeHierarchy`]              |
//! | **Publishers**    | Transports selected by marker types.                         | [`Publisher`], [`InMemory`], [`MarkerKey`]   |
//! | **Middleware**    | Ordered, re-entrant chains with runtime-readable config.     | [`Middleware`], [`MiddlewareContext`], [`Chain`] |
//! | **Pipelines**     | Type-declared or externally configured middleware chains.    | [`PipelineBuilder`], [`PipelineHook`]        |
//! | **Broadcasting**  | Sequential or bounded parallel fan-out.                      | [`BroadcastStrategy`], [`Sequential`], [`Parallel`] |
//! | **Resolution**    | Transient, scoped and singleton instances.                   | [`Registration`], [`Lifetime`], [`Scope`]    |
//! | **Errors**        | Typed errors and failure folding.                            | [`DispatchError`], [`combine`]               |
//! | **Configuration** | Global broadcasting settings.                                | [`Config`]                                   |
//!
//! ## Optional features
//! - `logging`: exports the built-in [`LogMiddleware`] emitting `tracing` events.
//!
//! ## Example
//! ```rust
//! use async_trait::async_trait;
//! use eventvisor::{
//!     Config, DispatchError, Dispatcher, Lifetime, Middleware, MiddlewareContext, Observer,
//!     PipelineBuilder, Registration,
//! };
//! use tokio_util::sync::CancellationToken;
//!
//! struct Ping {
//!     value: i32,
//! }
//!
//! #[derive(Default)]
//! struct PingObserver;
//!
//! #[async_trait]
//! impl Observer<Ping> for PingObserver {
//!     async fn handle(&self, event: &Ping, _token: CancellationToken) -> Result<(), DispatchError> {
//!         println!("ping {}", event.value);
//!         Ok(())
//!     }
//! }
//!
//! #[derive(Default)]
//! struct Retry;
//!
//! #[async_trait]
//! impl Middleware for Retry {
//!     async fn execute(&self, ctx: MiddlewareContext) -> Result<(), DispatchError> {
//!         match ctx.next().await {
//!             Err(err) if !err.is_cancellation() => ctx.next().await,
//!             other => other,
//!         }
//!     }
//! }
//!
//! #[tokio::main(flavor = "current_thread")]
//! async fn main() -> Result<(), DispatchError> {
//!     let dispatcher = Dispatcher::builder(Config::default())
//!         .middleware::<Retry>(Registration::of())
//!         .observe::<Ping, PingObserver>(Registration::with_lifetime(Lifetime::Singleton))
//!         .configure_observer::<Ping, PingObserver, _>(|p: &mut PipelineBuilder| {
//!             p.use_middleware::<Retry>()?;
//!             Ok(())
//!         })
//!         .build();
//!
//!     dispatcher.publish(Ping { value: 5 }).await
//! }
//! ```
mod core;
mod error;
mod events;
mod middleware;
mod observers;
mod publishers;
mod resolve;
mod strategies;

// ---- Public re-exports ----

pub use core::{BroadcastMode, Config, Dispatcher, DispatcherBuilder};
pub use error::{BoxError, DispatchError, combine};
pub use events::{AnyEvent, Event, EventType, InMemory, MarkerKey, TransportMap, TypeHierarchy};
pub use middleware::{
    Chain, DispatchFuture, Middleware, MiddlewareContext, MiddlewareFn, PipelineBuilder,
    PipelineCallback, PipelineHook,
};
pub use observers::{Observer, ObserverInfo};
pub use publishers::{InMemoryPublisher, Publisher, PublisherInfo};
pub use resolve::{Lifetime, Registration, RegistrationKind, Scope, Services};
pub use strategies::{BroadcastStrategy, ErrorPolicy, Invocation, Parallel, Sequential};

// Optional: expose the built-in tracing middleware.
// Enable with: `--features logging`
#[cfg(feature = "logging")]
pub use middleware::{LogConfig, LogMiddleware};
