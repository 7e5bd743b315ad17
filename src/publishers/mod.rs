//! # Publishers: transports that carry an event away from the caller.
//!
//! Every event type is bound to one or more transport markers (see
//! [`TransportMap`](crate::TransportMap)). A [`Publisher`] registered for a marker delivers
//! events bound to it. The built-in [`InMemoryPublisher`] serves the [`InMemory`](crate::InMemory)
//! marker by broadcasting to the registered observers.
//!
//! ## Resolution
//! ```text
//! markers(event) ──► for each marker: publishers registered for it
//!                      ├─ none and marker is InMemory ─► built-in InMemoryPublisher
//!                      └─ none otherwise              ─► UnknownPublisher
//!                ──► de-duplicate by publisher type (first occurrence wins)
//!                ──► Invocation = chain(publisher pipeline) ─► Publisher::publish
//! ```

mod in_memory;
mod publisher;
mod registry;

pub use in_memory::InMemoryPublisher;
pub use publisher::Publisher;
pub use registry::PublisherInfo;

pub(crate) use registry::PublisherRegistry;
