//! Event values, type lineage and transport markers.
//!
//! This module groups the **data model** the pipeline routes on:
//!
//! - [`Event`], [`AnyEvent`], [`EventType`] an event is any `Send + Sync + 'static`
//!   value; its runtime type is the routing key;
//! - [`TypeHierarchy`] declared `Sub → Base` relations used for polymorphic dispatch;
//! - [`MarkerKey`], [`InMemory`], [`TransportMap`] which transports apply to an event type.
//!
//! ## Quick reference
//! ```text
//! publish(Ping) ──► TransportMap::markers(Ping)   → [InMemory] when nothing declared
//!               ──► TypeHierarchy::lineage(Ping) → [Ping, Base, Root, ...]
//! ```

mod event;
mod hierarchy;
mod marker;

pub use event::{AnyEvent, Event, EventType};
pub use hierarchy::TypeHierarchy;
pub use marker::{InMemory, MarkerKey, TransportMap};
