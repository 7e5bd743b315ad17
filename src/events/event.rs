//! # Event values flowing through the pipeline.
//!
//! Any `Send + Sync + 'static` value is an [`Event`]. Inside the pipeline events travel
//! type-erased as [`AnyEvent`]: a cheap-to-clone shared handle that remembers the
//! concrete type. Middleware may replace the value passed downstream; the replacement
//! is just another `AnyEvent`.
//!
//! ## Example
//! ```rust
//! use eventvisor::AnyEvent;
//!
//! #[derive(Debug, PartialEq)]
//! struct Ping { value: i32 }
//!
//! let ev = AnyEvent::new(Ping { value: 5 });
//! assert!(ev.is::<Ping>());
//! assert_eq!(ev.downcast_ref::<Ping>(), Some(&Ping { value: 5 }));
//! assert!(ev.type_name().ends_with("Ping"));
//! ```

use std::any::{Any, TypeId};
use std::fmt;
use std::sync::Arc;

/// Marker trait for publishable values.
///
/// Blanket-implemented for every `Send + Sync + 'static` type.
pub trait Event: Send + Sync + 'static {}

impl<T: Send + Sync + 'static> Event for T {}

/// Runtime identity of an event type: `TypeId` plus a readable name.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct EventType {
    id: TypeId,
    name: &'static str,
}

impl EventType {
    /// Identity of `E`.
    pub fn of<E: Event>() -> Self {
        Self {
            id: TypeId::of::<E>(),
            name: std::any::type_name::<E>(),
        }
    }

    /// Underlying `TypeId`.
    pub fn id(&self) -> TypeId {
        self.id
    }

    /// Fully qualified type name (diagnostics only).
    pub fn name(&self) -> &'static str {
        self.name
    }
}

/// Type-erased, shared event instance.
#[derive(Clone)]
pub struct AnyEvent {
    value: Arc<dyn Any + Send + Sync>,
    ty: EventType,
}

impl AnyEvent {
    /// Wraps an owned event.
    pub fn new<E: Event>(event: E) -> Self {
        Self::from_arc(Arc::new(event))
    }

    /// Wraps an already shared event without copying it.
    pub fn from_arc<E: Event>(event: Arc<E>) -> Self {
        Self {
            value: event,
            ty: EventType::of::<E>(),
        }
    }

    /// Runtime type of the carried value.
    pub fn event_type(&self) -> EventType {
        self.ty
    }

    /// `TypeId` of the carried value.
    pub fn type_id(&self) -> TypeId {
        self.ty.id
    }

    /// Type name of the carried value.
    pub fn type_name(&self) -> &'static str {
        self.ty.name
    }

    /// True if the carried value is exactly an `E`.
    pub fn is<E: Event>(&self) -> bool {
        self.ty.id == TypeId::of::<E>()
    }

    /// Borrows the carried value as `E`.
    pub fn downcast_ref<E: Event>(&self) -> Option<&E> {
        self.value.downcast_ref::<E>()
    }

    /// Shares the carried value as `Arc<E>`.
    pub fn downcast_arc<E: Event>(&self) -> Option<Arc<E>> {
        Arc::clone(&self.value).downcast::<E>().ok()
    }

    /// True if both handles point at the same instance.
    pub fn ptr_eq(&self, other: &AnyEvent) -> bool {
        Arc::ptr_eq(&self.value, &other.value)
    }
}

impl fmt::Debug for AnyEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AnyEvent")
            .field("type", &self.ty.name)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Ping(i32);
    struct Pong;

    #[test]
    fn test_downcast_to_own_type_only() {
        let ev = AnyEvent::new(Ping(5));
        assert_eq!(ev.downcast_ref::<Ping>().map(|p| p.0), Some(5));
        assert!(ev.downcast_ref::<Pong>().is_none());
        assert!(ev.downcast_arc::<Pong>().is_none());
        assert_eq!(ev.event_type(), EventType::of::<Ping>());
    }

    #[test]
    fn test_clone_shares_instance() {
        let ev = AnyEvent::new(Ping(1));
        let copy = ev.clone();
        assert!(ev.ptr_eq(&copy));
        assert!(!ev.ptr_eq(&AnyEvent::new(Ping(1))));
    }
}
