//! # Transport markers.
//!
//! A marker is a tag type attached to an event type that selects which transport
//! publisher(s) deliver it. Event types without any marker implicitly use [`InMemory`].

use std::any::TypeId;
use std::collections::HashMap;

use super::event::Event;

/// Identity of a marker type.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct MarkerKey {
    id: TypeId,
    name: &'static str,
}

impl MarkerKey {
    /// Identity of marker `M`.
    pub fn of<M: 'static>() -> Self {
        Self {
            id: TypeId::of::<M>(),
            name: std::any::type_name::<M>(),
        }
    }

    /// Marker type name (used in `UnknownPublisher` errors).
    pub fn name(&self) -> &'static str {
        self.name
    }
}

/// Built-in in-memory transport marker.
#[derive(Clone, Copy, Debug, Default)]
pub struct InMemory;

/// Declarative mapping `event type → ordered markers`.
#[derive(Clone, Debug, Default)]
pub struct TransportMap {
    markers: HashMap<TypeId, Vec<MarkerKey>>,
}

impl TransportMap {
    /// Attaches marker `M` to event type `E` (idempotent; keeps first declaration order).
    pub fn declare<E: Event, M: 'static>(&mut self) {
        let list = self.markers.entry(TypeId::of::<E>()).or_default();
        let key = MarkerKey::of::<M>();
        if !list.contains(&key) {
            list.push(key);
        }
    }

    /// Markers declared for `event`, or `[InMemory]` when none were declared.
    pub fn markers_for(&self, event: TypeId) -> Vec<MarkerKey> {
        match self.markers.get(&event) {
            Some(list) if !list.is_empty() => list.clone(),
            _ => vec![MarkerKey::of::<InMemory>()],
        }
    }

    /// True if at least one marker was declared for `event`.
    pub fn is_declared(&self, event: TypeId) -> bool {
        self.markers.get(&event).is_some_and(|l| !l.is_empty())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Ping;
    struct Audit;
    struct Rabbit;
    struct Kafka;

    #[test]
    fn test_undeclared_defaults_to_in_memory() {
        let map = TransportMap::default();
        assert_eq!(map.markers_for(TypeId::of::<Ping>()), vec![MarkerKey::of::<InMemory>()]);
        assert!(!map.is_declared(TypeId::of::<Ping>()));
    }

    #[test]
    fn test_declared_order_and_dedup() {
        let mut map = TransportMap::default();
        map.declare::<Audit, Rabbit>();
        map.declare::<Audit, Kafka>();
        map.declare::<Audit, Rabbit>();
        assert_eq!(
            map.markers_for(TypeId::of::<Audit>()),
            vec![MarkerKey::of::<Rabbit>(), MarkerKey::of::<Kafka>()]
        );
        assert!(map.is_declared(TypeId::of::<Audit>()));
    }
}
