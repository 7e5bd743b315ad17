//! # Declared event lineage (polymorphic dispatch).
//!
//! An observer declared for a base event type also receives events of every type that
//! declares itself a descendant. The relation is supplied by the configuration layer as
//! `extends::<Sub, Base>(upcast)`; `upcast` builds the base view of a sub event and is
//! only invoked at the terminal handler, so middleware always see the original instance.
//!
//! ## Rules
//! - Lineage is transitive: `A extends B`, `B extends C` ⇒ `A` reaches `C`.
//! - A type may have several parents; [`TypeHierarchy::lineage`] lists each ancestor once,
//!   nearest first.
//! - Declaring the same `Sub → Base` pair twice replaces the earlier upcast.

use std::any::TypeId;
use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::Arc;

use super::event::{AnyEvent, Event, EventType};

type Upcast = Arc<dyn Fn(&AnyEvent) -> Option<AnyEvent> + Send + Sync>;

#[derive(Clone)]
struct Parent {
    ty: EventType,
    upcast: Upcast,
}

/// Table of `Sub → Base` relations.
#[derive(Clone, Default)]
pub struct TypeHierarchy {
    parents: HashMap<TypeId, Vec<Parent>>,
}

impl TypeHierarchy {
    /// Creates an empty hierarchy.
    pub fn new() -> Self {
        Self::default()
    }

    /// Declares `S` as a descendant of `B`.
    pub fn extends<S, B, F>(&mut self, upcast: F)
    where
        S: Event,
        B: Event,
        F: Fn(&S) -> B + Send + Sync + 'static,
    {
        let parent = Parent {
            ty: EventType::of::<B>(),
            upcast: Arc::new(move |ev: &AnyEvent| ev.downcast_ref::<S>().map(|s| AnyEvent::new(upcast(s)))),
        };
        let list = self.parents.entry(TypeId::of::<S>()).or_default();
        match list.iter_mut().find(|p| p.ty == parent.ty) {
            Some(existing) => *existing = parent,
            None => list.push(parent),
        }
    }

    /// `ty` followed by all of its ancestors, breadth-first, without duplicates.
    pub fn lineage(&self, ty: EventType) -> Vec<EventType> {
        let mut seen = HashSet::from([ty.id()]);
        let mut out = vec![ty];
        let mut queue = VecDeque::from([ty.id()]);

        while let Some(id) = queue.pop_front() {
            for parent in self.parents.get(&id).into_iter().flatten() {
                if seen.insert(parent.ty.id()) {
                    out.push(parent.ty);
                    queue.push_back(parent.ty.id());
                }
            }
        }
        out
    }

    /// True if `ancestor` is `ty` itself or reachable from it.
    pub fn is_a(&self, ty: EventType, ancestor: TypeId) -> bool {
        self.lineage(ty).iter().any(|t| t.id() == ancestor)
    }

    /// Converts `event` to the `target` type along declared relations.
    ///
    /// Returns the same instance when the type already matches and `None` when
    /// `target` is not an ancestor.
    pub fn upcast(&self, event: &AnyEvent, target: TypeId) -> Option<AnyEvent> {
        let mut visited = HashSet::new();
        self.upcast_inner(event, target, &mut visited)
    }

    fn upcast_inner(
        &self,
        event: &AnyEvent,
        target: TypeId,
        visited: &mut HashSet<TypeId>,
    ) -> Option<AnyEvent> {
        if event.type_id() == target {
            return Some(event.clone());
        }
        if !visited.insert(event.type_id()) {
            return None;
        }
        for parent in self.parents.get(&event.type_id()).into_iter().flatten() {
            if !self.is_a(parent.ty, target) {
                continue;
            }
            if let Some(found) = (parent.upcast)(event)
                .and_then(|base| self.upcast_inner(&base, target, visited))
            {
                return Some(found);
            }
        }
        None
    }
}
