//! # Observers: typed in-memory event handlers.
//!
//! An [`Observer<E>`] reacts to events of type `E` delivered by the in-memory transport.
//! Observers are registered on the dispatcher builder together with a
//! [`Registration`](crate::Registration) that decides their lifetime.
//!
//! ## Resolution
//! ```text
//! event: AnyEvent(Derived)
//!   └─► lineage(Derived) = [Derived, Base, ...]
//!         └─► every registration whose event type is in the lineage,
//!             in global registration order
//!               └─► Invocation = chain(observer pipeline) ─► Observer::<T>::handle(&T)
//! ```
//!
//! ## Rules
//! - Identity is `(observer type, event type)`; re-registering replaces the entry in place.
//! - Scanned registrations never replace an explicit one.
//! - An observer registered for a base type receives derived events converted through
//!   the [`TypeHierarchy`](crate::TypeHierarchy); middleware still see the original event.

mod observer;
mod registry;

pub use observer::Observer;
pub use registry::ObserverInfo;

pub(crate) use registry::ObserverRegistry;
