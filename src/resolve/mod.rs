//! Component resolution: lifetimes, registrations and per-call scopes.
//!
//! The pipeline never constructs observers, publishers or middleware directly; it
//! resolves them through a [`Registration`] inside the [`Scope`] of the current call.
//!
//! ```text
//! Registration::of::<T>()                ── Transient (fresh per resolve)
//! Registration::with_lifetime(Scoped)    ── one instance per Scope (per publish call)
//! Registration::with_lifetime(Singleton) ── one instance for the registration
//! Registration::instance(value)          ── always the given instance
//! Registration::factory(lifetime, f)     ── f(&Scope) under the given lifetime
//! ```

mod registration;
mod scope;

pub use registration::{Lifetime, Registration, RegistrationKind};
pub use scope::{Scope, Services};
