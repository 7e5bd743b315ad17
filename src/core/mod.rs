//! Dispatch core: configuration, builder and the dispatcher itself.
//!
//! The public API from this module is [`Dispatcher`], built through a
//! [`DispatcherBuilder`] from a [`Config`].
//!
//! Internal modules:
//! - [`config`]: global broadcasting settings;
//! - [`builder`]: registration surface;
//! - [`dispatcher`]: publish / dispatch / handle entry points.

mod builder;
mod config;
mod dispatcher;


pub use builder::DispatcherBuilder;
pub use config::{BroadcastMode, Config};
pub use dispatcher::Dispatcher;
