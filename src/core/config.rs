//! # Global dispatch configuration.
//!
//! Provides [`Config`], the settings applied to every event type that has no per-type
//! broadcasting override (see `DispatcherBuilder::broadcast_for`).
//!
//! ## Sentinel values
//! - `max_parallelism = 0` is accepted here and rejected with `InvalidParallelism`
//!   the first time a parallel broadcast runs.

use std::num::NonZeroUsize;
use std::sync::Arc;

use crate::strategies::{BroadcastStrategy, ErrorPolicy, Parallel, Sequential};

/// How observers of one event are awaited.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum BroadcastMode {
    /// One at a time, in registration order (default).
    #[default]
    Sequential,
    /// Concurrently, at most `max_parallelism` at a time.
    Parallel,
}

/// Global configuration of the dispatcher.
///
/// ## Field semantics
/// - `broadcast`: sequential or parallel observer fan-out
/// - `errors`: failure handling of sequential fan-out (parallel always runs everything)
/// - `max_parallelism`: bound of parallel fan-out (must be positive)
///
/// ## Notes
/// All fields are public for flexibility. Prefer [`Config::strategy`] over matching
/// on the fields directly.
#[derive(Clone, Debug)]
pub struct Config {
    /// Broadcasting mode for in-memory observers.
    pub broadcast: BroadcastMode,

    /// Error policy of sequential broadcasting.
    ///
    /// - `Immediate`: stop at the first failing observer
    /// - `AfterAll`: run every observer, then report
    pub errors: ErrorPolicy,

    /// Maximum number of observers running at once in parallel mode.
    pub max_parallelism: usize,
}

impl Config {
    /// Sequential configuration with the given error policy.
    pub fn sequential(errors: ErrorPolicy) -> Self {
        Self {
            broadcast: BroadcastMode::Sequential,
            errors,
            ..Self::default()
        }
    }

    /// Parallel configuration with the given bound.
    pub fn parallel(max_parallelism: usize) -> Self {
        Self {
            broadcast: BroadcastMode::Parallel,
            max_parallelism,
            ..Self::default()
        }
    }

    /// Strategy described by this configuration.
    pub fn strategy(&self) -> Arc<dyn BroadcastStrategy> {
        match self.broadcast {
            BroadcastMode::Sequential => Arc::new(Sequential::new(self.errors)),
            BroadcastMode::Parallel => Arc::new(Parallel::new(self.max_parallelism)),
        }
    }
}

impl Default for Config {
    /// Default configuration:
    ///
    /// - `broadcast = Sequential`
    /// - `errors = Immediate`
    /// - `max_parallelism` = available hardware parallelism (1 if unknown)
    fn default() -> Self {
        Self {
            broadcast: BroadcastMode::Sequential,
            errors: ErrorPolicy::Immediate,
            max_parallelism: std::thread::available_parallelism()
                .map(NonZeroUsize::get)
                .unwrap_or(1),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_sequential_immediate() {
        let cfg = Config::default();
        assert_eq!(cfg.broadcast, BroadcastMode::Sequential);
        assert_eq!(cfg.errors, ErrorPolicy::Immediate);
        assert!(cfg.max_parallelism >= 1);
        assert_eq!(cfg.strategy().name(), "sequential");
    }

    #[test]
    fn test_parallel_keeps_bound() {
        let cfg = Config::parallel(3);
        assert_eq!(cfg.max_parallelism, 3);
        assert_eq!(cfg.strategy().name(), "parallel");
    }
}
