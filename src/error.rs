//! Error types used by the dispatch pipeline, observers and middleware.
//!
//! There is a single enum, [`DispatchError`], split into three families:
//!
//! - **configuration** errors (unknown publisher, missing middleware, bad parallelism);
//! - **execution** errors raised by observers, publishers or middleware bodies;
//! - **cancellation**, a distinguished kind signalling cooperative cancellation.
//!
//! When several independent invocations fail during one fan-out, the failures are
//! folded by [`combine`] into a single error (see its docs for the exact rule).

use thiserror::Error;

/// Boxed error type accepted by [`DispatchError::fail`].
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// # Errors produced while publishing an event.
///
/// Configuration errors are fatal and surface on first resolution;
/// everything else is propagated to the `publish`/`dispatch`/`handle` caller as is.
#[non_exhaustive]
#[derive(Error, Debug)]
pub enum DispatchError {
    /// The event declares a transport marker for which no publisher is registered.
    #[error("unknown publisher: no publisher registered for transport marker `{marker}`")]
    UnknownPublisher {
        /// Type name of the missing marker.
        marker: &'static str,
    },

    /// `configure` was called for a middleware type that is not part of the chain.
    #[error("middleware `{middleware}` is not part of the pipeline of `{owner}`")]
    MiddlewareNotInPipeline {
        /// Type name of the middleware being configured.
        middleware: &'static str,
        /// Observer or publisher owning the pipeline.
        owner: &'static str,
    },

    /// A pipeline referenced a middleware type that has no registration.
    #[error("middleware `{middleware}` is not registered")]
    MiddlewareNotRegistered {
        /// Type name of the middleware.
        middleware: &'static str,
    },

    /// External code tried to `use` a middleware on a type that declares its own pipeline.
    #[error("pipeline of `{owner}` is declared by the type; external use of `{middleware}` rejected")]
    PipelineLocked {
        /// Observer or publisher owning the pipeline.
        owner: &'static str,
        /// Middleware that was rejected.
        middleware: &'static str,
    },

    /// Parallel broadcasting was configured with a non-positive degree of parallelism.
    #[error("max degree of parallelism must be positive, got {value}")]
    InvalidParallelism {
        /// The configured value.
        value: usize,
    },

    /// `handle` was called for an observer that is not registered for the event type.
    #[error("observer `{observer}` is not registered for `{event}`")]
    ObserverNotRegistered {
        /// Observer type name.
        observer: &'static str,
        /// Event type name.
        event: &'static str,
    },

    /// An event reached a handler that cannot accept its type.
    #[error("event of type `{actual}` cannot be delivered as `{expected}`")]
    EventTypeMismatch {
        /// Type the handler expects.
        expected: &'static str,
        /// Type actually carried by the event.
        actual: &'static str,
    },

    /// Business failure raised by an observer, publisher or middleware.
    #[error("{0}")]
    Failed(#[source] BoxError),

    /// Cooperative cancellation was observed.
    #[error("operation cancelled")]
    Canceled,

    /// A concurrently executed invocation panicked.
    #[error("invocation panicked: {info}")]
    Panicked {
        /// Panic payload rendered as text.
        info: String,
    },

    /// More than one independent invocation failed.
    #[error("{} invocations failed: [{}]", .0.len(), render(.0))]
    Aggregate(Vec<DispatchError>),
}

fn render(errors: &[DispatchError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

impl DispatchError {
    /// Wraps any error as [`DispatchError::Failed`].
    pub fn fail(err: impl Into<BoxError>) -> Self {
        DispatchError::Failed(err.into())
    }

    /// Builds a [`DispatchError::Failed`] from a plain message.
    ///
    /// # Example
    /// ```
    /// use eventvisor::DispatchError;
    ///
    /// let err = DispatchError::msg("boom");
    /// assert_eq!(err.to_string(), "boom");
    /// assert_eq!(err.as_label(), "dispatch_failed");
    /// ```
    pub fn msg(message: impl Into<String>) -> Self {
        DispatchError::Failed(message.into().into())
    }

    /// Returns a short stable label (snake_case) for use in logs/metrics.
    pub fn as_label(&self) -> &'static str {
        match self {
            DispatchError::UnknownPublisher { .. } => "config_unknown_publisher",
            DispatchError::MiddlewareNotInPipeline { .. } => "config_middleware_not_in_pipeline",
            DispatchError::MiddlewareNotRegistered { .. } => "config_middleware_not_registered",
            DispatchError::PipelineLocked { .. } => "config_pipeline_locked",
            DispatchError::InvalidParallelism { .. } => "config_invalid_parallelism",
            DispatchError::ObserverNotRegistered { .. } => "config_observer_not_registered",
            DispatchError::EventTypeMismatch { .. } => "event_type_mismatch",
            DispatchError::Failed(_) => "dispatch_failed",
            DispatchError::Canceled => "dispatch_canceled",
            DispatchError::Panicked { .. } => "dispatch_panicked",
            DispatchError::Aggregate(_) => "dispatch_aggregate",
        }
    }

    /// True for the cooperative-cancellation kind.
    pub fn is_cancellation(&self) -> bool {
        matches!(self, DispatchError::Canceled)
    }

    /// True for errors caused by wiring mistakes rather than runtime failures.
    pub fn is_configuration(&self) -> bool {
        matches!(
            self,
            DispatchError::UnknownPublisher { .. }
                | DispatchError::MiddlewareNotInPipeline { .. }
                | DispatchError::MiddlewareNotRegistered { .. }
                | DispatchError::PipelineLocked { .. }
                | DispatchError::InvalidParallelism { .. }
                | DispatchError::ObserverNotRegistered { .. }
        )
    }

    /// Members of an aggregate, or `None` for any other kind.
    pub fn members(&self) -> Option<&[DispatchError]> {
        match self {
            DispatchError::Aggregate(errors) => Some(errors),
            _ => None,
        }
    }
}

/// Folds the failures of one fan-out into a single outcome.
///
/// - no failures → `Ok(())`;
/// - exactly one failure → that failure, unchanged;
/// - only cancellations → a single [`DispatchError::Canceled`];
/// - otherwise → [`DispatchError::Aggregate`] holding every non-cancellation
///   failure in input order, followed by one representative cancellation if any occurred.
pub fn combine(errors: Vec<DispatchError>) -> Result<(), DispatchError> {
    if errors.len() <= 1 {
        return match errors.into_iter().next() {
            Some(err) => Err(err),
            None => Ok(()),
        };
    }

    let mut canceled = None;
    let mut members = Vec::with_capacity(errors.len());
    for err in errors {
        if err.is_cancellation() {
            canceled.get_or_insert(err);
        } else {
            members.push(err);
        }
    }

    if members.is_empty() {
        return Err(DispatchError::Canceled);
    }
    members.extend(canceled);
    if members.len() == 1 {
        return Err(members.remove(0));
    }
    Err(DispatchError::Aggregate(members))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_combine_empty_is_ok() {
        assert!(combine(Vec::new()).is_ok());
    }

    #[test]
    fn test_combine_single_passes_through() {
        let err = combine(vec![DispatchError::msg("only")]).unwrap_err();
        assert_eq!(err.to_string(), "only");
        assert!(err.members().is_none());
    }

    #[test]
    fn test_combine_many_aggregates_in_order() {
        let err = combine(vec![DispatchError::msg("e1"), DispatchError::msg("e2")]).unwrap_err();
        let members = err.members().expect("aggregate");
        let texts: Vec<String> = members.iter().map(ToString::to_string).collect();
        assert_eq!(texts, vec!["e1", "e2"]);
        assert_eq!(err.to_string(), "2 invocations failed: [e1; e2]");
    }

    #[test]
    fn test_combine_collapses_pure_cancellation() {
        let err = combine(vec![
            DispatchError::Canceled,
            DispatchError::Canceled,
            DispatchError::Canceled,
        ])
        .unwrap_err();
        assert!(err.is_cancellation());
    }

    #[test]
    fn test_combine_mixed_keeps_one_cancellation() {
        let err = combine(vec![
            DispatchError::Canceled,
            DispatchError::msg("boom"),
            DispatchError::Canceled,
            DispatchError::msg("bang"),
        ])
        .unwrap_err();
        let members = err.members().expect("aggregate");
        assert_eq!(members.len(), 3);
        assert_eq!(members[0].to_string(), "boom");
        assert_eq!(members[1].to_string(), "bang");
        assert!(members[2].is_cancellation());
    }

    #[test]
    fn test_combine_one_failure_plus_cancellation_is_aggregate() {
        let err = combine(vec![DispatchError::msg("boom"), DispatchError::Canceled]).unwrap_err();
        assert_eq!(err.members().map(<[_]>::len), Some(2));
    }

    #[test]
    fn test_labels_and_families() {
        let err = DispatchError::UnknownPublisher { marker: "Rabbit" };
        assert_eq!(err.as_label(), "config_unknown_publisher");
        assert!(err.is_configuration());
        assert!(err.to_string().contains("Rabbit"));
        assert!(!DispatchError::Canceled.is_configuration());
        assert!(!DispatchError::msg("x").is_cancellation());
    }
}
