//! # Sequential broadcasting.
//!
//! Invocations run strictly in registration order; each is fully awaited before the next
//! one starts.
//!
//! ```text
//! ErrorPolicy::Immediate: inv1 ─► inv2 ✗ ─► (stop) ─► Err(e2)
//! ErrorPolicy::AfterAll:  inv1 ─► inv2 ✗ ─► inv3 ✗ ─► combine([e2, e3])
//! ```

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use super::{BroadcastStrategy, Invocation};
use crate::error::{DispatchError, combine};

/// What a sequential broadcast does when an invocation fails.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum ErrorPolicy {
    /// Stop at the first failure and return it (default).
    #[default]
    Immediate,
    /// Run every invocation, then report one failure as is or several as an aggregate.
    AfterAll,
}

/// Strictly ordered broadcasting.
#[derive(Clone, Copy, Debug, Default)]
pub struct Sequential {
    /// Failure handling.
    pub errors: ErrorPolicy,
}

impl Sequential {
    /// Sequential strategy with the given error policy.
    pub fn new(errors: ErrorPolicy) -> Self {
        Self { errors }
    }
}

#[async_trait]
impl BroadcastStrategy for Sequential {
    async fn execute(
        &self,
        invocations: Vec<Invocation>,
        _token: CancellationToken,
    ) -> Result<(), DispatchError> {
        let total = invocations.len();
        let mut failures = Vec::new();

        for (index, invoke) in invocations.into_iter().enumerate() {
            let Err(err) = invoke().await else {
                continue;
            };
            match self.errors {
                ErrorPolicy::Immediate => {
                    tracing::debug!(index, total, error = %err, "sequential broadcast aborted");
                    return Err(err);
                }
                ErrorPolicy::AfterAll => failures.push(err),
            }
        }
        combine(failures)
    }

    fn name(&self) -> &'static str {
        "sequential"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::strategies::testing::{Trace, canceled, fail_e1, fail_e2, ok, traced};

    #[tokio::test]
    async fn test_runs_in_order_each_to_completion() {
        let trace: Trace = Default::default();
        let invs = vec![
            traced(&trace, "a", 20, ok),
            traced(&trace, "b", 0, ok),
            traced(&trace, "c", 5, ok),
        ];
        Sequential::default()
            .execute(invs, CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(
            *trace.lock().unwrap(),
            vec!["start:a", "end:a", "start:b", "end:b", "start:c", "end:c"]
        );
    }

    #[tokio::test]
    async fn test_immediate_stops_at_first_failure() {
        let trace: Trace = Default::default();
        let invs = vec![
            traced(&trace, "a", 0, fail_e1),
            traced(&trace, "b", 0, fail_e2),
        ];
        let err = Sequential::new(ErrorPolicy::Immediate)
            .execute(invs, CancellationToken::new())
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "E1");
        assert_eq!(*trace.lock().unwrap(), vec!["start:a", "end:a"]);
    }

    #[tokio::test]
    async fn test_after_all_single_failure_passes_through() {
        let trace: Trace = Default::default();
        let invs = vec![
            traced(&trace, "a", 0, ok),
            traced(&trace, "b", 0, fail_e2),
            traced(&trace, "c", 0, ok),
        ];
        let err = Sequential::new(ErrorPolicy::AfterAll)
            .execute(invs, CancellationToken::new())
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "E2");
        assert!(err.members().is_none());
        assert_eq!(trace.lock().unwrap().len(), 6);
    }

    #[tokio::test]
    async fn test_after_all_aggregates_many() {
        let trace: Trace = Default::default();
        let invs = vec![
            traced(&trace, "a", 0, fail_e1),
            traced(&trace, "b", 0, fail_e2),
        ];
        let err = Sequential::new(ErrorPolicy::AfterAll)
            .execute(invs, CancellationToken::new())
            .await
            .unwrap_err();
        let texts: Vec<String> = err.members().unwrap().iter().map(ToString::to_string).collect();
        assert_eq!(texts, vec!["E1", "E2"]);
    }

    #[tokio::test]
    async fn test_cancelled_token_does_not_short_circuit() {
        let trace: Trace = Default::default();
        let token = CancellationToken::new();
        token.cancel();
        let invs = vec![
            traced(&trace, "a", 0, canceled),
            traced(&trace, "b", 0, canceled),
        ];
        let err = Sequential::new(ErrorPolicy::AfterAll)
            .execute(invs, token)
            .await
            .unwrap_err();
        assert!(err.is_cancellation());
        assert_eq!(trace.lock().unwrap().len(), 4);
    }
}
