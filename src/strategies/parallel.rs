//! # Parallel broadcasting with bounded fan-out.
//!
//! Invocations are spawned onto the runtime, at most `max_parallelism` at a time. A
//! permit is acquired **before** spawning, so invocations start in registration order
//! and an invocation cannot start until a slot is free. Everything runs to completion;
//! failures are then folded (parallel mode always behaves as "after all").
//!
//! ```text
//! for inv in invocations:
//!   ├─► acquire permit  (waits while K invocations are in flight)
//!   └─► JoinSet::spawn(catch_unwind(inv()))   (permit released on completion)
//! join all ─► sort failures by registration index ─► combine
//! ```
//!
//! ## Rules
//! - `max_parallelism == 0` is a configuration error reported when executing.
//! - Panics inside an invocation are caught and reported as `Panicked`.
//! - Nothing is detached: `execute` returns only after every spawned invocation ended.

use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use async_trait::async_trait;
use futures::FutureExt;
use tokio::{sync::Semaphore, task::JoinSet};
use tokio_util::sync::CancellationToken;

use super::{BroadcastStrategy, Invocation};
use crate::error::{DispatchError, combine};

/// Bounded concurrent broadcasting.
#[derive(Clone, Copy, Debug)]
pub struct Parallel {
    /// Maximum number of invocations in flight (must be positive).
    pub max_parallelism: usize,
}

impl Parallel {
    /// Parallel strategy with the given bound.
    pub fn new(max_parallelism: usize) -> Self {
        Self { max_parallelism }
    }
}

#[async_trait]
impl BroadcastStrategy for Parallel {
    async fn execute(
        &self,
        invocations: Vec<Invocation>,
        _token: CancellationToken,
    ) -> Result<(), DispatchError> {
        if self.max_parallelism == 0 {
            tracing::warn!("parallel broadcast configured with max_parallelism = 0");
            return Err(DispatchError::InvalidParallelism {
                value: self.max_parallelism,
            });
        }

        let semaphore = Arc::new(Semaphore::new(self.max_parallelism));
        let mut set = JoinSet::new();

        for (index, invoke) in invocations.into_iter().enumerate() {
            let Ok(permit) = Arc::clone(&semaphore).acquire_owned().await else {
                break;
            };
            set.spawn(async move {
                let _permit = permit;
                let outcome = AssertUnwindSafe(async move { invoke().await })
                    .catch_unwind()
                    .await;
                match outcome {
                    Ok(res) => (index, res),
                    Err(payload) => (index, Err(DispatchError::Panicked { info: panic_info(payload) })),
                }
            });
        }

        let mut failures = Vec::new();
        while let Some(joined) = set.join_next().await {
            match joined {
                Ok((_, Ok(()))) => {}
                Ok((index, Err(err))) => failures.push((index, err)),
                Err(join_err) => failures.push((
                    usize::MAX,
                    DispatchError::Panicked {
                        info: join_err.to_string(),
                    },
                )),
            }
        }
        failures.sort_by_key(|(index, _)| *index);
        combine(failures.into_iter().map(|(_, err)| err).collect())
    }

    fn name(&self) -> &'static str {
        "parallel"
    }
}

fn panic_info(payload: Box<dyn Any + Send>) -> String {
    if let Some(msg) = payload.downcast_ref::<&'static str>() {
        (*msg).to_string()
    } else if let Some(msg) = payload.downcast_ref::<String>() {
        msg.clone()
    } else {
        "unknown panic".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::strategies::testing::{Trace, canceled, fail_e1, fail_e2, ok, traced};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;
    use tokio::sync::Notify;

    #[tokio::test]
    async fn test_zero_parallelism_is_configuration_error() {
        let trace: Trace = Default::default();
        let err = Parallel::new(0)
            .execute(vec![traced(&trace, "a", 0, ok)], CancellationToken::new())
            .await
            .unwrap_err();
        assert!(matches!(err, DispatchError::InvalidParallelism { value: 0 }));
        assert!(err.is_configuration());
        assert!(trace.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_pool_of_one_serializes() {
        let trace: Trace = Default::default();
        let invs = vec![traced(&trace, "a", 30, ok), traced(&trace, "b", 0, ok)];
        Parallel::new(1).execute(invs, CancellationToken::new()).await.unwrap();
        assert_eq!(
            *trace.lock().unwrap(),
            vec!["start:a", "end:a", "start:b", "end:b"]
        );
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_in_flight_never_exceeds_bound() {
        const K: usize = 2;
        const N: usize = 6;
        let active = Arc::new(AtomicUsize::new(0));
        let peak = Arc::new(AtomicUsize::new(0));
        let started = Arc::new(AtomicUsize::new(0));
        let release = Arc::new(Notify::new());

        let invs: Vec<Invocation> = (0..N)
            .map(|_| {
                let (active, peak, started, release) =
                    (active.clone(), peak.clone(), started.clone(), release.clone());
                Box::new(move || {
                    Box::pin(async move {
                        let now = active.fetch_add(1, Ordering::SeqCst) + 1;
                        peak.fetch_max(now, Ordering::SeqCst);
                        started.fetch_add(1, Ordering::SeqCst);
                        release.notified().await;
                        active.fetch_sub(1, Ordering::SeqCst);
                        Ok(())
                    }) as crate::middleware::DispatchFuture
                }) as Invocation
            })
            .collect();

        let run = tokio::spawn(async move { Parallel::new(K).execute(invs, CancellationToken::new()).await });

        // Release one blocked invocation at a time until all of them have finished.
        while !run.is_finished() {
            tokio::time::sleep(Duration::from_millis(10)).await;
            assert!(active.load(Ordering::SeqCst) <= K);
            release.notify_one();
        }
        run.await.unwrap().unwrap();
        assert_eq!(started.load(Ordering::SeqCst), N);
        assert_eq!(peak.load(Ordering::SeqCst), K);
    }

    #[tokio::test]
    async fn test_two_failures_aggregate_exactly() {
        let trace: Trace = Default::default();
        let invs = vec![
            traced(&trace, "a", 10, fail_e1),
            traced(&trace, "b", 0, fail_e2),
        ];
        let err = Parallel::new(4).execute(invs, CancellationToken::new()).await.unwrap_err();
        let texts: Vec<String> = err.members().unwrap().iter().map(ToString::to_string).collect();
        assert_eq!(texts, vec!["E1", "E2"]);
    }

    #[tokio::test]
    async fn test_pure_cancellations_collapse() {
        let trace: Trace = Default::default();
        let token = CancellationToken::new();
        token.cancel();
        let invs = vec![
            traced(&trace, "a", 0, canceled),
            traced(&trace, "b", 0, canceled),
        ];
        let err = Parallel::new(2).execute(invs, token).await.unwrap_err();
        assert!(err.is_cancellation());
        assert_eq!(trace.lock().unwrap().len(), 4);
    }

    #[tokio::test]
    async fn test_single_failure_passes_through_after_all_ran() {
        let trace: Trace = Default::default();
        let invs = vec![
            traced(&trace, "a", 0, fail_e1),
            traced(&trace, "b", 10, ok),
        ];
        let err = Parallel::new(2).execute(invs, CancellationToken::new()).await.unwrap_err();
        assert_eq!(err.to_string(), "E1");
        assert!(trace.lock().unwrap().contains(&"end:b".to_string()));
    }

    #[tokio::test]
    async fn test_panic_is_reported() {
        let invs: Vec<Invocation> = vec![Box::new(|| {
            Box::pin(async {
                if true {
                    panic!("kaboom");
                }
                Ok(())
            }) as crate::middleware::DispatchFuture
        })];
        let err = Parallel::new(1).execute(invs, CancellationToken::new()).await.unwrap_err();
        assert!(matches!(err, DispatchError::Panicked { ref info } if info == "kaboom"));
    }
}
