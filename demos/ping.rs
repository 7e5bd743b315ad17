//! # Ping Example
//!
//! Publishes a few `Ping` events through a dispatcher with:
//! - a metrics observer counting deliveries;
//! - a flaky observer wrapped in a retry middleware;
//! - an outbox publisher bound to `Ping` next to the in-memory transport.
//!
//! ## Run
//! ```bash
//! RUST_LOG=eventvisor=debug cargo run --example ping
//! ```

use std::sync::{
    Arc,
    atomic::{AtomicU32, AtomicU64, Ordering},
};

use async_trait::async_trait;
use eventvisor::{
    AnyEvent, Config, DispatchError, Dispatcher, InMemory, Lifetime, Middleware,
    MiddlewareContext, Observer, PipelineBuilder, Publisher, Registration, Scope,
};
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Debug)]
struct Ping {
    value: u32,
}

struct Outbox;

#[derive(Default)]
struct Metrics {
    delivered: AtomicU64,
}

#[async_trait]
impl Observer<Ping> for Metrics {
    async fn handle(&self, _event: &Ping, _token: CancellationToken) -> Result<(), DispatchError> {
        self.delivered.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }
}

#[derive(Default)]
struct Flaky {
    attempts: AtomicU32,
}

#[async_trait]
impl Observer<Ping> for Flaky {
    async fn handle(&self, event: &Ping, token: CancellationToken) -> Result<(), DispatchError> {
        if token.is_cancelled() {
            return Err(DispatchError::Canceled);
        }
        let attempt = self.attempts.fetch_add(1, Ordering::Relaxed) + 1;
        if attempt % 2 == 1 {
            return Err(DispatchError::msg(format!("ping {} attempt {attempt} failed", event.value)));
        }
        tracing::info!(value = event.value, attempt, "flaky observer succeeded");
        Ok(())
    }
}

#[derive(Clone)]
struct RetryConfig {
    attempts: u32,
}

#[derive(Default)]
struct Retry;

#[async_trait]
impl Middleware for Retry {
    async fn execute(&self, ctx: MiddlewareContext) -> Result<(), DispatchError> {
        let attempts = ctx.config::<RetryConfig>().map_or(1, |c| c.attempts.max(1));
        let mut attempt = 1;
        loop {
            match ctx.next().await {
                Err(err) if attempt < attempts && !err.is_cancellation() => {
                    tracing::warn!(attempt, error = %err, "retrying");
                    attempt += 1;
                }
                res => return res,
            }
        }
    }
}

#[derive(Default)]
struct OutboxPublisher;

#[async_trait]
impl Publisher for OutboxPublisher {
    async fn publish(
        &self,
        event: AnyEvent,
        _token: CancellationToken,
        _scope: &Scope,
    ) -> Result<(), DispatchError> {
        if let Some(ping) = event.downcast_ref::<Ping>() {
            println!("[outbox] stored {ping:?}");
        }
        Ok(())
    }
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .init();
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    init_tracing();

    let metrics = Arc::new(Metrics::default());
    let dispatcher = Dispatcher::builder(Config::parallel(2))
        .middleware::<Retry>(Registration::of())
        .observe::<Ping, Metrics>(Registration::from_arc(Arc::clone(&metrics)))
        .observe::<Ping, Flaky>(Registration::with_lifetime(Lifetime::Singleton))
        .configure_observer::<Ping, Flaky, _>(|p: &mut PipelineBuilder| {
            p.use_middleware_with::<Retry, _>(RetryConfig { attempts: 3 })?;
            #[cfg(feature = "logging")]
            p.use_instance_with(
                Arc::new(eventvisor::LogMiddleware::new()),
                eventvisor::LogConfig {
                    label: "flaky".into(),
                },
            )?;
            Ok(())
        })
        .publisher::<OutboxPublisher, Outbox>(Registration::singleton())
        .transport::<Ping, Outbox>()
        .transport::<Ping, InMemory>()
        .build();

    for value in 1..=3 {
        dispatcher.publish(Ping { value }).await?;
    }

    println!();
    println!("Metrics:");
    println!(" └─► Delivered: {}", metrics.delivered.load(Ordering::Relaxed));
    Ok(())
}
