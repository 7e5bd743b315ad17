//! # Built middleware chain.
//!
//! A [`Chain`] is the immutable result of pipeline construction: ordered links plus a
//! terminal action. Links own shared configuration slots, so a chain (and every clone of
//! it) can still be reconfigured by middleware type until it runs.

use std::any::{Any, TypeId};
use std::fmt;
use std::sync::{Arc, PoisonError, RwLock};

use tokio_util::sync::CancellationToken;

use super::middleware::{DispatchFuture, Middleware, Next};
use crate::error::DispatchError;
use crate::events::AnyEvent;

/// Terminal action of a chain: the observer handler or the publisher's `publish`.
pub(crate) type Terminal =
    Arc<dyn Fn(AnyEvent, CancellationToken) -> DispatchFuture + Send + Sync>;

pub(crate) type Resolver = Arc<dyn Fn() -> Arc<dyn Middleware> + Send + Sync>;

/// Shared, externally mutable configuration handle of one link.
#[derive(Clone, Default)]
pub(crate) struct ConfigSlot(Arc<RwLock<Option<Arc<dyn Any + Send + Sync>>>>);

impl ConfigSlot {
    pub(crate) fn get<C: Send + Sync + 'static>(&self) -> Option<Arc<C>> {
        let slot = self.0.read().unwrap_or_else(PoisonError::into_inner);
        slot.clone()?.downcast::<C>().ok()
    }

    pub(crate) fn set<C: Send + Sync + 'static>(&self, config: C) {
        let mut slot = self.0.write().unwrap_or_else(PoisonError::into_inner);
        *slot = Some(Arc::new(config));
    }

    /// Applies `mutate` to a copy of the current value (or `C::default()`), then stores it.
    pub(crate) fn update<C, F>(&self, mutate: F)
    where
        C: Clone + Default + Send + Sync + 'static,
        F: FnOnce(&mut C),
    {
        let mut slot = self.0.write().unwrap_or_else(PoisonError::into_inner);
        let mut value = slot
            .as_ref()
            .and_then(|c| c.downcast_ref::<C>())
            .cloned()
            .unwrap_or_default();
        mutate(&mut value);
        *slot = Some(Arc::new(value));
    }
}

/// One step of a chain.
#[derive(Clone)]
pub(crate) struct Link {
    pub(crate) middleware: TypeId,
    pub(crate) name: &'static str,
    pub(crate) resolver: Resolver,
    pub(crate) config: ConfigSlot,
}

impl Link {
    pub(crate) fn resolve(&self) -> Arc<dyn Middleware> {
        (self.resolver)()
    }
}

/// Ready-to-run middleware chain with its terminal action.
#[derive(Clone)]
pub struct Chain {
    owner: &'static str,
    links: Arc<[Link]>,
    terminal: Terminal,
}

impl Chain {
    pub(crate) fn new(owner: &'static str, links: Vec<Link>, terminal: Terminal) -> Self {
        Self {
            owner,
            links: links.into(),
            terminal,
        }
    }

    /// Observer or publisher type owning this chain.
    pub fn owner(&self) -> &'static str {
        self.owner
    }

    /// Number of middleware steps.
    pub fn len(&self) -> usize {
        self.links.len()
    }

    /// True when the terminal action runs directly.
    pub fn is_empty(&self) -> bool {
        self.links.is_empty()
    }

    /// Middleware type names in execution order.
    pub fn middleware_names(&self) -> Vec<&'static str> {
        self.links.iter().map(|l| l.name).collect()
    }

    /// Replaces the configuration bound to the first `M` in the chain.
    pub fn configure<M, C>(&self, config: C) -> Result<(), DispatchError>
    where
        M: Middleware,
        C: Send + Sync + 'static,
    {
        self.slot::<M>()?.set(config);
        Ok(())
    }

    /// Mutates the configuration bound to the first `M` in the chain.
    pub fn configure_with<M, C, F>(&self, mutate: F) -> Result<(), DispatchError>
    where
        M: Middleware,
        C: Clone + Default + Send + Sync + 'static,
        F: FnOnce(&mut C),
    {
        self.slot::<M>()?.update(mutate);
        Ok(())
    }

    /// Runs the chain.
    pub fn execute(&self, event: AnyEvent, token: CancellationToken) -> DispatchFuture {
        Next::new(Arc::clone(&self.links), Arc::clone(&self.terminal), 0).run(event, token)
    }

    fn slot<M: Middleware>(&self) -> Result<&ConfigSlot, DispatchError> {
        find_slot::<M>(&self.links, self.owner)
    }
}

impl fmt::Debug for Chain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Chain")
            .field("owner", &self.owner)
            .field("middlewares", &self.middleware_names())
            .finish_non_exhaustive()
    }
}

pub(crate) fn find_slot<'a, M: Middleware>(
    links: &'a [Link],
    owner: &'static str,
) -> Result<&'a ConfigSlot, DispatchError> {
    links
        .iter()
        .find(|l| l.middleware == TypeId::of::<M>())
        .map(|l| &l.config)
        .ok_or(DispatchError::MiddlewareNotInPipeline {
            middleware: std::any::type_name::<M>(),
            owner,
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::middleware::MiddlewareContext;
    use async_trait::async_trait;
    use std::sync::Mutex;

    type Trace = Arc<Mutex<Vec<String>>>;

    struct Tag {
        trace: Trace,
    }

    #[async_trait]
    impl Middleware for Tag {
        async fn execute(&self, ctx: MiddlewareContext) -> Result<(), DispatchError> {
            let label = ctx.config::<String>().map(|s| s.as_str().to_owned()).unwrap_or_default();
            self.trace.lock().unwrap().push(format!("in:{label}"));
            let res = ctx.next().await;
            self.trace.lock().unwrap().push(format!("out:{label}"));
            res
        }
    }

    struct Unused;

    #[async_trait]
    impl Middleware for Unused {
        async fn execute(&self, ctx: MiddlewareContext) -> Result<(), DispatchError> {
            ctx.next().await
        }
    }

    fn link(trace: &Trace, label: &str) -> Link {
        let trace = Arc::clone(trace);
        let config = ConfigSlot::default();
        config.set(label.to_owned());
        Link {
            middleware: TypeId::of::<Tag>(),
            name: "Tag",
            resolver: Arc::new(move || Arc::new(Tag { trace: Arc::clone(&trace) }) as Arc<dyn Middleware>),
            config,
        }
    }

    fn terminal(trace: &Trace) -> Terminal {
        let trace = Arc::clone(trace);
        Arc::new(move |_ev: AnyEvent, _token: CancellationToken| -> DispatchFuture {
            let trace = Arc::clone(&trace);
            Box::pin(async move {
                trace.lock().unwrap().push("terminal".into());
                Ok(())
            })
        })
    }

    #[tokio::test]
    async fn test_links_wrap_outer_to_inner() {
        let trace: Trace = Arc::default();
        let chain = Chain::new("Owner", vec![link(&trace, "a"), link(&trace, "b")], terminal(&trace));

        chain.execute(AnyEvent::new(1u8), CancellationToken::new()).await.unwrap();

        assert_eq!(
            *trace.lock().unwrap(),
            vec!["in:a", "in:b", "terminal", "out:b", "out:a"]
        );
        assert_eq!(chain.len(), 2);
        assert_eq!(chain.middleware_names(), vec!["Tag", "Tag"]);
    }

    #[tokio::test]
    async fn test_reconfigure_after_build_is_honoured() {
        let trace: Trace = Arc::default();
        let chain = Chain::new("Owner", vec![link(&trace, "old")], terminal(&trace));
        chain.configure::<Tag, String>("new".to_owned()).unwrap();

        chain.execute(AnyEvent::new(1u8), CancellationToken::new()).await.unwrap();
        assert_eq!(trace.lock().unwrap()[0], "in:new");
    }

    #[tokio::test]
    async fn test_configure_with_mutates_current_value() {
        let trace: Trace = Arc::default();
        let chain = Chain::new("Owner", vec![link(&trace, "x")], terminal(&trace));
        chain
            .configure_with::<Tag, String, _>(|s| s.push_str("-patched"))
            .unwrap();

        chain.execute(AnyEvent::new(1u8), CancellationToken::new()).await.unwrap();
        assert_eq!(trace.lock().unwrap()[0], "in:x-patched");
    }

    #[test]
    fn test_configure_absent_middleware_fails() {
        let trace: Trace = Arc::default();
        let chain = Chain::new("Owner", vec![link(&trace, "a")], terminal(&trace));
        let err = chain.configure::<Unused, u32>(1).unwrap_err();
        assert!(matches!(err, DispatchError::MiddlewareNotInPipeline { owner: "Owner", .. }));
    }

    #[test]
    fn test_debug_lists_owner_and_middlewares() {
        let trace: Trace = Arc::default();
        let chain = Chain::new("Owner", vec![link(&trace, "a")], terminal(&trace));
        let out = format!("{chain:?}");
        assert!(out.contains("owner: \"Owner\""));
        assert!(out.contains("middlewares: [\"Tag\"]"));
    }

    #[tokio::test]
    async fn test_empty_chain_runs_terminal() {
        let trace: Trace = Arc::default();
        let chain = Chain::new("Owner", Vec::new(), terminal(&trace));
        assert!(chain.is_empty());
        chain.execute(AnyEvent::new(()), CancellationToken::new()).await.unwrap();
        assert_eq!(*trace.lock().unwrap(), vec!["terminal"]);
    }
}
