//! Handler contract and registry.

mod context;

pub use context::{Progress, TaskContext, TaskResult};

use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;

use async_trait::async_trait;

use crate::domain::TaskKind;
use crate::error::{SchedulerError, TaskError};

/// A handler for one task kind.
///
/// Takes the opaque payload and a [`TaskContext`]; resolves with a result
/// value or a [`TaskError`]. Should watch `ctx.timed_out()` and stop work
/// once the scheduler gives up on the attempt.
#[async_trait]
pub trait TaskHandler: Send + Sync {
    async fn handle(
        &self,
        payload: serde_json::Value,
        ctx: TaskContext,
    ) -> Result<serde_json::Value, TaskError>;
}

/// Adapter turning an async closure into a [`TaskHandler`].
pub struct FnHandler<F> {
    f: F,
}

/// Wrap an async closure as a handler.
///
/// ```ignore
/// let echo = handler_fn(|payload, _ctx| async move { Ok(payload) });
/// ```
pub fn handler_fn<F, Fut>(f: F) -> FnHandler<F>
where
    F: Fn(serde_json::Value, TaskContext) -> Fut + Send + Sync,
    Fut: Future<Output = Result<serde_json::Value, TaskError>> + Send + 'static,
{
    FnHandler { f }
}

#[async_trait]
impl<F, Fut> TaskHandler for FnHandler<F>
where
    F: Fn(serde_json::Value, TaskContext) -> Fut + Send + Sync,
    Fut: Future<Output = Result<serde_json::Value, TaskError>> + Send + 'static,
{
    async fn handle(
        &self,
        payload: serde_json::Value,
        ctx: TaskContext,
    ) -> Result<serde_json::Value, TaskError> {
        (self.f)(payload, ctx).await
    }
}

/// Registry of handlers (kind -> handler).
///
/// Design:
/// - Built during initialization (mutable).
/// - Used during runtime (immutable, shared behind the scheduler's `Arc`).
pub struct HandlerRegistry<K> {
    handlers: HashMap<K, Arc<dyn TaskHandler>>,
}

impl<K: TaskKind> HandlerRegistry<K> {
    pub fn new() -> Self {
        Self {
            handlers: HashMap::new(),
        }
    }

    /// Register a handler for a kind. A second registration for the same kind is an error.
    pub fn register(
        &mut self,
        kind: K,
        handler: Arc<dyn TaskHandler>,
    ) -> Result<(), SchedulerError> {
        if self.handlers.contains_key(&kind) {
            return Err(SchedulerError::DuplicateHandler(kind.to_string()));
        }
        self.handlers.insert(kind, handler);
        Ok(())
    }

    pub fn get(&self, kind: &K) -> Option<Arc<dyn TaskHandler>> {
        self.handlers.get(kind).cloned()
    }

    pub fn contains(&self, kind: &K) -> bool {
        self.handlers.contains_key(kind)
    }

    pub fn kinds(&self) -> Vec<K> {
        self.handlers.keys().copied().collect()
    }

    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }
}

impl<K: TaskKind> Default for HandlerRegistry<K> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::TaskId;
    use tokio::sync::watch;
    use ulid::Ulid;

    struct OkHandler;

    #[async_trait]
    impl TaskHandler for OkHandler {
        async fn handle(
            &self,
            payload: serde_json::Value,
            _ctx: TaskContext,
        ) -> Result<serde_json::Value, TaskError> {
            Ok(payload)
        }
    }

    fn ctx() -> TaskContext {
        let (_tx, rx) = watch::channel(false);
        TaskContext::new(TaskId::from_ulid(Ulid::new()), 1, None, rx)
    }

    #[tokio::test]
    async fn registry_returns_registered_handler() {
        let mut reg = HandlerRegistry::new();
        reg.register("ok", Arc::new(OkHandler)).unwrap();

        let handler = reg.get(&"ok").unwrap();
        let out = handler
            .handle(serde_json::json!({"n": 1}), ctx())
            .await
            .unwrap();
        assert_eq!(out, serde_json::json!({"n": 1}));
        assert!(reg.get(&"missing").is_none());
    }

    #[test]
    fn duplicate_registration_is_rejected() {
        let mut reg = HandlerRegistry::new();
        reg.register("ok", Arc::new(OkHandler)).unwrap();

        let err = reg.register("ok", Arc::new(OkHandler)).unwrap_err();
        assert!(matches!(err, SchedulerError::DuplicateHandler(kind) if kind == "ok"));
        assert_eq!(reg.len(), 1);
    }

    #[tokio::test]
    async fn closures_can_be_handlers() {
        let handler = handler_fn(|payload, ctx| async move {
            if payload["fail"].as_bool().unwrap_or(false) {
                return Err(TaskError::handler(format!("attempt {} failed", ctx.attempt())));
            }
            Ok(serde_json::json!("fine"))
        });

        let ok = handler.handle(serde_json::json!({}), ctx()).await;
        assert_eq!(ok, Ok(serde_json::json!("fine")));

        let err = handler
            .handle(serde_json::json!({"fail": true}), ctx())
            .await
            .unwrap_err();
        assert_eq!(err, TaskError::handler("attempt 1 failed"));
    }
}
