//! View liveness scopes
//!
//! A view mounts a [`ViewScope`] and tears it down when it goes away. Async
//! results that arrive after teardown are dropped instead of being applied.
//! Cancellation is soft: in-flight requests still run to completion, only
//! their results are discarded.

use std::future::Future;

use tokio_util::sync::CancellationToken;
use tracing::debug;
use uuid::Uuid;

#[derive(Debug, Clone)]
pub struct ViewScope {
    id: Uuid,
    name: &'static str,
    token: CancellationToken,
}

impl ViewScope {
    /// Mount a new live scope
    pub fn mount(name: &'static str) -> Self {
        let scope = Self {
            id: Uuid::new_v4(),
            name,
            token: CancellationToken::new(),
        };
        debug!(scope = scope.name, scope_id = %scope.id, "View mounted");
        scope
    }

    /// Scope that ends with this one (or earlier, if torn down itself)
    pub fn child(&self, name: &'static str) -> Self {
        Self {
            id: Uuid::new_v4(),
            name,
            token: self.token.child_token(),
        }
    }

    pub fn is_live(&self) -> bool {
        !self.token.is_cancelled()
    }

    pub fn teardown(&self) {
        if self.is_live() {
            debug!(scope = self.name, scope_id = %self.id, "View torn down");
        }
        self.token.cancel();
    }

    /// Await `fut` to completion, yielding its output only if still live
    pub async fn run<F: Future>(&self, fut: F) -> Option<F::Output> {
        let output = fut.await;
        if self.is_live() {
            Some(output)
        } else {
            debug!(scope = self.name, scope_id = %self.id, "Discarding late result");
            None
        }
    }

    /// Apply a state mutation only while live
    pub fn commit<T>(&self, apply: impl FnOnce() -> T) -> Option<T> {
        self.is_live().then(apply)
    }
}
