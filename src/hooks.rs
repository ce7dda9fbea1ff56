//! Explicit event subscription points.
//!
//! A [`Hook`] owns its subscriber list; nothing is registered globally.
//! Per-execution hooks are cleared when the execution reaches a terminal
//! state, so subscribers never outlive the run they were attached to.

use futures::future::BoxFuture;
use parking_lot::Mutex;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::warn;

/// Result returned by hook callbacks.
pub type HookResult = anyhow::Result<()>;

type Callback<T> = Arc<dyn Fn(&T) -> BoxFuture<'static, HookResult> + Send + Sync>;

/// Identifies one subscription on one hook.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

impl SubscriptionId {
    fn next() -> Self {
        static COUNTER: AtomicU64 = AtomicU64::new(1);
        SubscriptionId(COUNTER.fetch_add(1, Ordering::Relaxed))
    }
}

/// A named event hook with ordered subscribers.
pub struct Hook<T> {
    name: &'static str,
    subscribers: Mutex<Vec<(SubscriptionId, Callback<T>)>>,
}

impl<T> Hook<T> {
    pub fn new(name: &'static str) -> Self {
        Self {
            name,
            subscribers: Mutex::new(Vec::new()),
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Add a subscriber. Callbacks run in subscription order.
    ///
    /// The callback gets a borrowed event and must return an owned future,
    /// so clone whatever the future needs before the `async move` block.
    pub fn subscribe<F>(&self, callback: F) -> SubscriptionId
    where
        F: Fn(&T) -> BoxFuture<'static, HookResult> + Send + Sync + 'static,
    {
        let id = SubscriptionId::next();
        self.subscribers.lock().push((id, Arc::new(callback)));
        id
    }

    /// Remove a subscriber. Returns false if it was already gone.
    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        let mut subscribers = self.subscribers.lock();
        let before = subscribers.len();
        subscribers.retain(|(sub_id, _)| *sub_id != id);
        subscribers.len() != before
    }

    /// Drop every subscriber.
    pub fn clear(&self) {
        self.subscribers.lock().clear();
    }

    pub fn len(&self) -> usize {
        self.subscribers.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.subscribers.lock().is_empty()
    }

    /// Run every subscriber in order, awaiting each before the next.
    ///
    /// Subscriber failures are logged and do not stop the remaining
    /// subscribers. Returns the number of failed callbacks.
    pub async fn trigger(&self, event: &T) -> usize {
        let callbacks: Vec<Callback<T>> = self
            .subscribers
            .lock()
            .iter()
            .map(|(_, cb)| Arc::clone(cb))
            .collect();

        let mut failed = 0;
        for callback in callbacks {
            if let Err(err) = callback(event).await {
                failed += 1;
                warn!(hook = self.name, error = %err, "hook callback failed");
            }
        }
        failed
    }
}

impl<T> fmt::Debug for Hook<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Hook")
            .field("name", &self.name)
            .field("subscribers", &self.len())
            .finish()
    }
}
