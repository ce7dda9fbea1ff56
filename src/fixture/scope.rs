//! Task-local fixture registry.
//!
//! The active mapping lives in a `tokio::task_local!` slot, so each task
//! observes only the scopes it entered itself. Tasks spawned from inside a
//! scope start without one; wrap their body in
//! [`in_new_scope`](super::in_new_scope) to hand the current fixtures over.

use super::{Fixture, FixtureValue, SharedFixture};
use crate::error::FixtureError;
use std::any::{type_name, Any};
use std::cell::RefCell;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use tracing::trace;

tokio::task_local! {
    pub(super) static ACTIVE_SCOPE: RefCell<FixtureScope>;
}

/// A name -> provider mapping.
///
/// Copies are shallow: provider handles are shared, the map is not, so a
/// child scope can add or replace names without touching its parent.
#[derive(Clone, Default)]
pub struct FixtureScope {
    providers: HashMap<String, SharedFixture>,
    depth: usize,
}

impl FixtureScope {
    pub fn new() -> Self {
        Self::default()
    }

    /// Shallow copy to be used as a child of `self`.
    pub fn child(&self) -> Self {
        Self {
            providers: self.providers.clone(),
            depth: self.depth + 1,
        }
    }

    /// Empty mapping nested below `self`.
    pub fn empty_child(&self) -> Self {
        Self {
            providers: HashMap::new(),
            depth: self.depth + 1,
        }
    }

    /// Insert `provider` under `name`, returning the provider it replaced.
    pub fn insert(
        &mut self,
        name: impl Into<String>,
        provider: SharedFixture,
    ) -> Result<Option<SharedFixture>, FixtureError> {
        let name = name.into();
        if !provider.is_fixture() {
            return Err(FixtureError::NotAFixture(name));
        }
        Ok(self.providers.insert(name, provider))
    }

    /// Insert `provider` under its own name.
    pub fn add(&mut self, provider: SharedFixture) -> Result<Option<SharedFixture>, FixtureError> {
        let name = provider.name().to_string();
        self.insert(name, provider)
    }

    pub fn get(&self, name: &str) -> Option<&SharedFixture> {
        self.providers.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.providers.contains_key(name)
    }

    /// Registered names, sorted.
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.providers.keys().cloned().collect();
        names.sort();
        names
    }

    pub fn len(&self) -> usize {
        self.providers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.providers.is_empty()
    }

    /// Nesting depth; 0 for a root mapping.
    pub fn depth(&self) -> usize {
        self.depth
    }
}

impl fmt::Debug for FixtureScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FixtureScope")
            .field("depth", &self.depth)
            .field("fixtures", &self.names())
            .finish()
    }
}

/// True when a scope is active on the current task.
pub fn is_active() -> bool {
    ACTIVE_SCOPE.try_with(|_| ()).is_ok()
}

/// Snapshot of the active mapping. Empty when no scope is active.
pub fn current() -> FixtureScope {
    ACTIVE_SCOPE
        .try_with(|cell| cell.borrow().clone())
        .unwrap_or_default()
}

/// Shallow copy of the active mapping, one level deeper.
pub(super) fn current_child() -> FixtureScope {
    ACTIVE_SCOPE
        .try_with(|cell| cell.borrow().child())
        .unwrap_or_default()
}

/// Compute the mapping for a new scope without activating it.
///
/// With `copy` the mapping starts from a snapshot of [`current`], otherwise
/// it starts empty. Each provider is then inserted by its name, later
/// entries winning.
pub fn open<I>(providers: I, copy: bool) -> Result<FixtureScope, FixtureError>
where
    I: IntoIterator<Item = SharedFixture>,
{
    let base = ACTIVE_SCOPE
        .try_with(|cell| {
            let active = cell.borrow();
            if copy {
                active.child()
            } else {
                active.empty_child()
            }
        })
        .unwrap_or_default();

    let mut scope = base;
    for provider in providers {
        scope.add(provider)?;
    }
    Ok(scope)
}

/// Register `provider` under `name` in the active scope. Last write wins.
pub fn register(
    name: impl Into<String>,
    provider: SharedFixture,
) -> Result<Option<SharedFixture>, FixtureError> {
    let name = name.into();
    if !provider.is_fixture() {
        return Err(FixtureError::NotAFixture(name));
    }
    match ACTIVE_SCOPE.try_with(|cell| cell.borrow_mut().insert(name.clone(), provider)) {
        Ok(result) => {
            trace!(fixture = %name, "registered fixture");
            result
        }
        Err(_) => Err(FixtureError::NoActiveScope(name)),
    }
}

/// Register a constant value under `name` in the active scope.
pub fn register_value<T: Any + Send + Sync>(
    name: impl Into<String>,
    value: T,
) -> Result<Option<SharedFixture>, FixtureError> {
    let name = name.into();
    register(name.clone(), super::value(name, value))
}

/// Find the provider registered under `name` in the active scope.
pub fn lookup(name: &str) -> Result<SharedFixture, FixtureError> {
    ACTIVE_SCOPE
        .try_with(|cell| cell.borrow().get(name).cloned())
        .ok()
        .flatten()
        .ok_or_else(|| FixtureError::NotFound(name.to_string()))
}

/// Resolve `name` against the active scope and run its provider.
pub async fn resolve(name: &str) -> Result<FixtureValue, FixtureError> {
    let provider = lookup(name)?;
    provider.provide().await
}

/// Resolve `name` and downcast the value to `T`.
pub async fn resolve_as<T: Any + Send + Sync>(name: &str) -> Result<Arc<T>, FixtureError> {
    let value = resolve(name).await?;
    value
        .downcast::<T>()
        .map_err(|_| FixtureError::TypeMismatch {
            name: name.to_string(),
            expected: type_name::<T>(),
        })
}
