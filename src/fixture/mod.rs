//! Fixtures: named, asynchronously produced dependencies injected into
//! workflow code.
//!
//! Providers live in a [`FixtureScope`] that is local to the running tokio
//! task. Scopes nest: [`open_scope`] and [`in_new_scope`] activate a new
//! mapping for the duration of a future and restore the previous one however
//! the future ends (completion, error, panic, or being dropped).

pub mod guard;
pub mod scope;

pub use guard::{
    enter, in_new_scope, in_new_scope_sync, open_scope, open_scope_sync, scoped, scoped_sync,
    with_root_scope, ScopedFuture,
};
pub use scope::{
    current, is_active, lookup, open, register, register_value, resolve, resolve_as, FixtureScope,
};

use crate::error::FixtureError;
use async_trait::async_trait;
use futures::future::BoxFuture;
use std::any::{type_name, Any};
use std::future::Future;
use std::sync::Arc;

/// A value produced by a fixture provider.
pub type FixtureValue = Arc<dyn Any + Send + Sync>;

/// Shared handle to a fixture provider.
pub type SharedFixture = Arc<dyn Fixture>;

/// A named provider of a fixture value.
///
/// Providers are referenced by name: registering a second provider under an
/// existing name replaces the first for lookups in that scope only.
#[async_trait]
pub trait Fixture: Send + Sync {
    /// Name the provider is registered under.
    fn name(&self) -> &str;

    /// Capability marker. Scopes refuse providers that report `false`.
    fn is_fixture(&self) -> bool {
        true
    }

    /// Produce the value. Runs on the resolving task, so it may resolve
    /// other fixtures from the active scope.
    async fn provide(&self) -> Result<FixtureValue, FixtureError>;
}

type ProviderFn = dyn Fn() -> BoxFuture<'static, anyhow::Result<FixtureValue>> + Send + Sync;

/// Fixture backed by an async closure.
pub struct FnFixture {
    name: String,
    func: Box<ProviderFn>,
}

impl FnFixture {
    pub fn new<F, Fut, T>(name: impl Into<String>, func: F) -> Self
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = anyhow::Result<T>> + Send + 'static,
        T: Any + Send + Sync,
    {
        Self {
            name: name.into(),
            func: Box::new(move || -> BoxFuture<'static, anyhow::Result<FixtureValue>> {
                let fut = func();
                Box::pin(async move { fut.await.map(|v| Arc::new(v) as FixtureValue) })
            }),
        }
    }
}

#[async_trait]
impl Fixture for FnFixture {
    fn name(&self) -> &str {
        &self.name
    }

    async fn provide(&self) -> Result<FixtureValue, FixtureError> {
        (self.func)().await.map_err(|err| FixtureError::Provider {
            name: self.name.clone(),
            source: err.into(),
        })
    }
}

/// Fixture that always yields the same shared value.
pub struct ValueFixture {
    name: String,
    value: FixtureValue,
    type_name: &'static str,
}

impl ValueFixture {
    pub fn new<T: Any + Send + Sync>(name: impl Into<String>, value: T) -> Self {
        Self {
            name: name.into(),
            value: Arc::new(value),
            type_name: type_name::<T>(),
        }
    }

    /// Name of the Rust type this fixture holds.
    pub fn type_name(&self) -> &'static str {
        self.type_name
    }
}

#[async_trait]
impl Fixture for ValueFixture {
    fn name(&self) -> &str {
        &self.name
    }

    async fn provide(&self) -> Result<FixtureValue, FixtureError> {
        Ok(Arc::clone(&self.value))
    }
}

/// Build a provider from an async closure.
pub fn fixture<F, Fut, T>(name: impl Into<String>, func: F) -> SharedFixture
where
    F: Fn() -> Fut + Send + Sync + 'static,
    Fut: Future<Output = anyhow::Result<T>> + Send + 'static,
    T: Any + Send + Sync,
{
    Arc::new(FnFixture::new(name, func))
}

/// Build a provider that always yields `value`.
pub fn value<T: Any + Send + Sync>(name: impl Into<String>, value: T) -> SharedFixture {
    Arc::new(ValueFixture::new(name, value))
}
