//! Scoped activation of fixture mappings.
//!
//! Activation is tied to the lifetime of a future (or a synchronous call):
//! the new mapping is swapped in while the body runs and the previous one
//! is swapped back when control leaves it, including on error, on panic and
//! when the future is dropped before completion. Scopes are strictly LIFO.

use super::scope::{self, FixtureScope, ACTIVE_SCOPE};
use super::SharedFixture;
use crate::error::FixtureError;
use std::cell::RefCell;
use std::future::Future;
use tokio::task::futures::TaskLocalFuture;

/// A future running inside its own fixture scope.
pub type ScopedFuture<F> = TaskLocalFuture<RefCell<FixtureScope>, F>;

/// Run `body` with `scope` as the active mapping.
pub fn enter<F: Future>(scope: FixtureScope, body: F) -> ScopedFuture<F> {
    ACTIVE_SCOPE.scope(RefCell::new(scope), body)
}

/// Run `body` as the top level of a task, in a fresh empty scope.
///
/// Fixtures registered directly in `body` stay visible for the rest of it,
/// including to every nested scope opened later. Task entry points (worker
/// loops, queue runners, the binary) wrap their body in this.
pub fn with_root_scope<F: Future>(body: F) -> ScopedFuture<F> {
    enter(FixtureScope::new(), body)
}

/// Open a new scope holding `providers` and run `body` inside it.
///
/// With `copy` the scope starts as a snapshot of the enclosing one. The
/// mapping is computed before `body` is polled, so a rejected provider means
/// `body` never runs.
pub async fn open_scope<I, F>(providers: I, copy: bool, body: F) -> Result<F::Output, FixtureError>
where
    I: IntoIterator<Item = SharedFixture>,
    F: Future,
{
    let scope = scope::open(providers, copy)?;
    Ok(enter(scope, body).await)
}

/// Synchronous counterpart of [`open_scope`].
pub fn open_scope_sync<I, R>(
    providers: I,
    copy: bool,
    f: impl FnOnce() -> R,
) -> Result<R, FixtureError>
where
    I: IntoIterator<Item = SharedFixture>,
{
    let scope = scope::open(providers, copy)?;
    Ok(ACTIVE_SCOPE.sync_scope(RefCell::new(scope), f))
}

/// Run `body` in a copy of the enclosing scope. Anything it registers is
/// discarded when it finishes.
pub fn in_new_scope<F: Future>(body: F) -> ScopedFuture<F> {
    enter(scope::current_child(), body)
}

/// Synchronous counterpart of [`in_new_scope`].
pub fn in_new_scope_sync<R>(f: impl FnOnce() -> R) -> R {
    ACTIVE_SCOPE.sync_scope(RefCell::new(scope::current_child()), f)
}

/// Wrap `f` so every call runs in a fresh copy of the caller's scope.
pub fn scoped<A, F, Fut>(f: F) -> impl Fn(A) -> ScopedFuture<Fut>
where
    F: Fn(A) -> Fut,
    Fut: Future,
{
    move |arg| in_new_scope(f(arg))
}

/// Synchronous counterpart of [`scoped`].
pub fn scoped_sync<A, R, F>(f: F) -> impl Fn(A) -> R
where
    F: Fn(A) -> R,
{
    move |arg| in_new_scope_sync(|| f(arg))
}
