//! Runs synchronous [`ChatStore`] calls off the async runtime.

use crate::error::StoreCallError;
use likoo_store::{ChatStore, StoreError};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;

/// A blocking store call that did not finish within its limit.
pub(crate) type PendingCall<T> = JoinHandle<Result<T, StoreError>>;

/// Outcome of [`run_or_pending`].
pub(crate) enum Completion<T> {
    Ready(T),
    /// Still running; the caller decides what happens when it resolves.
    Pending(PendingCall<T>),
}

/// Runs `f` on the blocking pool, giving up after `limit`.
///
/// A timed-out call keeps running to completion in the background; its
/// result is discarded. Use [`run_or_pending`] for writes whose late
/// result still matters.
pub(crate) async fn run<S, T, F>(
    store: &Arc<S>,
    limit: Duration,
    f: F,
) -> Result<T, StoreCallError>
where
    S: ChatStore,
    T: Send + 'static,
    F: FnOnce(&S) -> Result<T, StoreError> + Send + 'static,
{
    match run_or_pending(store, limit, f).await? {
        Completion::Ready(value) => Ok(value),
        Completion::Pending(_) => Err(StoreCallError::Timeout(limit)),
    }
}

/// Runs `f` on the blocking pool and waits at most `limit` for it.
///
/// A call still running at `limit` is handed back as
/// [`Completion::Pending`].
pub(crate) async fn run_or_pending<S, T, F>(
    store: &Arc<S>,
    limit: Duration,
    f: F,
) -> Result<Completion<T>, StoreCallError>
where
    S: ChatStore,
    T: Send + 'static,
    F: FnOnce(&S) -> Result<T, StoreError> + Send + 'static,
{
    let store = Arc::clone(store);
    let mut task = tokio::task::spawn_blocking(move || f(&store));
    match tokio::time::timeout(limit, &mut task).await {
        Ok(joined) => Ok(Completion::Ready(joined??)),
        Err(_) => Ok(Completion::Pending(task)),
    }
}
