//! Adapters for producer futures handed to [`crate::cache::KeyedResourceCache::get`].

use futures::future::BoxFuture;
use std::future::Future;
use std::time::Duration;
use tokio::time;

/// Wait `delay` before running `fut`. Simulates a slow backend.
pub async fn delayed<F, T, E>(delay: Duration, fut: F) -> Result<T, E>
where
    F: Future<Output = Result<T, E>>,
{
    time::sleep(delay).await;
    fut.await
}

/// Apply an optional delay to a boxed producer future.
pub fn maybe_delayed<T, E>(
    delay: Option<Duration>,
    fut: BoxFuture<'static, Result<T, E>>,
) -> BoxFuture<'static, Result<T, E>>
where
    T: Send + 'static,
    E: Send + 'static,
{
    match delay {
        Some(delay) => Box::pin(delayed(delay, fut)),
        None => fut,
    }
}
