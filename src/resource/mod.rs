//! Non-blocking, pollable view over an asynchronous computation.
//!
//! A [`PollableResource`] lets synchronous-looking consumers read the result of
//! async work without blocking: [`PollableResource::poll`] answers `NotReady`,
//! `Ready` or `Failed` from a lock-free snapshot. Turning `NotReady` into a wait
//! is the caller's job (see [`crate::suspense`]).

mod deferred;

pub use deferred::{Deferred, DeferredState, Failure};

use std::fmt;
use std::future::Future;
use std::sync::Arc;
use tokio::runtime::Handle;

/// Three-way result of [`PollableResource::poll`].
#[derive(Debug, PartialEq)]
pub enum Polled<'a, T, E> {
    NotReady,
    Ready(&'a T),
    Failed(&'a Failure<E>),
}

impl<'a, T, E> Polled<'a, T, E> {
    pub fn is_ready(&self) -> bool {
        matches!(self, Polled::Ready(_))
    }

    pub fn is_not_ready(&self) -> bool {
        matches!(self, Polled::NotReady)
    }

    /// `None` while pending, otherwise the settled outcome.
    pub fn into_result(self) -> Option<Result<&'a T, &'a Failure<E>>> {
        match self {
            Polled::NotReady => None,
            Polled::Ready(value) => Some(Ok(value)),
            Polled::Failed(failure) => Some(Err(failure)),
        }
    }
}

impl<'a, T, E> From<DeferredState<'a, T, E>> for Polled<'a, T, E> {
    fn from(state: DeferredState<'a, T, E>) -> Self {
        match state {
            DeferredState::Pending => Polled::NotReady,
            DeferredState::Resolved(value) => Polled::Ready(value),
            DeferredState::Rejected(failure) => Polled::Failed(failure),
        }
    }
}

/// Shared handle to a single [`Deferred`]. Clones observe the same computation.
pub struct PollableResource<T, E> {
    deferred: Arc<Deferred<T, E>>,
}

impl<T, E> PollableResource<T, E>
where
    T: Send + Sync + 'static,
    E: Send + Sync + 'static,
{
    /// Launch `computation` and wrap it in a new resource.
    pub fn spawn<F>(computation: F) -> Self
    where
        F: Future<Output = Result<T, E>> + Send + 'static,
    {
        Self::new(Deferred::start(computation))
    }

    /// Launch `computation` on `runtime`. Does not need to be called from inside it.
    pub fn spawn_on<F>(runtime: &Handle, computation: F) -> Self
    where
        F: Future<Output = Result<T, E>> + Send + 'static,
    {
        Self::new(Deferred::start_on(runtime, computation))
    }
}

impl<T, E> PollableResource<T, E> {
    pub fn new(deferred: Deferred<T, E>) -> Self {
        Self {
            deferred: Arc::new(deferred),
        }
    }

    /// Pure read of the underlying state. Never blocks, never starts work.
    pub fn poll(&self) -> Polled<'_, T, E> {
        self.deferred.current_state().into()
    }

    pub fn is_settled(&self) -> bool {
        self.deferred.is_settled()
    }

    /// Completes once the resource has settled. See [`Deferred::settled`].
    pub async fn settled(&self) {
        self.deferred.settled().await
    }

    /// Whether both handles refer to the same underlying computation.
    pub fn ptr_eq(a: &Self, b: &Self) -> bool {
        Arc::ptr_eq(&a.deferred, &b.deferred)
    }
}

impl<T, E> Clone for PollableResource<T, E> {
    fn clone(&self) -> Self {
        Self {
            deferred: Arc::clone(&self.deferred),
        }
    }
}

impl<T, E> fmt::Debug for PollableResource<T, E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("PollableResource")
            .field(&self.deferred)
            .finish()
    }
}
