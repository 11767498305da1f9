//! One-shot outcome cell settled by a spawned computation.
//!
//! A [`Deferred`] launches its computation exactly once, on construction, and
//! records the outcome in a [`OnceLock`]. Reads never block and never take a
//! lock: once the cell is written it is never written again, so every later read
//! observes the same terminal state.

use futures::FutureExt;
use std::any::Any;
use std::fmt;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::{Arc, OnceLock, Weak};
use tokio::runtime::Handle;
use tokio::sync::watch;
use tracing::trace;

/// Why a computation settled without a value.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum Failure<E> {
    /// The computation returned an error.
    #[error(transparent)]
    Producer(E),
    /// The computation panicked; the payload message is kept when it is a string.
    #[error("producer panicked: {0}")]
    Panicked(String),
}

impl<E> Failure<E> {
    /// The producer's own error, if the failure came from one.
    pub fn producer_error(&self) -> Option<&E> {
        match self {
            Failure::Producer(err) => Some(err),
            Failure::Panicked(_) => None,
        }
    }
}

/// Snapshot of a [`Deferred`]'s state.
#[derive(Debug, PartialEq)]
pub enum DeferredState<'a, T, E> {
    Pending,
    Resolved(&'a T),
    Rejected(&'a Failure<E>),
}

type Outcome<T, E> = Result<T, Failure<E>>;

pub struct Deferred<T, E> {
    cell: Arc<OnceLock<Outcome<T, E>>>,
    /// Flips to `true` once `cell` is written.
    settled: watch::Receiver<bool>,
}

impl<T, E> Deferred<T, E>
where
    T: Send + Sync + 'static,
    E: Send + Sync + 'static,
{
    /// Spawn `computation` on the current tokio runtime and track its outcome.
    ///
    /// # Panics
    ///
    /// Panics when called outside of a tokio runtime. Use [`Deferred::start_on`]
    /// from threads that are not driven by one.
    pub fn start<F>(computation: F) -> Self
    where
        F: Future<Output = Result<T, E>> + Send + 'static,
    {
        Self::start_on(&Handle::current(), computation)
    }

    /// Spawn `computation` on `runtime` and track its outcome. Callable from any thread.
    ///
    /// The task only holds a weak reference to the cell. If every handle is
    /// dropped before the computation finishes, the computation still runs to
    /// completion and its outcome is discarded.
    pub fn start_on<F>(runtime: &Handle, computation: F) -> Self
    where
        F: Future<Output = Result<T, E>> + Send + 'static,
    {
        let cell = Arc::new(OnceLock::new());
        let (tx, rx) = watch::channel(false);
        let slot = Arc::downgrade(&cell);

        runtime.spawn(async move {
            let outcome = match AssertUnwindSafe(computation).catch_unwind().await {
                Ok(Ok(value)) => Ok(value),
                Ok(Err(err)) => Err(Failure::Producer(err)),
                Err(payload) => Err(Failure::Panicked(panic_message(payload.as_ref()))),
            };
            settle(&slot, outcome, &tx);
        });

        Self { cell, settled: rx }
    }
}

impl<T, E> Deferred<T, E> {
    /// A deferred that is already settled with `outcome`.
    pub fn from_result(outcome: Result<T, E>) -> Self {
        let cell = OnceLock::new();
        let _ = cell.set(outcome.map_err(Failure::Producer));
        let (_tx, rx) = watch::channel(true);
        Self {
            cell: Arc::new(cell),
            settled: rx,
        }
    }

    /// Non-blocking, side-effect-free read of the current state.
    pub fn current_state(&self) -> DeferredState<'_, T, E> {
        match self.cell.get() {
            None => DeferredState::Pending,
            Some(Ok(value)) => DeferredState::Resolved(value),
            Some(Err(failure)) => DeferredState::Rejected(failure),
        }
    }

    pub fn is_settled(&self) -> bool {
        self.cell.get().is_some()
    }

    /// Completes once the computation has settled.
    ///
    /// Never completes if the runtime drops the computation before it settles
    /// (e.g. during runtime shutdown); bound the wait with a timeout.
    pub async fn settled(&self) {
        if self.is_settled() {
            return;
        }
        let mut rx = self.settled.clone();
        if rx.wait_for(|done| *done).await.is_err() {
            std::future::pending::<()>().await;
        }
    }
}

fn settle<T, E>(slot: &Weak<OnceLock<Outcome<T, E>>>, outcome: Outcome<T, E>, tx: &watch::Sender<bool>) {
    let Some(cell) = slot.upgrade() else {
        trace!("Deferred dropped before settling, discarding outcome");
        return;
    };
    // Only the spawned task writes the cell, and it does so once.
    let _ = cell.set(outcome);
    tx.send_replace(true);
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(msg) = payload.downcast_ref::<&str>() {
        (*msg).to_owned()
    } else if let Some(msg) = payload.downcast_ref::<String>() {
        msg.clone()
    } else {
        "non-string panic payload".to_owned()
    }
}

impl<T, E> fmt::Debug for Deferred<T, E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = match self.cell.get() {
            None => "pending",
            Some(Ok(_)) => "resolved",
            Some(Err(_)) => "rejected",
        };
        f.debug_struct("Deferred").field("state", &state).finish()
    }
}
