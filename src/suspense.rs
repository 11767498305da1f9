//! Read-or-suspend boundary over [`PollableResource`]s.
//!
//! Consumers that want blocking-style reads translate `NotReady` into a wait.
//! [`Suspense::read`] waits on the resource's settlement notification (never a
//! busy loop) and gives up after `timeout`, returning `NotReady` so the caller
//! can render a fallback and read again.

use crate::resource::{PollableResource, Polled};
use crate::utils::fmt_duration;
use std::time::Duration;
use tokio::time;
use tracing::debug;

/// How long a read waits before reporting `NotReady`.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(4);

#[derive(Debug, Clone, Copy)]
pub struct Suspense {
    timeout: Duration,
}

impl Default for Suspense {
    fn default() -> Self {
        Self::new(DEFAULT_TIMEOUT)
    }
}

impl Suspense {
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Poll `resource`, waiting up to the timeout for it to settle first.
    pub async fn read<'r, T, E>(&self, resource: &'r PollableResource<T, E>) -> Polled<'r, T, E> {
        if resource.is_settled() {
            return resource.poll();
        }

        match time::timeout(self.timeout, resource.settled()).await {
            Ok(()) => resource.poll(),
            Err(_) => {
                debug!(
                    timeout = fmt_duration(self.timeout),
                    "Resource still pending after timeout"
                );
                Polled::NotReady
            }
        }
    }
}
