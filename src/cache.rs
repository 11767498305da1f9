//! Keyed resource cache with single-flight creation and sliding expiration.
//!
//! Each key maps to one [`PollableResource`] plus its expiry deadline, stored
//! together so the two can never drift apart. A `get` on a live entry returns
//! the same resource and pushes its deadline to `now + ttl`; a miss invokes the
//! caller's producer exactly once while holding the key's shard lock, so racing
//! callers for the same key all observe the first caller's resource.
//!
//! A background sweep, owned by the cache, evicts entries whose deadline has
//! passed. Eviction abandons in-flight work without cancelling it.

use crate::resource::PollableResource;
use crate::utils::fmt_duration;
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use std::borrow::Borrow;
use std::fmt;
use std::future::Future;
use std::hash::Hash;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tokio::runtime::Handle;
use tokio::time::{self, Instant, MissedTickBehavior};
use tokio_util::sync::{CancellationToken, DropGuard};
use tracing::{debug, info, trace, warn};

/// Default sweep cadence is this fraction of the TTL.
const SWEEP_DIVISOR: u32 = 5;
const MIN_SWEEP_INTERVAL: Duration = Duration::from_millis(1);

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CacheError {
    #[error("resource cache has been torn down")]
    Closed,
    #[error("invalid cache configuration: {0}")]
    InvalidConfig(String),
    #[error("resource cache must be created inside a tokio runtime")]
    NoRuntime,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CacheConfig {
    ttl: Duration,
    sweep_interval: Duration,
}

impl CacheConfig {
    /// Sliding TTL of `ttl`, swept every `ttl / 5`.
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            sweep_interval: (ttl / SWEEP_DIVISOR).max(MIN_SWEEP_INTERVAL),
        }
    }

    pub fn with_sweep_interval(mut self, sweep_interval: Duration) -> Self {
        self.sweep_interval = sweep_interval;
        self
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    pub fn sweep_interval(&self) -> Duration {
        self.sweep_interval
    }

    fn validate(&self) -> Result<(), CacheError> {
        if self.ttl.is_zero() {
            return Err(CacheError::InvalidConfig("ttl must be non-zero".into()));
        }
        if self.sweep_interval.is_zero() {
            return Err(CacheError::InvalidConfig(
                "sweep interval must be non-zero".into(),
            ));
        }
        Ok(())
    }
}

struct CacheEntry<T, E> {
    resource: PollableResource<T, E>,
    expires_at: Instant,
}

struct Shared<K, T, E> {
    entries: DashMap<K, CacheEntry<T, E>>,
    ttl: Duration,
    /// Producers run here, whichever thread calls `get`.
    runtime: Handle,
}

impl<K, T, E> Shared<K, T, E>
where
    K: Eq + Hash + fmt::Debug,
{
    /// Remove every entry whose deadline is strictly before `now`.
    fn evict_expired(&self, now: Instant) -> usize {
        let mut evicted = 0;
        self.entries.retain(|key, entry| {
            if entry.expires_at >= now {
                return true;
            }
            trace!(
                ?key,
                pending = !entry.resource.is_settled(),
                "Evicting expired resource"
            );
            evicted += 1;
            false
        });
        evicted
    }
}

/// Single-flight, sliding-TTL cache of [`PollableResource`]s.
///
/// Share it behind an `Arc`; all operations take `&self`. It is bound to the
/// tokio runtime it was created in: the sweep and every producer run there,
/// so `get` may be called from threads outside that runtime.
pub struct KeyedResourceCache<K, T, E> {
    shared: Arc<Shared<K, T, E>>,
    closed: AtomicBool,
    shutdown: CancellationToken,
    /// Cancels the sweep when the cache is dropped, including during unwinding.
    _sweep_guard: DropGuard,
}

impl<K, T, E> KeyedResourceCache<K, T, E>
where
    K: Eq + Hash + fmt::Debug + Send + Sync + 'static,
    T: Send + Sync + 'static,
    E: Send + Sync + 'static,
{
    pub fn new(config: CacheConfig) -> Result<Self, CacheError> {
        config.validate()?;
        let runtime = Handle::try_current().map_err(|_| CacheError::NoRuntime)?;
        if config.sweep_interval >= config.ttl {
            warn!(
                ttl = fmt_duration(config.ttl),
                sweep_interval = fmt_duration(config.sweep_interval),
                "Sweep interval is not shorter than the TTL; expired entries may linger"
            );
        }

        let shared = Arc::new(Shared {
            entries: DashMap::new(),
            ttl: config.ttl,
            runtime,
        });
        let shutdown = CancellationToken::new();
        shared.runtime.spawn(sweep(
            Arc::clone(&shared),
            config.sweep_interval,
            shutdown.clone(),
        ));

        info!(
            ttl = fmt_duration(config.ttl),
            sweep_interval = fmt_duration(config.sweep_interval),
            "Resource cache started"
        );

        Ok(Self {
            shared,
            closed: AtomicBool::new(false),
            _sweep_guard: shutdown.clone().drop_guard(),
            shutdown,
        })
    }

    /// Return the live resource for `key`, or create one from `producer`.
    ///
    /// A hit extends the entry's deadline to `now + ttl`. An entry past its
    /// deadline counts as a miss even if the sweep has not removed it yet.
    ///
    /// `producer` runs while the key's shard is locked: it should only build
    /// its future, and must not call back into this cache synchronously.
    pub fn get<F, Fut>(&self, key: K, producer: F) -> Result<PollableResource<T, E>, CacheError>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>> + Send + 'static,
    {
        let now = Instant::now();
        let expires_at = now + self.shared.ttl;

        let entry = self.shared.entries.entry(key);
        // Checked under the shard lock: teardown flips `closed` before clearing,
        // so an insert that sees it open is always cleared afterwards.
        if self.is_closed() {
            return Err(CacheError::Closed);
        }

        let resource = match entry {
            Entry::Occupied(mut occupied) if occupied.get().expires_at >= now => {
                trace!(key = ?occupied.key(), "Resource cache hit");
                let cached = occupied.get_mut();
                cached.expires_at = expires_at;
                cached.resource.clone()
            }
            Entry::Occupied(mut occupied) => {
                debug!(key = ?occupied.key(), "Resource expired before sweep, producing again");
                let resource = PollableResource::spawn_on(&self.shared.runtime, producer());
                occupied.insert(CacheEntry {
                    resource: resource.clone(),
                    expires_at,
                });
                resource
            }
            Entry::Vacant(vacant) => {
                debug!(key = ?vacant.key(), "Resource cache miss");
                let resource = PollableResource::spawn_on(&self.shared.runtime, producer());
                vacant.insert(CacheEntry {
                    resource: resource.clone(),
                    expires_at,
                });
                resource
            }
        };

        Ok(resource)
    }

    /// Drop the entry for `key`, so the next `get` produces a fresh resource.
    /// Returns whether an entry was present.
    pub fn invalidate<Q>(&self, key: &Q) -> Result<bool, CacheError>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        if self.is_closed() {
            return Err(CacheError::Closed);
        }
        Ok(self.shared.entries.remove(key).is_some())
    }

    /// Stop the sweep and drop every entry. Fails if already torn down.
    pub fn teardown(&self) -> Result<(), CacheError> {
        if self
            .closed
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return Err(CacheError::Closed);
        }
        self.shutdown.cancel();

        let dropped = self.shared.entries.len();
        self.shared.entries.clear();
        info!(dropped, "Resource cache torn down");
        Ok(())
    }
}

impl<K, T, E> KeyedResourceCache<K, T, E>
where
    K: Eq + Hash,
{
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    pub fn ttl(&self) -> Duration {
        self.shared.ttl
    }

    /// Number of entries currently held, including expired ones awaiting the sweep.
    pub fn len(&self) -> usize {
        self.shared.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.shared.entries.is_empty()
    }

    pub fn contains_key<Q>(&self, key: &Q) -> bool
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        self.shared.entries.contains_key(key)
    }
}

impl<K, T, E> fmt::Debug for KeyedResourceCache<K, T, E>
where
    K: Eq + Hash,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KeyedResourceCache")
            .field("entries", &self.len())
            .field("ttl", &self.shared.ttl)
            .field("closed", &self.is_closed())
            .finish()
    }
}

async fn sweep<K, T, E>(shared: Arc<Shared<K, T, E>>, every: Duration, shutdown: CancellationToken)
where
    K: Eq + Hash + fmt::Debug,
{
    let mut ticker = time::interval(every);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    ticker.tick().await; // skip the immediate first tick

    loop {
        tokio::select! {
            biased;
            _ = shutdown.cancelled() => break,
            _ = ticker.tick() => {
                let evicted = shared.evict_expired(Instant::now());
                if evicted > 0 {
                    debug!(evicted, remaining = shared.entries.len(), "Swept expired resources");
                }
            }
        }
    }

    debug!("Resource cache sweep stopped");
}
