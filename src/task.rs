//! Asynchronous helpers around a [`LoadingCache`].
//!
//! Neither the cache nor its stores spawn anything on their own. These
//! helpers let a tokio application move loads off the calling task and drive
//! expiration sweeps, with the caller owning every spawned task.

use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::debug;

use crate::cache::LoadingCache;
use crate::error::{CacheError, CacheResult};
use crate::key::CacheKey;

/// Handle to a cache lookup running on tokio's blocking pool.
///
/// There is no cancellation: a timed-out wait leaves the lookup running and
/// the handle can be waited on again.
#[derive(Debug)]
pub struct LoadTask<V> {
    handle: Option<JoinHandle<CacheResult<V>>>,
}

impl<V: Send + 'static> LoadTask<V> {
    /// Whether the lookup has finished (or its result was already taken).
    pub fn is_done(&self) -> bool {
        self.handle.as_ref().map_or(true, |h| h.is_finished())
    }

    /// Wait for the result.
    pub async fn wait(mut self) -> CacheResult<V> {
        self.take_result().await
    }

    /// Wait for at most `timeout`. On [`CacheError::Timeout`] the task keeps
    /// running and this handle stays usable.
    pub async fn wait_timeout(&mut self, timeout: Duration) -> CacheResult<V> {
        let handle = self
            .handle
            .as_mut()
            .ok_or_else(|| CacheError::Task("result already taken".to_string()))?;

        match tokio::time::timeout(timeout, handle).await {
            Ok(joined) => {
                self.handle = None;
                flatten(joined)
            }
            Err(_) => Err(CacheError::Timeout(timeout)),
        }
    }

    async fn take_result(&mut self) -> CacheResult<V> {
        match self.handle.take() {
            Some(handle) => flatten(handle.await),
            None => Err(CacheError::Task("result already taken".to_string())),
        }
    }
}

fn flatten<V>(joined: Result<CacheResult<V>, tokio::task::JoinError>) -> CacheResult<V> {
    joined.map_err(|err| CacheError::Task(err.to_string()))?
}

impl<K, V> LoadingCache<K, V>
where
    K: CacheKey + Clone + Send + 'static,
    V: Clone + Send + 'static,
{
    /// Run [`get`](LoadingCache::get) on the blocking pool.
    ///
    /// Must be called from within a tokio runtime.
    pub fn get_async(&self, key: K) -> LoadTask<V> {
        let cache = self.clone();
        LoadTask {
            handle: Some(tokio::task::spawn_blocking(move || cache.get(&key))),
        }
    }
}

/// Spawn a task that calls `remove_expired(false)` every `interval`.
///
/// The returned handle owns the sweeper; abort it to stop sweeping. The
/// cache's minimum sweep interval still applies to each tick.
pub fn spawn_sweeper<K, V>(cache: LoadingCache<K, V>, interval: Duration) -> CacheResult<JoinHandle<()>>
where
    K: Send + 'static,
    V: Send + 'static,
{
    if interval.is_zero() {
        return Err(CacheError::InvalidArgument(
            "sweep interval must be non-zero".to_string(),
        ));
    }

    Ok(tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        loop {
            ticker.tick().await;
            let removed = cache.remove_expired(false);
            if removed > 0 {
                debug!(removed, "sweeper removed expired entries");
            }
        }
    }))
}
