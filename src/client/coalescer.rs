//! # Request Coalescer
//!
//! Process-local cache that deduplicates concurrent identical requests.
//! The first caller for a key becomes the leader and runs the producer;
//! concurrent callers subscribe to a shared in-flight handle and receive
//! the leader's result instead of issuing their own call. Waits are
//! bounded; a caller whose wait elapses falls through to its own fetch.
//!
//! This boundary never returns an error: a failed fetch falls back to
//! stale-but-recent data when available, and to the default value
//! otherwise, so UI callers always receive something renderable.

use crate::core::config::ClientSettings;
use dashmap::DashMap;
use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::{Mutex, Notify, RwLock};
use tracing::{debug, warn};

/// Coalescer tuning
#[derive(Debug, Clone)]
pub struct CoalescerConfig {
    /// Freshness window; entries younger than this are served without a
    /// network call
    pub ttl: Duration,

    /// Window during which stale data may be served after a failed fetch
    pub stale_ttl: Duration,

    /// Upper bound on how long a caller waits for an in-flight fetch
    pub wait_timeout: Duration,
}

impl Default for CoalescerConfig {
    fn default() -> Self {
        Self {
            ttl: Duration::from_secs(60),
            stale_ttl: Duration::from_secs(3600),
            wait_timeout: Duration::from_secs(5),
        }
    }
}

impl From<ClientSettings> for CoalescerConfig {
    fn from(settings: ClientSettings) -> Self {
        Self {
            ttl: settings.ttl,
            stale_ttl: settings.stale_ttl,
            wait_timeout: settings.wait_timeout,
        }
    }
}

struct CachedSlot<T> {
    data: T,
    stored_at: Instant,
}

/// Shared handle for one in-flight fetch. The leader publishes into
/// `result` and then notifies; followers subscribe instead of polling.
struct InFlight<T> {
    done: Notify,
    result: RwLock<Option<T>>,
}

impl<T> InFlight<T> {
    fn new() -> Self {
        Self {
            done: Notify::new(),
            result: RwLock::new(None),
        }
    }
}

enum Role<T> {
    Leader(Arc<InFlight<T>>),
    Follower(Arc<InFlight<T>>),
}

/// Per-process request coalescer keyed by request key.
///
/// State is constructor-injected: create one per process and pass it by
/// reference to whatever needs it.
pub struct RequestCoalescer<T> {
    config: CoalescerConfig,
    entries: DashMap<String, CachedSlot<T>>,
    in_flight: Mutex<HashMap<String, Arc<InFlight<T>>>>,
}

impl<T> RequestCoalescer<T>
where
    T: Clone + Default + Send + Sync + 'static,
{
    pub fn new(config: CoalescerConfig) -> Self {
        Self {
            config,
            entries: DashMap::new(),
            in_flight: Mutex::new(HashMap::new()),
        }
    }

    /// Fetch the value for `key`, coalescing with any identical in-flight
    /// request. At most one producer call per key is in flight at a time
    /// from this process.
    pub async fn fetch<F, Fut, E>(&self, key: &str, producer: F) -> T
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: std::fmt::Display,
    {
        let role = {
            let mut in_flight = self.in_flight.lock().await;
            match in_flight.get(key) {
                Some(handle) => Role::Follower(handle.clone()),
                None => {
                    // fresh entry and nothing in flight: no network call
                    if let Some(slot) = self.entries.get(key) {
                        if slot.stored_at.elapsed() < self.config.ttl {
                            return slot.data.clone();
                        }
                    }
                    let handle = Arc::new(InFlight::new());
                    in_flight.insert(key.to_string(), handle.clone());
                    Role::Leader(handle)
                }
            }
        };

        match role {
            Role::Leader(handle) => self.lead(key, producer, handle).await,
            Role::Follower(handle) => self.follow(key, producer, handle).await,
        }
    }

    /// Run the producer and publish the outcome. The in-flight handle is
    /// cleared on success and failure alike; otherwise the key would be
    /// stuck "fetching" forever.
    async fn lead<F, Fut, E>(&self, key: &str, producer: F, handle: Arc<InFlight<T>>) -> T
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: std::fmt::Display,
    {
        let outcome = producer().await;

        let value = match outcome {
            Ok(data) => {
                self.entries.insert(
                    key.to_string(),
                    CachedSlot {
                        data: data.clone(),
                        stored_at: Instant::now(),
                    },
                );
                Some(data)
            }
            Err(e) => {
                warn!("Fetch failed for {}: {}", key, e);
                None
            }
        };

        *handle.result.write().await = value.clone();
        self.in_flight.lock().await.remove(key);
        handle.done.notify_waiters();

        match value {
            Some(data) => data,
            None => self.stale_or_default(key),
        }
    }

    /// Wait (bounded) for the leader's result; fall through to our own
    /// fetch if the leader fails or the wait elapses.
    async fn follow<F, Fut, E>(&self, key: &str, producer: F, handle: Arc<InFlight<T>>) -> T
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: std::fmt::Display,
    {
        let notified = handle.done.notified();
        tokio::pin!(notified);
        // register interest before checking the result, so a publish that
        // lands in between still wakes us
        notified.as_mut().enable();

        if let Some(data) = handle.result.read().await.clone() {
            return data;
        }

        if tokio::time::timeout(self.config.wait_timeout, notified)
            .await
            .is_err()
        {
            debug!("Wait for in-flight fetch of {} timed out", key);
        }
        if let Some(data) = handle.result.read().await.clone() {
            return data;
        }

        // the leader failed or never finished within the bound
        match producer().await {
            Ok(data) => {
                self.entries.insert(
                    key.to_string(),
                    CachedSlot {
                        data: data.clone(),
                        stored_at: Instant::now(),
                    },
                );
                data
            }
            Err(e) => {
                warn!("Fetch failed for {}: {}", key, e);
                self.stale_or_default(key)
            }
        }
    }

    fn stale_or_default(&self, key: &str) -> T {
        if let Some(slot) = self.entries.get(key) {
            if slot.stored_at.elapsed() < self.config.stale_ttl {
                warn!("Serving stale data for {} after failed fetch", key);
                return slot.data.clone();
            }
        }
        T::default()
    }

    /// Number of cached entries, for diagnostics.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
