//! Cached reads for admin screens.
//!
//! DESIGN
//! ======
//! Every screen binds to REST resources the same way: a read keyed by the
//! request path with caching options, plus writes that go straight through
//! [`ApiClient`] and then refresh the read. There is no optimistic local
//! mutation; the view always reflects the server after a write.
//!
//! Reads for the same key share one in-flight request. A read that arrives
//! while the previous one settled inside the dedupe window is answered from
//! cache without touching the network. A forced refresh supersedes any read
//! already in flight, so a refresh after a write never settles on a response
//! that was requested before the write.
//!
//! Every fetch takes a generation from one cache-wide counter. Only the fetch
//! holding an entry's current generation may record into it, which also keeps
//! reads started before [`ResourceCache::clear`] out of the new entries.
//!
//! TRADE-OFFS
//! ==========
//! Entries hold raw `serde_json::Value`s and decode on every snapshot, so two
//! screens may view the same key through different types.


use std::collections::HashMap;
use std::future::Future;
use std::marker::PhantomData;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

use futures::future::{BoxFuture, FutureExt, Shared};
use serde::de::DeserializeOwned;
use serde_json::Value;
use tokio::task::JoinHandle;
use tracing::debug;

use crate::net::api::{ApiClient, ApiError};

const DEFAULT_DEDUPE_INTERVAL: Duration = Duration::from_secs(2);

/// Cloneable read failure, shared by every reader of a deduplicated request.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
#[error("{message}")]
pub struct FetchError {
    pub status: Option<u16>,
    pub message: String,
}

impl FetchError {
    #[must_use]
    pub fn is_unauthorized(&self) -> bool {
        self.status == Some(401)
    }

    fn decode(error: &serde_json::Error) -> Self {
        Self { status: None, message: format!("unexpected response shape: {error}") }
    }
}

impl From<&ApiError> for FetchError {
    fn from(error: &ApiError) -> Self {
        Self {
            status: error.status(),
            message: error.server_message().map_or_else(|| error.to_string(), str::to_owned),
        }
    }
}

/// Caching parameters for one resource.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ResourceOptions {
    /// Repeated reads inside this window are served from the last result.
    pub dedupe_interval: Duration,
    pub revalidate_on_focus: bool,
    /// Periodic revalidation, when set.
    pub refresh_interval: Option<Duration>,
}

impl Default for ResourceOptions {
    fn default() -> Self {
        Self {
            dedupe_interval: DEFAULT_DEDUPE_INTERVAL,
            revalidate_on_focus: true,
            refresh_interval: None,
        }
    }
}

impl ResourceOptions {
    #[must_use]
    pub fn with_dedupe_interval(mut self, interval: Duration) -> Self {
        self.dedupe_interval = interval;
        self
    }

    #[must_use]
    pub fn without_focus_revalidation(mut self) -> Self {
        self.revalidate_on_focus = false;
        self
    }

    #[must_use]
    pub fn with_refresh_interval(mut self, interval: Duration) -> Self {
        self.refresh_interval = Some(interval);
        self
    }
}

/// What a screen renders from.
#[derive(Clone, Debug, PartialEq)]
pub struct ResourceState<T> {
    pub data: Option<T>,
    pub error: Option<FetchError>,
    /// A read is in flight and there is no data yet.
    pub is_loading: bool,
    /// A read is in flight.
    pub is_validating: bool,
}

impl<T> ResourceState<T> {
    fn empty() -> Self {
        Self { data: None, error: None, is_loading: false, is_validating: false }
    }
}

// =============================================================================
// CACHE
// =============================================================================

type SharedFetch = Shared<BoxFuture<'static, Result<Value, FetchError>>>;

#[derive(Default)]
struct Entry {
    value: Option<Value>,
    error: Option<FetchError>,
    settled_at: Option<Instant>,
    in_flight: Option<SharedFetch>,
    generation: u64,
}

impl Entry {
    fn is_fresh_at(&self, now: Instant, window: Duration) -> bool {
        self.settled_at
            .is_some_and(|settled| now.saturating_duration_since(settled) < window)
    }
}

type Entries = Arc<Mutex<HashMap<String, Entry>>>;

/// How a read treats the entry's current state.
#[derive(Clone, Copy, Debug)]
enum Revalidate {
    /// Join an in-flight read, or reuse a result settled inside the window.
    Dedupe(Duration),
    /// Join an in-flight read, otherwise start one.
    Join,
    /// Start a new read; anything already in flight is superseded.
    Force,
}

/// Shared cache of resource reads, keyed by request path.
#[derive(Clone)]
pub struct ResourceCache {
    api: ApiClient,
    entries: Entries,
    generations: Arc<AtomicU64>,
}

impl ResourceCache {
    pub fn new(api: ApiClient) -> Self {
        Self {
            api,
            entries: Arc::new(Mutex::new(HashMap::new())),
            generations: Arc::new(AtomicU64::new(0)),
        }
    }

    #[must_use]
    pub fn api(&self) -> &ApiClient {
        &self.api
    }

    /// Typed handle for `key`.
    pub fn resource<T: DeserializeOwned>(&self, key: impl Into<String>, options: ResourceOptions) -> Resource<T> {
        Resource { cache: self.clone(), key: key.into(), options, _marker: PhantomData }
    }

    /// Drop every cached entry. In-flight reads finish without recording.
    pub fn clear(&self) {
        lock(&self.entries).clear();
    }

    /// Read `key` under `mode`. Returns once the entry has no newer read in
    /// flight than the one this call awaited.
    async fn fetch(&self, key: &str, mode: Revalidate) {
        let mut pending = {
            let mut entries = lock(&self.entries);
            let entry = entries.entry(key.to_owned()).or_default();
            let joinable = entry.in_flight.as_ref().filter(|_| !matches!(mode, Revalidate::Force));
            if let Some(in_flight) = joinable {
                Some((entry.generation, in_flight.clone()))
            } else if matches!(mode, Revalidate::Dedupe(window) if entry.is_fresh_at(Instant::now(), window)) {
                None
            } else {
                Some(self.start_fetch(key, entry))
            }
        };

        while let Some((generation, fetch)) = pending {
            // Outcome is recorded on the entry by the fetch itself.
            let _ = fetch.await;
            pending = lock(&self.entries).get(key).and_then(|entry| {
                entry
                    .in_flight
                    .as_ref()
                    .filter(|_| entry.generation != generation)
                    .map(|newer| (entry.generation, newer.clone()))
            });
        }
    }

    fn start_fetch(&self, key: &str, entry: &mut Entry) -> (u64, SharedFetch) {
        let generation = self.generations.fetch_add(1, Ordering::Relaxed) + 1;
        entry.generation = generation;
        let api = self.api.clone();
        let entries = Arc::clone(&self.entries);
        let key = key.to_owned();

        let fetch = async move {
            debug!(%key, generation, "resource fetch");
            let result = api.get_json::<Value>(&key).await.map_err(|e| FetchError::from(&e));
            record(&entries, &key, generation, &result);
            result
        }
        .boxed()
        .shared();

        entry.in_flight = Some(fetch.clone());
        (generation, fetch)
    }

    fn state_of<T: DeserializeOwned>(&self, key: &str) -> ResourceState<T> {
        let entries = lock(&self.entries);
        let Some(entry) = entries.get(key) else {
            return ResourceState::empty();
        };

        let mut error = entry.error.clone();
        let data = entry.value.as_ref().and_then(|value| {
            serde_json::from_value::<T>(value.clone())
                .map_err(|e| error.get_or_insert_with(|| FetchError::decode(&e)))
                .ok()
        });
        let is_validating = entry.in_flight.is_some();
        ResourceState { is_loading: is_validating && data.is_none(), is_validating, data, error }
    }
}

fn lock(entries: &Entries) -> MutexGuard<'_, HashMap<String, Entry>> {
    entries.lock().unwrap_or_else(PoisonError::into_inner)
}

fn record(entries: &Entries, key: &str, generation: u64, result: &Result<Value, FetchError>) {
    let mut entries = lock(entries);
    let Some(entry) = entries.get_mut(key) else {
        return;
    };
    if entry.generation != generation {
        debug!(%key, generation, current = entry.generation, "superseded fetch discarded");
        return;
    }
    match result {
        Ok(value) => {
            entry.value = Some(value.clone());
            entry.error = None;
        }
        Err(e) => entry.error = Some(e.clone()),
    }
    entry.settled_at = Some(Instant::now());
    entry.in_flight = None;
}

// =============================================================================
// RESOURCE HANDLE
// =============================================================================

/// Typed view of one cache key.
pub struct Resource<T> {
    cache: ResourceCache,
    key: String,
    options: ResourceOptions,
    _marker: PhantomData<fn() -> T>,
}

impl<T> Clone for Resource<T> {
    fn clone(&self) -> Self {
        Self {
            cache: self.cache.clone(),
            key: self.key.clone(),
            options: self.options,
            _marker: PhantomData,
        }
    }
}

impl<T: DeserializeOwned> Resource<T> {
    #[must_use]
    pub fn key(&self) -> &str {
        &self.key
    }

    #[must_use]
    pub fn options(&self) -> ResourceOptions {
        self.options
    }

    /// Client for writes that should refresh this resource.
    #[must_use]
    pub fn api(&self) -> &ApiClient {
        self.cache.api()
    }

    /// Current snapshot without touching the network.
    #[must_use]
    pub fn state(&self) -> ResourceState<T> {
        self.cache.state_of(&self.key)
    }

    /// Read, honoring in-flight sharing and the dedupe window.
    pub async fn load(&self) -> ResourceState<T> {
        self.cache.fetch(&self.key, Revalidate::Dedupe(self.options.dedupe_interval)).await;
        self.state()
    }

    /// Force revalidation. A read already in flight is superseded and its
    /// response discarded.
    pub async fn refresh(&self) -> ResourceState<T> {
        self.cache.fetch(&self.key, Revalidate::Force).await;
        self.state()
    }

    /// The view regained focus.
    pub async fn on_focus(&self) -> ResourceState<T> {
        if self.options.revalidate_on_focus {
            return self.load().await;
        }
        self.state()
    }

    /// Await a write, then refresh this resource if it succeeded.
    ///
    /// # Errors
    ///
    /// Returns the write's error unchanged; no refresh happens in that case.
    pub async fn mutate<R, F>(&self, write: F) -> Result<R, ApiError>
    where
        F: Future<Output = Result<R, ApiError>>,
    {
        let output = write.await?;
        self.refresh().await;
        Ok(output)
    }
}

impl<T: DeserializeOwned + 'static> Resource<T> {
    /// Start periodic revalidation if a `refresh_interval` is configured.
    /// The loop stops when the returned task is dropped.
    #[must_use]
    pub fn spawn_refresh_loop(&self) -> Option<RefreshTask> {
        let period = self.options.refresh_interval?;
        let cache = self.cache.clone();
        let key = self.key.clone();
        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            ticker.tick().await;
            loop {
                ticker.tick().await;
                cache.fetch(&key, Revalidate::Join).await;
            }
        });
        Some(RefreshTask { handle })
    }
}

/// Background revalidation loop; aborted on drop.
#[derive(Debug)]
pub struct RefreshTask {
    handle: JoinHandle<()>,
}

impl Drop for RefreshTask {
    fn drop(&mut self) {
        self.handle.abort();
    }
}
