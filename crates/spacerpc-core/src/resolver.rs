//! Replica resolution with a TTL cache.
//!
//! Spaces sit behind a load-balanced front with several backend replicas.
//! The resolver samples the live-metrics event stream, picks one reported
//! replica uniformly at random, and caches the choice for a bounded window
//! so repeated connections from the same process skip the metrics
//! round-trip and keep hitting the same backend.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use futures::stream::BoxStream;
use rand::Rng;
use serde_json::Value;

use crate::error::ClientError;
use crate::sse::decode_event_stream;

/// Incrementally delivered body chunks from a metrics endpoint.
pub type ByteChunkStream = BoxStream<'static, Result<Vec<u8>, ClientError>>;

/// Source of live replica metrics for a Space.
///
/// Implementations open the metrics event stream for `(owner, resource)`,
/// merging the caller's extra headers over any process-wide defaults
/// (caller wins on collision). A non-success response is an `Err` at this
/// seam; the resolver absorbs it.
#[async_trait]
pub trait MetricsSource: Send + Sync + 'static {
    async fn open(
        &self,
        owner: &str,
        resource: &str,
        extra_headers: &HashMap<String, String>,
    ) -> Result<ByteChunkStream, ClientError>;
}

/// Time source, injectable so cache expiry is deterministic in tests.
pub trait Clock: Send + Sync + 'static {
    fn now(&self) -> Instant;
}

/// Wall-clock-backed default.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Instant {
        Instant::now()
    }
}

/// How long a selected replica stays trusted before the next resolution
/// re-samples the metrics stream.
pub const REPLICA_TTL: Duration = Duration::from_secs(30);

/// Number of `metric` events sampled per resolution.
const METRIC_SAMPLE_COUNT: usize = 3;

struct CacheEntry {
    replica: String,
    expires_at: Instant,
}

/// Picks a replica for a Space and caches the choice per `(owner, resource)`.
pub struct ReplicaResolver {
    source: Arc<dyn MetricsSource>,
    cache: Mutex<HashMap<String, CacheEntry>>,
    ttl: Duration,
    clock: Box<dyn Clock>,
}

impl ReplicaResolver {
    /// Build a resolver over the given metrics source with the wall clock.
    pub fn new(source: Arc<dyn MetricsSource>) -> Self {
        Self::with_clock(source, Box::new(SystemClock))
    }

    /// Build a resolver with an injected clock.
    pub fn with_clock(source: Arc<dyn MetricsSource>, clock: Box<dyn Clock>) -> Self {
        Self {
            source,
            cache: Mutex::new(HashMap::new()),
            ttl: REPLICA_TTL,
            clock,
        }
    }

    /// Resolve a replica address for `(owner, resource)`.
    ///
    /// Best-effort: every failure mode (transport error, malformed metrics,
    /// empty candidate set, missing `replica` field) is logged and collapses
    /// to `None`, so callers can fall back to un-routed addressing.
    ///
    /// The cache lock is never held across an await. Concurrent resolutions
    /// for distinct keys never block each other; two concurrent misses on
    /// the same key may both hit the network, and the last write wins.
    pub async fn resolve(
        &self,
        owner: &str,
        resource: &str,
        extra_headers: &HashMap<String, String>,
    ) -> Option<String> {
        let key = format!("{owner}-{resource}");

        if let Some(replica) = self.lookup(&key) {
            tracing::debug!(key = %key, replica = %replica, "replica cache hit");
            return Some(replica);
        }

        match self.sample(owner, resource, extra_headers).await {
            Ok(replica) => {
                tracing::info!(key = %key, replica = %replica, "selected replica");
                self.store(key, replica.clone());
                Some(replica)
            }
            Err(e) => {
                tracing::warn!(owner, resource, error = %e, "replica resolution failed");
                None
            }
        }
    }

    fn lookup(&self, key: &str) -> Option<String> {
        let now = self.clock.now();
        let cache = self.cache.lock().unwrap_or_else(|e| e.into_inner());
        cache
            .get(key)
            .filter(|entry| entry.expires_at > now)
            .map(|entry| entry.replica.clone())
    }

    fn store(&self, key: String, replica: String) {
        let expires_at = self.clock.now() + self.ttl;
        let mut cache = self.cache.lock().unwrap_or_else(|e| e.into_inner());
        cache.insert(key, CacheEntry { replica, expires_at });
    }

    /// One metrics round-trip: decode up to three `metric` events, keep the
    /// payloads that parse as JSON objects, pick one uniformly at random
    /// and read its `replica` field.
    async fn sample(
        &self,
        owner: &str,
        resource: &str,
        extra_headers: &HashMap<String, String>,
    ) -> Result<String, ClientError> {
        let stream = self.source.open(owner, resource, extra_headers).await?;
        let events = decode_event_stream(stream, "metric", METRIC_SAMPLE_COUNT).await?;

        // Garbled entries are skipped, not fatal: a partial metrics stream
        // can still name a usable replica.
        let metrics: Vec<Value> = events
            .iter()
            .filter_map(|raw| serde_json::from_str::<Value>(raw).ok())
            .filter(|v| v.is_object())
            .collect();

        let unavailable = || ClientError::ReplicaUnavailable {
            owner: owner.to_string(),
            resource: resource.to_string(),
        };

        if metrics.is_empty() {
            return Err(unavailable());
        }
        let chosen = &metrics[rand::thread_rng().gen_range(0..metrics.len())];
        chosen
            .get("replica")
            .and_then(Value::as_str)
            .filter(|r| !r.is_empty())
            .map(str::to_string)
            .ok_or_else(unavailable)
    }
}
