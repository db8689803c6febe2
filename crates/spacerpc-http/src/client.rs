//! The Space client facade, backed by `reqwest`.
//!
//! Submission and result streaming are hard paths: transport failures and
//! protocol violations (a missing or non-string `event_id`, an unreadable
//! body) surface as errors. Replica resolution is best-effort glue — when it
//! fails, the client falls back to the load-balanced host.

use std::collections::HashMap;
use std::sync::{Arc, OnceLock};
use std::time::Duration;

use futures::StreamExt;
use serde::de::DeserializeOwned;
use serde_json::{json, Value};

use spacerpc_core::error::ClientError;
use spacerpc_core::resolver::{ByteChunkStream, ReplicaResolver};
use spacerpc_core::space::{space_host, SpaceId};
use spacerpc_core::sse::decode_event_stream;

use crate::metrics::HttpMetricsSource;

/// Configuration for [`SpaceClient`].
#[derive(Debug, Clone)]
pub struct SpaceClientConfig {
    /// Base URL of the metrics API.
    pub api_base: String,
    /// Domain Spaces are served under.
    pub space_domain: String,
    /// Headers sent on every metrics request (e.g. an auth token).
    pub default_headers: HashMap<String, String>,
    /// Timeout for submission requests. Result streams intentionally carry
    /// no timeout: a job may legitimately run for minutes.
    pub submit_timeout: Duration,
}

impl Default for SpaceClientConfig {
    fn default() -> Self {
        Self {
            api_base: "https://api.hf.space".to_string(),
            space_domain: "hf.space".to_string(),
            default_headers: HashMap::new(),
            submit_timeout: Duration::from_secs(30),
        }
    }
}

/// Client for one Space host.
///
/// Obtain one with [`SpaceClient::connect`] (replica-routed) or
/// [`SpaceClient::new`] (explicit host).
pub struct SpaceClient {
    host: String,
    http: reqwest::Client,
    submit_timeout: Duration,
}

impl SpaceClient {
    /// Create a client for an explicit host URL.
    pub fn new(host: impl Into<String>) -> Self {
        Self::with_config(host, &SpaceClientConfig::default())
    }

    /// Create a client for an explicit host URL with custom configuration.
    pub fn with_config(host: impl Into<String>, config: &SpaceClientConfig) -> Self {
        let http = reqwest::Client::builder()
            .build()
            .expect("failed to build reqwest client");
        Self {
            host: host.into(),
            http,
            submit_timeout: config.submit_timeout,
        }
    }

    /// Connect to a Space identified as `owner/resource`, routing to a
    /// resolved replica when one is available. Uses the process-wide
    /// [`default_resolver`], so the replica cache amortizes across every
    /// `connect` call with default configuration.
    pub async fn connect(space: &str) -> Result<Self, ClientError> {
        let config = SpaceClientConfig::default();
        Self::connect_with(space, &config, default_resolver()).await
    }

    /// Connect using a shared resolver, so the replica cache spans multiple
    /// connections from the same process.
    pub async fn connect_with(
        space: &str,
        config: &SpaceClientConfig,
        resolver: &ReplicaResolver,
    ) -> Result<Self, ClientError> {
        let id: SpaceId = space.parse()?;
        let replica = resolver
            .resolve(&id.owner, &id.resource, &HashMap::new())
            .await;
        let host = space_host(
            &config.space_domain,
            &id.owner,
            &id.resource,
            replica.as_deref(),
        );
        tracing::info!(space = %id, host = %host, "connected to space");
        Ok(Self::with_config(host, config))
    }

    /// The host URL this client routes calls to.
    pub fn host(&self) -> &str {
        &self.host
    }

    /// Submit input data to an endpoint and return the job handle.
    pub async fn submit(&self, endpoint: &str, data: Vec<Value>) -> Result<String, ClientError> {
        let url = format!("{}/call{}", self.host, endpoint);
        let response = self
            .http
            .post(&url)
            .timeout(self.submit_timeout)
            .json(&json!({ "data": data }))
            .send()
            .await
            .map_err(|e| ClientError::Http(e.to_string()))?;

        let status = response.status();
        tracing::debug!(url = %url, status = %status, "submitted job");
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ClientError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let envelope: Value = response
            .json()
            .await
            .map_err(|e| ClientError::Http(e.to_string()))?;
        parse_event_id(&envelope)
    }

    /// Stream the result of a submitted job: wait for the `complete` event
    /// and JSON-decode its payload.
    pub async fn stream<T: DeserializeOwned>(
        &self,
        endpoint: &str,
        event_id: &str,
    ) -> Result<T, ClientError> {
        let url = format!("{}/call{}/{}", self.host, endpoint, event_id);
        let response = self
            .http
            .get(&url)
            .send()
            .await
            .map_err(|e| ClientError::Http(e.to_string()))?;

        let status = response.status();
        tracing::debug!(url = %url, status = %status, "streaming job result");
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ClientError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let body: ByteChunkStream = Box::pin(response.bytes_stream().map(|chunk| {
            chunk
                .map(|bytes| bytes.to_vec())
                .map_err(|e| ClientError::StreamUnreadable(e.to_string()))
        }));
        let events = decode_event_stream(body, "complete", 1).await?;
        let payload = events.into_iter().next().ok_or(ClientError::MissingEvent {
            event: "complete".to_string(),
        })?;
        serde_json::from_str(&payload).map_err(ClientError::from)
    }

    /// Submit and stream in one call.
    pub async fn predict<T: DeserializeOwned>(
        &self,
        endpoint: &str,
        data: Vec<Value>,
    ) -> Result<T, ClientError> {
        let event_id = self.submit(endpoint, data).await?;
        self.stream(endpoint, &event_id).await
    }

    /// Fetch a file served by the Space. The response is passed through
    /// untouched; the caller decides how to consume the body.
    pub async fn download(&self, path: &str) -> Result<reqwest::Response, ClientError> {
        self.http
            .get(format!("{}/file={}", self.host, path))
            .send()
            .await
            .map_err(|e| ClientError::Http(e.to_string()))
    }
}

/// Build a replica resolver backed by the HTTP metrics endpoint from
/// `config`.
pub fn resolver_for(config: &SpaceClientConfig) -> ReplicaResolver {
    ReplicaResolver::new(Arc::new(HttpMetricsSource::new(
        config.api_base.clone(),
        config.default_headers.clone(),
    )))
}

/// The process-wide resolver behind [`SpaceClient::connect`], built lazily
/// from the default configuration. Its replica cache lives for the process,
/// so consecutive connects within the TTL reuse one metrics round-trip.
pub fn default_resolver() -> &'static ReplicaResolver {
    static DEFAULT_RESOLVER: OnceLock<ReplicaResolver> = OnceLock::new();
    DEFAULT_RESOLVER.get_or_init(|| resolver_for(&SpaceClientConfig::default()))
}

/// Extract the job handle from a submission response envelope.
///
/// The contract requires a string `event_id`; anything else (absent field,
/// number, null) is a protocol violation, never coerced.
fn parse_event_id(envelope: &Value) -> Result<String, ClientError> {
    match envelope.get("event_id") {
        Some(Value::String(id)) => Ok(id.clone()),
        Some(other) => Err(ClientError::InvalidEventId(other.clone())),
        None => Err(ClientError::InvalidEventId(Value::Null)),
    }
}
