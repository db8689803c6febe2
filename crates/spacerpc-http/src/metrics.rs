//! HTTP-backed metrics source.

use std::collections::HashMap;

use async_trait::async_trait;
use futures::StreamExt;

use spacerpc_core::error::ClientError;
use spacerpc_core::resolver::{ByteChunkStream, MetricsSource};
use spacerpc_core::space::metrics_url;

/// Opens the live-metrics event stream of a Space over HTTPS.
///
/// Default headers (e.g. an auth token) apply to every request; per-call
/// extra headers override them on key collision.
pub struct HttpMetricsSource {
    http: reqwest::Client,
    api_base: String,
    default_headers: HashMap<String, String>,
}

impl HttpMetricsSource {
    pub fn new(api_base: impl Into<String>, default_headers: HashMap<String, String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            api_base: api_base.into(),
            default_headers,
        }
    }
}

#[async_trait]
impl MetricsSource for HttpMetricsSource {
    async fn open(
        &self,
        owner: &str,
        resource: &str,
        extra_headers: &HashMap<String, String>,
    ) -> Result<ByteChunkStream, ClientError> {
        let url = metrics_url(&self.api_base, owner, resource);

        let mut headers = self.default_headers.clone();
        headers.extend(
            extra_headers
                .iter()
                .map(|(k, v)| (k.clone(), v.clone())),
        );

        let mut request = self.http.get(&url);
        for (name, value) in &headers {
            request = request.header(name.as_str(), value.as_str());
        }

        let response = request
            .send()
            .await
            .map_err(|e| ClientError::Http(e.to_string()))?;

        let status = response.status();
        tracing::debug!(url = %url, status = %status, "opened metrics stream");
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ClientError::Status {
                status: status.as_u16(),
                body,
            });
        }

        Ok(Box::pin(response.bytes_stream().map(|chunk| {
            chunk
                .map(|bytes| bytes.to_vec())
                .map_err(|e| ClientError::StreamUnreadable(e.to_string()))
        })))
    }
}
