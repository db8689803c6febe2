//! Client-level error types.

use thiserror::Error;

/// Errors that can occur while talking to a Space.
///
/// Replica resolution failures never appear here: the resolver absorbs
/// them and reports absence instead, so callers can fall back to the
/// un-routed host.
#[derive(Debug, Error)]
pub enum ClientError {
    /// HTTP request failed before a response arrived (connection refused,
    /// DNS failure, etc.).
    #[error("HTTP error: {0}")]
    Http(String),

    /// The server answered with a non-success status where success is
    /// required (submission, result streaming).
    #[error("HTTP {status}: {body}")]
    Status { status: u16, body: String },

    /// The response body could not be consumed incrementally.
    #[error("response body is not readable: {0}")]
    StreamUnreadable(String),

    /// The submission response carried no string `event_id`.
    #[error("invalid event_id in submission response: {0}")]
    InvalidEventId(serde_json::Value),

    /// The result stream ended before the expected event arrived.
    #[error("stream ended before a `{event}` event arrived")]
    MissingEvent { event: String },

    /// Live metrics contained no usable replica candidate. Absorbed by the
    /// resolver; callers only ever observe the absence.
    #[error("no replica found in metrics for {owner}/{resource}")]
    ReplicaUnavailable { owner: String, resource: String },

    /// A string did not parse as an `owner/resource` space id.
    #[error("invalid space id `{0}`: expected `owner/resource`")]
    InvalidSpaceId(String),

    /// Response could not be deserialized.
    #[error("deserialization error: {0}")]
    Deserialization(#[from] serde_json::Error),
}

impl ClientError {
    /// Returns `true` if this error indicates a contract breach by the
    /// remote service rather than a transport problem.
    pub fn is_protocol_violation(&self) -> bool {
        matches!(
            self,
            Self::InvalidEventId(_) | Self::MissingEvent { .. } | Self::StreamUnreadable(_)
        )
    }
}
