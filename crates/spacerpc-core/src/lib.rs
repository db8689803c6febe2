//! spacerpc-core — event-stream decoding and replica resolution for spacerpc.
//!
//! # Overview
//!
//! spacerpc is a lightweight client for job-queue style inference endpoints
//! (Gradio-hosted Spaces): submit input, receive a job handle, then stream
//! until the result event arrives. The core crate defines:
//!
//! - [`SseDecoder`] / [`decode_event_stream`] — incremental decoder for the
//!   `event:` / `data:` line protocol
//! - [`ReplicaResolver`] — replica selection over live metrics, with a TTL
//!   cache keyed by `(owner, resource)`
//! - [`MetricsSource`] — the seam between the resolver and any HTTP transport
//! - [`SpaceId`] and URL/slug transforms
//! - [`ClientError`] — structured error type

pub mod error;
pub mod resolver;
pub mod space;
pub mod sse;

pub use error::ClientError;
pub use resolver::{
    ByteChunkStream, Clock, MetricsSource, ReplicaResolver, SystemClock, REPLICA_TTL,
};
pub use space::{metrics_url, slugify, space_host, SpaceId};
pub use sse::{decode_event_stream, SseDecoder};
