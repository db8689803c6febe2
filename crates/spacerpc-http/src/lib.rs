//! spacerpc-http — reqwest-backed facade over the spacerpc core.
//!
//! # Quick start
//! ```rust,no_run
//! use spacerpc_http::SpaceClient;
//!
//! # async fn demo() -> Result<(), spacerpc_core::ClientError> {
//! let client = SpaceClient::connect("black-forest-labs/FLUX.1-schnell").await?;
//! let result: Vec<serde_json::Value> = client
//!     .predict("/infer", vec!["An image of a cat".into(), 0.into()])
//!     .await?;
//! # Ok(())
//! # }
//! ```

pub mod client;
pub mod metrics;

pub use client::{default_resolver, resolver_for, SpaceClient, SpaceClientConfig};
pub use metrics::HttpMetricsSource;
