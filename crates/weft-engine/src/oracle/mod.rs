//! The last-resort selector tier.
//!
//! When a step's own selector and every learned replacement have failed,
//! the resolver sends the current page state to an external vision
//! service and asks for one candidate selector. The oracle is consulted
//! at most once per step and its answer is never retried.

mod http;
mod snapshot;

pub use http::HttpOracle;
pub use snapshot::DOM_SNAPSHOT_JS;

use async_trait::async_trait;
use serde::Deserialize;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum OracleError {
    #[error("No oracle endpoint configured")]
    NotConfigured,

    #[error("Oracle request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Oracle reply unusable: {0}")]
    BadReply(String),

    #[error("Could not capture page state: {0}")]
    Snapshot(String),
}

/// Everything the oracle needs to pick an element: what the page looks
/// like, what it contains, and what the flow was trying to do.
#[derive(Debug, Clone)]
pub struct OracleRequest {
    /// Raw PNG bytes of the current viewport.
    pub screenshot: Vec<u8>,
    /// Simplified JSON outline of the DOM, from [`DOM_SNAPSHOT_JS`].
    pub dom_snapshot: String,
    pub failed_selector: String,
    pub action_description: String,
    pub page_url: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct OracleSuggestion {
    pub selector: String,
    #[serde(default)]
    pub confidence: f64,
}

#[async_trait]
pub trait SelectorOracle: Send + Sync {
    async fn suggest(&self, request: OracleRequest) -> Result<OracleSuggestion, OracleError>;
}
