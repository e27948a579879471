//! Browser abstraction the interpreter and resolver run against.
//!
//! Production code drives a real browser through `weft-headless`; tests
//! substitute scripted fakes. Drivers report element-level failures as
//! errors so the resolver can treat each attempt as pass/fail without
//! inspecting driver internals.

use async_trait::async_trait;
use std::time::Duration;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum DriverError {
    #[error("Driver not ready, call launch() first")]
    NotReady,

    #[error("Navigation failed: {0}")]
    Navigation(String),

    #[error("Action failed on '{selector}': {message}")]
    Action { selector: String, message: String },

    #[error("Query failed on '{selector}': {message}")]
    Query { selector: String, message: String },

    #[error("Verification failed on '{selector}': {check}")]
    Verification { selector: String, check: String },

    #[error("Timed out after {0:?}")]
    Timeout(Duration),

    #[error("Operation not supported by this driver: {0}")]
    NotSupported(String),

    #[error("Serialization error: {0}")]
    Serde(#[from] serde_json::Error),

    #[error("{0}")]
    Other(String),
}

/// A page a flow can act on.
///
/// Selector-taking methods succeed only when the selector resolves to a
/// usable element; anything else is an `Err`, which the resolver counts
/// as a failed attempt for that tier.
#[async_trait]
pub trait PageDriver: Send {
    async fn launch(&mut self, headless: bool) -> Result<(), DriverError>;

    async fn close(&mut self) -> Result<(), DriverError>;

    fn is_ready(&self) -> bool;

    async fn goto(&mut self, url: &str) -> Result<(), DriverError>;

    async fn current_url(&mut self) -> Result<String, DriverError>;

    async fn click(&mut self, selector: &str) -> Result<(), DriverError>;

    /// Set the field's value in one shot, replacing what was there.
    async fn fill(&mut self, selector: &str, value: &str) -> Result<(), DriverError>;

    /// Type into the field key by key, appending to its content.
    async fn type_text(&mut self, selector: &str, value: &str) -> Result<(), DriverError>;

    async fn clear(&mut self, selector: &str) -> Result<(), DriverError>;

    /// Block until the selector matches a visible element or the timeout
    /// elapses.
    async fn wait_for(&mut self, selector: &str, timeout: Duration) -> Result<(), DriverError>;

    async fn count(&mut self, selector: &str) -> Result<u32, DriverError>;

    async fn is_visible(&mut self, selector: &str) -> Result<bool, DriverError>;

    async fn is_enabled(&mut self, selector: &str) -> Result<bool, DriverError>;

    /// Combined text content of the first matching element.
    async fn text_content(&mut self, selector: &str) -> Result<String, DriverError>;

    /// PNG bytes of the current viewport.
    async fn screenshot(&mut self) -> Result<Vec<u8>, DriverError>;

    /// Evaluate a script in the page and return its JSON result. Drivers
    /// without a scripting channel keep the default.
    async fn evaluate(&mut self, _script: &str) -> Result<serde_json::Value, DriverError> {
        Err(DriverError::NotSupported("evaluate".to_string()))
    }
}
