use super::{OracleError, OracleRequest, OracleSuggestion, SelectorOracle};
use crate::config::OracleConfig;
use async_trait::async_trait;
use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as BASE64;
use std::time::Duration;
use tracing::debug;

/// Talks to a selector-suggestion service over plain JSON-POST.
///
/// The screenshot travels base64-encoded in the request body. The reply
/// must carry a non-empty `selector`; an optional `confidence` field is
/// passed along for logging only.
pub struct HttpOracle {
    client: reqwest::Client,
    endpoint: String,
    api_key: Option<String>,
    timeout: Duration,
}

impl HttpOracle {
    /// Build from config, reading the API key from the environment
    /// variable the config names. Returns `None` when no endpoint is
    /// configured, which disables the oracle tier entirely.
    pub fn from_config(config: &OracleConfig) -> Option<Self> {
        let endpoint = config.endpoint.clone()?;
        let api_key = std::env::var(&config.api_key_env).ok();
        if api_key.is_none() {
            debug!(
                "No API key in ${}, oracle requests go out unauthenticated",
                config.api_key_env
            );
        }
        Some(HttpOracle {
            client: reqwest::Client::new(),
            endpoint,
            api_key,
            timeout: Duration::from_millis(config.timeout_ms),
        })
    }
}

#[async_trait]
impl SelectorOracle for HttpOracle {
    async fn suggest(&self, request: OracleRequest) -> Result<OracleSuggestion, OracleError> {
        let body = serde_json::json!({
            "screenshot": BASE64.encode(&request.screenshot),
            "dom_snapshot": request.dom_snapshot,
            "failed_selector": request.failed_selector,
            "action_description": request.action_description,
            "page_url": request.page_url,
        });

        debug!(
            "Asking oracle at {} about '{}'",
            self.endpoint, request.failed_selector
        );

        let mut post = self
            .client
            .post(&self.endpoint)
            .json(&body)
            .timeout(self.timeout);
        if let Some(key) = &self.api_key {
            post = post.bearer_auth(key);
        }

        let response = post.send().await?.error_for_status()?;
        let suggestion: OracleSuggestion = response.json().await?;

        if suggestion.selector.trim().is_empty() {
            return Err(OracleError::BadReply("empty selector".to_string()));
        }
        Ok(suggestion)
    }
}
