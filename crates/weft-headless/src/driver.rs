use std::time::{Duration, Instant};

use async_trait::async_trait;
use serde_json::{Value, json};
use tracing::{debug, info};
use weft_engine::{DriverError, PageDriver};

use crate::cdp::CdpClient;
use crate::eval::{call_helper, eval_expression};

const WAIT_POLL_INTERVAL: Duration = Duration::from_millis(100);

/// `PageDriver` backed by a real Chromium.
pub struct HeadlessDriver {
    client: Option<CdpClient>,
}

impl HeadlessDriver {
    pub fn new() -> Self {
        Self { client: None }
    }

    fn page(&self) -> Result<&chromiumoxide::Page, DriverError> {
        self.client
            .as_ref()
            .map(|c| &c.page)
            .ok_or(DriverError::NotReady)
    }

    /// Run one helper op, returning its `value` on success and the
    /// page-side message on failure.
    async fn run_op(&self, params: Value) -> Result<Value, DriverError> {
        let page = self.page()?;
        let reply = call_helper(page, params)
            .await
            .map_err(|e| DriverError::Other(e.to_string()))?;

        if reply.get("ok").and_then(Value::as_bool) == Some(true) {
            return Ok(reply.get("value").cloned().unwrap_or(Value::Null));
        }
        let message = reply
            .get("error")
            .and_then(Value::as_str)
            .unwrap_or("malformed helper reply")
            .to_string();
        Err(DriverError::Other(message))
    }

    async fn action_op(
        &self,
        op: &str,
        selector: &str,
        value: Option<&str>,
    ) -> Result<(), DriverError> {
        let mut params = json!({ "op": op, "selector": selector });
        if let Some(value) = value {
            params["value"] = Value::String(value.to_string());
        }
        self.run_op(params).await.map(|_| ()).map_err(|e| match e {
            DriverError::NotReady => DriverError::NotReady,
            other => DriverError::Action {
                selector: selector.to_string(),
                message: other.to_string(),
            },
        })
    }

    async fn query_op(&self, op: &str, selector: &str) -> Result<Value, DriverError> {
        self.run_op(json!({ "op": op, "selector": selector }))
            .await
            .map_err(|e| match e {
                DriverError::NotReady => DriverError::NotReady,
                other => DriverError::Query {
                    selector: selector.to_string(),
                    message: other.to_string(),
                },
            })
    }
}

impl Default for HeadlessDriver {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl PageDriver for HeadlessDriver {
    async fn launch(&mut self, headless: bool) -> Result<(), DriverError> {
        info!("Launching Chromium driver...");
        let client = CdpClient::launch(headless)
            .await
            .map_err(|e| DriverError::Other(e.to_string()))?;
        self.client = Some(client);
        Ok(())
    }

    async fn close(&mut self) -> Result<(), DriverError> {
        if let Some(client) = self.client.take() {
            client
                .close()
                .await
                .map_err(|e| DriverError::Other(e.to_string()))?;
        }
        Ok(())
    }

    fn is_ready(&self) -> bool {
        self.client.is_some()
    }

    async fn goto(&mut self, url: &str) -> Result<(), DriverError> {
        let page = self.page()?;
        info!("Navigating to: {}", url);
        page.goto(url)
            .await
            .map_err(|e| DriverError::Navigation(e.to_string()))?;
        page.wait_for_navigation()
            .await
            .map_err(|e| DriverError::Navigation(e.to_string()))?;
        Ok(())
    }

    async fn current_url(&mut self) -> Result<String, DriverError> {
        let page = self.page()?;
        let url = page
            .url()
            .await
            .map_err(|e| DriverError::Navigation(e.to_string()))?
            .unwrap_or_default();
        Ok(url)
    }

    async fn click(&mut self, selector: &str) -> Result<(), DriverError> {
        self.action_op("click", selector, None).await
    }

    async fn fill(&mut self, selector: &str, value: &str) -> Result<(), DriverError> {
        self.action_op("fill", selector, Some(value)).await
    }

    async fn type_text(&mut self, selector: &str, value: &str) -> Result<(), DriverError> {
        self.action_op("type", selector, Some(value)).await
    }

    async fn clear(&mut self, selector: &str) -> Result<(), DriverError> {
        self.action_op("clear", selector, None).await
    }

    async fn wait_for(&mut self, selector: &str, timeout: Duration) -> Result<(), DriverError> {
        let deadline = Instant::now() + timeout;
        loop {
            match self.query_op("is_visible", selector).await {
                Ok(Value::Bool(true)) => return Ok(()),
                Ok(_) => {}
                // Keep polling through transient evaluation failures; the
                // deadline still bounds the wait.
                Err(e) => debug!("wait_for probe failed on '{}': {}", selector, e),
            }
            if Instant::now() >= deadline {
                return Err(DriverError::Timeout(timeout));
            }
            tokio::time::sleep(WAIT_POLL_INTERVAL).await;
        }
    }

    async fn count(&mut self, selector: &str) -> Result<u32, DriverError> {
        let value = self.query_op("count", selector).await?;
        Ok(value.as_u64().unwrap_or(0) as u32)
    }

    async fn is_visible(&mut self, selector: &str) -> Result<bool, DriverError> {
        let value = self.query_op("is_visible", selector).await?;
        Ok(value.as_bool().unwrap_or(false))
    }

    async fn is_enabled(&mut self, selector: &str) -> Result<bool, DriverError> {
        let value = self.query_op("is_enabled", selector).await?;
        Ok(value.as_bool().unwrap_or(false))
    }

    async fn text_content(&mut self, selector: &str) -> Result<String, DriverError> {
        let value = self.query_op("text", selector).await?;
        Ok(value.as_str().unwrap_or_default().to_string())
    }

    async fn screenshot(&mut self) -> Result<Vec<u8>, DriverError> {
        let page = self.page()?;
        let bytes = page
            .screenshot(chromiumoxide::page::ScreenshotParams::builder().build())
            .await
            .map_err(|e| DriverError::Other(format!("Screenshot failed: {}", e)))?;
        Ok(bytes)
    }

    async fn evaluate(&mut self, script: &str) -> Result<Value, DriverError> {
        let page = self.page()?;
        eval_expression(page, script)
            .await
            .map_err(|e| DriverError::Other(e.to_string()))
    }
}
