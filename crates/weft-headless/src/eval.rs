//! JavaScript evaluation with the failure modes of a live page handled:
//! dialogs that block the JS thread, and execution contexts torn down
//! mid-navigation.

use chromiumoxide::Page;
use std::error::Error;
use std::future::Future;
use std::time::Duration;

use crate::js::HELPER_JS;

/// Ceiling for a single evaluation. Without it, a dialog the auto-accept
/// listener missed would block the call forever.
const EVAL_TIMEOUT: Duration = Duration::from_secs(10);

/// Maximum retries while the page is navigating and has no execution
/// context.
const MAX_CONTEXT_RETRIES: u32 = 10;

/// Delay between retries when the context is not found.
const CONTEXT_RETRY_DELAY: Duration = Duration::from_millis(100);

fn is_context_error(err: &str) -> bool {
    err.contains("Cannot find context")
        || err.contains("Execution context was destroyed")
        || err.contains("-32000")
}

/// Retry an async operation that may fail because the page is between
/// execution contexts. Non-context errors return immediately.
async fn retry_on_context_error<T, E, F, Fut>(
    operation_name: &str,
    mut operation: F,
) -> Result<T, Box<dyn Error + Send + Sync>>
where
    E: std::fmt::Display,
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
{
    let mut last_error = None;

    for attempt in 0..MAX_CONTEXT_RETRIES {
        match operation().await {
            Ok(value) => return Ok(value),
            Err(e) => {
                let err_str = e.to_string();
                if is_context_error(&err_str) {
                    tracing::debug!(
                        "{} context error (attempt {}/{}), retrying...",
                        operation_name,
                        attempt + 1,
                        MAX_CONTEXT_RETRIES
                    );
                    last_error = Some(err_str);
                    tokio::time::sleep(CONTEXT_RETRY_DELAY).await;
                    continue;
                }
                return Err(err_str.into());
            }
        }
    }

    Err(last_error
        .unwrap_or_else(|| format!("{} failed after retries", operation_name))
        .into())
}

/// Make sure `window.__weft` exists in the current context, injecting the
/// helper bundle if a navigation wiped it.
pub async fn ensure_helper(page: &Page) -> Result<(), Box<dyn Error + Send + Sync>> {
    retry_on_context_error("Helper injection", || try_ensure_helper(page)).await
}

async fn try_ensure_helper(page: &Page) -> Result<(), Box<dyn Error + Send + Sync>> {
    let is_loaded: bool = page
        .evaluate("typeof window.__weft !== 'undefined'")
        .await
        .map_err(|e| format!("Failed to check helper status: {}", e))?
        .into_value()
        .map_err(|e| format!("Failed to get bool value: {}", e))?;

    if !is_loaded {
        page.evaluate(HELPER_JS)
            .await
            .map_err(|e| format!("Failed to inject helper bundle: {}", e))?;
    }

    Ok(())
}

/// Run one `window.__weft.run` call, re-injecting the helper and retrying
/// through navigation races.
pub async fn call_helper(
    page: &Page,
    params: serde_json::Value,
) -> Result<serde_json::Value, Box<dyn Error + Send + Sync>> {
    let params_json = serde_json::to_string(&params)?;
    let expression = format!("window.__weft.run({})", params_json);

    // Trace level only: typed values may hold credentials.
    tracing::trace!("Evaluating helper call: {}", expression);

    let mut last_error = None;

    for attempt in 0..MAX_CONTEXT_RETRIES {
        ensure_helper(page).await?;

        match evaluate_with_timeout(page, &expression).await {
            Ok(value) => return Ok(value),
            Err(EvalError::Timeout) => {
                return Err(
                    "Evaluation timed out - possibly blocked by a dialog (alert/confirm/prompt)"
                        .into(),
                );
            }
            Err(EvalError::Context(err_str)) => {
                tracing::debug!(
                    "Context error during helper call (attempt {}/{}), retrying...",
                    attempt + 1,
                    MAX_CONTEXT_RETRIES
                );
                last_error = Some(err_str);
                tokio::time::sleep(CONTEXT_RETRY_DELAY).await;
            }
            Err(EvalError::Other(err_str)) => {
                return Err(format!("Evaluation failed: {}", err_str).into());
            }
        }
    }

    Err(last_error
        .unwrap_or_else(|| "Helper call failed after retries".to_string())
        .into())
}

/// Evaluate an arbitrary expression outside the helper bundle, such as
/// the oracle's page outline script.
pub async fn eval_expression(
    page: &Page,
    expression: &str,
) -> Result<serde_json::Value, Box<dyn Error + Send + Sync>> {
    retry_on_context_error("Expression evaluation", || async {
        evaluate_with_timeout(page, expression)
            .await
            .map_err(|e| match e {
                EvalError::Timeout => {
                    "Evaluation timed out - possibly blocked by a dialog (alert/confirm/prompt)"
                        .to_string()
                }
                EvalError::Context(err_str) => err_str,
                EvalError::Other(err_str) => format!("Evaluation failed: {}", err_str),
            })
    })
    .await
}

enum EvalError {
    Timeout,
    Context(String),
    Other(String),
}

async fn evaluate_with_timeout(
    page: &Page,
    expression: &str,
) -> Result<serde_json::Value, EvalError> {
    let eval_result = tokio::time::timeout(EVAL_TIMEOUT, page.evaluate(expression)).await;

    match eval_result {
        Err(_) => Err(EvalError::Timeout),
        Ok(Err(e)) => {
            let err_str = e.to_string();
            if is_context_error(&err_str) {
                Err(EvalError::Context(err_str))
            } else {
                Err(EvalError::Other(err_str))
            }
        }
        Ok(Ok(remote_object)) => remote_object
            .into_value::<serde_json::Value>()
            .map_err(|e| EvalError::Other(format!("Failed to get result: {}", e))),
    }
}
