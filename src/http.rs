//! JSON POST with retry, shared by the remote embedding and generation
//! providers.
//!
//! - HTTP 429 (rate limited) and 5xx (server error) → retry
//! - HTTP 4xx (client error, not 429) → fail immediately
//! - Network errors → retry
//! - Backoff: 1s, 2s, 4s, 8s, 16s, 32s (capped at 2^5)
//!
//! When every attempt fails the error is a
//! [`RagError::ModelUnavailable`](finrag_core::error::RagError::ModelUnavailable).

use anyhow::{bail, Result};
use std::time::Duration;

use finrag_core::error::RagError;

/// Build a client with a per-request timeout.
pub fn client(timeout_secs: u64) -> Result<reqwest::Client> {
    Ok(reqwest::Client::builder()
        .timeout(Duration::from_secs(timeout_secs))
        .build()?)
}

/// POST `body` to `url` and return the parsed JSON response.
///
/// `service` names the backend in error messages (e.g. `"Ollama"`).
pub async fn post_json_with_retry(
    client: &reqwest::Client,
    url: &str,
    bearer: Option<&str>,
    body: &serde_json::Value,
    max_retries: u32,
    service: &str,
) -> Result<serde_json::Value> {
    let mut last_err = None;

    for attempt in 0..=max_retries {
        if attempt > 0 {
            let delay = Duration::from_secs(1 << (attempt - 1).min(5));
            tracing::debug!(service, attempt, ?delay, "retrying request");
            tokio::time::sleep(delay).await;
        }

        let mut request = client
            .post(url)
            .header("Content-Type", "application/json")
            .json(body);
        if let Some(token) = bearer {
            request = request.header("Authorization", format!("Bearer {}", token));
        }

        match request.send().await {
            Ok(response) => {
                let status = response.status();

                if status.is_success() {
                    return Ok(response.json().await?);
                }

                let body_text = response.text().await.unwrap_or_default();
                if status.as_u16() == 429 || status.is_server_error() {
                    last_err = Some(format!("{} API error {}: {}", service, status, body_text));
                    continue;
                }

                bail!("{} API error {}: {}", service, status, body_text);
            }
            Err(e) => {
                last_err = Some(format!("{} connection error ({}): {}", service, url, e));
                continue;
            }
        }
    }

    Err(RagError::ModelUnavailable(
        last_err.unwrap_or_else(|| format!("{} request failed after retries", service)),
    )
    .into())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_unreachable_host_is_model_unavailable() {
        let client = client(2).unwrap();
        // Port 9 (discard) on localhost is closed in test environments.
        let err = post_json_with_retry(
            &client,
            "http://127.0.0.1:9/api/generate",
            None,
            &serde_json::json!({}),
            0,
            "Ollama",
        )
        .await
        .unwrap_err();

        assert!(matches!(
            err.downcast_ref::<RagError>(),
            Some(RagError::ModelUnavailable(msg)) if msg.contains("Ollama connection error")
        ));
    }
}
