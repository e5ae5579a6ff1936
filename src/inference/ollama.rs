use crate::config::OllamaConfig;
use crate::error::{Result, StoreError};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;

#[derive(Debug, Serialize)]
struct GenerateRequest<'a> {
    model: &'a str,
    prompt: &'a str,
    stream: bool,
}

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    response: String,
    #[serde(default)]
    eval_count: Option<u32>,
    #[serde(default)]
    model: Option<String>,
}

/// A completed, non-streamed answer
#[derive(Debug, Clone, PartialEq)]
pub struct Generation {
    pub response: String,
    pub model: String,
    pub eval_count: Option<u32>,
}

/// Single-shot `/api/generate` caller. Performs no retries; a timeout or a
/// non-success status is returned as `UpstreamInferenceFailure`.
#[derive(Clone)]
pub struct OllamaClient {
    client: Client,
    base_url: String,
    default_model: String,
}

impl OllamaClient {
    pub fn new(config: &OllamaConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_millis(config.timeout_ms))
            .user_agent(concat!("blobchat/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| StoreError::Config(format!("Failed to create HTTP client: {}", e)))?;

        tracing::info!(
            "[OllamaClient] Initialized: url={}, default_model={}, timeout={}ms",
            config.url,
            config.default_model,
            config.timeout_ms
        );

        Ok(Self {
            client,
            base_url: config.url.trim_end_matches('/').to_string(),
            default_model: config.default_model.clone(),
        })
    }

    pub async fn generate(&self, model: Option<&str>, prompt: &str) -> Result<Generation> {
        let model = model.unwrap_or(self.default_model.as_str());
        let request = GenerateRequest {
            model,
            prompt,
            stream: false,
        };

        let response = self
            .client
            .post(format!("{}/api/generate", self.base_url))
            .json(&request)
            .send()
            .await
            .map_err(|e| {
                let reason = if e.is_timeout() {
                    format!("request timed out: {}", e)
                } else {
                    format!("HTTP request failed: {}", e)
                };
                tracing::warn!("[OllamaClient] {}", reason);
                StoreError::UpstreamInferenceFailure {
                    status: None,
                    reason,
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            tracing::warn!(
                "[OllamaClient] API returned error status {}: {}",
                status,
                error_text
            );
            return Err(StoreError::UpstreamInferenceFailure {
                status: Some(status.as_u16()),
                reason: format!("status {}: {}", status, error_text),
            });
        }

        let body = response.json::<GenerateResponse>().await.map_err(|e| {
            tracing::warn!("[OllamaClient] Failed to decode response body: {}", e);
            StoreError::UpstreamInferenceFailure {
                status: Some(status.as_u16()),
                reason: format!("response decode error: {}", e),
            }
        })?;

        Ok(Generation {
            response: body.response,
            model: body.model.unwrap_or_else(|| model.to_string()),
            eval_count: body.eval_count,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{body_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn config_for(server: &MockServer, timeout_ms: u64) -> OllamaConfig {
        OllamaConfig {
            url: server.uri(),
            default_model: "llama3".to_string(),
            timeout_ms,
        }
    }

    #[tokio::test]
    async fn test_generate_sends_non_streaming_request() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/generate"))
            .and(body_json(json!({
                "model": "mistral",
                "prompt": "Why is the sky blue?",
                "stream": false
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "model": "mistral",
                "response": "Rayleigh scattering.",
                "done": true,
                "eval_count": 7
            })))
            .expect(1)
            .mount(&server)
            .await;

        let client = OllamaClient::new(&config_for(&server, 5_000)).unwrap();
        let generation = client
            .generate(Some("mistral"), "Why is the sky blue?")
            .await
            .unwrap();

        assert_eq!(generation.response, "Rayleigh scattering.");
        assert_eq!(generation.model, "mistral");
        assert_eq!(generation.eval_count, Some(7));
    }

    #[tokio::test]
    async fn test_default_model_and_missing_eval_count() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/generate"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"response": "ok"})))
            .mount(&server)
            .await;

        let client = OllamaClient::new(&config_for(&server, 5_000)).unwrap();
        let generation = client.generate(None, "ping").await.unwrap();

        assert_eq!(generation.model, "llama3");
        assert!(generation.eval_count.is_none());
    }

    #[tokio::test]
    async fn test_error_status_is_upstream_failure() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/generate"))
            .respond_with(ResponseTemplate::new(404).set_body_string("model 'nope' not found"))
            .expect(1)
            .mount(&server)
            .await;

        let client = OllamaClient::new(&config_for(&server, 5_000)).unwrap();
        let err = client.generate(Some("nope"), "hi").await.unwrap_err();

        match err {
            StoreError::UpstreamInferenceFailure { status, reason } => {
                assert_eq!(status, Some(404));
                assert!(reason.contains("not found"));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_timeout_is_upstream_failure_without_retry() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/generate"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(json!({"response": "late"}))
                    .set_delay(Duration::from_millis(500)),
            )
            .expect(1)
            .mount(&server)
            .await;

        let client = OllamaClient::new(&config_for(&server, 50)).unwrap();
        let err = client.generate(None, "hi").await.unwrap_err();

        assert!(matches!(
            err,
            StoreError::UpstreamInferenceFailure { status: None, .. }
        ));
        assert!(err.is_retryable());
    }
}
