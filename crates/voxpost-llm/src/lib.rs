// SPDX-FileCopyrightText: 2026 Voxpost Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! LLM client for Voxpost.
//!
//! Talks to any OpenAI-compatible `chat/completions` endpoint. One pooled
//! client per process (keep-alive, HTTP/2 when the server negotiates it) and
//! a semaphore capping concurrent requests to the host.

pub mod types;

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue};
use tokio::sync::Semaphore;
use tracing::{debug, warn};
use voxpost_config::model::LlmConfig;
use voxpost_core::error::is_transient_status;
use voxpost_core::{
    AdapterType, CompletionRequest, HealthStatus, LlmAdapter, PluginAdapter, VoxpostError,
};

use crate::types::{ApiErrorResponse, ChatMessage, ChatRequest, ChatResponse};

/// OpenAI-compatible chat completion client.
#[derive(Debug, Clone)]
pub struct ChatCompletionClient {
    client: reqwest::Client,
    endpoint: String,
    model: String,
    timeout: Duration,
    max_retries: u32,
    retry_base: Duration,
    permits: Arc<Semaphore>,
}

impl ChatCompletionClient {
    pub fn new(config: &LlmConfig) -> Result<Self, VoxpostError> {
        let mut headers = HeaderMap::new();
        if let Some(key) = config.api_key.as_deref().filter(|k| !k.trim().is_empty()) {
            headers.insert(
                reqwest::header::AUTHORIZATION,
                HeaderValue::from_str(&format!("Bearer {key}"))
                    .map_err(|e| VoxpostError::Config(format!("invalid LLM API key: {e}")))?,
            );
        }
        headers.insert(
            reqwest::header::CONTENT_TYPE,
            HeaderValue::from_static("application/json"),
        );

        let timeout = Duration::from_secs(config.timeout_secs);
        let client = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(timeout)
            .pool_max_idle_per_host(config.max_concurrency)
            .pool_idle_timeout(Duration::from_secs(90))
            .tcp_keepalive(Duration::from_secs(60))
            .build()
            .map_err(|e| VoxpostError::Provider {
                message: format!("failed to build HTTP client: {e}"),
                status: None,
                source: Some(Box::new(e)),
            })?;

        Ok(Self {
            client,
            endpoint: format!("{}/chat/completions", config.base_url.trim_end_matches('/')),
            model: config.model.clone(),
            timeout,
            max_retries: config.max_retries,
            retry_base: Duration::from_secs(1),
            permits: Arc::new(Semaphore::new(config.max_concurrency.max(1))),
        })
    }

    #[cfg(test)]
    fn with_retry_base(mut self, base: Duration) -> Self {
        self.retry_base = base;
        self
    }

    fn request_error(&self, e: reqwest::Error) -> VoxpostError {
        if e.is_timeout() {
            VoxpostError::Timeout {
                duration: self.timeout,
            }
        } else {
            VoxpostError::Provider {
                message: format!("HTTP request failed: {e}"),
                status: None,
                source: Some(Box::new(e)),
            }
        }
    }

    async fn send_once(&self, body: &ChatRequest) -> Result<String, VoxpostError> {
        let response = self
            .client
            .post(&self.endpoint)
            .json(body)
            .send()
            .await
            .map_err(|e| self.request_error(e))?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            let message = match serde_json::from_str::<ApiErrorResponse>(&text) {
                Ok(api_err) => format!(
                    "LLM API error ({}): {}",
                    api_err.error.type_.as_deref().unwrap_or("unknown"),
                    api_err.error.message
                ),
                Err(_) => format!("LLM API returned {status}: {text}"),
            };
            return Err(VoxpostError::Provider {
                message,
                status: Some(status.as_u16()),
                source: None,
            });
        }

        let parsed: ChatResponse = response.json().await.map_err(|e| self.request_error(e))?;
        parsed
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .map(|text| text.trim().to_string())
            .filter(|text| !text.is_empty())
            .ok_or(VoxpostError::EmptyCompletion)
    }
}

#[async_trait]
impl PluginAdapter for ChatCompletionClient {
    fn name(&self) -> &str {
        "llm"
    }

    fn version(&self) -> semver::Version {
        semver::Version::new(0, 1, 0)
    }

    fn adapter_type(&self) -> AdapterType {
        AdapterType::Llm
    }

    async fn health_check(&self) -> Result<HealthStatus, VoxpostError> {
        if self.permits.available_permits() == 0 {
            return Ok(HealthStatus::Degraded("all request slots busy".into()));
        }
        Ok(HealthStatus::Healthy)
    }

    async fn shutdown(&self) -> Result<(), VoxpostError> {
        self.permits.close();
        Ok(())
    }
}

#[async_trait]
impl LlmAdapter for ChatCompletionClient {
    async fn complete(&self, request: CompletionRequest) -> Result<String, VoxpostError> {
        let body = ChatRequest {
            model: self.model.clone(),
            messages: vec![
                ChatMessage::system(request.system),
                ChatMessage::user(request.user),
            ],
            temperature: request.temperature,
            max_tokens: request.max_tokens,
        };

        let _permit = self
            .permits
            .acquire()
            .await
            .map_err(|_| VoxpostError::Cancelled)?;

        let mut delay = self.retry_base;
        let mut attempt = 0;
        loop {
            match self.send_once(&body).await {
                Ok(text) => {
                    debug!(attempt, chars = text.len(), "completion received");
                    return Ok(text);
                }
                Err(VoxpostError::Provider {
                    status: Some(status),
                    message,
                    ..
                }) if is_transient_status(status) && attempt < self.max_retries => {
                    attempt += 1;
                    warn!(status, attempt, %message, "transient LLM error, will retry");
                    tokio::time::sleep(delay).await;
                    delay *= 2;
                }
                Err(e) => return Err(e),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_partial_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn client(base_url: &str) -> ChatCompletionClient {
        let config = LlmConfig {
            base_url: base_url.to_string(),
            api_key: Some("sk-test".into()),
            ..LlmConfig::default()
        };
        ChatCompletionClient::new(&config)
            .unwrap()
            .with_retry_base(Duration::from_millis(5))
    }

    fn request() -> CompletionRequest {
        CompletionRequest {
            system: "You write Telegram posts.".into(),
            user: "Fragment 1: hello world".into(),
            temperature: 0.7,
            max_tokens: 2000,
        }
    }

    fn answer(text: &str) -> serde_json::Value {
        serde_json::json!({
            "id": "chatcmpl-1",
            "choices": [{"index": 0, "message": {"role": "assistant", "content": text}}]
        })
    }

    #[tokio::test]
    async fn sends_system_and_user_messages() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .and(header("authorization", "Bearer sk-test"))
            .and(body_partial_json(serde_json::json!({
                "model": "gpt-4o-mini",
                "max_tokens": 2000,
                "messages": [
                    {"role": "system", "content": "You write Telegram posts."},
                    {"role": "user", "content": "Fragment 1: hello world"}
                ]
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(answer("Hello, world! #greeting")))
            .expect(1)
            .mount(&server)
            .await;

        let text = client(&server.uri()).complete(request()).await.unwrap();
        assert_eq!(text, "Hello, world! #greeting");
    }

    #[tokio::test]
    async fn retries_rate_limit_then_succeeds() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .respond_with(ResponseTemplate::new(429).set_body_json(serde_json::json!({
                "error": {"type": "rate_limit_exceeded", "message": "slow down"}
            })))
            .up_to_n_times(1)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .respond_with(ResponseTemplate::new(200).set_body_json(answer("after retry")))
            .mount(&server)
            .await;

        let text = client(&server.uri()).complete(request()).await.unwrap();
        assert_eq!(text, "after retry");
    }

    #[tokio::test]
    async fn bad_request_is_not_retried() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .respond_with(ResponseTemplate::new(400).set_body_json(serde_json::json!({
                "error": {"type": "invalid_request_error", "message": "bad model"}
            })))
            .expect(1)
            .mount(&server)
            .await;

        let err = client(&server.uri()).complete(request()).await.unwrap_err();
        assert!(!err.is_transient());
        assert!(err.to_string().contains("invalid_request_error"), "got: {err}");
    }

    #[tokio::test]
    async fn exhausted_retries_surface_server_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .respond_with(ResponseTemplate::new(503))
            .expect(3)
            .mount(&server)
            .await;

        let err = client(&server.uri()).complete(request()).await.unwrap_err();
        assert!(err.is_transient());
    }

    #[tokio::test]
    async fn blank_completion_is_empty_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .respond_with(ResponseTemplate::new(200).set_body_json(answer("   ")))
            .mount(&server)
            .await;

        let err = client(&server.uri()).complete(request()).await.unwrap_err();
        assert!(matches!(err, VoxpostError::EmptyCompletion));
    }

    #[tokio::test]
    async fn missing_choices_is_empty_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({"choices": []})))
            .mount(&server)
            .await;

        let err = client(&server.uri()).complete(request()).await.unwrap_err();
        assert!(matches!(err, VoxpostError::EmptyCompletion));
    }
}
