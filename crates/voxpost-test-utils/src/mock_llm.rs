// SPDX-FileCopyrightText: 2026 Voxpost Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Mock LLM adapter for deterministic testing.
//!
//! Replies are popped from a FIFO queue. When the queue is empty the mock
//! answers `"Post: {user prompt}"`, so distinct prompts give distinct posts.

use std::collections::VecDeque;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::Mutex;

use voxpost_core::{
    AdapterType, CompletionRequest, HealthStatus, LlmAdapter, PluginAdapter, VoxpostError,
};

/// One queued answer.
#[derive(Debug, Clone)]
pub enum MockReply {
    Text(String),
    /// Fail with this HTTP status.
    Status(u16),
    /// Return a blank completion.
    Empty,
}

pub struct MockLlm {
    replies: Mutex<VecDeque<MockReply>>,
    requests: Mutex<Vec<CompletionRequest>>,
    delay: Mutex<Duration>,
}

impl MockLlm {
    pub fn new() -> Self {
        Self::with_replies(Vec::new())
    }

    pub fn with_replies(replies: Vec<MockReply>) -> Self {
        Self {
            replies: Mutex::new(VecDeque::from(replies)),
            requests: Mutex::new(Vec::new()),
            delay: Mutex::new(Duration::ZERO),
        }
    }

    pub async fn push(&self, reply: MockReply) {
        self.replies.lock().await.push_back(reply);
    }

    pub async fn push_text(&self, text: &str) {
        self.push(MockReply::Text(text.to_string())).await;
    }

    pub async fn set_delay(&self, delay: Duration) {
        *self.delay.lock().await = delay;
    }

    /// Every request seen so far, in call order.
    pub async fn requests(&self) -> Vec<CompletionRequest> {
        self.requests.lock().await.clone()
    }

    pub async fn last_request(&self) -> Option<CompletionRequest> {
        self.requests.lock().await.last().cloned()
    }
}

impl Default for MockLlm {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl PluginAdapter for MockLlm {
    fn name(&self) -> &str {
        "mock-llm"
    }

    fn version(&self) -> semver::Version {
        semver::Version::new(0, 1, 0)
    }

    fn adapter_type(&self) -> AdapterType {
        AdapterType::Llm
    }

    async fn health_check(&self) -> Result<HealthStatus, VoxpostError> {
        Ok(HealthStatus::Healthy)
    }

    async fn shutdown(&self) -> Result<(), VoxpostError> {
        Ok(())
    }
}

#[async_trait]
impl LlmAdapter for MockLlm {
    async fn complete(&self, request: CompletionRequest) -> Result<String, VoxpostError> {
        let delay = *self.delay.lock().await;
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
        let fallback = format!("Post: {}", request.user);
        self.requests.lock().await.push(request);

        match self.replies.lock().await.pop_front() {
            Some(MockReply::Text(text)) => Ok(text),
            Some(MockReply::Status(status)) => Err(VoxpostError::Provider {
                message: format!("mock upstream answered {status}"),
                status: Some(status),
                source: None,
            }),
            Some(MockReply::Empty) => Ok(String::new()),
            None => Ok(fallback),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(user: &str) -> CompletionRequest {
        CompletionRequest {
            system: "sys".into(),
            user: user.into(),
            temperature: 0.7,
            max_tokens: 100,
        }
    }

    #[tokio::test]
    async fn queue_then_fallback() {
        let llm = MockLlm::with_replies(vec![MockReply::Text("first".into()), MockReply::Status(503)]);
        assert_eq!(llm.complete(request("a")).await.unwrap(), "first");
        assert!(llm.complete(request("b")).await.unwrap_err().is_transient());
        assert_eq!(llm.complete(request("c")).await.unwrap(), "Post: c");
        assert_eq!(llm.requests().await.len(), 3);
        assert_eq!(llm.last_request().await.unwrap().user, "c");
    }
}
