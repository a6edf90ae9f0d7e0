// SPDX-FileCopyrightText: 2026 Voxpost Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Single-request speech-to-text client: `POST {base}/transcribe` with the
//! raw clip answers `{text}` directly.

use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;
use voxpost_config::model::TranscriptionConfig;
use voxpost_core::{AdapterType, HealthStatus, PluginAdapter, TranscriptionAdapter, VoxpostError};

use crate::retry::with_retry;
use crate::wire::TextResponse;
use crate::{file_name, http_client, read_audio, status_error, transport_error};

#[derive(Debug, Clone)]
pub struct DirectTranscriber {
    client: reqwest::Client,
    base_url: String,
    max_retries: u32,
    retry_base: Duration,
}

impl DirectTranscriber {
    pub fn new(config: &TranscriptionConfig) -> Result<Self, VoxpostError> {
        Ok(Self {
            client: http_client(
                config.api_key.as_deref(),
                Duration::from_secs(config.timeout_secs),
            )?,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            max_retries: config.max_retries,
            retry_base: Duration::from_millis(config.retry_base_ms),
        })
    }
}

#[async_trait]
impl PluginAdapter for DirectTranscriber {
    fn name(&self) -> &str {
        "transcription-direct"
    }

    fn version(&self) -> semver::Version {
        semver::Version::new(0, 1, 0)
    }

    fn adapter_type(&self) -> AdapterType {
        AdapterType::Transcription
    }

    async fn health_check(&self) -> Result<HealthStatus, VoxpostError> {
        Ok(match self.client.get(&self.base_url).send().await {
            Ok(_) => HealthStatus::Healthy,
            Err(e) => HealthStatus::Degraded(format!("unreachable: {e}")),
        })
    }

    async fn shutdown(&self) -> Result<(), VoxpostError> {
        Ok(())
    }
}

#[async_trait]
impl TranscriptionAdapter for DirectTranscriber {
    async fn transcribe(&self, audio: &Path) -> Result<String, VoxpostError> {
        let bytes = read_audio(audio).await?;
        let name = file_name(audio);
        let url = format!("{}/transcribe", self.base_url);
        with_retry("transcription", self.max_retries, self.retry_base, || {
            let body = bytes.clone();
            let url = url.clone();
            let name = name.clone();
            async move {
                let response = self
                    .client
                    .post(&url)
                    .header(reqwest::header::CONTENT_TYPE, "application/octet-stream")
                    .header("X-File-Name", name)
                    .body(body)
                    .send()
                    .await
                    .map_err(transport_error)?;
                if !response.status().is_success() {
                    return Err(status_error(response).await);
                }
                let result: TextResponse = response.json().await.map_err(transport_error)?;
                Ok(result.text.trim().to_string())
            }
        })
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[tokio::test]
    async fn posts_clip_and_returns_text() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/transcribe"))
            .and(header("authorization", "Bearer stt-key"))
            .and(header("x-file-name", "v7.ogg"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(serde_json::json!({"text": "make it shorter"})),
            )
            .expect(1)
            .mount(&server)
            .await;

        let dir = tempfile::tempdir().unwrap();
        let clip = dir.path().join("v7.ogg");
        tokio::fs::write(&clip, b"audio").await.unwrap();

        let config = TranscriptionConfig {
            base_url: server.uri(),
            api_key: Some("stt-key".into()),
            ..TranscriptionConfig::default()
        };
        let client = DirectTranscriber::new(&config).unwrap();
        assert_eq!(client.transcribe(&clip).await.unwrap(), "make it shorter");
    }
}
