// SPDX-FileCopyrightText: 2026 Voxpost Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Job-based speech-to-text client.
//!
//! Protocol:
//! - `POST {base}/transcriptions` with the raw clip returns `{id}`.
//! - `GET {base}/transcriptions/{id}` returns `{status, error?}` where status
//!   is one of `queued`, `processing`, `completed`, `error`.
//! - `GET {base}/transcriptions/{id}/result` returns `{text}`.

use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;
use tracing::{debug, warn};
use voxpost_config::model::TranscriptionConfig;
use voxpost_core::{
    AdapterType, HealthStatus, PluginAdapter, TranscriptionAdapter, TranscriptionFailure,
    VoxpostError,
};

use crate::retry::with_retry;
use crate::wire::{JobState, StatusResponse, SubmitResponse, TextResponse};
use crate::{file_name, http_client, read_audio, status_error, transport_error};

/// Per-request budget; the whole job is bounded separately.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(60);

/// Submit, poll, fetch.
#[derive(Debug, Clone)]
pub struct PollingTranscriber {
    client: reqwest::Client,
    base_url: String,
    poll_interval: Duration,
    timeout: Duration,
    max_retries: u32,
    retry_base: Duration,
}

impl PollingTranscriber {
    pub fn new(config: &TranscriptionConfig) -> Result<Self, VoxpostError> {
        let timeout = Duration::from_secs(config.timeout_secs);
        Ok(Self {
            client: http_client(config.api_key.as_deref(), REQUEST_TIMEOUT.min(timeout))?,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            poll_interval: Duration::from_millis(config.poll_interval_ms),
            timeout,
            max_retries: config.max_retries,
            retry_base: Duration::from_millis(config.retry_base_ms),
        })
    }

    #[cfg(test)]
    fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Upload the clip and return the provider's job id.
    pub async fn submit(&self, name: &str, audio: Vec<u8>) -> Result<String, VoxpostError> {
        let url = format!("{}/transcriptions", self.base_url);
        with_retry("transcription submit", self.max_retries, self.retry_base, || {
            let body = audio.clone();
            let url = url.clone();
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
                let job: SubmitResponse = response.json().await.map_err(transport_error)?;
                Ok(job.id)
            }
        })
        .await
    }

    /// Poll the job until it completes or fails.
    async fn wait_for(&self, id: &str) -> Result<(), VoxpostError> {
        let url = format!("{}/transcriptions/{id}", self.base_url);
        loop {
            match self.client.get(&url).send().await {
                Ok(response) if response.status().is_success() => {
                    let status: StatusResponse =
                        response.json().await.map_err(transport_error)?;
                    match status.status {
                        JobState::Completed => return Ok(()),
                        JobState::Error => {
                            return Err(VoxpostError::Transcription {
                                kind: TranscriptionFailure::Upstream,
                                status: None,
                                message: status
                                    .error
                                    .unwrap_or_else(|| "transcription job failed".into()),
                            });
                        }
                        JobState::Queued | JobState::Processing => {
                            debug!(job_id = id, state = ?status.status, "transcription pending");
                        }
                    }
                }
                Ok(response) => {
                    let err = status_error(response).await;
                    if !err.is_transient() {
                        return Err(err);
                    }
                    warn!(job_id = id, error = %err, "status poll failed, will poll again");
                }
                Err(e) => {
                    warn!(job_id = id, error = %e, "status poll failed, will poll again");
                }
            }
            tokio::time::sleep(self.poll_interval).await;
        }
    }

    /// Fetch the finished text of job `id`.
    pub async fn download_result(&self, id: &str) -> Result<String, VoxpostError> {
        let url = format!("{}/transcriptions/{id}/result", self.base_url);
        with_retry("transcription result", self.max_retries, self.retry_base, || {
            let url = url.clone();
            async move {
                let response = self.client.get(&url).send().await.map_err(transport_error)?;
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

#[async_trait]
impl PluginAdapter for PollingTranscriber {
    fn name(&self) -> &str {
        "transcription-polling"
    }

    fn version(&self) -> semver::Version {
        semver::Version::new(0, 1, 0)
    }

    fn adapter_type(&self) -> AdapterType {
        AdapterType::Transcription
    }

    async fn health_check(&self) -> Result<HealthStatus, VoxpostError> {
        // Any HTTP answer means the service is reachable.
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
impl TranscriptionAdapter for PollingTranscriber {
    async fn transcribe(&self, audio: &Path) -> Result<String, VoxpostError> {
        let bytes = read_audio(audio).await?;
        let name = file_name(audio);
        let job = async {
            let id = self.submit(&name, bytes).await?;
            debug!(job_id = %id, file = %name, "transcription submitted");
            self.wait_for(&id).await?;
            self.download_result(&id).await
        };
        match tokio::time::timeout(self.timeout, job).await {
            Ok(result) => result,
            Err(_) => Err(VoxpostError::Transcription {
                kind: TranscriptionFailure::Timeout,
                status: None,
                message: format!("no result within {:?}", self.timeout),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_bytes, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn config(base_url: &str) -> TranscriptionConfig {
        TranscriptionConfig {
            base_url: base_url.to_string(),
            poll_interval_ms: 10,
            retry_base_ms: 5,
            ..TranscriptionConfig::default()
        }
    }

    async fn clip(dir: &tempfile::TempDir) -> std::path::PathBuf {
        let path = dir.path().join("v1.ogg");
        tokio::fs::write(&path, b"OggS-fake").await.unwrap();
        path
    }

    async fn mount_submit(server: &MockServer) {
        Mock::given(method("POST"))
            .and(path("/transcriptions"))
            .and(body_bytes(b"OggS-fake".to_vec()))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({"id": "job1"})))
            .mount(server)
            .await;
    }

    #[tokio::test]
    async fn polls_until_completed_then_fetches_text() {
        let server = MockServer::start().await;
        let dir = tempfile::tempdir().unwrap();
        mount_submit(&server).await;
        Mock::given(method("GET"))
            .and(path("/transcriptions/job1"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(serde_json::json!({"status": "processing"})),
            )
            .up_to_n_times(2)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/transcriptions/job1"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(serde_json::json!({"status": "completed"})),
            )
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/transcriptions/job1/result"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(serde_json::json!({"text": " hello world "})),
            )
            .expect(1)
            .mount(&server)
            .await;

        let client = PollingTranscriber::new(&config(&server.uri())).unwrap();
        let text = client.transcribe(&clip(&dir).await).await.unwrap();
        assert_eq!(text, "hello world");
    }

    #[tokio::test]
    async fn job_error_is_upstream_failure() {
        let server = MockServer::start().await;
        let dir = tempfile::tempdir().unwrap();
        mount_submit(&server).await;
        Mock::given(method("GET"))
            .and(path("/transcriptions/job1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(
                serde_json::json!({"status": "error", "error": "unsupported codec"}),
            ))
            .mount(&server)
            .await;

        let client = PollingTranscriber::new(&config(&server.uri())).unwrap();
        let err = client.transcribe(&clip(&dir).await).await.unwrap_err();
        match err {
            VoxpostError::Transcription { kind, message, .. } => {
                assert_eq!(kind, TranscriptionFailure::Upstream);
                assert!(message.contains("unsupported codec"));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn unknown_job_is_not_found() {
        let server = MockServer::start().await;
        let dir = tempfile::tempdir().unwrap();
        mount_submit(&server).await;
        Mock::given(method("GET"))
            .and(path("/transcriptions/job1"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let client = PollingTranscriber::new(&config(&server.uri())).unwrap();
        let err = client.transcribe(&clip(&dir).await).await.unwrap_err();
        assert!(matches!(
            err,
            VoxpostError::Transcription {
                kind: TranscriptionFailure::NotFound,
                ..
            }
        ));
    }

    #[tokio::test]
    async fn stuck_job_times_out() {
        let server = MockServer::start().await;
        let dir = tempfile::tempdir().unwrap();
        mount_submit(&server).await;
        Mock::given(method("GET"))
            .and(path("/transcriptions/job1"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(serde_json::json!({"status": "queued"})),
            )
            .mount(&server)
            .await;

        let client = PollingTranscriber::new(&config(&server.uri()))
            .unwrap()
            .with_timeout(Duration::from_millis(150));
        let err = client.transcribe(&clip(&dir).await).await.unwrap_err();
        assert!(matches!(
            err,
            VoxpostError::Transcription {
                kind: TranscriptionFailure::Timeout,
                ..
            }
        ));
    }

    #[tokio::test]
    async fn result_download_retries_server_errors() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/transcriptions/job9/result"))
            .respond_with(ResponseTemplate::new(503))
            .up_to_n_times(2)
            .expect(2)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/transcriptions/job9/result"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({"text": "ok"})))
            .expect(1)
            .mount(&server)
            .await;

        let client = PollingTranscriber::new(&config(&server.uri())).unwrap();
        assert_eq!(client.download_result("job9").await.unwrap(), "ok");
    }

    #[tokio::test]
    async fn result_download_gives_up_after_three_retries() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/transcriptions/job9/result"))
            .respond_with(ResponseTemplate::new(500))
            .expect(4)
            .mount(&server)
            .await;

        let client = PollingTranscriber::new(&config(&server.uri())).unwrap();
        assert!(client.download_result("job9").await.is_err());
    }
}
