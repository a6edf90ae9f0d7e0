// SPDX-FileCopyrightText: 2026 Voxpost Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

use serde::Deserialize;

/// Answer to a job submission.
#[derive(Debug, Deserialize)]
pub(crate) struct SubmitResponse {
    pub id: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub(crate) enum JobState {
    Queued,
    Processing,
    Completed,
    Error,
}

#[derive(Debug, Deserialize)]
pub(crate) struct StatusResponse {
    pub status: JobState,
    #[serde(default)]
    pub error: Option<String>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct TextResponse {
    pub text: String,
}
