// SPDX-FileCopyrightText: 2026 Voxpost Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! LLM completion adapter trait.

use async_trait::async_trait;

use crate::error::VoxpostError;
use crate::traits::adapter::PluginAdapter;

/// A single system + user prompt.
#[derive(Debug, Clone, PartialEq)]
pub struct CompletionRequest {
    pub system: String,
    pub user: String,
    pub temperature: f32,
    pub max_tokens: u32,
}

/// Returns one text completion per request.
#[async_trait]
pub trait LlmAdapter: PluginAdapter {
    async fn complete(&self, request: CompletionRequest) -> Result<String, VoxpostError>;
}
