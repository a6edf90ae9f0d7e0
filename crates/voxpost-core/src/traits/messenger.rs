// SPDX-FileCopyrightText: 2026 Voxpost Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Messaging platform adapter trait (Telegram, etc.).

use std::path::Path;

use async_trait::async_trait;

use crate::error::VoxpostError;
use crate::messaging::OutboundMessage;
use crate::traits::adapter::PluginAdapter;
use crate::types::MessageId;

/// Outbound side of a messaging platform integration.
///
/// Inbound updates are decoded by the adapter into
/// [`InboundEvent`](crate::messaging::InboundEvent)s and handed to the
/// session engine; this trait covers what the engine needs back.
#[async_trait]
pub trait MessengerAdapter: PluginAdapter {
    /// Sends a message, returning the platform's message id.
    async fn send(&self, msg: OutboundMessage) -> Result<MessageId, VoxpostError>;

    /// Downloads the voice clip behind `file_handle` into `dest`.
    async fn download_voice(&self, file_handle: &str, dest: &Path) -> Result<(), VoxpostError>;
}
