// SPDX-FileCopyrightText: 2026 Voxpost Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Core library for Voxpost.
//!
//! This crate provides the foundational trait definitions, error types, and
//! common types used throughout the Voxpost workspace. Every external
//! collaborator (messenger, speech-to-text, LLM, card acquirer) is reached
//! through a trait defined here.

pub mod error;
pub mod format;
pub mod messaging;
pub mod payment;
pub mod traits;
pub mod types;

// Re-export key items at crate root for ergonomic imports.
pub use error::{TranscriptionFailure, VoxpostError};
pub use format::{EntityFormatter, EntityKind, FormattedText, TextEntity};
pub use messaging::{Action, Button, ButtonTarget, InboundEvent, InboundKind, Keyboard, OutboundMessage};
pub use payment::{Amount, InitialPaymentRequest, Payment, PaymentStatus, RecurringPaymentRequest};
pub use types::{AdapterType, ContentKind, HealthStatus, MessageId, Tariff, UserId};

pub use traits::{
    AcquirerAdapter, CompletionRequest, LlmAdapter, MessengerAdapter, PluginAdapter,
    TranscriptionAdapter,
};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn all_trait_modules_are_exported() {
        fn _assert_plugin_adapter<T: PluginAdapter>() {}
        fn _assert_messenger_adapter<T: MessengerAdapter>() {}
        fn _assert_transcription_adapter<T: TranscriptionAdapter>() {}
        fn _assert_llm_adapter<T: LlmAdapter>() {}
        fn _assert_acquirer_adapter<T: AcquirerAdapter>() {}
    }

    #[test]
    fn adapter_type_round_trips() {
        use std::str::FromStr;

        let variants = [
            AdapterType::Messenger,
            AdapterType::Transcription,
            AdapterType::Llm,
            AdapterType::Acquirer,
            AdapterType::Storage,
            AdapterType::Observability,
        ];
        for variant in &variants {
            let s = variant.to_string();
            let parsed = AdapterType::from_str(&s).expect("should parse back");
            assert_eq!(*variant, parsed);
        }
    }
}
