// SPDX-FileCopyrightText: 2026 Voxpost Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! HTTP ingress for Voxpost.
//!
//! Receives acquirer webhooks and payment redirects, exposes the ops
//! routes behind a bearer token, and serves `/healthz` and `/metrics`.

pub mod auth;
pub mod handlers;
pub mod server;
pub mod signature;

pub use auth::AuthConfig;
pub use server::{GatewayState, HealthState, ServerConfig, router, start_server};
