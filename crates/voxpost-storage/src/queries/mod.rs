// SPDX-FileCopyrightText: 2026 Voxpost Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Typed queries, one module per table family.

pub mod posts;
pub mod subscriptions;
pub mod usage;
pub mod users;
