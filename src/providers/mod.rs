// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Upstream API collaborators.
//!
//! The pipeline never performs I/O against upstream services directly; the
//! secure processor goes through the [`ApiClient`] capability defined here.

pub mod http;

pub use http::{ApiClient, ApiError, HttpApiClient};
