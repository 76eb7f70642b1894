// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Consumer-side components: building ledger-ready confidential requests.

pub mod builder;

pub use builder::{EncryptedRequest, RequestBuilder};
