// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

//! Client transports

pub mod stdio;

pub use stdio::{StdioTransport, TransportTasks};
