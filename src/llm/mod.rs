// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

//! Chat provider layer
//!
//! Normalizes the streaming protocols of every supported backend behind
//! [`ChatProvider`] and routes model ids through [`ProviderRegistry`].

pub mod factory;
pub mod message;
pub mod mock_provider;
pub mod provider;
pub mod providers;
pub mod registry;

pub use message::*;
pub use provider::*;
pub use registry::ProviderRegistry;
