// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Relayer SDK integration.
//!
//! The relayer SDK owns all homomorphic encryption, threshold decryption and
//! proof generation. This module only describes the handle it exposes and
//! manages getting it into the process:
//!
//! - `runtime` - process-wide SDK handle plus loaded/initialized state
//! - `loader` - module providers (remote CDN, local bundle) with fallback
//! - `init` - one-time SDK initialization
//! - `types` - instance configuration, presets and the instance traits

pub mod init;
pub mod loader;
pub mod runtime;
pub mod types;

pub use init::initialize;
pub use loader::{
    Integrity, LocalBundleModule, ModuleProvider, RemoteModule, SdkLinker, SdkLoader,
};
pub use runtime::SdkRuntime;
pub use types::*;
