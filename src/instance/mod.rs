// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! FHEVM instance acquisition.
//!
//! - `builder` - one build: resolve, load, init, cache lookup, construct
//! - `controller` - lifecycle around builds (status, cancellation, refresh)

pub mod builder;
pub mod controller;

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use serde::Serialize;

use crate::error::FhevmResult;
use crate::network::RelayerMetadata;
use crate::sdk::FhevmInstance;

pub use builder::InstanceBuilder;
pub use controller::{FhevmController, FhevmSnapshot};

/// Coarse pipeline status exposed to consumers.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum FhevmStatus {
    #[default]
    Idle,
    Loading,
    Ready,
    Error,
}

impl FhevmStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            FhevmStatus::Idle => "idle",
            FhevmStatus::Loading => "loading",
            FhevmStatus::Ready => "ready",
            FhevmStatus::Error => "error",
        }
    }
}

impl fmt::Display for FhevmStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Progress notifications emitted during a build.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum BuildPhase {
    SdkLoading,
    SdkLoaded,
    SdkInitializing,
    SdkInitialized,
    Creating,
}

impl BuildPhase {
    pub fn as_str(&self) -> &'static str {
        match self {
            BuildPhase::SdkLoading => "sdk-loading",
            BuildPhase::SdkLoaded => "sdk-loaded",
            BuildPhase::SdkInitializing => "sdk-initializing",
            BuildPhase::SdkInitialized => "sdk-initialized",
            BuildPhase::Creating => "creating",
        }
    }
}

impl fmt::Display for BuildPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Builds instances against a local FHEVM hardhat node without the relayer SDK.
#[async_trait]
pub trait MockInstanceFactory: Send + Sync {
    async fn create(
        &self,
        rpc_url: &str,
        chain_id: u64,
        metadata: &RelayerMetadata,
    ) -> FhevmResult<Arc<dyn FhevmInstance>>;
}
