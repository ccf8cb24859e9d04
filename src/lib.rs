// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! AirWitness FHEVM - Instance Acquisition Pipeline
//!
//! Client-side pipeline that turns a wallet provider or RPC URL into a
//! working FHEVM instance for encrypted air-quality reports.
//!
//! ## Modules
//!
//! - `network` - chain id resolution and mock (hardhat) node detection
//! - `sdk` - relayer SDK runtime, loading and initialization
//! - `storage` - public key cache (redb + LRU)
//! - `instance` - instance builder and lifecycle controller
//! - `permit` - EIP-712 user-decryption permits
//! - `report` - encrypting and decrypting air-quality readings
//! - `config` - environment configuration

pub mod config;
pub mod error;
pub mod instance;
pub mod network;
pub mod permit;
pub mod report;
pub mod sdk;
pub mod storage;

#[cfg(test)]
pub(crate) mod test_support;

pub use error::{FhevmError, FhevmResult};
pub use instance::{BuildPhase, FhevmController, FhevmSnapshot, FhevmStatus, InstanceBuilder};
pub use network::ProviderSource;
