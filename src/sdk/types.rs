// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Relayer SDK handle, instance traits and construction parameters.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use alloy::primitives::{Address, Bytes, B256, U256};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::network::ProviderSource;
use crate::permit::DecryptionPermit;
use crate::storage::{CachedKeys, PublicKey, PublicParams, PUBLIC_PARAMS_SIZE};

/// Error messages from `create_instance` that indicate unreadable cached key material.
const CORRUPT_KEY_MARKERS: [&str; 2] = ["invalid public key", "deserialization failed"];

/// Error reported by the vendor SDK or one of its instances.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{message}")]
pub struct SdkError {
    message: String,
}

impl SdkError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    /// Whether the failure was caused by a corrupt or stale cached public key.
    pub fn is_corrupt_key(&self) -> bool {
        let lower = self.message.to_lowercase();
        CORRUPT_KEY_MARKERS.iter().any(|m| lower.contains(m))
    }
}

// =============================================================================
// Presets
// =============================================================================

/// Named network presets shipped with the SDK, newest first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PresetName {
    /// v0.9+ preset for the Sepolia coprocessor deployment.
    ZamaEthereum,
    /// Legacy preset name for the same deployment.
    Sepolia,
}

impl PresetName {
    /// Preference order when picking a base configuration.
    pub const PREFERENCE: [PresetName; 2] = [PresetName::ZamaEthereum, PresetName::Sepolia];

    pub fn as_str(&self) -> &'static str {
        match self {
            PresetName::ZamaEthereum => "ZamaEthereumConfig",
            PresetName::Sepolia => "SepoliaConfig",
        }
    }
}

/// Base network configuration taken from an SDK preset.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NetworkPreset {
    pub acl_contract_address: String,
    pub kms_contract_address: String,
    pub input_verifier_contract_address: String,
    pub verifying_contract_address_decryption: String,
    pub verifying_contract_address_input_verification: String,
    pub chain_id: u64,
    pub gateway_chain_id: u64,
    pub relayer_url: String,
}

/// Options forwarded unchanged to the SDK's `init_sdk`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InitOptions {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub gateway_url: Option<String>,
}

// =============================================================================
// Instance configuration
// =============================================================================

/// Parameters for `RelayerSdk::create_instance`.
///
/// The cached key fields are private and only settable through
/// [`InstanceConfigBuilder`], so "no cached key" is always an absent field
/// rather than an explicit null.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InstanceConfig {
    #[serde(flatten)]
    preset: NetworkPreset,
    #[serde(skip)]
    network: ProviderSource,
    #[serde(skip_serializing_if = "Option::is_none")]
    public_key: Option<PublicKey>,
    #[serde(skip_serializing_if = "Option::is_none")]
    public_params: Option<BTreeMap<String, PublicParams>>,
}

impl InstanceConfig {
    pub fn builder(preset: NetworkPreset, network: ProviderSource) -> InstanceConfigBuilder {
        InstanceConfigBuilder {
            preset,
            network,
            public_key: None,
            public_params: None,
        }
    }

    pub fn preset(&self) -> &NetworkPreset {
        &self.preset
    }

    pub fn network(&self) -> &ProviderSource {
        &self.network
    }

    pub fn public_key(&self) -> Option<&PublicKey> {
        self.public_key.as_ref()
    }

    /// Cached public params for the given size tag.
    pub fn public_params(&self, size: u32) -> Option<&PublicParams> {
        self.public_params.as_ref()?.get(&size.to_string())
    }

    pub fn has_cached_keys(&self) -> bool {
        self.public_key.is_some() || self.public_params.is_some()
    }
}

pub struct InstanceConfigBuilder {
    preset: NetworkPreset,
    network: ProviderSource,
    public_key: Option<PublicKey>,
    public_params: Option<BTreeMap<String, PublicParams>>,
}

impl InstanceConfigBuilder {
    /// Overlay cached key material. A public key with no bytes is ignored.
    pub fn with_cached(mut self, cached: CachedKeys) -> Self {
        if let Some(key) = cached.public_key.filter(|k| !k.data.is_empty()) {
            self.public_key = Some(key);
        }
        if let Some(params) = cached.public_params {
            let mut sized = BTreeMap::new();
            sized.insert(PUBLIC_PARAMS_SIZE.to_string(), params);
            self.public_params = Some(sized);
        }
        self
    }

    pub fn build(self) -> InstanceConfig {
        InstanceConfig {
            preset: self.preset,
            network: self.network,
            public_key: self.public_key,
            public_params: self.public_params,
        }
    }
}

// =============================================================================
// Encryption / decryption payloads
// =============================================================================

/// Output of `EncryptedInput::encrypt`: one handle per added value plus the input proof.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncryptedInputs {
    pub handles: Vec<B256>,
    pub input_proof: Bytes,
}

/// A ciphertext handle and the contract allowed to decrypt it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HandleContractPair {
    pub handle: B256,
    pub contract_address: Address,
}

/// Ephemeral keypair used for user decryption, hex encoded by the SDK.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Keypair {
    pub public_key: String,
    pub private_key: String,
}

/// EIP-712 domain parameters for user-decrypt permits.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DecryptionDomain {
    /// Gateway chain the verifying contract lives on.
    pub chain_id: u64,
    pub verifying_contract: Address,
    /// Host chain of the contracts named in the permit.
    pub contracts_chain_id: u64,
}

// =============================================================================
// Traits
// =============================================================================

/// Builder for an encrypted input bound to a contract and user.
#[async_trait]
pub trait EncryptedInput: Send {
    fn add32(&mut self, value: u32);

    async fn encrypt(self: Box<Self>) -> Result<EncryptedInputs, SdkError>;
}

/// A ready encryption/decryption handle produced by the SDK (or the mock factory).
#[async_trait]
pub trait FhevmInstance: Send + Sync {
    fn create_encrypted_input(&self, contract: Address, user: Address) -> Box<dyn EncryptedInput>;

    async fn user_decrypt(
        &self,
        pairs: &[HandleContractPair],
        permit: &DecryptionPermit,
    ) -> Result<HashMap<B256, U256>, SdkError>;

    /// Public key the instance is using, if it has one.
    fn public_key(&self) -> Option<PublicKey>;

    fn public_params(&self, size: u32) -> Option<PublicParams>;

    fn generate_keypair(&self) -> Keypair;

    fn decryption_domain(&self) -> DecryptionDomain;
}

/// The vendor SDK handle as installed in the [`SdkRuntime`](super::SdkRuntime).
#[async_trait]
pub trait RelayerSdk: Send + Sync {
    /// A handle without a working construction entry point counts as not loaded.
    fn can_create_instances(&self) -> bool {
        true
    }

    fn preset(&self, name: PresetName) -> Option<NetworkPreset>;

    async fn init_sdk(&self, options: &InitOptions) -> Result<bool, SdkError>;

    async fn create_instance(
        &self,
        config: &InstanceConfig,
    ) -> Result<Arc<dyn FhevmInstance>, SdkError>;
}
