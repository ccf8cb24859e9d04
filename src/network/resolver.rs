// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Network resolution: chain id, mock-chain detection and the local
//! development node's relayer metadata.

use std::collections::BTreeMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use super::{JsonRpcClient, ProviderSource, RpcConnector};
use crate::error::{FhevmError, FhevmResult};

/// Hardhat's default chain id.
pub const DEFAULT_MOCK_CHAIN_ID: u64 = 31337;

pub const DEFAULT_MOCK_RPC_URL: &str = "http://localhost:8545";

/// Marker in `web3_clientVersion` identifying a local development node.
const DEV_NODE_MARKER: &str = "hardhat";

/// Caller-supplied mock chains (chain id -> RPC URL).
pub type MockChainOverrides = BTreeMap<u64, String>;

/// Known local/mock development chains.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MockChains(BTreeMap<u64, String>);

impl MockChains {
    /// Default table with overrides applied on top.
    pub fn with_overrides(overrides: Option<&MockChainOverrides>) -> Self {
        let mut chains = Self::default();
        if let Some(overrides) = overrides {
            chains
                .0
                .extend(overrides.iter().map(|(id, url)| (*id, url.clone())));
        }
        chains
    }

    pub fn get(&self, chain_id: u64) -> Option<&str> {
        self.0.get(&chain_id).map(String::as_str)
    }

    pub fn contains(&self, chain_id: u64) -> bool {
        self.0.contains_key(&chain_id)
    }

    /// Parse `"31337=http://localhost:8545,1337=http://127.0.0.1:7545"`.
    pub fn parse_overrides(raw: &str) -> FhevmResult<MockChainOverrides> {
        let mut overrides = MockChainOverrides::new();
        for entry in raw.split(',').map(str::trim).filter(|e| !e.is_empty()) {
            let (id, url) = entry.split_once('=').ok_or_else(|| {
                FhevmError::InvalidConfiguration(format!("Malformed mock chain entry: {entry}"))
            })?;
            let id: u64 = id.trim().parse().map_err(|_| {
                FhevmError::InvalidConfiguration(format!("Invalid mock chain id: {id}"))
            })?;
            overrides.insert(id, url.trim().to_string());
        }
        Ok(overrides)
    }
}

impl Default for MockChains {
    fn default() -> Self {
        let mut chains = BTreeMap::new();
        chains.insert(DEFAULT_MOCK_CHAIN_ID, DEFAULT_MOCK_RPC_URL.to_string());
        Self(chains)
    }
}

/// Result of resolving a provider source.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ResolvedNetwork {
    pub chain_id: u64,
    pub is_mock: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rpc_url: Option<String>,
}

/// Coprocessor contract addresses reported by a local FHEVM hardhat node.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RelayerMetadata {
    #[serde(rename = "ACLAddress")]
    pub acl_address: String,
    #[serde(rename = "InputVerifierAddress")]
    pub input_verifier_address: String,
    #[serde(rename = "KMSVerifierAddress")]
    pub kms_verifier_address: String,
}

/// Resolves chain identity over JSON-RPC.
#[derive(Clone)]
pub struct NetworkResolver {
    connector: Arc<dyn RpcConnector>,
}

impl NetworkResolver {
    pub fn new(connector: Arc<dyn RpcConnector>) -> Self {
        Self { connector }
    }

    /// Determine the chain id and whether it is a mock chain.
    ///
    /// Connection failures surface to the caller.
    pub async fn resolve(
        &self,
        source: &ProviderSource,
        overrides: Option<&MockChainOverrides>,
    ) -> FhevmResult<ResolvedNetwork> {
        let chain_id = self.chain_id(source).await?;
        let supplied_url = source.as_url().map(str::to_string);
        let chains = MockChains::with_overrides(overrides);

        let resolved = match chains.get(chain_id) {
            Some(mock_url) => ResolvedNetwork {
                chain_id,
                is_mock: true,
                rpc_url: supplied_url.or_else(|| Some(mock_url.to_string())),
            },
            None => ResolvedNetwork {
                chain_id,
                is_mock: false,
                rpc_url: supplied_url,
            },
        };

        tracing::info!(
            chain_id = resolved.chain_id,
            is_mock = resolved.is_mock,
            rpc_url = ?resolved.rpc_url,
            "Network resolved"
        );
        Ok(resolved)
    }

    /// Query `eth_chainId` from a URL (through a transient client) or a connected provider.
    pub async fn chain_id(&self, source: &ProviderSource) -> FhevmResult<u64> {
        let value = match source {
            ProviderSource::Url(url) => {
                let client = self.connector.connect(url)?;
                client.request("eth_chainId", json!([])).await?
            }
            ProviderSource::Provider(client) => client.request("eth_chainId", json!([])).await?,
        };
        parse_chain_id(&value)
    }

    /// Fetch relayer metadata from a local FHEVM hardhat node.
    ///
    /// Returns `None` unless the endpoint identifies itself as a hardhat node
    /// and answers `fhevm_relayer_metadata` with a usable payload.
    pub async fn fetch_relayer_metadata(&self, rpc_url: &str) -> Option<RelayerMetadata> {
        let client = match self.connector.connect(rpc_url) {
            Ok(client) => client,
            Err(e) => {
                tracing::debug!(rpc_url, error = %e, "Cannot connect to mock node");
                return None;
            }
        };

        if !is_dev_node(client.as_ref()).await {
            tracing::debug!(rpc_url, "Endpoint is not a hardhat node");
            return None;
        }

        match client.request("fhevm_relayer_metadata", json!([])).await {
            Ok(Value::Null) => None,
            Ok(value) => match serde_json::from_value::<RelayerMetadata>(value) {
                Ok(metadata) => Some(metadata),
                Err(e) => {
                    tracing::warn!(rpc_url, error = %e, "Malformed relayer metadata");
                    None
                }
            },
            Err(e) => {
                tracing::debug!(rpc_url, error = %e, "fhevm_relayer_metadata unavailable");
                None
            }
        }
    }
}

async fn is_dev_node(client: &dyn JsonRpcClient) -> bool {
    match client.request("web3_clientVersion", json!([])).await {
        Ok(Value::String(version)) => version.to_lowercase().contains(DEV_NODE_MARKER),
        Ok(_) => false,
        Err(e) => {
            tracing::debug!(error = %e, "web3_clientVersion failed");
            false
        }
    }
}

/// Chain ids arrive as `"0x7a69"` from providers; accept decimal strings and numbers too.
fn parse_chain_id(value: &Value) -> FhevmResult<u64> {
    match value {
        Value::String(s) => {
            let parsed = match s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
                Some(hex) => u64::from_str_radix(hex, 16),
                None => s.parse::<u64>(),
            };
            parsed.map_err(|_| FhevmError::Rpc(format!("Invalid chain id: {s}")))
        }
        Value::Number(n) => n
            .as_u64()
            .ok_or_else(|| FhevmError::Rpc(format!("Invalid chain id: {n}"))),
        other => Err(FhevmError::Rpc(format!("Invalid chain id: {other}"))),
    }
}
