// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! EIP-712 user-decryption permits.
//!
//! A permit authorizes an ephemeral keypair (generated by the instance) to
//! decrypt handles owned by a fixed set of contracts for a bounded number of
//! days. Signing prompts the user, so permits are stored and reused while
//! they are still valid.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};

use alloy::primitives::{keccak256, Address, Bytes, B256, U256};
use alloy::signers::local::PrivateKeySigner;
use alloy::signers::Signer;
use alloy::sol;
use alloy::sol_types::{Eip712Domain, SolStruct};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::error::{FhevmError, FhevmResult};
use crate::sdk::{DecryptionDomain, FhevmInstance};
use crate::storage::CacheDatabase;

pub const DEFAULT_DURATION_DAYS: u64 = 365;

const SECONDS_PER_DAY: u64 = 86_400;
const DOMAIN_NAME: &str = "Decryption";
const DOMAIN_VERSION: &str = "1";

sol! {
    struct UserDecryptRequestVerification {
        bytes publicKey;
        address[] contractAddresses;
        uint256 contractsChainId;
        uint256 startTimestamp;
        uint256 durationDays;
    }
}

// =============================================================================
// Permit
// =============================================================================

/// Signed authorization plus the ephemeral keypair it covers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DecryptionPermit {
    pub public_key: String,
    pub private_key: String,
    /// 65-byte signature, 0x-prefixed hex.
    pub signature: String,
    /// Sorted ascending.
    pub contract_addresses: Vec<Address>,
    pub user_address: Address,
    /// Unix seconds.
    pub start_timestamp: u64,
    pub duration_days: u64,
}

impl DecryptionPermit {
    pub fn expires_at(&self) -> u64 {
        self.start_timestamp
            .saturating_add(self.duration_days.saturating_mul(SECONDS_PER_DAY))
    }

    pub fn is_valid_at(&self, now: u64) -> bool {
        now < self.expires_at()
    }

    /// Whether this permit was issued for exactly these contracts.
    pub fn covers(&self, contracts: &[Address]) -> bool {
        self.contract_addresses == sorted(contracts)
    }
}

fn sorted(contracts: &[Address]) -> Vec<Address> {
    let mut out = contracts.to_vec();
    out.sort();
    out.dedup();
    out
}

/// EIP-712 digest the user signs.
pub fn signing_hash(
    domain: &DecryptionDomain,
    public_key: &str,
    contracts: &[Address],
    start_timestamp: u64,
    duration_days: u64,
) -> FhevmResult<B256> {
    let public_key = alloy::hex::decode(public_key)
        .map_err(|e| FhevmError::Signing(format!("Invalid keypair public key: {e}")))?;

    let message = UserDecryptRequestVerification {
        publicKey: Bytes::from(public_key),
        contractAddresses: sorted(contracts),
        contractsChainId: U256::from(domain.contracts_chain_id),
        startTimestamp: U256::from(start_timestamp),
        durationDays: U256::from(duration_days),
    };
    let eip712 = Eip712Domain::new(
        Some(DOMAIN_NAME.into()),
        Some(DOMAIN_VERSION.into()),
        Some(U256::from(domain.chain_id)),
        Some(domain.verifying_contract),
        None,
    );
    Ok(message.eip712_signing_hash(&eip712))
}

/// Storage key for a permit: chain, user, sorted contracts and optionally the keypair.
pub fn permit_key(
    domain: &DecryptionDomain,
    user: Address,
    contracts: &[Address],
    public_key: Option<&str>,
) -> String {
    let mut buf = Vec::with_capacity(8 + 20 * (contracts.len() + 1));
    buf.extend_from_slice(&domain.contracts_chain_id.to_be_bytes());
    buf.extend_from_slice(user.as_slice());
    for contract in sorted(contracts) {
        buf.extend_from_slice(contract.as_slice());
    }
    if let Some(pk) = public_key {
        buf.extend_from_slice(pk.as_bytes());
    }
    alloy::hex::encode(keccak256(&buf))
}

// =============================================================================
// Signers
// =============================================================================

/// Whoever authorizes the decryption (usually the connected wallet).
#[async_trait]
pub trait PermitSigner: Send + Sync {
    fn address(&self) -> Address;

    /// Sign a 32-byte EIP-712 digest, returning the 65-byte signature.
    async fn sign_digest(&self, digest: B256) -> FhevmResult<Bytes>;
}

/// Signs with a private key held in process.
pub struct LocalPermitSigner {
    signer: PrivateKeySigner,
}

impl LocalPermitSigner {
    /// Accepts a 32-byte hex key, with or without `0x`.
    pub fn from_hex(private_key_hex: &str) -> FhevmResult<Self> {
        let key_bytes = alloy::hex::decode(private_key_hex.trim())
            .map_err(|e| FhevmError::Signing(format!("Invalid private key: {e}")))?;
        let signer = PrivateKeySigner::from_slice(&key_bytes)
            .map_err(|e| FhevmError::Signing(format!("Invalid private key: {e}")))?;
        Ok(Self { signer })
    }
}

#[async_trait]
impl PermitSigner for LocalPermitSigner {
    fn address(&self) -> Address {
        self.signer.address()
    }

    async fn sign_digest(&self, digest: B256) -> FhevmResult<Bytes> {
        let signature = self
            .signer
            .sign_hash(&digest)
            .await
            .map_err(|e| FhevmError::Signing(e.to_string()))?;
        Ok(Bytes::from(signature.as_bytes().to_vec()))
    }
}

// =============================================================================
// Store
// =============================================================================

/// Permits keyed by [`permit_key`]. Durable when backed by the key cache database.
pub struct PermitStore {
    db: Option<Arc<CacheDatabase>>,
    memory: Mutex<HashMap<String, DecryptionPermit>>,
}

impl PermitStore {
    pub fn new(db: Option<Arc<CacheDatabase>>) -> Self {
        Self {
            db,
            memory: Mutex::new(HashMap::new()),
        }
    }

    pub fn in_memory() -> Self {
        Self::new(None)
    }

    pub fn get(&self, key: &str) -> Option<DecryptionPermit> {
        match &self.db {
            Some(db) => db.get_permit(key).unwrap_or_else(|e| {
                warn!(error = %e, "Failed to read stored permit");
                None
            }),
            None => self
                .memory
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .get(key)
                .cloned(),
        }
    }

    pub fn put(&self, key: &str, permit: &DecryptionPermit) -> FhevmResult<()> {
        match &self.db {
            Some(db) => db.put_permit(key, permit)?,
            None => {
                self.memory
                    .lock()
                    .unwrap_or_else(PoisonError::into_inner)
                    .insert(key.to_string(), permit.clone());
            }
        }
        Ok(())
    }

    pub fn remove(&self, key: &str) -> FhevmResult<()> {
        match &self.db {
            Some(db) => db.delete_permit(key)?,
            None => {
                self.memory
                    .lock()
                    .unwrap_or_else(PoisonError::into_inner)
                    .remove(key);
            }
        }
        Ok(())
    }
}

// =============================================================================
// Load or sign
// =============================================================================

/// Reuse a stored, still-valid permit for `contracts`, or sign a new one.
pub async fn load_or_sign(
    instance: &dyn FhevmInstance,
    contracts: &[Address],
    signer: &dyn PermitSigner,
    store: &PermitStore,
) -> FhevmResult<DecryptionPermit> {
    let now = u64::try_from(chrono::Utc::now().timestamp()).unwrap_or_default();
    load_or_sign_at(instance, contracts, signer, store, now, DEFAULT_DURATION_DAYS).await
}

/// [`load_or_sign`] with an explicit clock and duration.
pub async fn load_or_sign_at(
    instance: &dyn FhevmInstance,
    contracts: &[Address],
    signer: &dyn PermitSigner,
    store: &PermitStore,
    now: u64,
    duration_days: u64,
) -> FhevmResult<DecryptionPermit> {
    if contracts.is_empty() {
        return Err(FhevmError::Signing("No contract addresses to authorize".into()));
    }

    let domain = instance.decryption_domain();
    let user = signer.address();
    let key = permit_key(&domain, user, contracts, None);

    if let Some(permit) = store.get(&key) {
        if permit.is_valid_at(now) && permit.covers(contracts) {
            debug!(%user, "Reusing stored decryption permit");
            return Ok(permit);
        }
        debug!(%user, expires_at = permit.expires_at(), "Stored decryption permit expired");
    }

    let keypair = instance.generate_keypair();
    let digest = signing_hash(&domain, &keypair.public_key, contracts, now, duration_days)?;
    let signature = signer.sign_digest(digest).await?;

    let permit = DecryptionPermit {
        public_key: keypair.public_key,
        private_key: keypair.private_key,
        signature: signature.to_string(),
        contract_addresses: sorted(contracts),
        user_address: user,
        start_timestamp: now,
        duration_days,
    };
    store.put(&key, &permit)?;

    info!(%user, contracts = contracts.len(), duration_days, "Signed new decryption permit");
    Ok(permit)
}
