// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Encrypted air-quality readings.
//!
//! A report carries four 32-bit measurements. They are encrypted together
//! into one input (one handle each, shared proof) and decrypted back with a
//! user-decrypt permit.

use alloy::primitives::{Address, Bytes, B256, U256};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{FhevmError, FhevmResult};
use crate::permit::DecryptionPermit;
use crate::sdk::{FhevmInstance, HandleContractPair};

/// Clear-text measurements of one report.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AirQualityReading {
    /// PM2.5 in µg/m³.
    pub pm25: u32,
    /// PM10 in µg/m³.
    pub pm10: u32,
    /// Visibility in meters.
    pub visibility: u32,
    /// Smell intensity score.
    pub smell: u32,
}

impl AirQualityReading {
    /// Values in submission order.
    pub fn values(&self) -> [u32; 4] {
        [self.pm25, self.pm10, self.visibility, self.smell]
    }
}

/// Handles in submission order plus the input proof.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncryptedReading {
    pub handles: [B256; 4],
    pub input_proof: Bytes,
}

/// Encrypt a reading for `contract`, bound to `user`.
pub async fn encrypt_reading(
    instance: &dyn FhevmInstance,
    contract: Address,
    user: Address,
    reading: &AirQualityReading,
) -> FhevmResult<EncryptedReading> {
    let mut input = instance.create_encrypted_input(contract, user);
    for value in reading.values() {
        input.add32(value);
    }

    let encrypted = input
        .encrypt()
        .await
        .map_err(|e| FhevmError::Encryption(e.to_string()))?;

    let handles: [B256; 4] = encrypted.handles.as_slice().try_into().map_err(|_| {
        FhevmError::Encryption(format!(
            "Expected 4 handles, got {}",
            encrypted.handles.len()
        ))
    })?;

    debug!(%contract, %user, "Encrypted air-quality reading");
    Ok(EncryptedReading {
        handles,
        input_proof: encrypted.input_proof,
    })
}

/// Decrypt the four handles of a report stored by `contract`.
pub async fn decrypt_reading(
    instance: &dyn FhevmInstance,
    contract: Address,
    handles: &[B256; 4],
    permit: &DecryptionPermit,
) -> FhevmResult<AirQualityReading> {
    let pairs: Vec<HandleContractPair> = handles
        .iter()
        .map(|handle| HandleContractPair {
            handle: *handle,
            contract_address: contract,
        })
        .collect();

    let clear = instance
        .user_decrypt(&pairs, permit)
        .await
        .map_err(|e| FhevmError::Decryption(e.to_string()))?;

    let value = |handle: &B256| -> FhevmResult<u32> {
        let raw: U256 = *clear
            .get(handle)
            .ok_or_else(|| FhevmError::Decryption(format!("No clear value for handle {handle}")))?;
        u32::try_from(raw)
            .map_err(|_| FhevmError::Decryption(format!("Value for handle {handle} exceeds 32 bits")))
    };

    Ok(AirQualityReading {
        pm25: value(&handles[0])?,
        pm10: value(&handles[1])?,
        visibility: value(&handles[2])?,
        smell: value(&handles[3])?,
    })
}
