// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Error taxonomy for the instance acquisition pipeline.
//!
//! | Variant | Meaning | Retry |
//! |---------|---------|-------|
//! | `Cancelled` | build abandoned through its cancellation token | never surfaced as a failure |
//! | `EnvironmentUnavailable` | no module-capable runtime | no |
//! | `SdkLoad` | primary and fallback sources both failed | `refresh()` |
//! | `SdkInit` | vendor `init_sdk` returned false or failed | `refresh()` |
//! | `InvalidConfiguration` | preset missing or ACL address malformed | needs an external fix |
//! | `InstanceConstruction` | vendor `create_instance` failed | `refresh()` |
//!
//! Corrupt cached key material is not a variant: the builder recovers from it
//! once and only the retry's error escapes, as `InstanceConstruction`.

use crate::sdk::SdkError;
use crate::storage::CacheError;

#[derive(Debug, thiserror::Error)]
pub enum FhevmError {
    #[error("FHEVM operation was cancelled")]
    Cancelled,

    #[error("Environment unavailable: {0}")]
    EnvironmentUnavailable(String),

    #[error("Relayer SDK load failed: {0}")]
    SdkLoad(String),

    #[error("Relayer SDK init failed: {0}")]
    SdkInit(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),

    /// Vendor construction failure, message kept verbatim.
    #[error(transparent)]
    InstanceConstruction(SdkError),

    #[error("RPC error: {0}")]
    Rpc(String),

    #[error("Encryption failed: {0}")]
    Encryption(String),

    #[error("Decryption failed: {0}")]
    Decryption(String),

    #[error("Signing failed: {0}")]
    Signing(String),

    #[error("Storage error: {0}")]
    Storage(#[from] CacheError),
}

impl FhevmError {
    /// True for the cancellation condition, which consumers must not show as a failure.
    pub fn is_cancelled(&self) -> bool {
        matches!(self, FhevmError::Cancelled)
    }

    /// Stable name of the error kind, for display next to the message.
    pub fn name(&self) -> &'static str {
        match self {
            FhevmError::Cancelled => "FhevmAbortError",
            FhevmError::EnvironmentUnavailable(_) => "EnvironmentUnavailable",
            FhevmError::SdkLoad(_) => "SdkLoadFailure",
            FhevmError::SdkInit(_) => "SdkInitFailure",
            FhevmError::InvalidConfiguration(_) => "InvalidConfiguration",
            FhevmError::InstanceConstruction(_) => "InstanceConstructionFailure",
            FhevmError::Rpc(_) => "RpcError",
            FhevmError::Encryption(_) => "EncryptionError",
            FhevmError::Decryption(_) => "DecryptionError",
            FhevmError::Signing(_) => "SigningError",
            FhevmError::Storage(_) => "StorageError",
        }
    }
}

pub type FhevmResult<T> = Result<T, FhevmError>;
