// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Key Material Storage
//!
//! The FHE public key and its public params are fetched from the relayer the
//! first time an instance is built for an ACL address. They are persisted so
//! later builds can hand them straight to the SDK.
//!
//! ## Storage Layout
//!
//! ```text
//! fhevm-keys.redb
//!   keyStore     acl_address -> public key (id + raw bytes)
//!   paramsStore  acl_address -> public params (2048-bit CRS)
//!   permits      permit key  -> signed decryption permit
//! ```
//!
//! A hot LRU sits in front of the database. When the database cannot be
//! opened the cache degrades to memory-only and every build fetches keys
//! from the network.

pub mod database;
pub mod hot_cache;
pub mod key_cache;

use serde::{Deserialize, Serialize};

pub use database::{CacheDatabase, CacheError, CacheResult};
pub use hot_cache::HotKeyCache;
pub use key_cache::KeyCache;

/// Size tag of the only public params the pipeline caches.
pub const PUBLIC_PARAMS_SIZE: u32 = 2048;

/// FHE public key as returned by an instance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PublicKey {
    pub id: String,
    pub data: Vec<u8>,
}

/// Public params (CRS) for a given size tag.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PublicParams {
    pub version: u32,
    pub seed: String,
    pub delta: String,
}

/// Result of a cache lookup. Either half may be missing.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CachedKeys {
    pub public_key: Option<PublicKey>,
    pub public_params: Option<PublicParams>,
}

impl CachedKeys {
    pub fn is_empty(&self) -> bool {
        self.public_key.is_none() && self.public_params.is_none()
    }
}
