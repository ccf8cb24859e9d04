// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Public key cache keyed by ACL contract address.
//!
//! Reads never fail: a store error is logged and reported as a miss, so a
//! broken cache only costs a network fetch.

use std::path::Path;
use std::sync::{Arc, OnceLock};
use std::time::Duration;

use tracing::{debug, warn};

use super::{CacheDatabase, CacheResult, CachedKeys, HotKeyCache, PublicKey, PublicParams};

const HOT_CAPACITY: usize = 16;
const HOT_TTL: Duration = Duration::from_secs(600);

static GLOBAL: OnceLock<Arc<KeyCache>> = OnceLock::new();

pub struct KeyCache {
    db: Option<Arc<CacheDatabase>>,
    hot: HotKeyCache,
}

impl KeyCache {
    /// Open (or create) a durable cache at `path`.
    pub fn open(path: &Path) -> CacheResult<Self> {
        Ok(Self::from_database(Arc::new(CacheDatabase::open(path)?)))
    }

    pub fn from_database(db: Arc<CacheDatabase>) -> Self {
        Self {
            db: Some(db),
            hot: HotKeyCache::new(HOT_CAPACITY, HOT_TTL),
        }
    }

    /// Cache with no durable storage. Lookups miss, writes are dropped.
    pub fn unavailable() -> Self {
        Self {
            db: None,
            hot: HotKeyCache::new(1, Duration::ZERO),
        }
    }

    /// Open `path`, degrading to [`KeyCache::unavailable`] if it cannot be opened.
    pub fn open_or_unavailable(path: &Path) -> Self {
        match Self::open(path) {
            Ok(cache) => cache,
            Err(e) => {
                warn!(path = %path.display(), error = %e, "Key cache unavailable, continuing without it");
                Self::unavailable()
            }
        }
    }

    /// Process-wide cache at the configured path, opened on first use.
    pub fn global() -> Arc<KeyCache> {
        let cache = GLOBAL.get_or_init(|| {
            Arc::new(Self::open_or_unavailable(&crate::config::cache_path_from_env()))
        });
        Arc::clone(cache)
    }

    pub fn is_durable(&self) -> bool {
        self.db.is_some()
    }

    /// Underlying database, shared with the permit store.
    pub fn database(&self) -> Option<Arc<CacheDatabase>> {
        self.db.clone()
    }

    /// Cached key material for `acl_address`. Missing halves are `None`.
    pub fn get(&self, acl_address: &str) -> CachedKeys {
        let Some(db) = &self.db else {
            return CachedKeys::default();
        };
        if let Some(hit) = self.hot.get(acl_address) {
            return hit;
        }

        let (public_key, public_params) = match (
            db.get_public_key(acl_address),
            db.get_public_params(acl_address),
        ) {
            (Ok(public_key), Ok(public_params)) => {
                let keys = CachedKeys {
                    public_key,
                    public_params,
                };
                self.hot.put(acl_address, keys.clone());
                (keys.public_key, keys.public_params)
            }
            // A failed read is a miss for this call only; it is not remembered.
            (public_key, public_params) => (
                public_key.unwrap_or_else(|e| {
                    warn!(acl_address, error = %e, "Failed to read cached public key");
                    None
                }),
                public_params.unwrap_or_else(|e| {
                    warn!(acl_address, error = %e, "Failed to read cached public params");
                    None
                }),
            ),
        };

        debug!(
            acl_address,
            has_key = public_key.is_some(),
            has_params = public_params.is_some(),
            "Key cache lookup"
        );
        CachedKeys {
            public_key,
            public_params,
        }
    }

    /// Store whichever halves are `Some`. `None` leaves that half untouched.
    pub fn set(
        &self,
        acl_address: &str,
        public_key: Option<&PublicKey>,
        public_params: Option<&PublicParams>,
    ) -> CacheResult<()> {
        let Some(db) = &self.db else {
            return Ok(());
        };
        if public_key.is_none() && public_params.is_none() {
            return Ok(());
        }
        self.hot.invalidate(acl_address);
        db.put_key_material(acl_address, public_key, public_params)
    }

    /// Remove both halves for `acl_address`.
    pub fn clear(&self, acl_address: &str) -> CacheResult<()> {
        let Some(db) = &self.db else {
            return Ok(());
        };
        self.hot.invalidate(acl_address);
        db.delete_key_material(acl_address)
    }
}
