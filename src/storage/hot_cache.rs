// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! LRU layer in front of the redb key store.
//!
//! Public keys are large; keeping the most recent lookups in memory avoids
//! re-reading them from disk on every build within one process.

use std::num::NonZeroUsize;
use std::sync::Mutex;
use std::time::{Duration, Instant};

use lru::LruCache;

use super::CachedKeys;

/// Cached lookup result + insertion timestamp.
struct HotEntry {
    keys: CachedKeys,
    inserted_at: Instant,
}

/// In-process LRU cache keyed by ACL address.
pub struct HotKeyCache {
    cache: Mutex<LruCache<String, HotEntry>>,
    ttl: Duration,
}

impl HotKeyCache {
    /// - `capacity`: Max number of ACL addresses to keep.
    /// - `ttl`: Time-to-live for each entry.
    pub fn new(capacity: usize, ttl: Duration) -> Self {
        Self {
            cache: Mutex::new(LruCache::new(
                NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN),
            )),
            ttl,
        }
    }

    /// Returns `None` if not cached or expired.
    pub fn get(&self, acl_address: &str) -> Option<CachedKeys> {
        let mut cache = self.cache.lock().ok()?;
        if let Some(entry) = cache.get(acl_address) {
            if entry.inserted_at.elapsed() < self.ttl {
                return Some(entry.keys.clone());
            }
            cache.pop(acl_address);
        }
        None
    }

    pub fn put(&self, acl_address: &str, keys: CachedKeys) {
        if let Ok(mut cache) = self.cache.lock() {
            cache.put(
                acl_address.to_string(),
                HotEntry {
                    keys,
                    inserted_at: Instant::now(),
                },
            );
        }
    }

    pub fn invalidate(&self, acl_address: &str) {
        if let Ok(mut cache) = self.cache.lock() {
            cache.pop(acl_address);
        }
    }
}
