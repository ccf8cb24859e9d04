// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Embedded key-material database backed by redb (pure Rust, ACID).
//!
//! ## Table Layout
//!
//! - `keyStore`: acl_address → encoded public key (`id_len:u32 BE | id | key bytes`)
//! - `paramsStore`: acl_address → serialized PublicParams (JSON bytes)
//! - `permits`: permit key → serialized DecryptionPermit (JSON bytes)
//!
//! Public keys are tens of megabytes, so they are stored as raw bytes rather
//! than JSON number arrays.

use std::path::Path;

use redb::{Database, ReadableDatabase, ReadableTable, TableDefinition};

use super::{PublicKey, PublicParams};
use crate::permit::DecryptionPermit;

// =============================================================================
// Table Definitions
// =============================================================================

const KEY_STORE: TableDefinition<&str, &[u8]> = TableDefinition::new("keyStore");

const PARAMS_STORE: TableDefinition<&str, &[u8]> = TableDefinition::new("paramsStore");

const PERMITS: TableDefinition<&str, &[u8]> = TableDefinition::new("permits");

// =============================================================================
// Error Type
// =============================================================================

#[derive(Debug, thiserror::Error)]
pub enum CacheError {
    #[error("redb error: {0}")]
    Redb(#[from] redb::Error),

    #[error("redb database error: {0}")]
    RedbDatabase(#[from] redb::DatabaseError),

    #[error("redb transaction error: {0}")]
    RedbTransaction(#[from] redb::TransactionError),

    #[error("redb table error: {0}")]
    RedbTable(#[from] redb::TableError),

    #[error("redb storage error: {0}")]
    RedbStorage(#[from] redb::StorageError),

    #[error("redb commit error: {0}")]
    RedbCommit(#[from] redb::CommitError),

    #[error("serialization error: {0}")]
    Serde(#[from] serde_json::Error),

    #[error("corrupt record: {0}")]
    Corrupt(String),
}

pub type CacheResult<T> = Result<T, CacheError>;

// =============================================================================
// Public key encoding
// =============================================================================

fn encode_public_key(key: &PublicKey) -> Vec<u8> {
    let id = key.id.as_bytes();
    let mut out = Vec::with_capacity(4 + id.len() + key.data.len());
    out.extend_from_slice(&(id.len() as u32).to_be_bytes());
    out.extend_from_slice(id);
    out.extend_from_slice(&key.data);
    out
}

fn decode_public_key(bytes: &[u8]) -> CacheResult<PublicKey> {
    let (len_bytes, rest) = bytes
        .split_first_chunk::<4>()
        .ok_or_else(|| CacheError::Corrupt("public key record too short".into()))?;
    let id_len = u32::from_be_bytes(*len_bytes) as usize;
    if rest.len() < id_len {
        return Err(CacheError::Corrupt("public key id truncated".into()));
    }
    let (id, data) = rest.split_at(id_len);
    let id = String::from_utf8(id.to_vec())
        .map_err(|_| CacheError::Corrupt("public key id is not UTF-8".into()))?;
    Ok(PublicKey {
        id,
        data: data.to_vec(),
    })
}

// =============================================================================
// CacheDatabase
// =============================================================================

/// Durable store for public key material and decryption permits.
pub struct CacheDatabase {
    db: Database,
}

impl CacheDatabase {
    /// Open (or create) the database at the given path.
    pub fn open(path: &Path) -> CacheResult<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).ok();
        }
        let db = Database::create(path)?;

        // Pre-create all tables so later read transactions don't fail
        let write_txn = db.begin_write()?;
        {
            let _ = write_txn.open_table(KEY_STORE)?;
            let _ = write_txn.open_table(PARAMS_STORE)?;
            let _ = write_txn.open_table(PERMITS)?;
        }
        write_txn.commit()?;

        Ok(Self { db })
    }

    // =========================================================================
    // Key material
    // =========================================================================

    pub fn get_public_key(&self, acl_address: &str) -> CacheResult<Option<PublicKey>> {
        let read_txn = self.db.begin_read()?;
        let table = read_txn.open_table(KEY_STORE)?;
        match table.get(acl_address)? {
            Some(value) => Ok(Some(decode_public_key(value.value())?)),
            None => Ok(None),
        }
    }

    pub fn get_public_params(&self, acl_address: &str) -> CacheResult<Option<PublicParams>> {
        let read_txn = self.db.begin_read()?;
        let table = read_txn.open_table(PARAMS_STORE)?;
        match table.get(acl_address)? {
            Some(value) => Ok(Some(serde_json::from_slice(value.value())?)),
            None => Ok(None),
        }
    }

    /// Write whichever halves are present in one transaction.
    pub fn put_key_material(
        &self,
        acl_address: &str,
        public_key: Option<&PublicKey>,
        public_params: Option<&PublicParams>,
    ) -> CacheResult<()> {
        let params_json = public_params.map(serde_json::to_vec).transpose()?;

        let write_txn = self.db.begin_write()?;
        {
            if let Some(key) = public_key {
                let mut table = write_txn.open_table(KEY_STORE)?;
                table.insert(acl_address, encode_public_key(key).as_slice())?;
            }
            if let Some(json) = &params_json {
                let mut table = write_txn.open_table(PARAMS_STORE)?;
                table.insert(acl_address, json.as_slice())?;
            }
        }
        write_txn.commit()?;
        Ok(())
    }

    /// Remove both halves for an address.
    pub fn delete_key_material(&self, acl_address: &str) -> CacheResult<()> {
        let write_txn = self.db.begin_write()?;
        {
            let mut keys = write_txn.open_table(KEY_STORE)?;
            keys.remove(acl_address)?;
            let mut params = write_txn.open_table(PARAMS_STORE)?;
            params.remove(acl_address)?;
        }
        write_txn.commit()?;
        Ok(())
    }

    /// Store a key record as-is, bypassing the encoding.
    #[cfg(test)]
    pub(crate) fn put_raw_public_key(&self, acl_address: &str, bytes: &[u8]) -> CacheResult<()> {
        let write_txn = self.db.begin_write()?;
        {
            let mut table = write_txn.open_table(KEY_STORE)?;
            table.insert(acl_address, bytes)?;
        }
        write_txn.commit()?;
        Ok(())
    }

    // =========================================================================
    // Permits
    // =========================================================================

    pub fn get_permit(&self, key: &str) -> CacheResult<Option<DecryptionPermit>> {
        let read_txn = self.db.begin_read()?;
        let table = read_txn.open_table(PERMITS)?;
        match table.get(key)? {
            Some(value) => Ok(Some(serde_json::from_slice(value.value())?)),
            None => Ok(None),
        }
    }

    pub fn put_permit(&self, key: &str, permit: &DecryptionPermit) -> CacheResult<()> {
        let json = serde_json::to_vec(permit)?;
        let write_txn = self.db.begin_write()?;
        {
            let mut table = write_txn.open_table(PERMITS)?;
            table.insert(key, json.as_slice())?;
        }
        write_txn.commit()?;
        Ok(())
    }

    pub fn delete_permit(&self, key: &str) -> CacheResult<()> {
        let write_txn = self.db.begin_write()?;
        {
            let mut table = write_txn.open_table(PERMITS)?;
            table.remove(key)?;
        }
        write_txn.commit()?;
        Ok(())
    }
}
