// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Runtime Configuration
//!
//! Environment variable names and default values. Settings are read from
//! the environment once, at startup.
//!
//! ## Environment Variables
//!
//! | Variable | Description | Default |
//! |----------|-------------|---------|
//! | `FHEVM_SDK_CDN_URL` | Primary relayer SDK bundle | `https://cdn.zama.ai/relayer-sdk-js/0.2.0/relayer-sdk-js.umd.cjs` |
//! | `FHEVM_SDK_LOCAL_BUNDLE` | Fallback bundle shipped with the app | `public/relayer-sdk-js.umd.cjs` |
//! | `FHEVM_SDK_INTEGRITY` | `sha256-`/`sha384-`/`sha512-` digest of the CDN bundle | Optional |
//! | `FHEVM_CACHE_PATH` | redb file for public keys and permits | `./data/fhevm-keys.redb` |
//! | `FHEVM_GATEWAY_URL` | Gateway URL passed to `init_sdk` | Optional |
//! | `FHEVM_MOCK_CHAINS` | Extra mock chains, `id=url,id=url` | Optional |
//! | `FHEVM_RPC_URL` | RPC endpoint the probe resolves | `http://localhost:8545` |
//! | `FHEVM_ACL_ADDRESS` | ACL address the probe inspects in the cache | Optional |
//! | `LOG_FORMAT` | Logging format (`json` or `pretty`) | `pretty` |
//! | `RUST_LOG` | Log level filter | `info` |

use std::path::PathBuf;

use crate::error::FhevmResult;
use crate::network::{MockChainOverrides, MockChains, DEFAULT_MOCK_RPC_URL};

pub const SDK_CDN_URL_ENV: &str = "FHEVM_SDK_CDN_URL";

pub const DEFAULT_SDK_CDN_URL: &str =
    "https://cdn.zama.ai/relayer-sdk-js/0.2.0/relayer-sdk-js.umd.cjs";

pub const SDK_LOCAL_BUNDLE_ENV: &str = "FHEVM_SDK_LOCAL_BUNDLE";

pub const DEFAULT_SDK_LOCAL_BUNDLE: &str = "public/relayer-sdk-js.umd.cjs";

/// Subresource-integrity value checked against the CDN bundle.
pub const SDK_INTEGRITY_ENV: &str = "FHEVM_SDK_INTEGRITY";

/// Environment variable name for the key cache database path.
///
/// The file is created on first use. If it cannot be opened the cache runs
/// without durable storage.
pub const CACHE_PATH_ENV: &str = "FHEVM_CACHE_PATH";

pub const DEFAULT_CACHE_PATH: &str = "./data/fhevm-keys.redb";

pub const GATEWAY_URL_ENV: &str = "FHEVM_GATEWAY_URL";

/// Comma separated `chain_id=rpc_url` pairs merged over the built-in mock table.
pub const MOCK_CHAINS_ENV: &str = "FHEVM_MOCK_CHAINS";

pub const RPC_URL_ENV: &str = "FHEVM_RPC_URL";

pub const ACL_ADDRESS_ENV: &str = "FHEVM_ACL_ADDRESS";

pub const LOG_FORMAT_ENV: &str = "LOG_FORMAT";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum LogFormat {
    Json,
    #[default]
    Pretty,
}

/// Settings resolved from the environment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FhevmSettings {
    pub sdk_cdn_url: String,
    pub sdk_local_bundle: PathBuf,
    pub sdk_integrity: Option<String>,
    pub cache_path: PathBuf,
    pub gateway_url: Option<String>,
    pub mock_chains: Option<MockChainOverrides>,
    pub rpc_url: String,
    pub acl_address: Option<String>,
    pub log_format: LogFormat,
}

impl FhevmSettings {
    pub fn from_env() -> FhevmResult<Self> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Build settings from any variable lookup. Empty values count as unset.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> FhevmResult<Self> {
        let get = |name: &str| lookup(name).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        let mock_chains = get(MOCK_CHAINS_ENV)
            .map(|raw| MockChains::parse_overrides(&raw))
            .transpose()?;

        let log_format = match get(LOG_FORMAT_ENV).as_deref() {
            Some(v) if v.eq_ignore_ascii_case("json") => LogFormat::Json,
            _ => LogFormat::Pretty,
        };

        Ok(Self {
            sdk_cdn_url: get(SDK_CDN_URL_ENV).unwrap_or_else(|| DEFAULT_SDK_CDN_URL.to_string()),
            sdk_local_bundle: get(SDK_LOCAL_BUNDLE_ENV)
                .unwrap_or_else(|| DEFAULT_SDK_LOCAL_BUNDLE.to_string())
                .into(),
            sdk_integrity: get(SDK_INTEGRITY_ENV),
            cache_path: get(CACHE_PATH_ENV)
                .unwrap_or_else(|| DEFAULT_CACHE_PATH.to_string())
                .into(),
            gateway_url: get(GATEWAY_URL_ENV),
            mock_chains,
            rpc_url: get(RPC_URL_ENV).unwrap_or_else(|| DEFAULT_MOCK_RPC_URL.to_string()),
            acl_address: get(ACL_ADDRESS_ENV),
            log_format,
        })
    }
}

/// Key cache path from `FHEVM_CACHE_PATH`, or the default.
pub fn cache_path_from_env() -> PathBuf {
    std::env::var(CACHE_PATH_ENV)
        .ok()
        .filter(|v| !v.trim().is_empty())
        .unwrap_or_else(|| DEFAULT_CACHE_PATH.to_string())
        .into()
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;
    use crate::error::FhevmError;

    fn settings(vars: &[(&str, &str)]) -> FhevmResult<FhevmSettings> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        FhevmSettings::from_lookup(|name| vars.get(name).cloned())
    }

    #[test]
    fn defaults() {
        let s = settings(&[]).unwrap();
        assert_eq!(s.sdk_cdn_url, DEFAULT_SDK_CDN_URL);
        assert_eq!(s.sdk_local_bundle, PathBuf::from(DEFAULT_SDK_LOCAL_BUNDLE));
        assert_eq!(s.cache_path, PathBuf::from(DEFAULT_CACHE_PATH));
        assert_eq!(s.rpc_url, "http://localhost:8545");
        assert_eq!(s.log_format, LogFormat::Pretty);
        assert!(s.sdk_integrity.is_none());
        assert!(s.gateway_url.is_none());
        assert!(s.mock_chains.is_none());
    }

    #[test]
    fn overrides_and_blank_values() {
        let s = settings(&[
            (GATEWAY_URL_ENV, "https://gateway.example"),
            (MOCK_CHAINS_ENV, "1337=http://127.0.0.1:9545"),
            (LOG_FORMAT_ENV, "JSON"),
            (ACL_ADDRESS_ENV, "  "),
        ])
        .unwrap();
        assert_eq!(s.gateway_url.as_deref(), Some("https://gateway.example"));
        assert_eq!(
            s.mock_chains.unwrap().get(&1337).map(String::as_str),
            Some("http://127.0.0.1:9545")
        );
        assert_eq!(s.log_format, LogFormat::Json);
        assert!(s.acl_address.is_none());
    }

    #[test]
    fn malformed_mock_chains_fail() {
        let err = settings(&[(MOCK_CHAINS_ENV, "not-a-pair")]).unwrap_err();
        assert!(matches!(err, FhevmError::InvalidConfiguration(_)));
    }
}
