// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! JSON-RPC access and network resolution.
//!
//! A build is driven either by a plain RPC endpoint URL or by an already
//! connected wallet-style provider. Both are reduced to [`JsonRpcClient`]
//! so the resolver only ever issues `request(method, params)` calls.

pub mod client;
pub mod resolver;

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;

use crate::error::FhevmResult;

pub use client::{AlloyRpcClient, HttpConnector};
pub use resolver::{
    MockChainOverrides, MockChains, NetworkResolver, RelayerMetadata, ResolvedNetwork,
    DEFAULT_MOCK_CHAIN_ID, DEFAULT_MOCK_RPC_URL,
};

/// Minimal EIP-1193 style request interface.
#[async_trait]
pub trait JsonRpcClient: Send + Sync {
    async fn request(&self, method: &str, params: Value) -> FhevmResult<Value>;
}

/// Opens transient clients for RPC endpoint URLs.
pub trait RpcConnector: Send + Sync {
    fn connect(&self, url: &str) -> FhevmResult<Arc<dyn JsonRpcClient>>;
}

/// What a build runs against.
#[derive(Clone)]
pub enum ProviderSource {
    /// Plain RPC endpoint.
    Url(String),
    /// Connected provider handle (e.g. an injected wallet).
    Provider(Arc<dyn JsonRpcClient>),
}

impl ProviderSource {
    pub fn url(url: impl Into<String>) -> Self {
        ProviderSource::Url(url.into())
    }

    pub fn provider(client: Arc<dyn JsonRpcClient>) -> Self {
        ProviderSource::Provider(client)
    }

    pub fn as_url(&self) -> Option<&str> {
        match self {
            ProviderSource::Url(url) => Some(url),
            ProviderSource::Provider(_) => None,
        }
    }

    /// Same endpoint string, or the same provider handle.
    pub fn same_as(&self, other: &ProviderSource) -> bool {
        match (self, other) {
            (ProviderSource::Url(a), ProviderSource::Url(b)) => a == b,
            (ProviderSource::Provider(a), ProviderSource::Provider(b)) => Arc::ptr_eq(a, b),
            _ => false,
        }
    }
}

impl fmt::Debug for ProviderSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProviderSource::Url(url) => f.debug_tuple("Url").field(url).finish(),
            ProviderSource::Provider(_) => f.write_str("Provider(..)"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::FakeRpc;

    #[test]
    fn same_as_compares_urls_and_handles() {
        let a = ProviderSource::url("http://localhost:8545");
        let b = ProviderSource::url("http://localhost:8545");
        let c = ProviderSource::url("http://127.0.0.1:8545");
        assert!(a.same_as(&b));
        assert!(!a.same_as(&c));

        let rpc: Arc<dyn JsonRpcClient> = Arc::new(FakeRpc::new());
        let p1 = ProviderSource::provider(Arc::clone(&rpc));
        let p2 = ProviderSource::provider(rpc);
        let p3 = ProviderSource::provider(Arc::new(FakeRpc::new()));
        assert!(p1.same_as(&p2));
        assert!(!p1.same_as(&p3));
        assert!(!p1.same_as(&a));
    }

    #[test]
    fn debug_hides_provider_handle() {
        let p = ProviderSource::provider(Arc::new(FakeRpc::new()));
        assert_eq!(format!("{p:?}"), "Provider(..)");
        assert_eq!(p.as_url(), None);
    }
}
