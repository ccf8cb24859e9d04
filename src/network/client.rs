// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! alloy-backed JSON-RPC client.

use std::borrow::Cow;
use std::sync::Arc;

use alloy::providers::{Provider, ProviderBuilder};
use async_trait::async_trait;
use serde_json::Value;

use super::{JsonRpcClient, RpcConnector};
use crate::error::{FhevmError, FhevmResult};

/// Raw JSON-RPC calls over any alloy provider.
pub struct AlloyRpcClient<P> {
    provider: P,
}

impl<P> AlloyRpcClient<P> {
    pub fn new(provider: P) -> Self {
        Self { provider }
    }
}

#[async_trait]
impl<P> JsonRpcClient for AlloyRpcClient<P>
where
    P: Provider + Send + Sync,
{
    async fn request(&self, method: &str, params: Value) -> FhevmResult<Value> {
        self.provider
            .raw_request::<Value, Value>(Cow::Owned(method.to_string()), params)
            .await
            .map_err(|e| FhevmError::Rpc(format!("{method}: {e}")))
    }
}

/// Connects to endpoint URLs with an alloy HTTP provider.
#[derive(Debug, Clone, Copy, Default)]
pub struct HttpConnector;

impl RpcConnector for HttpConnector {
    fn connect(&self, url: &str) -> FhevmResult<Arc<dyn JsonRpcClient>> {
        let url: url::Url = url
            .parse()
            .map_err(|e: url::ParseError| FhevmError::Rpc(format!("Invalid RPC URL {url}: {e}")))?;

        let provider = ProviderBuilder::new().connect_http(url);
        Ok(Arc::new(AlloyRpcClient::new(provider)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_malformed_url() {
        let err = HttpConnector.connect("not a url").err().unwrap();
        assert!(matches!(err, FhevmError::Rpc(ref m) if m.contains("Invalid RPC URL")));
    }

    #[test]
    fn connects_lazily() {
        // No request is issued until `request` is called.
        assert!(HttpConnector.connect("http://localhost:8545").is_ok());
    }
}
