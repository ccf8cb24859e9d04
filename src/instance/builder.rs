// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Builds one FHEVM instance.
//!
//! ## Flow
//!
//! 1. Resolve chain id and mock status from the provider source
//! 2. Mock chain with relayer metadata: build through the mock factory and stop
//! 3. Load the relayer SDK if needed (raced against cancellation)
//! 4. Initialize the SDK if needed
//! 5. Pick the network preset and validate its ACL address
//! 6. Look up cached key material for that address
//! 7. Create the instance, then cache the keys it ended up using
//!
//! A construction failure caused by unreadable cached keys clears the cache
//! entry and retries once without keys. The token is checked after every
//! await; a cancelled build returns [`FhevmError::Cancelled`] and never a
//! half-built instance.
//!
//! Key cache reads and writes go through `spawn_blocking`: redb is
//! synchronous and public keys run to megabytes.

use std::sync::Arc;

use alloy::primitives::Address;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::{BuildPhase, MockInstanceFactory};
use crate::config::FhevmSettings;
use crate::error::{FhevmError, FhevmResult};
use crate::network::{HttpConnector, MockChainOverrides, NetworkResolver, ProviderSource};
use crate::sdk::{
    initialize, FhevmInstance, InitOptions, InstanceConfig, NetworkPreset, PresetName,
    RelayerSdk, SdkLinker, SdkLoader, SdkRuntime,
};
use crate::storage::{CachedKeys, KeyCache, PUBLIC_PARAMS_SIZE};

/// Everything a build needs, shared between builds.
pub struct InstanceBuilder {
    resolver: NetworkResolver,
    loader: Arc<SdkLoader>,
    keys: Arc<KeyCache>,
    init_options: InitOptions,
    mock_factory: Option<Arc<dyn MockInstanceFactory>>,
}

impl InstanceBuilder {
    pub fn new(resolver: NetworkResolver, loader: Arc<SdkLoader>, keys: Arc<KeyCache>) -> Self {
        Self {
            resolver,
            loader,
            keys,
            init_options: InitOptions::default(),
            mock_factory: None,
        }
    }

    /// HTTP JSON-RPC, CDN bundle with local fallback, process-wide SDK runtime.
    ///
    /// Without `mock_factory`, builds against a hardhat node that reports
    /// relayer metadata fail with [`FhevmError::InvalidConfiguration`].
    pub fn from_settings(
        settings: &FhevmSettings,
        linker: Arc<dyn SdkLinker>,
        keys: Arc<KeyCache>,
        mock_factory: Option<Arc<dyn MockInstanceFactory>>,
    ) -> FhevmResult<Self> {
        let loader = SdkLoader::from_settings(SdkRuntime::global(), settings, linker)?;
        let mut builder = Self::new(
            NetworkResolver::new(Arc::new(HttpConnector)),
            Arc::new(loader),
            keys,
        )
        .with_init_options(InitOptions {
            gateway_url: settings.gateway_url.clone(),
        });
        builder.mock_factory = mock_factory;
        Ok(builder)
    }

    /// Options handed unchanged to the SDK's `init_sdk`.
    pub fn with_init_options(mut self, options: InitOptions) -> Self {
        self.init_options = options;
        self
    }

    pub fn with_mock_factory(mut self, factory: Arc<dyn MockInstanceFactory>) -> Self {
        self.mock_factory = Some(factory);
        self
    }

    pub fn runtime(&self) -> &Arc<SdkRuntime> {
        self.loader.runtime()
    }

    pub fn key_cache(&self) -> &Arc<KeyCache> {
        &self.keys
    }

    pub fn resolver(&self) -> &NetworkResolver {
        &self.resolver
    }

    /// Run one build against `source`.
    pub async fn build(
        &self,
        source: &ProviderSource,
        mock_overrides: Option<&MockChainOverrides>,
        cancel: &CancellationToken,
        on_phase: &(dyn Fn(BuildPhase) + Send + Sync),
    ) -> FhevmResult<Arc<dyn FhevmInstance>> {
        ensure_live(cancel)?;

        let network = self.resolver.resolve(source, mock_overrides).await?;
        ensure_live(cancel)?;

        if network.is_mock {
            if let Some(instance) = self
                .try_mock(network.chain_id, network.rpc_url.as_deref(), cancel, on_phase)
                .await?
            {
                return Ok(instance);
            }
        }
        ensure_live(cancel)?;

        let runtime = Arc::clone(self.loader.runtime());

        if !self.loader.is_loaded() {
            on_phase(BuildPhase::SdkLoading);
            tokio::select! {
                biased;
                _ = cancel.cancelled() => return Err(FhevmError::Cancelled),
                loaded = self.loader.load() => loaded?,
            }
            ensure_live(cancel)?;
            on_phase(BuildPhase::SdkLoaded);
        }

        if !runtime.is_initialized() {
            on_phase(BuildPhase::SdkInitializing);
            initialize(&runtime, &self.init_options).await?;
            ensure_live(cancel)?;
            on_phase(BuildPhase::SdkInitialized);
        }

        let sdk = runtime
            .handle()
            .ok_or_else(|| FhevmError::SdkLoad("relayer SDK is not available".to_string()))?;
        let (preset_name, preset) = select_preset(sdk.as_ref())?;
        let acl_address = preset.acl_contract_address.clone();
        validate_acl_address(&acl_address)?;
        debug!(preset = preset_name.as_str(), acl_address = %acl_address, "Using network preset");

        let cached = self.cached_keys(&acl_address).await;
        ensure_live(cancel)?;

        let config = InstanceConfig::builder(preset.clone(), source.clone())
            .with_cached(cached)
            .build();
        debug!(
            has_public_key = config.public_key().is_some(),
            has_public_params = config.public_params(PUBLIC_PARAMS_SIZE).is_some(),
            "Instance config prepared"
        );

        on_phase(BuildPhase::Creating);
        let instance = match sdk.create_instance(&config).await {
            Ok(instance) => instance,
            Err(e) if e.is_corrupt_key() => {
                warn!(
                    acl_address = %acl_address,
                    error = %e,
                    "Cached public key rejected, clearing and retrying without cached keys"
                );
                if let Err(clear_err) = self.keys.clear(&acl_address) {
                    warn!(acl_address = %acl_address, error = %clear_err, "Failed to clear key cache");
                }
                let fresh = InstanceConfig::builder(preset, source.clone()).build();
                sdk.create_instance(&fresh)
                    .await
                    .map_err(FhevmError::InstanceConstruction)?
            }
            Err(e) => return Err(FhevmError::InstanceConstruction(e)),
        };

        self.store_keys(&acl_address, instance.as_ref()).await;
        ensure_live(cancel)?;

        info!(chain_id = network.chain_id, acl_address = %acl_address, "FHEVM instance created");
        Ok(instance)
    }

    async fn try_mock(
        &self,
        chain_id: u64,
        rpc_url: Option<&str>,
        cancel: &CancellationToken,
        on_phase: &(dyn Fn(BuildPhase) + Send + Sync),
    ) -> FhevmResult<Option<Arc<dyn FhevmInstance>>> {
        let Some(rpc_url) = rpc_url else {
            return Ok(None);
        };
        let Some(metadata) = self.resolver.fetch_relayer_metadata(rpc_url).await else {
            warn!(chain_id, rpc_url, "Mock chain without relayer metadata, using the relayer SDK path");
            return Ok(None);
        };
        let factory = self.mock_factory.as_ref().ok_or_else(|| {
            FhevmError::InvalidConfiguration(format!(
                "Chain {chain_id} is a mock chain but no mock instance factory is configured"
            ))
        })?;

        on_phase(BuildPhase::Creating);
        let instance = factory.create(rpc_url, chain_id, &metadata).await?;
        ensure_live(cancel)?;

        info!(chain_id, rpc_url, acl_address = %metadata.acl_address, "Mock FHEVM instance created");
        Ok(Some(instance))
    }

    async fn cached_keys(&self, acl_address: &str) -> CachedKeys {
        let keys = Arc::clone(&self.keys);
        let acl = acl_address.to_string();
        tokio::task::spawn_blocking(move || keys.get(&acl))
            .await
            .unwrap_or_else(|e| {
                warn!(acl_address, error = %e, "Key cache lookup task failed");
                CachedKeys::default()
            })
    }

    /// Cache failures never fail a build.
    async fn store_keys(&self, acl_address: &str, instance: &dyn FhevmInstance) {
        let public_key = instance.public_key();
        let public_params = instance.public_params(PUBLIC_PARAMS_SIZE);
        let keys = Arc::clone(&self.keys);
        let acl = acl_address.to_string();
        let stored = tokio::task::spawn_blocking(move || {
            keys.set(&acl, public_key.as_ref(), public_params.as_ref())
                .map_err(|e| e.to_string())
        })
        .await
        .map_err(|e| e.to_string())
        .and_then(|result| result);
        if let Err(e) = stored {
            warn!(acl_address, error = %e, "Failed to cache public key material");
        }
    }
}

fn ensure_live(cancel: &CancellationToken) -> FhevmResult<()> {
    if cancel.is_cancelled() {
        Err(FhevmError::Cancelled)
    } else {
        Ok(())
    }
}

fn select_preset(sdk: &dyn RelayerSdk) -> FhevmResult<(PresetName, NetworkPreset)> {
    PresetName::PREFERENCE
        .iter()
        .find_map(|name| sdk.preset(*name).map(|preset| (*name, preset)))
        .ok_or_else(|| {
            FhevmError::InvalidConfiguration("relayer SDK exposes no network preset".to_string())
        })
}

/// 0x-prefixed 20-byte hex. Mixed case must carry a valid EIP-55 checksum.
pub fn validate_acl_address(raw: &str) -> FhevmResult<Address> {
    let invalid = || FhevmError::InvalidConfiguration(format!("Invalid ACL address: {raw}"));

    let hex = raw.strip_prefix("0x").ok_or_else(invalid)?;
    if hex.len() != 40 || !hex.bytes().all(|b| b.is_ascii_hexdigit()) {
        return Err(invalid());
    }

    let mixed_case = hex.bytes().any(|b| b.is_ascii_lowercase())
        && hex.bytes().any(|b| b.is_ascii_uppercase());
    if mixed_case {
        Address::parse_checksummed(raw, None).map_err(|_| invalid())
    } else {
        raw.parse::<Address>().map_err(|_| invalid())
    }
}
