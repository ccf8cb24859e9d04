// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Relayer SDK loading.
//!
//! The SDK is injected from a primary module provider (the CDN bundle) with a
//! single fallback (a local bundle). Each source is injected at most once per
//! runtime: concurrent or repeated requests for a source wait on the same
//! injection slot and then succeed or fail on whether the installed handle is
//! usable.
//!
//! Turning a fetched bundle into a live handle is host specific (embedded JS
//! engine, wasm runtime, native binding), so providers hand the bytes to an
//! [`SdkLinker`].

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use base64ct::{Base64, Encoding};
use sha2::{Digest, Sha256, Sha384, Sha512};

use super::runtime::SdkRuntime;
use super::types::{RelayerSdk, SdkError};
use crate::config::FhevmSettings;
use crate::error::{FhevmError, FhevmResult};

/// Timeout for remote bundle downloads.
const BUNDLE_FETCH_TIMEOUT: Duration = Duration::from_secs(30);

/// Turns a fetched SDK bundle into a live handle.
pub trait SdkLinker: Send + Sync {
    fn link(&self, source: &str, bundle: &[u8]) -> Result<Arc<dyn RelayerSdk>, SdkError>;
}

/// A place the SDK can be injected from.
#[async_trait]
pub trait ModuleProvider: Send + Sync {
    /// Identifies the source (URL or path); used as the injection key.
    fn source(&self) -> &str;

    async fn fetch(&self) -> Result<Arc<dyn RelayerSdk>, SdkError>;
}

// =============================================================================
// Integrity
// =============================================================================

/// Subresource-integrity style digest, e.g. `sha384-<base64>`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Integrity {
    algorithm: DigestAlgorithm,
    expected: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum DigestAlgorithm {
    Sha256,
    Sha384,
    Sha512,
}

impl Integrity {
    pub fn parse(value: &str) -> Result<Self, FhevmError> {
        let (alg, digest) = value.trim().split_once('-').ok_or_else(|| {
            FhevmError::InvalidConfiguration(format!("Malformed integrity value: {value}"))
        })?;
        let algorithm = match alg {
            "sha256" => DigestAlgorithm::Sha256,
            "sha384" => DigestAlgorithm::Sha384,
            "sha512" => DigestAlgorithm::Sha512,
            other => {
                return Err(FhevmError::InvalidConfiguration(format!(
                    "Unsupported integrity algorithm: {other}"
                )))
            }
        };
        Ok(Self {
            algorithm,
            expected: digest.to_string(),
        })
    }

    /// Compute the integrity value of a bundle with the given algorithm name.
    fn digest(algorithm: DigestAlgorithm, bundle: &[u8]) -> String {
        match algorithm {
            DigestAlgorithm::Sha256 => Base64::encode_string(&Sha256::digest(bundle)),
            DigestAlgorithm::Sha384 => Base64::encode_string(&Sha384::digest(bundle)),
            DigestAlgorithm::Sha512 => Base64::encode_string(&Sha512::digest(bundle)),
        }
    }

    pub fn verify(&self, bundle: &[u8]) -> Result<(), SdkError> {
        let actual = Self::digest(self.algorithm, bundle);
        if actual == self.expected {
            Ok(())
        } else {
            Err(SdkError::new(format!(
                "integrity mismatch: expected {}, got {}",
                self.expected, actual
            )))
        }
    }
}

// =============================================================================
// Providers
// =============================================================================

/// SDK bundle served over HTTP(S), typically the vendor CDN.
pub struct RemoteModule {
    url: String,
    client: reqwest::Client,
    integrity: Option<Integrity>,
    linker: Arc<dyn SdkLinker>,
}

impl RemoteModule {
    pub fn new(url: impl Into<String>, linker: Arc<dyn SdkLinker>) -> FhevmResult<Self> {
        let url = url.into();
        url::Url::parse(&url).map_err(|e| {
            FhevmError::InvalidConfiguration(format!("Invalid SDK bundle URL {url}: {e}"))
        })?;
        let client = reqwest::Client::builder()
            .timeout(BUNDLE_FETCH_TIMEOUT)
            .build()
            .map_err(|e| FhevmError::EnvironmentUnavailable(format!("HTTP client: {e}")))?;
        Ok(Self {
            url,
            client,
            integrity: None,
            linker,
        })
    }

    pub fn with_integrity(mut self, integrity: Integrity) -> Self {
        self.integrity = Some(integrity);
        self
    }
}

#[async_trait]
impl ModuleProvider for RemoteModule {
    fn source(&self) -> &str {
        &self.url
    }

    async fn fetch(&self) -> Result<Arc<dyn RelayerSdk>, SdkError> {
        let response = self
            .client
            .get(&self.url)
            .send()
            .await
            .map_err(|e| SdkError::new(format!("Failed to load {}: {e}", self.url)))?;

        if !response.status().is_success() {
            return Err(SdkError::new(format!(
                "Failed to load {}: HTTP {}",
                self.url,
                response.status()
            )));
        }

        let bundle = response
            .bytes()
            .await
            .map_err(|e| SdkError::new(format!("Failed to read {}: {e}", self.url)))?;

        if let Some(integrity) = &self.integrity {
            integrity.verify(&bundle)?;
        }

        self.linker.link(&self.url, &bundle)
    }
}

/// SDK bundle shipped alongside the application.
pub struct LocalBundleModule {
    path: PathBuf,
    source: String,
    linker: Arc<dyn SdkLinker>,
}

impl LocalBundleModule {
    pub fn new(path: impl Into<PathBuf>, linker: Arc<dyn SdkLinker>) -> Self {
        let path = path.into();
        let source = path.display().to_string();
        Self {
            path,
            source,
            linker,
        }
    }
}

#[async_trait]
impl ModuleProvider for LocalBundleModule {
    fn source(&self) -> &str {
        &self.source
    }

    async fn fetch(&self) -> Result<Arc<dyn RelayerSdk>, SdkError> {
        let bundle = tokio::fs::read(&self.path)
            .await
            .map_err(|e| SdkError::new(format!("Failed to load {}: {e}", self.source)))?;
        self.linker.link(&self.source, &bundle)
    }
}

// =============================================================================
// Loader
// =============================================================================

/// Loads the relayer SDK into a runtime from a primary source with one fallback.
pub struct SdkLoader {
    runtime: Arc<SdkRuntime>,
    primary: Arc<dyn ModuleProvider>,
    fallback: Arc<dyn ModuleProvider>,
}

impl SdkLoader {
    pub fn new(
        runtime: Arc<SdkRuntime>,
        primary: Arc<dyn ModuleProvider>,
        fallback: Arc<dyn ModuleProvider>,
    ) -> Self {
        Self {
            runtime,
            primary,
            fallback,
        }
    }

    /// CDN primary and local-bundle fallback from settings.
    pub fn from_settings(
        runtime: Arc<SdkRuntime>,
        settings: &FhevmSettings,
        linker: Arc<dyn SdkLinker>,
    ) -> FhevmResult<Self> {
        let mut remote = RemoteModule::new(settings.sdk_cdn_url.clone(), Arc::clone(&linker))?;
        if let Some(integrity) = &settings.sdk_integrity {
            remote = remote.with_integrity(Integrity::parse(integrity)?);
        }
        let local = LocalBundleModule::new(settings.sdk_local_bundle.clone(), linker);
        Ok(Self::new(runtime, Arc::new(remote), Arc::new(local)))
    }

    pub fn runtime(&self) -> &Arc<SdkRuntime> {
        &self.runtime
    }

    pub fn is_loaded(&self) -> bool {
        self.runtime.is_loaded()
    }

    /// Ensure a usable SDK handle is installed.
    pub async fn load(&self) -> FhevmResult<()> {
        if !self.runtime.is_capable() {
            return Err(FhevmError::EnvironmentUnavailable(
                "relayer SDK loader requires a module-capable runtime".to_string(),
            ));
        }
        if self.runtime.is_loaded() {
            return Ok(());
        }

        match self.try_load(self.primary.as_ref()).await {
            Ok(()) => Ok(()),
            Err(primary_err) => {
                tracing::warn!(
                    source = %self.primary.source(),
                    error = %primary_err,
                    "Relayer SDK primary source failed, falling back"
                );
                self.try_load(self.fallback.as_ref())
                    .await
                    .map_err(FhevmError::SdkLoad)
            }
        }
    }

    async fn try_load(&self, provider: &dyn ModuleProvider) -> Result<(), String> {
        let source = provider.source();
        let slot = self.runtime.injection_slot(source);

        let injected = slot
            .get_or_init(|| async {
                tracing::debug!(source = %source, "Injecting relayer SDK");
                match provider.fetch().await {
                    Ok(sdk) => {
                        self.runtime.install(sdk);
                        Ok(())
                    }
                    Err(e) => Err(e.to_string()),
                }
            })
            .await;

        if let Err(reason) = injected {
            return Err(reason.clone());
        }
        if !self.runtime.is_loaded() {
            return Err(format!(
                "SDK loaded from {source} but relayer SDK handle is invalid"
            ));
        }
        tracing::info!(source = %source, "Relayer SDK loaded");
        Ok(())
    }
}
