// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! One-time relayer SDK initialization.

use super::runtime::SdkRuntime;
use super::types::InitOptions;
use crate::error::{FhevmError, FhevmResult};

/// Run the SDK's `init_sdk` once per runtime.
///
/// Callers are expected to check [`SdkRuntime::is_initialized`] first; this
/// function re-checks and returns early when the flag is already set. The
/// vendor result is stored in the flag as-is, so a `false` result leaves the
/// runtime uninitialized and fails with `SdkInit`.
pub async fn initialize(runtime: &SdkRuntime, options: &InitOptions) -> FhevmResult<()> {
    if runtime.is_initialized() {
        return Ok(());
    }

    let sdk = runtime
        .handle()
        .filter(|_| runtime.is_loaded())
        .ok_or_else(|| FhevmError::SdkLoad("relayer SDK is not available".to_string()))?;

    tracing::debug!(gateway_url = ?options.gateway_url, "Initializing relayer SDK");

    let result = sdk
        .init_sdk(options)
        .await
        .map_err(|e| FhevmError::SdkInit(e.to_string()))?;
    runtime.mark_initialized(result);

    if !result {
        return Err(FhevmError::SdkInit("relayer SDK initSDK returned false".to_string()));
    }
    tracing::info!("Relayer SDK initialized");
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::test_support::FakeSdk;

    #[tokio::test]
    async fn initializes_once() {
        let runtime = SdkRuntime::new();
        let sdk = Arc::new(FakeSdk::new());
        runtime.install(sdk.clone());

        initialize(&runtime, &InitOptions::default()).await.unwrap();
        initialize(&runtime, &InitOptions::default()).await.unwrap();

        assert!(runtime.is_initialized());
        assert_eq!(sdk.init_calls(), 1);
    }

    #[tokio::test]
    async fn passes_options_through() {
        let runtime = SdkRuntime::new();
        let sdk = Arc::new(FakeSdk::new());
        runtime.install(sdk.clone());

        let options = InitOptions {
            gateway_url: Some("https://gateway.sepolia.zama.ai".into()),
        };
        initialize(&runtime, &options).await.unwrap();
        assert_eq!(sdk.last_init_options(), Some(options));
    }

    #[tokio::test]
    async fn false_result_is_fatal_and_not_recorded() {
        let runtime = SdkRuntime::new();
        runtime.install(Arc::new(FakeSdk::new().with_init_result(false)));

        let err = initialize(&runtime, &InitOptions::default()).await.unwrap_err();
        assert!(matches!(err, FhevmError::SdkInit(_)));
        assert!(!runtime.is_initialized());
    }

    #[tokio::test]
    async fn requires_loaded_sdk() {
        let runtime = SdkRuntime::new();
        let err = initialize(&runtime, &InitOptions::default()).await.unwrap_err();
        assert!(matches!(err, FhevmError::SdkLoad(_)));
    }
}
