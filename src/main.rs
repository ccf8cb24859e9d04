// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Diagnostic probe: resolves the configured RPC endpoint, reports mock node
//! metadata and shows what the key cache holds.

use std::process::ExitCode;
use std::sync::Arc;

use tracing_subscriber::EnvFilter;

use airwitness_fhevm::config::{FhevmSettings, LogFormat};
use airwitness_fhevm::network::{HttpConnector, NetworkResolver};
use airwitness_fhevm::storage::KeyCache;
use airwitness_fhevm::ProviderSource;

fn init_logging(format: LogFormat) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    match format {
        LogFormat::Json => tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .init(),
        LogFormat::Pretty => tracing_subscriber::fmt().with_env_filter(filter).init(),
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let settings = match FhevmSettings::from_env() {
        Ok(settings) => settings,
        Err(e) => {
            eprintln!("Invalid configuration: {e}");
            return ExitCode::FAILURE;
        }
    };
    init_logging(settings.log_format);

    let resolver = NetworkResolver::new(Arc::new(HttpConnector));
    let source = ProviderSource::url(settings.rpc_url.clone());

    let resolved = match resolver.resolve(&source, settings.mock_chains.as_ref()).await {
        Ok(resolved) => resolved,
        Err(e) => {
            tracing::error!(rpc_url = %settings.rpc_url, error = %e, "Network resolution failed");
            return ExitCode::FAILURE;
        }
    };
    println!(
        "chain id {} ({}), rpc {}",
        resolved.chain_id,
        if resolved.is_mock { "mock" } else { "production" },
        resolved.rpc_url.as_deref().unwrap_or("-")
    );

    if let Some(rpc_url) = resolved.rpc_url.as_deref().filter(|_| resolved.is_mock) {
        match resolver.fetch_relayer_metadata(rpc_url).await {
            Some(metadata) => println!(
                "relayer metadata: ACL {}, InputVerifier {}, KMSVerifier {}",
                metadata.acl_address, metadata.input_verifier_address, metadata.kms_verifier_address
            ),
            None => println!("relayer metadata: unavailable (builds use the relayer SDK)"),
        }
    }

    let cache = KeyCache::global();
    match settings.acl_address.as_deref() {
        Some(acl) if cache.is_durable() => {
            let cached = cache.get(acl);
            println!(
                "key cache {}: public key {}, public params {}",
                settings.cache_path.display(),
                cached
                    .public_key
                    .as_ref()
                    .map(|k| format!("{} ({} bytes)", k.id, k.data.len()))
                    .unwrap_or_else(|| "absent".to_string()),
                if cached.public_params.is_some() { "present" } else { "absent" }
            );
        }
        Some(_) => println!("key cache {}: unavailable", settings.cache_path.display()),
        None => println!("key cache: set FHEVM_ACL_ADDRESS to inspect an entry"),
    }

    ExitCode::SUCCESS
}
