// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! In-process fakes for the relayer SDK, its instances, module providers and
//! JSON-RPC endpoints.

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use alloy::primitives::{address, keccak256, Address, Bytes, B256, U256};
use async_trait::async_trait;
use serde_json::{json, Value};
use tokio::sync::Semaphore;

use crate::error::{FhevmError, FhevmResult};
use crate::instance::MockInstanceFactory;
use crate::network::{JsonRpcClient, RelayerMetadata, RpcConnector};
use crate::permit::DecryptionPermit;
use crate::sdk::{
    DecryptionDomain, EncryptedInput, EncryptedInputs, FhevmInstance, HandleContractPair,
    InitOptions, InstanceConfig, Keypair, ModuleProvider, NetworkPreset, PresetName, RelayerSdk,
    SdkError,
};
use crate::storage::{PublicKey, PublicParams, PUBLIC_PARAMS_SIZE};

pub const SEPOLIA_ACL: &str = "0x687820221192C5B662b25367F70076A37bc79b6c";

const SEPOLIA_CHAIN_ID: u64 = 11_155_111;
const GATEWAY_CHAIN_ID: u64 = 55_815;
const DECRYPTION_VERIFIER: Address = address!("b6E160B1ff80D67Bfe90A85eE06Ce0A2613607D1");

pub fn sepolia_preset() -> NetworkPreset {
    NetworkPreset {
        acl_contract_address: SEPOLIA_ACL.into(),
        kms_contract_address: "0x1364cBBf2cDF5032C47d8226a6f6FBD2AFCDacAC".into(),
        input_verifier_contract_address: "0xbc91f3daD1A5F19F8390c400196e58073B6a0BC4".into(),
        verifying_contract_address_decryption: "0xb6E160B1ff80D67Bfe90A85eE06Ce0A2613607D1".into(),
        verifying_contract_address_input_verification:
            "0x7048C39f048125eDa9d678AEbaDfB22F7900a29F".into(),
        chain_id: SEPOLIA_CHAIN_ID,
        gateway_chain_id: GATEWAY_CHAIN_ID,
        relayer_url: "https://relayer.testnet.zama.cloud".into(),
    }
}

async fn poll_until(check: impl Fn() -> bool) {
    tokio::time::timeout(Duration::from_secs(5), async {
        while !check() {
            tokio::time::sleep(Duration::from_millis(1)).await;
        }
    })
    .await
    .expect("condition not reached in time");
}

// =============================================================================
// JSON-RPC
// =============================================================================

/// Scripted JSON-RPC endpoint. Unscripted methods fail.
#[derive(Default)]
pub struct FakeRpc {
    responses: HashMap<String, Value>,
}

impl FakeRpc {
    pub fn new() -> Self {
        Self::default()
    }

    /// Script (or replace) the answer to `method`.
    pub fn with(mut self, method: &str, response: Value) -> Self {
        self.responses.insert(method.to_string(), response);
        self
    }
}

#[async_trait]
impl JsonRpcClient for FakeRpc {
    async fn request(&self, method: &str, _params: Value) -> FhevmResult<Value> {
        self.responses
            .get(method)
            .cloned()
            .ok_or_else(|| FhevmError::Rpc(format!("{method}: connection refused")))
    }
}

/// A local FHEVM hardhat node on chain 31337.
pub fn hardhat_rpc() -> FakeRpc {
    FakeRpc::new()
        .with("eth_chainId", json!("0x7a69"))
        .with("web3_clientVersion", json!("HardhatNetwork/2.22.19/@fhevm/hardhat-plugin"))
        .with(
            "fhevm_relayer_metadata",
            json!({
                "ACLAddress": "0x50157CFfD6bBFA2DECe204a89ec419c23ef5755D",
                "InputVerifierAddress": "0x901F8942346f7AB3a01F6D7613119Bca447Bb030",
                "KMSVerifierAddress": "0x1364cBBf2cDF5032C47d8226a6f6FBD2AFCDacAC",
            }),
        )
}

/// Hands out one shared [`FakeRpc`] for every URL and records the URLs.
pub struct FakeConnector {
    rpc: Arc<FakeRpc>,
    urls: Mutex<Vec<String>>,
}

impl FakeConnector {
    pub fn new(rpc: FakeRpc) -> Self {
        Self {
            rpc: Arc::new(rpc),
            urls: Mutex::new(Vec::new()),
        }
    }

    pub fn connected_urls(&self) -> Vec<String> {
        self.urls.lock().unwrap().clone()
    }
}

impl RpcConnector for FakeConnector {
    fn connect(&self, url: &str) -> FhevmResult<Arc<dyn JsonRpcClient>> {
        self.urls.lock().unwrap().push(url.to_string());
        Ok(Arc::clone(&self.rpc) as Arc<dyn JsonRpcClient>)
    }
}

// =============================================================================
// Instances
// =============================================================================

#[derive(Default)]
struct Ciphertexts {
    clear: HashMap<B256, U256>,
    added: Vec<u32>,
}

/// Instance that "encrypts" by remembering clear values behind random-looking handles.
pub struct FakeInstance {
    public_key: Option<PublicKey>,
    public_params: Option<PublicParams>,
    ciphertexts: Arc<Mutex<Ciphertexts>>,
    nonce: Arc<AtomicU64>,
}

impl FakeInstance {
    pub fn new() -> Self {
        Self::with_keys(FakeSdk::fresh_public_key(), FakeSdk::fresh_public_params())
    }

    pub fn with_keys(public_key: PublicKey, public_params: PublicParams) -> Self {
        Self {
            public_key: Some(public_key),
            public_params: Some(public_params),
            ciphertexts: Arc::new(Mutex::new(Ciphertexts::default())),
            nonce: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Every value passed to `add32`, in order.
    pub fn encrypted_values(&self) -> Vec<u32> {
        self.ciphertexts.lock().unwrap().added.clone()
    }
}

struct FakeEncryptedInput {
    contract: Address,
    user: Address,
    values: Vec<u32>,
    ciphertexts: Arc<Mutex<Ciphertexts>>,
    nonce: Arc<AtomicU64>,
}

#[async_trait]
impl EncryptedInput for FakeEncryptedInput {
    fn add32(&mut self, value: u32) {
        self.values.push(value);
    }

    async fn encrypt(self: Box<Self>) -> Result<EncryptedInputs, SdkError> {
        let mut ciphertexts = self.ciphertexts.lock().unwrap();
        let mut handles = Vec::with_capacity(self.values.len());
        for value in &self.values {
            let nonce = self.nonce.fetch_add(1, Ordering::SeqCst);
            let mut preimage = Vec::new();
            preimage.extend_from_slice(self.contract.as_slice());
            preimage.extend_from_slice(self.user.as_slice());
            preimage.extend_from_slice(&nonce.to_be_bytes());
            let handle = keccak256(&preimage);
            ciphertexts.clear.insert(handle, U256::from(*value));
            ciphertexts.added.push(*value);
            handles.push(handle);
        }
        Ok(EncryptedInputs {
            handles,
            input_proof: Bytes::from_static(b"fake-input-proof"),
        })
    }
}

#[async_trait]
impl FhevmInstance for FakeInstance {
    fn create_encrypted_input(&self, contract: Address, user: Address) -> Box<dyn EncryptedInput> {
        Box::new(FakeEncryptedInput {
            contract,
            user,
            values: Vec::new(),
            ciphertexts: Arc::clone(&self.ciphertexts),
            nonce: Arc::clone(&self.nonce),
        })
    }

    async fn user_decrypt(
        &self,
        pairs: &[HandleContractPair],
        permit: &DecryptionPermit,
    ) -> Result<HashMap<B256, U256>, SdkError> {
        let ciphertexts = self.ciphertexts.lock().unwrap();
        let mut out = HashMap::new();
        for pair in pairs {
            if !permit.contract_addresses.contains(&pair.contract_address) {
                return Err(SdkError::new("contract not covered by permit"));
            }
            if let Some(value) = ciphertexts.clear.get(&pair.handle) {
                out.insert(pair.handle, *value);
            }
        }
        Ok(out)
    }

    fn public_key(&self) -> Option<PublicKey> {
        self.public_key.clone()
    }

    fn public_params(&self, size: u32) -> Option<PublicParams> {
        self.public_params.clone().filter(|_| size == PUBLIC_PARAMS_SIZE)
    }

    fn generate_keypair(&self) -> Keypair {
        let n = self.nonce.fetch_add(1, Ordering::SeqCst);
        Keypair {
            public_key: format!("0x{}", alloy::hex::encode(keccak256(n.to_be_bytes()))),
            private_key: format!("0x{}", alloy::hex::encode(keccak256((n + 1).to_be_bytes()))),
        }
    }

    fn decryption_domain(&self) -> DecryptionDomain {
        DecryptionDomain {
            chain_id: GATEWAY_CHAIN_ID,
            verifying_contract: DECRYPTION_VERIFIER,
            contracts_chain_id: SEPOLIA_CHAIN_ID,
        }
    }
}

/// Records every mock build request.
#[derive(Default)]
pub struct RecordingMockFactory {
    calls: Mutex<Vec<(String, u64, RelayerMetadata)>>,
}

impl RecordingMockFactory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn calls(&self) -> Vec<(String, u64, RelayerMetadata)> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl MockInstanceFactory for RecordingMockFactory {
    async fn create(
        &self,
        rpc_url: &str,
        chain_id: u64,
        metadata: &RelayerMetadata,
    ) -> FhevmResult<Arc<dyn FhevmInstance>> {
        self.calls
            .lock()
            .unwrap()
            .push((rpc_url.to_string(), chain_id, metadata.clone()));
        Ok(Arc::new(FakeInstance::new()))
    }
}

// =============================================================================
// SDK
// =============================================================================

/// Scriptable relayer SDK handle.
pub struct FakeSdk {
    constructor: bool,
    init_result: bool,
    init_calls: AtomicUsize,
    last_init: Mutex<Option<InitOptions>>,
    presets: Vec<(PresetName, NetworkPreset)>,
    create_failures: Mutex<VecDeque<String>>,
    configs: Mutex<Vec<InstanceConfig>>,
    create_gate: Option<Semaphore>,
    creates_started: AtomicUsize,
    creates_finished: AtomicUsize,
}

impl FakeSdk {
    pub fn new() -> Self {
        Self {
            constructor: true,
            init_result: true,
            init_calls: AtomicUsize::new(0),
            last_init: Mutex::new(None),
            presets: vec![(PresetName::ZamaEthereum, sepolia_preset())],
            create_failures: Mutex::new(VecDeque::new()),
            configs: Mutex::new(Vec::new()),
            create_gate: None,
            creates_started: AtomicUsize::new(0),
            creates_finished: AtomicUsize::new(0),
        }
    }

    /// Key material every created instance reports.
    pub fn fresh_public_key() -> PublicKey {
        PublicKey {
            id: "fresh-key".into(),
            data: vec![9; 48],
        }
    }

    pub fn fresh_public_params() -> PublicParams {
        PublicParams {
            version: 1,
            seed: "fresh-seed".into(),
            delta: "fresh-delta".into(),
        }
    }

    /// Handle is installed but cannot construct instances.
    pub fn without_constructor(mut self) -> Self {
        self.constructor = false;
        self
    }

    pub fn with_init_result(mut self, result: bool) -> Self {
        self.init_result = result;
        self
    }

    pub fn with_presets(mut self, presets: Vec<(PresetName, NetworkPreset)>) -> Self {
        self.presets = presets;
        self
    }

    /// Queue a failure for the next `create_instance` call without one.
    pub fn fail_create_with(self, message: &str) -> Self {
        self.create_failures
            .lock()
            .unwrap()
            .push_back(message.to_string());
        self
    }

    /// `create_instance` blocks until [`FakeSdk::release_create`].
    pub fn gated_create(mut self) -> Self {
        self.create_gate = Some(Semaphore::new(0));
        self
    }

    /// Let one blocked `create_instance` call through, oldest first.
    pub fn release_create(&self) {
        if let Some(gate) = &self.create_gate {
            gate.add_permits(1);
        }
    }

    pub async fn wait_creates_started(&self, n: usize) {
        poll_until(|| self.creates_started.load(Ordering::SeqCst) >= n).await;
    }

    pub async fn wait_creates_finished(&self, n: usize) {
        poll_until(|| self.creates_finished.load(Ordering::SeqCst) >= n).await;
    }

    pub fn init_calls(&self) -> usize {
        self.init_calls.load(Ordering::SeqCst)
    }

    pub fn last_init_options(&self) -> Option<InitOptions> {
        self.last_init.lock().unwrap().clone()
    }

    /// Every config passed to `create_instance`, in call order.
    pub fn configs(&self) -> Vec<InstanceConfig> {
        self.configs.lock().unwrap().clone()
    }
}

#[async_trait]
impl RelayerSdk for FakeSdk {
    fn can_create_instances(&self) -> bool {
        self.constructor
    }

    fn preset(&self, name: PresetName) -> Option<NetworkPreset> {
        self.presets
            .iter()
            .find(|(n, _)| *n == name)
            .map(|(_, preset)| preset.clone())
    }

    async fn init_sdk(&self, options: &InitOptions) -> Result<bool, SdkError> {
        self.init_calls.fetch_add(1, Ordering::SeqCst);
        *self.last_init.lock().unwrap() = Some(options.clone());
        Ok(self.init_result)
    }

    async fn create_instance(
        &self,
        config: &InstanceConfig,
    ) -> Result<Arc<dyn FhevmInstance>, SdkError> {
        self.configs.lock().unwrap().push(config.clone());
        let failure = self.create_failures.lock().unwrap().pop_front();
        self.creates_started.fetch_add(1, Ordering::SeqCst);

        if let Some(gate) = &self.create_gate {
            if let Ok(permit) = gate.acquire().await {
                permit.forget();
            }
        }
        self.creates_finished.fetch_add(1, Ordering::SeqCst);

        match failure {
            Some(message) => Err(SdkError::new(message)),
            None => Ok(Arc::new(FakeInstance::new())),
        }
    }
}

// =============================================================================
// Module providers
// =============================================================================

/// Module provider that returns a fixed handle or a fixed error.
pub struct StaticModule {
    source: String,
    outcome: Result<Arc<FakeSdk>, String>,
    fetches: AtomicUsize,
    gate: Option<Semaphore>,
    started: AtomicBool,
}

impl StaticModule {
    pub fn ok(source: &str, sdk: FakeSdk) -> Self {
        Self::with_outcome(source, Ok(Arc::new(sdk)))
    }

    pub fn failing(source: &str, message: &str) -> Self {
        Self::with_outcome(source, Err(message.to_string()))
    }

    fn with_outcome(source: &str, outcome: Result<Arc<FakeSdk>, String>) -> Self {
        Self {
            source: source.to_string(),
            outcome,
            fetches: AtomicUsize::new(0),
            gate: None,
            started: AtomicBool::new(false),
        }
    }

    /// `fetch` blocks until [`StaticModule::release`].
    pub fn gated(mut self) -> Self {
        self.gate = Some(Semaphore::new(0));
        self
    }

    pub async fn wait_started(&self) {
        poll_until(|| self.started.load(Ordering::SeqCst)).await;
    }

    pub fn release(&self) {
        if let Some(gate) = &self.gate {
            gate.add_permits(1);
        }
    }

    pub fn fetch_count(&self) -> usize {
        self.fetches.load(Ordering::SeqCst)
    }

    /// The handle this module installs.
    pub fn sdk(&self) -> Arc<FakeSdk> {
        Arc::clone(self.outcome.as_ref().expect("module was built to fail"))
    }
}

#[async_trait]
impl ModuleProvider for StaticModule {
    fn source(&self) -> &str {
        &self.source
    }

    async fn fetch(&self) -> Result<Arc<dyn RelayerSdk>, SdkError> {
        self.fetches.fetch_add(1, Ordering::SeqCst);
        self.started.store(true, Ordering::SeqCst);

        if let Some(gate) = &self.gate {
            // The permit is returned on drop so later fetches pass too.
            let _permit = gate.acquire().await;
        }

        match &self.outcome {
            Ok(sdk) => Ok(Arc::clone(sdk) as Arc<dyn RelayerSdk>),
            Err(message) => Err(SdkError::new(message.clone())),
        }
    }
}
