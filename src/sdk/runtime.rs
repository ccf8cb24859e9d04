// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Process-wide relayer SDK state.
//!
//! Holds the installed SDK handle, the initialized flag and the registry of
//! module sources that have already been injected. Repeated load and init
//! calls are no-ops once the state is set, so callers rely on idempotency
//! rather than holding the lock across any await.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, OnceLock, PoisonError};

use tokio::sync::OnceCell;

use super::types::RelayerSdk;

/// Outcome of one module injection, shared by every caller that asked for the same source.
pub(crate) type InjectionSlot = Arc<OnceCell<Result<(), String>>>;

static GLOBAL_RUNTIME: OnceLock<Arc<SdkRuntime>> = OnceLock::new();

#[derive(Default)]
struct RuntimeState {
    sdk: Option<Arc<dyn RelayerSdk>>,
    initialized: bool,
    injections: HashMap<String, InjectionSlot>,
}

/// Owner of the loaded/initialized SDK state.
pub struct SdkRuntime {
    /// Whether modules can be injected at all (false for headless hosts).
    capable: bool,
    state: Mutex<RuntimeState>,
}

impl SdkRuntime {
    /// A module-capable runtime with nothing loaded.
    pub fn new() -> Self {
        Self {
            capable: true,
            state: Mutex::new(RuntimeState::default()),
        }
    }

    /// A runtime that cannot load modules. `is_loaded` is always false and
    /// loading fails with `EnvironmentUnavailable`.
    pub fn headless() -> Self {
        Self {
            capable: false,
            state: Mutex::new(RuntimeState::default()),
        }
    }

    /// The shared process-wide runtime.
    pub fn global() -> Arc<SdkRuntime> {
        Arc::clone(GLOBAL_RUNTIME.get_or_init(|| Arc::new(SdkRuntime::new())))
    }

    pub fn is_capable(&self) -> bool {
        self.capable
    }

    /// The installed handle, valid or not.
    pub fn handle(&self) -> Option<Arc<dyn RelayerSdk>> {
        self.lock().sdk.clone()
    }

    /// True when a handle is installed and can construct instances.
    pub fn is_loaded(&self) -> bool {
        if !self.capable {
            return false;
        }
        self.lock()
            .sdk
            .as_ref()
            .map(|sdk| sdk.can_create_instances())
            .unwrap_or(false)
    }

    pub fn is_initialized(&self) -> bool {
        self.lock().initialized
    }

    pub fn mark_initialized(&self, initialized: bool) {
        self.lock().initialized = initialized;
    }

    /// Sources that have an injection slot (attempted or in flight).
    pub fn injected_sources(&self) -> Vec<String> {
        let mut sources: Vec<String> = self.lock().injections.keys().cloned().collect();
        sources.sort();
        sources
    }

    /// Drop slots whose injection failed so a later load can try those sources again.
    pub fn reset_failed_injections(&self) {
        self.lock()
            .injections
            .retain(|_, slot| !matches!(slot.get(), Some(Err(_))));
    }

    pub(crate) fn install(&self, sdk: Arc<dyn RelayerSdk>) {
        let mut state = self.lock();
        // A replaced handle has not been through init_sdk.
        state.initialized = false;
        state.sdk = Some(sdk);
    }

    /// Get or create the injection slot for a source.
    pub(crate) fn injection_slot(&self, source: &str) -> InjectionSlot {
        let mut state = self.lock();
        Arc::clone(
            state
                .injections
                .entry(source.to_string())
                .or_insert_with(|| Arc::new(OnceCell::new())),
        )
    }

    fn lock(&self) -> MutexGuard<'_, RuntimeState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Default for SdkRuntime {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::FakeSdk;

    #[test]
    fn fresh_runtime_is_empty() {
        let runtime = SdkRuntime::new();
        assert!(runtime.is_capable());
        assert!(!runtime.is_loaded());
        assert!(!runtime.is_initialized());
        assert!(runtime.injected_sources().is_empty());
    }

    #[test]
    fn headless_runtime_never_reports_loaded() {
        let runtime = SdkRuntime::headless();
        runtime.install(Arc::new(FakeSdk::new()));
        assert!(runtime.handle().is_some());
        assert!(!runtime.is_loaded());
    }

    #[test]
    fn invalid_handle_is_not_loaded() {
        let runtime = SdkRuntime::new();
        runtime.install(Arc::new(FakeSdk::new().without_constructor()));
        assert!(!runtime.is_loaded());
    }

    #[test]
    fn install_resets_initialized_flag() {
        let runtime = SdkRuntime::new();
        runtime.install(Arc::new(FakeSdk::new()));
        runtime.mark_initialized(true);
        assert!(runtime.is_initialized());

        runtime.install(Arc::new(FakeSdk::new()));
        assert!(!runtime.is_initialized());
    }

    #[test]
    fn injection_slot_is_shared_per_source() {
        let runtime = SdkRuntime::new();
        let a = runtime.injection_slot("cdn");
        let b = runtime.injection_slot("cdn");
        assert!(Arc::ptr_eq(&a, &b));
        assert_eq!(runtime.injected_sources(), vec!["cdn".to_string()]);
    }

    #[test]
    fn reset_keeps_successful_and_pending_slots() {
        let runtime = SdkRuntime::new();
        runtime
            .injection_slot("ok")
            .set(Ok(()))
            .expect("slot was empty");
        runtime
            .injection_slot("failed")
            .set(Err("boom".into()))
            .expect("slot was empty");
        let _pending = runtime.injection_slot("pending");

        runtime.reset_failed_injections();
        assert_eq!(
            runtime.injected_sources(),
            vec!["ok".to_string(), "pending".to_string()]
        );
    }
}
