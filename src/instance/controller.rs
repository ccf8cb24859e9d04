// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Lifecycle around instance builds.
//!
//! The controller owns at most one in-flight build. Every `refresh()` cancels
//! the current build and bumps a generation counter; a build only publishes
//! its outcome if its token is still live and its generation is still the
//! current one, so a superseded build can never overwrite newer state.
//!
//! State is published through a `tokio::sync::watch` channel:
//!
//! ```text
//! idle --refresh (enabled, inputs present)--> loading --> ready | error
//!   ^                                            |
//!   +------- refresh / disable / input change ---+
//! ```

use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::{BuildPhase, FhevmStatus, InstanceBuilder};
use crate::error::FhevmError;
use crate::network::{MockChainOverrides, ProviderSource};
use crate::sdk::FhevmInstance;

/// What consumers see.
#[derive(Clone, Default)]
pub struct FhevmSnapshot {
    pub status: FhevmStatus,
    pub instance: Option<Arc<dyn FhevmInstance>>,
    pub error: Option<Arc<FhevmError>>,
}

impl fmt::Debug for FhevmSnapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FhevmSnapshot")
            .field("status", &self.status)
            .field("instance", &self.instance.is_some())
            .field("error", &self.error)
            .finish()
    }
}

struct ControllerState {
    provider: Option<ProviderSource>,
    chain_id: Option<u64>,
    enabled: bool,
    in_flight: Option<CancellationToken>,
    generation: u64,
}

impl Default for ControllerState {
    fn default() -> Self {
        Self {
            provider: None,
            chain_id: None,
            enabled: true,
            in_flight: None,
            generation: 0,
        }
    }
}

struct Shared {
    state: Mutex<ControllerState>,
    snapshot: watch::Sender<FhevmSnapshot>,
}

impl Shared {
    fn lock(&self) -> MutexGuard<'_, ControllerState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn publish(&self, snapshot: FhevmSnapshot) {
        debug!(status = %snapshot.status, "FHEVM status changed");
        self.snapshot.send_replace(snapshot);
    }
}

/// Drives builds from (provider, chain id, enabled) inputs.
///
/// `refresh` and the setters spawn onto the current tokio runtime.
pub struct FhevmController {
    builder: Arc<InstanceBuilder>,
    mock_chains: Option<MockChainOverrides>,
    shared: Arc<Shared>,
}

impl FhevmController {
    /// An enabled controller with no inputs, in `idle`. Setting both inputs
    /// starts a build.
    pub fn new(builder: Arc<InstanceBuilder>, mock_chains: Option<MockChainOverrides>) -> Self {
        let (snapshot, _) = watch::channel(FhevmSnapshot::default());
        Self {
            builder,
            mock_chains,
            shared: Arc::new(Shared {
                state: Mutex::new(ControllerState::default()),
                snapshot,
            }),
        }
    }

    /// Update the provider and chain id. A change in either restarts the build.
    pub fn set_inputs(&self, provider: Option<ProviderSource>, chain_id: Option<u64>) {
        let changed = {
            let mut state = self.shared.lock();
            let same_provider = match (&state.provider, &provider) {
                (Some(a), Some(b)) => a.same_as(b),
                (None, None) => true,
                _ => false,
            };
            let changed = !same_provider || state.chain_id != chain_id;
            state.provider = provider;
            state.chain_id = chain_id;
            changed
        };
        if changed {
            self.refresh();
        }
    }

    pub fn set_enabled(&self, enabled: bool) {
        let changed = {
            let mut state = self.shared.lock();
            let changed = state.enabled != enabled;
            state.enabled = enabled;
            changed
        };
        if changed {
            self.refresh();
        }
    }

    /// Abandon any in-flight build and start over from the current inputs.
    pub fn refresh(&self) {
        let mut state = self.shared.lock();

        if let Some(token) = state.in_flight.take() {
            debug!(generation = state.generation, "Cancelling in-flight FHEVM build");
            token.cancel();
        }
        state.generation += 1;
        // Let a previously failed SDK source be tried again.
        self.builder.runtime().reset_failed_injections();
        self.shared.publish(FhevmSnapshot::default());

        let (provider, chain_id) = match (&state.provider, state.chain_id) {
            (Some(provider), Some(chain_id)) if state.enabled => (provider.clone(), chain_id),
            _ => return,
        };

        let token = CancellationToken::new();
        let generation = state.generation;
        state.in_flight = Some(token.clone());
        self.shared.publish(FhevmSnapshot {
            status: FhevmStatus::Loading,
            ..FhevmSnapshot::default()
        });
        drop(state);

        info!(chain_id, generation, "Starting FHEVM build");

        let builder = Arc::clone(&self.builder);
        let shared = Arc::clone(&self.shared);
        let overrides = self.mock_chains.clone();
        tokio::spawn(async move {
            let on_phase = |phase: BuildPhase| debug!(generation, %phase, "FHEVM build progress");
            let result = builder
                .build(&provider, overrides.as_ref(), &token, &on_phase)
                .await;

            let mut state = shared.lock();
            if token.is_cancelled() || state.generation != generation {
                debug!(generation, "Discarding result of superseded FHEVM build");
                return;
            }
            state.in_flight = None;

            match result {
                Ok(instance) => shared.publish(FhevmSnapshot {
                    status: FhevmStatus::Ready,
                    instance: Some(instance),
                    error: None,
                }),
                Err(e) if e.is_cancelled() => {}
                Err(e) => {
                    warn!(generation, error = %e, kind = e.name(), "FHEVM build failed");
                    shared.publish(FhevmSnapshot {
                        status: FhevmStatus::Error,
                        instance: None,
                        error: Some(Arc::new(e)),
                    });
                }
            }
        });
    }

    pub fn snapshot(&self) -> FhevmSnapshot {
        self.shared.snapshot.borrow().clone()
    }

    pub fn status(&self) -> FhevmStatus {
        self.shared.snapshot.borrow().status
    }

    pub fn instance(&self) -> Option<Arc<dyn FhevmInstance>> {
        self.shared.snapshot.borrow().instance.clone()
    }

    pub fn error(&self) -> Option<Arc<FhevmError>> {
        self.shared.snapshot.borrow().error.clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<FhevmSnapshot> {
        self.shared.snapshot.subscribe()
    }
}

impl Drop for FhevmController {
    fn drop(&mut self) {
        if let Some(token) = self.shared.lock().in_flight.take() {
            token.cancel();
        }
    }
}
