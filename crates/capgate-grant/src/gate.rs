//! Host-facing gate that drives a whole negotiation.
//!
//! The [`CapabilityGate`] owns a [`GrantCoordinator`] and its reply channel.
//! [`acquire`](CapabilityGate::acquire) evaluates, requests, waits for the
//! matching answer, and hands each resulting [`Decision`] to a
//! [`CapabilityClient`]. Concurrent calls queue behind each other, so at most
//! one negotiation per gate is ever in flight.

use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use crate::authority::GrantReplies;
use crate::coordinator::GrantCoordinator;
use crate::decision::Decision;
use crate::error::{GrantError, GrantResult};
use crate::key::CapabilityKey;
use crate::request::RequestId;

/// Receives the user-facing consequences of a negotiation.
#[async_trait]
pub trait CapabilityClient: Send + Sync {
    /// Every requested capability is granted; start the gated functionality.
    async fn on_all_granted(&self);

    /// Explain why `key` is needed and offer to ask again.
    async fn on_needs_rationale(&self, key: &CapabilityKey);

    /// Send the user to system settings for `key`.
    async fn on_needs_settings_redirect(&self, key: &CapabilityKey);

    /// The gated functionality was stopped.
    async fn on_released(&self) {}

    /// The gate moved to `state`.
    fn on_state_changed(&self, _state: &GateState) {}
}

/// Where a gate is in its lifecycle.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum GateState {
    /// Nothing running, nothing asked.
    #[default]
    Idle,
    /// Waiting on the authority for this request.
    Negotiating(RequestId),
    /// The gated functionality is running.
    Active,
}

/// Drives negotiations for one [`CapabilityClient`].
pub struct CapabilityGate {
    coordinator: GrantCoordinator,
    /// Holding this lock is what makes a negotiation exclusive.
    replies: tokio::sync::Mutex<GrantReplies>,
    client: Arc<dyn CapabilityClient>,
    state: Mutex<GateState>,
}

impl CapabilityGate {
    /// Wrap a coordinator and the reply channel returned alongside it.
    #[must_use]
    pub fn new(
        coordinator: GrantCoordinator,
        replies: GrantReplies,
        client: Arc<dyn CapabilityClient>,
    ) -> Self {
        Self {
            coordinator,
            replies: tokio::sync::Mutex::new(replies),
            client,
            state: Mutex::new(GateState::Idle),
        }
    }

    /// The underlying coordinator.
    #[must_use]
    pub fn coordinator(&self) -> &GrantCoordinator {
        &self.coordinator
    }

    /// Current lifecycle state.
    #[must_use]
    pub fn state(&self) -> GateState {
        self.state
            .lock()
            .map(|state| state.clone())
            .unwrap_or_default()
    }

    /// Negotiate `keys` and deliver the outcome to the client.
    ///
    /// Returns the decisions that were delivered. An empty vector means the
    /// authority answered with a malformed result; the request was dropped
    /// and the gate is back to [`GateState::Idle`].
    ///
    /// If the gate was [`GateState::Active`] and this negotiation does not
    /// end in [`Decision::Proceed`], the client gets
    /// [`on_released`](CapabilityClient::on_released) before any other
    /// callback.
    ///
    /// # Errors
    ///
    /// Propagates [`GrantCoordinator::request`] errors, and returns
    /// [`GrantError::Internal`] if the reply channel closes mid-negotiation.
    pub async fn acquire(&self, keys: &[CapabilityKey]) -> GrantResult<Vec<Decision>> {
        let mut replies = self.replies.lock().await;

        // Anything still outstanding belongs to a negotiation that was dropped.
        if let Some(orphan) = self.coordinator.pending() {
            self.coordinator.abandon(&orphan.id);
        }

        let was_active = self.state() == GateState::Active;
        let evaluation = self.coordinator.evaluate(keys);
        if evaluation.all_granted {
            let decisions = vec![Decision::Proceed];
            self.dispatch(&decisions, was_active).await;
            return Ok(decisions);
        }

        let request = self.coordinator.request(&evaluation.missing).await?;
        self.set_state(GateState::Negotiating(request.id.clone()));

        loop {
            let Some(response) = replies.recv().await else {
                self.coordinator.abandon(&request.id);
                self.deactivate(was_active).await;
                return Err(GrantError::Internal("grant reply channel closed".into()));
            };
            if !self.coordinator.is_current(&response.request_id) {
                tracing::debug!(request_id = %response.request_id, "skipping stale grant reply");
                continue;
            }

            let decisions = self.coordinator.handle(&response);
            if decisions.is_empty() {
                self.coordinator.abandon(&request.id);
                tracing::warn!(request_id = %request.id, "abandoning grant request after malformed result");
                self.deactivate(was_active).await;
            } else {
                self.dispatch(&decisions, was_active).await;
            }
            return Ok(decisions);
        }
    }

    /// Stop the gated functionality. Returns `false` if it was not running.
    pub async fn release(&self) -> bool {
        if self.state() != GateState::Active {
            return false;
        }
        self.set_state(GateState::Idle);
        self.client.on_released().await;
        true
    }

    async fn dispatch(&self, decisions: &[Decision], was_active: bool) {
        if decisions.iter().any(Decision::is_proceed) {
            self.set_state(GateState::Active);
            if was_active {
                tracing::debug!("capabilities granted and already active");
                return;
            }
        } else {
            self.deactivate(was_active).await;
        }

        for decision in decisions {
            match decision {
                Decision::Proceed => self.client.on_all_granted().await,
                Decision::ShowRationale(key) => self.client.on_needs_rationale(key).await,
                Decision::RedirectToSettings(key) => {
                    self.client.on_needs_settings_redirect(key).await;
                },
            }
        }
    }

    /// Return to [`GateState::Idle`], stopping the gated functionality if a
    /// previous grant had started it.
    async fn deactivate(&self, was_active: bool) {
        self.set_state(GateState::Idle);
        if was_active {
            tracing::info!("gated functionality stopped after a failed negotiation");
            self.client.on_released().await;
        }
    }

    fn set_state(&self, next: GateState) {
        let changed = match self.state.lock() {
            Ok(mut state) if *state != next => {
                *state = next.clone();
                true
            },
            Ok(_) => false,
            Err(e) => {
                tracing::error!(error = %e, "gate state poisoned");
                false
            },
        };
        if changed {
            tracing::debug!(state = ?next, "gate state changed");
            self.client.on_state_changed(&next);
        }
    }
}

impl std::fmt::Debug for CapabilityGate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CapabilityGate")
            .field("coordinator", &self.coordinator)
            .field("state", &self.state())
            .finish_non_exhaustive()
    }
}
