//! In-crate doubles for unit tests.

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::Mutex;

use async_trait::async_trait;
use tokio::sync::Notify;

use crate::authority::{GrantAuthority, ResultSink};
use crate::error::AuthorityError;
use crate::gate::{CapabilityClient, GateState};
use crate::key::CapabilityKey;
use crate::outcome::{GrantOutcome, GrantState};
use crate::request::GrantRequest;

pub(crate) fn key(raw: &str) -> CapabilityKey {
    CapabilityKey::new(raw).unwrap()
}

pub(crate) fn keys(raw: &[&str]) -> Vec<CapabilityKey> {
    CapabilityKey::parse_all(raw.iter().copied()).unwrap()
}

/// Authority whose answers are set by the test.
///
/// By default it captures every sink so the test can answer later.
#[derive(Default)]
pub(crate) struct TestAuthority {
    states: Mutex<HashMap<CapabilityKey, GrantState>>,
    rationale: Mutex<HashSet<CapabilityKey>>,
    requests: Mutex<Vec<GrantRequest>>,
    sinks: Mutex<VecDeque<ResultSink>>,
    sink_ready: Notify,
    auto_grant: bool,
    fail_dispatch: bool,
}

impl TestAuthority {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Grant every request before `request_grants` returns.
    pub(crate) fn auto_grant(mut self) -> Self {
        self.auto_grant = true;
        self
    }

    /// Refuse to start any prompt.
    pub(crate) fn failing_dispatch(mut self) -> Self {
        self.fail_dispatch = true;
        self
    }

    pub(crate) fn set_state(&self, raw: &str, state: GrantState) {
        self.states.lock().unwrap().insert(key(raw), state);
    }

    pub(crate) fn set_rationale(&self, raw: &str, show: bool) {
        let mut rationale = self.rationale.lock().unwrap();
        if show {
            rationale.insert(key(raw));
        } else {
            rationale.remove(&key(raw));
        }
    }

    pub(crate) fn requests(&self) -> Vec<GrantRequest> {
        self.requests.lock().unwrap().clone()
    }

    /// Wait until a request has been issued and take its sink.
    pub(crate) async fn wait_for_sink(&self) -> ResultSink {
        loop {
            if let Some(sink) = self.sinks.lock().unwrap().pop_front() {
                return sink;
            }
            self.sink_ready.notified().await;
        }
    }
}

impl GrantAuthority for TestAuthority {
    fn current_state(&self, key: &CapabilityKey) -> GrantState {
        self.states
            .lock()
            .unwrap()
            .get(key)
            .copied()
            .unwrap_or_default()
    }

    fn should_show_rationale(&self, key: &CapabilityKey) -> bool {
        self.rationale.lock().unwrap().contains(key)
    }

    fn request_grants(
        &self,
        request: &GrantRequest,
        sink: ResultSink,
    ) -> Result<(), AuthorityError> {
        self.requests.lock().unwrap().push(request.clone());
        if self.fail_dispatch {
            return Err(AuthorityError::Rejected("no foreground window".into()));
        }
        if self.auto_grant {
            sink.deliver(
                request
                    .keys
                    .iter()
                    .cloned()
                    .map(GrantOutcome::granted)
                    .collect(),
            );
        } else {
            self.sinks.lock().unwrap().push_back(sink);
            self.sink_ready.notify_one();
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum ClientEvent {
    AllGranted,
    NeedsRationale(CapabilityKey),
    NeedsSettings(CapabilityKey),
    Released,
}

/// Client that records every callback.
#[derive(Default)]
pub(crate) struct RecordingClient {
    events: Mutex<Vec<ClientEvent>>,
    states: Mutex<Vec<GateState>>,
}

impl RecordingClient {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn events(&self) -> Vec<ClientEvent> {
        self.events.lock().unwrap().clone()
    }

    pub(crate) fn states(&self) -> Vec<GateState> {
        self.states.lock().unwrap().clone()
    }

    fn push(&self, event: ClientEvent) {
        self.events.lock().unwrap().push(event);
    }
}

#[async_trait]
impl CapabilityClient for RecordingClient {
    async fn on_all_granted(&self) {
        self.push(ClientEvent::AllGranted);
    }

    async fn on_needs_rationale(&self, key: &CapabilityKey) {
        self.push(ClientEvent::NeedsRationale(key.clone()));
    }

    async fn on_needs_settings_redirect(&self, key: &CapabilityKey) {
        self.push(ClientEvent::NeedsSettings(key.clone()));
    }

    async fn on_released(&self) {
        self.push(ClientEvent::Released);
    }

    fn on_state_changed(&self, state: &GateState) {
        self.states.lock().unwrap().push(state.clone());
    }
}
