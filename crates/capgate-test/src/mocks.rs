//! Mock implementations for testing.

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use tokio::sync::Notify;

use capgate_grant::{
    AuthorityError, CapabilityClient, CapabilityKey, GateState, GrantAuthority, GrantOutcome,
    GrantRequest, GrantState, ResultSink,
};

/// How a [`ScriptedAuthority`] answers one request.
#[derive(Debug, Clone)]
pub enum ScriptedReply {
    /// One state per requested key, in request order.
    States(Vec<GrantState>),
    /// The same state for every requested key.
    All(GrantState),
    /// Exactly these outcomes, whether or not they fit the request.
    Raw(Vec<GrantOutcome>),
    /// Accept the request, then report a failure through the sink.
    Fail(AuthorityError),
    /// Refuse to start the prompt at all.
    Refuse(AuthorityError),
}

/// Programmable [`GrantAuthority`].
///
/// Each incoming request consumes the next queued [`ScriptedReply`], answered
/// before `request_grants` returns. With nothing queued the sink is kept so
/// the test can answer later via [`take_sink`](Self::take_sink) or
/// [`wait_for_sink`](Self::wait_for_sink).
///
/// Granted and denied outcomes it delivers are remembered as the key's current
/// state, as a platform authority would.
#[derive(Debug, Clone, Default)]
pub struct ScriptedAuthority {
    states: Arc<Mutex<HashMap<CapabilityKey, GrantState>>>,
    rationale: Arc<Mutex<HashSet<CapabilityKey>>>,
    replies: Arc<Mutex<VecDeque<ScriptedReply>>>,
    requests: Arc<Mutex<Vec<GrantRequest>>>,
    sinks: Arc<Mutex<VecDeque<ResultSink>>>,
    sink_ready: Arc<Notify>,
}

impl ScriptedAuthority {
    /// Create an authority that knows nothing and answers nothing.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the current state of `key`.
    #[must_use]
    pub fn with_state(self, key: &CapabilityKey, state: GrantState) -> Self {
        self.set_state(key, state);
        self
    }

    /// Ask for a rationale before re-requesting `key`.
    #[must_use]
    pub fn with_rationale(self, key: &CapabilityKey) -> Self {
        self.set_rationale(key, true);
        self
    }

    /// Queue a reply for the next request.
    #[must_use]
    pub fn with_reply(self, reply: ScriptedReply) -> Self {
        self.queue_reply(reply);
        self
    }

    /// Set the current state of `key`.
    pub fn set_state(&self, key: &CapabilityKey, state: GrantState) {
        if let Ok(mut guard) = self.states.lock() {
            guard.insert(key.clone(), state);
        }
    }

    /// Turn the rationale signal for `key` on or off.
    pub fn set_rationale(&self, key: &CapabilityKey, show: bool) {
        if let Ok(mut guard) = self.rationale.lock() {
            if show {
                guard.insert(key.clone());
            } else {
                guard.remove(key);
            }
        }
    }

    /// Queue a reply for a later request.
    pub fn queue_reply(&self, reply: ScriptedReply) {
        if let Ok(mut guard) = self.replies.lock() {
            guard.push_back(reply);
        }
    }

    /// Every request received so far.
    #[must_use]
    pub fn requests(&self) -> Vec<GrantRequest> {
        self.requests
            .lock()
            .map(|guard| guard.clone())
            .unwrap_or_default()
    }

    /// Number of requests received so far.
    #[must_use]
    pub fn request_count(&self) -> usize {
        self.requests.lock().map(|guard| guard.len()).unwrap_or(0)
    }

    /// Take the oldest unanswered sink, if any.
    #[must_use]
    pub fn take_sink(&self) -> Option<ResultSink> {
        self.sinks.lock().ok().and_then(|mut guard| guard.pop_front())
    }

    /// Wait for an unanswered request and take its sink.
    pub async fn wait_for_sink(&self) -> ResultSink {
        loop {
            if let Some(sink) = self.take_sink() {
                return sink;
            }
            self.sink_ready.notified().await;
        }
    }

    fn next_reply(&self) -> Option<ScriptedReply> {
        self.replies.lock().ok().and_then(|mut guard| guard.pop_front())
    }

    fn remember(&self, outcomes: &[GrantOutcome]) {
        for outcome in outcomes {
            if outcome.state != GrantState::Unknown {
                self.set_state(&outcome.key, outcome.state);
            }
        }
    }
}

impl GrantAuthority for ScriptedAuthority {
    fn current_state(&self, key: &CapabilityKey) -> GrantState {
        self.states
            .lock()
            .ok()
            .and_then(|guard| guard.get(key).copied())
            .unwrap_or_default()
    }

    fn should_show_rationale(&self, key: &CapabilityKey) -> bool {
        self.rationale
            .lock()
            .is_ok_and(|guard| guard.contains(key))
    }

    fn request_grants(
        &self,
        request: &GrantRequest,
        sink: ResultSink,
    ) -> Result<(), AuthorityError> {
        if let Ok(mut guard) = self.requests.lock() {
            guard.push(request.clone());
        }

        let outcomes = match self.next_reply() {
            None => {
                if let Ok(mut guard) = self.sinks.lock() {
                    guard.push_back(sink);
                }
                self.sink_ready.notify_one();
                return Ok(());
            },
            Some(ScriptedReply::Refuse(err)) => return Err(err),
            Some(ScriptedReply::Fail(err)) => {
                sink.fail(err);
                return Ok(());
            },
            Some(ScriptedReply::States(states)) => request
                .keys
                .iter()
                .zip(states)
                .map(|(key, state)| GrantOutcome::new(key.clone(), state))
                .collect(),
            Some(ScriptedReply::All(state)) => request
                .keys
                .iter()
                .map(|key| GrantOutcome::new(key.clone(), state))
                .collect(),
            Some(ScriptedReply::Raw(outcomes)) => outcomes,
        };

        self.remember(&outcomes);
        sink.deliver(outcomes);
        Ok(())
    }
}

/// A callback received by a [`RecordingClient`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClientEvent {
    /// `on_all_granted`.
    AllGranted,
    /// `on_needs_rationale`.
    NeedsRationale(CapabilityKey),
    /// `on_needs_settings_redirect`.
    NeedsSettings(CapabilityKey),
    /// `on_released`.
    Released,
}

/// [`CapabilityClient`] that records every callback.
#[derive(Debug, Clone, Default)]
pub struct RecordingClient {
    events: Arc<Mutex<Vec<ClientEvent>>>,
    states: Arc<Mutex<Vec<GateState>>>,
}

impl RecordingClient {
    /// Create an empty recorder.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Callbacks received so far, in order.
    #[must_use]
    pub fn events(&self) -> Vec<ClientEvent> {
        self.events
            .lock()
            .map(|guard| guard.clone())
            .unwrap_or_default()
    }

    /// State transitions reported so far, in order.
    #[must_use]
    pub fn states(&self) -> Vec<GateState> {
        self.states
            .lock()
            .map(|guard| guard.clone())
            .unwrap_or_default()
    }

    /// Whether `on_all_granted` was ever called.
    #[must_use]
    pub fn was_granted(&self) -> bool {
        self.events().contains(&ClientEvent::AllGranted)
    }

    /// Forget everything recorded.
    pub fn clear(&self) {
        if let Ok(mut guard) = self.events.lock() {
            guard.clear();
        }
        if let Ok(mut guard) = self.states.lock() {
            guard.clear();
        }
    }

    fn push(&self, event: ClientEvent) {
        if let Ok(mut guard) = self.events.lock() {
            guard.push(event);
        }
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
        if let Ok(mut guard) = self.states.lock() {
            guard.push(state.clone());
        }
    }
}
