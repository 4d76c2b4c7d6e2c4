//! Grant coordinator, the negotiation core.
//!
//! The [`GrantCoordinator`] sits between the application and the
//! [`GrantAuthority`]:
//!
//! 1. [`evaluate`](GrantCoordinator::evaluate) works out which keys are
//!    still missing (read-only)
//! 2. [`request`](GrantCoordinator::request) records the keys as asked,
//!    then issues one batched request to the authority
//! 3. The authority answers through a [`ResultSink`]; the answer is fed to
//!    [`on_result`](GrantCoordinator::on_result) or
//!    [`on_failure`](GrantCoordinator::on_failure)
//! 4. Each denied key is classified into a [`Decision`]
//!
//! Only one request is tracked at a time. Issuing a new one supersedes the
//! old one, and any answer still in flight for it is dropped as stale.

use std::sync::{Arc, Mutex, MutexGuard};

use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

use crate::authority::{GrantAuthority, GrantReplies, GrantReply, GrantResponse, ResultSink};
use crate::consent::ConsentStore;
use crate::decision::Decision;
use crate::error::{AuthorityError, GrantError, GrantResult};
use crate::key::{CapabilityKey, dedup_ordered};
use crate::outcome::{Evaluation, GrantOutcome, GrantState};
use crate::request::{GrantRequest, RequestId};

/// What to do when a request is issued while another is outstanding.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OverlapPolicy {
    /// The new request replaces the old one.
    #[default]
    Supersede,
    /// The new request fails with [`GrantError::RequestPending`].
    Reject,
}

/// Negotiates capability grants with a [`GrantAuthority`].
pub struct GrantCoordinator {
    authority: Arc<dyn GrantAuthority>,
    consent: ConsentStore,
    overlap: OverlapPolicy,
    /// The most recently issued request that has not been resolved.
    current: Mutex<Option<GrantRequest>>,
    tx: mpsc::UnboundedSender<GrantResponse>,
}

impl GrantCoordinator {
    /// Create a coordinator and the channel its authority answers on.
    #[must_use]
    pub fn new(authority: Arc<dyn GrantAuthority>, consent: ConsentStore) -> (Self, GrantReplies) {
        let (tx, rx) = mpsc::unbounded_channel();
        let coordinator = Self {
            authority,
            consent,
            overlap: OverlapPolicy::default(),
            current: Mutex::new(None),
            tx,
        };
        (coordinator, rx)
    }

    /// Set the overlap policy.
    #[must_use]
    pub fn with_overlap_policy(mut self, overlap: OverlapPolicy) -> Self {
        self.overlap = overlap;
        self
    }

    /// The consent history this coordinator writes to.
    #[must_use]
    pub fn consent(&self) -> &ConsentStore {
        &self.consent
    }

    /// Which of `required` are not currently granted.
    ///
    /// Asks the authority for each key's current state. No prompts, no
    /// writes. The result keeps input order and drops repeats.
    #[must_use]
    pub fn evaluate(&self, required: &[CapabilityKey]) -> Evaluation {
        let missing: Vec<CapabilityKey> = dedup_ordered(required)
            .into_iter()
            .filter(|key| !self.authority.current_state(key).is_granted())
            .collect();
        Evaluation {
            all_granted: missing.is_empty(),
            missing,
        }
    }

    /// Ask the authority for `missing`.
    ///
    /// Every key is recorded as asked before the authority is contacted.
    /// If the authority refuses to start the prompt, a failure reply is
    /// queued in its place so the caller still reaches a decision.
    ///
    /// # Errors
    ///
    /// - [`GrantError::InvalidArgument`] if `missing` is empty
    /// - [`GrantError::RequestPending`] under [`OverlapPolicy::Reject`]
    ///   while another request is outstanding
    /// - [`GrantError::Storage`] if consent history cannot be written; the
    ///   request is then not issued
    pub async fn request(&self, missing: &[CapabilityKey]) -> GrantResult<GrantRequest> {
        let request = GrantRequest::new(missing)?;

        let superseded = {
            let mut current = self.lock_current()?;
            if self.overlap == OverlapPolicy::Reject
                && let Some(pending) = current.as_ref()
            {
                return Err(GrantError::RequestPending {
                    request_id: pending.id.clone(),
                });
            }
            current.replace(request.clone())
        };

        for key in &request.keys {
            if let Err(e) = self.consent.mark_asked(key).await {
                let mut current = self.lock_current()?;
                if current.as_ref().is_some_and(|r| r.id == request.id) {
                    *current = superseded;
                }
                return Err(e);
            }
        }

        if let Some(old) = &superseded {
            tracing::info!(
                request_id = %request.id,
                superseded = %old.id,
                "superseding outstanding grant request"
            );
        }
        tracing::info!(request_id = %request.id, keys = ?request.keys, "issuing grant request");

        let sink = ResultSink::new(request.id.clone(), self.tx.clone());
        if let Err(e) = self.authority.request_grants(&request, sink.clone()) {
            tracing::warn!(request_id = %request.id, error = %e, "authority refused grant request");
            sink.fail(e);
        }
        Ok(request)
    }

    /// Handle an authority answer.
    ///
    /// Returns no decisions if `request_id` is not the outstanding request
    /// or if `outcomes` does not line up one-to-one with the requested keys.
    /// Otherwise returns `[Proceed]` when everything was granted, or one
    /// decision per denied key in outcome order. Never touches consent
    /// history.
    pub fn on_result(&self, request_id: &RequestId, outcomes: &[GrantOutcome]) -> Vec<Decision> {
        let Some(request) = self.take_if_current(request_id, |request| {
            if outcomes_match(request, outcomes) {
                true
            } else {
                tracing::warn!(
                    %request_id,
                    expected = request.keys.len(),
                    received = outcomes.len(),
                    "grant result does not match the request, ignoring"
                );
                false
            }
        }) else {
            return Vec::new();
        };

        let decisions: Vec<Decision> = outcomes
            .iter()
            .filter_map(|outcome| self.classify(outcome))
            .collect();

        if decisions.is_empty() {
            tracing::info!(request_id = %request.id, "all requested capabilities granted");
            vec![Decision::Proceed]
        } else {
            decisions
        }
    }

    /// Handle an authority failure for a whole request.
    ///
    /// Every requested key gets [`Decision::RedirectToSettings`]; stale
    /// failures yield nothing.
    pub fn on_failure(&self, request_id: &RequestId, error: &AuthorityError) -> Vec<Decision> {
        let Some(request) = self.take_if_current(request_id, |_| true) else {
            return Vec::new();
        };
        tracing::warn!(request_id = %request.id, %error, "grant request failed");
        request
            .keys
            .into_iter()
            .map(Decision::RedirectToSettings)
            .collect()
    }

    /// Route a [`GrantResponse`] to [`on_result`](Self::on_result) or
    /// [`on_failure`](Self::on_failure).
    pub fn handle(&self, response: &GrantResponse) -> Vec<Decision> {
        match &response.reply {
            GrantReply::Outcomes(outcomes) => self.on_result(&response.request_id, outcomes),
            GrantReply::Failed(error) => self.on_failure(&response.request_id, error),
        }
    }

    /// The outstanding request, if any.
    #[must_use]
    pub fn pending(&self) -> Option<GrantRequest> {
        self.current.lock().ok().and_then(|current| current.clone())
    }

    /// Whether `request_id` is the outstanding request.
    #[must_use]
    pub fn is_current(&self, request_id: &RequestId) -> bool {
        self.current
            .lock()
            .is_ok_and(|current| current.as_ref().is_some_and(|r| &r.id == request_id))
    }

    /// Stop tracking `request_id`. Returns `true` if it was outstanding.
    pub fn abandon(&self, request_id: &RequestId) -> bool {
        let abandoned = self.take_if_current(request_id, |_| true).is_some();
        if abandoned {
            tracing::debug!(%request_id, "abandoned grant request");
        }
        abandoned
    }

    fn classify(&self, outcome: &GrantOutcome) -> Option<Decision> {
        let key = &outcome.key;
        let decision = match outcome.state {
            GrantState::Granted => return None,
            GrantState::Denied if self.authority.should_show_rationale(key) => {
                Decision::ShowRationale(key.clone())
            },
            GrantState::Denied | GrantState::Unknown => Decision::RedirectToSettings(key.clone()),
        };
        tracing::info!(%key, state = %outcome.state, %decision, "capability not granted");
        Some(decision)
    }

    /// Remove and return the outstanding request if it has `request_id` and
    /// `accept` approves it.
    fn take_if_current(
        &self,
        request_id: &RequestId,
        accept: impl FnOnce(&GrantRequest) -> bool,
    ) -> Option<GrantRequest> {
        let mut current = match self.current.lock() {
            Ok(guard) => guard,
            Err(e) => {
                tracing::error!(error = %e, "grant coordinator state poisoned");
                return None;
            },
        };
        match current.as_ref() {
            Some(request) if &request.id == request_id => {
                if accept(request) {
                    current.take()
                } else {
                    None
                }
            },
            _ => {
                tracing::debug!(%request_id, "dropping stale grant result");
                None
            },
        }
    }

    fn lock_current(&self) -> GrantResult<MutexGuard<'_, Option<GrantRequest>>> {
        self.current
            .lock()
            .map_err(|e| GrantError::Internal(e.to_string()))
    }
}

/// One outcome per requested key, in the same order.
fn outcomes_match(request: &GrantRequest, outcomes: &[GrantOutcome]) -> bool {
    request.keys.len() == outcomes.len()
        && request
            .keys
            .iter()
            .zip(outcomes)
            .all(|(key, outcome)| key == &outcome.key)
}

impl std::fmt::Debug for GrantCoordinator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GrantCoordinator")
            .field("consent", &self.consent)
            .field("overlap", &self.overlap)
            .field("pending", &self.pending().map(|r| r.id))
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{TestAuthority, key, keys};

    fn make(authority: &Arc<TestAuthority>) -> (GrantCoordinator, GrantReplies) {
        GrantCoordinator::new(
            Arc::clone(authority) as Arc<dyn GrantAuthority>,
            ConsentStore::in_memory(),
        )
    }

    // -----------------------------------------------------------------------
    // evaluate
    // -----------------------------------------------------------------------

    #[tokio::test]
    async fn evaluate_returns_ungranted_subset_in_order() {
        let authority = Arc::new(TestAuthority::new());
        authority.set_state("b", GrantState::Granted);
        authority.set_state("c", GrantState::Denied);
        let (coordinator, _rx) = make(&authority);

        let evaluation = coordinator.evaluate(&keys(&["c", "b", "a", "c", "a"]));
        assert!(!evaluation.all_granted);
        assert_eq!(evaluation.missing, keys(&["c", "a"]));

        // Read-only: nothing recorded, nothing requested.
        assert!(coordinator.consent().records().await.unwrap().is_empty());
        assert!(authority.requests().is_empty());
    }

    #[test]
    fn evaluate_all_granted() {
        let authority = Arc::new(TestAuthority::new());
        authority.set_state("storage", GrantState::Granted);
        let (coordinator, _rx) = make(&authority);

        let evaluation = coordinator.evaluate(&keys(&["storage"]));
        assert!(evaluation.all_granted);
        assert!(evaluation.missing.is_empty());
    }

    // -----------------------------------------------------------------------
    // request
    // -----------------------------------------------------------------------

    #[tokio::test]
    async fn request_rejects_empty_keys() {
        let authority = Arc::new(TestAuthority::new());
        let (coordinator, _rx) = make(&authority);
        assert!(matches!(
            coordinator.request(&[]).await,
            Err(GrantError::InvalidArgument(_))
        ));
        assert!(coordinator.pending().is_none());
    }

    #[tokio::test]
    async fn request_marks_keys_asked_before_any_answer() {
        let authority = Arc::new(TestAuthority::new());
        let (coordinator, _rx) = make(&authority);

        let request = coordinator.request(&keys(&["a", "b"])).await.unwrap();

        // The authority has not answered, yet both keys count as asked.
        assert!(coordinator.consent().ever_asked(&key("a")).await.unwrap());
        assert!(coordinator.consent().ever_asked(&key("b")).await.unwrap());
        assert_eq!(authority.requests(), vec![request.clone()]);
        assert!(coordinator.is_current(&request.id));
    }

    #[tokio::test]
    async fn reject_policy_refuses_overlap() {
        let authority = Arc::new(TestAuthority::new());
        let (coordinator, _rx) = make(&authority);
        let coordinator = coordinator.with_overlap_policy(OverlapPolicy::Reject);

        let first = coordinator.request(&keys(&["a"])).await.unwrap();
        let err = coordinator.request(&keys(&["b"])).await.unwrap_err();
        assert!(matches!(err, GrantError::RequestPending { request_id } if request_id == first.id));

        // The rejected request never reached the consent store.
        assert!(!coordinator.consent().ever_asked(&key("b")).await.unwrap());
    }

    #[tokio::test]
    async fn dispatch_failure_becomes_a_failed_reply() {
        let authority = Arc::new(TestAuthority::new().failing_dispatch());
        let (coordinator, mut rx) = make(&authority);

        let request = coordinator.request(&keys(&["storage"])).await.unwrap();
        let response = rx.try_recv().unwrap();
        assert_eq!(response.request_id, request.id);
        assert!(matches!(response.reply, GrantReply::Failed(_)));

        assert_eq!(
            coordinator.handle(&response),
            vec![Decision::RedirectToSettings(key("storage"))]
        );
        assert!(coordinator.pending().is_none());
    }

    // -----------------------------------------------------------------------
    // on_result
    // -----------------------------------------------------------------------

    #[tokio::test]
    async fn all_granted_yields_single_proceed() {
        let authority = Arc::new(TestAuthority::new());
        let (coordinator, _rx) = make(&authority);
        let request = coordinator.request(&keys(&["a", "b"])).await.unwrap();

        let decisions = coordinator.on_result(
            &request.id,
            &[
                GrantOutcome::granted(key("a")),
                GrantOutcome::granted(key("b")),
            ],
        );
        assert_eq!(decisions, vec![Decision::Proceed]);
        assert!(coordinator.pending().is_none());
    }

    #[tokio::test]
    async fn denied_with_rationale_shows_rationale() {
        let authority = Arc::new(TestAuthority::new());
        authority.set_rationale("storage", true);
        let (coordinator, _rx) = make(&authority);
        let request = coordinator.request(&keys(&["storage"])).await.unwrap();

        let decisions =
            coordinator.on_result(&request.id, &[GrantOutcome::denied(key("storage"))]);
        assert_eq!(decisions, vec![Decision::ShowRationale(key("storage"))]);
    }

    #[tokio::test]
    async fn denied_without_rationale_redirects() {
        let authority = Arc::new(TestAuthority::new());
        let (coordinator, _rx) = make(&authority);
        let request = coordinator.request(&keys(&["storage"])).await.unwrap();

        let decisions =
            coordinator.on_result(&request.id, &[GrantOutcome::denied(key("storage"))]);
        assert_eq!(decisions, vec![Decision::RedirectToSettings(key("storage"))]);
    }

    #[tokio::test]
    async fn partial_grant_never_proceeds() {
        let authority = Arc::new(TestAuthority::new());
        let (coordinator, _rx) = make(&authority);
        let request = coordinator.request(&keys(&["a", "b"])).await.unwrap();

        let decisions = coordinator.on_result(
            &request.id,
            &[GrantOutcome::granted(key("a")), GrantOutcome::denied(key("b"))],
        );
        assert_eq!(decisions, vec![Decision::RedirectToSettings(key("b"))]);
    }

    #[tokio::test]
    async fn mixed_denials_keep_outcome_order() {
        let authority = Arc::new(TestAuthority::new());
        authority.set_rationale("b", true);
        let (coordinator, _rx) = make(&authority);
        let request = coordinator.request(&keys(&["a", "b", "c"])).await.unwrap();

        let decisions = coordinator.on_result(
            &request.id,
            &[
                GrantOutcome::denied(key("a")),
                GrantOutcome::denied(key("b")),
                GrantOutcome::granted(key("c")),
            ],
        );
        assert_eq!(
            decisions,
            vec![
                Decision::RedirectToSettings(key("a")),
                Decision::ShowRationale(key("b")),
            ]
        );
    }

    #[tokio::test]
    async fn unknown_outcome_redirects_without_rationale() {
        let authority = Arc::new(TestAuthority::new());
        authority.set_rationale("storage", true);
        let (coordinator, _rx) = make(&authority);
        let request = coordinator.request(&keys(&["storage"])).await.unwrap();

        let decisions = coordinator.on_result(
            &request.id,
            &[GrantOutcome::new(key("storage"), GrantState::Unknown)],
        );
        assert_eq!(decisions, vec![Decision::RedirectToSettings(key("storage"))]);
    }

    #[tokio::test]
    async fn stale_result_is_ignored_and_writes_nothing() {
        let authority = Arc::new(TestAuthority::new());
        let (coordinator, _rx) = make(&authority);
        let request = coordinator.request(&keys(&["a"])).await.unwrap();
        let before = coordinator.consent().records().await.unwrap();

        let decisions =
            coordinator.on_result(&RequestId::new(), &[GrantOutcome::granted(key("a"))]);
        assert!(decisions.is_empty());
        assert!(coordinator.is_current(&request.id));
        assert_eq!(coordinator.consent().records().await.unwrap(), before);
    }

    #[tokio::test]
    async fn superseded_request_result_is_dropped() {
        let authority = Arc::new(TestAuthority::new());
        let (coordinator, _rx) = make(&authority);
        let old = coordinator.request(&keys(&["a"])).await.unwrap();
        let new = coordinator.request(&keys(&["a"])).await.unwrap();

        assert!(
            coordinator
                .on_result(&old.id, &[GrantOutcome::granted(key("a"))])
                .is_empty()
        );
        assert_eq!(
            coordinator.on_result(&new.id, &[GrantOutcome::granted(key("a"))]),
            vec![Decision::Proceed]
        );
    }

    #[tokio::test]
    async fn cardinality_mismatch_is_ignored() {
        let authority = Arc::new(TestAuthority::new());
        let (coordinator, _rx) = make(&authority);
        let request = coordinator.request(&keys(&["a", "b"])).await.unwrap();

        assert!(
            coordinator
                .on_result(&request.id, &[GrantOutcome::granted(key("a"))])
                .is_empty()
        );
        assert!(coordinator.on_result(&request.id, &[]).is_empty());
        // Still outstanding: a well-formed answer can follow.
        assert!(coordinator.is_current(&request.id));
    }

    #[tokio::test]
    async fn key_order_mismatch_is_ignored() {
        let authority = Arc::new(TestAuthority::new());
        let (coordinator, _rx) = make(&authority);
        let request = coordinator.request(&keys(&["a", "b"])).await.unwrap();

        let decisions = coordinator.on_result(
            &request.id,
            &[GrantOutcome::granted(key("b")), GrantOutcome::granted(key("a"))],
        );
        assert!(decisions.is_empty());
    }

    #[tokio::test]
    async fn duplicate_answer_after_resolution_is_stale() {
        let authority = Arc::new(TestAuthority::new());
        let (coordinator, _rx) = make(&authority);
        let request = coordinator.request(&keys(&["a"])).await.unwrap();
        let outcomes = [GrantOutcome::granted(key("a"))];

        assert_eq!(
            coordinator.on_result(&request.id, &outcomes),
            vec![Decision::Proceed]
        );
        assert!(coordinator.on_result(&request.id, &outcomes).is_empty());
    }

    #[tokio::test]
    async fn stale_failure_is_ignored() {
        let authority = Arc::new(TestAuthority::new());
        let (coordinator, _rx) = make(&authority);
        let _request = coordinator.request(&keys(&["a"])).await.unwrap();

        let decisions = coordinator.on_failure(
            &RequestId::new(),
            &AuthorityError::Unavailable("gone".into()),
        );
        assert!(decisions.is_empty());
    }

    #[tokio::test]
    async fn abandon_only_matches_current() {
        let authority = Arc::new(TestAuthority::new());
        let (coordinator, _rx) = make(&authority);
        let request = coordinator.request(&keys(&["a"])).await.unwrap();

        assert!(!coordinator.abandon(&RequestId::new()));
        assert!(coordinator.abandon(&request.id));
        assert!(coordinator.pending().is_none());
    }

    #[test]
    fn debug_output() {
        let authority = Arc::new(TestAuthority::new());
        let (coordinator, _rx) = make(&authority);
        assert!(format!("{coordinator:?}").contains("GrantCoordinator"));
    }
}
