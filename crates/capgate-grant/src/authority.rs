//! The external gatekeeper that owns grant decisions.
//!
//! A [`GrantAuthority`] answers two synchronous questions about a key and
//! accepts fire-and-forget batched requests. Answers to a request come back
//! later, on whatever thread the authority likes, through the
//! [`ResultSink`] handed to it.
//!
//! # Example
//!
//! ```rust,ignore
//! use capgate_grant::prelude::*;
//!
//! struct AlwaysYes;
//!
//! impl GrantAuthority for AlwaysYes {
//!     fn current_state(&self, _key: &CapabilityKey) -> GrantState {
//!         GrantState::Unknown
//!     }
//!
//!     fn should_show_rationale(&self, _key: &CapabilityKey) -> bool {
//!         false
//!     }
//!
//!     fn request_grants(&self, request: &GrantRequest, sink: ResultSink) -> Result<(), AuthorityError> {
//!         let outcomes = request.keys.iter().cloned().map(GrantOutcome::granted).collect();
//!         sink.deliver(outcomes);
//!         Ok(())
//!     }
//! }
//! ```

use tokio::sync::mpsc;

use crate::error::AuthorityError;
use crate::key::CapabilityKey;
use crate::outcome::{GrantOutcome, GrantState};
use crate::request::{GrantRequest, RequestId};

/// Platform-level gatekeeper for capabilities.
pub trait GrantAuthority: Send + Sync {
    /// Current state of `key`. Must not prompt or have side effects.
    fn current_state(&self, key: &CapabilityKey) -> GrantState;

    /// Whether an explanation should be shown before asking for `key` again.
    ///
    /// Reflects the authority's own history (for example "denied once, but
    /// the user did not ask to stop being asked"), independent of the
    /// consent store.
    fn should_show_rationale(&self, key: &CapabilityKey) -> bool;

    /// Start asking for every key in `request`.
    ///
    /// Returns immediately. The answer, one outcome per requested key in
    /// request order, goes to `sink` whenever it is available; it may also
    /// be delivered before this method returns.
    ///
    /// # Errors
    ///
    /// Returns an [`AuthorityError`] if the prompt could not be started.
    fn request_grants(&self, request: &GrantRequest, sink: ResultSink)
    -> Result<(), AuthorityError>;
}

/// Payload of a [`GrantResponse`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GrantReply {
    /// One outcome per requested key.
    Outcomes(Vec<GrantOutcome>),
    /// The authority gave up without per-key answers.
    Failed(AuthorityError),
}

/// An answer from the authority, tagged with the request it belongs to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GrantResponse {
    /// The request being answered.
    pub request_id: RequestId,
    /// The answer.
    pub reply: GrantReply,
}

/// Receiving end for authority answers.
pub type GrantReplies = mpsc::UnboundedReceiver<GrantResponse>;

/// Return address for one grant request.
#[derive(Debug, Clone)]
pub struct ResultSink {
    request_id: RequestId,
    tx: mpsc::UnboundedSender<GrantResponse>,
}

impl ResultSink {
    pub(crate) fn new(request_id: RequestId, tx: mpsc::UnboundedSender<GrantResponse>) -> Self {
        Self { request_id, tx }
    }

    /// The request this sink answers.
    #[must_use]
    pub fn request_id(&self) -> &RequestId {
        &self.request_id
    }

    /// Deliver per-key outcomes.
    pub fn deliver(self, outcomes: Vec<GrantOutcome>) {
        self.send(GrantReply::Outcomes(outcomes));
    }

    /// Report that no per-key answer will come.
    pub fn fail(self, error: AuthorityError) {
        self.send(GrantReply::Failed(error));
    }

    #[cfg(test)]
    pub(crate) fn sender(&self) -> mpsc::UnboundedSender<GrantResponse> {
        self.tx.clone()
    }

    fn send(self, reply: GrantReply) {
        let request_id = self.request_id;
        if self
            .tx
            .send(GrantResponse {
                request_id: request_id.clone(),
                reply,
            })
            .is_err()
        {
            // Host went away before the answer arrived.
            tracing::debug!(%request_id, "grant result dropped, no receiver");
        }
    }
}
