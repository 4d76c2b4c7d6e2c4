use capgate_storage::StorageError;

use crate::request::RequestId;

/// Errors surfaced by the negotiation engine to its caller.
#[derive(Debug, thiserror::Error)]
pub enum GrantError {
    /// The caller passed something the engine cannot act on, such as an
    /// empty key set or a malformed capability key. Not retried.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// A request is already outstanding and the coordinator is configured
    /// to reject overlapping requests.
    #[error("grant request {request_id} is still pending")]
    RequestPending {
        /// The request that is still waiting on the authority.
        request_id: RequestId,
    },

    /// Consent history could not be read or written.
    #[error("storage error: {0}")]
    Storage(String),

    /// Internal engine failure (closed channel, poisoned lock).
    #[error("internal grant error: {0}")]
    Internal(String),
}

impl From<StorageError> for GrantError {
    fn from(e: StorageError) -> Self {
        Self::Storage(e.to_string())
    }
}

/// Result type for negotiation operations.
pub type GrantResult<T> = Result<T, GrantError>;

/// Failure reported by a [`GrantAuthority`](crate::GrantAuthority) instead of
/// per-key outcomes.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AuthorityError {
    /// The platform refused to show the prompt at all.
    #[error("authority rejected the request: {0}")]
    Rejected(String),

    /// The authority could not be reached.
    #[error("authority unavailable: {0}")]
    Unavailable(String),
}
