//! Prelude module - commonly used types for convenient import.
//!
//! Use `use capgate_grant::prelude::*;` to import all essential types.

// Errors
pub use crate::{AuthorityError, GrantError, GrantResult};

// Keys, requests and outcomes
pub use crate::{CapabilityKey, GrantOutcome, GrantRequest, GrantState, RequestId, well_known};

// Negotiation
pub use crate::{Decision, Evaluation, GrantCoordinator, OverlapPolicy};

// Authority side
pub use crate::{GrantAuthority, GrantReply, GrantResponse, ResultSink};

// Host side
pub use crate::{CapabilityClient, CapabilityGate, ConsentStore, GateState};
