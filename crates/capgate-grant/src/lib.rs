//! Capgate Grant - capability negotiation for gated functionality.
//!
//! Before an application starts something that needs platform capabilities
//! (writing to shared storage, recording audio, ...), it has to make sure
//! every one of them is granted. This crate handles the negotiation with
//! whatever authority owns those grants.
//!
//! # Components
//!
//! - [`GrantAuthority`]: the external gatekeeper (OS permission service,
//!   terminal prompt, test double)
//! - [`ConsentStore`]: durable "has this key ever been requested" history
//! - [`GrantCoordinator`]: evaluates, issues batched requests, correlates
//!   answers, classifies denials into [`Decision`]s
//! - [`CapabilityGate`]: drives a whole negotiation and reports the outcome to
//!   a [`CapabilityClient`]
//!
//! # Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use capgate_grant::prelude::*;
//!
//! let (coordinator, replies) = GrantCoordinator::new(authority, ConsentStore::in_memory());
//! let gate = CapabilityGate::new(coordinator, replies, client);
//!
//! let keys = CapabilityKey::parse_all([well_known::WRITE_EXTERNAL_STORAGE])?;
//! for decision in gate.acquire(&keys).await? {
//!     println!("{decision}");
//! }
//! ```

#![deny(unsafe_code)]
#![deny(missing_docs)]
#![deny(clippy::all)]
#![warn(unreachable_pub)]
#![deny(clippy::unwrap_used)]
#![cfg_attr(test, allow(clippy::unwrap_used))]

pub mod prelude;

pub mod authority;
pub mod consent;
pub mod coordinator;
pub mod decision;
/// Error types and results for grant negotiation.
pub mod error;
pub mod gate;
pub mod key;
pub mod outcome;
pub mod request;

#[cfg(test)]
mod test_support;

pub use authority::{GrantAuthority, GrantReplies, GrantReply, GrantResponse, ResultSink};
pub use consent::{ConsentRecord, ConsentStore, NS_CONSENT};
pub use coordinator::{GrantCoordinator, OverlapPolicy};
pub use decision::Decision;
pub use error::{AuthorityError, GrantError, GrantResult};
pub use gate::{CapabilityClient, CapabilityGate, GateState};
pub use key::{CapabilityKey, well_known};
pub use outcome::{Evaluation, GrantOutcome, GrantState};
pub use request::{GrantRequest, RequestId};
