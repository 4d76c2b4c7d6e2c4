//! Capgate Test - shared test utilities.
//!
//! Test doubles for both sides of a negotiation, plus fixtures and harness
//! helpers. Intended as a dev-dependency.
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use capgate_grant::{CapabilityGate, ConsentStore, Decision, GrantCoordinator, GrantState};
//! use capgate_test::{RecordingClient, ScriptedAuthority, ScriptedReply, test_keys};
//!
//! #[tokio::test]
//! async fn denied_without_rationale() {
//!     let authority = ScriptedAuthority::new()
//!         .with_reply(ScriptedReply::States(vec![GrantState::Denied]));
//!     let client = RecordingClient::new();
//!     let (coordinator, replies) =
//!         GrantCoordinator::new(Arc::new(authority), ConsentStore::in_memory());
//!     let gate = CapabilityGate::new(coordinator, replies, Arc::new(client));
//!
//!     let decisions = gate.acquire(&test_keys(&["storage"])).await.unwrap();
//!     assert!(matches!(decisions[0], Decision::RedirectToSettings(_)));
//! }
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]
#![deny(clippy::all)]
#![warn(unreachable_pub)]

pub mod prelude;

pub mod fixtures;
pub mod harness;
pub mod mocks;

pub use fixtures::*;
pub use harness::*;
pub use mocks::*;
