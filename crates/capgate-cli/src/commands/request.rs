//! Request command: negotiate capabilities, then run the gated capture.
//!
//! Mirrors the flow of a mobile app guarding a recording service: when every
//! capability is granted the capture starts and runs until the user stops
//! it; a denial that deserves an explanation shows the rationale with a
//! RETRY / I'M SURE choice; anything else offers SETTINGS / NOT NOW, where
//! SETTINGS opens the settings screen for the key and asks again once it is
//! allowed.

use std::io::IsTerminal;
use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use capgate_grant::{
    CapabilityClient, CapabilityGate, CapabilityKey, Decision, GateState, GrantCoordinator,
};
use dialoguer::Select;
use dialoguer::theme::ColorfulTheme;
use tracing::{debug, info};

use super::AppContext;
use crate::config_bridge::overlap_policy;
use crate::terminal_authority::TerminalAuthority;
use crate::theme::Theme;

/// Prints gate callbacks to the terminal.
struct TerminalClient {
    rationale: String,
    settings_hint: String,
}

#[async_trait]
impl CapabilityClient for TerminalClient {
    async fn on_all_granted(&self) {
        println!("{}", Theme::success("All capabilities granted. Capture started."));
    }

    async fn on_needs_rationale(&self, key: &CapabilityKey) {
        println!(
            "\n{}\n",
            Theme::dialog_box(&format!("{key} is required"), &self.rationale)
        );
    }

    async fn on_needs_settings_redirect(&self, key: &CapabilityKey) {
        println!("{}", Theme::warning(&format!("{key}: {}", self.settings_hint)));
        println!(
            "  {}",
            Theme::dimmed(&format!("Run `capgate settings grant {key}` to allow it."))
        );
    }

    async fn on_released(&self) {
        println!("{}", Theme::info("Capture stopped."));
    }

    fn on_state_changed(&self, state: &GateState) {
        debug!(?state, "gate state changed");
    }
}

/// The interactive choices between negotiation rounds.
#[async_trait]
pub(crate) trait SessionControls: Send + Sync {
    /// After a rationale: `true` for RETRY, `false` for I'M SURE.
    fn offer_retry(&self) -> Result<bool>;

    /// After a settings redirect: SETTINGS or NOT NOW. Returns `true` if the
    /// user allowed `key` on the settings screen.
    async fn offer_settings(&self, key: &CapabilityKey) -> Result<bool>;

    /// Block until the user stops the running capture.
    fn wait_for_stop(&self) -> Result<()>;
}

/// [`SessionControls`] on the controlling terminal.
struct DialoguerControls {
    authority: TerminalAuthority,
}

#[async_trait]
impl SessionControls for DialoguerControls {
    fn offer_retry(&self) -> Result<bool> {
        if !std::io::stdin().is_terminal() {
            return Ok(false);
        }
        let choice = Select::with_theme(&ColorfulTheme::default())
            .with_prompt("Ask again?")
            .items(&["RETRY", "I'M SURE"])
            .default(0)
            .interact()?;
        Ok(choice == 0)
    }

    async fn offer_settings(&self, key: &CapabilityKey) -> Result<bool> {
        if !std::io::stdin().is_terminal() {
            return Ok(false);
        }
        let theme = ColorfulTheme::default();
        let open = Select::with_theme(&theme)
            .with_prompt(format!("{key} is blocked"))
            .items(&["SETTINGS", "NOT NOW"])
            .default(0)
            .interact()?;
        if open != 0 {
            return Ok(false);
        }

        println!("\n{}", Theme::header(&format!("Settings: {key}")));
        let allow = Select::with_theme(&theme)
            .with_prompt("Capability access")
            .items(&["Allow", "Keep denied"])
            .default(0)
            .interact()?;
        if allow != 0 {
            return Ok(false);
        }
        self.authority.grant(key).await?;
        info!(%key, "granted from the settings screen");
        println!("{}", Theme::success(&format!("{key} is now allowed.")));
        Ok(true)
    }

    fn wait_for_stop(&self) -> Result<()> {
        if !std::io::stdin().is_terminal() {
            return Ok(());
        }
        Select::with_theme(&ColorfulTheme::default())
            .with_prompt("Capture running")
            .items(&["Stop capture"])
            .default(0)
            .interact()?;
        Ok(())
    }
}

/// What a negotiation round asks for next.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum NextStep {
    Run,
    OfferRetry,
    Redirect,
    Incomplete,
}

fn next_step(decisions: &[Decision]) -> NextStep {
    if decisions.iter().any(Decision::is_proceed) {
        NextStep::Run
    } else if decisions
        .iter()
        .any(|d| matches!(d, Decision::ShowRationale(_)))
    {
        NextStep::OfferRetry
    } else if decisions.is_empty() {
        NextStep::Incomplete
    } else {
        NextStep::Redirect
    }
}

fn redirected_key(decision: &Decision) -> Option<&CapabilityKey> {
    match decision {
        Decision::RedirectToSettings(key) => Some(key),
        _ => None,
    }
}

/// How a request session ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum SessionEnd {
    /// The capture ran and was stopped.
    Released,
    /// The user dismissed the rationale.
    Declined,
    /// Only settings can grant what is missing, and the user did not go there.
    Redirected,
    /// The authority's answer was discarded.
    Incomplete,
}

/// Negotiate until the capture has run or the user gives up.
pub(crate) async fn negotiate(
    gate: &CapabilityGate,
    keys: &[CapabilityKey],
    controls: &dyn SessionControls,
) -> Result<SessionEnd> {
    loop {
        let decisions = gate.acquire(keys).await?;
        match next_step(&decisions) {
            NextStep::Run => {
                controls.wait_for_stop()?;
                gate.release().await;
                return Ok(SessionEnd::Released);
            },
            NextStep::OfferRetry => {
                if !controls.offer_retry()? {
                    return Ok(SessionEnd::Declined);
                }
                debug!("retrying after rationale");
            },
            NextStep::Redirect => {
                for key in decisions.iter().filter_map(redirected_key) {
                    if !controls.offer_settings(key).await? {
                        return Ok(SessionEnd::Redirected);
                    }
                }
                debug!("retrying after settings change");
            },
            NextStep::Incomplete => return Ok(SessionEnd::Incomplete),
        }
    }
}

/// Run `capgate request`.
pub(crate) async fn run_request(ctx: &AppContext, keys: &[CapabilityKey]) -> Result<()> {
    let config = &ctx.resolved.config;
    let (coordinator, replies) =
        GrantCoordinator::new(Arc::new(ctx.authority.clone()), ctx.consent.clone());
    let coordinator = coordinator.with_overlap_policy(overlap_policy(config));
    let client = Arc::new(TerminalClient {
        rationale: config.negotiation.rationale.clone(),
        settings_hint: config.negotiation.settings_hint.clone(),
    });
    let gate = CapabilityGate::new(coordinator, replies, client);

    let names: Vec<&str> = keys.iter().map(CapabilityKey::as_str).collect();
    println!("{}", Theme::info(&format!("Requesting {}", names.join(", "))));

    let controls = DialoguerControls {
        authority: ctx.authority.clone(),
    };
    match negotiate(&gate, keys, &controls).await? {
        SessionEnd::Released | SessionEnd::Redirected => {},
        SessionEnd::Declined => println!("{}", Theme::info("Capture not started.")),
        SessionEnd::Incomplete => println!(
            "{}",
            Theme::error("The authority answered with an unexpected result. Try again.")
        ),
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::collections::VecDeque;
    use std::sync::Mutex;

    use capgate_grant::{ConsentStore, GrantAuthority, GrantOutcome, GrantState};
    use capgate_test::prelude::*;

    use super::*;

    #[derive(Default)]
    struct ScriptedControls {
        retries: Mutex<VecDeque<bool>>,
        offers: Mutex<usize>,
        stops: Mutex<usize>,
        /// Answers settings offers by allowing the key on this authority.
        settings: Option<ScriptedAuthority>,
        settings_offers: Mutex<Vec<CapabilityKey>>,
    }

    impl ScriptedControls {
        fn retrying(answers: &[bool]) -> Self {
            Self {
                retries: Mutex::new(answers.iter().copied().collect()),
                ..Self::default()
            }
        }

        fn allowing_in_settings(authority: &ScriptedAuthority) -> Self {
            Self {
                settings: Some(authority.clone()),
                ..Self::default()
            }
        }

        fn settings_offers(&self) -> Vec<CapabilityKey> {
            self.settings_offers.lock().unwrap().clone()
        }

        fn offers(&self) -> usize {
            *self.offers.lock().unwrap()
        }

        fn stops(&self) -> usize {
            *self.stops.lock().unwrap()
        }
    }

    #[async_trait]
    impl SessionControls for ScriptedControls {
        async fn offer_settings(&self, key: &CapabilityKey) -> Result<bool> {
            self.settings_offers.lock().unwrap().push(key.clone());
            let Some(authority) = &self.settings else {
                return Ok(false);
            };
            authority.set_state(key, GrantState::Granted);
            Ok(true)
        }

        fn offer_retry(&self) -> Result<bool> {
            let mut offers = self.offers.lock().unwrap();
            *offers = offers.saturating_add(1);
            Ok(self.retries.lock().unwrap().pop_front().unwrap_or(false))
        }

        fn wait_for_stop(&self) -> Result<()> {
            let mut stops = self.stops.lock().unwrap();
            *stops = stops.saturating_add(1);
            Ok(())
        }
    }

    fn gate(authority: &ScriptedAuthority, client: &RecordingClient) -> CapabilityGate {
        let (coordinator, replies) =
            GrantCoordinator::new(Arc::new(authority.clone()), ConsentStore::in_memory());
        CapabilityGate::new(coordinator, replies, Arc::new(client.clone()))
    }

    #[test]
    fn next_step_classification() {
        let key = storage_key();
        assert_eq!(next_step(&[Decision::Proceed]), NextStep::Run);
        assert_eq!(
            next_step(&[
                Decision::RedirectToSettings(audio_key()),
                Decision::ShowRationale(key.clone()),
            ]),
            NextStep::OfferRetry
        );
        assert_eq!(
            next_step(&[Decision::RedirectToSettings(key)]),
            NextStep::Redirect
        );
        assert_eq!(next_step(&[]), NextStep::Incomplete);
    }

    #[tokio::test]
    async fn granted_capture_runs_until_stopped() {
        let authority = ScriptedAuthority::new().with_reply(ScriptedReply::All(GrantState::Granted));
        let client = RecordingClient::new();
        let controls = ScriptedControls::default();

        let end = negotiate(&gate(&authority, &client), &[storage_key()], &controls)
            .await
            .unwrap();

        assert_eq!(end, SessionEnd::Released);
        assert_eq!(controls.stops(), 1);
        assert_eq!(
            client.events(),
            vec![ClientEvent::AllGranted, ClientEvent::Released]
        );
    }

    #[tokio::test]
    async fn already_granted_skips_the_prompt() {
        let key = storage_key();
        let authority = ScriptedAuthority::new().with_state(&key, GrantState::Granted);
        let client = RecordingClient::new();

        let end = negotiate(
            &gate(&authority, &client),
            &[key],
            &ScriptedControls::default(),
        )
        .await
        .unwrap();

        assert_eq!(end, SessionEnd::Released);
        assert_eq!(authority.request_count(), 0);
    }

    #[tokio::test]
    async fn retry_after_rationale_asks_again() {
        let key = storage_key();
        let authority = ScriptedAuthority::new()
            .with_rationale(&key)
            .with_reply(ScriptedReply::All(GrantState::Denied))
            .with_reply(ScriptedReply::All(GrantState::Granted));
        let client = RecordingClient::new();
        let controls = ScriptedControls::retrying(&[true]);

        let end = negotiate(&gate(&authority, &client), &[key.clone()], &controls)
            .await
            .unwrap();

        assert_eq!(end, SessionEnd::Released);
        assert_eq!(authority.request_count(), 2);
        assert_eq!(controls.offers(), 1);
        assert_eq!(
            client.events(),
            vec![
                ClientEvent::NeedsRationale(key),
                ClientEvent::AllGranted,
                ClientEvent::Released,
            ]
        );
    }

    #[tokio::test]
    async fn dismissing_the_rationale_ends_the_session() {
        let key = storage_key();
        let authority = ScriptedAuthority::new()
            .with_rationale(&key)
            .with_reply(ScriptedReply::All(GrantState::Denied));
        let client = RecordingClient::new();
        let controls = ScriptedControls::retrying(&[false]);

        let end = negotiate(&gate(&authority, &client), &[key], &controls)
            .await
            .unwrap();

        assert_eq!(end, SessionEnd::Declined);
        assert_eq!(authority.request_count(), 1);
        assert_eq!(controls.stops(), 0);
        assert!(!client.was_granted());
    }

    #[tokio::test]
    async fn hard_denial_redirects_without_offering_retry() {
        let key = audio_key();
        let authority = ScriptedAuthority::new().with_reply(ScriptedReply::All(GrantState::Denied));
        let client = RecordingClient::new();
        let controls = ScriptedControls::default();

        let end = negotiate(&gate(&authority, &client), &[key.clone()], &controls)
            .await
            .unwrap();

        assert_eq!(end, SessionEnd::Redirected);
        assert_eq!(controls.offers(), 0);
        assert_eq!(controls.settings_offers(), vec![key.clone()]);
        assert_eq!(client.events(), vec![ClientEvent::NeedsSettings(key)]);
    }

    #[tokio::test]
    async fn allowing_in_settings_starts_the_capture() {
        let key = audio_key();
        let authority = ScriptedAuthority::new().with_reply(ScriptedReply::All(GrantState::Denied));
        let client = RecordingClient::new();
        let controls = ScriptedControls::allowing_in_settings(&authority);

        let end = negotiate(&gate(&authority, &client), &[key.clone()], &controls)
            .await
            .unwrap();

        assert_eq!(end, SessionEnd::Released);
        assert_eq!(authority.request_count(), 1);
        assert_eq!(controls.settings_offers(), vec![key.clone()]);
        assert_eq!(controls.stops(), 1);
        assert_eq!(
            client.events(),
            vec![
                ClientEvent::NeedsSettings(key),
                ClientEvent::AllGranted,
                ClientEvent::Released,
            ]
        );
    }

    #[tokio::test]
    async fn mismatched_answer_is_incomplete() {
        let authority = ScriptedAuthority::new().with_reply(ScriptedReply::Raw(vec![
            GrantOutcome::granted(test_key("someone-else")),
        ]));
        let client = RecordingClient::new();

        let end = negotiate(
            &gate(&authority, &client),
            &[storage_key()],
            &ScriptedControls::default(),
        )
        .await
        .unwrap();

        assert_eq!(end, SessionEnd::Incomplete);
        assert!(client.events().is_empty());
        assert_eq!(authority.current_state(&storage_key()), GrantState::Unknown);
    }
}
