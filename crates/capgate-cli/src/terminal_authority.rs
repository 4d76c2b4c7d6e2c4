//! Simulated platform gatekeeper for the terminal.
//!
//! Plays the role a mobile OS plays for an app: it owns the real grant state
//! of every capability, shows the system prompt, and decides whether the app
//! may still ask. State lives in the shared key-value store under
//! [`NS_AUTHORITY`], so `capgate settings` and later runs see the same answers.
//!
//! The [`GrantAuthority`] queries are synchronous, so records are loaded into
//! an in-memory cache at startup and written through on every change.
//!
//! Prompt rules:
//! - a key already granted is answered without prompting
//! - a key marked "don't ask again" is denied without prompting
//! - the "don't ask again" choice is only offered after a first denial
//! - a rationale is due once a key has been denied and can still be asked

use std::collections::HashMap;
use std::io::IsTerminal;
use std::sync::{Arc, RwLock};

use capgate_grant::{
    AuthorityError, CapabilityKey, GrantAuthority, GrantOutcome, GrantRequest, GrantState,
    ResultSink,
};
use capgate_storage::{KvStore, ScopedKvStore, StorageResult};
use chrono::{DateTime, Utc};
use colored::Colorize;
use dialoguer::Select;
use dialoguer::theme::ColorfulTheme;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

/// Storage namespace for simulated grant state.
pub(crate) const NS_AUTHORITY: &str = "authority:grants";

/// What the simulated platform knows about one capability.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub(crate) struct AuthorityRecord {
    pub(crate) state: GrantState,
    /// Times the user has refused this capability.
    #[serde(default)]
    pub(crate) denials: u32,
    /// The user chose "don't ask again"; only settings can change the answer.
    #[serde(default)]
    pub(crate) never_ask_again: bool,
    #[serde(default)]
    pub(crate) updated_at: Option<DateTime<Utc>>,
}

impl AuthorityRecord {
    fn rationale_due(&self) -> bool {
        self.state != GrantState::Granted && self.denials > 0 && !self.never_ask_again
    }

    fn apply(mut self, answer: PromptAnswer) -> Self {
        match answer {
            PromptAnswer::Allow => {
                self.state = GrantState::Granted;
                self.never_ask_again = false;
            },
            PromptAnswer::Deny => {
                self.state = GrantState::Denied;
                self.denials = self.denials.saturating_add(1);
            },
            PromptAnswer::DenyAndDontAsk => {
                self.state = GrantState::Denied;
                self.denials = self.denials.saturating_add(1);
                self.never_ask_again = true;
            },
        }
        self.updated_at = Some(Utc::now());
        self
    }
}

/// A choice on the system prompt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum PromptAnswer {
    Allow,
    Deny,
    DenyAndDontAsk,
}

/// Shows the system prompt for one capability.
pub(crate) trait Prompter: Send + Sync {
    /// Whether a prompt can be shown at all.
    fn is_interactive(&self) -> bool;

    /// Ask about `key`. `offer_dont_ask` adds the "don't ask again" choice.
    fn ask(&self, key: &CapabilityKey, offer_dont_ask: bool) -> Result<PromptAnswer, String>;
}

/// [`Prompter`] backed by `dialoguer` on the controlling terminal.
#[derive(Debug, Default)]
pub(crate) struct DialoguerPrompter;

impl Prompter for DialoguerPrompter {
    fn is_interactive(&self) -> bool {
        std::io::stdin().is_terminal() && std::io::stderr().is_terminal()
    }

    fn ask(&self, key: &CapabilityKey, offer_dont_ask: bool) -> Result<PromptAnswer, String> {
        let mut items = vec!["Allow", "Deny"];
        if offer_dont_ask {
            items.push("Deny & don't ask again");
        }
        let prompt = format!("Allow capgate to use {}?", key.as_str().bold());
        let choice = Select::with_theme(&ColorfulTheme::default())
            .with_prompt(prompt)
            .items(items.as_slice())
            .default(0)
            .interact()
            .map_err(|e| e.to_string())?;
        Ok(match choice {
            0 => PromptAnswer::Allow,
            1 => PromptAnswer::Deny,
            _ => PromptAnswer::DenyAndDontAsk,
        })
    }
}

/// The terminal's [`GrantAuthority`].
#[derive(Clone)]
pub(crate) struct TerminalAuthority {
    grants: ScopedKvStore,
    cache: Arc<RwLock<HashMap<CapabilityKey, AuthorityRecord>>>,
    prompter: Arc<dyn Prompter>,
}

impl std::fmt::Debug for TerminalAuthority {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TerminalAuthority")
            .field("grants", &self.grants)
            .field("cached", &self.records().len())
            .finish_non_exhaustive()
    }
}

impl TerminalAuthority {
    /// Load every stored record from `store`.
    pub(crate) async fn load(
        store: Arc<dyn KvStore>,
        prompter: Arc<dyn Prompter>,
    ) -> StorageResult<Self> {
        let grants = ScopedKvStore::new(store, NS_AUTHORITY)?;
        let mut cache = HashMap::new();
        for raw in grants.list_keys().await? {
            let Ok(key) = CapabilityKey::new(raw.as_str()) else {
                warn!(key = %raw, "skipping malformed authority record key");
                continue;
            };
            if let Some(record) = grants.get_json::<AuthorityRecord>(&raw).await? {
                cache.insert(key, record);
            }
        }
        debug!(records = cache.len(), "loaded simulated grant state");
        Ok(Self {
            grants,
            cache: Arc::new(RwLock::new(cache)),
            prompter,
        })
    }

    /// The record for `key`, or a fresh one if nothing is stored.
    pub(crate) fn record(&self, key: &CapabilityKey) -> AuthorityRecord {
        self.cache
            .read()
            .ok()
            .and_then(|guard| guard.get(key).cloned())
            .unwrap_or_default()
    }

    /// Every stored record, sorted by key.
    pub(crate) fn records(&self) -> Vec<(CapabilityKey, AuthorityRecord)> {
        let mut records: Vec<_> = self
            .cache
            .read()
            .map(|guard| {
                guard
                    .iter()
                    .map(|(k, r)| (k.clone(), r.clone()))
                    .collect()
            })
            .unwrap_or_default();
        records.sort_by(|a, b| a.0.cmp(&b.0));
        records
    }

    /// Grant `key` from settings. Clears "don't ask again".
    pub(crate) async fn grant(&self, key: &CapabilityKey) -> StorageResult<()> {
        let record = self.record(key).apply(PromptAnswer::Allow);
        self.store(key, record).await
    }

    /// Revoke `key` from settings.
    pub(crate) async fn deny(&self, key: &CapabilityKey) -> StorageResult<()> {
        let record = self.record(key).apply(PromptAnswer::Deny);
        self.store(key, record).await
    }

    /// Forget everything about `key`. Returns `true` if a record existed.
    pub(crate) async fn reset(&self, key: &CapabilityKey) -> StorageResult<bool> {
        if let Ok(mut guard) = self.cache.write() {
            guard.remove(key);
        }
        self.grants.delete(key.as_str()).await
    }

    async fn store(&self, key: &CapabilityKey, record: AuthorityRecord) -> StorageResult<()> {
        self.grants.set_json(key.as_str(), &record).await?;
        if let Ok(mut guard) = self.cache.write() {
            guard.insert(key.clone(), record);
        }
        Ok(())
    }

    /// Prompt for every key of a request, blocking.
    fn prompt_all(
        prompter: &dyn Prompter,
        pending: Vec<(CapabilityKey, AuthorityRecord)>,
    ) -> Result<Vec<(CapabilityKey, AuthorityRecord)>, String> {
        pending
            .into_iter()
            .map(|(key, record)| {
                if record.state == GrantState::Granted {
                    return Ok((key, record));
                }
                if record.never_ask_again {
                    debug!(%key, "denied without prompting");
                    let denied = AuthorityRecord {
                        state: GrantState::Denied,
                        ..record
                    };
                    return Ok((key, denied));
                }
                let answer = prompter.ask(&key, record.denials > 0)?;
                Ok((key, record.apply(answer)))
            })
            .collect()
    }

    async fn answer(self, request: GrantRequest, sink: ResultSink) {
        let pending: Vec<_> = request
            .keys
            .iter()
            .map(|key| (key.clone(), self.record(key)))
            .collect();

        let prompter = Arc::clone(&self.prompter);
        let joined =
            tokio::task::spawn_blocking(move || Self::prompt_all(prompter.as_ref(), pending))
                .await;

        let answered = match joined {
            Ok(Ok(answered)) => answered,
            Ok(Err(msg)) => {
                warn!(request_id = %request.id, error = %msg, "prompt failed");
                sink.fail(AuthorityError::Unavailable(msg));
                return;
            },
            Err(e) => {
                warn!(request_id = %request.id, error = %e, "prompt task failed");
                sink.fail(AuthorityError::Unavailable(e.to_string()));
                return;
            },
        };

        let mut outcomes = Vec::with_capacity(answered.len());
        for (key, record) in answered {
            outcomes.push(GrantOutcome::new(key.clone(), record.state));
            if let Err(e) = self.store(&key, record).await {
                warn!(%key, error = %e, "failed to persist simulated grant state");
            }
        }
        sink.deliver(outcomes);
    }
}

impl GrantAuthority for TerminalAuthority {
    fn current_state(&self, key: &CapabilityKey) -> GrantState {
        self.record(key).state
    }

    fn should_show_rationale(&self, key: &CapabilityKey) -> bool {
        self.record(key).rationale_due()
    }

    fn request_grants(
        &self,
        request: &GrantRequest,
        sink: ResultSink,
    ) -> Result<(), AuthorityError> {
        if !self.prompter.is_interactive() {
            return Err(AuthorityError::Rejected(
                "no interactive terminal to show the prompt on".to_owned(),
            ));
        }
        let handle = tokio::runtime::Handle::try_current()
            .map_err(|e| AuthorityError::Unavailable(e.to_string()))?;
        handle.spawn(self.clone().answer(request.clone(), sink));
        Ok(())
    }
}
