//! Consent history across coordinators, restarts and backends.

use std::sync::Arc;

use capgate_grant::{ConsentStore, GrantCoordinator, GrantState, NS_CONSENT};
use capgate_storage::{KvStore, SurrealKvStore};
use capgate_test::prelude::*;

#[tokio::test]
async fn ever_asked_flips_once_marked() {
    let (consent, _kv) = test_consent_store();
    let key = test_key("x");

    assert!(!consent.ever_asked(&key).await.unwrap());
    consent.mark_asked(&key).await.unwrap();
    assert!(consent.ever_asked(&key).await.unwrap());
}

#[tokio::test]
async fn history_outlives_the_coordinator() {
    let (consent, kv) = test_consent_store();
    let keys = test_keys(&["camera", "record-audio"]);
    {
        let authority = ScriptedAuthority::new().with_reply(ScriptedReply::All(GrantState::Denied));
        let (coordinator, mut replies) = GrantCoordinator::new(Arc::new(authority), consent);
        coordinator.request(&keys).await.unwrap();
        let response = replies.recv().await.unwrap();
        assert_eq!(coordinator.handle(&response).len(), 2);
    }

    let restarted = ConsentStore::with_kv_store(Arc::clone(&kv));
    for key in &keys {
        assert!(restarted.ever_asked(key).await.unwrap());
    }
    assert!(!restarted.ever_asked(&test_key("location")).await.unwrap());

    let mut stored = kv.list_keys(NS_CONSENT).await.unwrap();
    stored.sort();
    assert_eq!(stored, vec!["camera", "record-audio"]);
}

#[tokio::test]
async fn repeated_requests_keep_the_first_timestamp() {
    let (consent, _kv) = test_consent_store();
    let key = storage_key();
    let authority = ScriptedAuthority::new()
        .with_reply(ScriptedReply::All(GrantState::Denied))
        .with_reply(ScriptedReply::All(GrantState::Denied));
    let (coordinator, mut replies) = GrantCoordinator::new(Arc::new(authority), consent.clone());

    coordinator.request(&[key.clone()]).await.unwrap();
    replies.recv().await.unwrap();
    let first = consent.record(&key).await.unwrap().unwrap();

    coordinator.request(&[key.clone()]).await.unwrap();
    replies.recv().await.unwrap();
    let second = consent.record(&key).await.unwrap().unwrap();

    assert_eq!(first.first_asked_at, second.first_asked_at);
    assert_eq!(consent.records().await.unwrap().len(), 1);
}

#[tokio::test]
async fn on_disk_history_survives_reopen() {
    let dir = test_dir();
    let key = audio_key();

    {
        let disk = Arc::new(SurrealKvStore::open(dir.path()).unwrap());
        let consent = ConsentStore::with_kv_store(Arc::clone(&disk) as Arc<dyn KvStore>);
        let authority = ScriptedAuthority::new().with_reply(ScriptedReply::All(GrantState::Granted));
        let (coordinator, mut replies) = GrantCoordinator::new(Arc::new(authority), consent);
        coordinator.request(&[key.clone()]).await.unwrap();
        replies.recv().await.unwrap();
        disk.close().await.unwrap();
    }

    let reopened = ConsentStore::open(dir.path()).unwrap();
    let record = reopened.record(&key).await.unwrap().unwrap();
    assert!(record.ever_asked);
    assert!(record.first_asked_at.is_some());
}
