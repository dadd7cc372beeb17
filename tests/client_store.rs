// Copyright (c) Sabq Platform Team
// SPDX-License-Identifier: Apache-2.0

//! Interaction store behavior against a scripted transport: optimistic
//! toggles, revert-on-failure, retry policy and resync thresholds.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use sabq_interactions::client::{
    Identity, InteractionStore, InteractionTransport, ResyncTrigger, StoreError, StorePersistence,
    StoreSnapshot, ToggleResponse, TransportError,
};
use sabq_interactions::models::InteractionType;
use sabq_interactions::tracking::ArticleFlags;

/// Transport that pops scripted toggle results and counts calls.
struct MockTransport {
    toggle_script: Mutex<Vec<Result<ToggleResponse, TransportError>>>,
    flags_response: Mutex<HashMap<String, ArticleFlags>>,
    toggle_calls: AtomicUsize,
    flags_calls: AtomicUsize,
}

impl MockTransport {
    fn new(script: Vec<Result<ToggleResponse, TransportError>>) -> Arc<Self> {
        Arc::new(Self {
            toggle_script: Mutex::new(script),
            flags_response: Mutex::new(HashMap::new()),
            toggle_calls: AtomicUsize::new(0),
            flags_calls: AtomicUsize::new(0),
        })
    }

    fn with_flags(self: Arc<Self>, flags: HashMap<String, ArticleFlags>) -> Arc<Self> {
        *self.flags_response.lock().unwrap() = flags;
        self
    }

    fn toggle_calls(&self) -> usize {
        self.toggle_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl InteractionTransport for MockTransport {
    async fn toggle(
        &self,
        _article_id: &str,
        _kind: InteractionType,
    ) -> Result<ToggleResponse, TransportError> {
        self.toggle_calls.fetch_add(1, Ordering::SeqCst);
        let mut script = self.toggle_script.lock().unwrap();
        if script.is_empty() {
            panic!("unexpected toggle call");
        }
        script.remove(0)
    }

    async fn fetch_flags(
        &self,
        _article_ids: &[String],
    ) -> Result<HashMap<String, ArticleFlags>, TransportError> {
        self.flags_calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.flags_response.lock().unwrap().clone())
    }
}

/// In-memory snapshot storage for persistence tests.
#[derive(Default)]
struct MemoryPersistence {
    snapshot: Mutex<Option<StoreSnapshot>>,
}

impl StorePersistence for MemoryPersistence {
    fn load(&self) -> anyhow::Result<Option<StoreSnapshot>> {
        Ok(self.snapshot.lock().unwrap().clone())
    }

    fn save(&self, snapshot: &StoreSnapshot) -> anyhow::Result<()> {
        *self.snapshot.lock().unwrap() = Some(snapshot.clone());
        Ok(())
    }
}

fn identity() -> Option<Identity> {
    Some(Identity::UserId("user-1".to_string()))
}

fn store_with(transport: Arc<MockTransport>) -> InteractionStore {
    InteractionStore::new(transport, identity()).with_retry_base_delay(Duration::from_millis(1))
}

fn liked_response(liked: bool) -> ToggleResponse {
    ToggleResponse {
        success: true,
        liked: Some(liked),
        action: Some(if liked { "added" } else { "removed" }.to_string()),
        message: "ok".to_string(),
        ..Default::default()
    }
}

fn server_error() -> TransportError {
    TransportError::Status {
        status: 503,
        message: "unavailable".to_string(),
    }
}

#[test]
fn toggle_requires_an_identity() {
    tokio_test::block_on(async {
        let transport = MockTransport::new(vec![]);
        let store = InteractionStore::new(transport.clone(), None);

        let result = store.toggle("a1", InteractionType::Like).await;
        assert!(matches!(result, Err(StoreError::Unauthenticated)));
        assert_eq!(transport.toggle_calls(), 0);
    });
}

#[tokio::test]
#[tracing_test::traced_test]
async fn corrupted_snapshots_are_reported_and_ignored() {
    struct BrokenPersistence;
    impl StorePersistence for BrokenPersistence {
        fn load(&self) -> anyhow::Result<Option<StoreSnapshot>> {
            Err(anyhow::anyhow!("unexpected end of JSON input"))
        }
        fn save(&self, _snapshot: &StoreSnapshot) -> anyhow::Result<()> {
            Ok(())
        }
    }

    let transport = MockTransport::new(vec![]);
    let store = store_with(transport).with_persistence(Box::new(BrokenPersistence));
    store.load().await;

    // The store starts empty and the failure is only logged.
    assert!(!store.flags("a1").await.liked);
    assert!(logs_contain("Failed to load interaction snapshot"));
}

#[test_log::test(tokio::test)]
async fn successful_toggle_reconciles_with_the_server() {
    let transport = MockTransport::new(vec![Ok(liked_response(true))]);
    let store = store_with(transport.clone());

    let confirmed = store.toggle("a1", InteractionType::Like).await.unwrap();
    assert!(confirmed);
    assert!(store.flags("a1").await.liked);
    assert_eq!(transport.toggle_calls(), 1);
}

#[test_log::test(tokio::test)]
async fn terminal_failure_reverts_the_optimistic_flip() {
    // 400-level responses are terminal: one call, no retries, flag reverted.
    let transport = MockTransport::new(vec![Err(TransportError::Status {
        status: 401,
        message: "unauthorized".to_string(),
    })]);
    let store = store_with(transport.clone());

    let result = store.toggle("a1", InteractionType::Like).await;
    assert!(matches!(result, Err(StoreError::Transport(_))));
    assert!(!store.flags("a1").await.liked);
    assert_eq!(transport.toggle_calls(), 1);
}

#[test_log::test(tokio::test)]
async fn retryable_failures_are_retried_then_succeed() {
    let transport = MockTransport::new(vec![
        Err(server_error()),
        Err(server_error()),
        Ok(liked_response(true)),
    ]);
    let store = store_with(transport.clone());

    let confirmed = store.toggle("a1", InteractionType::Like).await.unwrap();
    assert!(confirmed);
    assert_eq!(transport.toggle_calls(), 3);
}

#[test_log::test(tokio::test)]
async fn retries_exhaust_and_the_flag_reverts() {
    // Initial call plus three retries, then the optimistic flip reverts.
    let transport = MockTransport::new(vec![
        Err(TransportError::Network("offline".to_string())),
        Err(TransportError::Network("offline".to_string())),
        Err(TransportError::Network("offline".to_string())),
        Err(TransportError::Network("offline".to_string())),
    ]);
    let store = store_with(transport.clone());

    let result = store.toggle("a1", InteractionType::Like).await;
    assert!(matches!(result, Err(StoreError::Transport(_))));
    assert_eq!(transport.toggle_calls(), 4);
    assert!(!store.flags("a1").await.liked);
}

#[test_log::test(tokio::test)]
async fn business_rejection_adopts_the_server_flag() {
    // A raced duplicate: success=false but the flag is authoritative true.
    let transport = MockTransport::new(vec![Ok(ToggleResponse {
        success: false,
        liked: Some(true),
        message: "already recorded".to_string(),
        ..Default::default()
    })]);
    let store = store_with(transport.clone());

    let result = store.toggle("a1", InteractionType::Like).await;
    assert!(matches!(result, Err(StoreError::Rejected(_))));
    assert!(store.flags("a1").await.liked);
}

#[test_log::test(tokio::test)]
async fn initialize_merges_server_flags_and_stamps_the_sync_time() {
    let mut server_flags = HashMap::new();
    server_flags.insert(
        "a1".to_string(),
        ArticleFlags {
            liked: true,
            saved: false,
            shared: false,
        },
    );
    server_flags.insert("a2".to_string(), ArticleFlags::default());
    let transport = MockTransport::new(vec![]).with_flags(server_flags);
    let store = store_with(transport.clone());

    assert!(store.needs_resync(ResyncTrigger::Load).await);
    store
        .initialize(&["a1".to_string(), "a2".to_string()])
        .await
        .unwrap();

    assert!(store.flags("a1").await.liked);
    assert!(!store.flags("a2").await.liked);
    assert!(!store.needs_resync(ResyncTrigger::Load).await);
    assert!(!store.needs_resync(ResyncTrigger::VisibilityRegained).await);
}

#[test_log::test(tokio::test)]
async fn stale_snapshots_trigger_the_right_resyncs() {
    // A snapshot synced 3 minutes ago is fresh for a load (5 minute budget)
    // but stale for a visibility regain (2 minute budget).
    let persistence = Box::new(MemoryPersistence::default());
    persistence
        .save(&StoreSnapshot {
            flags: HashMap::new(),
            last_sync: Some(chrono::Utc::now() - chrono::Duration::minutes(3)),
        })
        .unwrap();

    let transport = MockTransport::new(vec![]);
    let store = store_with(transport).with_persistence(persistence);
    store.load().await;

    assert!(!store.needs_resync(ResyncTrigger::Load).await);
    assert!(store.needs_resync(ResyncTrigger::VisibilityRegained).await);
    assert!(store.needs_resync(ResyncTrigger::NetworkRegained).await);
}

#[test_log::test(tokio::test)]
async fn snapshots_survive_a_store_restart() {
    let persistence = Arc::new(MemoryPersistence::default());

    struct SharedPersistence(Arc<MemoryPersistence>);
    impl StorePersistence for SharedPersistence {
        fn load(&self) -> anyhow::Result<Option<StoreSnapshot>> {
            self.0.load()
        }
        fn save(&self, snapshot: &StoreSnapshot) -> anyhow::Result<()> {
            self.0.save(snapshot)
        }
    }

    let transport = MockTransport::new(vec![Ok(liked_response(true))]);
    let store =
        store_with(transport).with_persistence(Box::new(SharedPersistence(persistence.clone())));
    store.toggle("a1", InteractionType::Like).await.unwrap();

    // A fresh store over the same persistence sees the flag.
    let transport = MockTransport::new(vec![]);
    let restarted =
        store_with(transport).with_persistence(Box::new(SharedPersistence(persistence)));
    restarted.load().await;
    assert!(restarted.flags("a1").await.liked);
}
