//! Durable sync state: delta classification, resumability, and the
//! progress invariant.

use cms_sync_core::domain::{
    ContentTypeDefinition, FieldDescriptor, FieldKind, SyncAction, SyncProgress, SyncStatus,
};
use cms_sync_core::hashing;
use cms_sync_core::infrastructure::database::entities::{sync_state, SyncState as SyncStateEntity};
use cms_sync_core::infrastructure::database::Database;
use cms_sync_core::sync::{ChangeDetector, SyncError, SyncStateStore};
use sea_orm::{ActiveModelTrait, ColumnTrait, EntityTrait, QueryFilter, Set};

fn def(key: &str) -> ContentTypeDefinition {
    ContentTypeDefinition {
        key: key.to_string(),
        name: key.to_string(),
        category: None,
        fields: vec![FieldDescriptor {
            key: "title".to_string(),
            name: "Title".to_string(),
            kind: FieldKind::Text,
            required: false,
            unique: false,
            indexed: false,
            settings: serde_json::json!({}),
        }],
        ui_metadata: None,
    }
}

async fn setup() -> (Database, SyncStateStore) {
    let _ = tracing_subscriber::fmt().with_test_writer().try_init();
    let db = Database::create_in_memory().await.unwrap();
    db.migrate().await.unwrap();
    let store = SyncStateStore::new(db.conn().clone());
    (db, store)
}

#[tokio::test]
async fn initial_sync_when_type_is_unknown() {
    let (_db, store) = setup().await;
    let delta = store.calculate_delta("article", "h1", "h2").await.unwrap();
    assert_eq!(delta.action, SyncAction::InitialSync);
}

#[tokio::test]
async fn delta_classification_from_merge_base() {
    let (_db, store) = setup().await;
    store.mark_as_synced("article", "h0", "h0").await.unwrap();

    let push = store.calculate_delta("article", "h1", "h0").await.unwrap();
    assert_eq!(push.action, SyncAction::Push);

    let pull = store.calculate_delta("article", "h0", "h1").await.unwrap();
    assert_eq!(pull.action, SyncAction::Pull);

    let conflict = store.calculate_delta("article", "h1", "h2").await.unwrap();
    assert_eq!(conflict.action, SyncAction::Conflict);

    let none = store.calculate_delta("article", "h0", "h0").await.unwrap();
    assert_eq!(none.action, SyncAction::NoChange);
}

#[tokio::test]
async fn identical_hashes_are_never_a_conflict() {
    let (_db, store) = setup().await;
    store.mark_as_synced("article", "h0", "h0").await.unwrap();

    // Both sides moved but converged on identical content.
    let delta = store.calculate_delta("article", "h9", "h9").await.unwrap();
    assert_eq!(delta.action, SyncAction::NoChange);
}

#[tokio::test]
async fn mark_as_synced_is_idempotent_and_advances_merge_base() {
    let (_db, store) = setup().await;
    let first = store.mark_as_synced("article", "h1", "h1").await.unwrap();
    let second = store.mark_as_synced("article", "h1", "h1").await.unwrap();

    assert_eq!(first.last_synced_hash.as_deref(), Some("h1"));
    assert_eq!(second.last_synced_hash.as_deref(), Some("h1"));
    assert_eq!(second.sync_status, SyncStatus::InSync);
    assert!(second.sync_progress.is_none());
}

#[tokio::test]
async fn progress_roundtrip_while_syncing() {
    let (_db, store) = setup().await;
    let progress = SyncProgress {
        current_step: 2,
        total_steps: 5,
        last_processed_id: Some("item-17".to_string()),
        processed_count: Some(2),
        error: None,
    };
    let state = store
        .set_sync_progress("article", progress.clone())
        .await
        .unwrap();
    assert_eq!(state.sync_status, SyncStatus::Syncing);

    let resumed = store.resume_sync("article").await.unwrap();
    assert_eq!(resumed, Some(progress));
}

#[tokio::test]
async fn malformed_progress_is_rejected_before_state_changes() {
    let (_db, store) = setup().await;
    let bad = SyncProgress {
        current_step: 7,
        total_steps: 3,
        last_processed_id: None,
        processed_count: None,
        error: None,
    };
    let result = store.set_sync_progress("article", bad).await;
    assert!(matches!(result, Err(SyncError::InvalidProgress(_))));
    assert!(store.get("article").await.unwrap().is_none());
}

#[tokio::test]
async fn corrupt_stored_progress_degrades_to_pending() {
    let (db, store) = setup().await;
    store.mark_as_synced("article", "h0", "h0").await.unwrap();

    // Corrupt the stored row behind the store's back.
    let row = SyncStateEntity::find()
        .filter(sync_state::Column::TypeKey.eq("article"))
        .one(db.conn())
        .await
        .unwrap()
        .unwrap();
    let mut active: sync_state::ActiveModel = row.into();
    active.sync_status = Set("syncing".to_string());
    active.sync_progress = Set(Some(serde_json::json!({
        "current_step": 9,
        "total_steps": 2
    })));
    active.update(db.conn()).await.unwrap();

    let resumed = store.resume_sync("article").await.unwrap();
    assert!(resumed.is_none());

    let state = store.get("article").await.unwrap().unwrap();
    assert_eq!(state.sync_status, SyncStatus::Pending);
    assert!(state.sync_progress.is_none());
}

#[tokio::test]
async fn unchanged_detection_refreshes_stored_hashes() {
    let (_db, store) = setup().await;
    // A crash between push and merge-base advance leaves stale hashes.
    store
        .record_observation("article", Some("stale_local"), Some("stale_remote"))
        .await
        .unwrap();

    let detector = ChangeDetector::with_state_store(store.clone());
    let local = vec![def("article"), def("page")];
    let remote = local.clone();
    detector.detect_changes(&local, &remote).await.unwrap();

    let hash = hashing::content_hash(&def("article")).unwrap();
    let state = store.get("article").await.unwrap().unwrap();
    assert_eq!(state.local_hash.as_deref(), Some(hash.as_str()));
    assert_eq!(state.remote_hash.as_deref(), Some(hash.as_str()));
    assert_eq!(state.sync_status, SyncStatus::InSync);

    // A first-seen unchanged key gets a row with its observed hashes.
    let page_hash = hashing::content_hash(&def("page")).unwrap();
    let page = store.get("page").await.unwrap().unwrap();
    assert_eq!(page.local_hash.as_deref(), Some(page_hash.as_str()));
    assert_eq!(page.remote_hash.as_deref(), Some(page_hash.as_str()));
}

#[tokio::test]
async fn interrupted_syncs_are_detectable_after_restart() {
    let (_db, store) = setup().await;
    let progress = SyncProgress {
        current_step: 1,
        total_steps: 3,
        last_processed_id: None,
        processed_count: None,
        error: None,
    };
    store.set_sync_progress("article", progress.clone()).await.unwrap();
    store.set_sync_progress("page", progress).await.unwrap();
    store.mark_as_synced("widget", "h0", "h0").await.unwrap();

    let mut interrupted = store.detect_interrupted_sync().await.unwrap();
    interrupted.sort();
    assert_eq!(interrupted, vec!["article", "page"]);
}

#[tokio::test]
async fn interrupted_sync_survives_reopening_the_database() {
    let _ = tracing_subscriber::fmt().with_test_writer().try_init();
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("sync.db");
    let progress = SyncProgress {
        current_step: 2,
        total_steps: 4,
        last_processed_id: Some("item-9".to_string()),
        processed_count: Some(2),
        error: None,
    };

    {
        let db = Database::create(&path).await.unwrap();
        db.migrate().await.unwrap();
        let store = SyncStateStore::new(db.conn().clone());
        store
            .set_sync_progress("article", progress.clone())
            .await
            .unwrap();
    }

    // Simulated process restart.
    let db = Database::open(&path).await.unwrap();
    db.migrate().await.unwrap();
    let store = SyncStateStore::new(db.conn().clone());

    assert_eq!(
        store.detect_interrupted_sync().await.unwrap(),
        vec!["article"]
    );
    assert_eq!(store.resume_sync("article").await.unwrap(), Some(progress));
}

#[tokio::test]
async fn rollback_clears_progress_and_marks_failed() {
    let (_db, store) = setup().await;
    let progress = SyncProgress {
        current_step: 1,
        total_steps: 2,
        last_processed_id: None,
        processed_count: None,
        error: None,
    };
    store.set_sync_progress("article", progress).await.unwrap();

    let state = store.rollback_partial_sync("article").await.unwrap();
    assert_eq!(state.sync_status, SyncStatus::Failed);
    assert!(state.sync_progress.is_none());

    assert_eq!(store.failed_types().await.unwrap(), vec!["article"]);

    let state = store.mark_pending("article").await.unwrap();
    assert_eq!(state.sync_status, SyncStatus::Pending);
}
