//! Deployment orchestration: batch pushes, per-item failure isolation,
//! targeted retry, conflict gating, and auto-resolution.

use cms_sync_core::config::EngineConfig;
use cms_sync_core::domain::{
    ChangeSource, ContentTypeDefinition, DeploymentStatus, FieldDescriptor, FieldKind,
    SyncStatus,
};
use cms_sync_core::infrastructure::events::Event;
use cms_sync_core::infrastructure::remote::mock::MockRemoteClient;
use cms_sync_core::infrastructure::remote::RemoteError;
use cms_sync_core::sync::SyncOptions;
use cms_sync_core::SyncEngine;
use std::sync::Arc;

fn field(key: &str, kind: FieldKind) -> FieldDescriptor {
    FieldDescriptor {
        key: key.to_string(),
        name: key.to_string(),
        kind,
        required: false,
        unique: false,
        indexed: false,
        settings: serde_json::json!({}),
    }
}

fn def(key: &str, fields: Vec<FieldDescriptor>) -> ContentTypeDefinition {
    ContentTypeDefinition {
        key: key.to_string(),
        name: key.to_string(),
        category: None,
        fields,
        ui_metadata: None,
    }
}

fn test_config() -> EngineConfig {
    EngineConfig {
        max_retry_attempts: 3,
        retry_base_delay_ms: 1,
        ..Default::default()
    }
}

async fn engine_with(remote: Arc<MockRemoteClient>) -> SyncEngine {
    let _ = tracing_subscriber::fmt().with_test_writer().try_init();
    SyncEngine::new_in_memory(test_config(), remote)
        .await
        .unwrap()
}

#[tokio::test]
async fn batch_deploy_isolates_a_failing_item() {
    let remote = Arc::new(MockRemoteClient::new());
    // One attempt plus three retries, all scripted to fail.
    for _ in 0..4 {
        remote.fail_next("type_03", RemoteError::Server(500)).await;
    }
    let engine = engine_with(remote.clone()).await;
    let mut events = engine.events().subscribe();

    let local: Vec<ContentTypeDefinition> = (0..10)
        .map(|i| def(&format!("type_{:02}", i), vec![field("title", FieldKind::Text)]))
        .collect();

    let report = engine
        .orchestrator()
        .deploy(&local, SyncOptions::default())
        .await
        .unwrap();

    assert_eq!(report.status, DeploymentStatus::Partial);
    assert_eq!(report.pushed.len(), 9);
    assert_eq!(report.failed, vec!["type_03"]);
    assert!(report.conflicts.is_empty());

    assert!(remote.current_definition("type_00").await.is_some());
    assert!(remote.current_definition("type_03").await.is_none());

    let failed = engine.state_store().failed_types().await.unwrap();
    assert_eq!(failed, vec!["type_03"]);
    let synced = engine.state_store().get("type_00").await.unwrap().unwrap();
    assert_eq!(synced.sync_status, SyncStatus::InSync);
    assert!(synced.sync_progress.is_none());

    // Successful pushes get recorded as sync-sourced versions.
    let head = engine.version_store().head("type_00").await.unwrap().unwrap();
    assert_eq!(head.change_source, ChangeSource::Sync);

    let mut finished = None;
    while let Ok(event) = events.try_recv() {
        if let Event::DeploymentFinished { status, .. } = event {
            finished = Some(status);
        }
    }
    assert_eq!(finished, Some(DeploymentStatus::Partial));
}

#[tokio::test]
async fn retry_failed_syncs_re_pushes_only_the_failed_item() {
    let remote = Arc::new(MockRemoteClient::new());
    for _ in 0..4 {
        remote.fail_next("type_03", RemoteError::Server(500)).await;
    }
    let engine = engine_with(remote.clone()).await;

    let local: Vec<ContentTypeDefinition> = (0..10)
        .map(|i| def(&format!("type_{:02}", i), vec![field("title", FieldKind::Text)]))
        .collect();
    let report = engine
        .orchestrator()
        .deploy(&local, SyncOptions::default())
        .await
        .unwrap();
    assert_eq!(report.failed, vec!["type_03"]);

    let calls_before = remote.call_count();
    let retry = engine
        .orchestrator()
        .retry_failed_syncs(SyncOptions::default())
        .await
        .unwrap();

    assert_eq!(retry.status, DeploymentStatus::Completed);
    assert_eq!(retry.pushed, vec!["type_03"]);
    assert!(retry.failed.is_empty());
    assert!(remote.current_definition("type_03").await.is_some());

    // One existence check and one push; the nine healthy types are untouched.
    assert!(remote.call_count() - calls_before <= 2);

    let state = engine.state_store().get("type_03").await.unwrap().unwrap();
    assert_eq!(state.sync_status, SyncStatus::InSync);
}

#[tokio::test]
async fn rate_limit_is_retried_within_the_same_deployment() {
    let remote = Arc::new(MockRemoteClient::new());
    remote
        .fail_next("article", RemoteError::RateLimited { retry_after: None })
        .await;
    let engine = engine_with(remote.clone()).await;

    let local = vec![def("article", vec![field("title", FieldKind::Text)])];
    let report = engine
        .orchestrator()
        .deploy(&local, SyncOptions::default())
        .await
        .unwrap();

    assert_eq!(report.status, DeploymentStatus::Completed);
    assert_eq!(report.pushed, vec!["article"]);
}

#[tokio::test]
async fn divergence_without_auto_resolution_halts_the_deployment() {
    let remote = Arc::new(MockRemoteClient::new());
    remote
        .seed(def("article", vec![field("title", FieldKind::Number)]))
        .await;
    let engine = engine_with(remote.clone()).await;

    let local = vec![def("article", vec![field("title", FieldKind::Text)])];
    let report = engine
        .orchestrator()
        .deploy(&local, SyncOptions::default())
        .await
        .unwrap();

    assert_eq!(report.status, DeploymentStatus::Conflicted);
    assert!(report.pushed.is_empty());
    assert_eq!(report.conflicts, vec!["article"]);

    // The remote side is untouched.
    let current = remote.current_definition("article").await.unwrap();
    assert_eq!(current.fields[0].kind, FieldKind::Number);

    let open = engine.conflict_manager().open_conflicts().await.unwrap();
    assert_eq!(open.len(), 1);
    let state = engine.state_store().get("article").await.unwrap().unwrap();
    assert_eq!(state.sync_status, SyncStatus::Conflict);
}

#[tokio::test]
async fn auto_resolution_merges_and_pushes_disjoint_additions() {
    let remote = Arc::new(MockRemoteClient::new());
    let engine = engine_with(remote.clone()).await;

    // Shared base, recorded and synced.
    let base = def("article", vec![field("title", FieldKind::Text)]);
    let base_hash = cms_sync_core::hashing::content_hash(&base).unwrap();
    engine
        .version_store()
        .record_change(&base, ChangeSource::Ui, None, None)
        .await
        .unwrap();
    engine
        .state_store()
        .mark_as_synced("article", &base_hash, &base_hash)
        .await
        .unwrap();

    // Local adds summary; a remote editor added tags.
    remote
        .seed(def(
            "article",
            vec![field("title", FieldKind::Text), field("tags", FieldKind::Json)],
        ))
        .await;
    let local = vec![def(
        "article",
        vec![field("title", FieldKind::Text), field("summary", FieldKind::Text)],
    )];

    let report = engine
        .orchestrator()
        .deploy(
            &local,
            SyncOptions {
                auto_resolve: Some(true),
                author: Some("alex".to_string()),
                ..Default::default()
            },
        )
        .await
        .unwrap();

    assert_eq!(report.status, DeploymentStatus::Completed);
    assert_eq!(report.pushed, vec!["article"]);
    assert!(report.conflicts.is_empty());

    let merged = remote.current_definition("article").await.unwrap();
    let keys: Vec<&str> = merged.fields.iter().map(|f| f.key.as_str()).collect();
    assert_eq!(keys, vec!["summary", "tags", "title"]);

    let head = engine.version_store().head("article").await.unwrap().unwrap();
    assert!(head.is_merge());

    let state = engine.state_store().get("article").await.unwrap().unwrap();
    assert_eq!(state.sync_status, SyncStatus::InSync);
    assert!(engine.conflict_manager().open_conflicts().await.unwrap().is_empty());
}

#[tokio::test]
async fn auto_resolved_merge_lineage_reaches_the_base() {
    let remote = Arc::new(MockRemoteClient::new());
    let engine = engine_with(remote.clone()).await;

    let base = def("article", vec![field("title", FieldKind::Text)]);
    let base_hash = cms_sync_core::hashing::content_hash(&base).unwrap();
    engine
        .version_store()
        .record_change(&base, ChangeSource::Ui, None, None)
        .await
        .unwrap();
    engine
        .state_store()
        .mark_as_synced("article", &base_hash, &base_hash)
        .await
        .unwrap();

    remote
        .seed(def(
            "article",
            vec![field("title", FieldKind::Text), field("tags", FieldKind::Json)],
        ))
        .await;
    let local = vec![def(
        "article",
        vec![field("title", FieldKind::Text), field("summary", FieldKind::Text)],
    )];

    let report = engine
        .orchestrator()
        .deploy(
            &local,
            SyncOptions {
                auto_resolve: Some(true),
                ..Default::default()
            },
        )
        .await
        .unwrap();
    assert_eq!(report.status, DeploymentStatus::Completed);

    // Both divergent sides exist as records, so the merge's parent links
    // resolve and the first-parent walk reaches the base.
    let head = engine.version_store().head("article").await.unwrap().unwrap();
    assert!(head.is_merge());
    for parent in &head.parent_hashes {
        assert!(
            engine
                .version_store()
                .get_version(parent)
                .await
                .unwrap()
                .is_some(),
            "merge parent {parent} is not a recorded version"
        );
    }

    let lineage = engine
        .version_store()
        .lineage(&head.version_hash)
        .await
        .unwrap();
    assert_eq!(lineage.len(), 3);
    assert_eq!(lineage.last().unwrap().version_hash, base_hash);
    assert!(lineage.last().unwrap().is_root());
}

#[tokio::test]
async fn retry_isolates_a_failed_existence_check() {
    let remote = Arc::new(MockRemoteClient::new());
    for _ in 0..4 {
        remote.fail_next("type_a", RemoteError::Server(500)).await;
    }
    for _ in 0..4 {
        remote.fail_next("type_b", RemoteError::Server(500)).await;
    }
    let engine = engine_with(remote.clone()).await;

    let local = vec![
        def("type_a", vec![field("title", FieldKind::Text)]),
        def("type_b", vec![field("title", FieldKind::Text)]),
    ];
    let report = engine
        .orchestrator()
        .deploy(&local, SyncOptions::default())
        .await
        .unwrap();
    assert_eq!(report.status, DeploymentStatus::Failed);
    assert_eq!(report.failed, vec!["type_a", "type_b"]);

    // The existence check for type_b dies on the network.
    remote
        .fail_next("type_b", RemoteError::Network("connection reset".to_string()))
        .await;

    let retry = engine
        .orchestrator()
        .retry_failed_syncs(SyncOptions::default())
        .await
        .unwrap();
    assert_eq!(retry.status, DeploymentStatus::Partial);
    assert_eq!(retry.pushed, vec!["type_a"]);
    assert_eq!(retry.failed, vec!["type_b"]);
    assert!(remote.current_definition("type_a").await.is_some());

    // type_b stays `failed` and visible to the next retry.
    assert_eq!(
        engine.state_store().failed_types().await.unwrap(),
        vec!["type_b"]
    );
    let state = engine.state_store().get("type_b").await.unwrap().unwrap();
    assert_eq!(state.sync_status, SyncStatus::Failed);
}
