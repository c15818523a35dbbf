//! Persistence tests for the snapshot-backed lead store

#![allow(clippy::unwrap_used, clippy::expect_used)]

use chrono::{Duration, TimeZone, Utc};
use outreach_common::{EmailType, FollowUpStage, FollowUpStatus, LeadStatus};
use outreach_store::{
    FileLeadStore, FollowUp, FollowUpQuery, FollowUpStore, Lead, LeadPatch, LeadQuery, LeadStore,
    StoreBackend, StoreConfig, StoreError,
};

#[tokio::test]
async fn test_state_survives_reopen() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("leads.bin");
    let sent_at = Utc.with_ymd_and_hms(2025, 3, 4, 5, 30, 0).unwrap();

    let lead = Lead::new(Some("priya@example.in".to_string()))
        .with_name("Priya", "Sharma")
        .with_country("India")
        .scheduled(EmailType::Initial, sent_at);

    {
        let store = FileLeadStore::open(&path, None).expect("open");
        store.insert(&lead).await.expect("insert");
        store
            .update(
                &lead.id,
                &LeadPatch::new()
                    .status(LeadStatus::Sent)
                    .sent(Some(sent_at), Some("msg-1".to_string()), None),
            )
            .await
            .expect("update");
        store
            .insert_followup(&FollowUp::pending(
                lead.id,
                FollowUpStage::FiveDay,
                sent_at,
                Some("msg-1".to_string()),
                sent_at + Duration::days(5),
            ))
            .await
            .expect("insert follow-up");
    }

    let reopened = FileLeadStore::open(&path, None).expect("reopen");
    let restored = reopened.get(&lead.id).await.expect("lead restored");

    assert_eq!(restored.status, LeadStatus::Sent);
    assert_eq!(restored.sent_at, Some(sent_at));
    assert_eq!(restored.gmail_message_id.as_deref(), Some("msg-1"));
    assert_eq!(restored.country.as_deref(), Some("India"));

    let followups = reopened
        .query_followups(&FollowUpQuery::pending().for_lead(lead.id))
        .await
        .unwrap();
    assert_eq!(followups.len(), 1);
    assert_eq!(followups[0].status, FollowUpStatus::Pending);
    assert_eq!(followups[0].due_at, sent_at + Duration::days(5));
}

#[tokio::test]
async fn test_missing_file_starts_empty() {
    let dir = tempfile::tempdir().expect("tempdir");
    let store = FileLeadStore::open(dir.path().join("absent.bin"), None).expect("open");

    assert!(store.query(&LeadQuery::default()).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_corrupt_snapshot_is_rejected() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("leads.bin");
    std::fs::write(&path, b"definitely not bincode").unwrap();

    let err = FileLeadStore::open(&path, None).unwrap_err();
    assert!(matches!(err, StoreError::Serialization(_)));
}

#[tokio::test]
async fn test_config_builds_file_store() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("leads.bin");

    let store = StoreConfig {
        backend: StoreBackend::File { path: path.clone() },
        max_leads: Some(1),
    }
    .into_store()
    .expect("store");

    store
        .insert(&Lead::new(Some("a@example.com".to_string())))
        .await
        .unwrap();
    let err = store
        .insert(&Lead::new(Some("b@example.com".to_string())))
        .await
        .unwrap_err();

    assert!(matches!(err, StoreError::CapacityExceeded { .. }));
    assert!(path.exists());
}

#[tokio::test]
async fn test_failed_snapshot_write_leaves_tables_unchanged() {
    let dir = tempfile::tempdir().expect("tempdir");
    let snapshots = dir.path().join("snapshots");
    std::fs::create_dir(&snapshots).unwrap();
    let sent_at = Utc.with_ymd_and_hms(2025, 3, 4, 5, 30, 0).unwrap();

    let store = FileLeadStore::open(snapshots.join("leads.bin"), None).expect("open");
    let lead = Lead::new(Some("priya@example.in".to_string()))
        .scheduled(EmailType::Initial, sent_at);
    store.insert(&lead).await.expect("insert");
    let followup = FollowUp::pending(
        lead.id,
        FollowUpStage::FiveDay,
        sent_at,
        None,
        sent_at + Duration::days(5),
    );
    store.insert_followup(&followup).await.expect("insert follow-up");

    std::fs::remove_dir_all(&snapshots).unwrap();

    let update = store
        .update(&lead.id, &LeadPatch::new().status(LeadStatus::Sent))
        .await;
    assert!(matches!(update, Err(StoreError::Io(_))));
    assert_eq!(
        store.get(&lead.id).await.unwrap().status,
        LeadStatus::Scheduled
    );

    let transition = store
        .transition_followup(&followup.id, FollowUpStatus::Cancelled, None)
        .await;
    assert!(transition.is_err());
    assert_eq!(
        store.get_followup(&followup.id).await.unwrap().status,
        FollowUpStatus::Pending
    );

    let other = Lead::new(Some("other@example.com".to_string()));
    assert!(store.insert(&other).await.is_err());
    assert!(matches!(
        store.get(&other.id).await,
        Err(StoreError::NotFound(_))
    ));

    // Once the directory is back, the next write persists only committed rows.
    std::fs::create_dir(&snapshots).unwrap();
    store
        .update(&lead.id, &LeadPatch::new().retry(1, None))
        .await
        .expect("update after recovery");

    let reopened = FileLeadStore::open(snapshots.join("leads.bin"), None).expect("reopen");
    let restored = reopened.get(&lead.id).await.unwrap();
    assert_eq!(restored.status, LeadStatus::Scheduled);
    assert_eq!(restored.retry_count, 1);
    assert!(reopened.get(&other.id).await.is_err());
}
