use std::sync::Arc;
use std::time::Duration;

use floorwatch_directory::{DirectoryError, EmbeddingPayload, MemoryDirectory, RawRecord, RetryPolicy};
use floorwatch_identity::IdentityError;
use serde_json::json;

use crate::{Monitor, MonitorConfig, MonitorError};

fn rec(id: i64, name: &str, values: &[f64]) -> RawRecord {
    RawRecord::new(id, name, EmbeddingPayload::Values(values.to_vec()))
}

fn roster() -> Vec<RawRecord> {
    vec![
        rec(1, "Ana", &[1.0, 0.0, 0.0]).with_meta("department", "Ops"),
        rec(2, "Ben", &[0.0, 1.0, 0.0]),
        rec(3, "Cy", &[0.0, 0.0, 1.0]),
    ]
}

fn config() -> MonitorConfig {
    MonitorConfig::default()
        .with_dim(3)
        .with_refresh_interval(Duration::from_secs(3600))
        .with_retry(
            RetryPolicy::default()
                .with_attempts(2)
                .with_delay(Duration::from_millis(1))
                .with_attempt_timeout(Duration::from_millis(500)),
        )
}

async fn started(dir: Arc<MemoryDirectory>, cfg: MonitorConfig) -> (Monitor, crate::MonitorTasks) {
    let (monitor, tasks) = Monitor::start(cfg, dir);
    monitor.refresh().await.unwrap();
    (monitor, tasks)
}

async fn wait_for(mut cond: impl FnMut() -> bool) {
    tokio::time::timeout(Duration::from_secs(5), async {
        while !cond() {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .unwrap();
}

#[tokio::test]
async fn initial_load_happens_without_being_asked() {
    let dir = Arc::new(MemoryDirectory::new(roster()));
    let (monitor, tasks) = Monitor::start(config(), dir.clone());

    wait_for(|| monitor.cache().get().len() == 3).await;
    assert!(dir.calls() >= 1);

    tasks.shutdown().await;
}

#[tokio::test]
async fn duplicate_check_reports_matched_identity() {
    let dir = Arc::new(MemoryDirectory::new(roster()));
    let (monitor, tasks) = started(dir, config()).await;

    let exact = monitor.check_duplicate(&[2.0, 0.0, 0.0]).unwrap();
    assert_eq!(exact.compared, 3);
    let who = exact.duplicate.unwrap();
    assert_eq!(who.id, 1);
    assert_eq!(who.display_name, "Ana");
    assert_eq!(who.metadata.get("department"), Some(&serde_json::json!("Ops")));
    assert!((who.score - 1.0).abs() < 1e-6);

    // Equidistant from Ana and Ben (cos = 0.707): the first row wins.
    let tie = monitor.check_duplicate(&[1.0, 1.0, 0.0]).unwrap();
    assert_eq!(tie.duplicate.map(|m| m.id), Some(1));

    tasks.shutdown().await;
}

#[tokio::test]
async fn loose_match_identifies_but_is_not_a_duplicate() {
    let dir = Arc::new(MemoryDirectory::new(vec![rec(1, "Ana", &[1.0, 0.0, 0.0])]));
    let (monitor, tasks) = started(dir, config()).await;

    let probe = [0.38, (1.0f32 - 0.38 * 0.38).sqrt(), 0.0];
    assert!(!monitor.check_duplicate(&probe).unwrap().is_duplicate());

    let id = monitor.identify(&probe).unwrap();
    let who = id.identity.unwrap();
    assert_eq!(who.id, 1);
    assert!((who.score - 0.38).abs() < 1e-4);

    tasks.shutdown().await;
}

#[tokio::test]
async fn observe_tracks_arrivals_and_gates_notifications() {
    let dir = Arc::new(MemoryDirectory::new(roster()));
    let (monitor, tasks) = started(dir, config()).await;

    let first = monitor.observe(&[1.0, 0.0, 0.0], 7, "cam-a", Some(0.97)).unwrap();
    assert!(first.arrival);
    assert!(first.notify);
    assert_eq!(first.confidence, Some(0.97));
    assert_eq!(first.identification.identity.as_ref().map(|m| m.id), Some(1));

    let again = monitor.observe(&[1.0, 0.0, 0.0], 7, "cam-b", None).unwrap();
    assert!(!again.arrival);
    assert!(!again.notify);

    // Another arrival at the same location inside the cooldown.
    let other = monitor.observe(&[0.0, 1.0, 0.0], 7, "cam-a", None).unwrap();
    assert!(other.arrival);
    assert!(!other.notify);

    // A different location has its own cooldown.
    let elsewhere = monitor.observe(&[0.0, 1.0, 0.0], 8, "cam-c", None).unwrap();
    assert!(elsewhere.arrival);
    assert!(elsewhere.notify);

    let present: Vec<i64> = monitor.present(7).iter().map(|e| e.identity_id).collect();
    assert_eq!(present, vec![1, 2]);
    assert_eq!(monitor.present(7)[0].source, "cam-b");
    assert_eq!(monitor.occupancy().len(), 2);

    tasks.shutdown().await;
}

#[tokio::test]
async fn unrecognized_sighting_changes_nothing() {
    let dir = Arc::new(MemoryDirectory::new(vec![rec(1, "Ana", &[1.0, 0.0, 0.0])]));
    let (monitor, tasks) = started(dir, config()).await;

    let seen = monitor.observe(&[0.0, 1.0, 0.0], 7, "cam-a", None).unwrap();
    assert!(seen.identification.identity.is_none());
    assert_eq!(seen.identification.best_score, 0.0);
    assert!(!seen.arrival);
    assert!(!seen.notify);
    assert!(monitor.tracker().is_empty());

    tasks.shutdown().await;
}

#[tokio::test]
async fn observe_from_source_uses_assignment() {
    let dir = Arc::new(MemoryDirectory::new(roster()));
    let (monitor, tasks) = started(dir, config()).await;

    let err = monitor.observe_from_source(&[1.0, 0.0, 0.0], "cam-x", None).unwrap_err();
    assert!(matches!(err, MonitorError::UnknownSource(ref s) if s == "cam-x"));

    monitor.locations().assign("cam-x", 4);
    let seen = monitor.observe_from_source(&[1.0, 0.0, 0.0], "cam-x", None).unwrap();
    assert_eq!(seen.location_id, 4);
    assert_eq!(monitor.tracker().count(4), 1);

    let r = monitor.reassign_sources([("cam-x".to_string(), 5), ("cam-y".to_string(), 6)]);
    assert_eq!(r.updated.len(), 1);
    assert_eq!(r.unknown, vec!["cam-y".to_string()]);
    let seen = monitor.observe_from_source(&[1.0, 0.0, 0.0], "cam-x", None).unwrap();
    assert_eq!(seen.location_id, 5);
    assert!(seen.arrival);

    tasks.shutdown().await;
}

#[tokio::test]
async fn failed_refresh_keeps_serving_previous_roster() {
    let dir = Arc::new(MemoryDirectory::new(roster()));
    let (monitor, tasks) = started(dir.clone(), config()).await;
    let before = monitor.cache().get();

    dir.set_records(Vec::new());
    dir.set_unavailable(true);
    let err = monitor.refresh().await.unwrap_err();
    assert!(matches!(err, MonitorError::Directory(DirectoryError::Exhausted { .. })));

    let after = monitor.cache().get();
    assert!(Arc::ptr_eq(&before, &after));
    assert_eq!(after.captured_at(), before.captured_at());
    assert_eq!(monitor.identify(&[0.0, 0.0, 1.0]).unwrap().identity.map(|m| m.id), Some(3));

    tasks.shutdown().await;
}

#[tokio::test]
async fn malformed_records_are_skipped() {
    let mut raw = roster();
    raw.push(rec(4, "Short", &[1.0, 0.0]));
    raw.push(RawRecord::new(5, "Garbled", EmbeddingPayload::Encoded("[1.0, x]".into())));
    raw.push(RawRecord {
        embedding: None,
        ..rec(6, "Unenrolled", &[])
    });
    let dir = Arc::new(MemoryDirectory::new(raw));
    let (monitor, tasks) = Monitor::start(config(), dir);

    let report = monitor.refresh().await.unwrap();
    assert_eq!(report.fetched, 6);
    assert_eq!(report.skipped, 3);
    assert_eq!(report.installed, 3);
    assert_eq!(monitor.status().roster_size, 3);

    tasks.shutdown().await;
}

#[tokio::test]
async fn null_in_one_embedding_skips_only_that_record() {
    let mut entries: Vec<_> = roster().iter().map(RawRecord::to_value).collect();
    entries.insert(1, json!({"id": 9, "name": "Holey", "face_embedding": [0.0, null, 0.0]}));
    let dir = Arc::new(MemoryDirectory::from_values(entries));
    let (monitor, tasks) = Monitor::start(config(), dir);

    let report = monitor.refresh().await.unwrap();
    assert_eq!((report.fetched, report.installed, report.skipped), (4, 3, 1));
    let ids: Vec<i64> = monitor.cache().get().records().iter().map(|r| r.id).collect();
    assert_eq!(ids, vec![1, 2, 3]);
    assert_eq!(monitor.identify(&[0.0, 1.0, 0.0]).unwrap().identity.unwrap().id, 2);

    tasks.shutdown().await;
}

#[tokio::test]
async fn empty_roster_is_installed() {
    let dir = Arc::new(MemoryDirectory::new(roster()));
    let (monitor, tasks) = started(dir.clone(), config()).await;

    dir.set_records(Vec::new());
    let report = monitor.refresh().await.unwrap();
    assert_eq!(report.installed, 0);

    let status = monitor.status();
    assert_eq!(status.roster_size, 0);
    assert!(status.captured_at.is_some());
    assert!(!status.stale);

    let id = monitor.identify(&[1.0, 0.0, 0.0]).unwrap();
    assert!(id.identity.is_none());
    assert_eq!(id.best_score, 0.0);

    tasks.shutdown().await;
}

#[tokio::test]
async fn stale_roster_triggers_background_refresh() {
    let dir = Arc::new(MemoryDirectory::new(vec![rec(1, "Ana", &[1.0, 0.0, 0.0])]));
    let cfg = config().with_stale_threshold(Duration::from_millis(50));
    let (monitor, tasks) = started(dir.clone(), cfg).await;
    assert_eq!(monitor.cache().get().len(), 1);

    dir.set_records(roster());
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert!(monitor.status().stale);

    // The call itself answers from the old roster and does not wait.
    let id = monitor.identify(&[0.0, 1.0, 0.0]).unwrap();
    assert!(id.identity.is_none());

    wait_for(|| monitor.cache().get().len() == 3).await;

    tasks.shutdown().await;
}

#[tokio::test]
async fn stale_check_does_not_block_on_slow_directory() {
    let dir = Arc::new(MemoryDirectory::new(roster()));
    let cfg = config().with_stale_threshold(Duration::from_millis(20));
    let (monitor, tasks) = started(dir.clone(), cfg).await;

    dir.set_latency(Duration::from_millis(300));
    tokio::time::sleep(Duration::from_millis(50)).await;

    let start = std::time::Instant::now();
    for _ in 0..50 {
        monitor.identify(&[1.0, 0.0, 0.0]).unwrap();
    }
    assert!(start.elapsed() < Duration::from_millis(200));

    tasks.shutdown().await;
}

#[tokio::test]
async fn shutdown_lets_inflight_refresh_finish() {
    let dir = Arc::new(MemoryDirectory::new(vec![rec(1, "Ana", &[1.0, 0.0, 0.0])]));
    let (monitor, tasks) = started(dir.clone(), config()).await;
    let monitor = Arc::new(monitor);

    dir.set_records(roster());
    dir.set_latency(Duration::from_millis(200));
    let pending = {
        let monitor = monitor.clone();
        tokio::spawn(async move { monitor.refresh().await })
    };
    tokio::time::sleep(Duration::from_millis(50)).await;

    tasks.shutdown().await;
    assert_eq!(pending.await.unwrap().unwrap().installed, 3);
    assert_eq!(monitor.cache().get().len(), 3);

    assert!(matches!(monitor.refresh().await, Err(MonitorError::RefresherStopped)));
}

#[tokio::test]
async fn bad_query_vectors_surface_errors() {
    let dir = Arc::new(MemoryDirectory::new(roster()));
    let (monitor, tasks) = started(dir, config()).await;

    assert!(matches!(
        monitor.identify(&[1.0, 0.0]),
        Err(MonitorError::Identity(IdentityError::DimensionMismatch { expected: 3, got: 2 }))
    ));
    assert!(matches!(
        monitor.observe(&[f32::NAN, 0.0, 0.0], 1, "cam", None),
        Err(MonitorError::Identity(IdentityError::NonFiniteProbe))
    ));

    tasks.shutdown().await;
}

#[tokio::test]
async fn status_and_clear_location() {
    let dir = Arc::new(MemoryDirectory::new(roster()));
    let (monitor, tasks) = started(dir, config()).await;
    monitor.locations().assign("cam-a", 1);

    monitor.observe(&[1.0, 0.0, 0.0], 1, "cam-a", None).unwrap();
    monitor.observe(&[0.0, 1.0, 0.0], 1, "cam-a", None).unwrap();
    monitor.observe(&[0.0, 0.0, 1.0], 2, "cam-b", None).unwrap();

    let status = monitor.status();
    assert_eq!(status.roster_size, 3);
    assert_eq!(status.dim, 3);
    assert_eq!(status.present, 3);
    assert_eq!(status.sources, 1);
    assert!(status.cache_age_secs.is_some_and(|a| a < 60.0));
    assert!(!status.stale);

    assert_eq!(monitor.clear_location(1), 2);
    assert!(monitor.present(1).is_empty());
    assert_eq!(monitor.status().present, 1);

    // Clearing re-arms the notification for that location.
    let back = monitor.observe(&[1.0, 0.0, 0.0], 1, "cam-a", None).unwrap();
    assert!(back.arrival);
    assert!(back.notify);

    tasks.shutdown().await;
}
