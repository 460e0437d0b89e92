use lecture_player_lib::catalog::Lecture;
use lecture_player_lib::notify::Notifier;
use lecture_player_lib::progress::{
    LocalTier, MemoryRemote, ProgressKey, ProgressStore, RestoreSource,
};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

async fn wait_for_file(path: &Path, needle: &str) -> String {
    for _ in 0..200 {
        if let Ok(raw) = tokio::fs::read_to_string(path).await {
            if raw.contains(needle) {
                return raw;
            }
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("{} never contained {}", path.display(), needle);
}

#[tokio::test]
async fn background_writer_persists_ticks() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("progress.json");
    let tier = LocalTier::open(&path).await.unwrap();

    tier.write(&ProgressKey::new("u1", "c1", "L1"), 12.5);
    tier.write(&ProgressKey::new("u1", "c1", "L1"), 13.0);

    let raw = wait_for_file(&path, "13.0").await;
    assert!(raw.contains("\"lectureId\": \"L1\""));
    assert!(raw.contains("\"currentTime\""));
}

#[tokio::test]
async fn restore_falls_back_to_the_file_after_restart() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("nested").join("progress.json");

    {
        let tier = LocalTier::open(&path).await.unwrap();
        tier.write(&ProgressKey::new("u1", "c1", "L2"), 95.0);
        tier.sync().await.unwrap();
    }

    let reopened = LocalTier::open(&path).await.unwrap();
    assert_eq!(reopened.len(), 1);

    let remote = MemoryRemote::new();
    let store = ProgressStore::new(reopened, Arc::new(remote), 3, Notifier::disabled());
    let restored = store.restore("u1", "c1").await;

    assert_eq!(restored.source, RestoreSource::Local);
    let resume = restored.resume.unwrap();
    assert_eq!(resume.lecture_id, "L2");
    assert_eq!(resume.elapsed_secs, 95.0);
}

#[tokio::test]
async fn other_viewers_do_not_leak_into_restore() {
    let dir = tempfile::tempdir().unwrap();
    let tier = LocalTier::open(dir.path().join("progress.json"))
        .await
        .unwrap();
    tier.write(&ProgressKey::new("someone-else", "c1", "L3"), 200.0);

    let store = ProgressStore::new(
        tier,
        Arc::new(MemoryRemote::new()),
        3,
        Notifier::disabled(),
    );
    let restored = store.restore("u1", "c1").await;

    assert_eq!(restored.source, RestoreSource::None);
    assert!(restored.resume.is_none());
    assert!(restored.records.is_empty());
}

#[tokio::test]
async fn flushed_record_is_pruned_from_disk() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("progress.json");
    let tier = LocalTier::open(&path).await.unwrap();
    let remote = MemoryRemote::new();
    let store = ProgressStore::new(
        tier.clone(),
        Arc::new(remote.clone()),
        3,
        Notifier::disabled(),
    );

    let key = ProgressKey::new("u1", "c1", "L1");
    tier.write(&key, 60.0);
    store
        .flush_now("u1", "c1", &Lecture::new("L1", "Intro", 300), 60.0)
        .await
        .unwrap();
    tier.sync().await.unwrap();

    assert!(tier.get(&key).is_none());
    let raw = tokio::fs::read_to_string(&path).await.unwrap();
    assert!(!raw.contains("\"lectureId\": \"L1\""));
    assert_eq!(remote.pushes().len(), 1);
}
