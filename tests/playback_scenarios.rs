use async_trait::async_trait;
use lecture_player_lib::api::{ApiError, LectureDto, RetryPolicy};
use lecture_player_lib::catalog::{CatalogLoader, Lecture, LectureCatalog, VideoSource};
use lecture_player_lib::notify::{drain, NoticeLevel, NoticeReceiver, Notifier};
use lecture_player_lib::progress::{LocalTier, MemoryRemote, ProgressKey, ProgressStore};
use lecture_player_lib::session::SessionState;
use lecture_player_lib::video::{MediaCommand, MediaEvent, MediaSample};
use lecture_player_lib::view::LectureView;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

struct FakeCatalog {
    lectures: Vec<Lecture>,
    failures_left: AtomicUsize,
}

impl FakeCatalog {
    fn new(lectures: Vec<Lecture>) -> Self {
        Self {
            lectures,
            failures_left: AtomicUsize::new(0),
        }
    }

    fn failing_once(lectures: Vec<Lecture>) -> Self {
        Self {
            lectures,
            failures_left: AtomicUsize::new(1),
        }
    }
}

#[async_trait]
impl LectureCatalog for FakeCatalog {
    async fn lectures(&self, _course_id: &str) -> Result<Vec<Lecture>, ApiError> {
        let left = self.failures_left.load(Ordering::SeqCst);
        if left > 0 {
            self.failures_left.store(left - 1, Ordering::SeqCst);
            return Err(ApiError::NetworkError("connection refused".to_string()));
        }
        Ok(self.lectures.clone())
    }

    fn name(&self) -> &str {
        "fake"
    }
}

fn lecture(id: &str, title: &str, duration: u32) -> Lecture {
    Lecture::new(id, title, duration).with_source(VideoSource::parse(&format!(
        "https://cdn.example.com/{}.mp4",
        id
    )))
}

fn two_lectures() -> Vec<Lecture> {
    vec![lecture("L1", "Intro", 300), lecture("L2", "Hooks", 400)]
}

struct Harness {
    view: LectureView,
    remote: MemoryRemote,
    local: LocalTier,
    notices: NoticeReceiver,
}

fn harness(catalog: FakeCatalog) -> Harness {
    harness_with(catalog, MemoryRemote::new(), LocalTier::in_memory())
}

fn harness_with(catalog: FakeCatalog, remote: MemoryRemote, local: LocalTier) -> Harness {
    let (notifier, notices) = Notifier::channel();
    let store = ProgressStore::new(local.clone(), Arc::new(remote.clone()), 3, notifier.clone());
    let loader = CatalogLoader::new(
        Arc::new(catalog),
        RetryPolicy::new(0).with_base_delay(Duration::from_millis(1)),
    );
    Harness {
        view: LectureView::new("u1", "c1", loader, store, notifier),
        remote,
        local,
        notices,
    }
}

fn ready(view: &LectureView) -> (usize, f64) {
    match view.session().state() {
        SessionState::Ready {
            index,
            elapsed_secs,
            ..
        } => (*index, *elapsed_secs),
        other => panic!("expected Ready, got {:?}", other),
    }
}

#[tokio::test]
async fn scenario_a_auto_advances_after_completion() {
    let mut h = harness(FakeCatalog::new(two_lectures()));

    let commands = h.view.open().await;
    assert!(matches!(commands.as_slice(), [MediaCommand::Load { .. }]));
    assert_eq!(ready(&h.view), (0, 0.0));

    let commands = h.view.media(MediaEvent::TimeUpdate {
        position_secs: 300.0,
    });

    assert!(h.view.session().completed().contains("L1"));
    assert_eq!(ready(&h.view), (1, 0.0));
    match commands.as_slice() {
        [MediaCommand::Load { source, .. }] => {
            assert_eq!(source.to_string(), "https://cdn.example.com/L2.mp4")
        }
        other => panic!("unexpected commands {:?}", other),
    }
}

#[tokio::test]
async fn scenario_b_skipping_an_unfinished_lecture_is_rejected() {
    let mut h = harness(FakeCatalog::new(two_lectures()));
    h.view.open().await;
    h.view.media(MediaEvent::TimeUpdate {
        position_secs: 100.0,
    });

    let commands = h.view.select(1);

    assert!(commands.is_empty());
    assert_eq!(ready(&h.view), (0, 100.0));
    let notices = drain(&mut h.notices);
    assert!(notices.iter().any(|n| n.level == NoticeLevel::Warning));
}

#[tokio::test]
async fn scenario_c_finishing_every_lecture_completes_the_course() {
    let mut h = harness(FakeCatalog::new(two_lectures()));
    h.view.open().await;

    h.view.media(MediaEvent::TimeUpdate {
        position_secs: 300.0,
    });
    let commands = h.view.media(MediaEvent::TimeUpdate {
        position_secs: 400.0,
    });

    assert_eq!(*h.view.session().state(), SessionState::Completed);
    assert_eq!(commands, vec![MediaCommand::Pause]);
    let notices = drain(&mut h.notices);
    assert!(notices.iter().any(|n| n.level == NoticeLevel::Success));
}

#[tokio::test]
async fn scenario_d_empty_catalog_is_not_an_error() {
    let mut h = harness(FakeCatalog::new(Vec::new()));

    let commands = h.view.open().await;

    assert!(commands.is_empty());
    assert_eq!(*h.view.session().state(), SessionState::Empty);
    let notices = drain(&mut h.notices);
    assert!(notices.iter().all(|n| n.level != NoticeLevel::Error));
}

#[tokio::test]
async fn scenario_e_remote_progress_wins_over_newer_local() {
    let remote = MemoryRemote::new();
    remote.seed("u1", "c1", "L2", 120.0);
    let local = LocalTier::in_memory();
    local.write(&ProgressKey::new("u1", "c1", "L1"), 250.0);

    let mut h = harness_with(FakeCatalog::new(two_lectures()), remote, local);
    let commands = h.view.open().await;

    assert_eq!(ready(&h.view), (1, 120.0));
    assert!(commands.contains(&MediaCommand::Seek {
        position_secs: 120.0
    }));
    assert!(h.view.session().completed().contains("L1"));
}

#[tokio::test]
async fn catalog_failure_offers_retry() {
    let mut h = harness(FakeCatalog::failing_once(two_lectures()));

    h.view.open().await;
    assert!(matches!(
        h.view.session().state(),
        SessionState::Failed { .. }
    ));
    assert!(drain(&mut h.notices)
        .iter()
        .any(|n| n.level == NoticeLevel::Error));

    let commands = h.view.retry().await;
    assert_eq!(commands.len(), 1);
    assert_eq!(ready(&h.view), (0, 0.0));
}

#[tokio::test]
async fn restricted_scrub_is_sent_back() {
    let mut h = harness(FakeCatalog::new(two_lectures()));
    h.view.open().await;
    h.view.media(MediaEvent::TimeUpdate { position_secs: 30.0 });

    let commands = h.view.media(MediaEvent::Seeking {
        position_secs: 280.0,
    });

    assert_eq!(
        commands,
        vec![MediaCommand::Seek {
            position_secs: 30.0
        }]
    );
    assert_eq!(ready(&h.view), (0, 30.0));
}

#[tokio::test]
async fn completed_lecture_can_be_scrubbed() {
    let mut h = harness(FakeCatalog::new(two_lectures()));
    h.view.open().await;
    h.view.media(MediaEvent::TimeUpdate {
        position_secs: 300.0,
    });
    h.view.select(0);

    let commands = h.view.media(MediaEvent::Seeking {
        position_secs: 250.0,
    });

    assert!(commands.is_empty());
    assert_eq!(ready(&h.view), (0, 250.0));
}

#[tokio::test]
async fn stale_samples_are_dropped() {
    let mut h = harness(FakeCatalog::new(two_lectures()));
    h.view.open().await;
    let first = h.view.surface().generation();

    h.view.media_sample(MediaSample::new(
        first,
        MediaEvent::TimeUpdate {
            position_secs: 300.0,
        },
    ));
    assert_eq!(ready(&h.view), (1, 0.0));

    // Late event from L1 arriving after the switch to L2.
    h.view.media_sample(MediaSample::new(first, MediaEvent::Ended));
    assert_eq!(ready(&h.view), (1, 0.0));
}

#[tokio::test]
async fn pause_flushes_and_unload_flushes_again() {
    let mut h = harness(FakeCatalog::new(two_lectures()));
    h.view.open().await;
    h.view.media(MediaEvent::Playing);
    h.view.media(MediaEvent::TimeUpdate { position_secs: 45.0 });
    h.view.media(MediaEvent::Pause);

    // The pause flush runs in the background.
    for _ in 0..100 {
        if !h.remote.pushes().is_empty() {
            break;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    assert_eq!(h.remote.pushes()[0].played_seconds, 45.0);

    h.view.media(MediaEvent::TimeUpdate { position_secs: 46.0 });
    h.view.unload().await.unwrap();

    let pushes = h.remote.pushes();
    assert_eq!(pushes.len(), 2);
    assert_eq!(pushes[1].played_seconds, 46.0);
}

#[tokio::test]
async fn every_tick_lands_in_the_local_tier() {
    let mut h = harness(FakeCatalog::new(two_lectures()));
    h.view.open().await;
    let key = ProgressKey::new("u1", "c1", "L1");

    for position in [0.25, 0.5, 0.75, 1.0] {
        h.view.media(MediaEvent::TimeUpdate {
            position_secs: position,
        });
        assert_eq!(h.local.get(&key).unwrap().current_time, position);
    }
}

#[tokio::test]
async fn missing_video_is_an_inline_error() {
    let lectures = vec![
        Lecture::new("L1", "No video yet", 300),
        lecture("L2", "Hooks", 400),
    ];
    let mut h = harness(FakeCatalog::new(lectures));

    let commands = h.view.open().await;

    assert!(commands.is_empty());
    assert!(h.view.session().state().is_ready());
    assert!(h.view.session().playback_error().is_some());
    assert!(h.view.play().is_empty());
}

#[tokio::test]
async fn video_shorter_than_catalog_still_unlocks_the_next_lecture() {
    let dto: LectureDto = serde_json::from_str(
        r#"{"_id":"L1","lectureTitle":"Intro","videoInfo":{"videoUrl":"https://cdn.example.com/L1.mp4"},"duration":299.6}"#,
    )
    .unwrap();
    let lectures = vec![Lecture::from(dto), lecture("L2", "Hooks", 400)];
    let mut h = harness(FakeCatalog::new(lectures));
    h.view.open().await;
    let generation = h.view.surface().generation();

    h.view.media_sample(MediaSample::new(
        generation,
        MediaEvent::LoadedMetadata {
            duration_secs: 298.7,
        },
    ));
    h.view.media_sample(MediaSample::new(generation, MediaEvent::Playing));
    h.view.media_sample(MediaSample::new(
        generation,
        MediaEvent::TimeUpdate {
            position_secs: 298.5,
        },
    ));
    assert!(!h.view.session().is_completed(0));
    let commands = h.view.media_sample(MediaSample::new(generation, MediaEvent::Ended));

    assert!(h.view.session().is_completed(0));
    assert_eq!(ready(&h.view), (1, 0.0));
    assert!(h.view.session().is_playing());
    assert!(commands.contains(&MediaCommand::Play));
}

#[tokio::test]
async fn ended_on_the_last_lecture_stops_playing() {
    let mut h = harness(FakeCatalog::new(vec![lecture("L1", "Intro", 300)]));
    h.view.open().await;
    h.view.media(MediaEvent::Playing);
    h.view.media(MediaEvent::TimeUpdate {
        position_secs: 295.0,
    });

    let commands = h.view.media(MediaEvent::Ended);

    assert_eq!(*h.view.session().state(), SessionState::Completed);
    assert!(!h.view.session().is_playing());
    assert_eq!(commands, vec![MediaCommand::Pause]);
}

#[tokio::test]
async fn course_completion_is_saved_before_unload_returns() {
    let mut h = harness(FakeCatalog::new(two_lectures()));
    h.view.open().await;
    h.view.media(MediaEvent::TimeUpdate {
        position_secs: 300.0,
    });
    h.view.media(MediaEvent::TimeUpdate {
        position_secs: 400.0,
    });
    assert_eq!(*h.view.session().state(), SessionState::Completed);

    h.view.unload().await.unwrap();

    let pushes = h.remote.pushes();
    let last = pushes.iter().find(|p| p.lecture_id == "L2").unwrap();
    assert_eq!(last.played_seconds, 400.0);
    assert!(pushes.iter().any(|p| p.lecture_id == "L1"));
}
