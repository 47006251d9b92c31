//! Subscribers joining while builds run see a gap-free, ordered suffix of
//! the transition sequence.

use std::sync::Arc;
use std::time::Duration;

use multipack_core::{BuildOutcome, Generation, Target, UpdateAction, UpdateMessage};
use multipack_runtime::{BuildTracker, Logger, UpdateChannels};

const BUILDS: u64 = 20;

fn outcome(n: u64) -> BuildOutcome {
    BuildOutcome {
        hash: format!("h{n}"),
        duration_ms: n,
        ..BuildOutcome::default()
    }
}

fn generation_of(msg: &UpdateMessage) -> Option<Generation> {
    msg.body.as_ref().map(|record| record.generation)
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_late_subscribers_never_miss_transitions() {
    let channels = Arc::new(UpdateChannels::new());
    let tracker = Arc::new(BuildTracker::new(Arc::clone(&channels), Logger::noop()));
    let ios = Target::new("ios").unwrap();

    let subscribers: Vec<_> = (0..8u64)
        .map(|i| {
            let channels = Arc::clone(&channels);
            let ios = ios.clone();
            tokio::spawn(async move {
                tokio::time::sleep(Duration::from_millis(i * 3)).await;
                let id = channels.next_connection_id();
                let mut rx = channels.subscribe(&ios, id);
                let mut seen = Vec::new();
                while let Some(msg) = rx.recv().await {
                    let last = generation_of(&msg) == Some(Generation(BUILDS));
                    seen.push(msg);
                    if last {
                        break;
                    }
                }
                seen
            })
        })
        .collect();

    for n in 1..=BUILDS {
        let generation = tracker.begin(&ios);
        tokio::task::yield_now().await;
        tracker.finish(&ios, generation, outcome(n));
        tokio::time::sleep(Duration::from_millis(1)).await;
    }

    for subscriber in subscribers {
        let seen = tokio::time::timeout(Duration::from_secs(5), subscriber)
            .await
            .unwrap()
            .unwrap();

        assert_eq!(seen[0].action, UpdateAction::Sync);
        let mut expected_built = generation_of(&seen[0]).map_or(1, |g| g.0 + 1);
        let mut building_open = false;

        for msg in &seen[1..] {
            match msg.action {
                UpdateAction::Building => {
                    assert!(!building_open, "two building messages in a row");
                    building_open = true;
                }
                UpdateAction::Built => {
                    assert_eq!(generation_of(msg), Some(Generation(expected_built)));
                    expected_built += 1;
                    building_open = false;
                }
                UpdateAction::Sync => panic!("sync after the first message"),
            }
        }
    }

    assert_eq!(tracker.latest(&ios).unwrap().hash, format!("h{BUILDS}"));
}

#[tokio::test]
async fn test_superseded_build_is_not_published() {
    let channels = Arc::new(UpdateChannels::new());
    let tracker = BuildTracker::new(Arc::clone(&channels), Logger::noop());
    let ios = Target::new("ios").unwrap();
    let mut rx = channels.subscribe(&ios, channels.next_connection_id());

    let stale = tracker.begin(&ios);
    tracker.invalidate(&ios, Some("src/App.js"));
    let current = tracker.begin(&ios);
    assert!(tracker.finish(&ios, stale, outcome(1)).is_none());
    assert!(tracker.finish(&ios, current, outcome(2)).is_some());

    let actions: Vec<UpdateAction> = std::iter::from_fn(|| rx.try_recv().ok())
        .map(|msg| msg.action)
        .collect();
    assert_eq!(
        actions,
        vec![
            UpdateAction::Sync,
            UpdateAction::Building,
            UpdateAction::Building,
            UpdateAction::Built,
        ]
    );
    assert_eq!(tracker.latest(&ios).unwrap().hash, "h2");
}
