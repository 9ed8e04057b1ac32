//! No-mock batch tests: real files, real semaphore, real signals.

use lm_stream::{
    event_names, BatchCoordinator, BatchError, EventBus, JobSignals, ProcessingOptions,
    ProgressEmitter, ProgressEvent,
};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, OnceLock, Weak};
use std::time::Duration;
use tempfile::TempDir;

fn write_lines(dir: &Path, name: &str, count: usize) -> PathBuf {
    let mut body = String::new();
    for i in 0..count {
        body.push_str(&format!("{name} {i:05} token=t{i} mail ops@example.com\n"));
    }
    let path = dir.join(name);
    std::fs::write(&path, body).unwrap();
    path
}

/// Only one job may run per process; tests that start one take turns.
static SERIAL: Mutex<()> = Mutex::new(());

fn serial() -> MutexGuard<'static, ()> {
    SERIAL.lock().unwrap_or_else(|p| p.into_inner())
}

fn options() -> ProcessingOptions {
    ProcessingOptions::default().with_preserve_line_endings(false)
}

/// Tracks how many files are between `file_started` and a terminal event.
#[derive(Default)]
struct InFlight {
    current: AtomicUsize,
    max: AtomicUsize,
}

impl ProgressEmitter for InFlight {
    fn emit(&self, event: ProgressEvent) {
        match event.event.as_str() {
            event_names::FILE_STARTED => {
                let now = self.current.fetch_add(1, Ordering::SeqCst) + 1;
                self.max.fetch_max(now, Ordering::SeqCst);
            }
            event_names::FILE_COMPLETED | event_names::FILE_FAILED => {
                self.current.fetch_sub(1, Ordering::SeqCst);
            }
            event_names::FILE_CANCELLED if event.elapsed_ms.is_some() => {
                self.current.fetch_sub(1, Ordering::SeqCst);
            }
            _ => {}
        }
    }
}

/// Cancels the coordinator it is attached to once file 0 reports 1000 lines.
#[derive(Default)]
struct CancelAtThousand {
    coordinator: OnceLock<Weak<BatchCoordinator>>,
    seen: Mutex<Vec<ProgressEvent>>,
}

impl ProgressEmitter for CancelAtThousand {
    fn emit(&self, event: ProgressEvent) {
        let trigger = event.event == event_names::FILE_PROGRESS
            && event.file_index == Some(0)
            && event.details.get("lines").and_then(|v| v.as_u64()) == Some(1000);
        if trigger {
            if let Some(coord) = self.coordinator.get().and_then(Weak::upgrade) {
                assert!(coord.cancel());
            }
        }
        self.seen.lock().unwrap().push(event);
    }
}

#[tokio::test]
async fn test_results_follow_input_order_and_failures_are_isolated() {
    let _serial = serial();
    let dir = TempDir::new().unwrap();
    let inputs = vec![
        write_lines(dir.path(), "big.log", 4000),
        dir.path().join("missing.log"),
        write_lines(dir.path(), "small.log", 3),
        write_lines(dir.path(), "mid.log", 500),
    ];

    let coord = BatchCoordinator::new();
    let outcome = coord
        .run_all(inputs.clone(), None, options().with_concurrency(3))
        .await
        .unwrap();

    let paths: Vec<_> = outcome.results.iter().map(|r| r.input_path.clone()).collect();
    assert_eq!(paths, inputs);

    let ok: Vec<bool> = outcome.results.iter().map(|r| r.success).collect();
    assert_eq!(ok, vec![true, false, true, true]);
    assert!(outcome.results[1].error.as_deref().unwrap().contains("not found"));

    let summary = &outcome.summary;
    assert_eq!(summary.total_files, 4);
    assert_eq!(summary.succeeded, 3);
    assert_eq!(summary.failed, 1);
    assert_eq!(summary.cancelled, 0);
    assert_eq!(summary.totals.total_lines, 4503);
    assert_eq!(summary.totals.masked_lines, 4503);
    assert_eq!(summary.totals.pattern_matches["email"], 4503);
    assert_eq!(summary.failures.len(), 1);
    assert!(summary.render().contains("missing.log"));
    assert!(!coord.is_active());

    let masked = std::fs::read_to_string(dir.path().join("small.log.masked.log")).unwrap();
    assert!(!masked.contains("token=t0"));
    assert!(!masked.contains("ops@example.com"));
}

#[tokio::test]
async fn test_concurrency_bound_is_respected() {
    let _serial = serial();
    let dir = TempDir::new().unwrap();
    let inputs: Vec<PathBuf> = (0..8)
        .map(|i| write_lines(dir.path(), &format!("f{i}.log"), 3000))
        .collect();
    let tracker = Arc::new(InFlight::default());

    let coord = BatchCoordinator::with_emitter(tracker.clone());
    let outcome = coord
        .run_all(inputs, None, options().with_concurrency(2))
        .await
        .unwrap();

    assert!(outcome.summary.is_clean());
    let max = tracker.max.load(Ordering::SeqCst);
    assert!((1..=2).contains(&max), "max in flight was {max}");
    assert_eq!(tracker.current.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_cancel_mid_batch_accounts_for_every_file() {
    let _serial = serial();
    let dir = TempDir::new().unwrap();
    let inputs: Vec<PathBuf> = (0..5)
        .map(|i| write_lines(dir.path(), &format!("c{i}.log"), 5000))
        .collect();

    let emitter = Arc::new(CancelAtThousand::default());
    let coord = Arc::new(BatchCoordinator::with_emitter(emitter.clone()));
    emitter
        .coordinator
        .set(Arc::downgrade(&coord))
        .unwrap_or_else(|_| panic!("set once"));

    let outcome = coord
        .run_all(inputs.clone(), None, options().with_concurrency(1))
        .await
        .unwrap();

    assert_eq!(outcome.results.len(), 5);
    assert!(outcome.results.iter().all(|r| r.cancelled && !r.success));
    assert!(outcome.results.iter().all(|r| r.error.is_none()));
    assert_eq!(outcome.results[0].stats.as_ref().unwrap().total_lines, 1000);
    assert!(outcome.results[1..].iter().all(|r| r.stats.is_none()));
    assert_eq!(outcome.summary.cancelled, 5);

    for input in &inputs {
        let mut name = input.file_name().unwrap().to_os_string();
        name.push(".masked.log");
        assert!(!dir.path().join(name).exists());
    }
    let leftovers = std::fs::read_dir(dir.path())
        .unwrap()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_name().to_string_lossy().ends_with(".tmp"))
        .count();
    assert_eq!(leftovers, 0);

    let seen = emitter.seen.lock().unwrap();
    let names: Vec<&str> = seen.iter().map(|e| e.event.as_str()).collect();
    assert!(names.contains(&event_names::BATCH_CANCEL_REQUESTED));
    assert_eq!(names.last(), Some(&event_names::BATCH_FINISHED));
    assert_eq!(
        names.iter().filter(|n| **n == event_names::FILE_CANCELLED).count(),
        5
    );
    let job_id = outcome.job_id.to_string();
    assert!(seen.iter().all(|e| e.job_id.as_deref() == Some(job_id.as_str())));
}

#[tokio::test]
async fn test_second_job_rejected_while_active() {
    let _serial = serial();
    let dir = TempDir::new().unwrap();
    let input = write_lines(dir.path(), "held.log", 100);
    let bus = Arc::new(EventBus::new());
    let events = bus.subscribe();
    let coord = Arc::new(BatchCoordinator::with_emitter(bus.clone()));

    let signals = JobSignals::default();
    signals.pause.pause();

    let first = {
        let coord = Arc::clone(&coord);
        let signals = signals.clone();
        tokio::spawn(async move {
            coord
                .run_with_signals(vec![input], None, options(), signals)
                .await
        })
    };

    tokio::time::timeout(Duration::from_secs(5), async {
        while signals.pause.bound_count() == 0 {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .expect("stream parked");

    assert!(coord.is_active());
    assert!(coord.is_paused());
    let second = coord.run_all(Vec::new(), None, options()).await;
    assert_eq!(second.unwrap_err(), BatchError::JobActive);

    assert!(!coord.pause());
    assert!(coord.resume());
    let outcome = tokio::time::timeout(Duration::from_secs(5), first)
        .await
        .expect("finished after resume")
        .unwrap()
        .unwrap();
    assert!(outcome.summary.is_clean());
    assert!(!coord.is_active());

    let names: Vec<String> = events.try_iter().map(|e| e.event).collect();
    assert_eq!(names.first().map(String::as_str), Some(event_names::BATCH_STARTED));
    assert!(names.iter().any(|n| n == event_names::BATCH_RESUMED));
    assert!(!names.iter().any(|n| n == event_names::BATCH_PAUSED));

    let again = coord.run_all(Vec::new(), None, options()).await;
    assert!(again.is_ok());
}

#[tokio::test]
async fn test_job_slot_is_shared_across_coordinators() {
    let _serial = serial();
    let dir = TempDir::new().unwrap();
    let input = write_lines(dir.path(), "shared.log", 50);
    let holder = Arc::new(BatchCoordinator::new());
    let other = BatchCoordinator::new();

    let signals = JobSignals::default();
    signals.pause.pause();

    let first = {
        let holder = Arc::clone(&holder);
        let signals = signals.clone();
        tokio::spawn(async move {
            holder
                .run_with_signals(vec![input], None, options(), signals)
                .await
        })
    };

    tokio::time::timeout(Duration::from_secs(5), async {
        while signals.pause.bound_count() == 0 {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .expect("stream parked");

    let rejected = other
        .run_all(vec![write_lines(dir.path(), "late.log", 5)], None, options())
        .await;
    assert_eq!(rejected.unwrap_err(), BatchError::JobActive);
    assert!(!other.is_active());
    assert!(holder.is_active());

    assert!(holder.resume());
    let outcome = tokio::time::timeout(Duration::from_secs(5), first)
        .await
        .expect("finished after resume")
        .unwrap()
        .unwrap();
    assert!(outcome.summary.is_clean());

    let after = other.run_all(Vec::new(), None, options()).await;
    assert!(after.is_ok());
    assert!(!holder.is_active());
}
