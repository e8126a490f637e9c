//! Integration tests for hot reload.
//!
//! Detector tests sleep across real scan intervals and are run serially.

mod common;

use std::fs::{self, File};
use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::mpsc;
use std::thread;
use std::time::{Duration, SystemTime};

use dynprops::{
    ChangeKind, ConfigFormat, DetectorKind, DynamicConfig, Error, EventMask, ManagerState,
    ReloadEvent, ReloadOutcome, ReloadTrigger,
};
use serial_test::serial;
use tempfile::tempdir;

use common::{ServerConfig, rewrite, write_file};

/// Long enough for one interval to elapse and a reload to finish.
const SETTLE: Duration = Duration::from_millis(2500);

// ============================================================================
// Handle Basics
// ============================================================================

// These tests only watch for deletion so the scan never races manual reloads.

#[test]
fn test_manual_reload_swaps_and_notifies() {
    let dir = tempdir().unwrap();
    let path = write_file(&dir, "app.properties", "name=one\nport=1\n");
    let (tx, rx) = mpsc::channel::<ReloadEvent<ServerConfig>>();

    let config = DynamicConfig::<ServerConfig>::new(&path)
        .detector(DetectorKind::IntervalScan)
        .events(EventMask::DELETED)
        .on_reload(move |event| {
            let _ = tx.send(event);
        })
        .load()
        .unwrap();

    assert_eq!(config.state(), ManagerState::Watching);
    let snapshot = config.get();
    let epoch = config.epoch();

    rewrite(&path, "name=two\nport=2\n");
    let outcome = config.reload().unwrap();

    assert!(outcome.is_reloaded());
    assert_eq!(config.get().port, 2);
    assert_eq!(snapshot.port, 1);
    assert!(config.has_changed_since(epoch));

    let event = rx.recv_timeout(Duration::from_secs(5)).unwrap();
    assert_eq!(event.trigger, ReloadTrigger::Manual);
    assert_eq!(event.epoch, 1);
    assert_eq!(event.outcome.instance().map(|c| c.name.as_str()), Some("two"));

    config.stop();
}

#[test]
fn test_failed_reload_keeps_previous_instance() {
    let dir = tempdir().unwrap();
    let path = write_file(&dir, "app.json", r#"{"name": "good", "port": 10}"#);
    let (tx, rx) = mpsc::channel::<ReloadEvent<ServerConfig>>();

    let config = DynamicConfig::<ServerConfig>::new(&path)
        .detector(DetectorKind::IntervalScan)
        .events(EventMask::DELETED)
        .on_reload(move |event| {
            let _ = tx.send(event);
        })
        .load()
        .unwrap();

    rewrite(&path, r#"{"name": "bad", "port": "ten"}"#);
    let outcome = config.reload().unwrap();

    assert!(!outcome.is_reloaded());
    assert_eq!(config.get().name, "good");
    assert_eq!(config.epoch(), 0);

    let event = rx.recv_timeout(Duration::from_secs(5)).unwrap();
    match event.outcome {
        ReloadOutcome::Failed(err) => assert!(matches!(*err, Error::StructuralParse { .. })),
        ReloadOutcome::Reloaded(_) => panic!("expected failure"),
    }
    assert_eq!(event.epoch, 0);

    config.stop();
}

#[test]
fn test_auto_format_is_resolved_again_on_reload() {
    let dir = tempdir().unwrap();
    let path = write_file(&dir, "app.conf", r#"{"name": "json", "port": 1}"#);

    let config = DynamicConfig::<ServerConfig>::new(&path)
        .detector(DetectorKind::IntervalScan)
        .events(EventMask::DELETED)
        .load()
        .unwrap();
    assert_eq!(config.format(), ConfigFormat::Json);

    rewrite(&path, "name=props\nport=2\n");
    config.reload().unwrap();

    assert_eq!(config.format(), ConfigFormat::Properties);
    assert_eq!(config.get().name, "props");

    config.stop();
}

#[test]
fn test_stop_is_idempotent_and_blocks_reload() {
    let dir = tempdir().unwrap();
    let path = write_file(&dir, "app.properties", "port=1\n");

    let config = DynamicConfig::<ServerConfig>::new(&path)
        .detector(DetectorKind::IntervalScan)
        .events(EventMask::DELETED)
        .load()
        .unwrap();
    let other = config.clone();

    assert!(config.is_running());
    config.stop();
    config.stop();

    assert!(!other.is_running());
    assert_eq!(other.state(), ManagerState::Stopped);
    assert!(matches!(other.reload(), Err(Error::Stopped)));
    // Last instance remains readable
    assert_eq!(other.get().port, 1);
}

#[test]
fn test_panicking_callback_does_not_stop_delivery() {
    let dir = tempdir().unwrap();
    let path = write_file(&dir, "app.properties", "port=1\n");
    let calls = Arc::new(AtomicU32::new(0));
    let calls_clone = Arc::clone(&calls);

    let config = DynamicConfig::<ServerConfig>::new(&path)
        .detector(DetectorKind::IntervalScan)
        .events(EventMask::DELETED)
        .on_reload(move |_| {
            let n = calls_clone.fetch_add(1, Ordering::SeqCst);
            assert!(n != 0, "first callback panics");
        })
        .load()
        .unwrap();

    config.reload().unwrap();
    config.reload().unwrap();
    // Stop drains queued events
    config.stop();

    assert_eq!(calls.load(Ordering::SeqCst), 2);
}

#[test]
fn test_concurrent_manual_reloads_are_serialized() {
    const THREADS: u64 = 8;
    const PER_THREAD: u64 = 10;

    let dir = tempdir().unwrap();
    let path = write_file(&dir, "app.properties", "port=1\n");
    let (tx, rx) = mpsc::channel::<ReloadEvent<ServerConfig>>();

    let config = DynamicConfig::<ServerConfig>::new(&path)
        .detector(DetectorKind::IntervalScan)
        .events(EventMask::DELETED)
        .on_reload(move |event| {
            let _ = tx.send(event);
        })
        .load()
        .unwrap();

    let workers: Vec<_> = (0..THREADS)
        .map(|_| {
            let config = config.clone();
            thread::spawn(move || {
                (0..PER_THREAD).all(|_| config.reload().unwrap().is_reloaded())
            })
        })
        .collect();

    for worker in workers {
        assert!(worker.join().unwrap());
    }
    config.stop();

    // Each attempt swapped and reported before the next one started
    let epochs: Vec<u64> = rx.try_iter().map(|event| event.epoch).collect();
    assert_eq!(epochs, (1..=THREADS * PER_THREAD).collect::<Vec<_>>());
    assert_eq!(config.epoch(), THREADS * PER_THREAD);
}

#[cfg(unix)]
#[test]
fn test_reload_follows_repointed_symlink() {
    use std::os::unix::fs::symlink;

    let dir = tempdir().unwrap();
    let v1 = write_file(&dir, "v1.properties", "port=1\n");
    let v2 = write_file(&dir, "v2.properties", "port=2\n");
    let link = dir.path().join("app.properties");
    symlink(&v1, &link).unwrap();

    let config = DynamicConfig::<ServerConfig>::new(&link)
        .detector(DetectorKind::IntervalScan)
        .events(EventMask::DELETED)
        .load()
        .unwrap();
    assert_eq!(config.path(), link.as_path());
    assert_eq!(config.get().port, 1);

    // Atomic link swap, as done for mounted ConfigMaps
    let staged = dir.path().join("app.properties.next");
    symlink(&v2, &staged).unwrap();
    fs::rename(&staged, &link).unwrap();

    let outcome = config.reload().unwrap();
    assert!(outcome.is_reloaded());
    assert_eq!(config.get().port, 2);

    config.stop();
}

// ============================================================================
// Detector Driven Reloads
// ============================================================================

#[test]
#[serial]
fn test_native_burst_produces_one_reload() {
    let dir = tempdir().unwrap();
    let path = write_file(&dir, "app.properties", "port=0\n");
    let reloads = Arc::new(AtomicU32::new(0));
    let reloads_clone = Arc::clone(&reloads);

    let config = DynamicConfig::<ServerConfig>::new(&path)
        .detector(DetectorKind::Native)
        .interval(Duration::from_millis(1000))
        .on_reload(move |event| {
            if event.outcome.is_reloaded() {
                reloads_clone.fetch_add(1, Ordering::SeqCst);
            }
        })
        .load()
        .unwrap();

    // Let the watcher settle
    thread::sleep(Duration::from_millis(200));

    // Five writes within 200ms
    for port in 1..=5 {
        rewrite(&path, &format!("port={port}\n"));
        thread::sleep(Duration::from_millis(40));
    }

    thread::sleep(SETTLE);

    assert_eq!(reloads.load(Ordering::SeqCst), 1);
    assert_eq!(config.get().port, 5);
    assert_eq!(config.epoch(), 1);

    config.stop();
}

#[test]
#[serial]
fn test_blocked_callback_does_not_delay_reloads() {
    let dir = tempdir().unwrap();
    let path = write_file(&dir, "app.properties", "port=1\n");
    let (entered_tx, entered_rx) = mpsc::channel::<u64>();
    let (release_tx, release_rx) = mpsc::channel::<()>();

    let config = DynamicConfig::<ServerConfig>::new(&path)
        .detector(DetectorKind::IntervalScan)
        .events(EventMask::MODIFIED)
        .on_reload(move |event| {
            let _ = entered_tx.send(event.epoch);
            let _ = release_rx.recv();
        })
        .load()
        .unwrap();

    // Content unchanged, so the scan stays quiet; this parks the callback
    config.reload().unwrap();
    assert_eq!(entered_rx.recv_timeout(Duration::from_secs(5)).unwrap(), 1);

    rewrite(&path, "port=22\n");
    thread::sleep(SETTLE);

    // Swapped by the detector while the callback thread is still blocked
    assert_eq!(config.get().port, 22);
    assert!(config.epoch() >= 2);
    assert!(entered_rx.try_recv().is_err());

    // Disconnecting releases every pending callback
    drop(release_tx);
    assert!(entered_rx.recv_timeout(Duration::from_secs(5)).unwrap() >= 2);

    config.stop();
}

#[test]
#[serial]
fn test_hash_polling_ignores_touch_and_sees_byte_change() {
    let dir = tempdir().unwrap();
    let path = write_file(&dir, "app.properties", "port=80\n");
    let callbacks = Arc::new(AtomicU32::new(0));
    let callbacks_clone = Arc::clone(&callbacks);

    let config = DynamicConfig::<ServerConfig>::new(&path)
        .detector(DetectorKind::HashPolling)
        .on_reload(move |_| {
            callbacks_clone.fetch_add(1, Ordering::SeqCst);
        })
        .load()
        .unwrap();

    // Touch without changing content
    File::options()
        .write(true)
        .open(&path)
        .unwrap()
        .set_modified(SystemTime::now() + Duration::from_secs(60))
        .unwrap();
    thread::sleep(SETTLE);
    assert_eq!(callbacks.load(Ordering::SeqCst), 0);

    // One byte differs
    rewrite(&path, "port=81\n");
    thread::sleep(SETTLE);

    assert_eq!(callbacks.load(Ordering::SeqCst), 1);
    assert_eq!(config.get().port, 81);

    config.stop();
}

#[test]
#[serial]
fn test_interval_scan_delete_then_recreate() {
    let dir = tempdir().unwrap();
    let path = write_file(&dir, "app.properties", "port=1\n");
    let (tx, rx) = mpsc::channel::<ReloadEvent<ServerConfig>>();

    let config = DynamicConfig::<ServerConfig>::new(&path)
        .detector(DetectorKind::IntervalScan)
        .events(EventMask::ALL)
        .on_reload(move |event| {
            let _ = tx.send(event);
        })
        .load()
        .unwrap();

    fs::remove_file(&path).unwrap();
    let deleted = rx.recv_timeout(SETTLE * 2).unwrap();
    match &deleted.trigger {
        ReloadTrigger::File(change) => assert_eq!(change.kind, ChangeKind::Deleted),
        ReloadTrigger::Manual => panic!("expected a file trigger"),
    }
    assert!(matches!(deleted.outcome.error(), Some(Error::Path { .. })));
    assert_eq!(config.get().port, 1);

    rewrite(&path, "port=22\n");
    let created = rx.recv_timeout(SETTLE * 2).unwrap();
    match &created.trigger {
        ReloadTrigger::File(change) => assert_eq!(change.kind, ChangeKind::Created),
        ReloadTrigger::Manual => panic!("expected a file trigger"),
    }
    assert!(created.outcome.is_reloaded());
    assert_eq!(config.get().port, 22);

    config.stop();
}

#[test]
#[serial]
fn test_interval_scan_respects_mask() {
    let dir = tempdir().unwrap();
    let path = write_file(&dir, "app.properties", "port=1\n");
    let callbacks = Arc::new(AtomicU32::new(0));
    let callbacks_clone = Arc::clone(&callbacks);

    let config = DynamicConfig::<ServerConfig>::new(&path)
        .detector(DetectorKind::IntervalScan)
        .events(EventMask::DELETED)
        .on_reload(move |_| {
            callbacks_clone.fetch_add(1, Ordering::SeqCst);
        })
        .load()
        .unwrap();

    rewrite(&path, "port=12345\n");
    thread::sleep(SETTLE);

    assert_eq!(callbacks.load(Ordering::SeqCst), 0);
    assert_eq!(config.get().port, 1);

    config.stop();
}

// ============================================================================
// Detector Configuration
// ============================================================================

#[test]
fn test_interval_below_one_second_is_rejected() {
    let dir = tempdir().unwrap();
    let path = write_file(&dir, "app.properties", "port=1\n");

    let err = DynamicConfig::<ServerConfig>::new(&path)
        .detector(DetectorKind::IntervalScan)
        .interval(Duration::from_millis(500))
        .load()
        .unwrap_err();
    assert!(matches!(err, Error::ListenerConfig { .. }));
}

#[test]
fn test_hash_polling_rejects_create_events() {
    let dir = tempdir().unwrap();
    let path = write_file(&dir, "app.properties", "port=1\n");

    let err = DynamicConfig::<ServerConfig>::new(&path)
        .detector(DetectorKind::HashPolling)
        .events(EventMask::CREATED | EventMask::MODIFIED)
        .load()
        .unwrap_err();
    assert!(matches!(err, Error::ListenerConfig { .. }));
}
