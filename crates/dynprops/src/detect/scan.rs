//! Metadata polling detector.

use std::path::Path;
use std::time::{Duration, SystemTime};

use crossbeam_channel::{Receiver, select};
use tracing::trace;

use super::{
    ChangeDetector, ChangeEvent, ChangeKind, DetectorConfig, DetectorGuard, EventCallback,
    EventMask, fire,
};
use crate::error::Result;

const NAME: &str = "scan";

/// What a scan sees of the file.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
struct Snapshot {
    modified: Option<SystemTime>,
    len: u64,
}

/// Stats the file every interval and compares modification time and size.
///
/// Works wherever `stat` works, including container overlay and network
/// filesystems where OS notifications are lost.
#[derive(Debug)]
pub struct IntervalScanDetector {
    config: DetectorConfig,
}

impl IntervalScanDetector {
    /// Create an interval scan detector.
    ///
    /// # Errors
    ///
    /// - [`Error::ListenerConfig`](crate::Error::ListenerConfig) if the
    ///   interval is too short or the mask is empty
    /// - [`Error::Path`](crate::Error::Path) if the file is missing or is a
    ///   directory
    pub fn new(config: DetectorConfig) -> Result<Self> {
        Ok(Self {
            config: config.validate("IntervalScanDetector", EventMask::ALL)?,
        })
    }
}

impl ChangeDetector for IntervalScanDetector {
    fn name(&self) -> &'static str {
        NAME
    }

    fn config(&self) -> &DetectorConfig {
        &self.config
    }

    fn register(self: Box<Self>, callback: EventCallback) -> Result<DetectorGuard> {
        let DetectorConfig {
            path,
            mask,
            interval,
        } = self.config;

        let initial = snapshot(&path);
        let worker_path = path.clone();

        DetectorGuard::spawn(NAME, &path, move |stop_rx| {
            scan_loop(&worker_path, mask, interval, initial, &stop_rx, callback);
        })
    }
}

fn scan_loop(
    path: &Path,
    mask: EventMask,
    interval: Duration,
    mut last: Option<Snapshot>,
    stop_rx: &Receiver<()>,
    mut callback: EventCallback,
) {
    loop {
        select! {
            recv(stop_rx) -> _ => break,
            default(interval) => {}
        }

        let current = snapshot(path);
        let change = compare(last, current);
        last = current;

        if let Some(kind) = change {
            trace!(path = %path.display(), %kind, "scan observed change");
            if mask.contains(kind) {
                fire(NAME, &mut callback, ChangeEvent::new(kind, path));
            }
        }
    }
}

fn snapshot(path: &Path) -> Option<Snapshot> {
    let meta = std::fs::metadata(path).ok()?;
    meta.is_file().then(|| Snapshot {
        modified: meta.modified().ok(),
        len: meta.len(),
    })
}

fn compare(before: Option<Snapshot>, after: Option<Snapshot>) -> Option<ChangeKind> {
    match (before, after) {
        (None, Some(_)) => Some(ChangeKind::Created),
        (Some(_), None) => Some(ChangeKind::Deleted),
        (Some(a), Some(b)) if a != b => Some(ChangeKind::Modified),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn snap(secs: u64, len: u64) -> Option<Snapshot> {
        Some(Snapshot {
            modified: Some(SystemTime::UNIX_EPOCH + Duration::from_secs(secs)),
            len,
        })
    }

    #[test]
    fn test_compare_transitions() {
        assert_eq!(compare(None, snap(1, 3)), Some(ChangeKind::Created));
        assert_eq!(compare(snap(1, 3), None), Some(ChangeKind::Deleted));
        assert_eq!(compare(snap(1, 3), snap(2, 3)), Some(ChangeKind::Modified));
        assert_eq!(compare(snap(1, 3), snap(1, 4)), Some(ChangeKind::Modified));
        assert_eq!(compare(snap(1, 3), snap(1, 3)), None);
        assert_eq!(compare(None, None), None);
    }

    #[test]
    fn test_snapshot_of_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        assert_eq!(snapshot(&dir.path().join("gone")), None);
        assert_eq!(snapshot(dir.path()), None);
    }
}
