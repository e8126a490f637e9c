//! Content-hash polling detector.

use std::path::Path;
use std::time::Duration;

use crossbeam_channel::{Receiver, select};
use sha2::{Digest, Sha256};
use tracing::{debug, warn};

use super::{
    ChangeDetector, ChangeEvent, ChangeKind, DetectorConfig, DetectorGuard, EventCallback,
    EventMask, fire,
};
use crate::error::Result;

const NAME: &str = "hash";

/// Files larger than this are hashed anyway, with a warning.
const LARGE_FILE_BYTES: u64 = 1024 * 1024;

type Fingerprint = [u8; 32];

/// Re-reads the file every interval and compares its SHA-256 digest.
///
/// Only [`EventMask::MODIFIED`] is supported. A change in modification
/// time without a change in bytes produces no event. The whole file is read
/// on every tick, so this strategy suits small files.
#[derive(Debug)]
pub struct HashPollingDetector {
    config: DetectorConfig,
}

impl HashPollingDetector {
    /// Create a hash polling detector.
    ///
    /// # Errors
    ///
    /// - [`Error::ListenerConfig`](crate::Error::ListenerConfig) if the
    ///   interval is too short or the mask contains anything other than
    ///   [`EventMask::MODIFIED`]
    /// - [`Error::Path`](crate::Error::Path) if the file is missing or is a
    ///   directory
    pub fn new(config: DetectorConfig) -> Result<Self> {
        let config = config.validate("HashPollingDetector", EventMask::MODIFIED)?;

        if let Ok(meta) = std::fs::metadata(&config.path)
            && meta.len() > LARGE_FILE_BYTES
        {
            warn!(
                path = %config.path.display(),
                size = meta.len(),
                "file is larger than 1 MiB; hashing it on every tick is expensive"
            );
        }

        Ok(Self { config })
    }
}

impl ChangeDetector for HashPollingDetector {
    fn name(&self) -> &'static str {
        NAME
    }

    fn config(&self) -> &DetectorConfig {
        &self.config
    }

    fn register(self: Box<Self>, callback: EventCallback) -> Result<DetectorGuard> {
        let DetectorConfig { path, interval, .. } = self.config;

        let initial = fingerprint(&path);
        let worker_path = path.clone();

        DetectorGuard::spawn(NAME, &path, move |stop_rx| {
            poll_loop(&worker_path, interval, initial, &stop_rx, callback);
        })
    }
}

fn poll_loop(
    path: &Path,
    interval: Duration,
    mut last: Option<Fingerprint>,
    stop_rx: &Receiver<()>,
    mut callback: EventCallback,
) {
    loop {
        select! {
            recv(stop_rx) -> _ => break,
            default(interval) => {}
        }

        // Unreadable ticks keep the last known digest
        let Some(current) = fingerprint(path) else {
            continue;
        };

        if last != Some(current) {
            debug!(path = %path.display(), "content digest changed");
            last = Some(current);
            fire(NAME, &mut callback, ChangeEvent::new(ChangeKind::Modified, path));
        }
    }
}

fn fingerprint(path: &Path) -> Option<Fingerprint> {
    match std::fs::read(path) {
        Ok(bytes) => Some(Sha256::digest(&bytes).into()),
        Err(e) => {
            debug!(path = %path.display(), error = %e, "could not read file for hashing");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    #[test]
    fn test_rejects_non_modify_masks() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("app.properties");
        fs::write(&path, "a=1").unwrap();

        let err = HashPollingDetector::new(
            DetectorConfig::new(&path).mask(EventMask::MODIFIED | EventMask::DELETED),
        )
        .unwrap_err();
        assert!(matches!(err, crate::Error::ListenerConfig { .. }));

        assert!(HashPollingDetector::new(DetectorConfig::new(&path)).is_ok());
    }

    #[test]
    fn test_fingerprint_tracks_bytes_only() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("app.properties");

        fs::write(&path, "a=1").unwrap();
        let first = fingerprint(&path);
        fs::write(&path, "a=1").unwrap();
        assert_eq!(fingerprint(&path), first);

        fs::write(&path, "a=2").unwrap();
        assert_ne!(fingerprint(&path), first);

        assert_eq!(fingerprint(&dir.path().join("missing")), None);
    }
}
