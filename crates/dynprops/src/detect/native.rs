//! OS notification based detector.

use std::ffi::OsString;
use std::path::Path;
use std::time::{Duration, Instant};

use crossbeam_channel::{Receiver, Sender, bounded, select};
use notify::event::{ModifyKind, RenameMode};
use notify::{Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use tracing::{debug, warn};

use super::{
    ChangeDetector, ChangeEvent, ChangeKind, Debouncer, DetectorConfig, DetectorGuard,
    EventCallback, EventMask, fire,
};
use crate::error::{Error, Result};

const NAME: &str = "native";

/// How long the worker sleeps when no debounce window is open.
const IDLE_WAIT: Duration = Duration::from_secs(1);

/// Watches the parent directory through the platform notification API
/// (`inotify`, `FSEvents`, `ReadDirectoryChangesW`) and filters by file name.
///
/// Editors and `write(2)` often produce several notifications per save, so
/// the first qualifying notification opens a debounce window of
/// `config.interval`; one event fires when the window closes.
///
/// Notifications are unreliable on some container overlay and network
/// filesystems. Construction logs a warning when running inside Kubernetes
/// or Docker, recommending [`IntervalScanDetector`](super::IntervalScanDetector).
#[derive(Debug)]
pub struct NativeWatchDetector {
    config: DetectorConfig,
}

impl NativeWatchDetector {
    /// Create a native watch detector.
    ///
    /// # Errors
    ///
    /// - [`Error::ListenerConfig`] if the interval is under one second or
    ///   the mask is empty
    /// - [`Error::Path`] if the file is missing or is a directory
    pub fn new(config: DetectorConfig) -> Result<Self> {
        let config = config.validate("NativeWatchDetector", EventMask::ALL)?;

        if running_in_container() {
            warn!(
                path = %config.path.display(),
                "container environment detected; native file notifications may be unreliable here, \
                 consider the interval scan detector"
            );
        }

        Ok(Self { config })
    }
}

impl ChangeDetector for NativeWatchDetector {
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

        let file_name = path
            .file_name()
            .map(ToOwned::to_owned)
            .ok_or_else(|| Error::path(&path))?;
        let parent = path
            .parent()
            .map(Path::to_path_buf)
            .ok_or_else(|| Error::path(&path))?;

        let (notify_tx, notify_rx) = bounded::<notify::Result<Event>>(100);
        let mut watcher = create_notify_watcher(notify_tx)?;
        watcher
            .watch(&parent, RecursiveMode::NonRecursive)
            .map_err(|e| {
                Error::watch_init(format!("failed to watch {}: {e}", parent.display()), Some(e))
            })?;

        let worker_path = path.clone();
        DetectorGuard::spawn(NAME, &path, move |stop_rx| {
            watch_loop(
                &worker_path,
                &file_name,
                mask,
                interval,
                &stop_rx,
                &notify_rx,
                callback,
                watcher,
            );
        })
    }
}

fn create_notify_watcher(tx: Sender<notify::Result<Event>>) -> Result<RecommendedWatcher> {
    notify::recommended_watcher(move |res| {
        let _ = tx.send(res);
    })
    .map_err(|e| Error::watch_init(format!("failed to create file watcher: {e}"), Some(e)))
}

#[allow(clippy::too_many_arguments)]
fn watch_loop(
    path: &Path,
    file_name: &OsString,
    mask: EventMask,
    window: Duration,
    stop_rx: &Receiver<()>,
    notify_rx: &Receiver<notify::Result<Event>>,
    mut callback: EventCallback,
    _watcher: RecommendedWatcher, // Keep watcher alive
) {
    let mut debouncer = Debouncer::new(window);

    loop {
        let wait = debouncer.remaining(Instant::now()).unwrap_or(IDLE_WAIT);

        select! {
            recv(stop_rx) -> _ => break,

            recv(notify_rx) -> event_result => match event_result {
                Ok(Ok(event)) => {
                    if let Some(kind) = classify(&event, file_name)
                        && mask.contains(kind)
                        && !debouncer.offer(kind, Instant::now())
                    {
                        debug!(path = %path.display(), %kind, "notification absorbed by debounce window");
                    }
                }
                Ok(Err(e)) => warn!(path = %path.display(), error = %e, "file watcher reported an error"),
                Err(_) => break,
            },

            default(wait) => {}
        }

        if let Some(kind) = debouncer.poll(Instant::now()) {
            fire(NAME, &mut callback, ChangeEvent::new(kind, path));
        }
    }
}

/// Map a raw notification to a change of the watched file, if it is one.
pub(crate) fn classify(event: &Event, file_name: &OsString) -> Option<ChangeKind> {
    let index = event
        .paths
        .iter()
        .position(|p| p.file_name() == Some(file_name.as_os_str()))?;

    match event.kind {
        EventKind::Create(_) => Some(ChangeKind::Created),
        EventKind::Remove(_) => Some(ChangeKind::Deleted),
        EventKind::Modify(ModifyKind::Name(RenameMode::From)) => Some(ChangeKind::Deleted),
        EventKind::Modify(ModifyKind::Name(RenameMode::To)) => Some(ChangeKind::Created),
        // paths are [from, to]
        EventKind::Modify(ModifyKind::Name(RenameMode::Both)) => Some(if index == 0 {
            ChangeKind::Deleted
        } else {
            ChangeKind::Created
        }),
        EventKind::Modify(_) => Some(ChangeKind::Modified),
        _ => None,
    }
}

fn running_in_container() -> bool {
    std::env::var_os("KUBERNETES_SERVICE_HOST").is_some() || Path::new("/.dockerenv").exists()
}
