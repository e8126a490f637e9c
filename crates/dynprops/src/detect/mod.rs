//! Change detection for watched configuration files.
//!
//! A [`ChangeDetector`] watches one file and reports [`ChangeEvent`]s to a
//! callback from its own worker thread. Three strategies are available:
//!
//! | Detector | Mechanism | Supported events |
//! |----------|-----------|------------------|
//! | [`NativeWatchDetector`] | OS notifications via `notify`, debounced | Created, Modified, Deleted |
//! | [`IntervalScanDetector`] | `stat` every interval | Created, Modified, Deleted |
//! | [`HashPollingDetector`] | SHA-256 of the content every interval | Modified |
//!
//! Registration returns a [`DetectorGuard`]; stopping or dropping the guard
//! terminates the worker.
//!
//! ```rust,ignore
//! use dynprops::detect::{ChangeDetector, DetectorConfig, EventMask, IntervalScanDetector};
//! use std::time::Duration;
//!
//! let config = DetectorConfig::new("app.properties")
//!     .mask(EventMask::MODIFIED | EventMask::DELETED)
//!     .interval(Duration::from_secs(2));
//!
//! let guard = Box::new(IntervalScanDetector::new(config)?)
//!     .register(Box::new(|event| println!("{event}")))?;
//!
//! // ...
//! guard.stop();
//! ```

mod debounce;
mod hash;
mod native;
mod scan;

use std::fmt;
use std::ops::{BitOr, BitOrAssign};
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use chrono::{DateTime, Utc};
use crossbeam_channel::{Receiver, Sender, bounded};
use parking_lot::Mutex;
use tracing::{error, info};

use crate::error::{Error, Result};

pub use debounce::Debouncer;
pub use hash::HashPollingDetector;
pub use native::NativeWatchDetector;
pub use scan::IntervalScanDetector;

/// Shortest accepted scan / debounce interval.
pub const MIN_INTERVAL: Duration = Duration::from_millis(1000);

/// Kind of filesystem change.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ChangeKind {
    /// The file appeared.
    Created,
    /// The file content or metadata changed.
    Modified,
    /// The file disappeared.
    Deleted,
}

impl fmt::Display for ChangeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Created => "created",
            Self::Modified => "modified",
            Self::Deleted => "deleted",
        })
    }
}

/// A set of [`ChangeKind`]s a detector should report.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct EventMask(u8);

impl EventMask {
    /// No events.
    pub const NONE: Self = Self(0);
    /// File creation.
    pub const CREATED: Self = Self(2);
    /// File deletion.
    pub const DELETED: Self = Self(4);
    /// File modification.
    pub const MODIFIED: Self = Self(8);
    /// Every event kind.
    pub const ALL: Self = Self(2 | 4 | 8);

    /// Mask containing exactly one kind.
    #[must_use]
    pub const fn of(kind: ChangeKind) -> Self {
        match kind {
            ChangeKind::Created => Self::CREATED,
            ChangeKind::Modified => Self::MODIFIED,
            ChangeKind::Deleted => Self::DELETED,
        }
    }

    /// Returns `true` if `kind` is in the mask.
    #[must_use]
    pub const fn contains(&self, kind: ChangeKind) -> bool {
        self.0 & Self::of(kind).0 != 0
    }

    /// Returns `true` if every kind in `other` is also in `self`.
    #[must_use]
    pub const fn includes(&self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }

    /// Returns `true` if no kind is selected.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.0 == 0
    }
}

impl BitOr for EventMask {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        Self(self.0 | rhs.0)
    }
}

impl BitOrAssign for EventMask {
    fn bitor_assign(&mut self, rhs: Self) {
        self.0 |= rhs.0;
    }
}

impl From<ChangeKind> for EventMask {
    fn from(kind: ChangeKind) -> Self {
        Self::of(kind)
    }
}

impl fmt::Debug for EventMask {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let kinds: Vec<_> = [ChangeKind::Created, ChangeKind::Modified, ChangeKind::Deleted]
            .into_iter()
            .filter(|k| self.contains(*k))
            .collect();
        f.debug_tuple("EventMask").field(&kinds).finish()
    }
}

/// A change observed on a watched file.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ChangeEvent {
    /// What happened.
    pub kind: ChangeKind,

    /// Absolute path of the watched file.
    pub path: PathBuf,

    /// When the change was reported.
    pub timestamp: DateTime<Utc>,
}

impl ChangeEvent {
    /// Create an event stamped with the current time.
    pub fn new(kind: ChangeKind, path: impl Into<PathBuf>) -> Self {
        Self {
            kind,
            path: path.into(),
            timestamp: Utc::now(),
        }
    }
}

impl fmt::Display for ChangeEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "file {}: {}", self.kind, self.path.display())
    }
}

/// What to watch and how often.
#[derive(Clone, Debug)]
pub struct DetectorConfig {
    /// The watched file.
    pub path: PathBuf,

    /// Event kinds to report.
    pub mask: EventMask,

    /// Scan period, or debounce window for native watching.
    pub interval: Duration,
}

impl DetectorConfig {
    /// Watch `path` for modifications every [`MIN_INTERVAL`].
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            mask: EventMask::MODIFIED,
            interval: MIN_INTERVAL,
        }
    }

    /// Set the reported event kinds.
    #[must_use]
    pub const fn mask(mut self, mask: EventMask) -> Self {
        self.mask = mask;
        self
    }

    /// Set the scan / debounce interval.
    #[must_use]
    pub const fn interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    /// Check the configuration against what a detector supports and
    /// make the watched path absolute without resolving symlinks.
    pub(crate) fn validate(mut self, detector: &str, supported: EventMask) -> Result<Self> {
        if self.interval < MIN_INTERVAL {
            return Err(Error::listener_config(
                format!(
                    "interval of {}ms is below the {}ms minimum",
                    self.interval.as_millis(),
                    MIN_INTERVAL.as_millis()
                ),
                "use an interval of at least one second",
            ));
        }

        if self.mask.is_empty() {
            return Err(Error::listener_config(
                "event mask selects no events",
                "select at least one of CREATED, MODIFIED or DELETED",
            ));
        }

        if !supported.includes(self.mask) {
            return Err(Error::listener_config(
                format!("{detector} does not support event mask {:?}", self.mask),
                format!("{detector} supports {supported:?}"),
            ));
        }

        if !self.path.exists() || self.path.is_dir() {
            return Err(Error::path(&self.path));
        }

        // Symlinks stay unresolved so a repointed link is followed on reload
        self.path = std::path::absolute(&self.path).map_err(|e| Error::read(&self.path, e))?;

        Ok(self)
    }
}

/// Callback receiving change events on the detector's worker thread.
pub type EventCallback = Box<dyn FnMut(ChangeEvent) + Send + 'static>;

/// A file change detection strategy.
pub trait ChangeDetector: Send {
    /// Short strategy name for logs.
    fn name(&self) -> &'static str;

    /// The validated configuration.
    fn config(&self) -> &DetectorConfig;

    /// Start the worker thread and deliver events to `callback` until the
    /// returned guard is stopped or dropped.
    ///
    /// # Errors
    ///
    /// Returns [`Error::WatchInit`] if the OS watcher or the worker thread
    /// cannot be started.
    fn register(self: Box<Self>, callback: EventCallback) -> Result<DetectorGuard>;
}

/// Selects a [`ChangeDetector`] implementation.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum DetectorKind {
    /// [`NativeWatchDetector`]
    #[default]
    Native,

    /// [`IntervalScanDetector`]
    IntervalScan,

    /// [`HashPollingDetector`]
    HashPolling,
}

impl DetectorKind {
    /// Events this strategy can report.
    #[must_use]
    pub const fn supported_events(&self) -> EventMask {
        match self {
            Self::Native | Self::IntervalScan => EventMask::ALL,
            Self::HashPolling => EventMask::MODIFIED,
        }
    }

    /// Mask used when the caller does not choose one.
    #[must_use]
    pub fn default_events(&self) -> EventMask {
        match self {
            Self::Native | Self::IntervalScan => EventMask::MODIFIED | EventMask::CREATED,
            Self::HashPolling => EventMask::MODIFIED,
        }
    }

    /// Construct the detector for `config`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ListenerConfig`] or [`Error::Path`] if the
    /// configuration is rejected.
    pub fn create(&self, config: DetectorConfig) -> Result<Box<dyn ChangeDetector>> {
        Ok(match self {
            Self::Native => Box::new(NativeWatchDetector::new(config)?),
            Self::IntervalScan => Box::new(IntervalScanDetector::new(config)?),
            Self::HashPolling => Box::new(HashPollingDetector::new(config)?),
        })
    }
}

/// Controls a running detector worker.
///
/// [`stop`](Self::stop) is idempotent; dropping the guard stops the worker.
pub struct DetectorGuard {
    name: &'static str,
    path: PathBuf,
    running: Arc<AtomicBool>,
    stop_tx: Sender<()>,
    thread: Mutex<Option<JoinHandle<()>>>,
}

impl DetectorGuard {
    /// Spawn a named worker thread running `worker`.
    ///
    /// The worker receives a stop channel that yields (or disconnects) when
    /// the guard is stopped.
    pub(crate) fn spawn<F>(name: &'static str, path: &Path, worker: F) -> Result<Self>
    where
        F: FnOnce(Receiver<()>) + Send + 'static,
    {
        let (stop_tx, stop_rx) = bounded::<()>(1);
        let running = Arc::new(AtomicBool::new(true));
        let thread_running = Arc::clone(&running);

        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();

        let thread = thread::Builder::new()
            .name(format!("dynprops-{name}:{file_name}"))
            .spawn(move || {
                worker(stop_rx);
                thread_running.store(false, Ordering::Release);
            })
            .map_err(|e| Error::watch_init(format!("failed to spawn {name} worker: {e}"), None))?;

        info!(detector = name, path = %path.display(), "change detector started");

        Ok(Self {
            name,
            path: path.to_path_buf(),
            running,
            stop_tx,
            thread: Mutex::new(Some(thread)),
        })
    }

    /// Stop the worker and wait for it to exit.
    ///
    /// When called from the worker thread itself the join is skipped.
    pub fn stop(&self) {
        let _ = self.stop_tx.try_send(());

        let Some(handle) = self.thread.lock().take() else {
            return;
        };

        if handle.thread().id() == thread::current().id() {
            return;
        }

        if handle.join().is_err() {
            error!(detector = self.name, "change detector worker panicked");
        }
        self.running.store(false, Ordering::Release);
        info!(detector = self.name, path = %self.path.display(), "change detector stopped");
    }

    /// Returns `true` while the worker thread is alive.
    #[must_use]
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    /// Strategy name of the guarded detector.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        self.name
    }
}

impl Drop for DetectorGuard {
    fn drop(&mut self) {
        self.stop();
    }
}

impl fmt::Debug for DetectorGuard {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DetectorGuard")
            .field("name", &self.name)
            .field("path", &self.path)
            .field("running", &self.is_running())
            .finish()
    }
}

/// Invoke a detector callback, containing panics.
pub(crate) fn fire(detector: &'static str, callback: &mut EventCallback, event: ChangeEvent) {
    if catch_unwind(AssertUnwindSafe(|| callback(event))).is_err() {
        error!(detector, "change callback panicked");
    }
}
