//! Builder for live configuration.
//!
//! [`DynamicConfig`] collects the path, format hint, detector choice and
//! callback, then [`load`](DynamicConfig::load) performs the initial load
//! and starts watching.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use crossbeam_channel::{bounded, unbounded};
use tracing::{debug, info};

use super::handle::LiveConfig;
use super::reloader::{Reloader, load_entity, spawn_callback_thread};
use super::types::{ManagerState, ReloadEvent, ReloadTrigger};
use crate::detect::{DetectorConfig, DetectorKind, EventMask, MIN_INTERVAL};
use crate::error::{Error, Result};
use crate::format::ConfigFormat;
use crate::schema::{ConfigEntity, EntitySchemaValidator};

/// Callback type for reload attempts.
pub type ReloadCallback<T> = Box<dyn FnMut(ReloadEvent<T>) + Send + 'static>;

/// Builder for a [`LiveConfig`].
///
/// Defaults:
/// - format [`ConfigFormat::Auto`]
/// - detector [`DetectorKind::Native`]
/// - interval one second
/// - events from [`DetectorKind::default_events`]
/// - no callback
///
/// # Example
///
/// ```ignore
/// let config = DynamicConfig::<ServerConfig>::new("server.yml")
///     .detector(DetectorKind::IntervalScan)
///     .interval(Duration::from_secs(5))
///     .on_reload(|event| {
///         if let Some(err) = event.outcome.error() {
///             eprintln!("reload failed: {err}");
///         }
///     })
///     .load()?;
///
/// println!("port = {}", config.get().port);
/// ```
pub struct DynamicConfig<T: ConfigEntity> {
    path: PathBuf,
    format: ConfigFormat,
    detector: DetectorKind,
    events: Option<EventMask>,
    interval: Duration,
    on_reload: Option<ReloadCallback<T>>,
}

impl<T: ConfigEntity> DynamicConfig<T> {
    /// Start configuring a live view of the file at `path`.
    #[must_use]
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            format: ConfigFormat::Auto,
            detector: DetectorKind::default(),
            events: None,
            interval: MIN_INTERVAL,
            on_reload: None,
        }
    }

    /// Set the format hint.
    ///
    /// An explicit format is trusted as is. [`ConfigFormat::Auto`] resolves
    /// the format from suffix and content at every load.
    #[must_use]
    pub const fn format(mut self, format: ConfigFormat) -> Self {
        self.format = format;
        self
    }

    /// Choose the change detection strategy.
    #[must_use]
    pub const fn detector(mut self, detector: DetectorKind) -> Self {
        self.detector = detector;
        self
    }

    /// Choose which change kinds trigger a reload.
    #[must_use]
    pub const fn events(mut self, events: EventMask) -> Self {
        self.events = Some(events);
        self
    }

    /// Set the scan interval, or the debounce window for native watching.
    ///
    /// Must be at least one second.
    #[must_use]
    pub const fn interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    /// Register a callback run after every reload attempt.
    ///
    /// The callback runs on a dedicated thread, never on the detector
    /// thread. Panics inside it are caught and logged.
    #[must_use]
    pub fn on_reload<F>(mut self, callback: F) -> Self
    where
        F: FnMut(ReloadEvent<T>) + Send + 'static,
    {
        self.on_reload = Some(Box::new(callback));
        self
    }

    /// Load the file and start watching it.
    ///
    /// Every failure here is synchronous and no handle is returned.
    ///
    /// # Errors
    ///
    /// - [`Error::Path`] if the file is missing or is a directory
    /// - [`Error::InvalidEntitySchema`] if `T` fails validation; the file is
    ///   not read in that case
    /// - any format resolution or population error for the initial content
    /// - [`Error::ListenerConfig`] if the detector rejects the interval or
    ///   event mask
    /// - [`Error::WatchInit`] if the watcher or a worker thread cannot start
    pub fn load(self) -> Result<LiveConfig<T>> {
        let Self {
            path,
            format: hint,
            detector,
            events,
            interval,
            on_reload,
        } = self;

        let result = start(path, hint, detector, events, interval, on_reload);
        if let Err(e) = &result {
            debug!(state = %ManagerState::Failed, error = %e, "initial load failed");
        }
        result
    }
}

fn start<T: ConfigEntity>(
    path: PathBuf,
    hint: ConfigFormat,
    kind: DetectorKind,
    events: Option<EventMask>,
    interval: Duration,
    on_reload: Option<ReloadCallback<T>>,
) -> Result<LiveConfig<T>> {
    if !path.exists() || path.is_dir() {
        return Err(Error::path(&path));
    }

    let schema = EntitySchemaValidator::validate::<T>()?;
    let (initial, format) = load_entity::<T>(&path, hint, &schema)?;

    let mask = events.unwrap_or_else(|| kind.default_events());
    let detector = kind.create(
        DetectorConfig::new(&path)
            .mask(mask)
            .interval(interval),
    )?;
    let watched = detector.config().path.clone();

    let (events_tx, events_rx) = match on_reload {
        Some(_) => {
            let (tx, rx) = unbounded();
            (Some(tx), Some(rx))
        }
        None => (None, None),
    };

    let reloader = Arc::new(Reloader::new(
        initial,
        format,
        schema,
        watched.clone(),
        hint,
        events_tx,
    ));

    let detector_reloader = Arc::clone(&reloader);
    let guard = detector.register(Box::new(move |event| {
        detector_reloader.reload(ReloadTrigger::File(event));
    }))?;

    let callback = match (on_reload, events_rx) {
        (Some(callback), Some(events_rx)) => {
            let (stop_tx, stop_rx) = bounded(1);
            let thread = spawn_callback_thread(&watched, events_rx, stop_rx, callback)?;
            Some((stop_tx, thread))
        }
        _ => None,
    };

    reloader.state.set(ManagerState::Watching);
    info!(
        path = %watched.display(),
        %format,
        detector = guard.name(),
        "live configuration loaded"
    );

    Ok(LiveConfig::new(reloader, guard, callback))
}

impl<T: ConfigEntity> std::fmt::Debug for DynamicConfig<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DynamicConfig")
            .field("path", &self.path)
            .field("format", &self.format)
            .field("detector", &self.detector)
            .field("events", &self.events)
            .field("interval", &self.interval)
            .field("on_reload", &self.on_reload.is_some())
            .finish()
    }
}
