//! User-facing handle for live configuration.

use std::path::Path;
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use crossbeam_channel::Sender;
use parking_lot::Mutex;
use tracing::{error, info};

use super::reloader::Reloader;
use super::types::{ManagerState, ReloadOutcome, ReloadTrigger};
use crate::detect::DetectorGuard;
use crate::error::{Error, Result};
use crate::format::ConfigFormat;
use crate::live::LiveHandle;
use crate::schema::{ConfigEntity, FieldValue};

/// A configuration entity kept in sync with its file.
///
/// The handle is cheaply cloneable; all clones share the same instance,
/// detector and callback thread. Dropping the last clone stops watching.
///
/// # Example
///
/// ```ignore
/// let config = DynamicConfig::<AppConfig>::new("app.properties").load()?;
///
/// // Snapshot; stays valid across reloads
/// let snapshot = config.get();
///
/// // Field access through the entity's read interface
/// let name = config.read_field("name");
///
/// // Force a reload now
/// config.reload()?;
///
/// config.stop();
/// // Last instance is still readable
/// let last = config.get();
/// ```
pub struct LiveConfig<T: ConfigEntity> {
    inner: Arc<Inner<T>>,
}

struct Inner<T: ConfigEntity> {
    reloader: Arc<Reloader<T>>,
    guard: DetectorGuard,
    callback_stop: Option<Sender<()>>,
    callback_thread: Mutex<Option<JoinHandle<()>>>,
}

impl<T: ConfigEntity> LiveConfig<T> {
    pub(crate) fn new(
        reloader: Arc<Reloader<T>>,
        guard: DetectorGuard,
        callback: Option<(Sender<()>, JoinHandle<()>)>,
    ) -> Self {
        let (callback_stop, callback_thread) = match callback {
            Some((stop, thread)) => (Some(stop), Some(thread)),
            None => (None, None),
        };

        Self {
            inner: Arc::new(Inner {
                reloader,
                guard,
                callback_stop,
                callback_thread: Mutex::new(callback_thread),
            }),
        }
    }

    /// The current instance. Never blocks and never returns a partially
    /// populated instance.
    #[must_use]
    pub fn get(&self) -> Arc<T> {
        self.inner.reloader.handle.current()
    }

    /// Read the current instance via a closure.
    ///
    /// ```ignore
    /// let port = config.read(|cfg| cfg.port);
    /// ```
    pub fn read<R, F>(&self, f: F) -> R
    where
        F: FnOnce(&T) -> R,
    {
        self.inner.reloader.handle.read(f)
    }

    /// Read a field from whichever instance is current at call time.
    #[must_use]
    pub fn read_field(&self, field: &str) -> Option<FieldValue> {
        self.inner.reloader.handle.read_field(field)
    }

    /// The underlying swappable handle.
    #[must_use]
    pub fn handle(&self) -> &LiveHandle<T> {
        &self.inner.reloader.handle
    }

    /// Number of successful reloads so far.
    #[must_use]
    pub fn epoch(&self) -> u64 {
        self.inner.reloader.handle.epoch()
    }

    /// Returns `true` if a reload succeeded after `epoch` was observed.
    #[must_use]
    pub fn has_changed_since(&self, epoch: u64) -> bool {
        self.inner.reloader.handle.has_changed_since(epoch)
    }

    /// Format of the content currently loaded.
    #[must_use]
    pub fn format(&self) -> ConfigFormat {
        self.inner.reloader.format()
    }

    /// Absolute path of the watched file.
    #[must_use]
    pub fn path(&self) -> &Path {
        self.inner.reloader.path()
    }

    /// Current lifecycle state.
    #[must_use]
    pub fn state(&self) -> ManagerState {
        self.inner.reloader.state.get()
    }

    /// Reload now, bypassing the detector.
    ///
    /// Runs on the calling thread, serialized with detector-triggered
    /// reloads. The callback also receives the attempt.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Stopped`] after [`stop`](Self::stop). A failed
    /// attempt is not an error here; it is reported as
    /// [`ReloadOutcome::Failed`].
    pub fn reload(&self) -> Result<ReloadOutcome<T>> {
        if self.state() == ManagerState::Stopped {
            return Err(Error::Stopped);
        }
        Ok(self.inner.reloader.reload(ReloadTrigger::Manual))
    }

    /// Stop the detector and the callback thread.
    ///
    /// Idempotent. The last instance stays readable.
    pub fn stop(&self) {
        self.inner.stop();
    }

    /// Returns `true` until [`stop`](Self::stop) is called or the detector
    /// worker exits.
    #[must_use]
    pub fn is_running(&self) -> bool {
        self.state() != ManagerState::Stopped && self.inner.guard.is_running()
    }
}

impl<T: ConfigEntity> Inner<T> {
    fn stop(&self) {
        if self.reloader.state.replace(ManagerState::Stopped) == ManagerState::Stopped {
            return;
        }

        self.guard.stop();

        if let Some(stop) = &self.callback_stop {
            let _ = stop.try_send(());
        }
        if let Some(thread) = self.callback_thread.lock().take()
            && thread.thread().id() != thread::current().id()
            && thread.join().is_err()
        {
            error!("callback thread panicked");
        }

        info!(path = %self.reloader.path().display(), "live configuration stopped");
    }
}

impl<T: ConfigEntity> Drop for Inner<T> {
    fn drop(&mut self) {
        self.stop();
    }
}

impl<T: ConfigEntity> Clone for LiveConfig<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

// Manual Debug impl to avoid T: Debug bound
impl<T: ConfigEntity> std::fmt::Debug for LiveConfig<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LiveConfig")
            .field("path", &self.path())
            .field("format", &self.format())
            .field("state", &self.state())
            .field("epoch", &self.epoch())
            .field("detector", &self.inner.guard)
            .finish()
    }
}
