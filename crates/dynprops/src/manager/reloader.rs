//! Reload engine shared by the detector thread and manual reloads.
//!
//! The [`Reloader`] owns the live handle and everything needed to
//! repopulate it. Detector callbacks and [`LiveConfig::reload`] both end up
//! in [`Reloader::reload`], which serializes attempts, swaps on success and
//! queues a [`ReloadEvent`] for the callback thread.
//!
//! [`LiveConfig::reload`]: super::LiveConfig::reload

use std::panic::{AssertUnwindSafe, catch_unwind};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use crossbeam_channel::{Receiver, Sender, select};
use parking_lot::{Mutex, RwLock};
use tracing::{error, info};

use super::builder::ReloadCallback;
use super::types::{ManagerState, ReloadEvent, ReloadOutcome, ReloadTrigger, StateCell};
use crate::error::{Error, Result};
use crate::format::{ConfigFormat, FormatResolver, read_config_file};
use crate::live::LiveHandle;
use crate::populate::EntityPopulator;
use crate::schema::{ConfigEntity, EntitySchema};

/// Read `path` and populate a fresh entity.
///
/// An unresolved `hint` is resolved against the content on every call, so a
/// file may change format between reloads.
pub(crate) fn load_entity<T: ConfigEntity>(
    path: &Path,
    hint: ConfigFormat,
    schema: &EntitySchema,
) -> Result<(T, ConfigFormat)> {
    let bytes = read_config_file(path)?;
    let format = if hint.is_resolved() {
        hint
    } else {
        FormatResolver::resolve_bytes(path, &bytes)?
    };
    let entity = EntityPopulator::populate(schema, format, &bytes)?;
    Ok((entity, format))
}

pub(crate) struct Reloader<T> {
    pub(crate) handle: LiveHandle<T>,
    pub(crate) state: StateCell,
    schema: Arc<EntitySchema>,
    path: PathBuf,
    hint: ConfigFormat,
    format: RwLock<ConfigFormat>,
    /// Held for the whole read-populate-swap sequence.
    in_flight: Mutex<()>,
    events_tx: Option<Sender<ReloadEvent<T>>>,
}

impl<T: ConfigEntity> Reloader<T> {
    pub(crate) fn new(
        initial: T,
        format: ConfigFormat,
        schema: Arc<EntitySchema>,
        path: PathBuf,
        hint: ConfigFormat,
        events_tx: Option<Sender<ReloadEvent<T>>>,
    ) -> Self {
        Self {
            handle: LiveHandle::new(initial),
            state: StateCell::new(ManagerState::Loaded),
            schema,
            path,
            hint,
            format: RwLock::new(format),
            in_flight: Mutex::new(()),
            events_tx,
        }
    }

    pub(crate) fn path(&self) -> &Path {
        &self.path
    }

    pub(crate) fn format(&self) -> ConfigFormat {
        *self.format.read()
    }

    /// Attempt one reload. The previous instance stays current on failure.
    pub(crate) fn reload(&self, trigger: ReloadTrigger) -> ReloadOutcome<T> {
        let _in_flight = self.in_flight.lock();
        self.state
            .transition(ManagerState::Watching, ManagerState::Loaded);

        let outcome = match load_entity::<T>(&self.path, self.hint, &self.schema) {
            Ok((entity, format)) => {
                let instance = Arc::new(entity);
                self.handle.swap_arc(Arc::clone(&instance));
                *self.format.write() = format;
                info!(
                    path = %self.path.display(),
                    %format,
                    epoch = self.handle.epoch(),
                    %trigger,
                    "configuration reloaded"
                );
                ReloadOutcome::Reloaded(instance)
            }
            Err(e) => {
                error!(
                    path = %self.path.display(),
                    error = %e,
                    %trigger,
                    "configuration reload failed, keeping previous instance"
                );
                ReloadOutcome::Failed(Arc::new(e))
            }
        };

        self.state
            .transition(ManagerState::Loaded, ManagerState::Watching);

        if let Some(tx) = &self.events_tx {
            let _ = tx.send(ReloadEvent {
                trigger,
                outcome: outcome.clone(),
                epoch: self.handle.epoch(),
            });
        }

        outcome
    }
}

/// Start the thread that hands reload events to the user callback.
pub(crate) fn spawn_callback_thread<T: Send + Sync + 'static>(
    path: &Path,
    events_rx: Receiver<ReloadEvent<T>>,
    stop_rx: Receiver<()>,
    callback: ReloadCallback<T>,
) -> Result<JoinHandle<()>> {
    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();

    thread::Builder::new()
        .name(format!("dynprops-callbacks:{file_name}"))
        .spawn(move || callback_loop(&events_rx, &stop_rx, callback))
        .map_err(|e| Error::watch_init(format!("failed to spawn callback thread: {e}"), None))
}

fn callback_loop<T>(
    events_rx: &Receiver<ReloadEvent<T>>,
    stop_rx: &Receiver<()>,
    mut callback: ReloadCallback<T>,
) {
    loop {
        select! {
            recv(events_rx) -> event => match event {
                Ok(event) => dispatch(&mut callback, event),
                Err(_) => break,
            },

            recv(stop_rx) -> _ => {
                // Deliver attempts that finished before the stop
                for event in events_rx.try_iter() {
                    dispatch(&mut callback, event);
                }
                break;
            }
        }
    }
}

fn dispatch<T>(callback: &mut ReloadCallback<T>, event: ReloadEvent<T>) {
    if catch_unwind(AssertUnwindSafe(|| callback(event))).is_err() {
        error!("reload callback panicked");
    }
}
