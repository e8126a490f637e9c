//! Types shared by the reload manager and its callers.

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicU8, Ordering};

use crate::detect::ChangeEvent;
use crate::error::Error;

/// Lifecycle of a [`LiveConfig`](super::LiveConfig).
///
/// ```text
/// Uninitialized ──load──▶ Loaded ──register──▶ Watching ◀──┐
///       │                                         │        │ reload
///       ▼                                         ▼        │
///     Failed                                   Loaded ─────┘
///                                                 │
///                          stop (from any live state)
///                                                 ▼
///                                              Stopped
/// ```
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum ManagerState {
    /// Nothing has been read yet.
    Uninitialized = 0,
    /// An instance is populated. Also held while a reload is in flight.
    Loaded = 1,
    /// The detector is running and waiting for changes.
    Watching = 2,
    /// The initial load failed.
    Failed = 3,
    /// The detector and callback thread have been shut down.
    Stopped = 4,
}

impl ManagerState {
    const fn from_u8(raw: u8) -> Self {
        match raw {
            0 => Self::Uninitialized,
            1 => Self::Loaded,
            2 => Self::Watching,
            3 => Self::Failed,
            _ => Self::Stopped,
        }
    }
}

impl fmt::Display for ManagerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Uninitialized => "uninitialized",
            Self::Loaded => "loaded",
            Self::Watching => "watching",
            Self::Failed => "failed",
            Self::Stopped => "stopped",
        })
    }
}

/// Atomic cell holding a [`ManagerState`].
#[derive(Debug)]
pub(crate) struct StateCell(AtomicU8);

impl StateCell {
    pub(crate) const fn new(state: ManagerState) -> Self {
        Self(AtomicU8::new(state as u8))
    }

    pub(crate) fn get(&self) -> ManagerState {
        ManagerState::from_u8(self.0.load(Ordering::Acquire))
    }

    pub(crate) fn set(&self, state: ManagerState) {
        self.0.store(state as u8, Ordering::Release);
    }

    /// Store `state`, returning the previous one.
    pub(crate) fn replace(&self, state: ManagerState) -> ManagerState {
        ManagerState::from_u8(self.0.swap(state as u8, Ordering::AcqRel))
    }

    /// Move to `to` only if currently in `from`.
    pub(crate) fn transition(&self, from: ManagerState, to: ManagerState) -> bool {
        self.0
            .compare_exchange(from as u8, to as u8, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }
}

/// What started a reload attempt.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ReloadTrigger {
    /// A change detector reported an event.
    File(ChangeEvent),
    /// [`LiveConfig::reload`](super::LiveConfig::reload) was called.
    Manual,
}

impl fmt::Display for ReloadTrigger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::File(event) => event.fmt(f),
            Self::Manual => f.write_str("manual reload"),
        }
    }
}

/// Result of a reload attempt.
pub enum ReloadOutcome<T> {
    /// A fresh instance was populated and swapped in.
    Reloaded(Arc<T>),
    /// The attempt failed; the previous instance is still current.
    Failed(Arc<Error>),
}

impl<T> ReloadOutcome<T> {
    /// Returns `true` for [`ReloadOutcome::Reloaded`].
    #[must_use]
    pub const fn is_reloaded(&self) -> bool {
        matches!(self, Self::Reloaded(_))
    }

    /// The new instance, if the reload succeeded.
    #[must_use]
    pub const fn instance(&self) -> Option<&Arc<T>> {
        match self {
            Self::Reloaded(instance) => Some(instance),
            Self::Failed(_) => None,
        }
    }

    /// The error, if the reload failed.
    #[must_use]
    pub fn error(&self) -> Option<&Error> {
        match self {
            Self::Reloaded(_) => None,
            Self::Failed(error) => Some(error),
        }
    }
}

impl<T> Clone for ReloadOutcome<T> {
    fn clone(&self) -> Self {
        match self {
            Self::Reloaded(instance) => Self::Reloaded(Arc::clone(instance)),
            Self::Failed(error) => Self::Failed(Arc::clone(error)),
        }
    }
}

impl<T> fmt::Debug for ReloadOutcome<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Reloaded(_) => f.write_str("Reloaded"),
            Self::Failed(error) => f.debug_tuple("Failed").field(error).finish(),
        }
    }
}

/// Delivered to the reload callback after every attempt.
///
/// # Example
///
/// ```ignore
/// DynamicConfig::<AppConfig>::new("app.yml")
///     .on_reload(|event| match &event.outcome {
///         ReloadOutcome::Reloaded(cfg) => println!("now on port {}", cfg.port),
///         ReloadOutcome::Failed(err) => eprintln!("kept previous config: {err}"),
///     })
///     .load()?;
/// ```
pub struct ReloadEvent<T> {
    /// What caused the attempt.
    pub trigger: ReloadTrigger,

    /// How it went.
    pub outcome: ReloadOutcome<T>,

    /// Handle epoch after the attempt. Unchanged by failed attempts.
    pub epoch: u64,
}

impl<T> Clone for ReloadEvent<T> {
    fn clone(&self) -> Self {
        Self {
            trigger: self.trigger.clone(),
            outcome: self.outcome.clone(),
            epoch: self.epoch,
        }
    }
}

impl<T> fmt::Debug for ReloadEvent<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ReloadEvent")
            .field("trigger", &self.trigger)
            .field("outcome", &self.outcome)
            .field("epoch", &self.epoch)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_state_cell_transitions() {
        let cell = StateCell::new(ManagerState::Uninitialized);
        assert_eq!(cell.get(), ManagerState::Uninitialized);

        cell.set(ManagerState::Watching);
        assert!(cell.transition(ManagerState::Watching, ManagerState::Loaded));
        assert_eq!(cell.get(), ManagerState::Loaded);

        assert_eq!(cell.replace(ManagerState::Stopped), ManagerState::Loaded);
        assert!(!cell.transition(ManagerState::Loaded, ManagerState::Watching));
        assert_eq!(cell.get(), ManagerState::Stopped);
    }

    #[test]
    fn test_outcome_accessors() {
        let ok: ReloadOutcome<u32> = ReloadOutcome::Reloaded(Arc::new(7));
        assert!(ok.is_reloaded());
        assert_eq!(ok.instance().map(|v| **v), Some(7));
        assert!(ok.error().is_none());

        let failed: ReloadOutcome<u32> = ReloadOutcome::Failed(Arc::new(Error::Stopped));
        assert!(!failed.is_reloaded());
        assert!(matches!(failed.error(), Some(Error::Stopped)));
    }
}
