//! Live configuration: initial load, watching and reload.
//!
//! # Overview
//!
//! [`DynamicConfig`] validates the entity type, resolves the format,
//! populates the first instance and registers a change detector.
//! The resulting [`LiveConfig`] hands out the current instance while a
//! background worker repopulates it whenever the file changes.
//!
//! # Reload semantics
//!
//! - Reload attempts are serialized; at most one is in flight per file.
//! - A failed attempt is logged and the previous instance stays current.
//! - The reload callback sees every attempt, successful or not, as a
//!   [`ReloadEvent`], on its own thread.
//!
//! # Example
//!
//! ```rust,ignore
//! use dynprops::{DynamicConfig, DetectorKind, ReloadOutcome};
//!
//! let config = DynamicConfig::<AppConfig>::new("app.yml")
//!     .detector(DetectorKind::IntervalScan)
//!     .on_reload(|event| {
//!         if let ReloadOutcome::Failed(err) = &event.outcome {
//!             eprintln!("{err}");
//!         }
//!     })
//!     .load()?;
//!
//! loop {
//!     let current = config.get();
//!     serve(&current);
//! }
//! ```

mod builder;
mod handle;
mod reloader;
mod types;

pub use builder::{DynamicConfig, ReloadCallback};
pub use handle::LiveConfig;
pub use types::{ManagerState, ReloadEvent, ReloadOutcome, ReloadTrigger};
