//! # dynprops
//!
//! Typed configuration files that stay in sync with disk.
//!
//! `dynprops` loads a `.properties`, YAML or JSON file into a strongly typed
//! entity and keeps that entity current: when the file changes, a fresh
//! instance is populated and swapped in atomically, while callers keep
//! using the same [`LiveConfig`] handle.
//!
//! ## Features
//!
//! - **Format sniffing** - Suffix hint checked against content, or content
//!   alone when the suffix says nothing
//! - **Tolerant properties** - Unconvertible values are skipped and the
//!   field keeps its default
//! - **Strict structure** - YAML and JSON go through `serde`, errors carry
//!   the failing field path
//! - **Lock-free reads** - Readers never block and never see a partly
//!   populated instance
//! - **Three detectors** - OS notifications, metadata scans, or content
//!   hashing
//! - **Rich diagnostics** - Errors render through [`miette`]
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use dynprops::{ConfigEntity, DynamicConfig, FieldValue, ScalarType, SchemaTable};
//! use serde::Deserialize;
//!
//! #[derive(Default, Deserialize)]
//! struct Server {
//!     host: String,
//!     port: i32,
//! }
//!
//! impl ConfigEntity for Server {
//!     fn schema_table() -> SchemaTable {
//!         SchemaTable::builder()
//!             .field("host", "server.host", ScalarType::String)
//!             .field("port", "server.port", ScalarType::Int)
//!             .read_write(["host", "port"])
//!             .build()
//!     }
//!
//!     fn instantiate() -> Option<Self> {
//!         Some(Self::default())
//!     }
//!
//!     fn read_field(&self, field: &str) -> Option<FieldValue> {
//!         match field {
//!             "host" => Some(FieldValue::String(self.host.clone())),
//!             "port" => Some(FieldValue::Int(self.port)),
//!             _ => None,
//!         }
//!     }
//!
//!     fn write_field(&mut self, field: &str, value: FieldValue) -> bool {
//!         match (field, value) {
//!             ("host", FieldValue::String(v)) => self.host = v,
//!             ("port", FieldValue::Int(v)) => self.port = v,
//!             _ => return false,
//!         }
//!         true
//!     }
//! }
//!
//! fn main() -> Result<(), dynprops::Error> {
//!     let config = DynamicConfig::<Server>::new("server.properties").load()?;
//!     println!("listening on {}:{}", config.get().host, config.get().port);
//!     Ok(())
//! }
//! ```
//!
//! ## Detectors
//!
//! | Kind | Mechanism | Events |
//! |------|-----------|--------|
//! | [`DetectorKind::Native`] | `notify`, debounced | created, modified, deleted |
//! | [`DetectorKind::IntervalScan`] | `stat` every interval | created, modified, deleted |
//! | [`DetectorKind::HashPolling`] | SHA-256 every interval | modified |
//!
//! ## Error Handling
//!
//! All errors are reported through the [`Error`] type:
//!
//! ```rust,ignore
//! match DynamicConfig::<Server>::new("server.yml").load() {
//!     Ok(config) => { /* use config */ }
//!     Err(e) => eprintln!("{:?}", miette::Report::from(e)),
//! }
//! ```
//!
//! The library emits [`tracing`](https://docs.rs/tracing) events and never
//! installs a subscriber.

#![deny(missing_docs)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]

/// Re-export miette for error handling.
pub use miette;

mod error;
pub use error::{Error, FoundFormat, PropertyConversionError, Result};

mod format;
pub use format::{ConfigFormat, FormatResolver};

mod schema;
pub use schema::{
    ConfigEntity, DATE_PATTERN, EntitySchema, EntitySchemaValidator, FieldAccessor, FieldMapping,
    FieldValue, ScalarType, SchemaBuilder, SchemaTable,
};

mod populate;
pub use populate::EntityPopulator;

pub mod properties;

mod live;
pub use live::LiveHandle;

pub mod detect;
pub use detect::{ChangeEvent, ChangeKind, DetectorKind, EventMask};

mod manager;
pub use manager::{
    DynamicConfig, LiveConfig, ManagerState, ReloadCallback, ReloadEvent, ReloadOutcome,
    ReloadTrigger,
};
