//! Error types for loading and watching configuration files.
//!
//! Every fallible operation in this crate reports through [`Error`], which
//! integrates with [`miette`] for rich terminal diagnostics.
//!
//! # Error Variants
//!
//! | Variant | When It Occurs |
//! |---------|----------------|
//! | [`Error::Path`] | Path is missing or is a directory |
//! | [`Error::Read`] | File could not be read or is not UTF-8 |
//! | [`Error::FormatMismatch`] | Suffix and content disagree |
//! | [`Error::AmbiguousFormat`] | No format could be derived |
//! | [`Error::UnsupportedFormat`] | Population asked for `Auto` |
//! | [`Error::InvalidEntitySchema`] | Entity type cannot be live-proxied |
//! | [`Error::StructuralParse`] | YAML/JSON content is malformed |
//! | [`Error::PropertiesSyntax`] | Properties content has a bad escape or is not UTF-8 |
//! | [`Error::ListenerConfig`] | Change detector configuration rejected |
//! | [`Error::WatchInit`] | Watcher or worker thread failed to start |
//! | [`Error::Stopped`] | Handle was used after `stop()` |
//!
//! # Propagation
//!
//! Errors raised while building a [`LiveConfig`](crate::LiveConfig) are
//! returned synchronously and no handle is produced. Errors raised by a
//! background reload never reach the caller's stack; they are logged and
//! delivered to the reload callback as
//! [`ReloadOutcome::Failed`](crate::ReloadOutcome::Failed).
//!
//! Per-field conversion failures while populating from a properties file are
//! reported as [`PropertyConversionError`], which is never propagated.

use std::path::PathBuf;

use miette::Diagnostic;
use thiserror::Error as ThisError;

use crate::format::ConfigFormat;

/// Errors produced while resolving, populating, or watching a configuration file.
#[derive(Debug, ThisError, Diagnostic)]
#[non_exhaustive]
pub enum Error {
    /// The configuration path does not exist or is a directory.
    #[error("file path does not exist or is a directory: {}", .path.display())]
    #[diagnostic(
        code(dynprops::path),
        help("point the loader at an existing regular file")
    )]
    Path {
        /// The offending path.
        path: PathBuf,
    },

    /// The configuration file could not be read.
    #[error("failed to read configuration file {}: {message}", .path.display())]
    #[diagnostic(
        code(dynprops::read),
        help("check file permissions and make sure the file is UTF-8 encoded")
    )]
    Read {
        /// The file being read.
        path: PathBuf,

        /// Human-readable description of the failure.
        message: String,

        /// The underlying I/O error, if any.
        #[source]
        source: Option<std::io::Error>,
    },

    /// The file suffix names one format but the content parses as another.
    #[error(
        "the content of {} does not match its suffix: suffix says {expected}, content says {found}",
        .path.display()
    )]
    #[diagnostic(
        code(dynprops::format_mismatch),
        help("fix the syntax error in the file, or rename it to match its content")
    )]
    FormatMismatch {
        /// The file whose suffix and content disagree.
        path: PathBuf,

        /// Format implied by the suffix.
        expected: ConfigFormat,

        /// Format implied by the content.
        found: FoundFormat,
    },

    /// No suffix hint and no codec accepted the content.
    #[error("unable to derive a configuration format for {}", .path.display())]
    #[diagnostic(
        code(dynprops::ambiguous_format),
        help("use a .properties, .yml, .yaml or .json suffix, or pass an explicit format")
    )]
    AmbiguousFormat {
        /// The file whose format could not be derived.
        path: PathBuf,
    },

    /// Population was requested for a format outside the supported set.
    #[error("unsupported configuration format: {format}")]
    #[diagnostic(
        code(dynprops::unsupported_format),
        help("resolve the format before populating; Auto is only a request-time hint")
    )]
    UnsupportedFormat {
        /// The rejected format.
        format: ConfigFormat,
    },

    /// The target type cannot be populated and live-proxied.
    #[error("entity type {type_name} cannot be proxied: {reason}")]
    #[diagnostic(
        code(dynprops::invalid_entity_schema),
        help("the type must be instantiable and expose read and write accessors for every mapped field")
    )]
    InvalidEntitySchema {
        /// Rust type name of the entity.
        type_name: &'static str,

        /// Why validation failed.
        reason: String,
    },

    /// YAML or JSON content failed to decode into the entity.
    #[error("{format} parse error{}: {message}", at_path(.field_path))]
    #[diagnostic(
        code(dynprops::structural_parse),
        help("check the file syntax and that every value matches the entity's field types")
    )]
    StructuralParse {
        /// The codec that failed.
        format: ConfigFormat,

        /// Dotted path to the offending field, when the codec reported one.
        field_path: Option<String>,

        /// Codec error message.
        message: String,
    },

    /// Properties content is syntactically invalid.
    #[error("properties syntax error on line {line}: {message}")]
    #[diagnostic(
        code(dynprops::properties_syntax),
        help("save the file as UTF-8; \\u escapes need exactly four hexadecimal digits")
    )]
    PropertiesSyntax {
        /// 1-based line where the problem starts.
        line: usize,

        /// What went wrong.
        message: String,
    },

    /// The change detector configuration is invalid.
    #[error("invalid change detector configuration: {message}")]
    #[diagnostic(code(dynprops::listener_config))]
    ListenerConfig {
        /// What was rejected.
        message: String,

        /// Suggestion for how to fix it.
        #[help]
        help: String,
    },

    /// The OS watcher or a worker thread could not be started.
    #[error("failed to start file watcher: {message}")]
    #[diagnostic(
        code(dynprops::watch_init),
        help("check inotify/kqueue limits, or fall back to the interval scan detector")
    )]
    WatchInit {
        /// Human-readable error message.
        message: String,

        /// The underlying notify error, if available.
        #[source]
        source: Option<notify::Error>,
    },

    /// The live configuration has been stopped.
    #[error("configuration watcher has been stopped")]
    #[diagnostic(
        code(dynprops::stopped),
        help("load a new LiveConfig to resume watching")
    )]
    Stopped,
}

/// Content hint reported by [`Error::FormatMismatch`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FoundFormat {
    /// A codec accepted the content.
    Format(ConfigFormat),

    /// No codec accepted the content.
    Nothing,
}

impl std::fmt::Display for FoundFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Format(format) => write!(f, "{format}"),
            Self::Nothing => f.write_str("no known format"),
        }
    }
}

fn at_path(field_path: &Option<String>) -> String {
    match field_path {
        Some(p) if !p.is_empty() && p != "." => format!(" at `{p}`"),
        _ => String::new(),
    }
}

impl Error {
    /// Create a new [`Error::Path`].
    pub fn path(path: impl Into<PathBuf>) -> Self {
        Self::Path { path: path.into() }
    }

    /// Create a new [`Error::Read`] from an I/O error.
    pub fn read(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Read {
            path: path.into(),
            message: source.to_string(),
            source: Some(source),
        }
    }

    /// Create a new [`Error::InvalidEntitySchema`].
    pub fn invalid_schema(type_name: &'static str, reason: impl Into<String>) -> Self {
        Self::InvalidEntitySchema {
            type_name,
            reason: reason.into(),
        }
    }

    /// Create a new [`Error::ListenerConfig`].
    pub fn listener_config(message: impl Into<String>, help: impl Into<String>) -> Self {
        Self::ListenerConfig {
            message: message.into(),
            help: help.into(),
        }
    }

    /// Create a new [`Error::WatchInit`].
    pub fn watch_init(message: impl Into<String>, source: Option<notify::Error>) -> Self {
        Self::WatchInit {
            message: message.into(),
            source,
        }
    }

    /// Returns `true` if this error was caused by the file's format.
    #[must_use]
    pub const fn is_format_error(&self) -> bool {
        matches!(
            self,
            Self::FormatMismatch { .. } | Self::AmbiguousFormat { .. } | Self::UnsupportedFormat { .. }
        )
    }
}

/// A single properties value that could not be converted to its declared type.
///
/// Produced by [`ScalarType::convert`](crate::ScalarType::convert). The
/// populator logs it and leaves the field at its default; it never aborts a
/// load.
#[derive(Debug, Clone, PartialEq, Eq, ThisError)]
#[error("cannot convert `{value}` to {expected}: {reason}")]
pub struct PropertyConversionError {
    /// The raw string from the file.
    pub value: String,

    /// Name of the declared target type.
    pub expected: &'static str,

    /// Why the conversion failed.
    pub reason: String,
}

/// Result alias used throughout the crate.
pub type Result<T, E = Error> = std::result::Result<T, E>;
