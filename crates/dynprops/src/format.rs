//! Configuration format representation and derivation.
//!
//! This module provides the [`ConfigFormat`] enum and the [`FormatResolver`]
//! that decides which codec applies to a file.
//!
//! # Supported Formats
//!
//! | Format | Extensions | Codec |
//! |--------|------------|-------|
//! | Properties | `.properties` | [`crate::properties`] |
//! | YAML | `.yaml`, `.yml` | `serde-saphyr` |
//! | JSON | `.json` | `serde_json` |
//!
//! # Format Derivation
//!
//! A file is classified twice. The *suffix hint* comes from the extension;
//! the *content hint* comes from asking each codec, in order YAML, JSON,
//! Properties, whether it accepts the bytes. When the suffix names a format
//! the content must agree with it; otherwise the content hint alone decides.
//!
//! ```rust,ignore
//! use dynprops::{ConfigFormat, FormatResolver};
//!
//! // `settings.cfg` holds `{"port": 8080}`
//! assert_eq!(FormatResolver::resolve("settings.cfg")?, ConfigFormat::Json);
//! ```

use std::fmt;
use std::path::Path;

use serde_json as SJSON;

use crate::error::{Error, FoundFormat, Result};
use crate::properties;

/// Configuration file formats.
///
/// [`ConfigFormat::Auto`] is a request-time hint meaning "derive it for me";
/// [`FormatResolver`] never returns it.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, Hash)]
pub enum ConfigFormat {
    /// Classic line-oriented `key=value` properties.
    Properties,

    /// YAML (`.yaml` or `.yml`).
    Yaml,

    /// JSON (`.json`).
    Json,

    /// Derive the format from the file.
    #[default]
    Auto,
}

impl ConfigFormat {
    /// Suffix hint for a path: the format implied by its extension, or
    /// [`ConfigFormat::Auto`] when the extension is missing or unknown.
    ///
    /// Matching is case-sensitive, so `CONFIG.JSON` has no suffix hint.
    #[must_use]
    pub fn from_suffix(path: &Path) -> Self {
        match path.extension().and_then(|e| e.to_str()) {
            Some("properties") => Self::Properties,
            Some("yml" | "yaml") => Self::Yaml,
            Some("json") => Self::Json,
            _ => Self::Auto,
        }
    }

    /// Get the format name for messages.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Properties => "Properties",
            Self::Yaml => "YAML",
            Self::Json => "JSON",
            Self::Auto => "Auto",
        }
    }

    /// Returns `true` for the concrete formats a codec exists for.
    #[must_use]
    pub const fn is_resolved(&self) -> bool {
        !matches!(self, Self::Auto)
    }
}

impl fmt::Display for ConfigFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Derives which codec applies to a configuration file.
pub struct FormatResolver;

impl FormatResolver {
    /// Resolve the format of the file at `path`.
    ///
    /// # Errors
    ///
    /// - [`Error::Path`] if the path is missing or is a directory
    /// - [`Error::Read`] if the file cannot be read or is not UTF-8
    /// - [`Error::FormatMismatch`] if the suffix and the content disagree
    /// - [`Error::AmbiguousFormat`] if there is no suffix hint and no codec
    ///   accepts the content
    pub fn resolve(path: impl AsRef<Path>) -> Result<ConfigFormat> {
        let path = path.as_ref();
        let bytes = read_config_file(path)?;
        Self::resolve_bytes(path, &bytes)
    }

    /// Resolve the format of content already read from `path`.
    ///
    /// The path only supplies the suffix hint and error context; it is not
    /// touched on disk.
    ///
    /// # Errors
    ///
    /// Same as [`resolve`](Self::resolve), minus the filesystem checks.
    pub fn resolve_bytes(path: &Path, bytes: &[u8]) -> Result<ConfigFormat> {
        let content = std::str::from_utf8(bytes).map_err(|e| Error::Read {
            path: path.to_path_buf(),
            message: format!("content is not valid UTF-8: {e}"),
            source: None,
        })?;

        let suffix = ConfigFormat::from_suffix(path);
        let detected = Self::content_hint(content);

        if suffix.is_resolved() {
            return match detected {
                Some(found) if Self::content_satisfies(suffix, found) => Ok(suffix),
                other => Err(Error::FormatMismatch {
                    path: path.to_path_buf(),
                    expected: suffix,
                    found: other.map_or(FoundFormat::Nothing, FoundFormat::Format),
                }),
            };
        }

        detected.ok_or_else(|| Error::AmbiguousFormat {
            path: path.to_path_buf(),
        })
    }

    /// Content hint: the first codec, in order YAML, JSON, Properties, that
    /// accepts the content.
    ///
    /// Every JSON object is also a YAML flow mapping, so content accepted by
    /// both codecs is reported as [`ConfigFormat::Json`]. Blank content has
    /// no hint.
    #[must_use]
    pub fn content_hint(content: &str) -> Option<ConfigFormat> {
        if content.trim().is_empty() {
            return None;
        }

        if is_yaml_mapping(content) {
            if is_json_object(content) {
                return Some(ConfigFormat::Json);
            }
            return Some(ConfigFormat::Yaml);
        }

        if is_json_object(content) {
            return Some(ConfigFormat::Json);
        }

        if is_properties(content) {
            return Some(ConfigFormat::Properties);
        }

        None
    }

    /// A `.yml` file written as a JSON object is still valid YAML.
    fn content_satisfies(suffix: ConfigFormat, found: ConfigFormat) -> bool {
        suffix == found || (suffix == ConfigFormat::Yaml && found == ConfigFormat::Json)
    }
}

/// Read a configuration file after checking it is an existing regular file.
pub(crate) fn read_config_file(path: &Path) -> Result<Vec<u8>> {
    if !path.exists() || path.is_dir() {
        return Err(Error::path(path));
    }

    std::fs::read(path).map_err(|e| Error::read(path, e))
}

fn is_yaml_mapping(content: &str) -> bool {
    serde_saphyr::from_str::<SJSON::Value>(content).is_ok_and(|v| v.is_object())
}

fn is_json_object(content: &str) -> bool {
    SJSON::from_str::<SJSON::Map<String, SJSON::Value>>(content).is_ok()
}

fn is_properties(content: &str) -> bool {
    properties::parse(content).is_ok_and(|map| !map.is_empty())
}
