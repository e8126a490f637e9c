//! Turning raw file content into a populated entity.
//!
//! The two families of formats are handled differently on purpose:
//!
//! - **YAML / JSON** are decoded wholesale by the structural codec. Any
//!   error fails the whole load with [`Error::StructuralParse`].
//! - **Properties** are applied field by field through the schema table.
//!   A missing key leaves the field at its default, and a value that does
//!   not convert to the declared type is logged and skipped.

use serde_json as SJSON;
use tracing::debug;

use crate::error::{Error, Result};
use crate::format::ConfigFormat;
use crate::properties::{self, PropertyMap};
use crate::schema::{ConfigEntity, EntitySchema};

/// Builds entity instances from raw configuration bytes.
pub struct EntityPopulator;

impl EntityPopulator {
    /// Populate a fresh `T` from `bytes` in the given resolved format.
    ///
    /// # Errors
    ///
    /// - [`Error::UnsupportedFormat`] for [`ConfigFormat::Auto`]
    /// - [`Error::StructuralParse`] for malformed or non-UTF-8 YAML/JSON
    /// - [`Error::PropertiesSyntax`] for a malformed properties escape or
    ///   non-UTF-8 properties content
    /// - [`Error::InvalidEntitySchema`] if `T` cannot be instantiated
    pub fn populate<T: ConfigEntity>(
        schema: &EntitySchema,
        format: ConfigFormat,
        bytes: &[u8],
    ) -> Result<T> {
        match format {
            ConfigFormat::Json => Self::from_json(bytes),
            ConfigFormat::Yaml => Self::from_yaml(bytes),
            ConfigFormat::Properties => {
                let content = std::str::from_utf8(bytes).map_err(|e| Error::PropertiesSyntax {
                    line: line_of(bytes, e.valid_up_to()),
                    message: format!("content is not valid UTF-8: {e}"),
                })?;
                let map = properties::parse(content)?;
                Self::from_properties(schema, &map)
            }
            ConfigFormat::Auto => Err(Error::UnsupportedFormat { format }),
        }
    }

    /// Apply a flat property map to a fresh instance through the schema.
    ///
    /// Never fails because of an individual value.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidEntitySchema`] if `T` cannot be instantiated.
    pub fn from_properties<T: ConfigEntity>(schema: &EntitySchema, map: &PropertyMap) -> Result<T> {
        let mut instance = T::instantiate().ok_or_else(|| {
            Error::invalid_schema(schema.type_name, "type is not instantiable")
        })?;

        for mapping in &schema.mappings {
            let Some(raw) = map.get(&mapping.key) else {
                continue;
            };

            match mapping.ty.convert(raw) {
                Ok(value) => {
                    if !instance.write_field(&mapping.field, value) {
                        debug!(
                            entity = schema.type_name,
                            field = %mapping.field,
                            "entity rejected converted value, keeping default"
                        );
                    }
                }
                Err(e) => {
                    debug!(
                        entity = schema.type_name,
                        field = %mapping.field,
                        key = %mapping.key,
                        error = %e,
                        "skipping unconvertible property"
                    );
                }
            }
        }

        Ok(instance)
    }

    fn from_json<T: ConfigEntity>(bytes: &[u8]) -> Result<T> {
        let mut de = SJSON::Deserializer::from_slice(bytes);
        let value = serde_path_to_error::deserialize(&mut de).map_err(|e| {
            structural_error(ConfigFormat::Json, e.path().to_string(), e.inner().to_string())
        })?;
        de.end().map_err(|e| Error::StructuralParse {
            format: ConfigFormat::Json,
            field_path: None,
            message: e.to_string(),
        })?;
        Ok(value)
    }

    fn from_yaml<T: ConfigEntity>(bytes: &[u8]) -> Result<T> {
        let content = std::str::from_utf8(bytes).map_err(|e| Error::StructuralParse {
            format: ConfigFormat::Yaml,
            field_path: None,
            message: format!("content is not valid UTF-8: {e}"),
        })?;

        let tree: SJSON::Value =
            serde_saphyr::from_str(content).map_err(|e| Error::StructuralParse {
                format: ConfigFormat::Yaml,
                field_path: None,
                message: e.to_string(),
            })?;

        serde_path_to_error::deserialize(tree).map_err(|e| {
            structural_error(ConfigFormat::Yaml, e.path().to_string(), e.inner().to_string())
        })
    }
}

/// 1-based line holding byte `offset`.
fn line_of(bytes: &[u8], offset: usize) -> usize {
    bytes[..offset].iter().filter(|b| **b == b'\n').count() + 1
}

fn structural_error(format: ConfigFormat, path: String, message: String) -> Error {
    Error::StructuralParse {
        format,
        field_path: Some(path),
        message,
    }
}
