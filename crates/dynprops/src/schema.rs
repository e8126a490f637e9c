//! Entity schema table and validation.
//!
//! An entity is any type implementing [`ConfigEntity`]. The entity author
//! supplies a [`SchemaTable`]: which fields are filled from which source
//! keys ([`FieldMapping`]) and which fields the type can read and write
//! ([`FieldAccessor`]). The core never invents this table; it only checks
//! it with [`EntitySchemaValidator`] and consumes it in the populator.
//!
//! # Example
//!
//! ```rust,ignore
//! use dynprops::{ConfigEntity, FieldValue, ScalarType, SchemaTable};
//! use serde::Deserialize;
//!
//! #[derive(Debug, Default, Deserialize)]
//! struct AppConfig {
//!     name: String,
//!     age: i32,
//! }
//!
//! impl ConfigEntity for AppConfig {
//!     fn schema_table() -> SchemaTable {
//!         SchemaTable::builder()
//!             .field("name", "name", ScalarType::String)
//!             .field("age", "age", ScalarType::Int)
//!             .read_write(["name", "age"])
//!             .build()
//!     }
//!
//!     fn instantiate() -> Option<Self> {
//!         Some(Self::default())
//!     }
//!
//!     fn read_field(&self, field: &str) -> Option<FieldValue> {
//!         match field {
//!             "name" => Some(FieldValue::String(self.name.clone())),
//!             "age" => Some(FieldValue::Int(self.age)),
//!             _ => None,
//!         }
//!     }
//!
//!     fn write_field(&mut self, field: &str, value: FieldValue) -> bool {
//!         match (field, value) {
//!             ("name", FieldValue::String(v)) => self.name = v,
//!             ("age", FieldValue::Int(v)) => self.age = v,
//!             _ => return false,
//!         }
//!         true
//!     }
//! }
//! ```

use std::any::TypeId;
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::sync::{Arc, LazyLock};

use chrono::NaiveDateTime;
use parking_lot::RwLock;
use serde::de::DeserializeOwned;
use serde_json as SJSON;

use crate::error::{Error, PropertyConversionError, Result};

/// Pattern used for [`ScalarType::Date`] values (`yyyy-MM-dd HH:mm:ss`).
pub const DATE_PATTERN: &str = "%Y-%m-%d %H:%M:%S";

/// A configuration type that can be populated and live-reloaded.
///
/// YAML and JSON files are decoded wholesale through `Deserialize`.
/// Properties files go through the schema table instead: the entity is
/// created with [`instantiate`](Self::instantiate) and each mapped field is
/// set through [`write_field`](Self::write_field).
pub trait ConfigEntity: DeserializeOwned + Send + Sync + 'static {
    /// The declared schema table for this type.
    fn schema_table() -> SchemaTable;

    /// Default construction path.
    ///
    /// Return `None` for types that cannot be built without input; such
    /// types fail validation.
    fn instantiate() -> Option<Self>;

    /// Read the current value of a field.
    fn read_field(&self, field: &str) -> Option<FieldValue>;

    /// Write a converted value into a field.
    ///
    /// Returns `false` if the field is unknown or the value has the wrong
    /// variant; the populator then leaves the field untouched.
    fn write_field(&mut self, field: &str, value: FieldValue) -> bool;
}

/// Declared target type of a mapped field.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ScalarType {
    /// Passed through unchanged.
    String,
    /// 32-bit signed integer.
    Int,
    /// 64-bit signed integer.
    Long,
    /// 64-bit float.
    Double,
    /// 32-bit float.
    Float,
    /// Exactly `true` or `false`, case-sensitive.
    Bool,
    /// Local date-time in [`DATE_PATTERN`].
    Date,
    /// Decoded with the structural (JSON) codec.
    Structural,
}

impl ScalarType {
    /// Type name for messages.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::String => "String",
            Self::Int => "Int",
            Self::Long => "Long",
            Self::Double => "Double",
            Self::Float => "Float",
            Self::Bool => "Bool",
            Self::Date => "Date",
            Self::Structural => "Structural",
        }
    }

    /// Convert a raw properties value to this type.
    ///
    /// # Errors
    ///
    /// Returns [`PropertyConversionError`] when `raw` is not a valid value of
    /// this type.
    pub fn convert(&self, raw: &str) -> Result<FieldValue, PropertyConversionError> {
        let fail = |reason: String| PropertyConversionError {
            value: raw.to_string(),
            expected: self.name(),
            reason,
        };

        match self {
            Self::String => Ok(FieldValue::String(raw.to_string())),
            Self::Int => raw
                .parse()
                .map(FieldValue::Int)
                .map_err(|e| fail(e.to_string())),
            Self::Long => raw
                .parse()
                .map(FieldValue::Long)
                .map_err(|e| fail(e.to_string())),
            Self::Double => raw
                .parse()
                .map(FieldValue::Double)
                .map_err(|e| fail(e.to_string())),
            Self::Float => raw
                .parse()
                .map(FieldValue::Float)
                .map_err(|e| fail(e.to_string())),
            Self::Bool => match raw {
                "true" => Ok(FieldValue::Bool(true)),
                "false" => Ok(FieldValue::Bool(false)),
                _ => Err(fail("expected `true` or `false`".to_string())),
            },
            Self::Date => NaiveDateTime::parse_from_str(raw, DATE_PATTERN)
                .map(FieldValue::Date)
                .map_err(|e| fail(e.to_string())),
            Self::Structural => SJSON::from_str(raw)
                .map(FieldValue::Structured)
                .map_err(|e| fail(e.to_string())),
        }
    }
}

impl fmt::Display for ScalarType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A converted field value, one variant per [`ScalarType`].
#[derive(Clone, Debug, PartialEq)]
pub enum FieldValue {
    /// [`ScalarType::String`]
    String(String),
    /// [`ScalarType::Int`]
    Int(i32),
    /// [`ScalarType::Long`]
    Long(i64),
    /// [`ScalarType::Double`]
    Double(f64),
    /// [`ScalarType::Float`]
    Float(f32),
    /// [`ScalarType::Bool`]
    Bool(bool),
    /// [`ScalarType::Date`]
    Date(NaiveDateTime),
    /// [`ScalarType::Structural`]
    Structured(SJSON::Value),
}

impl FieldValue {
    /// The [`ScalarType`] this value belongs to.
    #[must_use]
    pub const fn scalar_type(&self) -> ScalarType {
        match self {
            Self::String(_) => ScalarType::String,
            Self::Int(_) => ScalarType::Int,
            Self::Long(_) => ScalarType::Long,
            Self::Double(_) => ScalarType::Double,
            Self::Float(_) => ScalarType::Float,
            Self::Bool(_) => ScalarType::Bool,
            Self::Date(_) => ScalarType::Date,
            Self::Structured(_) => ScalarType::Structural,
        }
    }

    /// Borrow the string, if this is a [`FieldValue::String`].
    #[must_use]
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(s) => Some(s),
            _ => None,
        }
    }

    /// Widen any integer variant to `i64`.
    #[must_use]
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Self::Int(v) => Some(i64::from(*v)),
            Self::Long(v) => Some(*v),
            _ => None,
        }
    }

    /// Widen any floating variant to `f64`.
    #[must_use]
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Double(v) => Some(*v),
            Self::Float(v) => Some(f64::from(*v)),
            _ => None,
        }
    }

    /// The boolean, if this is a [`FieldValue::Bool`].
    #[must_use]
    pub const fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(v) => Some(*v),
            _ => None,
        }
    }
}

impl fmt::Display for FieldValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::String(v) => f.write_str(v),
            Self::Int(v) => write!(f, "{v}"),
            Self::Long(v) => write!(f, "{v}"),
            Self::Double(v) => write!(f, "{v}"),
            Self::Float(v) => write!(f, "{v}"),
            Self::Bool(v) => write!(f, "{v}"),
            Self::Date(v) => write!(f, "{}", v.format(DATE_PATTERN)),
            Self::Structured(v) => write!(f, "{v}"),
        }
    }
}

/// Maps an entity field to a source key and a declared type.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FieldMapping {
    /// Entity field identifier, as understood by `read_field`/`write_field`.
    pub field: String,

    /// Key to look up in the source file.
    pub key: String,

    /// Declared target type.
    pub ty: ScalarType,
}

impl FieldMapping {
    /// Create a new field mapping.
    pub fn new(field: impl Into<String>, key: impl Into<String>, ty: ScalarType) -> Self {
        Self {
            field: field.into(),
            key: key.into(),
            ty,
        }
    }
}

/// Read/write capability the entity exposes for one field.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FieldAccessor {
    /// Field identifier.
    pub field: String,

    /// Whether `read_field` serves this field.
    pub readable: bool,

    /// Whether `write_field` accepts this field.
    pub writable: bool,
}

/// Schema table declared by an entity: mappings plus accessor facts.
#[derive(Clone, Debug, Default)]
pub struct SchemaTable {
    /// Field-to-source-key mappings.
    pub mappings: Vec<FieldMapping>,

    /// Accessors the entity exposes.
    pub accessors: Vec<FieldAccessor>,
}

impl SchemaTable {
    /// Start building a schema table.
    #[must_use]
    pub fn builder() -> SchemaBuilder {
        SchemaBuilder::default()
    }

    fn accessor(&self, field: &str) -> Option<&FieldAccessor> {
        self.accessors.iter().find(|a| a.field == field)
    }
}

/// Fluent builder for [`SchemaTable`].
#[derive(Debug, Default)]
pub struct SchemaBuilder {
    table: SchemaTable,
}

impl SchemaBuilder {
    /// Map `field` to source `key` with the declared type.
    #[must_use]
    pub fn field(mut self, field: impl Into<String>, key: impl Into<String>, ty: ScalarType) -> Self {
        self.table.mappings.push(FieldMapping::new(field, key, ty));
        self
    }

    /// Declare read and write accessors for the given fields.
    #[must_use]
    pub fn read_write<I, S>(mut self, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        for field in fields {
            self.table.accessors.push(FieldAccessor {
                field: field.into(),
                readable: true,
                writable: true,
            });
        }
        self
    }

    /// Declare a read-only accessor.
    #[must_use]
    pub fn read_only(mut self, field: impl Into<String>) -> Self {
        self.table.accessors.push(FieldAccessor {
            field: field.into(),
            readable: true,
            writable: false,
        });
        self
    }

    /// Finish the table.
    #[must_use]
    pub fn build(self) -> SchemaTable {
        self.table
    }
}

/// A validated schema for one entity type.
#[derive(Clone, Debug)]
pub struct EntitySchema {
    /// Rust type name of the entity.
    pub type_name: &'static str,

    /// Field mappings, in declaration order.
    pub mappings: Vec<FieldMapping>,
}

static SCHEMA_CACHE: LazyLock<RwLock<HashMap<TypeId, Arc<EntitySchema>>>> =
    LazyLock::new(|| RwLock::new(HashMap::new()));

/// Verifies that an entity type can be populated and live-proxied.
pub struct EntitySchemaValidator;

impl EntitySchemaValidator {
    /// Validate `T` and return its schema, building it once per type.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidEntitySchema`] when:
    /// - `T::instantiate()` returns `None`
    /// - a mapped field has no accessor, or its accessor is not read-write
    /// - a field or key name is empty, or a field is mapped twice
    pub fn validate<T: ConfigEntity>() -> Result<Arc<EntitySchema>> {
        let id = TypeId::of::<T>();

        if let Some(schema) = SCHEMA_CACHE.read().get(&id) {
            return Ok(Arc::clone(schema));
        }

        let schema = Arc::new(Self::build::<T>()?);
        SCHEMA_CACHE
            .write()
            .entry(id)
            .or_insert_with(|| Arc::clone(&schema));

        Ok(schema)
    }

    fn build<T: ConfigEntity>() -> Result<EntitySchema> {
        let type_name = std::any::type_name::<T>();

        if T::instantiate().is_none() {
            return Err(Error::invalid_schema(
                type_name,
                "type is not instantiable: no default construction path",
            ));
        }

        let table = T::schema_table();
        let mut seen = HashSet::new();

        for mapping in &table.mappings {
            if mapping.field.is_empty() || mapping.key.is_empty() {
                return Err(Error::invalid_schema(
                    type_name,
                    "field mappings need a non-empty field name and source key",
                ));
            }

            if !seen.insert(mapping.field.as_str()) {
                return Err(Error::invalid_schema(
                    type_name,
                    format!("field `{}` is mapped more than once", mapping.field),
                ));
            }

            match table.accessor(&mapping.field) {
                None => {
                    return Err(Error::invalid_schema(
                        type_name,
                        format!("field `{}` has no accessor", mapping.field),
                    ));
                }
                Some(accessor) if !(accessor.readable && accessor.writable) => {
                    return Err(Error::invalid_schema(
                        type_name,
                        format!("field `{}` must be both readable and writable", mapping.field),
                    ));
                }
                Some(_) => {}
            }
        }

        Ok(EntitySchema {
            type_name,
            mappings: table.mappings,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Debug, Default, Deserialize)]
    struct Valid {
        name: String,
    }

    impl ConfigEntity for Valid {
        fn schema_table() -> SchemaTable {
            SchemaTable::builder()
                .field("name", "app.name", ScalarType::String)
                .read_write(["name"])
                .read_only("unmapped")
                .build()
        }

        fn instantiate() -> Option<Self> {
            Some(Self::default())
        }

        fn read_field(&self, field: &str) -> Option<FieldValue> {
            (field == "name").then(|| FieldValue::String(self.name.clone()))
        }

        fn write_field(&mut self, field: &str, value: FieldValue) -> bool {
            match (field, value) {
                ("name", FieldValue::String(v)) => self.name = v,
                _ => return false,
            }
            true
        }
    }

    #[derive(Debug, Deserialize)]
    struct ReadOnly {
        id: i64,
    }

    impl ConfigEntity for ReadOnly {
        fn schema_table() -> SchemaTable {
            SchemaTable::builder()
                .field("id", "id", ScalarType::Long)
                .read_only("id")
                .build()
        }

        fn instantiate() -> Option<Self> {
            Some(Self { id: 0 })
        }

        fn read_field(&self, _field: &str) -> Option<FieldValue> {
            Some(FieldValue::Long(self.id))
        }

        fn write_field(&mut self, _field: &str, _value: FieldValue) -> bool {
            false
        }
    }

    #[test]
    fn test_validate_accepts_and_caches() {
        let first = EntitySchemaValidator::validate::<Valid>().unwrap();
        let second = EntitySchemaValidator::validate::<Valid>().unwrap();

        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(first.mappings.len(), 1);
        assert_eq!(first.mappings[0].key, "app.name");
        assert!(first.type_name.ends_with("Valid"));
    }

    #[test]
    fn test_validate_rejects_read_only_accessor() {
        let err = EntitySchemaValidator::validate::<ReadOnly>().unwrap_err();
        assert!(matches!(err, Error::InvalidEntitySchema { .. }));
        assert!(err.to_string().contains("readable and writable"));
    }

    #[test]
    fn test_convert_scalars() {
        assert_eq!(ScalarType::Int.convert("30"), Ok(FieldValue::Int(30)));
        assert_eq!(ScalarType::Long.convert("-9000000000"), Ok(FieldValue::Long(-9_000_000_000)));
        assert_eq!(ScalarType::Double.convert("2.5"), Ok(FieldValue::Double(2.5)));
        assert_eq!(ScalarType::Float.convert("0.5"), Ok(FieldValue::Float(0.5)));
        assert_eq!(ScalarType::Bool.convert("true"), Ok(FieldValue::Bool(true)));
        assert_eq!(
            ScalarType::String.convert(" spaced "),
            Ok(FieldValue::String(" spaced ".to_string()))
        );
        assert_eq!(
            ScalarType::Structural.convert("[1,2]"),
            Ok(FieldValue::Structured(SJSON::json!([1, 2])))
        );
    }

    #[test]
    fn test_convert_failures() {
        assert!(ScalarType::Int.convert("thirty").is_err());
        assert!(ScalarType::Int.convert("3000000000").is_err());
        assert!(ScalarType::Bool.convert("TRUE").is_err());
        assert!(ScalarType::Bool.convert("yes").is_err());
        assert!(ScalarType::Date.convert("2024-01-02").is_err());

        let err = ScalarType::Double.convert("abc").unwrap_err();
        assert_eq!(err.expected, "Double");
        assert_eq!(err.value, "abc");
    }

    #[test]
    fn test_numeric_widening() {
        assert_eq!(FieldValue::Int(-7).as_i64(), Some(-7));
        assert_eq!(FieldValue::Long(i64::MAX).as_i64(), Some(i64::MAX));
        assert_eq!(FieldValue::Float(0.5).as_f64(), Some(0.5));
        assert_eq!(FieldValue::Bool(true).as_i64(), None);
    }

    #[test]
    fn test_date_round_trip_display() {
        let value = ScalarType::Date.convert("2024-03-05 07:08:09").unwrap();
        assert_eq!(value.to_string(), "2024-03-05 07:08:09");
        assert_eq!(value.scalar_type(), ScalarType::Date);
    }
}
