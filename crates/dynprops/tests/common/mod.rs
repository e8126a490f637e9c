//! Entities shared by the integration tests.

#![allow(dead_code)]

use std::fs;
use std::path::{Path, PathBuf};

use chrono::NaiveDateTime;
use dynprops::{ConfigEntity, FieldValue, ScalarType, SchemaTable};
use serde::Deserialize;
use tempfile::TempDir;

#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
pub struct ServerConfig {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub port: i32,
    #[serde(default)]
    pub ratio: f64,
    #[serde(default)]
    pub enabled: bool,
    #[serde(default)]
    pub started: Option<NaiveDateTime>,
    #[serde(default)]
    pub tags: serde_json::Value,
}

impl ConfigEntity for ServerConfig {
    fn schema_table() -> SchemaTable {
        SchemaTable::builder()
            .field("name", "name", ScalarType::String)
            .field("port", "port", ScalarType::Int)
            .field("ratio", "server.ratio", ScalarType::Double)
            .field("enabled", "server.enabled", ScalarType::Bool)
            .field("started", "server.started", ScalarType::Date)
            .field("tags", "server.tags", ScalarType::Structural)
            .read_write(["name", "port", "ratio", "enabled", "started", "tags"])
            .build()
    }

    fn instantiate() -> Option<Self> {
        Some(Self {
            port: 8080,
            ..Self::default()
        })
    }

    fn read_field(&self, field: &str) -> Option<FieldValue> {
        match field {
            "name" => Some(FieldValue::String(self.name.clone())),
            "port" => Some(FieldValue::Int(self.port)),
            "ratio" => Some(FieldValue::Double(self.ratio)),
            "enabled" => Some(FieldValue::Bool(self.enabled)),
            "started" => self.started.map(FieldValue::Date),
            "tags" => Some(FieldValue::Structured(self.tags.clone())),
            _ => None,
        }
    }

    fn write_field(&mut self, field: &str, value: FieldValue) -> bool {
        match (field, value) {
            ("name", FieldValue::String(v)) => self.name = v,
            ("port", FieldValue::Int(v)) => self.port = v,
            ("ratio", FieldValue::Double(v)) => self.ratio = v,
            ("enabled", FieldValue::Bool(v)) => self.enabled = v,
            ("started", FieldValue::Date(v)) => self.started = Some(v),
            ("tags", FieldValue::Structured(v)) => self.tags = v,
            _ => return false,
        }
        true
    }
}

/// Cannot be built without input.
#[derive(Debug, Deserialize)]
pub struct NoDefault {
    pub id: i64,
}

impl ConfigEntity for NoDefault {
    fn schema_table() -> SchemaTable {
        SchemaTable::builder()
            .field("id", "id", ScalarType::Long)
            .read_write(["id"])
            .build()
    }

    fn instantiate() -> Option<Self> {
        None
    }

    fn read_field(&self, _field: &str) -> Option<FieldValue> {
        Some(FieldValue::Long(self.id))
    }

    fn write_field(&mut self, _field: &str, _value: FieldValue) -> bool {
        false
    }
}

/// Maps a field it has no writer for.
#[derive(Debug, Default, Deserialize)]
pub struct MissingWriter {
    pub id: i64,
}

impl ConfigEntity for MissingWriter {
    fn schema_table() -> SchemaTable {
        SchemaTable::builder()
            .field("id", "id", ScalarType::Long)
            .read_only("id")
            .build()
    }

    fn instantiate() -> Option<Self> {
        Some(Self::default())
    }

    fn read_field(&self, _field: &str) -> Option<FieldValue> {
        Some(FieldValue::Long(self.id))
    }

    fn write_field(&mut self, _field: &str, _value: FieldValue) -> bool {
        false
    }
}

/// Write `content` to `name` inside `dir`, returning the path.
pub fn write_file(dir: &TempDir, name: &str, content: &str) -> PathBuf {
    let path = dir.path().join(name);
    fs::write(&path, content).unwrap();
    path
}

/// Overwrite an existing file in place.
pub fn rewrite(path: &Path, content: &str) {
    fs::write(path, content).unwrap();
}
