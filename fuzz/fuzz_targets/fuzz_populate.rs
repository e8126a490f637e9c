#![no_main]

use arbitrary::Arbitrary;
use dynprops::{
    ConfigEntity, ConfigFormat, EntityPopulator, EntitySchemaValidator, FieldValue, ScalarType,
    SchemaTable,
};
use libfuzzer_sys::fuzz_target;
use serde::Deserialize;

#[allow(dead_code)]
#[derive(Debug, Default, Deserialize)]
struct FuzzConfig {
    #[serde(default)]
    name: String,
    #[serde(default)]
    count: i32,
    #[serde(default)]
    ratio: f32,
    #[serde(default)]
    extra: serde_json::Value,
}

impl ConfigEntity for FuzzConfig {
    fn schema_table() -> SchemaTable {
        SchemaTable::builder()
            .field("name", "name", ScalarType::String)
            .field("count", "count", ScalarType::Int)
            .field("ratio", "ratio", ScalarType::Float)
            .field("extra", "extra", ScalarType::Structural)
            .read_write(["name", "count", "ratio", "extra"])
            .build()
    }

    fn instantiate() -> Option<Self> {
        Some(Self::default())
    }

    fn read_field(&self, field: &str) -> Option<FieldValue> {
        match field {
            "name" => Some(FieldValue::String(self.name.clone())),
            "count" => Some(FieldValue::Int(self.count)),
            _ => None,
        }
    }

    fn write_field(&mut self, field: &str, value: FieldValue) -> bool {
        match (field, value) {
            ("name", FieldValue::String(v)) => self.name = v,
            ("count", FieldValue::Int(v)) => self.count = v,
            ("ratio", FieldValue::Float(v)) => self.ratio = v,
            ("extra", FieldValue::Structured(v)) => self.extra = v,
            _ => return false,
        }
        true
    }
}

#[derive(Debug, Arbitrary)]
enum Format {
    Properties,
    Yaml,
    Json,
}

#[derive(Debug, Arbitrary)]
struct Input {
    format: Format,
    bytes: Vec<u8>,
}

fuzz_target!(|input: Input| {
    let Ok(schema) = EntitySchemaValidator::validate::<FuzzConfig>() else {
        return;
    };

    let format = match input.format {
        Format::Properties => ConfigFormat::Properties,
        Format::Yaml => ConfigFormat::Yaml,
        Format::Json => ConfigFormat::Json,
    };

    // Malformed content is an error, never a panic
    let _ = EntityPopulator::populate::<FuzzConfig>(&schema, format, &input.bytes);
});
