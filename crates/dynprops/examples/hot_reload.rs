//! Hot reload example for a properties file.
//!
//! Loads a temporary `server.properties`, watches it with the interval
//! scan detector and prints every reload attempt.
//!
//! # Running
//!
//! ```bash
//! cargo run -p dynprops --example hot_reload
//!
//! # In another terminal, edit the file printed at startup
//! echo 'server.port = 9090' >> /tmp/dynprops_example.properties
//! ```

use std::fs;
use std::thread;
use std::time::Duration;

use dynprops::{
    ConfigEntity, DetectorKind, DynamicConfig, EventMask, FieldValue, ReloadOutcome, ScalarType,
    SchemaTable,
};
use serde::Deserialize;

#[derive(Debug, Default, Deserialize)]
struct Server {
    host: String,
    port: i32,
    debug: bool,
}

impl ConfigEntity for Server {
    fn schema_table() -> SchemaTable {
        SchemaTable::builder()
            .field("host", "server.host", ScalarType::String)
            .field("port", "server.port", ScalarType::Int)
            .field("debug", "debug", ScalarType::Bool)
            .read_write(["host", "port", "debug"])
            .build()
    }

    fn instantiate() -> Option<Self> {
        Some(Self {
            host: "localhost".to_string(),
            port: 8080,
            debug: false,
        })
    }

    fn read_field(&self, field: &str) -> Option<FieldValue> {
        match field {
            "host" => Some(FieldValue::String(self.host.clone())),
            "port" => Some(FieldValue::Int(self.port)),
            "debug" => Some(FieldValue::Bool(self.debug)),
            _ => None,
        }
    }

    fn write_field(&mut self, field: &str, value: FieldValue) -> bool {
        match (field, value) {
            ("host", FieldValue::String(v)) => self.host = v,
            ("port", FieldValue::Int(v)) => self.port = v,
            ("debug", FieldValue::Bool(v)) => self.debug = v,
            _ => return false,
        }
        true
    }
}

fn main() -> miette::Result<()> {
    let config_path = std::env::temp_dir().join("dynprops_example.properties");
    fs::write(
        &config_path,
        "# example server\nserver.host = 127.0.0.1\nserver.port = 8080\ndebug = false\n",
    )
    .map_err(|e| dynprops::Error::read(&config_path, e))?;

    println!("Config file: {}", config_path.display());

    let config = DynamicConfig::<Server>::new(&config_path)
        .detector(DetectorKind::IntervalScan)
        .events(EventMask::ALL)
        .interval(Duration::from_secs(1))
        .on_reload(|event| match &event.outcome {
            ReloadOutcome::Reloaded(server) => {
                println!("\n[RELOAD] {} (epoch {})", event.trigger, event.epoch);
                println!("  New config: {server:?}");
            }
            ReloadOutcome::Failed(err) => {
                eprintln!("\n[ERROR] {}: {err}", event.trigger);
                eprintln!("  Previous config is still active");
            }
        })
        .load()?;

    println!("Initial configuration ({}):", config.format());
    println!("  {:?}", config.get());
    println!("\nWatching for changes (press Ctrl+C to exit)...");

    let mut last_epoch = config.epoch();
    while config.is_running() {
        thread::sleep(Duration::from_secs(2));

        if config.has_changed_since(last_epoch) {
            last_epoch = config.epoch();
            println!("[POLL] port is now {:?}", config.read_field("port"));
        }
    }

    let _ = fs::remove_file(&config_path);
    Ok(())
}
