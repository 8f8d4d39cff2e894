//! Structured JSON-line logging.
//!
//! Events are single-line JSON objects on stdout carrying a timestamp,
//! level, and module field plus caller-supplied fields. `LOG_LEVEL` sets the
//! minimum level (`debug`, `info`, `warn`, `error`; default `info`) and
//! `LOG_FILE` mirrors every emitted line into a JSONL file.

use std::fs::{File, OpenOptions};
use std::io::Write;
use std::sync::{Mutex, OnceLock};

use chrono::Utc;
use serde_json::{json, Map, Value};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Level {
    Debug,
    Info,
    Warn,
    Error,
}

impl Level {
    pub fn from_env() -> Self {
        match std::env::var("LOG_LEVEL").as_deref() {
            Ok("debug") => Level::Debug,
            Ok("warn") => Level::Warn,
            Ok("error") => Level::Error,
            _ => Level::Info,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Level::Debug => "debug",
            Level::Info => "info",
            Level::Warn => "warn",
            Level::Error => "error",
        }
    }
}

/// Current wall-clock time, milliseconds since the UTC epoch.
pub fn ts_now() -> u64 {
    Utc::now().timestamp_millis() as u64
}

pub fn v_str(value: &str) -> Value {
    Value::String(value.to_string())
}

pub fn v_num(value: f64) -> Value {
    json!(value)
}

/// Build a JSON object from field pairs.
pub fn obj(fields: &[(&str, Value)]) -> Value {
    let mut map = Map::new();
    for (key, value) in fields {
        map.insert((*key).to_string(), value.clone());
    }
    Value::Object(map)
}

fn render_line_at(ts: u64, level: Level, module: &str, fields: &Value) -> String {
    let mut map = Map::new();
    map.insert("ts".to_string(), json!(ts));
    map.insert("level".to_string(), v_str(level.as_str()));
    map.insert("module".to_string(), v_str(module));
    if let Value::Object(extra) = fields {
        for (key, value) in extra {
            map.insert(key.clone(), value.clone());
        }
    }
    Value::Object(map).to_string()
}

fn file_sink() -> Option<&'static Mutex<File>> {
    static SINK: OnceLock<Option<Mutex<File>>> = OnceLock::new();
    SINK.get_or_init(|| {
        let path = std::env::var("LOG_FILE").ok()?;
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .ok()?;
        Some(Mutex::new(file))
    })
    .as_ref()
}

/// Emit one event at an explicit level, honoring the `LOG_LEVEL` filter.
pub fn log_at(level: Level, module: &str, fields: Value) {
    if level < Level::from_env() {
        return;
    }
    let line = render_line_at(ts_now(), level, module, &fields);
    println!("{line}");
    if let Some(sink) = file_sink() {
        if let Ok(mut file) = sink.lock() {
            let _ = writeln!(file, "{line}");
        }
    }
}

/// Emit one info-level event.
pub fn json_log(module: &str, fields: Value) {
    log_at(Level::Info, module, fields);
}
