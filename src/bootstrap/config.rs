use std::env;

use serde::{Deserialize, Deserializer};
use serde_json::{Value, json};

pub const DEFAULT_BASE_PATH: &str = "/";
pub const DEFAULT_MAIN_MODULE_NAME: &str = "__main";

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DbConfig {
    pub url: String,
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
}

fn default_max_connections() -> u32 {
    10
}

/// Resolved application configuration.
///
/// Built exactly once per composition by deep-merging caller overrides onto a
/// fresh defaults value. Unrecognized keys survive in `extra` so downstream
/// consumers can carry their own options through.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Config {
    #[serde(default = "default_base_path")]
    pub base_path: String,
    /// Connection descriptor, or `None` when persistence is disabled.
    #[serde(default, deserialize_with = "de_db")]
    pub db: Option<DbConfig>,
    /// Session-signing secret, or `None` to skip session support.
    #[serde(default, deserialize_with = "de_secret")]
    pub secret: Option<String>,
    #[serde(default = "default_main_module_name")]
    pub main_module_name: String,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, Value>,
}

fn default_base_path() -> String {
    DEFAULT_BASE_PATH.into()
}

fn default_main_module_name() -> String {
    DEFAULT_MAIN_MODULE_NAME.into()
}

impl Config {
    /// A fresh defaults value. Built per call so merging can never contaminate
    /// the defaults shared by other compositions.
    pub fn defaults() -> Value {
        json!({
            "basePath": DEFAULT_BASE_PATH,
            "db": false,
            "secret": false,
            "mainModuleName": DEFAULT_MAIN_MODULE_NAME,
        })
    }

    pub fn resolve(overrides: &Value) -> anyhow::Result<Self> {
        let mut merged = Self::defaults();
        deep_merge(&mut merged, overrides);
        Ok(serde_json::from_value(merged)?)
    }
}

/// Recursive key-wise merge: nested objects merge, everything else replaces.
pub fn deep_merge(base: &mut Value, overlay: &Value) {
    match (base, overlay) {
        (Value::Object(base_map), Value::Object(overlay_map)) => {
            for (key, value) in overlay_map {
                match base_map.get_mut(key) {
                    Some(slot) if slot.is_object() && value.is_object() => {
                        deep_merge(slot, value);
                    }
                    _ => {
                        base_map.insert(key.clone(), value.clone());
                    }
                }
            }
        }
        (slot, value) => {
            *slot = value.clone();
        }
    }
}

fn de_db<'de, D>(deserializer: D) -> Result<Option<DbConfig>, D::Error>
where
    D: Deserializer<'de>,
{
    match Value::deserialize(deserializer)? {
        Value::Null | Value::Bool(false) => Ok(None),
        Value::String(url) => Ok(Some(DbConfig {
            url,
            max_connections: default_max_connections(),
        })),
        Value::Object(map) => serde_json::from_value(Value::Object(map))
            .map(Some)
            .map_err(serde::de::Error::custom),
        other => Err(serde::de::Error::custom(format!(
            "db must be false or a connection descriptor, got {other}"
        ))),
    }
}

fn de_secret<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    match Value::deserialize(deserializer)? {
        Value::Null | Value::Bool(false) => Ok(None),
        Value::String(secret) => Ok(Some(secret)),
        other => Err(serde::de::Error::custom(format!(
            "secret must be false or a string, got {other}"
        ))),
    }
}

/// Whether this process runs under a development label; controls how much
/// internal detail the terminal error handler exposes.
pub fn development_env() -> bool {
    matches!(
        env::var("RUST_ENV").ok().as_deref(),
        Some("development") | Some("dev")
    )
}

/// Configuration overrides taken from the environment, for the standalone
/// binary. Programmatic callers pass their own overrides instead.
pub fn overrides_from_env() -> Value {
    let mut overrides = serde_json::Map::new();
    if let Ok(url) = env::var("DATABASE_URL") {
        overrides.insert("db".into(), json!({ "url": url }));
    }
    if let Ok(secret) = env::var("SESSION_SECRET") {
        overrides.insert("secret".into(), json!(secret));
    }
    if let Ok(base_path) = env::var("BASE_PATH") {
        overrides.insert("basePath".into(), json!(base_path));
    }
    if let Ok(name) = env::var("MAIN_MODULE_NAME") {
        overrides.insert("mainModuleName".into(), json!(name));
    }
    Value::Object(overrides)
}
