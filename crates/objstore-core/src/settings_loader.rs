//! Settings loading from configuration files.
//!
//! This module provides functions to load [`Settings`] from TOML files, JSON
//! files, and to apply environment variable overrides.
//!
//! ## Loading Order
//!
//! 1. Start with default settings.
//! 2. Load from a TOML or JSON file (overriding defaults).
//! 3. Apply environment variable overrides (highest priority).
//!
//! ## Environment Variable Mapping
//!
//! | Env Var | Setting |
//! |---|---|
//! | `OBJSTORE_PLATFORM` | `platform` |
//! | `OBJSTORE_OFFSET_TOLERANCE` | `offset_tolerance` |
//! | `OBJSTORE_DEBUG` | `debug` |
//! | `OBJSTORE_LOG_LEVEL` | `log_level` |
//!
//! ## Examples
//!
//! ```rust,no_run
//! use objstore_core::settings_loader;
//!
//! let settings = settings_loader::from_toml_file_with_env("config/objstore.toml").unwrap();
//! ```

use std::path::Path;

use crate::error::ObjectStoreError;
use crate::settings::Settings;

/// Loads settings from a TOML string.
///
/// Any fields not present in the TOML keep their default values.
///
/// # Errors
///
/// Returns an error if the TOML is malformed or cannot be deserialized.
pub fn from_toml_str(toml_str: &str) -> Result<Settings, ObjectStoreError> {
    // Convert to JSON and merge over the serialized defaults so that partial
    // files only override what they name.
    let toml_value: toml::Value = toml::from_str(toml_str)
        .map_err(|e| ObjectStoreError::ConfigurationError(format!("Failed to parse TOML: {e}")))?;

    merge_over_defaults(toml_to_json(toml_value), "TOML")
}

/// Loads settings from a TOML file.
///
/// # Errors
///
/// Returns an error if the file cannot be read or the TOML is malformed.
pub fn from_toml_file(path: impl AsRef<Path>) -> Result<Settings, ObjectStoreError> {
    let content = std::fs::read_to_string(path.as_ref()).map_err(|e| {
        ObjectStoreError::ConfigurationError(format!(
            "Failed to read TOML file '{}': {e}",
            path.as_ref().display()
        ))
    })?;
    from_toml_str(&content)
}

/// Loads settings from a TOML file and then applies environment variable overrides.
///
/// # Errors
///
/// Returns an error if the file cannot be read or the TOML is malformed.
pub fn from_toml_file_with_env(path: impl AsRef<Path>) -> Result<Settings, ObjectStoreError> {
    let mut settings = from_toml_file(path)?;
    apply_env_overrides(&mut settings);
    Ok(settings)
}

/// Loads settings from a JSON string.
///
/// # Errors
///
/// Returns an error if the JSON is malformed or cannot be deserialized.
pub fn from_json_str(json_str: &str) -> Result<Settings, ObjectStoreError> {
    let json_value: serde_json::Value = serde_json::from_str(json_str)
        .map_err(|e| ObjectStoreError::ConfigurationError(format!("Failed to parse JSON: {e}")))?;

    merge_over_defaults(json_value, "JSON")
}

/// Loads settings from a JSON file.
///
/// # Errors
///
/// Returns an error if the file cannot be read or the JSON is malformed.
pub fn from_json_file(path: impl AsRef<Path>) -> Result<Settings, ObjectStoreError> {
    let content = std::fs::read_to_string(path.as_ref()).map_err(|e| {
        ObjectStoreError::ConfigurationError(format!(
            "Failed to read JSON file '{}': {e}",
            path.as_ref().display()
        ))
    })?;
    from_json_str(&content)
}

/// Loads settings from a JSON file and then applies environment variable overrides.
///
/// # Errors
///
/// Returns an error if the file cannot be read or the JSON is malformed.
pub fn from_json_file_with_env(path: impl AsRef<Path>) -> Result<Settings, ObjectStoreError> {
    let mut settings = from_json_file(path)?;
    apply_env_overrides(&mut settings);
    Ok(settings)
}

/// Loads settings from just environment variables (starting from defaults).
pub fn from_env() -> Settings {
    let mut settings = Settings::default();
    apply_env_overrides(&mut settings);
    settings
}

/// Applies environment variable overrides to a settings struct.
///
/// - `OBJSTORE_PLATFORM` -> `platform`
/// - `OBJSTORE_OFFSET_TOLERANCE` -> `offset_tolerance` (ignored unless it parses)
/// - `OBJSTORE_DEBUG` -> `debug` (values: "true"/"1"/"yes" => true, anything else => false)
/// - `OBJSTORE_LOG_LEVEL` -> `log_level`
pub fn apply_env_overrides(settings: &mut Settings) {
    if let Ok(val) = std::env::var("OBJSTORE_PLATFORM") {
        settings.platform = val.trim().to_lowercase();
    }

    if let Ok(val) = std::env::var("OBJSTORE_OFFSET_TOLERANCE") {
        if let Ok(tolerance) = val.trim().parse::<usize>() {
            settings.offset_tolerance = tolerance;
        }
    }

    if let Ok(val) = std::env::var("OBJSTORE_DEBUG") {
        settings.debug = matches!(val.to_lowercase().as_str(), "true" | "1" | "yes");
    }

    if let Ok(val) = std::env::var("OBJSTORE_LOG_LEVEL") {
        settings.log_level = val;
    }
}

// ============================================================
// Helpers
// ============================================================

fn merge_over_defaults(
    value: serde_json::Value,
    format: &str,
) -> Result<Settings, ObjectStoreError> {
    let overrides = match value {
        serde_json::Value::Object(overrides) => overrides,
        other => {
            return Err(ObjectStoreError::ConfigurationError(format!(
                "Settings in {format} must be a table of keys, found {other}"
            )))
        }
    };
    let mut merged = match serde_json::to_value(Settings::default()) {
        Ok(serde_json::Value::Object(defaults)) => defaults,
        Ok(other) => {
            return Err(ObjectStoreError::ConfigurationError(format!(
                "Default settings serialized to {other}"
            )))
        }
        Err(e) => {
            return Err(ObjectStoreError::ConfigurationError(format!(
                "Failed to serialize default settings: {e}"
            )))
        }
    };
    // Settings are flat, so each named key replaces its default.
    merged.extend(overrides);
    serde_json::from_value(serde_json::Value::Object(merged)).map_err(|e| {
        ObjectStoreError::ConfigurationError(format!(
            "Failed to deserialize settings from {format}: {e}"
        ))
    })
}

/// Converts a TOML value to a `serde_json::Value`.
fn toml_to_json(value: toml::Value) -> serde_json::Value {
    match value {
        toml::Value::String(s) => serde_json::Value::String(s),
        toml::Value::Integer(i) => serde_json::json!(i),
        toml::Value::Float(f) => serde_json::json!(f),
        toml::Value::Boolean(b) => serde_json::Value::Bool(b),
        toml::Value::Datetime(dt) => serde_json::Value::String(dt.to_string()),
        toml::Value::Array(arr) => {
            serde_json::Value::Array(arr.into_iter().map(toml_to_json).collect())
        }
        toml::Value::Table(table) => {
            let map: serde_json::Map<String, serde_json::Value> = table
                .into_iter()
                .map(|(k, v)| (k, toml_to_json(v)))
                .collect();
            serde_json::Value::Object(map)
        }
    }
}
