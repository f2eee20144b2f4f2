// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Configuration documents: JSON defaults patched by the caller.
//!
//! Every configurable component ships a `default_config()`; the caller's
//! patch overrides keys recursively. Unknown keys are not an error, but they
//! are logged so typos do not go unnoticed.

use std::fs::File;
use std::io::Read;
use std::path::Path;

use log::warn;
use serde_json::Value;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Missing configuration key '{key}'")]
    MissingKey { key: String },

    #[error("Configuration key '{key}' has the wrong type; expected {expected}")]
    WrongType { key: String, expected: &'static str },

    #[error("Configuration key '{key}' has unsupported value '{value}'")]
    BadValue { key: String, value: String },

    #[error("Couldn't read config file {file}: {err}")]
    Io { file: String, err: std::io::Error },

    #[error("Couldn't parse config file {file}: {err}")]
    Parse {
        file: String,
        err: serde_json::Error,
    },
}

/// Load a JSON configuration document from disk.
pub fn load_config_file<P: AsRef<Path>>(path: P) -> Result<Value, ConfigError> {
    let name = path.as_ref().display().to_string();
    let mut contents = String::new();
    File::open(&path)
        .and_then(|mut f| f.read_to_string(&mut contents))
        .map_err(|err| ConfigError::Io {
            file: name.clone(),
            err,
        })?;
    serde_json::from_str(&contents).map_err(|err| ConfigError::Parse { file: name, err })
}

/// Recursively overlay `patch` onto `base`. Objects merge key by key;
/// anything else replaces. Keys in the patch with no counterpart in the
/// defaults are kept but logged.
pub fn merge_config(base: &mut Value, patch: &Value) {
    match (base, patch) {
        (Value::Object(base_map), Value::Object(patch_map)) => {
            for (key, patch_value) in patch_map {
                match base_map.get_mut(key) {
                    Some(base_value) => merge_config(base_value, patch_value),
                    None => {
                        warn!("Unknown configuration key '{key}'");
                        base_map.insert(key.clone(), patch_value.clone());
                    }
                }
            }
        }
        (base, patch) => *base = patch.clone(),
    }
}

/// The component entry point: defaults overridden by an optional caller
/// patch.
pub fn merge_with_defaults(mut defaults: Value, patch: Option<&Value>) -> Value {
    if let Some(patch) = patch {
        merge_config(&mut defaults, patch);
    }
    defaults
}

pub(crate) fn get_f64(config: &Value, key: &str) -> Result<f64, ConfigError> {
    config
        .get(key)
        .ok_or_else(|| ConfigError::MissingKey {
            key: key.to_string(),
        })?
        .as_f64()
        .ok_or_else(|| ConfigError::WrongType {
            key: key.to_string(),
            expected: "number",
        })
}

pub(crate) fn get_i64(config: &Value, key: &str) -> Result<i64, ConfigError> {
    config
        .get(key)
        .ok_or_else(|| ConfigError::MissingKey {
            key: key.to_string(),
        })?
        .as_i64()
        .ok_or_else(|| ConfigError::WrongType {
            key: key.to_string(),
            expected: "integer",
        })
}

pub(crate) fn get_bool(config: &Value, key: &str) -> Result<bool, ConfigError> {
    config
        .get(key)
        .ok_or_else(|| ConfigError::MissingKey {
            key: key.to_string(),
        })?
        .as_bool()
        .ok_or_else(|| ConfigError::WrongType {
            key: key.to_string(),
            expected: "boolean",
        })
}

pub(crate) fn get_str(config: &Value, key: &str) -> Result<String, ConfigError> {
    config
        .get(key)
        .ok_or_else(|| ConfigError::MissingKey {
            key: key.to_string(),
        })?
        .as_str()
        .map(str::to_string)
        .ok_or_else(|| ConfigError::WrongType {
            key: key.to_string(),
            expected: "string",
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn patch_overrides_recursively() {
        let defaults = json!({
            "picture_thresh": 10.0,
            "inner": { "a": 1, "b": 2 },
        });
        let merged = merge_with_defaults(
            defaults,
            Some(&json!({ "picture_thresh": 7.0, "inner": { "b": 5 } })),
        );
        assert_eq!(merged["picture_thresh"], json!(7.0));
        assert_eq!(merged["inner"]["a"], json!(1));
        assert_eq!(merged["inner"]["b"], json!(5));
    }

    #[test]
    fn unknown_keys_are_kept() {
        let merged = merge_with_defaults(json!({ "a": 1 }), Some(&json!({ "typo": 2 })));
        assert_eq!(merged["typo"], json!(2));
        assert_eq!(merged["a"], json!(1));
    }

    #[test]
    fn typed_getters() {
        let config = json!({ "x": 1.5, "n": 3, "flag": true, "name": "abc" });
        assert_eq!(get_f64(&config, "x").unwrap(), 1.5);
        assert_eq!(get_i64(&config, "n").unwrap(), 3);
        assert!(get_bool(&config, "flag").unwrap());
        assert_eq!(get_str(&config, "name").unwrap(), "abc");
        assert!(matches!(
            get_f64(&config, "missing"),
            Err(ConfigError::MissingKey { .. })
        ));
        assert!(matches!(
            get_i64(&config, "name"),
            Err(ConfigError::WrongType { .. })
        ));
    }
}
