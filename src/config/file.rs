//! On-disk config file (`.fastn/config.json`).
//!
//! The file is a flat JSON object. Keys this crate does not know about are
//! kept untouched when the file is rewritten.

use super::PartialConfig;
use crate::error::{FastnError, Result};
use serde_json::{Map, Value};
use std::path::{Path, PathBuf};
use tracing::debug;

#[derive(Clone, Debug)]
pub struct ConfigFile {
    path: PathBuf,
    values: Map<String, Value>,
}

impl ConfigFile {
    /// Reads the file at `path`. A missing file yields an empty config.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let values = match std::fs::read_to_string(&path) {
            Ok(contents) if contents.trim().is_empty() => Map::new(),
            Ok(contents) => match serde_json::from_str::<Value>(&contents) {
                Ok(Value::Object(map)) => map,
                Ok(_) => {
                    return Err(FastnError::config(format!(
                        "{} must contain a JSON object",
                        path.display()
                    )))
                }
                Err(e) => {
                    return Err(FastnError::config(format!(
                        "failed to parse {}: {}",
                        path.display(),
                        e
                    )))
                }
            },
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!(path = %path.display(), "No config file, using empty layer");
                Map::new()
            }
            Err(e) => {
                return Err(FastnError::config(format!(
                    "failed to read {}: {}",
                    path.display(),
                    e
                )))
            }
        };

        Ok(Self { path, values })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn exists(&self) -> bool {
        self.path.exists()
    }

    /// The file's contents as a configuration layer.
    ///
    /// Keys with the wrong JSON type are ignored rather than failing the whole layer.
    pub fn partial(&self) -> PartialConfig {
        let string = |key: &str| {
            self.values
                .get(key)
                .and_then(Value::as_str)
                .filter(|v| !v.trim().is_empty())
                .map(str::to_string)
        };

        PartialConfig {
            api_key: string("api_key"),
            project_id: string("project_id"),
            auth_token: string("auth_token"),
            refresh_token: string("refresh_token"),
            token_expiry: self
                .values
                .get("token_expiry")
                .and_then(Value::as_f64)
                .map(|v| v as i64),
            stage: string("stage"),
            tenant_id: string("tenant_id"),
            connection_id: string("connection_id"),
            base_url: string("base_url"),
            auth_url: string("auth_url"),
        }
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.values.get(key)
    }

    /// Sets `key`, or removes it when `value` is `None`.
    pub fn set(&mut self, key: &str, value: Option<Value>) {
        match value {
            Some(v) => {
                self.values.insert(key.to_string(), v);
            }
            None => {
                self.values.remove(key);
            }
        }
    }

    pub fn set_str(&mut self, key: &str, value: Option<&str>) {
        self.set(key, value.map(|v| Value::String(v.to_string())));
    }

    /// Stores a token set as written by `login` and token refresh.
    pub fn set_tokens(
        &mut self,
        auth_token: &str,
        refresh_token: Option<&str>,
        token_expiry: Option<i64>,
    ) {
        self.set_str("auth_token", Some(auth_token));
        self.set_str("refresh_token", refresh_token);
        self.set("token_expiry", token_expiry.map(Value::from));
    }

    /// Removes every token field. Returns true if anything was removed.
    pub fn clear_tokens(&mut self) -> bool {
        ["auth_token", "refresh_token", "token_expiry"]
            .iter()
            .fold(false, |removed, key| self.values.remove(*key).is_some() || removed)
    }

    /// Writes the file, creating the parent directory when needed.
    pub fn save(&self) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| {
                FastnError::config(format!("failed to create {}: {}", parent.display(), e))
            })?;
        }

        let contents = serde_json::to_string_pretty(&Value::Object(self.values.clone()))
            .map_err(|e| FastnError::config(format!("failed to encode config: {}", e)))?;
        std::fs::write(&self.path, contents).map_err(|e| {
            FastnError::config(format!("failed to write {}: {}", self.path.display(), e))
        })?;

        debug!(path = %self.path.display(), "Config file saved");
        Ok(())
    }

    pub fn values(&self) -> &Map<String, Value> {
        &self.values
    }
}
