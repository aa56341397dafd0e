//! YAML-backed settings store (C9 expansion).
//!
//! Grounded on `pmoconfig`: an embedded default YAML merged with an external
//! `config.yaml`, then overridden from `ENV_PREFIX__SECTION__KEY`-style
//! environment variables, with typed getters/setters over a generic
//! path-addressed `serde_yaml::Value` tree.
//!
//! Unlike the teacher, this store is not exposed as a `lazy_static`
//! singleton: `Settings::load` returns an owned instance that the caller
//! hands around explicitly (see `CoreContext` in `tonieapp`), so that tests
//! and multiple embedders never fight over global state.

use std::{env, fs, path::Path, sync::Mutex};

use anyhow::{anyhow, Result};
use serde_yaml::{Mapping, Number, Value};
use tracing::info;

const DEFAULT_CONFIG: &str = include_str!("tonieconfig.yaml");
const ENV_PREFIX: &str = "TONIE_CLOUD_CONFIG__";
const ENV_CONFIG_DIR: &str = "TONIE_CLOUD_CONFIG_DIR";

const DEFAULT_FFMPEG_STREAM_BUFFER_MS: u32 = 5000;
const DEFAULT_HTTP_PORT: u16 = 8080;

/// Settings for a single running instance: content store locations,
/// caching policy, transcoding knobs, and HTTP bind address.
#[derive(Debug)]
pub struct Settings {
    config_dir: String,
    path: String,
    data: Mutex<Value>,
}

impl Settings {
    /// Loads settings from `directory/config.yaml`, falling back to
    /// [`ENV_CONFIG_DIR`], then `./.tonie-cloud`, merging the result over the
    /// embedded defaults and applying `TONIE_CLOUD_CONFIG__`-prefixed
    /// environment overrides. The merged result is written back to disk.
    pub fn load(directory: &str) -> Result<Self> {
        let config_dir = Self::resolve_config_dir(directory)?;
        info!(config_dir = %config_dir, "using settings directory");

        let config_file_path = Path::new(&config_dir).join("config.yaml");
        let path = config_file_path.to_string_lossy().to_string();

        let mut merged: Value = serde_yaml::from_str(DEFAULT_CONFIG)?;
        let external_bytes = match fs::read(&path) {
            Ok(bytes) => {
                info!(config_file = %path, "loaded config file");
                bytes
            }
            Err(_) => {
                info!(config_file = %path, "config file not found, using embedded defaults");
                DEFAULT_CONFIG.as_bytes().to_vec()
            }
        };
        let external: Value = serde_yaml::from_slice(&external_bytes)?;
        merge_yaml(&mut merged, &external);
        apply_env_overrides(&mut merged);

        let settings = Settings { config_dir, path, data: Mutex::new(merged) };
        settings.save()?;
        Ok(settings)
    }

    /// Resolves the settings directory, in order: the `directory` argument,
    /// [`ENV_CONFIG_DIR`], `./.tonie-cloud` if it already exists, then
    /// `~/.tonie-cloud`.
    fn resolve_config_dir(directory: &str) -> Result<String> {
        let dir = if !directory.is_empty() {
            directory.to_string()
        } else if let Ok(env_dir) = env::var(ENV_CONFIG_DIR) {
            env_dir
        } else if Path::new(".tonie-cloud").exists() {
            ".tonie-cloud".to_string()
        } else if let Some(home) = dirs::home_dir() {
            home.join(".tonie-cloud").to_string_lossy().into_owned()
        } else {
            ".tonie-cloud".to_string()
        };

        let path = Path::new(&dir);
        if !path.exists() {
            fs::create_dir_all(path)?;
        }
        if !path.is_dir() {
            return Err(anyhow!("settings path {} is not a directory", dir));
        }
        Ok(dir)
    }

    pub fn save(&self) -> Result<()> {
        let data = self.data.lock().unwrap();
        let yaml = serde_yaml::to_string(&*data)?;
        fs::write(&self.path, yaml)?;
        Ok(())
    }

    fn get_value(&self, path: &[&str]) -> Result<Value> {
        let data = self.data.lock().unwrap();
        let mut current = &*data;
        for (i, key) in path.iter().enumerate() {
            match current {
                Value::Mapping(map) => {
                    current = map
                        .get(Value::String(key.to_string()))
                        .ok_or_else(|| anyhow!("path {} does not exist", path[..=i].join(".")))?;
                }
                _ => return Err(anyhow!("path {} is not a mapping", path[..i].join("."))),
            }
        }
        Ok(current.clone())
    }

    fn set_value(&self, path: &[&str], value: Value) -> Result<()> {
        {
            let mut data = self.data.lock().unwrap();
            set_value_internal(&mut data, path, value)?;
        }
        self.save()
    }

    pub fn content_dir_full(&self) -> Result<String> {
        self.resolve_dir(&["content", "content_dir_full"], "content")
    }

    pub fn set_content_dir_full(&self, dir: String) -> Result<()> {
        self.set_value(&["content", "content_dir_full"], Value::String(dir))
    }

    pub fn library_dir_full(&self) -> Result<String> {
        self.resolve_dir(&["content", "library_dir_full"], "library")
    }

    pub fn set_library_dir_full(&self, dir: String) -> Result<()> {
        self.set_value(&["content", "library_dir_full"], Value::String(dir))
    }

    fn resolve_dir(&self, path: &[&str], default: &str) -> Result<String> {
        let dir = match self.get_value(path) {
            Ok(Value::String(s)) => s,
            _ => default.to_string(),
        };
        let resolved = if Path::new(&dir).is_absolute() {
            dir
        } else {
            Path::new(&self.config_dir).join(&dir).to_string_lossy().into_owned()
        };
        if !Path::new(&resolved).exists() {
            fs::create_dir_all(&resolved)?;
        }
        Ok(resolved)
    }

    pub fn cache_content(&self) -> bool {
        self.get_bool(&["content", "cache_content"], true)
    }

    pub fn set_cache_content(&self, value: bool) -> Result<()> {
        self.set_value(&["content", "cache_content"], Value::Bool(value))
    }

    pub fn cache_to_library(&self) -> bool {
        self.get_bool(&["content", "cache_to_library"], false)
    }

    pub fn set_cache_to_library(&self, value: bool) -> Result<()> {
        self.set_value(&["content", "cache_to_library"], Value::Bool(value))
    }

    pub fn prio_custom_content(&self) -> bool {
        self.get_bool(&["content", "prio_custom_content"], true)
    }

    pub fn set_prio_custom_content(&self, value: bool) -> Result<()> {
        self.set_value(&["content", "prio_custom_content"], Value::Bool(value))
    }

    pub fn update_on_lower_audio_id(&self) -> bool {
        self.get_bool(&["content", "update_on_lower_audio_id"], false)
    }

    pub fn set_update_on_lower_audio_id(&self, value: bool) -> Result<()> {
        self.set_value(&["content", "update_on_lower_audio_id"], Value::Bool(value))
    }

    pub fn ffmpeg_stream_buffer_ms(&self) -> u32 {
        match self.get_value(&["transcoding", "ffmpeg_stream_buffer_ms"]) {
            Ok(Value::Number(n)) if n.is_u64() => n.as_u64().unwrap() as u32,
            _ => DEFAULT_FFMPEG_STREAM_BUFFER_MS,
        }
    }

    pub fn set_ffmpeg_stream_buffer_ms(&self, ms: u32) -> Result<()> {
        self.set_value(
            &["transcoding", "ffmpeg_stream_buffer_ms"],
            Value::Number(Number::from(ms)),
        )
    }

    pub fn http_port(&self) -> u16 {
        match self.get_value(&["host", "http_port"]) {
            Ok(Value::Number(n)) if n.is_u64() => n.as_u64().unwrap() as u16,
            _ => DEFAULT_HTTP_PORT,
        }
    }

    pub fn set_http_port(&self, port: u16) -> Result<()> {
        self.set_value(&["host", "http_port"], Value::Number(Number::from(port)))
    }

    pub fn http_bind(&self) -> String {
        match self.get_value(&["host", "http_bind"]) {
            Ok(Value::String(s)) => s,
            _ => "0.0.0.0".to_string(),
        }
    }

    pub fn set_http_bind(&self, addr: String) -> Result<()> {
        self.set_value(&["host", "http_bind"], Value::String(addr))
    }

    fn get_bool(&self, path: &[&str], default: bool) -> bool {
        match self.get_value(path) {
            Ok(Value::Bool(b)) => b,
            _ => default,
        }
    }
}

fn set_value_internal(data: &mut Value, path: &[&str], value: Value) -> Result<()> {
    if path.is_empty() {
        *data = value;
        return Ok(());
    }
    if !matches!(data, Value::Mapping(_)) {
        *data = Value::Mapping(Mapping::new());
    }
    if let Value::Mapping(map) = data {
        let key = Value::String(path[0].to_string());
        if path.len() == 1 {
            map.insert(key, value);
        } else {
            let entry = map.entry(key).or_insert(Value::Mapping(Mapping::new()));
            set_value_internal(entry, &path[1..], value)?;
        }
    }
    Ok(())
}

fn merge_yaml(default: &mut Value, external: &Value) {
    match (default, external) {
        (Value::Mapping(dmap), Value::Mapping(emap)) => {
            for (k, v) in emap {
                match dmap.get_mut(k) {
                    Some(dv) => merge_yaml(dv, v),
                    None => {
                        dmap.insert(k.clone(), v.clone());
                    }
                }
            }
        }
        (d, e) => *d = e.clone(),
    }
}

fn apply_env_overrides(config: &mut Value) {
    for (key, value) in env::vars() {
        if let Some(rest) = key.strip_prefix(ENV_PREFIX) {
            let path: Vec<&str> = rest.split("__").collect();
            let yaml_value = convert_env_value(&value);
            let _ = set_value_internal(config, &path, yaml_value);
        }
    }
}

fn convert_env_value(value: &str) -> Value {
    serde_yaml::from_str::<Value>(value).unwrap_or_else(|_| Value::String(value.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_load_without_external_file() {
        let dir = tempfile::tempdir().unwrap();
        let settings = Settings::load(dir.path().to_str().unwrap()).unwrap();
        assert_eq!(settings.http_port(), DEFAULT_HTTP_PORT);
        assert!(settings.cache_content());
        assert!(!settings.cache_to_library());
    }

    #[test]
    fn setter_persists_across_reload() {
        let dir = tempfile::tempdir().unwrap();
        let dir_str = dir.path().to_str().unwrap();
        {
            let settings = Settings::load(dir_str).unwrap();
            settings.set_http_port(9999).unwrap();
        }
        let reloaded = Settings::load(dir_str).unwrap();
        assert_eq!(reloaded.http_port(), 9999);
    }

    #[test]
    fn env_override_takes_precedence_over_file() {
        let dir = tempfile::tempdir().unwrap();
        std::env::set_var("TONIE_CLOUD_CONFIG__HOST__HTTP_PORT", "4242");
        let settings = Settings::load(dir.path().to_str().unwrap()).unwrap();
        std::env::remove_var("TONIE_CLOUD_CONFIG__HOST__HTTP_PORT");
        assert_eq!(settings.http_port(), 4242);
    }
}
