use log::debug;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

const CONFIG_DIR_NAME: &str = "purpledrill";
const CONFIG_FILE_NAME: &str = "config.json";

/// Persistent settings consumed by the orchestration core
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct ToolConfig {
    /// Path or command name of the external technique runner
    pub runner_path: String,
    /// Root directory of the technique catalog; empty means unconfigured
    pub index_root: String,
    /// Default timeout for external processes, in seconds
    pub timeout_seconds: u64,
}

impl Default for ToolConfig {
    fn default() -> Self {
        ToolConfig {
            runner_path: "powershell".to_string(),
            index_root: String::new(),
            timeout_seconds: 300,
        }
    }
}

/// Where the settings file lives: the platform config dir, or the working
/// directory when none resolves
pub fn config_file_path() -> PathBuf {
    match dirs::config_dir() {
        Some(base) => base.join(CONFIG_DIR_NAME).join(CONFIG_FILE_NAME),
        None => PathBuf::from(format!("{CONFIG_DIR_NAME}-{CONFIG_FILE_NAME}")),
    }
}

impl ToolConfig {
    pub fn load() -> Result<ToolConfig, String> {
        Self::load_from(&config_file_path())
    }

    /// Load settings from a specific file. A missing file yields defaults; a
    /// present but unreadable or malformed file is an error.
    pub fn load_from(path: &Path) -> Result<ToolConfig, String> {
        if !path.exists() {
            debug!("No config file at {path:?}, using default configuration");
            return Ok(ToolConfig::default());
        }

        let content = match fs::read_to_string(path) {
            Ok(content) => content,
            Err(e) => return Err(format!("Failed to read config file: {e}")),
        };

        match serde_json::from_str(&content) {
            Ok(config) => {
                debug!("Loaded configuration from {path:?}");
                Ok(config)
            }
            Err(e) => Err(format!("Failed to parse config file: {e}")),
        }
    }

    pub fn save(&self) -> Result<(), String> {
        self.save_to(&config_file_path())
    }

    pub fn save_to(&self, path: &Path) -> Result<(), String> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                if let Err(e) = fs::create_dir_all(parent) {
                    return Err(format!("Failed to create config directory: {e}"));
                }
            }
        }

        let content = match serde_json::to_string_pretty(self) {
            Ok(json) => json,
            Err(e) => return Err(format!("Failed to serialize config: {e}")),
        };

        match fs::write(path, content) {
            Ok(_) => {
                debug!("Configuration saved to {path:?}");
                Ok(())
            }
            Err(e) => Err(format!("Failed to write config file: {e}")),
        }
    }

    /// Look up a setting by its CLI key name
    pub fn get(&self, key: &str) -> Option<String> {
        match key {
            "runner-path" => Some(self.runner_path.clone()),
            "index-root" => Some(self.index_root.clone()),
            "timeout" => Some(self.timeout_seconds.to_string()),
            _ => None,
        }
    }

    pub fn known_keys() -> &'static [&'static str] {
        &["runner-path", "index-root", "timeout"]
    }

    /// Point at the runner executable; the file must exist
    pub fn set_runner_path(&mut self, path: &str) -> Result<(), String> {
        let candidate = Path::new(path);
        if !candidate.exists() || !candidate.is_file() {
            return Err(format!("Runner executable not found at '{path}'"));
        }
        self.runner_path = path.to_string();
        Ok(())
    }

    /// Point at the technique catalog root; the directory must exist
    pub fn set_index_root(&mut self, path: &str) -> Result<(), String> {
        let candidate = Path::new(path);
        if !candidate.exists() || !candidate.is_dir() {
            return Err(format!("Directory not found at '{path}'"));
        }
        self.index_root = path.to_string();
        Ok(())
    }

    pub fn set_timeout_seconds(&mut self, seconds: i64) -> Result<(), String> {
        if seconds <= 0 {
            return Err("Timeout must be a positive number of seconds".to_string());
        }
        self.timeout_seconds = seconds as u64;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_missing_file_yields_defaults() {
        let dir = tempdir().expect("tempdir");
        let config = ToolConfig::load_from(&dir.path().join("nope.json")).expect("load");

        assert_eq!(config, ToolConfig::default());
        assert_eq!(config.runner_path, "powershell");
        assert_eq!(config.timeout_seconds, 300);
        assert!(config.index_root.is_empty());
    }

    #[test]
    fn test_save_and_reload_round_trip() {
        let dir = tempdir().expect("tempdir");
        let path = dir.path().join("nested").join("config.json");

        let mut config = ToolConfig::default();
        config.timeout_seconds = 120;
        config.index_root = "/tmp/atomics".to_string();
        config.save_to(&path).expect("save");

        let reloaded = ToolConfig::load_from(&path).expect("reload");
        assert_eq!(reloaded, config);
    }

    #[test]
    fn test_malformed_file_is_an_error() {
        let dir = tempdir().expect("tempdir");
        let path = dir.path().join("config.json");
        std::fs::write(&path, "{ not json").expect("write");

        let result = ToolConfig::load_from(&path);
        assert!(result.is_err());
        assert!(result.unwrap_err().contains("parse"));
    }

    #[test]
    fn test_set_runner_path_requires_existing_file() {
        let dir = tempdir().expect("tempdir");
        let mut config = ToolConfig::default();

        assert!(config.set_runner_path("/does/not/exist/pwsh").is_err());

        let file = dir.path().join("pwsh");
        std::fs::write(&file, "").expect("write");
        assert!(config.set_runner_path(file.to_str().expect("utf8 path")).is_ok());
        assert_eq!(config.runner_path, file.to_str().expect("utf8 path"));
    }

    #[test]
    fn test_set_index_root_requires_existing_directory() {
        let dir = tempdir().expect("tempdir");
        let mut config = ToolConfig::default();

        assert!(config.set_index_root("/does/not/exist/atomics").is_err());

        let file = dir.path().join("file-not-dir");
        std::fs::write(&file, "").expect("write");
        assert!(config.set_index_root(file.to_str().expect("utf8 path")).is_err());

        assert!(config
            .set_index_root(dir.path().to_str().expect("utf8 path"))
            .is_ok());
    }

    #[test]
    fn test_set_timeout_rejects_zero_and_negative() {
        let mut config = ToolConfig::default();

        assert!(config.set_timeout_seconds(0).is_err());
        assert!(config.set_timeout_seconds(-5).is_err());
        assert!(config.set_timeout_seconds(60).is_ok());
        assert_eq!(config.timeout_seconds, 60);
    }

    #[test]
    fn test_get_by_key() {
        let config = ToolConfig::default();

        assert_eq!(config.get("runner-path").as_deref(), Some("powershell"));
        assert_eq!(config.get("timeout").as_deref(), Some("300"));
        assert_eq!(config.get("index-root").as_deref(), Some(""));
        assert!(config.get("no-such-key").is_none());
    }
}
