//! Settings management

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SettingsError {
    #[error("failed to read settings file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid settings file {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("invalid log level: {0}")]
    LogLevel(String),
}

/// Runtime settings. Every key is optional in the file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub script: ScriptSettings,
    pub net: NetSettings,
    pub commands: CommandSettings,
    pub log_level: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScriptSettings {
    /// Directory the bundle is resolved against. Defaults to the
    /// executable's directory.
    pub plugin_dir: Option<PathBuf>,
    pub bundle: PathBuf,
    /// QuickJS heap limit; 0 leaves the engine unlimited.
    pub memory_limit_bytes: usize,
    /// Animation-frame period. Unset keeps the engine's 60 Hz default.
    pub frame_interval_us: Option<u64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NetSettings {
    pub poll_interval_ms: u64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CommandSettings {
    /// Fail on unresolvable socket names instead of falling back to index 0.
    pub strict_socket_lookup: bool,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            script: ScriptSettings::default(),
            net: NetSettings::default(),
            commands: CommandSettings::default(),
            log_level: "info".to_string(),
        }
    }
}

impl Default for ScriptSettings {
    fn default() -> Self {
        Self {
            plugin_dir: None,
            bundle: PathBuf::from("bundle.js"),
            memory_limit_bytes: 0,
            frame_interval_us: None,
        }
    }
}

impl Default for NetSettings {
    fn default() -> Self {
        Self { poll_interval_ms: 10 }
    }
}

impl Settings {
    /// Load from a JSON file.
    pub fn load(path: &Path) -> Result<Self, SettingsError> {
        let text = std::fs::read_to_string(path).map_err(|source| SettingsError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let settings = Self::from_json(&text).map_err(|source| SettingsError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        tracing::debug!(path = %path.display(), "settings loaded");
        Ok(settings)
    }

    pub fn from_json(text: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(text)
    }

    /// Absolute bundle location. A relative bundle path is joined onto the
    /// plugin directory.
    pub fn bundle_path(&self) -> PathBuf {
        if self.script.bundle.is_absolute() {
            return self.script.bundle.clone();
        }
        self.plugin_dir().join(&self.script.bundle)
    }

    pub fn plugin_dir(&self) -> PathBuf {
        if let Some(dir) = &self.script.plugin_dir {
            return dir.clone();
        }
        std::env::current_exe()
            .ok()
            .and_then(|exe| exe.parent().map(Path::to_path_buf))
            .unwrap_or_else(|| PathBuf::from("."))
    }

    /// Configured frame period, if the file overrides the default.
    pub fn frame_interval(&self) -> Option<Duration> {
        self.script.frame_interval_us.map(|us| Duration::from_micros(us.max(1)))
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.net.poll_interval_ms.max(1))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults() {
        let settings = Settings::default();
        assert_eq!(settings.log_level, "info");
        assert_eq!(settings.frame_interval(), None);
        assert_eq!(settings.poll_interval(), Duration::from_millis(10));
        assert!(!settings.commands.strict_socket_lookup);
        assert!(settings.bundle_path().ends_with("bundle.js"));
    }

    #[test]
    fn test_partial_file_keeps_defaults() {
        let settings = Settings::from_json(r#"{"commands":{"strict_socket_lookup":true},"script":{"frame_interval_us":33333}}"#).unwrap();
        assert!(settings.commands.strict_socket_lookup);
        assert_eq!(settings.frame_interval(), Some(Duration::from_micros(33_333)));
        assert_eq!(settings.script.bundle, PathBuf::from("bundle.js"));
        assert_eq!(settings.net.poll_interval_ms, 10);
    }

    #[test]
    fn test_bundle_resolved_against_plugin_dir() {
        let mut settings = Settings::default();
        settings.script.plugin_dir = Some(PathBuf::from("/opt/plugin"));
        settings.script.bundle = PathBuf::from("dist/main.js");
        assert_eq!(settings.bundle_path(), PathBuf::from("/opt/plugin/dist/main.js"));

        settings.script.bundle = PathBuf::from("/abs/bundle.js");
        assert_eq!(settings.bundle_path(), PathBuf::from("/abs/bundle.js"));
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{"log_level":"debug","net":{{"poll_interval_ms":0}}}}"#).unwrap();
        let settings = Settings::load(file.path()).unwrap();
        assert_eq!(settings.log_level, "debug");
        // Zero is clamped so pollers never spin
        assert_eq!(settings.poll_interval(), Duration::from_millis(1));
    }

    #[test]
    fn test_load_errors() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("nope.json");
        assert!(matches!(Settings::load(&missing), Err(SettingsError::Read { .. })));

        let bad = dir.path().join("bad.json");
        std::fs::write(&bad, "{ not json").unwrap();
        assert!(matches!(Settings::load(&bad), Err(SettingsError::Parse { .. })));
    }
}
