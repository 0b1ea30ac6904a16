use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::error::{AugurError, Result};

/// Top-level configuration for the augur service.
///
/// Loaded from `~/.augur/config.toml` by default. Each section corresponds
/// to one concern of the turn pipeline.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AugurConfig {
    #[serde(default)]
    pub general: GeneralConfig,
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub session: SessionConfig,
    #[serde(default)]
    pub validation: ValidationConfig,
    #[serde(default)]
    pub narrator: NarratorConfig,
}

impl AugurConfig {
    /// Load configuration from a TOML file.
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: AugurConfig = toml::from_str(&content)?;
        info!("Configuration loaded from {}", path.display());
        Ok(config)
    }

    /// Load configuration from a TOML file, falling back to defaults if the
    /// file does not exist or cannot be parsed.
    pub fn load_or_default(path: &Path) -> Self {
        match Self::load(path) {
            Ok(config) => config,
            Err(e) => {
                warn!(
                    "Failed to load config from {}: {}. Using defaults.",
                    path.display(),
                    e
                );
                Self::default()
            }
        }
    }

    /// Save the current configuration to a TOML file.
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content =
            toml::to_string_pretty(self).map_err(|e| AugurError::Config(e.to_string()))?;
        std::fs::write(path, content)?;
        info!("Configuration saved to {}", path.display());
        Ok(())
    }
}

/// General settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    /// Log level: trace, debug, info, warn, error.
    pub log_level: String,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
        }
    }
}

/// HTTP server settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 3040,
        }
    }
}

/// Session lifecycle settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Whether turn processing is enabled at all.
    pub enabled: bool,
    /// Number of turns retained in a session's history window.
    pub history_window: usize,
    /// Maximum length of one user message in characters.
    pub max_message_length: usize,
    /// Idle minutes after which a session is swept. 0 disables expiry.
    pub idle_timeout_minutes: u32,
    /// Seconds between expiry sweeps.
    pub sweep_interval_secs: u64,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            history_window: 12,
            max_message_length: 4000,
            idle_timeout_minutes: 0,
            sweep_interval_secs: 60,
        }
    }
}

/// Structural integrity validation settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ValidationConfig {
    /// Allow an explicit `math_only` downgrade when a relational request
    /// lacks relationship context and no symbolic read was requested.
    pub allow_math_only_fallback: bool,
    /// Maximum inclusive span of a date window in days.
    pub max_window_days: i64,
    /// Allowed drift between declared and chart coordinates, in degrees.
    pub coordinate_tolerance: f64,
}

impl Default for ValidationConfig {
    fn default() -> Self {
        Self {
            allow_math_only_fallback: true,
            max_window_days: 30,
            coordinate_tolerance: 0.1,
        }
    }
}

/// Narrative generator settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NarratorConfig {
    /// Narrator backend. Only "echo" ships with the service.
    pub provider: String,
    /// Characters per streamed delta for the echo narrator.
    pub chunk_chars: usize,
}

impl Default for NarratorConfig {
    fn default() -> Self {
        Self {
            provider: "echo".to_string(),
            chunk_chars: 48,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn create_temp_config(content: &str) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(content.as_bytes()).unwrap();
        file
    }

    #[test]
    fn test_default_config() {
        let config = AugurConfig::default();
        assert_eq!(config.general.log_level, "info");
        assert_eq!(config.server.port, 3040);
        assert!(config.session.enabled);
        assert_eq!(config.session.history_window, 12);
        assert_eq!(config.session.idle_timeout_minutes, 0);
        assert_eq!(config.validation.max_window_days, 30);
        assert!(config.validation.allow_math_only_fallback);
        assert_eq!(config.narrator.provider, "echo");
    }

    #[test]
    fn test_load_partial_config_uses_defaults() {
        let content = r#"
[server]
port = 9000

[session]
history_window = 4
"#;
        let file = create_temp_config(content);
        let config = AugurConfig::load(file.path()).unwrap();
        assert_eq!(config.server.port, 9000);
        assert_eq!(config.server.host, "127.0.0.1");
        assert_eq!(config.session.history_window, 4);
        assert_eq!(config.session.max_message_length, 4000);
        assert_eq!(config.validation.coordinate_tolerance, 0.1);
    }

    #[test]
    fn test_load_invalid_toml() {
        let file = create_temp_config("[session\nhistory_window = ");
        let result = AugurConfig::load(file.path());
        assert!(matches!(result, Err(AugurError::Config(_))));
    }

    #[test]
    fn test_load_or_default_missing_file() {
        let config = AugurConfig::load_or_default(Path::new("/nonexistent/augur.toml"));
        assert_eq!(config.server.port, 3040);
    }

    #[test]
    fn test_save_and_reload() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.toml");

        let mut config = AugurConfig::default();
        config.session.idle_timeout_minutes = 45;
        config.narrator.chunk_chars = 16;
        config.save(&path).unwrap();

        let reloaded = AugurConfig::load(&path).unwrap();
        assert_eq!(reloaded.session.idle_timeout_minutes, 45);
        assert_eq!(reloaded.narrator.chunk_chars, 16);
    }

    #[test]
    fn test_empty_toml_uses_all_defaults() {
        let file = create_temp_config("");
        let config = AugurConfig::load(file.path()).unwrap();
        assert_eq!(config.general.log_level, "info");
        assert_eq!(config.session.sweep_interval_secs, 60);
    }
}
