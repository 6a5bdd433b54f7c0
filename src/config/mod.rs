//! Configuration module for the Edge TTS client
//!
//! This module handles client configuration from various sources: .env files, YAML files,
//! and environment variables. Priority: YAML > ENV vars > .env values > defaults.
//!
//! # Modules
//! - `yaml`: YAML configuration file loading
//! - `env`: Environment variable names and parsing helpers
//!
//! # Example
//! ```rust,no_run
//! use waav_edge_tts::config::ClientConfig;
//! use std::path::PathBuf;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! // Load from environment variables only
//! let config = ClientConfig::from_env()?;
//!
//! // Load from YAML file with environment variable overrides
//! let config_path = PathBuf::from("config.yaml");
//! let config = ClientConfig::from_file(&config_path)?;
//!
//! println!("Using up to {} concurrent sessions", config.max_concurrency);
//! # Ok(())
//! # }
//! ```

use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

pub mod env;
mod yaml;

pub use yaml::{EdgeYaml, SynthesisYaml, YamlConfig};

use crate::core::tts::edge::{
    CHROMIUM_FULL_VERSION, DEFAULT_CONNECT_TIMEOUT_SECS, DEFAULT_MAX_CONCURRENCY, EDGE_TTS_URL,
    EDGE_VOICE_LIST_URL, TRUSTED_CLIENT_TOKEN,
};
use crate::core::tts::{EdgeConnectionConfig, OutputFormat, SynthesisOptions};

/// Errors raised while loading or validating configuration
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{0}")]
    Read(String),

    #[error("{0}")]
    Parse(String),

    #[error("Invalid value for {key}: '{value}' ({reason})")]
    InvalidValue {
        key: String,
        value: String,
        reason: String,
    },

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// Client configuration
///
/// Contains everything needed to talk to the Edge read-aloud service:
/// - Endpoints and the client signature
/// - Connection and read timeouts
/// - Batch concurrency
/// - Default synthesis options used when a request does not set its own
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientConfig {
    pub websocket_url: String,
    pub voice_list_url: String,
    pub trusted_client_token: String,
    /// Full Chromium build, e.g. "140.0.3485.14"
    pub chromium_full_version: String,

    /// Size of the batch worker pool
    /// Default: 16
    pub max_concurrency: usize,
    /// WebSocket handshake limit
    /// Default: 30 seconds
    pub connect_timeout: Duration,
    /// Per-read limit while a session is running
    /// Default: None (wait indefinitely)
    pub read_timeout: Option<Duration>,

    pub synthesis: SynthesisOptions,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            websocket_url: EDGE_TTS_URL.to_string(),
            voice_list_url: EDGE_VOICE_LIST_URL.to_string(),
            trusted_client_token: TRUSTED_CLIENT_TOKEN.to_string(),
            chromium_full_version: CHROMIUM_FULL_VERSION.to_string(),
            max_concurrency: DEFAULT_MAX_CONCURRENCY,
            connect_timeout: Duration::from_secs(DEFAULT_CONNECT_TIMEOUT_SECS),
            read_timeout: None,
            synthesis: SynthesisOptions::default(),
        }
    }
}

impl ClientConfig {
    /// Load configuration from environment variables over defaults
    ///
    /// # Errors
    /// Returns an error if a variable cannot be parsed or the result is invalid.
    pub fn from_env() -> Result<Self, ConfigError> {
        let config = Self::load(None)?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a YAML file, falling back to environment
    /// variables and then defaults for anything the file leaves out
    ///
    /// # Example
    /// ```rust,no_run
    /// use waav_edge_tts::config::ClientConfig;
    /// use std::path::PathBuf;
    ///
    /// # fn main() -> Result<(), Box<dyn std::error::Error>> {
    /// let config = ClientConfig::from_file(&PathBuf::from("edge-tts.yaml"))?;
    /// # Ok(())
    /// # }
    /// ```
    pub fn from_file(path: &PathBuf) -> Result<Self, ConfigError> {
        // Note: .env file is loaded in main.rs at application startup
        let yaml_config = YamlConfig::from_file(path)?;
        let config = Self::load(Some(yaml_config))?;
        config.validate()?;
        Ok(config)
    }

    fn load(yaml: Option<YamlConfig>) -> Result<Self, ConfigError> {
        let mut config = Self::default();

        // Environment
        if let Some(v) = env::string(env::ENV_WEBSOCKET_URL) {
            config.websocket_url = v;
        }
        if let Some(v) = env::string(env::ENV_VOICE_LIST_URL) {
            config.voice_list_url = v;
        }
        if let Some(v) = env::string(env::ENV_TRUSTED_CLIENT_TOKEN) {
            config.trusted_client_token = v;
        }
        if let Some(v) = env::string(env::ENV_CHROMIUM_VERSION) {
            config.chromium_full_version = v;
        }
        if let Some(v) = env::parsed::<usize>(env::ENV_MAX_CONCURRENCY)? {
            config.max_concurrency = v;
        }
        if let Some(v) = env::parsed::<u64>(env::ENV_CONNECT_TIMEOUT_SECONDS)? {
            config.connect_timeout = Duration::from_secs(v);
        }
        if let Some(v) = env::parsed::<u64>(env::ENV_READ_TIMEOUT_SECONDS)? {
            config.read_timeout = Some(Duration::from_secs(v));
        }
        if let Some(v) = env::string(env::ENV_VOICE) {
            config.synthesis.voice = Some(v);
        }
        if let Some(v) = env::string(env::ENV_RATE) {
            config.synthesis.rate = Some(v);
        }
        if let Some(v) = env::string(env::ENV_VOLUME) {
            config.synthesis.volume = Some(v);
        }
        if let Some(v) = env::string(env::ENV_PITCH) {
            config.synthesis.pitch = Some(v);
        }
        if let Some(v) = env::parsed::<OutputFormat>(env::ENV_OUTPUT_FORMAT)? {
            config.synthesis.output_format = v;
        }

        // YAML overrides
        let Some(yaml) = yaml else {
            return Ok(config);
        };

        if let Some(edge) = yaml.edge {
            if let Some(v) = edge.websocket_url {
                config.websocket_url = v;
            }
            if let Some(v) = edge.voice_list_url {
                config.voice_list_url = v;
            }
            if let Some(v) = edge.trusted_client_token {
                config.trusted_client_token = v;
            }
            if let Some(v) = edge.chromium_version {
                config.chromium_full_version = v;
            }
            if let Some(v) = edge.connect_timeout_seconds {
                config.connect_timeout = Duration::from_secs(v);
            }
            if let Some(v) = edge.read_timeout_seconds {
                config.read_timeout = Some(Duration::from_secs(v));
            }
        }

        if let Some(synthesis) = yaml.synthesis {
            if let Some(v) = synthesis.voice {
                config.synthesis.voice = Some(v);
            }
            if let Some(v) = synthesis.rate {
                config.synthesis.rate = Some(v);
            }
            if let Some(v) = synthesis.volume {
                config.synthesis.volume = Some(v);
            }
            if let Some(v) = synthesis.pitch {
                config.synthesis.pitch = Some(v);
            }
            if let Some(raw) = synthesis.output_format {
                config.synthesis.output_format =
                    raw.parse().map_err(|e: crate::core::tts::TTSError| {
                        ConfigError::InvalidValue {
                            key: "synthesis.output_format".to_string(),
                            value: raw.clone(),
                            reason: e.to_string(),
                        }
                    })?;
            }
            if let Some(v) = synthesis.max_concurrency {
                config.max_concurrency = v;
            }
        }

        Ok(config)
    }

    /// Validate the merged configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_concurrency == 0 {
            return Err(ConfigError::Invalid(
                "max_concurrency must be at least 1".to_string(),
            ));
        }

        self.connection_config()
            .validate()
            .map_err(ConfigError::Invalid)?;

        self.synthesis
            .validate()
            .map_err(|e| ConfigError::Invalid(format!("default synthesis options: {e}")))?;

        Ok(())
    }

    /// Connection settings for [`EdgeTts::new`](crate::core::tts::EdgeTts::new)
    pub fn connection_config(&self) -> EdgeConnectionConfig {
        EdgeConnectionConfig {
            websocket_url: self.websocket_url.clone(),
            voice_list_url: self.voice_list_url.clone(),
            trusted_client_token: self.trusted_client_token.clone(),
            ..EdgeConnectionConfig::default()
        }
        .with_chromium_version(self.chromium_full_version.clone())
        .with_connect_timeout(self.connect_timeout)
        .with_read_timeout(self.read_timeout)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;
    use std::fs;
    use tempfile::TempDir;

    // Helper to clean up environment variables
    fn cleanup_env_vars() {
        unsafe {
            for key in env::ALL_ENV_VARS {
                std::env::remove_var(key);
            }
        }
    }

    #[test]
    fn test_default_config_is_valid() {
        let config = ClientConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.max_concurrency, DEFAULT_MAX_CONCURRENCY);
        assert_eq!(config.read_timeout, None);
    }

    #[test]
    fn test_connection_config_carries_values() {
        let config = ClientConfig {
            websocket_url: "ws://127.0.0.1:1234/ws".to_string(),
            chromium_full_version: "141.0.1.2".to_string(),
            read_timeout: Some(Duration::from_secs(3)),
            ..Default::default()
        };

        let connection = config.connection_config();
        assert_eq!(connection.websocket_url, "ws://127.0.0.1:1234/ws");
        assert_eq!(connection.sec_ms_gec_version(), "1-141.0.1.2");
        assert_eq!(connection.read_timeout, Some(Duration::from_secs(3)));
    }

    #[test]
    fn test_validate_rejects_zero_concurrency() {
        let config = ClientConfig {
            max_concurrency: 0,
            ..Default::default()
        };
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("max_concurrency"));
    }

    #[test]
    fn test_validate_rejects_bad_scheme() {
        let config = ClientConfig {
            websocket_url: "http://example.com".to_string(),
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_bad_default_voice() {
        let config = ClientConfig {
            synthesis: SynthesisOptions::default().with_voice("AvaNeural"),
            ..Default::default()
        };
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("default synthesis options"));
    }

    #[test]
    #[serial]
    fn test_from_env_defaults() {
        cleanup_env_vars();

        let config = ClientConfig::from_env().unwrap();
        assert_eq!(config, ClientConfig::default());

        cleanup_env_vars();
    }

    #[test]
    #[serial]
    fn test_from_env_values() {
        cleanup_env_vars();

        unsafe {
            std::env::set_var(env::ENV_MAX_CONCURRENCY, "4");
            std::env::set_var(env::ENV_READ_TIMEOUT_SECONDS, "15");
            std::env::set_var(env::ENV_VOICE, "en-GB-SoniaNeural");
            std::env::set_var(env::ENV_PITCH, "-3Hz");
            std::env::set_var(env::ENV_OUTPUT_FORMAT, "ogg");
        }

        let config = ClientConfig::from_env().unwrap();
        assert_eq!(config.max_concurrency, 4);
        assert_eq!(config.read_timeout, Some(Duration::from_secs(15)));
        assert_eq!(config.synthesis.voice.as_deref(), Some("en-GB-SoniaNeural"));
        assert_eq!(config.synthesis.pitch.as_deref(), Some("-3Hz"));
        assert_eq!(config.synthesis.output_format, OutputFormat::Ogg);

        cleanup_env_vars();
    }

    #[test]
    #[serial]
    fn test_from_env_invalid_number() {
        cleanup_env_vars();

        unsafe {
            std::env::set_var(env::ENV_MAX_CONCURRENCY, "lots");
        }

        let err = ClientConfig::from_env().unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue { ref key, .. } if key == env::ENV_MAX_CONCURRENCY));

        cleanup_env_vars();
    }

    #[test]
    #[serial]
    fn test_from_file_yaml_overrides_env() {
        cleanup_env_vars();

        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("config.yaml");

        let yaml_content = r#"
edge:
  chromium_version: "141.0.1.2"

synthesis:
  rate: "+25%"
  output_format: "raw-44100hz-16bit-mono-pcm"
"#;

        fs::write(&config_path, yaml_content).unwrap();

        unsafe {
            std::env::set_var(env::ENV_RATE, "-10%");
            std::env::set_var(env::ENV_MAX_CONCURRENCY, "3");
        }

        let config = ClientConfig::from_file(&config_path).unwrap();

        // YAML overrides ENV
        assert_eq!(config.synthesis.rate.as_deref(), Some("+25%"));
        assert_eq!(config.chromium_full_version, "141.0.1.2");
        assert_eq!(config.synthesis.output_format, OutputFormat::Raw44100);
        // ENV value
        assert_eq!(config.max_concurrency, 3);

        cleanup_env_vars();
    }

    #[test]
    #[serial]
    fn test_from_file_invalid_output_format() {
        cleanup_env_vars();

        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("config.yaml");
        fs::write(&config_path, "synthesis:\n  output_format: \"wav\"\n").unwrap();

        let err = ClientConfig::from_file(&config_path).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue { .. }));

        cleanup_env_vars();
    }

    #[test]
    #[serial]
    fn test_from_file_missing_file() {
        cleanup_env_vars();

        let config_path = PathBuf::from("/nonexistent/config.yaml");
        let result = ClientConfig::from_file(&config_path);

        assert!(result.is_err());
        assert!(
            result
                .unwrap_err()
                .to_string()
                .contains("Failed to read config file")
        );

        cleanup_env_vars();
    }
}
