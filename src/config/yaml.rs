use serde::Deserialize;
use std::path::PathBuf;

use super::ConfigError;

/// Complete YAML configuration structure
///
/// All fields are optional to allow partial configuration. Values present in
/// the file override environment variables.
///
/// # Example YAML structure
/// ```yaml
/// edge:
///   websocket_url: "wss://api.msedgeservices.com/tts/cognitiveservices/websocket/v1"
///   voice_list_url: "https://api.msedgeservices.com/tts/cognitiveservices/voices/list"
///   trusted_client_token: "6A5AA1D4EAFF4E9FB37E23D68491D6F4"
///   chromium_version: "140.0.3485.14"
///   connect_timeout_seconds: 30
///   read_timeout_seconds: 60
///
/// synthesis:
///   voice: "en-US-AvaMultilingualNeural"
///   rate: "+0%"
///   volume: "+0%"
///   pitch: "+0Hz"
///   output_format: "mp3"
///   max_concurrency: 16
/// ```
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct YamlConfig {
    pub edge: Option<EdgeYaml>,
    pub synthesis: Option<SynthesisYaml>,
}

/// Connection settings from YAML
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct EdgeYaml {
    pub websocket_url: Option<String>,
    pub voice_list_url: Option<String>,
    pub trusted_client_token: Option<String>,
    pub chromium_version: Option<String>,
    pub connect_timeout_seconds: Option<u64>,
    pub read_timeout_seconds: Option<u64>,
}

/// Default synthesis options from YAML
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct SynthesisYaml {
    pub voice: Option<String>,
    pub rate: Option<String>,
    pub volume: Option<String>,
    pub pitch: Option<String>,
    /// Short name (`mp3`, `webm`, ...) or full service token
    pub output_format: Option<String>,
    pub max_concurrency: Option<usize>,
}

impl YamlConfig {
    /// Load configuration from a YAML file
    ///
    /// # Errors
    /// Returns an error if the file cannot be read or the YAML is malformed.
    pub fn from_file(path: &PathBuf) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path).map_err(|e| {
            ConfigError::Read(format!("Failed to read config file {}: {e}", path.display()))
        })?;

        let config: YamlConfig = serde_yaml::from_str(&contents)
            .map_err(|e| ConfigError::Parse(format!("Failed to parse YAML config: {e}")))?;

        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_yaml_config_full() {
        let yaml = r#"
edge:
  websocket_url: "ws://127.0.0.1:9000/websocket/v1"
  voice_list_url: "http://127.0.0.1:9000/voices/list"
  trusted_client_token: "TOKEN"
  chromium_version: "141.0.1.2"
  connect_timeout_seconds: 5
  read_timeout_seconds: 10

synthesis:
  voice: "en-GB-SoniaNeural"
  rate: "+10%"
  volume: "-10%"
  pitch: "+2Hz"
  output_format: "webm"
  max_concurrency: 4
"#;

        let config: YamlConfig = serde_yaml::from_str(yaml).unwrap();

        let edge = config.edge.unwrap();
        assert_eq!(
            edge.websocket_url.as_deref(),
            Some("ws://127.0.0.1:9000/websocket/v1")
        );
        assert_eq!(edge.trusted_client_token.as_deref(), Some("TOKEN"));
        assert_eq!(edge.chromium_version.as_deref(), Some("141.0.1.2"));
        assert_eq!(edge.connect_timeout_seconds, Some(5));
        assert_eq!(edge.read_timeout_seconds, Some(10));

        let synthesis = config.synthesis.unwrap();
        assert_eq!(synthesis.voice.as_deref(), Some("en-GB-SoniaNeural"));
        assert_eq!(synthesis.pitch.as_deref(), Some("+2Hz"));
        assert_eq!(synthesis.output_format.as_deref(), Some("webm"));
        assert_eq!(synthesis.max_concurrency, Some(4));
    }

    #[test]
    fn test_yaml_config_partial() {
        let yaml = r#"
synthesis:
  max_concurrency: 2
"#;

        let config: YamlConfig = serde_yaml::from_str(yaml).unwrap();
        assert!(config.edge.is_none());
        let synthesis = config.synthesis.unwrap();
        assert_eq!(synthesis.max_concurrency, Some(2));
        assert!(synthesis.voice.is_none());
    }

    #[test]
    fn test_yaml_config_empty() {
        let config: YamlConfig = serde_yaml::from_str("{}").unwrap();
        assert!(config.edge.is_none());
        assert!(config.synthesis.is_none());
    }

    #[test]
    fn test_yaml_from_file() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("config.yaml");
        fs::write(&path, "edge:\n  chromium_version: \"150.0.0.1\"\n").unwrap();

        let config = YamlConfig::from_file(&path).unwrap();
        assert_eq!(
            config.edge.unwrap().chromium_version.as_deref(),
            Some("150.0.0.1")
        );
    }

    #[test]
    fn test_yaml_from_file_invalid() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("config.yaml");
        fs::write(&path, "synthesis:\n  max_concurrency: many\n").unwrap();

        let err = YamlConfig::from_file(&path).unwrap_err();
        assert!(err.to_string().contains("Failed to parse YAML config"));
    }
}
