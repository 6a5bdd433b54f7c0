use std::env;
use std::str::FromStr;

use super::ConfigError;

pub const ENV_WEBSOCKET_URL: &str = "EDGE_TTS_WEBSOCKET_URL";
pub const ENV_VOICE_LIST_URL: &str = "EDGE_TTS_VOICE_LIST_URL";
pub const ENV_TRUSTED_CLIENT_TOKEN: &str = "EDGE_TTS_TRUSTED_CLIENT_TOKEN";
pub const ENV_CHROMIUM_VERSION: &str = "EDGE_TTS_CHROMIUM_VERSION";
pub const ENV_MAX_CONCURRENCY: &str = "EDGE_TTS_MAX_CONCURRENCY";
pub const ENV_CONNECT_TIMEOUT_SECONDS: &str = "EDGE_TTS_CONNECT_TIMEOUT_SECONDS";
pub const ENV_READ_TIMEOUT_SECONDS: &str = "EDGE_TTS_READ_TIMEOUT_SECONDS";
pub const ENV_VOICE: &str = "EDGE_TTS_VOICE";
pub const ENV_RATE: &str = "EDGE_TTS_RATE";
pub const ENV_VOLUME: &str = "EDGE_TTS_VOLUME";
pub const ENV_PITCH: &str = "EDGE_TTS_PITCH";
pub const ENV_OUTPUT_FORMAT: &str = "EDGE_TTS_OUTPUT_FORMAT";

/// Every variable read by [`ClientConfig::from_env`](super::ClientConfig::from_env).
pub const ALL_ENV_VARS: [&str; 12] = [
    ENV_WEBSOCKET_URL,
    ENV_VOICE_LIST_URL,
    ENV_TRUSTED_CLIENT_TOKEN,
    ENV_CHROMIUM_VERSION,
    ENV_MAX_CONCURRENCY,
    ENV_CONNECT_TIMEOUT_SECONDS,
    ENV_READ_TIMEOUT_SECONDS,
    ENV_VOICE,
    ENV_RATE,
    ENV_VOLUME,
    ENV_PITCH,
    ENV_OUTPUT_FORMAT,
];

/// Non-empty, trimmed value of `key`.
pub(crate) fn string(key: &str) -> Option<String> {
    env::var(key)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// Parsed value of `key`, or `None` when unset.
pub(crate) fn parsed<T>(key: &str) -> Result<Option<T>, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match string(key) {
        None => Ok(None),
        Some(raw) => raw
            .parse::<T>()
            .map(Some)
            .map_err(|e| ConfigError::InvalidValue {
                key: key.to_string(),
                value: raw,
                reason: e.to_string(),
            }),
    }
}
