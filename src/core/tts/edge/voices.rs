//! Edge voice catalog.

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use super::config::EdgeConnectionConfig;
use super::signer::TokenSigner;
use crate::core::tts::base::{TTSError, TTSResult};

/// One entry of the voice catalog.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct VoiceDescriptor {
    /// Verbose name, e.g. `Microsoft Server Speech Text to Speech Voice (en-US, AvaNeural)`.
    pub name: String,
    /// Name to pass as the synthesis voice.
    pub short_name: String,
    pub gender: String,
    pub locale: String,
    pub suggested_codec: String,
    pub friendly_name: String,
    /// `GA` or `Preview`.
    pub status: String,
    pub voice_tag: VoiceTag,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct VoiceTag {
    pub content_categories: Vec<String>,
    pub voice_personalities: Vec<String>,
}

impl VoiceDescriptor {
    /// Case-insensitive locale prefix match, so `en` matches `en-US` and `en-GB`.
    pub fn matches_locale(&self, locale: &str) -> bool {
        let wanted = locale.to_ascii_lowercase();
        let own = self.locale.to_ascii_lowercase();
        own == wanted || own.starts_with(&format!("{wanted}-"))
    }
}

/// Fetches the catalog with a freshly signed URL.
///
/// `Accept-Encoding` is left to reqwest so that compressed responses are
/// decoded transparently.
pub async fn fetch_voices(
    client: &reqwest::Client,
    config: &EdgeConnectionConfig,
    signer: &TokenSigner,
) -> TTSResult<Vec<VoiceDescriptor>> {
    let url = signer.sign_catalog(&config.voice_list_url)?;
    debug!(url = %config.voice_list_url, "Fetching Edge voice catalog");

    let mut request = client.get(url);
    for (key, value) in config.headers.voice_list_headers() {
        if key.eq_ignore_ascii_case("Accept-Encoding") {
            continue;
        }
        request = request.header(key, value);
    }

    let response = request
        .send()
        .await
        .map_err(|e| TTSError::VoiceCatalog(format!("request failed: {e}")))?;

    let status = response.status();
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        return Err(TTSError::VoiceCatalog(format!("HTTP {status}: {body}")));
    }

    let voices: Vec<VoiceDescriptor> = response
        .json()
        .await
        .map_err(|e| TTSError::VoiceCatalog(format!("invalid catalog JSON: {e}")))?;

    info!(count = voices.len(), "Fetched Edge voice catalog");
    Ok(voices)
}
