//! Connection signing for the Edge TTS endpoints.
//!
//! Every connection carries a `Sec-MS-GEC` token derived from the current
//! five-minute window of Windows file time and the trusted client token.

use std::time::{SystemTime, UNIX_EPOCH};

use sha2::{Digest, Sha256};
use url::Url;
use uuid::Uuid;

use super::{SIGNATURE_WINDOW_SECONDS, TICKS_PER_SECOND, WINDOWS_EPOCH_OFFSET_SECONDS};
use crate::core::tts::base::{TTSError, TTSResult};

/// Token for one connection attempt. Never cached.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectionSignature {
    /// Start of the signing window, in 100-nanosecond ticks since 1601-01-01.
    pub timestamp_window: u64,
    /// 64-character uppercase hex SHA-256 digest.
    pub token_hash: String,
}

/// Derives signatures and signed URLs from a trusted client token.
#[derive(Debug, Clone)]
pub struct TokenSigner {
    trusted_client_token: String,
    sec_ms_gec_version: String,
}

impl TokenSigner {
    /// `sec_ms_gec_version` is the full query value, e.g. `1-140.0.3485.14`.
    pub fn new(trusted_client_token: impl Into<String>, sec_ms_gec_version: impl Into<String>) -> Self {
        Self {
            trusted_client_token: trusted_client_token.into(),
            sec_ms_gec_version: sec_ms_gec_version.into(),
        }
    }

    /// Signature for an explicit Unix time, in seconds.
    pub fn signature_at(&self, unix_seconds: u64) -> ConnectionSignature {
        let windows_seconds = unix_seconds + WINDOWS_EPOCH_OFFSET_SECONDS;
        let window_start = windows_seconds - windows_seconds % SIGNATURE_WINDOW_SECONDS;
        let timestamp_window = window_start * TICKS_PER_SECOND;

        let mut hasher = Sha256::new();
        hasher.update(timestamp_window.to_string().as_bytes());
        hasher.update(self.trusted_client_token.as_bytes());
        let token_hash = hex::encode_upper(hasher.finalize());

        ConnectionSignature {
            timestamp_window,
            token_hash,
        }
    }

    /// Signature for the current wall-clock time.
    ///
    /// Fails with [`TTSError::ClockUnavailable`] if the clock reads before
    /// the Unix epoch.
    pub fn signature(&self) -> TTSResult<ConnectionSignature> {
        let now = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map_err(|e| TTSError::ClockUnavailable(e.to_string()))?;
        Ok(self.signature_at(now.as_secs()))
    }

    /// Signs a WebSocket URL with a fresh signature and connection id.
    pub fn sign(&self, base_url: &str) -> TTSResult<Url> {
        let signature = self.signature()?;
        let connection_id = Uuid::new_v4().simple().to_string();
        self.sign_with(base_url, &signature, Some(&connection_id))
    }

    /// Signs the voice catalog URL, which takes no connection id.
    pub fn sign_catalog(&self, base_url: &str) -> TTSResult<Url> {
        let signature = self.signature()?;
        self.sign_with(base_url, &signature, None)
    }

    /// Appends the signing query parameters to `base_url` in the order the
    /// service expects.
    pub fn sign_with(
        &self,
        base_url: &str,
        signature: &ConnectionSignature,
        connection_id: Option<&str>,
    ) -> TTSResult<Url> {
        let mut url = Url::parse(base_url)
            .map_err(|e| TTSError::InvalidConfiguration(format!("Invalid URL '{base_url}': {e}")))?;

        {
            let mut query = url.query_pairs_mut();
            query
                .append_pair("Ocp-Apim-Subscription-Key", &self.trusted_client_token)
                .append_pair("Sec-MS-GEC", &signature.token_hash)
                .append_pair("Sec-MS-GEC-Version", &self.sec_ms_gec_version);
            if let Some(id) = connection_id {
                query.append_pair("ConnectionId", id);
            }
        }

        Ok(url)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::tts::edge::TRUSTED_CLIENT_TOKEN;

    fn signer() -> TokenSigner {
        TokenSigner::new(TRUSTED_CLIENT_TOKEN, "1-140.0.3485.14")
    }

    #[test]
    fn test_window_is_floored_to_five_minutes() {
        // 1_700_000_100 + offset = 13_344_473_700, a multiple of 300
        let sig = signer().signature_at(1_700_000_100);
        assert_eq!(sig.timestamp_window, 13_344_473_700 * TICKS_PER_SECOND);

        let later = signer().signature_at(1_700_000_399);
        assert_eq!(sig, later);

        let earlier = signer().signature_at(1_700_000_099);
        assert_eq!(earlier.timestamp_window, 13_344_473_400 * TICKS_PER_SECOND);
    }

    #[test]
    fn test_different_windows_differ() {
        let a = signer().signature_at(1_700_000_100);
        let b = signer().signature_at(1_700_000_400);
        assert_ne!(a.token_hash, b.token_hash);
        assert_eq!(
            b.timestamp_window - a.timestamp_window,
            SIGNATURE_WINDOW_SECONDS * TICKS_PER_SECOND
        );
    }

    #[test]
    fn test_hash_is_uppercase_hex_sha256() {
        let sig = signer().signature_at(1_700_000_000);
        assert_eq!(sig.token_hash.len(), 64);
        assert!(
            sig.token_hash
                .chars()
                .all(|c| c.is_ascii_digit() || c.is_ascii_uppercase())
        );

        let expected = hex::encode_upper(Sha256::digest(
            format!("{}{}", sig.timestamp_window, TRUSTED_CLIENT_TOKEN).as_bytes(),
        ));
        assert_eq!(sig.token_hash, expected);
    }

    #[test]
    fn test_sign_appends_params_in_order() {
        let url = signer().sign("wss://example.com/websocket/v1").unwrap();
        let keys: Vec<String> = url.query_pairs().map(|(k, _)| k.into_owned()).collect();
        assert_eq!(
            keys,
            vec![
                "Ocp-Apim-Subscription-Key",
                "Sec-MS-GEC",
                "Sec-MS-GEC-Version",
                "ConnectionId"
            ]
        );

        let connection_id = url
            .query_pairs()
            .find(|(k, _)| k == "ConnectionId")
            .map(|(_, v)| v.into_owned())
            .unwrap();
        assert_eq!(connection_id.len(), 32);
        assert!(connection_id.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn test_catalog_url_has_no_connection_id() {
        let url = signer().sign_catalog("https://example.com/voices/list").unwrap();
        assert!(url.query_pairs().all(|(k, _)| k != "ConnectionId"));
        assert!(url.query_pairs().any(|(k, v)| k == "Sec-MS-GEC-Version" && v == "1-140.0.3485.14"));
    }

    #[test]
    fn test_invalid_base_url() {
        let err = signer().sign("not a url").unwrap_err();
        assert!(matches!(err, TTSError::InvalidConfiguration(_)));
    }
}
