//! Edge TTS configuration and request types.
//!
//! Holds the immutable connection settings (endpoints, client signature,
//! impersonated browser headers) and the validated per-task
//! [`SynthesisRequest`].

use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

use super::{
    CHROMIUM_FULL_VERSION, DEFAULT_CONNECT_TIMEOUT_SECS, DEFAULT_PERCENT, DEFAULT_PITCH,
    DEFAULT_VOICE, EDGE_ORIGIN, EDGE_TTS_URL, EDGE_VOICE_LIST_URL, SYNTHESIZE_SUBPROTOCOL,
    TRUSTED_CLIENT_TOKEN, VOICE_NAME_PREFIX,
};
use crate::core::tts::base::{TTSError, TTSResult};

/// "en-US-AvaMultilingualNeural" -> ("en", "US", "AvaMultilingualNeural")
/// "zh-CN-guangxi-YunqiNeural" -> ("zh", "CN-guangxi", "YunqiNeural")
static SHORT_VOICE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^([a-z]{2,})-([a-zA-Z-]{2,})-([^-]+Neural)$").unwrap());

static VERBOSE_VOICE_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^Microsoft Server Speech Text to Speech Voice \(.+,.+\)$").unwrap()
});

static PERCENT_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[+-]\d+%$").unwrap());

static HERTZ_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[+-]\d+Hz$").unwrap());

// =============================================================================
// Output Format
// =============================================================================

/// Audio output format requested in the `speech.config` message.
///
/// The service streams the bytes of the chosen container/codec as-is; this
/// client never decodes them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum OutputFormat {
    /// MP3, 24kHz, 48kbps (default)
    #[default]
    Mp3,
    /// WebM/Opus, 24kHz, 16-bit, 24kbps
    Webm,
    /// Ogg/Opus, 24kHz, 16-bit
    Ogg,
    /// Raw PCM, 22050Hz, 16-bit mono
    Raw22050,
    /// Raw PCM, 44100Hz, 16-bit mono
    Raw44100,
}

impl OutputFormat {
    pub const ALL: [OutputFormat; 5] = [
        Self::Mp3,
        Self::Webm,
        Self::Ogg,
        Self::Raw22050,
        Self::Raw44100,
    ];

    /// Returns the literal format token expected by `speech.config`.
    #[inline]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Mp3 => "audio-24khz-48kbitrate-mono-mp3",
            Self::Webm => "webm-24khz-16bit-24kbps-mono-opus",
            Self::Ogg => "ogg-24khz-16bit-mono-opus",
            Self::Raw22050 => "raw-22050hz-16bit-mono-pcm",
            Self::Raw44100 => "raw-44100hz-16bit-mono-pcm",
        }
    }

    /// File extension for the audio container.
    #[inline]
    pub const fn extension(&self) -> &'static str {
        match self {
            Self::Mp3 => "mp3",
            Self::Webm => "webm",
            Self::Ogg => "ogg",
            Self::Raw22050 | Self::Raw44100 => "pcm",
        }
    }

    /// Approximate output bytes per second of speech.
    #[inline]
    pub const fn bytes_per_second(&self) -> usize {
        match self {
            Self::Webm => 24_000 / 8,
            Self::Raw22050 => 22_050 * 2,
            Self::Raw44100 => 44_100 * 2,
            Self::Mp3 | Self::Ogg => 48_000 / 8,
        }
    }
}

impl fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OutputFormat {
    type Err = TTSError;

    /// Accepts either the short name (`mp3`, `webm`, `ogg`, `raw22050`,
    /// `raw44100`) or the full service token.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_ascii_lowercase();
        match normalized.as_str() {
            "mp3" => Ok(Self::Mp3),
            "webm" => Ok(Self::Webm),
            "ogg" => Ok(Self::Ogg),
            "raw22050" | "raw_22050" | "pcm22050" => Ok(Self::Raw22050),
            "raw44100" | "raw_44100" | "pcm44100" => Ok(Self::Raw44100),
            other => Self::ALL
                .into_iter()
                .find(|format| format.as_str() == other)
                .ok_or_else(|| TTSError::InvalidOutputFormat(s.to_string())),
        }
    }
}

// =============================================================================
// Voice
// =============================================================================

/// A validated voice, kept in both the short form users type and the verbose
/// form the SSML `<voice name>` attribute requires.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Voice {
    short_name: String,
    verbose_name: String,
}

impl Voice {
    /// Parses a short name such as `en-US-AvaMultilingualNeural` or
    /// `zh-CN-guangxi-YunqiNeural`. A name already in the verbose
    /// `Microsoft Server Speech Text to Speech Voice (xx-YY, Name)` form is
    /// accepted unchanged.
    pub fn parse(voice: &str) -> TTSResult<Self> {
        if VERBOSE_VOICE_RE.is_match(voice) {
            return Ok(Self {
                short_name: voice.to_string(),
                verbose_name: voice.to_string(),
            });
        }

        let caps = SHORT_VOICE_RE
            .captures(voice)
            .ok_or_else(|| TTSError::InvalidVoice(voice.to_string()))?;

        let lang = &caps[1];
        let region = &caps[2];
        let name = &caps[3];

        Ok(Self {
            short_name: voice.to_string(),
            verbose_name: format!("{VOICE_NAME_PREFIX} ({lang}-{region}, {name})"),
        })
    }

    #[inline]
    pub fn short_name(&self) -> &str {
        &self.short_name
    }

    /// Name as it must appear in SSML.
    #[inline]
    pub fn verbose_name(&self) -> &str {
        &self.verbose_name
    }
}

impl Default for Voice {
    fn default() -> Self {
        Self {
            short_name: DEFAULT_VOICE.to_string(),
            verbose_name: format!("{VOICE_NAME_PREFIX} (en-US, AvaMultilingualNeural)"),
        }
    }
}

fn validate_percent(value: Option<&str>, err: fn(String) -> TTSError) -> TTSResult<String> {
    match value {
        None | Some("") => Ok(DEFAULT_PERCENT.to_string()),
        Some(v) if PERCENT_RE.is_match(v) => Ok(v.to_string()),
        Some(v) => Err(err(v.to_string())),
    }
}

fn validate_pitch(value: Option<&str>) -> TTSResult<String> {
    match value {
        None | Some("") => Ok(DEFAULT_PITCH.to_string()),
        Some(v) if HERTZ_RE.is_match(v) => Ok(v.to_string()),
        Some(v) => Err(TTSError::InvalidPitch(v.to_string())),
    }
}

// =============================================================================
// Synthesis Options / Request
// =============================================================================

/// Unvalidated synthesis options as they arrive from a CLI or config file.
///
/// Empty or missing fields fall back to the service defaults.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SynthesisOptions {
    /// Voice short name, e.g. `en-US-AvaMultilingualNeural`.
    pub voice: Option<String>,
    /// Rate delta, e.g. `+10%`.
    pub rate: Option<String>,
    /// Volume delta, e.g. `-20%`.
    pub volume: Option<String>,
    /// Pitch delta, e.g. `+5Hz`.
    pub pitch: Option<String>,
    pub output_format: OutputFormat,
}

impl SynthesisOptions {
    pub fn with_voice(mut self, voice: impl Into<String>) -> Self {
        self.voice = Some(voice.into());
        self
    }

    pub fn with_rate(mut self, rate: impl Into<String>) -> Self {
        self.rate = Some(rate.into());
        self
    }

    pub fn with_volume(mut self, volume: impl Into<String>) -> Self {
        self.volume = Some(volume.into());
        self
    }

    pub fn with_pitch(mut self, pitch: impl Into<String>) -> Self {
        self.pitch = Some(pitch.into());
        self
    }

    pub fn with_output_format(mut self, format: OutputFormat) -> Self {
        self.output_format = format;
        self
    }

    /// Validates every option without building a request.
    pub fn validate(&self) -> TTSResult<()> {
        if let Some(voice) = self.voice.as_deref().filter(|v| !v.is_empty()) {
            Voice::parse(voice)?;
        }
        validate_percent(self.rate.as_deref(), TTSError::InvalidRate)?;
        validate_percent(self.volume.as_deref(), TTSError::InvalidVolume)?;
        validate_pitch(self.pitch.as_deref())?;
        Ok(())
    }
}

/// A validated, immutable request for one synthesis task.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SynthesisRequest {
    text: String,
    voice: Voice,
    rate: String,
    volume: String,
    pitch: String,
    output_format: OutputFormat,
}

impl SynthesisRequest {
    /// Validates `text` and `options` and builds a request.
    ///
    /// The text is interpolated into SSML verbatim; callers are responsible
    /// for escaping XML-special characters (see
    /// [`escape_xml`](super::messages::escape_xml)).
    pub fn new(text: impl Into<String>, options: &SynthesisOptions) -> TTSResult<Self> {
        let text = text.into();
        if text.trim().is_empty() {
            return Err(TTSError::EmptyText);
        }

        let voice = match options.voice.as_deref() {
            None | Some("") => Voice::default(),
            Some(v) => Voice::parse(v)?,
        };

        Ok(Self {
            text,
            voice,
            rate: validate_percent(options.rate.as_deref(), TTSError::InvalidRate)?,
            volume: validate_percent(options.volume.as_deref(), TTSError::InvalidVolume)?,
            pitch: validate_pitch(options.pitch.as_deref())?,
            output_format: options.output_format,
        })
    }

    #[inline]
    pub fn text(&self) -> &str {
        &self.text
    }

    #[inline]
    pub fn voice(&self) -> &Voice {
        &self.voice
    }

    #[inline]
    pub fn rate(&self) -> &str {
        &self.rate
    }

    #[inline]
    pub fn volume(&self) -> &str {
        &self.volume
    }

    #[inline]
    pub fn pitch(&self) -> &str {
        &self.pitch
    }

    #[inline]
    pub fn output_format(&self) -> OutputFormat {
        self.output_format
    }

    /// Rough size of the audio this request will produce, for pre-allocation.
    ///
    /// Assumes about ten characters are spoken per second.
    pub fn estimated_audio_len(&self) -> usize {
        const CHARS_PER_SECOND: usize = 10;
        (self.text.len() / CHARS_PER_SECOND) * self.output_format.bytes_per_second()
    }
}

// =============================================================================
// Client Headers
// =============================================================================

/// Browser-impersonation headers, built once and injected into the client.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientHeaders {
    /// Sent on every request.
    pub base: Vec<(String, String)>,
    /// Added to the WebSocket handshake. The `Sec-WebSocket-Protocol` entry
    /// is the browser's and is left out by [`EdgeTts`](super::EdgeTts).
    pub websocket: Vec<(String, String)>,
    /// Added to the voice catalog request.
    pub voice_list: Vec<(String, String)>,
}

impl ClientHeaders {
    /// Builds the header tables for the given Chromium build, e.g. `140.0.3485.14`.
    pub fn for_chromium(full_version: &str) -> Self {
        let major = full_version.split('.').next().unwrap_or(full_version);

        let pairs = |items: &[(&str, String)]| {
            items
                .iter()
                .map(|(k, v)| (k.to_string(), v.clone()))
                .collect::<Vec<_>>()
        };

        Self {
            base: pairs(&[
                (
                    "User-Agent",
                    format!(
                        "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 \
                         (KHTML, like Gecko) Chrome/{major}.0.0.0 Safari/537.36 Edg/{major}.0.0.0"
                    ),
                ),
                ("Accept-Encoding", "gzip, deflate, br".to_string()),
                ("Accept-Language", "en-US,en;q=0.9".to_string()),
            ]),
            websocket: pairs(&[
                ("Pragma", "no-cache".to_string()),
                ("Cache-Control", "no-cache".to_string()),
                ("Origin", EDGE_ORIGIN.to_string()),
                ("Sec-WebSocket-Protocol", SYNTHESIZE_SUBPROTOCOL.to_string()),
            ]),
            voice_list: pairs(&[
                ("Authority", "speech.platform.bing.com".to_string()),
                (
                    "Sec-CH-UA",
                    format!(
                        "\" Not;A Brand\";v=\"99\", \"Microsoft Edge\";v=\"{major}\", \"Chromium\";v=\"{major}\""
                    ),
                ),
                ("Sec-CH-UA-Mobile", "?0".to_string()),
                ("Accept", "*/*".to_string()),
                ("Sec-Fetch-Site", "none".to_string()),
                ("Sec-Fetch-Mode", "cors".to_string()),
                ("Sec-Fetch-Dest", "empty".to_string()),
            ]),
        }
    }

    /// Headers for the WebSocket handshake, base first.
    pub fn websocket_headers(&self) -> impl Iterator<Item = (&str, &str)> {
        self.base
            .iter()
            .chain(self.websocket.iter())
            .map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Headers for the voice catalog request, base first.
    pub fn voice_list_headers(&self) -> impl Iterator<Item = (&str, &str)> {
        self.base
            .iter()
            .chain(self.voice_list.iter())
            .map(|(k, v)| (k.as_str(), v.as_str()))
    }
}

impl Default for ClientHeaders {
    fn default() -> Self {
        Self::for_chromium(CHROMIUM_FULL_VERSION)
    }
}

// =============================================================================
// Connection Config
// =============================================================================

/// Immutable connection settings shared by every session of one client.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EdgeConnectionConfig {
    /// Unsigned WebSocket endpoint.
    pub websocket_url: String,
    /// Unsigned voice catalog endpoint.
    pub voice_list_url: String,
    pub trusted_client_token: String,
    /// Chromium build used for `Sec-MS-GEC-Version` and the headers.
    pub chromium_full_version: String,
    /// Limit on the WebSocket handshake.
    pub connect_timeout: Duration,
    /// Optional limit on each blocking frame read.
    pub read_timeout: Option<Duration>,
    pub headers: ClientHeaders,
}

impl EdgeConnectionConfig {
    /// Value of the `Sec-MS-GEC-Version` query parameter.
    pub fn sec_ms_gec_version(&self) -> String {
        format!("1-{}", self.chromium_full_version)
    }

    /// Replaces the Chromium build and rebuilds the headers to match.
    pub fn with_chromium_version(mut self, full_version: impl Into<String>) -> Self {
        self.chromium_full_version = full_version.into();
        self.headers = ClientHeaders::for_chromium(&self.chromium_full_version);
        self
    }

    pub fn with_websocket_url(mut self, url: impl Into<String>) -> Self {
        self.websocket_url = url.into();
        self
    }

    pub fn with_voice_list_url(mut self, url: impl Into<String>) -> Self {
        self.voice_list_url = url.into();
        self
    }

    pub fn with_read_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.read_timeout = timeout;
        self
    }

    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    /// Checks URL schemes and required values.
    pub fn validate(&self) -> Result<(), String> {
        let ws = url::Url::parse(&self.websocket_url)
            .map_err(|e| format!("Invalid websocket_url '{}': {e}", self.websocket_url))?;
        if !matches!(ws.scheme(), "ws" | "wss") {
            return Err(format!(
                "websocket_url must use ws:// or wss://, got: {}",
                ws.scheme()
            ));
        }

        let voices = url::Url::parse(&self.voice_list_url)
            .map_err(|e| format!("Invalid voice_list_url '{}': {e}", self.voice_list_url))?;
        if !matches!(voices.scheme(), "http" | "https") {
            return Err(format!(
                "voice_list_url must use http:// or https://, got: {}",
                voices.scheme()
            ));
        }

        if self.trusted_client_token.is_empty() {
            return Err("trusted_client_token must not be empty".to_string());
        }
        if self.chromium_full_version.is_empty() {
            return Err("chromium_full_version must not be empty".to_string());
        }
        if self.connect_timeout.is_zero() {
            return Err("connect_timeout must be greater than zero".to_string());
        }
        if self.read_timeout.is_some_and(|t| t.is_zero()) {
            return Err("read_timeout must be greater than zero when set".to_string());
        }

        Ok(())
    }
}

impl Default for EdgeConnectionConfig {
    fn default() -> Self {
        Self {
            websocket_url: EDGE_TTS_URL.to_string(),
            voice_list_url: EDGE_VOICE_LIST_URL.to_string(),
            trusted_client_token: TRUSTED_CLIENT_TOKEN.to_string(),
            chromium_full_version: CHROMIUM_FULL_VERSION.to_string(),
            connect_timeout: Duration::from_secs(DEFAULT_CONNECT_TIMEOUT_SECS),
            read_timeout: None,
            headers: ClientHeaders::default(),
        }
    }
}
