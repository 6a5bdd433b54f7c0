//! Edge TTS wire format.
//!
//! Text frames are pseudo-HTTP: `Key:value` header lines separated by CRLF,
//! a blank line, then the body. Binary frames carry a 2-byte big-endian
//! header length, that many header bytes, then raw audio.
//!
//! ```text
//! text:   X-RequestId:...\r\nPath:turn.start\r\n\r\n{...}
//! binary: [u16 BE L][L bytes of headers][audio ...]
//! ```

use bytes::{BufMut, Bytes, BytesMut};
use serde::Deserialize;
use time::OffsetDateTime;
use time::macros::format_description;

use super::TICKS_PER_MILLISECOND;
use super::config::{OutputFormat, SynthesisRequest};
use crate::core::tts::base::{TTSError, TTSResult, WordBoundary};

const HEADER_SEPARATOR: &[u8] = b"\r\n\r\n";

// =============================================================================
// Paths
// =============================================================================

pub const PATH_SPEECH_CONFIG: &str = "speech.config";
pub const PATH_SSML: &str = "ssml";
pub const PATH_TURN_START: &str = "turn.start";
pub const PATH_TURN_END: &str = "turn.end";
pub const PATH_AUDIO_METADATA: &str = "audio.metadata";
pub const PATH_RESPONSE: &str = "response";

// =============================================================================
// Frames
// =============================================================================

/// A decoded pseudo-HTTP text frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextFrame {
    /// Header pairs in wire order, trimmed.
    pub headers: Vec<(String, String)>,
    /// Everything after the first blank line, verbatim.
    pub body: Bytes,
}

impl TextFrame {
    /// Splits `raw` on the first `\r\n\r\n`.
    pub fn decode(raw: impl Into<Bytes>) -> TTSResult<Self> {
        let raw: Bytes = raw.into();
        let split = raw
            .windows(HEADER_SEPARATOR.len())
            .position(|w| w == HEADER_SEPARATOR)
            .ok_or_else(|| {
                TTSError::MalformedFrame("text frame has no header/body separator".to_string())
            })?;

        let head = std::str::from_utf8(&raw[..split])
            .map_err(|e| TTSError::MalformedFrame(format!("text frame headers not UTF-8: {e}")))?;

        let mut headers = Vec::new();
        for line in head.split("\r\n").filter(|l| !l.trim().is_empty()) {
            let (key, value) = line.split_once(':').ok_or_else(|| {
                TTSError::MalformedFrame(format!("header line without ':': {line}"))
            })?;
            headers.push((key.trim().to_string(), value.trim().to_string()));
        }

        Ok(Self {
            headers,
            body: raw.slice(split + HEADER_SEPARATOR.len()..),
        })
    }

    /// First header with the given key, compared case-sensitively.
    pub fn header(&self, key: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    #[inline]
    pub fn path(&self) -> Option<&str> {
        self.header("Path")
    }

    /// Re-assembles the frame in wire form. The body is copied byte for byte.
    pub fn encode(&self) -> Bytes {
        let head_len: usize = self.headers.iter().map(|(k, v)| k.len() + v.len() + 3).sum();
        let mut out = BytesMut::with_capacity(head_len + 2 + self.body.len());
        for (key, value) in &self.headers {
            out.put_slice(key.as_bytes());
            out.put_u8(b':');
            out.put_slice(value.as_bytes());
            out.put_slice(b"\r\n");
        }
        out.put_slice(b"\r\n");
        out.put_slice(&self.body);
        out.freeze()
    }
}

/// A decoded binary audio frame. Both slices share the original buffer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BinaryFrame {
    pub header_length: u16,
    /// Header block, exposed for logging only.
    pub header: Bytes,
    pub audio: Bytes,
}

impl BinaryFrame {
    pub fn decode(raw: impl Into<Bytes>) -> TTSResult<Self> {
        let raw: Bytes = raw.into();
        if raw.len() < 2 {
            return Err(TTSError::MalformedFrame(
                "binary frame is missing the header length".to_string(),
            ));
        }

        let header_length = u16::from_be_bytes([raw[0], raw[1]]);
        let audio_start = 2 + header_length as usize;
        if raw.len() < audio_start {
            return Err(TTSError::MalformedFrame(format!(
                "binary frame declares {header_length} header bytes but has {}",
                raw.len() - 2
            )));
        }

        Ok(Self {
            header_length,
            header: raw.slice(2..audio_start),
            audio: raw.slice(audio_start..),
        })
    }

    /// Builds a frame in wire form. Used by test servers and benchmarks.
    pub fn encode(header: &[u8], audio: &[u8]) -> Bytes {
        let mut buf = BytesMut::with_capacity(2 + header.len() + audio.len());
        buf.put_u16(header.len() as u16);
        buf.put_slice(header);
        buf.put_slice(audio);
        buf.freeze()
    }
}

// =============================================================================
// Outbound messages
// =============================================================================

/// First message of every session: selects the output format and turns on
/// word boundaries.
pub fn encode_config_message(timestamp: &str, format: OutputFormat) -> String {
    format!(
        "X-Timestamp:{timestamp}\r\n\
         Content-Type:application/json; charset=utf-8\r\n\
         Path:{PATH_SPEECH_CONFIG}\r\n\r\n\
         {{\"context\":{{\"synthesis\":{{\"audio\":{{\"metadataoptions\":{{\
         \"sentenceBoundaryEnabled\":false,\"wordBoundaryEnabled\":true}},\
         \"outputFormat\":\"{}\"}}}}}}}}\r\n",
        format.as_str()
    )
}

/// Second message of every session: the SSML document.
pub fn encode_ssml_message(request_id: &str, timestamp: &str, ssml: &str) -> String {
    format!(
        "X-RequestId:{request_id}\r\n\
         Content-Type:application/ssml+xml\r\n\
         X-Timestamp:{timestamp}Z\r\n\
         Path:{PATH_SSML}\r\n\r\n\
         {ssml}"
    )
}

/// Wraps the request text in SSML. The text is inserted verbatim.
pub fn build_ssml(request: &SynthesisRequest) -> String {
    format!(
        "<speak version='1.0' xmlns='http://www.w3.org/2001/10/synthesis' xml:lang='en-US'>\
         <voice name='{}'><prosody pitch='{}' rate='{}' volume='{}'>{}</prosody></voice></speak>",
        request.voice().verbose_name(),
        request.pitch(),
        request.rate(),
        request.volume(),
        request.text()
    )
}

/// Escapes `& < > " '` for safe inclusion in SSML.
pub fn escape_xml(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&apos;"),
            _ => out.push(c),
        }
    }
    out
}

/// Formats `at` like `Mon Jan 02 2006 15:04:05 GMT+0000 (Coordinated Universal Time)`.
pub fn format_timestamp(at: OffsetDateTime) -> TTSResult<String> {
    let description = format_description!(
        "[weekday repr:short] [month repr:short] [day] [year] [hour]:[minute]:[second] GMT+0000 (Coordinated Universal Time)"
    );
    at.to_offset(time::UtcOffset::UTC)
        .format(description)
        .map_err(|e| TTSError::ClockUnavailable(e.to_string()))
}

/// Current UTC time in message timestamp form.
pub fn current_timestamp() -> TTSResult<String> {
    format_timestamp(OffsetDateTime::now_utc())
}

// =============================================================================
// Metadata
// =============================================================================

const METADATA_WORD_BOUNDARY: &str = "WordBoundary";
const METADATA_SESSION_END: &str = "SessionEnd";

#[derive(Debug, Deserialize)]
struct MetadataEnvelope {
    #[serde(rename = "Metadata")]
    metadata: Vec<MetadataEntry>,
}

#[derive(Debug, Deserialize)]
struct MetadataEntry {
    #[serde(rename = "Type")]
    kind: String,
    #[serde(rename = "Data", default)]
    data: MetadataData,
}

#[derive(Debug, Default, Deserialize)]
struct MetadataData {
    #[serde(rename = "Offset", default)]
    offset: u64,
    #[serde(rename = "Duration", default)]
    duration: u64,
    #[serde(rename = "text", default)]
    text: MetadataText,
}

#[derive(Debug, Default, Deserialize)]
struct MetadataText {
    #[serde(rename = "Text", default)]
    text: String,
}

/// 100-ns ticks to whole milliseconds, truncating.
#[inline]
pub const fn ticks_to_ms(ticks: u64) -> u64 {
    ticks / TICKS_PER_MILLISECOND
}

/// Parses an `audio.metadata` body, appending word boundaries to `out` in
/// entry order.
///
/// `SessionEnd` entries are skipped. An unknown entry type stops parsing with
/// an error; boundaries of the entries before it are already in `out`.
pub fn parse_metadata(body: &[u8], out: &mut Vec<WordBoundary>) -> TTSResult<()> {
    let envelope: MetadataEnvelope =
        serde_json::from_slice(body).map_err(|e| TTSError::MalformedMetadata(e.to_string()))?;

    out.reserve(envelope.metadata.len());
    for entry in envelope.metadata {
        match entry.kind.as_str() {
            METADATA_WORD_BOUNDARY => out.push(WordBoundary {
                offset_ms: ticks_to_ms(entry.data.offset),
                duration_ms: ticks_to_ms(entry.data.duration),
                text: entry.data.text.text,
            }),
            METADATA_SESSION_END => continue,
            other => return Err(TTSError::UnknownMetadataType(other.to_string())),
        }
    }

    Ok(())
}
