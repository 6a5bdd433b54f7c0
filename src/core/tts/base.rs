//! Provider-independent TTS types.
//!
//! Everything a caller needs to consume a synthesis stream lives here: the
//! error taxonomy, the typed output chunks, the accumulated per-task output
//! and the [`SpeechSynthesizer`] seam used by the batch orchestrator.

use std::pin::Pin;
use std::time::Duration;

use bytes::{Bytes, BytesMut};
use futures::{Stream, StreamExt};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio_util::sync::CancellationToken;

use super::edge::SynthesisRequest;

// =============================================================================
// Errors
// =============================================================================

/// Coarse classification of a [`TTSError`].
///
/// Callers use this to decide what to do with a failure: validation errors are
/// never worth retrying, transport errors might be, protocol errors mean the
/// service dialect changed, and cancellation was requested by the caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Validation,
    Transport,
    Protocol,
    Cancellation,
}

/// Errors produced while preparing, running or consuming a synthesis session.
#[derive(Debug, Error)]
pub enum TTSError {
    // ---- validation -------------------------------------------------------
    #[error("Text must not be empty")]
    EmptyText,

    #[error("Invalid voice '{0}': expected a short name like 'en-US-AvaMultilingualNeural'")]
    InvalidVoice(String),

    #[error("Invalid rate '{0}': expected a signed percentage like '+12%' or '-34%'")]
    InvalidRate(String),

    #[error("Invalid volume '{0}': expected a signed percentage like '+12%' or '-34%'")]
    InvalidVolume(String),

    #[error("Invalid pitch '{0}': expected a signed hertz offset like '+5Hz' or '-10Hz'")]
    InvalidPitch(String),

    #[error("Unknown output format '{0}'")]
    InvalidOutputFormat(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),

    // ---- transport --------------------------------------------------------
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    #[error("WebSocket error: {0}")]
    WebSocket(String),

    #[error("Connection closed before the turn ended")]
    ConnectionClosed,

    #[error("No frame received within {0:?}")]
    Timeout(Duration),

    #[error("Voice catalog request failed: {0}")]
    VoiceCatalog(String),

    #[error("System clock unavailable: {0}")]
    ClockUnavailable(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    // ---- protocol ---------------------------------------------------------
    #[error("Malformed frame: {0}")]
    MalformedFrame(String),

    #[error("Response from the service not recognized (Path: {0:?})")]
    UnrecognizedResponse(Option<String>),

    #[error("Binary frame received outside of a turn")]
    UnexpectedBinaryFrame,

    #[error("Unexpected '{path}' while turn is {state}")]
    UnexpectedTurnTransition { path: String, state: &'static str },

    #[error("Malformed metadata: {0}")]
    MalformedMetadata(String),

    #[error("Unknown metadata type: {0}")]
    UnknownMetadataType(String),

    // ---- cancellation -----------------------------------------------------
    #[error("Synthesis cancelled")]
    Cancelled,
}

impl TTSError {
    /// Returns the taxonomy bucket this error belongs to.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::EmptyText
            | Self::InvalidVoice(_)
            | Self::InvalidRate(_)
            | Self::InvalidVolume(_)
            | Self::InvalidPitch(_)
            | Self::InvalidOutputFormat(_)
            | Self::InvalidConfiguration(_) => ErrorKind::Validation,

            Self::ConnectionFailed(_)
            | Self::WebSocket(_)
            | Self::ConnectionClosed
            | Self::Timeout(_)
            | Self::VoiceCatalog(_)
            | Self::ClockUnavailable(_)
            | Self::Io(_) => ErrorKind::Transport,

            Self::MalformedFrame(_)
            | Self::UnrecognizedResponse(_)
            | Self::UnexpectedBinaryFrame
            | Self::UnexpectedTurnTransition { .. }
            | Self::MalformedMetadata(_)
            | Self::UnknownMetadataType(_) => ErrorKind::Protocol,

            Self::Cancelled => ErrorKind::Cancellation,
        }
    }

    #[inline]
    pub fn is_cancelled(&self) -> bool {
        self.kind() == ErrorKind::Cancellation
    }
}

pub type TTSResult<T> = Result<T, TTSError>;

// =============================================================================
// Output chunks
// =============================================================================

/// Timing of one spoken word within the synthesized audio.
///
/// Serialized with lowercase keys so a list of boundaries can be written
/// straight to a subtitles/metadata JSON file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WordBoundary {
    /// Start of the word in the output audio, in milliseconds.
    #[serde(rename = "offset")]
    pub offset_ms: u64,
    /// Pronunciation duration, in milliseconds.
    #[serde(rename = "duration")]
    pub duration_ms: u64,
    /// The word (or unit) being spoken.
    pub text: String,
}

/// One unit of synthesis output, in the order the service sent it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OutputChunk {
    /// Opaque audio bytes in the requested output format.
    Audio(Bytes),
    /// Word-level timing metadata.
    WordBoundary(WordBoundary),
    /// End of the turn. Always the last item of a successful stream.
    End,
}

/// A lazily driven, single-pass stream of chunks.
///
/// The first `Err` item is always the last item.
pub type ChunkStream = Pin<Box<dyn Stream<Item = TTSResult<OutputChunk>> + Send>>;

// =============================================================================
// Accumulated output
// =============================================================================

/// Audio and metadata of one finished synthesis task.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SynthesisOutput {
    /// Concatenated audio payloads in arrival order.
    pub audio: Bytes,
    /// Word boundaries in arrival order.
    pub word_boundaries: Vec<WordBoundary>,
}

impl SynthesisOutput {
    /// Drains `stream` until `End`, concatenating audio and collecting metadata.
    ///
    /// `capacity_hint` pre-sizes the audio buffer. The first error aborts the
    /// drain and is returned; a stream that finishes without `End` is reported
    /// as [`TTSError::ConnectionClosed`].
    pub async fn collect(mut stream: ChunkStream, capacity_hint: usize) -> TTSResult<Self> {
        let mut audio = BytesMut::with_capacity(capacity_hint);
        let mut word_boundaries = Vec::new();

        while let Some(item) = stream.next().await {
            match item? {
                OutputChunk::Audio(data) => audio.extend_from_slice(&data),
                OutputChunk::WordBoundary(boundary) => word_boundaries.push(boundary),
                OutputChunk::End => {
                    return Ok(Self {
                        audio: audio.freeze(),
                        word_boundaries,
                    });
                }
            }
        }

        Err(TTSError::ConnectionClosed)
    }
}

// =============================================================================
// Synthesizer seam
// =============================================================================

/// Anything that can turn a [`SynthesisRequest`] into a chunk stream.
///
/// The Edge client implements this; the orchestrator only depends on the
/// trait so that batches can run against any backend.
#[async_trait::async_trait]
pub trait SpeechSynthesizer: Send + Sync {
    /// Returns a lazy stream for `request`. No I/O happens until first poll.
    fn stream(&self, request: SynthesisRequest, cancel: CancellationToken) -> ChunkStream;

    /// Runs `request` to completion and returns its accumulated output.
    async fn synthesize(
        &self,
        request: SynthesisRequest,
        cancel: CancellationToken,
    ) -> TTSResult<SynthesisOutput> {
        let capacity = request.estimated_audio_len();
        SynthesisOutput::collect(self.stream(request, cancel), capacity).await
    }
}
