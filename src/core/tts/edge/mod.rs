//! Microsoft Edge read-aloud TTS provider.
//!
//! This module speaks the WebSocket dialect used by the Edge browser's
//! "Read aloud" feature: a signed connection URL, pseudo-HTTP text frames for
//! control messages and length-prefixed binary frames for audio, all on one
//! socket.
//!
//! # Session lifecycle
//!
//! ```text
//! client                                   service
//!   │── speech.config (text) ───────────────▶│
//!   │── ssml (text) ────────────────────────▶│
//!   │◀──────────────────────── turn.start ───│
//!   │◀──────────── audio (binary) / audio.metadata (text) ... ─│
//!   │◀───────────────────────── turn.end ────│
//! ```
//!
//! # Example
//!
//! ```rust,no_run
//! use futures::StreamExt;
//! use tokio_util::sync::CancellationToken;
//! use waav_edge_tts::core::tts::{EdgeTts, OutputChunk, SynthesisOptions, SynthesisRequest};
//!
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! let tts = EdgeTts::with_defaults();
//! let request = SynthesisRequest::new("Hello, world!", &SynthesisOptions::default())?;
//!
//! let mut stream = tts.stream(request, CancellationToken::new());
//! while let Some(chunk) = stream.next().await {
//!     match chunk? {
//!         OutputChunk::Audio(bytes) => println!("{} audio bytes", bytes.len()),
//!         OutputChunk::WordBoundary(word) => println!("{word:?}"),
//!         OutputChunk::End => break,
//!     }
//! }
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod messages;
pub mod provider;
pub mod session;
pub mod signer;
pub mod voices;


pub use config::{
    ClientHeaders, EdgeConnectionConfig, OutputFormat, SynthesisOptions, SynthesisRequest, Voice,
};
pub use messages::{BinaryFrame, TextFrame};
pub use provider::EdgeTts;
pub use session::{SynthesisSession, TurnState, TurnStateMachine};
pub use signer::{ConnectionSignature, TokenSigner};
pub use voices::{VoiceDescriptor, VoiceTag};

// =============================================================================
// Service Constants
// =============================================================================

/// Synthesis WebSocket endpoint (unsigned).
pub const EDGE_TTS_URL: &str =
    "wss://api.msedgeservices.com/tts/cognitiveservices/websocket/v1";

/// Voice catalog endpoint (unsigned).
pub const EDGE_VOICE_LIST_URL: &str =
    "https://api.msedgeservices.com/tts/cognitiveservices/voices/list";

/// Client token baked into the Edge browser; doubles as the subscription key.
pub const TRUSTED_CLIENT_TOKEN: &str = "6A5AA1D4EAFF4E9FB37E23D68491D6F4";

/// Chromium build impersonated by the client signature and headers.
pub const CHROMIUM_FULL_VERSION: &str = "140.0.3485.14";

/// Origin sent by the Edge read-aloud extension.
pub const EDGE_ORIGIN: &str = "chrome-extension://jdiccldimpdaibmpdkjnbmckianbfold";

/// WebSocket subprotocol listed in the browser's socket headers.
pub const SYNTHESIZE_SUBPROTOCOL: &str = "synthesize";

/// Prefix of the service's verbose voice names.
pub const VOICE_NAME_PREFIX: &str = "Microsoft Server Speech Text to Speech Voice";

// =============================================================================
// Defaults
// =============================================================================

/// Default voice short name.
pub const DEFAULT_VOICE: &str = "en-US-AvaMultilingualNeural";

/// Default rate/volume delta.
pub const DEFAULT_PERCENT: &str = "+0%";

/// Default pitch delta.
pub const DEFAULT_PITCH: &str = "+0Hz";

/// Default size of the batch worker pool.
pub const DEFAULT_MAX_CONCURRENCY: usize = 16;

/// Default WebSocket handshake timeout in seconds.
pub const DEFAULT_CONNECT_TIMEOUT_SECS: u64 = 30;

// =============================================================================
// Protocol Constants
// =============================================================================

/// Seconds between 1601-01-01 (Windows file time epoch) and 1970-01-01.
pub const WINDOWS_EPOCH_OFFSET_SECONDS: u64 = 11_644_473_600;

/// Width of a signature window in seconds.
pub const SIGNATURE_WINDOW_SECONDS: u64 = 300;

/// Number of 100-nanosecond ticks per second.
pub const TICKS_PER_SECOND: u64 = 10_000_000;

/// Number of 100-nanosecond ticks per millisecond.
pub const TICKS_PER_MILLISECOND: u64 = 10_000;
