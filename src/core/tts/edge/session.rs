//! Edge TTS session protocol.
//!
//! [`TurnStateMachine`] is a pure classifier: raw frames in, typed
//! [`OutputChunk`]s out. [`SynthesisSession`] owns one socket, sends the two
//! setup messages and feeds every inbound frame through the state machine,
//! one read at a time.

use std::collections::VecDeque;
use std::time::Duration;

use bytes::Bytes;
use futures::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio::time::timeout;
use tokio_tungstenite::tungstenite::protocol::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::config::SynthesisRequest;
use super::messages::{
    self, BinaryFrame, PATH_AUDIO_METADATA, PATH_RESPONSE, PATH_TURN_END, PATH_TURN_START,
    TextFrame,
};
use crate::core::tts::base::{OutputChunk, TTSError, TTSResult};

/// Socket type produced by `connect_async`.
pub type EdgeSocket = WebSocketStream<MaybeTlsStream<TcpStream>>;

// =============================================================================
// Turn state machine
// =============================================================================

/// Position of a session within its single turn. Only moves forward.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TurnState {
    #[default]
    AwaitingTurnStart,
    InTurn,
    TurnEnded,
}

impl TurnState {
    #[inline]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::AwaitingTurnStart => "awaiting turn start",
            Self::InTurn => "in turn",
            Self::TurnEnded => "ended",
        }
    }
}

/// Classifies inbound frames according to the turn lifecycle.
#[derive(Debug, Default)]
pub struct TurnStateMachine {
    state: TurnState,
}

impl TurnStateMachine {
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    pub fn state(&self) -> TurnState {
        self.state
    }

    #[inline]
    pub fn is_finished(&self) -> bool {
        self.state == TurnState::TurnEnded
    }

    /// Handles one text frame, appending its chunks to `out`. `turn.end`
    /// yields [`OutputChunk::End`].
    ///
    /// On a metadata error the boundaries parsed before the bad entry are
    /// still appended.
    pub fn on_text<E>(&mut self, raw: impl Into<Bytes>, out: &mut E) -> TTSResult<()>
    where
        E: Extend<OutputChunk>,
    {
        let frame = TextFrame::decode(raw)?;
        let path = frame.path();

        if self.is_finished() {
            return Err(TTSError::UnexpectedTurnTransition {
                path: path.unwrap_or_default().to_string(),
                state: self.state.as_str(),
            });
        }

        match path {
            Some(PATH_TURN_START) => {
                if self.state != TurnState::AwaitingTurnStart {
                    return Err(TTSError::UnexpectedTurnTransition {
                        path: PATH_TURN_START.to_string(),
                        state: self.state.as_str(),
                    });
                }
                self.state = TurnState::InTurn;
                Ok(())
            }
            Some(PATH_TURN_END) => {
                self.state = TurnState::TurnEnded;
                out.extend([OutputChunk::End]);
                Ok(())
            }
            Some(PATH_AUDIO_METADATA) => {
                let mut boundaries = Vec::new();
                let parsed = messages::parse_metadata(&frame.body, &mut boundaries);
                out.extend(boundaries.into_iter().map(OutputChunk::WordBoundary));
                parsed
            }
            Some(PATH_RESPONSE) => Ok(()),
            other => Err(TTSError::UnrecognizedResponse(other.map(str::to_string))),
        }
    }

    /// Handles one binary frame. Rejected unless a turn is in progress.
    pub fn on_binary(&mut self, raw: impl Into<Bytes>) -> TTSResult<OutputChunk> {
        if self.state != TurnState::InTurn {
            return Err(TTSError::UnexpectedBinaryFrame);
        }
        let frame = BinaryFrame::decode(raw)?;
        Ok(OutputChunk::Audio(frame.audio))
    }
}

// =============================================================================
// Session
// =============================================================================

/// One synthesis turn over one WebSocket connection.
pub struct SynthesisSession {
    socket: EdgeSocket,
    machine: TurnStateMachine,
    pending: VecDeque<OutputChunk>,
    /// Error to report once `pending` is drained.
    failure: Option<TTSError>,
    read_timeout: Option<Duration>,
    request_id: String,
}

impl SynthesisSession {
    /// Sends `speech.config` and the SSML for `request` on a fresh socket.
    ///
    /// The sends are raced against `cancel`.
    pub async fn start(
        mut socket: EdgeSocket,
        request: &SynthesisRequest,
        read_timeout: Option<Duration>,
        cancel: &CancellationToken,
    ) -> TTSResult<Self> {
        let request_id = Uuid::new_v4().simple().to_string();
        let timestamp = messages::current_timestamp()?;

        let config = messages::encode_config_message(&timestamp, request.output_format());
        let ssml = messages::build_ssml(request);
        let ssml_message = messages::encode_ssml_message(&request_id, &timestamp, &ssml);

        let setup = async {
            socket
                .send(Message::Text(config.into()))
                .await
                .map_err(|e| TTSError::WebSocket(format!("Failed to send speech.config: {e}")))?;
            socket
                .send(Message::Text(ssml_message.into()))
                .await
                .map_err(|e| TTSError::WebSocket(format!("Failed to send SSML: {e}")))
        };

        tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                debug!(request_id = %request_id, "Edge TTS session cancelled during setup");
                return Err(TTSError::Cancelled);
            }
            sent = setup => sent?,
        }

        debug!(
            request_id = %request_id,
            voice = request.voice().short_name(),
            format = request.output_format().as_str(),
            "Sent Edge TTS setup messages"
        );

        Ok(Self {
            socket,
            machine: TurnStateMachine::new(),
            pending: VecDeque::new(),
            failure: None,
            read_timeout,
            request_id,
        })
    }

    #[inline]
    pub fn request_id(&self) -> &str {
        &self.request_id
    }

    #[inline]
    pub fn state(&self) -> TurnState {
        self.machine.state()
    }

    /// Next chunk of the turn, or `None` once `End` has been handed out.
    ///
    /// Performs at most one socket read per buffered-chunk refill. The read
    /// is raced against `cancel`. Chunks decoded from a frame ahead of a
    /// protocol error are handed out before the error.
    pub async fn next_chunk(
        &mut self,
        cancel: &CancellationToken,
    ) -> TTSResult<Option<OutputChunk>> {
        loop {
            if let Some(chunk) = self.pending.pop_front() {
                return Ok(Some(chunk));
            }
            if let Some(e) = self.failure.take() {
                return Err(e);
            }
            if self.machine.is_finished() {
                return Ok(None);
            }

            let message = tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    debug!(request_id = %self.request_id, "Edge TTS session cancelled");
                    return Err(TTSError::Cancelled);
                }
                message = Self::read_message(&mut self.socket, self.read_timeout) => message?,
            };

            match message {
                Message::Text(text) => {
                    let was_waiting = self.machine.state() == TurnState::AwaitingTurnStart;
                    let handled = self.machine.on_text(Bytes::from(text), &mut self.pending);
                    if was_waiting && self.machine.state() == TurnState::InTurn {
                        debug!(request_id = %self.request_id, "Edge TTS turn started");
                    }
                    if self.machine.is_finished() {
                        info!(request_id = %self.request_id, "Edge TTS turn ended");
                    }
                    if let Err(e) = handled {
                        self.failure = Some(e);
                    }
                }
                Message::Binary(data) => {
                    let chunk = self.machine.on_binary(data)?;
                    self.pending.push_back(chunk);
                }
                Message::Ping(_) | Message::Pong(_) | Message::Frame(_) => {}
                Message::Close(frame) => {
                    warn!(
                        request_id = %self.request_id,
                        state = self.machine.state().as_str(),
                        "Edge TTS socket closed mid-turn: {:?}",
                        frame
                    );
                    return Err(TTSError::ConnectionClosed);
                }
            }
        }
    }

    async fn read_message(
        socket: &mut EdgeSocket,
        read_timeout: Option<Duration>,
    ) -> TTSResult<Message> {
        let next = match read_timeout {
            Some(limit) => timeout(limit, socket.next())
                .await
                .map_err(|_| TTSError::Timeout(limit))?,
            None => socket.next().await,
        };

        match next {
            Some(Ok(message)) => Ok(message),
            Some(Err(e)) => Err(TTSError::WebSocket(e.to_string())),
            None => Err(TTSError::ConnectionClosed),
        }
    }

    /// Sends a close frame. Failures are logged and ignored.
    pub async fn close(mut self) {
        if let Err(e) = self.socket.close(None).await {
            debug!(request_id = %self.request_id, "Error closing Edge TTS socket: {e}");
        }
    }
}
