//! Edge TTS client.
//!
//! [`EdgeTts`] is cheap to clone; every clone shares the same immutable
//! configuration and HTTP client. Each synthesis opens its own socket.

use std::sync::Arc;

use http::header::{HeaderName, HeaderValue, SEC_WEBSOCKET_PROTOCOL};
use tokio::time::timeout;
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

use super::config::{EdgeConnectionConfig, SynthesisRequest};
use super::session::{EdgeSocket, SynthesisSession};
use super::signer::TokenSigner;
use super::voices::{self, VoiceDescriptor};
use crate::core::tts::base::{
    ChunkStream, OutputChunk, SpeechSynthesizer, SynthesisOutput, TTSError, TTSResult,
};

struct EdgeTtsInner {
    config: EdgeConnectionConfig,
    signer: TokenSigner,
    http: reqwest::Client,
}

/// Streaming client for the Edge read-aloud service.
#[derive(Clone)]
pub struct EdgeTts {
    inner: Arc<EdgeTtsInner>,
}

impl std::fmt::Debug for EdgeTts {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EdgeTts")
            .field("websocket_url", &self.inner.config.websocket_url)
            .field("chromium_full_version", &self.inner.config.chromium_full_version)
            .finish()
    }
}

impl EdgeTts {
    /// Creates a client after validating `config`.
    pub fn new(config: EdgeConnectionConfig) -> TTSResult<Self> {
        config.validate().map_err(TTSError::InvalidConfiguration)?;

        let http = reqwest::Client::builder()
            .connect_timeout(config.connect_timeout)
            .build()
            .map_err(|e| TTSError::InvalidConfiguration(format!("HTTP client: {e}")))?;

        Ok(Self::from_parts(config, http))
    }

    /// Client for the public Edge endpoints with the built-in signature.
    pub fn with_defaults() -> Self {
        Self::from_parts(EdgeConnectionConfig::default(), reqwest::Client::new())
    }

    fn from_parts(config: EdgeConnectionConfig, http: reqwest::Client) -> Self {
        let signer = TokenSigner::new(
            config.trusted_client_token.clone(),
            config.sec_ms_gec_version(),
        );
        Self {
            inner: Arc::new(EdgeTtsInner {
                config,
                signer,
                http,
            }),
        }
    }

    #[inline]
    pub fn config(&self) -> &EdgeConnectionConfig {
        &self.inner.config
    }

    #[inline]
    pub fn signer(&self) -> &TokenSigner {
        &self.inner.signer
    }

    /// Opens a signed WebSocket with the impersonation headers.
    async fn connect(&self) -> TTSResult<EdgeSocket> {
        let config = &self.inner.config;
        let url = self.inner.signer.sign(&config.websocket_url)?;

        let mut request = url
            .as_str()
            .into_client_request()
            .map_err(|e| TTSError::ConnectionFailed(format!("Invalid WebSocket request: {e}")))?;

        // tungstenite fails the handshake when a requested subprotocol is not
        // echoed back, and the service does not always echo it.
        for (key, value) in config
            .headers
            .websocket_headers()
            .filter(|(key, _)| !key.eq_ignore_ascii_case(SEC_WEBSOCKET_PROTOCOL.as_str()))
        {
            let name = HeaderName::from_bytes(key.as_bytes())
                .map_err(|e| TTSError::InvalidConfiguration(format!("Header '{key}': {e}")))?;
            let value = HeaderValue::from_str(value)
                .map_err(|e| TTSError::InvalidConfiguration(format!("Header '{key}': {e}")))?;
            request.headers_mut().insert(name, value);
        }

        debug!(url = %config.websocket_url, "Connecting to Edge TTS");

        let (socket, _response) = timeout(config.connect_timeout, connect_async(request))
            .await
            .map_err(|_| {
                error!(
                    "Connection to Edge TTS timed out after {:?}",
                    config.connect_timeout
                );
                TTSError::Timeout(config.connect_timeout)
            })?
            .map_err(|e| {
                let err = TTSError::ConnectionFailed(format!("Failed to connect to Edge TTS: {e}"));
                error!("{}", err);
                err
            })?;

        info!("Connected to Edge TTS WebSocket");
        Ok(socket)
    }

    /// Connects and sends the setup messages for `request`.
    ///
    /// `cancel` is checked before connecting and raced against the
    /// handshake and the setup sends.
    pub async fn open_session(
        &self,
        request: &SynthesisRequest,
        cancel: &CancellationToken,
    ) -> TTSResult<SynthesisSession> {
        if cancel.is_cancelled() {
            return Err(TTSError::Cancelled);
        }

        let socket = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(TTSError::Cancelled),
            socket = self.connect() => socket?,
        };

        SynthesisSession::start(socket, request, self.inner.config.read_timeout, cancel).await
    }

    /// Lazy chunk stream for `request`.
    ///
    /// Nothing happens until the first poll. The socket is closed after
    /// `End` and dropped on error, cancellation, or when the stream is
    /// dropped early.
    pub fn stream(&self, request: SynthesisRequest, cancel: CancellationToken) -> ChunkStream {
        let client = self.clone();

        Box::pin(async_stream::stream! {
            let mut session = match client.open_session(&request, &cancel).await {
                Ok(session) => session,
                Err(e) => {
                    yield Err(e);
                    return;
                }
            };

            loop {
                match session.next_chunk(&cancel).await {
                    Ok(Some(OutputChunk::End)) => {
                        session.close().await;
                        yield Ok(OutputChunk::End);
                        return;
                    }
                    Ok(Some(chunk)) => yield Ok(chunk),
                    Ok(None) => break,
                    Err(e) => {
                        debug!(
                            request_id = session.request_id(),
                            state = session.state().as_str(),
                            "Edge TTS session failed: {e}"
                        );
                        yield Err(e);
                        return;
                    }
                }
            }

            session.close().await;
        })
    }

    /// Runs `request` to completion.
    pub async fn synthesize(
        &self,
        request: SynthesisRequest,
        cancel: CancellationToken,
    ) -> TTSResult<SynthesisOutput> {
        let capacity = request.estimated_audio_len();
        SynthesisOutput::collect(self.stream(request, cancel), capacity).await
    }

    /// Downloads the voice catalog.
    pub async fn list_voices(&self) -> TTSResult<Vec<VoiceDescriptor>> {
        voices::fetch_voices(&self.inner.http, &self.inner.config, &self.inner.signer).await
    }
}

#[async_trait::async_trait]
impl SpeechSynthesizer for EdgeTts {
    fn stream(&self, request: SynthesisRequest, cancel: CancellationToken) -> ChunkStream {
        EdgeTts::stream(self, request, cancel)
    }

    async fn synthesize(
        &self,
        request: SynthesisRequest,
        cancel: CancellationToken,
    ) -> TTSResult<SynthesisOutput> {
        EdgeTts::synthesize(self, request, cancel).await
    }
}
