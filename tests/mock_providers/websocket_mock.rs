//! WebSocket Mock Server for the Edge read-aloud service
//!
//! Records the handshake and the two setup messages of every connection,
//! then plays a scripted list of frames. The `synthesize` subprotocol is
//! echoed only when the client asks for it, or never with
//! [`SubprotocolReply::Omit`].

use bytes::Bytes;
use futures::{SinkExt, StreamExt};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::net::{TcpListener, TcpStream};
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::handshake::server::{ErrorResponse, Request, Response};
use tokio_tungstenite::tungstenite::http::HeaderValue;
use tokio_tungstenite::{accept_hdr_async, tungstenite::Message};

use waav_edge_tts::core::tts::edge::BinaryFrame;

/// One step of a scripted reply
#[derive(Debug, Clone)]
pub enum ScriptedFrame {
    Text(String),
    Binary(Bytes),
    /// Pause before the next step
    Delay(Duration),
    /// Send a close frame and stop
    Close,
    /// Stop sending without closing
    Hang,
}

impl ScriptedFrame {
    pub fn path(path: &str, body: &str) -> Self {
        Self::Text(format!(
            "X-RequestId:mock\r\nContent-Type:application/json; charset=utf-8\r\nPath:{path}\r\n\r\n{body}"
        ))
    }

    pub fn turn_start() -> Self {
        Self::path("turn.start", "{\"context\":{\"serviceTag\":\"mock\"}}")
    }

    pub fn turn_end() -> Self {
        Self::path("turn.end", "{}")
    }

    pub fn response() -> Self {
        Self::path("response", "{}")
    }

    pub fn audio(data: &[u8]) -> Self {
        Self::Binary(BinaryFrame::encode(
            b"X-RequestId:mock\r\nContent-Type:audio/mpeg\r\nPath:audio\r\n",
            data,
        ))
    }

    /// `audio.metadata` frame with one word boundary, times in 100-ns ticks
    pub fn word(text: &str, offset_ticks: u64, duration_ticks: u64) -> Self {
        Self::path(
            "audio.metadata",
            &format!(
                "{{\"Metadata\":[{{\"Type\":\"WordBoundary\",\"Data\":{{\"Offset\":{offset_ticks},\"Duration\":{duration_ticks},\"text\":{{\"Text\":\"{text}\",\"Length\":{},\"BoundaryType\":\"WordBoundary\"}}}}}}]}}",
                text.len()
            ),
        )
    }
}

/// A normal turn: start, the given audio chunks, end
pub fn simple_turn(chunks: &[&[u8]]) -> Vec<ScriptedFrame> {
    let mut frames = vec![ScriptedFrame::response(), ScriptedFrame::turn_start()];
    frames.extend(chunks.iter().map(|c| ScriptedFrame::audio(c)));
    frames.push(ScriptedFrame::turn_end());
    frames
}

/// What the client sent on one connection
#[derive(Debug, Clone, Default)]
pub struct RecordedConnection {
    pub uri: String,
    pub headers: Vec<(String, String)>,
    pub messages: Vec<String>,
}

impl RecordedConnection {
    pub fn header(&self, key: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(key))
            .map(|(_, v)| v.as_str())
    }
}

type Script = dyn Fn(&str) -> Vec<ScriptedFrame> + Send + Sync;

/// How the handshake answers a requested `Sec-WebSocket-Protocol`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SubprotocolReply {
    /// Echo `synthesize` when the client requested it
    #[default]
    Echo,
    /// Never send the header back
    Omit,
}

/// Mock Server State
pub struct EdgeMockState {
    pub connection_count: AtomicU64,
    pub active: AtomicU64,
    pub max_active: AtomicU64,
    pub connections: Mutex<Vec<RecordedConnection>>,
    subprotocol: SubprotocolReply,
    script: Box<Script>,
}

impl EdgeMockState {
    pub fn max_active(&self) -> u64 {
        self.max_active.load(Ordering::SeqCst)
    }

    pub fn connection_count(&self) -> u64 {
        self.connection_count.load(Ordering::SeqCst)
    }

    pub fn recorded(&self) -> Vec<RecordedConnection> {
        self.connections.lock().unwrap().clone()
    }
}

pub struct EdgeMockServer {
    pub addr: std::net::SocketAddr,
    pub state: Arc<EdgeMockState>,
    handle: JoinHandle<()>,
}

impl EdgeMockServer {
    /// Starts a server whose reply is computed from the received SSML message
    pub async fn start<F>(script: F) -> Self
    where
        F: Fn(&str) -> Vec<ScriptedFrame> + Send + Sync + 'static,
    {
        Self::start_with(SubprotocolReply::Echo, script).await
    }

    pub async fn start_with<F>(subprotocol: SubprotocolReply, script: F) -> Self
    where
        F: Fn(&str) -> Vec<ScriptedFrame> + Send + Sync + 'static,
    {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let state = Arc::new(EdgeMockState {
            connection_count: AtomicU64::new(0),
            active: AtomicU64::new(0),
            max_active: AtomicU64::new(0),
            connections: Mutex::new(Vec::new()),
            subprotocol,
            script: Box::new(script),
        });

        let server_state = state.clone();
        let handle = tokio::spawn(async move {
            while let Ok((stream, _)) = listener.accept().await {
                let state = server_state.clone();
                tokio::spawn(async move {
                    let _ = handle_connection(stream, state).await;
                });
            }
        });

        Self {
            addr,
            state,
            handle,
        }
    }

    /// Same script for every connection
    pub async fn with_frames(frames: Vec<ScriptedFrame>) -> Self {
        Self::start(move |_| frames.clone()).await
    }

    /// Same script for every connection, handshake never names a subprotocol
    pub async fn with_frames_no_subprotocol(frames: Vec<ScriptedFrame>) -> Self {
        Self::start_with(SubprotocolReply::Omit, move |_| frames.clone()).await
    }

    pub fn websocket_url(&self) -> String {
        format!("ws://{}/tts/cognitiveservices/websocket/v1", self.addr)
    }
}

impl Drop for EdgeMockServer {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

async fn handle_connection(
    stream: TcpStream,
    state: Arc<EdgeMockState>,
) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let mut recorded = RecordedConnection::default();
    let echo = state.subprotocol == SubprotocolReply::Echo;

    let ws_stream = accept_hdr_async(stream, |request: &Request, mut response: Response| {
        recorded.uri = request.uri().to_string();
        recorded.headers = request
            .headers()
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_str().unwrap_or_default().to_string()))
            .collect();
        let requested = request
            .headers()
            .get("Sec-WebSocket-Protocol")
            .and_then(|v| v.to_str().ok())
            .is_some_and(|v| v.split(',').any(|p| p.trim() == "synthesize"));
        if echo && requested {
            response
                .headers_mut()
                .insert("Sec-WebSocket-Protocol", HeaderValue::from_static("synthesize"));
        }
        Ok::<Response, ErrorResponse>(response)
    })
    .await?;
    let (mut write, mut read) = ws_stream.split();

    state.connection_count.fetch_add(1, Ordering::SeqCst);
    let now_active = state.active.fetch_add(1, Ordering::SeqCst) + 1;
    state.max_active.fetch_max(now_active, Ordering::SeqCst);

    // speech.config, then ssml
    while recorded.messages.len() < 2 {
        match read.next().await {
            Some(Ok(Message::Text(text))) => recorded.messages.push(text.as_str().to_string()),
            Some(Ok(_)) => continue,
            _ => {
                state.active.fetch_sub(1, Ordering::SeqCst);
                state.connections.lock().unwrap().push(recorded);
                return Ok(());
            }
        }
    }

    let frames = (state.script)(&recorded.messages[1]);
    state.connections.lock().unwrap().push(recorded);

    let mut released = false;
    let total = frames.len();
    for (i, frame) in frames.into_iter().enumerate() {
        // Leave the active set before the last frame goes out, so the
        // client can only observe the end after the count dropped.
        if i + 1 == total && !released {
            state.active.fetch_sub(1, Ordering::SeqCst);
            released = true;
        }
        match frame {
            ScriptedFrame::Text(text) => write.send(Message::Text(text.into())).await?,
            ScriptedFrame::Binary(data) => write.send(Message::Binary(data)).await?,
            ScriptedFrame::Delay(d) => tokio::time::sleep(d).await,
            ScriptedFrame::Close => {
                write.send(Message::Close(None)).await?;
                break;
            }
            ScriptedFrame::Hang => {
                tokio::time::sleep(Duration::from_secs(60)).await;
                break;
            }
        }
    }
    if !released {
        state.active.fetch_sub(1, Ordering::SeqCst);
    }

    // Drain until the client closes
    let _ = tokio::time::timeout(Duration::from_secs(5), async {
        while let Some(Ok(msg)) = read.next().await {
            if msg.is_close() {
                break;
            }
        }
    })
    .await;

    Ok(())
}
