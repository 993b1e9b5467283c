//! Persistent WebSocket transport.

use std::borrow::Cow;
use std::sync::Arc;

use async_trait::async_trait;
use futures::stream::{SplitSink, SplitStream};
use futures::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio::sync::{broadcast, watch, Mutex};
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;
use tokio_tungstenite::tungstenite::protocol::CloseFrame;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};
use tracing::{debug, warn};

use super::{ReadyState, Transport, TransportError};

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

const INBOUND_CHANNEL_CAPACITY: usize = 256;

/// Push transport over a WebSocket connection.
///
/// Writes go through a mutex-held sink so a send failure surfaces to the
/// caller that issued it. A reader task forwards inbound text frames to the
/// broadcast channel and tracks readiness: a Close frame moves the state to
/// `Closing`, stream end or a read error to `Closed`.
pub struct WsTransport {
    sink: Mutex<SplitSink<WsStream, Message>>,
    state: Arc<watch::Sender<ReadyState>>,
    inbound: broadcast::Sender<String>,
}

impl WsTransport {
    /// Connect to a `ws://` or `wss://` endpoint.
    pub async fn connect(url: &str) -> Result<Self, TransportError> {
        let (ws, _response) = connect_async(url)
            .await
            .map_err(|e| TransportError::Connect(e.to_string()))?;
        let (sink, stream) = ws.split();

        let (state, _) = watch::channel(ReadyState::Open);
        let state = Arc::new(state);
        let (inbound, _) = broadcast::channel(INBOUND_CHANNEL_CAPACITY);

        tokio::spawn(read_loop(stream, inbound.clone(), state.clone()));

        Ok(Self {
            sink: Mutex::new(sink),
            state,
            inbound,
        })
    }
}

#[async_trait]
impl Transport for WsTransport {
    fn ready_state(&self) -> ReadyState {
        *self.state.borrow()
    }

    async fn send(&self, text: String) -> Result<(), TransportError> {
        if self.ready_state() != ReadyState::Open {
            return Err(TransportError::Closed);
        }
        self.sink
            .lock()
            .await
            .send(Message::Text(text))
            .await
            .map_err(|e| TransportError::Send(e.to_string()))
    }

    fn messages(&self) -> broadcast::Receiver<String> {
        self.inbound.subscribe()
    }

    async fn wait_open(&self) -> Result<(), TransportError> {
        let mut rx = self.state.subscribe();
        loop {
            match *rx.borrow_and_update() {
                ReadyState::Open => return Ok(()),
                ReadyState::Closing | ReadyState::Closed => return Err(TransportError::Closed),
                ReadyState::Connecting => {}
            }
            if rx.changed().await.is_err() {
                return Err(TransportError::Closed);
            }
        }
    }

    async fn close(&self, code: Option<u16>, reason: Option<&str>) -> Result<(), TransportError> {
        self.state.send_replace(ReadyState::Closing);
        let frame = CloseFrame {
            code: code.map(CloseCode::from).unwrap_or(CloseCode::Normal),
            reason: Cow::Owned(reason.unwrap_or_default().to_string()),
        };
        let result = self
            .sink
            .lock()
            .await
            .send(Message::Close(Some(frame)))
            .await
            .map_err(|e| TransportError::Send(e.to_string()));
        self.state.send_replace(ReadyState::Closed);
        result
    }
}

async fn read_loop(
    mut stream: SplitStream<WsStream>,
    inbound: broadcast::Sender<String>,
    state: Arc<watch::Sender<ReadyState>>,
) {
    while let Some(frame) = stream.next().await {
        match frame {
            Ok(Message::Text(text)) => {
                let _ = inbound.send(text);
            }
            Ok(Message::Binary(bytes)) => match String::from_utf8(bytes) {
                Ok(text) => {
                    let _ = inbound.send(text);
                }
                Err(_) => debug!("dropping non-utf8 binary frame"),
            },
            Ok(Message::Close(frame)) => {
                debug!(?frame, "server closed the connection");
                state.send_replace(ReadyState::Closing);
            }
            // Ping/pong are answered by tungstenite itself.
            Ok(_) => {}
            Err(e) => {
                warn!(error = %e, "websocket read failed");
                break;
            }
        }
    }
    state.send_replace(ReadyState::Closed);
}
