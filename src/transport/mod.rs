//! Transport capability: the contract a session runs over.
//!
//! Two shapes exist. The WebSocket transport is a persistent push channel
//! that can deliver inbound messages at any time; the HTTP transport maps
//! each send to one POST whose response body is synthesized back as an
//! inbound message. The correlation engine treats both identically.

mod http;
mod ws;

pub use http::HttpTransport;
pub use ws::WsTransport;

use async_trait::async_trait;
use thiserror::Error;
use tokio::sync::broadcast;

/// Readiness of a transport, aligned with WebSocket readyState codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum ReadyState {
    Connecting = 0,
    Open = 1,
    Closing = 2,
    Closed = 3,
}

#[derive(Debug, Clone, Error)]
pub enum TransportError {
    #[error("connect failed: {0}")]
    Connect(String),
    #[error("send failed: {0}")]
    Send(String),
    #[error("invalid payload: {0}")]
    Payload(String),
    #[error("transport closed")]
    Closed,
}

/// Contract any transport must satisfy to carry a session.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Current readiness. Sends are only legal while `Open`.
    fn ready_state(&self) -> ReadyState;

    /// Transmit one text payload. A failure here is reported to the caller
    /// that issued the payload, never swallowed.
    async fn send(&self, text: String) -> Result<(), TransportError>;

    /// Subscribe to inbound message payloads. Fires arbitrarily many times
    /// for a push transport, exactly once per send for a request/reply one.
    fn messages(&self) -> broadcast::Receiver<String>;

    /// Wait for the transport to transition into `Open`. Returns an error if
    /// it closes (or is already closed) instead.
    async fn wait_open(&self) -> Result<(), TransportError>;

    /// Close the transport with an optional code and reason.
    async fn close(&self, code: Option<u16>, reason: Option<&str>) -> Result<(), TransportError>;
}
