//! Request/reply transport over HTTP POST.

use std::sync::Arc;

use async_trait::async_trait;
use reqwest::header::CONTENT_TYPE;
use tokio::sync::{broadcast, watch};

use super::{ReadyState, Transport, TransportError};

const INBOUND_CHANNEL_CAPACITY: usize = 256;

/// One-shot transport: each `send` issues a single POST and the response
/// body comes back as a synthesized inbound message. Born `Open`; `close`
/// flips straight to `Closed` since there is no underlying channel to tear
/// down.
pub struct HttpTransport {
    client: reqwest::Client,
    url: reqwest::Url,
    state: Arc<watch::Sender<ReadyState>>,
    inbound: broadcast::Sender<String>,
}

impl HttpTransport {
    pub fn new(url: &str) -> Result<Self, TransportError> {
        let url = reqwest::Url::parse(url).map_err(|e| TransportError::Connect(e.to_string()))?;
        let (state, _) = watch::channel(ReadyState::Open);
        let (inbound, _) = broadcast::channel(INBOUND_CHANNEL_CAPACITY);
        Ok(Self {
            client: reqwest::Client::new(),
            url,
            state: Arc::new(state),
            inbound,
        })
    }
}

#[async_trait]
impl Transport for HttpTransport {
    fn ready_state(&self) -> ReadyState {
        *self.state.borrow()
    }

    async fn send(&self, text: String) -> Result<(), TransportError> {
        if self.ready_state() != ReadyState::Open {
            return Err(TransportError::Closed);
        }
        let response = self
            .client
            .post(self.url.clone())
            .header(CONTENT_TYPE, "application/json")
            .body(text)
            .send()
            .await
            .map_err(|e| TransportError::Send(e.to_string()))?;
        let body = response
            .bytes()
            .await
            .map_err(|e| TransportError::Send(e.to_string()))?;
        let _ = self.inbound.send(decode_body(&body)?);
        Ok(())
    }

    fn messages(&self) -> broadcast::Receiver<String> {
        self.inbound.subscribe()
    }

    async fn wait_open(&self) -> Result<(), TransportError> {
        match self.ready_state() {
            ReadyState::Open => Ok(()),
            _ => Err(TransportError::Closed),
        }
    }

    async fn close(&self, _code: Option<u16>, _reason: Option<&str>) -> Result<(), TransportError> {
        self.state.send_replace(ReadyState::Closed);
        Ok(())
    }
}

/// Decode a response body, which may arrive as raw binary chunks, into the
/// text payload the dispatcher consumes.
fn decode_body(bytes: &[u8]) -> Result<String, TransportError> {
    std::str::from_utf8(bytes)
        .map(str::to_owned)
        .map_err(|e| TransportError::Payload(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decode_body_accepts_utf8() {
        assert_eq!(decode_body(b"{\"id\":\"1\"}").unwrap(), "{\"id\":\"1\"}");
    }

    #[test]
    fn decode_body_rejects_invalid_utf8() {
        assert!(decode_body(&[0xff, 0xfe]).is_err());
    }

    #[tokio::test]
    async fn closed_transport_refuses_send() {
        let transport = HttpTransport::new("http://127.0.0.1:1/jsonrpc").unwrap();
        transport.close(None, None).await.unwrap();
        assert_eq!(transport.ready_state(), ReadyState::Closed);
        let err = transport.send("{}".into()).await.unwrap_err();
        assert!(matches!(err, TransportError::Closed));
    }
}
