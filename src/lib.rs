//! Client for the aria2 download daemon's JSON-RPC interface.
//!
//! The core is a correlation engine ([`rpc::Connection`]) that multiplexes
//! any number of concurrent requests over one transport session, routes
//! server-pushed notifications to subscribers, and enforces per-call
//! timeouts. Two transports are provided: a persistent WebSocket channel
//! ([`transport::WsTransport`]) and a one-POST-per-call HTTP binding
//! ([`transport::HttpTransport`]).

pub mod config;
pub mod observability;
pub mod rpc;
pub mod transport;

pub use config::ClientConfig;
pub use rpc::{
    open, CallOptions, CallTimeout, Connection, MulticallCall, OpenOptions, RemoteError, RpcError,
    Subscription,
};
pub use transport::{HttpTransport, ReadyState, Transport, TransportError, WsTransport};

use std::sync::Arc;

/// Connect to an aria2 endpoint, picking the transport from the URL scheme.
///
/// `ws://` and `wss://` open a [`WsTransport`]; `http://` and `https://` an
/// [`HttpTransport`]. The session inherits the config's secret and default
/// request timeout.
pub async fn connect(config: &ClientConfig) -> Result<Connection, RpcError> {
    let transport: Arc<dyn Transport> = if config.is_websocket() {
        Arc::new(WsTransport::connect(&config.url).await?)
    } else {
        Arc::new(HttpTransport::new(&config.url)?)
    };

    let mut options = OpenOptions::new().timeout(config.timeout());
    if let Some(secret) = &config.secret {
        options = options.secret(secret);
    }
    open(transport, options).await
}
