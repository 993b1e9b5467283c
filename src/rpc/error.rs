use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

use crate::transport::TransportError;

#[derive(Debug, Error)]
pub enum RpcError {
    #[error("socket is not open")]
    NotOpen,
    #[error("socket is closing")]
    SocketClosing,
    #[error("socket is closed")]
    SocketClosed,
    #[error("transport: {0}")]
    Transport(#[from] TransportError),
    #[error("timeout of {0}ms exceeded")]
    Timeout(u64),
    #[error(transparent)]
    Remote(RemoteError),
    #[error("connection closed")]
    ConnectionClosed,
    #[error("codec: {0}")]
    Codec(#[from] serde_json::Error),
}

/// Error payload reported by the server for a specific request.
#[derive(Debug, Clone, Serialize, Deserialize, Error)]
#[error("server error {code}: {message}")]
pub struct RemoteError {
    #[serde(default)]
    pub code: i64,
    #[serde(default)]
    pub message: String,
}

impl From<Value> for RemoteError {
    fn from(value: Value) -> Self {
        serde_json::from_value(value.clone()).unwrap_or(RemoteError {
            code: 0,
            message: value.to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn remote_error_from_structured_payload() {
        let err = RemoteError::from(json!({"code": 1, "message": "Unauthorized"}));
        assert_eq!(err.code, 1);
        assert_eq!(err.message, "Unauthorized");
    }

    #[test]
    fn remote_error_from_unstructured_payload_keeps_raw_text() {
        let err = RemoteError::from(json!("boom"));
        assert_eq!(err.code, 0);
        assert_eq!(err.message, "\"boom\"");
    }
}
