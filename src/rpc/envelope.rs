//! JSON-RPC envelope codec: builds outbound request envelopes and
//! classifies inbound payloads.

use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Serialize)]
struct RequestEnvelope<'a> {
    jsonrpc: &'static str,
    id: &'a str,
    method: &'a str,
    params: &'a [Value],
}

pub fn encode_request(id: &str, method: &str, params: &[Value]) -> Result<String, serde_json::Error> {
    serde_json::to_string(&RequestEnvelope {
        jsonrpc: "2.0",
        id,
        method,
        params,
    })
}

/// One decoded inbound payload.
#[derive(Debug)]
pub enum Inbound {
    /// Server-pushed message with no correlation id; fanned out to
    /// notification subscribers.
    Notification { method: String, params: Vec<Value> },
    /// Reply to an outstanding request, success or server-reported error.
    Response {
        id: String,
        outcome: Result<Value, Value>,
    },
    /// Error with no correlation id and no method.
    BareError(Value),
    /// Matches none of the above; dropped without effect.
    Unroutable,
}

#[derive(Debug, Deserialize)]
struct RawEnvelope {
    #[serde(default)]
    id: Option<Value>,
    #[serde(default)]
    method: Option<String>,
    #[serde(default)]
    params: Option<Vec<Value>>,
    #[serde(default)]
    result: Option<Value>,
    #[serde(default)]
    error: Option<Value>,
}

/// Classify one inbound payload. A JSON `null` in `id` or `result` counts as
/// absent, matching the wire contract.
pub fn classify(text: &str) -> Result<Inbound, serde_json::Error> {
    let raw: RawEnvelope = serde_json::from_str(text)?;

    if let Some(method) = raw.method {
        return Ok(Inbound::Notification {
            method,
            params: raw.params.unwrap_or_default(),
        });
    }

    if raw.result.is_some() || raw.error.is_some() {
        if let Some(id) = raw.id {
            let outcome = match raw.error {
                Some(error) => Err(error),
                None => Ok(raw.result.unwrap_or(Value::Null)),
            };
            return Ok(Inbound::Response {
                id: id_key(&id),
                outcome,
            });
        }
        if let Some(error) = raw.error {
            return Ok(Inbound::BareError(error));
        }
    }

    Ok(Inbound::Unroutable)
}

// We always send string ids, but a server echoing a number back should still
// correlate, so non-string ids are keyed by their JSON text.
fn id_key(id: &Value) -> String {
    match id.as_str() {
        Some(s) => s.to_string(),
        None => id.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn encode_request_matches_wire_format() {
        let text = encode_request("abc", "aria2.tellActive", &[json!("token:s")]).unwrap();
        let value: Value = serde_json::from_str(&text).unwrap();
        assert_eq!(
            value,
            json!({
                "jsonrpc": "2.0",
                "id": "abc",
                "method": "aria2.tellActive",
                "params": ["token:s"],
            })
        );
    }

    #[test]
    fn classify_notification() {
        let inbound = classify(r#"{"method":"aria2.onDownloadStart","params":["gid1"]}"#).unwrap();
        match inbound {
            Inbound::Notification { method, params } => {
                assert_eq!(method, "aria2.onDownloadStart");
                assert_eq!(params, vec![json!("gid1")]);
            }
            other => panic!("expected notification, got {other:?}"),
        }
    }

    #[test]
    fn classify_success_response() {
        let inbound = classify(r#"{"id":"x","result":[]}"#).unwrap();
        match inbound {
            Inbound::Response { id, outcome } => {
                assert_eq!(id, "x");
                assert_eq!(outcome.unwrap(), json!([]));
            }
            other => panic!("expected response, got {other:?}"),
        }
    }

    #[test]
    fn classify_error_response() {
        let inbound =
            classify(r#"{"id":"x","error":{"code":1,"message":"Unauthorized"}}"#).unwrap();
        match inbound {
            Inbound::Response { id, outcome } => {
                assert_eq!(id, "x");
                assert_eq!(outcome.unwrap_err()["code"], json!(1));
            }
            other => panic!("expected response, got {other:?}"),
        }
    }

    #[test]
    fn classify_numeric_id_uses_json_text() {
        let inbound = classify(r#"{"id":7,"result":"ok"}"#).unwrap();
        match inbound {
            Inbound::Response { id, .. } => assert_eq!(id, "7"),
            other => panic!("expected response, got {other:?}"),
        }
    }

    #[test]
    fn classify_bare_error() {
        let inbound = classify(r#"{"error":{"code":-32700,"message":"Parse error"}}"#).unwrap();
        assert!(matches!(inbound, Inbound::BareError(_)));
    }

    #[test]
    fn classify_null_result_is_unroutable() {
        // Mirrors the `!= null` checks of the wire contract: a null result
        // with no error routes nowhere.
        let inbound = classify(r#"{"id":"x","result":null}"#).unwrap();
        assert!(matches!(inbound, Inbound::Unroutable));
    }

    #[test]
    fn classify_empty_object_is_unroutable() {
        assert!(matches!(classify("{}").unwrap(), Inbound::Unroutable));
    }

    #[test]
    fn classify_malformed_json_is_an_error() {
        assert!(classify("not json").is_err());
    }
}
