//! Session tests against a real in-process WebSocket server.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use futures::{SinkExt, StreamExt};
use serde_json::{json, Value};
use tokio::net::TcpListener;
use tokio::sync::{mpsc, Mutex};
use tokio_tungstenite::tungstenite::Message;

use aria2_rpc::{open, OpenOptions, ReadyState, RpcError, Transport, WsTransport};

/// Minimal aria2-flavoured JSON-RPC server. Echoes request params back as
/// the result; `test.slow` replies after a delay so out-of-order completion
/// can be observed; `test.notify` pushes a notification before replying.
async fn spawn_server() -> anyhow::Result<SocketAddr> {
    let listener = TcpListener::bind("127.0.0.1:0").await?;
    let addr = listener.local_addr()?;

    tokio::spawn(async move {
        while let Ok((stream, _)) = listener.accept().await {
            tokio::spawn(async move {
                let Ok(ws) = tokio_tungstenite::accept_async(stream).await else {
                    return;
                };
                let (sink, mut stream) = ws.split();
                let sink = Arc::new(Mutex::new(sink));

                while let Some(Ok(msg)) = stream.next().await {
                    let Message::Text(text) = msg else { continue };
                    let Ok(req) = serde_json::from_str::<Value>(&text) else {
                        continue;
                    };
                    let sink = sink.clone();
                    tokio::spawn(async move {
                        let id = req["id"].clone();
                        let method = req["method"].as_str().unwrap_or_default();
                        match method {
                            "test.slow" => {
                                tokio::time::sleep(Duration::from_millis(100)).await;
                                reply(&sink, json!({"id": id, "result": "slow"})).await;
                            }
                            "test.notify" => {
                                let push = json!({
                                    "method": "aria2.onDownloadComplete",
                                    "params": [{"gid": "g1"}],
                                });
                                reply(&sink, push).await;
                                reply(&sink, json!({"id": id, "result": "ok"})).await;
                            }
                            _ => {
                                reply(&sink, json!({"id": id, "result": req["params"]})).await;
                            }
                        }
                    });
                }
            });
        }
    });

    Ok(addr)
}

type ServerSink = Arc<
    Mutex<
        futures::stream::SplitSink<
            tokio_tungstenite::WebSocketStream<tokio::net::TcpStream>,
            Message,
        >,
    >,
>;

async fn reply(sink: &ServerSink, payload: Value) {
    let _ = sink
        .lock()
        .await
        .send(Message::Text(payload.to_string()))
        .await;
}

#[tokio::test]
async fn roundtrip_carries_secret_over_the_wire() -> anyhow::Result<()> {
    let addr = spawn_server().await?;
    let transport = WsTransport::connect(&format!("ws://{addr}")).await?;
    let conn = open(
        Arc::new(transport) as Arc<dyn Transport>,
        OpenOptions::new().secret("s3cr3t"),
    )
    .await?;

    // The server echoes params, so the injected token is observable.
    let result = conn.tell_active().await?;
    assert_eq!(result, json!(["token:s3cr3t"]));
    Ok(())
}

#[tokio::test]
async fn out_of_order_replies_resolve_by_correlation_id() -> anyhow::Result<()> {
    let addr = spawn_server().await?;
    let transport = WsTransport::connect(&format!("ws://{addr}")).await?;
    let conn = open(Arc::new(transport) as Arc<dyn Transport>, OpenOptions::new()).await?;

    let (slow, fast) = tokio::join!(
        conn.call("test.slow", vec![]),
        conn.call("test.fast", vec![json!(1)]),
    );

    assert_eq!(slow?, json!("slow"));
    assert_eq!(fast?, json!([1]));
    Ok(())
}

#[tokio::test]
async fn server_push_reaches_subscribers() -> anyhow::Result<()> {
    let addr = spawn_server().await?;
    let transport = WsTransport::connect(&format!("ws://{addr}")).await?;
    let conn = open(Arc::new(transport) as Arc<dyn Transport>, OpenOptions::new()).await?;

    let (events_tx, mut events_rx) = mpsc::unbounded_channel();
    let _sub = conn.on_download_complete(move |params| {
        let _ = events_tx.send(params.to_vec());
    });

    let result = conn.call("test.notify", vec![]).await?;
    assert_eq!(result, json!("ok"));

    let params = events_rx.recv().await.unwrap();
    assert_eq!(params[0]["gid"], "g1");
    Ok(())
}

#[tokio::test]
async fn closed_session_rejects_further_requests() -> anyhow::Result<()> {
    let addr = spawn_server().await?;
    let transport = WsTransport::connect(&format!("ws://{addr}")).await?;
    let conn = open(Arc::new(transport) as Arc<dyn Transport>, OpenOptions::new()).await?;

    conn.close(Some(1000), Some("done")).await?;
    assert_eq!(conn.socket().ready_state(), ReadyState::Closed);

    let err = conn.tell_active().await.unwrap_err();
    assert!(matches!(err, RpcError::NotOpen), "got {err:?}");
    Ok(())
}
