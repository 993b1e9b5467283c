//! Correlation engine: owns the pending-request table, assigns correlation
//! ids, and routes inbound payloads to either a pending entry or the
//! notification registry.

use std::collections::HashMap;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::sync::{broadcast, oneshot, Mutex};
use tokio::time;
use tracing::{debug, warn};
use uuid::Uuid;

use super::envelope::{self, Inbound};
use super::error::{RemoteError, RpcError};
use crate::transport::{ReadyState, Transport};

/// Per-request timeout applied when neither the call nor the session
/// configures one.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_millis(5000);

type PendingTx = oneshot::Sender<Result<Value, RpcError>>;
type NotificationFn = Arc<dyn Fn(&[Value]) + Send + Sync>;
type ServerErrorFn = Box<dyn Fn(Value) + Send + Sync>;

/// Options for opening a session over a transport.
#[derive(Default)]
pub struct OpenOptions {
    secret: Option<String>,
    timeout: Option<Duration>,
    on_server_error: Option<ServerErrorFn>,
}

impl OpenOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Shared secret sent as `token:<secret>` ahead of request parameters.
    pub fn secret(mut self, secret: impl Into<String>) -> Self {
        self.secret = Some(secret.into());
        self
    }

    /// Default timeout for each request. 5000ms when unset.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Handler for server errors that carry no correlation id. Without one
    /// such errors are dropped.
    pub fn on_server_error<F>(mut self, handler: F) -> Self
    where
        F: Fn(Value) + Send + Sync + 'static,
    {
        self.on_server_error = Some(Box::new(handler));
        self
    }
}

/// Timeout policy for a single request.
#[derive(Debug, Clone, Copy, Default)]
pub enum CallTimeout {
    /// Use the session's configured default.
    #[default]
    Default,
    /// No deadline; the call stays pending for the life of the session.
    Disabled,
    /// Explicit per-call deadline.
    After(Duration),
}

impl CallTimeout {
    fn resolve(self, session_default: Duration) -> Option<Duration> {
        match self {
            CallTimeout::Default => Some(session_default),
            CallTimeout::Disabled => None,
            CallTimeout::After(deadline) => Some(deadline),
        }
    }
}

/// Per-call options for [`Connection::send_request`].
#[derive(Debug, Clone)]
pub struct CallOptions {
    pub use_secret: bool,
    pub timeout: CallTimeout,
}

impl Default for CallOptions {
    fn default() -> Self {
        Self {
            use_secret: true,
            timeout: CallTimeout::Default,
        }
    }
}

impl CallOptions {
    pub fn secret(mut self, use_secret: bool) -> Self {
        self.use_secret = use_secret;
        self
    }

    pub fn timeout(mut self, timeout: CallTimeout) -> Self {
        self.timeout = timeout;
        self
    }
}

/// One sub-call of a `system.multicall` batch.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MulticallCall {
    #[serde(rename = "methodName")]
    pub method: String,
    #[serde(default)]
    pub params: Vec<Value>,
}

#[derive(Default)]
struct Shared {
    pending: Mutex<HashMap<String, PendingTx>>,
    listeners: std::sync::Mutex<HashMap<String, Vec<(u64, NotificationFn)>>>,
    next_listener_key: AtomicU64,
}

/// An open session over one transport. Exclusively owned by the caller that
/// opened it; dropping it (and the transport with it) abandons whatever is
/// still pending.
pub struct Connection {
    transport: Arc<dyn Transport>,
    secret: Option<String>,
    default_timeout: Duration,
    shared: Arc<Shared>,
}

impl std::fmt::Debug for Connection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Connection")
            .field("secret", &self.secret.as_ref().map(|_| "<redacted>"))
            .field("default_timeout", &self.default_timeout)
            .finish_non_exhaustive()
    }
}

/// Open a session over `transport`.
///
/// A transport still connecting is awaited through its one-shot open event;
/// one already closing or closed fails immediately. On success a dispatch
/// task is subscribed to the transport's message stream for the life of the
/// session.
pub async fn open(
    transport: Arc<dyn Transport>,
    options: OpenOptions,
) -> Result<Connection, RpcError> {
    match transport.ready_state() {
        ReadyState::Connecting => transport.wait_open().await?,
        ReadyState::Closing => return Err(RpcError::SocketClosing),
        ReadyState::Closed => return Err(RpcError::SocketClosed),
        ReadyState::Open => {}
    }

    let shared = Arc::new(Shared::default());
    tokio::spawn(dispatch_loop(
        transport.messages(),
        shared.clone(),
        options.on_server_error,
    ));

    Ok(Connection {
        transport,
        secret: options.secret,
        default_timeout: options.timeout.unwrap_or(DEFAULT_TIMEOUT),
        shared,
    })
}

impl Connection {
    /// Send one request and await its single-resolution outcome: the remote
    /// result, the remote error, or a transport/timeout failure.
    ///
    /// Fails fast with [`RpcError::NotOpen`] while the transport is not open;
    /// nothing is queued or buffered.
    pub async fn send_request(
        &self,
        options: CallOptions,
        method: &str,
        params: Vec<Value>,
    ) -> Result<Value, RpcError> {
        if self.transport.ready_state() != ReadyState::Open {
            return Err(RpcError::NotOpen);
        }

        let id = Uuid::new_v4().to_string();
        let mut params = params;
        if options.use_secret {
            if let Some(secret) = &self.secret {
                params.insert(0, Value::String(format!("token:{secret}")));
            }
        }
        let body = envelope::encode_request(&id, method, &params)?;

        let (tx, rx) = oneshot::channel();
        self.shared.pending.lock().await.insert(id.clone(), tx);
        debug!(%id, method, "sending request");

        if let Err(e) = self.transport.send(body).await {
            self.shared.pending.lock().await.remove(&id);
            return Err(RpcError::Transport(e));
        }

        match options.timeout.resolve(self.default_timeout) {
            None => rx.await.map_err(|_| RpcError::ConnectionClosed)?,
            Some(deadline) => match time::timeout(deadline, rx).await {
                Ok(done) => done.map_err(|_| RpcError::ConnectionClosed)?,
                Err(_elapsed) => {
                    // Take-if-present: if a response won the race it already
                    // removed the entry and this is a no-op.
                    self.shared.pending.lock().await.remove(&id);
                    Err(RpcError::Timeout(deadline.as_millis() as u64))
                }
            },
        }
    }

    /// Subscribe `listener` to notifications of `method`. Listeners for one
    /// method run in subscription order; a panic in one does not stop the
    /// others.
    ///
    /// The returned handle is a capability for unsubscribing. Dropping it
    /// without calling [`Subscription::dispose`] leaves the listener active.
    pub fn on_notification<F>(&self, method: impl Into<String>, listener: F) -> Subscription
    where
        F: Fn(&[Value]) + Send + Sync + 'static,
    {
        let method = method.into();
        let key = self.shared.next_listener_key.fetch_add(1, Ordering::Relaxed);
        lock_listeners(&self.shared)
            .entry(method.clone())
            .or_default()
            .push((key, Arc::new(listener)));
        Subscription {
            shared: Arc::downgrade(&self.shared),
            method,
            key,
            disposed: AtomicBool::new(false),
        }
    }

    /// Batch several sub-calls into one `system.multicall`. When a secret is
    /// configured it is injected into each sub-call's parameter list
    /// independently; the outer envelope never carries it.
    pub async fn multicall(&self, calls: Vec<MulticallCall>) -> Result<Value, RpcError> {
        let calls: Vec<MulticallCall> = match &self.secret {
            Some(secret) => calls
                .into_iter()
                .map(|mut call| {
                    call.params.insert(0, Value::String(format!("token:{secret}")));
                    call
                })
                .collect(),
            None => calls,
        };
        let batch = serde_json::to_value(calls)?;
        self.send_request(
            CallOptions::default().secret(false),
            "system.multicall",
            vec![batch],
        )
        .await
    }

    /// The secret configured at open time, if any.
    pub fn secret(&self) -> Option<&str> {
        self.secret.as_deref()
    }

    /// The underlying transport, e.g. for closing the session.
    pub fn socket(&self) -> &Arc<dyn Transport> {
        &self.transport
    }

    /// Close the underlying transport.
    pub async fn close(&self, code: Option<u16>, reason: Option<&str>) -> Result<(), RpcError> {
        self.transport
            .close(code, reason)
            .await
            .map_err(RpcError::Transport)
    }
}

/// Handle for one (method, listener) registration.
pub struct Subscription {
    shared: Weak<Shared>,
    method: String,
    key: u64,
    disposed: AtomicBool,
}

impl Subscription {
    /// Remove the listener. Idempotent: a second call is a no-op and other
    /// subscribers are unaffected.
    pub fn dispose(&self) {
        if self.disposed.swap(true, Ordering::SeqCst) {
            return;
        }
        let Some(shared) = self.shared.upgrade() else {
            return;
        };
        let mut listeners = shared
            .listeners
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        if let Some(bucket) = listeners.get_mut(&self.method) {
            bucket.retain(|(key, _)| *key != self.key);
            if bucket.is_empty() {
                listeners.remove(&self.method);
            }
        }
    }
}

fn lock_listeners(
    shared: &Shared,
) -> std::sync::MutexGuard<'_, HashMap<String, Vec<(u64, NotificationFn)>>> {
    shared
        .listeners
        .lock()
        .unwrap_or_else(std::sync::PoisonError::into_inner)
}

async fn dispatch_loop(
    mut messages: broadcast::Receiver<String>,
    shared: Arc<Shared>,
    on_server_error: Option<ServerErrorFn>,
) {
    loop {
        let text = match messages.recv().await {
            Ok(text) => text,
            Err(broadcast::error::RecvError::Lagged(skipped)) => {
                warn!(skipped, "inbound queue lagged, messages dropped");
                continue;
            }
            Err(broadcast::error::RecvError::Closed) => break,
        };

        match envelope::classify(&text) {
            Ok(Inbound::Notification { method, params }) => {
                dispatch_notification(&shared, &method, &params);
            }
            Ok(Inbound::Response { id, outcome }) => {
                match shared.pending.lock().await.remove(&id) {
                    Some(tx) => {
                        let outcome = outcome.map_err(|e| RpcError::Remote(RemoteError::from(e)));
                        let _ = tx.send(outcome);
                    }
                    // Stale or duplicate id; the entry is gone, so this
                    // arrival is inert.
                    None => debug!(%id, "response for unknown id dropped"),
                }
            }
            Ok(Inbound::BareError(error)) => match &on_server_error {
                Some(handler) => handler(error),
                None => debug!(%error, "unrouted server error dropped"),
            },
            Ok(Inbound::Unroutable) => debug!("unroutable payload dropped"),
            Err(e) => debug!(error = %e, "undecodable payload dropped"),
        }
    }

    // Transport gone: abandon everything still outstanding.
    let mut pending = shared.pending.lock().await;
    for (_, tx) in pending.drain() {
        let _ = tx.send(Err(RpcError::ConnectionClosed));
    }
}

fn dispatch_notification(shared: &Shared, method: &str, params: &[Value]) {
    let subscribers: Vec<NotificationFn> = lock_listeners(shared)
        .get(method)
        .map(|bucket| bucket.iter().map(|(_, f)| f.clone()).collect())
        .unwrap_or_default();

    for subscriber in subscribers {
        if catch_unwind(AssertUnwindSafe(|| subscriber(params))).is_err() {
            warn!(method, "notification subscriber panicked");
        }
    }
}
