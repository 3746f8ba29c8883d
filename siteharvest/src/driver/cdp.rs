//! Chrome DevTools Protocol client.
//!
//! One WebSocket connection to a DevTools target. Commands carry
//! auto-incrementing ids and a background reader task routes each response
//! back to its caller. The only events consumed are the `Network` ones that
//! feed [`NetworkActivity`]; everything else is dropped.

use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::net::TcpStream;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};
use tracing::{debug, info, warn};

use crate::errors::DriverError;

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;
type Pending = Arc<Mutex<HashMap<u64, oneshot::Sender<CdpResponse>>>>;

/// Default per-command timeout.
pub const DEFAULT_COMMAND_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, Serialize)]
struct CdpCommand<'a> {
    id: u64,
    method: &'a str,
    params: Value,
}

/// Error object of a failed command.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct CdpResponseError {
    /// Protocol error code.
    pub code: i64,
    /// Human-readable message.
    pub message: String,
    /// Extra detail, when the browser sends any.
    pub data: Option<String>,
}

/// Reply to one command.
#[derive(Debug, Clone, PartialEq)]
pub struct CdpResponse {
    /// Id of the command this answers.
    pub id: u64,
    /// Result payload on success.
    pub result: Option<Value>,
    /// Error payload on failure.
    pub error: Option<CdpResponseError>,
}

/// A message the browser sent on its own.
#[derive(Debug, Clone, PartialEq)]
pub struct CdpEvent {
    /// Event name, e.g. `Network.requestWillBeSent`.
    pub method: String,
    /// Event parameters.
    pub params: Value,
}

/// Classified incoming message.
#[derive(Debug, Clone, PartialEq)]
pub enum CdpMessage {
    /// A command reply.
    Response(CdpResponse),
    /// An unsolicited event.
    Event(CdpEvent),
}

/// Sorts a decoded message into a reply or an event. Messages that are
/// neither yield `None`.
pub fn classify_message(json: &Value) -> Option<CdpMessage> {
    if let Some(id) = json.get("id").and_then(Value::as_u64) {
        return Some(CdpMessage::Response(CdpResponse {
            id,
            result: json.get("result").cloned(),
            error: json
                .get("error")
                .and_then(|e| serde_json::from_value(e.clone()).ok()),
        }));
    }
    let method = json.get("method")?.as_str()?.to_string();
    let params = json.get("params").cloned().unwrap_or(Value::Null);
    Some(CdpMessage::Event(CdpEvent { method, params }))
}

/// In-flight request bookkeeping for network-idle waits.
#[derive(Debug)]
pub struct NetworkActivity {
    state: Mutex<NetworkState>,
}

#[derive(Debug)]
struct NetworkState {
    inflight: HashSet<String>,
    last_change: Instant,
}

impl Default for NetworkActivity {
    fn default() -> Self {
        Self {
            state: Mutex::new(NetworkState {
                inflight: HashSet::new(),
                last_change: Instant::now(),
            }),
        }
    }
}

impl NetworkActivity {
    /// Forgets every tracked request; called when a navigation starts.
    pub fn reset(&self) {
        let mut state = self.state.lock();
        state.inflight.clear();
        state.last_change = Instant::now();
    }

    /// Updates the bookkeeping from a `Network.*` event.
    pub fn observe(&self, event: &CdpEvent) {
        let Some(request_id) = event.params.get("requestId").and_then(Value::as_str) else {
            return;
        };
        let mut state = self.state.lock();
        let changed = match event.method.as_str() {
            "Network.requestWillBeSent" => state.inflight.insert(request_id.to_string()),
            "Network.loadingFinished" | "Network.loadingFailed" => {
                state.inflight.remove(request_id)
            }
            _ => false,
        };
        if changed {
            state.last_change = Instant::now();
        }
    }

    /// Requests still waiting for a response.
    pub fn inflight(&self) -> usize {
        self.state.lock().inflight.len()
    }

    /// How long the network has been quiet, or `None` while requests are
    /// in flight.
    pub fn idle_for(&self) -> Option<Duration> {
        let state = self.state.lock();
        state.inflight.is_empty().then(|| state.last_change.elapsed())
    }
}

/// A DevTools WebSocket connection.
pub struct CdpClient {
    next_id: AtomicU64,
    pending: Pending,
    writer: tokio::sync::Mutex<SplitSink<WsStream, Message>>,
    network: Arc<NetworkActivity>,
    command_timeout: Duration,
    reader: JoinHandle<()>,
}

impl std::fmt::Debug for CdpClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CdpClient")
            .field("next_id", &self.next_id)
            .field("command_timeout", &self.command_timeout)
            .finish_non_exhaustive()
    }
}

impl CdpClient {
    /// Connects to a DevTools WebSocket endpoint such as
    /// `ws://127.0.0.1:9222/devtools/page/<id>`.
    pub async fn connect(ws_url: &str) -> Result<Self, DriverError> {
        info!(url = ws_url, "Connecting to DevTools");
        let (stream, _) = tokio_tungstenite::connect_async(ws_url)
            .await
            .map_err(|err| DriverError::Protocol(format!("cannot connect to {ws_url}: {err}")))?;
        let (writer, reader) = stream.split();

        let pending: Pending = Arc::new(Mutex::new(HashMap::new()));
        let network = Arc::new(NetworkActivity::default());
        let reader = tokio::spawn(read_loop(reader, Arc::clone(&pending), Arc::clone(&network)));

        Ok(Self {
            next_id: AtomicU64::new(1),
            pending,
            writer: tokio::sync::Mutex::new(writer),
            network,
            command_timeout: DEFAULT_COMMAND_TIMEOUT,
            reader,
        })
    }

    /// Sets the per-command timeout.
    #[must_use]
    pub fn with_command_timeout(mut self, timeout: Duration) -> Self {
        self.command_timeout = timeout;
        self
    }

    /// Network activity seen on this connection.
    pub fn network(&self) -> &NetworkActivity {
        &self.network
    }

    /// Sends a command and waits for its result.
    pub async fn send(&self, method: &str, params: Value) -> Result<Value, DriverError> {
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        let json = serde_json::to_string(&CdpCommand { id, method, params })
            .map_err(|err| DriverError::Protocol(format!("cannot encode {method}: {err}")))?;

        let (tx, rx) = oneshot::channel();
        self.pending.lock().insert(id, tx);

        debug!(id, method, "Sending DevTools command");
        let sent = self.writer.lock().await.send(Message::Text(json.into())).await;
        if let Err(err) = sent {
            self.pending.lock().remove(&id);
            return Err(DriverError::Protocol(format!("cannot send {method}: {err}")));
        }

        let response = match tokio::time::timeout(self.command_timeout, rx).await {
            Ok(Ok(response)) => response,
            Ok(Err(_)) => {
                return Err(DriverError::Protocol("connection closed".to_string()));
            }
            Err(_) => {
                self.pending.lock().remove(&id);
                return Err(DriverError::Protocol(format!(
                    "{method} timed out after {:?}",
                    self.command_timeout
                )));
            }
        };

        if let Some(err) = response.error {
            return Err(DriverError::Protocol(format!(
                "{method} failed ({}): {}",
                err.code, err.message
            )));
        }
        Ok(response.result.unwrap_or(Value::Null))
    }

    /// Enables a protocol domain such as `Page` or `Network`.
    pub async fn enable(&self, domain: &str) -> Result<(), DriverError> {
        self.send(&format!("{domain}.enable"), serde_json::json!({}))
            .await
            .map(|_| ())
    }
}

impl Drop for CdpClient {
    fn drop(&mut self) {
        self.reader.abort();
    }
}

async fn read_loop(mut reader: SplitStream<WsStream>, pending: Pending, network: Arc<NetworkActivity>) {
    while let Some(message) = reader.next().await {
        let text = match message {
            Ok(Message::Text(text)) => text.to_string(),
            Ok(Message::Binary(bytes)) => match String::from_utf8(bytes.to_vec()) {
                Ok(text) => text,
                Err(_) => continue,
            },
            Ok(Message::Close(_)) => {
                info!("DevTools connection closed by the browser");
                break;
            }
            Ok(_) => continue,
            Err(err) => {
                warn!(error = %err, "DevTools read failed, stopping reader");
                break;
            }
        };

        let json: Value = match serde_json::from_str(&text) {
            Ok(json) => json,
            Err(err) => {
                warn!(error = %err, "Ignoring malformed DevTools message");
                continue;
            }
        };

        match classify_message(&json) {
            Some(CdpMessage::Response(response)) => {
                if let Some(tx) = pending.lock().remove(&response.id) {
                    let _ = tx.send(response);
                }
            }
            Some(CdpMessage::Event(event)) if event.method.starts_with("Network.") => {
                network.observe(&event);
            }
            _ => {}
        }
    }

    // Dropping the senders wakes every waiter with a closed-channel error.
    pending.lock().clear();
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn event(method: &str, request_id: &str) -> CdpEvent {
        CdpEvent {
            method: method.to_string(),
            params: serde_json::json!({ "requestId": request_id }),
        }
    }

    #[test]
    fn test_classify_response() {
        let json = serde_json::json!({"id": 3, "result": {"frameId": "F1"}});
        match classify_message(&json) {
            Some(CdpMessage::Response(response)) => {
                assert_eq!(response.id, 3);
                assert_eq!(response.result, Some(serde_json::json!({"frameId": "F1"})));
                assert_eq!(response.error, None);
            }
            other => panic!("unexpected message {other:?}"),
        }
    }

    #[test]
    fn test_classify_error_response() {
        let json = serde_json::json!({
            "id": 4,
            "error": {"code": -32000, "message": "Cannot navigate to invalid URL"}
        });
        let Some(CdpMessage::Response(response)) = classify_message(&json) else {
            panic!("expected a response");
        };
        let error = response.error.unwrap();
        assert_eq!(error.code, -32000);
        assert_eq!(error.data, None);
    }

    #[test]
    fn test_classify_event_and_noise() {
        let json = serde_json::json!({"method": "Page.loadEventFired"});
        assert_eq!(
            classify_message(&json),
            Some(CdpMessage::Event(CdpEvent {
                method: "Page.loadEventFired".to_string(),
                params: Value::Null,
            }))
        );
        assert_eq!(classify_message(&serde_json::json!({"params": {}})), None);
    }

    #[test]
    fn test_command_encoding() {
        let command = CdpCommand {
            id: 7,
            method: "Runtime.evaluate",
            params: serde_json::json!({"expression": "1 + 1"}),
        };
        let json = serde_json::to_value(&command).unwrap();
        assert_eq!(json["id"], 7);
        assert_eq!(json["method"], "Runtime.evaluate");
        assert_eq!(json["params"]["expression"], "1 + 1");
    }

    #[test]
    fn test_network_activity_tracks_requests() {
        let network = NetworkActivity::default();
        assert!(network.idle_for().is_some());

        network.observe(&event("Network.requestWillBeSent", "r1"));
        network.observe(&event("Network.requestWillBeSent", "r2"));
        // Redirects resend the same id.
        network.observe(&event("Network.requestWillBeSent", "r1"));
        assert_eq!(network.inflight(), 2);
        assert_eq!(network.idle_for(), None);

        network.observe(&event("Network.loadingFinished", "r1"));
        network.observe(&event("Network.loadingFailed", "r2"));
        assert_eq!(network.inflight(), 0);
        assert!(network.idle_for().is_some());
    }

    #[test]
    fn test_network_reset_and_unrelated_events() {
        let network = NetworkActivity::default();
        network.observe(&event("Network.requestWillBeSent", "r1"));
        network.observe(&event("Network.dataReceived", "r1"));
        assert_eq!(network.inflight(), 1);

        network.reset();
        assert_eq!(network.inflight(), 0);
    }
}
