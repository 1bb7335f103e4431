//! The ZADT_VSP WebSocket multiplexer: one persistent connection, a reader
//! task routing frames by correlation id, per-request deadlines, streamed
//! chunk assembly, and a buffered channel for asynchronous debugger events.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex as StdMutex};
use std::time::Duration;

use futures::stream::{SplitSink, SplitStream};
use futures::{SinkExt, StreamExt};
use serde_json::Value;
use tokio::net::TcpStream;
use tokio::sync::{mpsc, oneshot, Mutex};
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::http::header::AUTHORIZATION;
use tokio_tungstenite::tungstenite::http::HeaderValue;
use tokio_tungstenite::tungstenite::protocol::Message as WsMessage;
use tokio_tungstenite::{connect_async_tls_with_config, Connector, MaybeTlsStream, WebSocketStream};
use tracing::{debug, warn};
use url::Url;

use base64::Engine as _;

use crate::adapter::transport::websocket::messages::{
    WelcomeInfo, WsDomain, WsEvent, WsPayload, WsRequest, WsServerMessage,
};
use crate::adapter::transport::websocket::stream::StreamAssembler;
use crate::domain::error::{AdtError, Result};
use crate::domain::system::{AuthMaterial, SystemEndpoint};

/// APC service path of the ZADT_VSP endpoint.
const APC_PATH: &str = "/sap/bc/apc/sap/zadt_vsp";

/// Handshake must complete within this window.
const HANDSHAKE_TIMEOUT: Duration = Duration::from_secs(30);
/// The welcome frame must arrive within this window after the handshake.
const WELCOME_TIMEOUT: Duration = Duration::from_secs(5);
/// Default per-request deadline (server-negotiable per message).
pub const DEFAULT_REQUEST_TIMEOUT_MS: u64 = 60_000;
/// Buffered capacity of the async events channel.
const EVENTS_BUFFER: usize = 16;

type WsSink = SplitSink<WebSocketStream<MaybeTlsStream<TcpStream>>, WsMessage>;
type WsSource = SplitStream<WebSocketStream<MaybeTlsStream<TcpStream>>>;

struct Shared {
    writer: Mutex<WsSink>,
    /// Correlation id -> reply channel. Entries live until the caller sees a
    /// terminal frame, times out, or drops the request future.
    pending: StdMutex<HashMap<String, mpsc::UnboundedSender<WsServerMessage>>>,
    next_id: AtomicU64,
    welcome: StdMutex<Option<WelcomeInfo>>,
}

/// Removes the pending entry on every exit path, including cancellation.
struct PendingGuard {
    id: String,
    shared: Arc<Shared>,
}

impl Drop for PendingGuard {
    fn drop(&mut self) {
        self.shared.pending.lock().unwrap().remove(&self.id);
    }
}

/// Client for the ZADT_VSP APC endpoint. Cloneable; all clones share the
/// single connection.
#[derive(Clone)]
pub struct VspClient {
    shared: Arc<Shared>,
    events: Arc<StdMutex<Option<mpsc::Receiver<WsEvent>>>>,
}

impl std::fmt::Debug for VspClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VspClient").finish_non_exhaustive()
    }
}

impl VspClient {
    /// Establish the connection, start the reader task and wait for the
    /// welcome frame.
    pub async fn connect(endpoint: &SystemEndpoint) -> Result<VspClient> {
        let request_url = websocket_url(endpoint)?;
        let mut request = request_url
            .clone()
            .into_client_request()
            .map_err(|err| AdtError::Network(format!("invalid WebSocket URL: {err}")))?;

        match &endpoint.auth {
            AuthMaterial::Basic { username, password } => {
                let credentials = base64::engine::general_purpose::STANDARD
                    .encode(format!("{username}:{password}"));
                request.headers_mut().insert(
                    AUTHORIZATION,
                    HeaderValue::from_str(&format!("Basic {credentials}"))
                        .map_err(|_| AdtError::AuthFailed("unusable credentials".into()))?,
                );
            }
            AuthMaterial::Cookies(cookies) => {
                let header = cookies
                    .iter()
                    .map(|c| format!("{}={}", c.name, c.value))
                    .collect::<Vec<_>>()
                    .join("; ");
                request.headers_mut().insert(
                    tokio_tungstenite::tungstenite::http::header::COOKIE,
                    HeaderValue::from_str(&header)
                        .map_err(|_| AdtError::AuthFailed("unusable cookies".into()))?,
                );
            }
        }

        let connector = if endpoint.insecure {
            let tls = native_tls::TlsConnector::builder()
                .danger_accept_invalid_certs(true)
                .build()
                .map_err(|err| AdtError::Network(format!("TLS setup failed: {err}")))?;
            Some(Connector::NativeTls(tls))
        } else {
            None
        };

        let connect = connect_async_tls_with_config(request, None, false, connector);
        let (socket, _response) = tokio::time::timeout(HANDSHAKE_TIMEOUT, connect)
            .await
            .map_err(|_| AdtError::Timeout("WebSocket handshake timed out".into()))?
            .map_err(|err| AdtError::Network(format!("WebSocket connection failed: {err}")))?;

        debug!(url = %request_url, "zadt_vsp connected");
        let (writer, reader) = socket.split();

        let shared = Arc::new(Shared {
            writer: Mutex::new(writer),
            pending: StdMutex::new(HashMap::new()),
            next_id: AtomicU64::new(0),
            welcome: StdMutex::new(None),
        });

        let (events_tx, events_rx) = mpsc::channel(EVENTS_BUFFER);
        let (welcome_tx, welcome_rx) = oneshot::channel();
        tokio::spawn(reader_loop(reader, shared.clone(), events_tx, welcome_tx));

        match tokio::time::timeout(WELCOME_TIMEOUT, welcome_rx).await {
            Ok(Ok(welcome)) => {
                debug!(session = %welcome.session, version = %welcome.version, "zadt_vsp welcome");
            }
            Ok(Err(_)) => {
                return Err(AdtError::Network(
                    "connection closed before the welcome message".into(),
                ))
            }
            Err(_) => {
                return Err(AdtError::Timeout(
                    "no welcome message within 5s of handshake".into(),
                ))
            }
        }

        Ok(VspClient {
            shared,
            events: Arc::new(StdMutex::new(Some(events_rx))),
        })
    }

    /// The welcome payload (session id, server version, served domains).
    pub fn session(&self) -> Option<WelcomeInfo> {
        self.shared.welcome.lock().unwrap().clone()
    }

    /// Take the asynchronous events channel (debugger breaks etc.). Events
    /// preserve server-emitted order; the channel is buffered and can be
    /// taken once.
    pub fn take_events(&self) -> Option<mpsc::Receiver<WsEvent>> {
        self.events.lock().unwrap().take()
    }

    fn register(&self, domain: WsDomain) -> (String, mpsc::UnboundedReceiver<WsServerMessage>, PendingGuard) {
        let id = format!(
            "{}_{}",
            domain.as_str(),
            self.shared.next_id.fetch_add(1, Ordering::Relaxed) + 1
        );
        let (tx, rx) = mpsc::unbounded_channel();
        self.shared.pending.lock().unwrap().insert(id.clone(), tx);
        let guard = PendingGuard {
            id: id.clone(),
            shared: self.shared.clone(),
        };
        (id, rx, guard)
    }

    async fn send(&self, request: &WsRequest) -> Result<()> {
        let text = serde_json::to_string(request)?;
        let mut writer = self.shared.writer.lock().await;
        writer
            .send(WsMessage::Text(text))
            .await
            .map_err(|err| AdtError::Network(format!("WebSocket send failed: {err}")))
    }

    /// One request, one reply. The pending entry is removed on reply,
    /// timeout and cancellation alike.
    pub async fn call(
        &self,
        domain: WsDomain,
        action: &str,
        params: Option<Value>,
        timeout_ms: Option<u64>,
    ) -> Result<Value> {
        let timeout_ms = timeout_ms.unwrap_or(DEFAULT_REQUEST_TIMEOUT_MS);
        let (id, mut rx, _guard) = self.register(domain);
        let request = WsRequest {
            id: id.clone(),
            domain,
            action: action.to_string(),
            params,
            timeout: Some(timeout_ms),
            stream: None,
            chunk_size: None,
        };
        self.send(&request).await?;

        match tokio::time::timeout(Duration::from_millis(timeout_ms), rx.recv()).await {
            Err(_) => Err(AdtError::Timeout(format!(
                "{id}: no reply within {timeout_ms}ms"
            ))),
            Ok(None) => Err(AdtError::Network(format!("{id}: connection closed"))),
            Ok(Some(message)) => match message.payload() {
                WsPayload::Reply(value) => Ok(value),
                WsPayload::Complete(_, data) => Ok(data.unwrap_or(Value::Null)),
                WsPayload::Error { code, message } => Err(AdtError::from_ws(&code, &message)),
                WsPayload::Progress(..) | WsPayload::Chunk(..) => Err(AdtError::Network(format!(
                    "{id}: unexpected streamed frame on a non-streamed call"
                ))),
            },
        }
    }

    /// A streamed request: progress frames invoke the callback, chunk frames
    /// feed the assembler, and `complete` yields the assembled binary
    /// payload. Each frame resets the idle deadline.
    pub async fn call_streaming<F>(
        &self,
        domain: WsDomain,
        action: &str,
        params: Option<Value>,
        chunk_size: Option<u64>,
        timeout_ms: Option<u64>,
        mut on_progress: F,
    ) -> Result<Vec<u8>>
    where
        F: FnMut(u64, u64, Option<&str>),
    {
        let timeout_ms = timeout_ms.unwrap_or(DEFAULT_REQUEST_TIMEOUT_MS);
        let (id, mut rx, _guard) = self.register(domain);
        let request = WsRequest {
            id: id.clone(),
            domain,
            action: action.to_string(),
            params,
            timeout: Some(timeout_ms),
            stream: Some(true),
            chunk_size,
        };
        self.send(&request).await?;

        let mut assembler = StreamAssembler::new();
        loop {
            let message = match tokio::time::timeout(Duration::from_millis(timeout_ms), rx.recv())
                .await
            {
                Err(_) => {
                    return Err(AdtError::Timeout(format!(
                        "{id}: stream stalled for {timeout_ms}ms"
                    )))
                }
                Ok(None) => return Err(AdtError::Network(format!("{id}: connection closed"))),
                Ok(Some(message)) => message,
            };

            match message.payload() {
                WsPayload::Progress(done, total, note) => on_progress(done, total, note.as_deref()),
                WsPayload::Chunk(seq, data) => assembler.insert(seq, data),
                WsPayload::Complete(total_chunks, inline) => {
                    if total_chunks == 0 && assembler.chunk_count() == 0 {
                        // Small payloads arrive inline on the complete frame.
                        let data = inline
                            .and_then(|v| v.as_str().map(str::to_string))
                            .unwrap_or_default();
                        return base64::engine::general_purpose::STANDARD
                            .decode(data.as_bytes())
                            .map_err(|err| {
                                AdtError::StreamIncomplete(format!("inline payload: {err}"))
                            });
                    }
                    return assembler.assemble(total_chunks);
                }
                WsPayload::Error { code, message } => {
                    return Err(AdtError::from_ws(&code, &message))
                }
                WsPayload::Reply(_) => {
                    return Err(AdtError::Network(format!(
                        "{id}: flat reply on a streamed call"
                    )))
                }
            }
        }
    }

    /// Close the connection. Pending requests fail with a network error.
    pub async fn close(&self) -> Result<()> {
        let mut writer = self.shared.writer.lock().await;
        writer
            .send(WsMessage::Close(None))
            .await
            .map_err(|err| AdtError::Network(format!("WebSocket close failed: {err}")))
    }
}

/// Derive the ws/wss URL from the HTTP base URL; the scheme follows the
/// HTTP scheme.
fn websocket_url(endpoint: &SystemEndpoint) -> Result<String> {
    let base = Url::parse(&endpoint.base_url)
        .map_err(|err| AdtError::InvalidArgument(format!("invalid base URL: {err}")))?;
    let scheme = if base.scheme() == "https" { "wss" } else { "ws" };
    let host = base
        .host_str()
        .ok_or_else(|| AdtError::InvalidArgument("base URL has no host".into()))?;
    let port = base.port().map(|p| format!(":{p}")).unwrap_or_default();
    Ok(format!(
        "{scheme}://{host}{port}{APC_PATH}?sap-client={}",
        endpoint.client
    ))
}

/// The single reader: consumes frames until the connection closes, routing
/// replies by id and unknown ids to the events channel.
async fn reader_loop(
    mut reader: WsSource,
    shared: Arc<Shared>,
    events_tx: mpsc::Sender<WsEvent>,
    welcome_tx: oneshot::Sender<WelcomeInfo>,
) {
    let mut welcome_tx = Some(welcome_tx);

    while let Some(frame) = reader.next().await {
        let text = match frame {
            Ok(WsMessage::Text(text)) => text,
            Ok(WsMessage::Close(_)) => break,
            Ok(_) => continue,
            Err(err) => {
                debug!(error = %err, "zadt_vsp read failed");
                break;
            }
        };

        let message: WsServerMessage = match serde_json::from_str(&text) {
            Ok(message) => message,
            Err(err) => {
                warn!(error = %err, "dropping unparseable zadt_vsp frame");
                continue;
            }
        };

        if message.id == "welcome" {
            let info: WelcomeInfo = message
                .data
                .and_then(|data| serde_json::from_value(data).ok())
                .unwrap_or_default();
            *shared.welcome.lock().unwrap() = Some(info.clone());
            if let Some(tx) = welcome_tx.take() {
                let _ = tx.send(info);
            }
            continue;
        }

        let reply_tx = shared.pending.lock().unwrap().get(&message.id).cloned();
        match reply_tx {
            Some(tx) => {
                let _ = tx.send(message);
            }
            None => {
                let kind = message
                    .kind
                    .clone()
                    .or_else(|| {
                        message
                            .data
                            .as_ref()
                            .and_then(|d| d.get("kind"))
                            .and_then(|k| k.as_str())
                            .map(str::to_string)
                    })
                    .unwrap_or_default();
                let event = WsEvent {
                    id: message.id.clone(),
                    kind,
                    data: message.data.unwrap_or(Value::Null),
                };
                if events_tx.try_send(event).is_err() {
                    warn!("events channel full, dropping async zadt_vsp event");
                }
            }
        }
    }

    // Dropping the senders makes every in-flight caller fail fast.
    shared.pending.lock().unwrap().clear();
    debug!("zadt_vsp reader stopped");
}
