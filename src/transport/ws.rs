//! Push transport adapter.
//!
//! Maintains one logical WebSocket connection per authenticated session:
//! handshake with the bearer credential attached, a subscribe frame for the
//! per-principal channel, JSON push payloads inbound and best-effort
//! acknowledgements outbound. Transport failures are never fatal; they
//! surface as status events and drive an exponential-backoff reconnect loop
//! gated by a fixed attempt ceiling.
//!
//! Each `PushTransport` is an independently owned instance; events fan out
//! to any number of subscribers over a broadcast channel.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use chrono::Utc;
use futures::stream::SplitSink;
use futures::{SinkExt, StreamExt};
use serde_json::json;
use tokio::net::TcpStream;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::handshake::client::Request;
use tokio_tungstenite::tungstenite::http::HeaderValue;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async_tls_with_config, MaybeTlsStream, WebSocketStream};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::auth::{CredentialProvider, Credentials};
use crate::errors::ClientError;
use crate::models::{ConnectionStatus, PushAck, PushNotification};

type WsSink = SplitSink<WebSocketStream<MaybeTlsStream<TcpStream>>, Message>;

// ── Reconnect policy ──────────────────────────────────────────

/// Backoff schedule for automatic reconnects: the nth scheduled retry
/// (0-based) waits `base_delay * 2^n`, and no retry is scheduled once the
/// failure count reaches `max_attempts`.
#[derive(Debug, Clone, Copy)]
pub struct ReconnectPolicy {
    pub base_delay: Duration,
    pub max_attempts: u32,
}

impl ReconnectPolicy {
    /// Delay before the next automatic attempt, given the number of
    /// consecutive failures so far, or `None` at the ceiling.
    ///
    /// The first retry waits `base_delay` and each further one doubles it,
    /// so with the default ceiling of 5 a dead endpoint gets four scheduled
    /// retries (1x, 2x, 4x, 8x base) and then stays down until an explicit
    /// `connect()`.
    pub fn next_delay(&self, failures: u32) -> Option<Duration> {
        if failures == 0 || failures >= self.max_attempts {
            return None;
        }
        Some(self.base_delay * 2u32.saturating_pow(failures - 1))
    }
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self {
            base_delay: Duration::from_secs(1),
            max_attempts: 5,
        }
    }
}

// ── Events ────────────────────────────────────────────────────

#[derive(Debug, Clone)]
pub enum TransportEvent {
    Status(ConnectionStatus),
    Push(PushNotification),
    /// The connection is up but the per-principal subscription could not be
    /// established; without it the channel stays silent.
    SubscribeFailed(String),
}

// ── Transport ─────────────────────────────────────────────────

pub struct PushTransport {
    inner: Arc<Inner>,
}

struct Inner {
    ws_url: String,
    tenant_id: String,
    credentials: Arc<dyn CredentialProvider>,
    policy: ReconnectPolicy,
    events: broadcast::Sender<TransportEvent>,
    state: Mutex<TransportState>,
}

#[derive(Default)]
struct TransportState {
    status: ConnectionStatus,
    /// Consecutive failures since the last successful handshake.
    attempts: u32,
    cancel: Option<CancellationToken>,
    task: Option<JoinHandle<()>>,
}

enum SessionEnd {
    /// Explicit disconnect; no reconnect.
    Shutdown,
    /// Transport-level failure; eligible for backoff.
    Failed,
}

impl PushTransport {
    pub fn new(
        ws_url: impl Into<String>,
        tenant_id: impl Into<String>,
        credentials: Arc<dyn CredentialProvider>,
        policy: ReconnectPolicy,
    ) -> Self {
        let (events, _) = broadcast::channel(64);
        Self {
            inner: Arc::new(Inner {
                ws_url: ws_url.into(),
                tenant_id: tenant_id.into(),
                credentials,
                policy,
                events,
                state: Mutex::new(TransportState::default()),
            }),
        }
    }

    /// Subscribe to transport events. Every subscriber receives every event.
    pub fn subscribe(&self) -> broadcast::Receiver<TransportEvent> {
        self.inner.events.subscribe()
    }

    pub fn status(&self) -> ConnectionStatus {
        self.inner.state.lock().expect("transport mutex poisoned").status
    }

    /// Open the push connection. No-op when already connected or connecting;
    /// fails fast, without touching the status, when no valid credential is
    /// available.
    pub async fn connect(&self) {
        {
            let st = self.inner.state.lock().expect("transport mutex poisoned");
            if st.status.is_connected() || st.status.is_connecting() {
                debug!("connect ignored: transport already active");
                return;
            }
        }

        let creds = match self.inner.credentials.fresh_token().await {
            Ok(c) => c,
            Err(e) => {
                warn!(error = %e, "connect aborted: no valid credential");
                return;
            }
        };

        Inner::start(self.inner.clone(), creds);
    }

    /// Tear the connection down: cancels any pending reconnect timer,
    /// unsubscribes, closes the socket, and resets to `Disconnected(0)`.
    /// Idempotent.
    pub async fn disconnect(&self) {
        let (cancel, task) = {
            let mut st = self.inner.state.lock().expect("transport mutex poisoned");
            st.attempts = 0;
            st.status = ConnectionStatus::Disconnected { attempts: 0 };
            (st.cancel.take(), st.task.take())
        };

        if let Some(cancel) = cancel {
            cancel.cancel();
        }
        if let Some(task) = task {
            let _ = task.await;
        }

        self.inner
            .emit(TransportEvent::Status(ConnectionStatus::Disconnected { attempts: 0 }));
        debug!("push transport disconnected");
    }
}

impl Inner {
    fn emit(&self, event: TransportEvent) {
        // Subscribers may all be gone; that is not an error.
        let _ = self.events.send(event);
    }

    fn set_status(&self, status: ConnectionStatus) {
        self.state.lock().expect("transport mutex poisoned").status = status;
        self.emit(TransportEvent::Status(status));
    }

    /// Spawn the connection supervisor. An explicit connect starts a fresh
    /// failure count.
    fn start(inner: Arc<Inner>, creds: Credentials) {
        let cancel = CancellationToken::new();
        {
            let mut st = inner.state.lock().expect("transport mutex poisoned");
            if st.status.is_connected() || st.status.is_connecting() {
                return;
            }
            if let Some(stale) = st.task.take() {
                stale.abort();
            }
            st.attempts = 0;
            st.cancel = Some(cancel.clone());
        }

        let task = tokio::spawn(Self::supervise(inner.clone(), creds, cancel));
        inner.state.lock().expect("transport mutex poisoned").task = Some(task);
    }

    async fn supervise(inner: Arc<Inner>, first_creds: Credentials, cancel: CancellationToken) {
        let mut creds = Some(first_creds);
        loop {
            inner.set_status(ConnectionStatus::Connecting);

            let current = match creds.take() {
                Some(c) => c,
                None => match inner.credentials.fresh_token().await {
                    Ok(c) => c,
                    Err(e) => {
                        warn!(error = %e, "reconnect: credential refresh failed");
                        if !inner.fail_and_backoff(&cancel).await {
                            return;
                        }
                        continue;
                    }
                },
            };

            match Self::run_connection(&inner, &current, &cancel).await {
                SessionEnd::Shutdown => return,
                SessionEnd::Failed => {
                    if !inner.fail_and_backoff(&cancel).await {
                        return;
                    }
                }
            }
        }
    }

    /// Client handshake request: the standard upgrade headers and key from
    /// the endpoint URL, plus the credential and tenant scope.
    fn build_request(&self, creds: &Credentials) -> Result<Request, ClientError> {
        let mut request = self
            .ws_url
            .as_str()
            .into_client_request()
            .map_err(|e| ClientError::Transport(e.to_string()))?;

        let bearer = HeaderValue::from_str(&format!("Bearer {}", creds.bearer))
            .map_err(|e| ClientError::Transport(e.to_string()))?;
        let tenant = HeaderValue::from_str(&self.tenant_id)
            .map_err(|e| ClientError::Transport(e.to_string()))?;

        let headers = request.headers_mut();
        headers.insert("Authorization", bearer);
        headers.insert("X-Tenant-Id", tenant);
        headers.insert("User-Agent", HeaderValue::from_static("studio-notify/0.1"));
        Ok(request)
    }

    /// One connection lifetime: handshake, subscribe, read loop.
    async fn run_connection(
        inner: &Arc<Inner>,
        creds: &Credentials,
        cancel: &CancellationToken,
    ) -> SessionEnd {
        let request = match inner.build_request(creds) {
            Ok(r) => r,
            Err(e) => {
                warn!(error = %e, url = %inner.ws_url, "invalid push endpoint request");
                return SessionEnd::Failed;
            }
        };

        let (ws, _resp) = tokio::select! {
            _ = cancel.cancelled() => return SessionEnd::Shutdown,
            result = connect_async_tls_with_config(request, None, false, None) => match result {
                Ok(v) => v,
                Err(e) => {
                    warn!(error = %e, url = %inner.ws_url, "push connect failed");
                    return SessionEnd::Failed;
                }
            },
        };

        let since = Utc::now();
        {
            let mut st = inner.state.lock().expect("transport mutex poisoned");
            st.attempts = 0;
            st.status = ConnectionStatus::Connected { since };
        }
        inner.emit(TransportEvent::Status(ConnectionStatus::Connected { since }));
        info!(url = %inner.ws_url, "push channel connected");

        let (mut sink, mut stream) = ws.split();

        // Per-principal subscription. A missing principal leaves the
        // connection up but silent; hosts get an explicit event for it.
        let mut subscribed = false;
        if creds.principal.is_empty() {
            warn!("principal resolution failed; subscription abandoned");
            inner.emit(TransportEvent::SubscribeFailed(
                "no principal id in credential".into(),
            ));
        } else {
            let frame = json!({
                "action": "subscribe",
                "channel": format!("/user/{}/notifications", creds.principal),
            });
            if let Err(e) = sink.send(Message::Text(frame.to_string())).await {
                warn!(error = %e, "subscribe send failed");
                return SessionEnd::Failed;
            }
            subscribed = true;
            debug!(principal = %creds.principal, "subscribed to push channel");
        }

        loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    if subscribed {
                        let _ = sink
                            .send(Message::Text(json!({"action": "unsubscribe"}).to_string()))
                            .await;
                    }
                    let _ = sink.send(Message::Close(None)).await;
                    return SessionEnd::Shutdown;
                }
                msg = stream.next() => match msg {
                    Some(Ok(Message::Text(text))) => inner.handle_frame(&text, &mut sink).await,
                    Some(Ok(Message::Ping(payload))) => {
                        let _ = sink.send(Message::Pong(payload)).await;
                    }
                    Some(Ok(Message::Close(frame))) => {
                        debug!(?frame, "push channel closed by server");
                        return SessionEnd::Failed;
                    }
                    Some(Ok(_)) => {}
                    Some(Err(e)) => {
                        warn!(error = %e, "push channel error");
                        return SessionEnd::Failed;
                    }
                    None => {
                        debug!("push channel ended");
                        return SessionEnd::Failed;
                    }
                }
            }
        }
    }

    /// Decode one inbound frame. Malformed payloads are dropped with a log
    /// line and no status change; decoded pushes are acknowledged
    /// best-effort before delivery.
    async fn handle_frame(&self, text: &str, sink: &mut WsSink) {
        let push: PushNotification = match serde_json::from_str(text) {
            Ok(p) => p,
            Err(e) => {
                warn!(error = %e, "dropping malformed push payload");
                return;
            }
        };

        let ack = PushAck {
            subject_id: push.video_id.clone(),
            kind: push.kind,
            timestamp: Utc::now(),
        };
        let frame = json!({"action": "ack", "payload": ack}).to_string();
        if let Err(e) = sink.send(Message::Text(frame)).await {
            debug!(error = %e, "ack publish failed");
        }

        self.emit(TransportEvent::Push(push));
    }

    /// Record one failure and wait out the backoff. Returns false when no
    /// further attempt should run (ceiling reached or cancelled).
    async fn fail_and_backoff(&self, cancel: &CancellationToken) -> bool {
        let attempts = {
            let mut st = self.state.lock().expect("transport mutex poisoned");
            st.attempts += 1;
            st.status = ConnectionStatus::Disconnected { attempts: st.attempts };
            st.attempts
        };
        self.emit(TransportEvent::Status(ConnectionStatus::Disconnected { attempts }));

        let Some(delay) = self.policy.next_delay(attempts) else {
            warn!(
                attempts,
                "reconnect ceiling reached; disconnected until an explicit connect"
            );
            return false;
        };

        debug!(attempts, delay_ms = delay.as_millis() as u64, "reconnect scheduled");
        tokio::select! {
            _ = cancel.cancelled() => false,
            _ = tokio::time::sleep(delay) => true,
        }
    }
}

// ── Tests ─────────────────────────────────────────────────────
