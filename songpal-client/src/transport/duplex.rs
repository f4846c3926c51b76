//! Persistent duplex websocket transport.
//!
//! One connection multiplexes concurrent calls and unsolicited
//! notifications. A single reader task owns the socket's receive half and
//! fans out: responses complete pending calls by request id, pushes go to
//! the notification hub, anything else is logged and dropped. A writer
//! task owns the send half behind an mpsc channel; no other code touches
//! the socket.
//!
//! Teardown is the load-bearing invariant: whether triggered by `close()`
//! or by the socket failing, every still-pending call fails with
//! [`ClientError::ConnectionClosed`] in one operation and the hub's
//! subscriptions are cleared. Nothing stays suspended.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use parking_lot::{Mutex, RwLock};
use tokio::net::TcpStream;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::protocol::Message as WsMessage;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};
use tracing::{debug, trace, warn};
use url::Url;

use songpal_wire::{decode_incoming, Incoming, RequestEnvelope};

use crate::config::SessionConfig;
use crate::error::{ClientError, Result};
use crate::notification::{NotificationEnvelope, NotificationHub};
use crate::registry::ServiceRegistry;
use crate::transport::{CallOutcome, Transport};

type WsSink = SplitSink<WebSocketStream<MaybeTlsStream<TcpStream>>, WsMessage>;
type WsStream = SplitStream<WebSocketStream<MaybeTlsStream<TcpStream>>>;
type PendingMap = Mutex<HashMap<u64, oneshot::Sender<CallOutcome>>>;

/// Connection lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Closed,
    Connecting,
    Open,
    Closing,
}

/// The persistent websocket connection to one device.
pub struct DuplexTransport {
    state: Arc<Mutex<ConnectionState>>,
    pending: Arc<PendingMap>,
    /// Taken on close so the writer task drains and exits on its own
    outbound: Mutex<Option<mpsc::Sender<WsMessage>>>,
    hub: Arc<NotificationHub>,
    reader: Mutex<Option<JoinHandle<()>>>,
}

impl DuplexTransport {
    /// Open the websocket and start the reader/writer tasks.
    ///
    /// Handshake failure (or timeout) is terminal for this attempt and
    /// surfaces as [`ClientError::Connect`].
    pub async fn connect(
        url: Url,
        hub: Arc<NotificationHub>,
        registry: Arc<RwLock<ServiceRegistry>>,
        config: &SessionConfig,
    ) -> Result<Self> {
        let state = Arc::new(Mutex::new(ConnectionState::Connecting));
        debug!(%url, "opening duplex connection");

        let (socket, _response) =
            tokio::time::timeout(config.connect_timeout, connect_async(url.as_str()))
                .await
                .map_err(|_| ClientError::Connect(format!("handshake with {url} timed out")))?
                .map_err(|e| ClientError::Connect(e.to_string()))?;

        let (sink, stream) = socket.split();
        let (outbound_tx, outbound_rx) = mpsc::channel(config.outbound_buffer_size);
        let pending: Arc<PendingMap> = Arc::new(Mutex::new(HashMap::new()));

        *state.lock() = ConnectionState::Open;

        tokio::spawn(write_loop(sink, outbound_rx));
        let reader = tokio::spawn(read_loop(
            stream,
            outbound_tx.clone(),
            Arc::clone(&pending),
            Arc::clone(&hub),
            registry,
            Arc::clone(&state),
        ));

        Ok(Self {
            state,
            pending,
            outbound: Mutex::new(Some(outbound_tx)),
            hub,
            reader: Mutex::new(Some(reader)),
        })
    }

    pub fn state(&self) -> ConnectionState {
        *self.state.lock()
    }

    pub fn is_open(&self) -> bool {
        self.state() == ConnectionState::Open
    }

    /// Send one request and suspend until its response arrives or the
    /// connection leaves `Open`.
    ///
    /// The pending entry is registered before the frame is sent, so a
    /// response can never race past its caller. Abandoning the returned
    /// future removes the entry again.
    pub async fn call(&self, request: RequestEnvelope) -> Result<CallOutcome> {
        if !self.is_open() {
            return Err(ClientError::ConnectionClosed);
        }

        let (tx, rx) = oneshot::channel();
        self.pending.lock().insert(request.id, tx);
        let _guard = PendingGuard {
            id: request.id,
            pending: Arc::clone(&self.pending),
        };

        // Teardown flips the state before draining the pending map, so an
        // entry inserted concurrently with teardown is caught either by
        // the drain or by this re-check.
        if !self.is_open() {
            return Err(ClientError::ConnectionClosed);
        }

        let sender = self.outbound.lock().clone();
        let Some(sender) = sender else {
            return Err(ClientError::ConnectionClosed);
        };
        sender
            .send(WsMessage::Text(request.encode()))
            .await
            .map_err(|_| ClientError::ConnectionClosed)?;

        match rx.await {
            Ok(outcome) => Ok(outcome),
            Err(_) => Err(ClientError::ConnectionClosed),
        }
    }

    /// Close the connection. Idempotent.
    ///
    /// Fails every pending call, clears the hub's subscriptions, says
    /// goodbye to the device on a best-effort basis and stops the reader.
    pub fn close(&self) {
        {
            let mut state = self.state.lock();
            if matches!(
                *state,
                ConnectionState::Closed | ConnectionState::Closing
            ) {
                return;
            }
            *state = ConnectionState::Closing;
        }

        if let Some(sender) = self.outbound.lock().take() {
            let _ = sender.try_send(WsMessage::Close(None));
            // Dropping the sender lets the writer drain the close frame
            // and exit on its own.
        }

        teardown(&self.state, &self.pending, &self.hub);

        if let Some(reader) = self.reader.lock().take() {
            reader.abort();
        }
    }
}

impl Drop for DuplexTransport {
    fn drop(&mut self) {
        self.close();
    }
}

#[async_trait]
impl Transport for DuplexTransport {
    async fn call(&self, _service: &str, request: RequestEnvelope) -> Result<CallOutcome> {
        DuplexTransport::call(self, request).await
    }
}

impl std::fmt::Debug for DuplexTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DuplexTransport")
            .field("state", &self.state())
            .field("pending", &self.pending.lock().len())
            .finish()
    }
}

/// Removes its pending-map entry when the owning call is abandoned, so
/// external cancellation never leaks table entries.
struct PendingGuard {
    id: u64,
    pending: Arc<PendingMap>,
}

impl Drop for PendingGuard {
    fn drop(&mut self) {
        self.pending.lock().remove(&self.id);
    }
}

async fn write_loop(mut sink: WsSink, mut outbound: mpsc::Receiver<WsMessage>) {
    while let Some(message) = outbound.recv().await {
        let closing = matches!(message, WsMessage::Close(_));
        if sink.send(message).await.is_err() || closing {
            break;
        }
    }
    let _ = sink.close().await;
}

async fn read_loop(
    mut stream: WsStream,
    outbound: mpsc::Sender<WsMessage>,
    pending: Arc<PendingMap>,
    hub: Arc<NotificationHub>,
    registry: Arc<RwLock<ServiceRegistry>>,
    state: Arc<Mutex<ConnectionState>>,
) {
    while let Some(frame) = stream.next().await {
        match frame {
            Ok(WsMessage::Text(body)) => handle_envelope(&body, &pending, &hub, &registry),
            Ok(WsMessage::Binary(data)) => match std::str::from_utf8(&data) {
                Ok(body) => handle_envelope(body, &pending, &hub, &registry),
                Err(_) => warn!("dropping non-UTF-8 binary frame"),
            },
            Ok(WsMessage::Ping(payload)) => {
                let _ = outbound.send(WsMessage::Pong(payload)).await;
            }
            Ok(WsMessage::Pong(_)) | Ok(WsMessage::Frame(_)) => {}
            Ok(WsMessage::Close(_)) => {
                debug!("device closed the duplex connection");
                break;
            }
            Err(e) => {
                warn!("duplex read failed: {e}");
                break;
            }
        }
    }
    teardown(&state, &pending, &hub);
}

/// Classify one incoming body and route it. Runs on the reader task;
/// notification dispatch completes before the next frame is read.
fn handle_envelope(
    body: &str,
    pending: &PendingMap,
    hub: &NotificationHub,
    registry: &RwLock<ServiceRegistry>,
) {
    match decode_incoming(body) {
        Ok(Incoming::Result { id, result }) => {
            complete_pending(pending, id, CallOutcome::Result(result));
        }
        Ok(Incoming::Error { id, code, message }) => {
            complete_pending(pending, id, CallOutcome::Error { code, message });
        }
        Ok(Incoming::Notification { name, params }) => {
            let service = registry
                .read()
                .service_for_notification(&name)
                .map(str::to_string);
            if service.is_none() {
                trace!(%name, "push does not match any declared notification");
            }
            hub.dispatch(&NotificationEnvelope {
                service,
                name,
                payload: params,
            });
        }
        // Forward compatibility: unknown shapes must never crash the loop
        Err(e) => warn!("dropping unreadable envelope: {e}"),
    }
}

/// Complete the pending call for a response id. Fire-and-forget from the
/// reader's perspective: a caller that gave up is ignored.
fn complete_pending(pending: &PendingMap, id: u64, outcome: CallOutcome) {
    match pending.lock().remove(&id) {
        Some(tx) => {
            if tx.send(outcome).is_err() {
                trace!(id, "caller abandoned the call before its response");
            }
        }
        None => debug!(id, "response matches no pending call, dropping"),
    }
}

/// Shared teardown for explicit close and socket failure. Idempotent.
fn teardown(state: &Mutex<ConnectionState>, pending: &PendingMap, hub: &NotificationHub) {
    *state.lock() = ConnectionState::Closed;

    // Dropping the senders fails every waiting caller with ConnectionClosed
    let abandoned = {
        let mut map = pending.lock();
        map.drain().count()
    };
    if abandoned > 0 {
        debug!(count = abandoned, "failed pending calls on teardown");
    }

    hub.clear();
}
