//! DevTools WebSocket client.
//!
//! One socket carries browser-level and flattened per-target traffic.
//! Two tasks own its halves:
//!
//! | Task | Owns | Does |
//! |------|------|------|
//! | writer | sink | serializes queued frames, closes on request |
//! | reader | stream | resolves waiters by `id`, fans events out |
//!
//! When the reader stops, every outstanding call fails with
//! [`Error::ConnectionClosed`] and later calls fail immediately.

// ============================================================================
// Imports
// ============================================================================

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use parking_lot::Mutex;
use rustc_hash::FxHashMap;
use serde_json::Value;
use tokio::net::TcpStream;
use tokio::sync::{mpsc, oneshot};
use tokio::time::timeout;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async};
use tracing::{debug, error, info, trace, warn};

use crate::error::{Error, Result};
use crate::identifiers::{RequestId, RequestIdGenerator};
use crate::protocol::{Event, Request, Response};

use super::subscription::{EventStream, Subscribers};

// ============================================================================
// Constants
// ============================================================================

/// Safety timeout for one request.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Outstanding requests allowed on one socket.
const MAX_IN_FLIGHT: usize = 100;

/// WebSocket handshake timeout.
const HANDSHAKE_TIMEOUT: Duration = Duration::from_secs(30);

// ============================================================================
// Types
// ============================================================================

type Socket = WebSocketStream<MaybeTlsStream<TcpStream>>;

type Waiter = oneshot::Sender<Result<Response>>;

/// Frames handed to the writer task.
enum Outbound {
    Frame { id: RequestId, text: String },
    Close,
}

// ============================================================================
// InFlight
// ============================================================================

/// Requests awaiting their response.
#[derive(Default)]
struct InFlight {
    waiters: Mutex<FxHashMap<RequestId, Waiter>>,
    closed: AtomicBool,
}

impl InFlight {
    /// Registers a waiter, refusing when closed or full.
    fn register(&self, id: RequestId) -> Result<oneshot::Receiver<Result<Response>>> {
        if self.closed.load(Ordering::Acquire) {
            return Err(Error::ConnectionClosed);
        }

        let mut waiters = self.waiters.lock();
        if waiters.len() >= MAX_IN_FLIGHT {
            warn!(in_flight = waiters.len(), "Request limit reached");
            return Err(Error::protocol(format!(
                "Too many requests in flight ({MAX_IN_FLIGHT})"
            )));
        }

        let (tx, rx) = oneshot::channel();
        waiters.insert(id, tx);
        Ok(rx)
    }

    fn resolve(&self, response: Response) {
        let waiter = self.waiters.lock().remove(&response.id);
        match waiter {
            Some(waiter) => {
                let _ = waiter.send(Ok(response));
            }
            None => debug!(id = %response.id, "Late or unknown response"),
        }
    }

    fn fail(&self, id: RequestId, error: Error) {
        if let Some(waiter) = self.waiters.lock().remove(&id) {
            let _ = waiter.send(Err(error));
        }
    }

    fn forget(&self, id: RequestId) {
        self.waiters.lock().remove(&id);
    }

    /// Marks the socket closed and fails every waiter.
    fn close(&self) {
        self.closed.store(true, Ordering::Release);
        let drained: Vec<Waiter> = self.waiters.lock().drain().map(|(_, w)| w).collect();
        if !drained.is_empty() {
            debug!(count = drained.len(), "Failing requests on close");
        }
        for waiter in drained {
            let _ = waiter.send(Err(Error::ConnectionClosed));
        }
    }

    fn len(&self) -> usize {
        self.waiters.lock().len()
    }
}

// ============================================================================
// Connection
// ============================================================================

/// Shared handle to one DevTools socket.
///
/// Clones share the socket, the request counter and the event fan-out.
#[derive(Clone)]
pub struct Connection {
    outbound: mpsc::UnboundedSender<Outbound>,
    in_flight: Arc<InFlight>,
    events: Subscribers<Event>,
    ids: Arc<RequestIdGenerator>,
}

impl Connection {
    /// Opens a `ws://` or `wss://` debugging endpoint.
    ///
    /// # Errors
    ///
    /// - [`Error::ConnectionTimeout`] if the handshake takes longer than 30s
    /// - [`Error::Connection`] if the handshake fails
    pub async fn connect(url: &str) -> Result<Self> {
        let handshake_ms = u64::try_from(HANDSHAKE_TIMEOUT.as_millis()).unwrap_or(u64::MAX);
        let (socket, _) = timeout(HANDSHAKE_TIMEOUT, connect_async(url))
            .await
            .map_err(|_| Error::connection_timeout(handshake_ms))?
            .map_err(|e| Error::connection(format!("WebSocket handshake failed: {e}")))?;

        info!(url, "DevTools socket open");
        Ok(Self::over(socket))
    }

    /// Wraps an open socket and starts its reader and writer tasks.
    pub(crate) fn over(socket: Socket) -> Self {
        let (sink, stream) = socket.split();
        let (outbound, queue) = mpsc::unbounded_channel();
        let in_flight = Arc::new(InFlight::default());
        let events = Subscribers::new();

        tokio::spawn(write_frames(sink, queue, Arc::clone(&in_flight)));
        tokio::spawn(read_frames(stream, Arc::clone(&in_flight), events.clone()));

        Self {
            outbound,
            in_flight,
            events,
            ids: Arc::new(RequestIdGenerator::new()),
        }
    }

    /// Subscribes to every event arriving on the socket.
    #[must_use]
    pub fn events(&self) -> EventStream<Event> {
        self.events.subscribe()
    }

    /// Calls `method`, optionally on a flattened target session, and returns
    /// the `result` payload.
    ///
    /// # Errors
    ///
    /// [`Error::Remote`] if the endpoint answers with an error, plus every
    /// error of [`Connection::request`].
    pub async fn call(&self, method: &str, params: Value, session_id: Option<&str>) -> Result<Value> {
        let mut request = Request::new(self.ids.generate(), method, params);
        if let Some(session_id) = session_id {
            request = request.with_session(session_id);
        }
        self.request(request, REQUEST_TIMEOUT).await?.into_result()
    }

    /// Sends `request` and waits up to `limit` for its response.
    ///
    /// # Errors
    ///
    /// - [`Error::ConnectionClosed`] if the socket is gone
    /// - [`Error::RequestTimeout`] if no response arrives within `limit`
    /// - [`Error::Protocol`] if too many requests are outstanding
    pub async fn request(&self, request: Request, limit: Duration) -> Result<Response> {
        let id = request.id;
        let frame = serde_json::to_string(&request)?;
        let response = self.in_flight.register(id)?;

        trace!(%id, method = %request.method, "Request queued");
        if self.outbound.send(Outbound::Frame { id, text: frame }).is_err() {
            self.in_flight.forget(id);
            return Err(Error::ConnectionClosed);
        }

        match timeout(limit, response).await {
            Ok(Ok(result)) => result,
            Ok(Err(_)) => Err(Error::ConnectionClosed),
            Err(_) => {
                self.in_flight.forget(id);
                let limit_ms = u64::try_from(limit.as_millis()).unwrap_or(u64::MAX);
                Err(Error::request_timeout(id, limit_ms))
            }
        }
    }

    /// Number of requests awaiting a response.
    #[inline]
    #[must_use]
    pub fn pending_count(&self) -> usize {
        self.in_flight.len()
    }

    /// Returns `true` once the socket has stopped.
    #[inline]
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.in_flight.closed.load(Ordering::Acquire)
    }

    /// Closes the socket. Clones share it, so dropping a handle does not.
    pub fn close(&self) {
        let _ = self.outbound.send(Outbound::Close);
    }
}

// ============================================================================
// Socket Tasks
// ============================================================================

async fn write_frames(
    mut sink: SplitSink<Socket, Message>,
    mut queue: mpsc::UnboundedReceiver<Outbound>,
    in_flight: Arc<InFlight>,
) {
    while let Some(outbound) = queue.recv().await {
        let (id, text) = match outbound {
            Outbound::Frame { id, text } => (id, text),
            Outbound::Close => {
                debug!("Closing DevTools socket");
                let _ = sink.close().await;
                break;
            }
        };

        if let Err(e) = sink.send(Message::Text(text.into())).await {
            error!(%id, error = %e, "Socket write failed");
            in_flight.fail(id, Error::connection(e.to_string()));
            break;
        }
    }
    trace!("Writer stopped");
}

async fn read_frames(
    mut stream: SplitStream<Socket>,
    in_flight: Arc<InFlight>,
    events: Subscribers<Event>,
) {
    while let Some(message) = stream.next().await {
        let text = match message {
            Ok(Message::Text(text)) => text,
            Ok(Message::Close(frame)) => {
                debug!(?frame, "Socket closed by endpoint");
                break;
            }
            Ok(_) => continue,
            Err(e) => {
                error!(error = %e, "Socket read failed");
                break;
            }
        };
        dispatch(&text, &in_flight, &events);
    }

    in_flight.close();
    info!("DevTools socket closed");
}

/// Routes one text frame: responses carry an `id`, events a `method`.
fn dispatch(text: &str, in_flight: &InFlight, events: &Subscribers<Event>) {
    if let Ok(response) = serde_json::from_str::<Response>(text) {
        in_flight.resolve(response);
    } else if let Ok(event) = serde_json::from_str::<Event>(text) {
        trace!(method = %event.method, session = ?event.session_id, "Event");
        events.publish(event);
    } else {
        warn!(len = text.len(), "Unrecognized frame");
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    use serde_json::json;
    use tokio::net::TcpListener;

    /// Endpoint that echoes each method back and follows every reply with a
    /// `Page.loadEventFired` event on session `S1`.
    async fn echo_endpoint() -> String {
        let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
        let addr = listener.local_addr().expect("addr");

        tokio::spawn(async move {
            let (tcp, _) = listener.accept().await.expect("accept");
            let mut ws = tokio_tungstenite::accept_async(tcp).await.expect("upgrade");

            while let Some(Ok(Message::Text(text))) = ws.next().await {
                let request: Value = serde_json::from_str(&text).expect("json");
                let reply = match request["method"].as_str() {
                    Some("Fail.please") => json!({
                        "id": request["id"],
                        "error": {"code": -32000, "message": "Target closed"}
                    }),
                    Some("Hang.forever") => continue,
                    _ => json!({
                        "id": request["id"],
                        "result": {"echo": request["method"], "session": request["sessionId"]}
                    }),
                };
                let event = json!({"method": "Page.loadEventFired", "params": {}, "sessionId": "S1"});
                for frame in [reply, event] {
                    ws.send(Message::Text(frame.to_string().into())).await.expect("send");
                }
            }
        });

        format!("ws://{addr}")
    }

    #[test]
    fn test_limits() {
        assert_eq!(REQUEST_TIMEOUT.as_secs(), 30);
        assert_eq!(MAX_IN_FLIGHT, 100);
        assert_eq!(HANDSHAKE_TIMEOUT.as_secs(), 30);
    }

    #[test]
    fn test_in_flight_close_fails_waiters() {
        let in_flight = InFlight::default();
        let mut rx = in_flight.register(RequestId::new(1)).expect("register");

        in_flight.close();

        assert!(matches!(rx.try_recv(), Ok(Err(Error::ConnectionClosed))));
        assert!(matches!(
            in_flight.register(RequestId::new(2)),
            Err(Error::ConnectionClosed)
        ));
    }

    #[test]
    fn test_in_flight_limit() {
        let in_flight = InFlight::default();
        let _receivers: Vec<_> = (0..MAX_IN_FLIGHT as u64)
            .map(|i| in_flight.register(RequestId::new(i)).expect("register"))
            .collect();

        assert!(matches!(
            in_flight.register(RequestId::new(999)),
            Err(Error::Protocol { .. })
        ));
    }

    #[tokio::test]
    async fn test_call_round_trip() {
        let connection = Connection::connect(&echo_endpoint().await).await.expect("connect");

        let result = connection
            .call("Runtime.evaluate", json!({"expression": "1+1"}), Some("S1"))
            .await
            .expect("call");

        assert_eq!(result["echo"], "Runtime.evaluate");
        assert_eq!(result["session"], "S1");
        assert_eq!(connection.pending_count(), 0);
    }

    #[tokio::test]
    async fn test_remote_error_is_surfaced() {
        let connection = Connection::connect(&echo_endpoint().await).await.expect("connect");

        let err = connection
            .call("Fail.please", json!({}), None)
            .await
            .expect_err("remote error");
        assert!(err.is_detachment());
    }

    #[tokio::test]
    async fn test_events_fan_out() {
        let connection = Connection::connect(&echo_endpoint().await).await.expect("connect");
        let mut events = connection.events();

        connection
            .call("Page.enable", json!({}), Some("S1"))
            .await
            .expect("call");

        let event = timeout(Duration::from_secs(5), events.recv())
            .await
            .expect("event in time")
            .expect("event");
        assert_eq!(event.method, "Page.loadEventFired");
        assert_eq!(event.session_id.as_deref(), Some("S1"));
    }

    #[tokio::test]
    async fn test_request_timeout_forgets_waiter() {
        let connection = Connection::connect(&echo_endpoint().await).await.expect("connect");

        let request = Request::new(RequestId::new(77), "Hang.forever", json!({}));
        let err = connection
            .request(request, Duration::from_millis(50))
            .await
            .expect_err("no reply");

        assert!(err.is_timeout());
        assert_eq!(connection.pending_count(), 0);
    }

    #[tokio::test]
    async fn test_close_fails_later_requests() {
        let connection = Connection::connect(&echo_endpoint().await).await.expect("connect");

        connection.close();
        timeout(Duration::from_secs(5), async {
            while !connection.is_closed() {
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
        })
        .await
        .expect("socket closes");

        let err = connection
            .call("Page.enable", json!({}), None)
            .await
            .expect_err("closed");
        assert!(err.is_connection_error());
    }
}
