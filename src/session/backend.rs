//! Debugger backend abstraction and the DevTools implementation.
//!
//! [`DebuggerBackend`] is the seam between [`ProtocolSession`] and the
//! browser: attach/detach keyed by target, a generic command call, target
//! introspection and a lifecycle event stream.
//!
//! [`CdpBackend`] implements it over a WebSocket [`Connection`] using
//! flattened target sessions.
//!
//! # Event Translation
//!
//! | Remote event | Lifecycle event |
//! |--------------|-----------------|
//! | `Page.frameStartedLoading` (main frame) | `TabUpdated { Loading }` |
//! | `Page.loadEventFired` | `TabUpdated { Complete }` |
//! | `Target.targetInfoChanged` (page) | `TabUpdated { url }` |
//! | `Target.detachedFromTarget` | `TargetDetached` |
//! | `Inspector.detached` | `TargetDetached { reason }` |
//! | `Target.targetDestroyed` | `TabClosed` |
//!
//! [`ProtocolSession`]: super::ProtocolSession

// ============================================================================
// Imports
// ============================================================================

use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use rustc_hash::FxHashMap;
use serde::Deserialize;
use serde_json::Value;
use tokio::task::JoinHandle;
use tracing::{debug, info, trace};
use url::Url;

use crate::error::{Error, Result};
use crate::identifiers::TargetId;
use crate::protocol::{Command, Event, PageCommand, ParsedEvent, TargetCommand};
use crate::transport::{Connection, EventStream, Subscribers};

use super::events::{DetachReason, LifecycleEvent, LoadStatus};

// ============================================================================
// Constants
// ============================================================================

/// Target type of a browser tab.
const PAGE_TARGET_TYPE: &str = "page";

// ============================================================================
// TargetInfo
// ============================================================================

/// Snapshot of a target as reported by the backend.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TargetInfo {
    /// Target ID.
    pub id: TargetId,
    /// Current URL.
    pub url: String,
    /// Target type (`page`, `iframe`, `service_worker`, ...).
    pub kind: String,
    /// Whether this client holds a live session on the target.
    pub attached: bool,
}

/// Wire form of `TargetInfo`.
#[derive(Debug, Deserialize)]
struct WireTargetInfo {
    #[serde(rename = "targetId")]
    target_id: String,
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    url: String,
    #[serde(default)]
    attached: bool,
}

impl WireTargetInfo {
    fn into_info(self, attached: bool) -> Option<TargetInfo> {
        Some(TargetInfo {
            id: TargetId::new(self.target_id)?,
            url: self.url,
            kind: self.kind,
            attached,
        })
    }
}

// ============================================================================
// DebuggerBackend
// ============================================================================

/// Remote debugging capabilities consumed by the protocol session.
#[async_trait]
pub trait DebuggerBackend: Send + Sync {
    /// Attaches the debugger to `target`.
    async fn attach(&self, target: &TargetId) -> Result<()>;

    /// Detaches the debugger from `target`.
    async fn detach(&self, target: &TargetId) -> Result<()>;

    /// Sends `method` with `params` to an attached target.
    ///
    /// Fails with [`Error::NotAttached`] when no session exists for `target`.
    async fn send_command(&self, target: &TargetId, method: &str, params: Value) -> Result<Value>;

    /// Describes `target`, or `None` if it no longer exists.
    async fn target_info(&self, target: &TargetId) -> Result<Option<TargetInfo>>;

    /// Returns the current foreground tab, if any.
    async fn active_target(&self) -> Result<Option<TargetInfo>>;

    /// Subscribes to lifecycle events.
    fn subscribe(&self) -> EventStream<LifecycleEvent>;
}

// ============================================================================
// CdpBackend
// ============================================================================

/// Map of attached targets to their flattened session ids.
type SessionMap = FxHashMap<TargetId, String>;

/// [`DebuggerBackend`] over a DevTools WebSocket connection.
pub struct CdpBackend {
    connection: Connection,
    sessions: Arc<Mutex<SessionMap>>,
    subscribers: Subscribers<LifecycleEvent>,
    pump: JoinHandle<()>,
}

impl CdpBackend {
    /// Connects to a browser-level debugging endpoint.
    ///
    /// # Errors
    ///
    /// Returns connection errors, or a remote error if target discovery
    /// cannot be enabled.
    pub async fn connect(endpoint: &Url) -> Result<Self> {
        let connection = Connection::connect(endpoint.as_str()).await?;
        Self::from_connection(connection).await
    }

    /// Wraps an established connection and enables target discovery.
    ///
    /// # Errors
    ///
    /// Returns a remote error if target discovery cannot be enabled.
    pub async fn from_connection(connection: Connection) -> Result<Self> {
        let sessions: Arc<Mutex<SessionMap>> = Arc::new(Mutex::new(SessionMap::default()));
        let subscribers = Subscribers::new();

        let pump = tokio::spawn(pump_events(
            connection.events(),
            Arc::clone(&sessions),
            subscribers.clone(),
        ));

        let backend = Self {
            connection,
            sessions,
            subscribers,
            pump,
        };
        backend
            .browser_call(TargetCommand::SetDiscoverTargets { discover: true })
            .await?;

        info!("DevTools backend ready");
        Ok(backend)
    }

    /// Closes the underlying connection.
    pub fn shutdown(&self) {
        self.pump.abort();
        self.connection.close();
    }

    /// Sends a typed command at browser level.
    async fn browser_call(&self, command: impl Into<Command>) -> Result<Value> {
        let (method, params) = command.into().into_parts()?;
        self.connection.call(&method, params, None).await
    }

    /// Enables page lifecycle events on a flattened session.
    async fn enable_page(&self, session_id: &str) -> Result<Value> {
        let (method, params) = Command::from(PageCommand::Enable).into_parts()?;
        self.connection.call(&method, params, Some(session_id)).await
    }

    fn session_of(&self, target: &TargetId) -> Option<String> {
        self.sessions.lock().get(target).cloned()
    }
}

#[async_trait]
impl DebuggerBackend for CdpBackend {
    async fn attach(&self, target: &TargetId) -> Result<()> {
        // Replace rather than leak a stale session
        let previous = self.sessions.lock().remove(target);
        if let Some(previous) = previous
            && let Err(e) = self
                .browser_call(TargetCommand::DetachFromTarget {
                    session_id: previous,
                })
                .await
        {
            debug!(target_id = %target, error = %e, "Stale session detach failed");
        }

        let result = self
            .browser_call(TargetCommand::AttachToTarget {
                target_id: target.clone(),
                flatten: true,
            })
            .await?;

        let session_id = result
            .get("sessionId")
            .and_then(Value::as_str)
            .filter(|id| !id.is_empty())
            .ok_or_else(|| Error::protocol("Target.attachToTarget returned no sessionId"))?
            .to_string();

        if let Err(e) = self.enable_page(&session_id).await {
            // The remote session exists but is not recorded; close it
            if let Err(detach) = self
                .browser_call(TargetCommand::DetachFromTarget {
                    session_id: session_id.clone(),
                })
                .await
            {
                debug!(target_id = %target, error = %detach, "Orphan session detach failed");
            }
            return Err(e);
        }

        debug!(target_id = %target, session_id = %session_id, "Attached");
        self.sessions.lock().insert(target.clone(), session_id);
        Ok(())
    }

    async fn detach(&self, target: &TargetId) -> Result<()> {
        let Some(session_id) = self.sessions.lock().remove(target) else {
            return Ok(());
        };

        self.browser_call(TargetCommand::DetachFromTarget { session_id })
            .await?;
        debug!(target_id = %target, "Detached");
        Ok(())
    }

    async fn send_command(&self, target: &TargetId, method: &str, params: Value) -> Result<Value> {
        let session_id = self
            .session_of(target)
            .ok_or_else(|| Error::not_attached(target.clone()))?;

        self.connection
            .call(method, params, Some(&session_id))
            .await
    }

    async fn target_info(&self, target: &TargetId) -> Result<Option<TargetInfo>> {
        let result = match self
            .browser_call(TargetCommand::GetTargetInfo {
                target_id: target.clone(),
            })
            .await
        {
            Ok(result) => result,
            // "No target with given id found"
            Err(Error::Remote { .. }) => return Ok(None),
            Err(e) => return Err(e),
        };

        let Some(raw) = result.get("targetInfo").cloned() else {
            return Ok(None);
        };
        let wire: WireTargetInfo = serde_json::from_value(raw)?;
        let attached = wire.attached && self.session_of(target).is_some();
        Ok(wire.into_info(attached))
    }

    async fn active_target(&self) -> Result<Option<TargetInfo>> {
        let result = self.browser_call(TargetCommand::GetTargets).await?;
        let wires: Vec<WireTargetInfo> = match result.get("targetInfos").cloned() {
            Some(raw) => serde_json::from_value(raw)?,
            None => Vec::new(),
        };

        let sessions = self.sessions.lock();
        Ok(wires
            .into_iter()
            .filter(|wire| wire.kind == PAGE_TARGET_TYPE)
            .find_map(|wire| {
                let attached = wire.attached
                    && TargetId::new(wire.target_id.clone())
                        .is_some_and(|id| sessions.contains_key(&id));
                wire.into_info(attached)
            }))
    }

    fn subscribe(&self) -> EventStream<LifecycleEvent> {
        self.subscribers.subscribe()
    }
}

// ============================================================================
// Event Translation
// ============================================================================

/// Translates socket events into lifecycle events until the socket closes.
async fn pump_events(
    mut events: EventStream<Event>,
    sessions: Arc<Mutex<SessionMap>>,
    subscribers: Subscribers<LifecycleEvent>,
) {
    while let Some(event) = events.recv().await {
        if let Some(lifecycle) = translate_event(&event, &sessions) {
            trace!(?lifecycle, "Lifecycle event");
            subscribers.publish(lifecycle);
        }
    }
    debug!("Event pump stopped");
}

/// Maps a raw event to a lifecycle event, updating the session map.
fn translate_event(event: &Event, sessions: &Mutex<SessionMap>) -> Option<LifecycleEvent> {
    let target_of_session = |session_id: &str| {
        sessions
            .lock()
            .iter()
            .find(|(_, sid)| sid.as_str() == session_id)
            .map(|(target, _)| target.clone())
    };
    let emitting_target = || {
        event
            .session_id
            .as_deref()
            .and_then(|sid| target_of_session(sid))
    };

    match event.parse() {
        ParsedEvent::PageFrameStartedLoading { frame_id } => {
            let target = emitting_target()?;
            // Main frame shares the target's id
            (frame_id == target.as_str()).then_some(LifecycleEvent::TabUpdated {
                target,
                status: Some(LoadStatus::Loading),
                url: None,
            })
        }

        ParsedEvent::PageLoadEventFired => Some(LifecycleEvent::TabUpdated {
            target: emitting_target()?,
            status: Some(LoadStatus::Complete),
            url: None,
        }),

        ParsedEvent::TargetInfoChanged {
            target_id,
            url,
            kind,
            ..
        } if kind == PAGE_TARGET_TYPE => Some(LifecycleEvent::TabUpdated {
            target: TargetId::new(target_id)?,
            status: None,
            url: Some(url),
        }),

        ParsedEvent::TargetDetachedFromTarget {
            session_id,
            target_id,
        } => {
            let target = match target_id.and_then(TargetId::new) {
                Some(target) => target,
                None => target_of_session(&session_id)?,
            };
            sessions.lock().retain(|_, sid| *sid != session_id);
            Some(LifecycleEvent::TargetDetached {
                target,
                reason: DetachReason::Other("detached_from_target".to_string()),
            })
        }

        ParsedEvent::InspectorDetached { reason } => {
            let target = emitting_target()?;
            sessions.lock().remove(&target);
            Some(LifecycleEvent::TargetDetached {
                target,
                reason: DetachReason::from_remote(&reason),
            })
        }

        ParsedEvent::TargetDestroyed { target_id } => {
            let target = TargetId::new(target_id)?;
            sessions.lock().remove(&target);
            Some(LifecycleEvent::TabClosed { target })
        }

        _ => None,
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    use futures_util::{SinkExt, StreamExt};
    use serde_json::json;
    use tokio::net::TcpListener;
    use tokio_tungstenite::tungstenite::Message;

    /// Behaviour switches for [`devtools_endpoint`].
    #[derive(Debug, Default, Clone, Copy)]
    struct Script {
        empty_session_id: bool,
        fail_page_enable: bool,
    }

    type Requests = Arc<Mutex<Vec<Value>>>;

    /// Local DevTools endpoint answering the target domain.
    ///
    /// Sessions are numbered `S1`, `S2`, ... per attach. Only `T1` and `T2`
    /// exist, and `W1` is a service worker listed ahead of them.
    async fn devtools_endpoint(script: Script) -> (Url, Requests) {
        let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
        let addr = listener.local_addr().expect("addr");
        let requests = Requests::default();
        let recorded = Arc::clone(&requests);

        tokio::spawn(async move {
            let (tcp, _) = listener.accept().await.expect("accept");
            let mut ws = tokio_tungstenite::accept_async(tcp).await.expect("upgrade");
            let mut attaches = 0u32;

            while let Some(Ok(Message::Text(text))) = ws.next().await {
                let request: Value = serde_json::from_str(&text).expect("json");
                recorded.lock().push(request.clone());

                let page = |id: &str| json!({"targetId": id, "type": "page", "url": "https://a.test/", "attached": true});
                let outcome = match request["method"].as_str().unwrap_or_default() {
                    "Target.attachToTarget" => {
                        attaches += 1;
                        let session_id = if script.empty_session_id {
                            String::new()
                        } else {
                            format!("S{attaches}")
                        };
                        Ok(json!({"sessionId": session_id}))
                    }
                    "Page.enable" if script.fail_page_enable => Err("Page.enable failed"),
                    "Target.getTargetInfo" => match request["params"]["targetId"].as_str() {
                        Some(id @ ("T1" | "T2")) => Ok(json!({"targetInfo": page(id)})),
                        _ => Err("No target with given id found"),
                    },
                    "Target.getTargets" => Ok(json!({"targetInfos": [
                        {"targetId": "W1", "type": "service_worker", "url": "https://a.test/sw.js"},
                        page("T1"),
                        page("T2"),
                    ]})),
                    "Runtime.evaluate" => Ok(json!({"session": request["sessionId"]})),
                    _ => Ok(json!({})),
                };
                let reply = match outcome {
                    Ok(result) => json!({"id": request["id"], "result": result}),
                    Err(message) => json!({
                        "id": request["id"],
                        "error": {"code": -32000, "message": message}
                    }),
                };
                ws.send(Message::Text(reply.to_string().into())).await.expect("send");
            }
        });

        let url = Url::parse(&format!("ws://{addr}")).expect("url");
        (url, requests)
    }

    async fn backend(script: Script) -> (CdpBackend, Requests) {
        let (url, requests) = devtools_endpoint(script).await;
        let backend = CdpBackend::connect(&url).await.expect("connect");
        (backend, requests)
    }

    fn sent(requests: &Requests, method: &str) -> Vec<Value> {
        requests
            .lock()
            .iter()
            .filter(|request| request["method"] == method)
            .cloned()
            .collect()
    }

    fn target(id: &str) -> TargetId {
        TargetId::new(id).expect("valid target id")
    }

    fn sessions_with(target_id: &str, session_id: &str) -> Mutex<SessionMap> {
        let mut map = SessionMap::default();
        map.insert(target(target_id), session_id.to_string());
        Mutex::new(map)
    }

    fn event(value: Value) -> Event {
        serde_json::from_value(value).expect("event json")
    }

    #[test]
    fn test_main_frame_loading_maps_to_tab_updated() {
        let sessions = sessions_with("T1", "S1");
        let raw = event(json!({
            "method": "Page.frameStartedLoading",
            "params": {"frameId": "T1"},
            "sessionId": "S1"
        }));

        assert_eq!(
            translate_event(&raw, &sessions),
            Some(LifecycleEvent::TabUpdated {
                target: target("T1"),
                status: Some(LoadStatus::Loading),
                url: None,
            })
        );
    }

    #[test]
    fn test_subframe_loading_is_ignored() {
        let sessions = sessions_with("T1", "S1");
        let raw = event(json!({
            "method": "Page.frameStartedLoading",
            "params": {"frameId": "child"},
            "sessionId": "S1"
        }));
        assert_eq!(translate_event(&raw, &sessions), None);
    }

    #[test]
    fn test_load_event_maps_to_complete() {
        let sessions = sessions_with("T1", "S1");
        let raw = event(json!({"method": "Page.loadEventFired", "params": {}, "sessionId": "S1"}));

        match translate_event(&raw, &sessions) {
            Some(LifecycleEvent::TabUpdated { status, .. }) => {
                assert_eq!(status, Some(LoadStatus::Complete));
            }
            other => panic!("unexpected translation: {other:?}"),
        }
    }

    #[test]
    fn test_inspector_detached_drops_session() {
        let sessions = sessions_with("T1", "S1");
        let raw = event(json!({
            "method": "Inspector.detached",
            "params": {"reason": "target_closed"},
            "sessionId": "S1"
        }));

        assert_eq!(
            translate_event(&raw, &sessions),
            Some(LifecycleEvent::TargetDetached {
                target: target("T1"),
                reason: DetachReason::TargetClosed,
            })
        );
        assert!(sessions.lock().is_empty());
    }

    #[test]
    fn test_target_destroyed_maps_to_tab_closed() {
        let sessions = sessions_with("T1", "S1");
        let raw = event(json!({"method": "Target.targetDestroyed", "params": {"targetId": "T1"}}));

        assert_eq!(
            translate_event(&raw, &sessions),
            Some(LifecycleEvent::TabClosed { target: target("T1") })
        );
        assert!(sessions.lock().is_empty());
    }

    #[test]
    fn test_non_page_info_change_is_ignored() {
        let sessions = Mutex::new(SessionMap::default());
        let raw = event(json!({
            "method": "Target.targetInfoChanged",
            "params": {"targetInfo": {"targetId": "W1", "type": "service_worker", "url": "https://a/sw.js"}}
        }));
        assert_eq!(translate_event(&raw, &sessions), None);
    }

    #[test]
    fn test_events_from_unknown_sessions_are_dropped() {
        let sessions = Mutex::new(SessionMap::default());
        let raw = event(json!({"method": "Page.loadEventFired", "params": {}, "sessionId": "S9"}));
        assert_eq!(translate_event(&raw, &sessions), None);
    }

    #[tokio::test]
    async fn test_connect_enables_discovery() {
        let (_backend, requests) = backend(Script::default()).await;

        let discover = sent(&requests, "Target.setDiscoverTargets");
        assert_eq!(discover.len(), 1);
        assert_eq!(discover[0]["params"]["discover"], true);
    }

    #[tokio::test]
    async fn test_attach_uses_flattened_session() {
        let (backend, requests) = backend(Script::default()).await;

        backend.attach(&target("T1")).await.expect("attach");

        let attach = sent(&requests, "Target.attachToTarget");
        assert_eq!(attach[0]["params"]["targetId"], "T1");
        assert_eq!(attach[0]["params"]["flatten"], true);

        let enable = sent(&requests, "Page.enable");
        assert_eq!(enable.len(), 1);
        assert_eq!(enable[0]["sessionId"], "S1");

        let result = backend
            .send_command(&target("T1"), "Runtime.evaluate", json!({"expression": "1+1"}))
            .await
            .expect("command");
        assert_eq!(result["session"], "S1");
    }

    #[tokio::test]
    async fn test_reattach_replaces_stale_session() {
        let (backend, requests) = backend(Script::default()).await;

        backend.attach(&target("T1")).await.expect("first attach");
        backend.attach(&target("T1")).await.expect("second attach");

        let detach = sent(&requests, "Target.detachFromTarget");
        assert_eq!(detach.len(), 1);
        assert_eq!(detach[0]["params"]["sessionId"], "S1");
        assert_eq!(backend.session_of(&target("T1")).as_deref(), Some("S2"));
    }

    #[tokio::test]
    async fn test_empty_session_id_is_rejected() {
        let (backend, requests) = backend(Script {
            empty_session_id: true,
            ..Script::default()
        })
        .await;

        let err = backend.attach(&target("T1")).await.expect_err("no session");

        assert!(matches!(err, Error::Protocol { .. }));
        assert!(sent(&requests, "Page.enable").is_empty());
        assert!(backend.session_of(&target("T1")).is_none());
    }

    #[tokio::test]
    async fn test_failed_page_enable_closes_new_session() {
        let (backend, requests) = backend(Script {
            fail_page_enable: true,
            ..Script::default()
        })
        .await;

        for _ in 0..3 {
            let err = backend.attach(&target("T1")).await.expect_err("enable fails");
            assert!(matches!(err, Error::Remote { .. }));
        }

        let detached: Vec<_> = sent(&requests, "Target.detachFromTarget")
            .iter()
            .map(|request| request["params"]["sessionId"].clone())
            .collect();
        assert_eq!(detached, [json!("S1"), json!("S2"), json!("S3")]);
        assert!(backend.session_of(&target("T1")).is_none());
    }

    #[tokio::test]
    async fn test_send_without_session_is_not_attached() {
        let (backend, requests) = backend(Script::default()).await;

        let err = backend
            .send_command(&target("T1"), "Runtime.evaluate", json!({}))
            .await
            .expect_err("not attached");

        assert!(matches!(err, Error::NotAttached { .. }));
        assert!(sent(&requests, "Runtime.evaluate").is_empty());
    }

    #[tokio::test]
    async fn test_target_info_requires_local_session() {
        let (backend, _requests) = backend(Script::default()).await;

        let before = backend
            .target_info(&target("T1"))
            .await
            .expect("info")
            .expect("exists");
        assert_eq!(before.kind, "page");
        assert_eq!(before.url, "https://a.test/");
        assert!(!before.attached);

        backend.attach(&target("T1")).await.expect("attach");
        let after = backend
            .target_info(&target("T1"))
            .await
            .expect("info")
            .expect("exists");
        assert!(after.attached);
    }

    #[tokio::test]
    async fn test_missing_target_info_is_none() {
        let (backend, _requests) = backend(Script::default()).await;

        let info = backend.target_info(&target("T9")).await.expect("lookup");
        assert_eq!(info, None);
    }

    #[tokio::test]
    async fn test_active_target_is_first_page() {
        let (backend, _requests) = backend(Script::default()).await;

        let active = backend.active_target().await.expect("targets").expect("page");
        assert_eq!(active.id, target("T1"));
        assert!(!active.attached);
    }

    #[tokio::test]
    async fn test_detach_removes_session() {
        let (backend, requests) = backend(Script::default()).await;
        backend.attach(&target("T1")).await.expect("attach");

        backend.detach(&target("T1")).await.expect("detach");
        backend.detach(&target("T1")).await.expect("second detach is a no-op");

        let detach = sent(&requests, "Target.detachFromTarget");
        assert_eq!(detach.len(), 1);
        assert_eq!(detach[0]["params"]["sessionId"], "S1");
        assert!(matches!(
            backend
                .send_command(&target("T1"), "Runtime.evaluate", json!({}))
                .await,
            Err(Error::NotAttached { .. })
        ));
    }
}
