//! Scripted in-memory backend for tests.
//!
//! Records every attach, detach and command. Failures and responses are
//! scripted per method.

// ============================================================================
// Imports
// ============================================================================

use std::collections::VecDeque;
use std::io::Cursor;

use async_trait::async_trait;
use base64::Engine;
use base64::engine::general_purpose::STANDARD as Base64Standard;
use image::{DynamicImage, ImageFormat, Rgba, RgbaImage};
use parking_lot::Mutex;
use rustc_hash::{FxHashMap, FxHashSet};
use serde_json::{Value, json};

use crate::error::{Error, Result};
use crate::identifiers::TargetId;
use crate::protocol::command::DEVICE_PIXEL_RATIO_EXPRESSION;
use crate::transport::{EventStream, Subscribers};

use super::backend::{DebuggerBackend, TargetInfo};
use super::events::LifecycleEvent;

// ============================================================================
// Call
// ============================================================================

/// One recorded backend interaction.
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Call {
    Attach(TargetId),
    Detach(TargetId),
    Command {
        target: TargetId,
        method: String,
        params: Value,
    },
}

// ============================================================================
// MockBackend
// ============================================================================

#[derive(Default)]
struct MockState {
    /// Open tabs; the first one is the foreground tab.
    tabs: Vec<(TargetId, String)>,
    attached: FxHashSet<TargetId>,
    calls: Vec<Call>,
    attach_failures: u32,
    failures: FxHashMap<String, VecDeque<Error>>,
    responses: FxHashMap<String, Value>,
}

pub(crate) struct MockBackend {
    state: Mutex<MockState>,
    subscribers: Subscribers<LifecycleEvent>,
}

pub(crate) fn target(id: &str) -> TargetId {
    TargetId::new(id).expect("valid target id")
}

impl MockBackend {
    /// One foreground tab `T1` at `https://example.com/`.
    pub(crate) fn new() -> Self {
        let backend = Self {
            state: Mutex::new(MockState::default()),
            subscribers: Subscribers::new(),
        };
        backend.open_tab("T1", "https://example.com/");
        backend
    }

    /// No tabs at all.
    pub(crate) fn empty() -> Self {
        Self {
            state: Mutex::new(MockState::default()),
            subscribers: Subscribers::new(),
        }
    }

    pub(crate) fn open_tab(&self, id: &str, url: &str) {
        self.state.lock().tabs.push((target(id), url.to_string()));
    }

    /// Moves `id` to the foreground and emits `TabActivated`.
    pub(crate) fn activate(&self, id: &str) {
        {
            let mut state = self.state.lock();
            if let Some(index) = state.tabs.iter().position(|(t, _)| t.as_str() == id) {
                let tab = state.tabs.remove(index);
                state.tabs.insert(0, tab);
            }
        }
        self.emit(LifecycleEvent::TabActivated { target: target(id) });
    }

    /// Removes the tab and its attachment without emitting anything.
    pub(crate) fn close_tab(&self, id: &str) {
        let mut state = self.state.lock();
        state.tabs.retain(|(t, _)| t.as_str() != id);
        state.attached.remove(&target(id));
    }

    /// Drops the attachment remotely, as a navigation or crash would.
    pub(crate) fn drop_attachment(&self, id: &str) {
        self.state.lock().attached.remove(&target(id));
    }

    pub(crate) fn fail_attaches(&self, count: u32) {
        self.state.lock().attach_failures = count;
    }

    /// Queues `error` as the next outcome of `method`.
    pub(crate) fn fail_next(&self, method: &str, error: Error) {
        self.state
            .lock()
            .failures
            .entry(method.to_string())
            .or_default()
            .push_back(error);
    }

    /// Sets the result returned for `method`.
    pub(crate) fn respond(&self, method: &str, result: Value) {
        self.state
            .lock()
            .responses
            .insert(method.to_string(), result);
    }

    /// Sets the result returned when evaluating `expression`.
    pub(crate) fn respond_to_expression(&self, expression: &str, result: Value) {
        self.respond(&format!("Runtime.evaluate:{expression}"), result);
    }

    /// Serves a white `width`x`height` PNG for captures at `ratio`.
    pub(crate) fn serve_screen(&self, width: u32, height: u32, ratio: f64) {
        let image = RgbaImage::from_pixel(width, height, Rgba([255, 255, 255, 255]));
        let mut png = Cursor::new(Vec::new());
        DynamicImage::ImageRgba8(image)
            .write_to(&mut png, ImageFormat::Png)
            .expect("encode png");

        self.respond(
            "Page.captureScreenshot",
            json!({ "data": Base64Standard.encode(png.into_inner()) }),
        );
        self.respond_to_expression(
            DEVICE_PIXEL_RATIO_EXPRESSION,
            json!({ "result": { "type": "number", "value": ratio } }),
        );
    }

    pub(crate) fn emit(&self, event: LifecycleEvent) {
        self.subscribers.publish(event);
    }

    pub(crate) fn calls(&self) -> Vec<Call> {
        self.state.lock().calls.clone()
    }

    pub(crate) fn clear_calls(&self) {
        self.state.lock().calls.clear();
    }

    pub(crate) fn attach_count(&self) -> usize {
        self.calls()
            .iter()
            .filter(|call| matches!(call, Call::Attach(_)))
            .count()
    }

    pub(crate) fn is_attached(&self, id: &str) -> bool {
        self.state.lock().attached.contains(&target(id))
    }

    /// Params of every `method` call, in order.
    pub(crate) fn commands(&self, method: &str) -> Vec<Value> {
        self.calls()
            .into_iter()
            .filter_map(|call| match call {
                Call::Command {
                    method: m, params, ..
                } if m == method => Some(params),
                _ => None,
            })
            .collect()
    }

    /// Every command call except liveness probes, as `(method, params)`.
    pub(crate) fn dispatched(&self) -> Vec<(String, Value)> {
        self.calls()
            .into_iter()
            .filter_map(|call| match call {
                Call::Command { method, params, .. }
                    if !(method == "Runtime.evaluate" && params["expression"] == "1+1") =>
                {
                    Some((method, params))
                }
                _ => None,
            })
            .collect()
    }
}

#[async_trait]
impl DebuggerBackend for MockBackend {
    async fn attach(&self, target: &TargetId) -> Result<()> {
        let mut state = self.state.lock();
        state.calls.push(Call::Attach(target.clone()));

        if state.attach_failures > 0 {
            state.attach_failures -= 1;
            return Err(Error::remote(-32000, "Cannot access a chrome:// URL"));
        }
        if !state.tabs.iter().any(|(t, _)| t == target) {
            return Err(Error::remote(-32602, "No target with given id found"));
        }
        state.attached.insert(target.clone());
        Ok(())
    }

    async fn detach(&self, target: &TargetId) -> Result<()> {
        let mut state = self.state.lock();
        state.calls.push(Call::Detach(target.clone()));
        if state.attached.remove(target) {
            Ok(())
        } else {
            Err(Error::not_attached(target.clone()))
        }
    }

    async fn send_command(&self, target: &TargetId, method: &str, params: Value) -> Result<Value> {
        let mut state = self.state.lock();
        state.calls.push(Call::Command {
            target: target.clone(),
            method: method.to_string(),
            params: params.clone(),
        });

        if !state.attached.contains(target) {
            return Err(Error::not_attached(target.clone()));
        }

        if let Some(error) = state.failures.get_mut(method).and_then(VecDeque::pop_front) {
            if error.is_detachment() {
                state.attached.remove(target);
            }
            return Err(error);
        }

        if let Some(expression) = params.get("expression").and_then(Value::as_str)
            && let Some(result) = state.responses.get(&format!("{method}:{expression}"))
        {
            return Ok(result.clone());
        }

        Ok(state
            .responses
            .get(method)
            .cloned()
            .unwrap_or_else(|| json!({})))
    }

    async fn target_info(&self, target: &TargetId) -> Result<Option<TargetInfo>> {
        let state = self.state.lock();
        Ok(state
            .tabs
            .iter()
            .find(|(t, _)| t == target)
            .map(|(t, url)| TargetInfo {
                id: t.clone(),
                url: url.clone(),
                kind: "page".to_string(),
                attached: state.attached.contains(t),
            }))
    }

    async fn active_target(&self) -> Result<Option<TargetInfo>> {
        let state = self.state.lock();
        Ok(state.tabs.first().map(|(t, url)| TargetInfo {
            id: t.clone(),
            url: url.clone(),
            kind: "page".to_string(),
            attached: state.attached.contains(t),
        }))
    }

    fn subscribe(&self) -> EventStream<LifecycleEvent> {
        self.subscribers.subscribe()
    }
}
