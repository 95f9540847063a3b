//! Resilient protocol session bound to one tab.
//!
//! [`ProtocolSession`] owns the attachment lifecycle of a single target and
//! funnels every protocol command through validation, attachment and retry.
//!
//! # State Machine
//!
//! ```text
//!            attach()                 probe ok
//! Detached ───────────► Attaching ───────────► Attached
//!    ▲                      │                     │
//!    │   retries exhausted  │    detach event /   │
//!    └──────────────────────┘    detachment error │
//!    └────────────────────────────────────────────┘
//!
//! any state ── cleanup() ──► Closed
//! ```
//!
//! # Command Path
//!
//! | Step | Failure handling |
//! |------|------------------|
//! | Resolve target | Stale target falls back to the foreground tab; none → [`Error::NoTabsFound`] |
//! | Ensure attached | `attach()` with the configured attach retries |
//! | Send | Detachment-like → reattach and resubmit; other → backoff and retry |

// ============================================================================
// Imports
// ============================================================================

use std::sync::{Arc, Weak};
use std::time::Instant;

use parking_lot::Mutex;
use serde_json::Value;
use tokio::task::JoinHandle;
use tokio::time::sleep;
use tracing::{debug, info, warn};

use crate::config::SessionOptions;
use crate::error::{Error, Result};
use crate::identifiers::TargetId;
use crate::protocol::{Command, RuntimeCommand};

use super::backend::{DebuggerBackend, TargetInfo};
use super::events::{DetachReason, LifecycleEvent, LoadStatus};
use super::stats::SessionStats;
use super::target::Target;

// ============================================================================
// Constants
// ============================================================================

/// Attach attempts made while recovering readiness.
const RECOVERY_RETRIES: u32 = 2;

// ============================================================================
// Types
// ============================================================================

/// Attachment state of a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionPhase {
    /// No live attachment.
    Detached,
    /// An attach attempt is in progress.
    Attaching,
    /// Attached and verified by a liveness probe.
    Attached,
    /// Cleaned up; terminal.
    Closed,
}

#[derive(Debug)]
struct SessionState {
    target: Option<Target>,
    phase: SessionPhase,
}

// ============================================================================
// ProtocolSession
// ============================================================================

/// Attachment lifecycle and command execution for one target.
///
/// Shared as `Arc<ProtocolSession>` between the input translator, the
/// screen capturer and the lifecycle event pump.
pub struct ProtocolSession {
    backend: Arc<dyn DebuggerBackend>,
    options: SessionOptions,
    state: Mutex<SessionState>,
    stats: Mutex<SessionStats>,
    /// Serializes attach attempts.
    attach_gate: tokio::sync::Mutex<()>,
}

impl ProtocolSession {
    /// Creates a detached session without a tracked target.
    ///
    /// The first command resolves the foreground tab.
    #[must_use]
    pub fn new(backend: Arc<dyn DebuggerBackend>, options: SessionOptions) -> Self {
        let stats = SessionStats::new(options.error_history, options.stats_log_interval);
        Self {
            backend,
            options,
            state: Mutex::new(SessionState {
                target: None,
                phase: SessionPhase::Detached,
            }),
            stats: Mutex::new(stats),
            attach_gate: tokio::sync::Mutex::new(()),
        }
    }

    /// Starts consuming lifecycle events from the backend.
    ///
    /// The pump holds a weak reference and stops once the session is
    /// dropped or closed.
    pub fn start(self: &Arc<Self>) -> JoinHandle<()> {
        let mut events = self.backend.subscribe();
        let session = Arc::downgrade(self);

        tokio::spawn(async move {
            while let Some(event) = events.recv().await {
                let Some(session) = Weak::upgrade(&session) else {
                    break;
                };
                if session.phase() == SessionPhase::Closed {
                    break;
                }
                session.handle_event(event).await;
            }
            debug!("Lifecycle pump stopped");
        })
    }

    /// Returns the session options.
    #[inline]
    #[must_use]
    pub fn options(&self) -> &SessionOptions {
        &self.options
    }

    /// Returns the tracked target.
    #[must_use]
    pub fn target(&self) -> Option<Target> {
        self.state.lock().target.clone()
    }

    /// Returns the current phase.
    #[must_use]
    pub fn phase(&self) -> SessionPhase {
        self.state.lock().phase
    }

    /// Returns `true` if attached to the tracked target.
    #[must_use]
    pub fn is_attached(&self) -> bool {
        self.phase() == SessionPhase::Attached
    }

    /// Returns a snapshot of the command statistics.
    #[must_use]
    pub fn stats(&self) -> SessionStats {
        self.stats.lock().clone()
    }

    /// Tracks `target` without attaching.
    ///
    /// Switching targets resets the phase to `Detached`.
    pub fn bind(&self, target: Target) {
        let mut state = self.state.lock();
        if state.phase == SessionPhase::Closed {
            return;
        }
        if state.target.as_ref().map(Target::id) != Some(target.id()) {
            state.phase = SessionPhase::Detached;
        }
        state.target = Some(target);
    }
}

// ============================================================================
// Attachment
// ============================================================================

impl ProtocolSession {
    /// Attaches to `target_id`, making up to `retries` attempts.
    ///
    /// Idempotent: when already attached and the liveness probe passes, no
    /// remote attach call is made. Each successful attach is verified by a
    /// probe. Returns `false` once retries are exhausted.
    pub async fn attach(&self, target_id: &TargetId, retries: u32) -> bool {
        let _gate = self.attach_gate.lock().await;

        let previous = {
            let state = self.state.lock();
            if state.phase == SessionPhase::Closed {
                return false;
            }
            state.target.clone()
        };

        let same_target = previous.as_ref().map(Target::id) == Some(target_id);
        if same_target && self.is_attached() {
            if self.probe(target_id).await {
                debug!(target_id = %target_id, "Already attached");
                return true;
            }
            warn!(target_id = %target_id, "Liveness probe failed, reattaching");
        }

        if let Some(previous) = previous.filter(|_| !same_target)
            && self.is_attached()
            && let Err(e) = self.backend.detach(previous.id()).await
        {
            debug!(target_id = %previous.id(), error = %e, "Detach of previous target failed");
        }

        // Keep the known URL when re-attaching to the same tab
        let target = self
            .target()
            .filter(|t| t.id() == target_id)
            .unwrap_or_else(|| Target::new(target_id.clone(), None));
        if target.is_unsupported() {
            warn!(target_id = %target_id, url = ?target.url(), "Target URL is not normally debuggable");
        }
        self.set_phase_and_target(SessionPhase::Attaching, Some(target));

        for attempt in 0..retries {
            match self.backend.attach(target_id).await {
                Ok(()) => {
                    if self.probe(target_id).await {
                        if !self.transition(SessionPhase::Attaching, SessionPhase::Attached) {
                            return false;
                        }
                        info!(target_id = %target_id, attempt = attempt + 1, "Attached");
                        return true;
                    }
                    warn!(target_id = %target_id, attempt = attempt + 1, "Attached but liveness probe failed");
                }
                Err(e) => {
                    warn!(target_id = %target_id, attempt = attempt + 1, error = %e, "Attach failed");
                }
            }

            if attempt + 1 < retries {
                sleep(self.options.backoff.delay(attempt)).await;
            }
        }

        self.transition(SessionPhase::Attaching, SessionPhase::Detached);
        warn!(target_id = %target_id, retries, "Giving up on attach");
        false
    }

    /// Detaches from the tracked target.
    ///
    /// Best effort: the local flag is cleared even if the remote call fails.
    pub async fn detach(&self) {
        let target = {
            let mut state = self.state.lock();
            if state.phase != SessionPhase::Closed {
                state.phase = SessionPhase::Detached;
            }
            state.target.as_ref().map(|t| t.id().clone())
        };

        if let Some(target) = target
            && let Err(e) = self.backend.detach(&target).await
        {
            debug!(target_id = %target, error = %e, "Remote detach failed");
        }
    }

    /// Detaches and closes the session. Further commands fail with
    /// [`Error::SessionClosed`].
    pub async fn cleanup(&self) {
        self.detach().await;
        {
            let mut state = self.state.lock();
            state.phase = SessionPhase::Closed;
            state.target = None;
        }
        self.stats.lock().log_summary();
        info!("Session closed");
    }

    /// Evaluates the liveness probe directly against the backend.
    async fn probe(&self, target_id: &TargetId) -> bool {
        let Ok((method, params)) = Command::from(RuntimeCommand::liveness_probe()).into_parts()
        else {
            return false;
        };
        match self.backend.send_command(target_id, &method, params).await {
            Ok(_) => true,
            Err(e) => {
                debug!(target_id = %target_id, error = %e, "Liveness probe failed");
                false
            }
        }
    }

    /// Marks the session detached if it tracks `target_id`.
    fn mark_detached(&self, target_id: &TargetId) {
        let mut state = self.state.lock();
        let tracked = state.target.as_ref().map(Target::id) == Some(target_id);
        if tracked && matches!(state.phase, SessionPhase::Attached | SessionPhase::Attaching) {
            state.phase = SessionPhase::Detached;
        }
    }

    fn set_phase_and_target(&self, phase: SessionPhase, target: Option<Target>) {
        let mut state = self.state.lock();
        if state.phase == SessionPhase::Closed {
            return;
        }
        state.phase = phase;
        state.target = target;
    }

    /// Moves `from` → `to`; returns `false` if the phase changed meanwhile.
    fn transition(&self, from: SessionPhase, to: SessionPhase) -> bool {
        let mut state = self.state.lock();
        if state.phase != from {
            return false;
        }
        state.phase = to;
        true
    }
}

// ============================================================================
// Commands
// ============================================================================

impl ProtocolSession {
    /// Executes a typed command with the default retry budget.
    ///
    /// # Errors
    ///
    /// See [`ProtocolSession::execute_command`].
    pub async fn execute(&self, command: impl Into<Command>) -> Result<Value> {
        let (method, params) = command.into().into_parts()?;
        self.execute_command(&method, params, self.options.command_retries)
            .await
    }

    /// Executes `method` against the live target.
    ///
    /// Validates the target, attaches if needed and sends. A detachment-like
    /// error triggers reattach-and-resubmit; any other error is retried with
    /// backoff. At most `retry_count + 1` attempts are made.
    ///
    /// # Errors
    ///
    /// - [`Error::SessionClosed`] after [`ProtocolSession::cleanup`]
    /// - [`Error::NoTabsFound`] if no tab is available (never retried)
    /// - [`Error::AttachFailed`] if attaching exhausts its retries
    /// - [`Error::CommandFailed`] once the retry budget is spent
    pub async fn execute_command(
        &self,
        method: &str,
        params: Value,
        retry_count: u32,
    ) -> Result<Value> {
        if self.phase() == SessionPhase::Closed {
            return Err(Error::SessionClosed);
        }

        let started = Instant::now();
        let result = self.run_with_retries(method, &params, retry_count).await;

        let error = result.as_ref().err().map(ToString::to_string);
        self.stats
            .lock()
            .record(method, started.elapsed(), error.as_deref());

        result
    }

    async fn run_with_retries(&self, method: &str, params: &Value, retry_count: u32) -> Result<Value> {
        let mut attempt = 0;

        loop {
            let target = self.resolve_target().await?;
            self.ensure_attached(&target).await?;

            let error = match self.backend.send_command(&target, method, params.clone()).await {
                Ok(value) => return Ok(value),
                Err(e) if e.is_target_loss() => return Err(e),
                Err(e) => e,
            };

            if attempt >= retry_count {
                warn!(method, attempts = attempt + 1, error = %error, "Command failed");
                return Err(Error::command_failed(method, attempt + 1, error.to_string()));
            }

            if error.is_detachment() {
                warn!(method, target_id = %target, error = %error, "Detached during command, reattaching");
                self.mark_detached(&target);
                if self.attach(&target, self.options.attach_retries).await {
                    sleep(self.options.resubmit_delay).await;
                }
            } else {
                debug!(method, attempt = attempt + 1, error = %error, "Command failed, retrying");
                sleep(self.options.backoff.delay(attempt)).await;
            }

            attempt += 1;
        }
    }

    async fn ensure_attached(&self, target: &TargetId) -> Result<()> {
        if self.is_attached() {
            return Ok(());
        }
        let retries = self.options.attach_retries;
        if self.attach(target, retries).await {
            Ok(())
        } else {
            Err(Error::attach_failed(target.clone(), retries))
        }
    }

    /// Re-verifies the tracked target, falling back to the foreground tab.
    async fn resolve_target(&self) -> Result<TargetId> {
        if let Some(tracked) = self.target() {
            match self.backend.target_info(tracked.id()).await {
                Ok(Some(info)) => {
                    self.sync_with(&info);
                    return Ok(info.id);
                }
                Ok(None) => {
                    info!(target_id = %tracked.id(), "Tracked target is gone, using foreground tab");
                }
                Err(e) => {
                    warn!(target_id = %tracked.id(), error = %e, "Target lookup failed, using foreground tab");
                }
            }
        }

        let info = self
            .backend
            .active_target()
            .await?
            .ok_or(Error::NoTabsFound)?;

        info!(target_id = %info.id, url = %info.url, "Switching to foreground tab");
        let id = info.id.clone();
        self.bind(Target::new(info.id, Some(info.url)));
        Ok(id)
    }

    /// Aligns local state with the remote view of the tracked target.
    fn sync_with(&self, info: &TargetInfo) {
        let mut state = self.state.lock();
        if state.phase == SessionPhase::Attached && !info.attached {
            warn!(target_id = %info.id, "State mismatch: remote reports not attached");
            state.phase = SessionPhase::Detached;
        }
        if let Some(target) = state.target.as_mut()
            && target.id() == &info.id
            && target.url() != Some(info.url.as_str())
            && !info.url.is_empty()
        {
            target.set_url(info.url.clone());
        }
    }
}

// ============================================================================
// Readiness
// ============================================================================

impl ProtocolSession {
    /// Makes sure the session can take an action.
    ///
    /// Attaches if needed and runs the liveness probe through the command
    /// path. On failure: detach, re-resolve the foreground tab, attach with
    /// two retries and probe again.
    ///
    /// # Errors
    ///
    /// - [`Error::NoTabsFound`] if no tab is available
    /// - [`Error::AttachFailed`] if recovery cannot attach
    /// - the probe's error if the recovered session is still not live
    pub async fn ensure_ready(&self) -> Result<()> {
        let first = match self.execute(RuntimeCommand::liveness_probe()).await {
            Ok(_) => return Ok(()),
            Err(e) if e.is_target_loss() || matches!(e, Error::SessionClosed) => return Err(e),
            Err(e) => e,
        };

        warn!(error = %first, "Session not ready, recovering");
        self.detach().await;

        let info = self
            .backend
            .active_target()
            .await?
            .ok_or(Error::NoTabsFound)?;
        let id = info.id.clone();
        self.bind(Target::new(info.id, Some(info.url)));

        if !self.attach(&id, RECOVERY_RETRIES).await {
            return Err(Error::attach_failed(id, RECOVERY_RETRIES));
        }

        self.execute(RuntimeCommand::liveness_probe()).await?;
        info!(target_id = %id, "Session recovered");
        Ok(())
    }
}

// ============================================================================
// Lifecycle Events
// ============================================================================

impl ProtocolSession {
    /// Applies one lifecycle event.
    ///
    /// Events about tabs other than the tracked one are ignored, except
    /// activation, which switches the session to the activated tab.
    pub async fn handle_event(&self, event: LifecycleEvent) {
        let Some(tracked) = self.target() else {
            if let LifecycleEvent::TabActivated { target } = event {
                self.switch_to(target).await;
            }
            return;
        };

        match event {
            LifecycleEvent::TabActivated { target } => {
                if &target != tracked.id() {
                    self.switch_to(target).await;
                }
            }

            event if event.target() != tracked.id() => {}

            LifecycleEvent::TabUpdated { target, status, url } => {
                if let Some(url) = url {
                    let mut state = self.state.lock();
                    if let Some(t) = state.target.as_mut() {
                        t.set_url(url);
                    }
                }
                match status {
                    Some(LoadStatus::Loading) => {
                        debug!(target_id = %target, "Navigation started");
                        self.mark_detached(&target);
                    }
                    Some(LoadStatus::Complete) => self.reattach_after_load(&target).await,
                    None => {}
                }
            }

            LifecycleEvent::TargetDetached { target, reason } => {
                info!(target_id = %target, ?reason, "Debugger detached");
                self.mark_detached(&target);
                if reason == DetachReason::TargetClosed {
                    self.forget(&target);
                }
            }

            LifecycleEvent::TabClosed { target } => {
                info!(target_id = %target, "Tracked tab closed");
                self.mark_detached(&target);
                self.forget(&target);
            }
        }
    }

    async fn reattach_after_load(&self, target: &TargetId) {
        if self.is_attached() && self.probe(target).await {
            return;
        }

        sleep(self.options.reattach_delay).await;
        if self.attach(target, self.options.attach_retries).await {
            return;
        }

        sleep(self.options.reattach_fallback_delay).await;
        if !self.attach(target, self.options.attach_retries).await {
            warn!(target_id = %target, "Reattach after load failed");
        }
    }

    async fn switch_to(&self, target: TargetId) {
        info!(target_id = %target, "Foreground tab changed");
        if self.is_attached() {
            self.detach().await;
        }

        let url = match self.backend.target_info(&target).await {
            Ok(Some(info)) => Some(info.url),
            _ => None,
        };
        self.bind(Target::new(target.clone(), url));

        if !self.attach(&target, self.options.attach_retries).await {
            warn!(target_id = %target, "Attach to activated tab failed");
        }
    }

    /// Drops the tracked target so the next command resolves a new one.
    fn forget(&self, target: &TargetId) {
        let mut state = self.state.lock();
        if state.target.as_ref().map(Target::id) == Some(target) {
            state.target = None;
            if state.phase != SessionPhase::Closed {
                state.phase = SessionPhase::Detached;
            }
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
