//! Per-method command statistics.

// ============================================================================
// Imports
// ============================================================================

use std::collections::VecDeque;
use std::time::Duration;

use rustc_hash::FxHashMap;
use tracing::info;

// ============================================================================
// MethodStats
// ============================================================================

/// Counters for one protocol method.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MethodStats {
    /// Calls made.
    pub total: u64,
    /// Calls that succeeded.
    pub success: u64,
    /// Calls that failed after retries.
    pub failure: u64,
    /// Moving-average latency in milliseconds.
    pub avg_latency_ms: f64,
    /// Most recent error messages, oldest first.
    pub recent_errors: VecDeque<String>,
}

impl MethodStats {
    /// Moving-average latency.
    #[inline]
    #[must_use]
    pub fn avg_latency(&self) -> Duration {
        Duration::from_secs_f64(self.avg_latency_ms.max(0.0) / 1000.0)
    }
}

// ============================================================================
// SessionStats
// ============================================================================

/// Rolling statistics of all commands issued through a session.
#[derive(Debug, Clone)]
pub struct SessionStats {
    methods: FxHashMap<String, MethodStats>,
    completed: u64,
    error_history: usize,
    log_interval: u64,
}

impl SessionStats {
    /// Creates empty statistics.
    ///
    /// # Arguments
    ///
    /// * `error_history` - Errors retained per method
    /// * `log_interval` - Completed commands between consolidated reports (0 disables)
    #[must_use]
    pub fn new(error_history: usize, log_interval: u64) -> Self {
        Self {
            methods: FxHashMap::default(),
            completed: 0,
            error_history,
            log_interval,
        }
    }

    /// Records one completed command.
    ///
    /// Emits a consolidated report every `log_interval` completions.
    pub fn record(&mut self, method: &str, latency: Duration, error: Option<&str>) {
        let entry = self.methods.entry(method.to_string()).or_default();

        entry.total += 1;
        let latency_ms = latency.as_secs_f64() * 1000.0;
        entry.avg_latency_ms += (latency_ms - entry.avg_latency_ms) / entry.total as f64;

        match error {
            None => entry.success += 1,
            Some(message) => {
                entry.failure += 1;
                if entry.recent_errors.len() == self.error_history {
                    entry.recent_errors.pop_front();
                }
                entry.recent_errors.push_back(message.to_string());
            }
        }

        self.completed += 1;
        if self.log_interval > 0 && self.completed % self.log_interval == 0 {
            self.log_summary();
        }
    }

    /// Returns counters for `method`.
    #[inline]
    #[must_use]
    pub fn method(&self, method: &str) -> Option<&MethodStats> {
        self.methods.get(method)
    }

    /// Returns the number of completed commands.
    #[inline]
    #[must_use]
    pub fn completed(&self) -> u64 {
        self.completed
    }

    /// Logs a consolidated report at info level.
    pub fn log_summary(&self) {
        let (success, failure) = self
            .methods
            .values()
            .fold((0, 0), |(s, f), m| (s + m.success, f + m.failure));

        info!(
            completed = self.completed,
            success,
            failure,
            methods = self.methods.len(),
            "Protocol command statistics"
        );

        for (method, stats) in &self.methods {
            info!(
                method = %method,
                total = stats.total,
                success = stats.success,
                failure = stats.failure,
                avg_latency_ms = %format!("{:.1}", stats.avg_latency_ms),
                last_error = stats.recent_errors.back().map(String::as_str).unwrap_or("-"),
                "Method statistics"
            );
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
