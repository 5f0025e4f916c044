use std::fmt::Display;
use std::time::{SystemTime, UNIX_EPOCH};

/// Log target shared by every run-scoped message.
pub const LOG_TARGET: &str = "srcgraph";

/// Logging handle for one orchestration run.
///
/// Built once when a run starts and lent to every task and to the include resolver. Messages
/// carry the run id so interleaved runs stay distinguishable in one log stream.
#[derive(Debug, Clone)]
pub struct LogContext {
    run_id: String,
    enabled: bool,
}

impl LogContext {
    #[must_use]
    pub fn new(run_id: impl Into<String>) -> Self {
        Self {
            run_id: run_id.into(),
            enabled: true,
        }
    }

    /// Context whose run id is derived from the current time.
    #[must_use]
    pub fn for_new_run() -> Self {
        let millis = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_millis())
            .unwrap_or(0);
        Self::new(format!("{millis:x}"))
    }

    #[must_use]
    pub fn disabled() -> Self {
        Self {
            run_id: String::new(),
            enabled: false,
        }
    }

    #[must_use]
    pub fn run_id(&self) -> &str {
        &self.run_id
    }

    #[must_use]
    pub const fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn info(&self, message: impl Display) {
        if self.enabled {
            log::info!(target: LOG_TARGET, "[{}] {message}", self.run_id);
        }
    }

    pub fn warn(&self, message: impl Display) {
        if self.enabled {
            log::warn!(target: LOG_TARGET, "[{}] {message}", self.run_id);
        }
    }

    pub fn error(&self, message: impl Display) {
        if self.enabled {
            log::error!(target: LOG_TARGET, "[{}] {message}", self.run_id);
        }
    }

    pub fn debug(&self, message: impl Display) {
        if self.enabled {
            log::debug!(target: LOG_TARGET, "[{}] {message}", self.run_id);
        }
    }
}
