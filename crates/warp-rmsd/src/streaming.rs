//! NDJSON progress events for pipeline integration.
//!
//! Emits one JSON object per line to stderr so stdout stays free for
//! results.
//!
//! Event types:
//!   - forward_started: batch shape and solver
//!   - forward_complete: per-batch timing and mean-square deviation range
//!   - backward_complete: gradient mode and timing
//!   - gradcheck_complete: finite-difference summary
//!   - error: failure code and message

use std::time::Duration;

use serde::Serialize;

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum StreamEvent {
    ForwardStarted {
        batch_size: usize,
        capacity: usize,
        method: String,
    },
    ForwardComplete {
        batch_size: usize,
        min_msd: f64,
        max_msd: f64,
        elapsed_ms: u64,
    },
    BackwardComplete {
        batch_size: usize,
        space: String,
        elapsed_ms: u64,
    },
    GradcheckComplete {
        coordinates: usize,
        max_rel_error: f64,
        tolerance: f64,
        passed: bool,
    },
    Error {
        code: String,
        message: String,
    },
}

#[derive(Debug, Clone, Copy)]
pub struct StreamEmitter {
    enabled: bool,
}

impl StreamEmitter {
    pub fn new(enabled: bool) -> Self {
        Self { enabled }
    }

    pub fn disabled() -> Self {
        Self { enabled: false }
    }

    pub fn enabled() -> Self {
        Self { enabled: true }
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Renders an event as a single JSON line.
    pub fn render(event: &StreamEvent) -> String {
        serde_json::to_string(event)
            .unwrap_or_else(|_| r#"{"event":"error","code":"serialize","message":""}"#.into())
    }

    pub fn emit(&self, event: &StreamEvent) {
        if self.enabled {
            eprintln!("{}", Self::render(event));
        }
    }

    pub fn emit_error(&self, code: &str, message: &str) {
        self.emit(&StreamEvent::Error {
            code: code.to_string(),
            message: message.to_string(),
        });
    }
}

impl Default for StreamEmitter {
    fn default() -> Self {
        Self::disabled()
    }
}

pub fn duration_ms(d: Duration) -> u64 {
    d.as_millis().try_into().unwrap_or(u64::MAX)
}
