//! JSON output for streaming run events to stdout.

use serde::Serialize;
use std::io::{self, Write};
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};

use taskloop_core::{ProgressEvent, RunSummary};

/// Global flag to enable JSON output mode.
static JSON_MODE_ENABLED: AtomicBool = AtomicBool::new(false);

/// Enable JSON output mode.
pub fn enable_json_mode() {
    JSON_MODE_ENABLED.store(true, Ordering::SeqCst);
}

/// Check if JSON mode is enabled.
pub fn is_json_mode() -> bool {
    JSON_MODE_ENABLED.load(Ordering::SeqCst)
}

/// JSON event types that can be emitted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum JsonEventType {
    RunStarted,
    TaskProgress,
    RunFinished,
    RunPersisted,
    Error,
}

/// A JSON event to be output to stdout.
#[derive(Debug, Clone, Serialize)]
pub struct JsonEvent {
    pub event: JsonEventType,
    pub timestamp: String,
    pub data: serde_json::Value,
}

impl JsonEvent {
    /// Create a new JSON event with the current timestamp.
    pub fn new(event: JsonEventType, data: serde_json::Value) -> Self {
        Self {
            event,
            timestamp: chrono::Utc::now().to_rfc3339(),
            data,
        }
    }

    /// Output this event as a JSON line to stdout.
    pub fn emit(&self) {
        if !is_json_mode() {
            return;
        }
        if let Ok(json) = serde_json::to_string(self) {
            let mut stdout = io::stdout().lock();
            let _ = writeln!(stdout, "{}", json);
            let _ = stdout.flush();
        }
    }
}

/// Emit a run_started event.
pub fn emit_run_started(total: usize, workers: usize, max_attempts: u32) {
    JsonEvent::new(
        JsonEventType::RunStarted,
        serde_json::json!({
            "total": total,
            "workers": workers,
            "max_attempts": max_attempts,
        }),
    )
    .emit();
}

/// Emit a task_progress event wrapping a runner event.
pub fn emit_progress(event: &ProgressEvent) {
    let data = serde_json::to_value(event).unwrap_or(serde_json::Value::Null);
    JsonEvent::new(JsonEventType::TaskProgress, data).emit();
}

/// Emit a run_finished event with the aggregate statistics.
pub fn emit_run_finished(summary: &RunSummary) {
    JsonEvent::new(
        JsonEventType::RunFinished,
        serde_json::json!({
            "run_id": summary.run_id.as_str(),
            "summary": summary.summary,
        }),
    )
    .emit();
}

/// Emit a run_persisted event.
pub fn emit_run_persisted(run_id: &str, location: &Path) {
    JsonEvent::new(
        JsonEventType::RunPersisted,
        serde_json::json!({
            "run_id": run_id,
            "location": location.display().to_string(),
        }),
    )
    .emit();
}

/// Emit an error event.
pub fn emit_error(message: &str) {
    JsonEvent::new(
        JsonEventType::Error,
        serde_json::json!({
            "message": message,
        }),
    )
    .emit();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_type_names() {
        let event = JsonEvent::new(JsonEventType::RunPersisted, serde_json::json!({}));
        let value = serde_json::to_value(&event).unwrap();
        assert_eq!(value["event"], "run_persisted");
        assert!(value["timestamp"].is_string());
    }
}
