use crate::errors::RowscopeError;
use crate::log_retention::enforce_total_budget;
use serde::Serialize;
use serde_json::Value;
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, OnceLock};

pub const DEFAULT_DISK_BUDGET_BYTES: u64 = 10 * 1024 * 1024;
pub const DEFAULT_MAX_PAYLOAD_BYTES: usize = 4096;

#[derive(Debug, Clone)]
pub struct JsonlLogger {
    pub path: PathBuf,
    pub max_payload_bytes: usize,
    pub budget_bytes: u64,
}

#[derive(Debug, Clone, Serialize)]
pub struct LogEvent<'a> {
    pub level: &'a str,
    pub event_type: &'a str,
    pub payload: Value,
}

impl JsonlLogger {
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            max_payload_bytes: DEFAULT_MAX_PAYLOAD_BYTES,
            budget_bytes: DEFAULT_DISK_BUDGET_BYTES,
        }
    }

    pub fn append(&self, event: &LogEvent<'_>) -> Result<(), RowscopeError> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent).map_err(|e| RowscopeError::Io(e.to_string()))?;
        }
        let truncated = truncate_json(event.payload.clone(), self.max_payload_bytes);
        let line = serde_json::to_string(&LogEvent {
            level: event.level,
            event_type: event.event_type,
            payload: truncated,
        })
        .map_err(|e| RowscopeError::Io(e.to_string()))?;

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .map_err(|e| RowscopeError::Io(e.to_string()))?;
        writeln!(file, "{line}").map_err(|e| RowscopeError::Io(e.to_string()))?;

        if let Some(parent) = self.path.parent() {
            enforce_total_budget(parent, self.budget_bytes, &self.path)?;
        }
        Ok(())
    }
}

static RUN_LOGGER: OnceLock<Mutex<Option<JsonlLogger>>> = OnceLock::new();

fn logger_slot() -> &'static Mutex<Option<JsonlLogger>> {
    RUN_LOGGER.get_or_init(|| Mutex::new(None))
}

/// Routes [`append_run_log`] to `logger` for the rest of the process.
pub fn init_run_log(logger: JsonlLogger) {
    if let Ok(mut slot) = logger_slot().lock() {
        *slot = Some(logger);
    }
}

pub fn clear_run_log() {
    if let Ok(mut slot) = logger_slot().lock() {
        *slot = None;
    }
}

/// Appends one event to the run log. Without an initialised log, or if the
/// write fails, the event is dropped.
pub fn append_run_log(level: &str, event_type: &str, payload: Value) {
    let logger = match logger_slot().lock() {
        Ok(slot) => slot.clone(),
        Err(_) => return,
    };
    if let Some(logger) = logger {
        let _ = logger.append(&LogEvent {
            level,
            event_type,
            payload,
        });
    }
}

/// Plain one-line rendering used when stdout is not a terminal.
pub fn structured_fallback_line(screen: &str, row: &str, message: &str) -> String {
    format!(
        "screen={screen} row={row} message={} ",
        message.replace('\n', "\\n")
    )
}

fn truncate_json(value: Value, max_bytes: usize) -> Value {
    let rendered = serde_json::to_string(&value).unwrap_or_default();
    if rendered.len() <= max_bytes {
        return value;
    }
    let mut cut = max_bytes.saturating_sub(3);
    while !rendered.is_char_boundary(cut) {
        cut -= 1;
    }
    Value::String(format!("{}...", &rendered[..cut]))
}

#[cfg(test)]
mod tests {
    use super::{append_run_log, clear_run_log, init_run_log, structured_fallback_line, truncate_json, JsonlLogger, LogEvent};
    use serde_json::json;

    #[test]
    fn logger_truncates_large_payloads_and_writes_jsonl() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("run.jsonl");
        let mut logger = JsonlLogger::new(&path);
        logger.max_payload_bytes = 20;
        logger.budget_bytes = 1024;

        logger
            .append(&LogEvent {
                level: "info",
                event_type: "scan.filled",
                payload: json!({"screen": "abcdefghijklmnopqrstuvwxyz"}),
            })
            .expect("append");

        let text = std::fs::read_to_string(&path).expect("read");
        assert!(text.contains("\"event_type\":\"scan.filled\""));
        assert!(text.contains("..."));
        assert_eq!(text.lines().count(), 1);
    }

    #[test]
    fn truncation_respects_char_boundaries() {
        let value = truncate_json(json!({"name": "ééééééééé"}), 14);
        let text = value.as_str().expect("string");
        assert!(text.ends_with("..."));
        assert!(text.len() <= 14);
    }

    #[test]
    fn run_log_is_a_noop_until_initialised() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("logs").join("run.jsonl");
        append_run_log("info", "before.init", json!({}));
        init_run_log(JsonlLogger::new(&path));
        append_run_log("warn", "scan.cell_skipped", json!({"offset": 3}));
        clear_run_log();
        append_run_log("info", "after.clear", json!({}));

        let text = std::fs::read_to_string(&path).expect("read");
        assert!(text.contains("scan.cell_skipped"));
        assert!(!text.contains("before.init"));
        assert!(!text.contains("after.clear"));
    }

    #[test]
    fn fallback_line_is_deterministic() {
        let line = structured_fallback_line("disks", "3", "sda\n  12");
        assert_eq!(line, "screen=disks row=3 message=sda\\n  12 ");
    }
}
