//! Operational audit trail.
//!
//! Appends one JSON line per operationally relevant event: lifecycle,
//! applied and rejected commands, recloser trips. The simulation state
//! itself is never persisted; this file exists so an operator can
//! reconstruct who commanded what, and when.

use serde::{Deserialize, Serialize};
use std::fs::{File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::Path;
use std::sync::Mutex;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditEventType {
    SystemStart,
    SystemShutdown,
    CommandApplied,
    CommandRejected,
    RecloserTripped,
    RecloserClosed,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditEntry {
    /// Monotonic microseconds since process start.
    pub timestamp_us: u64,
    /// Wall-clock Unix microseconds.
    pub unix_us: u64,
    pub event_type: AuditEventType,
    pub details: serde_json::Value,
}

/// Thread-safe JSONL writer shared by the bridge and the runtime.
pub struct AuditLogger {
    writer: Mutex<BufWriter<File>>,
}

impl AuditLogger {
    /// Opens the trail in append mode so restarts extend, not truncate.
    pub fn new(path: &Path) -> std::io::Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let file = OpenOptions::new().create(true).append(true).open(path)?;

        Ok(Self {
            writer: Mutex::new(BufWriter::with_capacity(8192, file)),
        })
    }

    pub fn log(&self, entry: AuditEntry) -> std::io::Result<()> {
        let mut writer = self.writer.lock().unwrap();
        serde_json::to_writer(&mut *writer, &entry)?;
        writer.write_all(b"\n")?;
        writer.flush()
    }

    pub fn log_event(
        &self,
        timestamp_us: u64,
        unix_us: u64,
        event_type: AuditEventType,
        details: serde_json::Value,
    ) -> std::io::Result<()> {
        self.log(AuditEntry {
            timestamp_us,
            unix_us,
            event_type,
            details,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn entries_append_as_json_lines() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("audit.jsonl");

        let logger = AuditLogger::new(&path).unwrap();
        logger
            .log_event(
                10,
                1_700_000_000_000_000,
                AuditEventType::CommandApplied,
                serde_json::json!({"topic": "bombeo/motores/m5/comandos", "effect": "started"}),
            )
            .unwrap();
        logger
            .log_event(
                20,
                1_700_000_000_500_000,
                AuditEventType::RecloserTripped,
                serde_json::json!({"motors_stopped": ["m5"]}),
            )
            .unwrap();

        let raw = std::fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = raw.lines().collect();
        assert_eq!(lines.len(), 2);

        let first: AuditEntry = serde_json::from_str(lines[0]).unwrap();
        assert!(matches!(first.event_type, AuditEventType::CommandApplied));
        assert_eq!(first.timestamp_us, 10);
    }

    #[test]
    fn reopening_extends_the_trail() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("audit.jsonl");

        {
            let logger = AuditLogger::new(&path).unwrap();
            logger
                .log_event(1, 1, AuditEventType::SystemStart, serde_json::json!({}))
                .unwrap();
        }
        {
            let logger = AuditLogger::new(&path).unwrap();
            logger
                .log_event(2, 2, AuditEventType::SystemShutdown, serde_json::json!({}))
                .unwrap();
        }

        let raw = std::fs::read_to_string(&path).unwrap();
        assert_eq!(raw.lines().count(), 2);
    }
}
