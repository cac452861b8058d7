//! Operator audit trail of lifecycle transitions.
//!
//! Each transition is emitted as a `tracing` event and, when a sink file is
//! configured, appended to it as one JSON object per line.

use super::{LifecycleState, Operation};
use crate::error::Result;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::fs::OpenOptions;
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransitionRecord {
    pub at: DateTime<Utc>,
    pub service: String,
    pub operation: Operation,
    pub from: LifecycleState,
    pub to: LifecycleState,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

#[derive(Debug)]
pub struct AuditTrail {
    service: String,
    sink: Option<PathBuf>,
    records: Mutex<Vec<TransitionRecord>>,
}

impl AuditTrail {
    /// Trail kept in memory and in the tracing output only.
    pub fn in_memory(service: impl Into<String>) -> Self {
        Self {
            service: service.into(),
            sink: None,
            records: Mutex::new(Vec::new()),
        }
    }

    /// Trail that additionally appends JSON lines to `path`.
    pub fn with_file(service: impl Into<String>, path: impl Into<PathBuf>) -> Self {
        Self {
            service: service.into(),
            sink: Some(path.into()),
            records: Mutex::new(Vec::new()),
        }
    }

    pub fn sink(&self) -> Option<&Path> {
        self.sink.as_deref()
    }

    pub fn record(
        &self,
        operation: Operation,
        from: LifecycleState,
        to: LifecycleState,
        detail: Option<String>,
    ) -> TransitionRecord {
        let record = TransitionRecord {
            at: Utc::now(),
            service: self.service.clone(),
            operation,
            from,
            to,
            detail,
        };

        tracing::info!(
            service = %record.service,
            operation = %record.operation,
            from = %record.from,
            to = %record.to,
            at = %record.at.to_rfc3339(),
            "{} -> {}",
            record.from,
            record.to
        );

        if let Some(ref path) = self.sink {
            // A full disk must not leave the state machine half-transitioned.
            if let Err(e) = append_line(path, &record) {
                tracing::warn!("Failed to append audit record to {}: {}", path.display(), e);
            }
        }

        self.records.lock().push(record.clone());
        record
    }

    /// Records written by this trail instance, oldest first.
    pub fn records(&self) -> Vec<TransitionRecord> {
        self.records.lock().clone()
    }

    /// Read back an audit file. Lines that fail to parse are skipped.
    pub fn read_file(path: &Path) -> Result<Vec<TransitionRecord>> {
        let file = match std::fs::File::open(path) {
            Ok(file) => file,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };
        let mut records = Vec::new();
        for line in BufReader::new(file).lines() {
            let line = line?;
            if line.trim().is_empty() {
                continue;
            }
            match serde_json::from_str::<TransitionRecord>(&line) {
                Ok(record) => records.push(record),
                Err(e) => tracing::debug!("Skipping malformed audit line: {}", e),
            }
        }
        Ok(records)
    }
}

fn append_line(path: &Path, record: &TransitionRecord) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let line = serde_json::to_string(record)?;
    let mut file = OpenOptions::new().create(true).append(true).open(path)?;
    writeln!(file, "{}", line)?;
    Ok(())
}
