//! # Policy Audit Log
//!
//! The only durable artifact of the decision layer. Every candidate
//! evaluation — pass, block, or pre-evaluation rejection — is appended
//! here; no candidate is ever silently dropped without an entry explaining
//! why.
//!
//! The log is append-only and safe for concurrent callers provided appends
//! are atomic: one JSON record per line, flushed and synced before the
//! append returns. No component ever mutates a previously appended record.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs::{File, OpenOptions};
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use crate::policy::{GateName, GateVerdict, PolicyVerdict};

/// One audit record, keyed by area and timestamp.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PolicyAuditRecord {
    /// Area the evaluated candidate belonged to.
    pub area_id: String,

    /// Evaluation time.
    pub timestamp: DateTime<Utc>,

    /// Full ordered gate verdicts. Empty for pre-evaluation rejections.
    pub gates: Vec<GateVerdict>,

    /// Aggregate outcome.
    pub passed: bool,

    /// First failing gate, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub blocked_reason: Option<GateName>,

    /// Free-form context for non-gate outcomes (validation rejections,
    /// superseded duplicates).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
}

impl PolicyAuditRecord {
    /// Record for a completed gate evaluation.
    pub fn from_verdict(
        area_id: impl Into<String>,
        timestamp: DateTime<Utc>,
        verdict: &PolicyVerdict,
    ) -> Self {
        Self {
            area_id: area_id.into(),
            timestamp,
            gates: verdict.gates.clone(),
            passed: verdict.passed,
            blocked_reason: verdict.blocked_reason,
            note: None,
        }
    }

    /// Record for a candidate rejected before evaluation.
    pub fn rejected(
        area_id: impl Into<String>,
        timestamp: DateTime<Utc>,
        note: impl Into<String>,
    ) -> Self {
        Self {
            area_id: area_id.into(),
            timestamp,
            gates: Vec::new(),
            passed: false,
            blocked_reason: None,
            note: Some(note.into()),
        }
    }

    /// Attach a context note.
    pub fn with_note(mut self, note: impl Into<String>) -> Self {
        self.note = Some(note.into());
        self
    }
}

/// Append-only audit sink.
pub trait AuditLog: Send + Sync {
    /// Append a record. Must be atomic and visible once this returns.
    fn append(&self, record: &PolicyAuditRecord) -> io::Result<()>;

    /// Sync to durable storage.
    fn sync(&self) -> io::Result<()>;
}

/// File-backed audit log: one JSON record per line, synced per append.
pub struct FileAuditLog {
    path: PathBuf,
    writer: Arc<Mutex<BufWriter<File>>>,
}

impl FileAuditLog {
    /// Open or create the log file in append mode.
    pub fn open(path: impl AsRef<Path>) -> io::Result<Self> {
        let path = path.as_ref().to_path_buf();
        let file = OpenOptions::new().create(true).append(true).open(&path)?;
        Ok(Self {
            path,
            writer: Arc::new(Mutex::new(BufWriter::new(file))),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl AuditLog for FileAuditLog {
    fn append(&self, record: &PolicyAuditRecord) -> io::Result<()> {
        let json = serde_json::to_string(record)
            .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;
        let mut writer = self
            .writer
            .lock()
            .map_err(|_| io::Error::new(io::ErrorKind::Other, "audit lock poisoned"))?;
        writeln!(writer, "{json}")?;
        writer.flush()?;
        writer.get_ref().sync_all()
    }

    fn sync(&self) -> io::Result<()> {
        let writer = self
            .writer
            .lock()
            .map_err(|_| io::Error::new(io::ErrorKind::Other, "audit lock poisoned"))?;
        writer.get_ref().sync_all()
    }
}

/// In-memory audit log for tests.
#[derive(Debug, Default)]
pub struct MemoryAuditLog {
    records: Arc<Mutex<Vec<PolicyAuditRecord>>>,
}

impl MemoryAuditLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn records(&self) -> Vec<PolicyAuditRecord> {
        self.records.lock().map(|r| r.clone()).unwrap_or_default()
    }

    pub fn len(&self) -> usize {
        self.records.lock().map(|r| r.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl AuditLog for MemoryAuditLog {
    fn append(&self, record: &PolicyAuditRecord) -> io::Result<()> {
        self.records
            .lock()
            .map_err(|_| io::Error::new(io::ErrorKind::Other, "audit lock poisoned"))?
            .push(record.clone());
        Ok(())
    }

    fn sync(&self) -> io::Result<()> {
        Ok(())
    }
}
