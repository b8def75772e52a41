//! Append-only session journal writer (`.zace/sessions/<sessionId>.jsonl`).
//!
//! Mode-600 JSONL append; the journal is append-only by contract, callers
//! never rewrite history, only append new entries.

use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::RunError;

/// One line of the session journal.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JournalEntry {
    #[serde(rename = "type")]
    pub kind: JournalEntryKind,
    pub timestamp: DateTime<Utc>,
    #[serde(flatten)]
    pub payload: Value,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JournalEntryKind {
    Message,
    Summary,
    Run,
    RunEvent,
    ApprovalRule,
    PendingAction,
}

impl JournalEntry {
    pub fn new(kind: JournalEntryKind, payload: Value) -> Self {
        Self {
            kind,
            timestamp: Utc::now(),
            payload,
        }
    }
}

/// A single-writer append-only JSONL journal for one session.
pub struct SessionJournal {
    session_id: String,
    path: PathBuf,
}

impl SessionJournal {
    /// Open (without creating) the journal for `session_id` under
    /// `<project_root>/.zace/sessions/<session_id>.jsonl`.
    pub fn new(project_root: &Path, session_id: impl Into<String>) -> Self {
        let session_id = session_id.into();
        let path = project_root
            .join(".zace")
            .join("sessions")
            .join(format!("{session_id}.jsonl"));
        Self { session_id, path }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Append one entry, creating parent directories and the file as
    /// needed. Flushes before returning so ordering is durable across
    /// process crashes between calls.
    pub fn append(&self, entry: &JournalEntry) -> Result<(), RunError> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent).map_err(|source| RunError::JournalIo {
                session_id: self.session_id.clone(),
                source,
            })?;
        }
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .map_err(|source| RunError::JournalIo {
                session_id: self.session_id.clone(),
                source,
            })?;
        let line = serde_json::to_string(entry).map_err(|e| RunError::JournalIo {
            session_id: self.session_id.clone(),
            source: std::io::Error::other(e),
        })?;
        writeln!(file, "{line}").map_err(|source| RunError::JournalIo {
            session_id: self.session_id.clone(),
            source,
        })?;
        file.flush().map_err(|source| RunError::JournalIo {
            session_id: self.session_id.clone(),
            source,
        })
    }

    /// Read all entries, tolerating blank lines and unknown extra fields
    /// via `payload`'s `Value` flattening. Malformed lines are skipped
    /// rather than failing the whole read, tolerating partial corruption
    /// from a crash mid-write.
    pub fn read_all(&self) -> Result<Vec<JournalEntry>, RunError> {
        if !self.path.exists() {
            return Ok(Vec::new());
        }
        let content = fs::read_to_string(&self.path).map_err(|source| RunError::JournalIo {
            session_id: self.session_id.clone(),
            source,
        })?;
        let mut entries = Vec::new();
        for line in content.lines() {
            if line.trim().is_empty() {
                continue;
            }
            if let Ok(entry) = serde_json::from_str::<JournalEntry>(line) {
                entries.push(entry);
            }
        }
        Ok(entries)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn append_then_read_all_round_trips() {
        let dir = tempdir().unwrap();
        let journal = SessionJournal::new(dir.path(), "01ARZ3");
        journal
            .append(&JournalEntry::new(
                JournalEntryKind::Message,
                serde_json::json!({"role": "user", "content": "hi"}),
            ))
            .unwrap();
        journal
            .append(&JournalEntry::new(
                JournalEntryKind::RunEvent,
                serde_json::json!({"event": "run_started", "step": 0}),
            ))
            .unwrap();
        let entries = journal.read_all().unwrap();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].kind, JournalEntryKind::Message);
        assert_eq!(entries[1].kind, JournalEntryKind::RunEvent);
    }

    #[test]
    fn read_all_on_missing_file_returns_empty() {
        let dir = tempdir().unwrap();
        let journal = SessionJournal::new(dir.path(), "missing");
        assert!(journal.read_all().unwrap().is_empty());
    }

    #[test]
    fn read_all_tolerates_malformed_lines() {
        let dir = tempdir().unwrap();
        let journal = SessionJournal::new(dir.path(), "s1");
        journal
            .append(&JournalEntry::new(JournalEntryKind::Message, serde_json::json!({})))
            .unwrap();
        let mut file = OpenOptions::new()
            .append(true)
            .open(journal.path())
            .unwrap();
        writeln!(file, "not json at all").unwrap();
        let entries = journal.read_all().unwrap();
        assert_eq!(entries.len(), 1);
    }

    #[test]
    fn path_is_under_zace_sessions() {
        let dir = tempdir().unwrap();
        let journal = SessionJournal::new(dir.path(), "abc");
        assert!(journal.path().ends_with(".zace/sessions/abc.jsonl"));
    }
}
