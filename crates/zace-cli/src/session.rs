//! Session journal helpers shared by `run`/`chat`/`session` commands:
//! listing known sessions, reconstructing conversation memory from a
//! journal's `message` entries, and pruning old journals (§1.2
//! `session clean`).

use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};

use zace_core::journal::{JournalEntryKind, SessionJournal};
use zace_core::types::Message;
use zace_memory::Memory;

/// One entry in `zace session list`'s output.
pub struct SessionSummary {
    pub session_id: String,
    pub message_count: usize,
    pub last_modified: Option<DateTime<Utc>>,
}

fn sessions_dir(project_root: &Path) -> std::path::PathBuf {
    project_root.join(".zace").join("sessions")
}

/// List every session with a journal on disk, newest-modified first.
pub fn list_sessions(project_root: &Path) -> Result<Vec<SessionSummary>> {
    let dir = sessions_dir(project_root);
    if !dir.exists() {
        return Ok(Vec::new());
    }
    let mut summaries = Vec::new();
    for entry in fs::read_dir(&dir).with_context(|| format!("reading {}", dir.display()))? {
        let entry = entry?;
        let path = entry.path();
        let Some(session_id) = path.file_stem().and_then(|s| s.to_str()) else {
            continue;
        };
        if path.extension().and_then(|e| e.to_str()) != Some("jsonl") {
            continue;
        }
        let journal = SessionJournal::new(project_root, session_id);
        let entries = journal.read_all().unwrap_or_default();
        let message_count = entries.iter().filter(|e| e.kind == JournalEntryKind::Message).count();
        let last_modified = fs::metadata(&path).ok().and_then(|m| m.modified().ok()).map(DateTime::<Utc>::from);
        summaries.push(SessionSummary { session_id: session_id.to_string(), message_count, last_modified });
    }
    summaries.sort_by(|a, b| b.last_modified.cmp(&a.last_modified));
    Ok(summaries)
}

/// Reconstruct conversation memory for `session_id` from its journal's
/// `message` entries. A session with no journal yet starts empty.
pub fn load_memory(project_root: &Path, session_id: &str) -> Result<Memory> {
    let journal = SessionJournal::new(project_root, session_id);
    let entries = journal.read_all().context("reading session journal")?;
    let mut memory = Memory::new();
    for entry in entries {
        if entry.kind != JournalEntryKind::Message {
            continue;
        }
        if let Ok(message) = serde_json::from_value::<Message>(entry.payload) {
            memory.push(message);
        }
    }
    Ok(memory)
}

/// Remove session journals whose file hasn't been modified in over
/// `days` days. Returns the ids removed (or, in dry-run mode, that
/// would have been removed).
pub fn clean_sessions(project_root: &Path, days: u64, dry_run: bool) -> Result<Vec<String>> {
    let sessions = list_sessions(project_root)?;
    let now = Utc::now();
    let mut removed = Vec::new();
    for session in sessions {
        let Some(last_modified) = session.last_modified else { continue };
        if now.signed_duration_since(last_modified).num_days() <= days as i64 {
            continue;
        }
        if !dry_run {
            let path = sessions_dir(project_root).join(format!("{}.jsonl", session.session_id));
            fs::remove_file(&path).with_context(|| format!("removing {}", path.display()))?;
        }
        removed.push(session.session_id);
    }
    Ok(removed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;
    use zace_core::journal::JournalEntry;
    use zace_core::types::Role;

    #[test]
    fn list_sessions_on_missing_dir_is_empty() {
        let dir = tempdir().unwrap();
        assert!(list_sessions(dir.path()).unwrap().is_empty());
    }

    #[test]
    fn load_memory_reconstructs_pushed_messages() {
        let dir = tempdir().unwrap();
        let journal = SessionJournal::new(dir.path(), "sess-1");
        journal
            .append(&JournalEntry::new(JournalEntryKind::Message, serde_json::to_value(Message::new(Role::User, "hello")).unwrap()))
            .unwrap();
        journal
            .append(&JournalEntry::new(JournalEntryKind::RunEvent, serde_json::json!({"event": "run_started"})))
            .unwrap();
        let memory = load_memory(dir.path(), "sess-1").unwrap();
        assert_eq!(memory.messages().len(), 1);
        assert_eq!(memory.messages()[0].content, "hello");
    }

    #[test]
    fn list_sessions_counts_message_entries() {
        let dir = tempdir().unwrap();
        let journal = SessionJournal::new(dir.path(), "sess-1");
        journal
            .append(&JournalEntry::new(JournalEntryKind::Message, serde_json::to_value(Message::new(Role::User, "hi")).unwrap()))
            .unwrap();
        let summaries = list_sessions(dir.path()).unwrap();
        assert_eq!(summaries.len(), 1);
        assert_eq!(summaries[0].session_id, "sess-1");
        assert_eq!(summaries[0].message_count, 1);
    }
}
