//! End-to-end check that a session's journal round-trips through the
//! listing, memory-reconstruction, and cleanup helpers the `session`
//! subcommand wraps.

use std::fs;

use tempfile::tempdir;

use zace_core::journal::{JournalEntry, JournalEntryKind, SessionJournal};
use zace_core::types::{Message, Role};

#[path = "../src/session.rs"]
mod session;

#[test]
fn resumed_memory_matches_what_was_journaled() {
    let dir = tempdir().unwrap();
    let journal = SessionJournal::new(dir.path(), "session-a");
    journal
        .append(&JournalEntry::new(JournalEntryKind::Message, serde_json::to_value(Message::new(Role::User, "write a function")).unwrap()))
        .unwrap();
    journal
        .append(&JournalEntry::new(JournalEntryKind::Message, serde_json::to_value(Message::new(Role::Assistant, "done")).unwrap()))
        .unwrap();

    let memory = session::load_memory(dir.path(), "session-a").unwrap();
    assert_eq!(memory.messages().len(), 2);
    assert_eq!(memory.messages()[0].role, Role::User);
    assert_eq!(memory.messages()[1].content, "done");
}

#[test]
fn clean_sessions_dry_run_leaves_files_in_place() {
    let dir = tempdir().unwrap();
    let journal = SessionJournal::new(dir.path(), "old-session");
    journal
        .append(&JournalEntry::new(JournalEntryKind::Message, serde_json::to_value(Message::new(Role::User, "hi")).unwrap()))
        .unwrap();

    let path = journal.path().to_path_buf();
    let old_time = std::time::SystemTime::now() - std::time::Duration::from_secs(60 * 60 * 24 * 90);
    let file = fs::File::open(&path).unwrap();
    file.set_modified(old_time).unwrap();

    let removed = session::clean_sessions(dir.path(), 30, true).unwrap();
    assert_eq!(removed, vec!["old-session".to_string()]);
    assert!(path.exists());
}

#[test]
fn clean_sessions_without_dry_run_removes_old_journal() {
    let dir = tempdir().unwrap();
    let journal = SessionJournal::new(dir.path(), "old-session");
    journal
        .append(&JournalEntry::new(JournalEntryKind::Message, serde_json::to_value(Message::new(Role::User, "hi")).unwrap()))
        .unwrap();

    let path = journal.path().to_path_buf();
    let old_time = std::time::SystemTime::now() - std::time::Duration::from_secs(60 * 60 * 24 * 90);
    let file = fs::File::open(&path).unwrap();
    file.set_modified(old_time).unwrap();

    let removed = session::clean_sessions(dir.path(), 30, false).unwrap();
    assert_eq!(removed, vec!["old-session".to_string()]);
    assert!(!path.exists());
}
