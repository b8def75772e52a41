//! Project-doc preloader: discovers `AGENTS.md`/`README.md`/`CLAUDE.md`
//! candidates and injects a bounded preview as a system message (§4.7
//! step 4).

mod discovery;

pub use discovery::{discover_nearest_docs, explicit_references, resolve_within_root};

use std::path::Path;

use zace_core::types::{Message, Role};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocContextMode {
    Off,
    Targeted,
    Broad,
}

/// Fixed timeout for doc discovery/reads; the loop never imposes a
/// global wall-clock, but individual doc I/O is bounded.
pub const PROJECT_DOC_TIMEOUT_MS: u64 = 30_000;

fn max_depth_for(mode: DocContextMode) -> usize {
    match mode {
        DocContextMode::Off => 0,
        DocContextMode::Targeted => 1,
        DocContextMode::Broad => 4,
    }
}

/// Read up to `remaining_budget` bytes of `path`, returning the bytes
/// actually consumed alongside the preview text.
fn read_bounded_preview(path: &Path, remaining_budget: usize) -> Option<(String, usize)> {
    let content = std::fs::read_to_string(path).ok()?;
    let truncated: String = content.chars().take(remaining_budget).collect();
    let consumed = truncated.chars().count();
    Some((truncated, consumed))
}

/// Build the doc-context system message, or `None` when the mode is
/// `off`, the task opts out, or no candidates are found.
pub fn build_doc_context_message(
    project_root: &Path,
    task: &str,
    task_disables_docs: bool,
    mode: DocContextMode,
    max_files: usize,
    max_chars: usize,
) -> Option<Message> {
    if mode == DocContextMode::Off || task_disables_docs {
        return None;
    }

    let mut candidates = explicit_references(task, project_root);
    for doc in discover_nearest_docs(project_root, max_depth_for(mode), max_files) {
        if !candidates.contains(&doc) {
            candidates.push(doc);
        }
    }
    candidates.truncate(max_files);

    if candidates.is_empty() {
        return None;
    }

    let mut remaining = max_chars;
    let mut sections = Vec::new();
    for path in &candidates {
        if remaining == 0 {
            break;
        }
        if let Some((preview, consumed)) = read_bounded_preview(path, remaining) {
            remaining = remaining.saturating_sub(consumed);
            sections.push(format!("### {}\n{}", path.display(), preview));
        }
    }

    if sections.is_empty() {
        return None;
    }

    Some(Message::new(Role::System, format!("Project documentation context:\n\n{}", sections.join("\n\n"))))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn off_mode_returns_none() {
        let dir = tempdir().unwrap();
        std::fs::write(dir.path().join("README.md"), "hello").unwrap();
        assert!(build_doc_context_message(dir.path(), "do the thing", false, DocContextMode::Off, 5, 1000).is_none());
    }

    #[test]
    fn task_disabling_docs_returns_none() {
        let dir = tempdir().unwrap();
        std::fs::write(dir.path().join("README.md"), "hello").unwrap();
        assert!(build_doc_context_message(dir.path(), "do the thing", true, DocContextMode::Broad, 5, 1000).is_none());
    }

    #[test]
    fn targeted_mode_injects_readme_content() {
        let dir = tempdir().unwrap();
        std::fs::write(dir.path().join("README.md"), "project overview here").unwrap();
        let message = build_doc_context_message(dir.path(), "do the thing", false, DocContextMode::Targeted, 5, 1000).unwrap();
        assert_eq!(message.role, Role::System);
        assert!(message.content.contains("project overview here"));
    }

    #[test]
    fn char_budget_truncates_across_files() {
        let dir = tempdir().unwrap();
        std::fs::write(dir.path().join("AGENTS.md"), "a".repeat(50)).unwrap();
        std::fs::write(dir.path().join("README.md"), "b".repeat(50)).unwrap();
        let message = build_doc_context_message(dir.path(), "task", false, DocContextMode::Broad, 5, 60).unwrap();
        let total_preview_chars: usize = message.content.matches('a').count() + message.content.matches('b').count();
        assert!(total_preview_chars <= 60);
    }

    #[test]
    fn no_candidates_returns_none() {
        let dir = tempdir().unwrap();
        assert!(build_doc_context_message(dir.path(), "task", false, DocContextMode::Broad, 5, 1000).is_none());
    }
}
