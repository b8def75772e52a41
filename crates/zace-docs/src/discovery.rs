//! Candidate discovery for the project-doc preloader (§4.7 step 4).

use std::path::{Path, PathBuf};

use zace_core::RunError;

const RECOGNIZED_DOC_NAMES: &[&str] = &["AGENTS.md", "README.md", "CLAUDE.md"];

/// Find explicit file references in `task` that exist under
/// `project_root`, in the order they appear.
pub fn explicit_references(task: &str, project_root: &Path) -> Vec<PathBuf> {
    task.split(|c: char| c.is_whitespace() || c == ',' || c == '(' || c == ')')
        .filter(|token| token.contains('.') || token.contains('/'))
        .filter_map(|token| {
            let trimmed = token.trim_matches(|c: char| !c.is_alphanumeric() && c != '.' && c != '/' && c != '_' && c != '-');
            if trimmed.is_empty() {
                return None;
            }
            let candidate = project_root.join(trimmed);
            resolve_within_root(&candidate, project_root).ok()
        })
        .collect()
}

/// Canonicalize `path` and confirm it resolves inside `root`, rejecting
/// traversal outside the project boundary.
pub fn resolve_within_root(path: &Path, root: &Path) -> Result<PathBuf, RunError> {
    let resolved = path.canonicalize().map_err(|source| RunError::JournalIo {
        session_id: "doc-context".into(),
        source,
    })?;
    let root_resolved = root.canonicalize().map_err(|source| RunError::JournalIo {
        session_id: "doc-context".into(),
        source,
    })?;
    if !resolved.starts_with(&root_resolved) {
        return Err(RunError::JournalIo {
            session_id: "doc-context".into(),
            source: std::io::Error::new(std::io::ErrorKind::PermissionDenied, "path escapes project root"),
        });
    }
    Ok(resolved)
}

/// Breadth-first walk for recognized doc filenames, nearest depth first,
/// deeper directories explored only in `broad` mode.
pub fn discover_nearest_docs(project_root: &Path, max_depth: usize, max_files: usize) -> Vec<PathBuf> {
    let mut found = Vec::new();
    let mut frontier = vec![project_root.to_path_buf()];
    let mut depth = 0;

    while !frontier.is_empty() && depth <= max_depth && found.len() < max_files {
        let mut next_frontier = Vec::new();
        let mut dirs: Vec<PathBuf> = frontier.clone();
        dirs.sort();

        for dir in &dirs {
            let Ok(entries) = std::fs::read_dir(dir) else { continue };
            let mut names: Vec<_> = entries.flatten().collect();
            names.sort_by_key(|e| e.file_name());

            for entry in names {
                let path = entry.path();
                if path.is_dir() {
                    if !path.file_name().is_some_and(|n| n == ".git" || n == "target" || n == "node_modules") {
                        next_frontier.push(path);
                    }
                    continue;
                }
                if let Some(name) = path.file_name().and_then(|n| n.to_str()) {
                    if RECOGNIZED_DOC_NAMES.contains(&name) && !found.contains(&path) {
                        found.push(path);
                        if found.len() >= max_files {
                            return found;
                        }
                    }
                }
            }
        }
        frontier = next_frontier;
        depth += 1;
    }
    found
}
