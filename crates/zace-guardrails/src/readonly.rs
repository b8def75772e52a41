//! Read-only inspection command recognition, used by the read-only
//! stagnation guard (§4.6).

const READONLY_BINARIES: &[&str] = &["cat", "ls", "wc", "head", "tail", "rg", "grep", "stat"];

/// True when `command` is a recognized read-only inspection command: a
/// bare call to one of [`READONLY_BINARIES`], or `git diff`/`git status`.
pub fn is_readonly_inspection_command(command: &str) -> bool {
    let trimmed = command.trim();
    let mut tokens = trimmed.split_whitespace();
    let Some(first) = tokens.next() else {
        return false;
    };

    if READONLY_BINARIES.contains(&first) {
        return true;
    }

    if first == "git" {
        if let Some(second) = tokens.next() {
            return second == "diff" || second == "status";
        }
    }

    false
}
