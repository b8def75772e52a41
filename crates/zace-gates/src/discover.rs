//! Auto-discovered completion gates based on project manifest presence
//! (`discoverAutomaticCompletionGates`, §4.5).

use std::path::Path;

use zace_core::types::CompletionGate;

/// Inspect `working_directory` for recognized package manifests and
/// return the gates their conventional scripts imply.
pub fn discover_automatic_completion_gates(working_directory: &Path) -> Vec<CompletionGate> {
    let mut gates = Vec::new();

    if working_directory.join("package.json").is_file() {
        if let Ok(raw) = std::fs::read_to_string(working_directory.join("package.json")) {
            if let Ok(value) = serde_json::from_str::<serde_json::Value>(&raw) {
                let scripts = value.get("scripts").and_then(|s| s.as_object());
                if scripts.is_some_and(|s| s.contains_key("lint")) {
                    gates.push(CompletionGate::auto("lint", "npm run lint"));
                }
                if scripts.is_some_and(|s| s.contains_key("test")) {
                    gates.push(CompletionGate::auto("test", "npm test"));
                }
            }
        }
    }

    if working_directory.join("Cargo.toml").is_file() {
        gates.push(CompletionGate::auto("lint", "cargo clippy --all-targets -- -D warnings"));
        gates.push(CompletionGate::auto("test", "cargo test"));
    }

    if working_directory.join("pyproject.toml").is_file() || working_directory.join("setup.py").is_file() {
        gates.push(CompletionGate::auto("test", "pytest"));
    }

    if working_directory.join("go.mod").is_file() {
        gates.push(CompletionGate::auto("test", "go test ./..."));
    }

    gates
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn cargo_project_yields_clippy_and_test() {
        let dir = tempdir().unwrap();
        std::fs::write(dir.path().join("Cargo.toml"), "[package]\nname=\"x\"").unwrap();
        let gates = discover_automatic_completion_gates(dir.path());
        assert!(gates.iter().any(|g| g.command.contains("clippy")));
        assert!(gates.iter().any(|g| g.command == "cargo test"));
    }

    #[test]
    fn npm_project_only_adds_scripts_that_exist() {
        let dir = tempdir().unwrap();
        std::fs::write(dir.path().join("package.json"), r#"{"scripts": {"test": "jest"}}"#).unwrap();
        let gates = discover_automatic_completion_gates(dir.path());
        assert_eq!(gates.len(), 1);
        assert_eq!(gates[0].command, "npm test");
    }

    #[test]
    fn empty_directory_yields_no_gates() {
        let dir = tempdir().unwrap();
        assert!(discover_automatic_completion_gates(dir.path()).is_empty());
    }
}
