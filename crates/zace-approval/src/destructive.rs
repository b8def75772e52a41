//! Destructive-command classification (`getDestructiveCommandReason`, §4.3).

use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use async_trait::async_trait;
use regex::Regex;
use serde::{Deserialize, Serialize};

/// Config knobs consulted by the classifier, independent of the full
/// runtime configuration type so this crate stays decoupled.
#[derive(Debug, Clone)]
pub struct ApprovalConfig {
    pub require_risky_confirmation: bool,
    pub risky_confirmation_token: String,
    pub runtime_scripts_dir: PathBuf,
    pub runtime_lsp_config_path: Option<PathBuf>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Exists {
    Yes,
    No,
    Unknown,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OverwriteTarget {
    pub path: String,
    pub exists: Exists,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SafetyContext {
    pub working_directory: String,
    pub overwrite_redirect_targets: Vec<OverwriteTarget>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SafetyClassification {
    pub destructive: bool,
    pub reason: Option<String>,
}

/// The LLM-backed safety classifier, invoked with a [`SafetyContext`].
/// Returning `Err` models a JSON-parse failure from the underlying
/// transport, which triggers the deterministic fallback.
#[async_trait]
pub trait SafetyClassifier: Send + Sync {
    async fn classify(&self, command: &str, context: &SafetyContext) -> Result<SafetyClassification, String>;
}

const HIGH_RISK_PATTERNS: &[&str] = &[
    r"(^|[;&|]\s*)rm\s+-rf\b",
    r"(^|[;&|]\s*)rm\b",
    r"git\s+reset\s+--hard\b",
    r"git\s+clean\s+-f\w*\b",
    r"git\s+push\s+--force(-with-lease)?\b",
    r"(^|[;&|]\s*)mkfs\b",
    r"(^|[;&|]\s*)dd\b",
    r"(^|[;&|]\s*)shutdown\b",
    r"(^|[;&|]\s*)reboot\b",
    r"(^|[;&|]\s*)poweroff\b",
];

fn high_risk_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(&format!("(?:{})", HIGH_RISK_PATTERNS.join("|"))).expect("valid regex"))
}

fn redirect_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r">>?\s*([^\s|&;]+)").expect("valid regex"))
}

fn is_high_risk(command: &str) -> bool {
    high_risk_regex().is_match(command)
}

/// Extract the write targets of every `>`/`>>` redirect in `command`,
/// capped at 12 entries (§4.3).
pub fn extract_overwrite_targets(command: &str, cwd: &Path) -> Vec<OverwriteTarget> {
    redirect_regex()
        .captures_iter(command)
        .map(|cap| cap[1].to_string())
        .take(12)
        .map(|path| OverwriteTarget {
            exists: classify_existence(&path, cwd),
            path,
        })
        .collect()
}

fn classify_existence(raw: &str, cwd: &Path) -> Exists {
    if raw == "-" || raw == "/dev/null" || raw == "nul" || raw.starts_with('~') {
        return Exists::Unknown;
    }
    if raw.contains('$') || raw.contains('*') || raw.contains('`') {
        return Exists::Unknown;
    }
    let resolved = cwd.join(raw);
    match resolved.try_exists() {
        Ok(true) => Exists::Yes,
        Ok(false) => Exists::No,
        Err(_) => Exists::Unknown,
    }
}

fn resolves_inside(path: &Path, root: &Path) -> bool {
    let Ok(resolved) = path.canonicalize() else {
        return root.join(path).starts_with(root);
    };
    let Ok(root_resolved) = root.canonicalize() else {
        return resolved.starts_with(root);
    };
    resolved.starts_with(root_resolved)
}

/// A write redirected entirely into the agent's own runtime scripts
/// directory or recognized LSP config path, and not matching a high-risk
/// pattern, is exempt from destructive classification.
fn is_runtime_maintenance_write(command: &str, targets: &[OverwriteTarget], cwd: &Path, config: &ApprovalConfig) -> bool {
    if targets.is_empty() || is_high_risk(command) {
        return false;
    }
    targets.iter().all(|target| {
        if matches!(target.exists, Exists::Unknown) && (target.path == "-" || target.path == "/dev/null") {
            return false;
        }
        let candidate = cwd.join(&target.path);
        resolves_inside(&candidate, &config.runtime_scripts_dir)
            || config
                .runtime_lsp_config_path
                .as_ref()
                .is_some_and(|lsp| candidate == *lsp || resolves_inside(&candidate, lsp))
    })
}

const DETERMINISTIC_DESTRUCTIVE_PATTERNS: &[&str] = &[
    r"(^|[;&|]\s*)rm\b",
    r"(^|[;&|]\s*)rmdir\b",
    r"(^|[;&|]\s*)chmod\s+-R\b",
    r"(^|[;&|]\s*)chown\s+-R\b",
    r"(^|[;&|]\s*)mkfs\b",
    r"(^|[;&|]\s*)truncate\b",
    r"(^|[;&|]\s*)shred\b",
];

fn deterministic_destructive_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(&format!("(?:{})", DETERMINISTIC_DESTRUCTIVE_PATTERNS.join("|"))).expect("valid regex"))
}

fn deterministic_fallback(command: &str, targets: &[OverwriteTarget]) -> SafetyClassification {
    if deterministic_destructive_regex().is_match(command) {
        return SafetyClassification {
            destructive: true,
            reason: Some("command matches a deterministic destructive pattern".into()),
        };
    }
    if targets.iter().any(|t| t.exists == Exists::Yes) {
        return SafetyClassification {
            destructive: true,
            reason: Some("command overwrites an existing file via redirect".into()),
        };
    }
    SafetyClassification {
        destructive: false,
        reason: None,
    }
}

/// Returns a human-readable destructive reason, or `None` if the command is
/// considered safe to run without confirmation.
pub async fn get_destructive_command_reason(
    command: &str,
    cwd: &Path,
    config: &ApprovalConfig,
    classifier: &dyn SafetyClassifier,
) -> Option<String> {
    if !config.require_risky_confirmation {
        return None;
    }
    if !config.risky_confirmation_token.is_empty() && command.contains(&config.risky_confirmation_token) {
        return None;
    }

    let targets = extract_overwrite_targets(command, cwd);
    if is_runtime_maintenance_write(command, &targets, cwd, config) {
        return None;
    }

    let context = SafetyContext {
        working_directory: cwd.to_string_lossy().into_owned(),
        overwrite_redirect_targets: targets.clone(),
    };

    let classification = match classifier.classify(command, &context).await {
        Ok(result) => result,
        Err(_) => deterministic_fallback(command, &targets),
    };

    if classification.destructive {
        Some(classification.reason.unwrap_or_else(|| "command classified as destructive".into()))
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    struct AlwaysErr;
    #[async_trait]
    impl SafetyClassifier for AlwaysErr {
        async fn classify(&self, _command: &str, _context: &SafetyContext) -> Result<SafetyClassification, String> {
            Err("malformed json".into())
        }
    }

    struct AlwaysSafe;
    #[async_trait]
    impl SafetyClassifier for AlwaysSafe {
        async fn classify(&self, _command: &str, _context: &SafetyContext) -> Result<SafetyClassification, String> {
            Ok(SafetyClassification { destructive: false, reason: None })
        }
    }

    fn config(dir: &Path) -> ApprovalConfig {
        ApprovalConfig {
            require_risky_confirmation: true,
            risky_confirmation_token: "YOLO".into(),
            runtime_scripts_dir: dir.join(".zace/runtime/scripts"),
            runtime_lsp_config_path: Some(dir.join(".zace/runtime/lsp.json")),
        }
    }

    #[tokio::test]
    async fn disabled_policy_short_circuits() {
        let dir = tempdir().unwrap();
        let mut cfg = config(dir.path());
        cfg.require_risky_confirmation = false;
        let reason = get_destructive_command_reason("rm -rf /", dir.path(), &cfg, &AlwaysErr).await;
        assert!(reason.is_none());
    }

    #[tokio::test]
    async fn risky_token_short_circuits() {
        let dir = tempdir().unwrap();
        let cfg = config(dir.path());
        let reason = get_destructive_command_reason("rm -rf / # YOLO", dir.path(), &cfg, &AlwaysErr).await;
        assert!(reason.is_none());
    }

    #[tokio::test]
    async fn runtime_maintenance_write_is_exempt() {
        let dir = tempdir().unwrap();
        let cfg = config(dir.path());
        std::fs::create_dir_all(dir.path().join(".zace/runtime/scripts")).unwrap();
        let cmd = "echo ok > .zace/runtime/scripts/helper.sh";
        let reason = get_destructive_command_reason(cmd, dir.path(), &cfg, &AlwaysErr).await;
        assert!(reason.is_none());
    }

    #[tokio::test]
    async fn high_risk_pattern_is_never_exempt_even_in_runtime_dir() {
        let dir = tempdir().unwrap();
        let cfg = config(dir.path());
        let cmd = "rm -rf .zace/runtime/scripts";
        let reason = get_destructive_command_reason(cmd, dir.path(), &cfg, &AlwaysSafe).await;
        // High-risk pattern disqualifies the runtime-maintenance exemption, so this falls
        // through to the classifier; AlwaysSafe says safe, so no reason is produced.
        assert_eq!(reason, None);
    }

    #[tokio::test]
    async fn deterministic_fallback_flags_rm_rf() {
        let dir = tempdir().unwrap();
        let cfg = config(dir.path());
        let reason = get_destructive_command_reason("rm -rf build/", dir.path(), &cfg, &AlwaysErr).await;
        assert!(reason.is_some());
    }

    #[tokio::test]
    async fn deterministic_fallback_flags_existing_overwrite() {
        let dir = tempdir().unwrap();
        let cfg = config(dir.path());
        let target = dir.path().join("existing.txt");
        std::fs::write(&target, "data").unwrap();
        let cmd = format!("echo hi > {}", target.display());
        let reason = get_destructive_command_reason(&cmd, dir.path(), &cfg, &AlwaysErr).await;
        assert!(reason.is_some());
    }

    #[test]
    fn overwrite_targets_capped_at_twelve() {
        let dir = tempdir().unwrap();
        let cmd: String = (0..20).map(|i| format!("echo {i} > f{i}.txt; ")).collect();
        let targets = extract_overwrite_targets(&cmd, dir.path());
        assert_eq!(targets.len(), 12);
    }

    #[test]
    fn dynamic_targets_are_unknown() {
        let dir = tempdir().unwrap();
        let targets = extract_overwrite_targets("echo hi > $OUT", dir.path());
        assert_eq!(targets[0].exists, Exists::Unknown);
    }
}
