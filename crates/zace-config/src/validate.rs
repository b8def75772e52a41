//! Config validation surfaced by `zace config validate` (§4.11, §4.12).

use std::fmt;
use std::path::Path;

use zace_core::RunError;

use crate::config::load;
use crate::model::ZaceConfig;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationIssue {
    pub field: String,
    pub message: String,
}

impl fmt::Display for ValidationIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

#[derive(Debug)]
pub enum ConfigValidationError {
    /// The config file failed to parse; carries the toml crate's own
    /// file:line/column-annotated message.
    Parse(String),
    Invalid(Vec<ValidationIssue>),
}

impl fmt::Display for ConfigValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Parse(message) => write!(f, "{message}"),
            Self::Invalid(issues) => {
                for (i, issue) in issues.iter().enumerate() {
                    if i > 0 {
                        writeln!(f)?;
                    }
                    write!(f, "{issue}")?;
                }
                Ok(())
            }
        }
    }
}

/// Load and validate `.zace/config.toml`, reporting parse errors with
/// the file:line context `toml`'s deserializer already attaches to
/// [`toml::de::Error::message`]/[`Display`].
pub fn validate_config(project_root: &Path) -> Result<(), ConfigValidationError> {
    let config = match load(project_root) {
        Ok(config) => config,
        Err(RunError::ConfigParse { path, source }) => {
            return Err(ConfigValidationError::Parse(format!("{path}: {source}")));
        }
        Err(other) => return Err(ConfigValidationError::Parse(other.to_string())),
    };
    validate_loaded(&config)
}

fn validate_loaded(config: &ZaceConfig) -> Result<(), ConfigValidationError> {
    let mut issues = Vec::new();

    if config.max_steps == 0 {
        issues.push(ValidationIssue { field: "max_steps".into(), message: "must be > 0".into() });
    }
    if config.guardrails.doom_loop_threshold < 2 {
        issues.push(ValidationIssue {
            field: "guardrails.doom_loop_threshold".into(),
            message: "must be >= 2".into(),
        });
    }
    if config.guardrails.stagnation_window == 0 {
        issues.push(ValidationIssue { field: "guardrails.stagnation_window".into(), message: "must be > 0".into() });
    }
    if !(0.0..=1.0).contains(&config.compaction.compaction_trigger_ratio) {
        issues.push(ValidationIssue {
            field: "compaction.compaction_trigger_ratio".into(),
            message: "must be between 0.0 and 1.0".into(),
        });
    }
    if config.retry.transient_retry_max_attempts == 0 {
        issues.push(ValidationIssue {
            field: "retry.transient_retry_max_attempts".into(),
            message: "must be > 0".into(),
        });
    }
    if config.docs.doc_context_max_files == 0 {
        issues.push(ValidationIssue { field: "docs.doc_context_max_files".into(), message: "must be > 0".into() });
    }
    if config.approval.require_risky_confirmation && config.approval.risky_confirmation_token.is_empty() {
        issues.push(ValidationIssue {
            field: "approval.risky_confirmation_token".into(),
            message: "cannot be empty when require_risky_confirmation is set".into(),
        });
    }

    if issues.is_empty() {
        Ok(())
    } else {
        Err(ConfigValidationError::Invalid(issues))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    #[test]
    fn default_config_is_valid() {
        assert!(validate_loaded(&ZaceConfig::default()).is_ok());
    }

    #[test]
    fn doom_loop_threshold_below_two_is_invalid() {
        let mut config = ZaceConfig::default();
        config.guardrails.doom_loop_threshold = 1;
        let err = validate_loaded(&config).unwrap_err();
        assert!(err.to_string().contains("doom_loop_threshold"));
    }

    #[test]
    fn compaction_ratio_out_of_range_is_invalid() {
        let mut config = ZaceConfig::default();
        config.compaction.compaction_trigger_ratio = 1.5;
        let err = validate_loaded(&config).unwrap_err();
        assert!(err.to_string().contains("compaction_trigger_ratio"));
    }

    #[test]
    fn empty_confirmation_token_with_confirmation_required_is_invalid() {
        let mut config = ZaceConfig::default();
        config.approval.require_risky_confirmation = true;
        config.approval.risky_confirmation_token = String::new();
        let err = validate_loaded(&config).unwrap_err();
        assert!(err.to_string().contains("risky_confirmation_token"));
    }

    #[test]
    fn malformed_file_reports_parse_error() {
        let dir = tempdir().unwrap();
        fs::create_dir_all(dir.path().join(".zace")).unwrap();
        fs::write(dir.path().join(".zace/config.toml"), "max_steps = [not valid").unwrap();
        let err = validate_config(dir.path()).unwrap_err();
        assert!(matches!(err, ConfigValidationError::Parse(_)));
    }

    #[test]
    fn missing_config_file_validates_defaults() {
        let dir = tempdir().unwrap();
        assert!(validate_config(dir.path()).is_ok());
    }
}
