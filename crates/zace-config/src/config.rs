//! Loading and atomic saving of `ZaceConfig` (§4.11).

use std::fs;
use std::path::Path;

use zace_core::RunError;

use crate::model::ZaceConfig;
use crate::paths::config_path;

/// Load `.zace/config.toml`, falling back to `ZaceConfig::default()` when
/// the file is absent — the loop always needs a full, usable
/// configuration, so this returns the struct directly rather than an
/// `Option`.
pub fn load(project_root: &Path) -> Result<ZaceConfig, RunError> {
    let path = config_path(project_root);
    if !path.exists() {
        return Ok(ZaceConfig::default());
    }
    let content = fs::read_to_string(&path).map_err(|source| RunError::ConfigIo { path: path.display().to_string(), source })?;
    toml::from_str(&content).map_err(|source| RunError::ConfigParse { path: path.display().to_string(), source: Box::new(source) })
}

/// Atomically rewrite `.zace/config.toml` (temp file + rename), matching
/// the approval-rules/script-registry atomic-rewrite idiom.
pub fn save(project_root: &Path, config: &ZaceConfig) -> Result<(), RunError> {
    let path = config_path(project_root);
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(|source| RunError::ConfigIo { path: path.display().to_string(), source })?;
    }
    let content = toml::to_string_pretty(config)
        .map_err(|source| RunError::ConfigSerialize { path: path.display().to_string(), source })?;
    let tmp_path = path.with_extension("toml.tmp");
    fs::write(&tmp_path, content).map_err(|source| RunError::ConfigIo { path: tmp_path.display().to_string(), source })?;
    fs::rename(&tmp_path, &path).map_err(|source| RunError::ConfigIo { path: path.display().to_string(), source })
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn load_missing_file_returns_default() {
        let dir = tempdir().unwrap();
        let config = load(dir.path()).unwrap();
        assert_eq!(config.max_steps, ZaceConfig::default().max_steps);
    }

    #[test]
    fn save_then_load_round_trips() {
        let dir = tempdir().unwrap();
        let mut config = ZaceConfig::default();
        config.max_steps = 99;
        config.guardrails.doom_loop_threshold = 4;
        save(dir.path(), &config).unwrap();

        let loaded = load(dir.path()).unwrap();
        assert_eq!(loaded.max_steps, 99);
        assert_eq!(loaded.guardrails.doom_loop_threshold, 4);
    }

    #[test]
    fn save_creates_zace_directory() {
        let dir = tempdir().unwrap();
        save(dir.path(), &ZaceConfig::default()).unwrap();
        assert!(dir.path().join(".zace").join("config.toml").exists());
    }

    #[test]
    fn malformed_toml_is_reported_as_config_parse() {
        let dir = tempdir().unwrap();
        fs::create_dir_all(dir.path().join(".zace")).unwrap();
        fs::write(dir.path().join(".zace/config.toml"), "not = [valid").unwrap();
        let err = load(dir.path()).unwrap_err();
        assert!(matches!(err, RunError::ConfigParse { .. }));
    }
}
