//! Project-relative paths for configuration and runtime state (§4.11).

use std::path::{Path, PathBuf};

/// Directory holding all project-local runtime state.
pub fn zace_dir(project_root: &Path) -> PathBuf {
    project_root.join(".zace")
}

/// Path of the project configuration file.
pub fn config_path(project_root: &Path) -> PathBuf {
    zace_dir(project_root).join("config.toml")
}
