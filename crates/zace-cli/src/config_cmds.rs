//! `zace config {show, validate, init}` (§4.11, §4.12), modeled on the
//! teacher's `config_cmds::handle_config_show`/`handle_config_validate`/
//! `handle_init`.

use std::path::Path;

use anyhow::{Context, Result};

pub fn handle_show(project_root: &Path) -> Result<()> {
    let config = zace_config::load(project_root).context("loading configuration")?;
    let toml_str = toml::to_string_pretty(&config).context("serializing configuration")?;
    print!("{toml_str}");
    Ok(())
}

pub fn handle_validate(project_root: &Path) -> Result<()> {
    match zace_config::validate_config(project_root) {
        Ok(()) => {
            println!("Configuration is valid.");
            Ok(())
        }
        Err(err) => anyhow::bail!("{err}"),
    }
}

pub fn handle_init(project_root: &Path) -> Result<()> {
    let config_path = zace_config::paths::config_path(project_root);
    if config_path.exists() {
        eprintln!("Configuration already exists at: {}", config_path.display());
        return Ok(());
    }
    let config = zace_config::ZaceConfig::default();
    zace_config::save(project_root, &config).context("writing configuration")?;
    eprintln!("Initialized project configuration at: {}", config_path.display());
    Ok(())
}
