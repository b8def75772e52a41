//! Script catalog: marker-driven upserts and the TSV registry file
//! (§4.10).

mod marker;
mod tsv;

pub use marker::{scan_markers, ScriptMarker};
pub use tsv::{parse_tsv, serialize_tsv};

use std::collections::HashMap;
use std::fs;
use std::path::Path;

use zace_core::types::ScriptMetadata;
use zace_core::RunError;

/// Apply one register marker: upsert, preserving `times_used`.
pub fn register(catalog: &mut HashMap<String, ScriptMetadata>, id: &str, path: &str, purpose: &str, current_step: u32) {
    let times_used = catalog.get(id).map(|e| e.times_used).unwrap_or(0);
    catalog.insert(
        id.to_string(),
        ScriptMetadata {
            id: id.to_string(),
            path: path.to_string(),
            purpose: purpose.to_string(),
            last_touched_step: current_step,
            times_used,
        },
    );
}

/// Apply one use marker: increment `times_used`, creating a placeholder
/// entry if `id` is unknown.
pub fn record_use(catalog: &mut HashMap<String, ScriptMetadata>, id: &str) {
    catalog
        .entry(id.to_string())
        .and_modify(|e| e.times_used += 1)
        .or_insert_with(|| ScriptMetadata {
            id: id.to_string(),
            path: String::new(),
            purpose: String::new(),
            last_touched_step: 0,
            times_used: 1,
        });
}

/// Scan `output` for markers and apply them to `catalog` in order.
pub fn apply_markers(catalog: &mut HashMap<String, ScriptMetadata>, output: &str, current_step: u32) {
    for marker in scan_markers(output) {
        match marker {
            ScriptMarker::Register { id, path, purpose } => register(catalog, &id, &path, &purpose, current_step),
            ScriptMarker::Use { id } => record_use(catalog, &id),
        }
    }
}

/// Path of the script registry file under the project root.
pub fn registry_path(project_root: &Path) -> std::path::PathBuf {
    project_root.join(".zace").join("runtime").join("scripts.tsv")
}

/// Atomically rewrite the registry file with the current catalog.
pub fn sync_registry(project_root: &Path, catalog: &HashMap<String, ScriptMetadata>) -> Result<(), RunError> {
    let path = registry_path(project_root);
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(|source| RunError::ScriptRegistryIo { path: path.display().to_string(), source })?;
    }
    let tmp_path = path.with_extension("tsv.tmp");
    fs::write(&tmp_path, serialize_tsv(catalog)).map_err(|source| RunError::ScriptRegistryIo { path: tmp_path.display().to_string(), source })?;
    fs::rename(&tmp_path, &path).map_err(|source| RunError::ScriptRegistryIo { path: path.display().to_string(), source })
}

/// Load the registry file, returning an empty catalog if it does not
/// exist yet.
pub fn load_registry(project_root: &Path) -> Result<HashMap<String, ScriptMetadata>, RunError> {
    let path = registry_path(project_root);
    if !path.exists() {
        return Ok(HashMap::new());
    }
    let content = fs::read_to_string(&path).map_err(|source| RunError::ScriptRegistryIo { path: path.display().to_string(), source })?;
    Ok(parse_tsv(&content))
}
