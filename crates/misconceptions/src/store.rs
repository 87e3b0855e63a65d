use std::path::Path;

use tracing::info;

use crate::error::AppError;
use crate::model::MisconceptionSet;

/// Reads the persisted collection artifact.
pub fn load_collection(path: &Path) -> Result<MisconceptionSet, AppError> {
    let raw = std::fs::read_to_string(path)
        .map_err(|e| AppError::Persistence(format!("failed to read {}: {e}", path.display())))?;
    serde_json::from_str(&raw)
        .map_err(|e| AppError::Persistence(format!("failed to parse {}: {e}", path.display())))
}

/// Reads the persisted collection, treating a missing file as an empty
/// set so first runs and reruns share one code path.
pub fn load_or_empty(path: &Path) -> Result<MisconceptionSet, AppError> {
    if !path.exists() {
        info!(path = %path.display(), "no existing collection, starting empty");
        return Ok(MisconceptionSet::new(Vec::new()));
    }
    load_collection(path)
}

/// Writes the collection as pretty JSON, replacing the file through a
/// temporary sibling and a rename.
pub fn save_collection(path: &Path, set: &MisconceptionSet) -> Result<(), AppError> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).map_err(|e| {
            AppError::Persistence(format!("failed to create {}: {e}", parent.display()))
        })?;
    }
    let json = serde_json::to_string_pretty(set)
        .map_err(|e| AppError::Persistence(format!("failed to serialize collection: {e}")))?;
    let tmp = path.with_extension("json.tmp");
    std::fs::write(&tmp, json)
        .map_err(|e| AppError::Persistence(format!("failed to write {}: {e}", tmp.display())))?;
    std::fs::rename(&tmp, path)
        .map_err(|e| AppError::Persistence(format!("failed to replace {}: {e}", path.display())))
}
