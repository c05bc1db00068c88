//! Locate measurement files by naming convention.
//!
//! Batch files are named `<batch>_<anything>.<ext>`: the batch identifier is
//! the file stem up to the first underscore. "No match" is `Ok(None)` or an
//! empty collection; only a real file-system fault is an error.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use crate::error::AppError;

/// Files directly inside `dir` whose name ends with `suffix`, sorted.
pub fn list_files(dir: &Path, suffix: &str) -> Result<Vec<PathBuf>, AppError> {
    let entries = std::fs::read_dir(dir)
        .map_err(|e| AppError::config(format!("Failed to read directory '{}': {e}", dir.display())))?;
    let mut out = Vec::new();
    for entry in entries {
        let entry = entry.map_err(|e| {
            AppError::config(format!("Failed to read entry in '{}': {e}", dir.display()))
        })?;
        let path = entry.path();
        let matches = path
            .file_name()
            .and_then(|n| n.to_str())
            .is_some_and(|n| n.ends_with(suffix));
        if matches && path.is_file() {
            out.push(path);
        }
    }
    out.sort();
    Ok(out)
}

/// Batch identifier of a file: its stem up to the first `_`.
pub fn batch_id(path: &Path) -> Option<String> {
    let stem = path.file_stem()?.to_str()?;
    let id = stem.split('_').next()?;
    (!id.is_empty()).then(|| id.to_string())
}

/// Group the files in `dir` ending with `suffix` by batch identifier.
pub fn group_batches(dir: &Path, suffix: &str) -> Result<BTreeMap<String, Vec<PathBuf>>, AppError> {
    let mut batches: BTreeMap<String, Vec<PathBuf>> = BTreeMap::new();
    for path in list_files(dir, suffix)? {
        if let Some(id) = batch_id(&path) {
            batches.entry(id).or_default().push(path);
        }
    }
    Ok(batches)
}

/// The S4 output for `batch` in `s4_dir`: `<batch>_…S4.json`.
pub fn find_s4_measurement(s4_dir: &Path, batch: &str) -> Result<Option<PathBuf>, AppError> {
    Ok(list_files(s4_dir, "S4.json")?
        .into_iter()
        .find(|p| batch_id(p).as_deref() == Some(batch)))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn touch(dir: &Path, name: &str) {
        std::fs::write(dir.join(name), "").unwrap();
    }

    #[test]
    fn batch_id_is_stem_prefix() {
        assert_eq!(batch_id(Path::new("/x/B12_run2_4pp.csv")).as_deref(), Some("B12"));
        assert_eq!(batch_id(Path::new("B7.csv")).as_deref(), Some("B7"));
        assert_eq!(batch_id(Path::new("_odd.csv")), None);
    }

    #[test]
    fn groups_by_batch() {
        let dir = tempfile::tempdir().unwrap();
        touch(dir.path(), "B1_a.csv");
        touch(dir.path(), "B1_b.csv");
        touch(dir.path(), "B2_a.csv");
        touch(dir.path(), "notes.txt");
        let batches = group_batches(dir.path(), ".csv").unwrap();
        assert_eq!(batches.len(), 2);
        assert_eq!(batches["B1"].len(), 2);
    }

    #[test]
    fn missing_s4_is_none_not_error() {
        let dir = tempfile::tempdir().unwrap();
        touch(dir.path(), "B1_grating_S4.json");
        assert!(find_s4_measurement(dir.path(), "B1").unwrap().is_some());
        assert!(find_s4_measurement(dir.path(), "B2").unwrap().is_none());
    }

    #[test]
    fn unreadable_directory_is_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = list_files(&dir.path().join("missing"), ".csv").unwrap_err();
        assert_eq!(err.exit_code(), 2);
    }
}
