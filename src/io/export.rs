//! Write result records to disk.
//!
//! Records are pretty-printed (2-space indentation) with a trailing newline so
//! they diff cleanly and load straight into the plotting notebooks.

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use log::info;
use serde::Serialize;

use crate::error::AppError;

/// Serialize `value` as pretty JSON at `path`, creating parent directories.
pub fn write_json<T: Serialize + ?Sized>(path: &Path, value: &T) -> Result<(), AppError> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent).map_err(|e| {
            AppError::config(format!("Failed to create directory '{}': {e}", parent.display()))
        })?;
    }
    let file = File::create(path)
        .map_err(|e| AppError::config(format!("Failed to create '{}': {e}", path.display())))?;
    let mut writer = BufWriter::new(file);
    serde_json::to_writer_pretty(&mut writer, value)
        .map_err(|e| AppError::config(format!("Failed to write '{}': {e}", path.display())))?;
    writer
        .write_all(b"\n")
        .and_then(|()| writer.flush())
        .map_err(|e| AppError::config(format!("Failed to write '{}': {e}", path.display())))?;
    info!("wrote {}", path.display());
    Ok(())
}

/// `<dir>/<stem><suffix>.json`, e.g. `results/B12_Drude.json`.
pub fn output_path(dir: &Path, stem: &str, suffix: &str) -> PathBuf {
    dir.join(format!("{stem}{suffix}.json"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn writes_pretty_json_with_newline() {
        let dir = tempfile::tempdir().unwrap();
        let path = output_path(&dir.path().join("nested"), "B1", "_Drude");
        write_json(&path, &json!({"Zeta": [1.0, 0.1], "Alpha": 2})).unwrap();
        let text = std::fs::read_to_string(&path).unwrap();
        assert!(text.ends_with("}\n"));
        assert!(text.contains("\n  \"Zeta\": ["));
        // insertion order survives
        assert!(text.find("Zeta").unwrap() < text.find("Alpha").unwrap());
    }

    #[test]
    fn output_path_appends_suffix() {
        let p = output_path(Path::new("out"), "film", "_Electrical");
        assert_eq!(p, Path::new("out/film_Electrical.json"));
    }
}
