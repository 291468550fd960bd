//! Location-history export reading.
//!
//! `raw` mirrors the JSON shapes, `parse` turns records into
//! [`MovementSegment`](crate::models::MovementSegment)s. This module adds the
//! file-level entry points: a single export or a folder of monthly exports.

mod parse;
mod raw;

pub use parse::{NormalizedBatch, Normalizer, RecordOutcome};

use anyhow::{bail, Context, Result};
use serde_json::Value;
use std::{
    fs,
    path::{Path, PathBuf},
};

use raw::RawExport;

/// Expands an input path: a file is taken as is, a directory yields every
/// `*.json` beneath it in sorted path order.
pub fn collect_export_files(path: &Path) -> Result<Vec<PathBuf>> {
    if path.is_file() {
        return Ok(vec![path.to_path_buf()]);
    }
    if !path.is_dir() {
        bail!("input {} does not exist", path.display());
    }

    let mut files = Vec::new();
    let mut pending = vec![path.to_path_buf()];
    while let Some(dir) = pending.pop() {
        let entries = fs::read_dir(&dir)
            .with_context(|| format!("Failed to list {}", dir.display()))?;
        for entry in entries {
            let entry_path = entry?.path();
            if entry_path.is_dir() {
                pending.push(entry_path);
            } else if entry_path
                .extension()
                .is_some_and(|ext| ext.eq_ignore_ascii_case("json"))
            {
                files.push(entry_path);
            }
        }
    }
    files.sort();
    Ok(files)
}

/// Reads one export file and returns its records, whichever schema it uses.
pub fn load_export(path: &Path) -> Result<Vec<Value>> {
    let contents = fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    let export: RawExport = serde_json::from_str(&contents).with_context(|| {
        format!(
            "{} is neither a timelineObjects export nor a list of records",
            path.display()
        )
    })?;
    Ok(export.into_records())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn both_file_shapes_are_read() {
        let dir = tempfile::tempdir().unwrap();
        let full = dir.path().join("2023_JULY.json");
        let reduced = dir.path().join("2023_JULY_redacted.json");
        fs::write(&full, r#"{"timelineObjects":[{"placeVisit":{}},{"activitySegment":{}}]}"#)
            .unwrap();
        fs::write(&reduced, r#"[{"activitySegment":{}}]"#).unwrap();

        assert_eq!(load_export(&full).unwrap().len(), 2);
        assert_eq!(load_export(&reduced).unwrap().len(), 1);
    }

    #[test]
    fn unknown_file_shape_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("odd.json");
        fs::write(&path, r#"{"semanticSegments":[]}"#).unwrap();
        assert!(load_export(&path).is_err());
    }

    #[test]
    fn folders_expand_to_sorted_json_files() {
        let dir = tempfile::tempdir().unwrap();
        let year = dir.path().join("2023");
        fs::create_dir(&year).unwrap();
        fs::write(year.join("2023_AUGUST.json"), "[]").unwrap();
        fs::write(year.join("2023_APRIL.json"), "[]").unwrap();
        fs::write(year.join("notes.txt"), "").unwrap();

        let files = collect_export_files(dir.path()).unwrap();
        let names: Vec<_> = files
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names, vec!["2023_APRIL.json", "2023_AUGUST.json"]);
    }

    #[test]
    fn missing_input_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        assert!(collect_export_files(&dir.path().join("nope")).is_err());
    }
}
