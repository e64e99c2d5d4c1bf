//! Filesystem helpers for data file discovery.
//!
//! Heap relations are stored as files named by their numeric file node,
//! optionally split into 1 GiB segments `<filenode>.<n>`. Free space map,
//! visibility map and init forks (`_fsm`, `_vm`, `_init`) are not heap
//! pages and are skipped.

use std::path::{Path, PathBuf};

use crate::PduError;

/// Recursively find heap data files under `dir`, sorted by path.
pub fn find_data_files(dir: &Path) -> Result<Vec<PathBuf>, PduError> {
    let mut files = Vec::new();
    walk(dir, &mut files)?;
    files.sort();
    Ok(files)
}

fn walk(dir: &Path, files: &mut Vec<PathBuf>) -> Result<(), PduError> {
    let entries = std::fs::read_dir(dir)
        .map_err(|e| PduError::Io(format!("Cannot read directory {}: {}", dir.display(), e)))?;

    for entry in entries {
        let entry =
            entry.map_err(|e| PduError::Io(format!("Cannot read directory entry: {}", e)))?;
        let path = entry.path();

        if path.is_dir() {
            walk(&path, files)?;
        } else if path
            .file_name()
            .and_then(|n| n.to_str())
            .is_some_and(is_data_file_name)
        {
            files.push(path);
        }
    }
    Ok(())
}

/// True for `<digits>` or `<digits>.<digits>`.
pub fn is_data_file_name(name: &str) -> bool {
    let all_digits = |s: &str| !s.is_empty() && s.bytes().all(|b| b.is_ascii_digit());
    match name.split_once('.') {
        Some((node, segment)) => all_digits(node) && all_digits(segment),
        None => all_digits(name),
    }
}
