use std::fs::{self, DirBuilder};
use std::path::{Path, PathBuf};

use crate::error::Result;

/// Creates the parent directory of `path` if it doesn't exist
pub fn ensure_parent_dir(path: impl AsRef<Path>) -> Result<()> {
    if let Some(parent) = path.as_ref().parent().filter(|p| !p.as_os_str().is_empty()) {
        DirBuilder::new().recursive(true).create(parent)?;
    }
    Ok(())
}

/// Lists files with the given extension under a directory, recursively, in
/// path order
pub fn find_files(dir_path: impl AsRef<Path>, extension: &str) -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    collect_files(dir_path.as_ref(), extension, &mut files)?;
    files.sort();
    Ok(files)
}

fn collect_files(dir: &Path, extension: &str, files: &mut Vec<PathBuf>) -> Result<()> {
    for entry in fs::read_dir(dir)? {
        let path = entry?.path();

        if path.is_file() {
            if path.extension().is_some_and(|ext| ext == extension) {
                files.push(path);
            }
        } else if path.is_dir() {
            collect_files(&path, extension, files)?;
        }
    }
    Ok(())
}
