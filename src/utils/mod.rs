//! Utility functions and helpers for pxdgen.

use std::path::{Path, PathBuf};

use walkdir::WalkDir;

/// Returns an iterator over all Python files in the given directory.
pub fn find_python_files<P: AsRef<Path>>(path: P) -> impl Iterator<Item = PathBuf> {
    WalkDir::new(path)
        .into_iter()
        .filter_map(std::result::Result::ok)
        .filter(|entry| {
            let path = entry.path();
            path.is_file() && path.extension().map_or(false, |ext| ext == "py")
        })
        .map(|entry| entry.path().to_path_buf())
}

/// The declaration file maintained for a source file: the same path with a
/// `.pxd` extension.
pub fn declaration_path_for(input: &Path) -> PathBuf {
    input.with_extension("pxd")
}
