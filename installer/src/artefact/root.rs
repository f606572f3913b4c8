//! Package root detection for extracted archives.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use log::debug;

/// Pick the meaningful top of an extracted tree.
///
/// When the only visible top-level entry is a directory, that directory is
/// the root. Any other shape (no entries, several directories, or loose
/// files) yields `tree` itself. Names starting with `.` are ignored, and a
/// symlink never counts as a directory.
///
/// # Errors
///
/// Returns the I/O error raised while listing `tree`.
pub fn detect_root(tree: &Path) -> io::Result<PathBuf> {
    let mut sole_dir = None;
    let mut visible = 0usize;
    for entry in fs::read_dir(tree)? {
        let entry = entry?;
        if entry.file_name().to_string_lossy().starts_with('.') {
            continue;
        }
        visible += 1;
        if entry.file_type()?.is_dir() {
            sole_dir = Some(entry.path());
        }
    }

    match sole_dir {
        Some(dir) if visible == 1 => {
            debug!("collapsing single top-level directory {}", dir.display());
            Ok(dir)
        }
        _ => Ok(tree.to_path_buf()),
    }
}
