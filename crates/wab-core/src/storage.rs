use std::{io::Write, path::Path};

use tempfile::NamedTempFile;

use crate::Result;

/// Replace `path` with `bytes` via a temp file in the same directory + rename.
///
/// Readers see either the previous contents or the new ones, never a torn file.
/// An interrupted write leaves at most an orphaned temp file next to `path`.
pub fn write_atomic(path: &Path, bytes: &[u8]) -> Result<()> {
    let parent = match path.parent().filter(|p| !p.as_os_str().is_empty()) {
        Some(parent) => {
            std::fs::create_dir_all(parent)?;
            parent
        }
        None => Path::new("."),
    };

    let mut temp = NamedTempFile::new_in(parent)?;
    temp.write_all(bytes)?;
    temp.as_file().sync_all()?;
    // On failure the temp file is dropped, which removes it.
    temp.persist(path).map_err(|e| e.error)?;
    Ok(())
}
