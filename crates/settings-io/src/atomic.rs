use std::fs;
use std::io::{self, Write};
use std::path::Path;

use tempfile::Builder;

/// Atomically write `contents` to `path`: readers see either the old file or
/// the new one, never a partial write.
pub fn atomic_write(path: &Path, contents: &str) -> io::Result<()> {
    let parent = path
        .parent()
        .filter(|parent| !parent.as_os_str().is_empty())
        .map(Path::to_path_buf)
        .unwrap_or_else(|| Path::new(".").to_path_buf());
    fs::create_dir_all(&parent)?;

    let mut tmp = Builder::new()
        .prefix(".settings-engine")
        .tempfile_in(&parent)?;

    tmp.as_file_mut().write_all(contents.as_bytes())?;
    tmp.as_file_mut().sync_all()?;

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        if let Ok(metadata) = fs::metadata(path) {
            let perm = metadata.permissions().mode();
            let _ = fs::set_permissions(tmp.path(), fs::Permissions::from_mode(perm));
        }
    }

    tmp.persist(path).map(|_| ()).map_err(|err| err.error)
}
