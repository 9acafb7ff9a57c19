//! Whole-file replacement through a sibling temp file and rename.

use std::fs;
use std::io::Write;
use std::path::Path;

use tempfile::NamedTempFile;

use crate::spec::SinkIoError;

/// Replace `path_file` with `bytes` so readers see either the old or the new
/// content, never a truncated file.
///
/// Permissions of an existing file are carried over; new files get `0644`.
pub fn replace_file_atomic(path_file: &Path, bytes: &[u8]) -> Result<(), SinkIoError> {
    let path_dir = match path_file.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };
    let err_write = |message: String| SinkIoError::WriteFailed {
        path: path_file.to_path_buf(),
        message,
    };

    let mut tmp_file = NamedTempFile::new_in(path_dir).map_err(|e| SinkIoError::OpenFailed {
        path: path_file.to_path_buf(),
        message: e.to_string(),
    })?;
    tmp_file
        .write_all(bytes)
        .map_err(|e| err_write(e.to_string()))?;
    tmp_file
        .as_file()
        .sync_all()
        .map_err(|e| err_write(e.to_string()))?;

    match fs::metadata(path_file) {
        Ok(meta_prev) => tmp_file
            .as_file()
            .set_permissions(meta_prev.permissions())
            .map_err(|e| err_write(e.to_string()))?,
        Err(_) => {
            #[cfg(unix)]
            {
                use std::os::unix::fs::PermissionsExt;
                tmp_file
                    .as_file()
                    .set_permissions(fs::Permissions::from_mode(0o644))
                    .map_err(|e| err_write(e.to_string()))?;
            }
        }
    }

    tmp_file
        .persist(path_file)
        .map_err(|e| err_write(e.error.to_string()))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use tempfile::tempdir;

    use super::replace_file_atomic;

    #[test]
    fn replace_file_atomic_overwrites_and_leaves_no_temp() {
        let tmp = tempdir().expect("tempdir");
        let path = tmp.path().join("book.xlsx");

        replace_file_atomic(&path, b"first").expect("first write");
        replace_file_atomic(&path, b"second").expect("second write");

        assert_eq!(std::fs::read(&path).expect("read"), b"second");
        let n_entries = std::fs::read_dir(tmp.path()).expect("read dir").count();
        assert_eq!(n_entries, 1);
    }
}
