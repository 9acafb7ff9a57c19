use std::fs;
use std::io;
use std::path::{Component, Path, PathBuf};

use tracing::debug;

use crate::spec::SinkIoError;

////////////////////////////////////////////////////////////////////////////////
// #region SinkDirectory

/// Create the sink directory (mode `0755`) when absent and return it.
///
/// An existing directory is reused as-is. A file or symlink at `path_dir`
/// is rejected.
pub fn prepare_sink_directory(path_dir: &Path) -> Result<PathBuf, SinkIoError> {
    match fs::symlink_metadata(path_dir) {
        Ok(meta_dir) => {
            if meta_dir.file_type().is_symlink() {
                return Err(SinkIoError::DirectoryInitFailed {
                    path: path_dir.to_path_buf(),
                    message: "Sink directory must not be a symbolic link.".to_string(),
                });
            }
            if !meta_dir.is_dir() {
                return Err(SinkIoError::DirectoryInitFailed {
                    path: path_dir.to_path_buf(),
                    message: "Sink path exists and is not a directory.".to_string(),
                });
            }
            return Ok(path_dir.to_path_buf());
        }
        Err(e) if e.kind() == io::ErrorKind::NotFound => {}
        Err(e) => {
            return Err(SinkIoError::DirectoryInitFailed {
                path: path_dir.to_path_buf(),
                message: e.to_string(),
            });
        }
    }

    let mut builder_dir = fs::DirBuilder::new();
    builder_dir.recursive(true);
    #[cfg(unix)]
    {
        use std::os::unix::fs::DirBuilderExt;
        builder_dir.mode(0o755);
    }
    builder_dir
        .create(path_dir)
        .map_err(|e| SinkIoError::DirectoryInitFailed {
            path: path_dir.to_path_buf(),
            message: e.to_string(),
        })?;
    debug!(path = %path_dir.display(), "created sink directory");
    Ok(path_dir.to_path_buf())
}

/// Join a caller-supplied file name onto the sink directory.
///
/// `name_file` must be a single plain path component. An existing entry at
/// the joined path must be a regular file.
pub fn derive_sink_file_path(path_dir: &Path, name_file: &str) -> Result<PathBuf, SinkIoError> {
    let path_name = Path::new(name_file);
    let mut iter_components = path_name.components();
    let if_plain_name = matches!(
        (iter_components.next(), iter_components.next()),
        (Some(Component::Normal(_)), None)
    );
    if name_file.is_empty() || !if_plain_name {
        return Err(SinkIoError::UnsafeDestination(format!(
            "Sink file name must be a plain file name: {name_file:?}"
        )));
    }

    let path_file = path_dir.join(path_name);
    validate_sink_file_entry(&path_file)?;
    Ok(path_file)
}

// #endregion
////////////////////////////////////////////////////////////////////////////////
// #region PathSafety

/// Reject a sink file that already exists as a symlink or a non-file.
///
/// Sink files are opened in append mode, so a pre-planted link would
/// redirect writes outside `path_dir`.
fn validate_sink_file_entry(path_file: &Path) -> Result<(), SinkIoError> {
    match fs::symlink_metadata(path_file) {
        Ok(meta_file) if meta_file.file_type().is_symlink() => Err(SinkIoError::UnsafeDestination(
            format!("Sink file is an existing symlink: {}", path_file.display()),
        )),
        Ok(meta_file) if !meta_file.is_file() => Err(SinkIoError::UnsafeDestination(format!(
            "Sink path exists and is not a regular file: {}",
            path_file.display()
        ))),
        Ok(_) => Ok(()),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(SinkIoError::UnsafeDestination(format!(
            "Failed to inspect sink file {} ({e})",
            path_file.display()
        ))),
    }
}

// #endregion
////////////////////////////////////////////////////////////////////////////////
