use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Filesystem collaborator for the pipelines and the patch engine.
///
/// Every expected failure mode (not-found, permission, non-UTF-8 content)
/// is reported as an [`FsError`] carrying the affected path; nothing is
/// allowed to panic past this boundary.
#[derive(Error, Debug)]
pub enum FsError {
    #[error("file not found: {path}")]
    NotFound { path: PathBuf },

    #[error("{path} is not valid UTF-8")]
    Decode { path: PathBuf },

    #[error("failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to write {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

}

/// Read a file as UTF-8 text.
pub fn read_text(path: &Path) -> Result<String, FsError> {
    if !path.is_file() {
        return Err(FsError::NotFound {
            path: path.to_path_buf(),
        });
    }

    let bytes = fs::read(path).map_err(|source| FsError::Read {
        path: path.to_path_buf(),
        source,
    })?;

    String::from_utf8(bytes).map_err(|_| FsError::Decode {
        path: path.to_path_buf(),
    })
}

/// Write text to a file atomically: tempfile in the same directory, fsync,
/// rename. Either the full write lands or the previous content survives.
pub fn write_text(path: &Path, content: &str) -> Result<(), FsError> {
    atomic_write(path, content.as_bytes())
}

fn atomic_write(path: &Path, content: &[u8]) -> Result<(), FsError> {
    let wrap = |source: std::io::Error| FsError::Write {
        path: path.to_path_buf(),
        source,
    };

    // Tempfile must live in the same directory so the rename stays on one
    // filesystem.
    let parent = path.parent().ok_or_else(|| {
        wrap(std::io::Error::new(
            std::io::ErrorKind::InvalidInput,
            "path has no parent directory",
        ))
    })?;

    let mut temp = tempfile::NamedTempFile::new_in(parent).map_err(wrap)?;
    temp.write_all(content).map_err(wrap)?;
    temp.as_file().sync_all().map_err(wrap)?;
    temp.persist(path).map_err(|e| wrap(e.error))?;

    // Bump mtime so watchers and editors notice the change.
    let now = filetime::FileTime::now();
    filetime::set_file_mtime(path, now).map_err(wrap)?;

    Ok(())
}

/// Platform line ending used when splicing replacement lines.
#[cfg(windows)]
pub const LINE_ENDING: &str = "\r\n";
#[cfg(not(windows))]
pub const LINE_ENDING: &str = "\n";
