use crate::{Error, Result};
use chrono::{DateTime, Utc};
use std::fs;
use std::io;
use std::path::Path;
use std::time::SystemTime;

/// The subset of file metadata the freshness and verification checks need.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FileStat {
    pub len:      u64,
    pub modified: DateTime<Utc>,
    pub is_dir:   bool,
}

/// Stat `path`, mapping "not found" to `Ok(None)`.
///
/// Any other failure is returned as an error so callers can tell a missing
/// file apart from storage they cannot read.
pub fn stat(path: impl AsRef<Path>) -> Result<Option<FileStat>> {
    let path = path.as_ref();
    let metadata = match fs::metadata(path) {
        Ok(metadata) => metadata,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
        Err(e) => {
            return Err(Error::Metadata {
                path: path.to_path_buf(),
                source: e,
            });
        }
    };
    let modified = metadata.modified().map_err(|e| Error::Metadata {
        path: path.to_path_buf(),
        source: e,
    })?;

    Ok(Some(FileStat {
        len:      metadata.len(),
        modified: DateTime::<Utc>::from(modified),
        is_dir:   metadata.is_dir(),
    }))
}

/// Set the modification time of a file or directory.
pub fn set_modified(path: impl AsRef<Path>, when: DateTime<Utc>) -> Result<()> {
    let path = path.as_ref();
    let handle = open_for_times(path).map_err(|e| Error::SetTimes {
        path: path.to_path_buf(),
        source: e,
    })?;
    handle
        .set_modified(SystemTime::from(when))
        .map_err(|e| Error::SetTimes {
            path: path.to_path_buf(),
            source: e,
        })
}

/// Directories need backup semantics to be opened at all on Windows, and
/// setting times there requires write access.
#[cfg(windows)]
fn open_for_times(path: &Path) -> io::Result<fs::File> {
    use std::os::windows::fs::OpenOptionsExt;

    const FILE_FLAG_BACKUP_SEMANTICS: u32 = 0x0200_0000;
    fs::OpenOptions::new()
        .write(true)
        .custom_flags(FILE_FLAG_BACKUP_SEMANTICS)
        .open(path)
}

#[cfg(not(windows))]
fn open_for_times(path: &Path) -> io::Result<fs::File> { fs::File::open(path) }

/// Reset the modification time of `path` to now.
pub fn touch(path: impl AsRef<Path>) -> Result<()> { set_modified(path, Utc::now()) }
