use crate::{Error, Result};
use std::fs;
use std::io::Write;
use std::path::Path;

#[derive(Clone, Copy, Debug, Default)]
pub struct AtomicWriteOptions {
    pub permissions: Option<u32>,
    pub sync:        bool,
}

impl AtomicWriteOptions {
    pub fn new() -> Self { Self::default() }

    pub fn permissions(mut self, mode: u32) -> Self {
        self.permissions = Some(mode);
        self
    }

    pub fn sync(mut self, sync: bool) -> Self {
        self.sync = sync;
        self
    }
}

/// Write `content` next to `path` and rename it into place.
///
/// Readers never observe a half-written file: the destination either keeps
/// its previous content or holds the new content in full.
pub fn atomic_write(
    path: impl AsRef<Path>,
    content: &[u8],
    options: AtomicWriteOptions,
) -> Result<()> {
    let path = path.as_ref();
    let parent = path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .ok_or_else(|| Error::NoParent(path.to_path_buf()))?;

    let mut staged = tempfile::Builder::new()
        .prefix(".")
        .suffix(".tmp")
        .tempfile_in(parent)
        .map_err(|e| Error::Write {
            path: parent.to_path_buf(),
            source: e,
        })?;

    staged.write_all(content).map_err(|e| Error::Write {
        path: staged.path().to_path_buf(),
        source: e,
    })?;

    #[cfg(unix)]
    if let Some(mode) = options.permissions {
        use std::os::unix::fs::PermissionsExt;
        fs::set_permissions(staged.path(), fs::Permissions::from_mode(mode)).map_err(|e| {
            Error::Write {
                path: staged.path().to_path_buf(),
                source: e,
            }
        })?;
    }

    if options.sync {
        staged.as_file().sync_all().map_err(|e| Error::Write {
            path: staged.path().to_path_buf(),
            source: e,
        })?;
    }

    // The staged file is removed on drop when persisting fails.
    staged.persist(path).map_err(|e| Error::Write {
        path: path.to_path_buf(),
        source: e.error,
    })?;

    Ok(())
}

pub fn atomic_read(path: impl AsRef<Path>) -> Result<Vec<u8>> {
    let path = path.as_ref();
    fs::read(path).map_err(|e| Error::Read {
        path: path.to_path_buf(),
        source: e,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_atomic_write() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("test.txt");
        atomic_write(&path, b"hello world", AtomicWriteOptions::new()).unwrap();
        assert_eq!(fs::read(&path).unwrap(), b"hello world");
    }

    #[test]
    fn test_atomic_write_leaves_no_staging_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("merged.pdf");
        atomic_write(&path, b"data", AtomicWriteOptions::new().sync(true)).unwrap();

        let names: Vec<_> = fs::read_dir(dir.path())
            .unwrap()
            .map(|e| e.unwrap().file_name())
            .collect();
        assert_eq!(names, vec![std::ffi::OsString::from("merged.pdf")]);
    }

    #[test]
    fn test_atomic_write_missing_parent() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("missing").join("file.bin");
        let err = atomic_write(&path, b"x", AtomicWriteOptions::new()).unwrap_err();
        assert!(matches!(err, Error::Write { .. }));
    }

    #[cfg(unix)]
    #[test]
    fn test_atomic_write_with_permissions() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempdir().unwrap();
        let path = dir.path().join("test.txt");
        atomic_write(&path, b"data", AtomicWriteOptions::new().permissions(0o600)).unwrap();
        let metadata = fs::metadata(&path).unwrap();
        assert_eq!(metadata.permissions().mode() & 0o777, 0o600);
    }
}
