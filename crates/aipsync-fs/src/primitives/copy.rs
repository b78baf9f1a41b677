use crate::{Error, Result};
use std::fs;
use std::path::Path;

/// Create `path` and all of its missing ancestors.
pub fn ensure_dir(path: impl AsRef<Path>) -> Result<()> {
    let path = path.as_ref();
    fs::create_dir_all(path).map_err(|e| Error::CreateDir {
        path: path.to_path_buf(),
        source: e,
    })
}

/// Copy the content of a regular file into `dest`, creating the parent
/// directory when needed. The destination is a fresh file, never a link to
/// the source.
pub fn copy_file(src: impl AsRef<Path>, dest: impl AsRef<Path>) -> Result<u64> {
    let src = src.as_ref();
    let dest = dest.as_ref();

    let metadata = fs::metadata(src).map_err(|e| Error::Read {
        path: src.to_path_buf(),
        source: e,
    })?;
    if !metadata.is_file() {
        return Err(Error::NotRegularFile(src.to_path_buf()));
    }

    if let Some(parent) = dest.parent().filter(|p| !p.as_os_str().is_empty()) {
        ensure_dir(parent)?;
    }

    let mut reader = fs::File::open(src).map_err(|e| Error::Read {
        path: src.to_path_buf(),
        source: e,
    })?;
    let mut writer = fs::File::create(dest).map_err(|e| Error::Write {
        path: dest.to_path_buf(),
        source: e,
    })?;
    std::io::copy(&mut reader, &mut writer).map_err(|e| Error::Write {
        path: dest.to_path_buf(),
        source: e,
    })
}
