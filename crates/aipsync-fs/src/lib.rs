//! Filesystem primitives for the aipsync archive.
//!
//! Everything the synchronization pipeline does to local storage goes through
//! this crate: staged atomic writes, content copies of part files, and the
//! modification-time bookkeeping the freshness checks rely on.

mod error;
mod primitives;
mod stat;

pub use error::{Error, Result};
pub use primitives::{AtomicWriteOptions, atomic_read, atomic_write, copy_file, ensure_dir};
pub use stat::{FileStat, set_modified, stat, touch};
