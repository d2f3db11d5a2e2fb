//! The filesystem trait.
//!
//! Operations are path-based, mirroring the libfuse high-level API. Paths
//! are absolute within the mount and arrive exactly as libfuse passes them,
//! so they need not be valid UTF-8.
//!
//! Callbacks run synchronously on libfuse's worker threads. In the default
//! multi-threaded loop any of them may run concurrently with any other,
//! which is why implementors must be `Send + Sync`.

use std::path::Path;

use crate::abi::ConnectionInfo;
use crate::error::{FsError, FsResult};
use crate::filler::DirFiller;
use crate::table::Operation;
use crate::types::{FileAttr, FileHandle, OpenFlags, Opened};

/// A filesystem served through libfuse.
///
/// Only the operations listed in [`Filesystem::OPERATIONS`] get a slot in
/// the operations table; libfuse answers every other request itself. A
/// listed operation whose method is not overridden answers `ENOSYS`.
pub trait Filesystem: Send + Sync + 'static {
    /// Operations to register, in any order.
    const OPERATIONS: &'static [Operation];

    /// Called once when the session starts, before any other operation.
    ///
    /// The connection may be inspected and its writable fields adjusted. An
    /// error is logged; the session continues either way.
    fn init(&self, _conn: &mut ConnectionInfo) -> FsResult<()> {
        Ok(())
    }

    /// Called once when the session ends.
    fn destroy(&self) {}

    /// Get file attributes.
    fn getattr(&self, _path: &Path) -> FsResult<FileAttr> {
        Err(FsError::Unsupported(Operation::Getattr))
    }

    /// Open a file.
    ///
    /// The returned handle comes back in every later `read` and in
    /// `release` for the same descriptor.
    fn open(&self, _path: &Path, _flags: OpenFlags) -> FsResult<Opened> {
        Err(FsError::Unsupported(Operation::Open))
    }

    /// Read up to `buf.len()` bytes starting at `offset`.
    ///
    /// Returns the number of bytes written into `buf`. Zero means end of
    /// file. Returning more than `buf.len()` is an error.
    fn read(&self, _path: &Path, _buf: &mut [u8], _offset: u64, _fh: FileHandle) -> FsResult<usize> {
        Err(FsError::Unsupported(Operation::Read))
    }

    /// Release an open file. Called exactly once per successful open.
    fn release(&self, _path: &Path, _fh: FileHandle) -> FsResult<()> {
        Err(FsError::Unsupported(Operation::Release))
    }

    /// List a directory by pushing entries into `filler`.
    ///
    /// Stop pushing once the filler reports [`FillStatus::Full`]; the
    /// listing then counts as complete.
    ///
    /// [`FillStatus::Full`]: crate::filler::FillStatus::Full
    fn readdir(&self, _path: &Path, _filler: &mut DirFiller<'_>) -> FsResult<()> {
        Err(FsError::Unsupported(Operation::Readdir))
    }
}
