//! `struct fuse_file_info` mirror.

use bitflags::bitflags;
use libc::{c_int, c_uint, c_ulong};

use super::layout::impl_layout;

bitflags! {
    /// The single-bit members of `fuse_file_info`, in bitfield order.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct FileInfoFlags: c_uint {
        /// Use direct I/O on this file. Set by open.
        const DIRECT_IO = 1 << 0;
        /// Cached data need not be invalidated. Set by open.
        const KEEP_CACHE = 1 << 1;
        /// This is a flush operation.
        const FLUSH = 1 << 2;
        /// The file is not seekable. Set by open.
        const NONSEEKABLE = 1 << 3;
        /// flock locks for this file should be released (release only).
        const FLOCK_RELEASE = 1 << 4;
    }
}

/// Per-open-file information, allocated by libfuse for each open file
/// descriptor.
///
/// `fh` is the one field the filesystem owns: set it in open and it comes
/// back unchanged in every later operation on that descriptor, up to and
/// including release.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FileInfo {
    /// Open flags. Available in open and release.
    pub flags: c_int,
    fh_old: c_ulong,
    /// Nonzero if a write was caused by a writepage.
    pub writepage: c_int,
    bits: c_uint,
    /// File handle. May be filled in by open.
    pub fh: u64,
    /// Lock owner id. Available in locking operations and flush.
    pub lock_owner: u64,
}

impl_layout!(
    FileInfo,
    "struct fuse_file_info",
    [flags, fh_old, writepage, bits, fh, lock_owner]
);

impl FileInfo {
    /// A fresh file info carrying `flags` and nothing else.
    pub fn new(flags: c_int) -> Self {
        Self {
            flags,
            fh_old: 0,
            writepage: 0,
            bits: 0,
            fh: 0,
            lock_owner: 0,
        }
    }

    /// The access mode part of `flags` (`O_RDONLY`, `O_WRONLY` or `O_RDWR`).
    pub fn access_mode(&self) -> c_int {
        self.flags & libc::O_ACCMODE
    }

    /// The single-bit members.
    pub fn aux_flags(&self) -> FileInfoFlags {
        FileInfoFlags::from_bits_truncate(self.bits)
    }

    /// Replace the single-bit members. Padding bits are left as found.
    pub fn set_aux_flags(&mut self, flags: FileInfoFlags) {
        self.bits = (self.bits & !FileInfoFlags::all().bits()) | flags.bits();
    }

    /// Set one or more single-bit members.
    pub fn insert_aux_flags(&mut self, flags: FileInfoFlags) {
        self.set_aux_flags(self.aux_flags() | flags);
    }
}
