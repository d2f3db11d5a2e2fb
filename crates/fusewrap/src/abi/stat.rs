//! `struct stat` mirror.
//!
//! Only the members libfuse reads from getattr and the fill callback are
//! named. Everything after `st_size` (block size, block count, timestamps,
//! reserved words) is absorbed into `padding`, and the platform's internal
//! pad word is kept as `ignored`. The member order follows the kernel ABI
//! for the target, which differs between x86_64 and the generic layout used
//! by aarch64.

use crate::ctypes::{DevT, GidT, InoT, ModeT, NlinkT, OffT, UidT};

use super::layout::impl_layout;

/// File attributes as `struct stat`.
#[cfg(all(target_os = "linux", target_arch = "x86_64"))]
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Stat {
    /// ID of device containing file.
    pub st_dev: DevT,
    /// Inode number.
    pub st_ino: InoT,
    /// Number of hard links.
    pub st_nlink: NlinkT,
    /// File type and permissions.
    pub st_mode: ModeT,
    /// User ID of owner.
    pub st_uid: UidT,
    /// Group ID of owner.
    pub st_gid: GidT,
    /// Alignment pad.
    pub ignored: libc::c_int,
    /// Device ID (if special file).
    pub st_rdev: DevT,
    /// Total size, in bytes.
    pub st_size: OffT,
    /// `st_blksize` through the reserved tail.
    pub padding: [libc::c_long; 11],
}

#[cfg(all(target_os = "linux", target_arch = "x86_64"))]
impl_layout!(
    Stat,
    "struct stat",
    [st_dev, st_ino, st_nlink, st_mode, st_uid, st_gid, ignored, st_rdev, st_size, padding]
);

/// File attributes as `struct stat`.
#[cfg(all(target_os = "linux", target_arch = "aarch64"))]
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Stat {
    /// ID of device containing file.
    pub st_dev: DevT,
    /// Inode number.
    pub st_ino: InoT,
    /// File type and permissions.
    pub st_mode: ModeT,
    /// Number of hard links.
    pub st_nlink: NlinkT,
    /// User ID of owner.
    pub st_uid: UidT,
    /// Group ID of owner.
    pub st_gid: GidT,
    /// Device ID (if special file).
    pub st_rdev: DevT,
    /// Alignment pad.
    pub ignored: libc::c_ulong,
    /// Total size, in bytes.
    pub st_size: OffT,
    /// `st_blksize` through the reserved tail.
    pub padding: [libc::c_long; 9],
}

#[cfg(all(target_os = "linux", target_arch = "aarch64"))]
impl_layout!(
    Stat,
    "struct stat",
    [st_dev, st_ino, st_mode, st_nlink, st_uid, st_gid, st_rdev, ignored, st_size, padding]
);

#[cfg(not(all(target_os = "linux", any(target_arch = "x86_64", target_arch = "aarch64"))))]
compile_error!("struct stat is only mirrored for x86_64 and aarch64 Linux");

const _: () = assert!(std::mem::size_of::<Stat>() == std::mem::size_of::<libc::stat>());
const _: () = assert!(std::mem::align_of::<Stat>() == std::mem::align_of::<libc::stat>());

impl Stat {
    /// An all-zero stat.
    pub fn zeroed() -> Self {
        // SAFETY: every member is a plain integer or an array of them.
        unsafe { std::mem::zeroed() }
    }

    /// Reset every byte to zero, padding included.
    pub fn clear(&mut self) {
        *self = Self::zeroed();
    }
}

impl Default for Stat {
    fn default() -> Self {
        Self::zeroed()
    }
}
