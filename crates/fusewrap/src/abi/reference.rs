//! C declarations from `fuse.h` (libfuse 2.9, `FUSE_USE_VERSION 26`),
//! transcribed with raw `libc` types.
//!
//! These are the native side of the layout check: they carry no wrapper
//! types, so a wrapper with the wrong width shows up as a size or offset
//! difference against its typed mirror.

#![allow(non_camel_case_types, dead_code)]

use libc::{c_int, c_uint, c_ulong, c_void, dev_t, gid_t, ino_t, mode_t, nlink_t, off_t, pid_t, size_t, uid_t};

type cb = Option<unsafe extern "C" fn()>;

#[repr(C)]
pub(crate) struct fuse_conn_info {
    pub proto_major: c_uint,
    pub proto_minor: c_uint,
    pub async_read: c_uint,
    pub max_write: c_uint,
    pub max_readahead: c_uint,
    pub capable: c_uint,
    pub want: c_uint,
    pub max_background: c_uint,
    pub congestion_threshold: c_uint,
    pub reserved: [c_uint; 23],
}

/// The five flag bits and 27 padding bits share one `unsigned int`
/// allocation unit.
#[repr(C)]
pub(crate) struct fuse_file_info {
    pub flags: c_int,
    pub fh_old: c_ulong,
    pub writepage: c_int,
    pub bitfield: c_uint,
    pub fh: u64,
    pub lock_owner: u64,
}

#[repr(C)]
pub(crate) struct fuse_context {
    pub fuse: *mut c_void,
    pub uid: uid_t,
    pub gid: gid_t,
    pub pid: pid_t,
    pub private_data: *mut c_void,
    pub umask: mode_t,
}

/// Test struct from the native layout probe.
#[repr(C)]
pub(crate) struct ctypes_teststruct {
    pub dev_t: dev_t,
    pub gid_t: gid_t,
    pub ino_t: ino_t,
    pub mode_t: mode_t,
    pub nlink_t: nlink_t,
    pub off_t: off_t,
    pub size: size_t,
    pub uid_t: uid_t,
    pub unsign: c_uint,
    pub end_of_structure: c_uint,
}

#[repr(C)]
pub(crate) struct fuse_operations {
    pub getattr: cb,
    pub readlink: cb,
    pub getdir: cb,
    pub mknod: cb,
    pub mkdir: cb,
    pub unlink: cb,
    pub rmdir: cb,
    pub symlink: cb,
    pub rename: cb,
    pub link: cb,
    pub chmod: cb,
    pub chown: cb,
    pub truncate: cb,
    pub utime: cb,
    pub open: cb,
    pub read: cb,
    pub write: cb,
    pub statfs: cb,
    pub flush: cb,
    pub release: cb,
    pub fsync: cb,
    pub setxattr: cb,
    pub getxattr: cb,
    pub listxattr: cb,
    pub removexattr: cb,
    pub opendir: cb,
    pub readdir: cb,
    pub releasedir: cb,
    pub fsyncdir: cb,
    pub init: cb,
    pub destroy: cb,
    pub access: cb,
    pub create: cb,
    pub ftruncate: cb,
    pub fgetattr: cb,
    pub lock: cb,
    pub utimens: cb,
    pub bmap: cb,
    /// flag_nullpath_ok:1, flag_nopath:1, flag_utime_omit_ok:1, flag_reserved:29
    pub flags: c_uint,
    pub ioctl: cb,
    pub poll: cb,
    pub write_buf: cb,
    pub read_buf: cb,
    pub flock: cb,
    pub fallocate: cb,
}
