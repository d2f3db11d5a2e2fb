//! The `struct fuse_operations` table.
//!
//! libfuse reads this table by raw offset, so the member order below is the
//! ABI. A slot left as `None` is a null pointer, which libfuse treats as
//! "not implemented" and answers with its own default (usually `ENOSYS`).
//! Only the operations in [`Operation::is_typed`] have adapters; every other
//! slot is declared with an untyped pointer and is always null.

use libc::c_uint;
use strum::{Display, EnumCount, EnumIter, IntoEnumIterator, IntoStaticStr};
use tracing::debug;

use crate::abi::layout::impl_layout;
use crate::adapters::{self, DestroyFn, GetattrFn, InitFn, OpenFn, RawCallback, ReadFn, ReaddirFn, ReleaseFn};
use crate::error::{FuseError, FuseResult};
use crate::ops::Filesystem;

/// Every slot in `struct fuse_operations`, in declaration order.
///
/// The `flags` bitfield word between `bmap` and `ioctl` is not an operation
/// and has no variant.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Display, EnumIter, EnumCount, IntoStaticStr,
)]
#[strum(serialize_all = "snake_case")]
pub enum Operation {
    Getattr,
    Readlink,
    Getdir,
    Mknod,
    Mkdir,
    Unlink,
    Rmdir,
    Symlink,
    Rename,
    Link,
    Chmod,
    Chown,
    Truncate,
    Utime,
    Open,
    Read,
    Write,
    Statfs,
    Flush,
    Release,
    Fsync,
    Setxattr,
    Getxattr,
    Listxattr,
    Removexattr,
    Opendir,
    Readdir,
    Releasedir,
    Fsyncdir,
    Init,
    Destroy,
    Access,
    Create,
    Ftruncate,
    Fgetattr,
    Lock,
    Utimens,
    Bmap,
    Ioctl,
    Poll,
    WriteBuf,
    ReadBuf,
    Flock,
    Fallocate,
}

impl Operation {
    /// Whether this crate has an adapter for the operation.
    pub fn is_typed(self) -> bool {
        matches!(
            self,
            Operation::Getattr
                | Operation::Open
                | Operation::Read
                | Operation::Release
                | Operation::Readdir
                | Operation::Init
                | Operation::Destroy
        )
    }

    /// Byte offset of this operation's slot in [`OperationsTable`].
    pub fn offset(self) -> usize {
        use std::mem::offset_of;
        type T = OperationsTable;
        match self {
            Operation::Getattr => offset_of!(T, getattr),
            Operation::Readlink => offset_of!(T, readlink),
            Operation::Getdir => offset_of!(T, getdir),
            Operation::Mknod => offset_of!(T, mknod),
            Operation::Mkdir => offset_of!(T, mkdir),
            Operation::Unlink => offset_of!(T, unlink),
            Operation::Rmdir => offset_of!(T, rmdir),
            Operation::Symlink => offset_of!(T, symlink),
            Operation::Rename => offset_of!(T, rename),
            Operation::Link => offset_of!(T, link),
            Operation::Chmod => offset_of!(T, chmod),
            Operation::Chown => offset_of!(T, chown),
            Operation::Truncate => offset_of!(T, truncate),
            Operation::Utime => offset_of!(T, utime),
            Operation::Open => offset_of!(T, open),
            Operation::Read => offset_of!(T, read),
            Operation::Write => offset_of!(T, write),
            Operation::Statfs => offset_of!(T, statfs),
            Operation::Flush => offset_of!(T, flush),
            Operation::Release => offset_of!(T, release),
            Operation::Fsync => offset_of!(T, fsync),
            Operation::Setxattr => offset_of!(T, setxattr),
            Operation::Getxattr => offset_of!(T, getxattr),
            Operation::Listxattr => offset_of!(T, listxattr),
            Operation::Removexattr => offset_of!(T, removexattr),
            Operation::Opendir => offset_of!(T, opendir),
            Operation::Readdir => offset_of!(T, readdir),
            Operation::Releasedir => offset_of!(T, releasedir),
            Operation::Fsyncdir => offset_of!(T, fsyncdir),
            Operation::Init => offset_of!(T, init),
            Operation::Destroy => offset_of!(T, destroy),
            Operation::Access => offset_of!(T, access),
            Operation::Create => offset_of!(T, create),
            Operation::Ftruncate => offset_of!(T, ftruncate),
            Operation::Fgetattr => offset_of!(T, fgetattr),
            Operation::Lock => offset_of!(T, lock),
            Operation::Utimens => offset_of!(T, utimens),
            Operation::Bmap => offset_of!(T, bmap),
            Operation::Ioctl => offset_of!(T, ioctl),
            Operation::Poll => offset_of!(T, poll),
            Operation::WriteBuf => offset_of!(T, write_buf),
            Operation::ReadBuf => offset_of!(T, read_buf),
            Operation::Flock => offset_of!(T, flock),
            Operation::Fallocate => offset_of!(T, fallocate),
        }
    }
}

/// Mirror of `struct fuse_operations` (libfuse 2.9, API version 26).
///
/// Built once before mounting and never changed afterwards; libfuse keeps
/// its own copy of the first `op_size` bytes.
#[repr(C)]
#[derive(Debug, Clone, Copy, Default)]
pub struct OperationsTable {
    pub getattr: Option<GetattrFn>,
    pub readlink: Option<RawCallback>,
    pub getdir: Option<RawCallback>,
    pub mknod: Option<RawCallback>,
    pub mkdir: Option<RawCallback>,
    pub unlink: Option<RawCallback>,
    pub rmdir: Option<RawCallback>,
    pub symlink: Option<RawCallback>,
    pub rename: Option<RawCallback>,
    pub link: Option<RawCallback>,
    pub chmod: Option<RawCallback>,
    pub chown: Option<RawCallback>,
    pub truncate: Option<RawCallback>,
    pub utime: Option<RawCallback>,
    pub open: Option<OpenFn>,
    pub read: Option<ReadFn>,
    pub write: Option<RawCallback>,
    pub statfs: Option<RawCallback>,
    pub flush: Option<RawCallback>,
    pub release: Option<ReleaseFn>,
    pub fsync: Option<RawCallback>,
    pub setxattr: Option<RawCallback>,
    pub getxattr: Option<RawCallback>,
    pub listxattr: Option<RawCallback>,
    pub removexattr: Option<RawCallback>,
    pub opendir: Option<RawCallback>,
    pub readdir: Option<ReaddirFn>,
    pub releasedir: Option<RawCallback>,
    pub fsyncdir: Option<RawCallback>,
    pub init: Option<InitFn>,
    pub destroy: Option<DestroyFn>,
    pub access: Option<RawCallback>,
    pub create: Option<RawCallback>,
    pub ftruncate: Option<RawCallback>,
    pub fgetattr: Option<RawCallback>,
    pub lock: Option<RawCallback>,
    pub utimens: Option<RawCallback>,
    pub bmap: Option<RawCallback>,
    /// `flag_nullpath_ok`, `flag_nopath`, `flag_utime_omit_ok` and 29
    /// reserved bits. All zero: every adapter wants a path.
    flags: c_uint,
    pub ioctl: Option<RawCallback>,
    pub poll: Option<RawCallback>,
    pub write_buf: Option<RawCallback>,
    pub read_buf: Option<RawCallback>,
    pub flock: Option<RawCallback>,
    pub fallocate: Option<RawCallback>,
}

impl_layout!(
    OperationsTable,
    "struct fuse_operations",
    [
        getattr, readlink, getdir, mknod, mkdir, unlink, rmdir, symlink, rename, link, chmod,
        chown, truncate, utime, open, read, write, statfs, flush, release, fsync, setxattr,
        getxattr, listxattr, removexattr, opendir, readdir, releasedir, fsyncdir, init, destroy,
        access, create, ftruncate, fgetattr, lock, utimens, bmap, flags, ioctl, poll, write_buf,
        read_buf, flock, fallocate,
    ]
);

impl OperationsTable {
    /// A table with every slot null.
    pub fn empty() -> Self {
        Self::default()
    }

    /// The table for `F`: one adapter per entry in [`Filesystem::OPERATIONS`],
    /// every other slot null.
    pub fn for_filesystem<F: Filesystem>() -> FuseResult<Self> {
        let mut table = Self::empty();
        for op in F::OPERATIONS {
            table.install::<F>(*op)?;
        }
        debug!(installed = ?table.installed(), "operations table built");
        Ok(table)
    }

    fn install<F: Filesystem>(&mut self, op: Operation) -> FuseResult<()> {
        match op {
            Operation::Getattr => self.getattr = Some(adapters::getattr::<F>),
            Operation::Open => self.open = Some(adapters::open::<F>),
            Operation::Read => self.read = Some(adapters::read::<F>),
            Operation::Release => self.release = Some(adapters::release::<F>),
            Operation::Readdir => self.readdir = Some(adapters::readdir::<F>),
            Operation::Init => self.init = Some(adapters::init::<F>),
            Operation::Destroy => self.destroy = Some(adapters::destroy::<F>),
            other => return Err(FuseError::UnsupportedOperation(other)),
        }
        Ok(())
    }

    /// Whether the slot for `op` is populated.
    pub fn is_set(&self, op: Operation) -> bool {
        match op {
            Operation::Getattr => self.getattr.is_some(),
            Operation::Readlink => self.readlink.is_some(),
            Operation::Getdir => self.getdir.is_some(),
            Operation::Mknod => self.mknod.is_some(),
            Operation::Mkdir => self.mkdir.is_some(),
            Operation::Unlink => self.unlink.is_some(),
            Operation::Rmdir => self.rmdir.is_some(),
            Operation::Symlink => self.symlink.is_some(),
            Operation::Rename => self.rename.is_some(),
            Operation::Link => self.link.is_some(),
            Operation::Chmod => self.chmod.is_some(),
            Operation::Chown => self.chown.is_some(),
            Operation::Truncate => self.truncate.is_some(),
            Operation::Utime => self.utime.is_some(),
            Operation::Open => self.open.is_some(),
            Operation::Read => self.read.is_some(),
            Operation::Write => self.write.is_some(),
            Operation::Statfs => self.statfs.is_some(),
            Operation::Flush => self.flush.is_some(),
            Operation::Release => self.release.is_some(),
            Operation::Fsync => self.fsync.is_some(),
            Operation::Setxattr => self.setxattr.is_some(),
            Operation::Getxattr => self.getxattr.is_some(),
            Operation::Listxattr => self.listxattr.is_some(),
            Operation::Removexattr => self.removexattr.is_some(),
            Operation::Opendir => self.opendir.is_some(),
            Operation::Readdir => self.readdir.is_some(),
            Operation::Releasedir => self.releasedir.is_some(),
            Operation::Fsyncdir => self.fsyncdir.is_some(),
            Operation::Init => self.init.is_some(),
            Operation::Destroy => self.destroy.is_some(),
            Operation::Access => self.access.is_some(),
            Operation::Create => self.create.is_some(),
            Operation::Ftruncate => self.ftruncate.is_some(),
            Operation::Fgetattr => self.fgetattr.is_some(),
            Operation::Lock => self.lock.is_some(),
            Operation::Utimens => self.utimens.is_some(),
            Operation::Bmap => self.bmap.is_some(),
            Operation::Ioctl => self.ioctl.is_some(),
            Operation::Poll => self.poll.is_some(),
            Operation::WriteBuf => self.write_buf.is_some(),
            Operation::ReadBuf => self.read_buf.is_some(),
            Operation::Flock => self.flock.is_some(),
            Operation::Fallocate => self.fallocate.is_some(),
        }
    }

    /// Populated slots, in table order.
    pub fn installed(&self) -> Vec<Operation> {
        Operation::iter().filter(|op| self.is_set(*op)).collect()
    }

    /// The `op_size` handed to `fuse_main_real`.
    pub fn byte_size() -> usize {
        std::mem::size_of::<Self>()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::abi::reference::fuse_operations;
    use crate::abi::Layout;
    use crate::error::FsResult;
    use crate::types::FileAttr;
    use std::path::Path;

    struct GetattrOnly;

    impl Filesystem for GetattrOnly {
        const OPERATIONS: &'static [Operation] = &[Operation::Getattr];

        fn getattr(&self, _path: &Path) -> FsResult<FileAttr> {
            Ok(FileAttr::directory(0o755))
        }
    }

    struct WantsWrite;

    impl Filesystem for WantsWrite {
        const OPERATIONS: &'static [Operation] = &[Operation::Getattr, Operation::Write];
    }

    #[test]
    fn test_slot_offsets_follow_declaration_order() {
        let ptr = std::mem::size_of::<usize>();
        let offsets: Vec<_> = Operation::iter().map(Operation::offset).collect();
        assert_eq!(offsets.len(), Operation::COUNT);
        assert!(offsets.windows(2).all(|w| w[0] < w[1]));

        assert_eq!(Operation::Getattr.offset(), 0);
        assert_eq!(Operation::Bmap.offset(), 37 * ptr);
        // The flags word sits between bmap and ioctl.
        assert_eq!(Operation::Ioctl.offset(), 39 * ptr);
        assert_eq!(Operation::Fallocate.offset(), 44 * ptr);
    }

    #[test]
    fn test_offsets_match_header_declaration() {
        use std::mem::offset_of;
        assert_eq!(Operation::Open.offset(), offset_of!(fuse_operations, open));
        assert_eq!(Operation::Readdir.offset(), offset_of!(fuse_operations, readdir));
        assert_eq!(Operation::Init.offset(), offset_of!(fuse_operations, init));
        assert_eq!(Operation::Destroy.offset(), offset_of!(fuse_operations, destroy));
        assert_eq!(Operation::Flock.offset(), offset_of!(fuse_operations, flock));
        assert_eq!(OperationsTable::byte_size(), std::mem::size_of::<fuse_operations>());
    }

    #[test]
    fn test_layout_names_match_operations() {
        let names: Vec<_> = OperationsTable::fields()
            .into_iter()
            .map(|f| f.name)
            .filter(|name| *name != "flags")
            .collect();
        let ops: Vec<&'static str> = Operation::iter().map(Into::into).collect();
        assert_eq!(names, ops);
    }

    #[test]
    fn test_empty_table_is_all_null() {
        let table = OperationsTable::empty();
        assert!(table.installed().is_empty());
        assert_eq!(table.flags, 0);
    }

    #[test]
    fn test_only_declared_slots_are_set() {
        let table = OperationsTable::for_filesystem::<GetattrOnly>().unwrap();
        assert_eq!(table.installed(), vec![Operation::Getattr]);
        assert!(table.open.is_none());
        assert!(table.readdir.is_none());
    }

    #[test]
    fn test_untyped_operation_is_rejected() {
        let err = OperationsTable::for_filesystem::<WantsWrite>().unwrap_err();
        assert!(matches!(err, FuseError::UnsupportedOperation(Operation::Write)));
        assert_eq!(err.to_string(), "operation write has no adapter");
    }

    #[test]
    fn test_operation_names() {
        assert_eq!(Operation::WriteBuf.to_string(), "write_buf");
        assert_eq!(Operation::Getattr.to_string(), "getattr");
        assert!(Operation::Readdir.is_typed());
        assert!(!Operation::Ioctl.is_typed());
    }
}
