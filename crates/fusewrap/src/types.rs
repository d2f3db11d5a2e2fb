//! Host-side filesystem types.
//!
//! Filesystems deal in these; the adapters translate them into the native
//! `struct stat` and `struct fuse_file_info` at the boundary.

use libc::c_int;

use crate::abi::{FileInfoFlags, Stat};
use crate::ctypes::{GidT, InoT, ModeT, NlinkT, OffT, UidT};
use crate::error::{FsError, FsResult};

/// File type enumeration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FileType {
    /// Regular file.
    File,
    /// Directory.
    Directory,
}

impl FileType {
    /// Returns true if this is a regular file.
    pub fn is_file(&self) -> bool {
        matches!(self, FileType::File)
    }

    /// Returns true if this is a directory.
    pub fn is_dir(&self) -> bool {
        matches!(self, FileType::Directory)
    }

    /// The `S_IF*` type bits.
    pub fn mode_bits(&self) -> libc::mode_t {
        match self {
            FileType::File => ModeT::S_IFREG,
            FileType::Directory => ModeT::S_IFDIR,
        }
    }

    /// Decode the type bits of a mode. Unknown types read as `None`.
    pub fn from_mode(mode: ModeT) -> Option<Self> {
        match mode.file_type() {
            ModeT::S_IFREG => Some(FileType::File),
            ModeT::S_IFDIR => Some(FileType::Directory),
            _ => None,
        }
    }
}

/// File attributes (metadata).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileAttr {
    /// Size in bytes.
    pub size: u64,
    /// File type.
    pub kind: FileType,
    /// Unix permissions (e.g., 0o644).
    pub perm: u32,
    /// Number of hard links.
    pub nlink: u32,
    /// User ID. `None` leaves the field zero.
    pub uid: Option<u32>,
    /// Group ID. `None` leaves the field zero.
    pub gid: Option<u32>,
    /// Inode number. Ignored by libfuse unless `use_ino` is set.
    pub ino: Option<u64>,
}

impl FileAttr {
    /// Attributes for a regular file.
    pub fn file(size: u64, perm: u32) -> Self {
        Self {
            size,
            kind: FileType::File,
            perm,
            nlink: 1,
            uid: None,
            gid: None,
            ino: None,
        }
    }

    /// Attributes for a directory.
    pub fn directory(perm: u32) -> Self {
        Self {
            size: 0,
            kind: FileType::Directory,
            perm,
            nlink: 2, // . and ..
            uid: None,
            gid: None,
            ino: None,
        }
    }

    /// Set the owner.
    pub fn with_owner(mut self, uid: u32, gid: u32) -> Self {
        self.uid = Some(uid);
        self.gid = Some(gid);
        self
    }

    /// Returns true if this is a regular file.
    pub fn is_file(&self) -> bool {
        self.kind.is_file()
    }

    /// Returns true if this is a directory.
    pub fn is_dir(&self) -> bool {
        self.kind.is_dir()
    }

    /// Type and permission bits combined.
    pub fn mode(&self) -> ModeT {
        ModeT::new(self.kind.mode_bits() | (self.perm & 0o7777))
    }

    /// Write these attributes into a native stat.
    ///
    /// Only the named members are touched. Fails with an overflow error if
    /// a value does not fit its native field.
    pub fn write_to(&self, stat: &mut Stat) -> FsResult<()> {
        stat.st_mode = self.mode();
        stat.st_nlink = NlinkT::try_from_u64(u64::from(self.nlink))?;
        stat.st_size = OffT::try_from_u64(self.size)?;
        if let Some(uid) = self.uid {
            stat.st_uid = UidT::new(uid);
        }
        if let Some(gid) = self.gid {
            stat.st_gid = GidT::new(gid);
        }
        if let Some(ino) = self.ino {
            stat.st_ino = InoT::try_from_u64(ino)?;
        }
        Ok(())
    }

    /// Read attributes back out of a native stat.
    ///
    /// Unknown file types read as regular files. Zero owner and inode fields
    /// read as `None`.
    pub fn from_stat(stat: &Stat) -> FsResult<Self> {
        let nonzero = |v: u64| (v != 0).then_some(v);
        Ok(Self {
            size: stat.st_size.try_to_u64()?,
            kind: FileType::from_mode(stat.st_mode).unwrap_or(FileType::File),
            perm: stat.st_mode.permissions(),
            nlink: u32::try_from(stat.st_nlink.try_to_u64()?)
                .map_err(|_| FsError::Overflow(format!("nlink {}", stat.st_nlink)))?,
            uid: (stat.st_uid.get() != 0).then_some(stat.st_uid.get()),
            gid: (stat.st_gid.get() != 0).then_some(stat.st_gid.get()),
            ino: nonzero(stat.st_ino.try_to_u64()?),
        })
    }
}

/// Directory entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirEntry {
    /// Entry name (not full path).
    pub name: String,
    /// Entry type.
    pub kind: FileType,
}

impl DirEntry {
    /// Create a new directory entry.
    pub fn new(name: impl Into<String>, kind: FileType) -> Self {
        Self {
            name: name.into(),
            kind,
        }
    }

    /// Create a file entry.
    pub fn file(name: impl Into<String>) -> Self {
        Self::new(name, FileType::File)
    }

    /// Create a directory entry.
    pub fn directory(name: impl Into<String>) -> Self {
        Self::new(name, FileType::Directory)
    }
}

/// Open file flags, decoded from the `flags` word of `fuse_file_info`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OpenFlags {
    /// Read access requested.
    pub read: bool,
    /// Write access requested.
    pub write: bool,
    /// Append mode.
    pub append: bool,
    /// Truncate on open.
    pub truncate: bool,
    /// The undecoded flags word.
    pub raw: c_int,
}

impl Default for OpenFlags {
    fn default() -> Self {
        Self::from_raw(libc::O_RDONLY)
    }
}

impl OpenFlags {
    /// Decode `open(2)` flags.
    pub fn from_raw(raw: c_int) -> Self {
        let access = raw & libc::O_ACCMODE;
        Self {
            read: access == libc::O_RDONLY || access == libc::O_RDWR,
            write: access == libc::O_WRONLY || access == libc::O_RDWR,
            append: raw & libc::O_APPEND != 0,
            truncate: raw & libc::O_TRUNC != 0,
            raw,
        }
    }

    /// Read-only access.
    pub fn read() -> Self {
        Self::default()
    }

    /// The access mode is exactly `O_RDONLY`.
    pub fn is_read_only(&self) -> bool {
        self.read && !self.write
    }
}

/// A file handle as stored in `fuse_file_info::fh`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct FileHandle(pub u64);

impl FileHandle {
    /// The raw handle value.
    pub fn get(self) -> u64 {
        self.0
    }
}

impl From<u64> for FileHandle {
    fn from(fh: u64) -> Self {
        Self(fh)
    }
}

/// What a successful open hands back to libfuse.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Opened {
    /// Stored in `fh` and returned on every later call for this descriptor.
    pub fh: FileHandle,
    /// Bypass the page cache for this file.
    pub direct_io: bool,
    /// Keep cached data from a previous open.
    pub keep_cache: bool,
    /// The file is not seekable.
    pub nonseekable: bool,
}

impl Opened {
    /// An open with handle `fh` and no flags.
    pub fn with_handle(fh: impl Into<FileHandle>) -> Self {
        Self {
            fh: fh.into(),
            ..Self::default()
        }
    }

    /// Enable direct I/O.
    pub fn direct_io(mut self) -> Self {
        self.direct_io = true;
        self
    }

    /// The single-bit members to set in `fuse_file_info`.
    pub fn aux_flags(&self) -> FileInfoFlags {
        let mut flags = FileInfoFlags::empty();
        flags.set(FileInfoFlags::DIRECT_IO, self.direct_io);
        flags.set(FileInfoFlags::KEEP_CACHE, self.keep_cache);
        flags.set(FileInfoFlags::NONSEEKABLE, self.nonseekable);
        flags
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_file_type() {
        assert!(FileType::File.is_file());
        assert!(!FileType::File.is_dir());
        assert!(FileType::Directory.is_dir());
        assert_eq!(FileType::from_mode(ModeT::directory(0o755)), Some(FileType::Directory));
        assert_eq!(FileType::from_mode(ModeT::new(libc::S_IFIFO)), None);
        assert_eq!(FileType::from_mode(ModeT::new(libc::S_IFLNK | 0o777)), None);
    }

    #[test]
    fn test_file_attr_constructors() {
        let file = FileAttr::file(1024, 0o644);
        assert!(file.is_file());
        assert_eq!(file.size, 1024);
        assert_eq!(file.perm, 0o644);
        assert_eq!(file.nlink, 1);

        let dir = FileAttr::directory(0o755);
        assert!(dir.is_dir());
        assert_eq!(dir.perm, 0o755);
        assert_eq!(dir.nlink, 2);
    }

    #[test]
    fn test_write_to_stat() {
        let mut stat = Stat::zeroed();
        FileAttr::file(12, 0o444).with_owner(1000, 100).write_to(&mut stat).unwrap();
        assert_eq!(stat.st_mode.get(), libc::S_IFREG | 0o444);
        assert_eq!(stat.st_nlink.get(), 1);
        assert_eq!(stat.st_size.get(), 12);
        assert_eq!(stat.st_uid.get(), 1000);
        assert_eq!(stat.st_gid.get(), 100);
        assert_eq!(stat.st_ino.get(), 0);

        let back = FileAttr::from_stat(&stat).unwrap();
        assert_eq!(back, FileAttr::file(12, 0o444).with_owner(1000, 100));
    }

    #[test]
    fn test_oversized_file_overflows() {
        let mut stat = Stat::zeroed();
        let err = FileAttr::file(u64::MAX, 0o644).write_to(&mut stat).unwrap_err();
        assert_eq!(err.errno(), libc::EOVERFLOW);
    }

    #[test]
    fn test_dir_entry() {
        let file = DirEntry::file("test.txt");
        assert_eq!(file.name, "test.txt");
        assert!(file.kind.is_file());

        let dir = DirEntry::directory("subdir");
        assert!(dir.kind.is_dir());
    }

    #[test]
    fn test_open_flags_decode() {
        let read = OpenFlags::from_raw(libc::O_RDONLY);
        assert!(read.is_read_only());

        let rw = OpenFlags::from_raw(libc::O_RDWR | libc::O_TRUNC);
        assert!(rw.read && rw.write && rw.truncate);
        assert!(!rw.is_read_only());

        let wo = OpenFlags::from_raw(libc::O_WRONLY | libc::O_APPEND);
        assert!(!wo.read);
        assert!(wo.write && wo.append);

        let excl = OpenFlags::from_raw(libc::O_RDONLY | libc::O_CREAT | libc::O_EXCL);
        assert!(excl.is_read_only());
        assert_eq!(excl.raw & libc::O_EXCL, libc::O_EXCL);
    }

    #[test]
    fn test_opened_flags() {
        let opened = Opened::with_handle(7).direct_io();
        assert_eq!(opened.fh, FileHandle(7));
        assert_eq!(opened.aux_flags(), FileInfoFlags::DIRECT_IO);
        assert!(Opened::default().aux_flags().is_empty());
    }
}
