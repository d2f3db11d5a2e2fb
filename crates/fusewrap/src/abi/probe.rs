//! Diagnostic struct holding one of every wrapper type.
//!
//! Nothing in libfuse uses this. It exists so the startup check covers every
//! wrapper in a single aggregate, with a trailing sentinel that only lands
//! in the right place if all the widths before it are right.

use crate::ctypes::{DevT, GidT, InoT, ModeT, NlinkT, OffT, SizeT, UidT, Unsigned};

use super::layout::{Layout, impl_layout};

/// One instance of each native integer wrapper, plus a sentinel.
#[repr(C)]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CTypesProbe {
    pub dev: DevT,
    pub gid: GidT,
    pub ino: InoT,
    pub mode: ModeT,
    pub nlink: NlinkT,
    pub off: OffT,
    pub size: SizeT,
    pub uid: UidT,
    pub unsigned: Unsigned,
    /// Sentinel; must be the last member.
    pub end_of_structure: Unsigned,
}

impl_layout!(
    CTypesProbe,
    "struct ctypes_teststruct",
    [dev, gid, ino, mode, nlink, off, size, uid, unsigned, end_of_structure]
);

impl CTypesProbe {
    /// Offset of the sentinel member.
    pub fn sentinel_offset() -> usize {
        std::mem::offset_of!(CTypesProbe, end_of_structure)
    }

    /// Byte size as reported through [`Layout`].
    pub fn computed_size() -> usize {
        <Self as Layout>::size()
    }
}
