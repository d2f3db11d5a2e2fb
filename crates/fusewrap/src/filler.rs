//! Directory filler wrapper.
//!
//! libfuse hands readdir a buffer and a `fuse_fill_dir_t`. A nonzero return
//! from the fill function means the buffer is full. [`DirFiller`] records
//! that and refuses to call the native function again for the rest of the
//! readdir call.

use std::ffi::{CString, OsStr};
use std::marker::PhantomData;
use std::os::unix::ffi::OsStrExt;
use std::ptr;

use libc::c_void;
use tracing::debug;

use crate::abi::Stat;
use crate::adapters::FillDirFn;
use crate::ctypes::OffT;
use crate::error::{FsError, FsResult};
use crate::types::{DirEntry, FileAttr};

/// Outcome of pushing one entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FillStatus {
    /// The entry was added.
    Accepted,
    /// The buffer is full. The entry was not added and no further entries
    /// will be.
    Full,
}

/// Typed handle on the native directory filler for one readdir call.
pub struct DirFiller<'a> {
    buf: *mut c_void,
    fill: FillDirFn,
    full: bool,
    accepted: usize,
    _call: PhantomData<&'a mut c_void>,
}

impl<'a> DirFiller<'a> {
    /// Wrap a native buffer and fill function.
    ///
    /// # Safety
    ///
    /// `buf` and `fill` must be the pair libfuse passed to readdir (or a
    /// pair with the same contract) and stay valid for `'a`.
    pub unsafe fn from_raw(buf: *mut c_void, fill: FillDirFn) -> Self {
        Self {
            buf,
            fill,
            full: false,
            accepted: 0,
            _call: PhantomData,
        }
    }

    /// Add one entry.
    ///
    /// `attr` is an optional hint; libfuse uses its type bits and, with
    /// `use_ino`, its inode number. Names containing NUL are rejected with
    /// `EINVAL`.
    pub fn push(&mut self, name: impl AsRef<OsStr>, attr: Option<&FileAttr>) -> FsResult<FillStatus> {
        if self.full {
            return Ok(FillStatus::Full);
        }

        let name = name.as_ref();
        let c_name = CString::new(name.as_bytes())
            .map_err(|_| FsError::invalid_argument(format!("entry name {name:?} contains NUL")))?;

        let stat = match attr {
            Some(attr) => {
                let mut stat = Stat::zeroed();
                attr.write_to(&mut stat)?;
                Some(stat)
            }
            None => None,
        };
        let stat_ptr = stat.as_ref().map_or(ptr::null(), |s| s as *const Stat);

        // SAFETY: buf and fill are the native pair; name and stat outlive
        // the call and the fill function copies what it keeps.
        let status = unsafe { (self.fill)(self.buf, c_name.as_ptr(), stat_ptr, OffT::new(0)) };
        if status != 0 {
            self.full = true;
            debug!(accepted = self.accepted, "directory buffer full");
            return Ok(FillStatus::Full);
        }
        self.accepted += 1;
        Ok(FillStatus::Accepted)
    }

    /// Add an entry with a type-only hint.
    pub fn push_entry(&mut self, entry: &DirEntry) -> FsResult<FillStatus> {
        let hint = FileAttr {
            size: 0,
            kind: entry.kind,
            perm: 0,
            nlink: 0,
            uid: None,
            gid: None,
            ino: None,
        };
        self.push(&entry.name, Some(&hint))
    }

    /// Add `.` and `..`.
    pub fn add_dots(&mut self) -> FsResult<FillStatus> {
        if self.push(".", None)? == FillStatus::Full {
            return Ok(FillStatus::Full);
        }
        self.push("..", None)
    }

    /// Add entries until one is refused.
    pub fn extend<'e>(&mut self, entries: impl IntoIterator<Item = &'e DirEntry>) -> FsResult<FillStatus> {
        for entry in entries {
            if self.push_entry(entry)? == FillStatus::Full {
                return Ok(FillStatus::Full);
            }
        }
        Ok(FillStatus::Accepted)
    }

    /// Whether the native filler has reported a full buffer.
    pub fn is_full(&self) -> bool {
        self.full
    }

    /// Entries accepted so far.
    pub fn accepted(&self) -> usize {
        self.accepted
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use libc::c_char;
    use std::ffi::CStr;

    struct Sink {
        names: Vec<String>,
        modes: Vec<Option<u32>>,
        calls: usize,
        capacity: usize,
    }

    impl Sink {
        fn new(capacity: usize) -> Self {
            Self {
                names: Vec::new(),
                modes: Vec::new(),
                calls: 0,
                capacity,
            }
        }
    }

    unsafe extern "C" fn sink_fill(buf: *mut c_void, name: *const c_char, stat: *const Stat, _off: OffT) -> i32 {
        let sink = unsafe { &mut *buf.cast::<Sink>() };
        sink.calls += 1;
        if sink.names.len() >= sink.capacity {
            return 1;
        }
        sink.names.push(unsafe { CStr::from_ptr(name) }.to_string_lossy().into_owned());
        sink.modes.push(unsafe { stat.as_ref() }.map(|s| s.st_mode.get()));
        0
    }

    #[test]
    fn test_push_until_full() {
        let mut sink = Sink::new(2);
        let mut filler = unsafe { DirFiller::from_raw((&mut sink as *mut Sink).cast(), sink_fill) };

        assert_eq!(filler.push("a", None).unwrap(), FillStatus::Accepted);
        assert_eq!(filler.push("b", None).unwrap(), FillStatus::Accepted);
        assert_eq!(filler.push("c", None).unwrap(), FillStatus::Full);
        assert_eq!(filler.push("d", None).unwrap(), FillStatus::Full);
        assert!(filler.is_full());
        assert_eq!(filler.accepted(), 2);
        drop(filler);

        assert_eq!(sink.names, ["a", "b"]);
        // "d" never reached the native side.
        assert_eq!(sink.calls, 3);
    }

    #[test]
    fn test_hint_carries_type_bits() {
        let mut sink = Sink::new(8);
        let mut filler = unsafe { DirFiller::from_raw((&mut sink as *mut Sink).cast(), sink_fill) };
        filler.add_dots().unwrap();
        filler
            .extend(&[DirEntry::directory("sub"), DirEntry::file("f")])
            .unwrap();
        drop(filler);

        assert_eq!(sink.names, [".", "..", "sub", "f"]);
        assert_eq!(sink.modes[0], None);
        assert_eq!(sink.modes[2], Some(libc::S_IFDIR));
        assert_eq!(sink.modes[3], Some(libc::S_IFREG));
    }

    #[test]
    fn test_nul_in_name_is_rejected() {
        let mut sink = Sink::new(8);
        let mut filler = unsafe { DirFiller::from_raw((&mut sink as *mut Sink).cast(), sink_fill) };
        let err = filler.push("bad\0name", None).unwrap_err();
        assert_eq!(err.errno(), libc::EINVAL);
        assert!(!filler.is_full());
        drop(filler);
        assert_eq!(sink.calls, 0);
    }
}
