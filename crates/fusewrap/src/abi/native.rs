//! Layout reported by C code compiled against `fuse.h`.

use std::ffi::CStr;

use libc::{c_char, size_t};

use super::layout::ReportedLayout;

#[repr(C)]
struct RawEntry {
    structure: *const c_char,
    field: *const c_char,
    value: size_t,
}

unsafe extern "C" {
    fn fusewrap_layout_entries(out: *mut *const RawEntry) -> size_t;
}

fn text(ptr: *const c_char) -> String {
    // SAFETY: every string in the layout table is a NUL-terminated literal.
    unsafe { CStr::from_ptr(ptr) }.to_string_lossy().into_owned()
}

impl ReportedLayout {
    /// Sizes and offsets from the compiled layout report.
    pub fn compiled() -> Self {
        let mut entries: *const RawEntry = std::ptr::null();
        // SAFETY: the C side writes a pointer to its static table.
        let len = unsafe { fusewrap_layout_entries(&mut entries) };
        // SAFETY: the table has `len` entries and lives for the whole program.
        let entries = unsafe { std::slice::from_raw_parts(entries, len) };

        entries.iter().fold(Self::new(), |layout, entry| {
            let structure = text(entry.structure);
            if entry.field.is_null() {
                layout.with_size(structure, entry.value)
            } else {
                layout.with_offset(structure, text(entry.field), entry.value)
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::abi::layout::{NativeLayout, verify_all};

    #[test]
    fn test_compiled_layout_covers_every_struct() {
        let native = ReportedLayout::compiled();
        for structure in [
            "struct stat",
            "struct ctypes_teststruct",
            "struct fuse_conn_info",
            "struct fuse_file_info",
            "struct fuse_context",
            "struct fuse_operations",
        ] {
            assert!(native.size_of(structure).is_some(), "{structure}");
        }
        assert_eq!(native.size_of("struct stat"), Some(std::mem::size_of::<libc::stat>()));
        assert_eq!(native.offset_of("struct fuse_file_info", "fh"), Some(24));
        assert_eq!(native.offset_of("struct fuse_operations", "ioctl"), Some(39 * 8));
    }

    #[test]
    fn test_mirrors_match_compiled_headers() {
        verify_all(&ReportedLayout::compiled()).unwrap();
    }
}
