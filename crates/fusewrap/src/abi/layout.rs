//! Declared field orders and the startup layout check.
//!
//! Every mirrored struct implements [`Layout`], which lists its fields in
//! native declaration order together with the offsets and sizes the compiler
//! actually assigned. [`verify`] holds that list against a [`NativeLayout`]
//! provider before anything is handed to libfuse.

use std::collections::BTreeMap;
use std::mem::{offset_of, size_of};

use tracing::debug;

use super::reference;
use super::{CTypesProbe, ConnectionInfo, FileInfo, Stat};
use crate::context::FuseContext;
use crate::error::{FuseError, FuseResult};
use crate::table::OperationsTable;

/// One field of a mirrored struct.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Field {
    /// Field name as declared in Rust.
    pub name: &'static str,
    /// Byte offset from the start of the struct.
    pub offset: usize,
    /// Byte size of the field.
    pub size: usize,
}

impl Field {
    /// First byte past the field.
    pub fn end(&self) -> usize {
        self.offset + self.size
    }
}

/// A struct whose layout must match a native declaration.
pub trait Layout: Sized {
    /// The C name of the mirrored declaration, e.g. `struct stat`.
    const NAME: &'static str;

    /// Fields in native declaration order.
    fn fields() -> Vec<Field>;

    /// Computed size of the Rust mirror.
    fn size() -> usize {
        size_of::<Self>()
    }
}

#[doc(hidden)]
pub fn size_of_pointee<T>(_: *const T) -> usize {
    size_of::<T>()
}

/// Implement [`Layout`] from a field list.
///
/// The list is the declared native order. Offsets and sizes are taken from
/// the compiler, so a list that disagrees with the struct definition is
/// caught by [`verify`].
macro_rules! impl_layout {
    ($T:ty, $c_name:literal, [$($field:ident),+ $(,)?]) => {
        impl $crate::abi::layout::Layout for $T {
            const NAME: &'static str = $c_name;

            fn fields() -> Vec<$crate::abi::layout::Field> {
                let probe = std::mem::MaybeUninit::<$T>::uninit();
                let base = probe.as_ptr();
                vec![$(
                    $crate::abi::layout::Field {
                        name: stringify!($field),
                        offset: std::mem::offset_of!($T, $field),
                        // SAFETY: only the address is computed; nothing is read.
                        size: $crate::abi::layout::size_of_pointee(unsafe {
                            std::ptr::addr_of!((*base).$field)
                        }),
                    }
                ),+]
            }
        }
    };
}

pub(crate) use impl_layout;

/// Source of native sizes and offsets.
///
/// Structures are identified by their C name ([`Layout::NAME`]); fields by
/// their C member name.
pub trait NativeLayout {
    /// `sizeof` the named structure, if known.
    fn size_of(&self, structure: &str) -> Option<usize>;

    /// `offsetof` the named member, if known.
    fn offset_of(&self, _structure: &str, _field: &str) -> Option<usize> {
        None
    }
}

/// Native layout as declared by the system headers.
///
/// `struct stat` comes from `libc::stat`. The FUSE structs come from C
/// declarations transcribed from `fuse.h` (libfuse 2.9, API version 26)
/// using raw `libc` types only.
///
/// Used by [`mount`](crate::mount) unless the `native-layout` feature
/// supplies sizes compiled from the real headers.
#[derive(Debug, Clone, Copy, Default)]
pub struct HeaderLayout;

impl NativeLayout for HeaderLayout {
    fn size_of(&self, structure: &str) -> Option<usize> {
        match structure {
            "struct stat" => Some(size_of::<libc::stat>()),
            "struct fuse_conn_info" => Some(size_of::<reference::fuse_conn_info>()),
            "struct fuse_file_info" => Some(size_of::<reference::fuse_file_info>()),
            "struct fuse_operations" => Some(size_of::<reference::fuse_operations>()),
            "struct fuse_context" => Some(size_of::<reference::fuse_context>()),
            "struct ctypes_teststruct" => Some(size_of::<reference::ctypes_teststruct>()),
            _ => None,
        }
    }

    fn offset_of(&self, structure: &str, field: &str) -> Option<usize> {
        match (structure, field) {
            ("struct stat", "st_dev") => Some(offset_of!(libc::stat, st_dev)),
            ("struct stat", "st_ino") => Some(offset_of!(libc::stat, st_ino)),
            ("struct stat", "st_nlink") => Some(offset_of!(libc::stat, st_nlink)),
            ("struct stat", "st_mode") => Some(offset_of!(libc::stat, st_mode)),
            ("struct stat", "st_uid") => Some(offset_of!(libc::stat, st_uid)),
            ("struct stat", "st_gid") => Some(offset_of!(libc::stat, st_gid)),
            ("struct stat", "st_rdev") => Some(offset_of!(libc::stat, st_rdev)),
            ("struct stat", "st_size") => Some(offset_of!(libc::stat, st_size)),
            ("struct fuse_file_info", "fh") => Some(offset_of!(reference::fuse_file_info, fh)),
            ("struct fuse_file_info", "lock_owner") => {
                Some(offset_of!(reference::fuse_file_info, lock_owner))
            }
            ("struct fuse_context", "private_data") => {
                Some(offset_of!(reference::fuse_context, private_data))
            }
            _ => None,
        }
    }
}

/// Native layout from an explicit table, e.g. sizes compiled from the C headers.
#[derive(Debug, Clone, Default)]
pub struct ReportedLayout {
    sizes: BTreeMap<String, usize>,
    offsets: BTreeMap<(String, String), usize>,
}

impl ReportedLayout {
    /// Create an empty report.
    pub fn new() -> Self {
        Self::default()
    }

    /// Record `sizeof(structure)`.
    pub fn with_size(mut self, structure: impl Into<String>, size: usize) -> Self {
        self.sizes.insert(structure.into(), size);
        self
    }

    /// Record `offsetof(structure, field)`.
    pub fn with_offset(
        mut self,
        structure: impl Into<String>,
        field: impl Into<String>,
        offset: usize,
    ) -> Self {
        self.offsets.insert((structure.into(), field.into()), offset);
        self
    }
}

impl NativeLayout for ReportedLayout {
    fn size_of(&self, structure: &str) -> Option<usize> {
        self.sizes.get(structure).copied()
    }

    fn offset_of(&self, structure: &str, field: &str) -> Option<usize> {
        self.offsets
            .get(&(structure.to_string(), field.to_string()))
            .copied()
    }
}

/// Check one struct's declared order and size against the native layout.
pub fn verify<T: Layout>(native: &dyn NativeLayout) -> FuseResult<()> {
    let fields = T::fields();
    let size = T::size();

    let mut end = 0;
    for field in &fields {
        if field.offset < end {
            return Err(FuseError::abi_mismatch(
                T::NAME,
                format!(
                    "field {} at offset {} is out of declared order (previous field ends at {})",
                    field.name, field.offset, end
                ),
            ));
        }
        end = field.end();
    }
    if end > size {
        return Err(FuseError::abi_mismatch(
            T::NAME,
            format!("fields end at {end}, past the struct size {size}"),
        ));
    }

    let native_size = native.size_of(T::NAME).ok_or_else(|| {
        FuseError::abi_mismatch(T::NAME, "native side reports no size for this structure")
    })?;
    if native_size != size {
        return Err(FuseError::abi_mismatch(
            T::NAME,
            format!("computed size {size} but native size is {native_size}"),
        ));
    }

    for field in &fields {
        if let Some(offset) = native.offset_of(T::NAME, field.name) {
            if offset != field.offset {
                return Err(FuseError::abi_mismatch(
                    T::NAME,
                    format!(
                        "field {} at offset {} but native offset is {}",
                        field.name, field.offset, offset
                    ),
                ));
            }
        }
    }

    debug!(structure = T::NAME, size, fields = fields.len(), "layout verified");
    Ok(())
}

/// Check every mirrored struct. Run once at startup, before mounting.
pub fn verify_all(native: &dyn NativeLayout) -> FuseResult<()> {
    verify::<ConnectionInfo>(native)?;
    verify::<FileInfo>(native)?;
    verify::<Stat>(native)?;
    verify::<CTypesProbe>(native)?;
    verify::<FuseContext>(native)?;
    verify::<OperationsTable>(native)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_headers_agree_with_mirrors() {
        verify_all(&HeaderLayout).unwrap();
    }

    #[test]
    fn test_known_sizes_on_64_bit_linux() {
        assert_eq!(ConnectionInfo::size(), 128);
        assert_eq!(FileInfo::size(), 40);
        assert_eq!(OperationsTable::size(), 45 * size_of::<usize>());
        assert_eq!(FuseContext::size(), 40);
    }

    #[test]
    fn test_size_mismatch_is_reported() {
        let native = ReportedLayout::new().with_size("struct stat", 88);
        let err = verify::<Stat>(&native).unwrap_err();
        match err {
            FuseError::AbiMismatch { structure, detail } => {
                assert_eq!(structure, "struct stat");
                assert!(detail.contains("88"), "{detail}");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_missing_native_size_is_reported() {
        let err = verify::<FileInfo>(&ReportedLayout::new()).unwrap_err();
        assert!(matches!(err, FuseError::AbiMismatch { .. }));
    }

    #[test]
    fn test_offset_mismatch_is_reported() {
        let native = ReportedLayout::new()
            .with_size("struct fuse_file_info", FileInfo::size())
            .with_offset("struct fuse_file_info", "fh", 8);
        let err = verify::<FileInfo>(&native).unwrap_err();
        assert!(err.to_string().contains("fh"), "{err}");
    }

    #[test]
    fn test_declared_order_is_ascending() {
        let fields = ConnectionInfo::fields();
        let names: Vec<_> = fields.iter().map(|f| f.name).collect();
        assert_eq!(
            names,
            [
                "proto_major",
                "proto_minor",
                "async_read",
                "max_write",
                "max_readahead",
                "capable",
                "want",
                "max_background",
                "congestion_threshold",
                "reserved",
            ]
        );
        assert!(fields.windows(2).all(|w| w[0].end() <= w[1].offset));
        assert_eq!(fields.last().unwrap().size, 23 * 4);
    }
}
