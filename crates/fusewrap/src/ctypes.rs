//! Fixed-width wrappers for the native integer types in the FUSE ABI.
//!
//! Each wrapper is `#[repr(transparent)]` over the `libc` alias for its C
//! type, so it has exactly the width and signedness the platform's headers
//! declare. Conversions from the platform integer are lossless; conversions
//! to and from the Rust-wide types (`u64`, `i64`, `usize`) are checked and
//! fail with [`IntWidthError`] instead of truncating.

use std::fmt;

use crate::error::IntWidthError;

/// A native integer type with a fixed C width and signedness.
pub trait NativeInt: Copy + fmt::Debug {
    /// The `libc` type this wraps.
    type Raw: Copy;

    /// C spelling of the type, for diagnostics.
    const C_NAME: &'static str;

    /// Width in bytes. Always equal to `sizeof` of the C type.
    const WIDTH: usize;

    /// Whether the C type is signed.
    const SIGNED: bool;

    /// The raw platform value.
    fn raw(self) -> Self::Raw;
}

macro_rules! native_int {
    ($(#[$meta:meta])* $T:ident, $raw:ty, $c_name:literal) => {
        $(#[$meta])*
        #[repr(transparent)]
        #[derive(Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
        pub struct $T($raw);

        const _: () = assert!(std::mem::size_of::<$T>() == std::mem::size_of::<$raw>());
        const _: () = assert!(std::mem::align_of::<$T>() == std::mem::align_of::<$raw>());

        impl $T {
            /// Wrap a platform value.
            pub const fn new(value: $raw) -> Self {
                Self(value)
            }

            /// The platform value.
            pub const fn get(self) -> $raw {
                self.0
            }

            /// Checked conversion from `u64`.
            pub fn try_from_u64(value: u64) -> Result<Self, IntWidthError> {
                <$raw>::try_from(value)
                    .map(Self)
                    .map_err(|_| IntWidthError::new($c_name, value as i128))
            }

            /// Checked conversion from `i64`.
            pub fn try_from_i64(value: i64) -> Result<Self, IntWidthError> {
                <$raw>::try_from(value)
                    .map(Self)
                    .map_err(|_| IntWidthError::new($c_name, value as i128))
            }

            /// Checked conversion from `usize`.
            pub fn try_from_usize(value: usize) -> Result<Self, IntWidthError> {
                <$raw>::try_from(value)
                    .map(Self)
                    .map_err(|_| IntWidthError::new($c_name, value as i128))
            }

            /// Checked conversion to `u64`. Fails for negative values.
            pub fn try_to_u64(self) -> Result<u64, IntWidthError> {
                u64::try_from(self.0).map_err(|_| IntWidthError::new($c_name, self.0 as i128))
            }

            /// Checked conversion to `i64`.
            pub fn try_to_i64(self) -> Result<i64, IntWidthError> {
                i64::try_from(self.0).map_err(|_| IntWidthError::new($c_name, self.0 as i128))
            }

            /// Checked conversion to `usize`.
            pub fn try_to_usize(self) -> Result<usize, IntWidthError> {
                usize::try_from(self.0).map_err(|_| IntWidthError::new($c_name, self.0 as i128))
            }
        }

        impl NativeInt for $T {
            type Raw = $raw;
            const C_NAME: &'static str = $c_name;
            const WIDTH: usize = std::mem::size_of::<$raw>();
            #[allow(unused_comparisons)]
            const SIGNED: bool = <$raw>::MIN < 0;

            fn raw(self) -> $raw {
                self.0
            }
        }

        impl From<$raw> for $T {
            fn from(value: $raw) -> Self {
                Self(value)
            }
        }

        impl From<$T> for $raw {
            fn from(value: $T) -> $raw {
                value.0
            }
        }

        impl fmt::Debug for $T {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}({})", $c_name, self.0)
            }
        }

        impl fmt::Display for $T {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                fmt::Display::fmt(&self.0, f)
            }
        }
    };
}

native_int!(
    /// `dev_t`: device id.
    DevT, libc::dev_t, "dev_t"
);
native_int!(
    /// `ino_t`: inode number.
    InoT, libc::ino_t, "ino_t"
);
native_int!(
    /// `mode_t`: file type and permission bits.
    ModeT, libc::mode_t, "mode_t"
);
native_int!(
    /// `nlink_t`: hard link count.
    NlinkT, libc::nlink_t, "nlink_t"
);
native_int!(
    /// `off_t`: file size or offset.
    OffT, libc::off_t, "off_t"
);
native_int!(
    /// `size_t`: buffer size.
    SizeT, libc::size_t, "size_t"
);
native_int!(
    /// `uid_t`: user id.
    UidT, libc::uid_t, "uid_t"
);
native_int!(
    /// `gid_t`: group id.
    GidT, libc::gid_t, "gid_t"
);
native_int!(
    /// `unsigned int`: the generic unsigned used throughout `fuse_conn_info`.
    Unsigned, libc::c_uint, "unsigned"
);

// ── Mode bits ───────────────────────────────────────────────────────────────

impl ModeT {
    /// Mask selecting the file type bits.
    pub const S_IFMT: libc::mode_t = libc::S_IFMT;
    /// Directory type bits.
    pub const S_IFDIR: libc::mode_t = libc::S_IFDIR;
    /// Regular file type bits.
    pub const S_IFREG: libc::mode_t = libc::S_IFREG;

    /// Mode for a directory with the given permission bits.
    pub const fn directory(perm: libc::mode_t) -> Self {
        Self(Self::S_IFDIR | (perm & 0o7777))
    }

    /// Mode for a regular file with the given permission bits.
    pub const fn regular(perm: libc::mode_t) -> Self {
        Self(Self::S_IFREG | (perm & 0o7777))
    }

    /// The file type bits alone.
    pub const fn file_type(self) -> libc::mode_t {
        self.0 & Self::S_IFMT
    }

    /// The permission bits alone (including setuid/setgid/sticky).
    pub const fn permissions(self) -> libc::mode_t {
        self.0 & 0o7777
    }

    /// True if the type bits mark a directory.
    pub const fn is_dir(self) -> bool {
        self.file_type() == Self::S_IFDIR
    }

    /// True if the type bits mark a regular file.
    pub const fn is_regular(self) -> bool {
        self.file_type() == Self::S_IFREG
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_widths_match_libc() {
        assert_eq!(DevT::WIDTH, std::mem::size_of::<libc::dev_t>());
        assert_eq!(InoT::WIDTH, std::mem::size_of::<libc::ino_t>());
        assert_eq!(OffT::WIDTH, 8);
        assert_eq!(SizeT::WIDTH, std::mem::size_of::<usize>());
        assert_eq!(UidT::WIDTH, 4);
        assert_eq!(GidT::WIDTH, 4);
        assert_eq!(ModeT::WIDTH, 4);
        assert_eq!(Unsigned::WIDTH, 4);
    }

    #[test]
    fn test_signedness() {
        assert!(OffT::SIGNED);
        assert!(!SizeT::SIGNED);
        assert!(!UidT::SIGNED);
        assert!(!GidT::SIGNED);
        assert!(!ModeT::SIGNED);
        assert!(!Unsigned::SIGNED);
    }

    #[test]
    fn test_checked_conversions() {
        assert_eq!(OffT::try_from_u64(12).unwrap().get(), 12);
        assert!(OffT::try_from_u64(u64::MAX).is_err());
        assert!(UidT::try_from_i64(-1).is_err());
        assert!(UidT::try_from_u64(u64::from(u32::MAX) + 1).is_err());
        assert!(Unsigned::try_from_usize(7).is_ok());

        assert!(OffT::new(-1).try_to_u64().is_err());
        assert_eq!(OffT::new(4096).try_to_u64().unwrap(), 4096);
        assert_eq!(SizeT::new(100).try_to_usize().unwrap(), 100);
    }

    #[test]
    fn test_width_error_names_the_c_type() {
        let err = UidT::try_from_i64(-5).unwrap_err();
        assert_eq!(err.c_type, "uid_t");
        assert_eq!(err.value, -5);
        assert!(err.to_string().contains("uid_t"));
    }

    #[test]
    fn test_mode_bits() {
        let dir = ModeT::directory(0o755);
        assert!(dir.is_dir());
        assert!(!dir.is_regular());
        assert_eq!(dir.permissions(), 0o755);

        let file = ModeT::regular(0o100444);
        assert!(file.is_regular());
        assert_eq!(file.permissions(), 0o444);
    }

    #[test]
    fn test_debug_shows_c_type() {
        assert_eq!(format!("{:?}", ModeT::new(0o40755)), format!("mode_t({})", 0o40755));
        assert_eq!(OffT::new(12).to_string(), "12");
    }
}
