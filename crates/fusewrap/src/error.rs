//! Error types.
//!
//! Two families live here. [`FuseError`] covers binding setup: loading the
//! library, checking layouts, building the table. It never crosses the
//! foreign boundary. [`FsError`] is what filesystem operations return; the
//! adapters turn it into a negated errno before handing control back to
//! native code.

use std::io;

use libc::c_int;
use thiserror::Error;

use crate::table::Operation;

/// A checked integer conversion would have lost precision.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("{value} does not fit in {c_type}")]
pub struct IntWidthError {
    /// C spelling of the target (or source) type.
    pub c_type: &'static str,
    /// The value that did not fit.
    pub value: i128,
}

impl IntWidthError {
    pub(crate) fn new(c_type: &'static str, value: i128) -> Self {
        Self { c_type, value }
    }
}

/// Binding-layer error type.
#[derive(Debug, Error)]
pub enum FuseError {
    /// No candidate shared library could be loaded.
    #[error("could not load libfuse (tried {tried}): {reason}")]
    LibraryNotFound {
        /// Library names that were attempted.
        tried: String,
        /// Last `dlerror` message.
        reason: String,
    },

    /// The library loaded but a required symbol is absent.
    #[error("symbol {symbol} not found in {library}")]
    MissingSymbol {
        /// Symbol name.
        symbol: &'static str,
        /// Library it was looked up in.
        library: String,
    },

    /// A mirrored struct disagrees with the native layout.
    #[error("ABI mismatch in {structure}: {detail}")]
    AbiMismatch {
        /// Struct name.
        structure: &'static str,
        /// What disagreed.
        detail: String,
    },

    /// The filesystem declared an operation the binding has no adapter for.
    #[error("operation {0} has no adapter")]
    UnsupportedOperation(Operation),

    /// An argument could not be handed to native code.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// An integer did not fit its native width.
    #[error(transparent)]
    IntWidth(#[from] IntWidthError),
}

impl FuseError {
    /// Create an AbiMismatch error.
    pub fn abi_mismatch(structure: &'static str, detail: impl Into<String>) -> Self {
        Self::AbiMismatch {
            structure,
            detail: detail.into(),
        }
    }

    /// Create an InvalidArgument error.
    pub fn invalid_argument(msg: impl Into<String>) -> Self {
        Self::InvalidArgument(msg.into())
    }
}

/// Binding-layer result type.
pub type FuseResult<T> = Result<T, FuseError>;

/// Filesystem operation error.
///
/// Every variant maps to one errno via [`FsError::errno`].
#[derive(Debug, Error)]
pub enum FsError {
    /// File or directory not found.
    #[error("not found: {0}")]
    NotFound(String),

    /// Access mode not permitted.
    #[error("permission denied: {0}")]
    PermissionDenied(String),

    /// Expected a directory.
    #[error("not a directory: {0}")]
    NotADirectory(String),

    /// Expected a file.
    #[error("is a directory: {0}")]
    IsADirectory(String),

    /// Malformed argument from the native side.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// The filesystem does not implement this operation.
    #[error("operation not supported: {0}")]
    Unsupported(Operation),

    /// A value does not fit the native field it must be written to.
    #[error("value too large: {0}")]
    Overflow(String),

    /// The file handle is not one this filesystem handed out.
    #[error("bad file handle: {0}")]
    BadHandle(u64),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// An explicit errno (positive).
    #[error("errno {0}")]
    Errno(c_int),

    /// Other error.
    #[error("{0}")]
    Other(String),
}

impl FsError {
    /// Create a NotFound error.
    pub fn not_found(path: impl Into<String>) -> Self {
        Self::NotFound(path.into())
    }

    /// Create a PermissionDenied error.
    pub fn permission_denied(path: impl Into<String>) -> Self {
        Self::PermissionDenied(path.into())
    }

    /// Create a NotADirectory error.
    pub fn not_a_directory(path: impl Into<String>) -> Self {
        Self::NotADirectory(path.into())
    }

    /// Create an IsADirectory error.
    pub fn is_a_directory(path: impl Into<String>) -> Self {
        Self::IsADirectory(path.into())
    }

    /// Create an InvalidArgument error.
    pub fn invalid_argument(msg: impl Into<String>) -> Self {
        Self::InvalidArgument(msg.into())
    }

    /// Create an Other error.
    pub fn other(msg: impl Into<String>) -> Self {
        Self::Other(msg.into())
    }

    /// The positive errno for this error.
    pub fn errno(&self) -> c_int {
        match self {
            FsError::NotFound(_) => libc::ENOENT,
            FsError::PermissionDenied(_) => libc::EACCES,
            FsError::NotADirectory(_) => libc::ENOTDIR,
            FsError::IsADirectory(_) => libc::EISDIR,
            FsError::InvalidArgument(_) => libc::EINVAL,
            FsError::Unsupported(_) => libc::ENOSYS,
            FsError::Overflow(_) => libc::EOVERFLOW,
            FsError::BadHandle(_) => libc::EBADF,
            FsError::Io(e) => e.raw_os_error().filter(|code| *code > 0).unwrap_or(libc::EIO),
            FsError::Errno(code) if *code > 0 => *code,
            FsError::Errno(code) if *code < 0 => code.saturating_neg(),
            FsError::Errno(_) => libc::EIO,
            FsError::Other(_) => libc::EIO,
        }
    }

    /// The value an adapter hands back to native code: `-errno`.
    pub fn to_status(&self) -> c_int {
        -self.errno()
    }
}

impl From<IntWidthError> for FsError {
    fn from(e: IntWidthError) -> Self {
        FsError::Overflow(e.to_string())
    }
}

/// Filesystem operation result type.
pub type FsResult<T> = Result<T, FsError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_errno_surface() {
        assert_eq!(FsError::not_found("/x").errno(), 2);
        assert_eq!(FsError::other("boom").errno(), 5);
        assert_eq!(FsError::permission_denied("/x").errno(), 13);
        assert_eq!(FsError::not_a_directory("/x").errno(), 20);
        assert_eq!(FsError::is_a_directory("/x").errno(), 21);
    }

    #[test]
    fn test_status_is_negated() {
        assert_eq!(FsError::not_found("/missing").to_status(), -2);
        assert_eq!(FsError::Unsupported(Operation::Write).to_status(), -libc::ENOSYS);
    }

    #[test]
    fn test_explicit_errno_is_normalized() {
        assert_eq!(FsError::Errno(libc::EBUSY).errno(), libc::EBUSY);
        assert_eq!(FsError::Errno(-libc::EBUSY).errno(), libc::EBUSY);
        assert_eq!(FsError::Errno(0).errno(), libc::EIO);
    }

    #[test]
    fn test_io_error_keeps_os_code() {
        let e = FsError::from(io::Error::from_raw_os_error(libc::ENOSPC));
        assert_eq!(e.errno(), libc::ENOSPC);

        let e = FsError::from(io::Error::other("no code"));
        assert_eq!(e.errno(), libc::EIO);
    }

    #[test]
    fn test_width_error_becomes_overflow() {
        let e = FsError::from(IntWidthError::new("off_t", i128::from(u64::MAX)));
        assert_eq!(e.errno(), libc::EOVERFLOW);
    }
}
