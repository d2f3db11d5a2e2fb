//! # fusewrap
//!
//! ABI-exact bindings for writing libfuse 2.x filesystems in Rust.
//!
//! The crate mirrors the native structures libfuse exchanges with a
//! filesystem (`struct stat`, `fuse_file_info`, `fuse_conn_info`,
//! `fuse_context`, `fuse_operations`), checks their layout against the
//! platform before mounting, and routes native callbacks to a
//! [`Filesystem`] implementation.
//!
//! - [`ctypes`]: native integer widths as distinct types
//! - [`abi`]: struct mirrors and the layout check
//! - [`OperationsTable`]: the callback table handed to libfuse
//! - [`FuseLibrary`]: libfuse loaded at runtime
//! - [`mount`]: argv assembly and the main loop
//!
//! ```no_run
//! use std::path::Path;
//! use fusewrap::{FileAttr, Filesystem, FsError, FsResult, FuseLibrary, MountArgs, Operation};
//!
//! struct Empty;
//!
//! impl Filesystem for Empty {
//!     const OPERATIONS: &'static [Operation] = &[Operation::Getattr];
//!
//!     fn getattr(&self, path: &Path) -> FsResult<FileAttr> {
//!         if path == Path::new("/") {
//!             Ok(FileAttr::directory(0o755))
//!         } else {
//!             Err(FsError::not_found(path.display().to_string()))
//!         }
//!     }
//! }
//!
//! let library = FuseLibrary::open()?;
//! let args = MountArgs::new("empty").mountpoint("/tmp/empty").foreground(true);
//! let status = fusewrap::mount(&library, &args, Empty)?;
//! # Ok::<(), fusewrap::FuseError>(())
//! ```

pub mod abi;
mod adapters;
pub mod context;
pub mod ctypes;
pub mod error;
pub mod filler;
#[cfg(any(test, feature = "test-harness"))]
pub mod harness;
pub mod library;
pub mod mount;
pub mod ops;
mod session;
pub mod table;
pub mod types;

pub use abi::{Capabilities, ConnectionInfo, FileInfo, FileInfoFlags, Stat};
pub use adapters::{DestroyFn, FillDirFn, GetattrFn, InitFn, OpenFn, RawCallback, ReadFn, ReaddirFn, ReleaseFn};
pub use context::{Caller, caller};
pub use error::{FsError, FsResult, FuseError, FuseResult, IntWidthError};
pub use filler::{DirFiller, FillStatus};
pub use library::FuseLibrary;
pub use mount::{MountArgs, mount};
pub use ops::Filesystem;
pub use table::{Operation, OperationsTable};
pub use types::{DirEntry, FileAttr, FileHandle, FileType, OpenFlags, Opened};
