//! Loading libfuse at runtime.
//!
//! The library is opened with `dlopen` rather than linked, so a binary built
//! against this crate starts (and its tests run) on machines without
//! libfuse. Missing library or symbols surface as [`FuseError`] values when
//! a mount is attempted.

use std::ffi::{CStr, CString};
use std::ptr::NonNull;

use libc::{c_char, c_int, c_void};
use tracing::{debug, info};

use crate::context::{self, GetContextFn};
use crate::ctypes::SizeT;
use crate::error::{FuseError, FuseResult};
use crate::table::OperationsTable;

/// Sonames tried by [`FuseLibrary::open`], in order.
pub const LIBRARY_CANDIDATES: &[&str] = &["libfuse.so.2", "libfuse.so"];

/// Signature of `fuse_main_real`.
pub type FuseMainRealFn = unsafe extern "C" fn(
    argc: c_int,
    argv: *mut *mut c_char,
    op: *const OperationsTable,
    op_size: SizeT,
    user_data: *mut c_void,
) -> c_int;

/// An open handle on libfuse with its entry points resolved.
///
/// Opening installs `fuse_get_context` as the context resolver; dropping
/// the handle removes it again and closes the library.
pub struct FuseLibrary {
    handle: NonNull<c_void>,
    name: String,
    main_real: FuseMainRealFn,
    get_context: GetContextFn,
}

// SAFETY: the handle is only passed to dlclose, and the resolved symbols
// are plain function pointers; libfuse's entry points are thread-safe.
unsafe impl Send for FuseLibrary {}
// SAFETY: as above.
unsafe impl Sync for FuseLibrary {}

impl std::fmt::Debug for FuseLibrary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FuseLibrary").field("name", &self.name).finish_non_exhaustive()
    }
}

impl FuseLibrary {
    /// Open the first loadable candidate from [`LIBRARY_CANDIDATES`].
    pub fn open() -> FuseResult<Self> {
        Self::open_any(LIBRARY_CANDIDATES)
    }

    /// Open the first loadable library from `names`.
    ///
    /// A library that loads but lacks a symbol is an error straight away;
    /// later candidates are not tried.
    pub fn open_any(names: &[&str]) -> FuseResult<Self> {
        let mut reason = String::from("no candidates given");
        for name in names {
            match Self::open_named(name) {
                Ok(library) => return Ok(library),
                Err(FuseError::LibraryNotFound { reason: r, .. }) => {
                    debug!(library = name, reason = %r, "libfuse candidate not loadable");
                    reason = r;
                }
                Err(e) => return Err(e),
            }
        }
        Err(FuseError::LibraryNotFound {
            tried: names.join(", "),
            reason,
        })
    }

    /// Open one library by soname or path.
    pub fn open_named(name: &str) -> FuseResult<Self> {
        let c_name = CString::new(name)
            .map_err(|_| FuseError::invalid_argument(format!("library name {name:?} contains NUL")))?;

        // SAFETY: c_name is a valid C string; dlopen has no other preconditions.
        let raw = unsafe { libc::dlopen(c_name.as_ptr(), libc::RTLD_NOW | libc::RTLD_LOCAL) };
        let handle = NonNull::new(raw).ok_or_else(|| FuseError::LibraryNotFound {
            tried: name.to_string(),
            reason: dl_error(),
        })?;

        let resolved = lookup(handle, name, c"fuse_main_real").and_then(|main_real| {
            lookup(handle, name, c"fuse_get_context").map(|get_context| (main_real, get_context))
        });
        let (main_real, get_context) = match resolved {
            Ok(pair) => pair,
            Err(e) => {
                // SAFETY: handle came from dlopen above and nothing from it escaped.
                unsafe { libc::dlclose(handle.as_ptr()) };
                return Err(e);
            }
        };

        // SAFETY: the symbols are the libfuse 2.x entry points with these
        // exact C signatures.
        let main_real = unsafe { std::mem::transmute::<NonNull<c_void>, FuseMainRealFn>(main_real) };
        // SAFETY: as above.
        let get_context = unsafe { std::mem::transmute::<NonNull<c_void>, GetContextFn>(get_context) };

        context::install_resolver(get_context);
        info!(library = name, "loaded libfuse");
        Ok(Self {
            handle,
            name: name.to_string(),
            main_real,
            get_context,
        })
    }

    /// The name the library was opened under.
    pub fn name(&self) -> &str {
        &self.name
    }

    pub(crate) fn main_real(&self) -> FuseMainRealFn {
        self.main_real
    }

    /// The library's `fuse_get_context`.
    pub fn get_context(&self) -> GetContextFn {
        self.get_context
    }
}

impl Drop for FuseLibrary {
    fn drop(&mut self) {
        context::clear_resolver(self.get_context);
        // SAFETY: handle came from dlopen and is closed exactly once.
        unsafe { libc::dlclose(self.handle.as_ptr()) };
        debug!(library = %self.name, "unloaded libfuse");
    }
}

fn lookup(handle: NonNull<c_void>, library: &str, symbol: &'static CStr) -> FuseResult<NonNull<c_void>> {
    // SAFETY: handle is a live dlopen handle and symbol is a C string.
    let addr = unsafe { libc::dlsym(handle.as_ptr(), symbol.as_ptr()) };
    NonNull::new(addr).ok_or_else(|| FuseError::MissingSymbol {
        symbol: symbol.to_str().unwrap_or("<non-utf8 symbol>"),
        library: library.to_string(),
    })
}

fn dl_error() -> String {
    // SAFETY: dlerror returns null or a thread-local C string.
    let msg = unsafe { libc::dlerror() };
    if msg.is_null() {
        return "unknown dlopen error".to_string();
    }
    // SAFETY: non-null dlerror results are NUL-terminated.
    unsafe { CStr::from_ptr(msg) }.to_string_lossy().into_owned()
}
