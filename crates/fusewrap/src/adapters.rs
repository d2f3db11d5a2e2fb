//! `extern "C"` trampolines between libfuse and [`Filesystem`].
//!
//! One set of functions is instantiated per filesystem type. Each looks up
//! the session through the current `fuse_context`, converts the native
//! arguments, calls the filesystem, and turns the result into the status
//! libfuse expects: zero or a byte count on success, `-errno` on failure.
//! A panic never unwinds into native code; it is logged and reported as
//! `-EIO`.

use std::any::Any;
use std::ffi::{CStr, OsStr};
use std::os::unix::ffi::OsStrExt;
use std::panic::{self, AssertUnwindSafe};
use std::path::Path;
use std::ptr::{self, NonNull};

use libc::{c_char, c_int, c_void};
use tracing::{debug, error, info, trace, warn};

use crate::abi::{ConnectionInfo, FileInfo, Stat};
use crate::context;
use crate::ctypes::{OffT, SizeT};
use crate::error::{FsError, FsResult};
use crate::filler::DirFiller;
use crate::ops::Filesystem;
use crate::session::Session;
use crate::table::Operation;
use crate::types::{FileHandle, OpenFlags};

pub type GetattrFn = unsafe extern "C" fn(path: *const c_char, stat: *mut Stat) -> c_int;
pub type OpenFn = unsafe extern "C" fn(path: *const c_char, fi: *mut FileInfo) -> c_int;
pub type ReadFn = unsafe extern "C" fn(
    path: *const c_char,
    buf: *mut c_char,
    size: SizeT,
    offset: OffT,
    fi: *mut FileInfo,
) -> c_int;
pub type ReleaseFn = unsafe extern "C" fn(path: *const c_char, fi: *mut FileInfo) -> c_int;
pub type ReaddirFn = unsafe extern "C" fn(
    path: *const c_char,
    buf: *mut c_void,
    filler: Option<FillDirFn>,
    offset: OffT,
    fi: *mut FileInfo,
) -> c_int;
pub type InitFn = unsafe extern "C" fn(conn: *mut ConnectionInfo) -> *mut c_void;
pub type DestroyFn = unsafe extern "C" fn(user_data: *mut c_void);

/// `fuse_fill_dir_t`.
pub type FillDirFn =
    unsafe extern "C" fn(buf: *mut c_void, name: *const c_char, stat: *const Stat, offset: OffT) -> c_int;

/// A slot with no typed adapter. Always null in tables this crate builds.
pub type RawCallback = unsafe extern "C" fn();

fn panic_message(payload: &(dyn Any + Send)) -> &str {
    if let Some(s) = payload.downcast_ref::<&'static str>() {
        s
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.as_str()
    } else {
        "non-string panic payload"
    }
}

/// Run one operation body, mapping errors to `-errno` and panics to `-EIO`.
fn guard(op: Operation, body: impl FnOnce() -> FsResult<c_int>) -> c_int {
    match panic::catch_unwind(AssertUnwindSafe(body)) {
        Ok(Ok(status)) => status,
        Ok(Err(e)) => {
            trace!(%op, errno = e.errno(), error = %e, "operation failed");
            e.to_status()
        }
        Err(payload) => {
            error!(%op, panic = panic_message(&*payload), "filesystem panicked");
            -libc::EIO
        }
    }
}

/// Borrow a native path.
///
/// # Safety
///
/// A non-null `path` must be a NUL-terminated string valid for `'a`.
unsafe fn path_arg<'a>(path: *const c_char) -> FsResult<&'a Path> {
    if path.is_null() {
        return Err(FsError::invalid_argument("null path"));
    }
    // SAFETY: upheld by the caller.
    let bytes = unsafe { CStr::from_ptr(path) }.to_bytes();
    Ok(Path::new(OsStr::from_bytes(bytes)))
}

pub(crate) unsafe extern "C" fn getattr<F: Filesystem>(path: *const c_char, stat: *mut Stat) -> c_int {
    guard(Operation::Getattr, || {
        // SAFETY: called by libfuse from inside the session's loop.
        let session = unsafe { Session::<F>::current() }?;
        // SAFETY: libfuse passes a valid path for the duration of the call.
        let path = unsafe { path_arg(path) }?;
        trace!(op = "getattr", path = %path.display());

        // SAFETY: the stat buffer belongs to libfuse and is ours until we return.
        let stat = unsafe { stat.as_mut() }.ok_or_else(|| FsError::invalid_argument("null stat"))?;
        stat.clear();
        session.fs().getattr(path)?.write_to(stat)?;
        Ok(0)
    })
}

pub(crate) unsafe extern "C" fn open<F: Filesystem>(path: *const c_char, fi: *mut FileInfo) -> c_int {
    guard(Operation::Open, || {
        // SAFETY: called by libfuse from inside the session's loop.
        let session = unsafe { Session::<F>::current() }?;
        // SAFETY: as above.
        let path = unsafe { path_arg(path) }?;
        // SAFETY: libfuse owns the file info for the duration of the call.
        let info = unsafe { fi.as_mut() }.ok_or_else(|| FsError::invalid_argument("null file info"))?;
        let flags = OpenFlags::from_raw(info.flags);
        trace!(op = "open", path = %path.display(), flags = info.flags);

        let opened = session.fs().open(path, flags)?;
        info.fh = opened.fh.get();
        info.insert_aux_flags(opened.aux_flags());
        Ok(0)
    })
}

pub(crate) unsafe extern "C" fn read<F: Filesystem>(
    path: *const c_char,
    buf: *mut c_char,
    size: SizeT,
    offset: OffT,
    fi: *mut FileInfo,
) -> c_int {
    guard(Operation::Read, || {
        // SAFETY: called by libfuse from inside the session's loop.
        let session = unsafe { Session::<F>::current() }?;
        // SAFETY: as above.
        let path = unsafe { path_arg(path) }?;
        // SAFETY: a non-null file info is valid for the call.
        let fh = FileHandle(unsafe { fi.as_ref() }.map_or(0, |info| info.fh));
        let offset = offset
            .try_to_u64()
            .map_err(|_| FsError::invalid_argument(format!("negative read offset {offset}")))?;
        let size = size.try_to_usize()?;
        trace!(op = "read", path = %path.display(), size, offset, fh = fh.get());

        let data = if size == 0 {
            NonNull::<u8>::dangling().as_ptr()
        } else if buf.is_null() {
            return Err(FsError::invalid_argument("null read buffer"));
        } else {
            buf.cast::<u8>()
        };
        // SAFETY: libfuse provides a writable buffer of exactly `size` bytes.
        let buf = unsafe { std::slice::from_raw_parts_mut(data, size) };

        let n = session.fs().read(path, buf, offset, fh)?;
        if n > size {
            error!(path = %path.display(), returned = n, requested = size, "read returned more than requested");
            return Err(FsError::other(format!("read returned {n} bytes for a {size} byte request")));
        }
        c_int::try_from(n).map_err(|_| FsError::Overflow(format!("read length {n}")))
    })
}

pub(crate) unsafe extern "C" fn release<F: Filesystem>(path: *const c_char, fi: *mut FileInfo) -> c_int {
    guard(Operation::Release, || {
        // SAFETY: called by libfuse from inside the session's loop.
        let session = unsafe { Session::<F>::current() }?;
        // SAFETY: as above.
        let path = unsafe { path_arg(path) }?;
        // SAFETY: a non-null file info is valid for the call.
        let fh = FileHandle(unsafe { fi.as_ref() }.map_or(0, |info| info.fh));
        trace!(op = "release", path = %path.display(), fh = fh.get());

        session.fs().release(path, fh)?;
        Ok(0)
    })
}

pub(crate) unsafe extern "C" fn readdir<F: Filesystem>(
    path: *const c_char,
    buf: *mut c_void,
    filler: Option<FillDirFn>,
    _offset: OffT,
    _fi: *mut FileInfo,
) -> c_int {
    guard(Operation::Readdir, || {
        // SAFETY: called by libfuse from inside the session's loop.
        let session = unsafe { Session::<F>::current() }?;
        // SAFETY: as above.
        let path = unsafe { path_arg(path) }?;
        let fill = filler.ok_or_else(|| FsError::invalid_argument("null fill function"))?;
        trace!(op = "readdir", path = %path.display());

        // SAFETY: buf and fill are the pair libfuse passed for this call.
        let mut dir = unsafe { DirFiller::from_raw(buf, fill) };
        let result = session.fs().readdir(path, &mut dir);
        if dir.is_full() {
            // A full buffer ends the listing successfully.
            if let Err(e) = &result {
                debug!(path = %path.display(), error = %e, "readdir error after buffer filled");
            }
            return Ok(0);
        }
        result.map(|()| 0)
    })
}

pub(crate) unsafe extern "C" fn init<F: Filesystem>(conn: *mut ConnectionInfo) -> *mut c_void {
    let user_data = context::current().map_or(ptr::null_mut(), |ctx| ctx.private_data);

    let outcome = panic::catch_unwind(AssertUnwindSafe(|| {
        // SAFETY: user_data is the session pointer handed to fuse_main_real.
        let session = unsafe { Session::<F>::borrow(user_data) }
            .ok_or_else(|| FsError::other("init without a session"))?;
        if !session.mark_initialized() {
            warn!("init called more than once");
        }
        // SAFETY: libfuse owns the connection info for the duration of the call.
        let conn = unsafe { conn.as_mut() }.ok_or_else(|| FsError::invalid_argument("null connection info"))?;
        let (major, minor) = conn.protocol();
        info!(major, minor, async_read = conn.async_read(), "fuse connection initialized");
        session.fs().init(conn)
    }));

    match outcome {
        Ok(Ok(())) => {}
        Ok(Err(e)) => error!(error = %e, "filesystem init failed"),
        Err(payload) => error!(panic = panic_message(&*payload), "filesystem init panicked"),
    }
    // Whatever init returns becomes private_data for every later call.
    user_data
}

pub(crate) unsafe extern "C" fn destroy<F: Filesystem>(user_data: *mut c_void) {
    let outcome = panic::catch_unwind(AssertUnwindSafe(|| {
        // SAFETY: user_data is what init returned, i.e. the session pointer.
        let Some(session) = (unsafe { Session::<F>::borrow(user_data) }) else {
            warn!("destroy without a session");
            return;
        };
        if !session.mark_destroyed() {
            warn!("destroy called more than once; ignoring");
            return;
        }
        info!("filesystem destroyed");
        session.fs().destroy();
    }));

    if let Err(payload) = outcome {
        error!(panic = panic_message(&*payload), "filesystem destroy panicked");
    }
}
