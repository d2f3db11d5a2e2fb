//! The state behind `private_data` for one mount.

use std::sync::atomic::{AtomicBool, Ordering};

use libc::c_void;

use crate::context;
use crate::error::{FsError, FsResult};
use crate::ops::Filesystem;

/// One running filesystem.
///
/// Boxed and handed to `fuse_main_real` as `user_data`. The box is reclaimed
/// by whoever created it once the native loop has returned, so adapters
/// only ever borrow it.
pub(crate) struct Session<F> {
    fs: F,
    initialized: AtomicBool,
    destroyed: AtomicBool,
}

impl<F: Filesystem> Session<F> {
    pub(crate) fn new(fs: F) -> Self {
        Self {
            fs,
            initialized: AtomicBool::new(false),
            destroyed: AtomicBool::new(false),
        }
    }

    pub(crate) fn fs(&self) -> &F {
        &self.fs
    }

    /// Leak into a `user_data` pointer.
    pub(crate) fn into_user_data(self: Box<Self>) -> *mut c_void {
        Box::into_raw(self).cast()
    }

    /// Take back ownership of a pointer from [`Session::into_user_data`].
    ///
    /// # Safety
    ///
    /// `user_data` must come from `into_user_data` for the same `F`, and no
    /// callback may still be using it.
    pub(crate) unsafe fn from_user_data(user_data: *mut c_void) -> Box<Self> {
        // SAFETY: upheld by the caller.
        unsafe { Box::from_raw(user_data.cast()) }
    }

    /// Borrow the session behind `user_data`.
    ///
    /// # Safety
    ///
    /// A non-null `user_data` must come from `into_user_data` for the same
    /// `F` and still be owned by its creator.
    pub(crate) unsafe fn borrow<'a>(user_data: *mut c_void) -> Option<&'a Self> {
        // SAFETY: upheld by the caller.
        unsafe { user_data.cast::<Self>().as_ref() }
    }

    /// The session for the operation running on this thread.
    ///
    /// # Safety
    ///
    /// Must only be called from inside a callback of a table built for `F`.
    pub(crate) unsafe fn current<'a>() -> FsResult<&'a Self> {
        let ctx = context::current().ok_or_else(|| FsError::other("no fuse context on this thread"))?;
        // SAFETY: private_data is the pointer init returned, which is ours.
        unsafe { Self::borrow(ctx.private_data) }
            .ok_or_else(|| FsError::other("fuse context carries no session"))
    }

    /// Record init. False if it had already happened.
    pub(crate) fn mark_initialized(&self) -> bool {
        !self.initialized.swap(true, Ordering::AcqRel)
    }

    /// Record destroy. False if it had already happened.
    pub(crate) fn mark_destroyed(&self) -> bool {
        !self.destroyed.swap(true, Ordering::AcqRel)
    }
}
