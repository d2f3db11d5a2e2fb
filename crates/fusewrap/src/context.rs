//! Per-request context (`struct fuse_context`).
//!
//! libfuse keeps one context per worker thread and exposes it through
//! `fuse_get_context`. The adapters read `private_data` from it to find the
//! running session. The resolver is installed by [`FuseLibrary::open`]; the
//! test harness installs its own.
//!
//! [`FuseLibrary::open`]: crate::library::FuseLibrary::open

use libc::{c_void, pid_t};
use parking_lot::RwLock;

use crate::abi::layout::impl_layout;
use crate::ctypes::{GidT, ModeT, UidT};

/// Mirror of `struct fuse_context`.
#[repr(C)]
#[derive(Debug, Clone, Copy)]
pub struct FuseContext {
    /// The `struct fuse` handle.
    pub fuse: *mut c_void,
    /// Effective user id of the calling process.
    pub uid: UidT,
    /// Effective group id of the calling process.
    pub gid: GidT,
    /// Thread id of the calling process.
    pub pid: pid_t,
    /// The `user_data` given to `fuse_main_real`, or whatever init returned.
    pub private_data: *mut c_void,
    /// Umask of the calling process.
    pub umask: ModeT,
}

impl_layout!(FuseContext, "struct fuse_context", [fuse, uid, gid, pid, private_data, umask]);

/// Signature of `fuse_get_context`.
pub type GetContextFn = unsafe extern "C" fn() -> *mut FuseContext;

/// The installed resolver and how many holders share it.
#[derive(Clone, Copy)]
struct Installed {
    resolver: GetContextFn,
    holders: usize,
}

static RESOLVER: RwLock<Option<Installed>> = parking_lot::const_rwlock(None);

fn acquire(slot: &mut Option<Installed>, resolver: GetContextFn) {
    if let Some(installed) = slot.as_mut() {
        if std::ptr::fn_addr_eq(installed.resolver, resolver) {
            installed.holders += 1;
            return;
        }
    }
    *slot = Some(Installed { resolver, holders: 1 });
}

fn release(slot: &mut Option<Installed>, resolver: GetContextFn) {
    let Some(installed) = slot.as_mut() else {
        return;
    };
    if !std::ptr::fn_addr_eq(installed.resolver, resolver) {
        return;
    }
    installed.holders -= 1;
    if installed.holders == 0 {
        *slot = None;
    }
}

/// Install the function used to look up the current context.
///
/// Installing the resolver already in place adds a holder; a different
/// resolver replaces it.
pub fn install_resolver(resolver: GetContextFn) {
    acquire(&mut RESOLVER.write(), resolver);
}

/// Drop one holder of `resolver`. The slot empties when the last holder
/// goes; a resolver that has since been replaced is left alone.
pub(crate) fn clear_resolver(resolver: GetContextFn) {
    release(&mut RESOLVER.write(), resolver);
}

/// A copy of the calling thread's context, if one is available.
pub(crate) fn current() -> Option<FuseContext> {
    let resolver = (*RESOLVER.read())?.resolver;
    // SAFETY: the resolver is fuse_get_context or the harness stand-in;
    // both return null or a pointer valid for the calling thread.
    let ctx = unsafe { resolver() };
    // SAFETY: non-null pointers from the resolver point at a live context.
    unsafe { ctx.as_ref() }.copied()
}

/// The process on whose behalf the current operation runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Caller {
    pub uid: u32,
    pub gid: u32,
    pub pid: i32,
    pub umask: u32,
}

/// The caller of the operation running on this thread.
///
/// `None` outside a callback.
pub fn caller() -> Option<Caller> {
    current().map(|ctx| Caller {
        uid: ctx.uid.get(),
        gid: ctx.gid.get(),
        pid: ctx.pid,
        umask: ctx.umask.get(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    unsafe extern "C" fn first() -> *mut FuseContext {
        std::ptr::null_mut()
    }

    unsafe extern "C" fn second() -> *mut FuseContext {
        std::ptr::null_mut()
    }

    fn holders(slot: &Option<Installed>) -> Option<usize> {
        slot.map(|installed| installed.holders)
    }

    #[test]
    fn test_shared_resolver_survives_until_last_holder() {
        let mut slot = None;
        acquire(&mut slot, first);
        acquire(&mut slot, first);
        assert_eq!(holders(&slot), Some(2));

        release(&mut slot, first);
        assert_eq!(holders(&slot), Some(1));
        release(&mut slot, first);
        assert_eq!(holders(&slot), None);

        release(&mut slot, first);
        assert_eq!(holders(&slot), None);
    }

    #[test]
    fn test_replaced_resolver_is_not_cleared_by_old_holder() {
        let mut slot = None;
        acquire(&mut slot, first);
        acquire(&mut slot, second);
        assert_eq!(holders(&slot), Some(1));

        release(&mut slot, first);
        let installed = slot.unwrap();
        assert!(std::ptr::fn_addr_eq(installed.resolver, second as GetContextFn));
    }
}
