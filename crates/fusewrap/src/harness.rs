//! In-process stand-in for the libfuse dispatcher.
//!
//! [`Harness`] builds the real operations table for a filesystem and calls
//! through its slots the way libfuse would: same argument types, same
//! context lookup, same `-errno` results. A null slot answers `-ENOSYS`,
//! as libfuse's defaults do. No kernel, mount or libfuse is involved.

use std::cell::Cell;
use std::ffi::{CStr, CString};
use std::marker::PhantomData;
use std::ptr;

use libc::{c_char, c_int, c_void};

use crate::abi::{ConnectionInfo, FileInfo, Stat};
use crate::context::{self, FuseContext};
use crate::ctypes::{GidT, ModeT, OffT, SizeT, UidT};
use crate::error::FuseResult;
use crate::ops::Filesystem;
use crate::session::Session;
use crate::table::OperationsTable;

thread_local! {
    static CONTEXT: Cell<*mut FuseContext> = const { Cell::new(ptr::null_mut()) };
}

unsafe extern "C" fn harness_context() -> *mut FuseContext {
    CONTEXT.with(Cell::get)
}

/// Entries seen by the harness's fill function.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Listing {
    /// Accepted names, in fill order.
    pub names: Vec<String>,
    /// `st_mode` of the attribute hint per accepted name.
    pub modes: Vec<Option<u32>>,
    /// Offsets passed per accepted name.
    pub offsets: Vec<i64>,
    /// Total fill calls, refused ones included.
    pub attempts: usize,
}

struct Recorder {
    listing: Listing,
    capacity: Option<usize>,
}

unsafe extern "C" fn record_entry(
    buf: *mut c_void,
    name: *const c_char,
    stat: *const Stat,
    offset: OffT,
) -> c_int {
    // SAFETY: buf is the Recorder passed by Harness::readdir_with.
    let recorder = unsafe { &mut *buf.cast::<Recorder>() };
    recorder.listing.attempts += 1;
    if recorder
        .capacity
        .is_some_and(|cap| recorder.listing.names.len() >= cap)
    {
        return 1;
    }
    // SAFETY: the filler always passes a NUL-terminated name.
    let name = unsafe { CStr::from_ptr(name) }.to_string_lossy().into_owned();
    recorder.listing.names.push(name);
    // SAFETY: a non-null hint is valid for the call.
    recorder.listing.modes.push(unsafe { stat.as_ref() }.map(|s| s.st_mode.get()));
    recorder.listing.offsets.push(offset.get());
    0
}

fn c_path(path: &str) -> CString {
    CString::new(path).expect("test path contains NUL")
}

/// Drives a filesystem through its operations table without libfuse.
///
/// The harness binds its context to the creating thread. It can be shared
/// between threads the way libfuse shares one session between its workers;
/// each thread calls [`Harness::enter`] before making calls. Paths
/// containing NUL panic.
pub struct Harness<F: Filesystem> {
    table: OperationsTable,
    session: *mut c_void,
    context: Box<FuseContext>,
    _fs: PhantomData<F>,
}

// SAFETY: the session owns an `F`, which is Send + Sync. The context is
// only written through `&mut self`; shared calls read it.
unsafe impl<F: Filesystem> Send for Harness<F> {}
// SAFETY: as above.
unsafe impl<F: Filesystem> Sync for Harness<F> {}

impl<F: Filesystem> Harness<F> {
    /// Build the table for `F` and a session around `fs`.
    pub fn new(fs: F) -> FuseResult<Self> {
        let table = OperationsTable::for_filesystem::<F>()?;
        let session = Box::new(Session::new(fs)).into_user_data();
        // SAFETY: getuid, getgid and getpid cannot fail.
        let (uid, gid, pid) = unsafe { (libc::getuid(), libc::getgid(), libc::getpid()) };
        let context = Box::new(FuseContext {
            fuse: ptr::null_mut(),
            uid: UidT::new(uid),
            gid: GidT::new(gid),
            pid,
            private_data: session,
            umask: ModeT::new(0o022),
        });
        context::install_resolver(harness_context);
        let harness = Self {
            table,
            session,
            context,
            _fs: PhantomData,
        };
        harness.enter();
        Ok(harness)
    }

    /// Make this harness the current context on the calling thread.
    pub fn enter(&self) {
        let ctx = ptr::from_ref::<FuseContext>(&self.context).cast_mut();
        CONTEXT.with(|c| c.set(ctx));
    }

    /// The table being exercised.
    pub fn table(&self) -> &OperationsTable {
        &self.table
    }

    /// The filesystem behind the session.
    pub fn filesystem(&self) -> &F {
        // SAFETY: session is owned by this harness for its whole life.
        let session = unsafe { Session::<F>::borrow(self.session) };
        session.expect("harness session is never null").fs()
    }

    /// Override the caller identity seen by operations.
    pub fn set_caller(&mut self, uid: u32, gid: u32, pid: i32) {
        self.context.uid = UidT::new(uid);
        self.context.gid = GidT::new(gid);
        self.context.pid = pid;
    }

    /// Call init. Its return value becomes `private_data`, as in libfuse.
    pub fn init(&mut self, conn: &mut ConnectionInfo) {
        if let Some(init) = self.table.init {
            // SAFETY: conn is a valid connection info for the call.
            let user_data = unsafe { init(conn) };
            self.context.private_data = user_data;
        }
    }

    /// Call destroy with the current `private_data`.
    pub fn destroy(&self) {
        if let Some(destroy) = self.table.destroy {
            // SAFETY: private_data is what init returned.
            unsafe { destroy(self.context.private_data) };
        }
    }

    /// Call getattr. Returns the status and the stat as filled.
    pub fn getattr(&self, path: &str) -> (c_int, Stat) {
        let mut stat = Stat::zeroed();
        let Some(getattr) = self.table.getattr else {
            return (-libc::ENOSYS, stat);
        };
        let path = c_path(path);
        // SAFETY: both pointers are valid for the call.
        let status = unsafe { getattr(path.as_ptr(), &mut stat) };
        (status, stat)
    }

    /// Call open with `flags`. Returns the status and the file info.
    pub fn open(&self, path: &str, flags: c_int) -> (c_int, FileInfo) {
        let mut info = FileInfo::new(flags);
        let Some(open) = self.table.open else {
            return (-libc::ENOSYS, info);
        };
        let path = c_path(path);
        // SAFETY: both pointers are valid for the call.
        let status = unsafe { open(path.as_ptr(), &mut info) };
        (status, info)
    }

    /// Call read. Returns the status and the bytes it reported.
    pub fn read(&self, path: &str, size: usize, offset: i64, info: &mut FileInfo) -> (c_int, Vec<u8>) {
        let mut buf = vec![0u8; size];
        let Some(read) = self.table.read else {
            return (-libc::ENOSYS, Vec::new());
        };
        let path = c_path(path);
        let size = SizeT::try_from_usize(size).expect("size fits size_t");
        // SAFETY: buf has exactly `size` writable bytes.
        let status = unsafe { read(path.as_ptr(), buf.as_mut_ptr().cast(), size, OffT::new(offset), info) };
        let len = usize::try_from(status).unwrap_or(0).min(buf.len());
        buf.truncate(len);
        (status, buf)
    }

    /// Call release.
    pub fn release(&self, path: &str, info: &mut FileInfo) -> c_int {
        let Some(release) = self.table.release else {
            return -libc::ENOSYS;
        };
        let path = c_path(path);
        // SAFETY: both pointers are valid for the call.
        unsafe { release(path.as_ptr(), info) }
    }

    /// Call readdir with an unbounded buffer.
    pub fn readdir(&self, path: &str) -> (c_int, Listing) {
        self.readdir_with(path, None)
    }

    /// Call readdir with a buffer that reports full after `capacity` entries.
    pub fn readdir_with_capacity(&self, path: &str, capacity: usize) -> (c_int, Listing) {
        self.readdir_with(path, Some(capacity))
    }

    fn readdir_with(&self, path: &str, capacity: Option<usize>) -> (c_int, Listing) {
        let Some(readdir) = self.table.readdir else {
            return (-libc::ENOSYS, Listing::default());
        };
        let mut recorder = Recorder {
            listing: Listing::default(),
            capacity,
        };
        let mut info = FileInfo::new(libc::O_RDONLY);
        let path = c_path(path);
        // SAFETY: the recorder outlives the call and matches record_entry.
        let status = unsafe {
            readdir(
                path.as_ptr(),
                ptr::from_mut(&mut recorder).cast(),
                Some(record_entry),
                OffT::new(0),
                &mut info,
            )
        };
        (status, recorder.listing)
    }
}

impl<F: Filesystem> Drop for Harness<F> {
    fn drop(&mut self) {
        let ctx = ptr::from_mut::<FuseContext>(&mut self.context);
        CONTEXT.with(|c| {
            if c.get() == ctx {
                c.set(ptr::null_mut());
            }
        });
        // SAFETY: the session came from into_user_data in new and no call
        // can be in flight while the harness is being dropped.
        drop(unsafe { Session::<F>::from_user_data(self.session) });
    }
}
