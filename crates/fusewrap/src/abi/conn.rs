//! `struct fuse_conn_info` mirror.

use bitflags::bitflags;

use super::layout::impl_layout;
use crate::ctypes::Unsigned;

bitflags! {
    /// Connection capability bits (`FUSE_CAP_*`).
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct Capabilities: libc::c_uint {
        /// Asynchronous read requests.
        const ASYNC_READ = 1 << 0;
        /// Remote POSIX file locking.
        const POSIX_LOCKS = 1 << 1;
        /// `O_TRUNC` handled by open.
        const ATOMIC_O_TRUNC = 1 << 3;
        /// Lookups of "." and "..".
        const EXPORT_SUPPORT = 1 << 4;
        /// Writes larger than 4 kB.
        const BIG_WRITES = 1 << 5;
        /// Umask is not applied on create.
        const DONT_MASK = 1 << 6;
        /// splice(2) for writes to the device.
        const SPLICE_WRITE = 1 << 7;
        /// Pages moved instead of copied on splice.
        const SPLICE_MOVE = 1 << 8;
        /// splice(2) for reads from the device.
        const SPLICE_READ = 1 << 9;
        /// BSD file locking.
        const FLOCK_LOCKS = 1 << 10;
        /// ioctl on directories.
        const IOCTL_DIR = 1 << 11;
    }
}

/// Connection parameters negotiated during init.
///
/// Owned by libfuse. The init callback may read every field and adjust the
/// writable ones (`async_read`, `max_write`, `max_readahead`, `want`,
/// `max_background`, `congestion_threshold`), but must not keep the
/// reference past the call.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConnectionInfo {
    /// Major version of the protocol (read-only).
    pub proto_major: Unsigned,
    /// Minor version of the protocol (read-only).
    pub proto_minor: Unsigned,
    /// Is asynchronous read supported (read-write).
    pub async_read: Unsigned,
    /// Maximum size of the write buffer.
    pub max_write: Unsigned,
    /// Maximum readahead.
    pub max_readahead: Unsigned,
    /// Capability flags the kernel supports.
    pub capable: Unsigned,
    /// Capability flags the filesystem wants to enable.
    pub want: Unsigned,
    /// Maximum number of backgrounded requests.
    pub max_background: Unsigned,
    /// Kernel congestion threshold.
    pub congestion_threshold: Unsigned,
    /// For future use.
    pub reserved: [Unsigned; 23],
}

impl_layout!(
    ConnectionInfo,
    "struct fuse_conn_info",
    [
        proto_major,
        proto_minor,
        async_read,
        max_write,
        max_readahead,
        capable,
        want,
        max_background,
        congestion_threshold,
        reserved,
    ]
);

impl ConnectionInfo {
    /// A connection as the kernel would present it for protocol
    /// `major.minor`, with nothing else negotiated.
    pub fn new(major: u32, minor: u32) -> Self {
        Self {
            proto_major: Unsigned::new(major),
            proto_minor: Unsigned::new(minor),
            async_read: Unsigned::default(),
            max_write: Unsigned::default(),
            max_readahead: Unsigned::default(),
            capable: Unsigned::default(),
            want: Unsigned::default(),
            max_background: Unsigned::default(),
            congestion_threshold: Unsigned::default(),
            reserved: [Unsigned::default(); 23],
        }
    }

    /// Protocol version as `(major, minor)`.
    pub fn protocol(&self) -> (u32, u32) {
        (self.proto_major.get(), self.proto_minor.get())
    }

    /// Whether asynchronous reads are enabled.
    pub fn async_read(&self) -> bool {
        self.async_read.get() != 0
    }

    /// Capabilities the kernel supports.
    pub fn capable(&self) -> Capabilities {
        Capabilities::from_bits_retain(self.capable.get())
    }

    /// Capabilities the filesystem has asked for.
    pub fn want(&self) -> Capabilities {
        Capabilities::from_bits_retain(self.want.get())
    }

    /// Ask for `caps`. Only bits the kernel supports are added; the granted
    /// subset is returned.
    pub fn request(&mut self, caps: Capabilities) -> Capabilities {
        let granted = caps & self.capable();
        self.want = Unsigned::new((self.want() | granted).bits());
        granted
    }

    /// Withdraw `caps` from the wanted set.
    pub fn withdraw(&mut self, caps: Capabilities) {
        self.want = Unsigned::new((self.want() - caps).bits());
    }
}
