//! Building argv and running the libfuse main loop.

use std::ffi::CString;
use std::path::PathBuf;
use std::ptr;

use libc::{c_char, c_int};
use tracing::{info, warn};

#[cfg(not(feature = "native-layout"))]
use crate::abi::HeaderLayout;
#[cfg(feature = "native-layout")]
use crate::abi::ReportedLayout;
use crate::abi::verify_all;
use crate::ctypes::SizeT;
use crate::error::{FuseError, FuseResult};
use crate::library::FuseLibrary;
use crate::ops::Filesystem;
use crate::session::Session;
use crate::table::OperationsTable;

/// Command line handed to `fuse_main_real`.
///
/// libfuse does its own option parsing; this only assembles the vector.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MountArgs {
    program: String,
    mountpoint: Option<PathBuf>,
    foreground: bool,
    debug: bool,
    single_threaded: bool,
    options: Vec<String>,
    extra: Vec<String>,
}

impl MountArgs {
    /// Arguments for `program` with nothing else set.
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            ..Self::default()
        }
    }

    /// Forward a complete argv unchanged. The first element is the program
    /// name.
    pub fn from_argv<I, S>(argv: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut iter = argv.into_iter().map(Into::into);
        let program = iter.next().unwrap_or_default();
        Self {
            program,
            extra: iter.collect(),
            ..Self::default()
        }
    }

    pub fn mountpoint(mut self, mountpoint: impl Into<PathBuf>) -> Self {
        self.mountpoint = Some(mountpoint.into());
        self
    }

    /// `-f`: stay in the foreground.
    pub fn foreground(mut self, yes: bool) -> Self {
        self.foreground = yes;
        self
    }

    /// `-d`: libfuse debug output (implies foreground).
    pub fn debug(mut self, yes: bool) -> Self {
        self.debug = yes;
        self
    }

    /// `-s`: single-threaded loop.
    pub fn single_threaded(mut self, yes: bool) -> Self {
        self.single_threaded = yes;
        self
    }

    /// One `-o` mount option, e.g. `ro` or `fsname=hello`.
    pub fn option(mut self, option: impl Into<String>) -> Self {
        self.options.push(option.into());
        self
    }

    /// A raw argument, placed before the mountpoint.
    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.extra.push(arg.into());
        self
    }

    pub fn program(&self) -> &str {
        &self.program
    }

    /// Whether libfuse will keep the calling process attached.
    ///
    /// Without `-f` or `-d` libfuse daemonizes, and control does not come
    /// back to this process until the filesystem is unmounted.
    pub fn stays_attached(&self) -> bool {
        self.foreground || self.debug || self.extra.iter().any(|a| a == "-f" || a == "-d")
    }

    /// The argv vector: program, flags, `-o` options, raw arguments,
    /// mountpoint.
    pub fn to_argv(&self) -> FuseResult<Vec<CString>> {
        let mut argv = vec![self.program.clone()];
        if self.foreground {
            argv.push("-f".to_string());
        }
        if self.debug {
            argv.push("-d".to_string());
        }
        if self.single_threaded {
            argv.push("-s".to_string());
        }
        if !self.options.is_empty() {
            argv.push("-o".to_string());
            argv.push(self.options.join(","));
        }
        argv.extend(self.extra.iter().cloned());
        if let Some(mountpoint) = &self.mountpoint {
            let mountpoint = mountpoint.to_str().ok_or_else(|| {
                FuseError::invalid_argument(format!("mountpoint {} is not UTF-8", mountpoint.display()))
            })?;
            argv.push(mountpoint.to_string());
        }

        argv.into_iter()
            .map(|arg| {
                CString::new(arg.as_str())
                    .map_err(|_| FuseError::invalid_argument(format!("argument {arg:?} contains NUL")))
            })
            .collect()
    }
}

/// Mount `fs` and run the libfuse main loop until unmount.
///
/// Checks every mirrored layout first, then hands libfuse the operations
/// table for `F` and a session owning `fs`. With the `native-layout` feature
/// the check runs against the compiled layout report. Returns the status
/// `fuse_main_real` returned; the session (and `fs`) is dropped after the
/// loop has ended.
pub fn mount<F: Filesystem>(library: &FuseLibrary, args: &MountArgs, fs: F) -> FuseResult<i32> {
    #[cfg(feature = "native-layout")]
    let native = ReportedLayout::compiled();
    #[cfg(not(feature = "native-layout"))]
    let native = HeaderLayout;
    verify_all(&native)?;
    let table = OperationsTable::for_filesystem::<F>()?;
    let argv = args.to_argv()?;
    if !args.stays_attached() {
        warn!("neither -f nor -d given; libfuse will detach and this process will not regain control until unmount");
    }

    let mut argv_ptrs: Vec<*mut c_char> = argv.iter().map(|a| a.as_ptr().cast_mut()).collect();
    argv_ptrs.push(ptr::null_mut());
    let argc = c_int::try_from(argv.len())
        .map_err(|_| FuseError::invalid_argument(format!("{} arguments is too many", argv.len())))?;
    let op_size = SizeT::try_from_usize(OperationsTable::byte_size())?;

    info!(
        program = args.program(),
        library = library.name(),
        operations = ?table.installed(),
        "starting fuse main loop"
    );
    let user_data = Box::new(Session::new(fs)).into_user_data();
    // SAFETY: argv_ptrs is NULL-terminated and backed by `argv`; table and
    // user_data outlive the call, which only returns after unmount.
    let status = unsafe { (library.main_real())(argc, argv_ptrs.as_mut_ptr(), &table, op_size, user_data) };
    // SAFETY: the loop has returned, so no callback can still hold the session.
    drop(unsafe { Session::<F>::from_user_data(user_data) });
    drop(argv);

    info!(status, "fuse main loop returned");
    Ok(status)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn strings(argv: Vec<CString>) -> Vec<String> {
        argv.into_iter().map(|a| a.into_string().unwrap()).collect()
    }

    #[test]
    fn test_argv_order() {
        let args = MountArgs::new("hello")
            .mountpoint("/tmp/fuse")
            .foreground(true)
            .single_threaded(true)
            .option("ro")
            .option("fsname=hello")
            .arg("--extra");
        assert_eq!(
            strings(args.to_argv().unwrap()),
            ["hello", "-f", "-s", "-o", "ro,fsname=hello", "--extra", "/tmp/fuse"]
        );
    }

    #[test]
    fn test_from_argv_forwards_unchanged() {
        let args = MountArgs::from_argv(["prog", "-d", "/mnt/x"]);
        assert_eq!(args.program(), "prog");
        assert!(args.stays_attached());
        assert_eq!(strings(args.to_argv().unwrap()), ["prog", "-d", "/mnt/x"]);
    }

    #[test]
    fn test_detached_without_flags() {
        let args = MountArgs::new("prog").mountpoint("/mnt");
        assert!(!args.stays_attached());
        assert!(args.clone().debug(true).stays_attached());
    }

    #[test]
    fn test_nul_argument_is_rejected() {
        let err = MountArgs::new("prog").option("a\0b").to_argv().unwrap_err();
        assert!(matches!(err, FuseError::InvalidArgument(_)));
    }
}
