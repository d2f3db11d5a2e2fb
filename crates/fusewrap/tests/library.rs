//! Loading a libfuse stand-in built from `tests/fixtures/stub_fuse.c`.
//!
//! Needs a C compiler (`$CC`, else `cc`); without one the test logs why and
//! returns early.

use std::path::{Path, PathBuf};
use std::process::Command;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use fusewrap::{
    ConnectionInfo, FileAttr, Filesystem, FsError, FsResult, FuseLibrary, MountArgs, Operation, caller, mount,
};
use pretty_assertions::assert_eq;
use tempfile::TempDir;

fn build_stub() -> Option<(TempDir, PathBuf)> {
    let dir = tempfile::tempdir().expect("tempdir");
    let output = dir.path().join("libstubfuse.so");
    let source = Path::new(env!("CARGO_MANIFEST_DIR")).join("tests/fixtures/stub_fuse.c");
    let cc = std::env::var("CC").unwrap_or_else(|_| "cc".to_string());

    let result = Command::new(&cc)
        .args(["-shared", "-fPIC", "-o"])
        .arg(&output)
        .arg(&source)
        .status();
    match result {
        Ok(status) if status.success() => Some((dir, output)),
        Ok(status) => {
            eprintln!("skipping: {cc} exited with {status}");
            None
        }
        Err(e) => {
            eprintln!("skipping: cannot run {cc}: {e}");
            None
        }
    }
}

/// Counts the calls that reach it.
struct Counting {
    inits: Arc<AtomicUsize>,
    getattrs: Arc<AtomicUsize>,
}

impl Filesystem for Counting {
    const OPERATIONS: &'static [Operation] = &[Operation::Getattr, Operation::Init, Operation::Destroy];

    fn init(&self, conn: &mut ConnectionInfo) -> FsResult<()> {
        assert_eq!(conn.protocol(), (7, 26));
        self.inits.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn getattr(&self, path: &Path) -> FsResult<FileAttr> {
        self.getattrs.fetch_add(1, Ordering::SeqCst);
        if path == Path::new("/") {
            Ok(FileAttr::directory(0o755))
        } else {
            Err(FsError::not_found(path.display().to_string()))
        }
    }
}

#[test]
fn context_survives_dropping_one_of_two_handles() {
    let Some((_dir, stub)) = build_stub() else {
        return;
    };
    let stub = stub.to_str().unwrap();

    let first = FuseLibrary::open_named(stub).unwrap();
    let second = FuseLibrary::open_named(stub).unwrap();
    assert!(std::ptr::fn_addr_eq(first.get_context(), second.get_context()));

    drop(first);
    let who = caller().expect("resolver removed while a handle is still open");
    assert_eq!((who.uid, who.gid, who.pid, who.umask), (1000, 100, 4242, 0o022));

    let inits = Arc::new(AtomicUsize::new(0));
    let getattrs = Arc::new(AtomicUsize::new(0));
    let fs = Counting {
        inits: Arc::clone(&inits),
        getattrs: Arc::clone(&getattrs),
    };
    let args = MountArgs::new("stub").mountpoint("/mnt/stub").foreground(true);
    assert_eq!(mount(&second, &args, fs).unwrap(), 0);
    assert_eq!(inits.load(Ordering::SeqCst), 1);
    assert_eq!(getattrs.load(Ordering::SeqCst), 1);

    drop(second);
    assert_eq!(caller(), None);
}
