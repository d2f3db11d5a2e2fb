//! A read-only filesystem with one file at the root.
//!
//! ```text
//! /          directory, 0755
//! /<name>    regular file, 0444, holding <content>
//! ```

use std::collections::HashSet;
use std::ffi::OsStr;
use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};

use fusewrap::{
    Capabilities, ConnectionInfo, DirFiller, FileAttr, FileHandle, Filesystem, FsError, FsResult, OpenFlags,
    Opened, Operation,
};
use parking_lot::Mutex;
use tracing::{debug, info};

/// Default file name.
pub const DEFAULT_NAME: &str = "hello";

/// Default file content.
pub const DEFAULT_CONTENT: &str = "hello world.";

/// What a path refers to.
enum Node {
    Root,
    File,
}

/// Serves a single static file.
pub struct HelloFs {
    name: String,
    content: Vec<u8>,
    next_fh: AtomicU64,
    open: Mutex<HashSet<u64>>,
}

impl HelloFs {
    /// A filesystem exposing `content` as `/<name>`.
    pub fn new(name: impl Into<String>, content: impl Into<Vec<u8>>) -> Self {
        Self {
            name: name.into(),
            content: content.into(),
            next_fh: AtomicU64::new(1),
            open: Mutex::new(HashSet::new()),
        }
    }

    /// The file name, without the leading slash.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Handles currently open.
    pub fn open_handles(&self) -> usize {
        self.open.lock().len()
    }

    fn lookup(&self, path: &Path) -> FsResult<Node> {
        if path == Path::new("/") {
            return Ok(Node::Root);
        }
        match path.strip_prefix("/") {
            Ok(rest) if rest.as_os_str() == OsStr::new(&self.name) => Ok(Node::File),
            _ => Err(FsError::not_found(path.display().to_string())),
        }
    }

    fn file_attr(&self) -> FileAttr {
        FileAttr::file(self.content.len() as u64, 0o444)
    }
}

impl Default for HelloFs {
    fn default() -> Self {
        Self::new(DEFAULT_NAME, DEFAULT_CONTENT)
    }
}

impl Filesystem for HelloFs {
    const OPERATIONS: &'static [Operation] = &[
        Operation::Init,
        Operation::Destroy,
        Operation::Getattr,
        Operation::Readdir,
        Operation::Open,
        Operation::Read,
        Operation::Release,
    ];

    fn init(&self, conn: &mut ConnectionInfo) -> FsResult<()> {
        let (major, minor) = conn.protocol();
        let granted = conn.request(Capabilities::ASYNC_READ);
        info!(major, minor, ?granted, file = %self.name, "hello filesystem ready");
        Ok(())
    }

    fn destroy(&self) {
        info!(open_handles = self.open_handles(), "hello filesystem shutting down");
    }

    fn getattr(&self, path: &Path) -> FsResult<FileAttr> {
        match self.lookup(path)? {
            Node::Root => Ok(FileAttr::directory(0o755)),
            Node::File => Ok(self.file_attr()),
        }
    }

    fn readdir(&self, path: &Path, filler: &mut DirFiller<'_>) -> FsResult<()> {
        match self.lookup(path)? {
            Node::Root => {}
            Node::File => return Err(FsError::not_a_directory(path.display().to_string())),
        }
        filler.add_dots()?;
        filler.push(&self.name, Some(&self.file_attr()))?;
        Ok(())
    }

    fn open(&self, path: &Path, flags: OpenFlags) -> FsResult<Opened> {
        match self.lookup(path)? {
            Node::Root => return Err(FsError::is_a_directory(path.display().to_string())),
            Node::File => {}
        }
        if !flags.is_read_only() {
            return Err(FsError::permission_denied(path.display().to_string()));
        }

        let fh = self.next_fh.fetch_add(1, Ordering::Relaxed);
        self.open.lock().insert(fh);
        debug!(fh, "opened");
        Ok(Opened::with_handle(fh))
    }

    fn read(&self, path: &Path, buf: &mut [u8], offset: u64, _fh: FileHandle) -> FsResult<usize> {
        match self.lookup(path)? {
            Node::Root => return Err(FsError::is_a_directory(path.display().to_string())),
            Node::File => {}
        }
        let Ok(start) = usize::try_from(offset) else {
            return Ok(0);
        };
        if start >= self.content.len() {
            return Ok(0);
        }
        let n = buf.len().min(self.content.len() - start);
        buf[..n].copy_from_slice(&self.content[start..start + n]);
        Ok(n)
    }

    fn release(&self, _path: &Path, fh: FileHandle) -> FsResult<()> {
        if self.open.lock().remove(&fh.get()) {
            debug!(fh = fh.get(), "released");
            Ok(())
        } else {
            Err(FsError::BadHandle(fh.get()))
        }
    }
}
