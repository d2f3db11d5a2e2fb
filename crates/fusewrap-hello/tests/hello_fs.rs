//! The hello filesystem driven through its real operations table.

use std::collections::HashSet;
use std::thread;

use fusewrap::harness::Harness;
use fusewrap::{ConnectionInfo, FileAttr, FileInfo, FileType, Operation};
use fusewrap_hello::HelloFs;
use pretty_assertions::assert_eq;

fn harness() -> Harness<HelloFs> {
    let mut harness = Harness::new(HelloFs::default()).unwrap();
    harness.init(&mut ConnectionInfo::new(7, 26));
    harness
}

#[test]
fn table_holds_exactly_the_hello_operations() {
    let harness = harness();
    assert_eq!(
        harness.table().installed(),
        vec![
            Operation::Getattr,
            Operation::Open,
            Operation::Read,
            Operation::Release,
            Operation::Readdir,
            Operation::Init,
            Operation::Destroy,
        ]
    );
}

#[test]
fn root_is_a_0755_directory() {
    let (status, stat) = harness().getattr("/");
    assert_eq!(status, 0);
    assert_eq!(stat.st_mode.get(), libc::S_IFDIR | 0o755);
    assert_eq!(stat.st_nlink.get(), 2);
}

#[test]
fn hello_is_a_read_only_file() {
    let (status, stat) = harness().getattr("/hello");
    assert_eq!(status, 0);
    let attr = FileAttr::from_stat(&stat).unwrap();
    assert_eq!(attr.kind, FileType::File);
    assert_eq!(attr.perm, 0o444);
    assert_eq!(attr.size, 12);
    assert_eq!(attr.nlink, 1);
}

#[test]
fn missing_path_is_enoent() {
    let harness = harness();
    assert_eq!(harness.getattr("/missing").0, -2);
    assert_eq!(harness.open("/missing", libc::O_RDONLY).0, -2);
    assert_eq!(harness.readdir("/missing").0, -2);
}

#[test]
fn root_listing() {
    let (status, listing) = harness().readdir("/");
    assert_eq!(status, 0);
    assert_eq!(listing.names, [".", "..", "hello"]);
    assert_eq!(listing.attempts, 3);
    assert_eq!(listing.modes[2], Some(libc::S_IFREG | 0o444));
}

#[test]
fn listing_a_file_is_enotdir() {
    assert_eq!(harness().readdir("/hello").0, -20);
}

#[test]
fn listing_stops_when_the_buffer_fills() {
    let (status, listing) = harness().readdir_with_capacity("/", 1);
    assert_eq!(status, 0);
    assert_eq!(listing.names, ["."]);
    // ".." is refused; "hello" is never offered.
    assert_eq!(listing.attempts, 2);
}

#[test]
fn write_access_is_denied() {
    let harness = harness();
    assert_eq!(harness.open("/hello", libc::O_WRONLY).0, -13);
    assert_eq!(harness.open("/hello", libc::O_RDWR).0, -13);
    assert_eq!(harness.open("/", libc::O_RDONLY).0, -21);
    assert_eq!(harness.filesystem().open_handles(), 0);
}

#[test]
fn read_whole_file_then_eof() {
    let harness = harness();
    let (status, mut info) = harness.open("/hello", libc::O_RDONLY);
    assert_eq!(status, 0);
    assert_ne!(info.fh, 0);

    let (n, data) = harness.read("/hello", 100, 0, &mut info);
    assert_eq!(n, 12);
    assert_eq!(data, b"hello world.");

    let (n, data) = harness.read("/hello", 100, 12, &mut info);
    assert_eq!(n, 0);
    assert!(data.is_empty());

    let (n, data) = harness.read("/hello", 5, 6, &mut info);
    assert_eq!(n, 5);
    assert_eq!(data, b"world");

    assert_eq!(harness.release("/hello", &mut info), 0);
    assert_eq!(harness.filesystem().open_handles(), 0);
}

#[test]
fn negative_offset_is_einval() {
    let harness = harness();
    let mut info = FileInfo::new(libc::O_RDONLY);
    assert_eq!(harness.read("/hello", 10, -1, &mut info).0, -libc::EINVAL);
}

#[test]
fn releasing_an_unknown_handle_is_ebadf() {
    let harness = harness();
    let mut info = FileInfo::new(libc::O_RDONLY);
    info.fh = 999;
    assert_eq!(harness.release("/hello", &mut info), -libc::EBADF);
}

#[test]
fn each_open_gets_its_own_handle() {
    let harness = harness();
    let (_, mut a) = harness.open("/hello", libc::O_RDONLY);
    let (_, mut b) = harness.open("/hello", libc::O_RDONLY);
    assert_ne!(a.fh, b.fh);
    assert_eq!(harness.filesystem().open_handles(), 2);
    assert_eq!(harness.release("/hello", &mut a), 0);
    assert_eq!(harness.release("/hello", &mut b), 0);
}

#[test]
fn custom_name_and_content() {
    let harness = Harness::new(HelloFs::new("greeting", "hi")).unwrap();
    assert_eq!(harness.getattr("/hello").0, -2);
    let (status, stat) = harness.getattr("/greeting");
    assert_eq!(status, 0);
    assert_eq!(stat.st_size.get(), 2);
    assert_eq!(harness.readdir("/").1.names, [".", "..", "greeting"]);
}

#[test]
fn destroy_runs_once() {
    let harness = harness();
    harness.destroy();
    harness.destroy();
}

#[test]
fn concurrent_callers_share_one_session() {
    const WORKERS: usize = 8;
    const ROUNDS: usize = 50;

    let harness = harness();
    let handles: Vec<u64> = thread::scope(|scope| {
        let workers: Vec<_> = (0..WORKERS)
            .map(|_| {
                let harness = &harness;
                scope.spawn(move || {
                    // No context on this thread until it enters.
                    assert_eq!(harness.getattr("/hello").0, -libc::EIO);
                    harness.enter();

                    let mut seen = Vec::with_capacity(ROUNDS);
                    for _ in 0..ROUNDS {
                        let (status, stat) = harness.getattr("/hello");
                        assert_eq!(status, 0);
                        assert_eq!(stat.st_size.get(), 12);

                        let (status, mut info) = harness.open("/hello", libc::O_RDONLY);
                        assert_eq!(status, 0);
                        seen.push(info.fh);

                        let (n, data) = harness.read("/hello", 5, 6, &mut info);
                        assert_eq!(n, 5);
                        assert_eq!(data, b"world");

                        assert_eq!(harness.release("/hello", &mut info), 0);
                    }
                    seen
                })
            })
            .collect();
        workers.into_iter().flat_map(|w| w.join().unwrap()).collect()
    });

    assert_eq!(handles.len(), WORKERS * ROUNDS);
    let unique: HashSet<_> = handles.iter().collect();
    assert_eq!(unique.len(), handles.len());
    assert_eq!(harness.filesystem().open_handles(), 0);
}
