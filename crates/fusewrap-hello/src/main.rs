//! fusewrap-hello binary.
//!
//! Mounts a read-only filesystem holding one file.
//!
//! ```bash
//! mkdir -p /tmp/fuse
//! fusewrap-hello /tmp/fuse
//! cat /tmp/fuse/hello
//! fusermount -u /tmp/fuse
//! ```

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::Parser;
use fusewrap::{FuseLibrary, MountArgs};
use fusewrap_hello::{DEFAULT_CONTENT, DEFAULT_NAME, HelloFs};
use tracing_subscriber::{EnvFilter, fmt};

/// Read-only single-file filesystem.
#[derive(Parser, Debug)]
#[command(name = "fusewrap-hello")]
#[command(about = "Mount a read-only filesystem holding one file")]
struct Args {
    /// Directory to mount on
    #[arg(default_value = "/tmp/fuse")]
    mountpoint: PathBuf,

    /// Name of the file at the root
    #[arg(long, default_value = DEFAULT_NAME)]
    name: String,

    /// Content of the file
    #[arg(long, default_value = DEFAULT_CONTENT)]
    content: String,

    /// Let libfuse daemonize instead of staying in the foreground
    #[arg(long)]
    background: bool,

    /// Enable libfuse debug output
    #[arg(short, long)]
    debug: bool,

    /// Run the libfuse loop on a single thread
    #[arg(short, long)]
    single_threaded: bool,

    /// Mount option passed through as -o (repeatable)
    #[arg(short = 'o', long = "option")]
    options: Vec<String>,

    /// Program name passed as argv[0]
    #[arg(long, default_value = "fusewrap-hello")]
    program: String,
}

impl Args {
    fn mount_args(&self) -> MountArgs {
        self.options.iter().fold(
            MountArgs::new(&self.program)
                .mountpoint(&self.mountpoint)
                .foreground(!self.background)
                .debug(self.debug)
                .single_threaded(self.single_threaded),
            |args, option| args.option(option),
        )
    }
}

fn run(args: Args) -> Result<i32> {
    let library = FuseLibrary::open().context("libfuse 2.x is required")?;
    let fs = HelloFs::new(&args.name, args.content.as_bytes());
    tracing::info!(
        mountpoint = %args.mountpoint.display(),
        file = %args.name,
        "mounting hello filesystem"
    );
    let status = fusewrap::mount(&library, &args.mount_args(), fs).context("mount failed")?;
    Ok(status)
}

fn main() -> ExitCode {
    fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    match run(Args::parse()) {
        Ok(0) => ExitCode::SUCCESS,
        Ok(status) => {
            tracing::warn!(status, "fuse main loop exited with an error");
            ExitCode::from(u8::try_from(status).unwrap_or(1))
        }
        Err(e) => {
            tracing::error!("{e:#}");
            ExitCode::FAILURE
        }
    }
}
