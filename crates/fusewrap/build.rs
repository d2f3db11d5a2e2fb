fn main() {
    #[cfg(feature = "native-layout")]
    layout_report::build();
}

/// Compiles `c/layout_report.c` against the installed `fuse.h`.
#[cfg(feature = "native-layout")]
mod layout_report {
    pub fn build() {
        println!("cargo::rerun-if-changed=c/layout_report.c");
        println!("cargo::rerun-if-env-changed=FUSE_INCLUDE_DIR");

        let mut build = cc::Build::new();
        build.file("c/layout_report.c").warnings(true);
        match std::env::var_os("FUSE_INCLUDE_DIR") {
            Some(dir) => {
                build.include(dir);
            }
            None => {
                // Only the headers are wanted; libfuse itself is loaded at runtime.
                let fuse = pkg_config::Config::new()
                    .atleast_version("2.9")
                    .cargo_metadata(false)
                    .probe("fuse")
                    .expect("libfuse 2.x headers not found; install them or set FUSE_INCLUDE_DIR");
                for dir in fuse.include_paths {
                    build.include(dir);
                }
            }
        }
        build.compile("fusewrap_layout_report");
    }
}
