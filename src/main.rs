//! `blockfs` — opens (or creates) an image file and drives the command
//! loop against it from stdin.

use blockfs::device::FileBlockDevice;
use blockfs::fs::Filesystem;
use blockfs::shell::{run_shell, ShellExit};
use std::env;
use std::io;
use std::process::exit;

fn usage(bin: &str) -> ! {
    eprintln!("usage: {bin} <image-path>");
    exit(1);
}

fn main() {
    let mut args = env::args();
    let bin = args.next().unwrap_or_else(|| "blockfs".to_string());
    let arg = args.next();
    if matches!(arg.as_deref(), Some("-h" | "--help")) {
        println!("usage: {bin} <image-path>");
        exit(0);
    }
    let Some(path) = arg else {
        usage(&bin);
    };

    env_logger::init();

    let device = FileBlockDevice::create_or_open(&path).unwrap_or_else(|e| {
        eprintln!("{bin}: {path}: {e}");
        exit(1);
    });
    let mut fs = Filesystem::open(device).unwrap_or_else(|e| {
        eprintln!("{bin}: {e}");
        exit(1);
    });
    fs.init().unwrap_or_else(|e| {
        eprintln!("{bin}: {e}");
        exit(1);
    });

    let stdin = io::stdin();
    let exit_code = match run_shell(&mut fs, stdin.lock(), io::stdout()) {
        ShellExit::ShutdownOk => 0,
        ShellExit::ShutdownFailed => 1,
        // Matches the command loop's contract: EOF doesn't imply a clean
        // shutdown, so we still try to close the device before exiting.
        ShellExit::Eof => {
            if fs.shutdown().is_ok() {
                0
            } else {
                1
            }
        }
    };
    exit(exit_code);
}
