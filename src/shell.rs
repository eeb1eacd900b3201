//! The interactive command loop: reads one line at a time, dispatches to a
//! filesystem operation, and reports the result without ever terminating
//! the loop on its own.

use crate::device::BlockDevice;
use crate::fs::Filesystem;
use std::io::{BufRead, Write};

/// How the command loop in [`run_shell`] ended.
#[derive(Debug, PartialEq, Eq)]
pub enum ShellExit {
    /// The user ran `shutdown` and the device closed cleanly.
    ShutdownOk,
    /// The user ran `shutdown` but closing the device failed.
    ShutdownFailed,
    /// Input was exhausted (EOF or a blank line) without `shutdown` ever
    /// being run; the device is still open.
    Eof,
}

/// Runs the `=>`-prompt command loop against `fs` until `input` is
/// exhausted, a blank line is read, or the user runs `shutdown`.
pub fn run_shell<D: BlockDevice>(
    fs: &mut Filesystem<D>,
    mut input: impl BufRead,
    mut output: impl Write,
) -> ShellExit {
    let mut line = String::new();
    loop {
        let _ = write!(output, "=> ");
        let _ = output.flush();

        line.clear();
        let read = input.read_line(&mut line).unwrap_or(0);
        if read == 0 {
            return ShellExit::Eof;
        }
        let mut tokens = line.split_whitespace();
        let Some(cmd) = tokens.next() else {
            return ShellExit::Eof;
        };

        let result = match cmd {
            "ls" => {
                let path = tokens.next().unwrap_or("/");
                fs.ls(path).map(|entries| {
                    for (name, _) in entries {
                        let _ = writeln!(output, "{name}");
                    }
                })
            }
            "mkdir" => match tokens.next() {
                Some(path) => fs.mkdir(path),
                None => {
                    let _ = writeln!(output, "mkdir: missing operand");
                    continue;
                }
            },
            "touch" => match tokens.next() {
                Some(path) => fs.touch(path),
                None => {
                    let _ = writeln!(output, "touch: missing operand");
                    continue;
                }
            },
            "cp" => match (tokens.next(), tokens.next()) {
                (Some(dest), Some(src)) => fs.cp(dest, src),
                _ => {
                    let _ = writeln!(output, "cp: usage: cp <dest> <src>");
                    continue;
                }
            },
            "shutdown" => {
                return if fs.shutdown().is_ok() {
                    ShellExit::ShutdownOk
                } else {
                    ShellExit::ShutdownFailed
                };
            }
            other => {
                let _ = writeln!(output, "unknown command: {other}");
                continue;
            }
        };

        if let Err(e) = result {
            let _ = writeln!(output, "{cmd}: {e}");
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::device::MemBlockDevice;

    fn fresh() -> Filesystem<MemBlockDevice> {
        let mut fs = Filesystem::open(MemBlockDevice::new()).unwrap();
        fs.init().unwrap();
        fs
    }

    #[test]
    fn mkdir_then_ls_shows_entry() {
        let mut fs = fresh();
        let input = b"mkdir /a\nls /\n" as &[u8];
        let mut out = Vec::new();
        run_shell(&mut fs, input, &mut out);
        let out = String::from_utf8(out).unwrap();
        assert!(out.contains('a'));
    }

    #[test]
    fn unknown_command_does_not_abort_loop() {
        let mut fs = fresh();
        let input = b"frobnicate\nls /\n" as &[u8];
        let mut out = Vec::new();
        run_shell(&mut fs, input, &mut out);
        let out = String::from_utf8(out).unwrap();
        assert!(out.contains("unknown command"));
    }
}
