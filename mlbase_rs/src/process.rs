//! Blocking external-process helpers.
//!
//! Editors, `git` and plugin executables all run to completion in the
//! foreground. Their exit status is returned to the caller instead of being
//! swallowed, so it can be surfaced as a warning in the command's report.

use std::io::{self, Write};
use std::path::Path;
use std::process::{Command, Stdio};

use tracing::debug;

/// How an external program finished.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExternalStatus {
    /// Program and arguments as launched, for messages.
    pub command: String,
    /// Exit code; `None` when terminated by a signal.
    pub code: Option<i32>,
}

impl ExternalStatus {
    pub fn success(&self) -> bool {
        self.code == Some(0)
    }

    /// Warning text for a failed run, `None` on success.
    pub fn warning(&self) -> Option<String> {
        match self.code {
            Some(0) => None,
            Some(code) => Some(format!("`{}` exited with status {}", self.command, code)),
            None => Some(format!("`{}` was terminated by a signal", self.command)),
        }
    }

    /// Exit code suitable for the process exit status.
    pub fn exit_code(&self) -> i32 {
        self.code.unwrap_or(1)
    }
}

/// Output captured from a program run with piped stdout.
#[derive(Debug, Clone)]
pub struct Captured {
    pub status: ExternalStatus,
    pub stdout: Vec<u8>,
}

fn describe(program: &Path, args: &[String]) -> String {
    let mut parts = vec![program.display().to_string()];
    parts.extend(args.iter().cloned());
    parts.join(" ")
}

fn command(program: &Path, args: &[String], cwd: Option<&Path>) -> Command {
    let mut cmd = Command::new(program);
    cmd.args(args);
    if let Some(dir) = cwd {
        cmd.current_dir(dir);
    }
    cmd
}

/// Run with inherited stdio and wait.
pub fn run(program: &Path, args: &[String], cwd: Option<&Path>) -> io::Result<ExternalStatus> {
    let described = describe(program, args);
    debug!(command = %described, "running");
    let status = command(program, args, cwd).status()?;
    Ok(ExternalStatus {
        command: described,
        code: status.code(),
    })
}

/// Run with `input` written to stdin, stdout/stderr inherited.
pub fn run_with_stdin(
    program: &Path,
    args: &[String],
    input: &[u8],
) -> io::Result<ExternalStatus> {
    let described = describe(program, args);
    debug!(command = %described, bytes = input.len(), "running with stdin");
    let mut child = command(program, args, None)
        .stdin(Stdio::piped())
        .spawn()?;
    if let Some(mut stdin) = child.stdin.take() {
        // A program that exits without reading stdin closes the pipe early.
        match stdin.write_all(input) {
            Err(e) if e.kind() == io::ErrorKind::BrokenPipe => {}
            other => other?,
        }
    }
    let status = child.wait()?;
    Ok(ExternalStatus {
        command: described,
        code: status.code(),
    })
}

/// Run with stdout captured and stderr inherited.
pub fn capture(program: &Path, args: &[String], cwd: Option<&Path>) -> io::Result<Captured> {
    let described = describe(program, args);
    debug!(command = %described, "capturing");
    let output = command(program, args, cwd)
        .stdin(Stdio::null())
        .stderr(Stdio::inherit())
        .output()?;
    Ok(Captured {
        status: ExternalStatus {
            command: described,
            code: output.status.code(),
        },
        stdout: output.stdout,
    })
}
