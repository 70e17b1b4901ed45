//! Helpers for running the external CLIs the adapters wrap.

use std::io;
use std::process::{Output, Stdio};
use tokio::io::AsyncWriteExt;
use tokio::process::Command;

/// Build a command from a configured program string.
///
/// The string is split on whitespace so leading arguments can be configured
/// alongside the program (`"cloudctl --insecure"`). No shell quoting applies.
pub fn program_command(program: &str) -> io::Result<Command> {
    let mut parts = program.split_whitespace();
    let name = parts.next().ok_or_else(|| {
        io::Error::new(io::ErrorKind::InvalidInput, "empty program in configuration")
    })?;
    let mut cmd = Command::new(name);
    cmd.args(parts);
    Ok(cmd)
}

/// Run to completion with captured output, optionally feeding `stdin`.
pub async fn run_captured(mut cmd: Command, stdin: Option<&[u8]>) -> io::Result<Output> {
    cmd.stdin(if stdin.is_some() { Stdio::piped() } else { Stdio::null() })
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);

    let mut child = cmd.spawn()?;
    if let Some(input) = stdin {
        if let Some(mut pipe) = child.stdin.take() {
            // A program may exit without reading its input.
            match pipe.write_all(input).await {
                Err(e) if e.kind() != io::ErrorKind::BrokenPipe => return Err(e),
                _ => {}
            }
            drop(pipe);
        }
    }
    child.wait_with_output().await
}

/// Stdout and stderr joined, lossily decoded.
pub fn combined_output(output: &Output) -> String {
    let mut text = String::from_utf8_lossy(&output.stdout).into_owned();
    let stderr = String::from_utf8_lossy(&output.stderr);
    if !stderr.trim().is_empty() {
        if !text.is_empty() && !text.ends_with('\n') {
            text.push('\n');
        }
        text.push_str(&stderr);
    }
    text
}
