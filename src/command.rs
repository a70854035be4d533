//! External command execution.
//!
//! Content classification and extraction shell out to system utilities
//! (`file`, `pdftotext`, `otool`, ...). Every invocation goes through the
//! [`CommandRunner`] trait so the extraction pipeline can be exercised with
//! scripted output instead of whatever happens to be installed.

use std::ffi::OsStr;
#[cfg(test)]
use std::ffi::OsString;
use std::io;
use std::process::Command;

/// Captured result of a finished process.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandOutput {
    /// Whether the process exited with status zero.
    pub success: bool,
    pub stdout: Vec<u8>,
    pub stderr: Vec<u8>,
}

impl CommandOutput {
    /// A successful result carrying `stdout`.
    pub fn ok(stdout: impl Into<Vec<u8>>) -> Self {
        Self {
            success: true,
            stdout: stdout.into(),
            stderr: Vec::new(),
        }
    }

    /// A failed result carrying `stderr`.
    pub fn failed(stderr: impl Into<Vec<u8>>) -> Self {
        Self {
            success: false,
            stdout: Vec::new(),
            stderr: stderr.into(),
        }
    }

    /// Stdout followed by stderr, lossily decoded.
    pub fn combined(&self) -> String {
        let mut bytes = self.stdout.clone();
        bytes.extend_from_slice(&self.stderr);
        String::from_utf8_lossy(&bytes).into_owned()
    }

    /// Stdout only, lossily decoded.
    pub fn stdout_lossy(&self) -> String {
        String::from_utf8_lossy(&self.stdout).into_owned()
    }

    /// Stderr only, trimmed. Used in error messages.
    pub fn stderr_trimmed(&self) -> String {
        String::from_utf8_lossy(&self.stderr).trim().to_string()
    }
}

/// Runs an external program to completion.
///
/// Arguments are `OsStr` so file names that are not valid UTF-8 reach the
/// program byte for byte.
///
/// An `Err` means the program could not be started at all; a program that
/// starts and exits non-zero is reported through [`CommandOutput::success`].
pub trait CommandRunner: Send + Sync {
    fn run(&self, program: &str, args: &[&OsStr]) -> io::Result<CommandOutput>;
}

/// Runs commands on the host with [`std::process::Command`]. Blocks until the
/// child exits; no timeout is applied.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemRunner;

impl CommandRunner for SystemRunner {
    fn run(&self, program: &str, args: &[&OsStr]) -> io::Result<CommandOutput> {
        tracing::debug!(program, ?args, "running external command");
        let output = Command::new(program).args(args).output()?;
        if !output.status.success() {
            tracing::debug!(program, status = %output.status, "command exited non-zero");
        }
        Ok(CommandOutput {
            success: output.status.success(),
            stdout: output.stdout,
            stderr: output.stderr,
        })
    }
}

/// Test double that answers every invocation from a closure and records
/// the command lines it was asked to run. The closure sees arguments
/// lossily decoded; [`ScriptedRunner::raw_calls`] keeps the exact bytes.
#[cfg(test)]
pub(crate) struct ScriptedRunner<F> {
    respond: F,
    calls: std::sync::Mutex<Vec<Vec<OsString>>>,
}

#[cfg(test)]
impl<F> ScriptedRunner<F>
where
    F: Fn(&str, &[&str]) -> io::Result<CommandOutput> + Send + Sync,
{
    pub(crate) fn new(respond: F) -> Self {
        Self {
            respond,
            calls: std::sync::Mutex::new(Vec::new()),
        }
    }

    /// Every recorded invocation as `[program, args...]`.
    pub(crate) fn calls(&self) -> Vec<Vec<String>> {
        self.raw_calls()
            .into_iter()
            .map(|line| {
                line.iter()
                    .map(|a| a.to_string_lossy().into_owned())
                    .collect()
            })
            .collect()
    }

    pub(crate) fn raw_calls(&self) -> Vec<Vec<OsString>> {
        self.calls.lock().unwrap().clone()
    }

    pub(crate) fn programs(&self) -> Vec<String> {
        self.calls().into_iter().map(|c| c[0].clone()).collect()
    }
}

#[cfg(test)]
impl<F> CommandRunner for ScriptedRunner<F>
where
    F: Fn(&str, &[&str]) -> io::Result<CommandOutput> + Send + Sync,
{
    fn run(&self, program: &str, args: &[&OsStr]) -> io::Result<CommandOutput> {
        let mut line = vec![OsString::from(program)];
        line.extend(args.iter().map(|a| a.to_os_string()));
        self.calls.lock().unwrap().push(line);

        let lossy: Vec<String> = args
            .iter()
            .map(|a| a.to_string_lossy().into_owned())
            .collect();
        let lossy: Vec<&str> = lossy.iter().map(String::as_str).collect();
        (self.respond)(program, &lossy)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn combined_appends_stderr_after_stdout() {
        let out = CommandOutput {
            success: false,
            stdout: b"out\n".to_vec(),
            stderr: b"err\n".to_vec(),
        };
        assert_eq!(out.combined(), "out\nerr\n");
        assert_eq!(out.stderr_trimmed(), "err");
    }

    #[test]
    fn missing_program_is_a_spawn_error() {
        let err = SystemRunner
            .run("wut-definitely-not-installed", &[])
            .unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::NotFound);
    }

    #[cfg(unix)]
    #[test]
    fn system_runner_captures_status_and_output() {
        let out = SystemRunner
            .run(
                "sh",
                &["-c", "printf hello; printf oops >&2; exit 3"].map(OsStr::new),
            )
            .unwrap();
        assert!(!out.success);
        assert_eq!(out.stdout_lossy(), "hello");
        assert_eq!(out.stderr_trimmed(), "oops");
    }
}
