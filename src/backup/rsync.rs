//! rsync invocation
//!
//! Builds rsync argument lists for the three kinds of runs the transport
//! needs (real transfer, size estimate, verification) and runs rsync as a
//! sub-process, streaming its output line by line.

use std::io::{BufRead, BufReader, Read};
use std::process::{Command, Stdio};
use std::thread;

use crate::error::{BackeeError, BackeeResult};
use crate::models::{FilesItem, SshServer};

/// rsync exit code for a clean run
pub const RSYNC_STATUS_SUCCESS: i32 = 0;

/// rsync exit code for "some source files vanished before they could be
/// transferred"
pub const RSYNC_STATUS_SOURCE_VANISHED: i32 = 24;

/// Whether the caller wants more output lines
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LineFlow {
    Continue,
    Stop,
}

/// How a sub-process ended
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessExit {
    pub code: i32,
    pub stderr: String,
}

/// Runs local sub-processes
pub trait ProcessRunner {
    /// Run `program` with `args`, handing each stdout line to `on_line`
    ///
    /// When `on_line` returns `LineFlow::Stop` the remaining output is
    /// discarded, but the process is still waited for.
    fn run(
        &self,
        program: &str,
        args: &[String],
        on_line: &mut dyn FnMut(&str) -> LineFlow,
    ) -> BackeeResult<ProcessExit>;
}

impl<T: ProcessRunner + ?Sized> ProcessRunner for &T {
    fn run(
        &self,
        program: &str,
        args: &[String],
        on_line: &mut dyn FnMut(&str) -> LineFlow,
    ) -> BackeeResult<ProcessExit> {
        (**self).run(program, args, on_line)
    }
}

/// Runs sub-processes with `std::process`
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemProcess;

impl ProcessRunner for SystemProcess {
    fn run(
        &self,
        program: &str,
        args: &[String],
        on_line: &mut dyn FnMut(&str) -> LineFlow,
    ) -> BackeeResult<ProcessExit> {
        let mut child = Command::new(program)
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| BackeeError::Io(format!("Failed to start {}: {}", program, e)))?;

        // Drain stderr concurrently so a chatty process cannot block on a full pipe
        let stderr_reader = child.stderr.take().map(|mut stderr| {
            thread::spawn(move || {
                let mut buf = String::new();
                let _ = stderr.read_to_string(&mut buf);
                buf
            })
        });

        if let Some(stdout) = child.stdout.take() {
            let mut reading = true;
            for line in BufReader::new(stdout).lines() {
                let line = line.map_err(|e| {
                    BackeeError::Io(format!("Failed to read {} output: {}", program, e))
                })?;
                if reading && on_line(line.trim_end()) == LineFlow::Stop {
                    reading = false;
                }
            }
        }

        let status = child
            .wait()
            .map_err(|e| BackeeError::Io(format!("Failed to wait for {}: {}", program, e)))?;

        let stderr = stderr_reader
            .and_then(|handle| handle.join().ok())
            .unwrap_or_default();

        Ok(ProcessExit {
            code: status.code().unwrap_or(-1),
            stderr: stderr
                .lines()
                .map(str::trim_end)
                .collect::<Vec<_>>()
                .join("\n"),
        })
    }
}

/// Kind of rsync run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RsyncMode {
    /// Real transfer into a new snapshot
    Transfer,
    /// Dry run printing transfer statistics
    Estimate,
    /// Dry run itemizing differences against a snapshot
    Verify,
}

/// Builder for an rsync argument list
#[derive(Debug, Clone)]
pub struct RsyncCommand<'a> {
    server: &'a SshServer,
    mode: RsyncMode,
    link_dest: Option<&'a str>,
}

impl<'a> RsyncCommand<'a> {
    pub fn new(server: &'a SshServer, mode: RsyncMode) -> Self {
        Self {
            server,
            mode,
            link_dest: None,
        }
    }

    /// Hard-link unchanged files against this directory
    pub fn link_dest(mut self, path: Option<&'a str>) -> Self {
        self.link_dest = path;
        self
    }

    /// Value of `--rsh`
    pub fn remote_shell(&self) -> String {
        let mut rsh = format!("ssh -p {}", self.server.port);
        if let Some(key) = &self.server.key_path {
            rsh.push_str(&format!(" -i '{}'", key));
        }
        rsh.push_str(" -o StrictHostKeyChecking=no");
        rsh
    }

    /// Full argument list copying `item` to `remote_path`
    pub fn args(&self, item: &FilesItem, remote_path: &str) -> Vec<String> {
        let flags: &[&str] = match self.mode {
            RsyncMode::Transfer => &[
                "--archive",
                "--progress",
                "--compress",
                "--verbose",
                "--human-readable",
                "--relative",
            ],
            RsyncMode::Estimate => &["--archive", "--stats", "--compress", "--dry-run", "--relative"],
            RsyncMode::Verify => &[
                "--archive",
                "--verbose",
                "--hard-links",
                "--progress",
                "--itemize-changes",
                "--dry-run",
                "--compress",
                "--relative",
            ],
        };

        let mut args: Vec<String> = flags.iter().map(|f| f.to_string()).collect();
        args.push(format!("--rsh={}", self.remote_shell()));

        if self.mode != RsyncMode::Verify {
            if let Some(link_dest) = self.link_dest {
                args.push(format!("--link-dest={}", link_dest));
            }
        }

        for exclude in &item.excludes {
            args.push(format!("--exclude={}", exclude));
        }
        args.extend(item.includes.iter().cloned());
        args.push(format!("{}:{}", self.server.destination(), remote_path));
        args
    }
}

/// Interpret an rsync exit status
///
/// Vanished source files are tolerated with a warning; any other non-zero
/// status is a `Transfer` error.
pub fn check_exit(exit: &ProcessExit, destination: &str) -> BackeeResult<()> {
    match exit.code {
        RSYNC_STATUS_SUCCESS => Ok(()),
        RSYNC_STATUS_SOURCE_VANISHED => {
            tracing::warn!(
                stderr = %exit.stderr,
                "source item vanished before rsync was able to copy it over"
            );
            Ok(())
        }
        code => {
            tracing::error!(
                exit_code = code,
                stderr = %exit.stderr,
                "rsync finished with non-zero exit code"
            );
            Err(BackeeError::Transfer {
                destination: destination.to_string(),
                exit_code: code,
                stderr: exit.stderr.clone(),
            })
        }
    }
}
