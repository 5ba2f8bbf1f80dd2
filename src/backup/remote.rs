//! Remote command execution
//!
//! Runs shell commands on a backup server through the system OpenSSH
//! client. A master connection is opened on first use and shared by every
//! following command through a control socket; it is re-opened when it has
//! gone away and closed when the session is dropped.

use std::path::PathBuf;
use std::process::{Command, Output, Stdio};

use tempfile::TempDir;

use crate::error::{BackeeError, BackeeResult};
use crate::models::SshServer;

/// Tools that must be installed locally to back up over SSH
pub const REQUIRED_TOOLS: [&str; 2] = ["rsync", "ssh"];

/// Executes shell command strings on one remote host
pub trait RemoteShell {
    /// Run a command and return its trimmed standard output
    ///
    /// Any output on standard error is treated as a failure.
    fn execute(&mut self, command: &str) -> BackeeResult<String>;
}

/// Run a command and capture its exit status alongside its output
///
/// The status is echoed by the remote shell as the last output line so that
/// failures show up without anything being written to standard error.
pub fn run_remote<S: RemoteShell + ?Sized>(shell: &mut S, command: &str) -> BackeeResult<(String, i32)> {
    let output = shell.execute(&format!("{}; echo $?", command))?;
    let (stdout, status) = match output.rsplit_once('\n') {
        Some((stdout, status)) => (stdout.to_string(), status),
        None => (String::new(), output.as_str()),
    };

    let code = status.trim().parse::<i32>().map_err(|_| BackeeError::RemoteCommand {
        command: command.to_string(),
        stderr: format!("unexpected exit status output '{}'", status),
    })?;

    Ok((stdout, code))
}

/// Quote a value for a POSIX shell
pub fn shell_quote(value: &str) -> String {
    format!("'{}'", value.replace('\'', r"'\''"))
}

/// Fail with `MissingDependency` unless every tool is on the PATH
pub fn check_dependencies(tools: &[&str]) -> BackeeResult<()> {
    for tool in tools {
        let found = Command::new("sh")
            .arg("-c")
            .arg(format!("command -v {}", shell_quote(tool)))
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
            .map(|status| status.success())
            .unwrap_or(false);

        if !found {
            return Err(BackeeError::MissingDependency(tool.to_string()));
        }
    }
    Ok(())
}

/// Join the lines of a command output, trimming trailing whitespace
fn joined_lines(bytes: &[u8]) -> String {
    String::from_utf8_lossy(bytes)
        .lines()
        .map(str::trim_end)
        .collect::<Vec<_>>()
        .join("\n")
}

/// An SSH session to one server
pub struct SshSession {
    server: SshServer,
    /// Holds the control socket; removed with the session
    socket_dir: TempDir,
    connected: bool,
}

impl SshSession {
    /// Prepare a session; the connection itself is opened lazily
    pub fn new(server: SshServer) -> BackeeResult<Self> {
        check_dependencies(&REQUIRED_TOOLS)?;

        let socket_dir = tempfile::Builder::new()
            .prefix("backee-ssh-")
            .tempdir()
            .map_err(|e| BackeeError::Io(format!("Failed to create control socket directory: {}", e)))?;

        Ok(Self {
            server,
            socket_dir,
            connected: false,
        })
    }

    fn socket_path(&self) -> PathBuf {
        self.socket_dir.path().join("control")
    }

    /// Base ssh invocation sharing the control socket
    fn ssh(&self) -> Command {
        let mut cmd = Command::new("ssh");
        cmd.arg("-S")
            .arg(self.socket_path())
            .arg("-p")
            .arg(self.server.port.to_string())
            .arg("-o")
            .arg("StrictHostKeyChecking=no")
            .arg("-o")
            .arg("BatchMode=yes")
            .arg("-o")
            .arg("LogLevel=ERROR");
        if let Some(key) = &self.server.key_path {
            cmd.arg("-i").arg(key);
        }
        cmd
    }

    fn is_connected(&self) -> bool {
        if !self.connected {
            return false;
        }
        self.ssh()
            .arg("-O")
            .arg("check")
            .arg(self.server.destination())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
            .map(|status| status.success())
            .unwrap_or(false)
    }

    fn ensure_connection(&mut self) -> BackeeResult<()> {
        if self.is_connected() {
            return Ok(());
        }

        tracing::debug!(server = %self.server.name, host = %self.server.hostname, "opening ssh connection");
        let output = self
            .ssh()
            .arg("-M")
            .arg("-N")
            .arg("-f")
            .arg("-o")
            .arg("ControlPersist=yes")
            .arg(self.server.destination())
            .stdin(Stdio::null())
            .output()
            .map_err(|e| BackeeError::Io(format!("Failed to start ssh: {}", e)))?;

        if !output.status.success() {
            return Err(BackeeError::RemoteCommand {
                command: format!("connect to {}", self.server.destination()),
                stderr: joined_lines(&output.stderr),
            });
        }

        self.connected = true;
        Ok(())
    }

    fn run(&mut self, command: &str) -> BackeeResult<Output> {
        self.ensure_connection()?;
        self.ssh()
            .arg(self.server.destination())
            .arg("--")
            .arg(command)
            .stdin(Stdio::null())
            .output()
            .map_err(|e| BackeeError::Io(format!("Failed to run ssh: {}", e)))
    }
}

impl RemoteShell for SshSession {
    fn execute(&mut self, command: &str) -> BackeeResult<String> {
        tracing::trace!(command, "remote command");
        let output = self.run(command)?;

        let stderr = joined_lines(&output.stderr);
        if !stderr.is_empty() {
            return Err(BackeeError::RemoteCommand {
                command: command.to_string(),
                stderr,
            });
        }

        Ok(joined_lines(&output.stdout))
    }
}

impl Drop for SshSession {
    fn drop(&mut self) {
        if !self.connected {
            return;
        }
        let closed = self
            .ssh()
            .arg("-O")
            .arg("exit")
            .arg(self.server.destination())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status();
        if let Err(e) = closed {
            tracing::debug!(error = %e, "failed to close ssh master connection");
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use std::collections::VecDeque;

    /// Remote shell replaying canned responses and recording commands
    #[derive(Default)]
    pub(crate) struct ScriptedShell {
        pub commands: Vec<String>,
        pub responses: VecDeque<BackeeResult<String>>,
    }

    impl ScriptedShell {
        pub fn respond(mut self, output: &str) -> Self {
            self.responses.push_back(Ok(output.to_string()));
            self
        }

        pub fn fail(mut self, stderr: &str) -> Self {
            self.responses.push_back(Err(BackeeError::RemoteCommand {
                command: String::new(),
                stderr: stderr.to_string(),
            }));
            self
        }
    }

    impl RemoteShell for ScriptedShell {
        fn execute(&mut self, command: &str) -> BackeeResult<String> {
            self.commands.push(command.to_string());
            self.responses
                .pop_front()
                .unwrap_or_else(|| Ok(String::new()))
        }
    }

    #[test]
    fn test_run_remote_splits_status() {
        let mut shell = ScriptedShell::default().respond("line 1\nline 2\n0");
        let (stdout, code) = run_remote(&mut shell, "ls").unwrap();
        assert_eq!(stdout, "line 1\nline 2");
        assert_eq!(code, 0);
        assert_eq!(shell.commands, vec!["ls; echo $?"]);
    }

    #[test]
    fn test_run_remote_status_only() {
        let mut shell = ScriptedShell::default().respond("1");
        let (stdout, code) = run_remote(&mut shell, "false").unwrap();
        assert!(stdout.is_empty());
        assert_eq!(code, 1);
    }

    #[test]
    fn test_run_remote_rejects_garbage_status() {
        let mut shell = ScriptedShell::default().respond("oops");
        let err = run_remote(&mut shell, "true").unwrap_err();
        assert!(matches!(err, BackeeError::RemoteCommand { .. }));
    }

    #[test]
    fn test_run_remote_propagates_stderr_failure() {
        let mut shell = ScriptedShell::default().fail("permission denied");
        let err = run_remote(&mut shell, "mkdir /root/x").unwrap_err();
        assert!(err.to_string().contains("permission denied"));
    }

    #[test]
    fn test_shell_quote() {
        assert_eq!(shell_quote("/srv/backups"), "'/srv/backups'");
        assert_eq!(shell_quote("it's"), r"'it'\''s'");
    }

    #[test]
    fn test_missing_dependency() {
        let err = check_dependencies(&["backee-no-such-tool-xyz"]).unwrap_err();
        assert!(matches!(err, BackeeError::MissingDependency(tool) if tool == "backee-no-such-tool-xyz"));
    }

    #[test]
    fn test_shell_is_available() {
        check_dependencies(&["sh"]).unwrap();
    }

    #[test]
    fn test_joined_lines_trims_trailing_whitespace() {
        assert_eq!(joined_lines(b"a  \nb\r\n"), "a\nb");
    }
}
