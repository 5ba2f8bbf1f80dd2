//! Snapshot transport
//!
//! Remote directory choreography for snapshots: existence checks, create,
//! rename and remove, `current` link management, free-space queries, and the
//! rsync runs that move, estimate and verify data.

use std::sync::OnceLock;

use regex::Regex;

use super::layout::{join, parse_snapshot_name, SNAPSHOT_PREFIX};
use super::remote::{run_remote, shell_quote, RemoteShell};
use super::rsync::{check_exit, LineFlow, ProcessExit, ProcessRunner, RsyncCommand, RsyncMode};
use crate::error::{BackeeError, BackeeResult};
use crate::models::{FilesItem, SshServer};

/// Operations on the snapshot area of one server
///
/// Implemented over SSH by [`SnapshotTransport`]; the engine only talks to
/// this trait.
pub trait SnapshotStore {
    fn dir_exists(&mut self, path: &str) -> BackeeResult<bool>;

    /// Create a directory and its parents; succeeds if it already exists
    fn create_dir(&mut self, path: &str) -> BackeeResult<()>;

    /// Remove directories recursively; an empty list is a no-op
    fn remove_dirs(&mut self, paths: &[String]) -> BackeeResult<()>;

    /// Names of the immediate subdirectories of `root`, sorted ascending
    ///
    /// Returns an empty list if `root` does not exist.
    fn list_snapshot_names(&mut self, root: &str) -> BackeeResult<Vec<String>>;

    /// Number of subdirectories of `root` whose name ends with `suffix`
    fn count_temp_dirs(&mut self, root: &str, suffix: &str) -> BackeeResult<usize>;

    fn rename_dir(&mut self, from: &str, to: &str) -> BackeeResult<()>;

    /// Replace `link` with a symlink to `target`
    fn relink_current(&mut self, target: &str, link: &str) -> BackeeResult<()>;

    /// Free bytes on the file system holding `root`
    fn available_bytes(&mut self, root: &str) -> BackeeResult<u64>;

    /// Bytes a transfer of `item` to `remote_path` would move
    fn estimate_transfer_bytes(
        &mut self,
        item: &FilesItem,
        base_link: &str,
        remote_path: &str,
    ) -> BackeeResult<u64>;

    /// Copy `item` to `remote_path`, hard-linking against `base_link` if it exists
    fn transmit(&mut self, base_link: &str, item: &FilesItem, remote_path: &str) -> BackeeResult<()>;

    /// Compare the local sources with a published snapshot
    fn verify(&mut self, item: &FilesItem, remote_path: &str) -> BackeeResult<bool>;

    /// Repair a missing `current` link
    ///
    /// Points `link` at the latest completed snapshot under `root`. Other
    /// directories, `-incomplete` ones included, are never link targets. Does
    /// nothing if the link resolves or if no completed snapshot exists yet.
    fn reconcile_current_link(&mut self, root: &str, link: &str) -> BackeeResult<()> {
        if self.dir_exists(link)? {
            tracing::debug!(link, "current link exists");
            return Ok(());
        }

        tracing::debug!(link, "current link not found, looking for the last backup");
        let last = self
            .list_snapshot_names(root)?
            .into_iter()
            .filter(|name| parse_snapshot_name(name, SNAPSHOT_PREFIX).is_some())
            .last();

        match last {
            Some(name) => {
                let target = join(root, &name);
                tracing::info!(snapshot = %target, link, "re-linking current to last backup");
                self.relink_current(&target, link)
            }
            None => {
                tracing::debug!(root, "no completed backup to link to");
                Ok(())
            }
        }
    }
}

/// Snapshot store on an SSH server
pub struct SnapshotTransport<S, P> {
    server: SshServer,
    shell: S,
    runner: P,
}

impl<S: RemoteShell, P: ProcessRunner> SnapshotTransport<S, P> {
    pub fn new(server: SshServer, shell: S, runner: P) -> Self {
        Self {
            server,
            shell,
            runner,
        }
    }

    /// Run a remote command that must exit with status 0
    ///
    /// The command's stderr is folded into its stdout so that a failing tool
    /// is judged by its exit status and its message ends up in the error.
    fn run_checked(&mut self, command: &str, operation: &'static str, path: &str) -> BackeeResult<String> {
        let (output, code) = run_remote(&mut self.shell, &format!("{{ {}; }} 2>&1", command))?;
        if code != 0 {
            let detail = if output.is_empty() {
                format!("exit status {}", code)
            } else {
                format!("exit status {}: {}", code, output)
            };
            return Err(BackeeError::RemoteIo {
                operation,
                path: path.to_string(),
                detail,
            });
        }
        Ok(output)
    }

    /// Base for `--link-dest`, if one exists on the server
    fn link_base<'a>(&mut self, base_link: &'a str) -> BackeeResult<Option<&'a str>> {
        if self.dir_exists(base_link)? {
            tracing::debug!(base_link, "links dir found");
            Ok(Some(base_link))
        } else {
            tracing::debug!(base_link, "links dir not found");
            Ok(None)
        }
    }

    fn rsync(&self, args: &[String], on_line: &mut dyn FnMut(&str) -> LineFlow) -> BackeeResult<ProcessExit> {
        self.runner.run("rsync", args, on_line)
    }
}

impl<S: RemoteShell, P: ProcessRunner> SnapshotStore for SnapshotTransport<S, P> {
    fn dir_exists(&mut self, path: &str) -> BackeeResult<bool> {
        tracing::debug!(path, "check existence");
        let output = self.shell.execute(&format!(
            "if [ -d {} ]; then echo true; else echo false; fi;",
            shell_quote(path)
        ))?;
        Ok(output == "true")
    }

    fn create_dir(&mut self, path: &str) -> BackeeResult<()> {
        tracing::debug!(path, "create directory");
        self.run_checked(&format!("mkdir -p {}", shell_quote(path)), "create directory", path)?;
        Ok(())
    }

    fn remove_dirs(&mut self, paths: &[String]) -> BackeeResult<()> {
        if paths.is_empty() {
            return Ok(());
        }

        tracing::debug!(?paths, "remove directories");
        let targets = paths.iter().map(|p| shell_quote(p)).collect::<Vec<_>>().join(" ");
        self.run_checked(&format!("rm -rf -- {}", targets), "remove directories", &paths.join(", "))?;
        Ok(())
    }

    fn list_snapshot_names(&mut self, root: &str) -> BackeeResult<Vec<String>> {
        let root = shell_quote(root);
        let output = self.shell.execute(&format!(
            "if [ -d {root} ]; then find {root} -mindepth 1 -maxdepth 1 -type d -exec basename {{}} \\; | sort; fi"
        ))?;
        let mut names: Vec<String> = output
            .lines()
            .map(str::trim)
            .filter(|l| !l.is_empty())
            .map(String::from)
            .collect();
        // Remote sort order depends on the locale; byte order is what rotation relies on
        names.sort();
        Ok(names)
    }

    fn count_temp_dirs(&mut self, root: &str, suffix: &str) -> BackeeResult<usize> {
        tracing::debug!(root, "checking for temp dirs");
        let output = self.shell.execute(&format!(
            "find {} -mindepth 1 -maxdepth 1 -type d -name {} | wc -l",
            shell_quote(root),
            shell_quote(&format!("*{}", suffix))
        ))?;
        output.trim().parse().map_err(|_| BackeeError::RemoteIo {
            operation: "count temp directories in",
            path: root.to_string(),
            detail: format!("unexpected output '{}'", output),
        })
    }

    fn rename_dir(&mut self, from: &str, to: &str) -> BackeeResult<()> {
        tracing::debug!(from, to, "rename");
        self.run_checked(
            &format!("mv {} {}", shell_quote(from), shell_quote(to)),
            "rename directory",
            from,
        )?;
        Ok(())
    }

    fn relink_current(&mut self, target: &str, link: &str) -> BackeeResult<()> {
        tracing::debug!(snapshot = target, link, "re-link");
        self.run_checked(
            &format!("rm -f {link} && ln -s {target} {link}", link = shell_quote(link), target = shell_quote(target)),
            "re-link",
            link,
        )?;
        Ok(())
    }

    fn available_bytes(&mut self, root: &str) -> BackeeResult<u64> {
        let output = self.shell.execute(&format!(
            "df -P -B1 {} | awk 'NR==2 {{print $4}}'",
            shell_quote(root)
        ))?;
        output.trim().parse().map_err(|_| BackeeError::RemoteIo {
            operation: "query free space of",
            path: root.to_string(),
            detail: format!("unexpected df output '{}'", output),
        })
    }

    fn estimate_transfer_bytes(
        &mut self,
        item: &FilesItem,
        base_link: &str,
        remote_path: &str,
    ) -> BackeeResult<u64> {
        let link_dest = self.link_base(base_link)?;
        let args = RsyncCommand::new(&self.server, RsyncMode::Estimate)
            .link_dest(link_dest)
            .args(item, remote_path);

        let mut transfer_size = 0;
        let exit = self.rsync(&args, &mut |line| {
            tracing::debug!("{}", line);
            match parse_transfer_size(line) {
                Some(size) => {
                    tracing::debug!(bytes = size, "transfer size");
                    transfer_size = size;
                    LineFlow::Stop
                }
                None => LineFlow::Continue,
            }
        })?;
        check_exit(&exit, remote_path)?;

        Ok(transfer_size)
    }

    fn transmit(&mut self, base_link: &str, item: &FilesItem, remote_path: &str) -> BackeeResult<()> {
        let item = item.retain_existing();
        let link_dest = self.link_base(base_link)?;
        let args = RsyncCommand::new(&self.server, RsyncMode::Transfer)
            .link_dest(link_dest)
            .args(&item, remote_path);

        tracing::info!(destination = remote_path, "transferring");
        let exit = self.rsync(&args, &mut |line| {
            tracing::debug!("{}", line);
            LineFlow::Continue
        })?;
        check_exit(&exit, remote_path)
    }

    fn verify(&mut self, item: &FilesItem, remote_path: &str) -> BackeeResult<bool> {
        tracing::debug!(remote_path, "verifying backup");
        let args = RsyncCommand::new(&self.server, RsyncMode::Verify).args(item, remote_path);

        let mut no_differences = true;
        let exit = self.rsync(&args, &mut |line| {
            if is_difference(line) {
                tracing::debug!("{} is different", line);
                no_differences = false;
                LineFlow::Stop
            } else {
                LineFlow::Continue
            }
        })?;
        check_exit(&exit, remote_path)?;

        Ok(no_differences)
    }
}

/// Bytes from rsync's `Total transferred file size: N bytes` line
fn parse_transfer_size(line: &str) -> Option<u64> {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    let pattern = PATTERN.get_or_init(|| {
        Regex::new(r"Total transferred file size: ([\d,]+)").expect("valid regex")
    });

    let digits = pattern.captures(line)?.get(1)?.as_str().replace(',', "");
    digits.parse().ok()
}

/// Itemized-change prefixes for a directory whose timestamp alone differs
const FALSE_POSITIVES: [&str; 1] = [".d..t"];

/// True if an itemized rsync line reports a real difference
fn is_difference(line: &str) -> bool {
    let marked = line.starts_with('<') || line.starts_with('>') || line.starts_with('.');
    marked && !FALSE_POSITIVES.iter().any(|fp| line.starts_with(fp))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backup::remote::tests::ScriptedShell;
    use crate::backup::rsync::tests::{server, ScriptedProcess};

    fn transport(shell: ScriptedShell, process: &ScriptedProcess) -> SnapshotTransport<ScriptedShell, &ScriptedProcess> {
        SnapshotTransport::new(server(None), shell, process)
    }

    fn item() -> FilesItem {
        FilesItem::new(vec!["/a/b/*".into()], vec!["/a/b/c/*".into()])
    }

    #[test]
    fn test_dir_exists() {
        let process = ScriptedProcess::default();
        let mut t = transport(ScriptedShell::default().respond("true").respond("false"), &process);
        assert!(t.dir_exists("/srv/x").unwrap());
        assert!(!t.dir_exists("/srv/y").unwrap());
        assert_eq!(
            t.shell.commands[0],
            "if [ -d '/srv/x' ]; then echo true; else echo false; fi;"
        );
    }

    #[test]
    fn test_create_dir_failure() {
        let process = ScriptedProcess::default();
        let mut t = transport(ScriptedShell::default().respond("0").respond("1"), &process);
        t.create_dir("/srv/ok").unwrap();
        let err = t.create_dir("/srv/denied").unwrap_err();
        assert!(matches!(err, BackeeError::RemoteIo { ref path, .. } if path == "/srv/denied"));
        assert_eq!(t.shell.commands[0], "{ mkdir -p '/srv/ok'; } 2>&1; echo $?");
    }

    #[test]
    fn test_failing_command_reports_its_stderr() {
        let process = ScriptedProcess::default();
        let shell = ScriptedShell::default().respond("mkdir: cannot create directory '/ro/x': Read-only file system\n1");
        let mut t = transport(shell, &process);

        let err = t.create_dir("/ro/x").unwrap_err();
        match err {
            BackeeError::RemoteIo { operation, path, detail } => {
                assert_eq!(operation, "create directory");
                assert_eq!(path, "/ro/x");
                assert!(detail.starts_with("exit status 1"));
                assert!(detail.contains("Read-only file system"));
            }
            other => panic!("expected RemoteIo, got {:?}", other),
        }
        assert!(t.shell.commands[0].ends_with("} 2>&1; echo $?"));
    }

    #[test]
    fn test_remove_no_dirs_is_noop() {
        let process = ScriptedProcess::default();
        let mut t = transport(ScriptedShell::default(), &process);
        t.remove_dirs(&[]).unwrap();
        assert!(t.shell.commands.is_empty());
    }

    #[test]
    fn test_remove_dirs_batch() {
        let process = ScriptedProcess::default();
        let mut t = transport(ScriptedShell::default().respond("0").respond("1"), &process);
        t.remove_dirs(&["/r/a".into(), "/r/b".into()]).unwrap();
        assert_eq!(t.shell.commands[0], "{ rm -rf -- '/r/a' '/r/b'; } 2>&1; echo $?");
        assert!(t.remove_dirs(&["/r/c".into()]).is_err());
    }

    #[test]
    fn test_list_snapshot_names() {
        let process = ScriptedProcess::default();
        let output = "backup_2024-01-02-00-00\nbackup_2024-01-01-00-00\nbackup_2024-01-03-00-00-incomplete";
        let mut t = transport(ScriptedShell::default().respond(output).respond(""), &process);

        assert_eq!(
            t.list_snapshot_names("/srv/files").unwrap(),
            vec![
                "backup_2024-01-01-00-00",
                "backup_2024-01-02-00-00",
                "backup_2024-01-03-00-00-incomplete"
            ]
        );
        assert!(t.list_snapshot_names("/srv/empty").unwrap().is_empty());
    }

    #[test]
    fn test_rename_and_relink() {
        let process = ScriptedProcess::default();
        let mut t = transport(ScriptedShell::default().respond("0").respond("0").respond("1"), &process);
        t.rename_dir("/r/x-incomplete", "/r/x").unwrap();
        t.relink_current("/r/x", "/r/current").unwrap();
        assert_eq!(t.shell.commands[0], "{ mv '/r/x-incomplete' '/r/x'; } 2>&1; echo $?");
        assert_eq!(
            t.shell.commands[1],
            "{ rm -f '/r/current' && ln -s '/r/x' '/r/current'; } 2>&1; echo $?"
        );
        assert!(t.relink_current("/r/y", "/r/current").is_err());
    }

    #[test]
    fn test_reconcile_existing_link_is_noop() {
        let process = ScriptedProcess::default();
        let mut t = transport(ScriptedShell::default().respond("true"), &process);
        t.reconcile_current_link("/r", "/r/current").unwrap();
        assert_eq!(t.shell.commands.len(), 1);
    }

    #[test]
    fn test_reconcile_relinks_last_completed() {
        let process = ScriptedProcess::default();
        let shell = ScriptedShell::default()
            .respond("false")
            .respond("backup_2024-01-01-00-00\nbackup_2024-01-02-00-00\nbackup_2024-01-03-00-00-incomplete")
            .respond("0");
        let mut t = transport(shell, &process);
        t.reconcile_current_link("/r", "/r/current").unwrap();
        assert_eq!(
            t.shell.commands[2],
            "{ rm -f '/r/current' && ln -s '/r/backup_2024-01-02-00-00' '/r/current'; } 2>&1; echo $?"
        );
    }

    #[test]
    fn test_reconcile_skips_foreign_directories() {
        let process = ScriptedProcess::default();
        let shell = ScriptedShell::default()
            .respond("false")
            .respond("backup_2024-01-02-00-00\nmanual-copy\nold_2023-01-01-00-00")
            .respond("0");
        let mut t = transport(shell, &process);
        t.reconcile_current_link("/r", "/r/current").unwrap();
        assert_eq!(
            t.shell.commands[2],
            "{ rm -f '/r/current' && ln -s '/r/backup_2024-01-02-00-00' '/r/current'; } 2>&1; echo $?"
        );
    }

    #[test]
    fn test_reconcile_with_only_foreign_directories() {
        let process = ScriptedProcess::default();
        let shell = ScriptedShell::default().respond("false").respond("manual-copy\n2023-01-01-00-00");
        let mut t = transport(shell, &process);
        t.reconcile_current_link("/r", "/r/current").unwrap();
        assert_eq!(t.shell.commands.len(), 2);
    }

    #[test]
    fn test_reconcile_without_snapshots() {
        let process = ScriptedProcess::default();
        let mut t = transport(ScriptedShell::default().respond("false").respond(""), &process);
        t.reconcile_current_link("/r", "/r/current").unwrap();
        assert_eq!(t.shell.commands.len(), 2);
    }

    #[test]
    fn test_available_bytes() {
        let process = ScriptedProcess::default();
        let mut t = transport(ScriptedShell::default().respond("123456").respond("n/a"), &process);
        assert_eq!(t.available_bytes("/r").unwrap(), 123456);
        assert!(t.available_bytes("/r").is_err());
    }

    #[test]
    fn test_count_temp_dirs() {
        let process = ScriptedProcess::default();
        let mut t = transport(ScriptedShell::default().respond("2"), &process);
        assert_eq!(t.count_temp_dirs("/r", "-incomplete").unwrap(), 2);
        assert_eq!(
            t.shell.commands[0],
            "find '/r' -mindepth 1 -maxdepth 1 -type d -name '*-incomplete' | wc -l"
        );
    }

    #[test]
    fn test_estimate_parses_summary() {
        let process = ScriptedProcess::default().then(
            &["Number of files: 10", "Total transferred file size: 1,234,567 bytes", "Literal data: 0 bytes"],
            0,
        );
        let mut t = transport(ScriptedShell::default().respond("true"), &process);
        let size = t.estimate_transfer_bytes(&item(), "/r/current", "/r/new").unwrap();
        assert_eq!(size, 1_234_567);
        let call = &process.calls.borrow()[0];
        assert!(call.contains(&"--link-dest=/r/current".to_string()));
        assert_eq!(*process.lines_read.borrow(), 2);
    }

    #[test]
    fn test_estimate_without_summary_is_zero() {
        let process = ScriptedProcess::default().then(&["sending incremental file list"], 0);
        let mut t = transport(ScriptedShell::default().respond("false"), &process);
        assert_eq!(t.estimate_transfer_bytes(&item(), "/r/current", "/r/new").unwrap(), 0);
        let call = &process.calls.borrow()[0];
        assert!(call.iter().all(|a| !a.starts_with("--link-dest")));
    }

    #[test]
    fn test_transmit_exit_codes() {
        let process = ScriptedProcess::default()
            .then(&["file1"], 0)
            .then(&["file1"], 24)
            .then(&[], 12);
        let mut t = transport(
            ScriptedShell::default().respond("true").respond("true").respond("true"),
            &process,
        );

        t.transmit("/r/current", &item(), "/r/new").unwrap();
        t.transmit("/r/current", &item(), "/r/new").unwrap();
        let err = t.transmit("/r/current", &item(), "/r/new").unwrap_err();
        assert!(matches!(err, BackeeError::Transfer { exit_code: 12, .. }));
    }

    #[test]
    fn test_transmit_drops_missing_literal_paths() {
        let process = ScriptedProcess::default().then(&[], 0);
        let mut t = transport(ScriptedShell::default().respond("false"), &process);
        let item = FilesItem::new(
            vec!["/backee/does/not/exist".into(), "/tmp/*".into()],
            vec!["/backee/also/missing".into()],
        );
        t.transmit("/r/current", &item, "/r/new").unwrap();

        let call = &process.calls.borrow()[0];
        assert!(!call.contains(&"/backee/does/not/exist".to_string()));
        assert!(call.contains(&"/tmp/*".to_string()));
        assert!(call.iter().all(|a| a != "--exclude=/backee/also/missing"));
    }

    #[test]
    fn test_backup_verified() {
        let process = ScriptedProcess::default().then(&["abc", ".d..t...... some/dir/"], 0);
        let mut t = transport(ScriptedShell::default(), &process);
        assert!(t.verify(&item(), "/remote_path").unwrap());
        assert_eq!(process.calls.borrow().len(), 1);
    }

    #[test]
    fn test_backup_verified_warning() {
        let process = ScriptedProcess::default().then(&[">fcstpoguax path/to/file", "more"], 0);
        let mut t = transport(ScriptedShell::default(), &process);
        assert!(!t.verify(&item(), "/remote_path").unwrap());
        assert_eq!(*process.lines_read.borrow(), 1);
    }

    #[test]
    fn test_backup_verified_error() {
        let process = ScriptedProcess::default().then(&[".Xcstpoguax"], 0);
        let mut t = transport(ScriptedShell::default(), &process);
        assert!(!t.verify(&item(), "/remote_path").unwrap());
    }

    #[test]
    fn test_is_difference() {
        assert!(is_difference("<f+++++++++ file"));
        assert!(is_difference(">f.st...... file"));
        assert!(is_difference(".f...p..... file"));
        assert!(!is_difference(".d..t...... dir/"));
        assert!(!is_difference("sending incremental file list"));
        assert!(!is_difference("cd+++++++++ new/dir/"));
    }

    #[test]
    fn test_parse_transfer_size() {
        assert_eq!(parse_transfer_size("Total transferred file size: 0 bytes"), Some(0));
        assert_eq!(parse_transfer_size("Total transferred file size: 12,345 bytes"), Some(12345));
        assert_eq!(parse_transfer_size("Total file size: 99 bytes"), None);
    }
}
