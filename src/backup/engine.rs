//! Backup engine
//!
//! Drives every (item, server) pair through the snapshot pipeline:
//!
//! 1. preflight: drop missing literal source paths
//! 2. layout: create the item root or clean up after earlier runs
//! 3. space admission: refuse to start a transfer that cannot fit
//! 4. transfer into a `-incomplete` directory
//! 5. publish by renaming it to its final name
//! 6. point `current` at the new snapshot
//! 7. rotate old snapshots out
//! 8. verify the published snapshot against the sources
//!
//! Servers are processed one after the other, and the items of a server in
//! order. A failing pair is logged and recorded; the remaining pairs still
//! run.

use chrono::{Local, NaiveDateTime};

use super::layout::{SnapshotLayout, TEMP_SUFFIX};
use super::remote::SshSession;
use super::report::{BackupReport, PairStatus};
use super::rotation::plan_rotation;
use super::rsync::SystemProcess;
use super::transport::{SnapshotStore, SnapshotTransport};
use crate::error::{BackeeError, BackeeResult};
use crate::models::{BackupItem, BackupServer, RotationStrategy};

/// Opens the snapshot store of a server
pub trait StoreFactory {
    fn open(&self, server: &BackupServer) -> BackeeResult<Box<dyn SnapshotStore>>;
}

/// Store factory talking to servers through ssh and rsync
#[derive(Debug, Default, Clone, Copy)]
pub struct SshStoreFactory;

impl StoreFactory for SshStoreFactory {
    fn open(&self, server: &BackupServer) -> BackeeResult<Box<dyn SnapshotStore>> {
        match server {
            BackupServer::Ssh(ssh) => {
                let session = SshSession::new(ssh.clone())?;
                Ok(Box::new(SnapshotTransport::new(
                    ssh.clone(),
                    session,
                    SystemProcess,
                )))
            }
        }
    }
}

/// Fail unless `available` covers `required`
pub fn admit_transfer(path: &str, required: u64, available: u64) -> BackeeResult<()> {
    if available < required {
        return Err(BackeeError::InsufficientSpace {
            path: path.to_string(),
            required,
            available,
        });
    }
    Ok(())
}

/// Runs backups of items to servers
pub struct BackupEngine<F = SshStoreFactory> {
    factory: F,
    clock: Box<dyn Fn() -> NaiveDateTime>,
}

impl BackupEngine<SshStoreFactory> {
    pub fn new() -> Self {
        Self::with_factory(SshStoreFactory)
    }
}

impl Default for BackupEngine<SshStoreFactory> {
    fn default() -> Self {
        Self::new()
    }
}

impl<F: StoreFactory> BackupEngine<F> {
    pub fn with_factory(factory: F) -> Self {
        Self {
            factory,
            clock: Box::new(|| Local::now().naive_local()),
        }
    }

    /// Replace the wall clock used to name snapshots and rotate them
    pub fn with_clock(mut self, clock: impl Fn() -> NaiveDateTime + 'static) -> Self {
        self.clock = Box::new(clock);
        self
    }

    /// Back up every item to every server
    ///
    /// Returns an error carrying the first failure if any pair failed.
    pub fn backup(&self, items: &[BackupItem], servers: &[BackupServer]) -> BackeeResult<BackupReport> {
        self.run(items, servers).into_result()
    }

    /// Back up every item to every server and report each pair
    pub fn run(&self, items: &[BackupItem], servers: &[BackupServer]) -> BackupReport {
        let mut report = BackupReport::default();

        for server in servers {
            let span = tracing::info_span!("server", server = server.name());
            let _entered = span.enter();

            let mut store = match self.factory.open(server) {
                Ok(store) => store,
                Err(error) => {
                    if error.is_configuration() {
                        tracing::warn!(error = %error, "backup server is not usable with this configuration");
                    } else {
                        tracing::error!(error = %error, "cannot open backup server");
                    }
                    for item in items {
                        report.push(server.name(), item.name(), PairStatus::Failed { error: error.clone() });
                    }
                    continue;
                }
            };

            for item in items {
                let status = match self.backup_pair(store.as_mut(), item, server) {
                    Ok(status) => status,
                    Err(error) => {
                        if error.is_configuration() {
                            tracing::warn!(item = item.name(), error = %error, "item cannot be backed up with this configuration");
                        } else {
                            tracing::error!(item = item.name(), error = %error, "backup failed");
                        }
                        PairStatus::Failed { error }
                    }
                };
                report.push(server.name(), item.name(), status);
            }
        }

        tracing::info!(
            completed = report.completed_count(),
            skipped = report.skipped_count(),
            failed = report.failed_count(),
            "backup run finished"
        );
        report
    }

    fn backup_pair(
        &self,
        store: &mut dyn SnapshotStore,
        item: &BackupItem,
        server: &BackupServer,
    ) -> BackeeResult<PairStatus> {
        let files = match item {
            BackupItem::Files(files) => files,
            BackupItem::Database(_) | BackupItem::DockerVolumes(_) => {
                let reason = BackeeError::UnsupportedItem(item.name().to_string()).to_string();
                tracing::info!(item = item.name(), "backup of this item kind is not supported, skipping");
                return Ok(PairStatus::Skipped { reason });
            }
        };

        tracing::info!(item = item.name(), "starting backup");

        let files = files.retain_existing();
        if files.includes.is_empty() {
            tracing::warn!(item = item.name(), "no existing paths to back up, skipping");
            return Ok(PairStatus::Skipped {
                reason: "no existing paths to back up".to_string(),
            });
        }

        let now = (self.clock)();
        let layout = SnapshotLayout::new(server.location(), item.name(), now);
        reconcile_layout(store, &layout)?;

        let required = store.estimate_transfer_bytes(&files, &layout.current_link(), &layout.temp_path())?;
        let available = store.available_bytes(&layout.root)?;
        tracing::debug!(required, available, "space admission");
        admit_transfer(&layout.root, required, available)?;

        store.transmit(&layout.current_link(), &files, &layout.temp_path())?;

        store.rename_dir(&layout.temp_path(), &layout.snapshot_path())?;
        store.relink_current(&layout.snapshot_path(), &layout.current_link())?;
        tracing::info!(snapshot = %layout.snapshot_path(), "snapshot published");

        let strategy = item.effective_rotation_strategy(server);
        let deleted = rotate(store, &layout, strategy, now)?;

        let verified = match store.verify(&files, &layout.snapshot_path()) {
            Ok(true) => {
                tracing::info!(snapshot = %layout.snapshot_path(), "backup verified");
                true
            }
            Ok(false) => {
                tracing::warn!(snapshot = %layout.snapshot_path(), "backup differs from its sources");
                false
            }
            Err(error) => {
                tracing::warn!(snapshot = %layout.snapshot_path(), error = %error, "backup could not be verified");
                false
            }
        };

        Ok(PairStatus::Completed {
            snapshot: layout.snapshot_name.clone(),
            deleted,
            verified,
        })
    }
}

/// Prepare the item root for a new snapshot
fn reconcile_layout(store: &mut dyn SnapshotStore, layout: &SnapshotLayout) -> BackeeResult<()> {
    if !store.dir_exists(&layout.root)? {
        tracing::info!(root = %layout.root, "first backup of this item, creating root");
        return store.create_dir(&layout.root);
    }

    let mut stale = Vec::new();
    for path in [layout.snapshot_path(), layout.temp_path()] {
        if store.dir_exists(&path)? {
            tracing::warn!(path = %path, "removing leftover directory");
            stale.push(path);
        }
    }
    store.remove_dirs(&stale)?;

    let leftovers = store.count_temp_dirs(&layout.root, TEMP_SUFFIX)?;
    if leftovers > 0 {
        tracing::warn!(
            root = %layout.root,
            count = leftovers,
            "found incomplete backups from earlier runs, please investigate"
        );
    }

    store.reconcile_current_link(&layout.root, &layout.current_link())
}

/// Delete snapshots that fall out of the retention windows
fn rotate(
    store: &mut dyn SnapshotStore,
    layout: &SnapshotLayout,
    strategy: RotationStrategy,
    now: NaiveDateTime,
) -> BackeeResult<Vec<String>> {
    if strategy.retains_nothing() {
        tracing::warn!(root = %layout.root, "rotation keeps no snapshots, every backup will be removed");
    }

    let names = store.list_snapshot_names(&layout.root)?;
    let plan = plan_rotation(&names, strategy, now.date());

    tracing::info!(
        strategy = %strategy,
        kept = plan.kept_count(),
        deleted = plan.delete.len(),
        "rotating snapshots"
    );
    for name in &plan.unparseable {
        tracing::debug!(name = %name, "leaving unrecognised directory alone");
    }

    if !plan.delete.is_empty() {
        let paths: Vec<String> = plan.delete.iter().map(|name| layout.child(name)).collect();
        store.remove_dirs(&paths)?;
    }
    Ok(plan.delete)
}
