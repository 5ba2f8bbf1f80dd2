//! Remote directory layout
//!
//! Snapshots of an item live under `<location>/<item>/` as
//! `backup_<YYYY-MM-DD-HH-mm>`, with a `-incomplete` twin while a transfer is
//! in progress and a `current` symlink to the latest completed snapshot.

use chrono::NaiveDateTime;

/// Prefix of every snapshot directory name
pub const SNAPSHOT_PREFIX: &str = "backup_";

/// Fixed-width timestamp format; lexicographic order equals chronological order
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d-%H-%M";

/// Suffix of a snapshot that is still being transferred
pub const TEMP_SUFFIX: &str = "-incomplete";

/// Name of the symlink to the latest completed snapshot
pub const CURRENT_LINK: &str = "current";

/// Paths used for one item on one server during one run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SnapshotLayout {
    /// `<location>/<item>`
    pub root: String,
    /// Final snapshot directory name
    pub snapshot_name: String,
}

impl SnapshotLayout {
    pub fn new(location: &str, item_name: &str, now: NaiveDateTime) -> Self {
        Self {
            root: join(location, item_name),
            snapshot_name: snapshot_name(now),
        }
    }

    pub fn temp_name(&self) -> String {
        format!("{}{}", self.snapshot_name, TEMP_SUFFIX)
    }

    pub fn snapshot_path(&self) -> String {
        join(&self.root, &self.snapshot_name)
    }

    pub fn temp_path(&self) -> String {
        join(&self.root, &self.temp_name())
    }

    pub fn current_link(&self) -> String {
        join(&self.root, CURRENT_LINK)
    }

    /// Full path of a directory name found under the root
    pub fn child(&self, name: &str) -> String {
        join(&self.root, name)
    }
}

/// Snapshot directory name for a point in time
pub fn snapshot_name(at: NaiveDateTime) -> String {
    format!("{}{}", SNAPSHOT_PREFIX, at.format(TIMESTAMP_FORMAT))
}

/// Parse the timestamp out of a snapshot name
///
/// Returns `None` unless the name is exactly `prefix` followed by a timestamp.
pub fn parse_snapshot_name(name: &str, prefix: &str) -> Option<NaiveDateTime> {
    let stamp = name.strip_prefix(prefix)?;
    NaiveDateTime::parse_from_str(stamp, TIMESTAMP_FORMAT).ok()
}

/// Join remote path segments with a single slash
pub fn join(base: &str, name: &str) -> String {
    if base.is_empty() {
        return name.to_string();
    }
    format!("{}/{}", base.trim_end_matches('/'), name)
}
