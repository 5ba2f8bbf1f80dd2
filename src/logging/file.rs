//! Size-rotated log file

use std::fs::{self, File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};

use tracing_subscriber::fmt::MakeWriter;

use crate::error::{BackeeError, BackeeResult};

/// Log file that rolls over to `file.1` ... `file.N` once it grows too big
#[derive(Debug)]
pub struct RotatingFile {
    inner: Mutex<Inner>,
}

#[derive(Debug)]
struct Inner {
    path: PathBuf,
    file: File,
    size: u64,
    max_size: u64,
    backup_count: u32,
}

impl RotatingFile {
    /// Open `path` for appending, creating its directory if needed
    ///
    /// With `backup_count` 0 the file is never rolled over.
    pub fn open(path: &Path, max_size: u64, backup_count: u32) -> BackeeResult<Self> {
        if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
            fs::create_dir_all(dir).map_err(|e| {
                BackeeError::Logging(format!("Failed to create log directory {}: {}", dir.display(), e))
            })?;
        }

        let file = open_append(path)
            .map_err(|e| BackeeError::Logging(format!("Failed to open log file {}: {}", path.display(), e)))?;
        let size = file.metadata().map(|m| m.len()).unwrap_or(0);

        Ok(Self {
            inner: Mutex::new(Inner {
                path: path.to_path_buf(),
                file,
                size,
                max_size,
                backup_count,
            }),
        })
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

fn open_append(path: &Path) -> io::Result<File> {
    OpenOptions::new().create(true).append(true).open(path)
}

fn numbered(path: &Path, n: u32) -> PathBuf {
    let mut name = path.as_os_str().to_os_string();
    name.push(format!(".{}", n));
    PathBuf::from(name)
}

impl Inner {
    fn should_roll_over(&self, incoming: usize) -> bool {
        self.backup_count > 0
            && self.max_size > 0
            && self.size > 0
            && self.size + incoming as u64 >= self.max_size
    }

    fn roll_over(&mut self) -> io::Result<()> {
        self.file.flush()?;
        for n in (1..self.backup_count).rev() {
            let from = numbered(&self.path, n);
            if from.exists() {
                fs::rename(&from, numbered(&self.path, n + 1))?;
            }
        }
        fs::rename(&self.path, numbered(&self.path, 1))?;

        self.file = open_append(&self.path)?;
        self.size = 0;
        Ok(())
    }
}

impl Write for Inner {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        if self.should_roll_over(buf.len()) {
            self.roll_over()?;
        }
        let written = self.file.write(buf)?;
        self.size += written as u64;
        Ok(written)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.file.flush()
    }
}

/// Locked handle used for writing one event
pub struct RotatingFileWriter<'a>(MutexGuard<'a, Inner>);

impl Write for RotatingFileWriter<'_> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.write(buf)
    }

    fn write_all(&mut self, buf: &[u8]) -> io::Result<()> {
        // Roll over between events, never inside one
        if self.0.should_roll_over(buf.len()) {
            self.0.roll_over()?;
        }
        self.0.file.write_all(buf)?;
        self.0.size += buf.len() as u64;
        Ok(())
    }

    fn flush(&mut self) -> io::Result<()> {
        self.0.flush()
    }
}

impl<'a> MakeWriter<'a> for RotatingFile {
    type Writer = RotatingFileWriter<'a>;

    fn make_writer(&'a self) -> Self::Writer {
        RotatingFileWriter(self.lock())
    }
}
