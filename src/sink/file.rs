//! Buffered file sink with pluggable flusher and rotate policies.
//!
//! The rotation behavior blends two independent mechanisms: an
//! inode-change detector (catches a file replaced out from under the
//! sink, e.g. by `logrotate`) and a period-based scheme for daily, hourly,
//! or minutely rollover. Both coexist rather than one replacing the
//! other.

use std::fs::{self, File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use parking_lot::Mutex;

use crate::error::Result;
use crate::record::Record;
use crate::sink::rotate::{InodeRotate, RotatePolicy};
use crate::sink::{BytecountFlusher, Flusher, RepeatFlusher, Sink};

/// Period-based rotation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RotationPeriod {
    #[default]
    Never,
    Daily,
    Hourly,
    Minutely,
}

impl RotationPeriod {
    fn period_tag(self) -> String {
        let now = chrono::Utc::now();
        match self {
            RotationPeriod::Never => String::new(),
            RotationPeriod::Daily => now.format("%Y-%m-%d").to_string(),
            RotationPeriod::Hourly => now.format("%Y-%m-%d_%H").to_string(),
            RotationPeriod::Minutely => now.format("%Y-%m-%d_%H-%M").to_string(),
        }
    }
}

fn path_for_period(base: &Path, period: &str) -> PathBuf {
    if period.is_empty() {
        return base.to_path_buf();
    }
    let file_name = base.file_name().and_then(|s| s.to_str()).unwrap_or_default();
    match file_name.rfind('.') {
        Some(pos) => {
            let (stem, ext) = file_name.split_at(pos);
            base.with_file_name(format!("{stem}.{period}{ext}"))
        }
        None => base.with_file_name(format!("{file_name}.{period}")),
    }
}

fn open_for_period(base: &Path, period: &str) -> std::io::Result<File> {
    let path = path_for_period(base, period);
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    OpenOptions::new().create(true).append(true).open(path)
}

struct FileBackend {
    writer: BufWriter<File>,
    current_period: String,
}

/// A buffered file sink.
pub struct FileSink {
    base_path: PathBuf,
    period: RotationPeriod,
    retention: Option<usize>,
    rotate: Option<Box<dyn RotatePolicy>>,
    flusher: Box<dyn Flusher>,
    backend: Mutex<FileBackend>,
}

impl FileSink {
    fn resolved_path(&self, period: &str) -> PathBuf {
        path_for_period(&self.base_path, period)
    }

    fn prune_if_needed(&self, keep: usize, current: &Path) {
        let Some(dir) = current.parent() else {
            return;
        };
        let stem = self
            .base_path
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or_default();
        let Ok(entries) = fs::read_dir(dir) else {
            return;
        };
        let mut rotated: Vec<(std::time::SystemTime, PathBuf)> = entries
            .filter_map(|e| e.ok())
            .map(|e| e.path())
            .filter(|p| p != current && p.is_file())
            .filter(|p| {
                p.file_name()
                    .and_then(|s| s.to_str())
                    .is_some_and(|n| n.starts_with(stem) && n != stem)
            })
            .filter_map(|p| fs::metadata(&p).and_then(|m| m.modified()).ok().map(|t| (t, p)))
            .collect();
        rotated.sort_by_key(|(t, _)| *t);
        while rotated.len() > keep {
            let (_, path) = rotated.remove(0);
            let _ = fs::remove_file(path);
        }
    }
}

/// Builder for [`FileSink`].
pub struct FileSinkBuilder {
    path: PathBuf,
    period: RotationPeriod,
    retention: Option<usize>,
    inode_rotate: bool,
    flusher: Box<dyn Flusher>,
}

impl FileSinkBuilder {
    /// A builder writing to `path`, flushing every write by default.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        FileSinkBuilder {
            path: path.into(),
            period: RotationPeriod::Never,
            retention: None,
            inode_rotate: true,
            flusher: Box::new(RepeatFlusher::new(1)),
        }
    }

    /// Flushes every `count`-th write.
    pub fn flush_every_count(mut self, count: usize) -> Self {
        self.flusher = Box::new(RepeatFlusher::new(count));
        self
    }

    /// Flushes once a rolling byte counter reaches `threshold`, parsed
    /// with the `B`/`kB`/`MB`/`GB`/`KiB`/`MiB`/`GiB` suffix grammar.
    pub fn flush_every_bytes(mut self, threshold: &str) -> Result<Self> {
        self.flusher = Box::new(BytecountFlusher::parse(threshold)?);
        Ok(self)
    }

    /// Enables period-based rotation, orthogonal to the inode detector.
    pub fn rotation(mut self, period: RotationPeriod) -> Self {
        self.period = period;
        self
    }

    /// Keeps at most `count` rotated files, deleting the oldest first.
    pub fn retain(mut self, count: usize) -> Self {
        self.retention = Some(count);
        self
    }

    /// Disables the inode-change rotate detector (enabled by default).
    pub fn without_inode_rotate(mut self) -> Self {
        self.inode_rotate = false;
        self
    }

    /// Opens the file and compiles the sink.
    pub fn build(self) -> Result<FileSink> {
        let current_period = self.period.period_tag();
        let path = path_for_period(&self.path, &current_period);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let file = open_for_period(&self.path, &current_period)?;
        let rotate = if self.inode_rotate {
            Some(Box::new(InodeRotate::new(&path)?) as Box<dyn RotatePolicy>)
        } else {
            None
        };
        Ok(FileSink {
            base_path: self.path,
            period: self.period,
            retention: self.retention,
            rotate,
            flusher: self.flusher,
            backend: Mutex::new(FileBackend {
                writer: BufWriter::new(file),
                current_period,
            }),
        })
    }
}

impl Sink for FileSink {
    fn emit(&self, _record: &Record<'_>, formatted: &[u8]) -> Result<()> {
        let mut backend = self.backend.lock();

        let new_period = self.period.period_tag();
        if new_period != backend.current_period {
            backend.writer.flush()?;
            let file = open_for_period(&self.base_path, &new_period)?;
            backend.writer = BufWriter::new(file);
            backend.current_period = new_period.clone();
            if let Some(keep) = self.retention {
                self.prune_if_needed(keep, &self.resolved_path(&new_period));
            }
        } else if let Some(rotate) = &self.rotate {
            let current_path = self.resolved_path(&backend.current_period);
            if rotate.should_rotate(&current_path) {
                backend.writer.flush()?;
                let file = open_for_period(&self.base_path, &backend.current_period)?;
                backend.writer = BufWriter::new(file);
            }
        }

        backend.writer.write_all(formatted)?;
        backend.writer.write_all(b"\n")?;
        let written = formatted.len() + 1;

        if self.flusher.should_flush(written) {
            backend.writer.flush()?;
        }
        Ok(())
    }
}
