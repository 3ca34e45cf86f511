//! Rotate detection: decides whether the file a [`super::FileSink`] has
//! open has been replaced out from under it (log rotated by an external
//! tool such as `logrotate`).
//!
//! Records the inode observed at open and compares it on every
//! `should_rotate()` call, treating a `stat` failure as "rotated" (the
//! file is gone, so the sink should reopen and let the OS recreate it).

use std::path::Path;

/// Decides whether a file sink's underlying file has been replaced.
pub trait RotatePolicy: Send + Sync {
    /// Returns `true` if `path` no longer refers to the file this policy
    /// was constructed against.
    fn should_rotate(&self, path: &Path) -> bool;
}

/// Detects rotation by comparing the inode observed at construction
/// against the inode currently at `path`.
///
/// On non-Unix targets there is no portable inode equivalent; this policy
/// degrades to "never rotate" there, since the core's only consumer
/// (`FileSink`) still functions correctly without rotation detection, just
/// without catching external renames.
pub struct InodeRotate {
    inode: u64,
}

impl InodeRotate {
    /// Observes the inode currently at `path`.
    pub fn new(path: &Path) -> crate::error::Result<Self> {
        Ok(InodeRotate {
            inode: current_inode(path)?,
        })
    }
}

impl RotatePolicy for InodeRotate {
    fn should_rotate(&self, path: &Path) -> bool {
        match current_inode(path) {
            Ok(inode) => inode != self.inode,
            // The path no longer resolves: treat as rotated so the sink
            // reopens (and lets the OS recreate the file on write).
            Err(_) => true,
        }
    }
}

#[cfg(unix)]
fn current_inode(path: &Path) -> crate::error::Result<u64> {
    use std::os::unix::fs::MetadataExt;
    Ok(std::fs::metadata(path)?.ino())
}

#[cfg(not(unix))]
fn current_inode(path: &Path) -> crate::error::Result<u64> {
    // No portable inode on non-Unix targets; any stable-but-present value
    // keeps `should_rotate` from ever firing rather than firing on every
    // write.
    std::fs::metadata(path)?;
    Ok(0)
}
