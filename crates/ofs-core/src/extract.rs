//! Extraction of the image contents to a local directory.
//!
//! Directories are created first, parent-first, with their synthesized
//! modes; files are then written one at a time (open, write in sector
//! chunks, set permissions and modification time, close). A failure on
//! one file is recorded and the batch continues; failure to create a
//! directory, or cancellation, aborts. Partial output is left in place.

use crate::entry::FilesystemEntry;
use crate::image::Image;
use crate::{CancelToken, ProgressUpdate};
use ofs_block::ByteSource;
use ofs_error::{IsoError, Result};
use ofs_types::SECTOR_SIZE;
use std::fs;
use std::io::{Read, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Outcome of an extraction run.
#[derive(Debug, Default)]
pub struct ExtractionSummary {
    pub directories_created: usize,
    pub files_written: usize,
    pub bytes_written: u64,
    /// Per-file failures, in encounter order. The batch continued past
    /// each of these.
    pub failures: Vec<(String, IsoError)>,
}

impl ExtractionSummary {
    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.failures.is_empty()
    }
}

impl<S: ByteSource> Image<S> {
    /// Extract every directory and file under `dst`.
    pub fn extract(&self, dst: impl AsRef<Path>) -> Result<ExtractionSummary> {
        self.extract_with_cancel(dst, &CancelToken::new())
    }

    /// Extract with a cooperative cancellation token, checked between
    /// files and between chunk writes.
    pub fn extract_with_cancel(
        &self,
        dst: impl AsRef<Path>,
        cancel: &CancelToken,
    ) -> Result<ExtractionSummary> {
        let dst = dst.as_ref();
        let mut summary = ExtractionSummary::default();

        fs::create_dir_all(dst)?;

        // Discovery order is breadth-first, so parents precede children.
        for entry in self.entries()?.iter().filter(|entry| entry.is_dir) {
            let target = join_image_path(dst, &entry.path);
            fs::create_dir_all(&target)?;
            set_permissions(&target, entry.permissions());
            summary.directories_created += 1;
        }

        let mut files: Vec<FilesystemEntry> =
            self.entries()?.iter().filter(|e| !e.is_dir).cloned().collect();
        let boot_entries = self.list_boot_entries();
        if !boot_entries.is_empty() {
            let boot_dir = join_image_path(
                dst,
                &format!("/{}", self.options().boot_file_extract_location),
            );
            fs::create_dir_all(boot_dir)?;
            files.extend(boot_entries);
        }

        let file_count = files.len();
        for (index, entry) in files.iter().enumerate() {
            if cancel.is_cancelled() {
                return Err(IsoError::Cancelled);
            }
            match self.extract_one(dst, entry, index + 1, file_count, cancel) {
                Ok(bytes) => {
                    summary.files_written += 1;
                    summary.bytes_written += bytes;
                }
                Err(IsoError::Cancelled) => return Err(IsoError::Cancelled),
                Err(err) => {
                    warn!(
                        target: "ofs::extract",
                        path = %entry.path,
                        %err,
                        "file extraction failed, continuing"
                    );
                    summary.failures.push((entry.path.clone(), err));
                }
            }
        }

        debug!(
            target: "ofs::extract",
            files = summary.files_written,
            bytes = summary.bytes_written,
            failures = summary.failures.len(),
            "extraction finished"
        );
        Ok(summary)
    }

    fn extract_one(
        &self,
        dst: &Path,
        entry: &FilesystemEntry,
        file_number: usize,
        file_count: usize,
        cancel: &CancelToken,
    ) -> Result<u64> {
        let target = join_image_path(dst, &entry.path);
        if let Some(parent) = target.parent() {
            fs::create_dir_all(parent)?;
        }

        if let Some(link_target) = &entry.symlink_target {
            make_symlink(link_target, &target)?;
            return Ok(0);
        }

        let mut out = fs::File::create(&target)?;
        let mut source = self.open_reader(entry);
        let mut chunk = vec![0_u8; SECTOR_SIZE];
        let mut written = 0_u64;
        loop {
            if cancel.is_cancelled() {
                drop(out);
                return Err(IsoError::Cancelled);
            }
            let n = source.read(&mut chunk)?;
            if n == 0 {
                break;
            }
            out.write_all(&chunk[..n])?;
            written += n as u64;
            if let Some(callback) = &self.options().extraction_progress {
                callback(&ProgressUpdate {
                    path: &entry.path,
                    bytes_transferred: written,
                    total_bytes: entry.size,
                    file_number,
                    file_count,
                });
            }
        }
        drop(out);

        set_permissions(&target, entry.permissions());
        if let Some(mtime) = entry.mtime.as_datetime() {
            let file = fs::File::options().write(true).open(&target)?;
            if let Err(err) = file.set_modified(mtime.into()) {
                warn!(
                    target: "ofs::extract",
                    path = %entry.path,
                    %err,
                    "cannot set modification time"
                );
            }
        }

        Ok(written)
    }
}

/// Join an absolute image path onto the destination root, refusing any
/// component that would escape it. The walker already rejects `.`/`..`
/// names; this is the boundary check for the joined path.
fn join_image_path(dst: &Path, image_path: &str) -> PathBuf {
    let mut out = dst.to_path_buf();
    for component in image_path.split('/').filter(|c| !c.is_empty()) {
        if component == "." || component == ".." {
            continue;
        }
        out.push(component);
    }
    out
}

#[cfg(unix)]
fn set_permissions(path: &Path, mode: u32) {
    use std::os::unix::fs::PermissionsExt;
    if let Err(err) = fs::set_permissions(path, fs::Permissions::from_mode(mode)) {
        warn!(target: "ofs::extract", path = %path.display(), %err, "cannot set permissions");
    }
}

#[cfg(not(unix))]
fn set_permissions(_path: &Path, _mode: u32) {}

#[cfg(unix)]
fn make_symlink(link_target: &str, at: &Path) -> Result<()> {
    if at.symlink_metadata().is_ok() {
        fs::remove_file(at)?;
    }
    std::os::unix::fs::symlink(link_target, at)?;
    Ok(())
}

#[cfg(not(unix))]
fn make_symlink(link_target: &str, at: &Path) -> Result<()> {
    // No symlinks off unix; materialize the target path as file content.
    fs::write(at, link_target)?;
    Ok(())
}
