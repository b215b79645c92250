#![forbid(unsafe_code)]
//! OpticFS core: the readable filesystem view over an ISO 9660 image.
//!
//! [`Image::open`] decodes the Volume Descriptor Set, selects the active
//! hierarchy (primary, or a Joliet supplementary when preferred), walks the
//! directory tree into a flat entry list, and serves listings, byte-exact
//! file reads, and extraction to a local directory. Everything on the
//! image is immutable after open, so all read APIs take `&self` and are
//! safe to call concurrently.

mod entry;
mod extract;
mod image;
mod walk;

pub use entry::FilesystemEntry;
pub use extract::ExtractionSummary;
pub use image::Image;
pub use ofs_error::{IsoError, Result};

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Progress report handed to the extraction callback after every chunk.
#[derive(Debug, Clone)]
pub struct ProgressUpdate<'a> {
    /// Path of the file being written, relative to the image root.
    pub path: &'a str,
    pub bytes_transferred: u64,
    pub total_bytes: u64,
    /// 1-based index of the current file.
    pub file_number: usize,
    pub file_count: usize,
}

/// Callback invoked with extraction progress.
pub type ProgressCallback = Arc<dyn Fn(&ProgressUpdate<'_>) + Send + Sync>;

/// Cooperative cancellation flag for extraction, checked between files and
/// between chunk writes. Cheap to clone; all clones share the flag.
#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    cancelled: Arc<AtomicBool>,
}

impl CancelToken {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::Relaxed);
    }

    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Relaxed)
    }
}

/// Options accepted by [`Image::open`].
#[derive(Clone)]
pub struct OpenOptions {
    /// Advisory; the reader never writes to the image regardless.
    pub read_only: bool,
    /// Decode the directory tree during open. With either this or
    /// `preload_directories` unset, the walk is deferred to first use.
    pub parse_on_open: bool,
    pub preload_directories: bool,
    /// Remove `;N` version suffixes from ISO identifiers.
    pub strip_version_info: bool,
    pub rock_ridge_enabled: bool,
    pub el_torito_enabled: bool,
    /// Select a Joliet supplementary hierarchy when one exists.
    pub prefer_joliet: bool,
    /// Directory (relative to the extraction root) where boot images land.
    pub boot_file_extract_location: String,
    /// Sectors retained by the read cache; `0` disables caching.
    pub sector_cache_size: usize,
    pub extraction_progress: Option<ProgressCallback>,
}

impl Default for OpenOptions {
    fn default() -> Self {
        Self {
            read_only: true,
            parse_on_open: true,
            preload_directories: true,
            strip_version_info: true,
            rock_ridge_enabled: true,
            el_torito_enabled: true,
            prefer_joliet: false,
            boot_file_extract_location: "[BOOT]".to_owned(),
            sector_cache_size: ofs_block::DEFAULT_CACHE_SECTORS,
            extraction_progress: None,
        }
    }
}

impl fmt::Debug for OpenOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OpenOptions")
            .field("read_only", &self.read_only)
            .field("parse_on_open", &self.parse_on_open)
            .field("preload_directories", &self.preload_directories)
            .field("strip_version_info", &self.strip_version_info)
            .field("rock_ridge_enabled", &self.rock_ridge_enabled)
            .field("el_torito_enabled", &self.el_torito_enabled)
            .field("prefer_joliet", &self.prefer_joliet)
            .field(
                "boot_file_extract_location",
                &self.boot_file_extract_location,
            )
            .field("sector_cache_size", &self.sector_cache_size)
            .field(
                "extraction_progress",
                &self.extraction_progress.as_ref().map(|_| "<callback>"),
            )
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_the_documented_contract() {
        let options = OpenOptions::default();
        assert!(options.read_only);
        assert!(options.parse_on_open);
        assert!(options.preload_directories);
        assert!(options.strip_version_info);
        assert!(options.rock_ridge_enabled);
        assert!(options.el_torito_enabled);
        assert!(!options.prefer_joliet);
        assert_eq!(options.boot_file_extract_location, "[BOOT]");
        assert!(options.extraction_progress.is_none());
    }

    #[test]
    fn cancel_token_is_shared_across_clones() {
        let token = CancelToken::new();
        let clone = token.clone();
        assert!(!clone.is_cancelled());
        token.cancel();
        assert!(clone.is_cancelled());
    }
}
