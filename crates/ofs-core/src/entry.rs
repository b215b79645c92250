//! The unified filesystem entry.

use ofs_types::{IsoTimestamp, Lba};

/// One file, directory, or symlink discovered in the active hierarchy.
///
/// Entries are produced by the directory walker and owned by the image;
/// file bytes are read on demand from `(extent, data_len)`.
#[derive(Debug, Clone)]
pub struct FilesystemEntry {
    /// Absolute path within the image, `/`-separated.
    pub path: String,
    /// Final path component, in the chosen name space.
    pub name: String,
    /// File size in bytes; directories report their extent length.
    pub size: u64,
    /// Full POSIX mode including the file-type bits, synthesized when the
    /// image carries no Rock Ridge attributes.
    pub mode: u32,
    pub mtime: IsoTimestamp,
    pub is_dir: bool,
    /// Rock Ridge symlink target, when the entry is a symbolic link.
    pub symlink_target: Option<String>,
    /// First sector of the entry's data extent.
    pub extent: Lba,
    /// Extent length in bytes.
    pub data_len: u32,
}

impl FilesystemEntry {
    /// Permission bits of the mode (the part `chmod` accepts).
    #[must_use]
    pub fn permissions(&self) -> u32 {
        self.mode & 0o7777
    }

    #[must_use]
    pub fn is_symlink(&self) -> bool {
        self.symlink_target.is_some()
    }
}
