#![forbid(unsafe_code)]
//! On-disc format decoders for OpticFS.
//!
//! Everything in this crate parses from byte slices and owns its output;
//! decoded structures copy out scalar and string fields and keep no
//! reference to the sector buffers they came from. I/O stays in `ofs-block`
//! and orchestration in `ofs-core` — the one exception is the SUSP walker,
//! which takes a fetch callback so it can follow `CE` continuation areas.

pub mod boot;
pub mod directory;
pub mod joliet;
pub mod susp;
pub mod volume;

pub use boot::{BootCatalog, BootCatalogEntry, BootMediaType, BootPlatform, ValidationEntry};
pub use directory::{strip_version_suffix, DirectoryRecord, FileFlags, RecordName, TextEncoding};
pub use joliet::JolietLevel;
pub use susp::{
    decode_system_use_area, detect_susp, rock_ridge_present, ContinuationArea, NmFlags,
    PosixAttributes, RockRidge, RockRidgeTimestamps, SlFlags, SuspContext, SuspEntry, TfFlags,
};
pub use volume::{
    parse_path_table, parse_volume_descriptor, BootRecord, PartitionVolume, PathTableLocations,
    PathTableRecord, SupplementaryVolume, VolumeDescriptor, VolumeParams,
};
