#![forbid(unsafe_code)]
//! Error types for OpticFS.
//!
//! Defines `IsoError` and the `Result<T>` alias used throughout the
//! workspace. Structural violations are fatal to the operation that hit
//! them; SHOULD-clause breaches are logged by the decoders and never
//! surface here.

use ofs_types::ParseError;
use thiserror::Error;

/// Unified error type for all OpticFS operations.
#[derive(Debug, Error)]
pub enum IsoError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Parse(#[from] ParseError),

    #[error("not an ISO 9660 image: descriptor at sector {lba} lacks the CD001 identifier")]
    NotAnIso { lba: u32 },

    #[error("short read at sector {lba}: wanted {wanted} bytes, got {got}")]
    ShortRead { lba: u32, wanted: usize, got: usize },

    #[error("volume descriptor set has no terminator")]
    MissingTerminator,

    #[error("unsupported file structure version {found} (expected 1)")]
    UnsupportedVersion { found: u8 },

    #[error("system use continuation chain exceeded {hops} hops")]
    SuspLoop { hops: u32 },

    #[error("directory cycle: extent at sector {lba} is its own ancestor")]
    CycleDetected { lba: u32 },

    #[error("operation cancelled")]
    Cancelled,

    #[error("no entry at path {path:?}")]
    NotFound { path: String },
}

/// Result alias using `IsoError`.
pub type Result<T> = std::result::Result<T, IsoError>;
