#![forbid(unsafe_code)]
//! Shared on-disc primitives for OpticFS.
//!
//! Bounds-checked byte readers, the dual-endian integer codec peculiar to
//! ISO 9660, the two on-disc timestamp formats, identifier string helpers,
//! and the `ParseError` type used by every decoder in the workspace.

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;
use time::{Date, Month, OffsetDateTime, PrimitiveDateTime, Time, UtcOffset};
use tracing::warn;

/// Logical sector size. ISO 9660 fixes this at 2048 bytes.
pub const SECTOR_SIZE: usize = 2048;

/// Number of opaque System Area sectors at the start of every image.
pub const SYSTEM_AREA_SECTORS: u32 = 16;

/// First LBA of the Volume Descriptor Set.
pub const VOLUME_DESCRIPTOR_START_LBA: u32 = 16;

/// Standard identifier present in every volume descriptor.
pub const STANDARD_IDENTIFIER: &[u8; 5] = b"CD001";

/// Expected volume descriptor version byte.
pub const VOLUME_DESCRIPTOR_VERSION: u8 = 1;

/// Volume descriptor type bytes.
pub const VD_TYPE_BOOT_RECORD: u8 = 0;
pub const VD_TYPE_PRIMARY: u8 = 1;
pub const VD_TYPE_SUPPLEMENTARY: u8 = 2;
pub const VD_TYPE_PARTITION: u8 = 3;
pub const VD_TYPE_TERMINATOR: u8 = 255;

/// Fixed portion of a directory record, up to and including the
/// file-identifier length byte.
pub const DIRECTORY_RECORD_FIXED_LEN: usize = 33;

/// Boot system identifier announcing an El Torito catalog.
pub const EL_TORITO_SYSTEM_IDENTIFIER: &[u8] = b"EL TORITO SPECIFICATION";

// ── POSIX file mode constants ────────────────────────────────────────────────
//
// Rock Ridge PX entries carry a full 32-bit st_mode; these masks cover the
// type bits the reader interprets.

/// File type mask (upper 4 bits of mode).
pub const S_IFMT: u32 = 0o170_000;
/// Named pipe (FIFO).
pub const S_IFIFO: u32 = 0o010_000;
/// Character device.
pub const S_IFCHR: u32 = 0o020_000;
/// Directory.
pub const S_IFDIR: u32 = 0o040_000;
/// Block device.
pub const S_IFBLK: u32 = 0o060_000;
/// Regular file.
pub const S_IFREG: u32 = 0o100_000;
/// Symbolic link.
pub const S_IFLNK: u32 = 0o120_000;
/// Socket.
pub const S_IFSOCK: u32 = 0o140_000;

/// Zero-based logical block address (sector index).
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default,
)]
pub struct Lba(pub u32);

impl Lba {
    /// Add a sector count, returning `None` on overflow.
    #[must_use]
    pub fn checked_add(self, sectors: u32) -> Option<Self> {
        self.0.checked_add(sectors).map(Self)
    }

    /// Byte offset of this sector within the image.
    ///
    /// Always succeeds: `u32::MAX * 2048` fits in a `u64`.
    #[must_use]
    pub fn to_byte_offset(self) -> u64 {
        u64::from(self.0) * SECTOR_SIZE as u64
    }
}

impl fmt::Display for Lba {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Number of whole sectors needed to hold `len` bytes.
#[must_use]
pub fn sectors_for_len(len: u64) -> u64 {
    len.div_ceil(SECTOR_SIZE as u64)
}

/// Structural decode failure in any on-disc structure.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ParseError {
    #[error("insufficient data: need {needed} bytes at offset {offset}, got {actual}")]
    InsufficientData {
        needed: usize,
        offset: usize,
        actual: usize,
    },
    #[error("truncated directory record: declared {declared} bytes, {available} available")]
    TruncatedRecord { declared: usize, available: usize },
    #[error("dual-endian mismatch in {field}: little-endian {le}, big-endian {be}")]
    DualEndianMismatch {
        field: &'static str,
        le: u64,
        be: u64,
    },
    #[error("invalid field: {field} ({reason})")]
    InvalidField {
        field: &'static str,
        reason: &'static str,
    },
    #[error("forbidden character U+{codepoint:04X} in {field}")]
    ForbiddenCharacter { field: &'static str, codepoint: u32 },
    #[error("text decode failed in {field}: {reason}")]
    DecodeError {
        field: &'static str,
        reason: &'static str,
    },
    #[error("integer conversion failed: {field}")]
    IntegerConversion { field: &'static str },
}

// ── Bounds-checked byte readers ─────────────────────────────────────────────

#[inline]
pub fn ensure_slice(data: &[u8], offset: usize, len: usize) -> Result<&[u8], ParseError> {
    let Some(end) = offset.checked_add(len) else {
        return Err(ParseError::InvalidField {
            field: "offset",
            reason: "overflow",
        });
    };

    if end > data.len() {
        return Err(ParseError::InsufficientData {
            needed: len,
            offset,
            actual: data.len().saturating_sub(offset),
        });
    }

    Ok(&data[offset..end])
}

#[inline]
pub fn read_u8(data: &[u8], offset: usize) -> Result<u8, ParseError> {
    Ok(ensure_slice(data, offset, 1)?[0])
}

#[inline]
pub fn read_le_u16(data: &[u8], offset: usize) -> Result<u16, ParseError> {
    let bytes = ensure_slice(data, offset, 2)?;
    Ok(u16::from_le_bytes([bytes[0], bytes[1]]))
}

#[inline]
pub fn read_be_u16(data: &[u8], offset: usize) -> Result<u16, ParseError> {
    let bytes = ensure_slice(data, offset, 2)?;
    Ok(u16::from_be_bytes([bytes[0], bytes[1]]))
}

#[inline]
pub fn read_le_u32(data: &[u8], offset: usize) -> Result<u32, ParseError> {
    let bytes = ensure_slice(data, offset, 4)?;
    Ok(u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]))
}

#[inline]
pub fn read_be_u32(data: &[u8], offset: usize) -> Result<u32, ParseError> {
    let bytes = ensure_slice(data, offset, 4)?;
    Ok(u32::from_be_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]))
}

#[inline]
pub fn read_fixed<const N: usize>(data: &[u8], offset: usize) -> Result<[u8; N], ParseError> {
    let bytes = ensure_slice(data, offset, N)?;
    let mut out = [0_u8; N];
    out.copy_from_slice(bytes);
    Ok(out)
}

// ── Dual-endian integers ────────────────────────────────────────────────────
//
// ISO 9660 stores many integers twice: little-endian followed by big-endian
// of equal width. The readers are strict; a mismatch surfaces both halves in
// `DualEndianMismatch` so lenient call sites can recover the LE half.

/// Decode a 16-bit dual-endian field (4 bytes: LE then BE).
pub fn u16_lsb_msb(data: &[u8], offset: usize, field: &'static str) -> Result<u16, ParseError> {
    let le = read_le_u16(data, offset)?;
    let be = read_be_u16(data, offset + 2)?;
    if le != be {
        return Err(ParseError::DualEndianMismatch {
            field,
            le: u64::from(le),
            be: u64::from(be),
        });
    }
    Ok(le)
}

/// Decode a 32-bit dual-endian field (8 bytes: LE then BE).
pub fn u32_lsb_msb(data: &[u8], offset: usize, field: &'static str) -> Result<u32, ParseError> {
    let le = read_le_u32(data, offset)?;
    let be = read_be_u32(data, offset + 4)?;
    if le != be {
        return Err(ParseError::DualEndianMismatch {
            field,
            le: u64::from(le),
            be: u64::from(be),
        });
    }
    Ok(le)
}

/// Accept the little-endian half of a mismatched 16-bit dual-endian field,
/// logging the disagreement. Any other failure propagates.
#[allow(clippy::cast_possible_truncation)] // LE half of a u16 field fits u16
pub fn u16_prefer_le(result: Result<u16, ParseError>) -> Result<u16, ParseError> {
    match result {
        Err(ParseError::DualEndianMismatch { field, le, be }) => {
            warn!(
                target: "ofs::codec",
                field,
                le,
                be,
                "dual-endian mismatch, using the little-endian half"
            );
            Ok(le as u16)
        }
        other => other,
    }
}

/// Accept the little-endian half of a mismatched 32-bit dual-endian field,
/// logging the disagreement. Any other failure propagates.
#[allow(clippy::cast_possible_truncation)] // LE half of a u32 field fits u32
pub fn u32_prefer_le(result: Result<u32, ParseError>) -> Result<u32, ParseError> {
    match result {
        Err(ParseError::DualEndianMismatch { field, le, be }) => {
            warn!(
                target: "ofs::codec",
                field,
                le,
                be,
                "dual-endian mismatch, using the little-endian half"
            );
            Ok(le as u32)
        }
        other => other,
    }
}

// ── Identifier strings ──────────────────────────────────────────────────────

/// Whether `byte` belongs to the ISO 9660 a-character set.
#[must_use]
pub fn is_a_character(byte: u8) -> bool {
    matches!(byte,
        b'A'..=b'Z' | b'0'..=b'9' | b'_' | b' '
        | b'!' | b'"' | b'%' | b'&' | b'\'' | b'(' | b')' | b'*' | b'+' | b','
        | b'-' | b'.' | b'/' | b':' | b';' | b'<' | b'=' | b'>' | b'?')
}

/// Whether `byte` belongs to the ISO 9660 d-character set.
#[must_use]
pub fn is_d_character(byte: u8) -> bool {
    matches!(byte, b'A'..=b'Z' | b'0'..=b'9' | b'_')
}

/// Decode an a-characters field, trimming trailing space padding.
///
/// Characters outside the a-set are a SHOULD-clause breach on real images;
/// they are kept (lossily) and warned about, never fatal.
#[must_use]
pub fn a_string(bytes: &[u8], field: &'static str) -> String {
    if let Some(bad) = bytes.iter().find(|b| !is_a_character(**b) && **b != 0) {
        warn!(
            target: "ofs::codec",
            field,
            byte = *bad,
            "identifier contains bytes outside the a-character set"
        );
    }
    String::from_utf8_lossy(bytes)
        .trim_end_matches([' ', '\0'])
        .to_owned()
}

/// Decode a d-characters field, trimming trailing space padding.
#[must_use]
pub fn d_string(bytes: &[u8], field: &'static str) -> String {
    if let Some(bad) = bytes.iter().find(|b| !is_d_character(**b) && **b != 0) {
        warn!(
            target: "ofs::codec",
            field,
            byte = *bad,
            "identifier contains bytes outside the d-character set"
        );
    }
    String::from_utf8_lossy(bytes)
        .trim_end_matches([' ', '\0'])
        .to_owned()
}

// ── On-disc timestamps ──────────────────────────────────────────────────────

/// A decoded ISO 9660 timestamp.
///
/// Both on-disc formats reserve an all-zero pattern for "unspecified", and
/// real-world images routinely carry garbage in the remaining cases; a bad
/// stamp never fails the structure that carries it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IsoTimestamp {
    /// Present and decodable.
    Set(OffsetDateTime),
    /// The on-disc field held the "unspecified" pattern.
    Unset,
    /// Present but not a valid date/time.
    Invalid,
}

impl IsoTimestamp {
    #[must_use]
    pub fn is_set(&self) -> bool {
        matches!(self, Self::Set(_))
    }

    /// The instant, if one was decoded.
    #[must_use]
    pub fn as_datetime(&self) -> Option<OffsetDateTime> {
        match self {
            Self::Set(dt) => Some(*dt),
            _ => None,
        }
    }

    /// Decode a 17-byte volume descriptor date: ASCII digits for
    /// `YYYYMMDDhhmmsscc` followed by a signed offset in 15-minute units.
    #[must_use]
    pub fn from_volume_field(raw: &[u8; 17]) -> Self {
        if raw[..16].iter().all(|b| *b == b'0' || *b == 0) && raw[16] == 0 {
            return Self::Unset;
        }

        let parse = || -> Option<OffsetDateTime> {
            let year = ascii_number(&raw[0..4])?;
            let month = Month::try_from(u8::try_from(ascii_number(&raw[4..6])?).ok()?).ok()?;
            let day = u8::try_from(ascii_number(&raw[6..8])?).ok()?;
            let date = Date::from_calendar_date(i32::try_from(year).ok()?, month, day).ok()?;
            let hour = u8::try_from(ascii_number(&raw[8..10])?).ok()?;
            let minute = u8::try_from(ascii_number(&raw[10..12])?).ok()?;
            let second = u8::try_from(ascii_number(&raw[12..14])?).ok()?;
            let centi = u16::try_from(ascii_number(&raw[14..16])?).ok()?;
            let clock = Time::from_hms_milli(hour, minute, second, centi * 10).ok()?;
            let offset = offset_from_quarter_hours(raw[16] as i8)?;
            Some(PrimitiveDateTime::new(date, clock).assume_offset(offset))
        };

        match parse() {
            Some(dt) => Self::Set(dt),
            None => Self::Invalid,
        }
    }

    /// Decode a 7-byte recording stamp: year-since-1900, month, day, hour,
    /// minute, second, signed offset in 15-minute units.
    #[must_use]
    pub fn from_recording_stamp(raw: &[u8; 7]) -> Self {
        if raw.iter().all(|b| *b == 0) {
            return Self::Unset;
        }

        let parse = || -> Option<OffsetDateTime> {
            let month = Month::try_from(raw[1]).ok()?;
            let date = Date::from_calendar_date(1900 + i32::from(raw[0]), month, raw[2]).ok()?;
            let clock = Time::from_hms(raw[3], raw[4], raw[5]).ok()?;
            let offset = offset_from_quarter_hours(raw[6] as i8)?;
            Some(PrimitiveDateTime::new(date, clock).assume_offset(offset))
        };

        match parse() {
            Some(dt) => Self::Set(dt),
            None => Self::Invalid,
        }
    }
}

impl fmt::Display for IsoTimestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Set(dt) => write!(f, "{dt}"),
            Self::Unset => write!(f, "-"),
            Self::Invalid => write!(f, "<invalid>"),
        }
    }
}

fn ascii_number(digits: &[u8]) -> Option<u32> {
    let mut value = 0_u32;
    for digit in digits {
        if !digit.is_ascii_digit() {
            return None;
        }
        value = value.checked_mul(10)?.checked_add(u32::from(digit - b'0'))?;
    }
    Some(value)
}

fn offset_from_quarter_hours(quarters: i8) -> Option<UtcOffset> {
    UtcOffset::from_whole_seconds(i32::from(quarters) * 15 * 60).ok()
}
