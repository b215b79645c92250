//! Directory record decoding.
//!
//! A directory extent is a concatenation of variable-length records, each
//! self-describing through its first byte and wholly contained in one
//! logical block. A zero first byte means the remainder of the block is
//! unused and the cursor advances to the next block boundary.

use crate::joliet;
use crate::susp::RockRidge;
use bitflags::bitflags;
use ofs_types::{
    read_fixed, u16_lsb_msb, u16_prefer_le, u32_lsb_msb, u32_prefer_le, IsoTimestamp, Lba,
    ParseError, DIRECTORY_RECORD_FIXED_LEN,
};
use tracing::warn;

bitflags! {
    /// File flags byte of a directory record.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct FileFlags: u8 {
        const HIDDEN = 0x01;
        const DIRECTORY = 0x02;
        const ASSOCIATED = 0x04;
        const RECORD = 0x08;
        const PROTECTION = 0x10;
        const MULTI_EXTENT = 0x80;
    }
}

/// Identifier encoding of the active view.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TextEncoding {
    Ascii,
    Ucs2Be,
}

/// A decoded file identifier.
///
/// The single-byte values `0x00` and `0x01` are reserved for the record
/// itself and its parent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecordName {
    Current,
    Parent,
    Identifier(String),
}

impl RecordName {
    /// Whether this is one of the `.` / `..` bookkeeping records.
    #[must_use]
    pub fn is_special(&self) -> bool {
        !matches!(self, Self::Identifier(_))
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        match self {
            Self::Current => ".",
            Self::Parent => "..",
            Self::Identifier(name) => name,
        }
    }
}

/// Remove a trailing `;N` version suffix, and any bare trailing dots left
/// by extensionless 8.3 identifiers. Idempotent.
#[must_use]
pub fn strip_version_suffix(name: &str) -> &str {
    let base = match name.rfind(';') {
        Some(pos) => &name[..pos],
        None => name,
    };
    base.trim_end_matches('.')
}

/// One directory record, fields copied out of the sector buffer.
#[derive(Debug, Clone)]
pub struct DirectoryRecord {
    pub record_len: u8,
    pub ext_attr_len: u8,
    pub extent_lba: u32,
    pub data_len: u32,
    pub recorded_at: IsoTimestamp,
    pub flags: FileFlags,
    pub file_unit_size: u8,
    pub interleave_gap_size: u8,
    pub volume_sequence_number: u16,
    pub name: RecordName,
    /// System Use Area bytes, handed to the SUSP decoder.
    pub system_use: Vec<u8>,
    /// Rock Ridge view, synthesized by the walker when the extension is
    /// present and enabled.
    pub rock_ridge: Option<RockRidge>,
}

impl DirectoryRecord {
    /// Whether the directory bit is set.
    #[must_use]
    pub fn is_directory(&self) -> bool {
        self.flags.contains(FileFlags::DIRECTORY)
    }

    /// First data sector of the extent. An extended attribute record, when
    /// present, occupies the leading `ext_attr_len` blocks.
    #[must_use]
    pub fn extent(&self) -> Lba {
        Lba(self.extent_lba.saturating_add(u32::from(self.ext_attr_len)))
    }

    /// Decode one record from `window`, which must begin at a record
    /// boundary.
    ///
    /// Returns the record and the number of bytes consumed, or `None` when
    /// the first byte is zero, meaning the caller should advance to the
    /// next logical block. `lba` is carried for diagnostics only.
    pub fn parse(
        window: &[u8],
        encoding: TextEncoding,
        lba: Lba,
    ) -> Result<Option<(Self, usize)>, ParseError> {
        let Some(&first) = window.first() else {
            return Err(ParseError::InsufficientData {
                needed: 1,
                offset: 0,
                actual: 0,
            });
        };
        if first == 0 {
            return Ok(None);
        }

        let declared = usize::from(first);
        if declared < DIRECTORY_RECORD_FIXED_LEN {
            return Err(ParseError::TruncatedRecord {
                declared,
                available: window.len(),
            });
        }
        if declared > window.len() {
            return Err(ParseError::TruncatedRecord {
                declared,
                available: window.len(),
            });
        }
        let record = &window[..declared];

        let extent_lba = u32_prefer_le(u32_lsb_msb(record, 2, "extent_lba"))?;
        let data_len = u32_prefer_le(u32_lsb_msb(record, 10, "data_length"))?;
        let recorded_at = IsoTimestamp::from_recording_stamp(&read_fixed::<7>(record, 18)?);
        let flags = FileFlags::from_bits_retain(record[25]);
        let volume_sequence_number =
            u16_prefer_le(u16_lsb_msb(record, 28, "volume_sequence_number"))?;

        let id_len = usize::from(record[32]);
        if id_len == 0 {
            return Err(ParseError::InvalidField {
                field: "file_identifier_length",
                reason: "must be non-zero",
            });
        }
        let id_end = DIRECTORY_RECORD_FIXED_LEN + id_len;
        if id_end > declared {
            return Err(ParseError::InvalidField {
                field: "file_identifier",
                reason: "identifier extends past the declared record length",
            });
        }
        let raw_id = &record[DIRECTORY_RECORD_FIXED_LEN..id_end];
        let name = decode_name(raw_id, encoding)?;

        // One padding byte keeps the System Use Area at an even offset when
        // the identifier length is even.
        let mut system_use_start = id_end;
        if id_len % 2 == 0 {
            system_use_start += 1;
        }
        if system_use_start > declared {
            warn!(
                target: "ofs::dir",
                lba = lba.0,
                declared,
                "record padding byte falls outside the declared length"
            );
            system_use_start = declared;
        }
        let system_use = record[system_use_start..declared].to_vec();

        Ok(Some((
            Self {
                record_len: first,
                ext_attr_len: record[1],
                extent_lba,
                data_len,
                recorded_at,
                flags,
                file_unit_size: record[26],
                interleave_gap_size: record[27],
                volume_sequence_number,
                name,
                system_use,
                rock_ridge: None,
            },
            declared,
        )))
    }
}

fn decode_name(raw: &[u8], encoding: TextEncoding) -> Result<RecordName, ParseError> {
    if raw.len() == 1 {
        match raw[0] {
            0x00 => return Ok(RecordName::Current),
            0x01 => return Ok(RecordName::Parent),
            _ => {}
        }
    }
    let name = match encoding {
        TextEncoding::Ascii => String::from_utf8_lossy(raw).into_owned(),
        TextEncoding::Ucs2Be => joliet::decode_identifier(raw)?,
    };
    Ok(RecordName::Identifier(name))
}
