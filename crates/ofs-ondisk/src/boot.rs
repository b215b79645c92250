//! El Torito boot catalog decoding.
//!
//! The catalog lives in the sector named by the Boot Record descriptor: a
//! 32-byte validation entry, an initial/default entry, then optional
//! section headers with their entries. Catalog decode stops at the first
//! byte that is not a recognized entry indicator.

use ofs_types::{ensure_slice, read_le_u16, read_le_u32, ParseError};
use serde::{Deserialize, Serialize};
use tracing::warn;

const ENTRY_SIZE: usize = 32;
const VALIDATION_HEADER_ID: u8 = 0x01;
const KEY_BYTES: [u8; 2] = [0x55, 0xAA];
const BOOTABLE_INDICATOR: u8 = 0x88;
const NOT_BOOTABLE_INDICATOR: u8 = 0x00;
const SECTION_HEADER: u8 = 0x90;
const FINAL_SECTION_HEADER: u8 = 0x91;

/// Platform a boot entry targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BootPlatform {
    X86,
    PowerPc,
    Mac,
    Efi,
    Unknown(u8),
}

impl BootPlatform {
    #[must_use]
    pub fn from_id(id: u8) -> Self {
        match id {
            0x00 => Self::X86,
            0x01 => Self::PowerPc,
            0x02 => Self::Mac,
            0xEF => Self::Efi,
            other => Self::Unknown(other),
        }
    }
}

/// Media emulation of a boot entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BootMediaType {
    NoEmulation,
    Floppy12,
    Floppy144,
    Floppy288,
    HardDisk,
    Unknown(u8),
}

impl BootMediaType {
    #[must_use]
    pub fn from_id(id: u8) -> Self {
        match id & 0x0F {
            0 => Self::NoEmulation,
            1 => Self::Floppy12,
            2 => Self::Floppy144,
            3 => Self::Floppy288,
            4 => Self::HardDisk,
            other => Self::Unknown(other),
        }
    }

    /// Fixed image size implied by floppy emulation, if any.
    #[must_use]
    pub fn emulated_size(&self) -> Option<u64> {
        match self {
            Self::Floppy12 => Some(1_228_800),
            Self::Floppy144 => Some(1_474_560),
            Self::Floppy288 => Some(2_949_120),
            _ => None,
        }
    }
}

/// The catalog's validation entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationEntry {
    pub platform: BootPlatform,
    pub manufacturer: String,
    /// Whether the 16-bit checksum over the entry summed to zero.
    pub checksum_ok: bool,
}

/// One bootable (or marked non-bootable) catalog entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BootCatalogEntry {
    pub bootable: bool,
    pub platform: BootPlatform,
    pub media_type: BootMediaType,
    pub load_segment: u16,
    pub system_type: u8,
    /// Count of 512-byte virtual sectors to load.
    pub sector_count: u16,
    /// Absolute start sector of the boot image on the disc.
    pub load_rba: u32,
}

impl BootCatalogEntry {
    /// Byte length of the boot image: the emulated floppy size when the
    /// entry emulates one, otherwise the virtual sector count.
    #[must_use]
    pub fn image_len_bytes(&self) -> u64 {
        self.media_type
            .emulated_size()
            .unwrap_or(u64::from(self.sector_count) * 512)
    }
}

/// A decoded El Torito boot catalog.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BootCatalog {
    pub validation: ValidationEntry,
    pub entries: Vec<BootCatalogEntry>,
}

impl BootCatalog {
    /// Decode the catalog from its sector.
    pub fn parse(sector: &[u8]) -> Result<Self, ParseError> {
        let validation_raw = ensure_slice(sector, 0, ENTRY_SIZE)?;
        if validation_raw[0] != VALIDATION_HEADER_ID {
            return Err(ParseError::InvalidField {
                field: "validation_entry",
                reason: "header id is not 0x01",
            });
        }
        if validation_raw[30..32] != KEY_BYTES {
            return Err(ParseError::InvalidField {
                field: "validation_entry",
                reason: "missing 0x55AA key bytes",
            });
        }
        let checksum_ok = entry_checksum(validation_raw) == 0;
        if !checksum_ok {
            warn!(target: "ofs::boot", "validation entry checksum does not sum to zero");
        }
        let validation = ValidationEntry {
            platform: BootPlatform::from_id(validation_raw[1]),
            manufacturer: String::from_utf8_lossy(&validation_raw[4..28])
                .trim_end_matches(['\0', ' '])
                .to_owned(),
            checksum_ok,
        };

        let mut entries = Vec::new();
        let initial = parse_entry(sector, ENTRY_SIZE, validation.platform)?;
        entries.push(initial);

        let mut offset = 2 * ENTRY_SIZE;
        'sections: while offset + ENTRY_SIZE <= sector.len() {
            let header = ensure_slice(sector, offset, ENTRY_SIZE)?;
            let indicator = header[0];
            if indicator != SECTION_HEADER && indicator != FINAL_SECTION_HEADER {
                break;
            }
            let platform = BootPlatform::from_id(header[1]);
            let count = usize::from(read_le_u16(header, 2)?);
            offset += ENTRY_SIZE;
            for _ in 0..count {
                if offset + ENTRY_SIZE > sector.len() {
                    warn!(
                        target: "ofs::boot",
                        "section declares more entries than the catalog sector holds"
                    );
                    break 'sections;
                }
                entries.push(parse_entry(sector, offset, platform)?);
                offset += ENTRY_SIZE;
            }
            if indicator == FINAL_SECTION_HEADER {
                break;
            }
        }

        Ok(Self {
            validation,
            entries,
        })
    }

    /// Entries flagged bootable.
    pub fn bootable_entries(&self) -> impl Iterator<Item = &BootCatalogEntry> {
        self.entries.iter().filter(|entry| entry.bootable)
    }
}

fn parse_entry(
    sector: &[u8],
    offset: usize,
    platform: BootPlatform,
) -> Result<BootCatalogEntry, ParseError> {
    let raw = ensure_slice(sector, offset, ENTRY_SIZE)?;
    let indicator = raw[0];
    if indicator != BOOTABLE_INDICATOR && indicator != NOT_BOOTABLE_INDICATOR {
        warn!(
            target: "ofs::boot",
            indicator,
            "unexpected boot entry indicator, treating as non-bootable"
        );
    }
    Ok(BootCatalogEntry {
        bootable: indicator == BOOTABLE_INDICATOR,
        platform,
        media_type: BootMediaType::from_id(raw[1]),
        load_segment: read_le_u16(raw, 2)?,
        system_type: raw[4],
        sector_count: read_le_u16(raw, 6)?,
        load_rba: read_le_u32(raw, 8)?,
    })
}

/// Sum of the sixteen little-endian 16-bit words of a catalog entry.
fn entry_checksum(entry: &[u8]) -> u16 {
    entry
        .chunks_exact(2)
        .map(|pair| u16::from_le_bytes([pair[0], pair[1]]))
        .fold(0_u16, u16::wrapping_add)
}
