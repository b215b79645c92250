//! Volume descriptor decoding.
//!
//! The Volume Descriptor Set starts at sector 16 and runs one descriptor
//! per sector until the Set Terminator. Every descriptor shares a 7-byte
//! header: type, the `CD001` standard identifier, and a version byte.
//! Primary and Supplementary descriptors share one field layout; the SVD
//! repurposes two reserved areas for volume flags and escape sequences.

use crate::directory::{DirectoryRecord, TextEncoding};
use crate::joliet::{self, JolietLevel};
use ofs_types::{
    a_string, d_string, ensure_slice, read_be_u32, read_le_u16, read_le_u32, read_fixed,
    u16_lsb_msb, u16_prefer_le, u32_lsb_msb, u32_prefer_le, IsoTimestamp, Lba, ParseError,
    EL_TORITO_SYSTEM_IDENTIFIER, SECTOR_SIZE, STANDARD_IDENTIFIER, VD_TYPE_BOOT_RECORD,
    VD_TYPE_PARTITION, VD_TYPE_PRIMARY, VD_TYPE_SUPPLEMENTARY, VD_TYPE_TERMINATOR,
    VOLUME_DESCRIPTOR_VERSION,
};
use tracing::warn;

/// The four path table locations carried by PVD and SVD.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PathTableLocations {
    pub l_table: u32,
    pub optional_l_table: u32,
    pub m_table: u32,
    pub optional_m_table: u32,
}

/// Fields common to Primary and Supplementary volume descriptors.
#[derive(Debug, Clone)]
pub struct VolumeParams {
    pub system_id: String,
    pub volume_id: String,
    pub volume_space_size: u32,
    pub volume_set_size: u16,
    pub volume_sequence_number: u16,
    pub logical_block_size: u16,
    pub path_table_size: u32,
    pub path_tables: PathTableLocations,
    pub root_record: DirectoryRecord,
    pub volume_set_id: String,
    pub publisher_id: String,
    pub preparer_id: String,
    pub application_id: String,
    pub copyright_file_id: String,
    pub abstract_file_id: String,
    pub bibliographic_file_id: String,
    pub created: IsoTimestamp,
    pub modified: IsoTimestamp,
    pub expires: IsoTimestamp,
    pub effective: IsoTimestamp,
    pub file_structure_version: u8,
    pub application_use: Vec<u8>,
}

/// A Supplementary Volume Descriptor, possibly a Joliet volume.
#[derive(Debug, Clone)]
pub struct SupplementaryVolume {
    pub params: VolumeParams,
    pub volume_flags: u8,
    pub escape_sequences: [u8; 32],
    pub joliet: Option<JolietLevel>,
}

/// A Boot Record descriptor.
#[derive(Debug, Clone)]
pub struct BootRecord {
    pub boot_system_id: String,
    pub boot_id: String,
    /// Absolute sector of the El Torito boot catalog; meaningful only when
    /// [`BootRecord::is_el_torito`] holds.
    pub catalog_lba: Lba,
}

impl BootRecord {
    /// Whether the boot system identifier announces an El Torito catalog.
    #[must_use]
    pub fn is_el_torito(&self) -> bool {
        self.boot_system_id.as_bytes() == EL_TORITO_SYSTEM_IDENTIFIER
    }
}

/// A Volume Partition descriptor.
#[derive(Debug, Clone)]
pub struct PartitionVolume {
    pub system_id: String,
    pub partition_id: String,
    pub partition_location: u32,
    pub partition_size: u32,
}

/// One decoded descriptor from the set.
#[derive(Debug, Clone)]
pub enum VolumeDescriptor {
    Boot(BootRecord),
    Primary(VolumeParams),
    Supplementary(SupplementaryVolume),
    Partition(PartitionVolume),
    Terminator,
    /// A type byte outside the assigned range; kept so the set decoder can
    /// warn and move on.
    Unknown(u8),
}

/// Decode one 2048-byte descriptor sector.
///
/// The standard identifier must already have been checked by the caller
/// (it decides `NotAnIso` with the sector's LBA); this function re-checks
/// and reports it as a field error for direct users.
pub fn parse_volume_descriptor(sector: &[u8], lba: Lba) -> Result<VolumeDescriptor, ParseError> {
    if sector.len() < SECTOR_SIZE {
        return Err(ParseError::InsufficientData {
            needed: SECTOR_SIZE,
            offset: 0,
            actual: sector.len(),
        });
    }
    if &sector[1..6] != STANDARD_IDENTIFIER {
        return Err(ParseError::InvalidField {
            field: "standard_identifier",
            reason: "missing CD001",
        });
    }
    let vd_type = sector[0];
    let version = sector[6];
    if vd_type != VD_TYPE_TERMINATOR && version != VOLUME_DESCRIPTOR_VERSION {
        warn!(
            target: "ofs::vd",
            lba = lba.0,
            vd_type,
            version,
            "unexpected volume descriptor version"
        );
    }

    match vd_type {
        VD_TYPE_BOOT_RECORD => Ok(VolumeDescriptor::Boot(parse_boot_record(sector)?)),
        VD_TYPE_PRIMARY => {
            check_reserved(sector, lba, &[(7, 8), (72, 80), (88, 120)]);
            Ok(VolumeDescriptor::Primary(parse_params(
                sector,
                TextEncoding::Ascii,
                lba,
            )?))
        }
        VD_TYPE_SUPPLEMENTARY => Ok(VolumeDescriptor::Supplementary(parse_supplementary(
            sector, lba,
        )?)),
        VD_TYPE_PARTITION => Ok(VolumeDescriptor::Partition(parse_partition(sector)?)),
        VD_TYPE_TERMINATOR => Ok(VolumeDescriptor::Terminator),
        other => Ok(VolumeDescriptor::Unknown(other)),
    }
}

fn parse_boot_record(sector: &[u8]) -> Result<BootRecord, ParseError> {
    Ok(BootRecord {
        boot_system_id: a_string(ensure_slice(sector, 7, 32)?, "boot_system_identifier"),
        boot_id: a_string(ensure_slice(sector, 39, 32)?, "boot_identifier"),
        // El Torito stores the catalog pointer in the first four bytes of
        // the boot system use area, little-endian only.
        catalog_lba: Lba(read_le_u32(sector, 71)?),
    })
}

fn parse_partition(sector: &[u8]) -> Result<PartitionVolume, ParseError> {
    Ok(PartitionVolume {
        system_id: a_string(ensure_slice(sector, 8, 32)?, "system_identifier"),
        partition_id: d_string(ensure_slice(sector, 40, 32)?, "partition_identifier"),
        partition_location: u32_prefer_le(u32_lsb_msb(sector, 72, "partition_location"))?,
        partition_size: u32_prefer_le(u32_lsb_msb(sector, 80, "partition_size"))?,
    })
}

fn parse_supplementary(sector: &[u8], lba: Lba) -> Result<SupplementaryVolume, ParseError> {
    let escape_sequences: [u8; 32] = read_fixed(sector, 88)?;
    let joliet = JolietLevel::from_escape_area(&escape_sequences);
    let encoding = if joliet.is_some() {
        TextEncoding::Ucs2Be
    } else {
        TextEncoding::Ascii
    };
    Ok(SupplementaryVolume {
        params: parse_params(sector, encoding, lba)?,
        volume_flags: sector[7],
        escape_sequences,
        joliet,
    })
}

fn parse_params(
    sector: &[u8],
    encoding: TextEncoding,
    lba: Lba,
) -> Result<VolumeParams, ParseError> {
    let root_window = ensure_slice(sector, 156, 34)?;
    let root_record = DirectoryRecord::parse(root_window, encoding, lba)?
        .ok_or(ParseError::InvalidField {
            field: "root_directory_record",
            reason: "empty record",
        })?
        .0;

    let text = |range: std::ops::Range<usize>, field: &'static str| -> Result<String, ParseError> {
        let bytes = ensure_slice(sector, range.start, range.len())?;
        Ok(match encoding {
            TextEncoding::Ascii => a_string(bytes, field),
            TextEncoding::Ucs2Be => joliet::ucs2_lossy(bytes),
        })
    };

    Ok(VolumeParams {
        system_id: text(8..40, "system_identifier")?,
        volume_id: text(40..72, "volume_identifier")?,
        volume_space_size: u32_prefer_le(u32_lsb_msb(sector, 80, "volume_space_size"))?,
        volume_set_size: u16_prefer_le(u16_lsb_msb(sector, 120, "volume_set_size"))?,
        volume_sequence_number: u16_prefer_le(u16_lsb_msb(
            sector,
            124,
            "volume_sequence_number",
        ))?,
        logical_block_size: u16_prefer_le(u16_lsb_msb(sector, 128, "logical_block_size"))?,
        path_table_size: u32_prefer_le(u32_lsb_msb(sector, 132, "path_table_size"))?,
        path_tables: PathTableLocations {
            l_table: read_le_u32(sector, 140)?,
            optional_l_table: read_le_u32(sector, 144)?,
            m_table: read_be_u32(sector, 148)?,
            optional_m_table: read_be_u32(sector, 152)?,
        },
        root_record,
        volume_set_id: text(190..318, "volume_set_identifier")?,
        publisher_id: text(318..446, "publisher_identifier")?,
        preparer_id: text(446..574, "data_preparer_identifier")?,
        application_id: text(574..702, "application_identifier")?,
        copyright_file_id: text(702..739, "copyright_file_identifier")?,
        abstract_file_id: text(739..776, "abstract_file_identifier")?,
        bibliographic_file_id: text(776..813, "bibliographic_file_identifier")?,
        created: IsoTimestamp::from_volume_field(&read_fixed(sector, 813)?),
        modified: IsoTimestamp::from_volume_field(&read_fixed(sector, 830)?),
        expires: IsoTimestamp::from_volume_field(&read_fixed(sector, 847)?),
        effective: IsoTimestamp::from_volume_field(&read_fixed(sector, 864)?),
        file_structure_version: sector[881],
        application_use: sector[883..1395].to_vec(),
    })
}

fn check_reserved(sector: &[u8], lba: Lba, ranges: &[(usize, usize)]) {
    for (start, end) in ranges {
        if sector[*start..*end].iter().any(|b| *b != 0) {
            warn!(
                target: "ofs::vd",
                lba = lba.0,
                start,
                end,
                "reserved descriptor bytes are not zero"
            );
        }
    }
}

/// One entry of the (informational) Path Table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathTableRecord {
    pub dir_id: String,
    pub ext_attr_len: u8,
    pub extent_lba: u32,
    pub parent_number: u16,
}

/// Decode a whole path table of `table_size` bytes.
///
/// The L table stores integers little-endian, the M table big-endian. The
/// table is never used for traversal; it is decoded for inspection only.
pub fn parse_path_table(
    data: &[u8],
    big_endian: bool,
    encoding: TextEncoding,
) -> Result<Vec<PathTableRecord>, ParseError> {
    let mut records = Vec::new();
    let mut cursor = 0_usize;
    while cursor + 8 <= data.len() {
        let id_len = usize::from(data[cursor]);
        if id_len == 0 {
            break;
        }
        let ext_attr_len = data[cursor + 1];
        let extent_lba = if big_endian {
            read_be_u32(data, cursor + 2)?
        } else {
            read_le_u32(data, cursor + 2)?
        };
        let parent_number = if big_endian {
            u16::from_be_bytes([data[cursor + 6], data[cursor + 7]])
        } else {
            read_le_u16(data, cursor + 6)?
        };
        let id_bytes = ensure_slice(data, cursor + 8, id_len)?;
        let dir_id = match encoding {
            TextEncoding::Ascii => String::from_utf8_lossy(id_bytes).into_owned(),
            TextEncoding::Ucs2Be => joliet::ucs2_lossy(id_bytes),
        };
        cursor += 8 + id_len + (id_len & 1);
        records.push(PathTableRecord {
            dir_id,
            ext_attr_len,
            extent_lba,
            parent_number,
        });
    }
    Ok(records)
}
