//! Byte-level ISO image builder for the integration tests.
//!
//! Assembles a minimal but well-formed image sector by sector: volume
//! descriptors, directory extents, file content, and System Use entries
//! for the extension tests.
#![allow(dead_code)] // each test binary uses its own slice of the fixture

use ofs_block::MemoryByteSource;

pub const SECTOR: usize = 2048;

pub struct IsoBuilder {
    data: Vec<u8>,
}

impl IsoBuilder {
    pub fn new(total_sectors: usize) -> Self {
        Self {
            data: vec![0_u8; total_sectors * SECTOR],
        }
    }

    pub fn sector_mut(&mut self, lba: u32) -> &mut [u8] {
        let start = lba as usize * SECTOR;
        &mut self.data[start..start + SECTOR]
    }

    pub fn write_bytes(&mut self, lba: u32, offset: usize, bytes: &[u8]) {
        let sector = self.sector_mut(lba);
        sector[offset..offset + bytes.len()].copy_from_slice(bytes);
    }

    /// Primary Volume Descriptor with the fields the reader requires.
    pub fn write_pvd(&mut self, lba: u32, root_lba: u32, root_len: u32) {
        let total = (self.data.len() / SECTOR) as u32;
        let sector = self.sector_mut(lba);
        sector[0] = 1;
        sector[1..6].copy_from_slice(b"CD001");
        sector[6] = 1;
        write_padded(&mut sector[8..40], b"LINUX");
        write_padded(&mut sector[40..72], b"OPTIC_TEST");
        write_dual_u32(sector, 80, total);
        write_dual_u16(sector, 120, 1);
        write_dual_u16(sector, 124, 1);
        write_dual_u16(sector, 128, SECTOR as u16);
        write_dual_u32(sector, 132, 0);
        write_padded(&mut sector[318..446], b"OPTICFS TESTS");
        let root = dir_record(&[0x00], root_lba, root_len, true, &[]);
        sector[156..156 + root.len()].copy_from_slice(&root);
        for offset in [813, 830, 847, 864] {
            sector[offset..offset + 16].copy_from_slice(b"0000000000000000");
        }
        sector[881] = 1;
    }

    /// Set the PVD creation date field (17 bytes, ASCII digits + offset).
    pub fn set_pvd_created(&mut self, lba: u32, digits: &[u8; 16], offset_quarter_hours: i8) {
        let sector = self.sector_mut(lba);
        sector[813..829].copy_from_slice(digits);
        sector[829] = offset_quarter_hours as u8;
    }

    /// Force mismatched halves onto the PVD path table size field.
    pub fn set_pvd_path_table_size(&mut self, lba: u32, le: u32, be: u32) {
        let sector = self.sector_mut(lba);
        sector[132..136].copy_from_slice(&le.to_le_bytes());
        sector[136..140].copy_from_slice(&be.to_be_bytes());
    }

    /// Joliet (level 3) Supplementary Volume Descriptor.
    pub fn write_joliet_svd(&mut self, lba: u32, root_lba: u32, root_len: u32) {
        let total = (self.data.len() / SECTOR) as u32;
        let sector = self.sector_mut(lba);
        sector[0] = 2;
        sector[1..6].copy_from_slice(b"CD001");
        sector[6] = 1;
        sector[88..91].copy_from_slice(b"%/E");
        let volume_id = ucs2(b"OPTIC");
        sector[40..40 + volume_id.len()].copy_from_slice(&volume_id);
        write_dual_u32(sector, 80, total);
        write_dual_u16(sector, 120, 1);
        write_dual_u16(sector, 124, 1);
        write_dual_u16(sector, 128, SECTOR as u16);
        write_dual_u32(sector, 132, 0);
        let root = dir_record(&[0x00], root_lba, root_len, true, &[]);
        sector[156..156 + root.len()].copy_from_slice(&root);
        sector[881] = 1;
    }

    pub fn write_terminator(&mut self, lba: u32) {
        let sector = self.sector_mut(lba);
        sector[0] = 255;
        sector[1..6].copy_from_slice(b"CD001");
        sector[6] = 1;
    }

    pub fn write_el_torito_boot_record(&mut self, lba: u32, catalog_lba: u32) {
        let sector = self.sector_mut(lba);
        sector[0] = 0;
        sector[1..6].copy_from_slice(b"CD001");
        sector[6] = 1;
        sector[7..30].copy_from_slice(b"EL TORITO SPECIFICATION");
        sector[71..75].copy_from_slice(&catalog_lba.to_le_bytes());
    }

    /// Boot catalog with one bootable x86 no-emulation entry.
    pub fn write_boot_catalog(&mut self, lba: u32, image_lba: u32, sector_count: u16) {
        let sector = self.sector_mut(lba);
        sector[0] = 0x01;
        sector[4..11].copy_from_slice(b"OPTICFS");
        sector[30] = 0x55;
        sector[31] = 0xAA;
        let sum = sector[..32]
            .chunks_exact(2)
            .map(|pair| u16::from_le_bytes([pair[0], pair[1]]))
            .fold(0_u16, u16::wrapping_add);
        let fix = 0_u16.wrapping_sub(sum).to_le_bytes();
        sector[28..30].copy_from_slice(&fix);

        sector[32] = 0x88;
        sector[38..40].copy_from_slice(&sector_count.to_le_bytes());
        sector[40..44].copy_from_slice(&image_lba.to_le_bytes());
    }

    /// Write a directory extent: `.` and `..` followed by `records`.
    pub fn write_dir(
        &mut self,
        lba: u32,
        data_len: u32,
        parent_lba: u32,
        parent_len: u32,
        dot_system_use: &[u8],
        records: &[Vec<u8>],
    ) {
        let mut bytes = Vec::new();
        bytes.extend(dir_record(&[0x00], lba, data_len, true, dot_system_use));
        bytes.extend(dir_record(&[0x01], parent_lba, parent_len, true, &[]));
        for record in records {
            bytes.extend_from_slice(record);
        }
        assert!(bytes.len() <= SECTOR, "directory overflows its first sector");
        self.write_bytes(lba, 0, &bytes);
    }

    pub fn write_file_content(&mut self, lba: u32, content: &[u8]) {
        self.write_bytes(lba, 0, content);
    }

    pub fn build(self) -> MemoryByteSource {
        MemoryByteSource::new(self.data)
    }
}

/// A directory record with the standard recording stamp
/// 2020-01-02T03:04:05Z.
pub fn dir_record(
    name: &[u8],
    extent: u32,
    data_len: u32,
    is_dir: bool,
    system_use: &[u8],
) -> Vec<u8> {
    let mut len = 33 + name.len();
    if name.len() % 2 == 0 {
        len += 1;
    }
    len += system_use.len();
    let mut record = vec![0_u8; len];
    record[0] = len as u8;
    record[2..6].copy_from_slice(&extent.to_le_bytes());
    record[6..10].copy_from_slice(&extent.to_be_bytes());
    record[10..14].copy_from_slice(&data_len.to_le_bytes());
    record[14..18].copy_from_slice(&data_len.to_be_bytes());
    record[18..25].copy_from_slice(&[120, 1, 2, 3, 4, 5, 0]);
    if is_dir {
        record[25] = 0x02;
    }
    record[28..30].copy_from_slice(&1_u16.to_le_bytes());
    record[30..32].copy_from_slice(&1_u16.to_be_bytes());
    record[32] = name.len() as u8;
    record[33..33 + name.len()].copy_from_slice(name);
    let tail_start = len - system_use.len();
    record[tail_start..].copy_from_slice(system_use);
    record
}

pub fn write_dual_u16(sector: &mut [u8], offset: usize, value: u16) {
    sector[offset..offset + 2].copy_from_slice(&value.to_le_bytes());
    sector[offset + 2..offset + 4].copy_from_slice(&value.to_be_bytes());
}

pub fn write_dual_u32(sector: &mut [u8], offset: usize, value: u32) {
    sector[offset..offset + 4].copy_from_slice(&value.to_le_bytes());
    sector[offset + 4..offset + 8].copy_from_slice(&value.to_be_bytes());
}

fn write_padded(field: &mut [u8], text: &[u8]) {
    field.fill(b' ');
    field[..text.len()].copy_from_slice(text);
}

pub fn ucs2(ascii: &[u8]) -> Vec<u8> {
    ascii.iter().flat_map(|b| [0, *b]).collect()
}

// ── System Use entry builders ───────────────────────────────────────────────

pub fn susp_entry(signature: &[u8; 2], payload: &[u8]) -> Vec<u8> {
    let mut entry = Vec::with_capacity(4 + payload.len());
    entry.extend_from_slice(signature);
    entry.push((4 + payload.len()) as u8);
    entry.push(1);
    entry.extend_from_slice(payload);
    entry
}

pub fn sp_entry() -> Vec<u8> {
    susp_entry(b"SP", &[0xBE, 0xEF, 0])
}

pub fn er_rrip_entry() -> Vec<u8> {
    let id = b"RRIP_1991A";
    let mut payload = vec![id.len() as u8, 0, 0, 1];
    payload.extend_from_slice(id);
    susp_entry(b"ER", &payload)
}

pub fn nm_entry(flags: u8, name: &[u8]) -> Vec<u8> {
    let mut payload = vec![flags];
    payload.extend_from_slice(name);
    susp_entry(b"NM", &payload)
}

pub fn dual_u32_bytes(value: u32) -> Vec<u8> {
    let mut out = Vec::with_capacity(8);
    out.extend_from_slice(&value.to_le_bytes());
    out.extend_from_slice(&value.to_be_bytes());
    out
}

pub fn px_entry(mode: u32, nlink: u32, uid: u32, gid: u32) -> Vec<u8> {
    let mut payload = Vec::new();
    payload.extend(dual_u32_bytes(mode));
    payload.extend(dual_u32_bytes(nlink));
    payload.extend(dual_u32_bytes(uid));
    payload.extend(dual_u32_bytes(gid));
    susp_entry(b"PX", &payload)
}

/// `TF` carrying only the modify stamp, short form.
pub fn tf_modify_entry(stamp: &[u8; 7]) -> Vec<u8> {
    let mut payload = vec![0x02];
    payload.extend_from_slice(stamp);
    susp_entry(b"TF", &payload)
}

pub fn ce_entry(lba: u32, offset: u32, len: u32) -> Vec<u8> {
    let mut payload = Vec::new();
    payload.extend(dual_u32_bytes(lba));
    payload.extend(dual_u32_bytes(offset));
    payload.extend(dual_u32_bytes(len));
    susp_entry(b"CE", &payload)
}

/// `SL` with an absolute two-component target, e.g. `/usr/lib`.
pub fn sl_absolute_entry(first: &[u8], second: &[u8]) -> Vec<u8> {
    let mut payload = vec![0, 0x08, 0];
    payload.push(0);
    payload.push(first.len() as u8);
    payload.extend_from_slice(first);
    payload.push(0);
    payload.push(second.len() as u8);
    payload.extend_from_slice(second);
    susp_entry(b"SL", &payload)
}
