//! The image facade: open, descriptor set decode, and the read APIs.

use crate::entry::FilesystemEntry;
use crate::walk::{walk_directory_tree, WalkOutput, WalkPolicy};
use crate::OpenOptions;
use ofs_block::{ByteSource, ExtentReader, FileByteSource, SectorReader};
use ofs_error::{IsoError, Result};
use ofs_ondisk::boot::BootCatalog;
use ofs_ondisk::directory::TextEncoding;
use ofs_ondisk::volume::{
    parse_path_table, parse_volume_descriptor, BootRecord, PartitionVolume, PathTableRecord,
    SupplementaryVolume, VolumeDescriptor, VolumeParams,
};
use ofs_types::{
    IsoTimestamp, Lba, S_IFREG, STANDARD_IDENTIFIER, SYSTEM_AREA_SECTORS,
    VOLUME_DESCRIPTOR_START_LBA,
};
use std::path::Path;
use std::sync::OnceLock;
use tracing::{debug, warn};

/// Descriptor sectors scanned before concluding the set has no terminator.
const MAX_DESCRIPTOR_SECTORS: u32 = 256;

/// Which decoded hierarchy serves the read APIs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ActiveView {
    Primary,
    Supplementary(usize),
}

/// An opened ISO 9660 image.
///
/// All descriptor state is decoded by [`Image::open`]; the entry list is
/// built there too unless deferred by the options. Nothing is mutated
/// afterwards, so `&self` methods are safe to share across threads.
pub struct Image<S> {
    reader: SectorReader<S>,
    options: OpenOptions,
    system_area: Vec<u8>,
    pvd: VolumeParams,
    svds: Vec<SupplementaryVolume>,
    boot_records: Vec<BootRecord>,
    partitions: Vec<PartitionVolume>,
    boot_catalog: Option<BootCatalog>,
    active: ActiveView,
    walked: OnceLock<WalkOutput>,
}

impl<S> std::fmt::Debug for Image<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Image")
            .field("options", &self.options)
            .field("active", &self.active)
            .finish_non_exhaustive()
    }
}

impl Image<FileByteSource> {
    /// Open the image file at `path`. The file handle is owned by the
    /// image and released on drop.
    pub fn open_path(path: impl AsRef<Path>, options: OpenOptions) -> Result<Self> {
        Self::open(FileByteSource::open(path)?, options)
    }
}

impl<S: ByteSource> Image<S> {
    /// Open an image over any byte source.
    ///
    /// Reads the System Area verbatim, decodes the Volume Descriptor Set
    /// from sector 16 through the terminator, selects the active
    /// hierarchy, and (by default) walks the directory tree.
    pub fn open(source: S, options: OpenOptions) -> Result<Self> {
        let reader = SectorReader::with_cache(source, options.sector_cache_size);
        let system_area = reader.read(Lba(0), SYSTEM_AREA_SECTORS)?;

        let mut pvd: Option<VolumeParams> = None;
        let mut svds = Vec::new();
        let mut boot_records = Vec::new();
        let mut partitions = Vec::new();
        let mut terminated = false;

        let mut lba = Lba(VOLUME_DESCRIPTOR_START_LBA);
        for _ in 0..MAX_DESCRIPTOR_SECTORS {
            let sector = match reader.read_sector(lba) {
                Ok(sector) => sector,
                // The set ran off the end of the image without a terminator.
                Err(IsoError::ShortRead { .. }) => return Err(IsoError::MissingTerminator),
                Err(err) => return Err(err),
            };
            if &sector[1..6] != STANDARD_IDENTIFIER {
                return Err(IsoError::NotAnIso { lba: lba.0 });
            }
            match parse_volume_descriptor(&sector, lba)? {
                VolumeDescriptor::Primary(params) => {
                    if params.file_structure_version != 1 {
                        return Err(IsoError::UnsupportedVersion {
                            found: params.file_structure_version,
                        });
                    }
                    if pvd.is_some() {
                        warn!(
                            target: "ofs::vd",
                            lba = lba.0,
                            "duplicate primary volume descriptor, keeping the first"
                        );
                    } else {
                        pvd = Some(params);
                    }
                }
                VolumeDescriptor::Supplementary(svd) => {
                    if svd.params.file_structure_version > 2 {
                        warn!(
                            target: "ofs::vd",
                            lba = lba.0,
                            version = svd.params.file_structure_version,
                            "supplementary descriptor with unknown file structure version"
                        );
                    }
                    svds.push(svd);
                }
                VolumeDescriptor::Boot(boot) => boot_records.push(boot),
                VolumeDescriptor::Partition(partition) => partitions.push(partition),
                VolumeDescriptor::Terminator => {
                    terminated = true;
                    break;
                }
                VolumeDescriptor::Unknown(vd_type) => {
                    warn!(
                        target: "ofs::vd",
                        lba = lba.0,
                        vd_type,
                        "skipping descriptor with unassigned type"
                    );
                }
            }
            lba = lba.checked_add(1).ok_or(IsoError::MissingTerminator)?;
        }
        if !terminated {
            return Err(IsoError::MissingTerminator);
        }
        let pvd = pvd.ok_or(IsoError::NotAnIso {
            lba: VOLUME_DESCRIPTOR_START_LBA,
        })?;

        let joliet_count = svds.iter().filter(|svd| svd.joliet.is_some()).count();
        if joliet_count > 1 {
            warn!(
                target: "ofs::vd",
                joliet_count,
                "multiple Joliet hierarchies; using the first in descriptor order"
            );
        }
        let active = if options.prefer_joliet {
            match svds.iter().position(|svd| svd.joliet.is_some()) {
                Some(index) => ActiveView::Supplementary(index),
                None => ActiveView::Primary,
            }
        } else {
            ActiveView::Primary
        };

        let boot_catalog = if options.el_torito_enabled {
            decode_boot_catalog(&reader, &boot_records)
        } else {
            None
        };

        let image = Self {
            reader,
            options,
            system_area,
            pvd,
            svds,
            boot_records,
            partitions,
            boot_catalog,
            active,
            walked: OnceLock::new(),
        };
        if image.options.parse_on_open && image.options.preload_directories {
            image.walked()?;
        }
        Ok(image)
    }

    /// Release the image, returning the underlying source.
    pub fn close(self) -> S {
        self.reader.into_source()
    }

    // ── Active view plumbing ────────────────────────────────────────────

    fn active_params(&self) -> &VolumeParams {
        match self.active {
            ActiveView::Primary => &self.pvd,
            ActiveView::Supplementary(index) => &self.svds[index].params,
        }
    }

    fn active_encoding(&self) -> TextEncoding {
        match self.active {
            ActiveView::Primary => TextEncoding::Ascii,
            ActiveView::Supplementary(index) => {
                if self.svds[index].joliet.is_some() {
                    TextEncoding::Ucs2Be
                } else {
                    TextEncoding::Ascii
                }
            }
        }
    }

    fn walked(&self) -> Result<&WalkOutput> {
        if let Some(walked) = self.walked.get() {
            return Ok(walked);
        }
        let encoding = self.active_encoding();
        let policy = WalkPolicy {
            // Rock Ridge rides the primary hierarchy; a Joliet view names
            // files through UCS-2 identifiers instead.
            rock_ridge: self.options.rock_ridge_enabled && encoding == TextEncoding::Ascii,
            strip_version: self.options.strip_version_info,
            encoding,
        };
        let output = walk_directory_tree(&self.reader, &self.active_params().root_record, policy)?;
        debug!(
            target: "ofs::walk",
            entries = output.entries.len(),
            rock_ridge = output.rock_ridge_seen,
            "directory walk complete"
        );
        Ok(self.walked.get_or_init(|| output))
    }

    // ── Identity and metadata ───────────────────────────────────────────

    pub fn volume_id(&self) -> &str {
        &self.active_params().volume_id
    }

    pub fn system_id(&self) -> &str {
        &self.active_params().system_id
    }

    pub fn volume_set_id(&self) -> &str {
        &self.active_params().volume_set_id
    }

    pub fn publisher_id(&self) -> &str {
        &self.active_params().publisher_id
    }

    pub fn preparer_id(&self) -> &str {
        &self.active_params().preparer_id
    }

    pub fn application_id(&self) -> &str {
        &self.active_params().application_id
    }

    pub fn copyright_id(&self) -> &str {
        &self.active_params().copyright_file_id
    }

    pub fn abstract_id(&self) -> &str {
        &self.active_params().abstract_file_id
    }

    pub fn bibliographic_id(&self) -> &str {
        &self.active_params().bibliographic_file_id
    }

    pub fn created(&self) -> IsoTimestamp {
        self.active_params().created
    }

    pub fn modified(&self) -> IsoTimestamp {
        self.active_params().modified
    }

    pub fn expires(&self) -> IsoTimestamp {
        self.active_params().expires
    }

    pub fn effective(&self) -> IsoTimestamp {
        self.active_params().effective
    }

    /// Volume size in logical blocks, from the primary descriptor.
    pub fn volume_size(&self) -> u32 {
        self.pvd.volume_space_size
    }

    /// First sector of the active hierarchy's root directory extent.
    pub fn root_lba(&self) -> Lba {
        self.active_params().root_record.extent()
    }

    /// The opaque System Area (sectors 0–15), preserved verbatim.
    pub fn system_area(&self) -> &[u8] {
        &self.system_area
    }

    /// Whether the descriptor set carries a Joliet hierarchy.
    pub fn has_joliet(&self) -> bool {
        self.svds.iter().any(|svd| svd.joliet.is_some())
    }

    /// Whether any walked record carried Rock Ridge entries.
    pub fn has_rock_ridge(&self) -> Result<bool> {
        Ok(self.walked()?.rock_ridge_seen)
    }

    /// Whether a Boot Record announces an El Torito catalog.
    pub fn has_el_torito(&self) -> bool {
        self.boot_records.iter().any(BootRecord::is_el_torito)
    }

    /// The decoded supplementary descriptors.
    pub fn supplementary_volumes(&self) -> &[SupplementaryVolume] {
        &self.svds
    }

    /// The decoded partition descriptors.
    pub fn partition_volumes(&self) -> &[PartitionVolume] {
        &self.partitions
    }

    /// The decoded boot catalog, when El Torito decode was enabled and the
    /// catalog parsed.
    pub fn boot_catalog(&self) -> Option<&BootCatalog> {
        self.boot_catalog.as_ref()
    }

    /// Decode the active view's L path table. Informational only; the
    /// walker never consults it.
    pub fn path_table(&self) -> Result<Vec<PathTableRecord>> {
        let params = self.active_params();
        let lba = params.path_tables.l_table;
        let size = params.path_table_size;
        if lba == 0 || size == 0 {
            return Ok(Vec::new());
        }
        let data = self.reader.read_extent(Lba(lba), u64::from(size))?;
        Ok(parse_path_table(&data, false, self.active_encoding())?)
    }

    pub(crate) fn options(&self) -> &OpenOptions {
        &self.options
    }

    // ── Listing and reading ─────────────────────────────────────────────

    /// Every entry in discovery order.
    pub fn entries(&self) -> Result<&[FilesystemEntry]> {
        Ok(&self.walked()?.entries)
    }

    /// Non-directory entries (files and symlinks).
    pub fn list_files(&self) -> Result<Vec<&FilesystemEntry>> {
        Ok(self
            .entries()?
            .iter()
            .filter(|entry| !entry.is_dir)
            .collect())
    }

    /// Directory entries.
    pub fn list_directories(&self) -> Result<Vec<&FilesystemEntry>> {
        Ok(self
            .entries()?
            .iter()
            .filter(|entry| entry.is_dir)
            .collect())
    }

    /// Case-sensitive exact lookup over the chosen name space.
    pub fn find(&self, path: &str) -> Result<Option<&FilesystemEntry>> {
        Ok(self.entries()?.iter().find(|entry| entry.path == path))
    }

    /// Read a file's bytes, bounded by its recorded data length.
    pub fn read(&self, path: &str) -> Result<Vec<u8>> {
        let entry = self
            .find(path)?
            .ok_or_else(|| IsoError::NotFound {
                path: path.to_owned(),
            })?;
        if entry.is_dir {
            return Err(IsoError::NotFound {
                path: path.to_owned(),
            });
        }
        self.reader.read_extent(entry.extent, entry.size)
    }

    /// Incremental reader over one entry's bytes.
    pub fn open_reader(&self, entry: &FilesystemEntry) -> ExtentReader<'_, S> {
        self.reader.extent_reader(entry.extent, entry.size)
    }

    /// Synthetic entries for the El Torito boot images, rooted under the
    /// configured boot extraction location.
    pub fn list_boot_entries(&self) -> Vec<FilesystemEntry> {
        let Some(catalog) = &self.boot_catalog else {
            return Vec::new();
        };
        let location = &self.options.boot_file_extract_location;
        catalog
            .bootable_entries()
            .enumerate()
            .map(|(index, entry)| {
                let name = format!(
                    "{}-boot-{}.img",
                    index + 1,
                    boot_platform_slug(entry.platform)
                );
                let size = entry.image_len_bytes();
                FilesystemEntry {
                    path: format!("/{location}/{name}"),
                    name,
                    size,
                    mode: S_IFREG | 0o644,
                    mtime: IsoTimestamp::Unset,
                    is_dir: false,
                    symlink_target: None,
                    extent: Lba(entry.load_rba),
                    data_len: u32::try_from(size).unwrap_or(u32::MAX),
                }
            })
            .collect()
    }
}

fn boot_platform_slug(platform: ofs_ondisk::boot::BootPlatform) -> &'static str {
    use ofs_ondisk::boot::BootPlatform;
    match platform {
        BootPlatform::X86 => "x86",
        BootPlatform::PowerPc => "ppc",
        BootPlatform::Mac => "mac",
        BootPlatform::Efi => "efi",
        BootPlatform::Unknown(_) => "unknown",
    }
}

/// Find the El Torito boot record and decode its catalog sector. Catalog
/// damage is reported and tolerated; the boot listing just comes back
/// empty.
fn decode_boot_catalog<S: ByteSource>(
    reader: &SectorReader<S>,
    boot_records: &[BootRecord],
) -> Option<BootCatalog> {
    let record = boot_records.iter().find(|b| b.is_el_torito())?;
    let sector = match reader.read_sector(record.catalog_lba) {
        Ok(sector) => sector,
        Err(err) => {
            warn!(target: "ofs::boot", %err, "cannot read the boot catalog sector");
            return None;
        }
    };
    match BootCatalog::parse(&sector) {
        Ok(catalog) => Some(catalog),
        Err(err) => {
            warn!(target: "ofs::boot", %err, "boot catalog does not decode");
            None
        }
    }
}
