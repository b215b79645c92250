//! Breadth-first directory tree walker.
//!
//! Reads each directory extent, slices it into records, synthesizes the
//! Rock Ridge view per record, and produces the flat entry list in
//! on-disc order within a directory and discovery order across
//! directories.

use crate::entry::FilesystemEntry;
use ofs_block::{ByteSource, SectorReader};
use ofs_error::{IsoError, Result};
use ofs_ondisk::directory::{
    strip_version_suffix, DirectoryRecord, FileFlags, RecordName, TextEncoding,
};
use ofs_ondisk::susp::{
    decode_system_use_area, detect_susp, rock_ridge_present, ContinuationArea, RockRidge,
    SuspContext, SuspEntry,
};
use ofs_types::{IsoTimestamp, Lba, S_IFDIR, S_IFREG, SECTOR_SIZE};
use std::collections::{HashSet, VecDeque};
use tracing::{debug, warn};

/// Walker configuration, reduced from the open options.
#[derive(Debug, Clone, Copy)]
pub(crate) struct WalkPolicy {
    pub rock_ridge: bool,
    pub strip_version: bool,
    pub encoding: TextEncoding,
}

/// Result of a tree walk.
pub(crate) struct WalkOutput {
    pub entries: Vec<FilesystemEntry>,
    /// Whether any record carried Rock Ridge entries.
    pub rock_ridge_seen: bool,
}

struct Job {
    extent: Lba,
    data_len: u32,
    path: String,
    /// Extents of this directory and every directory above it.
    ancestors: Vec<u32>,
}

/// Walk the hierarchy under `root` into a flat entry list.
pub(crate) fn walk_directory_tree<S: ByteSource>(
    reader: &SectorReader<S>,
    root: &DirectoryRecord,
    policy: WalkPolicy,
) -> Result<WalkOutput> {
    let mut entries = Vec::new();
    let mut rock_ridge_seen = false;
    let mut susp: Option<SuspContext> = None;

    let root_extent = root.extent();
    let mut visited: HashSet<(u32, u32)> = HashSet::new();
    visited.insert((root_extent.0, root.data_len));

    let mut queue = VecDeque::new();
    queue.push_back(Job {
        extent: root_extent,
        data_len: root.data_len,
        path: String::new(),
        ancestors: vec![root_extent.0],
    });

    while let Some(job) = queue.pop_front() {
        let data = reader.read_extent(job.extent, u64::from(job.data_len))?;
        let mut cursor = 0_usize;
        while cursor < data.len() {
            let block_end = ((cursor / SECTOR_SIZE) + 1) * SECTOR_SIZE;
            let window = &data[cursor..data.len().min(block_end)];
            let Some((record, consumed)) =
                DirectoryRecord::parse(window, policy.encoding, job.extent)?
            else {
                // Zero byte: the rest of this logical block is unused.
                cursor = block_end;
                continue;
            };
            cursor += consumed;

            if record.name.is_special() {
                // The root's `.` record anchors the SUSP indicator and
                // usually the Rock Ridge `ER` announcement.
                if policy.rock_ridge && job.path.is_empty() && record.name == RecordName::Current
                {
                    susp = detect_susp(&record.system_use);
                    if susp.is_some() {
                        let susp_entries = decode_record_tail(reader, &record.system_use, 0)?;
                        rock_ridge_seen |= rock_ridge_present(&susp_entries);
                    }
                }
                continue;
            }

            let mut record = record;
            if policy.rock_ridge {
                let skip = susp.map_or(0, |ctx| ctx.skip_bytes);
                let susp_entries = decode_record_tail(reader, &record.system_use, skip)?;
                rock_ridge_seen |= rock_ridge_present(&susp_entries);
                record.rock_ridge = RockRidge::from_entries(&susp_entries);
            }

            if let Some(entry) = build_entry(reader, &record, &job, policy)? {
                if entry.is_dir {
                    let key = (entry.extent.0, entry.data_len);
                    if job.ancestors.contains(&entry.extent.0) {
                        return Err(IsoError::CycleDetected {
                            lba: entry.extent.0,
                        });
                    }
                    if visited.insert(key) {
                        let mut ancestors = job.ancestors.clone();
                        ancestors.push(entry.extent.0);
                        queue.push_back(Job {
                            extent: entry.extent,
                            data_len: entry.data_len,
                            path: entry.path.clone(),
                            ancestors,
                        });
                    } else {
                        warn!(
                            target: "ofs::walk",
                            path = %entry.path,
                            lba = entry.extent.0,
                            "directory extent already enumerated, skipping descent"
                        );
                    }
                }
                entries.push(entry);
            }
        }
    }

    Ok(WalkOutput {
        entries,
        rock_ridge_seen,
    })
}

/// Decode one record's System Use stream, following continuation areas
/// through the sector reader.
fn decode_record_tail<S: ByteSource>(
    reader: &SectorReader<S>,
    tail: &[u8],
    skip: u8,
) -> Result<Vec<SuspEntry>> {
    let mut fetch = |area: &ContinuationArea| -> Result<Vec<u8>> {
        let end = u64::from(area.offset) + u64::from(area.len);
        let bytes = reader.read_extent(Lba(area.lba), end)?;
        Ok(bytes[area.offset as usize..].to_vec())
    };
    decode_system_use_area(tail, skip, &mut fetch)
}

/// Turn a decoded record into a filesystem entry, resolving relocation.
///
/// Returns `None` for records the enumeration skips: relocation
/// placeholders and names that cannot form a safe path component.
fn build_entry<S: ByteSource>(
    reader: &SectorReader<S>,
    record: &DirectoryRecord,
    job: &Job,
    policy: WalkPolicy,
) -> Result<Option<FilesystemEntry>> {
    let rr = record.rock_ridge.as_ref();

    if rr.is_some_and(|rr| rr.relocated) {
        debug!(
            target: "ofs::walk",
            parent = %job.path,
            "skipping relocated directory placeholder"
        );
        return Ok(None);
    }

    let name = match rr.and_then(|rr| rr.name.clone()) {
        Some(rock_ridge_name) => rock_ridge_name,
        None => {
            let raw = record.name.as_str();
            if policy.strip_version {
                strip_version_suffix(raw).to_owned()
            } else {
                raw.to_owned()
            }
        }
    };
    if name.is_empty() || name == "." || name == ".." || name.contains('/') {
        warn!(
            target: "ofs::walk",
            parent = %job.path,
            name = %name,
            "record name is not a usable path component, skipping"
        );
        return Ok(None);
    }

    if record.flags.contains(FileFlags::MULTI_EXTENT) {
        warn!(
            target: "ofs::walk",
            name = %name,
            "multi-extent file: only the first extent is exposed"
        );
    }

    let mut is_dir = record.is_directory();
    let mut extent = record.extent();
    let mut data_len = record.data_len;

    // A CL entry marks a directory relocated out of a deep tree: the
    // record looks like a file here, and its real extent (with the real
    // length on the target's `.` record) lives at the linked sector.
    if let Some(link) = rr.and_then(|rr| rr.child_link) {
        match relocated_extent(reader, Lba(link), policy.encoding) {
            Ok((relocated_lba, relocated_len)) => {
                is_dir = true;
                extent = relocated_lba;
                data_len = relocated_len;
            }
            Err(err) => {
                warn!(
                    target: "ofs::walk",
                    name = %name,
                    link,
                    %err,
                    "cannot resolve relocated directory, skipping"
                );
                return Ok(None);
            }
        }
    }

    let posix = rr.and_then(|rr| rr.posix);
    let mode = match posix {
        Some(posix) => posix.mode,
        None if is_dir => S_IFDIR | 0o755,
        None => S_IFREG | 0o644,
    };
    let symlink_target = rr.and_then(|rr| rr.symlink_target.clone());

    let mtime = rr
        .and_then(|rr| rr.times.modified)
        .filter(IsoTimestamp::is_set)
        .unwrap_or(record.recorded_at);

    let path = format!("{}/{}", job.path, name);

    Ok(Some(FilesystemEntry {
        path,
        name,
        size: u64::from(data_len),
        mode,
        mtime,
        is_dir,
        symlink_target,
        extent,
        data_len,
    }))
}

/// Read the `.` record of a relocated directory's extent to learn its
/// true location and length.
fn relocated_extent<S: ByteSource>(
    reader: &SectorReader<S>,
    target: Lba,
    encoding: TextEncoding,
) -> Result<(Lba, u32)> {
    let sector = reader.read_sector(target)?;
    let (dot, _) = DirectoryRecord::parse(&sector, encoding, target)?.ok_or(
        ofs_types::ParseError::InvalidField {
            field: "relocated_directory",
            reason: "target extent starts with an empty record",
        },
    )?;
    Ok((dot.extent(), dot.data_len))
}
