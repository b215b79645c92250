//! System Use Sharing Protocol and Rock Ridge decoding.
//!
//! The System Use Area at the tail of a directory record carries a stream
//! of `sig(2) len(1) ver(1) payload` entries. A `CE` entry chains the
//! stream into a continuation area elsewhere on the disc; the effective
//! stream of a record is its on-record tail followed by every continuation
//! area in order. Rock Ridge is a family of entries within that stream
//! adding POSIX names, modes, timestamps, symlinks, and deep-directory
//! relocation.

use bitflags::bitflags;
use ofs_error::{IsoError, Result};
use ofs_types::{
    read_fixed, u32_lsb_msb, u32_prefer_le, IsoTimestamp, ParseError,
};
use tracing::{debug, warn};

/// Continuation hops followed before declaring a loop.
pub const MAX_CONTINUATION_HOPS: u32 = 16;

bitflags! {
    /// Flag byte of an `NM` alternate-name entry.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct NmFlags: u8 {
        const CONTINUE = 0x01;
        const CURRENT = 0x02;
        const PARENT = 0x04;
        const ROOT = 0x08;
    }
}

bitflags! {
    /// Flag byte of a `TF` timestamp entry.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct TfFlags: u8 {
        const CREATION = 0x01;
        const MODIFY = 0x02;
        const ACCESS = 0x04;
        const ATTRIBUTES = 0x08;
        const BACKUP = 0x10;
        const EXPIRATION = 0x20;
        const EFFECTIVE = 0x40;
        const LONG_FORM = 0x80;
    }
}

bitflags! {
    /// Flag byte of one `SL` symlink component record.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct SlFlags: u8 {
        const CONTINUE = 0x01;
        const CURRENT = 0x02;
        const PARENT = 0x04;
        const ROOT = 0x08;
    }
}

/// One System Use entry: signature, version, payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SuspEntry {
    pub signature: [u8; 2],
    pub version: u8,
    pub data: Vec<u8>,
}

impl SuspEntry {
    #[must_use]
    pub fn is(&self, signature: &[u8; 2]) -> bool {
        &self.signature == signature
    }
}

/// A `CE` continuation reference.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ContinuationArea {
    pub lba: u32,
    pub offset: u32,
    pub len: u32,
}

/// SUSP activation learned from the root record's `SP` entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SuspContext {
    /// Bytes to skip at the start of every record's System Use Area.
    pub skip_bytes: u8,
}

/// Look for the `SP` indicator at the head of the root record's tail.
#[must_use]
pub fn detect_susp(root_system_use: &[u8]) -> Option<SuspContext> {
    if root_system_use.len() >= 7
        && &root_system_use[0..2] == b"SP"
        && root_system_use[2] == 7
        && root_system_use[4] == 0xBE
        && root_system_use[5] == 0xEF
    {
        Some(SuspContext {
            skip_bytes: root_system_use[6],
        })
    } else {
        None
    }
}

/// Decode a record's effective System Use stream.
///
/// `skip` is the `SP` skip amount, applied to the on-record tail only.
/// `fetch` supplies the bytes of each `CE`-referenced area; continuation is
/// bounded by [`MAX_CONTINUATION_HOPS`], beyond which (and for
/// self-referencing chains) the decode fails with `SuspLoop`.
pub fn decode_system_use_area(
    tail: &[u8],
    skip: u8,
    fetch: &mut dyn FnMut(&ContinuationArea) -> Result<Vec<u8>>,
) -> Result<Vec<SuspEntry>> {
    let mut entries = Vec::new();
    let mut pending = Vec::new();

    let start = usize::from(skip).min(tail.len());
    walk_area(&tail[start..], &mut entries, &mut pending);

    let mut hops = 0_u32;
    let mut cursor = 0_usize;
    while cursor < pending.len() {
        hops += 1;
        if hops > MAX_CONTINUATION_HOPS {
            return Err(IsoError::SuspLoop { hops });
        }
        let area = pending[cursor];
        cursor += 1;
        if pending[..cursor - 1]
            .iter()
            .any(|seen| seen.lba == area.lba && seen.offset == area.offset)
        {
            return Err(IsoError::SuspLoop { hops });
        }
        let bytes = fetch(&area)?;
        walk_area(&bytes, &mut entries, &mut pending);
    }

    Ok(entries)
}

/// Walk one contiguous System Use area, appending entries and recording
/// continuation references. Malformed framing stops the area with a
/// warning; the entries decoded so far stand.
fn walk_area(area: &[u8], entries: &mut Vec<SuspEntry>, pending: &mut Vec<ContinuationArea>) {
    let mut cursor = 0_usize;
    while cursor + 4 <= area.len() {
        if area[cursor] == 0 {
            break;
        }
        let signature = [area[cursor], area[cursor + 1]];
        let len = usize::from(area[cursor + 2]);
        let version = area[cursor + 3];
        if len < 4 {
            warn!(
                target: "ofs::susp",
                signature = %String::from_utf8_lossy(&signature),
                len,
                "system use entry shorter than its header, stopping the area"
            );
            break;
        }
        if cursor + len > area.len() {
            warn!(
                target: "ofs::susp",
                signature = %String::from_utf8_lossy(&signature),
                len,
                remaining = area.len() - cursor,
                "system use entry overruns the area, stopping"
            );
            break;
        }
        let data = area[cursor + 4..cursor + len].to_vec();
        cursor += len;

        if &signature == b"ST" {
            break;
        }
        if &signature == b"CE" {
            match parse_continuation(&data) {
                Ok(area) => pending.push(area),
                Err(err) => warn!(target: "ofs::susp", %err, "bad CE payload, ignoring"),
            }
            continue;
        }
        entries.push(SuspEntry {
            signature,
            version,
            data,
        });
    }
}

fn parse_continuation(data: &[u8]) -> std::result::Result<ContinuationArea, ParseError> {
    Ok(ContinuationArea {
        lba: u32_prefer_le(u32_lsb_msb(data, 0, "ce_lba"))?,
        offset: u32_prefer_le(u32_lsb_msb(data, 8, "ce_offset"))?,
        len: u32_prefer_le(u32_lsb_msb(data, 16, "ce_length"))?,
    })
}

// ── Rock Ridge synthesis ────────────────────────────────────────────────────

/// POSIX attributes from a `PX` entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PosixAttributes {
    pub mode: u32,
    pub nlink: u32,
    pub uid: u32,
    pub gid: u32,
    /// Present from `PX` version 2 onward.
    pub serial: Option<u32>,
}

/// Timestamps from a `TF` entry, each present only when its flag bit was
/// set.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RockRidgeTimestamps {
    pub created: Option<IsoTimestamp>,
    pub modified: Option<IsoTimestamp>,
    pub accessed: Option<IsoTimestamp>,
    pub attributes_changed: Option<IsoTimestamp>,
    pub backup: Option<IsoTimestamp>,
    pub expiration: Option<IsoTimestamp>,
    pub effective: Option<IsoTimestamp>,
}

/// The synthesized Rock Ridge view of one directory record.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RockRidge {
    pub name: Option<String>,
    pub posix: Option<PosixAttributes>,
    pub times: RockRidgeTimestamps,
    pub symlink_target: Option<String>,
    /// `CL`: the directory's real extent, relocated out of a deep tree.
    pub child_link: Option<u32>,
    /// `PL`: reverse link kept on the relocated directory's `..` record.
    pub parent_link: Option<u32>,
    /// `RE`: this record is a relocation placeholder, skipped by walkers.
    pub relocated: bool,
}

impl RockRidge {
    /// Synthesize the Rock Ridge view from an entry stream.
    ///
    /// Returns `None` when the stream carries no Rock Ridge entries.
    #[must_use]
    pub fn from_entries(entries: &[SuspEntry]) -> Option<Self> {
        let mut view = Self::default();
        let mut name = NameAccumulator::default();
        let mut symlink = SymlinkAccumulator::default();
        let mut saw_any = false;

        for entry in entries {
            match &entry.signature {
                b"NM" => {
                    saw_any = true;
                    name.push(&entry.data);
                }
                b"PX" => {
                    saw_any = true;
                    match parse_posix(&entry.data) {
                        Ok(posix) => view.posix = Some(posix),
                        Err(err) => warn!(target: "ofs::susp", %err, "bad PX payload, ignoring"),
                    }
                }
                b"TF" => {
                    saw_any = true;
                    match parse_timestamps(&entry.data) {
                        Ok(times) => view.times = times,
                        Err(err) => warn!(target: "ofs::susp", %err, "bad TF payload, ignoring"),
                    }
                }
                b"SL" => {
                    saw_any = true;
                    symlink.push(&entry.data);
                }
                b"CL" => {
                    saw_any = true;
                    match u32_prefer_le(u32_lsb_msb(&entry.data, 0, "cl_lba")) {
                        Ok(lba) => view.child_link = Some(lba),
                        Err(err) => warn!(target: "ofs::susp", %err, "bad CL payload, ignoring"),
                    }
                }
                b"PL" => {
                    saw_any = true;
                    match u32_prefer_le(u32_lsb_msb(&entry.data, 0, "pl_lba")) {
                        Ok(lba) => view.parent_link = Some(lba),
                        Err(err) => warn!(target: "ofs::susp", %err, "bad PL payload, ignoring"),
                    }
                }
                b"RE" => {
                    saw_any = true;
                    view.relocated = true;
                }
                b"RR" => saw_any = true,
                sig => {
                    debug!(
                        target: "ofs::susp",
                        signature = %String::from_utf8_lossy(sig),
                        "skipping unrecognized system use entry"
                    );
                }
            }
        }

        if !saw_any {
            return None;
        }
        view.name = name.finish();
        view.symlink_target = symlink.finish();
        Some(view)
    }
}

/// Whether the stream marks Rock Ridge as in use: an `ER` naming one of the
/// RRIP identifiers, the deprecated `RR` flag entry, or any RR-tagged
/// entry.
#[must_use]
pub fn rock_ridge_present(entries: &[SuspEntry]) -> bool {
    const RRIP_IDS: [&[u8]; 3] = [b"RRIP_1991A", b"IEEE_P1282", b"RRIP_1.12"];
    entries.iter().any(|entry| match &entry.signature {
        b"RR" => true,
        b"ER" => er_identifier(&entry.data)
            .map(|id| RRIP_IDS.contains(&id))
            .unwrap_or(false),
        b"NM" | b"PX" | b"TF" | b"SL" | b"CL" | b"PL" | b"RE" | b"SF" => true,
        _ => false,
    })
}

/// Extract the identifier field of an `ER` payload.
fn er_identifier(data: &[u8]) -> Option<&[u8]> {
    let id_len = usize::from(*data.first()?);
    data.get(4..4 + id_len)
}

#[derive(Default)]
struct NameAccumulator {
    value: Option<String>,
    done: bool,
}

impl NameAccumulator {
    fn push(&mut self, data: &[u8]) {
        if self.done || data.is_empty() {
            return;
        }
        let flags = NmFlags::from_bits_retain(data[0]);
        if flags.contains(NmFlags::CURRENT) {
            self.value = Some(".".to_owned());
            self.done = true;
            return;
        }
        if flags.contains(NmFlags::PARENT) {
            self.value = Some("..".to_owned());
            self.done = true;
            return;
        }
        let part = String::from_utf8_lossy(&data[1..]);
        self.value.get_or_insert_with(String::new).push_str(&part);
        if !flags.contains(NmFlags::CONTINUE) {
            self.done = true;
        }
    }

    fn finish(self) -> Option<String> {
        self.value.filter(|name| !name.is_empty())
    }
}

#[derive(Default)]
struct SymlinkAccumulator {
    target: String,
    component_open: bool,
    saw_entry: bool,
}

impl SymlinkAccumulator {
    fn push(&mut self, data: &[u8]) {
        if data.is_empty() {
            return;
        }
        self.saw_entry = true;
        let mut cursor = 1; // byte 0 is the entry-level CONTINUE flag
        while cursor + 2 <= data.len() {
            let flags = SlFlags::from_bits_retain(data[cursor]);
            let len = usize::from(data[cursor + 1]);
            let Some(body) = data.get(cursor + 2..cursor + 2 + len) else {
                warn!(target: "ofs::susp", "SL component overruns the entry, stopping");
                break;
            };
            cursor += 2 + len;

            if flags.contains(SlFlags::ROOT) {
                self.target = "/".to_owned();
                self.component_open = false;
                continue;
            }
            let text = if flags.contains(SlFlags::CURRENT) {
                ".".into()
            } else if flags.contains(SlFlags::PARENT) {
                "..".into()
            } else {
                String::from_utf8_lossy(body)
            };
            if !self.component_open
                && !self.target.is_empty()
                && !self.target.ends_with('/')
            {
                self.target.push('/');
            }
            self.target.push_str(&text);
            self.component_open = flags.contains(SlFlags::CONTINUE);
        }
    }

    fn finish(self) -> Option<String> {
        self.saw_entry.then_some(self.target)
    }
}

fn parse_posix(data: &[u8]) -> std::result::Result<PosixAttributes, ParseError> {
    let mode = u32_prefer_le(u32_lsb_msb(data, 0, "px_mode"))?;
    let nlink = u32_prefer_le(u32_lsb_msb(data, 8, "px_nlink"))?;
    let uid = u32_prefer_le(u32_lsb_msb(data, 16, "px_uid"))?;
    let gid = u32_prefer_le(u32_lsb_msb(data, 24, "px_gid"))?;
    let serial = if data.len() >= 40 {
        Some(u32_prefer_le(u32_lsb_msb(data, 32, "px_serial"))?)
    } else {
        None
    };
    Ok(PosixAttributes {
        mode,
        nlink,
        uid,
        gid,
        serial,
    })
}

fn parse_timestamps(data: &[u8]) -> std::result::Result<RockRidgeTimestamps, ParseError> {
    let Some(&flag_byte) = data.first() else {
        return Err(ParseError::InsufficientData {
            needed: 1,
            offset: 0,
            actual: 0,
        });
    };
    let flags = TfFlags::from_bits_retain(flag_byte);
    let long_form = flags.contains(TfFlags::LONG_FORM);
    let mut times = RockRidgeTimestamps::default();
    let mut cursor = 1_usize;

    let mut take = |data: &[u8]| -> std::result::Result<IsoTimestamp, ParseError> {
        let stamp = if long_form {
            IsoTimestamp::from_volume_field(&read_fixed::<17>(data, cursor)?)
        } else {
            IsoTimestamp::from_recording_stamp(&read_fixed::<7>(data, cursor)?)
        };
        cursor += if long_form { 17 } else { 7 };
        Ok(stamp)
    };

    if flags.contains(TfFlags::CREATION) {
        times.created = Some(take(data)?);
    }
    if flags.contains(TfFlags::MODIFY) {
        times.modified = Some(take(data)?);
    }
    if flags.contains(TfFlags::ACCESS) {
        times.accessed = Some(take(data)?);
    }
    if flags.contains(TfFlags::ATTRIBUTES) {
        times.attributes_changed = Some(take(data)?);
    }
    if flags.contains(TfFlags::BACKUP) {
        times.backup = Some(take(data)?);
    }
    if flags.contains(TfFlags::EXPIRATION) {
        times.expiration = Some(take(data)?);
    }
    if flags.contains(TfFlags::EFFECTIVE) {
        times.effective = Some(take(data)?);
    }
    Ok(times)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(sig: &[u8; 2], payload: &[u8]) -> Vec<u8> {
        let mut raw = Vec::with_capacity(4 + payload.len());
        raw.extend_from_slice(sig);
        raw.push((4 + payload.len()) as u8);
        raw.push(1);
        raw.extend_from_slice(payload);
        raw
    }

    fn dual_u32(value: u32) -> [u8; 8] {
        let mut out = [0_u8; 8];
        out[..4].copy_from_slice(&value.to_le_bytes());
        out[4..].copy_from_slice(&value.to_be_bytes());
        out
    }

    fn px_payload(mode: u32, nlink: u32, uid: u32, gid: u32) -> Vec<u8> {
        let mut payload = Vec::new();
        payload.extend_from_slice(&dual_u32(mode));
        payload.extend_from_slice(&dual_u32(nlink));
        payload.extend_from_slice(&dual_u32(uid));
        payload.extend_from_slice(&dual_u32(gid));
        payload
    }

    fn no_continuation(_: &ContinuationArea) -> Result<Vec<u8>> {
        panic!("no continuation expected")
    }

    #[test]
    fn detects_sp_indicator() {
        let tail = [b'S', b'P', 7, 1, 0xBE, 0xEF, 0];
        assert_eq!(detect_susp(&tail), Some(SuspContext { skip_bytes: 0 }));
        let with_skip = [b'S', b'P', 7, 1, 0xBE, 0xEF, 4];
        assert_eq!(detect_susp(&with_skip), Some(SuspContext { skip_bytes: 4 }));
        assert_eq!(detect_susp(&[0_u8; 7]), None);
        let bad_check = [b'S', b'P', 7, 1, 0xBE, 0xEE, 0];
        assert_eq!(detect_susp(&bad_check), None);
    }

    #[test]
    fn walks_a_flat_entry_stream() {
        let mut tail = entry(b"PX", &px_payload(0o100_644, 1, 0, 0));
        tail.extend(entry(b"NM", &[0, b'a', b'b']));
        tail.extend(entry(b"ST", &[]));
        tail.extend(entry(b"NM", &[0, b'z'])); // after ST, must be ignored
        let entries =
            decode_system_use_area(&tail, 0, &mut no_continuation).expect("decode");
        assert_eq!(entries.len(), 2);
        assert!(entries[0].is(b"PX"));
        assert!(entries[1].is(b"NM"));
    }

    #[test]
    fn skip_bytes_apply_to_the_record_tail() {
        let mut tail = vec![0xAA_u8; 3];
        tail.extend(entry(b"NM", &[0, b'x']));
        let entries = decode_system_use_area(&tail, 3, &mut no_continuation).expect("decode");
        assert_eq!(entries.len(), 1);
        assert!(entries[0].is(b"NM"));
    }

    #[test]
    fn follows_a_continuation_area() {
        let mut ce_payload = Vec::new();
        ce_payload.extend_from_slice(&dual_u32(40));
        ce_payload.extend_from_slice(&dual_u32(0));
        ce_payload.extend_from_slice(&dual_u32(9));
        let mut tail = entry(b"NM", &[NmFlags::CONTINUE.bits(), b'p', b'a', b'r', b't', b'_', b'a', b'_']);
        tail.extend(entry(b"CE", &ce_payload));

        let continuation = entry(b"NM", &[0, b'p', b'a', b'r', b't', b'_', b'b']);
        let mut fetch = |area: &ContinuationArea| -> Result<Vec<u8>> {
            assert_eq!((area.lba, area.offset), (40, 0));
            Ok(continuation.clone())
        };

        let entries = decode_system_use_area(&tail, 0, &mut fetch).expect("decode");
        let view = RockRidge::from_entries(&entries).expect("rock ridge");
        assert_eq!(view.name.as_deref(), Some("part_a_part_b"));
    }

    #[test]
    fn self_referencing_continuation_is_a_loop() {
        let mut ce_payload = Vec::new();
        ce_payload.extend_from_slice(&dual_u32(40));
        ce_payload.extend_from_slice(&dual_u32(0));
        ce_payload.extend_from_slice(&dual_u32(28));
        let tail = entry(b"CE", &ce_payload);
        let looping = tail.clone();
        let mut fetch = |_: &ContinuationArea| -> Result<Vec<u8>> { Ok(looping.clone()) };
        let err = decode_system_use_area(&tail, 0, &mut fetch).expect_err("loop");
        assert!(matches!(err, IsoError::SuspLoop { .. }));
    }

    #[test]
    fn name_synthesis_concatenates_continued_parts() {
        let entries = vec![
            SuspEntry {
                signature: *b"NM",
                version: 1,
                data: {
                    let mut d = vec![NmFlags::CONTINUE.bits()];
                    d.extend_from_slice(b"long ");
                    d
                },
            },
            SuspEntry {
                signature: *b"NM",
                version: 1,
                data: {
                    let mut d = vec![0];
                    d.extend_from_slice(b"name.txt");
                    d
                },
            },
        ];
        let view = RockRidge::from_entries(&entries).expect("view");
        assert_eq!(view.name.as_deref(), Some("long name.txt"));
    }

    #[test]
    fn nm_current_and_parent_flags_map_to_dots() {
        let current = vec![SuspEntry {
            signature: *b"NM",
            version: 1,
            data: vec![NmFlags::CURRENT.bits()],
        }];
        assert_eq!(
            RockRidge::from_entries(&current).expect("view").name.as_deref(),
            Some(".")
        );
        let parent = vec![SuspEntry {
            signature: *b"NM",
            version: 1,
            data: vec![NmFlags::PARENT.bits()],
        }];
        assert_eq!(
            RockRidge::from_entries(&parent).expect("view").name.as_deref(),
            Some("..")
        );
    }

    #[test]
    fn posix_attributes_v1_and_v2() {
        let v1 = SuspEntry {
            signature: *b"PX",
            version: 1,
            data: px_payload(0o040_755, 2, 1000, 100),
        };
        let view = RockRidge::from_entries(std::slice::from_ref(&v1)).expect("view");
        let posix = view.posix.expect("posix");
        assert_eq!(posix.mode, 0o040_755);
        assert_eq!(posix.nlink, 2);
        assert_eq!(posix.uid, 1000);
        assert_eq!(posix.gid, 100);
        assert_eq!(posix.serial, None);

        let mut with_serial = px_payload(0o100_640, 1, 0, 0);
        with_serial.extend_from_slice(&dual_u32(77));
        let v2 = SuspEntry {
            signature: *b"PX",
            version: 1,
            data: with_serial,
        };
        let view = RockRidge::from_entries(std::slice::from_ref(&v2)).expect("view");
        assert_eq!(view.posix.expect("posix").serial, Some(77));
    }

    #[test]
    fn timestamps_follow_the_flag_bitmap() {
        // MODIFY + ACCESS, short form.
        let mut data = vec![(TfFlags::MODIFY | TfFlags::ACCESS).bits()];
        data.extend_from_slice(&[120, 1, 2, 3, 4, 5, 0]);
        data.extend_from_slice(&[121, 6, 7, 8, 9, 10, 0]);
        let entries = vec![SuspEntry {
            signature: *b"TF",
            version: 1,
            data,
        }];
        let view = RockRidge::from_entries(&entries).expect("view");
        let modified = view.times.modified.expect("modify").as_datetime().expect("set");
        assert_eq!(modified.year(), 2020);
        assert_eq!((modified.hour(), modified.minute(), modified.second()), (3, 4, 5));
        let accessed = view.times.accessed.expect("access").as_datetime().expect("set");
        assert_eq!(accessed.year(), 2021);
        assert!(view.times.created.is_none());
    }

    #[test]
    fn long_form_timestamps_use_volume_format() {
        let mut data = vec![(TfFlags::MODIFY | TfFlags::LONG_FORM).bits()];
        let mut stamp = [0_u8; 17];
        stamp[..16].copy_from_slice(b"2020010203040500");
        data.extend_from_slice(&stamp);
        let entries = vec![SuspEntry {
            signature: *b"TF",
            version: 1,
            data,
        }];
        let view = RockRidge::from_entries(&entries).expect("view");
        let modified = view.times.modified.expect("modify").as_datetime().expect("set");
        assert_eq!(modified.year(), 2020);
    }

    #[test]
    fn symlink_components_join_with_slashes() {
        // ROOT, "usr", "lib" → /usr/lib
        let mut data = vec![0];
        data.extend_from_slice(&[SlFlags::ROOT.bits(), 0]);
        data.extend_from_slice(&[0, 3]);
        data.extend_from_slice(b"usr");
        data.extend_from_slice(&[0, 3]);
        data.extend_from_slice(b"lib");
        let entries = vec![SuspEntry {
            signature: *b"SL",
            version: 1,
            data,
        }];
        let view = RockRidge::from_entries(&entries).expect("view");
        assert_eq!(view.symlink_target.as_deref(), Some("/usr/lib"));
    }

    #[test]
    fn symlink_relative_with_parent_and_split_component() {
        // "..", then "na" + CONTINUE, "me" → ../name
        let mut data = vec![0];
        data.extend_from_slice(&[SlFlags::PARENT.bits(), 0]);
        data.extend_from_slice(&[SlFlags::CONTINUE.bits(), 2]);
        data.extend_from_slice(b"na");
        data.extend_from_slice(&[0, 2]);
        data.extend_from_slice(b"me");
        let entries = vec![SuspEntry {
            signature: *b"SL",
            version: 1,
            data,
        }];
        let view = RockRidge::from_entries(&entries).expect("view");
        assert_eq!(view.symlink_target.as_deref(), Some("../name"));
    }

    #[test]
    fn relocation_entries_populate_links() {
        let entries = vec![
            SuspEntry {
                signature: *b"CL",
                version: 1,
                data: dual_u32(900).to_vec(),
            },
            SuspEntry {
                signature: *b"RE",
                version: 1,
                data: vec![],
            },
            SuspEntry {
                signature: *b"PL",
                version: 1,
                data: dual_u32(20).to_vec(),
            },
        ];
        let view = RockRidge::from_entries(&entries).expect("view");
        assert_eq!(view.child_link, Some(900));
        assert_eq!(view.parent_link, Some(20));
        assert!(view.relocated);
    }

    #[test]
    fn presence_via_er_rr_and_tags() {
        let mut er_data = vec![10, 0, 0, 1];
        er_data.extend_from_slice(b"RRIP_1991A");
        let er = SuspEntry {
            signature: *b"ER",
            version: 1,
            data: er_data,
        };
        assert!(rock_ridge_present(std::slice::from_ref(&er)));

        let mut other_er_data = vec![5, 0, 0, 1];
        other_er_data.extend_from_slice(b"OTHER");
        let other = SuspEntry {
            signature: *b"ER",
            version: 1,
            data: other_er_data,
        };
        assert!(!rock_ridge_present(std::slice::from_ref(&other)));

        let rr = SuspEntry {
            signature: *b"RR",
            version: 1,
            data: vec![0x81],
        };
        assert!(rock_ridge_present(std::slice::from_ref(&rr)));

        let nm = SuspEntry {
            signature: *b"NM",
            version: 1,
            data: vec![0, b'x'],
        };
        assert!(rock_ridge_present(std::slice::from_ref(&nm)));

        let sp = SuspEntry {
            signature: *b"SP",
            version: 1,
            data: vec![0xBE, 0xEF, 0],
        };
        assert!(!rock_ridge_present(std::slice::from_ref(&sp)));
    }

    #[test]
    fn no_rock_ridge_entries_yield_none() {
        let sp = SuspEntry {
            signature: *b"SP",
            version: 1,
            data: vec![0xBE, 0xEF, 0],
        };
        assert!(RockRidge::from_entries(std::slice::from_ref(&sp)).is_none());
    }
}
