//! Version-tagged binary persistence for activity sets.
//!
//! # Set Layout
//!
//! ```text
//! magic   "UACT"
//! version u32
//! count   u32
//! record* u8 type tag, then the record in the layout for `version`
//! crc32   u32 over every preceding byte
//! ```
//!
//! Writers always emit [`CURRENT_VERSION`]. Readers accept every version
//! from 1 on; fields added after a record's version take their defaults.
//!
//! Files written at versions 4 and 5 may carry the "unset" date shifted by
//! a daylight-saving offset. Those dates are normalized on read.
//!
//! # Reference
//! - Gray & Reuter (1992), "Transaction Processing: Concepts and Techniques", Ch. 9

mod codec;
mod layouts;

pub use codec::{ByteReader, ByteWriter};

use tracing::{debug, warn};

use crate::error::{ActivityError, Result};
use crate::manager::ActivityManager;
use crate::models::InternalActivity;

/// Leading bytes of a saved set.
pub const MAGIC: [u8; 4] = *b"UACT";

/// Version written by this build.
pub const CURRENT_VERSION: u32 = 11;

/// Type tag of an internal activity record.
pub const INTERNAL_ACTIVITY_TAG: u8 = 1;

const HEADER_LEN: usize = 12;
const TRAILER_LEN: usize = 4;

/// Serializes every activity in `activities`, in manager order.
pub fn save_set(activities: &ActivityManager) -> Vec<u8> {
    let mut w = ByteWriter::new();
    w.write_bytes(&MAGIC);
    w.write_u32(CURRENT_VERSION);
    w.write_len(activities.len());
    for activity in activities.iter() {
        write_record(&mut w, activity);
    }
    let crc = crc32fast::hash(w.as_bytes());
    w.write_u32(crc);
    debug!(count = activities.len(), bytes = w.as_bytes().len(), "activity set saved");
    w.into_bytes()
}

/// Reads a set written by any supported version.
///
/// # Errors
/// - [`ActivityError::Truncated`] when the stream ends early
/// - [`ActivityError::Corrupt`] on a bad magic, checksum or field value
/// - [`ActivityError::UnsupportedVersion`] for versions this build cannot read
/// - [`ActivityError::UnknownActivityType`] for an unrecognized record tag
pub fn load_set(bytes: &[u8]) -> Result<ActivityManager> {
    if bytes.len() < HEADER_LEN + TRAILER_LEN {
        return Err(ActivityError::Truncated {
            offset: bytes.len(),
            needed: HEADER_LEN + TRAILER_LEN - bytes.len(),
        });
    }
    let (body, trailer) = bytes.split_at(bytes.len() - TRAILER_LEN);
    let mut r = ByteReader::new(body);
    let mut magic = [0u8; 4];
    for b in &mut magic {
        *b = r.read_u8()?;
    }
    if magic != MAGIC {
        return Err(ActivityError::Corrupt(format!("bad magic {magic:02x?}")));
    }

    let stored = ByteReader::new(trailer).read_u32()?;
    let actual = crc32fast::hash(body);
    if stored != actual {
        return Err(ActivityError::Corrupt(format!(
            "checksum mismatch: stored {stored:08x}, computed {actual:08x}"
        )));
    }

    let version = r.read_u32()?;
    check_version(version)?;
    r.set_dst_fixup(needs_dst_fixup(version));

    let count = r.read_u32()?;
    let mut activities = ActivityManager::new();
    for _ in 0..count {
        activities.add(read_record(&mut r, version)?)?;
    }
    if r.remaining() > 0 {
        return Err(ActivityError::Corrupt(format!(
            "{} trailing bytes after {count} records",
            r.remaining()
        )));
    }

    if r.fixups() > 0 {
        warn!(version, fixups = r.fixups(), "normalized shifted unset dates");
    }
    debug!(version, count, "activity set loaded");
    Ok(activities)
}

/// Serializes one activity as a tagged record in the current layout.
pub fn encode_activity(activity: &InternalActivity) -> Vec<u8> {
    let mut w = ByteWriter::new();
    write_record(&mut w, activity);
    w.into_bytes()
}

/// Reads one tagged record written at `version`.
pub fn decode_activity(bytes: &[u8], version: u32) -> Result<InternalActivity> {
    check_version(version)?;
    let mut r = ByteReader::new(bytes).with_dst_fixup(needs_dst_fixup(version));
    let activity = read_record(&mut r, version)?;
    if r.remaining() > 0 {
        return Err(ActivityError::Corrupt(format!(
            "{} trailing bytes after record",
            r.remaining()
        )));
    }
    Ok(activity)
}

fn check_version(version: u32) -> Result<()> {
    if version == 0 || version > CURRENT_VERSION {
        return Err(ActivityError::UnsupportedVersion {
            version,
            current: CURRENT_VERSION,
        });
    }
    Ok(())
}

fn needs_dst_fixup(version: u32) -> bool {
    (4..=5).contains(&version)
}

fn write_record(w: &mut ByteWriter, activity: &InternalActivity) {
    w.write_u8(INTERNAL_ACTIVITY_TAG);
    layouts::write_current(w, activity);
}

fn read_record(r: &mut ByteReader<'_>, version: u32) -> Result<InternalActivity> {
    let tag = r.read_u8()?;
    if tag != INTERNAL_ACTIVITY_TAG {
        return Err(ActivityError::UnknownActivityType { tag });
    }
    let layout = layouts::layout_for(version).ok_or(ActivityError::UnsupportedVersion {
        version,
        current: CURRENT_VERSION,
    })?;
    (layout.read)(r, version)
}
