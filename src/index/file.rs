//! the DIRC v2 binary format
//!
//! header, 8-byte-padded entries, optional extension chunks, then a
//! SHA-1 trailer over everything before it. extensions are skipped on
//! read and never written.

use crate::error::{Error, Result};
use crate::hash::{hash_bytes, ObjectId};
use crate::types::FileMode;

use super::entry::IndexEntry;

const SIGNATURE: &[u8; 4] = b"DIRC";
const VERSION: u32 = 2;
const TRAILER_LEN: usize = 20;
/// bytes before the path: 10 u32 stat fields, 20-byte id, u16 flags
const ENTRY_FIXED_LEN: usize = 62;

/// serialize entries to index file bytes
pub fn emit(entries: &[IndexEntry]) -> Vec<u8> {
    let mut buf = Vec::new();

    buf.extend_from_slice(SIGNATURE);
    buf.extend_from_slice(&VERSION.to_be_bytes());
    buf.extend_from_slice(&(entries.len() as u32).to_be_bytes());

    for entry in entries {
        write_entry(&mut buf, entry);
    }

    let checksum = hash_bytes(&buf);
    buf.extend_from_slice(checksum.as_bytes());
    buf
}

fn write_entry(buf: &mut Vec<u8>, entry: &IndexEntry) {
    let start = buf.len();

    buf.extend_from_slice(&entry.ctime_sec.to_be_bytes());
    buf.extend_from_slice(&entry.ctime_nsec.to_be_bytes());
    buf.extend_from_slice(&entry.mtime_sec.to_be_bytes());
    buf.extend_from_slice(&entry.mtime_nsec.to_be_bytes());
    buf.extend_from_slice(&entry.dev.to_be_bytes());
    buf.extend_from_slice(&entry.ino.to_be_bytes());
    buf.extend_from_slice(&entry.mode.as_u32().to_be_bytes());
    buf.extend_from_slice(&entry.uid.to_be_bytes());
    buf.extend_from_slice(&entry.gid.to_be_bytes());
    buf.extend_from_slice(&entry.file_size.to_be_bytes());
    buf.extend_from_slice(entry.id.as_bytes());
    buf.extend_from_slice(&entry.flags().to_be_bytes());
    buf.extend_from_slice(entry.path.as_bytes());

    // NUL padding to a multiple of 8, always at least one byte
    let total = entry_len(entry.path.len());
    while buf.len() - start < total {
        buf.push(0);
    }
}

/// total entry length including padding (C git's formula)
fn entry_len(path_len: usize) -> usize {
    (ENTRY_FIXED_LEN + path_len + 8) & !7
}

/// parse index file bytes, verifying the trailer first
pub fn parse(bytes: &[u8]) -> Result<Vec<IndexEntry>> {
    if bytes.len() < 12 + TRAILER_LEN {
        return Err(Error::CorruptIndex("file too short".to_string()));
    }

    let (body, trailer) = bytes.split_at(bytes.len() - TRAILER_LEN);
    if hash_bytes(body).as_bytes() != trailer {
        return Err(Error::CorruptIndex("checksum mismatch".to_string()));
    }

    if &body[..4] != SIGNATURE {
        return Err(Error::CorruptIndex("bad signature".to_string()));
    }
    let version = be_u32(&body[4..8]);
    if version != VERSION {
        return Err(Error::CorruptIndex(format!(
            "unsupported version: {}",
            version
        )));
    }
    let count = be_u32(&body[8..12]) as usize;

    let mut entries = Vec::with_capacity(count);
    let mut pos = 12;
    for _ in 0..count {
        let (entry, len) = parse_entry(&body[pos..])?;
        entries.push(entry);
        pos += len;
    }

    // extension chunks: 4-byte tag, u32 length, payload. skipped.
    while pos < body.len() {
        if body.len() - pos < 8 {
            return Err(Error::CorruptIndex("truncated extension header".to_string()));
        }
        let size = be_u32(&body[pos + 4..pos + 8]) as usize;
        pos += 8;
        if body.len() - pos < size {
            return Err(Error::CorruptIndex("extension overruns trailer".to_string()));
        }
        pos += size;
    }

    Ok(entries)
}

fn parse_entry(bytes: &[u8]) -> Result<(IndexEntry, usize)> {
    if bytes.len() < ENTRY_FIXED_LEN {
        return Err(Error::CorruptIndex("truncated entry".to_string()));
    }

    let flags = u16::from_be_bytes([bytes[60], bytes[61]]);
    if flags & 0x4000 != 0 {
        return Err(Error::CorruptIndex(
            "extended entry flags are invalid in version 2".to_string(),
        ));
    }

    let name_len = (flags & 0xFFF) as usize;
    let path_bytes = if name_len == 0xFFF {
        // overflow sentinel: the real length is found by scanning to
        // the NUL padding
        let rest = &bytes[ENTRY_FIXED_LEN..];
        let nul = rest
            .iter()
            .position(|&b| b == 0)
            .ok_or_else(|| Error::CorruptIndex("unterminated long path".to_string()))?;
        &rest[..nul]
    } else {
        if bytes.len() < ENTRY_FIXED_LEN + name_len {
            return Err(Error::CorruptIndex("truncated entry path".to_string()));
        }
        &bytes[ENTRY_FIXED_LEN..ENTRY_FIXED_LEN + name_len]
    };

    let path = std::str::from_utf8(path_bytes)
        .map_err(|_| Error::CorruptIndex("entry path is not UTF-8".to_string()))?
        .to_string();

    let total = entry_len(path_bytes.len());
    if bytes.len() < total {
        return Err(Error::CorruptIndex("truncated entry padding".to_string()));
    }

    let mut raw_id = [0u8; 20];
    raw_id.copy_from_slice(&bytes[40..60]);

    let entry = IndexEntry {
        ctime_sec: be_u32(&bytes[0..4]),
        ctime_nsec: be_u32(&bytes[4..8]),
        mtime_sec: be_u32(&bytes[8..12]),
        mtime_nsec: be_u32(&bytes[12..16]),
        dev: be_u32(&bytes[16..20]),
        ino: be_u32(&bytes[20..24]),
        mode: FileMode::from_u32(be_u32(&bytes[24..28]))?,
        uid: be_u32(&bytes[28..32]),
        gid: be_u32(&bytes[32..36]),
        file_size: be_u32(&bytes[36..40]),
        id: ObjectId::from_bytes(raw_id),
        assume_valid: flags & 0x8000 != 0,
        stage: ((flags >> 12) & 0b11) as u8,
        path,
    };

    Ok((entry, total))
}

fn be_u32(bytes: &[u8]) -> u32 {
    u32::from_be_bytes([bytes[0], bytes[1], bytes[2], bytes[3]])
}
