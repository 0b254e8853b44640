// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

/*! RPM package signature section reading.

An RPM file is a 96 byte lead, a signature header, the main header, and
the payload. Both headers share one structure: an 8 byte magic, an
index entry count and store size, `count` 16 byte index entries, then
the store. The signature header is padded to an 8 byte boundary; the
main header and payload after it form the region the payload digest and
most signatures cover.
*/

use crate::error::{AcquireError, Result};

const LEAD_SIZE: usize = 96;
const LEAD_MAGIC: [u8; 4] = [0xed, 0xab, 0xee, 0xdb];
const HEADER_MAGIC: [u8; 3] = [0x8e, 0xad, 0xe8];

/// OpenPGP signatures over the main header only.
const SIGTAG_DSA: i32 = 267;
const SIGTAG_RSA: i32 = 268;

/// OpenPGP signatures over main header plus payload.
const SIGTAG_PGP: i32 = 1002;
const SIGTAG_GPG: i32 = 1005;

/// MD5 digest of main header plus payload.
const SIGTAG_MD5: i32 = 1004;

/// Plausibility bounds on header geometry.
const MAX_INDEX_ENTRIES: usize = 0xffff;
const MAX_STORE_SIZE: usize = 256 * 1024 * 1024;

/// Signature material extracted from the front of an RPM file.
#[derive(Clone, Debug)]
pub struct SignatureSection {
    /// Expected MD5 of the bytes from [Self::header_start] to the end
    /// of the file.
    pub md5: Option<Vec<u8>>,

    /// Raw OpenPGP packet data covering the main header region.
    pub header_signatures: Vec<Vec<u8>>,

    /// Raw OpenPGP packet data covering main header plus payload.
    pub header_payload_signatures: Vec<Vec<u8>>,

    /// Offset of the main header.
    pub header_start: usize,

    /// Offset one past the main header; the payload begins here.
    pub header_end: usize,
}

struct IndexEntry {
    tag: i32,
    offset: usize,
    count: usize,
}

struct HeaderSection {
    entries: Vec<IndexEntry>,
    store: std::ops::Range<usize>,
    end: usize,
}

fn truncated() -> AcquireError {
    AcquireError::PackageFormat("truncated header".to_string())
}

fn read_u32(data: &[u8], offset: usize) -> Result<u32> {
    let bytes = data.get(offset..offset + 4).ok_or_else(truncated)?;

    Ok(u32::from_be_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]))
}

fn parse_header_section(data: &[u8], start: usize) -> Result<HeaderSection> {
    let magic = data.get(start..start + 3).ok_or_else(truncated)?;
    if magic != HEADER_MAGIC {
        return Err(AcquireError::PackageFormat(
            "bad header section magic".to_string(),
        ));
    }

    // Byte 3 is the header version, bytes 4..8 are reserved.
    let count = read_u32(data, start + 8)? as usize;
    let store_size = read_u32(data, start + 12)? as usize;

    if count > MAX_INDEX_ENTRIES || store_size > MAX_STORE_SIZE {
        return Err(AcquireError::PackageFormat(
            "implausible header geometry".to_string(),
        ));
    }

    let index_start = start + 16;
    let store_start = index_start + count * 16;
    let end = store_start + store_size;

    if data.len() < end {
        return Err(truncated());
    }

    let mut entries = Vec::with_capacity(count);
    for i in 0..count {
        let at = index_start + i * 16;

        entries.push(IndexEntry {
            tag: read_u32(data, at)? as i32,
            offset: read_u32(data, at + 8)? as usize,
            count: read_u32(data, at + 12)? as usize,
        });
    }

    Ok(HeaderSection {
        entries,
        store: store_start..end,
        end,
    })
}

impl SignatureSection {
    /// Parse the lead, signature header, and main header geometry of
    /// an RPM file.
    pub fn parse(data: &[u8]) -> Result<Self> {
        if data.len() < LEAD_SIZE {
            return Err(AcquireError::PackageFormat(
                "file shorter than RPM lead".to_string(),
            ));
        }

        if data[0..4] != LEAD_MAGIC {
            return Err(AcquireError::PackageFormat("bad RPM lead magic".to_string()));
        }

        let signature = parse_header_section(data, LEAD_SIZE)?;

        // The signature header store is padded to an 8 byte boundary.
        let header_start = (signature.end + 7) & !7;
        let header = parse_header_section(data, header_start)?;

        let store = &data[signature.store.clone()];

        let mut md5 = None;
        let mut header_signatures = vec![];
        let mut header_payload_signatures = vec![];

        for entry in &signature.entries {
            let value = store
                .get(entry.offset..entry.offset + entry.count)
                .ok_or_else(|| {
                    AcquireError::PackageFormat("signature entry outside store".to_string())
                })?;

            match entry.tag {
                SIGTAG_MD5 => md5 = Some(value.to_vec()),
                SIGTAG_DSA | SIGTAG_RSA => header_signatures.push(value.to_vec()),
                SIGTAG_PGP | SIGTAG_GPG => header_payload_signatures.push(value.to_vec()),
                _ => {}
            }
        }

        Ok(Self {
            md5,
            header_signatures,
            header_payload_signatures,
            header_start,
            header_end: header.end,
        })
    }
}
