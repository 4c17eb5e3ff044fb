// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Intel-hex decoding into UF2 blocks.
//!
//! Data bytes are collected into 256-byte pages keyed by their aligned base
//! address, then each page is emitted as one UF2 block. Pages keep the order
//! in which they were first touched, so the block stream mirrors the hex
//! file's layout rather than ascending address order.

use std::collections::HashMap;

use zerocopy::{AsBytes, U32};

use crate::error::ConvertError;
use crate::format::{Uf2Record, BLOCK_LEN, PAYLOAD_LEN};

// Record types we act on; everything else is ignored.
const REC_DATA: u8 = 0;
const REC_EOF: u8 = 1;
const REC_SEGMENT_ADDR: u8 = 2;
const REC_LINEAR_ADDR: u8 = 4;

/// One 256-byte page of the reconstructed address space.
struct Page {
    addr: u32,
    bytes: [u8; PAYLOAD_LEN],
}

/// Converts Intel-hex text into a UF2 block stream.
///
/// Lines that don't begin with the `:` marker are skipped. An end-of-file
/// record stops processing; anything after it is not even parsed. Checksum
/// bytes are consumed but deliberately not verified, matching what existing
/// tooling accepts.
pub fn to_uf2(text: &[u8]) -> Result<Vec<u8>, ConvertError> {
    let mut upper: u32 = 0;
    let mut pages: Vec<Page> = Vec::new();
    let mut index: HashMap<u32, usize> = HashMap::new();

    'lines: for (lineno, line) in text.split(|&b| b == b'\n').enumerate() {
        let line = line.strip_suffix(b"\r").unwrap_or(line);
        if line.first() != Some(&b':') {
            continue;
        }
        let rec = parse_record(&line[1..], lineno + 1)?;

        match rec[3] {
            REC_LINEAR_ADDR => {
                let data = record_data(&rec, 2, lineno + 1)?;
                upper = ((data[0] as u32) << 8 | data[1] as u32) << 16;
            }
            REC_SEGMENT_ADDR => {
                let data = record_data(&rec, 2, lineno + 1)?;
                if data[1] != 0 {
                    return Err(ConvertError::MalformedRecord {
                        line: lineno + 1,
                        reason: "segment address record with nonzero low byte",
                    });
                }
                upper = (data[0] as u32) << 16;
            }
            REC_EOF => break 'lines,
            REC_DATA => {
                let mut addr = upper | (rec[1] as u32) << 8 | rec[2] as u32;
                for &byte in &rec[4..rec.len() - 1] {
                    let base = addr & !0xFF;
                    let slot = *index.entry(base).or_insert_with(|| {
                        pages.push(Page {
                            addr: base,
                            bytes: [0; PAYLOAD_LEN],
                        });
                        pages.len() - 1
                    });
                    pages[slot].bytes[(addr & 0xFF) as usize] = byte;
                    addr = addr.wrapping_add(1);
                }
            }
            _ => (),
        }
    }

    // Emit one UF2 block per page, in encounter order.
    let prototype = Uf2Record::prototype(pages.len() as u32);
    let mut out = Vec::with_capacity(pages.len() * BLOCK_LEN);
    for (blockno, page) in pages.iter().enumerate() {
        let mut record = Uf2Record {
            address: U32::new(page.addr),
            block_no: U32::new(blockno as u32),
            ..prototype
        };
        record.data[..PAYLOAD_LEN].copy_from_slice(&page.bytes);
        out.extend_from_slice(record.as_bytes());
    }
    Ok(out)
}

/// Decodes the hex pairs after the `:` marker into record bytes:
/// `[length, offset_hi, offset_lo, type, data.., checksum]`.
fn parse_record(body: &[u8], line: usize) -> Result<Vec<u8>, ConvertError> {
    if body.len() % 2 != 0 {
        return Err(ConvertError::MalformedRecord {
            line,
            reason: "odd number of hex digits",
        });
    }

    let rec = body
        .chunks_exact(2)
        .map(|pair| {
            let hi = hex_digit(pair[0])?;
            let lo = hex_digit(pair[1])?;
            Some(hi << 4 | lo)
        })
        .collect::<Option<Vec<u8>>>()
        .ok_or(ConvertError::MalformedRecord {
            line,
            reason: "invalid hex digit",
        })?;

    // Length, 16-bit offset, type, and checksum at minimum.
    if rec.len() < 5 {
        return Err(ConvertError::MalformedRecord {
            line,
            reason: "record too short",
        });
    }
    Ok(rec)
}

/// Borrows `n` data bytes of an address record, between the 4-byte header and
/// the trailing checksum.
fn record_data(rec: &[u8], n: usize, line: usize) -> Result<&[u8], ConvertError> {
    if rec.len() < 4 + n + 1 {
        return Err(ConvertError::MalformedRecord {
            line,
            reason: "address record too short",
        });
    }
    Ok(&rec[4..4 + n])
}

fn hex_digit(b: u8) -> Option<u8> {
    match b {
        b'0'..=b'9' => Some(b - b'0'),
        b'a'..=b'f' => Some(b - b'a' + 10),
        b'A'..=b'F' => Some(b - b'A' + 10),
        _ => None,
    }
}
