// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! UF2 block layout, magic constants, and input format detection.

use byteorder::{ByteOrder, LittleEndian};
use zerocopy::{AsBytes, FromBytes, LayoutVerified, U32};

use crate::error::ConvertError;

/// Number of bytes in one UF2 block on the wire.
pub const BLOCK_LEN: usize = 512;

/// Payload bytes carried per block when *we* encode. Decoding tolerates
/// anything up to the 476-byte data region.
pub const PAYLOAD_LEN: usize = 256;

#[derive(Clone, AsBytes, FromBytes)]
#[repr(C)]
pub struct Uf2Record {
    pub magic: [U32<LittleEndian>; 2],
    pub flags: U32<LittleEndian>,
    pub address: U32<LittleEndian>,
    pub length: U32<LittleEndian>,
    pub block_no: U32<LittleEndian>,
    pub total_blocks: U32<LittleEndian>,
    pub family_id: U32<LittleEndian>,

    pub data: [u8; 476],

    pub final_magic: U32<LittleEndian>,
}

impl Uf2Record {
    pub const MAGIC: [u32; 2] = [0x0A324655, 0x9E5D5157];
    pub const FINAL_MAGIC: u32 = 0x0AB16F30;

    /// Flag bit marking a metadata-only block that must not reach target
    /// memory.
    pub const FLAG_NO_FLASH: u32 = 1;

    /// Produces a `Uf2Record` initialized for a file containing
    /// `total_blocks` blocks, with a zeroed data region.
    ///
    /// The record is initialized except for the following fields, which you
    /// need to fill in:
    /// - `address`
    /// - `block_no`
    /// - `data`
    pub fn prototype(total_blocks: u32) -> Self {
        Self {
            magic: [
                U32::new(Uf2Record::MAGIC[0]),
                U32::new(Uf2Record::MAGIC[1]),
            ],
            flags: U32::new(0),
            length: U32::new(PAYLOAD_LEN as u32),
            total_blocks: U32::new(total_blocks),
            family_id: U32::new(0),

            final_magic: U32::new(Uf2Record::FINAL_MAGIC),

            // Start of bogus fields
            address: U32::new(!0),
            block_no: U32::new(!0),
            data: [0; 476],
        }
    }

    /// Borrows a 512-byte slice as a `Uf2Record`, checking the two
    /// start-of-block magic words. A magic mismatch is the recoverable
    /// `BadMagic` case; callers decide whether to skip or abort.
    pub fn parse(raw: &[u8]) -> Result<&Self, ConvertError> {
        // The type is Unaligned, so this only fails on a size mismatch.
        let lv = LayoutVerified::<_, Uf2Record>::new(raw).ok_or(ConvertError::MalformedInput {
            len: raw.len(),
            reason: "a UF2 block must be exactly 512 bytes",
        })?;
        let record = lv.into_ref();

        if record.magic[0].get() != Uf2Record::MAGIC[0]
            || record.magic[1].get() != Uf2Record::MAGIC[1]
        {
            return Err(ConvertError::BadMagic);
        }

        Ok(record)
    }
}

/// Classification of an input image, in decreasing order of specificity.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Format {
    Uf2,
    Hex,
    Bin,
}

/// Classifies an input buffer.
///
/// The UF2 magic check runs first; the hex check is only consulted when it
/// fails, so binary data that merely starts with a colon byte is not
/// misclassified. Anything that is neither UF2 nor hex text is treated as a
/// raw binary image.
pub fn detect(buf: &[u8]) -> Result<Format, ConvertError> {
    if buf.len() < 8 {
        return Err(ConvertError::MalformedInput {
            len: buf.len(),
            reason: "too short to classify",
        });
    }

    if LittleEndian::read_u32(&buf[0..4]) == Uf2Record::MAGIC[0]
        && LittleEndian::read_u32(&buf[4..8]) == Uf2Record::MAGIC[1]
    {
        return Ok(Format::Uf2);
    }

    let hex_charset = buf
        .iter()
        .all(|&b| b.is_ascii_hexdigit() || b == b':' || b == b'\r' || b == b'\n');
    if buf[0] == b':' && hex_charset {
        return Ok(Format::Hex);
    }

    Ok(Format::Bin)
}
