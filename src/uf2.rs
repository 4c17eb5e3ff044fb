// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! The UF2 block codec: flattening a block stream into a raw image, and
//! chunking a raw image (plus a base load address) into blocks.

use zerocopy::{AsBytes, U32};

use crate::error::ConvertError;
use crate::format::{Uf2Record, BLOCK_LEN, PAYLOAD_LEN};

/// Decoders refuse to bridge gaps larger than this with zero fill.
const MAX_PADDING: usize = 10 * 1024 * 1024;

/// A flattened firmware image produced by [`to_bin`].
pub struct BinImage {
    /// Target address of the first valid block, which is where the flattened
    /// bytes are meant to be loaded. `None` when every block in the input was
    /// skipped.
    pub start_addr: Option<u32>,
    pub data: Vec<u8>,
}

/// Flattens a UF2 block stream into a contiguous raw image.
///
/// Blocks with bad start magic are logged and skipped, since they are most
/// likely foreign data interleaved in the stream. Blocks carrying the
/// no-flash flag are skipped without consuming address space. Everything
/// else that looks wrong (oversized payloads, blocks running backwards,
/// unreasonable or misaligned gaps) aborts the conversion: those indicate a
/// corrupt image, and no partial output is ever returned.
pub fn to_bin(buf: &[u8]) -> Result<BinImage, ConvertError> {
    if buf.len() % BLOCK_LEN != 0 {
        return Err(ConvertError::MalformedInput {
            len: buf.len(),
            reason: "UF2 file size is not a multiple of 512",
        });
    }

    let mut out = Vec::new();
    let mut start_addr = None;
    let mut curraddr = 0u32;

    for (blockno, raw) in buf.chunks_exact(BLOCK_LEN).enumerate() {
        let offset = blockno * BLOCK_LEN;
        let block = match Uf2Record::parse(raw) {
            Ok(block) => block,
            Err(ConvertError::BadMagic) => {
                log::warn!("skipping block at offset {}: bad magic", offset);
                continue;
            }
            Err(e) => return Err(e),
        };

        if block.flags.get() & Uf2Record::FLAG_NO_FLASH != 0 {
            // Metadata-only block; contributes nothing to the image.
            continue;
        }

        let datalen = block.length.get() as usize;
        if datalen > block.data.len() {
            return Err(ConvertError::DataTooLarge {
                offset,
                length: datalen,
            });
        }

        let newaddr = block.address.get();
        if start_addr.is_none() {
            start_addr = Some(newaddr);
            curraddr = newaddr;
        }
        if newaddr < curraddr {
            return Err(ConvertError::OutOfOrder {
                offset,
                address: newaddr,
                expected: curraddr,
            });
        }
        let padding = (newaddr - curraddr) as usize;
        if padding > MAX_PADDING {
            return Err(ConvertError::ExcessivePadding { offset, padding });
        }
        if padding % 4 != 0 {
            return Err(ConvertError::MisalignedPadding { offset, padding });
        }

        out.resize(out.len() + padding, 0);
        out.extend_from_slice(&block.data[..datalen]);
        curraddr = newaddr.wrapping_add(datalen as u32);
    }

    Ok(BinImage {
        start_addr,
        data: out,
    })
}

/// Chunks a raw image into UF2 blocks targeting `base`.
///
/// Every emitted block carries exactly 256 payload bytes; the final chunk is
/// zero-padded up to that size. The output is `512 * ceil(len / 256)` bytes.
pub fn from_bin(data: &[u8], base: u32) -> Vec<u8> {
    let numblocks = (data.len() + PAYLOAD_LEN - 1) / PAYLOAD_LEN;
    let mut out = Vec::with_capacity(numblocks * BLOCK_LEN);

    let prototype = Uf2Record::prototype(numblocks as u32);

    for (blockno, chunk) in data.chunks(PAYLOAD_LEN).enumerate() {
        let mut record = Uf2Record {
            address: U32::new(base.wrapping_add((blockno * PAYLOAD_LEN) as u32)),
            block_no: U32::new(blockno as u32),
            ..prototype
        };
        record.data[..chunk.len()].copy_from_slice(chunk);

        out.extend_from_slice(record.as_bytes());
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Serializes one block with an explicit payload length, which [`from_bin`]
    /// never produces (it always writes full 256-byte payloads).
    fn block(addr: u32, payload: &[u8], blockno: u32, total: u32) -> Vec<u8> {
        let mut record = Uf2Record::prototype(total);
        record.address = U32::new(addr);
        record.length = U32::new(payload.len() as u32);
        record.block_no = U32::new(blockno);
        record.data[..payload.len()].copy_from_slice(payload);
        record.as_bytes().to_vec()
    }

    #[test]
    fn round_trip_reproduces_input_bytes() {
        let image: Vec<u8> = (0..700u32).map(|i| (i * 7) as u8).collect();
        let base = 0x4000;

        let uf2 = from_bin(&image, base);
        assert_eq!(uf2.len(), 3 * BLOCK_LEN);

        let decoded = to_bin(&uf2).unwrap();
        assert_eq!(decoded.start_addr, Some(base));
        // Decode yields whole 256-byte chunks; the tail past the original
        // length is the encoder's zero padding.
        assert_eq!(decoded.data.len(), 768);
        assert_eq!(&decoded.data[..image.len()], &image[..]);
        assert!(decoded.data[image.len()..].iter().all(|&b| b == 0));
    }

    #[test]
    fn contiguous_blocks_concatenate() {
        let mut buf = block(0x2000, &[0xAA; 256], 0, 2);
        buf.extend(block(0x2100, &[0xBB; 256], 1, 2));

        let decoded = to_bin(&buf).unwrap();
        assert_eq!(decoded.start_addr, Some(0x2000));
        assert_eq!(decoded.data.len(), 512);
        assert!(decoded.data[..256].iter().all(|&b| b == 0xAA));
        assert!(decoded.data[256..].iter().all(|&b| b == 0xBB));
    }

    #[test]
    fn gaps_become_zero_padding() {
        let mut buf = block(0x2000, &[0x11; 8], 0, 2);
        buf.extend(block(0x2010, &[0x22; 8], 1, 2));

        let decoded = to_bin(&buf).unwrap();
        assert_eq!(decoded.data.len(), 24);
        assert_eq!(&decoded.data[0..8], &[0x11; 8]);
        assert_eq!(&decoded.data[8..16], &[0; 8]);
        assert_eq!(&decoded.data[16..24], &[0x22; 8]);
    }

    #[test]
    fn bad_magic_blocks_are_skipped() {
        let mut buf = block(0x2000, &[0x11; 256], 0, 2);
        buf.extend(vec![0xEE; BLOCK_LEN]);
        buf.extend(block(0x2100, &[0x22; 256], 1, 2));

        let decoded = to_bin(&buf).unwrap();
        assert_eq!(decoded.data.len(), 512);
        assert!(decoded.data[..256].iter().all(|&b| b == 0x11));
        assert!(decoded.data[256..].iter().all(|&b| b == 0x22));
    }

    #[test]
    fn no_flash_blocks_consume_no_address_space() {
        let mut buf = block(0x2000, &[0x11; 256], 0, 3);

        // A metadata block in the middle, at an unrelated address and with a
        // bogus length field. The flag check runs before the length check, so
        // this must be skipped without raising DataTooLarge.
        let mut meta = Uf2Record::prototype(3);
        meta.flags = U32::new(Uf2Record::FLAG_NO_FLASH);
        meta.address = U32::new(0x9000_0000);
        meta.length = U32::new(500);
        meta.block_no = U32::new(1);
        buf.extend_from_slice(meta.as_bytes());

        buf.extend(block(0x2100, &[0x22; 256], 2, 3));

        let decoded = to_bin(&buf).unwrap();
        assert_eq!(decoded.start_addr, Some(0x2000));
        assert_eq!(decoded.data.len(), 512);
    }

    #[test]
    fn oversized_payload_aborts() {
        let mut buf = block(0x2000, &[0; 256], 0, 2);
        let mut bad = Uf2Record::prototype(2);
        bad.address = U32::new(0x2100);
        bad.length = U32::new(500);
        bad.block_no = U32::new(1);
        buf.extend_from_slice(bad.as_bytes());

        assert!(matches!(
            to_bin(&buf),
            Err(ConvertError::DataTooLarge {
                offset: 512,
                length: 500,
            })
        ));
    }

    #[test]
    fn backwards_addresses_abort() {
        let mut buf = block(0x3000, &[0; 256], 0, 2);
        buf.extend(block(0x2000, &[0; 256], 1, 2));

        assert!(matches!(
            to_bin(&buf),
            Err(ConvertError::OutOfOrder {
                address: 0x2000,
                ..
            })
        ));
    }

    #[test]
    fn excessive_gap_aborts() {
        let mut buf = block(0x2000, &[0; 256], 0, 2);
        buf.extend(block(0x2000 + 256 + 11 * 1024 * 1024, &[0; 256], 1, 2));

        assert!(matches!(
            to_bin(&buf),
            Err(ConvertError::ExcessivePadding { .. })
        ));
    }

    #[test]
    fn misaligned_gap_aborts() {
        let mut buf = block(0x2000, &[0; 256], 0, 2);
        buf.extend(block(0x2100 + 6, &[0; 256], 1, 2));

        assert!(matches!(
            to_bin(&buf),
            Err(ConvertError::MisalignedPadding { padding: 6, .. })
        ));
    }

    #[test]
    fn trailing_partial_block_is_malformed() {
        let mut buf = block(0x2000, &[0; 256], 0, 1);
        buf.extend_from_slice(&[0; 100]);

        assert!(matches!(
            to_bin(&buf),
            Err(ConvertError::MalformedInput { len: 612, .. })
        ));
    }

    #[test]
    fn stream_of_only_foreign_blocks_decodes_empty() {
        let decoded = to_bin(&[0xEE; BLOCK_LEN]).unwrap();
        assert_eq!(decoded.start_addr, None);
        assert!(decoded.data.is_empty());
    }

    #[test]
    fn encoded_headers_are_well_formed() {
        let uf2 = from_bin(&[0x5A; 300], 0x2000);
        assert_eq!(uf2.len(), 2 * BLOCK_LEN);

        let second = Uf2Record::parse(&uf2[BLOCK_LEN..]).unwrap();
        assert_eq!(second.address.get(), 0x2100);
        assert_eq!(second.length.get(), 256);
        assert_eq!(second.block_no.get(), 1);
        assert_eq!(second.total_blocks.get(), 2);
        assert_eq!(second.flags.get(), 0);
        assert_eq!(second.family_id.get(), 0);
        assert_eq!(second.final_magic.get(), Uf2Record::FINAL_MAGIC);
        // 300 - 256 = 44 real bytes in the final chunk, zero-padded to 256.
        assert!(second.data[..44].iter().all(|&b| b == 0x5A));
        assert!(second.data[44..].iter().all(|&b| b == 0));
    }
}
