// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Top-level conversion entry point: classify the input, pick a direction.

use crate::error::ConvertError;
use crate::format::{self, Format};
use crate::{ihex, uf2};

/// What a conversion produced, which also decides the default output file
/// extension.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum OutputKind {
    Bin,
    Uf2,
}

impl OutputKind {
    pub fn extension(self) -> &'static str {
        match self {
            OutputKind::Bin => "bin",
            OutputKind::Uf2 => "uf2",
        }
    }
}

/// A finished conversion.
pub struct Conversion {
    pub kind: OutputKind,
    pub data: Vec<u8>,
    /// Application start address: the first valid block's target when
    /// flattening UF2, otherwise the caller's base address.
    pub start_addr: u32,
}

/// Converts `input` according to its detected format: UF2 flattens to raw
/// binary, while hex text and raw binary (anchored at `base`) become UF2.
///
/// On any fatal error no output is produced at all.
pub fn convert(input: &[u8], base: u32) -> Result<Conversion, ConvertError> {
    match format::detect(input)? {
        Format::Uf2 => {
            let image = uf2::to_bin(input)?;
            Ok(Conversion {
                kind: OutputKind::Bin,
                start_addr: image.start_addr.unwrap_or(base),
                data: image.data,
            })
        }
        Format::Hex => Ok(Conversion {
            kind: OutputKind::Uf2,
            start_addr: base,
            data: ihex::to_uf2(input)?,
        }),
        Format::Bin => Ok(Conversion {
            kind: OutputKind::Uf2,
            start_addr: base,
            data: uf2::from_bin(input, base),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::format::BLOCK_LEN;

    #[test]
    fn uf2_input_flattens_to_bin() {
        let uf2 = uf2::from_bin(&[0xA5; 256], 0x2000);
        let conv = convert(&uf2, 0x9999).unwrap();
        assert_eq!(conv.kind, OutputKind::Bin);
        assert_eq!(conv.kind.extension(), "bin");
        // Start address comes from the image, not the configured base.
        assert_eq!(conv.start_addr, 0x2000);
        assert_eq!(conv.data, vec![0xA5; 256]);
    }

    #[test]
    fn raw_input_packs_to_uf2() {
        let conv = convert(&[1, 2, 3, 4, 5, 6, 7, 8, 9], 0x4000).unwrap();
        assert_eq!(conv.kind, OutputKind::Uf2);
        assert_eq!(conv.start_addr, 0x4000);
        assert_eq!(conv.data.len(), BLOCK_LEN);
    }

    #[test]
    fn hex_input_packs_to_uf2() {
        let conv = convert(b":01000000AA55\n:00000001FF\n", 0x2000).unwrap();
        assert_eq!(conv.kind, OutputKind::Uf2);
        assert_eq!(conv.data.len(), BLOCK_LEN);
    }

    #[test]
    fn fatal_decode_errors_propagate() {
        let mut uf2 = uf2::from_bin(&[0; 512], 0x3000);
        // Rewrite the second block to target an earlier address.
        let mut tail = uf2.split_off(BLOCK_LEN);
        tail[12..16].copy_from_slice(&0x2000u32.to_le_bytes());
        uf2.extend(tail);

        assert!(matches!(
            convert(&uf2, 0x3000),
            Err(ConvertError::OutOfOrder { .. })
        ));
    }
}
