// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Error taxonomy for the conversion paths.

use thiserror::Error;

/// Errors raised while converting between image representations.
///
/// `BadMagic` is the one recoverable case: a block that doesn't open with the
/// UF2 magic words is foreign data, so the decoder logs it and moves on. Every
/// other variant indicates a corrupt image and aborts the whole conversion
/// with no partial output.
#[derive(Debug, Error)]
pub enum ConvertError {
    #[error("block does not start with the UF2 magic words")]
    BadMagic,

    #[error("block at offset {offset} claims impossible payload length {length} (max 476)")]
    DataTooLarge { offset: usize, length: usize },

    #[error(
        "block at offset {offset} targets {address:#010x}, behind the running \
         address {expected:#010x}"
    )]
    OutOfOrder {
        offset: usize,
        address: u32,
        expected: u32,
    },

    #[error("block at offset {offset} would need {padding} bytes of padding (max 10 MiB)")]
    ExcessivePadding { offset: usize, padding: usize },

    #[error("block at offset {offset} needs {padding} bytes of padding, not a multiple of 4")]
    MisalignedPadding { offset: usize, padding: usize },

    #[error("hex record on line {line} is malformed: {reason}")]
    MalformedRecord { line: usize, reason: &'static str },

    #[error("malformed input ({len} bytes): {reason}")]
    MalformedInput { len: usize, reason: &'static str },
}
