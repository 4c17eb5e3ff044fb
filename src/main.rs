// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! `uf2conv` converts firmware images between the UF2 flashing format, Intel
//! hex records, and raw binary, and can copy the result straight to an
//! attached UF2 bootloader.
//!
//! The direction is picked from the input itself: UF2 files flatten to raw
//! binary, hex and raw binary inputs become UF2. Raw binaries are anchored at
//! a configurable base load address (default 0x2000).

mod convert;
mod error;
mod format;
mod ihex;
mod uf2;

#[cfg(feature = "sysinfo")]
mod scan;

use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use clap::Parser;

#[cfg(feature = "sysinfo")]
use crate::convert::OutputKind;

///////////////////////////////////////////////////////////////////////
// Top-level command line interface definition and dispatch.

/// uf2conv converts firmware images between UF2, Intel hex, and raw binary.
#[derive(Parser)]
#[clap(term_width = 80)]
struct Uf2Conv {
    #[clap(subcommand)]
    command: Cmd,
}

#[derive(Parser)]
enum Cmd {
    /// Convert an input file (UF2, hex, or raw binary) and write the result
    /// to a file.
    Convert(ConvertArgs),
    /// Convert like `convert`, but instead of writing the result to a normal
    /// file, copy it to an attached UF2 bootloader emulating a USB mass
    /// storage device.
    ///
    /// Any mounted drive that contains an `INFO_UF2.TXT` file at its root is
    /// considered a candidate bootloader.
    #[cfg(feature = "sysinfo")]
    Flash(FlashArgs),
    /// Scan for attached bootloaders and list them instead of flashing one.
    #[cfg(feature = "sysinfo")]
    List,
}

///////////////////////////////////////////////////////////////////////
// Main function / dispatch routine.

fn main() -> Result<()> {
    env_logger::init();

    let args = Uf2Conv::parse();
    match &args.command {
        Cmd::Convert(subargs) => cmd_convert(subargs),

        #[cfg(feature = "sysinfo")]
        Cmd::Flash(subargs) => cmd_flash(subargs),
        #[cfg(feature = "sysinfo")]
        Cmd::List => cmd_list(),
    }
}

///////////////////////////////////////////////////////////////////////
// convert

#[derive(Parser)]
struct ConvertArgs {
    /// Base load address used when the input is a raw binary image.
    #[clap(long, short, default_value = "0x2000", parse(try_from_str = parse_u32))]
    base: u32,

    /// Input file in UF2, Intel hex, or raw binary format.
    input: PathBuf,

    /// Path for the output; defaults to `flash.uf2` or `flash.bin` depending
    /// on the conversion direction.
    #[clap(long, short)]
    output: Option<PathBuf>,
}

fn cmd_convert(args: &ConvertArgs) -> Result<()> {
    let conversion = run_conversion(&args.input, args.base)?;

    let output = args.output.clone().unwrap_or_else(|| {
        PathBuf::from(format!("flash.{}", conversion.kind.extension()))
    });
    write_file(&output, &conversion.data)
}

///////////////////////////////////////////////////////////////////////
// flash and list

#[cfg(feature = "sysinfo")]
#[derive(Parser)]
struct FlashArgs {
    /// Base load address used when the input is a raw binary image.
    #[clap(long, short, default_value = "0x2000", parse(try_from_str = parse_u32))]
    base: u32,

    /// Mount point of the device to flash. Without this, exactly one
    /// attached bootloader must be found by the scan.
    #[clap(long, short)]
    device: Option<PathBuf>,

    /// Input file in UF2, Intel hex, or raw binary format.
    input: PathBuf,
}

#[cfg(feature = "sysinfo")]
fn cmd_flash(args: &FlashArgs) -> Result<()> {
    let input = std::fs::read(&args.input)
        .with_context(|| format!("can't read input path {}", args.input.display()))?;
    let conversion = convert::convert(&input, args.base)?;

    // If the input was already UF2 the conversion flattened it; what goes to
    // the bootloader is the original file, not its raw image.
    let payload: &[u8] = match conversion.kind {
        OutputKind::Uf2 => &conversion.data,
        OutputKind::Bin => &input,
    };

    let dest = match &args.device {
        Some(mount) => {
            // An explicit mount point skips the scan, but still gets its
            // Board-ID reported when the info file is readable.
            let board_id = scan::read_board_id(mount).ok().flatten();
            println!("{}", flash_banner(mount, board_id.as_deref()));
            mount.clone()
        }
        None => {
            let mut targets = scan::targets();
            match targets.len() {
                0 => bail!("no attached bootloader drives were found"),
                1 => {
                    let target = targets.remove(0);
                    println!("{}", flash_banner(&target.mount, Some(&target.board_id)));
                    target.mount
                }
                n => bail!("found {n} bootloader drives; pass --device to pick one"),
            }
        }
    };

    write_file(&dest.join("NEW.UF2"), payload)
}

#[cfg(feature = "sysinfo")]
fn flash_banner(mount: &Path, board_id: Option<&str>) -> String {
    match board_id {
        Some(id) => format!("flashing {} ({})", mount.display(), id),
        None => format!("flashing {}", mount.display()),
    }
}

#[cfg(feature = "sysinfo")]
fn cmd_list() -> Result<()> {
    let targets = scan::targets();
    if targets.is_empty() {
        println!("no devices found.");
        return Ok(());
    }
    for target in targets {
        println!("{} {}", target.mount.display(), target.board_id);
    }
    Ok(())
}

///////////////////////////////////////////////////////////////////////
// Shared helpers.

/// Reads and converts one input file, reporting size and start address like
/// the conversion tools people are used to.
fn run_conversion(input: &Path, base: u32) -> Result<convert::Conversion> {
    let buf = std::fs::read(input)
        .with_context(|| format!("can't read input path {}", input.display()))?;

    let conversion = convert::convert(&buf, base)
        .with_context(|| format!("can't convert {}", input.display()))?;

    println!(
        "converting to {}, output size: {}, start address: {:#x}",
        conversion.kind.extension(),
        conversion.data.len(),
        conversion.start_addr,
    );
    Ok(conversion)
}

fn write_file(path: &Path, buf: &[u8]) -> Result<()> {
    std::fs::write(path, buf)
        .with_context(|| format!("can't write output file {}", path.display()))?;
    println!("wrote {} bytes to {}.", buf.len(), path.display());
    Ok(())
}

///////////////////////////////////////////////////////////////////////
// Clap helper functions. Out of the box, Clap does not appear to be able to
// parse numbers with a base prefix. So, let's fix that.

fn parse_u32(s: &str) -> Result<u32> {
    parse_with_prefix(s, u32::from_str_radix)
}

fn parse_with_prefix<T>(
    s: &str,
    parse_radix: impl FnOnce(&str, u32) -> Result<T, std::num::ParseIntError>,
) -> Result<T> {
    if s.starts_with("0x") {
        parse_radix(&s[2..], 16)
            .context("has hex prefix 0x but is not a hex number")
    } else if s.starts_with("0b") {
        parse_radix(&s[2..], 2)
            .context("has binary prefix 0b but is not a binary number")
    } else {
        parse_radix(s, 10)
            .context("expected decimal number or 0x/0b prefix")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_u32_accepts_base_prefixes() {
        assert_eq!(parse_u32("0x2000").unwrap(), 0x2000);
        assert_eq!(parse_u32("0b101").unwrap(), 5);
        assert_eq!(parse_u32("8192").unwrap(), 8192);
        assert!(parse_u32("0xzz").is_err());
    }

    #[cfg(feature = "sysinfo")]
    #[test]
    fn flash_banner_names_the_target_with_and_without_board_id() {
        let mount = PathBuf::from("/media/FEATHERBOOT");
        assert_eq!(
            flash_banner(&mount, Some("SAMD21G18A-Feather-v0")),
            "flashing /media/FEATHERBOOT (SAMD21G18A-Feather-v0)",
        );
        assert_eq!(
            flash_banner(&mount, None),
            "flashing /media/FEATHERBOOT",
        );
    }
}
