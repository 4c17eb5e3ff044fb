// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Enumeration of candidate flash targets: mounted drives exposing a UF2
//! bootloader, recognized by the `INFO_UF2.TXT` file at their root.

use std::path::{Path, PathBuf};

use anyhow::{anyhow, Context, Result};

/// A mounted bootloader drive that can accept a UF2 file.
pub struct Target {
    pub mount: PathBuf,
    /// The `Board-ID` string advertised in `INFO_UF2.TXT`.
    pub board_id: String,
}

/// Scans mounted drives for UF2 bootloaders.
///
/// Drives whose info file exists but can't be read or lacks a `Board-ID` are
/// logged and left out rather than failing the scan.
pub fn targets() -> Vec<Target> {
    use sysinfo::{DiskExt, SystemExt};

    let sys = sysinfo::System::new_with_specifics(
        sysinfo::RefreshKind::new().with_disks_list()
    );

    let mut found = vec![];
    for disk in sys.disks() {
        let mount = disk.mount_point();
        match read_board_id(mount) {
            Ok(Some(board_id)) => found.push(Target {
                mount: mount.to_owned(),
                board_id,
            }),
            Ok(None) => (),
            Err(e) => log::warn!("skipping {}: {:?}", mount.display(), e),
        }
    }
    found
}

/// Reads the `Board-ID` from a mount point's `INFO_UF2.TXT`, or `None` if the
/// drive doesn't carry one (i.e. is not a bootloader).
pub fn read_board_id(mount: &Path) -> Result<Option<String>> {
    let info = mount.join("INFO_UF2.TXT");
    if !info.is_file() {
        return Ok(None);
    }

    let contents = std::fs::read_to_string(&info)
        .with_context(|| format!("reading {}", info.display()))?;

    let board_id = contents.lines()
        .find_map(|line| line.strip_prefix("Board-ID: "))
        .ok_or_else(|| anyhow!("INFO_UF2.TXT does not contain Board-ID"))?;

    Ok(Some(board_id.to_string()))
}
