// SPDX-License-Identifier: GPL-3.0-only

//! Live mount-table probing via /proc/mounts.

use std::fs;
use std::path::{Path, PathBuf};

use tracing::error;

use volmgr_contracts::MountTable;

const PROC_MOUNTS: &str = "/proc/mounts";

pub struct ProcMountTable;

impl MountTable for ProcMountTable {
    fn is_path_mounted(&self, path: &Path) -> bool {
        let table = match fs::read_to_string(PROC_MOUNTS) {
            Ok(table) => table,
            Err(err) => {
                error!(%err, "error reading {PROC_MOUNTS}");
                return false;
            }
        };
        parse_mount_points(&table).iter().any(|mount| mount == path)
    }
}

/// Mount points from /proc/mounts content. The second whitespace field of
/// each line, with kernel octal escapes decoded.
pub fn parse_mount_points(input: &str) -> Vec<PathBuf> {
    input
        .lines()
        .filter_map(|line| line.split_whitespace().nth(1))
        .map(|field| PathBuf::from(unescape_mount_field(field)))
        .collect()
}

fn unescape_mount_field(value: &str) -> String {
    let mut output = String::with_capacity(value.len());
    let bytes = value.as_bytes();
    let mut index = 0;

    while index < bytes.len() {
        if bytes[index] == b'\\'
            && index + 3 < bytes.len()
            && bytes[index + 1].is_ascii_digit()
            && bytes[index + 2].is_ascii_digit()
            && bytes[index + 3].is_ascii_digit()
        {
            let octal = &value[index + 1..index + 4];
            if let Ok(num) = u8::from_str_radix(octal, 8) {
                output.push(num as char);
                index += 4;
                continue;
            }
        }

        output.push(bytes[index] as char);
        index += 1;
    }

    output
}
