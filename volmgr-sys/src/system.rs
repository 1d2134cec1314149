// SPDX-License-Identifier: GPL-3.0-only

//! Global key-value state backed by a properties file.
//!
//! The decrypt-prompt and encryption-progress flags change while the daemon
//! runs, so the file is re-read on every lookup. Missing file or missing key
//! both read as the empty string.

use std::fs;
use std::path::PathBuf;

use volmgr_contracts::SystemState;

pub struct PropertyFile {
    path: PathBuf,
}

impl PropertyFile {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl SystemState for PropertyFile {
    fn read(&self, key: &str) -> String {
        let Ok(contents) = fs::read_to_string(&self.path) else {
            return String::new();
        };
        lookup(&contents, key).unwrap_or_default()
    }
}

fn lookup(contents: &str, key: &str) -> Option<String> {
    contents
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .filter_map(|line| line.split_once('='))
        .find(|(k, _)| k.trim() == key)
        .map(|(_, v)| v.trim().to_string())
}
