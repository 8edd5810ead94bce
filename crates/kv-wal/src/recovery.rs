use std::io::{BufRead, BufReader};
use std::path::Path;

use crate::entry::WalEntry;
use crate::error::WalError;

/// Reads every well-formed entry from `path` in file order.
///
/// A malformed line — including a partial write left by a crash mid-record
/// — terminates the scan silently; every entry read before it is still
/// returned.
pub fn read_entries(path: &Path) -> Result<Vec<WalEntry>, WalError> {
    if !path.exists() {
        return Ok(Vec::new());
    }

    let file = std::fs::File::open(path)?;
    let reader = BufReader::new(file);
    let mut entries = Vec::new();

    for line in reader.lines() {
        let line = match line {
            Ok(l) => l,
            Err(_) => break,
        };
        if line.trim().is_empty() {
            continue;
        }
        match serde_json::from_str::<WalEntry>(&line) {
            Ok(entry) => entries.push(entry),
            Err(_) => break,
        }
    }

    Ok(entries)
}
