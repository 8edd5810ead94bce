use std::collections::HashMap;
use std::io::{BufRead, BufReader, Write};
use std::path::Path;

use crate::entry::WalEntry;
use crate::error::WalError;

/// Size threshold (bytes) that triggers a compaction pass.
pub const COMPACT_THRESHOLD: u64 = 1024 * 1024;

/// Rewrites the WAL file at `path`, retaining only the entry with the
/// greatest sequence number per key (a terminal `Delete` still wins and is
/// itself retained, so replay observes the removal). Writes through a
/// sibling `.tmp` file and renames it over the live file atomically.
///
/// The caller must already hold whatever lock serializes this against
/// concurrent appends, and must have flushed and synced the live writer
/// before calling this.
pub fn compact_file(path: &Path) -> Result<(), WalError> {
    let mut latest: HashMap<String, WalEntry> = HashMap::new();

    if path.exists() {
        let file = std::fs::File::open(path)?;
        let reader = BufReader::new(file);
        for line in reader.lines() {
            let line = match line {
                Ok(l) => l,
                Err(_) => break,
            };
            if line.trim().is_empty() {
                continue;
            }
            let entry: WalEntry = match serde_json::from_str(&line) {
                Ok(e) => e,
                Err(_) => continue,
            };
            match latest.get(&entry.key) {
                Some(existing) if existing.sequence >= entry.sequence => {}
                _ => {
                    latest.insert(entry.key.clone(), entry);
                }
            }
        }
    }

    let tmp_path = tmp_path_for(path);
    let result = write_compacted(&tmp_path, latest.values());
    if result.is_err() {
        let _ = std::fs::remove_file(&tmp_path);
        return result;
    }

    std::fs::rename(&tmp_path, path)?;
    Ok(())
}

fn write_compacted<'a, I>(tmp_path: &Path, entries: I) -> Result<(), WalError>
where
    I: Iterator<Item = &'a WalEntry>,
{
    let mut tmp_file = std::fs::File::create(tmp_path)?;
    for entry in entries {
        let mut line = serde_json::to_vec(entry)?;
        line.push(b'\n');
        tmp_file.write_all(&line)?;
    }
    tmp_file.flush()?;
    tmp_file.sync_all()?;
    Ok(())
}

fn tmp_path_for(path: &Path) -> std::path::PathBuf {
    let mut tmp = path.as_os_str().to_owned();
    tmp.push(".tmp");
    tmp.into()
}
