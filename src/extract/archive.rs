//! Size-capped access to ZIP containers.
//!
//! The uncompressed sizes in a ZIP directory are whatever the uploader wrote,
//! so they are checked against a cap before anything is read, and reads are
//! bounded by the same cap.

use std::io::{Read, Seek};

use zip::ZipArchive;

use crate::error::{Error, Result};

/// Reject the archive if any entry declares more than `limit` bytes.
pub(crate) fn check_declared_sizes<R: Read + Seek>(archive: &mut ZipArchive<R>, limit: u64) -> Result<()> {
    for i in 0..archive.len() {
        let entry = archive.by_index_raw(i)?;
        if entry.size() > limit {
            return Err(Error::EntryTooLarge {
                name: entry.name().to_string(),
                size: entry.size(),
                limit,
            });
        }
    }
    Ok(())
}

/// Read an entry to the end, failing once it yields more than `limit` bytes.
pub(crate) fn read_capped(entry: impl Read, name: &str, limit: u64) -> Result<Vec<u8>> {
    let mut data = Vec::new();
    entry.take(limit.saturating_add(1)).read_to_end(&mut data)?;
    let size = data.len() as u64;
    if size > limit {
        return Err(Error::EntryTooLarge {
            name: name.to_string(),
            size,
            limit,
        });
    }
    Ok(data)
}
