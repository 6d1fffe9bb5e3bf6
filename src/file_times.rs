//! Timestamp propagation from a source entry to its archived copy.
//!
//! Setting times is cosmetic: [`apply_best_effort`] is the single place where a
//! failure is swallowed. Creation time can only be written on Windows; elsewhere
//! the modification time is what survives.

use crate::catalog::SourceEntry;
use chrono::{DateTime, Utc};
use filetime::FileTime;
use std::io;
use std::path::Path;
use tracing::debug;

fn to_file_time(time: &DateTime<Utc>) -> FileTime {
    FileTime::from_unix_time(time.timestamp(), time.timestamp_subsec_nanos())
}

/// Set the modification (and, where supported, creation) time of `dest`
pub fn apply(
    dest: &Path,
    modified: &DateTime<Utc>,
    created: Option<&DateTime<Utc>>,
) -> io::Result<()> {
    let mtime = to_file_time(modified);
    filetime::set_file_times(dest, mtime, mtime)?;

    if let Some(created) = created {
        set_creation_time(dest, created)?;
    }
    Ok(())
}

#[cfg(windows)]
fn set_creation_time(dest: &Path, created: &DateTime<Utc>) -> io::Result<()> {
    use std::os::windows::fs::FileTimesExt;

    let file = std::fs::OpenOptions::new().write(true).open(dest)?;
    let times = std::fs::FileTimes::new().set_created(std::time::SystemTime::from(*created));
    file.set_times(times)
}

#[cfg(not(windows))]
fn set_creation_time(_dest: &Path, _created: &DateTime<Utc>) -> io::Result<()> {
    Ok(())
}

/// Copy the entry's recorded times onto `dest`, ignoring any failure
pub fn apply_best_effort(dest: &Path, entry: &SourceEntry) {
    if let Err(e) = apply(dest, &entry.modified, entry.created.as_ref()) {
        debug!("Could not preserve timestamps on {}: {}", dest.display(), e);
    }
}
