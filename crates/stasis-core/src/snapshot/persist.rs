//! Snapshot files on disk

use super::format;
use crate::error::SnapshotResult;
use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use tracing::debug;

/// Seal a graph buffer and write it to `path`
///
/// The data goes to a sibling temporary file that is renamed over `path`
/// only once fully written, so a failed save leaves the previous file intact.
pub fn save_snapshot(path: impl AsRef<Path>, payload: &[u8]) -> SnapshotResult<()> {
    let path = path.as_ref();
    let tmp = temp_path(path);
    let sealed = format::seal(payload);

    let result = write_file(&tmp, &sealed).and_then(|()| fs::rename(&tmp, path));
    if let Err(err) = result {
        let _ = fs::remove_file(&tmp);
        return Err(err.into());
    }

    debug!(path = %path.display(), bytes = sealed.len(), "Saved snapshot");
    Ok(())
}

/// Read a snapshot file and return its graph buffer
pub fn load_snapshot(path: impl AsRef<Path>) -> SnapshotResult<Vec<u8>> {
    let path = path.as_ref();
    let bytes = fs::read(path)?;
    let payload = format::open(&bytes)?.to_vec();
    debug!(path = %path.display(), bytes = bytes.len(), "Loaded snapshot");
    Ok(payload)
}

fn write_file(path: &Path, bytes: &[u8]) -> std::io::Result<()> {
    let mut writer = BufWriter::new(File::create(path)?);
    writer.write_all(bytes)?;
    writer.into_inner().map_err(|e| e.into_error())?.sync_all()
}

fn temp_path(path: &Path) -> PathBuf {
    let mut name = path.file_name().map(|n| n.to_os_string()).unwrap_or_default();
    name.push(".tmp");
    path.with_file_name(name)
}
