//! Whole-fleet snapshots in bincode.
//!
//! A snapshot is written to a temporary file next to the target and renamed
//! into place, so readers see either the old fleet or the new one.

use super::Fleet;
use crate::domain::{BatchError, BatchResult};
use serde::{Deserialize, Serialize};
use std::io::Write;
use std::path::Path;
use tempfile::NamedTempFile;
use tracing::{debug, info};

const SNAPSHOT_MAGIC: [u8; 4] = *b"CBFS";
const SNAPSHOT_VERSION: u32 = 1;

#[derive(Serialize, Deserialize)]
struct SnapshotFile<F> {
    magic: [u8; 4],
    version: u32,
    fleet: F,
}

impl Fleet {
    pub fn to_snapshot_bytes(&self) -> BatchResult<Vec<u8>> {
        let file = SnapshotFile {
            magic: SNAPSHOT_MAGIC,
            version: SNAPSHOT_VERSION,
            fleet: self,
        };
        bincode::serialize(&file).map_err(|source| {
            BatchError::internal(
                "INTERNAL.SNAPSHOT_ENCODE",
                format!("failed to encode fleet snapshot: {}", source),
            )
        })
    }

    pub fn from_snapshot_bytes(bytes: &[u8]) -> BatchResult<Self> {
        let file: SnapshotFile<Fleet> = bincode::deserialize(bytes).map_err(|source| {
            BatchError::filesystem(
                "IO.SNAPSHOT_DECODE",
                format!("failed to decode fleet snapshot: {}", source),
            )
        })?;
        if file.magic != SNAPSHOT_MAGIC || file.version != SNAPSHOT_VERSION {
            return Err(BatchError::filesystem(
                "IO.SNAPSHOT_FORMAT",
                format!("unsupported snapshot format version {}", file.version),
            ));
        }
        Ok(file.fleet)
    }

    pub fn save_snapshot(&self, path: &Path) -> BatchResult<()> {
        let bytes = self.to_snapshot_bytes()?;
        let parent = match path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        };
        std::fs::create_dir_all(parent).map_err(|source| snapshot_io(path, source))?;

        let mut staged = NamedTempFile::new_in(parent).map_err(|source| snapshot_io(path, source))?;
        staged
            .write_all(&bytes)
            .and_then(|()| staged.as_file().sync_all())
            .map_err(|source| snapshot_io(path, source))?;
        debug!(bytes = bytes.len(), "fleet snapshot staged");

        staged
            .persist(path)
            .map_err(|source| snapshot_io(path, source.error))?;
        info!(path = %path.display(), calculations = self.len(), "saved fleet snapshot");
        Ok(())
    }

    pub fn load_snapshot(path: &Path) -> BatchResult<Self> {
        let bytes = std::fs::read(path).map_err(|source| {
            BatchError::filesystem(
                "IO.SNAPSHOT_READ",
                format!("failed to read snapshot '{}': {}", path.display(), source),
            )
        })?;
        let fleet = Self::from_snapshot_bytes(&bytes).map_err(|error| error.context(path.display()))?;
        info!(path = %path.display(), calculations = fleet.len(), "loaded fleet snapshot");
        Ok(fleet)
    }
}

fn snapshot_io(path: &Path, source: std::io::Error) -> BatchError {
    BatchError::filesystem(
        "IO.SNAPSHOT_WRITE",
        format!("failed to write snapshot '{}': {}", path.display(), source),
    )
}
