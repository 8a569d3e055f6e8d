use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};
use tracing::warn;

use crate::simulation::potential::FieldState;

/// A field snapshot found on disk.
#[derive(Debug, Clone)]
pub struct SnapshotMetadata {
    pub path: PathBuf,
    pub frame: u64,
    pub timestamp: u64,
    pub file_size: u64,
}

/// Errors that can occur while reading or writing field snapshots.
#[derive(Debug)]
pub enum SnapshotError {
    Io(io::Error),
    Encode(String),
    Decode(String),
    /// Texel count does not match the recorded resolution.
    Corrupt(PathBuf),
    NoValidSnapshots,
}

impl std::fmt::Display for SnapshotError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SnapshotError::Io(e) => write!(f, "I/O error: {}", e),
            SnapshotError::Encode(e) => write!(f, "Cannot encode field: {}", e),
            SnapshotError::Decode(e) => write!(f, "Cannot decode field: {}", e),
            SnapshotError::Corrupt(path) => {
                write!(f, "Corrupt field snapshot: {}", path.display())
            }
            SnapshotError::NoValidSnapshots => {
                write!(f, "No valid field snapshots found. Run: windfield run")
            }
        }
    }
}

impl std::error::Error for SnapshotError {}

impl From<io::Error> for SnapshotError {
    fn from(e: io::Error) -> Self {
        SnapshotError::Io(e)
    }
}

fn snapshot_filename(frame: u64, timestamp: u64) -> String {
    format!("field-frame{}-{}.bin", frame, timestamp)
}

/// Parse `field-frame{N}-{timestamp}.bin`.
fn parse_snapshot_filename(filename: &str) -> Option<(u64, u64)> {
    let rest = filename.strip_suffix(".bin")?.strip_prefix("field-frame")?;
    let (frame, ts) = rest.split_once('-')?;
    Some((frame.parse().ok()?, ts.parse().ok()?))
}

fn unix_timestamp_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
}

/// Write a field snapshot into `snapshot_dir`.
///
/// The bytes go to a hidden temp file first and are renamed into place, so a
/// failed write never leaves a truncated snapshot behind.
pub fn save_snapshot(state: &FieldState, snapshot_dir: &Path) -> Result<PathBuf, SnapshotError> {
    fs::create_dir_all(snapshot_dir)?;

    let filename = snapshot_filename(state.frame, unix_timestamp_now());
    let target = snapshot_dir.join(&filename);
    let tmp = snapshot_dir.join(format!(".{}.tmp", filename));

    let encoded = bincode::serialize(state).map_err(|e| SnapshotError::Encode(e.to_string()))?;

    if let Err(e) = fs::write(&tmp, &encoded).and_then(|_| fs::rename(&tmp, &target)) {
        let _ = fs::remove_file(&tmp);
        return Err(SnapshotError::Io(e));
    }

    Ok(target)
}

pub fn load_snapshot(path: &Path) -> Result<FieldState, SnapshotError> {
    let data = fs::read(path)?;
    let state: FieldState =
        bincode::deserialize(&data).map_err(|e| SnapshotError::Decode(e.to_string()))?;

    if state.size.checked_mul(state.size) != Some(state.potential.len()) {
        return Err(SnapshotError::Corrupt(path.to_path_buf()));
    }

    Ok(state)
}

/// Snapshots in `snapshot_dir`, newest first (timestamp, then frame).
pub fn list_snapshots(snapshot_dir: &Path) -> Result<Vec<SnapshotMetadata>, SnapshotError> {
    if !snapshot_dir.exists() {
        return Ok(Vec::new());
    }

    let mut snapshots = Vec::new();
    for entry in fs::read_dir(snapshot_dir)? {
        let entry = entry?;
        let path = entry.path();
        if !path.is_file() {
            continue;
        }
        let Some(filename) = path.file_name().and_then(|n| n.to_str()) else {
            continue;
        };
        if filename.starts_with('.') {
            continue;
        }
        if let Some((frame, timestamp)) = parse_snapshot_filename(filename) {
            let file_size = entry.metadata().map(|m| m.len()).unwrap_or(0);
            snapshots.push(SnapshotMetadata {
                path: path.clone(),
                frame,
                timestamp,
                file_size,
            });
        }
    }

    snapshots.sort_by(|a, b| b.timestamp.cmp(&a.timestamp).then(b.frame.cmp(&a.frame)));
    Ok(snapshots)
}

/// Delete all but the `max_snapshots` newest snapshots. Returns deleted paths.
pub fn prune_snapshots(
    snapshot_dir: &Path,
    max_snapshots: usize,
) -> Result<Vec<PathBuf>, SnapshotError> {
    let snapshots = list_snapshots(snapshot_dir)?;
    let mut deleted = Vec::new();
    for snapshot in snapshots.iter().skip(max_snapshots) {
        fs::remove_file(&snapshot.path)?;
        deleted.push(snapshot.path.clone());
    }
    Ok(deleted)
}

/// Newest snapshot that decodes cleanly; corrupt ones are logged and skipped.
pub fn load_latest_valid_snapshot(snapshot_dir: &Path) -> Result<FieldState, SnapshotError> {
    for snapshot in list_snapshots(snapshot_dir)? {
        match load_snapshot(&snapshot.path) {
            Ok(state) => return Ok(state),
            Err(e) => {
                warn!(
                    path = %snapshot.path.display(),
                    error = %e,
                    "Skipping unreadable field snapshot"
                );
            }
        }
    }
    Err(SnapshotError::NoValidSnapshots)
}
