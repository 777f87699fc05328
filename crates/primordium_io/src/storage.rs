//! Gzip-compressed JSON persistence for [`crate::snapshot::Snapshot`].

use crate::error::{IoError, Result};
use crate::snapshot::Snapshot;
use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use flate2::Compression;
use std::fs::File;
use std::io::{Read, Write};
use std::path::Path;

/// Serializes, validates, and gzip-writes a snapshot to `path`.
pub fn save_snapshot<P: AsRef<Path>>(snapshot: &Snapshot, path: P) -> Result<()> {
    snapshot.validate()?;
    let json = serde_json::to_vec(snapshot)?;
    let file = File::create(path)?;
    let mut encoder = GzEncoder::new(file, Compression::default());
    encoder.write_all(&json)?;
    encoder.finish()?;
    Ok(())
}

/// Reads and validates a gzip-compressed snapshot from `path`.
pub fn load_snapshot<P: AsRef<Path>>(path: P) -> Result<Snapshot> {
    let path = path.as_ref();
    if !path.exists() {
        return Err(IoError::not_found(path.display().to_string()));
    }
    let file = File::open(path)?;
    let mut decoder = GzDecoder::new(file);
    let mut json = Vec::new();
    decoder.read_to_end(&mut json)?;
    let snapshot: Snapshot = serde_json::from_slice(&json)?;
    snapshot.validate()?;
    Ok(snapshot)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::snapshot::SNAPSHOT_VERSION;
    use primordium_core::tectonics::mantle::{ConvectionCell, MantleState};
    use std::collections::HashMap;

    fn sample() -> Snapshot {
        Snapshot {
            version: SNAPSHOT_VERSION,
            width: 0,
            height: 0,
            seed: 7,
            turn: 3,
            plates: vec![],
            plate_of_tile: vec![],
            tiles: vec![],
            features: vec![],
            mantle: MantleState::new(vec![ConvectionCell { center: (0.0, 0.0), strength: 0.1 }]),
            species: vec![],
            species_history: HashMap::new(),
            pressure_feedback: HashMap::new(),
            metrics_history: vec![],
            config_fingerprint: Some("abc123".to_string()),
        }
    }

    #[test]
    fn round_trips_through_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("save.bin");
        save_snapshot(&sample(), &path).unwrap();
        let loaded = load_snapshot(&path).unwrap();
        assert_eq!(loaded.turn, 3);
        assert_eq!(loaded.config_fingerprint.as_deref(), Some("abc123"));
    }

    #[test]
    fn loading_missing_file_returns_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("does-not-exist.bin");
        assert!(matches!(load_snapshot(&path), Err(IoError::NotFound(_))));
    }
}
