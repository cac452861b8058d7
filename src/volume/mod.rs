//! Volume initialization gate.
//!
//! Decides whether first-boot scripts may be supplied to the engine by
//! inspecting the persistent volume for the marker the engine writes on its
//! first successful boot. The gate only reads: it never creates or deletes
//! anything under the volume.

use crate::config::Engine;
use crate::error::VolumeError;
use serde::Serialize;
use std::fmt;
use std::io;
use std::path::{Path, PathBuf};

/// Read-time classification of a volume. Never stored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum VolumeState {
    /// No engine-written marker: initialization scripts will run.
    Empty,
    /// The engine has booted against this volume before.
    Initialized,
}

impl fmt::Display for VolumeState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            VolumeState::Empty => f.write_str("EMPTY"),
            VolumeState::Initialized => f.write_str("INITIALIZED"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VolumeInitGate {
    marker: PathBuf,
}

impl VolumeInitGate {
    /// Gate keyed on `marker`, a path relative to the volume root.
    pub fn new(marker: impl Into<PathBuf>) -> Self {
        Self {
            marker: marker.into(),
        }
    }

    pub fn for_engine(engine: Engine) -> Self {
        Self::new(engine.marker())
    }

    pub fn marker(&self) -> &Path {
        &self.marker
    }

    /// Whether `volume` has never been initialized by the engine.
    ///
    /// A volume directory that does not exist yet is empty: the runtime
    /// creates it on first bind mount.
    ///
    /// # Errors
    ///
    /// [`VolumeError`] if `volume` exists but is not a directory, or if the
    /// volume or marker cannot be inspected.
    pub fn is_empty(&self, volume: &Path) -> Result<bool, VolumeError> {
        match std::fs::metadata(volume) {
            Ok(meta) if meta.is_dir() => {}
            Ok(_) => return Err(VolumeError::new(volume, "is not a directory")),
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(true),
            Err(e) => return Err(VolumeError::io(volume, "cannot be inspected", e)),
        }

        // Listing proves the directory is readable; a marker hidden behind a
        // permission error must not be mistaken for an empty volume.
        std::fs::read_dir(volume).map_err(|e| VolumeError::io(volume, "cannot be read", e))?;

        let marker = volume.join(&self.marker);
        match std::fs::symlink_metadata(&marker) {
            Ok(_) => Ok(false),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(true),
            Err(e) => Err(VolumeError::io(
                volume,
                format!("marker '{}' cannot be inspected", self.marker.display()),
                e,
            )),
        }
    }

    pub fn classify(&self, volume: &Path) -> Result<VolumeState, VolumeError> {
        let state = if self.is_empty(volume)? {
            VolumeState::Empty
        } else {
            VolumeState::Initialized
        };
        tracing::debug!(volume = %volume.display(), %state, "Classified volume");
        Ok(state)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn gate() -> VolumeInitGate {
        VolumeInitGate::for_engine(Engine::MySql)
    }

    #[test]
    fn test_missing_directory_is_empty() {
        let dir = TempDir::new().unwrap();
        let volume = dir.path().join("not-created-yet");
        assert_eq!(gate().classify(&volume).unwrap(), VolumeState::Empty);
        assert!(!volume.exists(), "gate must not create the volume");
    }

    #[test]
    fn test_unrelated_files_do_not_count() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("README"), "x").unwrap();
        assert!(gate().is_empty(dir.path()).unwrap());
    }

    #[test]
    fn test_marker_means_initialized() {
        let dir = TempDir::new().unwrap();
        std::fs::create_dir(dir.path().join("mysql")).unwrap();
        assert_eq!(
            gate().classify(dir.path()).unwrap(),
            VolumeState::Initialized
        );
        // Idempotent
        assert_eq!(
            gate().classify(dir.path()).unwrap(),
            VolumeState::Initialized
        );
    }

    #[test]
    fn test_file_instead_of_directory_is_error() {
        let dir = TempDir::new().unwrap();
        let file = dir.path().join("data");
        std::fs::write(&file, "").unwrap();
        let err = gate().is_empty(&file).unwrap_err();
        assert_eq!(err.path, file);
    }

    #[test]
    fn test_inspection_leaves_volume_untouched() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("ibdata1"), "x").unwrap();
        let before: Vec<_> = std::fs::read_dir(dir.path())
            .unwrap()
            .map(|e| e.unwrap().file_name())
            .collect();
        gate().classify(dir.path()).unwrap();
        let after: Vec<_> = std::fs::read_dir(dir.path())
            .unwrap()
            .map(|e| e.unwrap().file_name())
            .collect();
        assert_eq!(before, after);
    }
}
