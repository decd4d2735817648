//! Device I/O adapter (spec §6.1, component J): the abstract file-service
//! contract the orchestrator drives. A real implementation talks to the
//! device over its pairing tunnel; this crate only consumes the trait.

use std::path::{Path, PathBuf};

use crate::config::MergeConfig;
use crate::error::AdapterError;

/// An open file handle on the device, opaque to this crate.
pub trait DeviceFileHandle: Send {}

/// Device file-service operations the merge orchestrator needs (spec §6.1).
///
/// Every call is blocking from the orchestrator's perspective (spec §5):
/// the orchestrator joins on each call before proceeding, never
/// interleaving device I/O with catalog mutation.
pub trait DeviceFileService {
    type Handle: DeviceFileHandle;

    /// List entries directly under `path`.
    fn list(&mut self, path: &Path) -> Result<Vec<String>, AdapterError>;

    /// Create `path` and any missing parents. Idempotent.
    fn make_dir(&mut self, path: &Path) -> Result<(), AdapterError>;

    fn open_read(&mut self, path: &Path) -> Result<Self::Handle, AdapterError>;
    fn open_write(&mut self, path: &Path) -> Result<Self::Handle, AdapterError>;

    fn read_all(&mut self, handle: &mut Self::Handle) -> Result<Vec<u8>, AdapterError>;
    fn write_all(&mut self, handle: &mut Self::Handle, bytes: &[u8]) -> Result<(), AdapterError>;

    fn close(&mut self, handle: Self::Handle) -> Result<(), AdapterError>;

    fn remove(&mut self, path: &Path) -> Result<(), AdapterError>;
    fn remove_tree(&mut self, path: &Path) -> Result<(), AdapterError>;

    /// Atomic replace if `dst` exists.
    fn rename(&mut self, src: &Path, dst: &Path) -> Result<(), AdapterError>;

    fn notify_sync_finished(&mut self) -> Result<(), AdapterError>;

    /// Convenience: open, read everything, close. Returns `Ok(None)` if
    /// `path` does not exist rather than an error, since callers
    /// frequently need to distinguish "absent" from "unreadable".
    fn try_read_file(&mut self, path: &Path) -> Result<Option<Vec<u8>>, AdapterError> {
        match self.open_read(path) {
            Ok(mut handle) => {
                let bytes = self.read_all(&mut handle)?;
                self.close(handle)?;
                Ok(Some(bytes))
            }
            Err(AdapterError::NotFound(_)) => Ok(None),
            Err(err) => Err(err),
        }
    }

    /// Convenience: open for write, write everything, close.
    fn write_file(&mut self, path: &Path, bytes: &[u8]) -> Result<(), AdapterError> {
        let mut handle = self.open_write(path)?;
        self.write_all(&mut handle, bytes)?;
        self.close(handle)
    }
}

/// Paths under `iTunes_Control/` the orchestrator reads from or writes to
/// (spec §6.2). The music/tones/artwork roots come from `MergeConfig`
/// (spec §3.3) so an operator can point uploads somewhere non-default; the
/// catalog's own location is fixed by §6.2, not a tunable, so it stays a
/// set of plain associated functions.
pub struct DeviceLayout {
    music_dir: PathBuf,
    tones_dir: PathBuf,
    artwork_originals: PathBuf,
}

impl DeviceLayout {
    /// Build a layout from a loaded config's base-path fields.
    #[must_use]
    pub fn from_config(config: &MergeConfig) -> Self {
        Self {
            music_dir: PathBuf::from(&config.music_base_path),
            tones_dir: PathBuf::from(&config.tones_base_path),
            artwork_originals: PathBuf::from(&config.artwork_base_path),
        }
    }

    #[must_use]
    pub fn music_dir(&self) -> &Path {
        &self.music_dir
    }

    #[must_use]
    pub fn tones_dir(&self) -> &Path {
        &self.tones_dir
    }

    #[must_use]
    pub fn artwork_originals(&self) -> &Path {
        &self.artwork_originals
    }

    #[must_use]
    pub fn tones_plist(&self) -> PathBuf {
        self.tones_dir.join("Ringtones.plist")
    }

    pub fn catalog() -> PathBuf {
        PathBuf::from("iTunes_Control/iTunes/MediaLibrary.sqlitedb")
    }

    pub fn catalog_wal() -> PathBuf {
        PathBuf::from("iTunes_Control/iTunes/MediaLibrary.sqlitedb-wal")
    }

    pub fn catalog_shm() -> PathBuf {
        PathBuf::from("iTunes_Control/iTunes/MediaLibrary.sqlitedb-shm")
    }

    pub fn catalog_staging() -> PathBuf {
        PathBuf::from("iTunes_Control/iTunes/MediaLibrary.sqlitedb.temp")
    }
}

impl Default for DeviceLayout {
    fn default() -> Self {
        Self::from_config(&MergeConfig::default())
    }
}
