//! A [`DeviceFileService`] backed by a local directory tree shaped like
//! §6.2's `iTunes_Control`/`iTunes` layout. Stands in for a real
//! transport-backed adapter (external collaborator, out of scope here)
//! so the merge engine is exercisable against an already-mounted or
//! otherwise locally-reachable device filesystem, and so the `cli` crate
//! is testable without a paired device.

use std::fs::{self, File};
use std::io::{Read, Write};
use std::path::{Path, PathBuf};

use media_catalog_merger::adapter::{DeviceFileHandle, DeviceFileService};
use media_catalog_merger::error::AdapterError;

/// An open file on the local filesystem standing in for a device file.
pub struct LocalFileHandle {
    path: PathBuf,
    file: File,
}

impl DeviceFileHandle for LocalFileHandle {}

/// Root of the local directory tree; every path the trait methods
/// receive is joined onto this root.
pub struct LocalDeviceAdapter {
    root: PathBuf,
}

impl LocalDeviceAdapter {
    #[must_use]
    pub fn new(root: PathBuf) -> Self {
        Self { root }
    }

    fn resolve(&self, path: &Path) -> PathBuf {
        self.root.join(path)
    }
}

fn map_io_error(path: &Path, err: std::io::Error) -> AdapterError {
    if err.kind() == std::io::ErrorKind::NotFound {
        AdapterError::NotFound(path.to_path_buf())
    } else {
        AdapterError::Transport(err.into())
    }
}

impl DeviceFileService for LocalDeviceAdapter {
    type Handle = LocalFileHandle;

    fn list(&mut self, path: &Path) -> Result<Vec<String>, AdapterError> {
        let full = self.resolve(path);
        let entries = fs::read_dir(&full).map_err(|err| map_io_error(path, err))?;
        let mut names = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|err| map_io_error(path, err))?;
            names.push(entry.file_name().to_string_lossy().to_string());
        }
        Ok(names)
    }

    fn make_dir(&mut self, path: &Path) -> Result<(), AdapterError> {
        fs::create_dir_all(self.resolve(path)).map_err(|err| map_io_error(path, err))
    }

    fn open_read(&mut self, path: &Path) -> Result<Self::Handle, AdapterError> {
        let full = self.resolve(path);
        let file = File::open(&full).map_err(|err| map_io_error(path, err))?;
        Ok(LocalFileHandle { path: full, file })
    }

    fn open_write(&mut self, path: &Path) -> Result<Self::Handle, AdapterError> {
        let full = self.resolve(path);
        if let Some(parent) = full.parent() {
            fs::create_dir_all(parent).map_err(|err| map_io_error(path, err))?;
        }
        let file = File::create(&full).map_err(|err| map_io_error(path, err))?;
        Ok(LocalFileHandle { path: full, file })
    }

    fn read_all(&mut self, handle: &mut Self::Handle) -> Result<Vec<u8>, AdapterError> {
        let mut bytes = Vec::new();
        handle
            .file
            .read_to_end(&mut bytes)
            .map_err(|err| map_io_error(&handle.path, err))?;
        Ok(bytes)
    }

    fn write_all(&mut self, handle: &mut Self::Handle, bytes: &[u8]) -> Result<(), AdapterError> {
        handle
            .file
            .write_all(bytes)
            .map_err(|err| map_io_error(&handle.path, err))
    }

    fn close(&mut self, mut handle: Self::Handle) -> Result<(), AdapterError> {
        handle.file.flush().map_err(|err| map_io_error(&handle.path, err))
    }

    fn remove(&mut self, path: &Path) -> Result<(), AdapterError> {
        let full = self.resolve(path);
        match fs::remove_file(&full) {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Err(AdapterError::NotFound(path.to_path_buf())),
            Err(err) => Err(AdapterError::Transport(err.into())),
        }
    }

    fn remove_tree(&mut self, path: &Path) -> Result<(), AdapterError> {
        let full = self.resolve(path);
        match fs::remove_dir_all(&full) {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Err(AdapterError::NotFound(path.to_path_buf())),
            Err(err) => Err(AdapterError::Transport(err.into())),
        }
    }

    /// `std::fs::rename` already replaces `dst` atomically on the
    /// platforms this tool targets, matching the adapter contract's
    /// "atomic replace if dst exists" semantics.
    fn rename(&mut self, src: &Path, dst: &Path) -> Result<(), AdapterError> {
        fs::rename(self.resolve(src), self.resolve(dst)).map_err(|err| map_io_error(src, err))
    }

    fn notify_sync_finished(&mut self) -> Result<(), AdapterError> {
        info!("sync-finished notification (local adapter: no-op, no device to notify)");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::LocalDeviceAdapter;
    use media_catalog_merger::adapter::DeviceFileService;

    #[test]
    fn write_then_read_round_trips_bytes() {
        let tmp = tempfile::tempdir().unwrap();
        let mut adapter = LocalDeviceAdapter::new(tmp.path().to_path_buf());

        let path = std::path::Path::new("iTunes_Control/Music/F00/ABCD.mp3");
        adapter.write_file(path, b"hello").unwrap();

        let bytes = adapter.try_read_file(path).unwrap().unwrap();
        assert_eq!(bytes, b"hello");
    }

    #[test]
    fn try_read_missing_file_returns_none() {
        let tmp = tempfile::tempdir().unwrap();
        let mut adapter = LocalDeviceAdapter::new(tmp.path().to_path_buf());

        let missing = adapter.try_read_file(std::path::Path::new("nope.bin")).unwrap();
        assert!(missing.is_none());
    }

    #[test]
    fn rename_replaces_existing_destination() {
        let tmp = tempfile::tempdir().unwrap();
        let mut adapter = LocalDeviceAdapter::new(tmp.path().to_path_buf());

        adapter.write_file(std::path::Path::new("a.bin"), b"new").unwrap();
        adapter.write_file(std::path::Path::new("b.bin"), b"old").unwrap();
        adapter
            .rename(std::path::Path::new("a.bin"), std::path::Path::new("b.bin"))
            .unwrap();

        let bytes = adapter.try_read_file(std::path::Path::new("b.bin")).unwrap().unwrap();
        assert_eq!(bytes, b"new");
    }

    #[test]
    fn list_returns_file_names_under_directory() {
        let tmp = tempfile::tempdir().unwrap();
        let mut adapter = LocalDeviceAdapter::new(tmp.path().to_path_buf());

        adapter.write_file(std::path::Path::new("iTunes_Control/Music/F00/ABCD.mp3"), b"x").unwrap();
        adapter.write_file(std::path::Path::new("iTunes_Control/Music/F00/WXYZ.mp3"), b"y").unwrap();

        let mut names = adapter.list(std::path::Path::new("iTunes_Control/Music/F00")).unwrap();
        names.sort();
        assert_eq!(names, vec!["ABCD.mp3".to_string(), "WXYZ.mp3".to_string()]);
    }
}
