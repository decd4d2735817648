//! Merge orchestrator (spec §4.9, component I): the end-to-end workflow
//! that turns a batch of [`crate::input::InputItem`]s (or
//! [`crate::catalog::ringtone::RingtoneInput`]s) into a merged catalog on
//! a device reached through a [`DeviceFileService`].
//!
//! Everything here runs on whatever single worker the caller drives it
//! from (spec §5): no state is committed on the device before the final
//! rename in [`finalize_and_swap`], so a caller that aborts partway
//! through is equivalent to a no-op from the device's perspective.

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use crate::adapter::{DeviceFileService, DeviceLayout};
use crate::catalog::{
    Catalog, Integer, ghost,
    item_insert::ItemInserter,
    playlist,
    ringtone::{RingtoneInput, RingtoneInserter},
};
use crate::config::MergeConfig;
use crate::error::{AdapterError, CatalogError, MergeError};
use crate::input::InputItem;
use crate::ringtone_plist::{RingtonePlist, RingtonePlistEntry};

/// What to do with a freshly-merged batch of items regarding playlist
/// membership (spec §4.7).
#[derive(Debug, Clone)]
pub enum PlaylistRequest {
    /// Create a brand-new playlist from the merged items.
    Create { name: String },
    /// Append the merged items to an existing playlist.
    Append { container_pid: Integer },
}

/// Tunables for one merge run that are not persisted config (spec §4, the
/// dry-run addition).
#[derive(Debug, Clone, Default)]
pub struct MergeOptions {
    /// Local scratch directory the catalog file is staged into before
    /// `rusqlite` opens it — `rusqlite::Connection::open` needs a real
    /// path, not the bytes downloaded from the device.
    pub workdir: PathBuf,
    /// If set, resolve and insert against the downloaded (or freshly
    /// created) catalog, but never upload or swap anything on the
    /// device. The returned [`MergeOutcome`] reflects what *would* have
    /// happened.
    pub dry_run: bool,
    pub playlist: Option<PlaylistRequest>,
}

/// Summary of one merge run (spec §4 "Idempotent re-merge convenience").
#[derive(Debug, Clone, Default)]
pub struct MergeOutcome {
    pub items_inserted: usize,
    pub items_resurrected: usize,
    pub items_skipped_unknown: usize,
    pub ghosts_removed: usize,
    pub entities_created: usize,
    /// `PRAGMA quick_check`'s raw result, surfaced rather than discarded
    /// once logged (spec §4, §7 "integrity-fail").
    pub quick_check: Option<String>,
    pub playlist_container_pid: Option<Integer>,
    pub dry_run: bool,
}

struct LocalPaths {
    catalog: PathBuf,
    wal: PathBuf,
    shm: PathBuf,
}

impl LocalPaths {
    fn new(workdir: &Path) -> Self {
        Self {
            catalog: workdir.join("MediaLibrary.sqlitedb"),
            wal: workdir.join("MediaLibrary.sqlitedb-wal"),
            shm: workdir.join("MediaLibrary.sqlitedb-shm"),
        }
    }
}

/// Download the live catalog (and any WAL/SHM sidecars) into `workdir`,
/// then decide between merge-mode and fresh-catalog-mode per the
/// §4.9 step 4 size threshold. Returns the opened catalog and whether it
/// was freshly created (ghost reconciliation is skipped for a fresh one:
/// there is nothing to reconcile against).
fn stage_and_open_catalog<D: DeviceFileService>(
    adapter: &mut D,
    config: &MergeConfig,
    workdir: &Path,
) -> Result<(Catalog, LocalPaths, bool), MergeError> {
    std::fs::create_dir_all(workdir)
        .map_err(|err| MergeError::MergeFailed { step: "create workdir", source: err.into() })?;
    let paths = LocalPaths::new(workdir);

    let catalog_bytes = adapter
        .try_read_file(&DeviceLayout::catalog())
        .map_err(MergeError::Transport)?;
    let wal_bytes = adapter
        .try_read_file(&DeviceLayout::catalog_wal())
        .map_err(MergeError::Transport)?;
    let shm_bytes = adapter
        .try_read_file(&DeviceLayout::catalog_shm())
        .map_err(MergeError::Transport)?;

    let is_valid = catalog_bytes
        .as_ref()
        .is_some_and(|bytes| bytes.len() as u64 > config.valid_catalog_min_bytes);

    if is_valid {
        let bytes = catalog_bytes.expect("checked Some above");
        write_local(&paths.catalog, &bytes)?;
        let had_wal = wal_bytes.is_some();
        if let Some(bytes) = wal_bytes {
            write_local(&paths.wal, &bytes)?;
        }
        if let Some(bytes) = shm_bytes {
            write_local(&paths.shm, &bytes)?;
        }

        info!("downloaded catalog is {} bytes, merging into it", bytes.len());
        let catalog = Catalog::open_existing(&paths.catalog).map_err(MergeError::CatalogOpen)?;

        if had_wal {
            catalog.checkpoint_truncate().map_err(MergeError::CatalogOpen)?;
        }
        catalog.check_compatible().map_err(MergeError::CatalogOpen)?;

        Ok((catalog, paths, false))
    } else {
        info!("no catalog worth trusting on device, creating a fresh one");
        let catalog = Catalog::create_fresh(&paths.catalog).map_err(MergeError::CatalogOpen)?;
        Ok((catalog, paths, true))
    }
}

fn write_local(path: &Path, bytes: &[u8]) -> Result<(), MergeError> {
    std::fs::write(path, bytes)
        .map_err(|err| MergeError::MergeFailed { step: "stage catalog locally", source: err.into() })
}

/// Checkpoint, close, and swap a finalized local catalog into place on
/// the device (spec §4.9 steps 7-9). `uploads` are additional device
/// files (audio, artwork, ringtone plist) to write before the catalog
/// swap — the spec doesn't order these relative to each other beyond
/// "before the rename", since none of them are visible to the consumer
/// application until the rename commits.
fn finalize_and_swap<D: DeviceFileService>(
    adapter: &mut D,
    catalog: Catalog,
    paths: &LocalPaths,
    uploads: Vec<(PathBuf, Vec<u8>)>,
) -> Result<(), MergeError> {
    catalog
        .finalize_for_upload()
        .map_err(|err| MergeError::MergeFailed { step: "finalize catalog for upload", source: err.into() })?;
    drop(catalog);

    for (path, bytes) in uploads {
        info!("uploading {}", path.display());
        adapter
            .write_file(&path, &bytes)
            .map_err(|source| MergeError::UploadFailed { what: "device file", source })?;
    }

    let catalog_bytes = std::fs::read(&paths.catalog)
        .map_err(|err| MergeError::MergeFailed { step: "read finalized catalog", source: err.into() })?;
    let staging = DeviceLayout::catalog_staging();
    adapter
        .write_file(&staging, &catalog_bytes)
        .map_err(|source| MergeError::UploadFailed { what: "catalog", source })?;

    ignore_not_found(adapter.remove(&DeviceLayout::catalog_wal()))?;
    ignore_not_found(adapter.remove(&DeviceLayout::catalog_shm()))?;
    ignore_not_found(adapter.remove(&DeviceLayout::catalog()))?;

    if let Err(err) = adapter.rename(&staging, &DeviceLayout::catalog()) {
        warn!("swap failed, removing staging file to avoid litter: {err}");
        let _ = adapter.remove(&staging);
        return Err(MergeError::SwapFailed(err));
    }

    adapter
        .notify_sync_finished()
        .map_err(|source| MergeError::UploadFailed { what: "sync-finished notification", source })?;

    Ok(())
}

fn ignore_not_found(result: Result<(), AdapterError>) -> Result<(), MergeError> {
    match result {
        Ok(()) | Err(AdapterError::NotFound(_)) => Ok(()),
        Err(err) => Err(MergeError::UploadFailed { what: "remove stale device file", source: err }),
    }
}

fn existing_music_filenames<D: DeviceFileService>(
    adapter: &mut D,
    layout: &DeviceLayout,
) -> Result<HashSet<String>, MergeError> {
    match adapter.list(layout.music_dir()) {
        Ok(names) => Ok(names.into_iter().collect()),
        Err(AdapterError::NotFound(_)) => Ok(HashSet::new()),
        Err(err) => Err(MergeError::Transport(err)),
    }
}

/// Run a full merge of `items` into the device's catalog (spec §4.9,
/// steps 1-9). Items whose artist AND album are both the "unknown"
/// placeholders are skipped per step 3 when `config.skip_unknown_unknown`
/// is set.
pub fn run_merge<D: DeviceFileService>(
    adapter: &mut D,
    items: &[InputItem],
    config: &MergeConfig,
    options: &MergeOptions,
) -> Result<MergeOutcome, MergeError> {
    let layout = DeviceLayout::from_config(config);
    info!("enumerating existing files under {}", layout.music_dir().display());
    let existing_filenames = existing_music_filenames(adapter, &layout)?;

    let sanitized: Vec<InputItem> = items.iter().cloned().map(InputItem::sanitized).collect();
    let skipped = sanitized.iter().filter(|item| item.is_unknown_unknown()).count();
    let to_insert: Vec<&InputItem> = if config.skip_unknown_unknown {
        sanitized.iter().filter(|item| !item.is_unknown_unknown()).collect()
    } else {
        sanitized.iter().collect()
    };

    let (catalog, paths, is_fresh) = stage_and_open_catalog(adapter, config, &options.workdir)?;

    let quick_check = if is_fresh {
        None
    } else {
        let result = catalog
            .quick_check()
            .map_err(|err| MergeError::MergeFailed { step: "quick_check", source: err.into() })?;
        if result != "ok" {
            warn!("catalog quick_check reported a problem, continuing anyway: {result}");
        }
        Some(result)
    };

    let mut uploads: Vec<(PathBuf, Vec<u8>)> = Vec::new();
    let mut outcome = MergeOutcome {
        items_skipped_unknown: skipped,
        quick_check,
        dry_run: options.dry_run,
        ..Default::default()
    };

    {
        let conn = catalog.get_connection();

        let ghosts = if is_fresh {
            Vec::new()
        } else {
            ghost::reconcile(&conn, &existing_filenames)
                .map_err(|err| MergeError::MergeFailed { step: "ghost reconciliation", source: err.into() })?
        };
        outcome.ghosts_removed = ghosts.len();
        for pid in &ghosts {
            warn!("removed ghost item {pid}, backing file no longer present on device");
        }

        let mut inserter = ItemInserter::load(&conn)
            .map_err(|err| MergeError::MergeFailed { step: "load item inserter", source: err.into() })?;

        let mut inserted_pids = Vec::with_capacity(to_insert.len());
        for item in &to_insert {
            let inserted = inserter
                .insert_song(&conn, item)
                .map_err(|err| MergeError::MergeFailed { step: "insert item", source: err.into() })?;

            if inserted.resurrected {
                outcome.items_resurrected += 1;
            } else {
                outcome.items_inserted += 1;
            }
            inserted_pids.push(inserted.item_pid);

            if !existing_filenames.contains(&inserted.remote_filename) {
                let bytes = std::fs::read(&item.local_path).map_err(|err| MergeError::MergeFailed {
                    step: "read local audio file",
                    source: err.into(),
                })?;
                let remote = layout.music_dir().join(&inserted.remote_filename);
                uploads.push((remote, bytes));
            }

            if let Some((_, relative_path, bytes)) = inserted.artwork_upload {
                let remote = layout.artwork_originals().join(relative_path);
                uploads.push((remote, bytes));
            }
        }

        outcome.entities_created = inserter.entities_queued();
        inserter
            .finalize_entities(&conn)
            .map_err(|err| MergeError::MergeFailed { step: "finalize entities", source: err.into() })?;

        if let Some(request) = &options.playlist {
            let container_pid = match request {
                PlaylistRequest::Create { name } => playlist::create(&conn, name, &inserted_pids)
                    .map_err(|err| MergeError::MergeFailed { step: "create playlist", source: err.into() })?,
                PlaylistRequest::Append { container_pid } => {
                    playlist::append(&conn, *container_pid, &inserted_pids)
                        .map_err(|err| MergeError::MergeFailed { step: "append playlist", source: err.into() })?;
                    *container_pid
                }
            };
            outcome.playlist_container_pid = Some(container_pid);
        }
    }

    if options.dry_run {
        info!("dry run: skipping upload and swap");
        return Ok(outcome);
    }

    finalize_and_swap(adapter, catalog, &paths, uploads)?;

    Ok(outcome)
}

/// Run a ringtone merge (spec §4.8): as [`run_merge`] but against
/// `RingtoneInput`s, additionally maintaining the on-device
/// `Ringtones.plist` sidecar.
pub fn run_ringtone_merge<D: DeviceFileService>(
    adapter: &mut D,
    tones: &[RingtoneInput],
    config: &MergeConfig,
    options: &MergeOptions,
) -> Result<MergeOutcome, MergeError> {
    let layout = DeviceLayout::from_config(config);
    let (catalog, paths, is_fresh) = stage_and_open_catalog(adapter, config, &options.workdir)?;

    let quick_check = if is_fresh {
        None
    } else {
        let result = catalog
            .quick_check()
            .map_err(|err| MergeError::MergeFailed { step: "quick_check", source: err.into() })?;
        if result != "ok" {
            warn!("catalog quick_check reported a problem, continuing anyway: {result}");
        }
        Some(result)
    };

    let mut uploads: Vec<(PathBuf, Vec<u8>)> = Vec::new();
    let mut outcome = MergeOutcome {
        quick_check,
        dry_run: options.dry_run,
        ..Default::default()
    };

    let plist_bytes = adapter
        .try_read_file(&layout.tones_plist())
        .map_err(MergeError::Transport)?;
    let mut plist = match plist_bytes {
        Some(bytes) => {
            let text = String::from_utf8(bytes).map_err(|err| MergeError::MergeFailed {
                step: "decode ringtone plist",
                source: err.into(),
            })?;
            RingtonePlist::decode(&text)
                .map_err(|err| MergeError::MergeFailed { step: "decode ringtone plist", source: err.into() })?
        }
        None => RingtonePlist::new(),
    };

    {
        let conn = catalog.get_connection();
        let mut inserter = RingtoneInserter::load(&conn)
            .map_err(|err| MergeError::MergeFailed { step: "load ringtone inserter", source: err.into() })?;

        for tone in tones {
            let inserted = inserter
                .insert_tone(&conn, tone)
                .map_err(|err| MergeError::MergeFailed { step: "insert ringtone", source: err.into() })?;
            outcome.items_inserted += 1;

            plist.upsert(
                inserted.remote_filename.clone(),
                RingtonePlistEntry {
                    name: tone.title.clone(),
                    total_time_ms: tone
                        .duration_ms
                        .unwrap_or(crate::catalog::ringtone::DEFAULT_DURATION_MS),
                    pid: inserted.item_pid,
                    guid: crate::catalog::ids::random_id(),
                },
            );
        }
    }

    let plist_xml = plist
        .encode()
        .map_err(|err| MergeError::MergeFailed { step: "encode ringtone plist", source: err.into() })?;
    uploads.push((layout.tones_plist(), plist_xml.into_bytes()));

    if options.dry_run {
        info!("dry run: skipping upload and swap");
        return Ok(outcome);
    }

    finalize_and_swap(adapter, catalog, &paths, uploads)?;

    Ok(outcome)
}

/// Executable form of spec §8's testable properties, run over a merged
/// catalog. Returns human-readable violation messages; an empty vec
/// means every checked invariant held.
pub fn verify_invariants(
    conn: &rusqlite::Connection,
    existing_filenames: &HashSet<String>,
) -> Result<Vec<String>, CatalogError> {
    let mut violations = Vec::new();

    let name_orders: Vec<Integer> = conn
        .prepare("SELECT name_order FROM SortMap ORDER BY name_order")?
        .query_map([], |row| row.get(0))?
        .collect::<Result<_, _>>()?;
    let expected: Vec<Integer> = (1..=name_orders.len() as Integer).collect();
    if name_orders != expected {
        violations.push(format!(
            "SortMap.name_order is not a dense 1..=n sequence: {name_orders:?}"
        ));
    }

    let incomplete: Integer = conn.query_row(
        "SELECT COUNT(*) FROM Item
         WHERE NOT EXISTS (SELECT 1 FROM ItemExtra WHERE ItemExtra.item_pid = Item.item_pid)
            OR NOT EXISTS (SELECT 1 FROM ItemPlayback WHERE ItemPlayback.item_pid = Item.item_pid)
            OR NOT EXISTS (SELECT 1 FROM ItemStats WHERE ItemStats.item_pid = Item.item_pid)
            OR NOT EXISTS (
                SELECT 1 FROM ItemStore
                WHERE ItemStore.item_pid = Item.item_pid AND ItemStore.sync_id != 0 AND ItemStore.sync_in_my_library = 1
            )
            OR NOT EXISTS (SELECT 1 FROM ItemSearch WHERE ItemSearch.item_pid = Item.item_pid)
            OR NOT EXISTS (SELECT 1 FROM ItemVideo WHERE ItemVideo.item_pid = Item.item_pid)
            OR NOT EXISTS (SELECT 1 FROM Lyrics WHERE Lyrics.item_pid = Item.item_pid)
            OR NOT EXISTS (SELECT 1 FROM Chapter WHERE Chapter.item_pid = Item.item_pid)",
        [],
        |row| row.get(0),
    )?;
    if incomplete > 0 {
        violations.push(format!("{incomplete} item(s) missing required sidecar rows or not marked in-library"));
    }

    let mut stmt = conn.prepare(
        "SELECT ItemExtra.location FROM Item
         JOIN ItemExtra ON ItemExtra.item_pid = Item.item_pid
         WHERE Item.base_location_id = ?1",
    )?;
    let locations: Vec<String> = stmt
        .query_map((crate::catalog::item_insert::BASE_LOCATION_MUSIC,), |row| row.get(0))?
        .collect::<Result<_, _>>()?;
    drop(stmt);
    for location in locations {
        let basename = location.rsplit('/').next().unwrap_or(&location);
        if !existing_filenames.contains(basename) {
            violations.push(format!("ghost item still present: {location}"));
        }
    }

    let duplicate_best_tokens: Integer = conn.query_row(
        "SELECT COUNT(*) - COUNT(DISTINCT entity_pid || '/' || entity_type) FROM BestArtworkToken",
        [],
        |row| row.get(0),
    )?;
    if duplicate_best_tokens > 0 {
        violations.push(format!("{duplicate_best_tokens} duplicate BestArtworkToken rows"));
    }

    Ok(violations)
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;
    use std::collections::HashMap;
    use std::path::{Path, PathBuf};

    use pretty_assertions::assert_eq;

    use super::{MergeOptions, run_merge, verify_invariants};
    use crate::adapter::{DeviceFileHandle, DeviceFileService};
    use crate::config::MergeConfig;
    use crate::error::AdapterError;
    use crate::input::InputItem;

    /// An in-memory stand-in device, for orchestrator tests that would
    /// otherwise need a real paired device. The `cli` crate's
    /// filesystem-backed adapter covers the on-disk-shape contract; this
    /// one only needs to satisfy the trait.
    #[derive(Default)]
    struct FakeDevice {
        files: RefCell<HashMap<PathBuf, Vec<u8>>>,
    }

    struct FakeHandle {
        path: PathBuf,
        pending_write: Option<Vec<u8>>,
    }
    impl DeviceFileHandle for FakeHandle {}

    impl DeviceFileService for FakeDevice {
        type Handle = FakeHandle;

        fn list(&mut self, path: &Path) -> Result<Vec<String>, AdapterError> {
            let prefix = path.to_path_buf();
            Ok(self
                .files
                .borrow()
                .keys()
                .filter_map(|p| p.strip_prefix(&prefix).ok())
                .filter_map(|rel| rel.file_name())
                .map(|name| name.to_string_lossy().to_string())
                .collect())
        }

        fn make_dir(&mut self, _path: &Path) -> Result<(), AdapterError> {
            Ok(())
        }

        fn open_read(&mut self, path: &Path) -> Result<Self::Handle, AdapterError> {
            if self.files.borrow().contains_key(path) {
                Ok(FakeHandle { path: path.to_path_buf(), pending_write: None })
            } else {
                Err(AdapterError::NotFound(path.to_path_buf()))
            }
        }

        fn open_write(&mut self, path: &Path) -> Result<Self::Handle, AdapterError> {
            Ok(FakeHandle { path: path.to_path_buf(), pending_write: Some(Vec::new()) })
        }

        fn read_all(&mut self, handle: &mut Self::Handle) -> Result<Vec<u8>, AdapterError> {
            Ok(self.files.borrow().get(&handle.path).cloned().unwrap_or_default())
        }

        fn write_all(&mut self, handle: &mut Self::Handle, bytes: &[u8]) -> Result<(), AdapterError> {
            handle.pending_write.get_or_insert_with(Vec::new).extend_from_slice(bytes);
            Ok(())
        }

        fn close(&mut self, handle: Self::Handle) -> Result<(), AdapterError> {
            if let Some(bytes) = handle.pending_write {
                self.files.borrow_mut().insert(handle.path, bytes);
            }
            Ok(())
        }

        fn remove(&mut self, path: &Path) -> Result<(), AdapterError> {
            self.files.borrow_mut().remove(path);
            Ok(())
        }

        fn remove_tree(&mut self, path: &Path) -> Result<(), AdapterError> {
            let prefix = path.to_path_buf();
            self.files.borrow_mut().retain(|p, _| !p.starts_with(&prefix));
            Ok(())
        }

        fn rename(&mut self, src: &Path, dst: &Path) -> Result<(), AdapterError> {
            let bytes = self
                .files
                .borrow_mut()
                .remove(src)
                .ok_or_else(|| AdapterError::NotFound(src.to_path_buf()))?;
            self.files.borrow_mut().insert(dst.to_path_buf(), bytes);
            Ok(())
        }

        fn notify_sync_finished(&mut self) -> Result<(), AdapterError> {
            Ok(())
        }
    }

    fn sample_item(dir: &Path, remote_filename: &str) -> InputItem {
        let local_path = dir.join(remote_filename);
        std::fs::write(&local_path, b"fake audio bytes").unwrap();
        InputItem {
            local_path,
            title: "Hello".to_string(),
            artist: "Adele".to_string(),
            album: "25".to_string(),
            genre: "Pop".to_string(),
            year: Some(2015),
            duration_ms: 295_000,
            file_size: 17,
            remote_filename: remote_filename.to_string(),
            ..Default::default()
        }
    }

    #[test]
    fn fresh_merge_creates_catalog_and_uploads_audio() {
        let tmp = tempfile::tempdir().unwrap();
        let mut device = FakeDevice::default();
        let config = MergeConfig::default();
        let options = MergeOptions { workdir: tmp.path().join("work"), ..Default::default() };

        let items = vec![sample_item(tmp.path(), "ABCD.mp3")];
        let outcome = run_merge(&mut device, &items, &config, &options).unwrap();

        assert_eq!(outcome.items_inserted, 1);
        assert_eq!(outcome.items_resurrected, 0);
        assert!(!outcome.dry_run);

        let uploaded = device.files.borrow().contains_key(&PathBuf::from("iTunes_Control/Music/F00/ABCD.mp3"));
        assert!(uploaded);
        let live_catalog = device
            .files
            .borrow()
            .contains_key(&PathBuf::from("iTunes_Control/iTunes/MediaLibrary.sqlitedb"));
        assert!(live_catalog);
        let staging_gone = !device
            .files
            .borrow()
            .contains_key(&PathBuf::from("iTunes_Control/iTunes/MediaLibrary.sqlitedb.temp"));
        assert!(staging_gone);
    }

    #[test]
    fn unknown_unknown_items_are_skipped_by_default() {
        let tmp = tempfile::tempdir().unwrap();
        let mut device = FakeDevice::default();
        let config = MergeConfig::default();
        let options = MergeOptions { workdir: tmp.path().join("work"), ..Default::default() };

        let mut item = sample_item(tmp.path(), "ABCD.mp3");
        item.artist = String::new();
        item.album = String::new();

        let outcome = run_merge(&mut device, &[item], &config, &options).unwrap();
        assert_eq!(outcome.items_skipped_unknown, 1);
        assert_eq!(outcome.items_inserted, 0);
    }

    #[test]
    fn dry_run_skips_device_writes() {
        let tmp = tempfile::tempdir().unwrap();
        let mut device = FakeDevice::default();
        let config = MergeConfig::default();
        let options = MergeOptions { workdir: tmp.path().join("work"), dry_run: true, ..Default::default() };

        let items = vec![sample_item(tmp.path(), "ABCD.mp3")];
        let outcome = run_merge(&mut device, &items, &config, &options).unwrap();

        assert!(outcome.dry_run);
        assert_eq!(outcome.items_inserted, 1);
        assert!(device.files.borrow().is_empty());
    }

    #[test]
    fn merged_catalog_satisfies_invariants() {
        let tmp = tempfile::tempdir().unwrap();
        let mut device = FakeDevice::default();
        let config = MergeConfig::default();
        let options = MergeOptions { workdir: tmp.path().join("work"), ..Default::default() };

        let items = vec![sample_item(tmp.path(), "ABCD.mp3")];
        run_merge(&mut device, &items, &config, &options).unwrap();

        let conn = rusqlite::Connection::open(tmp.path().join("work").join("MediaLibrary.sqlitedb")).unwrap();
        let mut existing = std::collections::HashSet::new();
        existing.insert("ABCD.mp3".to_string());
        let violations = verify_invariants(&conn, &existing).unwrap();
        assert!(violations.is_empty(), "{violations:?}");
    }
}
