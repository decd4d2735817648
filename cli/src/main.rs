mod cli;
mod local_adapter;
mod logger;

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::Parser;
use media_catalog_merger::catalog::ringtone::RingtoneInput;
use media_catalog_merger::config::{MergeConfig, MergeConfigOverlay};
use media_catalog_merger::input::InputItem;
use media_catalog_merger::orchestrator::{self, MergeOptions, PlaylistRequest};
use serde::Deserialize;

use cli::{Action, Args};
use local_adapter::LocalDeviceAdapter;

#[macro_use]
extern crate log;

fn main() -> Result<()> {
    if let Err(err) = actual_main() {
        error!("Error: {err:?}");
        return Err(err);
    }
    Ok(())
}

fn actual_main() -> Result<()> {
    let args = Args::parse();
    let _handle = logger::setup(&args);

    let overlay = load_config(&args)?;

    match &args.action {
        Action::MergeSongs {
            device_root,
            manifest,
            create_playlist,
            append_playlist,
            dry_run,
        } => merge_songs(
            device_root,
            manifest,
            create_playlist.clone(),
            *append_playlist,
            *dry_run,
            &overlay,
        ),
        Action::MergeRingtones { device_root, manifest, dry_run } => {
            merge_ringtones(device_root, manifest, *dry_run, &overlay)
        }
        Action::ListPlaylists { device_root } => list_playlists(device_root),
    }
}

fn load_config(args: &Args) -> Result<MergeConfigOverlay> {
    let settings = match &args.config_file {
        Some(path) => MergeConfig::from_file(path)?,
        None => MergeConfig::from_app_dir()?,
    };

    Ok(MergeConfigOverlay {
        settings,
        workdir_overwrite: None,
        valid_catalog_min_bytes_overwrite: args.valid_catalog_min_bytes,
    })
}

/// One entry of a songs manifest, the stand-in for the tag-parsing
/// collaborator this crate does not itself implement (spec §1 non-goals).
#[derive(Debug, Deserialize)]
struct ManifestItem {
    local_path: PathBuf,
    title: String,
    artist: String,
    album: String,
    album_artist: Option<String>,
    genre: String,
    year: Option<i64>,
    duration_ms: i64,
    remote_filename: String,
    artwork_path: Option<PathBuf>,
    track_number: Option<i64>,
    track_count: Option<i64>,
    disc_number: Option<i64>,
    disc_count: Option<i64>,
    lyrics: Option<String>,
}

#[derive(Debug, Deserialize)]
struct SongsManifest {
    #[serde(default)]
    items: Vec<ManifestItem>,
}

#[derive(Debug, Deserialize)]
struct RingtoneManifestItem {
    local_path: PathBuf,
    title: String,
    remote_filename: String,
    duration_ms: Option<i64>,
}

#[derive(Debug, Deserialize)]
struct RingtonesManifest {
    #[serde(default)]
    items: Vec<RingtoneManifestItem>,
}

fn read_manifest<T: for<'de> Deserialize<'de>>(path: &Path) -> Result<T> {
    let text = std::fs::read_to_string(path).with_context(|| format!("reading manifest {}", path.display()))?;
    toml::from_str(&text).with_context(|| format!("parsing manifest {}", path.display()))
}

fn load_items(manifest: &Path) -> Result<Vec<InputItem>> {
    let parsed: SongsManifest = read_manifest(manifest)?;
    parsed
        .items
        .into_iter()
        .map(|entry| {
            let artwork = entry
                .artwork_path
                .map(|path| std::fs::read(&path).with_context(|| format!("reading artwork {}", path.display())))
                .transpose()?;
            let file_size = std::fs::metadata(&entry.local_path)
                .with_context(|| format!("reading metadata for {}", entry.local_path.display()))?
                .len() as i64;

            Ok(InputItem {
                local_path: entry.local_path,
                title: entry.title,
                artist: entry.artist,
                album: entry.album,
                album_artist: entry.album_artist,
                genre: entry.genre,
                year: entry.year,
                duration_ms: entry.duration_ms,
                file_size,
                remote_filename: entry.remote_filename,
                artwork,
                track_number: entry.track_number,
                track_count: entry.track_count,
                disc_number: entry.disc_number,
                disc_count: entry.disc_count,
                lyrics: entry.lyrics,
            })
        })
        .collect()
}

fn load_ringtones(manifest: &Path) -> Result<Vec<RingtoneInput>> {
    let parsed: RingtonesManifest = read_manifest(manifest)?;
    parsed
        .items
        .into_iter()
        .map(|entry| {
            let file_size = std::fs::metadata(&entry.local_path)
                .with_context(|| format!("reading metadata for {}", entry.local_path.display()))?
                .len() as i64;
            Ok(RingtoneInput {
                title: entry.title,
                remote_filename: entry.remote_filename,
                file_size,
                duration_ms: entry.duration_ms,
            })
        })
        .collect()
}

fn merge_songs(
    device_root: &Path,
    manifest: &Path,
    create_playlist: Option<String>,
    append_playlist: Option<i64>,
    dry_run: bool,
    overlay: &MergeConfigOverlay,
) -> Result<()> {
    let items = load_items(manifest)?;
    info!("merging {} item(s) into {}", items.len(), device_root.display());

    let mut adapter = LocalDeviceAdapter::new(device_root.to_path_buf());
    let playlist = match (create_playlist, append_playlist) {
        (Some(name), _) => Some(PlaylistRequest::Create { name }),
        (None, Some(container_pid)) => Some(PlaylistRequest::Append { container_pid }),
        (None, None) => None,
    };

    let options = MergeOptions { workdir: overlay.workdir(), dry_run, playlist };
    let mut config = overlay.settings.clone();
    config.valid_catalog_min_bytes = overlay.valid_catalog_min_bytes();

    let outcome = orchestrator::run_merge(&mut adapter, &items, &config, &options)?;
    report(&outcome);
    Ok(())
}

fn merge_ringtones(device_root: &Path, manifest: &Path, dry_run: bool, overlay: &MergeConfigOverlay) -> Result<()> {
    let tones = load_ringtones(manifest)?;
    info!("merging {} ringtone(s) into {}", tones.len(), device_root.display());

    let mut adapter = LocalDeviceAdapter::new(device_root.to_path_buf());
    let options = MergeOptions { workdir: overlay.workdir(), dry_run, playlist: None };
    let mut config = overlay.settings.clone();
    config.valid_catalog_min_bytes = overlay.valid_catalog_min_bytes();

    let outcome = orchestrator::run_ringtone_merge(&mut adapter, &tones, &config, &options)?;
    report(&outcome);
    Ok(())
}

fn list_playlists(device_root: &Path) -> Result<()> {
    let catalog_path = device_root.join(media_catalog_merger::adapter::DeviceLayout::catalog());
    let catalog = media_catalog_merger::catalog::Catalog::open_existing(&catalog_path)
        .with_context(|| format!("opening catalog at {}", catalog_path.display()))?;
    let conn = catalog.get_connection();
    let playlists = media_catalog_merger::catalog::playlist::list_playlists(&conn)?;
    drop(conn);

    for playlist in playlists {
        println!("{}\t{}", playlist.container_pid, playlist.name);
    }
    Ok(())
}

fn report(outcome: &media_catalog_merger::orchestrator::MergeOutcome) {
    info!(
        "merge complete: {} inserted, {} resurrected, {} skipped (unknown/unknown), {} ghosts removed, {} entities created, dry_run={}",
        outcome.items_inserted,
        outcome.items_resurrected,
        outcome.items_skipped_unknown,
        outcome.ghosts_removed,
        outcome.entities_created,
        outcome.dry_run,
    );
    if let Some(quick_check) = &outcome.quick_check {
        if quick_check != "ok" {
            warn!("catalog quick_check: {quick_check}");
        }
    }
    if let Some(container_pid) = outcome.playlist_container_pid {
        info!("playlist container id: {container_pid}");
    }
}
