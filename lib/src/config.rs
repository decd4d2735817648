//! Merge configuration (spec §4.9, §7 thresholds): a small `figment` +
//! `toml`-backed settings struct plus a CLI-overwrite overlay, grounded on
//! `config/server_overlay.rs` (`ServerOverlay`) and
//! `config/v2/server/config_extra.rs` (`Figment::new().merge(Toml::file(..))`),
//! without that file's version-migration machinery: this tool has no prior
//! on-disk config format to migrate from.

use std::path::{Path, PathBuf};

use figment::{
    providers::{Format, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};

use crate::utils::get_app_config_path;

/// The filename of the merge config, resolved under the OS config dir.
pub const FILE_NAME: &str = "config.toml";

/// Tunables for the merge orchestrator. Every field has a default matching
/// the literal values spec.md calls out, so an absent config file is
/// equivalent to the spec's own defaults.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MergeConfig {
    /// Below this many bytes a downloaded catalog is treated as not worth
    /// trusting, and a fresh one is created instead (spec §4.9 step 4).
    pub valid_catalog_min_bytes: u64,
    /// Device-relative directory audio files are uploaded under.
    pub music_base_path: String,
    /// Device-relative directory tone files are uploaded under.
    pub tones_base_path: String,
    /// Device-relative directory artwork blobs are uploaded under.
    pub artwork_base_path: String,
    /// Skip items whose artist AND album are both "Unknown" in batch
    /// inserts, to avoid artwork cross-contamination (spec §4.9 step 3).
    pub skip_unknown_unknown: bool,
}

impl Default for MergeConfig {
    fn default() -> Self {
        Self {
            valid_catalog_min_bytes: 10_000,
            music_base_path: "iTunes_Control/Music/F00".to_string(),
            tones_base_path: "iTunes_Control/Ringtones".to_string(),
            artwork_base_path: "iTunes_Control/iTunes/Artwork/Originals".to_string(),
            skip_unknown_unknown: true,
        }
    }
}

impl MergeConfig {
    /// Load from a TOML file, falling back to defaults if it does not
    /// exist. Unlike the teacher's server config this never *writes* a
    /// default file back to disk — there is no "first run" UX here to
    /// seed.
    pub fn from_file(path: &Path) -> anyhow::Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let config: Self = Figment::new().merge(Toml::file(path)).extract()?;
        Ok(config)
    }

    /// Load from `<os config dir>/media-catalog-merger/config.toml`.
    pub fn from_app_dir() -> anyhow::Result<Self> {
        let path = get_app_config_path()?.join(FILE_NAME);
        Self::from_file(&path)
    }
}

/// The config to use for one run, with possible CLI overwrites layered on
/// top — the same overlay shape as `ServerOverlay`: saved settings plus
/// overwrites that are never persisted back to the saved file.
#[derive(Debug, Clone, Default)]
pub struct MergeConfigOverlay {
    pub settings: MergeConfig,
    /// Overwrite the local scratch directory the orchestrator stages the
    /// catalog file in before opening it with `rusqlite`.
    pub workdir_overwrite: Option<PathBuf>,
    /// Overwrite `valid_catalog_min_bytes`, mainly useful for tests that
    /// want to exercise the "fresh catalog" path with a tiny fixture.
    pub valid_catalog_min_bytes_overwrite: Option<u64>,
}

impl MergeConfigOverlay {
    #[must_use]
    pub fn workdir(&self) -> PathBuf {
        self.workdir_overwrite
            .clone()
            .unwrap_or_else(std::env::temp_dir)
    }

    #[must_use]
    pub fn valid_catalog_min_bytes(&self) -> u64 {
        self.valid_catalog_min_bytes_overwrite
            .unwrap_or(self.settings.valid_catalog_min_bytes)
    }
}
