/**
 * MIT License
 *
 * termusic - Copyright (c) 2021 Larry Hao
 *
 * Permission is hereby granted, free of charge, to any person obtaining a copy
 * of this software and associated documentation files (the "Software"), to deal
 * in the Software without restriction, including without limitation the rights
 * to use, copy, modify, merge, publish, distribute, sublicense, and/or sell
 * copies of the Software, and to permit persons to whom the Software is
 * furnished to do so, subject to the following conditions:
 *
 * The above copyright notice and this permission notice shall be included in all
 * copies or substantial portions of the Software.
 *
 * THE SOFTWARE IS PROVIDED "AS IS", WITHOUT WARRANTY OF ANY KIND, EXPRESS OR
 * IMPLIED, INCLUDING BUT NOT LIMITED TO THE WARRANTIES OF MERCHANTABILITY,
 * FITNESS FOR A PARTICULAR PURPOSE AND NONINFRINGEMENT. IN NO EVENT SHALL THE
 * AUTHORS OR COPYRIGHT HOLDERS BE LIABLE FOR ANY CLAIM, DAMAGES OR OTHER
 * LIABILITY, WHETHER IN AN ACTION OF CONTRACT, TORT OR OTHERWISE, ARISING FROM,
 * OUT OF OR IN CONNECTION WITH THE SOFTWARE OR THE USE OR OTHER DEALINGS IN THE
 * SOFTWARE.
 */
use std::path::PathBuf;

use clap::{ArgAction, Parser, Subcommand, builder::ArgPredicate};

#[derive(Parser, Debug)]
// mostly read from `Cargo.toml`
#[clap(name = "catalog-merge", author, version, about, long_about = None)]
pub struct Args {
    /// What to do against the device's media catalog.
    #[command(subcommand)]
    pub action: Action,
    /// Path to an optional `config.toml`, see `MergeConfig`.
    /// Default is `~/.config/media-catalog-merger/config.toml`.
    #[arg(long, env = "CATALOG_MERGE_CONFIG")]
    pub config_file: Option<PathBuf>,
    /// Overwrite `valid_catalog_min_bytes` from the saved config.
    #[arg(long)]
    pub valid_catalog_min_bytes: Option<u64>,
    #[clap(flatten)]
    pub log_options: LogOptions,
}

/// Subcommands for the binary.
#[derive(Subcommand, Debug)]
pub enum Action {
    /// Merge songs from a manifest file into the catalog under `device_root`.
    MergeSongs {
        /// Root of a local directory tree shaped like the device's
        /// `iTunes_Control`/`iTunes` layout.
        #[arg(value_name = "DEVICE_ROOT")]
        device_root: PathBuf,
        /// TOML manifest describing the items to merge.
        #[arg(value_name = "MANIFEST")]
        manifest: PathBuf,
        /// Create a new playlist from the merged items.
        #[arg(long, conflicts_with = "append_playlist")]
        create_playlist: Option<String>,
        /// Append the merged items to an existing playlist container id.
        #[arg(long)]
        append_playlist: Option<i64>,
        /// Resolve and insert but never upload or swap anything on disk.
        #[arg(long)]
        dry_run: bool,
    },
    /// Merge ringtones from a manifest file into the catalog under `device_root`.
    MergeRingtones {
        #[arg(value_name = "DEVICE_ROOT")]
        device_root: PathBuf,
        #[arg(value_name = "MANIFEST")]
        manifest: PathBuf,
        #[arg(long)]
        dry_run: bool,
    },
    /// List user playlists already present in the catalog under `device_root`.
    ListPlaylists {
        #[arg(value_name = "DEVICE_ROOT")]
        device_root: PathBuf,
    },
}

const DEFAULT_LOGFILE_FILENAME: &str = "catalog-merge.log";

#[derive(Debug, Parser, Clone, PartialEq)]
pub struct LogOptions {
    /// Enable logging to a file,
    /// automatically enabled if "log-file" is manually set
    #[arg(
        long = "log-to-file",
        env = "CATALOG_MERGE_LOGTOFILE",
        // automatically enable "log-to-file" if "log-file" is set, unless explicitly told not to
        default_value_if("log_file", ArgPredicate::IsPresent, "true"),
        action = ArgAction::Set,
        default_value_t = true,
        // somehow clap has this option not properly supported in derive, so it needs to be a string
        default_missing_value = "true",
        num_args = 0..=1,
        require_equals = true,
    )]
    pub log_to_file: bool,

    /// Set logging file
    #[arg(long = "log-file", default_value_os_t = default_logfile_path(), env = "CATALOG_MERGE_LOGFILE")]
    pub log_file: PathBuf,

    /// Use colored logging for files
    /// Example: live tailing via `tail -f /logfile`
    #[arg(long = "log-filecolor", env = "CATALOG_MERGE_LOGFILE_COLOR")]
    pub file_color_log: bool,
}

fn default_logfile_path() -> PathBuf {
    std::env::temp_dir().join(DEFAULT_LOGFILE_FILENAME)
}
