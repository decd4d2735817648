#![forbid(unsafe_code)]
#![warn(clippy::all, clippy::correctness)]
#![warn(rust_2018_idioms)]
#![warn(clippy::pedantic)]
#![allow(clippy::missing_errors_doc, clippy::must_use_candidate)]

//! Core merge engine for injecting user-supplied songs, ringtones and
//! playlists into a device-resident media catalog without the vendor's
//! sync client.
//!
//! This crate owns the SQLite-side merge (schema, entity resolution,
//! row insertion, ghost cleanup, playlist membership, artwork linkage)
//! and the end-to-end orchestration of a merge against a device reached
//! through the [`adapter::DeviceFileService`] trait. It does not parse
//! audio tags, decode artwork, or speak to the device transport itself;
//! those are external collaborators (see crate-level docs in the repo's
//! `SPEC_FULL.md`).

pub mod adapter;
pub mod catalog;
pub mod config;
pub mod error;
pub mod input;
pub mod orchestrator;
pub mod ringtone_plist;
pub mod utils;

pub const VERSION: &str = env!("CARGO_PKG_VERSION");

#[macro_use]
extern crate log;
