#![allow(clippy::unnecessary_debug_formatting)]

use std::{fmt::Debug, path::Path, sync::Arc};

use parking_lot::{Mutex, MutexGuard};
use rusqlite::Connection;

use crate::error::CatalogError;

/// Sqlite / rusqlite integer type alias.
///
/// This alias exists to keep it in one place and because rusqlite does not
/// export such a type.
pub type Integer = i64;

pub mod artwork;
pub mod ghost;
pub mod ids;
pub mod item_insert;
pub mod playlist;
pub mod resolver;
pub mod ringtone;
pub mod schema;
pub mod sort_key;
pub mod sort_map;

/// A single open catalog connection.
///
/// This *can* be shared between threads via `clone`, **but** only one
/// operation may occur at a time — the merge orchestrator runs on a single
/// worker (spec §5), so no semaphore or scheduling is needed here, unlike
/// a scanner serving concurrent callers.
#[derive(Clone)]
pub struct Catalog {
    conn: Arc<Mutex<Connection>>,
}

impl Debug for Catalog {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Catalog")
            .field("conn", &"<unavailable>")
            .finish()
    }
}

impl Catalog {
    /// Open a catalog file downloaded from the device as-is: no schema is
    /// applied (spec §4.9 step 4 — an existing vendor catalog must not be
    /// altered beyond the rows the merge itself writes).
    pub fn open_existing(path: &Path) -> Result<Self, CatalogError> {
        let conn = Connection::open(path).map_err(CatalogError::Open)?;
        Ok(Self::from_connection(conn))
    }

    /// Create a brand-new catalog at `path`, applying the full schema
    /// (spec §4.9 step 5).
    pub fn create_fresh(path: &Path) -> Result<Self, CatalogError> {
        let conn = Connection::open(path).map_err(CatalogError::Open)?;
        schema::create_fresh(&conn)?;
        Ok(Self::from_connection(conn))
    }

    fn from_connection(conn: Connection) -> Self {
        Self {
            conn: Arc::new(Mutex::new(conn)),
        }
    }

    /// Get a lock to the underlying connection to start operations.
    pub fn get_connection(&self) -> MutexGuard<'_, Connection> {
        self.conn.lock()
    }

    pub fn quick_check(&self) -> Result<String, CatalogError> {
        schema::quick_check(&self.conn.lock())
    }

    pub fn check_compatible(&self) -> Result<(), CatalogError> {
        schema::check_compatible(&self.conn.lock())
    }

    pub fn checkpoint_truncate(&self) -> Result<(), CatalogError> {
        schema::checkpoint_truncate(&self.conn.lock())
    }

    pub fn finalize_for_upload(&self) -> Result<(), CatalogError> {
        schema::finalize_for_upload(&self.conn.lock())
    }
}
