//! Catalog schema (spec §4.3): table/index/trigger/seed-row declaration,
//! plus the `user_version` and `quick_check` housekeeping the orchestrator
//! needs around a downloaded catalog.

use rusqlite::Connection;

use crate::error::CatalogError;

/// The `user_version` the consumer application expects (spec §4.3).
///
/// This is not "our" schema revision counter the way a migration-based
/// app would use it (compare `new_database::migrate::DB_VERSION` in the
/// teacher this module is grounded on) — it is a fixed value the
/// consumer checks, so it is never incremented here.
pub const USER_VERSION: u32 = 2_320_030;

/// Read `user_version` with a single query.
fn get_user_version(conn: &Connection) -> Result<u32, CatalogError> {
    conn.query_row("SELECT user_version FROM pragma_user_version", [], |r| {
        r.get(0)
    })
    .map_err(CatalogError::from)
}

fn set_user_version(conn: &Connection, version: u32) -> Result<(), CatalogError> {
    conn.pragma_update(None, "user_version", version)?;
    Ok(())
}

/// Create the full schema (tables, indices, trigger, seed rows) on a
/// brand-new, empty catalog (spec §4.9 step 5).
///
/// Only ever call this on a catalog this crate is creating from scratch.
/// A downloaded catalog that already validates (spec §4.9 step 4) is
/// merged into as-is: its schema is the consumer application's, and this
/// crate must not alter it beyond the rows the merge itself writes.
pub fn create_fresh(conn: &Connection) -> Result<(), CatalogError> {
    conn.pragma_update(None, "encoding", "UTF-8")?;
    conn.pragma_update(None, "journal_mode", "DELETE")?;

    conn.execute_batch(include_str!("schema_sql/001_schema.sql"))
        .map_err(CatalogError::Migration)?;

    set_user_version(conn, USER_VERSION)?;

    Ok(())
}

/// Verify a downloaded catalog is at least structurally plausible before
/// trusting it with a merge: its `user_version` must not be from a
/// *newer* schema generation than this crate understands.
pub fn check_compatible(conn: &Connection) -> Result<(), CatalogError> {
    let found = get_user_version(conn)?;

    // version 0 means "freshly-opened empty file", which step 4's size
    // threshold should already have ruled out, but guard anyway.
    if found > USER_VERSION {
        return Err(CatalogError::SchemaTooNew {
            found,
            expected: USER_VERSION,
        });
    }

    Ok(())
}

/// Run `PRAGMA quick_check` and return its (possibly multi-row) result
/// joined as a single string, e.g. `"ok"` when healthy.
///
/// Per spec §7, a non-`"ok"` result here is logged but does not abort the
/// merge; the caller decides what to do with the returned string.
pub fn quick_check(conn: &Connection) -> Result<String, CatalogError> {
    let mut stmt = conn.prepare("PRAGMA quick_check")?;
    let rows: Vec<String> = stmt
        .query_map([], |row| row.get(0))?
        .collect::<Result<_, _>>()?;

    Ok(rows.join("; "))
}

/// Run a `TRUNCATE` WAL checkpoint, materializing any pending WAL writes
/// into the main database file (spec §4.9 step 4 and §9 "WAL semantics").
pub fn checkpoint_truncate(conn: &Connection) -> Result<(), CatalogError> {
    conn.execute_batch("PRAGMA wal_checkpoint(TRUNCATE)")?;
    Ok(())
}

/// Finalize a catalog before upload (spec §4.9 step 7): checkpoint any
/// remaining WAL frames and force `journal_mode = DELETE` so no WAL/SHM
/// sidecar needs to travel with the uploaded file.
pub fn finalize_for_upload(conn: &Connection) -> Result<(), CatalogError> {
    checkpoint_truncate(conn)?;
    conn.pragma_update(None, "journal_mode", "DELETE")?;
    Ok(())
}
