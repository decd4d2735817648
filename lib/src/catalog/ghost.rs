//! Ghost reconciler (spec §4.6): removes catalog rows whose backing file
//! is no longer present under the device's music folder. Entity rows are
//! left alone — a dangling Artist/Album row is harmless without an Item
//! referencing it.

use std::collections::HashSet;

use rusqlite::Connection;

use super::{Integer, item_insert::BASE_LOCATION_MUSIC};
use crate::error::CatalogError;

const PER_ITEM_TABLES: &[&str] = &[
    "ItemExtra",
    "ItemStore",
    "ItemStats",
    "ItemPlayback",
    "ItemSearch",
    "ItemVideo",
    "Lyrics",
    "Chapter",
];

/// Delete every Item (and its per-item sidecar rows) under the music base
/// location whose `ItemExtra.location` basename is not present in
/// `existing_filenames`. Returns the deleted item ids.
pub fn reconcile(
    conn: &Connection,
    existing_filenames: &HashSet<String>,
) -> Result<Vec<Integer>, CatalogError> {
    let mut stmt = conn.prepare(
        "SELECT Item.item_pid, ItemExtra.location
         FROM Item JOIN ItemExtra ON ItemExtra.item_pid = Item.item_pid
         WHERE Item.base_location_id = ?1",
    )?;
    let rows = stmt.query_map((BASE_LOCATION_MUSIC,), |row| {
        let pid: Integer = row.get(0)?;
        let location: String = row.get(1)?;
        Ok((pid, location))
    })?;

    let mut ghosts = Vec::new();
    for row in rows {
        let (pid, location) = row?;
        let basename = location.rsplit('/').next().unwrap_or(&location);
        if !existing_filenames.contains(basename) {
            ghosts.push(pid);
        }
    }
    drop(stmt);

    for pid in &ghosts {
        for table in PER_ITEM_TABLES {
            conn.execute(
                &format!("DELETE FROM {table} WHERE item_pid = ?1"),
                (*pid,),
            )?;
        }
        conn.execute("DELETE FROM Item WHERE item_pid = ?1", (*pid,))?;
    }

    Ok(ghosts)
}
