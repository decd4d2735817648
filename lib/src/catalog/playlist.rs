//! Playlist manager (spec §4.7): creates playlist containers and appends
//! ordered membership rows.

use rand::{RngCore, rngs::OsRng};
use rusqlite::{Connection, OptionalExtension};

use super::{Integer, ids, sort_map};
use crate::error::CatalogError;

pub const MEDIA_KIND_AUDIO: Integer = 8;

/// A playlist available for append, as enumerated by [`list_playlists`].
#[derive(Debug, Clone)]
pub struct PlaylistSummary {
    pub container_pid: Integer,
    pub name: String,
}

/// `SELECT name, container_pid FROM Container WHERE media_kind = 8 AND
/// distinguished_kind = 0 ORDER BY name` (spec §4.7).
pub fn list_playlists(conn: &Connection) -> Result<Vec<PlaylistSummary>, CatalogError> {
    let mut stmt = conn.prepare(
        "SELECT container_pid, name FROM Container
         WHERE media_kind = ?1 AND distinguished_kind = 0
         ORDER BY name",
    )?;
    let rows = stmt.query_map((MEDIA_KIND_AUDIO,), |row| {
        Ok(PlaylistSummary {
            container_pid: row.get(0)?,
            name: row.get(1)?,
        })
    })?;
    rows.collect::<Result<_, _>>().map_err(CatalogError::from)
}

fn random_uuid() -> String {
    let mut bytes = [0u8; 16];
    OsRng.fill_bytes(&mut bytes);
    // set RFC 4122 version 4 / variant bits so the text looks like a real UUID
    bytes[6] = (bytes[6] & 0x0F) | 0x40;
    bytes[8] = (bytes[8] & 0x3F) | 0x80;
    format!(
        "{:02X}{:02X}{:02X}{:02X}-{:02X}{:02X}-{:02X}{:02X}-{:02X}{:02X}-{:02X}{:02X}{:02X}{:02X}{:02X}{:02X}",
        bytes[0], bytes[1], bytes[2], bytes[3],
        bytes[4], bytes[5],
        bytes[6], bytes[7],
        bytes[8], bytes[9],
        bytes[10], bytes[11], bytes[12], bytes[13], bytes[14], bytes[15],
    )
}

fn next_container_id(conn: &Connection, exists_elsewhere: &[Integer]) -> Integer {
    ids::allocate_unique(|candidate| {
        exists_elsewhere.contains(&candidate)
            || conn
                .query_row(
                    "SELECT 1 FROM Container WHERE container_pid = ?1",
                    (candidate,),
                    |_| Ok(()),
                )
                .optional()
                .unwrap_or(None)
                .is_some()
    })
}

/// Create a new user playlist with `name`, inserting `item_pids` at
/// positions `0..item_pids.len()` (spec §4.7 "Create").
pub fn create(
    conn: &Connection,
    name: &str,
    item_pids: &[Integer],
) -> Result<Integer, CatalogError> {
    let name_order = sort_map::upsert(conn, name)?;
    let container_pid = next_container_id(conn, &[]);
    let now = chrono::Utc::now().timestamp();

    conn.execute(
        "INSERT INTO Container (
            container_pid, name, name_order, date_added, date_modified,
            media_kind, owner, editable, distinguished_kind
        ) VALUES (?1, ?2, ?3, ?4, ?4, ?5, 1, 1, 0)",
        (container_pid, name, name_order, now, MEDIA_KIND_AUDIO),
    )?;

    append_rows(conn, container_pid, item_pids, 0)?;

    Ok(container_pid)
}

/// Append `item_pids` to an existing playlist, after its current maximum
/// position (absent/NULL treated as -1, per spec §4.7 "Append").
pub fn append(
    conn: &Connection,
    container_pid: Integer,
    item_pids: &[Integer],
) -> Result<(), CatalogError> {
    let max_position: Option<Integer> = conn.query_row(
        "SELECT MAX(position) FROM ContainerItem WHERE container_pid = ?1",
        (container_pid,),
        |row| row.get(0),
    )?;
    let start = max_position.map_or(0, |p| p + 1);

    append_rows(conn, container_pid, item_pids, start)?;

    conn.execute(
        "UPDATE Container SET date_modified = ?1 WHERE container_pid = ?2",
        (chrono::Utc::now().timestamp(), container_pid),
    )?;

    Ok(())
}

fn append_rows(
    conn: &Connection,
    container_pid: Integer,
    item_pids: &[Integer],
    start_position: Integer,
) -> Result<(), CatalogError> {
    for (offset, item_pid) in item_pids.iter().enumerate() {
        let position = start_position + Integer::try_from(offset).unwrap_or(0);
        conn.execute(
            "INSERT INTO ContainerItem (container_pid, item_pid, position, item_uuid)
             VALUES (?1, ?2, ?3, ?4)",
            (container_pid, item_pid, position, random_uuid()),
        )?;
    }
    Ok(())
}
