//! Artwork linkage (spec §3, §4.5 step 5): derives the on-device relative
//! path for an artwork token and writes the `Artwork` / `ArtworkToken` /
//! `BestArtworkToken` rows tying it to an item, its album, and its artist.

use std::collections::HashSet;

use rusqlite::Connection;
use sha1::{Digest, Sha1};

use super::Integer;
use crate::error::CatalogError;

/// `ArtworkToken.entity_type` values (spec §3): item, album (primary),
/// artist, and a second album linkage some consumer views expect
/// alongside the primary one.
pub const ENTITY_TYPE_ITEM: Integer = 0;
pub const ENTITY_TYPE_ALBUM: Integer = 1;
pub const ENTITY_TYPE_ARTIST: Integer = 2;
pub const ENTITY_TYPE_ALBUM_ALT: Integer = 4;

/// Derive `path = SHA1(token).hexlower`, split into a two-character folder
/// and the remaining file name, joined as `"<folder>/<file>"`.
#[must_use]
pub fn relative_path_for_token(token: &str) -> String {
    let digest = Sha1::digest(token.as_bytes());
    let hex = hex::encode(digest);
    let (folder, file) = hex.split_at(2);
    format!("{folder}/{file}")
}

/// Build the numeric artwork token for the `trackIndex`-th item carrying
/// artwork in this merge (spec §9: numeric tokens, not content hashes).
#[must_use]
pub fn token_for_track(track_index: u64) -> String {
    format!("100{track_index}")
}

/// Tracks which albums have already received their artwork linkage so a
/// batch of items from the same album doesn't duplicate album-level rows
/// (spec invariant 4, "Artwork uniqueness").
#[derive(Default)]
pub struct AlbumArtworkGuard {
    seen: HashSet<Integer>,
}

impl AlbumArtworkGuard {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn mark_if_new(&mut self, album_pid: Integer) -> bool {
        self.seen.insert(album_pid)
    }
}

/// Write one item's artwork linkage: the `Artwork` row, three (or four)
/// `ArtworkToken` rows, and the `BestArtworkToken` rows for item, album
/// (first time only), and artist. Returns the relative device path the
/// image bytes must be uploaded to.
pub fn link_artwork(
    conn: &Connection,
    token: &str,
    item_pid: Integer,
    album_pid: Integer,
    artist_pid: Integer,
    album_guard: &mut AlbumArtworkGuard,
) -> Result<String, CatalogError> {
    let relative_path = relative_path_for_token(token);

    conn.execute(
        "INSERT OR IGNORE INTO Artwork (token, relative_path) VALUES (?1, ?2)",
        (token, &relative_path),
    )?;

    insert_token(conn, item_pid, ENTITY_TYPE_ITEM, token)?;
    insert_best(conn, item_pid, ENTITY_TYPE_ITEM, token)?;

    let album_is_new = album_guard.mark_if_new(album_pid);
    if album_is_new {
        insert_token(conn, album_pid, ENTITY_TYPE_ALBUM, token)?;
        insert_token(conn, album_pid, ENTITY_TYPE_ALBUM_ALT, token)?;
        insert_best(conn, album_pid, ENTITY_TYPE_ALBUM, token)?;
    }

    insert_token(conn, artist_pid, ENTITY_TYPE_ARTIST, token)?;
    insert_best(conn, artist_pid, ENTITY_TYPE_ARTIST, token)?;

    Ok(relative_path)
}

fn insert_token(
    conn: &Connection,
    entity_pid: Integer,
    entity_type: Integer,
    token: &str,
) -> Result<(), CatalogError> {
    conn.execute(
        "INSERT OR IGNORE INTO ArtworkToken (entity_pid, entity_type, token) VALUES (?1, ?2, ?3)",
        (entity_pid, entity_type, token),
    )?;
    Ok(())
}

fn insert_best(
    conn: &Connection,
    entity_pid: Integer,
    entity_type: Integer,
    token: &str,
) -> Result<(), CatalogError> {
    conn.execute(
        "INSERT OR REPLACE INTO BestArtworkToken (entity_pid, entity_type, token) VALUES (?1, ?2, ?3)",
        (entity_pid, entity_type, token),
    )?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::{AlbumArtworkGuard, link_artwork, relative_path_for_token, token_for_track};
    use crate::catalog::schema::create_fresh;

    fn conn() -> rusqlite::Connection {
        let conn = rusqlite::Connection::open_in_memory().unwrap();
        create_fresh(&conn).unwrap();
        conn
    }

    #[test]
    fn token_for_track_is_prefixed_numeric() {
        assert_eq!(token_for_track(0), "1000");
        assert_eq!(token_for_track(7), "1007");
    }

    #[test]
    fn relative_path_splits_hex_digest_two_and_rest() {
        let path = relative_path_for_token("1000");
        let (folder, file) = path.split_once('/').unwrap();
        assert_eq!(folder.len(), 2);
        assert_eq!(file.len(), 38);
        assert!(path.chars().all(|c| c.is_ascii_hexdigit() || c == '/'));
    }

    #[test]
    fn relative_path_is_deterministic() {
        assert_eq!(relative_path_for_token("abc"), relative_path_for_token("abc"));
    }

    #[test]
    fn link_artwork_writes_item_album_artist_and_best_rows() {
        let conn = conn();
        let mut guard = AlbumArtworkGuard::new();

        let path = link_artwork(&conn, "1000", 1, 10, 100, &mut guard).unwrap();
        assert_eq!(path, relative_path_for_token("1000"));

        let token_count: i64 = conn
            .query_row("SELECT COUNT(*) FROM ArtworkToken", [], |r| r.get(0))
            .unwrap();
        assert_eq!(token_count, 4); // item + album + album-alt + artist

        let best_count: i64 = conn
            .query_row("SELECT COUNT(*) FROM BestArtworkToken", [], |r| r.get(0))
            .unwrap();
        assert_eq!(best_count, 3); // item + album + artist
    }

    #[test]
    fn second_item_in_same_album_does_not_duplicate_album_rows() {
        let conn = conn();
        let mut guard = AlbumArtworkGuard::new();

        link_artwork(&conn, "1000", 1, 10, 100, &mut guard).unwrap();
        link_artwork(&conn, "1001", 2, 10, 100, &mut guard).unwrap();

        let album_best: i64 = conn
            .query_row(
                "SELECT COUNT(*) FROM BestArtworkToken WHERE entity_pid = 10 AND entity_type = 1",
                [],
                |r| r.get(0),
            )
            .unwrap();
        assert_eq!(album_best, 1);
    }
}
