//! Item inserter (spec §4.5): writes the multi-table row set for one
//! playable item — entity resolution, SortMap coverage, the Item row
//! family, and artwork linkage — then, once every item in the merge has
//! been processed, back-populates the entity rows the resolver queued.

use std::collections::{HashMap, HashSet};

use indoc::indoc;
use rusqlite::Connection;

use super::{Integer, artwork, ids, resolver::EntityResolver, sort_key, sort_map};
use crate::{error::CatalogError, input::InputItem};

pub const MEDIA_KIND_SONG: Integer = 8;
pub const MEDIA_KIND_TONE: Integer = 16_384;

pub const BASE_LOCATION_MUSIC: Integer = 3840;
pub const BASE_LOCATION_TONES: Integer = 3900;

const MUSIC_BASE_PATH: &str = "iTunes_Control/Music/F00";
const TONES_BASE_PATH: &str = "iTunes_Control/Ringtones";

/// Location-kind recorded on every item this crate writes: it never has
/// a real signature to offer, so it declares itself cloud-origin and
/// asks the consumer to skip strict local verification (spec §4.3, §7).
pub const LOCATION_KIND_CLOUD: Integer = 42;

/// `ItemPlayback.audio_format` for a given (lowercased) file extension,
/// per spec §8's literal mapping table. Unknown extensions default to
/// the mp3 code, matching how the orchestrator treats unrecognized tags.
#[must_use]
pub fn audio_format_for_extension(extension: &str) -> Integer {
    match extension {
        "flac" => fourcc(b"fLaC"),
        "m4a" | "aac" | "m4r" => fourcc(b"aac "),
        "alac" => fourcc(b"alac"),
        "wav" => fourcc(b"WAVE"),
        _ => 301,
    }
}

fn fourcc(code: &[u8; 4]) -> Integer {
    Integer::from(u32::from_be_bytes(*code))
}

/// `ItemExtra.integrity`: a deliberately non-forged value (spec §4.3, §9).
/// Songs and tones concatenate filename and base path in opposite order —
/// reproduced here bit-for-bit because the consumer's signature check is
/// bypassed only via `location_kind`, not by this value being correct.
#[must_use]
pub fn integrity_for_song(filename: &str) -> String {
    hex::encode(format!("{filename}{MUSIC_BASE_PATH}"))
}

#[must_use]
pub fn integrity_for_tone(filename: &str) -> String {
    hex::encode(format!("{TONES_BASE_PATH}/{filename}"))
}

/// What the orchestrator needs to finish uploading one inserted item.
#[derive(Debug, Clone)]
pub struct InsertedItem {
    pub item_pid: Integer,
    pub remote_filename: String,
    pub resurrected: bool,
    /// `(token, relative_path, image_bytes)` when the item carried artwork.
    pub artwork_upload: Option<(String, String, Vec<u8>)>,
}

/// Drives item insertion across a whole batch, preloading entity and
/// item-signature state once per merge, and finalizing entity rows once
/// the batch is done (spec §4.5, §9 "cyclic references").
pub struct ItemInserter {
    resolver: EntityResolver,
    /// `"title|artist|album"` -> existing item_pid, for resurrection (spec §4.4 step 5).
    signatures: HashMap<String, Integer>,
    item_ids_in_use: HashSet<Integer>,
    next_track_number: Integer,
    next_disc_number: Integer,
    artwork_guard: artwork::AlbumArtworkGuard,
    artwork_track_index: u64,
}

impl ItemInserter {
    pub fn load(conn: &Connection) -> Result<Self, CatalogError> {
        let resolver = EntityResolver::load(conn)?;

        let mut item_ids_in_use = HashSet::new();
        let mut signatures = HashMap::new();

        let mut stmt = conn.prepare(
            "SELECT Item.item_pid, ItemExtra.title, COALESCE(Artist.name, ''), COALESCE(Album.name, '')
             FROM Item
             JOIN ItemExtra ON ItemExtra.item_pid = Item.item_pid
             LEFT JOIN Artist ON Artist.artist_pid = Item.item_artist_pid
             LEFT JOIN Album ON Album.album_pid = Item.album_pid",
        )?;
        let rows = stmt.query_map([], |row| {
            let pid: Integer = row.get(0)?;
            let title: String = row.get(1)?;
            let artist: String = row.get(2)?;
            let album: String = row.get(3)?;
            Ok((pid, title, artist, album))
        })?;
        for row in rows {
            let (pid, title, artist, album) = row?;
            item_ids_in_use.insert(pid);
            signatures.insert(signature_key(&title, &artist, &album), pid);
        }

        Ok(Self {
            resolver,
            signatures,
            item_ids_in_use,
            next_track_number: 1,
            next_disc_number: 1,
            artwork_guard: artwork::AlbumArtworkGuard::new(),
            artwork_track_index: 0,
        })
    }

    fn allocate_item_id(&mut self) -> Integer {
        let id = ids::allocate_unique(|candidate| self.item_ids_in_use.contains(&candidate));
        self.item_ids_in_use.insert(id);
        id
    }

    /// Insert one song (spec §4.5). The caller is expected to have already
    /// dropped unknown/unknown items per spec §4.9 step 3.
    pub fn insert_song(
        &mut self,
        conn: &Connection,
        item: &InputItem,
    ) -> Result<InsertedItem, CatalogError> {
        self.insert(conn, item, MEDIA_KIND_SONG, BASE_LOCATION_MUSIC)
    }

    fn insert(
        &mut self,
        conn: &Connection,
        item: &InputItem,
        media_kind: Integer,
        base_location_id: Integer,
    ) -> Result<InsertedItem, CatalogError> {
        let item = item.clone().sanitized();
        let signature = signature_key(&item.title, &item.artist, &item.album);

        let (item_pid, resurrected) = match self.signatures.get(&signature) {
            Some(&existing) => (existing, true),
            None => (self.allocate_item_id(), false),
        };
        self.signatures.insert(signature, item_pid);

        let entities = self.resolver.resolve(
            &item.artist,
            &item.album,
            item.album_artist.as_deref(),
            &item.genre,
            item.year,
            item_pid,
        );

        let title_order = sort_map::upsert(conn, &item.title)?;
        let artist_order = sort_map::upsert(conn, &item.artist)?;
        let album_order = sort_map::upsert(conn, &item.album)?;
        sort_map::upsert(conn, &item.genre)?;
        let effective_album_artist = item.album_artist.clone().unwrap_or_else(|| item.artist.clone());
        sort_map::upsert(conn, &effective_album_artist)?;

        if resurrected {
            delete_per_item_rows(conn, item_pid)?;
        }

        let track_number = item.track_number.unwrap_or_else(|| {
            let n = self.next_track_number;
            self.next_track_number += 1;
            n
        });
        let disc_number = item.disc_number.unwrap_or_else(|| {
            let n = self.next_disc_number;
            self.next_disc_number += 1;
            n
        });
        let track_count = item.track_count.unwrap_or(1);
        let disc_count = item.disc_count.unwrap_or(1);

        let now = chrono::Utc::now().timestamp();
        let sync_id = ids::random_id();

        conn.execute(
            indoc! {"
                INSERT INTO Item (
                    item_pid, media_kind, item_artist_pid, album_pid, album_artist_pid, genre_pid,
                    title_order, item_artist_order, album_order, disc_number, disc_count,
                    track_number, track_count, base_location_id, in_library, is_compilation,
                    date_added, date_downloaded
                ) VALUES (
                    ?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, 0, 0, ?15, ?15
                )
            "},
            rusqlite::params![
                item_pid,
                media_kind,
                entities.artist_pid,
                entities.album_pid,
                entities.album_artist_pid,
                entities.genre_pid,
                title_order,
                artist_order,
                album_order,
                disc_number,
                disc_count,
                track_number,
                track_count,
                base_location_id,
                now,
            ],
        )?;

        let integrity = if base_location_id == BASE_LOCATION_TONES {
            integrity_for_tone(&item.remote_filename)
        } else {
            integrity_for_song(&item.remote_filename)
        };

        conn.execute(
            indoc! {"
                INSERT INTO ItemExtra (
                    item_pid, title, location, file_size, duration_ms, year,
                    location_kind, date_modified, integrity
                ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
            "},
            rusqlite::params![
                item_pid,
                item.title,
                item.remote_filename,
                item.file_size,
                item.duration_ms,
                item.year,
                LOCATION_KIND_CLOUD,
                now,
                integrity,
            ],
        )?;

        let extension = item.extension().unwrap_or_default();
        let audio_format = if base_location_id == BASE_LOCATION_TONES {
            fourcc(b"aac ")
        } else {
            audio_format_for_extension(&extension)
        };
        conn.execute(
            "INSERT INTO ItemPlayback (item_pid, audio_format, sample_rate, bit_rate) VALUES (?1, ?2, NULL, NULL)",
            (item_pid, audio_format),
        )?;

        conn.execute(
            "INSERT INTO ItemStats (item_pid, play_count, skip_count, last_played_date) VALUES (?1, 0, 0, NULL)",
            (item_pid,),
        )?;

        conn.execute(
            "INSERT INTO ItemStore (item_pid, sync_id, sync_in_my_library) VALUES (?1, ?2, 1)",
            (item_pid, sync_id),
        )?;

        conn.execute(
            "INSERT INTO ItemVideo (item_pid, has_video) VALUES (?1, 0)",
            (item_pid,),
        )?;

        conn.execute(
            "INSERT INTO ItemSearch (item_pid, title_order, item_artist_order, album_order) VALUES (?1, ?2, ?3, ?4)",
            (item_pid, title_order, artist_order, album_order),
        )?;

        conn.execute(
            "INSERT INTO Lyrics (item_pid, lyrics) VALUES (?1, ?2)",
            (item_pid, item.lyrics.clone()),
        )?;

        conn.execute(
            "INSERT INTO Chapter (item_pid, chapter_index) VALUES (?1, NULL)",
            (item_pid,),
        )?;

        let artwork_upload = if let Some(bytes) = item.artwork.clone() {
            let token = artwork::token_for_track(self.artwork_track_index);
            self.artwork_track_index += 1;
            let relative_path = artwork::link_artwork(
                conn,
                &token,
                item_pid,
                entities.album_pid,
                entities.artist_pid,
                &mut self.artwork_guard,
            )?;
            Some((token, relative_path, bytes))
        } else {
            None
        };

        Ok(InsertedItem {
            item_pid,
            remote_filename: item.remote_filename,
            resurrected,
            artwork_upload,
        })
    }

    /// Number of new Artist/`AlbumArtist`/Genre/Album rows queued so far
    /// this batch, for the orchestrator's merge summary.
    #[must_use]
    pub fn entities_queued(&self) -> usize {
        self.resolver.new_artists.len()
            + self.resolver.new_album_artists.len()
            + self.resolver.new_genres.len()
            + self.resolver.new_albums.len()
    }

    /// Back-populate entity rows for everything the resolver queued during
    /// this batch, then sweep any pre-existing rows still carrying
    /// `sync_id = 0` (spec §4.5, final two paragraphs).
    pub fn finalize_entities(&mut self, conn: &Connection) -> Result<(), CatalogError> {
        for entity in &self.resolver.new_artists {
            insert_simple_entity(conn, "Artist", "artist_pid", entity)?;
        }
        for entity in &self.resolver.new_genres {
            insert_simple_entity(conn, "Genre", "genre_pid", entity)?;
        }
        for entity in &self.resolver.new_album_artists {
            let name_order = sort_map::upsert(conn, &entity.name)?;
            let section = sort_map::section_code(&entity.name);
            conn.execute(
                "INSERT INTO AlbumArtist (
                    album_artist_pid, name, sort_name, grouping_key, representative_item_pid,
                    sync_id, keep_local, name_order, sort_order, sort_order_section
                ) VALUES (?1, ?2, ?2, ?3, ?4, ?5, 1, ?6, ?6, ?7)",
                rusqlite::params![
                    entity.id,
                    entity.name,
                    sort_key::encode(&entity.name),
                    entity.representative_item_pid,
                    ids::random_id(),
                    name_order,
                    section,
                ],
            )?;
        }
        for album in &self.resolver.new_albums {
            conn.execute(
                "INSERT INTO Album (
                    album_pid, name, sort_name, grouping_key, representative_item_pid,
                    sync_id, keep_local, album_artist_pid, year
                ) VALUES (?1, ?2, ?2, ?3, ?4, ?5, 1, ?6, ?7)",
                rusqlite::params![
                    album.id,
                    album.name,
                    sort_key::encode(&album.name),
                    album.representative_item_pid,
                    ids::random_id(),
                    album.album_artist_pid,
                    album.year,
                ],
            )?;
        }

        backfill_zero_sync_ids(conn, "Artist", "artist_pid")?;
        backfill_zero_sync_ids(conn, "AlbumArtist", "album_artist_pid")?;
        backfill_zero_sync_ids(conn, "Genre", "genre_pid")?;
        backfill_zero_sync_ids(conn, "Album", "album_pid")?;

        Ok(())
    }
}

fn insert_simple_entity(
    conn: &Connection,
    table: &str,
    pid_column: &str,
    entity: &super::resolver::NewEntity,
) -> Result<(), CatalogError> {
    conn.execute(
        &format!(
            "INSERT INTO {table} (
                {pid_column}, name, sort_name, grouping_key, representative_item_pid, sync_id, keep_local
            ) VALUES (?1, ?2, ?2, ?3, ?4, ?5, 1)"
        ),
        rusqlite::params![
            entity.id,
            entity.name,
            sort_key::encode(&entity.name),
            entity.representative_item_pid,
            ids::random_id(),
        ],
    )?;
    Ok(())
}

fn backfill_zero_sync_ids(conn: &Connection, table: &str, pid_column: &str) -> Result<(), CatalogError> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {pid_column} FROM {table} WHERE sync_id = 0"
    ))?;
    let pending: Vec<Integer> = stmt
        .query_map([], |row| row.get(0))?
        .collect::<Result<_, _>>()?;
    drop(stmt);

    for pid in pending {
        conn.execute(
            &format!("UPDATE {table} SET sync_id = ?1, keep_local = 1 WHERE {pid_column} = ?2"),
            (ids::random_id(), pid),
        )?;
    }

    Ok(())
}

/// Delete every per-item row for `item_pid` ahead of a resurrection
/// re-insert (spec §4.4 step 5, §4.5 step 3).
fn delete_per_item_rows(conn: &Connection, item_pid: Integer) -> Result<(), CatalogError> {
    const TABLES: &[&str] = &[
        "ItemExtra",
        "ItemPlayback",
        "ItemStats",
        "ItemStore",
        "ItemSearch",
        "ItemVideo",
        "Lyrics",
        "Chapter",
    ];
    for table in TABLES {
        conn.execute(
            &format!("DELETE FROM {table} WHERE item_pid = ?1"),
            (item_pid,),
        )?;
    }
    conn.execute("DELETE FROM Item WHERE item_pid = ?1", (item_pid,))?;
    Ok(())
}

fn signature_key(title: &str, artist: &str, album: &str) -> String {
    format!("{title}|{artist}|{album}")
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::{ItemInserter, audio_format_for_extension, integrity_for_song, integrity_for_tone};
    use crate::{catalog::schema::create_fresh, input::InputItem};

    fn conn() -> rusqlite::Connection {
        let conn = rusqlite::Connection::open_in_memory().unwrap();
        create_fresh(&conn).unwrap();
        conn
    }

    fn sample() -> InputItem {
        InputItem {
            title: "Hello".to_string(),
            artist: "Adele".to_string(),
            album: "25".to_string(),
            genre: "Pop".to_string(),
            year: Some(2015),
            duration_ms: 295_000,
            file_size: 7_000_000,
            remote_filename: "ABCD.mp3".to_string(),
            ..Default::default()
        }
    }

    #[test]
    fn audio_format_mapping_matches_spec_table() {
        assert_eq!(audio_format_for_extension("mp3"), 301);
        assert_eq!(audio_format_for_extension("flac"), 0x664C_6143);
        assert_eq!(audio_format_for_extension("m4a"), 0x6161_6320);
        assert_eq!(audio_format_for_extension("aac"), 0x6161_6320);
        assert_eq!(audio_format_for_extension("m4r"), 0x6161_6320);
        assert_eq!(audio_format_for_extension("alac"), 0x616C_6163);
        assert_eq!(audio_format_for_extension("wav"), 0x5741_5645);
    }

    #[test]
    fn integrity_blobs_concatenate_in_opposite_orders() {
        assert_eq!(
            integrity_for_song("ABCD.mp3"),
            hex::encode("ABCD.mp3iTunes_Control/Music/F00")
        );
        assert_eq!(
            integrity_for_tone("ABCD.m4r"),
            hex::encode("iTunes_Control/Ringtones/ABCD.m4r")
        );
    }

    #[test]
    fn fresh_catalog_single_item_end_to_end() {
        let conn = conn();
        let mut inserter = ItemInserter::load(&conn).unwrap();

        let inserted = inserter.insert_song(&conn, &sample()).unwrap();
        inserter.finalize_entities(&conn).unwrap();

        assert!(!inserted.resurrected);

        let media_kind: i64 = conn
            .query_row(
                "SELECT media_kind FROM Item WHERE item_pid = ?1",
                (inserted.item_pid,),
                |r| r.get(0),
            )
            .unwrap();
        assert_eq!(media_kind, super::MEDIA_KIND_SONG);

        let (location, location_kind): (String, i64) = conn
            .query_row(
                "SELECT location, location_kind FROM ItemExtra WHERE item_pid = ?1",
                (inserted.item_pid,),
                |r| Ok((r.get(0)?, r.get(1)?)),
            )
            .unwrap();
        assert_eq!(location, "ABCD.mp3");
        assert_eq!(location_kind, super::LOCATION_KIND_CLOUD);

        let (sync_id, sync_in_my_library): (i64, i64) = conn
            .query_row(
                "SELECT sync_id, sync_in_my_library FROM ItemStore WHERE item_pid = ?1",
                (inserted.item_pid,),
                |r| Ok((r.get(0)?, r.get(1)?)),
            )
            .unwrap();
        assert_ne!(sync_id, 0);
        assert_eq!(sync_in_my_library, 1);

        let entity_count: i64 = conn
            .query_row(
                "SELECT
                    (SELECT COUNT(*) FROM Artist) +
                    (SELECT COUNT(*) FROM AlbumArtist) +
                    (SELECT COUNT(*) FROM Album) +
                    (SELECT COUNT(*) FROM Genre)",
                [],
                |r| r.get(0),
            )
            .unwrap();
        assert_eq!(entity_count, 4);

        let sortmap_count: i64 = conn
            .query_row("SELECT COUNT(*) FROM SortMap", [], |r| r.get(0))
            .unwrap();
        assert_eq!(sortmap_count, 4); // Hello, Adele (artist+album-artist collapse to one row), 25, Pop
    }

    #[test]
    fn second_run_with_identical_item_resurrects_in_place() {
        let conn = conn();
        let mut inserter = ItemInserter::load(&conn).unwrap();

        let first = inserter.insert_song(&conn, &sample()).unwrap();
        inserter.finalize_entities(&conn).unwrap();

        let second = inserter.insert_song(&conn, &sample()).unwrap();
        inserter.finalize_entities(&conn).unwrap();

        assert!(second.resurrected);
        assert_eq!(first.item_pid, second.item_pid);

        let item_count: i64 = conn
            .query_row("SELECT COUNT(*) FROM Item", [], |r| r.get(0))
            .unwrap();
        assert_eq!(item_count, 1);

        let entity_count: i64 = conn
            .query_row("SELECT COUNT(*) FROM Artist", [], |r| r.get(0))
            .unwrap();
        assert_eq!(entity_count, 1);
    }

    #[test]
    fn representative_item_is_first_item_to_reference_entity() {
        let conn = conn();
        let mut inserter = ItemInserter::load(&conn).unwrap();

        let mut first = sample();
        first.title = "Track One".to_string();
        let inserted_first = inserter.insert_song(&conn, &first).unwrap();

        let mut second = sample();
        second.title = "Track Two".to_string();
        inserter.insert_song(&conn, &second).unwrap();

        inserter.finalize_entities(&conn).unwrap();

        let representative: i64 = conn
            .query_row(
                "SELECT representative_item_pid FROM Artist WHERE name = 'Adele'",
                [],
                |r| r.get(0),
            )
            .unwrap();
        assert_eq!(representative, inserted_first.item_pid);
    }

    #[test]
    fn artwork_present_returns_upload_instruction() {
        let conn = conn();
        let mut inserter = ItemInserter::load(&conn).unwrap();

        let mut item = sample();
        item.artwork = Some(vec![1, 2, 3]);

        let inserted = inserter.insert_song(&conn, &item).unwrap();
        let (token, relative_path, bytes) = inserted.artwork_upload.unwrap();
        assert_eq!(token, "1000");
        assert!(relative_path.contains('/'));
        assert_eq!(bytes, vec![1, 2, 3]);
    }
}
