//! Ringtone inserter (spec §4.8): a specialization of the item inserter
//! for tone items — fixed media-kind/base-location/audio-format, no
//! entity or artwork linkage, duration defaulted rather than sanitized
//! from tag data.

use std::collections::HashSet;

use rusqlite::Connection;

use super::{
    Integer, ids,
    item_insert::{BASE_LOCATION_TONES, LOCATION_KIND_CLOUD, MEDIA_KIND_TONE, integrity_for_tone},
    sort_map,
};
use crate::error::CatalogError;

/// No artist/album/genre linkage for tones: the spec calls for the
/// literal id 0, not a NULL foreign key (spec §4.8).
const NO_ENTITY: Integer = 0;

/// `ItemPlayback.audio_format` tones always carry: AAC, regardless of the
/// source file's actual codec (spec §4.8).
fn tone_audio_format() -> Integer {
    Integer::from(u32::from_be_bytes(*b"aac "))
}

/// Duration used when the caller doesn't know the tone's real length
/// (spec §4.8: "duration fixed at 30s if unknown").
pub const DEFAULT_DURATION_MS: Integer = 30_000;

/// One ringtone to merge; deliberately narrower than [`crate::input::InputItem`]
/// since tones carry none of the entity/artwork fields.
#[derive(Debug, Clone)]
pub struct RingtoneInput {
    pub title: String,
    pub remote_filename: String,
    pub file_size: Integer,
    pub duration_ms: Option<Integer>,
}

#[derive(Debug, Clone)]
pub struct InsertedRingtone {
    pub item_pid: Integer,
    pub remote_filename: String,
}

pub struct RingtoneInserter {
    item_ids_in_use: HashSet<Integer>,
}

impl RingtoneInserter {
    pub fn load(conn: &Connection) -> Result<Self, CatalogError> {
        let mut item_ids_in_use = HashSet::new();
        let mut stmt = conn.prepare("SELECT item_pid FROM Item")?;
        for row in stmt.query_map([], |r| r.get::<_, Integer>(0))? {
            item_ids_in_use.insert(row?);
        }
        Ok(Self { item_ids_in_use })
    }

    fn allocate_item_id(&mut self) -> Integer {
        let id = ids::allocate_unique(|candidate| self.item_ids_in_use.contains(&candidate));
        self.item_ids_in_use.insert(id);
        id
    }

    pub fn insert_tone(
        &mut self,
        conn: &Connection,
        tone: &RingtoneInput,
    ) -> Result<InsertedRingtone, CatalogError> {
        let item_pid = self.allocate_item_id();
        let title_order = sort_map::upsert(conn, &tone.title)?;
        let now = chrono::Utc::now().timestamp();

        conn.execute(
            "INSERT INTO Item (
                item_pid, media_kind, item_artist_pid, album_pid, album_artist_pid, genre_pid,
                title_order, item_artist_order, album_order, disc_number, disc_count,
                track_number, track_count, base_location_id, in_library, is_compilation,
                date_added, date_downloaded
            ) VALUES (
                ?1, ?2, ?3, ?3, ?3, ?3, ?4, NULL, NULL, 1, 1, 1, 1, ?5, 0, 0, ?6, ?6
            )",
            (
                item_pid,
                MEDIA_KIND_TONE,
                NO_ENTITY,
                title_order,
                BASE_LOCATION_TONES,
                now,
            ),
        )?;

        let duration_ms = tone.duration_ms.unwrap_or(DEFAULT_DURATION_MS);
        conn.execute(
            "INSERT INTO ItemExtra (
                item_pid, title, location, file_size, duration_ms, year,
                location_kind, date_modified, integrity
            ) VALUES (?1, ?2, ?3, ?4, ?5, NULL, ?6, ?7, ?8)",
            (
                item_pid,
                &tone.title,
                &tone.remote_filename,
                tone.file_size,
                duration_ms,
                LOCATION_KIND_CLOUD,
                now,
                integrity_for_tone(&tone.remote_filename),
            ),
        )?;

        conn.execute(
            "INSERT INTO ItemPlayback (item_pid, audio_format, sample_rate, bit_rate) VALUES (?1, ?2, NULL, NULL)",
            (item_pid, tone_audio_format()),
        )?;
        conn.execute(
            "INSERT INTO ItemStats (item_pid, play_count, skip_count, last_played_date) VALUES (?1, 0, 0, NULL)",
            (item_pid,),
        )?;

        let sync_id = ids::random_id();
        conn.execute(
            "INSERT INTO ItemStore (item_pid, sync_id, sync_in_my_library) VALUES (?1, ?2, 1)",
            (item_pid, sync_id),
        )?;
        conn.execute(
            "INSERT INTO ItemVideo (item_pid, has_video) VALUES (?1, 0)",
            (item_pid,),
        )?;
        conn.execute(
            "INSERT INTO ItemSearch (item_pid, title_order, item_artist_order, album_order) VALUES (?1, ?2, NULL, NULL)",
            (item_pid, title_order),
        )?;
        conn.execute("INSERT INTO Lyrics (item_pid, lyrics) VALUES (?1, NULL)", (item_pid,))?;
        conn.execute(
            "INSERT INTO Chapter (item_pid, chapter_index) VALUES (?1, NULL)",
            (item_pid,),
        )?;

        Ok(InsertedRingtone {
            item_pid,
            remote_filename: tone.remote_filename.clone(),
        })
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::{RingtoneInput, RingtoneInserter};
    use crate::catalog::{item_insert::MEDIA_KIND_TONE, schema::create_fresh};

    fn conn() -> rusqlite::Connection {
        let conn = rusqlite::Connection::open_in_memory().unwrap();
        create_fresh(&conn).unwrap();
        conn
    }

    #[test]
    fn tone_gets_fixed_media_kind_and_base_location() {
        let conn = conn();
        let mut inserter = RingtoneInserter::load(&conn).unwrap();

        let tone = RingtoneInput {
            title: "Alarm".to_string(),
            remote_filename: "WXYZ.m4r".to_string(),
            file_size: 50_000,
            duration_ms: None,
        };
        let inserted = inserter.insert_tone(&conn, &tone).unwrap();

        let (media_kind, base_location): (i64, i64) = conn
            .query_row(
                "SELECT media_kind, base_location_id FROM Item WHERE item_pid = ?1",
                (inserted.item_pid,),
                |r| Ok((r.get(0)?, r.get(1)?)),
            )
            .unwrap();
        assert_eq!(media_kind, MEDIA_KIND_TONE);
        assert_eq!(base_location, super::BASE_LOCATION_TONES);
    }

    #[test]
    fn unknown_duration_defaults_to_thirty_seconds() {
        let conn = conn();
        let mut inserter = RingtoneInserter::load(&conn).unwrap();

        let tone = RingtoneInput {
            title: "Alarm".to_string(),
            remote_filename: "WXYZ.m4r".to_string(),
            file_size: 50_000,
            duration_ms: None,
        };
        let inserted = inserter.insert_tone(&conn, &tone).unwrap();

        let duration: i64 = conn
            .query_row(
                "SELECT duration_ms FROM ItemExtra WHERE item_pid = ?1",
                (inserted.item_pid,),
                |r| r.get(0),
            )
            .unwrap();
        assert_eq!(duration, super::DEFAULT_DURATION_MS);
    }

    #[test]
    fn no_entity_linkage_rows_are_created() {
        let conn = conn();
        let mut inserter = RingtoneInserter::load(&conn).unwrap();

        let tone = RingtoneInput {
            title: "Alarm".to_string(),
            remote_filename: "WXYZ.m4r".to_string(),
            file_size: 50_000,
            duration_ms: Some(5_000),
        };
        inserter.insert_tone(&conn, &tone).unwrap();

        let artist_count: i64 = conn
            .query_row("SELECT COUNT(*) FROM Artist", [], |r| r.get(0))
            .unwrap();
        assert_eq!(artist_count, 0);
    }
}
