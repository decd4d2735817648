//! Entity resolver (spec §4.4): maps the textual attributes on an input
//! item to catalog identifiers, reusing rows that already exist and
//! remembering brand-new ones so the item inserter can back-populate
//! their entity rows once the representative item is known.

use std::collections::{HashMap, HashSet};

use rusqlite::Connection;

use super::{Integer, ids};
use crate::error::CatalogError;

/// An entity name that did not exist in the catalog when first referenced
/// during this merge; queued for the post-insert back-population pass
/// described in spec §4.5 / §9 "cyclic references".
#[derive(Debug, Clone)]
pub struct NewEntity {
    pub id: Integer,
    pub name: String,
    pub representative_item_pid: Integer,
}

/// A new album additionally carries its resolved album-artist id and year,
/// per spec §3 ("Album additionally stores album-artist identifier and year").
#[derive(Debug, Clone)]
pub struct NewAlbum {
    pub id: Integer,
    pub name: String,
    pub representative_item_pid: Integer,
    pub album_artist_pid: Integer,
    pub year: Option<Integer>,
}

/// Entities an item's textual attributes resolve to.
#[derive(Debug, Clone, Copy)]
pub struct ResolvedEntities {
    pub artist_pid: Integer,
    pub album_artist_pid: Integer,
    pub album_pid: Integer,
    pub genre_pid: Integer,
}

fn normalize(name: &str) -> String {
    name.trim().to_lowercase()
}

/// Compute the effective album-artist per spec §4.4 step 4: falls back to
/// the song artist when absent, blank, or the literal "unknown artist".
#[must_use]
pub fn effective_album_artist<'a>(album_artist: Option<&'a str>, artist: &'a str) -> &'a str {
    match album_artist {
        Some(name) if !name.trim().is_empty() && normalize(name) != "unknown artist" => name,
        _ => artist,
    }
}

/// Resolves artist/album-artist/genre/album names to catalog identifiers,
/// tracking any newly-minted ones pending back-population.
pub struct EntityResolver {
    artists: HashMap<String, Integer>,
    album_artists: HashMap<String, Integer>,
    genres: HashMap<String, Integer>,
    // keyed by (normalized album name, normalized album-artist name): real
    // catalogs disambiguate same-titled albums by their album artist.
    albums: HashMap<(String, String), Integer>,

    ids_in_use: HashSet<Integer>,

    pub new_artists: Vec<NewEntity>,
    pub new_album_artists: Vec<NewEntity>,
    pub new_genres: Vec<NewEntity>,
    pub new_albums: Vec<NewAlbum>,
}

impl EntityResolver {
    /// Preload every existing entity name from `conn` so later resolutions
    /// in this merge reuse rows instead of duplicating them.
    pub fn load(conn: &Connection) -> Result<Self, CatalogError> {
        let mut ids_in_use = HashSet::new();

        let artists = load_simple(conn, "Artist", "artist_pid", &mut ids_in_use)?;
        let album_artists = load_simple(conn, "AlbumArtist", "album_artist_pid", &mut ids_in_use)?;
        let genres = load_simple(conn, "Genre", "genre_pid", &mut ids_in_use)?;

        let mut albums = HashMap::new();
        let mut stmt = conn.prepare(
            "SELECT Album.album_pid, Album.name, COALESCE(AlbumArtist.name, '')
             FROM Album LEFT JOIN AlbumArtist ON AlbumArtist.album_artist_pid = Album.album_artist_pid",
        )?;
        let rows = stmt.query_map([], |row| {
            let id: Integer = row.get(0)?;
            let name: String = row.get(1)?;
            let album_artist: String = row.get(2)?;
            Ok((id, name, album_artist))
        })?;
        for row in rows {
            let (id, name, album_artist) = row?;
            ids_in_use.insert(id);
            albums.insert((normalize(&name), normalize(&album_artist)), id);
        }

        Ok(Self {
            artists,
            album_artists,
            genres,
            albums,
            ids_in_use,
            new_artists: Vec::new(),
            new_album_artists: Vec::new(),
            new_genres: Vec::new(),
            new_albums: Vec::new(),
        })
    }

    fn fresh_id(&mut self) -> Integer {
        let id = ids::allocate_unique(|candidate| self.ids_in_use.contains(&candidate));
        self.ids_in_use.insert(id);
        id
    }

    fn resolve_named(
        map: &mut HashMap<String, Integer>,
        pending: &mut Vec<NewEntity>,
        ids_in_use: &mut HashSet<Integer>,
        name: &str,
        item_pid: Integer,
    ) -> Integer {
        let key = normalize(name);
        if let Some(&id) = map.get(&key) {
            return id;
        }

        let id = ids::allocate_unique(|candidate| ids_in_use.contains(&candidate));
        ids_in_use.insert(id);
        map.insert(key, id);
        pending.push(NewEntity {
            id,
            name: name.to_string(),
            representative_item_pid: item_pid,
        });

        id
    }

    /// Resolve all four attributes for an item about to be inserted as
    /// `item_pid`. Newly-minted entities are queued in `self.new_*`.
    pub fn resolve(
        &mut self,
        artist: &str,
        album: &str,
        album_artist: Option<&str>,
        genre: &str,
        year: Option<Integer>,
        item_pid: Integer,
    ) -> ResolvedEntities {
        let effective_album_artist = effective_album_artist(album_artist, artist).to_string();

        let artist_pid = Self::resolve_named(
            &mut self.artists,
            &mut self.new_artists,
            &mut self.ids_in_use,
            artist,
            item_pid,
        );

        let album_artist_pid = Self::resolve_named(
            &mut self.album_artists,
            &mut self.new_album_artists,
            &mut self.ids_in_use,
            &effective_album_artist,
            item_pid,
        );

        let genre_pid = Self::resolve_named(
            &mut self.genres,
            &mut self.new_genres,
            &mut self.ids_in_use,
            genre,
            item_pid,
        );

        let album_key = (normalize(album), normalize(&effective_album_artist));
        let album_pid = if let Some(&id) = self.albums.get(&album_key) {
            id
        } else {
            let id = self.fresh_id();
            self.albums.insert(album_key, id);
            self.new_albums.push(NewAlbum {
                id,
                name: album.to_string(),
                representative_item_pid: item_pid,
                album_artist_pid,
                year,
            });
            id
        };

        ResolvedEntities {
            artist_pid,
            album_artist_pid,
            album_pid,
            genre_pid,
        }
    }
}

fn load_simple(
    conn: &Connection,
    table: &str,
    pid_column: &str,
    ids_in_use: &mut HashSet<Integer>,
) -> Result<HashMap<String, Integer>, CatalogError> {
    let mut out = HashMap::new();
    let mut stmt = conn.prepare(&format!("SELECT {pid_column}, name FROM {table}"))?;
    let rows = stmt.query_map([], |row| {
        let id: Integer = row.get(0)?;
        let name: String = row.get(1)?;
        Ok((id, name))
    })?;
    for row in rows {
        let (id, name) = row?;
        ids_in_use.insert(id);
        out.insert(normalize(&name), id);
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::{EntityResolver, effective_album_artist};
    use crate::catalog::schema::create_fresh;

    fn conn() -> rusqlite::Connection {
        let conn = rusqlite::Connection::open_in_memory().unwrap();
        create_fresh(&conn).unwrap();
        conn
    }

    #[test]
    fn effective_album_artist_falls_back_on_blank() {
        assert_eq!(effective_album_artist(Some("  "), "Adele"), "Adele");
    }

    #[test]
    fn effective_album_artist_falls_back_on_unknown_literal() {
        assert_eq!(
            effective_album_artist(Some("Unknown Artist"), "Adele"),
            "Adele"
        );
        assert_eq!(
            effective_album_artist(Some("unknown artist"), "Adele"),
            "Adele"
        );
    }

    #[test]
    fn effective_album_artist_passes_through_when_present() {
        assert_eq!(
            effective_album_artist(Some("Various Artists"), "Adele"),
            "Various Artists"
        );
    }

    #[test]
    fn effective_album_artist_defaults_to_artist_when_absent() {
        assert_eq!(effective_album_artist(None, "Adele"), "Adele");
    }

    #[test]
    fn new_names_are_queued_exactly_once() {
        let conn = conn();
        let mut resolver = EntityResolver::load(&conn).unwrap();

        let first = resolver.resolve("Adele", "25", None, "Pop", Some(2015), 111);
        let second = resolver.resolve("Adele", "25", None, "Pop", Some(2015), 222);

        assert_eq!(first.artist_pid, second.artist_pid);
        assert_eq!(first.album_pid, second.album_pid);
        assert_eq!(resolver.new_artists.len(), 1);
        assert_eq!(resolver.new_albums.len(), 1);
        assert_eq!(resolver.new_artists[0].representative_item_pid, 111);
    }

    #[test]
    fn existing_rows_are_reused_without_queuing() {
        let conn = conn();
        conn.execute(
            "INSERT INTO Artist (artist_pid, name, sort_name, grouping_key) VALUES (9001, 'Adele', 'Adele', X'01')",
            [],
        )
        .unwrap();

        let mut resolver = EntityResolver::load(&conn).unwrap();
        let resolved = resolver.resolve("Adele", "25", None, "Pop", Some(2015), 42);

        assert_eq!(resolved.artist_pid, 9001);
        assert!(resolver.new_artists.is_empty());
    }

    #[test]
    fn different_album_artists_get_distinct_albums_with_same_name() {
        let conn = conn();
        let mut resolver = EntityResolver::load(&conn).unwrap();

        let a = resolver.resolve("Artist A", "Greatest Hits", None, "Pop", None, 1);
        let b = resolver.resolve("Artist B", "Greatest Hits", None, "Rock", None, 2);

        assert_ne!(a.album_pid, b.album_pid);
    }
}
