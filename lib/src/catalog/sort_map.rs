//! `SortMap` upsert helper shared by the item inserter (E) and playlist
//! manager (G): every textual attribute surfaced in a list view gets
//! exactly one row, with a dense `name_order` and a first-letter
//! `name_section` (spec §3, §4.2).

use rusqlite::{Connection, OptionalExtension, params};

use super::{Integer, sort_key};
use crate::error::CatalogError;

/// `AlbumArtist.sort_order_section`-style bucket: `A..Z` -> `1..26`, else `27`.
#[must_use]
pub fn section_code(name: &str) -> Integer {
    name.chars()
        .find(|c| c.is_alphabetic())
        .map(|c| {
            let upper = c.to_ascii_uppercase();
            if upper.is_ascii_uppercase() {
                Integer::from(upper as u8 - b'A' + 1)
            } else {
                27
            }
        })
        .unwrap_or(27)
}

/// Return the existing `name_order` for `name`, inserting a fresh SortMap
/// row with the next dense order if none exists yet.
pub fn upsert(conn: &Connection, name: &str) -> Result<Integer, CatalogError> {
    if let Some(order) = conn
        .query_row(
            "SELECT name_order FROM SortMap WHERE name = ?1",
            [name],
            |r| r.get(0),
        )
        .optional()?
    {
        return Ok(order);
    }

    let next: Integer = conn.query_row(
        "SELECT COALESCE(MAX(name_order), 0) + 1 FROM SortMap",
        [],
        |r| r.get(0),
    )?;

    conn.execute(
        "INSERT INTO SortMap (name, name_order, name_section, sort_key) VALUES (?1, ?2, ?3, ?4)",
        params![name, next, section_code(name), sort_key::encode(name)],
    )?;

    Ok(next)
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::{section_code, upsert};
    use crate::catalog::schema::create_fresh;

    fn conn() -> rusqlite::Connection {
        let conn = rusqlite::Connection::open_in_memory().unwrap();
        create_fresh(&conn).unwrap();
        conn
    }

    #[test]
    fn first_insert_gets_order_one() {
        let conn = conn();
        assert_eq!(upsert(&conn, "Adele").unwrap(), 1);
    }

    #[test]
    fn repeated_name_returns_same_order() {
        let conn = conn();
        let first = upsert(&conn, "Adele").unwrap();
        let second = upsert(&conn, "Adele").unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn orders_are_dense_and_ascending() {
        let conn = conn();
        assert_eq!(upsert(&conn, "Adele").unwrap(), 1);
        assert_eq!(upsert(&conn, "Bowie").unwrap(), 2);
        assert_eq!(upsert(&conn, "Coldplay").unwrap(), 3);
    }

    #[test]
    fn section_code_buckets_by_first_letter() {
        assert_eq!(section_code("adele"), 1);
        assert_eq!(section_code("Zebra"), 26);
        assert_eq!(section_code("25"), 27);
        assert_eq!(section_code(""), 27);
    }
}
