//! Identifier allocation (spec §4.2).
//!
//! Item and entity identifiers are uniform random 64-bit integers drawn
//! from a reserved high range so they never collide with vendor-assigned
//! ids. Remote filenames are four random uppercase letters plus the
//! original extension.

use rand::{rngs::OsRng, Rng, RngCore};

use super::Integer;

/// Lower bound of the identifier range (`10^18`), see spec §3 invariant 6.
pub const ID_RANGE_MIN: Integer = 1_000_000_000_000_000_000;
/// Upper bound of the identifier range (`2^63 - 1`).
pub const ID_RANGE_MAX: Integer = Integer::MAX;

/// Generate a single candidate identifier uniformly in `[ID_RANGE_MIN, ID_RANGE_MAX]`.
///
/// Collisions within a single merge are the caller's responsibility to
/// detect (see [`allocate_unique`]); the probability of a collision is
/// negligible but the contract is "generate until unique", not
/// "generate once and trust it".
#[must_use]
pub fn random_id() -> Integer {
    OsRng.gen_range(ID_RANGE_MIN..=ID_RANGE_MAX)
}

/// Generate identifiers until `exists` reports one that is not already taken.
///
/// `exists` is expected to check both in-catalog rows and any ids already
/// claimed earlier in the same merge.
pub fn allocate_unique(mut exists: impl FnMut(Integer) -> bool) -> Integer {
    loop {
        let candidate = random_id();
        if !exists(candidate) {
            return candidate;
        }
    }
}

const FILENAME_LETTERS: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ";
const DEFAULT_EXTENSION: &str = "mp3";

/// Generate a four-letter uppercase remote filename stem with the given
/// extension (lowercased), defaulting to `mp3` if no extension is given.
#[must_use]
pub fn random_remote_filename(extension: Option<&str>) -> String {
    let mut rng = OsRng;
    let mut stem = String::with_capacity(4);
    for _ in 0..4 {
        let idx = rng.next_u32() as usize % FILENAME_LETTERS.len();
        stem.push(FILENAME_LETTERS[idx] as char);
    }

    let ext = extension
        .filter(|e| !e.is_empty())
        .map_or_else(|| DEFAULT_EXTENSION.to_string(), str::to_lowercase);

    format!("{stem}.{ext}")
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use pretty_assertions::assert_eq;

    use super::{allocate_unique, random_id, random_remote_filename, ID_RANGE_MAX, ID_RANGE_MIN};

    #[test]
    fn random_id_is_within_reserved_range() {
        for _ in 0..1000 {
            let id = random_id();
            assert!(id >= ID_RANGE_MIN);
            assert!(id <= ID_RANGE_MAX);
        }
    }

    #[test]
    fn allocate_unique_skips_taken_ids() {
        let taken: HashSet<i64> = HashSet::from([1, 2, 3]);
        let mut calls = 0usize;
        let id = allocate_unique(|candidate| {
            calls += 1;
            taken.contains(&candidate)
        });
        assert!(!taken.contains(&id));
        assert!(calls >= 1);
    }

    #[test]
    fn remote_filename_has_four_letters_and_extension() {
        let name = random_remote_filename(Some("MP3"));
        assert_eq!(name.len(), 4 + 1 + 3);
        let (stem, ext) = name.split_once('.').unwrap();
        assert_eq!(stem.len(), 4);
        assert!(stem.chars().all(|c| c.is_ascii_uppercase()));
        assert_eq!(ext, "mp3");
    }

    #[test]
    fn remote_filename_defaults_extension_to_mp3() {
        let name = random_remote_filename(None);
        assert!(name.ends_with(".mp3"));

        let name = random_remote_filename(Some(""));
        assert!(name.ends_with(".mp3"));
    }
}
