//! Input record consumed by the merge engine (spec §6.3).
//!
//! Everything here is produced by an external collaborator (tag parsing,
//! metadata enrichment) and handed to the orchestrator already decoded;
//! this crate never reads audio containers itself.

/// One song or ringtone the caller wants merged into the catalog.
#[derive(Debug, Clone, Default)]
pub struct InputItem {
    /// Path to the source audio file on the machine driving the merge,
    /// used only to size the upload and pick a default remote filename.
    pub local_path: std::path::PathBuf,
    pub title: String,
    pub artist: String,
    pub album: String,
    pub album_artist: Option<String>,
    pub genre: String,
    pub year: Option<i64>,
    pub duration_ms: i64,
    pub file_size: i64,
    /// Filename to use under the device base location, e.g. `"ABCD.mp3"`.
    pub remote_filename: String,
    pub artwork: Option<Vec<u8>>,
    pub track_number: Option<i64>,
    pub track_count: Option<i64>,
    pub disc_number: Option<i64>,
    pub disc_count: Option<i64>,
    pub lyrics: Option<String>,
}

impl InputItem {
    /// Lowercased extension of [`Self::remote_filename`], used for audio
    /// format mapping and artwork-free codec defaults.
    #[must_use]
    pub fn extension(&self) -> Option<String> {
        self.remote_filename
            .rsplit_once('.')
            .map(|(_, ext)| ext.to_lowercase())
    }

    /// Replace blank textual attributes per spec §4.5: empty title falls
    /// back to the remote filename, empty artist/album to the two
    /// well-known placeholder names.
    #[must_use]
    pub fn sanitized(mut self) -> Self {
        if self.title.trim().is_empty() {
            self.title = self.remote_filename.clone();
        }
        if self.artist.trim().is_empty() {
            self.artist = "Unknown Artist".to_string();
        }
        if self.album.trim().is_empty() {
            self.album = "Unknown Album".to_string();
        }
        self
    }

    /// Per spec §4.9 step 3: an item whose artist AND album are both the
    /// "unknown" placeholders is skipped from batch inserts to avoid
    /// artwork cross-contamination between unrelated unknown items.
    #[must_use]
    pub fn is_unknown_unknown(&self) -> bool {
        self.artist.eq_ignore_ascii_case("Unknown Artist")
            && self.album.eq_ignore_ascii_case("Unknown Album")
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::InputItem;

    fn item() -> InputItem {
        InputItem {
            remote_filename: "ABCD.MP3".to_string(),
            ..Default::default()
        }
    }

    #[test]
    fn extension_is_lowercased() {
        assert_eq!(item().extension().as_deref(), Some("mp3"));
    }

    #[test]
    fn sanitized_fills_blank_title_with_filename() {
        let sanitized = item().sanitized();
        assert_eq!(sanitized.title, "ABCD.MP3");
        assert_eq!(sanitized.artist, "Unknown Artist");
        assert_eq!(sanitized.album, "Unknown Album");
    }

    #[test]
    fn sanitized_preserves_non_blank_fields() {
        let mut input = item();
        input.title = "Hello".to_string();
        input.artist = "Adele".to_string();
        input.album = "25".to_string();

        let sanitized = input.sanitized();
        assert_eq!(sanitized.title, "Hello");
        assert_eq!(sanitized.artist, "Adele");
        assert_eq!(sanitized.album, "25");
    }

    #[test]
    fn is_unknown_unknown_requires_both_placeholders() {
        let mut input = item().sanitized();
        assert!(input.is_unknown_unknown());

        input.artist = "Adele".to_string();
        assert!(!input.is_unknown_unknown());
    }
}
