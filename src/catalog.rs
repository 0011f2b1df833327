//! Album view-model types and rating-scale conversions.

use std::collections::BTreeMap;

use crate::backends::{
    BackendAlbum, BackendError, BackendLibrary, BackendTrack, MediaBackendAdapter, PlexServerAuth,
};
use crate::media_urls::{cover_art_url, stream_url};

/// Directory type the server reports for music sections.
pub const MUSIC_LIBRARY_KIND: &str = "artist";

/// Highest value on the user-facing star scale.
pub const MAX_STARS: u8 = 5;

/// A music library section on the server.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LibraryRef {
    pub id: String,
    pub title: String,
}

impl From<BackendLibrary> for LibraryRef {
    fn from(library: BackendLibrary) -> Self {
        Self {
            id: library.key,
            title: library.title,
        }
    }
}

/// One track of a selected album, ready for display.
#[derive(Debug, Clone, PartialEq)]
pub struct Track {
    pub id: String,
    pub title: String,
    pub duration_secs: f64,
    pub preview_url: Option<String>,
    /// Existing rating on the 0-5 star scale; 0 means unrated.
    pub rating: u8,
}

/// A selected album with its full track list.
#[derive(Debug, Clone, PartialEq)]
pub struct Album {
    pub id: String,
    pub title: String,
    pub artist: String,
    pub year: Option<i32>,
    pub cover_url: Option<String>,
    pub tracks: Vec<Track>,
}

/// A star rating in `1..=5`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct StarRating(u8);

impl StarRating {
    pub fn new(stars: u8) -> Option<Self> {
        (1..=MAX_STARS).contains(&stars).then_some(Self(stars))
    }

    pub fn stars(self) -> u8 {
        self.0
    }

    /// Server-native value on the 0-10 scale.
    pub fn native(self) -> u8 {
        self.0 * 2
    }
}

/// Track id to star rating, consumed once by the rating writer.
pub type RatingBatch = BTreeMap<String, StarRating>;

/// Maps a native 0-10 rating down to the 0-5 display scale.
pub fn display_rating(native: Option<f64>) -> u8 {
    match native {
        Some(value) if value.is_finite() && value > 0.0 => {
            ((value.floor() as u32) / 2).min(u32::from(MAX_STARS)) as u8
        }
        _ => 0,
    }
}

/// Returns true when the server holds no rating for the track.
pub fn is_unrated(track: &BackendTrack) -> bool {
    track.user_rating.is_none()
}

/// Builds the display aggregate for an album and its tracks.
pub fn normalize_album(
    auth: &PlexServerAuth,
    album: BackendAlbum,
    tracks: Vec<BackendTrack>,
) -> Album {
    Album {
        cover_url: album.thumb.as_deref().map(|thumb| cover_art_url(auth, thumb)),
        id: album.rating_key,
        title: album.title,
        artist: album.artist,
        year: album.year,
        tracks: tracks
            .into_iter()
            .map(|track| Track {
                preview_url: track.part_key.as_deref().map(|key| stream_url(auth, key)),
                rating: display_rating(track.user_rating),
                duration_secs: track.duration_ms as f64 / 1000.0,
                id: track.rating_key,
                title: track.title,
            })
            .collect(),
    }
}

/// Lists the server's music library sections.
pub fn music_libraries(
    backend: &dyn MediaBackendAdapter,
) -> Result<Vec<LibraryRef>, BackendError> {
    Ok(backend
        .fetch_libraries()?
        .into_iter()
        .filter(|library| library.kind == MUSIC_LIBRARY_KIND)
        .map(LibraryRef::from)
        .collect())
}
