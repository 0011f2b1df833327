//! In-memory backend used by unit tests.

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::Mutex;
use std::time::{Duration, Instant};

use crate::backends::{
    BackendAlbum, BackendError, BackendLibrary, BackendTrack, MediaBackendAdapter, PlexServerAuth,
};

pub struct FakeBackend {
    auth: PlexServerAuth,
    pub libraries: Vec<BackendLibrary>,
    pub albums: Vec<BackendAlbum>,
    pub tracks: HashMap<String, Vec<BackendTrack>>,
    pub failing_albums: HashSet<String>,
    pub failing_tracks: HashSet<String>,
    pub album_list_fails: bool,
    /// Per-call latency of album list requests, consumed front to back.
    pub album_list_delays: Mutex<VecDeque<Duration>>,
    pub album_list_requests: Mutex<usize>,
    pub track_requests: Mutex<Vec<String>>,
    pub rating_writes: Mutex<Vec<(String, u8)>>,
}

impl FakeBackend {
    pub fn new() -> Self {
        Self {
            auth: PlexServerAuth::new("http://plex.test:32400", "test-token"),
            libraries: Vec::new(),
            albums: Vec::new(),
            tracks: HashMap::new(),
            failing_albums: HashSet::new(),
            failing_tracks: HashSet::new(),
            album_list_fails: false,
            album_list_delays: Mutex::new(VecDeque::new()),
            album_list_requests: Mutex::new(0),
            track_requests: Mutex::new(Vec::new()),
            rating_writes: Mutex::new(Vec::new()),
        }
    }

    /// Adds an album with `rated` rated tracks followed by `unrated` unrated ones.
    pub fn add_album(&mut self, album_id: &str, rated: usize, unrated: usize) {
        self.albums.push(BackendAlbum {
            rating_key: album_id.to_string(),
            title: format!("Album {album_id}"),
            artist: "Test Artist".to_string(),
            year: Some(2001),
            thumb: Some(format!("/library/metadata/{album_id}/thumb")),
        });
        let tracks = (0..rated + unrated)
            .map(|index| BackendTrack {
                rating_key: format!("{album_id}-t{index}"),
                title: format!("Track {}", index + 1),
                duration_ms: 180_000,
                user_rating: (index < rated).then_some(8.0),
                part_key: Some(format!("/library/parts/{album_id}{index}/file.flac")),
            })
            .collect();
        self.tracks.insert(album_id.to_string(), tracks);
    }

    pub fn delay_album_lists(&self, delays: &[Duration]) {
        self.album_list_delays
            .lock()
            .expect("fake lock poisoned")
            .extend(delays.iter().copied());
    }

    pub fn album_list_request_count(&self) -> usize {
        *self.album_list_requests.lock().expect("fake lock poisoned")
    }

    pub fn track_request_log(&self) -> Vec<String> {
        self.track_requests.lock().expect("fake lock poisoned").clone()
    }

    pub fn rating_write_log(&self) -> Vec<(String, u8)> {
        let mut writes = self.rating_writes.lock().expect("fake lock poisoned").clone();
        writes.sort();
        writes
    }
}

impl MediaBackendAdapter for FakeBackend {
    fn auth(&self) -> &PlexServerAuth {
        &self.auth
    }

    fn fetch_libraries(&self) -> Result<Vec<BackendLibrary>, BackendError> {
        Ok(self.libraries.clone())
    }

    fn fetch_albums(
        &self,
        _library_id: &str,
        _deadline: Option<Instant>,
    ) -> Result<Vec<BackendAlbum>, BackendError> {
        *self.album_list_requests.lock().expect("fake lock poisoned") += 1;
        let delay = self
            .album_list_delays
            .lock()
            .expect("fake lock poisoned")
            .pop_front();
        if let Some(delay) = delay {
            std::thread::sleep(delay);
        }
        if self.album_list_fails {
            return Err(BackendError::Transport {
                context: "list albums".to_string(),
                message: "connection refused".to_string(),
            });
        }
        Ok(self.albums.clone())
    }

    fn fetch_album_tracks(
        &self,
        album_id: &str,
        _deadline: Option<Instant>,
    ) -> Result<Vec<BackendTrack>, BackendError> {
        self.track_requests
            .lock()
            .expect("fake lock poisoned")
            .push(album_id.to_string());
        if self.failing_albums.contains(album_id) {
            return Err(BackendError::Status {
                code: 500,
                context: "list tracks".to_string(),
            });
        }
        Ok(self.tracks.get(album_id).cloned().unwrap_or_default())
    }

    fn rate_track(&self, track_id: &str, native_rating: u8) -> Result<(), BackendError> {
        self.rating_writes
            .lock()
            .expect("fake lock poisoned")
            .push((track_id.to_string(), native_rating));
        if self.failing_tracks.contains(track_id) {
            return Err(BackendError::Status {
                code: 404,
                context: format!("rate track {track_id}"),
            });
        }
        Ok(())
    }
}
