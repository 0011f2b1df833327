//! Backend adapter abstractions and concrete implementations.

#[cfg(test)]
pub mod fake;
pub mod plex;
#[cfg(test)]
pub mod test_server;

use std::time::Instant;

/// Library section payload returned by backend adapters.
#[derive(Debug, Clone, PartialEq)]
pub struct BackendLibrary {
    pub key: String,
    pub title: String,
    pub kind: String,
}

/// Remote album payload returned by backend adapters.
#[derive(Debug, Clone, PartialEq)]
pub struct BackendAlbum {
    pub rating_key: String,
    pub title: String,
    pub artist: String,
    pub year: Option<i32>,
    pub thumb: Option<String>,
}

/// Remote track payload returned by backend adapters.
#[derive(Debug, Clone, PartialEq)]
pub struct BackendTrack {
    pub rating_key: String,
    pub title: String,
    pub duration_ms: u64,
    /// Native 0-10 rating. `None` means the track was never rated.
    pub user_rating: Option<f64>,
    /// Server-relative key of the first streamable media part.
    pub part_key: Option<String>,
}

/// Connection details used by backend adapters and URL builders.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlexServerAuth {
    pub endpoint: String,
    pub token: String,
}

impl PlexServerAuth {
    pub fn new(endpoint: &str, token: &str) -> Self {
        Self {
            endpoint: endpoint.trim().trim_end_matches('/').to_string(),
            token: token.trim().to_string(),
        }
    }
}

/// Failure talking to the media server.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum BackendError {
    #[error("request failed ({context}): {message}")]
    Transport { context: String, message: String },

    #[error("server returned HTTP {code} ({context})")]
    Status { code: u16, context: String },

    #[error("malformed response ({context}): {message}")]
    Malformed { context: String, message: String },
}

/// Interface implemented by concrete media backend adapters.
///
/// Implementations must be shareable across threads: rating writes for one
/// batch are issued concurrently against the same adapter.
pub trait MediaBackendAdapter: Send + Sync {
    /// Connection details, used to build art and stream URLs.
    fn auth(&self) -> &PlexServerAuth;
    fn fetch_libraries(&self) -> Result<Vec<BackendLibrary>, BackendError>;
    /// Lists a library's albums. A request still running at `deadline` is
    /// abandoned with an error.
    fn fetch_albums(
        &self,
        library_id: &str,
        deadline: Option<Instant>,
    ) -> Result<Vec<BackendAlbum>, BackendError>;
    fn fetch_album_tracks(
        &self,
        album_id: &str,
        deadline: Option<Instant>,
    ) -> Result<Vec<BackendTrack>, BackendError>;
    /// Persists a native 0-10 rating for one track.
    fn rate_track(&self, track_id: &str, native_rating: u8) -> Result<(), BackendError>;

    fn test_connection(&self) -> Result<(), BackendError> {
        let _ = self.fetch_libraries()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::{BackendError, PlexServerAuth};

    #[test]
    fn test_server_auth_trims_endpoint_and_token() {
        let auth = PlexServerAuth::new(" http://plex.local:32400/ ", " abc \n");
        assert_eq!(auth.endpoint, "http://plex.local:32400");
        assert_eq!(auth.token, "abc");
    }

    #[test]
    fn test_backend_error_display_names_context() {
        let error = BackendError::Status {
            code: 401,
            context: "list albums".to_string(),
        };
        assert_eq!(error.to_string(), "server returned HTTP 401 (list albums)");
    }
}
