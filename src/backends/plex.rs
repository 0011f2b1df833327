//! Plex Media Server backend adapter implementation.

use std::time::{Duration, Instant};

use log::debug;
use serde_json::Value;

use crate::backends::{
    BackendAlbum, BackendError, BackendLibrary, BackendTrack, MediaBackendAdapter, PlexServerAuth,
};

const CLIENT_ID: &str = "audiograde";
const RATING_PLUGIN_IDENTIFIER: &str = "com.plexapp.plugins.library";
const TOKEN_HEADER: &str = "X-Plex-Token";

/// Plex adapter backed by `ureq`.
pub struct PlexAdapter {
    http_client: ureq::Agent,
    auth: PlexServerAuth,
}

impl PlexAdapter {
    /// Creates a new Plex adapter bound to one server.
    pub fn new(auth: PlexServerAuth, request_timeout: Duration) -> Self {
        let http_client = ureq::AgentBuilder::new()
            .timeout_connect(Duration::from_secs(5).min(request_timeout))
            .timeout_read(request_timeout)
            .timeout_write(request_timeout)
            .build();
        Self { http_client, auth }
    }

    fn api_url(&self, path: &str, params: &[(&str, String)]) -> String {
        if params.is_empty() {
            return format!("{}{}", self.auth.endpoint, path);
        }
        let query: Vec<String> = params
            .iter()
            .map(|(key, value)| format!("{key}={}", urlencoding::encode(value)))
            .collect();
        format!("{}{}?{}", self.auth.endpoint, path, query.join("&"))
    }

    fn request(&self, method: &str, url: &str) -> ureq::Request {
        self.http_client
            .request(method, url)
            .set("Accept", "application/json")
            .set(TOKEN_HEADER, &self.auth.token)
            .set("X-Plex-Client-Identifier", CLIENT_ID)
            .set("X-Plex-Product", CLIENT_ID)
    }

    fn map_call_error(context: &str, err: ureq::Error) -> BackendError {
        match err {
            ureq::Error::Status(code, _) => BackendError::Status {
                code,
                context: context.to_string(),
            },
            ureq::Error::Transport(transport) => BackendError::Transport {
                context: context.to_string(),
                message: transport.to_string(),
            },
        }
    }

    /// Sends `request`, bounded by `deadline` when one is given.
    ///
    /// ureq only reports 4xx/5xx as errors; anything else outside 2xx that it
    /// does not follow is rejected here.
    fn send(
        context: &str,
        request: ureq::Request,
        deadline: Option<Instant>,
    ) -> Result<ureq::Response, BackendError> {
        let request = match deadline {
            Some(deadline) => {
                let remaining = deadline.saturating_duration_since(Instant::now());
                if remaining.is_zero() {
                    return Err(BackendError::Transport {
                        context: context.to_string(),
                        message: "deadline exceeded before request was sent".to_string(),
                    });
                }
                request.timeout(remaining)
            }
            None => request,
        };
        let response = request
            .call()
            .map_err(|err| Self::map_call_error(context, err))?;
        let code = response.status();
        if !(200..300).contains(&code) {
            return Err(BackendError::Status {
                code,
                context: context.to_string(),
            });
        }
        Ok(response)
    }

    fn request_json(
        &self,
        context: &str,
        path: &str,
        deadline: Option<Instant>,
    ) -> Result<Value, BackendError> {
        let url = self.api_url(path, &[]);
        debug!("PlexAdapter: GET {}", url);
        let response = Self::send(context, self.request("GET", &url), deadline)?;
        let parsed: Value = response
            .into_json()
            .map_err(|err| BackendError::Malformed {
                context: context.to_string(),
                message: err.to_string(),
            })?;
        Ok(parsed)
    }

    fn media_container<'a>(payload: &'a Value, context: &str) -> Result<&'a Value, BackendError> {
        payload
            .get("MediaContainer")
            .filter(|value| value.is_object())
            .ok_or_else(|| BackendError::Malformed {
                context: context.to_string(),
                message: "response has no MediaContainer object".to_string(),
            })
    }

    fn array_or_single(value: Option<&Value>) -> Vec<&Value> {
        match value {
            Some(Value::Array(items)) => items.iter().collect(),
            Some(item @ Value::Object(_)) => vec![item],
            _ => Vec::new(),
        }
    }

    /// Plex keys are strings, but some proxies re-encode them as numbers.
    fn key_field(entry: &Value, field: &str) -> Option<String> {
        match entry.get(field)? {
            Value::String(text) if !text.trim().is_empty() => Some(text.trim().to_string()),
            Value::Number(number) => Some(number.to_string()),
            _ => None,
        }
    }

    fn text_field(entry: &Value, field: &str, fallback: &str) -> String {
        entry
            .get(field)
            .and_then(Value::as_str)
            .unwrap_or(fallback)
            .to_string()
    }

    pub(crate) fn parse_library(directory: &Value) -> Option<BackendLibrary> {
        Some(BackendLibrary {
            key: Self::key_field(directory, "key")?,
            title: Self::text_field(directory, "title", "Untitled Library"),
            kind: Self::text_field(directory, "type", ""),
        })
    }

    pub(crate) fn parse_album(metadata: &Value) -> Option<BackendAlbum> {
        let year = metadata.get("year").and_then(|value| {
            value
                .as_i64()
                .and_then(|number| i32::try_from(number).ok())
                .or_else(|| value.as_str().and_then(|text| text.trim().parse().ok()))
        });
        let thumb = metadata
            .get("thumb")
            .and_then(Value::as_str)
            .map(str::trim)
            .filter(|value| !value.is_empty())
            .map(ToOwned::to_owned);
        Some(BackendAlbum {
            rating_key: Self::key_field(metadata, "ratingKey")?,
            title: Self::text_field(metadata, "title", "Unknown Album"),
            artist: Self::text_field(metadata, "parentTitle", "Unknown Artist"),
            year,
            thumb,
        })
    }

    pub(crate) fn parse_track(metadata: &Value) -> Option<BackendTrack> {
        let duration_ms = metadata
            .get("duration")
            .and_then(|value| value.as_u64().or_else(|| value.as_f64().map(|ms| ms as u64)))
            .unwrap_or_default();
        let user_rating = metadata.get("userRating").and_then(|value| {
            value
                .as_f64()
                .or_else(|| value.as_str().and_then(|text| text.trim().parse().ok()))
        });
        let part_key = Self::array_or_single(metadata.get("Media"))
            .first()
            .and_then(|media| Self::array_or_single(media.get("Part")).first().copied())
            .and_then(|part| part.get("key"))
            .and_then(Value::as_str)
            .filter(|key| !key.trim().is_empty())
            .map(ToOwned::to_owned);
        Some(BackendTrack {
            rating_key: Self::key_field(metadata, "ratingKey")?,
            title: Self::text_field(metadata, "title", "Unknown Title"),
            duration_ms,
            user_rating,
            part_key,
        })
    }

    fn metadata_entries<T>(
        &self,
        context: &str,
        path: &str,
        deadline: Option<Instant>,
        parse: fn(&Value) -> Option<T>,
    ) -> Result<Vec<T>, BackendError> {
        let payload = self.request_json(context, path, deadline)?;
        let container = Self::media_container(&payload, context)?;
        Ok(Self::array_or_single(container.get("Metadata"))
            .into_iter()
            .filter_map(parse)
            .collect())
    }
}

impl MediaBackendAdapter for PlexAdapter {
    fn auth(&self) -> &PlexServerAuth {
        &self.auth
    }

    fn fetch_libraries(&self) -> Result<Vec<BackendLibrary>, BackendError> {
        let context = "list libraries";
        let payload = self.request_json(context, "/library/sections", None)?;
        let container = Self::media_container(&payload, context)?;
        Ok(Self::array_or_single(container.get("Directory"))
            .into_iter()
            .filter_map(Self::parse_library)
            .collect())
    }

    fn fetch_albums(
        &self,
        library_id: &str,
        deadline: Option<Instant>,
    ) -> Result<Vec<BackendAlbum>, BackendError> {
        let path = format!(
            "/library/sections/{}/albums",
            urlencoding::encode(library_id.trim())
        );
        self.metadata_entries("list albums", &path, deadline, Self::parse_album)
    }

    fn fetch_album_tracks(
        &self,
        album_id: &str,
        deadline: Option<Instant>,
    ) -> Result<Vec<BackendTrack>, BackendError> {
        let path = format!(
            "/library/metadata/{}/children",
            urlencoding::encode(album_id.trim())
        );
        self.metadata_entries("list tracks", &path, deadline, Self::parse_track)
    }

    fn rate_track(&self, track_id: &str, native_rating: u8) -> Result<(), BackendError> {
        let context = format!("rate track {track_id}");
        let trimmed_track_id = track_id.trim();
        if trimmed_track_id.is_empty() {
            return Err(BackendError::Transport {
                context,
                message: "track id cannot be empty".to_string(),
            });
        }
        let url = self.api_url(
            "/:/rate",
            &[
                ("key", trimmed_track_id.to_string()),
                ("identifier", RATING_PLUGIN_IDENTIFIER.to_string()),
                ("rating", native_rating.min(10).to_string()),
            ],
        );
        debug!("PlexAdapter: PUT {}", url);
        Self::send(&context, self.request("PUT", &url), None)?;
        Ok(())
    }
}
