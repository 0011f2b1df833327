//! Templated media URLs for cover art and audio previews.
//!
//! Every URL embeds the auth token as a query parameter so that it can be
//! handed directly to an image loader or audio player.

use crate::backends::PlexServerAuth;

/// Edge length requested from the photo transcoder.
pub const COVER_ART_SIZE_PX: u32 = 300;
/// Length of an audition clip.
pub const PREVIEW_CLIP_SECS: u32 = 30;
/// Default clip offset into the track.
pub const DEFAULT_PREVIEW_OFFSET_SECS: u32 = 30;

const TOKEN_PARAM: &str = "X-Plex-Token";

/// Builds a transcoded cover-art URL for an album thumbnail key.
pub fn cover_art_url(auth: &PlexServerAuth, thumb: &str) -> String {
    format!(
        "{}/photo/:/transcode?width={size}&height={size}&minSize=1&url={}&{TOKEN_PARAM}={}",
        auth.endpoint,
        urlencoding::encode(thumb),
        urlencoding::encode(&auth.token),
        size = COVER_ART_SIZE_PX,
    )
}

/// Builds a direct stream URL for a media part key such as `/library/parts/1/file.flac`.
pub fn stream_url(auth: &PlexServerAuth, part_key: &str) -> String {
    let separator = if part_key.contains('?') { '&' } else { '?' };
    format!(
        "{}{}{separator}{TOKEN_PARAM}={}",
        auth.endpoint,
        part_key,
        urlencoding::encode(&auth.token)
    )
}

/// Builds a bounded audition clip URL for a track.
pub fn preview_clip_url(auth: &PlexServerAuth, track_id: &str, offset_secs: u32) -> String {
    format!(
        "{}/library/parts/{}/file?offset={offset_secs}&duration={PREVIEW_CLIP_SECS}&{TOKEN_PARAM}={}",
        auth.endpoint,
        urlencoding::encode(track_id),
        urlencoding::encode(&auth.token)
    )
}

/// Replaces the token query value in a URL so it can be logged.
pub fn redact_token(url: &str) -> String {
    let needle = format!("{TOKEN_PARAM}=");
    let Some(start) = url.find(&needle) else {
        return url.to_string();
    };
    let value_start = start + needle.len();
    let value_end = url[value_start..]
        .find('&')
        .map(|offset| value_start + offset)
        .unwrap_or(url.len());
    format!("{}<redacted>{}", &url[..value_start], &url[value_end..])
}

#[cfg(test)]
mod tests {
    use super::{cover_art_url, preview_clip_url, redact_token, stream_url};
    use crate::backends::PlexServerAuth;

    fn auth() -> PlexServerAuth {
        PlexServerAuth::new("http://plex.test:32400/", "secret token")
    }

    #[test]
    fn test_cover_art_url_encodes_thumb_and_token() {
        let url = cover_art_url(&auth(), "/library/metadata/7/thumb/1690000000");
        assert_eq!(
            url,
            "http://plex.test:32400/photo/:/transcode?width=300&height=300&minSize=1\
             &url=%2Flibrary%2Fmetadata%2F7%2Fthumb%2F1690000000&X-Plex-Token=secret%20token"
        );
    }

    #[test]
    fn test_stream_url_appends_token_to_part_key() {
        let url = stream_url(&auth(), "/library/parts/55/1600000000/file.flac");
        assert_eq!(
            url,
            "http://plex.test:32400/library/parts/55/1600000000/file.flac?X-Plex-Token=secret%20token"
        );
    }

    #[test]
    fn test_stream_url_keeps_existing_query() {
        let url = stream_url(&auth(), "/library/parts/55/file.mp3?download=0");
        assert!(url.ends_with("file.mp3?download=0&X-Plex-Token=secret%20token"));
    }

    #[test]
    fn test_preview_clip_url_bounds_clip_length() {
        let url = preview_clip_url(&auth(), "991", 45);
        assert_eq!(
            url,
            "http://plex.test:32400/library/parts/991/file?offset=45&duration=30&X-Plex-Token=secret%20token"
        );
    }

    #[test]
    fn test_redact_token_hides_only_token_value() {
        let url = "http://plex.test/:/rate?key=1&X-Plex-Token=abc123&rating=8";
        assert_eq!(
            redact_token(url),
            "http://plex.test/:/rate?key=1&X-Plex-Token=<redacted>&rating=8"
        );
        assert_eq!(redact_token("http://plex.test/a"), "http://plex.test/a");
    }
}
