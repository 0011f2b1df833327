//! Rating session: the consumer side of the album sampler and rating writer.
//!
//! The session owns the sampler (and so the recently-shown history) for the
//! lifetime of the process, keeps the album on screen plus the ratings staged
//! for it, and applies the caller-side recovery rules: a timed-out selection
//! resets the threshold to its default and retries once.

use std::io::{self, BufRead, Write};
use std::path::PathBuf;

use log::{debug, info, warn};

use crate::backends::{BackendError, MediaBackendAdapter};
use crate::catalog::{
    music_libraries, Album, LibraryRef, RatingBatch, StarRating, Track, MAX_STARS,
};
use crate::config::{Config, ThresholdConfig};
use crate::config_persistence::persist_config_file;
use crate::media_urls::{preview_clip_url, redact_token, DEFAULT_PREVIEW_OFFSET_SECS};
use crate::rating_writer::{save_ratings, RatingError};
use crate::sampler::{AlbumSampler, SelectionError};
use crate::threshold::ThresholdPolicy;

const PREFERRED_LIBRARY_TITLE: &str = "music";

#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error("the server has no music libraries")]
    NoMusicLibrary,

    #[error("no album is loaded")]
    NoAlbum,

    #[error("track {0} is not on this album")]
    NoSuchTrack(usize),

    #[error("ratings go from 1 to 5 stars, got {0}")]
    InvalidStars(u8),

    #[error("no preview available for track {0}")]
    NoPreview(usize),

    #[error(transparent)]
    Backend(#[from] BackendError),

    #[error(transparent)]
    Rating(#[from] RatingError),
}

/// Picks the library to sample from.
///
/// Preference order: the saved library if it still exists, a library titled
/// "Music", then the first library.
pub fn choose_library<'a>(
    libraries: &'a [LibraryRef],
    saved_library_id: Option<&str>,
) -> Option<&'a LibraryRef> {
    saved_library_id
        .and_then(|saved| libraries.iter().find(|library| library.id == saved))
        .or_else(|| {
            libraries
                .iter()
                .find(|library| library.title.trim().eq_ignore_ascii_case(PREFERRED_LIBRARY_TITLE))
        })
        .or_else(|| libraries.first())
}

/// Formats seconds as `M:SS`.
pub fn format_duration(seconds: f64) -> String {
    let total = if seconds.is_finite() && seconds > 0.0 {
        seconds.floor() as u64
    } else {
        0
    };
    format!("{}:{:02}", total / 60, total % 60)
}

fn star_bar(stars: u8) -> String {
    let filled = stars.min(MAX_STARS) as usize;
    format!(
        "{}{}",
        "★".repeat(filled),
        "☆".repeat(MAX_STARS as usize - filled)
    )
}

/// Renders an album as text, showing staged ratings over existing ones.
pub fn render_album(album: &Album, staged: &RatingBatch) -> String {
    let mut lines = Vec::with_capacity(album.tracks.len() + 2);
    let year = album
        .year
        .map(|year| format!(" ({year})"))
        .unwrap_or_default();
    lines.push(format!("{} - {}{}", album.artist, album.title, year));
    if let Some(cover_url) = album.cover_url.as_deref() {
        lines.push(format!("cover: {}", redact_token(cover_url)));
    }
    for (index, track) in album.tracks.iter().enumerate() {
        let stars = staged
            .get(&track.id)
            .map(|rating| rating.stars())
            .unwrap_or(track.rating);
        let preview_marker = if track.preview_url.is_some() { "" } else { "  (no preview)" };
        lines.push(format!(
            "{:>3}. {:<40} {:>6}  {}{}",
            index + 1,
            track.title,
            format_duration(track.duration_secs),
            star_bar(stars),
            preview_marker
        ));
    }
    lines.join("\n")
}

/// One user's rating session against one server.
pub struct RaterSession<B: MediaBackendAdapter> {
    backend: B,
    sampler: AlbumSampler,
    config: Config,
    config_file: PathBuf,
    current_album: Option<Album>,
    staged_ratings: RatingBatch,
}

impl<B: MediaBackendAdapter> RaterSession<B> {
    pub fn new(backend: B, sampler: AlbumSampler, config: Config, config_file: PathBuf) -> Self {
        Self {
            backend,
            sampler,
            config,
            config_file,
            current_album: None,
            staged_ratings: RatingBatch::new(),
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn current_album(&self) -> Option<&Album> {
        self.current_album.as_ref()
    }

    pub fn staged_ratings(&self) -> &RatingBatch {
        &self.staged_ratings
    }

    fn persist_config(&self) {
        if let Err(err) = persist_config_file(&self.config, &self.config_file) {
            warn!("RaterSession: {}", err);
        }
    }

    /// Resolves the library to sample from and remembers the choice.
    pub fn resolve_library(&mut self) -> Result<LibraryRef, SessionError> {
        let libraries = music_libraries(&self.backend)?;
        let chosen = choose_library(&libraries, self.config.library.selected())
            .cloned()
            .ok_or(SessionError::NoMusicLibrary)?;
        if self.config.library.selected() != Some(chosen.id.as_str()) {
            info!(
                "RaterSession: using library {} ({})",
                chosen.id, chosen.title
            );
            self.config.library.selected_library_id = chosen.id.clone();
            self.persist_config();
        }
        Ok(chosen)
    }

    fn reset_threshold_to_default(&mut self) {
        self.config.threshold = ThresholdConfig::from(ThresholdPolicy::default().to_raw());
        self.persist_config();
    }

    /// Loads a new album, replacing the current one and its staged ratings.
    pub fn next_album(&mut self, library_id: &str) -> Result<&Album, SelectionError> {
        let budget = self.config.selection.selection_budget();
        let threshold = self.config.threshold.raw();
        let album = match self
            .sampler
            .select_album(&self.backend, library_id, &threshold, budget)
        {
            Err(SelectionError::Timeout { .. }) => {
                warn!(
                    "Could not find any albums matching these criteria. Resetting to default settings."
                );
                self.reset_threshold_to_default();
                let threshold = self.config.threshold.raw();
                self.sampler
                    .select_album(&self.backend, library_id, &threshold, budget)?
            }
            result => result?,
        };
        self.staged_ratings.clear();
        Ok(&*self.current_album.insert(album))
    }

    fn track(&self, track_number: usize) -> Result<&Track, SessionError> {
        let album = self.current_album.as_ref().ok_or(SessionError::NoAlbum)?;
        track_number
            .checked_sub(1)
            .and_then(|index| album.tracks.get(index))
            .ok_or(SessionError::NoSuchTrack(track_number))
    }

    /// Saves one rating right away and stages it for the album.
    pub fn rate_track(&mut self, track_number: usize, stars: u8) -> Result<(), SessionError> {
        let track_id = self.track(track_number)?.id.clone();
        let rating = StarRating::new(stars).ok_or(SessionError::InvalidStars(stars))?;
        let single = RatingBatch::from([(track_id.clone(), rating)]);
        save_ratings(&self.backend, &single)?;
        info!("RaterSession: saved {} stars for track {}", stars, track_id);
        self.staged_ratings.insert(track_id, rating);
        Ok(())
    }

    /// Re-sends every staged rating. Returns the number of ratings sent.
    pub fn save_staged(&mut self) -> Result<usize, RatingError> {
        save_ratings(&self.backend, &self.staged_ratings)?;
        Ok(self.staged_ratings.len())
    }

    /// Stream and clip URLs for a track.
    pub fn preview_urls(&self, track_number: usize) -> Result<(String, String), SessionError> {
        let track = self.track(track_number)?;
        let stream = track
            .preview_url
            .clone()
            .ok_or(SessionError::NoPreview(track_number))?;
        let clip = preview_clip_url(self.backend.auth(), &track.id, DEFAULT_PREVIEW_OFFSET_SECS);
        Ok((stream, clip))
    }

    fn show_next_album<W: Write>(&mut self, library_id: &str, output: &mut W) -> io::Result<()> {
        debug!(
            "RaterSession: {} albums in recently shown history",
            self.sampler.recently_shown().len()
        );
        match self.next_album(library_id) {
            Ok(album) => {
                let text = render_album(album, &RatingBatch::new());
                writeln!(output, "{text}")
            }
            Err(SelectionError::NotFound { .. }) => {
                writeln!(output, "No albums found matching the current criteria.")
            }
            Err(err) => writeln!(output, "Failed to fetch album: {err}"),
        }
    }

    /// Runs the line-oriented rating loop until `quit` or end of input.
    pub fn run_interactive<R: BufRead, W: Write>(
        &mut self,
        library_id: &str,
        input: R,
        mut output: W,
    ) -> io::Result<()> {
        self.show_next_album(library_id, &mut output)?;
        writeln!(output, "{HELP_TEXT}")?;

        for line in input.lines() {
            let line = line?;
            let mut words = line.split_whitespace();
            let Some(command) = words.next() else {
                continue;
            };
            let arguments: Vec<&str> = words.collect();
            match (command, arguments.as_slice()) {
                ("q" | "quit" | "exit", _) => break,
                ("n" | "next", _) => self.show_next_album(library_id, &mut output)?,
                ("l" | "list", _) => match self.current_album() {
                    Some(album) => writeln!(output, "{}", render_album(album, self.staged_ratings()))?,
                    None => writeln!(output, "{}", SessionError::NoAlbum)?,
                },
                ("p" | "play", [track]) => match track.parse::<usize>() {
                    Ok(track_number) => match self.preview_urls(track_number) {
                        Ok((stream, clip)) => {
                            writeln!(output, "stream: {stream}")?;
                            writeln!(output, "clip:   {clip}")?;
                        }
                        Err(err) => writeln!(output, "{err}")?,
                    },
                    Err(_) => writeln!(output, "usage: play TRACK")?,
                },
                ("r" | "rate", [track, stars]) => {
                    match (track.parse::<usize>(), stars.parse::<u8>()) {
                        (Ok(track_number), Ok(stars)) => {
                            match self.rate_track(track_number, stars) {
                                Ok(()) => writeln!(output, "Saved.")?,
                                Err(err) => writeln!(output, "Failed to save rating: {err}")?,
                            }
                        }
                        _ => writeln!(output, "usage: rate TRACK STARS")?,
                    }
                }
                ("s" | "save", _) => match self.save_staged() {
                    Ok(0) => writeln!(output, "Nothing to save.")?,
                    Ok(count) => writeln!(output, "Saved {count} ratings.")?,
                    Err(err) => writeln!(output, "Failed to save ratings: {err}")?,
                },
                ("h" | "help" | "?", _) => writeln!(output, "{HELP_TEXT}")?,
                _ => writeln!(output, "Unknown command. {HELP_TEXT}")?,
            }
            output.flush()?;
        }
        Ok(())
    }
}

const HELP_TEXT: &str =
    "commands: next | list | play TRACK | rate TRACK STARS | save | help | quit";
