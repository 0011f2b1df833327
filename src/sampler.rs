//! Random selection of an album with enough unrated tracks.
//!
//! A selection pass fetches the library's album list once, shuffles it, then
//! walks the shuffled order fetching one track list at a time. The walk stops
//! after [`MAX_ALBUMS_TO_CHECK`] evaluated albums or [`MAX_CANDIDATES`]
//! qualifying ones, and the result is drawn uniformly from the qualifying set.
//! Track lists are fetched strictly one after another to keep the request
//! volume against the server bounded.

use std::time::{Duration, Instant};

use log::{debug, info, warn};
use rand::{rngs::StdRng, Rng, SeedableRng};

use crate::backends::{BackendAlbum, BackendError, MediaBackendAdapter};
use crate::catalog::{is_unrated, normalize_album, Album};
use crate::recently_shown::RecentlyShown;
use crate::threshold::{normalize_policy, RawThreshold, ThresholdPolicy};

/// Albums whose track lists may be fetched in one pass.
pub const MAX_ALBUMS_TO_CHECK: usize = 50;
/// Qualifying albums collected before a pass stops early.
pub const MAX_CANDIDATES: usize = 25;
/// Wall-clock budget callers use unless configured otherwise.
pub const DEFAULT_SELECTION_BUDGET: Duration = Duration::from_secs(10);
/// Initial pass plus one retry after clearing the history.
const MAX_SELECTION_PASSES: usize = 2;

/// Failure of a selection request.
#[derive(Debug, thiserror::Error)]
pub enum SelectionError {
    #[error("catalog unavailable: {0}")]
    Upstream(#[from] BackendError),

    #[error("no album in library {library_id} matches the current criteria")]
    NotFound { library_id: String },

    #[error("could not find a matching album within {}s", .budget.as_secs())]
    Timeout { budget: Duration },
}

/// Picks albums without immediate repeats.
///
/// One sampler owns one history; selections take `&mut self`, so the
/// check-then-record on the history can never interleave with another call.
pub struct AlbumSampler {
    recently_shown: RecentlyShown,
    rng: StdRng,
}

impl AlbumSampler {
    pub fn new() -> Self {
        let mut seed = [0u8; 32];
        if let Err(err) = getrandom::fill(&mut seed) {
            warn!("AlbumSampler: OS randomness unavailable ({err}); seeding from clock");
            let nanos = std::time::SystemTime::now()
                .duration_since(std::time::UNIX_EPOCH)
                .map(|elapsed| elapsed.as_nanos())
                .unwrap_or_default();
            seed[..16].copy_from_slice(&nanos.to_le_bytes());
        }
        Self::with_seed(seed)
    }

    pub fn with_seed(seed: [u8; 32]) -> Self {
        Self {
            recently_shown: RecentlyShown::default(),
            rng: StdRng::from_seed(seed),
        }
    }

    pub fn recently_shown(&self) -> &RecentlyShown {
        &self.recently_shown
    }

    /// Selects one album from `library_id` satisfying `threshold`.
    ///
    /// The history is only written when an album is returned; a timeout or
    /// upstream failure leaves it untouched, except for the history clear that
    /// precedes the retry pass.
    pub fn select_album(
        &mut self,
        backend: &dyn MediaBackendAdapter,
        library_id: &str,
        threshold: &RawThreshold,
        budget: Duration,
    ) -> Result<Album, SelectionError> {
        let deadline = Instant::now().checked_add(budget);
        let policy = normalize_policy(threshold);
        debug!(
            "AlbumSampler: selecting from library {} with policy {:?}",
            library_id, policy
        );

        for pass in 0..MAX_SELECTION_PASSES {
            let candidates = self.scan_library(backend, library_id, policy, deadline, budget)?;
            if !candidates.is_empty() {
                return Ok(self.pick(candidates));
            }
            if self.recently_shown.is_empty() || pass + 1 == MAX_SELECTION_PASSES {
                break;
            }
            info!(
                "AlbumSampler: nothing matched outside {} recently shown albums; clearing history and retrying",
                self.recently_shown.len()
            );
            self.recently_shown.clear();
        }

        Err(SelectionError::NotFound {
            library_id: library_id.to_string(),
        })
    }

    fn scan_library(
        &mut self,
        backend: &dyn MediaBackendAdapter,
        library_id: &str,
        policy: ThresholdPolicy,
        deadline: Option<Instant>,
        budget: Duration,
    ) -> Result<Vec<Album>, SelectionError> {
        check_deadline(deadline, budget)?;
        let mut albums = backend
            .fetch_albums(library_id, deadline)
            .map_err(|err| upstream_or_timeout(err, deadline, budget))?;
        self.shuffle(&mut albums);

        let mut candidates = Vec::new();
        let mut evaluated = 0usize;
        for album in albums {
            if evaluated >= MAX_ALBUMS_TO_CHECK || candidates.len() >= MAX_CANDIDATES {
                break;
            }
            if self.recently_shown.contains(&album.rating_key) {
                continue;
            }
            check_deadline(deadline, budget)?;
            evaluated += 1;
            match evaluate_album(backend, &album, policy, deadline) {
                Ok(Some(candidate)) => candidates.push(candidate),
                Ok(None) => {}
                Err(err) => {
                    check_deadline(deadline, budget)?;
                    warn!(
                        "AlbumSampler: skipping album {} ({}): {}",
                        album.rating_key, album.title, err
                    );
                }
            }
        }
        debug!(
            "AlbumSampler: evaluated {} albums, {} qualified",
            evaluated,
            candidates.len()
        );
        Ok(candidates)
    }

    // Fisher-Yates.
    fn shuffle<T>(&mut self, items: &mut [T]) {
        for i in (1..items.len()).rev() {
            let j = self.rng.gen_range(0..=i);
            items.swap(i, j);
        }
    }

    fn pick(&mut self, mut candidates: Vec<Album>) -> Album {
        let index = self.rng.gen_range(0..candidates.len());
        let album = candidates.swap_remove(index);
        if let Some(evicted) = self.recently_shown.record(&album.id) {
            debug!("AlbumSampler: history full, forgot album {}", evicted);
        }
        info!(
            "AlbumSampler: selected album {} ({} - {})",
            album.id, album.artist, album.title
        );
        album
    }
}

impl Default for AlbumSampler {
    fn default() -> Self {
        Self::new()
    }
}

fn check_deadline(deadline: Option<Instant>, budget: Duration) -> Result<(), SelectionError> {
    match deadline {
        Some(deadline) if Instant::now() >= deadline => Err(SelectionError::Timeout { budget }),
        _ => Ok(()),
    }
}

/// A request cut off by the deadline is a timeout, not an upstream failure.
fn upstream_or_timeout(
    err: BackendError,
    deadline: Option<Instant>,
    budget: Duration,
) -> SelectionError {
    match check_deadline(deadline, budget) {
        Err(timeout) => timeout,
        Ok(()) => SelectionError::Upstream(err),
    }
}

fn evaluate_album(
    backend: &dyn MediaBackendAdapter,
    album: &BackendAlbum,
    policy: ThresholdPolicy,
    deadline: Option<Instant>,
) -> Result<Option<Album>, BackendError> {
    let tracks = backend.fetch_album_tracks(&album.rating_key, deadline)?;
    let total = tracks.len();
    let unrated = tracks.iter().filter(|track| is_unrated(track)).count();
    let qualifies = policy.qualifies(unrated, total);
    debug!(
        "AlbumSampler: album {} has {}/{} unrated tracks, qualifies={}",
        album.rating_key, unrated, total, qualifies
    );
    Ok(qualifies.then(|| normalize_album(backend.auth(), album.clone(), tracks)))
}
