//! Persists star ratings back to the media server.

use std::thread;

use log::{debug, warn};

use crate::backends::{BackendError, MediaBackendAdapter};
use crate::catalog::RatingBatch;

/// One rating write that the server did not confirm.
#[derive(Debug, Clone, PartialEq)]
pub struct FailedRatingWrite {
    pub track_id: String,
    pub error: BackendError,
}

/// Failure of a rating batch. Writes not listed here were applied.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum RatingError {
    #[error("failed to save {} of {attempted} ratings ({})", .failed.len(), failure_details(.failed))]
    PartialFailure {
        attempted: usize,
        failed: Vec<FailedRatingWrite>,
    },
}

fn failure_details(failed: &[FailedRatingWrite]) -> String {
    failed
        .iter()
        .map(|write| format!("{}: {}", write.track_id, write.error))
        .collect::<Vec<_>>()
        .join("; ")
}

/// Writes every rating in `batch`, one request per track, all in flight at once.
///
/// There is no rollback: on `PartialFailure` the successful writes stay
/// applied. Rewriting a rating is idempotent, so callers may resend the whole
/// batch.
pub fn save_ratings(
    backend: &dyn MediaBackendAdapter,
    batch: &RatingBatch,
) -> Result<(), RatingError> {
    if batch.is_empty() {
        return Ok(());
    }
    debug!("RatingWriter: saving {} ratings", batch.len());

    let outcomes: Vec<(String, Result<(), BackendError>)> = thread::scope(|scope| {
        let handles: Vec<_> = batch
            .iter()
            .map(|(track_id, stars)| {
                let native_rating = stars.native();
                let handle = scope.spawn(move || backend.rate_track(track_id, native_rating));
                (track_id, handle)
            })
            .collect();
        handles
            .into_iter()
            .map(|(track_id, handle)| {
                let outcome = handle.join().unwrap_or_else(|_| {
                    Err(BackendError::Transport {
                        context: format!("rate track {track_id}"),
                        message: "rating writer thread panicked".to_string(),
                    })
                });
                (track_id.clone(), outcome)
            })
            .collect()
    });

    let failed: Vec<FailedRatingWrite> = outcomes
        .into_iter()
        .filter_map(|(track_id, outcome)| {
            outcome.err().map(|error| {
                warn!("RatingWriter: failed to save rating for track {track_id}: {error}");
                FailedRatingWrite { track_id, error }
            })
        })
        .collect();

    if failed.is_empty() {
        return Ok(());
    }
    Err(RatingError::PartialFailure {
        attempted: batch.len(),
        failed,
    })
}
