//! Unrated-track threshold policy.
//!
//! The persisted settings hold the policy as two raw strings. They are
//! normalized here into a [`ThresholdPolicy`], and the count bound is then
//! tightened per album because an album cannot require more unrated tracks
//! than it has.

use std::fmt;

pub const KIND_PERCENTAGE: &str = "percentage";
pub const KIND_COUNT: &str = "count";
pub const DEFAULT_PERCENTAGE: u32 = 50;
pub const MAX_PERCENTAGE: u32 = 100;
pub const MIN_COUNT: u32 = 1;
pub const MAX_COUNT: u32 = 1000;

/// Threshold settings exactly as persisted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawThreshold {
    pub kind: String,
    pub value: String,
}

impl Default for RawThreshold {
    fn default() -> Self {
        Self {
            kind: KIND_PERCENTAGE.to_string(),
            value: DEFAULT_PERCENTAGE.to_string(),
        }
    }
}

/// Rule deciding whether an album has enough unrated tracks to be shown.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ThresholdPolicy {
    /// Minimum share of unrated tracks, in percent.
    Percentage(u32),
    /// Minimum number of unrated tracks.
    Count(u32),
}

impl Default for ThresholdPolicy {
    fn default() -> Self {
        Self::Percentage(DEFAULT_PERCENTAGE)
    }
}

impl fmt::Display for ThresholdPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Percentage(value) => write!(f, "at least {value}% unrated tracks"),
            Self::Count(1) => write!(f, "at least 1 unrated track"),
            Self::Count(value) => write!(f, "at least {value} unrated tracks"),
        }
    }
}

impl ThresholdPolicy {
    /// Persistable kind string.
    pub fn kind(self) -> &'static str {
        match self {
            Self::Percentage(_) => KIND_PERCENTAGE,
            Self::Count(_) => KIND_COUNT,
        }
    }

    pub fn value(self) -> u32 {
        match self {
            Self::Percentage(value) | Self::Count(value) => value,
        }
    }

    pub fn to_raw(self) -> RawThreshold {
        RawThreshold {
            kind: self.kind().to_string(),
            value: self.value().to_string(),
        }
    }

    /// Tightens the policy for an album with `total_tracks` tracks.
    ///
    /// Count values are bounded by `min(MAX_COUNT, total_tracks)`; the lower
    /// bound wins when the album has no tracks at all.
    pub fn effective_for(self, total_tracks: usize) -> Self {
        match self {
            Self::Percentage(value) => Self::Percentage(value.min(MAX_PERCENTAGE)),
            Self::Count(value) => {
                let total = u32::try_from(total_tracks).unwrap_or(u32::MAX);
                let upper = MAX_COUNT.min(total).max(MIN_COUNT);
                Self::Count(value.clamp(MIN_COUNT, upper))
            }
        }
    }

    /// Returns true when an album with these counts satisfies the policy.
    ///
    /// Percentage checks use integer cross-multiplication so that an album
    /// sitting exactly on the threshold qualifies.
    pub fn qualifies(self, unrated_count: usize, total_tracks: usize) -> bool {
        if total_tracks == 0 {
            return false;
        }
        let unrated = unrated_count.min(total_tracks) as u64;
        match self.effective_for(total_tracks) {
            Self::Percentage(value) => unrated * 100 >= u64::from(value) * total_tracks as u64,
            Self::Count(value) => unrated >= u64::from(value),
        }
    }
}

/// Resolves persisted threshold settings into a valid policy.
///
/// An empty value reads as 50 under the stored kind. Unknown kinds and
/// non-numeric values fall back to `Percentage(50)`. Numeric values are
/// clamped into their kind's global range.
pub fn normalize_policy(raw: &RawThreshold) -> ThresholdPolicy {
    let value = match raw.value.trim() {
        "" => DEFAULT_PERCENTAGE.to_string(),
        trimmed => trimmed.to_string(),
    };
    let Ok(value) = value.parse::<i64>() else {
        return ThresholdPolicy::default();
    };
    match raw.kind.trim().to_ascii_lowercase().as_str() {
        KIND_PERCENTAGE => {
            ThresholdPolicy::Percentage(value.clamp(0, i64::from(MAX_PERCENTAGE)) as u32)
        }
        KIND_COUNT => {
            ThresholdPolicy::Count(value.clamp(i64::from(MIN_COUNT), i64::from(MAX_COUNT)) as u32)
        }
        _ => ThresholdPolicy::default(),
    }
}
