//! Availability classification of a file.
//!
//! Pure: depends only on the record and the supplied time.

use super::FileRecord;

/// Current availability of a file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Availability {
    /// The file can be retrieved.
    Active,
    /// `expire_at` has passed.
    ExpiredByTime,
    /// No downloads remain.
    ExpiredByQuota,
}

impl Availability {
    /// Whether the file can still be retrieved.
    pub fn is_active(self) -> bool {
        self == Availability::Active
    }

    /// Short machine-readable reason, used in audit entries.
    pub fn as_str(self) -> &'static str {
        match self {
            Availability::Active => "active",
            Availability::ExpiredByTime => "expired_by_time",
            Availability::ExpiredByQuota => "expired_by_quota",
        }
    }
}

/// Classify a file at `now` (unix seconds).
///
/// Time is checked before quota, so a file that is both past its expiry and
/// out of downloads always reports `ExpiredByTime`.
pub fn evaluate(file: &FileRecord, now: i64) -> Availability {
    if !file.unlimited_time && file.expire_at > 0 && now > file.expire_at {
        return Availability::ExpiredByTime;
    }
    if !file.unlimited_downloads && file.downloads_remaining <= 0 {
        return Availability::ExpiredByQuota;
    }
    Availability::Active
}
