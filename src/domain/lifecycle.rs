//! Lifecycle policies shared by every capturable aggregate.
//!
//! - `Phase`: Captured -> DownloadRequested -> Downloaded
//! - `Engagement`: overwrite-only counter snapshot
//! - `ExpirationPolicy`: time-to-live for ephemeral content

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use super::error::ValidationError;
use super::values::{counter, LocalPath};

/// Download phase of an artifact
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "phase")]
pub enum Phase {
    /// Initial state, reached only through a capture factory
    Captured,

    /// Download asked for at least once; re-requests bump `attempts`
    DownloadRequested {
        requested_at: DateTime<Utc>,
        attempts: u32,
    },

    /// Terminal
    Downloaded {
        downloaded_at: DateTime<Utc>,
        local_path: LocalPath,
    },
}

impl Default for Phase {
    fn default() -> Self {
        Self::Captured
    }
}

impl Phase {
    pub fn is_downloaded(&self) -> bool {
        matches!(self, Phase::Downloaded { .. })
    }

    /// Next phase for a download request, or `None` once downloaded
    pub fn requested(&self, now: DateTime<Utc>) -> Option<Phase> {
        match self {
            Phase::Captured => Some(Phase::DownloadRequested {
                requested_at: now,
                attempts: 1,
            }),
            Phase::DownloadRequested { attempts, .. } => Some(Phase::DownloadRequested {
                requested_at: now,
                attempts: attempts + 1,
            }),
            Phase::Downloaded { .. } => None,
        }
    }

    /// Terminal phase for a completed download, or `None` if already there
    pub fn completed(&self, local_path: LocalPath, now: DateTime<Utc>) -> Option<Phase> {
        if self.is_downloaded() {
            return None;
        }
        Some(Phase::Downloaded {
            downloaded_at: now,
            local_path,
        })
    }

    pub fn local_path(&self) -> Option<&LocalPath> {
        match self {
            Phase::Downloaded { local_path, .. } => Some(local_path),
            _ => None,
        }
    }

    pub fn downloaded_at(&self) -> Option<DateTime<Utc>> {
        match self {
            Phase::Downloaded { downloaded_at, .. } => Some(*downloaded_at),
            _ => None,
        }
    }

    pub fn download_attempts(&self) -> u32 {
        match self {
            Phase::DownloadRequested { attempts, .. } => *attempts,
            _ => 0,
        }
    }
}

/// Latest known engagement counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Engagement {
    pub views: u64,
    pub likes: u64,
    pub comments: u64,
    pub shares: u64,
    pub saves: u64,
}

/// Engagement counters as the producer delivers them (possibly negative)
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawEngagement {
    pub views: Option<i64>,
    pub likes: Option<i64>,
    pub comments: Option<i64>,
    pub shares: Option<i64>,
    pub saves: Option<i64>,
}

impl Engagement {
    pub fn from_raw(raw: &RawEngagement) -> Result<Self, ValidationError> {
        Ok(Self {
            views: counter("views", raw.views)?,
            likes: counter("likes", raw.likes)?,
            comments: counter("comments", raw.comments)?,
            shares: counter("shares", raw.shares)?,
            saves: counter("saves", raw.saves)?,
        })
    }

    pub fn total_interactions(&self) -> u64 {
        self.likes + self.comments + self.shares + self.saves
    }

    /// Counters that went down relative to an earlier snapshot
    pub fn regressions(&self, earlier: &Engagement) -> Vec<&'static str> {
        let pairs = [
            ("views", self.views, earlier.views),
            ("likes", self.likes, earlier.likes),
            ("comments", self.comments, earlier.comments),
            ("shares", self.shares, earlier.shares),
            ("saves", self.saves, earlier.saves),
        ];
        pairs
            .into_iter()
            .filter(|(_, now, before)| now < before)
            .map(|(name, _, _)| name)
            .collect()
    }
}

/// Time-to-live for ephemeral content such as stories
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExpirationPolicy {
    ttl: Duration,
}

impl Default for ExpirationPolicy {
    fn default() -> Self {
        Self::new(Duration::hours(24))
    }
}

impl ExpirationPolicy {
    pub fn new(ttl: Duration) -> Self {
        Self { ttl }
    }

    /// A positive TTL in hours that chrono can represent
    pub fn try_hours(hours: i64) -> Result<Self, ValidationError> {
        if hours <= 0 {
            return Err(ValidationError::new("ttlHours", "must be positive"));
        }
        Duration::try_hours(hours)
            .map(Self::new)
            .ok_or_else(|| ValidationError::new("ttlHours", format!("{} hours is out of range", hours)))
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// `None` when the sum overflows the representable range
    pub fn expires_at(&self, posted_at: DateTime<Utc>) -> Option<DateTime<Utc>> {
        posted_at.checked_add_signed(self.ttl)
    }

    /// True once `now` is strictly past `expires_at`
    pub fn is_expired(expires_at: DateTime<Utc>, now: DateTime<Utc>) -> bool {
        now > expires_at
    }
}
