//! Instagram: posts, reels and stories.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::json;

use super::{identity, Capture};
use crate::domain::values::{bounded_text, optional_url, required_url};
use crate::domain::{
    Archivable, Artifact, ArtifactSchema, AggregateType, DomainError, DomainResult, Dimensions,
    Engagement, EventAction, ExpirationPolicy, IdFormat, Likeable, MediaUrl, RawEngagement, Tags,
    ValidationError,
};

const MAX_CAPTION_CHARS: usize = 2200;

// ============================================================================
// Post
// ============================================================================

/// Post payload as delivered by the capture producer
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawPost {
    pub id: Option<String>,
    pub owner_id: Option<String>,
    pub caption: Option<String>,
    #[serde(default)]
    pub media_urls: Vec<String>,
    #[serde(default)]
    pub is_video: bool,
    pub video_url: Option<String>,
    pub width: Option<i64>,
    pub height: Option<i64>,
    #[serde(default)]
    pub tags: Vec<String>,
    pub location: Option<String>,
    pub posted_at: Option<DateTime<Utc>>,
    #[serde(flatten)]
    pub engagement: RawEngagement,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PostAttributes {
    pub caption: String,
    pub media_urls: Vec<MediaUrl>,
    pub is_video: bool,
    pub video_url: Option<MediaUrl>,
    pub dimensions: Option<Dimensions>,
    pub tags: Tags,
    pub location: Option<String>,
    pub posted_at: Option<DateTime<Utc>>,
}

impl ArtifactSchema for PostAttributes {
    const AGGREGATE_TYPE: AggregateType = AggregateType::Post;
    const ID_FORMAT: IdFormat = IdFormat::Slug;

    fn validate(&self) -> Result<(), ValidationError> {
        bounded_text("caption", &self.caption, MAX_CAPTION_CHARS)?;
        if self.is_video && self.video_url.is_none() {
            return Err(ValidationError::new("videoUrl", "is required when isVideo is true"));
        }
        if self.media_urls.is_empty() && self.video_url.is_none() {
            return Err(ValidationError::new("mediaUrls", "must contain at least one URL"));
        }
        Ok(())
    }

    fn media_urls(&self) -> Vec<&MediaUrl> {
        self.video_url.iter().chain(self.media_urls.iter()).collect()
    }
}

impl Likeable for PostAttributes {}
impl Archivable for PostAttributes {}

/// A feed post (single image, carousel or video)
pub type Post = Artifact<PostAttributes>;

impl Capture for Post {
    type Raw = RawPost;

    fn capture(raw: RawPost) -> DomainResult<Self> {
        let (id, owner) = identity(raw.id, IdFormat::Slug, "ownerId", raw.owner_id)?;
        let caption = raw.caption.unwrap_or_default();
        let media_urls = raw
            .media_urls
            .into_iter()
            .map(|url| MediaUrl::new(url).map_err(|e| e.for_field("mediaUrls")))
            .collect::<Result<Vec<_>, _>>()?;

        let attributes = PostAttributes {
            tags: Tags::new(raw.tags).merged(&Tags::from_text(&caption)),
            caption,
            media_urls,
            is_video: raw.is_video,
            video_url: optional_url("videoUrl", raw.video_url)?,
            dimensions: Dimensions::from_raw(raw.width, raw.height)?,
            location: raw.location,
            posted_at: raw.posted_at,
        };
        let engagement = Engagement::from_raw(&raw.engagement)?;

        Artifact::from_parts(id, owner, attributes, engagement)
    }
}

impl Post {
    pub fn is_video(&self) -> bool {
        self.attributes().is_video
    }
}

// ============================================================================
// Reel
// ============================================================================

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawReel {
    pub id: Option<String>,
    pub owner_id: Option<String>,
    pub caption: Option<String>,
    pub video_url: Option<String>,
    pub thumbnail_url: Option<String>,
    pub duration_seconds: Option<f64>,
    pub audio_title: Option<String>,
    pub posted_at: Option<DateTime<Utc>>,
    #[serde(flatten)]
    pub engagement: RawEngagement,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReelAttributes {
    pub caption: String,
    pub video_url: MediaUrl,
    pub thumbnail_url: Option<MediaUrl>,
    pub duration_seconds: Option<f64>,
    pub audio_title: Option<String>,
    pub tags: Tags,
    pub posted_at: Option<DateTime<Utc>>,
}

impl ArtifactSchema for ReelAttributes {
    const AGGREGATE_TYPE: AggregateType = AggregateType::Reel;
    const ID_FORMAT: IdFormat = IdFormat::Slug;

    fn validate(&self) -> Result<(), ValidationError> {
        bounded_text("caption", &self.caption, MAX_CAPTION_CHARS)?;
        match self.duration_seconds {
            Some(d) if !d.is_finite() || d <= 0.0 => Err(ValidationError::new(
                "durationSeconds",
                format!("{} must be a positive number", d),
            )),
            _ => Ok(()),
        }
    }

    fn media_urls(&self) -> Vec<&MediaUrl> {
        vec![&self.video_url]
    }
}

impl Likeable for ReelAttributes {}

/// Short-form vertical video
pub type Reel = Artifact<ReelAttributes>;

impl Capture for Reel {
    type Raw = RawReel;

    fn capture(raw: RawReel) -> DomainResult<Self> {
        let (id, owner) = identity(raw.id, IdFormat::Slug, "ownerId", raw.owner_id)?;
        let caption = raw.caption.unwrap_or_default();

        let attributes = ReelAttributes {
            tags: Tags::from_text(&caption),
            caption,
            video_url: required_url("videoUrl", raw.video_url)?,
            thumbnail_url: optional_url("thumbnailUrl", raw.thumbnail_url)?,
            duration_seconds: raw.duration_seconds,
            audio_title: raw.audio_title,
            posted_at: raw.posted_at,
        };
        let engagement = Engagement::from_raw(&raw.engagement)?;

        Artifact::from_parts(id, owner, attributes, engagement)
    }
}

// ============================================================================
// Story
// ============================================================================

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawStory {
    pub id: Option<String>,
    pub owner_id: Option<String>,
    pub media_url: Option<String>,
    #[serde(default)]
    pub is_video: bool,
    pub video_url: Option<String>,
    #[serde(default)]
    pub mentions: Vec<String>,
    pub posted_at: Option<DateTime<Utc>>,
    pub expires_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoryAttributes {
    pub media_url: MediaUrl,
    pub is_video: bool,
    pub video_url: Option<MediaUrl>,
    pub mentions: Vec<String>,
    pub posted_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

impl ArtifactSchema for StoryAttributes {
    const AGGREGATE_TYPE: AggregateType = AggregateType::Story;
    const ID_FORMAT: IdFormat = IdFormat::Numeric;

    fn validate(&self) -> Result<(), ValidationError> {
        if self.is_video && self.video_url.is_none() {
            return Err(ValidationError::new("videoUrl", "is required when isVideo is true"));
        }
        if self.expires_at <= self.posted_at {
            return Err(ValidationError::new("expiresAt", "must be after postedAt"));
        }
        Ok(())
    }

    fn media_urls(&self) -> Vec<&MediaUrl> {
        match &self.video_url {
            Some(video) => vec![video],
            None => vec![&self.media_url],
        }
    }
}

/// Ephemeral 24h content
pub type Story = Artifact<StoryAttributes>;

impl Capture for Story {
    type Raw = RawStory;

    fn capture(raw: RawStory) -> DomainResult<Self> {
        Story::capture_with_policy(raw, ExpirationPolicy::default())
    }
}

impl Story {
    /// Capture, deriving `expiresAt` from `policy` when the payload omits it
    pub fn capture_with_policy(raw: RawStory, policy: ExpirationPolicy) -> DomainResult<Self> {
        let (id, owner) = identity(raw.id, IdFormat::Numeric, "ownerId", raw.owner_id)?;
        let posted_at = raw.posted_at.ok_or_else(|| ValidationError::missing("postedAt"))?;

        let attributes = StoryAttributes {
            media_url: required_url("mediaUrl", raw.media_url)?,
            is_video: raw.is_video,
            video_url: optional_url("videoUrl", raw.video_url)?,
            mentions: raw.mentions,
            posted_at,
            expires_at: match raw.expires_at {
                Some(expires_at) => expires_at,
                None => policy
                    .expires_at(posted_at)
                    .ok_or_else(|| ValidationError::new("expiresAt", "out of range"))?,
            },
        };

        Artifact::from_parts(id, owner, attributes, Engagement::default())
    }

    pub fn expires_at(&self) -> DateTime<Utc> {
        self.attributes().expires_at
    }

    /// Recomputed against the clock on every call
    pub fn is_expired(&self) -> bool {
        self.is_expired_at(Utc::now())
    }

    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        ExpirationPolicy::is_expired(self.expires_at(), now)
    }

    pub fn viewed_at(&self) -> Option<DateTime<Utc>> {
        self.marks().viewed_at
    }

    pub fn is_viewed(&self) -> bool {
        self.viewed_at().is_some()
    }

    /// Record a view. Fails once expired; repeated views keep the first time.
    pub fn mark_as_viewed(&mut self) -> DomainResult<()> {
        let now = Utc::now();
        if self.is_expired_at(now) {
            return Err(DomainError::ExpiredContent {
                aggregate_id: self.content_id().to_string(),
                expired_at: self.expires_at(),
            });
        }
        if self.is_viewed() {
            return Ok(());
        }
        self.marks_mut().viewed_at = Some(now);
        self.record(EventAction::Viewed, json!({ "viewedAt": now }));
        Ok(())
    }

    pub fn is_highlighted(&self) -> bool {
        self.marks().highlighted_at.is_some()
    }

    /// Pin to the profile highlights; records no event
    pub fn highlight(&mut self) -> DomainResult<()> {
        if self.is_highlighted() {
            return Err(self.reject("already highlighted"));
        }
        self.marks_mut().highlighted_at = Some(Utc::now());
        Ok(())
    }

    /// Reversal of `highlight`; records no event
    pub fn remove_highlight(&mut self) -> DomainResult<()> {
        if !self.is_highlighted() {
            return Err(self.reject("not highlighted"));
        }
        self.marks_mut().highlighted_at = None;
        Ok(())
    }
}
