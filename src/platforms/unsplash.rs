//! Unsplash photos.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{identity, Capture};
use crate::domain::values::optional_url;
use crate::domain::{
    Archivable, Artifact, ArtifactSchema, AggregateType, DomainResult, Dimensions, Engagement,
    IdFormat, Likeable, MediaUrl, RawEngagement, Tags, ValidationError,
};

/// Rendition URLs as Unsplash publishes them
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawPhotoUrls {
    pub raw: Option<String>,
    pub full: Option<String>,
    pub regular: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawPhoto {
    pub id: Option<String>,
    pub photographer_id: Option<String>,
    pub description: Option<String>,
    pub alt_description: Option<String>,
    #[serde(default)]
    pub urls: RawPhotoUrls,
    pub width: Option<i64>,
    pub height: Option<i64>,
    pub color: Option<String>,
    pub blur_hash: Option<String>,
    pub location: Option<String>,
    #[serde(default)]
    pub tags: Vec<String>,
    pub created_at: Option<DateTime<Utc>>,
    #[serde(flatten)]
    pub engagement: RawEngagement,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PhotoAttributes {
    pub description: Option<String>,
    pub alt_description: Option<String>,
    pub raw_url: MediaUrl,
    pub full_url: Option<MediaUrl>,
    pub regular_url: Option<MediaUrl>,
    pub dimensions: Dimensions,
    pub color: Option<String>,
    pub blur_hash: Option<String>,
    pub location: Option<String>,
    pub tags: Tags,
    pub created_at: Option<DateTime<Utc>>,
}

impl ArtifactSchema for PhotoAttributes {
    const AGGREGATE_TYPE: AggregateType = AggregateType::Photo;
    const ID_FORMAT: IdFormat = IdFormat::Slug;

    fn validate(&self) -> Result<(), ValidationError> {
        if let Some(hash) = &self.blur_hash {
            if hash.len() < 6 {
                return Err(ValidationError::new("blurHash", "is too short to be a BlurHash"));
            }
        }
        Ok(())
    }

    /// The original rendition is what gets archived
    fn media_urls(&self) -> Vec<&MediaUrl> {
        vec![&self.raw_url]
    }
}

impl Likeable for PhotoAttributes {}
impl Archivable for PhotoAttributes {}

pub type Photo = Artifact<PhotoAttributes>;

impl Capture for Photo {
    type Raw = RawPhoto;

    fn capture(raw: RawPhoto) -> DomainResult<Self> {
        let (id, photographer) = identity(raw.id, IdFormat::Slug, "photographerId", raw.photographer_id)?;
        let raw_url = optional_url("urls.raw", raw.urls.raw)?
            .ok_or_else(|| ValidationError::missing("urls.raw"))?;
        let dimensions = Dimensions::from_raw(raw.width, raw.height)?
            .ok_or_else(|| ValidationError::missing("width"))?;

        let attributes = PhotoAttributes {
            description: raw.description,
            alt_description: raw.alt_description,
            raw_url,
            full_url: optional_url("urls.full", raw.urls.full)?,
            regular_url: optional_url("urls.regular", raw.urls.regular)?,
            dimensions,
            color: raw.color,
            blur_hash: raw.blur_hash,
            location: raw.location,
            tags: Tags::new(raw.tags),
            created_at: raw.created_at,
        };
        let engagement = Engagement::from_raw(&raw.engagement)?;

        Artifact::from_parts(id, photographer, attributes, engagement)
    }
}

impl Photo {
    pub fn is_landscape(&self) -> bool {
        self.attributes().dimensions.aspect_ratio() > 1.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{Aggregate, DomainError};
    use serde_json::json;

    fn photo_json() -> serde_json::Value {
        json!({
            "id": "Dwu85P9SOIk",
            "photographerId": "jane-doe",
            "urls": {
                "raw": "https://images.unsplash.com/photo-1?ixid=abc",
                "regular": "https://images.unsplash.com/photo-1?w=1080"
            },
            "width": 6000,
            "height": 4000,
            "tags": ["Mountains", "#snow"],
            "likes": 52
        })
    }

    #[test]
    fn test_photo_capture_from_json() {
        let mut photo = Photo::capture_json(photo_json()).unwrap();

        assert!(photo.is_landscape());
        assert_eq!(photo.engagement().likes, 52);
        assert!(photo.attributes().tags.contains("snow"));

        let events = photo.pull_domain_events();
        assert_eq!(events[0].event_kind(), "photo.captured");
    }

    #[test]
    fn test_photo_requires_raw_url() {
        let mut payload = photo_json();
        payload["urls"] = json!({ "regular": "https://images.unsplash.com/x" });
        let err = Photo::capture_json(payload).unwrap_err();
        assert_eq!(err.field(), Some("urls.raw"));
    }

    #[test]
    fn test_download_request_lists_raw_url() {
        let mut photo = Photo::capture_json(photo_json()).unwrap();
        let events = photo.transact(|p| p.request_download()).unwrap();

        assert_eq!(
            events[0].payload()["sourceUrls"],
            json!(["https://images.unsplash.com/photo-1?ixid=abc"])
        );
    }

    #[test]
    fn test_like_and_archive() {
        let mut photo = Photo::capture_json(photo_json()).unwrap();
        photo.pull_domain_events();

        photo.like().unwrap();
        photo.archive().unwrap();
        assert!(matches!(photo.archive(), Err(DomainError::InvalidState { .. })));

        let kinds: Vec<String> = photo
            .pull_domain_events()
            .iter()
            .map(|e| e.event_kind().to_string())
            .collect();
        assert_eq!(kinds, vec!["photo.liked", "photo.archived"]);
    }
}
