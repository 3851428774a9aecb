//! Pinterest: pins, boards and saved-pin collections.

use serde::{Deserialize, Serialize};

use super::{identity, member_ids, Capture};
use crate::domain::values::{optional_url, required, required_url};
use crate::domain::{
    Artifact, ArtifactSchema, AggregateType, Composite, ContentId, DomainResult, Dimensions,
    Engagement, IdFormat, Likeable, MediaUrl, RawEngagement, Tags, ValidationError,
};

/// Pin ids are numeric on Pinterest
const PIN_ID: IdFormat = IdFormat::Numeric;

fn pin_id(id: ContentId) -> Result<ContentId, ValidationError> {
    PIN_ID.check("pinId", id.as_str())?;
    Ok(id)
}

fn pin_ids(ids: Vec<ContentId>) -> Result<Vec<ContentId>, ValidationError> {
    ids.into_iter().map(pin_id).collect()
}

// ============================================================================
// Pin
// ============================================================================

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawPin {
    pub id: Option<String>,
    pub owner_id: Option<String>,
    pub title: Option<String>,
    pub description: Option<String>,
    pub image_url: Option<String>,
    pub link: Option<String>,
    pub board_id: Option<String>,
    #[serde(default)]
    pub is_video: bool,
    pub video_url: Option<String>,
    pub dominant_color: Option<String>,
    pub width: Option<i64>,
    pub height: Option<i64>,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(flatten)]
    pub engagement: RawEngagement,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PinAttributes {
    pub title: Option<String>,
    pub description: Option<String>,
    pub image_url: MediaUrl,
    pub link: Option<MediaUrl>,
    pub board_id: Option<ContentId>,
    pub is_video: bool,
    pub video_url: Option<MediaUrl>,
    pub dominant_color: Option<String>,
    pub dimensions: Option<Dimensions>,
    pub tags: Tags,
}

impl ArtifactSchema for PinAttributes {
    const AGGREGATE_TYPE: AggregateType = AggregateType::Pin;
    const ID_FORMAT: IdFormat = PIN_ID;

    fn validate(&self) -> Result<(), ValidationError> {
        if self.is_video && self.video_url.is_none() {
            return Err(ValidationError::new("videoUrl", "is required when isVideo is true"));
        }
        if let Some(color) = &self.dominant_color {
            let hex = color.strip_prefix('#').unwrap_or(color);
            if hex.len() != 6 || !hex.chars().all(|c| c.is_ascii_hexdigit()) {
                return Err(ValidationError::new(
                    "dominantColor",
                    format!("'{}' is not a #rrggbb color", color),
                ));
            }
        }
        Ok(())
    }

    fn media_urls(&self) -> Vec<&MediaUrl> {
        self.video_url.iter().chain(std::iter::once(&self.image_url)).collect()
    }
}

impl Likeable for PinAttributes {}

/// A saved image or video
pub type Pin = Artifact<PinAttributes>;

impl Capture for Pin {
    type Raw = RawPin;

    fn capture(raw: RawPin) -> DomainResult<Self> {
        let (id, owner) = identity(raw.id, PIN_ID, "ownerId", raw.owner_id)?;
        let board_id = raw
            .board_id
            .map(|b| ContentId::new(b).map_err(|e| e.for_field("boardId")))
            .transpose()?;

        let attributes = PinAttributes {
            title: raw.title,
            description: raw.description,
            image_url: required_url("imageUrl", raw.image_url)?,
            link: optional_url("link", raw.link)?,
            board_id,
            is_video: raw.is_video,
            video_url: optional_url("videoUrl", raw.video_url)?,
            dominant_color: raw.dominant_color,
            dimensions: Dimensions::from_raw(raw.width, raw.height)?,
            tags: Tags::new(raw.tags),
        };
        let engagement = Engagement::from_raw(&raw.engagement)?;

        Artifact::from_parts(id, owner, attributes, engagement)
    }
}

// ============================================================================
// Board
// ============================================================================

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawBoard {
    pub id: Option<String>,
    pub owner_id: Option<String>,
    pub name: Option<String>,
    pub description: Option<String>,
    pub category: Option<String>,
    pub cover_url: Option<String>,
    #[serde(default)]
    pub is_secret: bool,
    #[serde(default)]
    pub pin_ids: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BoardAttributes {
    pub name: String,
    pub description: Option<String>,
    pub category: Option<String>,
    pub cover_url: Option<MediaUrl>,
    pub is_secret: bool,
}

impl ArtifactSchema for BoardAttributes {
    const AGGREGATE_TYPE: AggregateType = AggregateType::Board;

    fn media_urls(&self) -> Vec<&MediaUrl> {
        self.cover_url.iter().collect()
    }
}

/// A named board of pins
pub type Board = Composite<BoardAttributes>;

impl Capture for Board {
    type Raw = RawBoard;

    fn capture(raw: RawBoard) -> DomainResult<Self> {
        let (id, owner) = identity(raw.id, IdFormat::Any, "ownerId", raw.owner_id)?;
        let attributes = BoardAttributes {
            name: required("name", raw.name)?,
            description: raw.description,
            category: raw.category,
            cover_url: optional_url("coverUrl", raw.cover_url)?,
            is_secret: raw.is_secret,
        };
        let pins = member_ids("pinIds", raw.pin_ids, PIN_ID)?;

        Composite::from_parts(id, owner, attributes, pins)
    }
}

impl Board {
    pub fn pin_ids(&self) -> &[ContentId] {
        self.member_ids()
    }

    /// Idempotent; `Ok(false)` when the pin was already on the board
    pub fn add_pin(&mut self, pin: ContentId) -> DomainResult<bool> {
        self.add_member(pin_id(pin)?)
    }

    pub fn remove_pin(&mut self, pin: &ContentId) -> DomainResult<()> {
        self.remove_member(pin)
    }

    /// Replace the board's pins with a full snapshot
    pub fn sync_pins(&mut self, pins: Vec<ContentId>) -> DomainResult<()> {
        self.sync_members(pin_ids(pins)?)
    }
}

// ============================================================================
// Collection
// ============================================================================

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawCollection {
    pub id: Option<String>,
    pub owner_id: Option<String>,
    pub title: Option<String>,
    pub description: Option<String>,
    #[serde(default)]
    pub pin_ids: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CollectionAttributes {
    pub title: String,
    pub description: Option<String>,
}

impl ArtifactSchema for CollectionAttributes {
    const AGGREGATE_TYPE: AggregateType = AggregateType::Collection;
}

/// A user's saved-pin collection
pub type Collection = Composite<CollectionAttributes>;

impl Capture for Collection {
    type Raw = RawCollection;

    fn capture(raw: RawCollection) -> DomainResult<Self> {
        let (id, owner) = identity(raw.id, IdFormat::Any, "ownerId", raw.owner_id)?;
        let attributes = CollectionAttributes {
            title: required("title", raw.title)?,
            description: raw.description,
        };
        let pins = member_ids("pinIds", raw.pin_ids, PIN_ID)?;

        Composite::from_parts(id, owner, attributes, pins)
    }
}

impl Collection {
    pub fn pin_ids(&self) -> &[ContentId] {
        self.member_ids()
    }

    pub fn add_pin(&mut self, pin: ContentId) -> DomainResult<bool> {
        self.add_member(pin_id(pin)?)
    }

    pub fn remove_pin(&mut self, pin: &ContentId) -> DomainResult<()> {
        self.remove_member(pin)
    }

    pub fn sync_pins(&mut self, pins: Vec<ContentId>) -> DomainResult<()> {
        self.sync_members(pin_ids(pins)?)
    }
}
