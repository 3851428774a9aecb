//! Per-platform aggregates.
//!
//! Each platform module defines raw payload structs (what the capture
//! producer delivers), attribute schemas, and the aggregates built on
//! `Artifact<S>` / `Composite<S>`.

pub mod instagram;
pub mod licensing;
pub mod pinterest;
pub mod profiles;
pub mod twitter;
pub mod unsplash;
pub mod youtube;

use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::domain::{
    Aggregate, AggregateType, ContentId, DomainError, DomainResult, Downloadable, EventBuffer,
    ExpirationPolicy, IdFormat, LocalPath, OwnerId, ValidationError,
};

pub use instagram::{Post, RawStory, Reel, Story};
pub use licensing::{License, LicenseState, RevenueModel, UsageTerms};
pub use pinterest::{Board, Collection, Pin};
pub use profiles::{Artist, Platform, User};
pub use twitter::{Thread, Tweet};
pub use unsplash::Photo;
pub use youtube::{Playlist, Video};

/// Named capture factory fed by a raw producer payload
pub trait Capture: Aggregate + Sized {
    type Raw: DeserializeOwned;

    fn capture(raw: Self::Raw) -> DomainResult<Self>;

    /// Decode a JSON payload, then capture
    fn capture_json(payload: Value) -> DomainResult<Self> {
        Self::capture(decode(&payload)?)
    }
}

/// Decode a raw payload; failures become a validation error naming the field
pub(crate) fn decode<T: DeserializeOwned>(payload: &Value) -> DomainResult<T> {
    T::deserialize(payload).map_err(|err| {
        let field = offending_field::<T>(payload, &err);
        ValidationError::new(field, err.to_string()).into()
    })
}

/// Find the payload key behind a decoding failure
fn offending_field<T: DeserializeOwned>(payload: &Value, err: &serde_json::Error) -> String {
    let message = err.to_string();
    if message.starts_with("missing field") || message.starts_with("unknown field") {
        if let Some(name) = message.split('`').nth(1) {
            return name.to_string();
        }
    }

    // Type errors carry no field name. Missing fields are only checked once
    // every present key decoded, so the culprit is the one key whose removal
    // changes the outcome.
    if let Value::Object(fields) = payload {
        for key in fields.keys() {
            let mut rest = fields.clone();
            rest.remove(key);
            match T::deserialize(&Value::Object(rest)) {
                Err(other) if other.to_string() == message => continue,
                _ => return key.clone(),
            }
        }
    }
    "payload".to_string()
}

/// Build the (content id, owner id) pair from raw strings
pub(crate) fn identity(
    raw_id: Option<String>,
    format: IdFormat,
    owner_field: &str,
    raw_owner: Option<String>,
) -> Result<(ContentId, OwnerId), ValidationError> {
    let id = ContentId::with_format(raw_id.unwrap_or_default(), format)?;
    let owner = OwnerId::new(raw_owner.unwrap_or_default()).map_err(|e| e.for_field(owner_field))?;
    Ok((id, owner))
}

/// Parse member ids, each of which must satisfy `format`
pub(crate) fn member_ids(
    field: &str,
    raw: Vec<String>,
    format: IdFormat,
) -> Result<Vec<ContentId>, ValidationError> {
    raw.into_iter()
        .map(|id| ContentId::with_format(id, format).map_err(|e| e.for_field(field)))
        .collect()
}

/// Any aggregate the capture producer can create
#[derive(Debug, Clone)]
pub enum Captured {
    Post(Post),
    Reel(Reel),
    Story(Story),
    User(User),
    Pin(Pin),
    Board(Board),
    Collection(Collection),
    Tweet(Tweet),
    Thread(Thread),
    Photo(Photo),
    Video(Video),
    Playlist(Playlist),
    Artist(Artist),
}

/// Run `$body` against whichever aggregate the variant holds
macro_rules! each_captured {
    ($value:expr, $inner:ident => $body:expr) => {
        match $value {
            Captured::Post($inner) => $body,
            Captured::Reel($inner) => $body,
            Captured::Story($inner) => $body,
            Captured::User($inner) => $body,
            Captured::Pin($inner) => $body,
            Captured::Board($inner) => $body,
            Captured::Collection($inner) => $body,
            Captured::Tweet($inner) => $body,
            Captured::Thread($inner) => $body,
            Captured::Photo($inner) => $body,
            Captured::Video($inner) => $body,
            Captured::Playlist($inner) => $body,
            Captured::Artist($inner) => $body,
        }
    };
}

impl Captured {
    pub fn aggregate(&self) -> &dyn Aggregate {
        each_captured!(self, a => a)
    }

    pub fn aggregate_mut(&mut self) -> &mut dyn Aggregate {
        each_captured!(self, a => a)
    }
}

impl Aggregate for Captured {
    fn id(&self) -> &str {
        each_captured!(self, a => a.id())
    }

    fn aggregate_type(&self) -> AggregateType {
        each_captured!(self, a => a.aggregate_type())
    }

    fn events(&self) -> &EventBuffer {
        each_captured!(self, a => a.events())
    }

    fn events_mut(&mut self) -> &mut EventBuffer {
        each_captured!(self, a => a.events_mut())
    }
}

impl Downloadable for Captured {
    fn request_download(&mut self) -> DomainResult<()> {
        each_captured!(self, a => Downloadable::request_download(a))
    }

    fn mark_as_downloaded(&mut self, local_path: &str) -> DomainResult<()> {
        each_captured!(self, a => Downloadable::mark_as_downloaded(a, local_path))
    }

    fn local_path(&self) -> Option<&LocalPath> {
        each_captured!(self, a => Downloadable::local_path(a))
    }
}

/// Capture any supported aggregate type from a raw JSON payload
pub fn ingest(kind: AggregateType, payload: Value) -> DomainResult<Captured> {
    ingest_with_policy(kind, payload, ExpirationPolicy::default())
}

/// Like [`ingest`], deriving story expiry from `story_policy`
pub fn ingest_with_policy(
    kind: AggregateType,
    payload: Value,
    story_policy: ExpirationPolicy,
) -> DomainResult<Captured> {
    let captured = match kind {
        AggregateType::Post => Captured::Post(Post::capture_json(payload)?),
        AggregateType::Reel => Captured::Reel(Reel::capture_json(payload)?),
        AggregateType::Story => {
            let raw: RawStory = decode(&payload)?;
            Captured::Story(Story::capture_with_policy(raw, story_policy)?)
        }
        AggregateType::User => Captured::User(User::capture_json(payload)?),
        AggregateType::Pin => Captured::Pin(Pin::capture_json(payload)?),
        AggregateType::Board => Captured::Board(Board::capture_json(payload)?),
        AggregateType::Collection => Captured::Collection(Collection::capture_json(payload)?),
        AggregateType::Tweet => Captured::Tweet(Tweet::capture_json(payload)?),
        AggregateType::Thread => Captured::Thread(Thread::capture_json(payload)?),
        AggregateType::Photo => Captured::Photo(Photo::capture_json(payload)?),
        AggregateType::Video => Captured::Video(Video::capture_json(payload)?),
        AggregateType::Playlist => Captured::Playlist(Playlist::capture_json(payload)?),
        AggregateType::Artist => Captured::Artist(Artist::capture_json(payload)?),
        AggregateType::License => {
            return Err(ValidationError::new(
                "platform",
                "licenses are issued, not captured from page payloads",
            )
            .into())
        }
    };
    Ok(captured)
}
