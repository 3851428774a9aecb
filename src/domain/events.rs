//! Domain event envelope.
//!
//! Aggregates record an event for every business-significant transition.
//! The surrounding application drains them and hands them to the download
//! consumer, analytics and UI refresh.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sha2::{Digest, Sha256};
use uuid::Uuid;

use super::values::CorrelationId;

/// Kind of aggregate that emitted an event
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AggregateType {
    Post,
    Reel,
    Story,
    User,
    Pin,
    Board,
    Collection,
    Tweet,
    Thread,
    Photo,
    Video,
    Playlist,
    License,
    Artist,
}

impl AggregateType {
    pub fn as_str(&self) -> &'static str {
        match self {
            AggregateType::Post => "post",
            AggregateType::Reel => "reel",
            AggregateType::Story => "story",
            AggregateType::User => "user",
            AggregateType::Pin => "pin",
            AggregateType::Board => "board",
            AggregateType::Collection => "collection",
            AggregateType::Tweet => "tweet",
            AggregateType::Thread => "thread",
            AggregateType::Photo => "photo",
            AggregateType::Video => "video",
            AggregateType::Playlist => "playlist",
            AggregateType::License => "license",
            AggregateType::Artist => "artist",
        }
    }
}

impl fmt::Display for AggregateType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for AggregateType {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> anyhow::Result<Self> {
        let kind = match s.to_lowercase().as_str() {
            "post" => AggregateType::Post,
            "reel" => AggregateType::Reel,
            "story" => AggregateType::Story,
            "user" => AggregateType::User,
            "pin" => AggregateType::Pin,
            "board" => AggregateType::Board,
            "collection" => AggregateType::Collection,
            "tweet" => AggregateType::Tweet,
            "thread" => AggregateType::Thread,
            "photo" => AggregateType::Photo,
            "video" => AggregateType::Video,
            "playlist" => AggregateType::Playlist,
            "license" => AggregateType::License,
            "artist" => AggregateType::Artist,
            _ => anyhow::bail!("Unknown aggregate type: {}", s),
        };
        Ok(kind)
    }
}

/// What happened to the aggregate
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventAction {
    /// Created from a producer payload
    Captured,

    /// The consumer should fetch the media
    DownloadRequested,

    /// The consumer stored the media locally (terminal)
    Downloaded,

    Liked,
    Followed,
    Viewed,
    Archived,

    /// Membership replaced wholesale
    Synced,

    MemberAdded,
    MemberRemoved,
    Reordered,

    /// License offered for a (content, owner) pair
    Issued,
    Acquired,
    Used,
    Revoked,
}

impl EventAction {
    /// Dotted suffix used in the event kind
    pub fn as_str(&self) -> &'static str {
        match self {
            EventAction::Captured => "captured",
            EventAction::DownloadRequested => "download.requested",
            EventAction::Downloaded => "downloaded",
            EventAction::Liked => "liked",
            EventAction::Followed => "followed",
            EventAction::Viewed => "viewed",
            EventAction::Archived => "archived",
            EventAction::Synced => "synced",
            EventAction::MemberAdded => "member.added",
            EventAction::MemberRemoved => "member.removed",
            EventAction::Reordered => "reordered",
            EventAction::Issued => "issued",
            EventAction::Acquired => "acquired",
            EventAction::Used => "used",
            EventAction::Revoked => "revoked",
        }
    }
}

/// Immutable record of a past state transition
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DomainEvent {
    id: Uuid,
    aggregate_id: String,
    aggregate_type: AggregateType,
    action: EventAction,

    /// `"{aggregate_type}.{action}"`, e.g. `post.download.requested`
    event_kind: String,
    payload: Value,
    occurred_at: DateTime<Utc>,
    correlation_id: CorrelationId,

    /// `"{aggregate_id}:{event_kind}:{payload_hash}"`
    idempotency_key: String,
}

impl DomainEvent {
    /// Assemble an event stamped with the current time
    pub fn new(
        aggregate_type: AggregateType,
        aggregate_id: impl Into<String>,
        action: EventAction,
        payload: Value,
        correlation_id: CorrelationId,
    ) -> Self {
        let aggregate_id = aggregate_id.into();
        let event_kind = format!("{}.{}", aggregate_type.as_str(), action.as_str());
        let idempotency_key = generate_idempotency_key(&aggregate_id, &event_kind, &payload);

        Self {
            id: Uuid::new_v4(),
            aggregate_id,
            aggregate_type,
            action,
            event_kind,
            payload,
            occurred_at: Utc::now(),
            correlation_id,
            idempotency_key,
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn aggregate_id(&self) -> &str {
        &self.aggregate_id
    }

    pub fn aggregate_type(&self) -> AggregateType {
        self.aggregate_type
    }

    pub fn action(&self) -> EventAction {
        self.action
    }

    pub fn event_kind(&self) -> &str {
        &self.event_kind
    }

    pub fn payload(&self) -> &Value {
        &self.payload
    }

    pub fn occurred_at(&self) -> DateTime<Utc> {
        self.occurred_at
    }

    pub fn correlation_id(&self) -> CorrelationId {
        self.correlation_id
    }

    pub fn idempotency_key(&self) -> &str {
        &self.idempotency_key
    }
}

/// Generate the dedupe key consumers use for exactly-once handling
pub fn generate_idempotency_key(aggregate_id: &str, event_kind: &str, payload: &Value) -> String {
    format!("{}:{}:{}", aggregate_id, event_kind, hash_payload(payload))
}

/// Hash a payload (first 16 hex chars of SHA256 over its JSON text)
pub fn hash_payload(payload: &Value) -> String {
    let mut hasher = Sha256::new();
    hasher.update(payload.to_string().as_bytes());
    let result = hasher.finalize();
    hex::encode(&result[..8])
}
