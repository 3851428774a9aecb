//! Generic capturable artifact.
//!
//! `Artifact<S>` carries the identity, download lifecycle, orthogonal flags
//! and event buffer shared by every platform. The platform-specific part is
//! the attribute schema `S`, which brings its own aggregate type, id format
//! and cross-field invariants.

use std::fmt::Debug;

use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use super::aggregate::{Aggregate, Downloadable, EventBuffer};
use super::error::{DomainError, DomainResult, ValidationError};
use super::events::{AggregateType, EventAction};
use super::lifecycle::{Engagement, Phase};
use super::values::{ContentId, CorrelationId, IdFormat, LocalPath, MediaUrl, OwnerId};

/// Platform-specific attribute bundle
pub trait ArtifactSchema: Clone + Debug + PartialEq + Serialize + DeserializeOwned {
    const AGGREGATE_TYPE: AggregateType;

    /// Shape the content id must have on this platform
    const ID_FORMAT: IdFormat = IdFormat::Any;

    /// Cross-field invariants, checked at capture and at restore
    fn validate(&self) -> Result<(), ValidationError> {
        Ok(())
    }

    /// Remote resources the download consumer should fetch
    fn media_urls(&self) -> Vec<&MediaUrl> {
        Vec::new()
    }
}

/// Schemas whose artifacts can be liked / unliked
pub trait Likeable: ArtifactSchema {}

/// Schemas whose artifacts can be archived
pub trait Archivable: ArtifactSchema {}

/// Profile schemas: follow / unfollow and visibility toggles
pub trait Followable: ArtifactSchema {}

/// Orthogonal flags; presence of a timestamp means the flag is set
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Marks {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub liked_at: Option<DateTime<Utc>>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub followed_at: Option<DateTime<Utc>>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub viewed_at: Option<DateTime<Utc>>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub archived_at: Option<DateTime<Utc>>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub highlighted_at: Option<DateTime<Utc>>,

    #[serde(default)]
    pub private: bool,
}

/// Persisted shape of an artifact; enough to restore without event replay
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ArtifactRecord<S> {
    pub id: ContentId,
    pub owner_id: OwnerId,
    pub attributes: S,
    pub engagement: Engagement,
    pub captured_at: DateTime<Utc>,
    pub lifecycle: Phase,
    #[serde(default)]
    pub marks: Marks,
}

/// A captured piece of content on some platform
#[derive(Debug, Clone)]
pub struct Artifact<S: ArtifactSchema> {
    id: ContentId,
    owner_id: OwnerId,
    attributes: S,
    engagement: Engagement,
    captured_at: DateTime<Utc>,
    phase: Phase,
    marks: Marks,
    events: EventBuffer,
}

impl<S: ArtifactSchema> Artifact<S> {
    /// Capture factory shared by all platforms; records `<type>.captured`
    pub fn from_parts(
        id: ContentId,
        owner_id: OwnerId,
        attributes: S,
        engagement: Engagement,
    ) -> DomainResult<Self> {
        S::ID_FORMAT.check("id", id.as_str())?;
        attributes.validate()?;

        let mut artifact = Self {
            id,
            owner_id,
            attributes,
            engagement,
            captured_at: Utc::now(),
            phase: Phase::Captured,
            marks: Marks::default(),
            events: EventBuffer::new(CorrelationId::new()),
        };

        let payload = json!({
            "ownerId": artifact.owner_id,
            "attributes": artifact.attributes,
            "engagement": artifact.engagement,
            "capturedAt": artifact.captured_at,
        });
        artifact.record(EventAction::Captured, payload);

        Ok(artifact)
    }

    /// Rebuild from persisted state; no events are recorded
    pub fn restore(record: ArtifactRecord<S>) -> DomainResult<Self> {
        S::ID_FORMAT.check("id", record.id.as_str())?;
        record.attributes.validate()?;

        Ok(Self {
            id: record.id,
            owner_id: record.owner_id,
            attributes: record.attributes,
            engagement: record.engagement,
            captured_at: record.captured_at,
            phase: record.lifecycle,
            marks: record.marks,
            events: EventBuffer::new(CorrelationId::new()),
        })
    }

    pub fn snapshot(&self) -> ArtifactRecord<S> {
        ArtifactRecord {
            id: self.id.clone(),
            owner_id: self.owner_id.clone(),
            attributes: self.attributes.clone(),
            engagement: self.engagement,
            captured_at: self.captured_at,
            lifecycle: self.phase.clone(),
            marks: self.marks.clone(),
        }
    }

    pub(crate) fn record(&mut self, action: EventAction, payload: Value) {
        let id = self.id.as_str().to_string();
        self.events.record(S::AGGREGATE_TYPE, &id, action, payload);
    }

    /// Swap in a refreshed bundle; only for non-authoritative refresh paths
    pub(crate) fn replace_attributes(&mut self, attributes: S) {
        self.attributes = attributes;
    }

    pub(crate) fn marks_mut(&mut self) -> &mut Marks {
        &mut self.marks
    }

    pub(crate) fn reject(&self, reason: impl Into<String>) -> DomainError {
        DomainError::invalid_state(self.id.as_str(), reason)
    }

    pub fn content_id(&self) -> &ContentId {
        &self.id
    }

    pub fn owner_id(&self) -> &OwnerId {
        &self.owner_id
    }

    pub fn attributes(&self) -> &S {
        &self.attributes
    }

    pub fn engagement(&self) -> &Engagement {
        &self.engagement
    }

    pub fn captured_at(&self) -> DateTime<Utc> {
        self.captured_at
    }

    pub fn phase(&self) -> &Phase {
        &self.phase
    }

    pub fn marks(&self) -> &Marks {
        &self.marks
    }

    pub fn is_downloaded(&self) -> bool {
        self.phase.is_downloaded()
    }

    pub fn is_download_requested(&self) -> bool {
        matches!(self.phase, Phase::DownloadRequested { .. })
    }

    pub fn local_path(&self) -> Option<&LocalPath> {
        self.phase.local_path()
    }

    pub fn downloaded_at(&self) -> Option<DateTime<Utc>> {
        self.phase.downloaded_at()
    }

    pub fn is_archived(&self) -> bool {
        self.marks.archived_at.is_some()
    }

    /// Ask the consumer to fetch this artifact's media.
    ///
    /// Re-requests before completion are recorded again; after completion
    /// the call fails and records nothing.
    pub fn request_download(&mut self) -> DomainResult<()> {
        let now = Utc::now();
        let next = self
            .phase
            .requested(now)
            .ok_or_else(|| DomainError::AlreadyDownloaded {
                aggregate_id: self.id.to_string(),
            })?;

        let payload = json!({
            "attempt": next.download_attempts(),
            "requestedAt": now,
            "sourceUrls": self.attributes.media_urls(),
        });
        self.phase = next;
        self.record(EventAction::DownloadRequested, payload);
        Ok(())
    }

    /// Record the consumer's completion notice. At most once.
    pub fn mark_as_downloaded(&mut self, local_path: &str) -> DomainResult<()> {
        if self.phase.is_downloaded() {
            return Err(DomainError::AlreadyDownloaded {
                aggregate_id: self.id.to_string(),
            });
        }
        let local_path = LocalPath::new(local_path)?;
        let now = Utc::now();

        let payload = json!({
            "localPath": local_path,
            "downloadedAt": now,
        });
        if let Some(next) = self.phase.completed(local_path, now) {
            self.phase = next;
            self.record(EventAction::Downloaded, payload);
        }
        Ok(())
    }

    /// Overwrite counters from the latest snapshot. Records no event.
    pub fn update_engagement(&mut self, engagement: Engagement) {
        self.engagement = engagement;
    }
}

impl<S: Likeable> Artifact<S> {
    pub fn is_liked(&self) -> bool {
        self.marks.liked_at.is_some()
    }

    pub fn like(&mut self) -> DomainResult<()> {
        if self.is_liked() {
            return Err(self.reject("already liked"));
        }
        let now = Utc::now();
        self.marks.liked_at = Some(now);
        self.record(EventAction::Liked, json!({ "likedAt": now }));
        Ok(())
    }

    /// Reversal of `like`; records no event
    pub fn unlike(&mut self) -> DomainResult<()> {
        if !self.is_liked() {
            return Err(self.reject("not liked"));
        }
        self.marks.liked_at = None;
        Ok(())
    }
}

impl<S: Archivable> Artifact<S> {
    pub fn archive(&mut self) -> DomainResult<()> {
        if self.is_archived() {
            return Err(self.reject("already archived"));
        }
        let now = Utc::now();
        self.marks.archived_at = Some(now);
        self.record(EventAction::Archived, json!({ "archivedAt": now }));
        Ok(())
    }
}

impl<S: Followable> Artifact<S> {
    pub fn is_followed(&self) -> bool {
        self.marks.followed_at.is_some()
    }

    pub fn followed_at(&self) -> Option<DateTime<Utc>> {
        self.marks.followed_at
    }

    pub fn follow(&mut self) -> DomainResult<()> {
        if self.is_followed() {
            return Err(self.reject("already followed"));
        }
        let now = Utc::now();
        self.marks.followed_at = Some(now);
        self.record(EventAction::Followed, json!({ "followedAt": now }));
        Ok(())
    }

    /// Reversal of `follow`; records no event
    pub fn unfollow(&mut self) -> DomainResult<()> {
        if !self.is_followed() {
            return Err(self.reject("not followed"));
        }
        self.marks.followed_at = None;
        Ok(())
    }

    pub fn is_private(&self) -> bool {
        self.marks.private
    }

    /// Visibility toggle; records no event
    pub fn make_private(&mut self) {
        self.marks.private = true;
    }

    /// Visibility toggle; records no event
    pub fn make_public(&mut self) {
        self.marks.private = false;
    }
}

impl<S: ArtifactSchema> Aggregate for Artifact<S> {
    fn id(&self) -> &str {
        self.id.as_str()
    }

    fn aggregate_type(&self) -> AggregateType {
        S::AGGREGATE_TYPE
    }

    fn events(&self) -> &EventBuffer {
        &self.events
    }

    fn events_mut(&mut self) -> &mut EventBuffer {
        &mut self.events
    }
}

impl<S: ArtifactSchema> Downloadable for Artifact<S> {
    fn request_download(&mut self) -> DomainResult<()> {
        Artifact::request_download(self)
    }

    fn mark_as_downloaded(&mut self, local_path: &str) -> DomainResult<()> {
        Artifact::mark_as_downloaded(self, local_path)
    }

    fn local_path(&self) -> Option<&LocalPath> {
        Artifact::local_path(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    struct Note {
        text: String,
    }

    impl ArtifactSchema for Note {
        const AGGREGATE_TYPE: AggregateType = AggregateType::Post;
        const ID_FORMAT: IdFormat = IdFormat::Numeric;

        fn validate(&self) -> Result<(), ValidationError> {
            if self.text.is_empty() {
                return Err(ValidationError::missing("text"));
            }
            Ok(())
        }
    }

    impl Likeable for Note {}

    fn note(id: &str) -> DomainResult<Artifact<Note>> {
        Artifact::from_parts(
            ContentId::new(id)?,
            OwnerId::new("owner")?,
            Note {
                text: "hello".to_string(),
            },
            Engagement::default(),
        )
    }

    #[test]
    fn test_capture_records_event() {
        let mut artifact = note("42").unwrap();
        let events = artifact.pull_domain_events();

        assert_eq!(events.len(), 1);
        assert_eq!(events[0].event_kind(), "post.captured");
        assert_eq!(events[0].aggregate_id(), "42");
        assert!(artifact.pull_domain_events().is_empty());
    }

    #[test]
    fn test_capture_checks_id_format() {
        let err = note("abc").unwrap_err();
        assert_eq!(err.field(), Some("id"));
    }

    #[test]
    fn test_download_flow() {
        let mut artifact = note("42").unwrap();
        artifact.pull_domain_events();

        artifact.request_download().unwrap();
        artifact.request_download().unwrap();
        assert!(!artifact.is_downloaded());

        artifact.mark_as_downloaded("/media/42.jpg").unwrap();
        assert!(artifact.is_downloaded());
        assert_eq!(artifact.local_path().unwrap().as_str(), "/media/42.jpg");

        let kinds: Vec<String> = artifact
            .pull_domain_events()
            .iter()
            .map(|e| e.event_kind().to_string())
            .collect();
        assert_eq!(
            kinds,
            vec!["post.download.requested", "post.download.requested", "post.downloaded"]
        );
    }

    #[test]
    fn test_download_guards() {
        let mut artifact = note("42").unwrap();
        artifact.mark_as_downloaded("/media/42.jpg").unwrap();
        artifact.pull_domain_events();

        let again = artifact.mark_as_downloaded("/elsewhere.jpg");
        assert!(matches!(again, Err(DomainError::AlreadyDownloaded { .. })));

        let request = artifact.request_download();
        assert!(matches!(request, Err(DomainError::AlreadyDownloaded { .. })));

        assert!(artifact.pull_domain_events().is_empty());
        assert_eq!(artifact.local_path().unwrap().as_str(), "/media/42.jpg");
    }

    #[test]
    fn test_empty_local_path_rejected_without_change() {
        let mut artifact = note("42").unwrap();
        artifact.pull_domain_events();

        assert!(artifact.mark_as_downloaded("").is_err());
        assert!(!artifact.is_downloaded());
        assert!(artifact.pull_domain_events().is_empty());
    }

    #[test]
    fn test_like_twice_fails() {
        let mut artifact = note("42").unwrap();
        artifact.like().unwrap();
        let err = artifact.like().unwrap_err();
        assert!(err.is_invalid_state());

        artifact.unlike().unwrap();
        assert!(!artifact.is_liked());
    }

    #[test]
    fn test_transact_returns_only_new_events() {
        let mut artifact = note("42").unwrap();
        let events = artifact.transact(|a| a.request_download()).unwrap();

        assert_eq!(events.len(), 1);
        assert_eq!(events[0].action(), EventAction::DownloadRequested);
        // the captured event is still buffered
        assert_eq!(artifact.pending_events().len(), 1);
    }

    #[test]
    fn test_engagement_update_records_nothing() {
        let mut artifact = note("42").unwrap();
        artifact.pull_domain_events();

        artifact.update_engagement(Engagement {
            likes: 9,
            ..Default::default()
        });
        assert_eq!(artifact.engagement().likes, 9);
        assert!(artifact.pull_domain_events().is_empty());
    }

    #[test]
    fn test_snapshot_restore() {
        let mut artifact = note("42").unwrap();
        artifact.request_download().unwrap();
        artifact.mark_as_downloaded("/media/42.jpg").unwrap();

        let json = serde_json::to_string(&artifact.snapshot()).unwrap();
        let record: ArtifactRecord<Note> = serde_json::from_str(&json).unwrap();
        let restored = Artifact::restore(record).unwrap();

        assert_eq!(restored.snapshot(), artifact.snapshot());
        assert!(restored.pending_events().is_empty());
    }
}
