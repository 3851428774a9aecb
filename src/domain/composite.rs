//! Composite aggregates: an artifact that also owns a member-id list.
//!
//! Boards, collections, playlists and threads reuse the artifact lifecycle
//! and add membership operations on top.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::json;

use super::aggregate::{Aggregate, Downloadable, EventBuffer};
use super::artifact::{Archivable, Artifact, ArtifactRecord, ArtifactSchema};
use super::error::{DomainError, DomainResult};
use super::events::{AggregateType, EventAction};
use super::lifecycle::Engagement;
use super::membership::Membership;
use super::values::{ContentId, LocalPath, OwnerId};

/// Persisted shape of a composite
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompositeRecord<S> {
    #[serde(flatten)]
    pub artifact: ArtifactRecord<S>,
    pub members: Membership,
    pub synced_at: Option<DateTime<Utc>>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct Composite<S: ArtifactSchema> {
    artifact: Artifact<S>,
    members: Membership,
    synced_at: Option<DateTime<Utc>>,
    updated_at: DateTime<Utc>,
}

impl<S: ArtifactSchema> Composite<S> {
    /// Capture factory; the captured event lists the initial members
    pub fn from_parts(
        id: ContentId,
        owner_id: OwnerId,
        attributes: S,
        members: Vec<ContentId>,
    ) -> DomainResult<Self> {
        let artifact = Artifact::from_parts(id, owner_id, attributes, Engagement::default())?;
        let members = Membership::from_ids(members);

        let mut composite = Self {
            updated_at: artifact.captured_at(),
            artifact,
            members,
            synced_at: None,
        };
        // fold the member list into the single captured event
        if let Some(captured) = composite.artifact.events_mut().drain().pop() {
            let mut payload = captured.payload().clone();
            payload["memberIds"] = json!(composite.members);
            composite.artifact.record(EventAction::Captured, payload);
        }
        Ok(composite)
    }

    pub fn restore(record: CompositeRecord<S>) -> DomainResult<Self> {
        Ok(Self {
            artifact: Artifact::restore(record.artifact)?,
            members: record.members,
            synced_at: record.synced_at,
            updated_at: record.updated_at,
        })
    }

    pub fn snapshot(&self) -> CompositeRecord<S> {
        CompositeRecord {
            artifact: self.artifact.snapshot(),
            members: self.members.clone(),
            synced_at: self.synced_at,
            updated_at: self.updated_at,
        }
    }

    pub fn artifact(&self) -> &Artifact<S> {
        &self.artifact
    }

    pub fn attributes(&self) -> &S {
        self.artifact.attributes()
    }

    pub fn member_ids(&self) -> &[ContentId] {
        self.members.ids()
    }

    pub fn contains(&self, id: &ContentId) -> bool {
        self.members.contains(id)
    }

    pub fn synced_at(&self) -> Option<DateTime<Utc>> {
        self.synced_at
    }

    pub fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }

    pub fn is_archived(&self) -> bool {
        self.artifact.is_archived()
    }

    pub fn is_downloaded(&self) -> bool {
        self.artifact.is_downloaded()
    }

    pub fn request_download(&mut self) -> DomainResult<()> {
        self.artifact.request_download()
    }

    pub fn mark_as_downloaded(&mut self, local_path: &str) -> DomainResult<()> {
        self.artifact.mark_as_downloaded(local_path)
    }

    fn reject(&self, reason: impl Into<String>) -> DomainError {
        self.artifact.reject(reason)
    }

    /// Idempotent add; `Ok(false)` when the id was already a member
    pub fn add_member(&mut self, id: ContentId) -> DomainResult<bool> {
        if self.members.contains(&id) {
            return Ok(false);
        }
        let payload = json!({ "memberId": id, "position": self.members.len() });
        self.members.insert(id);
        self.updated_at = Utc::now();
        self.artifact.record(EventAction::MemberAdded, payload);
        Ok(true)
    }

    /// Add that refuses duplicates and archived composites
    pub fn add_member_strict(&mut self, id: ContentId) -> DomainResult<()> {
        if self.is_archived() {
            return Err(self.reject("archived"));
        }
        if self.members.contains(&id) {
            return Err(DomainError::AlreadyExists {
                aggregate_id: self.artifact.content_id().to_string(),
                member: id.to_string(),
            });
        }
        self.add_member(id).map(|_| ())
    }

    /// Remove a member; absent ids are refused
    pub fn remove_member(&mut self, id: &ContentId) -> DomainResult<()> {
        if !self.members.contains(id) {
            return Err(DomainError::NotFound {
                aggregate_id: self.artifact.content_id().to_string(),
                member: id.to_string(),
            });
        }
        self.members.remove(id);
        self.updated_at = Utc::now();
        self.artifact
            .record(EventAction::MemberRemoved, json!({ "memberId": id }));
        Ok(())
    }

    /// Replace the whole membership from a full snapshot (may be empty)
    pub fn sync_members(&mut self, ids: Vec<ContentId>) -> DomainResult<()> {
        let now = Utc::now();
        self.members.replace(ids);
        self.synced_at = Some(now);
        self.updated_at = now;

        let payload = json!({
            "memberIds": self.members,
            "syncedAt": now,
        });
        self.artifact.record(EventAction::Synced, payload);
        Ok(())
    }

    /// Permute members; any added, dropped or duplicated id fails the whole call
    pub fn reorder_members(&mut self, order: Vec<ContentId>) -> DomainResult<()> {
        if let Err(violation) = self.members.check_permutation(&order) {
            return Err(self.reject(format!("invalid reorder: {}", violation)));
        }
        let payload = json!({ "memberIds": order });
        self.members = Membership::from_ids(order);
        self.updated_at = Utc::now();
        self.artifact.record(EventAction::Reordered, payload);
        Ok(())
    }
}

impl<S: Archivable> Composite<S> {
    /// Freeze the composite; strict adds are refused afterwards
    pub fn archive(&mut self) -> DomainResult<()> {
        self.artifact.archive()
    }
}

impl<S: ArtifactSchema> Aggregate for Composite<S> {
    fn id(&self) -> &str {
        self.artifact.content_id().as_str()
    }

    fn aggregate_type(&self) -> AggregateType {
        S::AGGREGATE_TYPE
    }

    fn events(&self) -> &EventBuffer {
        self.artifact.events()
    }

    fn events_mut(&mut self) -> &mut EventBuffer {
        self.artifact.events_mut()
    }
}

impl<S: ArtifactSchema> Downloadable for Composite<S> {
    fn request_download(&mut self) -> DomainResult<()> {
        self.artifact.request_download()
    }

    fn mark_as_downloaded(&mut self, local_path: &str) -> DomainResult<()> {
        self.artifact.mark_as_downloaded(local_path)
    }

    fn local_path(&self) -> Option<&LocalPath> {
        self.artifact.local_path()
    }
}
