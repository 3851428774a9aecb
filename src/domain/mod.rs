//! Domain model for the capture core.
//!
//! This module contains the building blocks every platform shares:
//! - Values: self-validating identifiers and attributes
//! - Events: the immutable domain event envelope
//! - Aggregate / Artifact / Composite: identity, lifecycle and event buffer
//! - Lifecycle / Membership: shared policies

pub mod aggregate;
pub mod artifact;
pub mod composite;
pub mod error;
pub mod events;
pub mod lifecycle;
pub mod membership;
pub mod values;

// Re-export commonly used types
pub use aggregate::{Aggregate, Downloadable, EventBuffer};
pub use artifact::{Archivable, Artifact, ArtifactRecord, ArtifactSchema, Followable, Likeable, Marks};
pub use composite::{Composite, CompositeRecord};
pub use error::{DomainError, DomainResult, ValidationError};
pub use events::{AggregateType, DomainEvent, EventAction};
pub use lifecycle::{Engagement, ExpirationPolicy, Phase, RawEngagement};
pub use membership::{Membership, ReorderViolation};
pub use values::{ContentId, CorrelationId, Dimensions, IdFormat, LocalPath, MediaUrl, OwnerId, Tags, ValueObject};
