//! capture - content capture lifecycle and event core
//!
//! Models content captured from social and media platforms (posts,
//! reels, stories, pins, boards, tweets, threads, photos, videos,
//! playlists, profiles and licenses) as aggregates that enforce their own
//! invariants and emit domain events for every meaningful transition.
//!
//! # Architecture
//!
//! - Value objects validate on construction
//! - Aggregates mutate all-or-nothing and buffer the events they record
//! - The application service drains those events into an append-only outbox
//! - The download consumer reports back with a completion notice
//!
//! # Modules
//!
//! - `domain`: Value objects, events, aggregate base, lifecycle policies
//! - `platforms`: Per-platform aggregates and the raw payload factories
//! - `core`: Outbox and application service
//! - `config`: Configuration discovery
//! - `cli`: Command-line interface
//!
//! # Usage
//!
//! ```bash
//! # Capture a post and ask for its media
//! capture ingest --platform post --file post.json --download
//!
//! # Replay what was published for it
//! capture events --aggregate CxYz123AbC
//! ```

pub mod cli;
pub mod config;
pub mod core;
pub mod domain;
pub mod platforms;

// Re-export main types at crate root for convenience
pub use core::{CaptureService, DownloadCompleted, EventPublisher, MemoryPublisher, Outbox};
pub use domain::{
    Aggregate, AggregateType, ContentId, DomainError, DomainEvent, DomainResult, Downloadable,
    EventAction, ValidationError,
};
pub use platforms::{ingest, Capture, Captured};
