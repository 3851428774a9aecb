//! Application layer around the domain.
//!
//! This module contains:
//! - Outbox: Append-only log of published domain events
//! - Service: Per-aggregate command execution and event publishing

pub mod outbox;
pub mod service;

// Re-export commonly used types
pub use outbox::Outbox;
pub use service::{CaptureService, DownloadCompleted, EventPublisher, MemoryPublisher};
