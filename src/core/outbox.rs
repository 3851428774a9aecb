//! Append-only outbox of published domain events.
//!
//! Events are stored as newline-delimited JSON (JSONL). Every append takes
//! an exclusive file lock and skips events whose idempotency key is already
//! in the file, so replaying a batch publishes it at most once.

use std::collections::HashSet;
use std::fs::OpenOptions;
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use fs2::FileExt;
use serde::Deserialize;
use tokio::fs::{self, File};
use tokio::io::{AsyncBufReadExt, BufReader as AsyncBufReader};
use tracing::debug;

use crate::domain::DomainEvent;

/// File-based outbox using JSONL format
#[derive(Debug, Clone)]
pub struct Outbox {
    /// Path to the outbox file
    path: PathBuf,
}

/// Just enough of a stored line to dedupe on
#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct StoredKey {
    idempotency_key: String,
}

impl Outbox {
    /// Open (or prepare to create) the outbox at `path`
    pub async fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .await
                .with_context(|| format!("Failed to create outbox directory: {}", parent.display()))?;
        }
        Ok(Self { path })
    }

    /// Open the outbox configured for this process
    pub async fn open_default() -> Result<Self> {
        Self::open(crate::config::outbox_path()?).await
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Append events in order, skipping any already published.
    ///
    /// Returns how many events were written.
    pub async fn append(&self, events: &[DomainEvent]) -> Result<usize> {
        if events.is_empty() {
            return Ok(0);
        }
        let path = self.path.clone();
        let events = events.to_vec();

        let written = tokio::task::spawn_blocking(move || append_locked(&path, &events))
            .await
            .context("Outbox writer task failed")??;

        debug!(path = %self.path.display(), written, "Appended events to outbox");
        Ok(written)
    }

    /// Replay all events in order
    pub async fn replay(&self) -> Result<Vec<DomainEvent>> {
        if !self.path.exists() {
            return Ok(Vec::new());
        }

        let file = File::open(&self.path)
            .await
            .with_context(|| format!("Failed to open outbox: {}", self.path.display()))?;

        let mut lines = AsyncBufReader::new(file).lines();
        let mut events = Vec::new();

        while let Some(line) = lines.next_line().await? {
            if line.trim().is_empty() {
                continue;
            }
            let event: DomainEvent = serde_json::from_str(&line)
                .with_context(|| format!("Failed to parse event: {}", line))?;
            events.push(event);
        }

        Ok(events)
    }

    /// Check whether an event with this idempotency key was already published
    pub async fn is_published(&self, idempotency_key: &str) -> Result<bool> {
        let events = self.replay().await?;
        Ok(events.iter().any(|e| e.idempotency_key() == idempotency_key))
    }

    /// Find events matching a predicate
    pub async fn find_events<F>(&self, predicate: F) -> Result<Vec<DomainEvent>>
    where
        F: Fn(&DomainEvent) -> bool,
    {
        let events = self.replay().await?;
        Ok(events.into_iter().filter(predicate).collect())
    }

    /// Every event of one aggregate, oldest first
    pub async fn for_aggregate(&self, aggregate_id: &str) -> Result<Vec<DomainEvent>> {
        self.find_events(|e| e.aggregate_id() == aggregate_id).await
    }

    /// The most recent event of a kind such as `post.downloaded`
    pub async fn last_of_kind(&self, event_kind: &str) -> Result<Option<DomainEvent>> {
        let events = self.replay().await?;
        Ok(events.into_iter().rev().find(|e| e.event_kind() == event_kind))
    }
}

/// Append under an exclusive lock; the lock is released when the file drops
fn append_locked(path: &Path, events: &[DomainEvent]) -> Result<usize> {
    let file = OpenOptions::new()
        .create(true)
        .read(true)
        .append(true)
        .open(path)
        .with_context(|| format!("Failed to open outbox: {}", path.display()))?;

    file.lock_exclusive()
        .context("Failed to acquire file lock on outbox")?;

    let mut published = HashSet::new();
    for line in BufReader::new(&file).lines() {
        let line = line.context("Failed to read outbox")?;
        if line.trim().is_empty() {
            continue;
        }
        let stored: StoredKey = serde_json::from_str(&line)
            .with_context(|| format!("Failed to parse event: {}", line))?;
        published.insert(stored.idempotency_key);
    }

    let mut writer = &file;
    let mut written = 0;
    for event in events {
        if !published.insert(event.idempotency_key().to_string()) {
            continue;
        }
        let json = serde_json::to_string(event).context("Failed to serialize event")?;
        writeln!(writer, "{}", json).context("Failed to write event")?;
        written += 1;
    }
    writer.flush().context("Failed to flush outbox")?;

    Ok(written)
}
