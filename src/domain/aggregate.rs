//! Aggregate base: identity plus a pending event buffer.
//!
//! Mutations are all-or-nothing. A method either validates, applies its
//! change and records exactly one event, or returns an error having
//! touched nothing. Non-authoritative refreshes apply without an event.

use serde_json::Value;

use super::error::DomainResult;
use super::events::{AggregateType, DomainEvent, EventAction};
use super::values::{CorrelationId, LocalPath};

/// Events recorded by an aggregate and not yet drained
#[derive(Debug, Clone, Default)]
pub struct EventBuffer {
    pending: Vec<DomainEvent>,
    correlation_id: CorrelationId,
}

impl EventBuffer {
    pub fn new(correlation_id: CorrelationId) -> Self {
        Self {
            pending: Vec::new(),
            correlation_id,
        }
    }

    /// Append an event stamped with the current correlation id
    pub fn record(
        &mut self,
        aggregate_type: AggregateType,
        aggregate_id: &str,
        action: EventAction,
        payload: Value,
    ) -> &DomainEvent {
        let event = DomainEvent::new(
            aggregate_type,
            aggregate_id,
            action,
            payload,
            self.correlation_id,
        );
        self.pending.push(event);
        &self.pending[self.pending.len() - 1]
    }

    pub fn correlation_id(&self) -> CorrelationId {
        self.correlation_id
    }

    pub fn set_correlation_id(&mut self, correlation_id: CorrelationId) {
        self.correlation_id = correlation_id;
    }

    pub fn pending(&self) -> &[DomainEvent] {
        &self.pending
    }

    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    /// Take everything; the buffer is empty afterwards
    pub fn drain(&mut self) -> Vec<DomainEvent> {
        std::mem::take(&mut self.pending)
    }

    /// Take the events recorded after position `from`
    pub fn drain_from(&mut self, from: usize) -> Vec<DomainEvent> {
        if from >= self.pending.len() {
            return Vec::new();
        }
        self.pending.split_off(from)
    }
}

/// Consistency boundary: one id, one set of invariants, one event history
pub trait Aggregate {
    fn id(&self) -> &str;

    fn aggregate_type(&self) -> AggregateType;

    fn events(&self) -> &EventBuffer;

    fn events_mut(&mut self) -> &mut EventBuffer;

    /// Events recorded since the last drain
    fn pending_events(&self) -> &[DomainEvent] {
        self.events().pending()
    }

    /// Drain and return buffered events; each is handed out exactly once
    fn pull_domain_events(&mut self) -> Vec<DomainEvent> {
        self.events_mut().drain()
    }

    /// Tag subsequent events with a correlation id
    fn correlate(&mut self, correlation_id: CorrelationId) {
        self.events_mut().set_correlation_id(correlation_id);
    }

    /// Run one command and return exactly the events it recorded.
    ///
    /// Events already pending before the call stay buffered.
    fn transact<F>(&mut self, command: F) -> DomainResult<Vec<DomainEvent>>
    where
        Self: Sized,
        F: FnOnce(&mut Self) -> DomainResult<()>,
    {
        let mark = self.events().len();
        command(self)?;
        Ok(self.events_mut().drain_from(mark))
    }
}

/// Aggregates whose media the download consumer fetches
pub trait Downloadable: Aggregate {
    fn request_download(&mut self) -> DomainResult<()>;

    fn mark_as_downloaded(&mut self, local_path: &str) -> DomainResult<()>;

    fn local_path(&self) -> Option<&LocalPath>;
}
