//! Application service around the domain aggregates.
//!
//! Holds live aggregates by id, serializes commands per aggregate, and
//! publishes the events each command produced. The domain layer stays
//! synchronous; everything here is async.

use std::collections::HashMap;
use std::sync::Arc;

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, info, instrument, warn};

use super::outbox::Outbox;
use crate::domain::{Aggregate, CorrelationId, DomainError, DomainEvent, DomainResult, Downloadable};

/// Sink for drained domain events
#[async_trait]
pub trait EventPublisher: Send + Sync {
    /// Publish in order; returns how many events were new
    async fn publish(&self, events: &[DomainEvent]) -> Result<usize>;
}

#[async_trait]
impl EventPublisher for Outbox {
    async fn publish(&self, events: &[DomainEvent]) -> Result<usize> {
        self.append(events).await
    }
}

/// In-process publisher, deduplicating on idempotency key
#[derive(Debug, Default)]
pub struct MemoryPublisher {
    events: Mutex<Vec<DomainEvent>>,
}

impl MemoryPublisher {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn published(&self) -> Vec<DomainEvent> {
        self.events.lock().await.clone()
    }
}

#[async_trait]
impl EventPublisher for MemoryPublisher {
    async fn publish(&self, events: &[DomainEvent]) -> Result<usize> {
        let mut published = self.events.lock().await;
        let mut written = 0;
        for event in events {
            if published
                .iter()
                .any(|e| e.idempotency_key() == event.idempotency_key())
            {
                continue;
            }
            published.push(event.clone());
            written += 1;
        }
        Ok(written)
    }
}

/// Completion notice sent back by the download consumer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DownloadCompleted {
    pub aggregate_id: String,
    pub local_path: String,
    #[serde(default)]
    pub correlation_id: Option<CorrelationId>,
}

/// Live aggregates of one type, one lock per id
pub struct CaptureService<A> {
    aggregates: RwLock<HashMap<String, Arc<Mutex<A>>>>,
    publisher: Arc<dyn EventPublisher>,
}

impl<A> CaptureService<A>
where
    A: Aggregate + Send + 'static,
{
    pub fn new(publisher: Arc<dyn EventPublisher>) -> Self {
        Self {
            aggregates: RwLock::new(HashMap::new()),
            publisher,
        }
    }

    /// Register a freshly captured aggregate and publish its creation events.
    ///
    /// The id is reserved before publishing. If publishing fails the
    /// aggregate stays registered with its events pending; [`Self::flush`]
    /// retries them.
    #[instrument(skip(self, aggregate), fields(id = %aggregate.id(), kind = %aggregate.aggregate_type()))]
    pub async fn capture(&self, aggregate: A) -> Result<Vec<DomainEvent>> {
        let id = aggregate.id().to_string();
        let handle = Arc::new(Mutex::new(aggregate));
        let mut guard = handle.lock().await;

        {
            let mut aggregates = self.aggregates.write().await;
            if aggregates.contains_key(&id) {
                return Err(DomainError::AlreadyExists {
                    aggregate_id: guard.aggregate_type().to_string(),
                    member: id,
                }
                .into());
            }
            aggregates.insert(id.clone(), Arc::clone(&handle));
        }

        let events = self.publish_pending(&id, &mut *guard).await?;
        info!(events = events.len(), "Captured aggregate");
        Ok(events)
    }

    /// Handle to a registered aggregate
    pub async fn get(&self, id: &str) -> Option<Arc<Mutex<A>>> {
        self.aggregates.read().await.get(id).cloned()
    }

    pub async fn contains(&self, id: &str) -> bool {
        self.aggregates.read().await.contains_key(id)
    }

    pub async fn len(&self) -> usize {
        self.aggregates.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.aggregates.read().await.is_empty()
    }

    /// Read-only access under the aggregate's lock
    pub async fn inspect<R>(&self, id: &str, read: impl FnOnce(&A) -> R) -> Result<R> {
        let handle = self.handle(id).await?;
        let aggregate = handle.lock().await;
        Ok(read(&aggregate))
    }

    async fn handle(&self, id: &str) -> Result<Arc<Mutex<A>>> {
        self.get(id)
            .await
            .with_context(|| format!("No aggregate with id {}", id))
    }

    /// Run one command as the single writer of `id` and publish its events.
    ///
    /// A failed command publishes nothing and leaves the aggregate as it was.
    /// Events still pending from an earlier failed publish go out first.
    #[instrument(skip(self, command))]
    pub async fn execute<F>(&self, id: &str, command: F) -> Result<Vec<DomainEvent>>
    where
        F: FnOnce(&mut A) -> DomainResult<()> + Send,
    {
        let handle = self.handle(id).await?;
        let mut aggregate = handle.lock().await;

        let mark = aggregate.pending_events().len();
        command(&mut *aggregate)?;
        let recorded = aggregate.pending_events()[mark..].to_vec();

        self.publish_pending(id, &mut *aggregate).await?;
        Ok(recorded)
    }

    /// Retry publishing whatever `id` still has pending
    pub async fn flush(&self, id: &str) -> Result<Vec<DomainEvent>> {
        let handle = self.handle(id).await?;
        let mut aggregate = handle.lock().await;
        self.publish_pending(id, &mut *aggregate).await
    }

    // Called with the aggregate lock held so events leave in command order.
    // Events are drained only once the publisher accepted them.
    async fn publish_pending(&self, id: &str, aggregate: &mut A) -> Result<Vec<DomainEvent>> {
        let events = aggregate.pending_events().to_vec();
        if events.is_empty() {
            return Ok(events);
        }

        let written = match self.publisher.publish(&events).await {
            Ok(written) => written,
            Err(err) => {
                warn!(id, pending = events.len(), "Publish failed, events kept pending");
                return Err(err.context(format!("Failed to publish events for {}", id)));
            }
        };
        aggregate.pull_domain_events();

        for event in &events {
            debug!(kind = %event.event_kind(), key = %event.idempotency_key(), "Published event");
        }
        if written < events.len() {
            debug!(skipped = events.len() - written, "Publisher already had some events");
        }
        Ok(events)
    }
}

impl<A> CaptureService<A>
where
    A: Downloadable + Send + 'static,
{
    /// Ask the download consumer to fetch `id`
    pub async fn request_download(&self, id: &str) -> Result<Vec<DomainEvent>> {
        let events = self.execute(id, |a| a.request_download()).await?;
        info!(id, "Download requested");
        Ok(events)
    }

    /// Apply a consumer's completion notice.
    ///
    /// A replayed notice for the path already recorded changes nothing, but
    /// retries events left pending by a failed publish. A notice with a
    /// different path fails with `AlreadyDownloaded`, and the rejected
    /// notice's correlation id is not kept.
    #[instrument(skip(self, notice), fields(id = %notice.aggregate_id))]
    pub async fn complete_download(&self, notice: &DownloadCompleted) -> Result<Vec<DomainEvent>> {
        let handle = self.handle(&notice.aggregate_id).await?;
        let mut aggregate = handle.lock().await;

        if let Some(existing) = aggregate.local_path() {
            if existing.as_str() == notice.local_path {
                warn!(path = %notice.local_path, "Ignoring replayed completion notice");
                return self.publish_pending(&notice.aggregate_id, &mut *aggregate).await;
            }
        }

        let previous = aggregate.events().correlation_id();
        if let Some(correlation_id) = notice.correlation_id {
            aggregate.correlate(correlation_id);
        }
        let mark = aggregate.pending_events().len();
        if let Err(err) = aggregate.mark_as_downloaded(&notice.local_path) {
            aggregate.correlate(previous);
            return Err(err.into());
        }
        let events = aggregate.pending_events()[mark..].to_vec();
        self.publish_pending(&notice.aggregate_id, &mut *aggregate).await?;

        info!(path = %notice.local_path, "Download completed");
        Ok(events)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, Ordering};

    use crate::domain::AggregateType;
    use crate::platforms::{ingest, Captured};
    use serde_json::json;

    /// Publisher that rejects every batch while `failing` is set
    #[derive(Default)]
    struct FlakyPublisher {
        inner: MemoryPublisher,
        failing: AtomicBool,
    }

    impl FlakyPublisher {
        fn set_failing(&self, failing: bool) {
            self.failing.store(failing, Ordering::SeqCst);
        }

        async fn kinds(&self) -> Vec<String> {
            self.inner
                .published()
                .await
                .iter()
                .map(|e| e.event_kind().to_string())
                .collect()
        }
    }

    #[async_trait]
    impl EventPublisher for FlakyPublisher {
        async fn publish(&self, events: &[DomainEvent]) -> Result<usize> {
            if self.failing.load(Ordering::SeqCst) {
                anyhow::bail!("outbox unavailable");
            }
            self.inner.publish(events).await
        }
    }

    fn flaky_service() -> (CaptureService<Captured>, Arc<FlakyPublisher>) {
        let publisher = Arc::new(FlakyPublisher::default());
        (CaptureService::new(publisher.clone()), publisher)
    }

    fn pin(id: &str) -> Captured {
        ingest(
            AggregateType::Pin,
            json!({
                "id": id,
                "ownerId": "pinner",
                "imageUrl": "https://i.pinimg.com/originals/aa/bb.jpg"
            }),
        )
        .unwrap()
    }

    fn service() -> (CaptureService<Captured>, Arc<MemoryPublisher>) {
        let publisher = Arc::new(MemoryPublisher::new());
        (CaptureService::new(publisher.clone()), publisher)
    }

    #[tokio::test]
    async fn test_capture_publishes_creation_event() {
        let (service, publisher) = service();
        let events = service.capture(pin("100")).await.unwrap();

        assert_eq!(events.len(), 1);
        assert_eq!(publisher.published().await.len(), 1);
        assert!(service.contains("100").await);
    }

    #[tokio::test]
    async fn test_duplicate_capture_rejected() {
        let (service, _) = service();
        service.capture(pin("100")).await.unwrap();

        let err = service.capture(pin("100")).await.unwrap_err();
        let domain = err.downcast_ref::<DomainError>().unwrap();
        assert!(matches!(domain, DomainError::AlreadyExists { .. }));
        assert_eq!(service.len().await, 1);
    }

    #[tokio::test]
    async fn test_failed_command_publishes_nothing() {
        let (service, publisher) = service();
        service.capture(pin("100")).await.unwrap();

        let err = service
            .execute("100", |a| a.mark_as_downloaded(""))
            .await
            .unwrap_err();
        assert!(err.downcast_ref::<DomainError>().is_some());
        assert_eq!(publisher.published().await.len(), 1);
    }

    #[tokio::test]
    async fn test_unknown_id() {
        let (service, _) = service();
        assert!(service.request_download("404").await.is_err());
    }

    #[tokio::test]
    async fn test_replayed_completion_is_noop() {
        let (service, publisher) = service();
        service.capture(pin("100")).await.unwrap();
        service.request_download("100").await.unwrap();

        let notice = DownloadCompleted {
            aggregate_id: "100".to_string(),
            local_path: "/media/pins/100.jpg".to_string(),
            correlation_id: Some(CorrelationId::new()),
        };
        let first = service.complete_download(&notice).await.unwrap();
        assert_eq!(first.len(), 1);
        assert_eq!(first[0].correlation_id(), notice.correlation_id.unwrap());

        let replay = service.complete_download(&notice).await.unwrap();
        assert!(replay.is_empty());
        assert_eq!(publisher.published().await.len(), 3);

        let conflicting = DownloadCompleted {
            local_path: "/elsewhere.jpg".to_string(),
            ..notice
        };
        let err = service.complete_download(&conflicting).await.unwrap_err();
        assert!(matches!(
            err.downcast_ref::<DomainError>(),
            Some(DomainError::AlreadyDownloaded { .. })
        ));
    }

    #[tokio::test]
    async fn test_publish_failure_keeps_events_pending() {
        let (service, publisher) = flaky_service();
        service.capture(pin("1")).await.unwrap();
        service.request_download("1").await.unwrap();

        publisher.set_failing(true);
        let err = service
            .execute("1", |a| a.mark_as_downloaded("/media/pins/1.jpg"))
            .await
            .unwrap_err();
        assert!(err.downcast_ref::<DomainError>().is_none());

        let (downloaded, pending) = service
            .inspect("1", |a| (a.local_path().is_some(), a.pending_events().len()))
            .await
            .unwrap();
        assert!(downloaded);
        assert_eq!(pending, 1);
        assert_eq!(publisher.kinds().await, vec!["pin.captured", "pin.download.requested"]);

        publisher.set_failing(false);
        let flushed = service.flush("1").await.unwrap();
        assert_eq!(flushed.len(), 1);
        assert_eq!(flushed[0].event_kind(), "pin.downloaded");
        assert_eq!(
            publisher.kinds().await,
            vec!["pin.captured", "pin.download.requested", "pin.downloaded"]
        );
        assert!(service.flush("1").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_capture_registers_even_when_publish_fails() {
        let (service, publisher) = flaky_service();

        publisher.set_failing(true);
        assert!(service.capture(pin("1")).await.is_err());
        assert!(service.contains("1").await);

        // the id stays reserved
        let err = service.capture(pin("1")).await.unwrap_err();
        assert!(matches!(
            err.downcast_ref::<DomainError>(),
            Some(DomainError::AlreadyExists { .. })
        ));

        // leftovers go out ahead of the next command's events
        publisher.set_failing(false);
        let events = service.request_download("1").await.unwrap();
        assert_eq!(events.len(), 1);
        assert_eq!(publisher.kinds().await, vec!["pin.captured", "pin.download.requested"]);
    }

    #[tokio::test]
    async fn test_redelivered_notice_retries_pending_publish() {
        let (service, publisher) = flaky_service();
        service.capture(pin("1")).await.unwrap();
        service.request_download("1").await.unwrap();

        let notice = DownloadCompleted {
            aggregate_id: "1".to_string(),
            local_path: "/media/pins/1.jpg".to_string(),
            correlation_id: None,
        };
        publisher.set_failing(true);
        assert!(service.complete_download(&notice).await.is_err());

        publisher.set_failing(false);
        let retried = service.complete_download(&notice).await.unwrap();
        assert_eq!(retried.len(), 1);
        assert_eq!(retried[0].event_kind(), "pin.downloaded");
        assert!(service.complete_download(&notice).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_rejected_notice_keeps_correlation() {
        let (service, _) = service();
        service.capture(pin("1")).await.unwrap();
        let original = service
            .inspect("1", |a| a.events().correlation_id())
            .await
            .unwrap();

        let rejected = DownloadCompleted {
            aggregate_id: "1".to_string(),
            local_path: String::new(),
            correlation_id: Some(CorrelationId::new()),
        };
        assert!(service.complete_download(&rejected).await.is_err());

        let events = service.request_download("1").await.unwrap();
        assert_eq!(events[0].correlation_id(), original);
    }
}
