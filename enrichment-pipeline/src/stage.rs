use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use common_kafka::kafka_consumer::RecvErr;
use common_kafka::kafka_producer::TopicProducer;
use futures::{Stream, StreamExt};
use health::HealthHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::error::{EnrichmentError, PublishError};
use crate::event::Event;
use crate::metrics_consts::{
    DECODE_ERRORS, ENRICH_TIME, EVENTS_DROPPED, EVENTS_PUBLISHED, EVENTS_RECEIVED, PUBLISH_ERRORS,
    RECV_ERRORS,
};

/// The transform a stage applies to every decoded event.
#[async_trait]
pub trait Enrichment: Send + Sync {
    /// Used for logs, metric labels and the liveness component.
    fn name(&self) -> &'static str;

    async fn enrich(&self, event: Event) -> Result<Event, EnrichmentError>;
}

/// Where a stage forwards enriched events.
#[async_trait]
pub trait Publisher: Send + Sync {
    fn destination(&self) -> &str;

    async fn publish(&self, event: &Event) -> Result<(), PublishError>;
}

#[async_trait]
impl Publisher for TopicProducer {
    fn destination(&self) -> &str {
        self.topic()
    }

    async fn publish(&self, event: &Event) -> Result<(), PublishError> {
        Ok(self.send_json(event).await?)
    }
}

/// Identity transform, moves raw events onto the enrichment chain.
pub struct Passthrough;

#[async_trait]
impl Enrichment for Passthrough {
    fn name(&self) -> &'static str {
        "ingest"
    }

    async fn enrich(&self, event: Event) -> Result<Event, EnrichmentError> {
        Ok(event)
    }
}

/// Counters of one stage run, returned when the loop exits.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct StageSummary {
    /// Events decoded successfully
    pub received: u64,
    pub decode_errors: u64,
    pub receive_errors: u64,
    /// Events the transform rejected
    pub dropped: u64,
    pub published: u64,
    pub publish_failures: u64,
}

/// Consume, transform, produce.
///
/// A bad message, a failed transform or a failed publish never stops the loop.
/// Offsets are handled by the source, so nothing done here can undo a read.
pub struct Stage {
    enrichment: Arc<dyn Enrichment>,
    output: Option<Arc<dyn Publisher>>,
    poll_interval: Duration,
    liveness: HealthHandle,
}

impl Stage {
    pub fn new(
        enrichment: Arc<dyn Enrichment>,
        output: Option<Arc<dyn Publisher>>,
        poll_interval: Duration,
        liveness: HealthHandle,
    ) -> Self {
        Self {
            enrichment,
            output,
            poll_interval,
            liveness,
        }
    }

    pub fn name(&self) -> &'static str {
        self.enrichment.name()
    }

    /// Drives `source` until `shutdown` is cancelled or the source ends.
    ///
    /// Each poll waits at most `poll_interval`, so cancellation is noticed within one
    /// interval even when no messages arrive.
    pub async fn run<S>(self, source: S, shutdown: CancellationToken) -> StageSummary
    where
        S: Stream<Item = Result<Event, RecvErr>> + Send,
    {
        let stage = self.name();
        let mut source = std::pin::pin!(source);
        let mut summary = StageSummary::default();

        info!(
            stage,
            output = self.output.as_ref().map(|o| o.destination()),
            "stage started"
        );

        loop {
            self.liveness.report_healthy();

            let polled = tokio::select! {
                biased;
                _ = shutdown.cancelled() => {
                    info!(stage, "shutdown requested");
                    break;
                }
                polled = tokio::time::timeout(self.poll_interval, source.next()) => polled,
            };

            match polled {
                Err(_elapsed) => continue,
                Ok(None) => {
                    info!(stage, "source ended");
                    break;
                }
                Ok(Some(received)) => self.handle(received, &mut summary).await,
            }
        }

        info!(stage, ?summary, "stage stopped");
        summary
    }

    async fn handle(&self, received: Result<Event, RecvErr>, summary: &mut StageSummary) {
        let stage = self.name();

        let event = match received {
            Ok(event) => event,
            Err(e) if e.is_decode_error() => {
                warn!(stage, error = %e, "skipping undecodable message");
                metrics::counter!(DECODE_ERRORS, "stage" => stage, "reason" => e.reason())
                    .increment(1);
                summary.decode_errors += 1;
                return;
            }
            Err(e) => {
                error!(stage, error = %e, "failed to receive message");
                metrics::counter!(RECV_ERRORS, "stage" => stage).increment(1);
                summary.receive_errors += 1;
                return;
            }
        };

        summary.received += 1;
        metrics::counter!(EVENTS_RECEIVED, "stage" => stage).increment(1);

        let event_id = event.id;
        let start = Instant::now();
        let enriched = self.enrichment.enrich(event).await;
        metrics::histogram!(ENRICH_TIME, "stage" => stage)
            .record(start.elapsed().as_secs_f64());

        let event = match enriched {
            Ok(event) => event,
            Err(e) => {
                warn!(stage, event_id, error = %e, "dropping event");
                metrics::counter!(EVENTS_DROPPED, "stage" => stage, "reason" => e.reason())
                    .increment(1);
                summary.dropped += 1;
                return;
            }
        };

        let Some(output) = &self.output else {
            debug!(stage, event_id, "event reached the end of the pipeline");
            return;
        };

        match output.publish(&event).await {
            Ok(()) => {
                metrics::counter!(EVENTS_PUBLISHED, "stage" => stage).increment(1);
                summary.published += 1;
            }
            Err(e) => {
                error!(stage, event_id, topic = output.destination(), error = %e, "failed to publish event");
                metrics::counter!(PUBLISH_ERRORS, "stage" => stage).increment(1);
                summary.publish_failures += 1;
            }
        }
    }
}
