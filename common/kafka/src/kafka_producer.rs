use std::time::Duration;

use health::HealthHandle;
use rdkafka::error::KafkaError;
use rdkafka::producer::{DeliveryFuture, FutureProducer, FutureRecord, Producer};
use rdkafka::ClientConfig;
use serde::Serialize;
use serde_json::error::Error as SerdeError;
use thiserror::Error;
use tracing::{debug, error, info};

use crate::config::{AckPolicy, KafkaConfig};

pub struct KafkaContext {
    liveness: HealthHandle,
}

impl From<HealthHandle> for KafkaContext {
    fn from(value: HealthHandle) -> Self {
        KafkaContext { liveness: value }
    }
}

impl rdkafka::ClientContext for KafkaContext {
    fn stats(&self, stats: rdkafka::Statistics) {
        // Signal liveness, as the main rdkafka loop is running and calling us
        self.liveness.report_healthy();

        metrics::gauge!("kafka_producer_queue_depth").set(stats.msg_cnt as f64);
        metrics::gauge!("kafka_producer_queue_depth_limit").set(stats.msg_max as f64);
        metrics::gauge!("kafka_callback_queue_depth").set(stats.replyq as f64);
    }
}

pub async fn create_kafka_producer(
    config: &KafkaConfig,
    liveness: HealthHandle,
) -> Result<FutureProducer<KafkaContext>, KafkaError> {
    let mut client_config = ClientConfig::new();
    client_config
        .set("bootstrap.servers", &config.kafka_hosts)
        .set("statistics.interval.ms", "10000")
        .set("linger.ms", config.kafka_producer_linger_ms.to_string())
        .set(
            "message.timeout.ms",
            config.kafka_message_timeout_ms.to_string(),
        )
        .set(
            "compression.codec",
            config.kafka_compression_codec.to_owned(),
        )
        .set(
            "queue.buffering.max.kbytes",
            (config.kafka_producer_queue_mib * 1024).to_string(),
        )
        .set(
            "queue.buffering.max.messages",
            config.kafka_producer_queue_messages.to_string(),
        );

    if config.kafka_tls {
        client_config
            .set("security.protocol", "ssl")
            .set("enable.ssl.certificate.verification", "false");
    };

    debug!("rdkafka configuration: {:?}", client_config);
    let api: FutureProducer<KafkaContext> = client_config.create_with_context(liveness.into())?;

    // "Ping" the Kafka brokers by requesting metadata
    match api.client().fetch_metadata(None, Duration::from_secs(15)) {
        Ok(metadata) => {
            info!(
                "Successfully connected to Kafka brokers. Found {} topics.",
                metadata.topics().len()
            );
        }
        Err(error) => {
            error!("Failed to fetch metadata from Kafka brokers: {:?}", error);
            return Err(error);
        }
    }

    Ok(api)
}

#[derive(Error, Debug)]
pub enum KafkaProduceError {
    #[error("failed to serialize: {error}")]
    SerializationError { error: SerdeError },
    #[error("failed to produce to kafka: {error}")]
    KafkaProduceError { error: KafkaError },
    #[error("failed to produce to kafka (timeout)")]
    KafkaProduceCanceled,
}

/// Publishes JSON payloads to a single topic, honouring an [`AckPolicy`].
#[derive(Clone)]
pub struct TopicProducer {
    producer: FutureProducer<KafkaContext>,
    topic: String,
    ack_policy: AckPolicy,
}

impl TopicProducer {
    pub fn new(producer: FutureProducer<KafkaContext>, topic: &str, ack_policy: AckPolicy) -> Self {
        Self {
            producer,
            topic: topic.to_owned(),
            ack_policy,
        }
    }

    pub fn topic(&self) -> &str {
        &self.topic
    }

    pub fn ack_policy(&self) -> AckPolicy {
        self.ack_policy
    }

    /// Serializes `item` and queues it. Under [`AckPolicy::Wait`] this only returns once the
    /// broker acknowledged the write; under [`AckPolicy::FireAndForget`] delivery failures
    /// are logged from a background task and never reach the caller.
    pub async fn send_json<T>(&self, item: &T) -> Result<(), KafkaProduceError>
    where
        T: Serialize,
    {
        let payload = serde_json::to_string(item)
            .map_err(|e| KafkaProduceError::SerializationError { error: e })?;

        let record = FutureRecord::<(), str>::to(&self.topic).payload(&payload);
        let delivery = self
            .producer
            .send_result(record)
            .map_err(|(e, _)| KafkaProduceError::KafkaProduceError { error: e })?;

        match self.ack_policy {
            AckPolicy::Wait => wait_for_ack(delivery).await,
            AckPolicy::FireAndForget => {
                let topic = self.topic.clone();
                tokio::spawn(async move {
                    if let Err(e) = wait_for_ack(delivery).await {
                        metrics::counter!("kafka_produce_errors_total", "topic" => topic.clone())
                            .increment(1);
                        error!(topic, "failed to produce to kafka: {}", e);
                    }
                });
                Ok(())
            }
        }
    }

    pub fn flush(&self, timeout: Duration) -> Result<(), KafkaError> {
        self.producer.flush(timeout)
    }
}

async fn wait_for_ack(delivery: DeliveryFuture) -> Result<(), KafkaProduceError> {
    match delivery.await {
        Ok(Ok(_)) => Ok(()),
        Ok(Err((error, _))) => Err(KafkaProduceError::KafkaProduceError { error }),
        // Cancelled due to timeout while retrying
        Err(_) => Err(KafkaProduceError::KafkaProduceCanceled),
    }
}

#[cfg(test)]
mod tests {
    use rdkafka::types::{RDKafkaApiKey, RDKafkaRespErr};
    use serde_json::json;

    use super::*;
    use crate::test::create_mock_kafka;

    #[tokio::test]
    async fn wait_policy_surfaces_broker_errors() {
        let (cluster, producer) = create_mock_kafka().await;
        let sink = TopicProducer::new(producer, "casino-event-log", AckPolicy::Wait);
        let event = json!({"id": 1, "type": "bet"});

        // Wait for the producer to be healthy, to keep the message timeout short
        for _ in 0..20 {
            if sink.send_json(&event).await.is_ok() {
                break;
            }
        }
        sink.send_json(&event)
            .await
            .expect("failed to send initial event");

        let err = [RDKafkaRespErr::RD_KAFKA_RESP_ERR_MSG_SIZE_TOO_LARGE; 1];
        cluster.request_errors(RDKafkaApiKey::Produce, &err);
        match sink.send_json(&event).await {
            Err(KafkaProduceError::KafkaProduceError { .. }) => {} // Expected
            Err(err) => panic!("wrong error {}", err),
            Ok(()) => panic!("should have errored"),
        }
    }

    #[tokio::test]
    async fn fire_and_forget_does_not_surface_broker_errors() {
        let (cluster, producer) = create_mock_kafka().await;
        let sink = TopicProducer::new(producer, "casino-event-log", AckPolicy::FireAndForget);
        assert_eq!(sink.ack_policy(), AckPolicy::FireAndForget);

        let err = [RDKafkaRespErr::RD_KAFKA_RESP_ERR_MSG_SIZE_TOO_LARGE; 1];
        cluster.request_errors(RDKafkaApiKey::Produce, &err);
        sink.send_json(&json!({"id": 2, "type": "deposit"}))
            .await
            .expect("fire and forget should not wait for the ack");
    }
}
