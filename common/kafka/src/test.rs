use std::time::Duration;

use health::HealthRegistry;
use rdkafka::mocking::MockCluster;
use rdkafka::producer::{DefaultProducerContext, FutureProducer};

use crate::config::{AckPolicy, ConsumerConfig, KafkaConfig};
use crate::kafka_producer::{create_kafka_producer, KafkaContext};

pub fn mock_kafka_config(kafka_hosts: String) -> KafkaConfig {
    KafkaConfig {
        kafka_producer_linger_ms: 0,
        kafka_producer_queue_mib: 50,
        kafka_producer_queue_messages: 1000,
        kafka_message_timeout_ms: 5000,
        kafka_compression_codec: "none".to_string(),
        kafka_producer_ack_policy: AckPolicy::Wait,
        kafka_tls: false,
        kafka_hosts,
    }
}

pub fn mock_consumer_config() -> ConsumerConfig {
    ConsumerConfig {
        kafka_consumer_group: "casino-pipeline-test".to_string(),
        kafka_consumer_offset_reset: "earliest".to_string(),
        kafka_consumer_auto_commit_interval_ms: 1000,
    }
}

pub async fn create_mock_kafka() -> (
    MockCluster<'static, DefaultProducerContext>,
    FutureProducer<KafkaContext>,
) {
    let registry = HealthRegistry::new("liveness");
    let handle = registry.register("kafka", Duration::from_secs(30));
    let cluster = MockCluster::new(1).expect("failed to create mock brokers");

    let config = mock_kafka_config(cluster.bootstrap_servers());

    (
        cluster,
        create_kafka_producer(&config, handle)
            .await
            .expect("failed to create mocked kafka producer"),
    )
}
