use std::sync::Arc;

use futures::Stream;
use rdkafka::{
    consumer::{Consumer, StreamConsumer},
    error::KafkaError,
    ClientConfig, Message,
};
use serde::de::DeserializeOwned;
use tracing::debug;

use crate::config::{ConsumerConfig, KafkaConfig};

#[derive(Clone)]
pub struct SingleTopicConsumer {
    inner: Arc<Inner>,
}

struct Inner {
    consumer: StreamConsumer,
    topic: String,
}

#[derive(Debug, thiserror::Error)]
pub enum RecvErr {
    #[error("Kafka error: {0}")]
    Kafka(#[from] KafkaError),
    #[error("Serde error: {0}")]
    Serde(#[from] serde_json::Error),
    #[error("Received empty payload")]
    Empty,
}

impl RecvErr {
    /// Short label for metrics and logs.
    pub fn reason(&self) -> &'static str {
        match self {
            RecvErr::Kafka(_) => "kafka",
            RecvErr::Serde(_) => "decode",
            RecvErr::Empty => "empty",
        }
    }

    /// True when the message itself was unusable, as opposed to the transport failing.
    pub fn is_decode_error(&self) -> bool {
        !matches!(self, RecvErr::Kafka(_))
    }
}

impl SingleTopicConsumer {
    pub fn new(
        common_config: &KafkaConfig,
        consumer_config: &ConsumerConfig,
        group: &str,
        topic: &str,
    ) -> Result<Self, KafkaError> {
        let mut client_config = ClientConfig::new();
        client_config
            .set("bootstrap.servers", &common_config.kafka_hosts)
            .set("statistics.interval.ms", "10000")
            .set("group.id", group)
            .set(
                "auto.offset.reset",
                &consumer_config.kafka_consumer_offset_reset,
            )
            .set("enable.auto.commit", "true")
            .set(
                "auto.commit.interval.ms",
                consumer_config
                    .kafka_consumer_auto_commit_interval_ms
                    .to_string(),
            );

        // Offsets are stored explicitly, as soon as a message is read
        client_config.set("enable.auto.offset.store", "false");

        if common_config.kafka_tls {
            client_config
                .set("security.protocol", "ssl")
                .set("enable.ssl.certificate.verification", "false");
        };

        debug!("rdkafka consumer configuration: {:?}", client_config);
        let consumer: StreamConsumer = client_config.create()?;
        consumer.subscribe(&[topic])?;

        let inner = Inner {
            consumer,
            topic: topic.to_owned(),
        };
        Ok(Self {
            inner: Arc::new(inner),
        })
    }

    pub fn topic(&self) -> &str {
        &self.inner.topic
    }

    /// Receives the next message and decodes its payload as JSON.
    ///
    /// The offset is stored before decoding: a message counts as consumed once it
    /// has been read, whether it decodes or what happens to it downstream.
    pub async fn json_recv<T>(&self) -> Result<T, RecvErr>
    where
        T: DeserializeOwned,
    {
        let message = self.inner.consumer.recv().await?;
        self.inner.consumer.store_offset_from_message(&message)?;

        let Some(payload) = message.payload() else {
            return Err(RecvErr::Empty);
        };

        Ok(serde_json::from_slice(payload)?)
    }

    /// Lazy, unbounded stream of decode results. Nothing is read until the
    /// stream is polled, and it never ends on its own.
    pub fn json_stream<T>(&self) -> impl Stream<Item = Result<T, RecvErr>> + Send + 'static
    where
        T: DeserializeOwned + Send + 'static,
    {
        futures::stream::unfold(self.clone(), |consumer| async move {
            let next = consumer.json_recv::<T>().await;
            Some((next, consumer))
        })
    }
}
