use std::str::FromStr;

use envconfig::Envconfig;

#[derive(Envconfig, Clone)]
pub struct KafkaConfig {
    #[envconfig(default = "20")]
    pub kafka_producer_linger_ms: u32, // Maximum time between producer batches during low traffic

    #[envconfig(default = "400")]
    pub kafka_producer_queue_mib: u32, // Size of the in-memory producer queue in mebibytes

    #[envconfig(default = "10000000")]
    pub kafka_producer_queue_messages: u32, // Maximum number of messages in the in-memory producer queue

    #[envconfig(default = "20000")]
    pub kafka_message_timeout_ms: u32, // Time before we stop retrying producing a message: 20 seconds

    #[envconfig(default = "none")]
    pub kafka_compression_codec: String, // none, gzip, snappy, lz4, zstd

    #[envconfig(default = "fire_and_forget")]
    pub kafka_producer_ack_policy: AckPolicy, // fire_and_forget, wait

    #[envconfig(default = "false")]
    pub kafka_tls: bool,

    #[envconfig(default = "localhost:9092")]
    pub kafka_hosts: String,
}

#[derive(Envconfig, Clone)]
pub struct ConsumerConfig {
    // Each stage consumes with its own group, suffixed with the stage name
    #[envconfig(default = "casino-pipeline")]
    pub kafka_consumer_group: String,

    #[envconfig(default = "earliest")]
    pub kafka_consumer_offset_reset: String, // earliest, latest

    #[envconfig(default = "5000")]
    pub kafka_consumer_auto_commit_interval_ms: u32,
}

impl ConsumerConfig {
    pub fn group_for(&self, component: &str) -> String {
        format!("{}-{}", self.kafka_consumer_group, component)
    }
}

/// Whether a publish waits for the broker acknowledgement before returning.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AckPolicy {
    /// Return as soon as the record is queued, delivery failures are only logged.
    #[default]
    FireAndForget,
    /// Await the delivery report and surface its error to the caller.
    Wait,
}

#[derive(Debug, PartialEq, Eq)]
pub struct ParseAckPolicyError(String);

impl std::fmt::Display for ParseAckPolicyError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "unknown ack policy: {}, must be fire_and_forget or wait",
            self.0
        )
    }
}

impl FromStr for AckPolicy {
    type Err = ParseAckPolicyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_ref() {
            "fire_and_forget" | "async" => Ok(AckPolicy::FireAndForget),
            "wait" | "sync" => Ok(AckPolicy::Wait),
            _ => Err(ParseAckPolicyError(s.to_owned())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_ack_policies() {
        assert_eq!("wait".parse(), Ok(AckPolicy::Wait));
        assert_eq!(" SYNC ".parse(), Ok(AckPolicy::Wait));
        assert_eq!("fire_and_forget".parse(), Ok(AckPolicy::FireAndForget));
        assert_eq!("async".parse(), Ok(AckPolicy::FireAndForget));
        assert!("eventually".parse::<AckPolicy>().is_err());
    }

    #[test]
    fn consumer_groups_are_per_component() {
        let config = ConsumerConfig {
            kafka_consumer_group: "casino-pipeline".to_string(),
            kafka_consumer_offset_reset: "earliest".to_string(),
            kafka_consumer_auto_commit_interval_ms: 5000,
        };
        assert_eq!(config.group_for("currency"), "casino-pipeline-currency");
    }
}
