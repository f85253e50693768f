use common_kafka::config::KafkaConfig;
use enrichment_pipeline::config::EnvMsDuration;
use envconfig::Envconfig;

#[derive(Envconfig, Clone)]
pub struct Config {
    #[envconfig(default = "casino-event")]
    pub ingest_topic: String,

    // Upper bound of the random pause between two events
    #[envconfig(from = "GENERATOR_MAX_DELAY_MS", default = "100")]
    pub max_delay: EnvMsDuration,

    // Stop after this many events, run until signalled when unset
    #[envconfig(from = "GENERATOR_EVENT_COUNT")]
    pub event_count: Option<u64>,

    #[envconfig(default = "5000")]
    pub shutdown_timeout_ms: EnvMsDuration,

    #[envconfig(nested = true)]
    pub kafka: KafkaConfig,
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::time::Duration;

    use super::*;

    #[test]
    fn defaults() {
        let config = Config::init_from_hashmap(&HashMap::new()).unwrap();

        assert_eq!(config.ingest_topic, "casino-event");
        assert_eq!(config.max_delay.0, Duration::from_millis(100));
        assert_eq!(config.event_count, None);
        assert_eq!(config.kafka.kafka_hosts, "localhost:9092");
    }

    #[test]
    fn overrides() {
        let env = HashMap::from([
            ("INGEST_TOPIC".to_string(), "events-under-test".to_string()),
            ("GENERATOR_MAX_DELAY_MS".to_string(), "0".to_string()),
            ("GENERATOR_EVENT_COUNT".to_string(), "25".to_string()),
        ]);
        let config = Config::init_from_hashmap(&env).unwrap();

        assert_eq!(config.ingest_topic, "events-under-test");
        assert!(config.max_delay.0.is_zero());
        assert_eq!(config.event_count, Some(25));
    }
}
