use common_kafka::kafka_producer::KafkaProduceError;
use thiserror::Error;

/// Why a stage could not enrich an event. Any of these drops the event.
#[derive(Error, Debug)]
pub enum EnrichmentError {
    #[error("invalid event type: {0}")]
    InvalidEventType(String),
    #[error("game {0} not found")]
    GameNotFound(i64),
    #[error("event is missing required field {0}")]
    MissingField(&'static str),
    #[error("player {0} not found")]
    NotFound(i64),
    #[error(transparent)]
    ExternalCall(#[from] ExternalCallError),
}

impl EnrichmentError {
    /// Label for the dropped-events counter.
    pub fn reason(&self) -> &'static str {
        match self {
            EnrichmentError::InvalidEventType(_) => "invalid_event_type",
            EnrichmentError::GameNotFound(_) => "game_not_found",
            EnrichmentError::MissingField(_) => "missing_field",
            EnrichmentError::NotFound(_) => "not_found",
            EnrichmentError::ExternalCall(_) => "external_call",
        }
    }

    /// Errors caused by the event content rather than by a dependency.
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            EnrichmentError::InvalidEventType(_)
                | EnrichmentError::GameNotFound(_)
                | EnrichmentError::MissingField(_)
        )
    }
}

/// Failures talking to the FX API, the player database or ksqlDB.
#[derive(Error, Debug)]
pub enum ExternalCallError {
    #[error("exchange rate request failed: {0}")]
    ExchangeTransport(#[from] reqwest::Error),
    #[error("exchange rate API reported an unsuccessful lookup for {from}-{to}")]
    ExchangeUnsuccessful { from: String, to: String },
    #[error("exchange rate API response has no rate for {0}")]
    RateMissing(String),
    #[error("invalid exchange rate API url: {0}")]
    InvalidUrl(String),
    #[error("player lookup failed: {0}")]
    Database(#[from] sqlx::Error),
    #[error("statistics query failed: {0}")]
    Statistics(String),
}

#[derive(Error, Debug)]
pub enum PublishError {
    #[error(transparent)]
    Kafka(#[from] KafkaProduceError),
    #[error("output channel closed")]
    Closed,
    #[error("failed to encode event: {0}")]
    Encode(#[from] serde_json::Error),
}

/// Errors that stop the service before any stage runs.
#[derive(Error, Debug)]
pub enum StartupError {
    #[error("failed to connect to postgres: {0}")]
    Database(#[from] sqlx::Error),
    #[error("failed to connect to redis: {0}")]
    Redis(#[from] common_redis::CustomRedisError),
    #[error("failed to set up kafka: {0}")]
    Kafka(#[from] rdkafka::error::KafkaError),
    #[error("failed to build http client: {0}")]
    HttpClient(#[from] reqwest::Error),
    #[error("invalid configuration: {0}")]
    Config(String),
}

