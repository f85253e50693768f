use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;

mod client;
mod mock;

pub use client::RedisClient;
pub use mock::{MockRedisCall, MockRedisClient, MockRedisValue};

#[derive(Error, Debug, Clone)]
pub enum CustomRedisError {
    #[error("Not found in redis")]
    NotFound,
    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),
    #[error("Timeout error")]
    Timeout,
    #[error(transparent)]
    Redis(#[from] Arc<redis::RedisError>),
}

impl From<redis::RedisError> for CustomRedisError {
    fn from(err: redis::RedisError) -> Self {
        if err.is_timeout() {
            CustomRedisError::Timeout
        } else {
            CustomRedisError::Redis(Arc::new(err))
        }
    }
}

/// The handful of commands the pipeline needs. Values are plain UTF-8 strings.
#[async_trait]
pub trait Client {
    /// Returns [`CustomRedisError::NotFound`] when the key is absent or expired.
    async fn get(&self, k: String) -> Result<String, CustomRedisError>;

    /// `SET k v EX ttl_seconds`
    async fn set_with_ttl(
        &self,
        k: String,
        v: String,
        ttl_seconds: u64,
    ) -> Result<(), CustomRedisError>;

    async fn ping(&self) -> Result<(), CustomRedisError>;
}
