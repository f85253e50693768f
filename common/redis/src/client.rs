use std::time::Duration;

use async_trait::async_trait;
use redis::aio::MultiplexedConnection;
use redis::AsyncCommands;
use tracing::debug;

use crate::{Client, CustomRedisError};

pub struct RedisClient {
    connection: MultiplexedConnection,
}

impl RedisClient {
    /// Connects with a response timeout applied to every command.
    /// `None` means commands may block indefinitely.
    pub async fn new(
        addr: String,
        response_timeout: Option<Duration>,
    ) -> Result<RedisClient, CustomRedisError> {
        let client = redis::Client::open(addr)?;

        let mut config = redis::AsyncConnectionConfig::new();
        if let Some(timeout) = response_timeout {
            if timeout.is_zero() {
                return Err(CustomRedisError::InvalidConfiguration(
                    "Redis response timeout cannot be zero - use None for no timeout".to_string(),
                ));
            }
            config = config.set_response_timeout(timeout);
        }

        let connection = client
            .get_multiplexed_async_connection_with_config(&config)
            .await?;
        debug!("connected to redis");

        Ok(RedisClient { connection })
    }
}

#[async_trait]
impl Client for RedisClient {
    async fn get(&self, k: String) -> Result<String, CustomRedisError> {
        let mut conn = self.connection.clone();
        let value: Option<String> = conn.get(k).await?;
        value.ok_or(CustomRedisError::NotFound)
    }

    async fn set_with_ttl(
        &self,
        k: String,
        v: String,
        ttl_seconds: u64,
    ) -> Result<(), CustomRedisError> {
        let mut conn = self.connection.clone();
        conn.set_ex::<_, _, ()>(k, v, ttl_seconds).await?;
        Ok(())
    }

    async fn ping(&self) -> Result<(), CustomRedisError> {
        let mut conn = self.connection.clone();
        redis::cmd("PING").query_async::<String>(&mut conn).await?;
        Ok(())
    }
}
