use std::sync::Arc;

use common_redis::{Client, CustomRedisError};
use tracing::{debug, warn};

use crate::metrics_consts::{RATE_CACHE_ERRORS, RATE_CACHE_HITS, RATE_CACHE_MISSES};

/// Lifetime of a cached exchange rate.
pub const RATE_TTL_SECONDS: u64 = 60;

pub fn rate_key(from: &str, to: &str) -> String {
    format!("{from}-{to}")
}

/// Cache-aside store of exchange rates in redis. It never fails a conversion:
/// read errors count as misses and write errors are only logged.
#[derive(Clone)]
pub struct RateCache {
    client: Arc<dyn Client + Send + Sync>,
}

impl RateCache {
    pub fn new(client: Arc<dyn Client + Send + Sync>) -> Self {
        Self { client }
    }

    pub async fn get(&self, from: &str, to: &str) -> Option<f64> {
        let key = rate_key(from, to);
        match self.client.get(key.clone()).await {
            Ok(raw) => match raw.parse::<f64>() {
                Ok(rate) => {
                    metrics::counter!(RATE_CACHE_HITS).increment(1);
                    Some(rate)
                }
                Err(e) => {
                    warn!(key, error = %e, "ignoring unparseable cached rate");
                    metrics::counter!(RATE_CACHE_ERRORS, "op" => "parse").increment(1);
                    None
                }
            },
            Err(CustomRedisError::NotFound) => {
                debug!(key, "rate cache miss");
                metrics::counter!(RATE_CACHE_MISSES).increment(1);
                None
            }
            Err(e) => {
                warn!(key, error = %e, "rate cache read failed, treating as a miss");
                metrics::counter!(RATE_CACHE_ERRORS, "op" => "get").increment(1);
                None
            }
        }
    }

    pub async fn put(&self, from: &str, to: &str, rate: f64) {
        let key = rate_key(from, to);
        if let Err(e) = self
            .client
            .set_with_ttl(key.clone(), rate.to_string(), RATE_TTL_SECONDS)
            .await
        {
            warn!(key, error = %e, "failed to cache exchange rate");
            metrics::counter!(RATE_CACHE_ERRORS, "op" => "set").increment(1);
        }
    }

    pub async fn ping(&self) -> bool {
        self.client.ping().await.is_ok()
    }
}
