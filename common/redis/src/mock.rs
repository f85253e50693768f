use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;

use crate::{Client, CustomRedisError};

/// In-memory stand-in for [`crate::RedisClient`].
///
/// Values written with `set_with_ttl` are readable with `get` (TTLs are recorded
/// but never expire). Errors can be forced per key, and every call is recorded.
#[derive(Clone, Default)]
pub struct MockRedisClient {
    store: Arc<Mutex<HashMap<String, String>>>,
    get_err: HashMap<String, CustomRedisError>,
    set_err: HashMap<String, CustomRedisError>,
    ping_err: Option<CustomRedisError>,
    calls: Arc<Mutex<Vec<MockRedisCall>>>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum MockRedisValue {
    None,
    StringWithTTL(String, u64),
}

#[derive(Debug, Clone, PartialEq)]
pub struct MockRedisCall {
    pub op: String,
    pub key: String,
    pub value: MockRedisValue,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    match mutex.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}

impl MockRedisClient {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_value(self, key: &str, value: &str) -> Self {
        lock(&self.store).insert(key.to_owned(), value.to_owned());
        self
    }

    pub fn get_err(mut self, key: &str, err: CustomRedisError) -> Self {
        self.get_err.insert(key.to_owned(), err);
        self
    }

    pub fn set_err(mut self, key: &str, err: CustomRedisError) -> Self {
        self.set_err.insert(key.to_owned(), err);
        self
    }

    pub fn ping_err(mut self, err: CustomRedisError) -> Self {
        self.ping_err = Some(err);
        self
    }

    pub fn get_calls(&self) -> Vec<MockRedisCall> {
        lock(&self.calls).clone()
    }

    pub fn stored(&self, key: &str) -> Option<String> {
        lock(&self.store).get(key).cloned()
    }

    fn record(&self, op: &str, key: &str, value: MockRedisValue) {
        lock(&self.calls).push(MockRedisCall {
            op: op.to_string(),
            key: key.to_string(),
            value,
        });
    }
}

#[async_trait]
impl Client for MockRedisClient {
    async fn get(&self, k: String) -> Result<String, CustomRedisError> {
        self.record("get", &k, MockRedisValue::None);
        if let Some(err) = self.get_err.get(&k) {
            return Err(err.clone());
        }
        self.stored(&k).ok_or(CustomRedisError::NotFound)
    }

    async fn set_with_ttl(
        &self,
        k: String,
        v: String,
        ttl_seconds: u64,
    ) -> Result<(), CustomRedisError> {
        self.record(
            "set_with_ttl",
            &k,
            MockRedisValue::StringWithTTL(v.clone(), ttl_seconds),
        );
        if let Some(err) = self.set_err.get(&k) {
            return Err(err.clone());
        }
        lock(&self.store).insert(k, v);
        Ok(())
    }

    async fn ping(&self) -> Result<(), CustomRedisError> {
        self.record("ping", "", MockRedisValue::None);
        match &self.ping_err {
            Some(err) => Err(err.clone()),
            None => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn values_written_are_read_back() {
        let client = MockRedisClient::new();
        assert!(matches!(
            client.get("USD-EUR".to_string()).await,
            Err(CustomRedisError::NotFound)
        ));

        client
            .set_with_ttl("USD-EUR".to_string(), "0.9".to_string(), 60)
            .await
            .expect("set should succeed");
        assert_eq!(client.get("USD-EUR".to_string()).await.unwrap(), "0.9");

        assert_eq!(
            client.get_calls()[1],
            MockRedisCall {
                op: "set_with_ttl".to_string(),
                key: "USD-EUR".to_string(),
                value: MockRedisValue::StringWithTTL("0.9".to_string(), 60),
            }
        );
    }

    #[tokio::test]
    async fn forced_errors_win_over_stored_values() {
        let client = MockRedisClient::new()
            .with_value("GBP-EUR", "1.1")
            .get_err("GBP-EUR", CustomRedisError::Timeout)
            .set_err("BTC-EUR", CustomRedisError::Timeout);

        assert!(matches!(
            client.get("GBP-EUR".to_string()).await,
            Err(CustomRedisError::Timeout)
        ));
        assert!(client
            .set_with_ttl("BTC-EUR".to_string(), "50000".to_string(), 60)
            .await
            .is_err());
        assert_eq!(client.stored("BTC-EUR"), None);
        assert!(client.ping().await.is_ok());
    }
}
