use std::sync::Arc;

use async_trait::async_trait;
use tracing::debug;

use crate::error::EnrichmentError;
use crate::event::Event;
use crate::stage::Enrichment;

pub mod cache;
pub mod exchange;

pub use cache::RateCache;
pub use exchange::{ExchangeRateClient, RateSource};

/// Currency every event amount is converted into.
pub const TARGET_CURRENCY: &str = "EUR";

/// Converts an amount in minor units into major units of `currency`.
/// Unknown codes are assumed to have no minor unit.
pub fn normalize(amount: i64, currency: &str) -> f64 {
    let divisor = match currency.to_uppercase().as_str() {
        "EUR" | "USD" | "GBP" | "NZD" => 100.0,
        "BTC" => 100_000_000.0,
        _ => 1.0,
    };
    amount as f64 / divisor
}

/// Cache-aside currency conversion.
pub struct CurrencyConverter {
    cache: RateCache,
    source: Arc<dyn RateSource>,
}

impl CurrencyConverter {
    pub fn new(cache: RateCache, source: Arc<dyn RateSource>) -> Self {
        Self { cache, source }
    }

    /// Converts `amount` (minor units of `from`) into `to`.
    ///
    /// When both codes are equal the amount is returned untouched, still in
    /// minor units. Otherwise the result is the normalized amount times the
    /// rate, truncated toward zero.
    pub async fn convert(&self, from: &str, to: &str, amount: i64) -> Result<i64, EnrichmentError> {
        if from == to {
            return Ok(amount);
        }

        let rate = match self.cache.get(from, to).await {
            Some(rate) => rate,
            None => {
                let rate = self.source.rate(from, to).await?;
                self.cache.put(from, to, rate).await;
                rate
            }
        };

        let converted = (normalize(amount, from) * rate).trunc() as i64;
        debug!(from, to, amount, rate, converted, "converted amount");
        Ok(converted)
    }

    pub fn source(&self) -> &Arc<dyn RateSource> {
        &self.source
    }

    pub fn cache(&self) -> &RateCache {
        &self.cache
    }
}

/// Sets `amount_eur` on events that carry money. Others pass through as they are.
pub struct CurrencyEnrichment {
    converter: Arc<CurrencyConverter>,
}

impl CurrencyEnrichment {
    pub fn new(converter: Arc<CurrencyConverter>) -> Self {
        Self { converter }
    }
}

#[async_trait]
impl Enrichment for CurrencyEnrichment {
    fn name(&self) -> &'static str {
        "currency"
    }

    async fn enrich(&self, mut event: Event) -> Result<Event, EnrichmentError> {
        let (Some(currency), Some(amount)) = (event.currency.as_deref(), event.amount) else {
            return Ok(event);
        };

        let converted = self
            .converter
            .convert(currency, TARGET_CURRENCY, amount)
            .await?;
        event.amount_eur = Some(converted);
        Ok(event)
    }
}

#[cfg(test)]
mod tests {
    use common_redis::{CustomRedisError, MockRedisCall, MockRedisClient, MockRedisValue};

    use super::*;
    use crate::error::ExternalCallError;
    use crate::event::EventType;
    use crate::test_utils::{sample_event, StaticRateSource};

    fn converter(redis: &MockRedisClient, source: &StaticRateSource) -> CurrencyConverter {
        CurrencyConverter::new(
            RateCache::new(Arc::new(redis.clone())),
            Arc::new(source.clone()),
        )
    }

    #[test]
    fn normalizes_known_currencies() {
        assert_eq!(normalize(12_345, "EUR"), 123.45);
        assert_eq!(normalize(12_345, "usd"), 123.45);
        assert_eq!(normalize(250, "Gbp"), 2.5);
        assert_eq!(normalize(250, "NZD"), 2.5);
        assert_eq!(normalize(150_000_000, "BTC"), 1.5);
        assert_eq!(normalize(42, "DOGE"), 42.0);
    }

    #[tokio::test]
    async fn same_currency_skips_cache_and_source() {
        let redis = MockRedisClient::new();
        let source = StaticRateSource::new().with_rate("EUR", "EUR", 2.0);

        let amount = converter(&redis, &source)
            .convert("EUR", "EUR", 1234)
            .await
            .unwrap();

        assert_eq!(amount, 1234);
        assert!(redis.get_calls().is_empty());
        assert_eq!(source.calls(), 0);
    }

    #[tokio::test]
    async fn cache_miss_fetches_and_stores_the_rate() {
        let redis = MockRedisClient::new();
        let source = StaticRateSource::new().with_rate("USD", "EUR", 0.9);
        let converter = converter(&redis, &source);

        assert_eq!(converter.convert("USD", "EUR", 1000).await.unwrap(), 9);
        assert_eq!(source.calls(), 1);
        assert!(redis.get_calls().contains(&MockRedisCall {
            op: "set_with_ttl".to_string(),
            key: "USD-EUR".to_string(),
            value: MockRedisValue::StringWithTTL("0.9".to_string(), 60),
        }));

        // Served from the cache the second time
        assert_eq!(converter.convert("USD", "EUR", 1000).await.unwrap(), 9);
        assert_eq!(source.calls(), 1);
    }

    #[tokio::test]
    async fn cache_hit_does_not_call_the_source() {
        let redis = MockRedisClient::new().with_value("BTC-EUR", "40000");
        let source = StaticRateSource::new();

        let amount = converter(&redis, &source)
            .convert("BTC", "EUR", 150_000_000)
            .await
            .unwrap();

        // 1.5 BTC at 40000
        assert_eq!(amount, 60_000);
        assert_eq!(source.calls(), 0);
    }

    #[tokio::test]
    async fn conversion_truncates() {
        let redis = MockRedisClient::new().with_value("GBP-EUR", "1.19");
        let source = StaticRateSource::new();

        let amount = converter(&redis, &source)
            .convert("GBP", "EUR", 999)
            .await
            .unwrap();

        // 9.99 * 1.19 = 11.8881
        assert_eq!(amount, 11);
    }

    #[tokio::test]
    async fn cache_failures_do_not_fail_the_conversion() {
        let redis = MockRedisClient::new()
            .get_err("NZD-EUR", CustomRedisError::Timeout)
            .set_err("NZD-EUR", CustomRedisError::Timeout);
        let source = StaticRateSource::new().with_rate("NZD", "EUR", 0.5);

        let amount = converter(&redis, &source)
            .convert("NZD", "EUR", 10_000)
            .await
            .unwrap();

        assert_eq!(amount, 50);
        assert_eq!(source.calls(), 1);
    }

    #[tokio::test]
    async fn source_failures_propagate() {
        let redis = MockRedisClient::new();
        let source = StaticRateSource::new();

        let err = converter(&redis, &source)
            .convert("XYZ", "EUR", 100)
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            EnrichmentError::ExternalCall(ExternalCallError::RateMissing(_))
        ));
        assert_eq!(redis.stored("XYZ-EUR"), None);
    }

    #[tokio::test]
    async fn enrichment_sets_amount_eur() {
        let redis = MockRedisClient::new();
        let source = StaticRateSource::new().with_rate("USD", "EUR", 0.5);
        let stage = CurrencyEnrichment::new(Arc::new(converter(&redis, &source)));

        let mut bet = sample_event(1, EventType::Bet);
        bet.amount = Some(800);
        bet.currency = Some("USD".to_string());

        let enriched = stage.enrich(bet.clone()).await.unwrap();
        assert_eq!(enriched.amount_eur, Some(4));
        assert_eq!(
            Event {
                amount_eur: None,
                ..enriched
            },
            bet
        );
    }

    #[tokio::test]
    async fn enrichment_passes_through_events_without_money() {
        let redis = MockRedisClient::new();
        let source = StaticRateSource::new();
        let stage = CurrencyEnrichment::new(Arc::new(converter(&redis, &source)));

        let start = sample_event(2, EventType::GameStart);
        assert_eq!(stage.enrich(start.clone()).await.unwrap(), start);
        assert!(redis.get_calls().is_empty());
    }
}
