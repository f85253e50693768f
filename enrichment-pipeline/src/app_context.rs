use std::sync::Arc;

use common_redis::RedisClient;
use health::HealthRegistry;
use sqlx::postgres::PgPoolOptions;
use tracing::info;

use crate::catalog::GameCatalog;
use crate::config::{Config, StageKind};
use crate::currency::{
    CurrencyConverter, CurrencyEnrichment, ExchangeRateClient, RateCache, RateSource,
};
use crate::description::{DescriptionEnrichment, DescriptionProcessor};
use crate::error::StartupError;
use crate::player::{PgPlayerDirectory, PlayerEnrichment, PlayerService};
use crate::sink::{KsqlClient, LogSink, StatisticsSource};
use crate::stage::{Enrichment, Passthrough};

/// Services shared by the stages and the HTTP API.
///
/// Only what the configured stages need is built, so a process running the
/// description stage alone never connects to redis or postgres.
pub struct AppContext {
    pub liveness: HealthRegistry,
    pub converter: Option<Arc<CurrencyConverter>>,
    pub players: Option<Arc<PlayerService>>,
    pub descriptions: Option<Arc<DescriptionProcessor>>,
    pub statistics: Option<Arc<dyn StatisticsSource>>,
}

impl AppContext {
    pub async fn new(config: &Config) -> Result<Self, StartupError> {
        let stages = &config.pipeline_stages;

        let converter = if stages.contains(StageKind::Currency) {
            let redis = RedisClient::new(
                config.redis_url.clone(),
                Some(config.redis_timeout_ms.0),
            )
            .await?;
            let source: Arc<dyn RateSource> = Arc::new(
                ExchangeRateClient::new(
                    &config.exchange_api_url,
                    &config.exchange_api_key,
                    config.exchange_request_timeout_ms.0,
                )
                .map_err(|e| StartupError::Config(e.to_string()))?,
            );
            info!("currency conversion enabled");
            Some(Arc::new(CurrencyConverter::new(
                RateCache::new(Arc::new(redis)),
                source,
            )))
        } else {
            None
        };

        let players = if stages.contains(StageKind::Player) {
            let pool = PgPoolOptions::new()
                .max_connections(config.max_pg_connections)
                .connect(&config.database_url)
                .await?;
            info!("player lookups enabled");
            Some(Arc::new(PlayerService::new(Arc::new(
                PgPlayerDirectory::new(pool),
            ))))
        } else {
            None
        };

        let descriptions = stages
            .contains(StageKind::Description)
            .then(|| Arc::new(DescriptionProcessor::new(Arc::new(GameCatalog::default()))));

        let statistics: Option<Arc<dyn StatisticsSource>> = if stages.contains(StageKind::Log) {
            let client = KsqlClient::new(
                &config.ksql_url,
                config.ksql_credentials(),
                config.exchange_request_timeout_ms.0,
            )
            .map_err(|e| StartupError::Config(e.to_string()))?;
            Some(Arc::new(client))
        } else {
            None
        };

        Ok(Self {
            liveness: HealthRegistry::new("liveness"),
            converter,
            players,
            descriptions,
            statistics,
        })
    }

    /// The transform a stage runs, built from the services above.
    pub fn enrichment(&self, stage: StageKind) -> Result<Arc<dyn Enrichment>, StartupError> {
        let missing = || StartupError::Config(format!("no backing service for stage {stage}"));

        let enrichment: Arc<dyn Enrichment> = match stage {
            StageKind::Ingest => Arc::new(Passthrough),
            StageKind::Currency => Arc::new(CurrencyEnrichment::new(
                self.converter.clone().ok_or_else(missing)?,
            )),
            StageKind::Player => Arc::new(PlayerEnrichment::new(
                self.players.clone().ok_or_else(missing)?,
            )),
            StageKind::Description => Arc::new(DescriptionEnrichment::new(
                self.descriptions.clone().ok_or_else(missing)?,
            )),
            StageKind::Log => Arc::new(LogSink),
        };
        Ok(enrichment)
    }
}
