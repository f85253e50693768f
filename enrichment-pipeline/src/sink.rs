use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::{debug, info};

use crate::error::{EnrichmentError, ExternalCallError};
use crate::event::Event;
use crate::metrics_consts::{EVENTS_LOGGED, STATISTICS_QUERIES};
use crate::stage::Enrichment;

/// Terminal stage transform: every fully enriched event is recorded here.
pub struct LogSink;

#[async_trait]
impl Enrichment for LogSink {
    fn name(&self) -> &'static str {
        "log"
    }

    async fn enrich(&self, event: Event) -> Result<Event, EnrichmentError> {
        info!(
            event_id = event.id,
            player_id = event.player_id,
            event_type = %event.event_type,
            amount_eur = event.amount_eur,
            description = event.description.as_deref(),
            "event logged"
        );
        metrics::counter!(EVENTS_LOGGED, "type" => event.event_type.to_string()).increment(1);
        Ok(event)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TopPlayer {
    pub id: i64,
    pub count: i64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Statistics {
    pub events_total: i64,
    pub events_per_minute: f64,
    pub events_per_second_moving_average: f64,
    pub top_player_bets: TopPlayer,
    pub top_player_wins: TopPlayer,
    pub top_player_deposits: TopPlayer,
}

#[async_trait]
pub trait StatisticsSource: Send + Sync {
    async fn get_statistics(&self) -> Result<Statistics, ExternalCallError>;
}

/// Pull query over the table materialized from the log topic. Column order matters,
/// see [`statistics_from_columns`].
pub const STATISTICS_QUERY: &str = "SELECT events_total, events_per_minute, \
events_per_second_moving_average, top_player_bets_id, top_player_bets_count, \
top_player_wins_id, top_player_wins_count, top_player_deposits_id, \
top_player_deposits_count FROM casino_statistics WHERE id = 'global';";

/// Client for the ksqlDB REST `/query` endpoint.
pub struct KsqlClient {
    client: reqwest::Client,
    query_url: String,
    credentials: Option<(String, String)>,
}

#[derive(Deserialize)]
struct QueryItem {
    #[serde(default)]
    row: Option<QueryRow>,
}

#[derive(Deserialize)]
struct QueryRow {
    columns: Vec<Value>,
}

type StatisticsColumns = (i64, f64, f64, i64, i64, i64, i64, i64, i64);

impl KsqlClient {
    pub fn new(
        base_url: &str,
        credentials: Option<(String, String)>,
        timeout: Duration,
    ) -> Result<Self, ExternalCallError> {
        let client = reqwest::Client::builder()
            .user_agent("casino-enrichment-pipeline")
            .timeout(timeout)
            .build()?;

        Ok(Self {
            client,
            query_url: format!("{}/query", base_url.trim_end_matches('/')),
            credentials,
        })
    }
}

#[async_trait]
impl StatisticsSource for KsqlClient {
    async fn get_statistics(&self) -> Result<Statistics, ExternalCallError> {
        metrics::counter!(STATISTICS_QUERIES).increment(1);

        let mut request = self
            .client
            .post(&self.query_url)
            .header("Accept", "application/vnd.ksql.v1+json")
            .json(&json!({
                "ksql": STATISTICS_QUERY,
                "streamsProperties": {},
            }));
        if let Some((username, password)) = &self.credentials {
            request = request.basic_auth(username, Some(password));
        }

        let response = request
            .send()
            .await
            .map_err(|e| ExternalCallError::Statistics(e.to_string()))?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ExternalCallError::Statistics(format!(
                "ksqlDB returned {status}: {body}"
            )));
        }

        let items: Vec<QueryItem> = response
            .json()
            .await
            .map_err(|e| ExternalCallError::Statistics(e.to_string()))?;

        match items.into_iter().find_map(|item| item.row) {
            Some(row) => statistics_from_columns(row.columns),
            None => {
                debug!("statistics query returned no rows");
                Ok(Statistics::default())
            }
        }
    }
}

/// Maps a result row onto [`Statistics`], in the order of [`STATISTICS_QUERY`].
pub fn statistics_from_columns(columns: Vec<Value>) -> Result<Statistics, ExternalCallError> {
    let (total, per_minute, per_second, bets_id, bets, wins_id, wins, deposits_id, deposits): StatisticsColumns =
        serde_json::from_value(Value::Array(columns))
            .map_err(|e| ExternalCallError::Statistics(format!("malformed statistics row: {e}")))?;

    Ok(Statistics {
        events_total: total,
        events_per_minute: per_minute,
        events_per_second_moving_average: per_second,
        top_player_bets: TopPlayer {
            id: bets_id,
            count: bets,
        },
        top_player_wins: TopPlayer {
            id: wins_id,
            count: wins,
        },
        top_player_deposits: TopPlayer {
            id: deposits_id,
            count: deposits,
        },
    })
}
