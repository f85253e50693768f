use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing, Json, Router,
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::error;

use crate::app_context::AppContext;
use crate::currency::{CurrencyConverter, TARGET_CURRENCY};
use crate::description::DescriptionProcessor;
use crate::error::EnrichmentError;
use crate::event::{Event, Player};
use crate::player::PlayerService;
use crate::sink::{Statistics, StatisticsSource};

/// Mounts the probes and the synchronous wrappers around the services this
/// process was configured with.
pub fn add_routes(router: Router, context: Arc<AppContext>) -> Router {
    let liveness = context.liveness.clone();
    let mut router = router
        .route("/", routing::get(index))
        .route("/_readiness", routing::get(index))
        .route(
            "/_liveness",
            routing::get(move || std::future::ready(liveness.get_status())),
        )
        .route("/_status", routing::get(status).with_state(context.clone()));

    if let Some(converter) = &context.converter {
        router = router.route(
            "/event/currency",
            routing::post(convert).with_state(converter.clone()),
        );
    }
    if let Some(processor) = &context.descriptions {
        router = router.route(
            "/event/description",
            routing::post(describe).with_state(processor.clone()),
        );
    }
    if let Some(players) = &context.players {
        router = router.route(
            "/event/player/:id",
            routing::get(player).with_state(players.clone()),
        );
    }
    if let Some(statistics) = &context.statistics {
        router = router.route(
            "/materialize",
            routing::post(materialize).with_state(statistics.clone()),
        );
    }

    router
}

pub async fn index() -> &'static str {
    "casino enrichment pipeline"
}

pub struct ApiError(EnrichmentError);

impl From<EnrichmentError> for ApiError {
    fn from(value: EnrichmentError) -> Self {
        ApiError(value)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self.0 {
            e if e.is_validation() => StatusCode::BAD_REQUEST,
            EnrichmentError::NotFound(_) => StatusCode::NOT_FOUND,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };
        if status.is_server_error() {
            error!(error = %self.0, "request failed");
        }
        (status, Json(json!({ "error": self.0.to_string() }))).into_response()
    }
}

fn default_target() -> String {
    TARGET_CURRENCY.to_string()
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ConvertRequest {
    pub from: String,
    #[serde(default = "default_target")]
    pub to: String,
    pub amount: i64,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ConvertResponse {
    pub amount: i64,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct DescriptionResponse {
    pub description: String,
}

async fn convert(
    State(converter): State<Arc<CurrencyConverter>>,
    Json(request): Json<ConvertRequest>,
) -> Result<Json<ConvertResponse>, ApiError> {
    let amount = converter
        .convert(&request.from, &request.to, request.amount)
        .await?;
    Ok(Json(ConvertResponse { amount }))
}

async fn describe(
    State(processor): State<Arc<DescriptionProcessor>>,
    Json(event): Json<Event>,
) -> Result<Json<DescriptionResponse>, ApiError> {
    let description = processor.process(&event)?;
    Ok(Json(DescriptionResponse { description }))
}

async fn player(
    State(players): State<Arc<PlayerService>>,
    Path(id): Path<i64>,
) -> Result<Json<Player>, ApiError> {
    Ok(Json(players.get_player_details(id).await?))
}

async fn materialize(
    State(statistics): State<Arc<dyn StatisticsSource>>,
) -> Result<Json<Statistics>, ApiError> {
    let statistics = statistics
        .get_statistics()
        .await
        .map_err(EnrichmentError::from)?;
    Ok(Json(statistics))
}

/// Reachability of the external dependencies, for humans. Always 200.
async fn status(State(context): State<Arc<AppContext>>) -> Json<serde_json::Value> {
    let exchange_api = match &context.converter {
        Some(converter) => Some(converter.source().ping().await),
        None => None,
    };
    let rate_cache = match &context.converter {
        Some(converter) => Some(converter.cache().ping().await),
        None => None,
    };

    Json(json!({
        "exchange_api": exchange_api,
        "rate_cache": rate_cache,
        "player_lookups": context.players.is_some(),
        "statistics": context.statistics.is_some(),
    }))
}
