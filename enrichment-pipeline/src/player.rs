use std::sync::Arc;

use async_trait::async_trait;
use sqlx::PgPool;

use crate::error::{EnrichmentError, ExternalCallError};
use crate::event::{Event, Player};
use crate::stage::Enrichment;

/// Read-only primary-key lookup of players.
#[async_trait]
pub trait PlayerDirectory: Send + Sync {
    /// `Ok(None)` when no such player exists.
    async fn find(&self, player_id: i64) -> Result<Option<Player>, ExternalCallError>;
}

pub struct PgPlayerDirectory {
    pool: PgPool,
}

impl PgPlayerDirectory {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl PlayerDirectory for PgPlayerDirectory {
    async fn find(&self, player_id: i64) -> Result<Option<Player>, ExternalCallError> {
        let player = sqlx::query_as::<_, Player>(
            "SELECT id, email, last_signed_in_at FROM players WHERE id = $1",
        )
        .bind(player_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(player)
    }
}

pub struct PlayerService {
    directory: Arc<dyn PlayerDirectory>,
}

impl PlayerService {
    pub fn new(directory: Arc<dyn PlayerDirectory>) -> Self {
        Self { directory }
    }

    pub async fn get_player_details(&self, player_id: i64) -> Result<Player, EnrichmentError> {
        self.directory
            .find(player_id)
            .await?
            .ok_or(EnrichmentError::NotFound(player_id))
    }
}

/// Attaches the player record to the event.
pub struct PlayerEnrichment {
    service: Arc<PlayerService>,
}

impl PlayerEnrichment {
    pub fn new(service: Arc<PlayerService>) -> Self {
        Self { service }
    }
}

#[async_trait]
impl Enrichment for PlayerEnrichment {
    fn name(&self) -> &'static str {
        "player"
    }

    async fn enrich(&self, mut event: Event) -> Result<Event, EnrichmentError> {
        let player = self.service.get_player_details(event.player_id).await?;
        event.player = Some(player);
        Ok(event)
    }
}
