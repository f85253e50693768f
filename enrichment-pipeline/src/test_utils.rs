//! In-memory doubles for the external services, shared by unit and integration tests.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{TimeZone, Utc};
use common_kafka::kafka_consumer::RecvErr;
use futures::stream::BoxStream;
use futures::StreamExt;
use tokio::sync::mpsc;

use crate::currency::RateSource;
use crate::error::{ExternalCallError, PublishError};
use crate::event::{Event, EventType, Player};
use crate::player::PlayerDirectory;
use crate::sink::{Statistics, StatisticsSource};
use crate::stage::Publisher;

/// Player 10 playing game 100 on March 1st 2022, 08:15 UTC. Nothing enriched yet.
pub fn sample_event(id: i64, event_type: EventType) -> Event {
    Event {
        id,
        player_id: 10,
        game_id: Some(100),
        event_type,
        amount: None,
        currency: None,
        has_won: false,
        created_at: Utc.with_ymd_and_hms(2022, 3, 1, 8, 15, 0).unwrap(),
        amount_eur: None,
        player: None,
        description: None,
    }
}

pub fn sample_player(id: i64) -> Player {
    Player {
        id,
        email: format!("player{id}@example.com"),
        last_signed_in_at: Utc.with_ymd_and_hms(2022, 2, 28, 20, 0, 0).unwrap(),
    }
}

/// Fixed rates, counting how often it is asked. Unknown pairs fail like a
/// response without the target rate.
#[derive(Clone, Default)]
pub struct StaticRateSource {
    rates: HashMap<(String, String), f64>,
    calls: Arc<AtomicUsize>,
}

impl StaticRateSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_rate(mut self, from: &str, to: &str, rate: f64) -> Self {
        self.rates.insert((from.to_owned(), to.to_owned()), rate);
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl RateSource for StaticRateSource {
    async fn rate(&self, from: &str, to: &str) -> Result<f64, ExternalCallError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.rates
            .get(&(from.to_owned(), to.to_owned()))
            .copied()
            .ok_or_else(|| ExternalCallError::RateMissing(to.to_owned()))
    }

    async fn ping(&self) -> bool {
        true
    }
}

pub struct InMemoryPlayerDirectory {
    players: Option<HashMap<i64, Player>>,
}

impl InMemoryPlayerDirectory {
    pub fn new(players: impl IntoIterator<Item = Player>) -> Self {
        Self {
            players: Some(players.into_iter().map(|p| (p.id, p)).collect()),
        }
    }

    /// Every lookup fails as if the database were unreachable.
    pub fn failing() -> Self {
        Self { players: None }
    }
}

#[async_trait]
impl PlayerDirectory for InMemoryPlayerDirectory {
    async fn find(&self, player_id: i64) -> Result<Option<Player>, ExternalCallError> {
        match &self.players {
            Some(players) => Ok(players.get(&player_id).cloned()),
            None => Err(ExternalCallError::Database(sqlx::Error::PoolTimedOut)),
        }
    }
}

pub struct FixedStatistics(pub Statistics);

#[async_trait]
impl StatisticsSource for FixedStatistics {
    async fn get_statistics(&self) -> Result<Statistics, ExternalCallError> {
        Ok(self.0.clone())
    }
}

pub struct FailingPublisher;

#[async_trait]
impl Publisher for FailingPublisher {
    fn destination(&self) -> &str {
        "nowhere"
    }

    async fn publish(&self, _event: &Event) -> Result<(), PublishError> {
        Err(PublishError::Closed)
    }
}

/// Publishing half of [`json_channel`]. Events are JSON encoded on the way in,
/// like a producer writing to a topic.
#[derive(Clone)]
pub struct ChannelPublisher {
    name: String,
    sender: mpsc::Sender<String>,
}

impl ChannelPublisher {
    /// Sends a payload as is, to feed malformed messages to a stage.
    pub async fn send_raw(&self, payload: &str) -> Result<(), PublishError> {
        self.sender
            .send(payload.to_owned())
            .await
            .map_err(|_| PublishError::Closed)
    }
}

#[async_trait]
impl Publisher for ChannelPublisher {
    fn destination(&self) -> &str {
        &self.name
    }

    async fn publish(&self, event: &Event) -> Result<(), PublishError> {
        let payload = serde_json::to_string(event)?;
        self.send_raw(&payload).await
    }
}

/// An in-memory topic: a publisher and a decoding source with the same error
/// surface as a kafka consumer stream. The source ends once every publisher is dropped.
pub fn json_channel(
    capacity: usize,
) -> (
    ChannelPublisher,
    BoxStream<'static, Result<Event, RecvErr>>,
) {
    let (sender, receiver) = mpsc::channel(capacity);
    let publisher = ChannelPublisher {
        name: "in-memory".to_string(),
        sender,
    };

    let source = futures::stream::unfold(receiver, |mut receiver| async move {
        let payload = receiver.recv().await?;
        let decoded = if payload.is_empty() {
            Err(RecvErr::Empty)
        } else {
            serde_json::from_str(&payload).map_err(RecvErr::from)
        };
        Some((decoded, receiver))
    })
    .boxed();

    (publisher, source)
}
