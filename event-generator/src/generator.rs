use std::time::Duration;

use chrono::{DateTime, Utc};
use enrichment_pipeline::event::{Event, EventType};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};

pub const CURRENCIES: [&str; 5] = ["EUR", "USD", "GBP", "NZD", "BTC"];

const PLAYER_IDS: std::ops::Range<i64> = 10..20;
const GAME_IDS: std::ops::Range<i64> = 100..110;

// Exclusive upper bounds, in minor units
const MAX_BTC_AMOUNT: i64 = 100_000;
const MAX_AMOUNT: i64 = 2_000;

const WIN_PROBABILITY: f64 = 0.05;

/// Produces plausible raw casino events, the way the upstream game servers would.
pub struct EventGenerator<R> {
    rng: R,
    next_id: i64,
}

impl EventGenerator<StdRng> {
    pub fn from_entropy() -> Self {
        Self::new(StdRng::from_entropy())
    }
}

impl<R: Rng> EventGenerator<R> {
    pub fn new(rng: R) -> Self {
        Self { rng, next_id: 1 }
    }

    pub fn next_event(&mut self, now: DateTime<Utc>) -> Event {
        let id = self.next_id;
        self.next_id += 1;

        let event_type = match self.rng.gen_range(0..4) {
            0 => EventType::GameStart,
            1 => EventType::Bet,
            2 => EventType::Deposit,
            _ => EventType::GameStop,
        };

        let game_id = match event_type {
            EventType::Deposit => None,
            _ => Some(self.rng.gen_range(GAME_IDS)),
        };

        let (amount, currency) = match event_type {
            EventType::Bet | EventType::Deposit => {
                let currency = CURRENCIES.choose(&mut self.rng).copied().unwrap_or("EUR");
                let limit = if currency == "BTC" {
                    MAX_BTC_AMOUNT
                } else {
                    MAX_AMOUNT
                };
                (
                    Some(self.rng.gen_range(1..limit)),
                    Some(currency.to_string()),
                )
            }
            _ => (None, None),
        };

        let has_won =
            event_type == EventType::GameStop && self.rng.gen_bool(WIN_PROBABILITY);

        Event {
            id,
            player_id: self.rng.gen_range(PLAYER_IDS),
            game_id,
            event_type,
            amount,
            currency,
            has_won,
            created_at: now,
            amount_eur: None,
            player: None,
            description: None,
        }
    }

    /// A pause in `0..max`, zero when `max` is.
    pub fn delay(&mut self, max: Duration) -> Duration {
        let max_ms = u64::try_from(max.as_millis()).unwrap_or(u64::MAX);
        if max_ms == 0 {
            return Duration::ZERO;
        }
        Duration::from_millis(self.rng.gen_range(0..max_ms))
    }
}
