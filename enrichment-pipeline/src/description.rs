use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Datelike, Utc};

use crate::catalog::GameCatalog;
use crate::currency::TARGET_CURRENCY;
use crate::error::EnrichmentError;
use crate::event::{Event, EventType};
use crate::stage::Enrichment;

/// Builds the human-readable narrative of an event, for example
/// `Player #10 (rick@example.com) bet 500 USD on a game "Wild Spin" on March 1st, 2022 at 08:15 UTC`.
///
/// Expects the currency and player stages to have run already.
pub struct DescriptionProcessor {
    catalog: Arc<GameCatalog>,
}

impl DescriptionProcessor {
    pub fn new(catalog: Arc<GameCatalog>) -> Self {
        Self { catalog }
    }

    pub fn process(&self, event: &Event) -> Result<String, EnrichmentError> {
        let mut description = format!("Player #{}", event.player_id);
        if let Some(player) = event.player.as_ref().filter(|p| !p.email.is_empty()) {
            description.push_str(&format!(" ({})", player.email));
        }

        match &event.event_type {
            EventType::GameStart => {
                let title = self.game_title(event)?;
                description.push_str(&format!(" started a game \"{title}\""));
            }
            EventType::Bet => {
                let title = self.game_title(event)?;
                let (amount, currency) = money(event)?;
                description.push_str(&format!(" bet {amount} {currency} on a game \"{title}\""));
            }
            EventType::Deposit => {
                let (amount, currency) = money(event)?;
                description.push_str(&format!(" made a deposit of {amount} {currency}"));
                if currency != TARGET_CURRENCY {
                    let amount_eur = event
                        .amount_eur
                        .ok_or(EnrichmentError::MissingField("amount_eur"))?;
                    description.push_str(&format!(" ({amount_eur} {TARGET_CURRENCY})"));
                }
            }
            EventType::GameStop => {
                let title = self.game_title(event)?;
                let outcome = if event.has_won { "won" } else { "lost" };
                description.push_str(&format!(" has {outcome} a game \"{title}\""));
            }
            EventType::Other(other) => {
                return Err(EnrichmentError::InvalidEventType(other.clone()));
            }
        }

        description.push_str(&format!(" on {}", format_time(&event.created_at)));
        Ok(description)
    }

    fn game_title(&self, event: &Event) -> Result<&str, EnrichmentError> {
        let game_id = event
            .game_id
            .ok_or(EnrichmentError::MissingField("game_id"))?;
        self.catalog
            .title(game_id)
            .ok_or(EnrichmentError::GameNotFound(game_id))
    }
}

fn money(event: &Event) -> Result<(i64, &str), EnrichmentError> {
    let amount = event.amount.ok_or(EnrichmentError::MissingField("amount"))?;
    let currency = event
        .currency
        .as_deref()
        .ok_or(EnrichmentError::MissingField("currency"))?;
    Ok((amount, currency))
}

pub fn ordinal_suffix(day: u32) -> &'static str {
    match day {
        1 | 21 | 31 => "st",
        2 | 22 => "nd",
        3 | 23 => "rd",
        _ => "th",
    }
}

/// `March 1st, 2022 at 08:15 UTC`
pub fn format_time(at: &DateTime<Utc>) -> String {
    format!(
        "{} {}{}, {} at {} UTC",
        at.format("%B"),
        at.day(),
        ordinal_suffix(at.day()),
        at.year(),
        at.format("%H:%M"),
    )
}

/// Sets `description` on every event.
pub struct DescriptionEnrichment {
    processor: Arc<DescriptionProcessor>,
}

impl DescriptionEnrichment {
    pub fn new(processor: Arc<DescriptionProcessor>) -> Self {
        Self { processor }
    }
}

#[async_trait]
impl Enrichment for DescriptionEnrichment {
    fn name(&self) -> &'static str {
        "description"
    }

    async fn enrich(&self, mut event: Event) -> Result<Event, EnrichmentError> {
        event.description = Some(self.processor.process(&event)?);
        Ok(event)
    }
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;

    use super::*;
    use crate::test_utils::{sample_event, sample_player};

    fn processor() -> DescriptionProcessor {
        DescriptionProcessor::new(Arc::new(GameCatalog::default()))
    }

    #[test]
    fn ordinals() {
        let expected = [
            (1, "st"),
            (2, "nd"),
            (3, "rd"),
            (4, "th"),
            (11, "th"),
            (12, "th"),
            (13, "th"),
            (21, "st"),
            (22, "nd"),
            (23, "rd"),
            (30, "th"),
            (31, "st"),
        ];
        for (day, suffix) in expected {
            assert_eq!(ordinal_suffix(day), suffix, "day {day}");
        }
    }

    #[test]
    fn formats_times_in_utc() {
        let at = Utc.with_ymd_and_hms(2021, 2, 22, 7, 5, 59).unwrap();
        assert_eq!(format_time(&at), "February 22nd, 2021 at 07:05 UTC");
    }

    #[test]
    fn game_start_with_email() {
        let mut event = sample_event(1, EventType::GameStart);
        event.game_id = Some(103);
        event.player = Some(sample_player(10));

        assert_eq!(
            processor().process(&event).unwrap(),
            "Player #10 (player10@example.com) started a game \"Book of Dead\" on March 1st, 2022 at 08:15 UTC"
        );
    }

    #[test]
    fn empty_email_is_left_out() {
        let mut event = sample_event(1, EventType::GameStart);
        let mut player = sample_player(10);
        player.email = String::new();
        event.player = Some(player);

        assert!(processor()
            .process(&event)
            .unwrap()
            .starts_with("Player #10 started a game \"Rocket Dice\""));
    }

    #[test]
    fn bet_uses_the_raw_amount() {
        let mut event = sample_event(2, EventType::Bet);
        event.game_id = Some(107);
        event.amount = Some(500);
        event.currency = Some("USD".to_string());
        event.amount_eur = Some(4);

        assert_eq!(
            processor().process(&event).unwrap(),
            "Player #10 bet 500 USD on a game \"#BarsAndBells\" on March 1st, 2022 at 08:15 UTC"
        );
    }

    #[test]
    fn deposits_mention_eur_for_foreign_currencies() {
        let mut event = sample_event(3, EventType::Deposit);
        event.game_id = None;
        event.amount = Some(2000);
        event.currency = Some("GBP".to_string());
        event.amount_eur = Some(23);

        assert_eq!(
            processor().process(&event).unwrap(),
            "Player #10 made a deposit of 2000 GBP (23 EUR) on March 1st, 2022 at 08:15 UTC"
        );

        event.currency = Some("EUR".to_string());
        assert_eq!(
            processor().process(&event).unwrap(),
            "Player #10 made a deposit of 2000 EUR on March 1st, 2022 at 08:15 UTC"
        );
    }

    #[test]
    fn game_stop_outcomes() {
        let mut event = sample_event(4, EventType::GameStop);
        event.game_id = Some(109);
        assert!(processor()
            .process(&event)
            .unwrap()
            .starts_with("Player #10 has lost a game \"ChilliPop\""));

        event.has_won = true;
        assert!(processor()
            .process(&event)
            .unwrap()
            .starts_with("Player #10 has won a game \"ChilliPop\""));
    }

    #[test]
    fn rejects_unknown_types() {
        let event = sample_event(5, EventType::Other("jackpot".to_string()));
        assert!(matches!(
            processor().process(&event),
            Err(EnrichmentError::InvalidEventType(t)) if t == "jackpot"
        ));
    }

    #[test]
    fn rejects_unknown_games() {
        let mut event = sample_event(6, EventType::GameStop);
        event.game_id = Some(999);
        assert!(matches!(
            processor().process(&event),
            Err(EnrichmentError::GameNotFound(999))
        ));
    }

    #[test]
    fn missing_inputs_are_validation_errors() {
        let mut bet = sample_event(7, EventType::Bet);
        bet.currency = Some("EUR".to_string());
        let err = processor().process(&bet).unwrap_err();
        assert!(matches!(err, EnrichmentError::MissingField("amount")));
        assert!(err.is_validation());

        let mut deposit = sample_event(8, EventType::Deposit);
        deposit.amount = Some(100);
        deposit.currency = Some("BTC".to_string());
        assert!(matches!(
            processor().process(&deposit),
            Err(EnrichmentError::MissingField("amount_eur"))
        ));

        let mut start = sample_event(9, EventType::GameStart);
        start.game_id = None;
        assert!(matches!(
            processor().process(&start),
            Err(EnrichmentError::MissingField("game_id"))
        ));
    }

    #[tokio::test]
    async fn enrichment_sets_the_description() {
        let stage = DescriptionEnrichment::new(Arc::new(processor()));
        let event = stage
            .enrich(sample_event(10, EventType::GameStart))
            .await
            .unwrap();
        assert_eq!(
            event.description.as_deref(),
            Some("Player #10 started a game \"Rocket Dice\" on March 1st, 2022 at 08:15 UTC")
        );
    }
}
