use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Kind of casino activity an event records.
///
/// Anything outside the four known kinds still decodes, as `Other`, and is
/// written back verbatim. Rejecting it is left to the description stage.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum EventType {
    GameStart,
    Bet,
    Deposit,
    GameStop,
    Other(String),
}

impl EventType {
    pub fn as_str(&self) -> &str {
        match self {
            EventType::GameStart => "game_start",
            EventType::Bet => "bet",
            EventType::Deposit => "deposit",
            EventType::GameStop => "game_stop",
            EventType::Other(other) => other,
        }
    }

    pub fn is_known(&self) -> bool {
        !matches!(self, EventType::Other(_))
    }
}

impl From<String> for EventType {
    fn from(value: String) -> Self {
        match value.as_str() {
            "game_start" => EventType::GameStart,
            "bet" => EventType::Bet,
            "deposit" => EventType::Deposit,
            "game_stop" => EventType::GameStop,
            _ => EventType::Other(value),
        }
    }
}

impl From<EventType> for String {
    fn from(value: EventType) -> Self {
        match value {
            EventType::Other(other) => other,
            known => known.as_str().to_owned(),
        }
    }
}

impl fmt::Display for EventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
pub struct Player {
    pub id: i64,
    pub email: String,
    pub last_signed_in_at: DateTime<Utc>,
}

/// A casino event. Each stage adds one field and never removes any.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    pub id: i64,
    pub player_id: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub game_id: Option<i64>,
    #[serde(rename = "type")]
    pub event_type: EventType,
    /// Minor units of `currency` (cents, satoshis)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub amount: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub currency: Option<String>,
    #[serde(default, skip_serializing_if = "is_false")]
    pub has_won: bool,
    /// Any offset is accepted on decode, the value is held in UTC.
    pub created_at: DateTime<Utc>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub amount_eur: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub player: Option<Player>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

fn is_false(value: &bool) -> bool {
    !*value
}

#[cfg(test)]
mod tests {
    use assert_json_diff::assert_json_eq;
    use chrono::TimeZone;
    use serde_json::json;

    use super::*;

    #[test]
    fn decodes_a_raw_bet() {
        let event: Event = serde_json::from_value(json!({
            "id": 1,
            "player_id": 10,
            "game_id": 101,
            "type": "bet",
            "amount": 500,
            "currency": "USD",
            "created_at": "2022-03-01T10:15:00+02:00",
        }))
        .expect("valid event");

        assert_eq!(event.event_type, EventType::Bet);
        assert_eq!(event.amount, Some(500));
        assert!(!event.has_won);
        assert_eq!(event.player, None);
        assert_eq!(
            event.created_at,
            Utc.with_ymd_and_hms(2022, 3, 1, 8, 15, 0).unwrap()
        );
    }

    #[test]
    fn unset_fields_are_omitted() {
        let event = Event {
            id: 3,
            player_id: 11,
            game_id: Some(100),
            event_type: EventType::GameStart,
            amount: None,
            currency: None,
            has_won: false,
            created_at: Utc.with_ymd_and_hms(2022, 1, 2, 3, 4, 5).unwrap(),
            amount_eur: None,
            player: None,
            description: None,
        };

        assert_json_eq!(
            serde_json::to_value(&event).unwrap(),
            json!({
                "id": 3,
                "player_id": 11,
                "game_id": 100,
                "type": "game_start",
                "created_at": "2022-01-02T03:04:05Z",
            })
        );
    }

    #[test]
    fn unknown_types_survive_a_round_trip() {
        let raw = json!({
            "id": 4,
            "player_id": 12,
            "type": "jackpot",
            "has_won": true,
            "created_at": "2022-01-02T03:04:05Z",
        });
        let event: Event = serde_json::from_value(raw.clone()).expect("unknown types decode");

        assert_eq!(event.event_type, EventType::Other("jackpot".to_string()));
        assert!(!event.event_type.is_known());
        assert_json_eq!(serde_json::to_value(&event).unwrap(), raw);
    }

    #[test]
    fn player_id_is_required() {
        let result = serde_json::from_value::<Event>(json!({
            "id": 4,
            "type": "bet",
            "created_at": "2022-01-02T03:04:05Z",
        }));
        assert!(result.is_err());
    }
}
