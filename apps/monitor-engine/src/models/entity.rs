//! Monitored entities: orders and positions.
//!
//! Entities are created by the management API and arrive here either over
//! the broker queues or from the bootstrap `ListOpen` calls. The engine
//! never owns their authoritative status; it only reads the payload and
//! asks the API to transition it.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Instrument category of an entity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    /// Options/futures contract, fully handled.
    Option,
    /// Spot market, currently a stub.
    Spot,
}

/// Trade direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Side {
    /// Long entry.
    Buy,
    /// Short entry.
    Sell,
}

impl Side {
    /// Lowercase wire representation.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Buy => "buy",
            Self::Sell => "sell",
        }
    }
}

/// Which family of entity a queue, key, or notification refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntityKind {
    /// A pending order.
    Order,
    /// An open position.
    Position,
}

impl EntityKind {
    /// Lowercase name used in key-value keys, API paths and notifications.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Order => "order",
            Self::Position => "position",
        }
    }

    /// Key-value key for an entity's tracked state, e.g. `position:42`.
    #[must_use]
    pub fn state_key(&self, id: i64) -> String {
        format!("{}:{id}", self.as_str())
    }

    /// Key-value key for an extremum record, e.g.
    /// `extremum:position:<uuid>:MAX`.
    #[must_use]
    pub fn extremum_key(&self, uuid: &str, suffix: &str) -> String {
        format!("extremum:{}:{uuid}:{suffix}", self.as_str())
    }
}

impl std::fmt::Display for EntityKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An order or position as delivered by the broker or the management API.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Entity {
    /// Stable numeric id assigned by the management API.
    pub id: i64,
    /// Globally unique correlation key.
    pub uuid: String,
    /// Traded symbol.
    #[serde(rename = "symbol_name", default = "default_symbol")]
    pub symbol: String,
    /// Authoritative status as last seen. The engine only ever tests for
    /// the terminal values; everything else is opaque.
    pub status: String,
    /// Instrument category.
    pub category: Category,
    /// Trade direction.
    pub side: Side,
    /// Quantity in tokens, decimal string.
    #[serde(rename = "qty_tokens")]
    pub qty: String,
    /// Entry/target price.
    pub price: Decimal,
    /// Test-mode flag, present on positions only.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_test: Option<bool>,
    /// Creation timestamp at the management API.
    pub created_at: DateTime<Utc>,
}

fn default_symbol() -> String {
    "BTCUSDT".to_string()
}

impl Entity {
    /// Whether the entity's last known status is terminal.
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        matches!(self.status.as_str(), "completed" | "cancel")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn entity_decodes_wire_shape() {
        let raw = r#"{
            "id": 17,
            "uuid": "a1b2c3",
            "symbol_name": "BTCUSDT",
            "status": "open",
            "category": "option",
            "side": "buy",
            "qty_tokens": "0.5",
            "price": "61250.5",
            "is_test": false,
            "created_at": "2025-11-21T05:19:13.852Z"
        }"#;

        let entity: Entity = serde_json::from_str(raw).unwrap();
        assert_eq!(entity.id, 17);
        assert_eq!(entity.symbol, "BTCUSDT");
        assert_eq!(entity.category, Category::Option);
        assert_eq!(entity.side, Side::Buy);
        assert_eq!(entity.price, Decimal::new(612_505, 1));
        assert!(!entity.is_terminal());
    }

    #[test]
    fn entity_without_symbol_uses_default() {
        let raw = r#"{
            "id": 1,
            "uuid": "u",
            "status": "completed",
            "category": "spot",
            "side": "sell",
            "qty_tokens": "1",
            "price": "10",
            "created_at": "2025-01-01T00:00:00Z"
        }"#;

        let entity: Entity = serde_json::from_str(raw).unwrap();
        assert_eq!(entity.symbol, "BTCUSDT");
        assert!(entity.is_terminal());
    }

    #[test]
    fn unknown_category_fails_decode() {
        let raw = r#"{
            "id": 1,
            "uuid": "u",
            "status": "open",
            "category": "margin",
            "side": "buy",
            "qty_tokens": "1",
            "price": "10",
            "created_at": "2025-01-01T00:00:00Z"
        }"#;

        assert!(serde_json::from_str::<Entity>(raw).is_err());
    }

    #[test]
    fn state_and_extremum_keys() {
        assert_eq!(EntityKind::Position.state_key(42), "position:42");
        assert_eq!(
            EntityKind::Order.extremum_key("abc", "MIN"),
            "extremum:order:abc:MIN"
        );
    }
}
