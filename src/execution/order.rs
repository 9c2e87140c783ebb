//! Order intents handed to the execution layer

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Order side (buy or sell)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OrderSide {
    Buy,
    Sell,
}

impl std::fmt::Display for OrderSide {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Buy => write!(f, "BUY"),
            Self::Sell => write!(f, "SELL"),
        }
    }
}

/// Order type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OrderType {
    Market,
    Limit,
}

/// What the strategy wants submitted. Not tracked after it is returned.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderIntent {
    /// Client-side id, useful for correlating logs with fills
    pub id: Uuid,

    pub symbol: String,

    pub side: OrderSide,

    #[serde(rename = "type")]
    pub order_type: OrderType,

    /// Quantity in shares
    pub quantity: u64,

    /// Limit price (limit orders only)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub limit_price: Option<f64>,

    /// Bar time at which the intent was produced
    pub created_at: DateTime<Utc>,
}

impl OrderIntent {
    /// Create a limit buy
    pub fn limit_buy(symbol: &str, quantity: u64, limit_price: f64, at: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::new_v4(),
            symbol: symbol.to_string(),
            side: OrderSide::Buy,
            order_type: OrderType::Limit,
            quantity,
            limit_price: Some(limit_price),
            created_at: at,
        }
    }

    /// Create a market sell
    pub fn market_sell(symbol: &str, quantity: u64, at: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::new_v4(),
            symbol: symbol.to_string(),
            side: OrderSide::Sell,
            order_type: OrderType::Market,
            quantity,
            limit_price: None,
            created_at: at,
        }
    }
}
