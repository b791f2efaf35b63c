//! Open position as reported by the position tracker.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Direction of a position.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PositionSide {
    Long,
    Short,
}

impl PositionSide {
    pub fn as_str(&self) -> &'static str {
        match self {
            PositionSide::Long => "long",
            PositionSide::Short => "short",
        }
    }

    /// Signed distance from `entry` to `price` in the profitable direction.
    pub fn profit_distance(&self, entry: Decimal, price: Decimal) -> Decimal {
        match self {
            PositionSide::Long => price - entry,
            PositionSide::Short => entry - price,
        }
    }

    /// Move `price` by `distance` toward profit for this side.
    pub fn toward_profit(&self, price: Decimal, distance: Decimal) -> Decimal {
        match self {
            PositionSide::Long => price + distance,
            PositionSide::Short => price - distance,
        }
    }

    /// Move `price` by `distance` toward loss for this side.
    pub fn toward_loss(&self, price: Decimal, distance: Decimal) -> Decimal {
        match self {
            PositionSide::Long => price - distance,
            PositionSide::Short => price + distance,
        }
    }

    /// True if `stop` sits at or beyond `level` on the profitable side.
    pub fn stop_reached(&self, stop: Decimal, level: Decimal) -> bool {
        match self {
            PositionSide::Long => stop >= level,
            PositionSide::Short => stop <= level,
        }
    }
}

/// Current position in a perpetual contract. Read-only to the guardrail.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PositionInfo {
    pub symbol: String,

    pub side: PositionSide,

    pub entry_price: Decimal,

    pub mark_price: Decimal,

    pub quantity: Decimal,

    #[serde(default)]
    pub leverage: u32,

    #[serde(default)]
    pub unrealized_pnl: Decimal,

    /// Highest unrealized return seen so far, in percent
    #[serde(default)]
    pub peak_pnl_pct: Decimal,

    /// Current stop-loss price; zero means no stop is set
    #[serde(default)]
    pub stop_loss: Decimal,

    #[serde(default)]
    pub take_profit: Decimal,
}

impl PositionInfo {
    /// Notional value at the current mark price.
    pub fn notional(&self) -> Decimal {
        self.quantity.abs() * self.mark_price
    }

    /// Check if a stop-loss order protects this position.
    pub fn has_stop_loss(&self) -> bool {
        self.stop_loss > Decimal::ZERO
    }
}
