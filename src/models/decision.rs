//! Decision model: one structured trading instruction emitted by the AI.

use std::fmt;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Closed set of actions the AI may request.
///
/// Unknown action strings fail deserialization instead of falling through
/// to a default.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Action {
    OpenLong,
    OpenShort,
    CloseLong,
    CloseShort,
    UpdateStopLoss,
    UpdateTakeProfit,
    PartialClose,
    Hold,
    Wait,
}

impl Action {
    pub fn as_str(&self) -> &'static str {
        match self {
            Action::OpenLong => "open_long",
            Action::OpenShort => "open_short",
            Action::CloseLong => "close_long",
            Action::CloseShort => "close_short",
            Action::UpdateStopLoss => "update_stop_loss",
            Action::UpdateTakeProfit => "update_take_profit",
            Action::PartialClose => "partial_close",
            Action::Hold => "hold",
            Action::Wait => "wait",
        }
    }

    /// True for actions that open a new position.
    pub fn is_open(&self) -> bool {
        matches!(self, Action::OpenLong | Action::OpenShort)
    }

    /// Hold and wait are the only actions that may omit a symbol.
    pub fn requires_symbol(&self) -> bool {
        !matches!(self, Action::Hold | Action::Wait)
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single AI trading decision.
///
/// Fields that an action does not use are ignored. Zero means "not supplied"
/// for every numeric field except `risk_usd`, which is optional.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Decision {
    #[serde(default)]
    pub symbol: String,

    pub action: Action,

    // === Open parameters ===
    #[serde(default)]
    pub leverage: i32,

    /// Legacy single-notional field, back-filled into `suggested_position_size_usd`
    #[serde(default)]
    pub position_size_usd: Decimal,

    /// Canonical AI-suggested notional in USD
    #[serde(default)]
    pub suggested_position_size_usd: Decimal,

    #[serde(default)]
    pub stop_loss: Decimal,

    #[serde(default)]
    pub take_profit: Decimal,

    /// Limit price; zero means market order
    #[serde(default)]
    pub entry_price: Decimal,

    // === Adjustment parameters ===
    #[serde(default)]
    pub new_stop_loss: Decimal,

    #[serde(default)]
    pub new_take_profit: Decimal,

    /// Percentage of the position to close (1-100)
    #[serde(default)]
    pub close_percentage: Decimal,

    // === Common ===
    /// Confidence 0-100
    #[serde(default)]
    pub confidence: u32,

    /// Maximum USD the AI is willing to lose on this trade
    #[serde(default)]
    pub risk_usd: Option<Decimal>,

    #[serde(default)]
    pub reasoning: String,
}

impl Decision {
    /// Build a decision with only symbol, action and reasoning set.
    pub fn new(symbol: impl Into<String>, action: Action, reasoning: impl Into<String>) -> Self {
        Self {
            symbol: symbol.into(),
            action,
            leverage: 0,
            position_size_usd: Decimal::ZERO,
            suggested_position_size_usd: Decimal::ZERO,
            stop_loss: Decimal::ZERO,
            take_profit: Decimal::ZERO,
            entry_price: Decimal::ZERO,
            new_stop_loss: Decimal::ZERO,
            new_take_profit: Decimal::ZERO,
            close_percentage: Decimal::ZERO,
            confidence: 0,
            risk_usd: None,
            reasoning: reasoning.into(),
        }
    }

    /// Safe do-nothing decision for every symbol.
    pub fn wait_all(reasoning: impl Into<String>) -> Self {
        Self::new("ALL", Action::Wait, reasoning)
    }

    /// The notional the AI asked for, preferring the canonical field.
    pub fn suggested_notional(&self) -> Decimal {
        if self.suggested_position_size_usd > Decimal::ZERO {
            self.suggested_position_size_usd
        } else {
            self.position_size_usd
        }
    }

    /// Copy the legacy notional onto the canonical field when only the
    /// legacy one was supplied. Returns true if the field was filled.
    pub fn backfill_suggested_notional(&mut self) -> bool {
        if self.suggested_position_size_usd <= Decimal::ZERO
            && self.position_size_usd > Decimal::ZERO
        {
            self.suggested_position_size_usd = self.position_size_usd;
            return true;
        }
        false
    }

    /// Explicit risk budget, if the AI supplied a positive one.
    pub fn risk_budget(&self) -> Option<Decimal> {
        self.risk_usd.filter(|r| *r > Decimal::ZERO)
    }
}
