//! Read-only market snapshot and symbol classification.

use std::collections::BTreeMap;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Coarse grouping used to pick notional and leverage caps.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SymbolClass {
    /// Large-cap pairs such as BTC and ETH
    Major,
    Altcoin,
}

impl SymbolClass {
    /// Classify `symbol` against the configured list of majors (case-insensitive).
    pub fn classify(symbol: &str, majors: &[String]) -> Self {
        if majors.iter().any(|m| m.eq_ignore_ascii_case(symbol.trim())) {
            SymbolClass::Major
        } else {
            SymbolClass::Altcoin
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            SymbolClass::Major => "major",
            SymbolClass::Altcoin => "altcoin",
        }
    }
}

/// Latest price and volatility for one symbol, produced by the market-data subsystem.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MarketSnapshot {
    pub symbol: String,

    pub current_price: Decimal,

    /// ATR keyed by timeframe (e.g. "15m", "1h", "4h")
    #[serde(default)]
    pub atr_by_timeframe: BTreeMap<String, Decimal>,
}

impl MarketSnapshot {
    pub fn new(symbol: impl Into<String>, current_price: Decimal) -> Self {
        Self {
            symbol: symbol.into(),
            current_price,
            atr_by_timeframe: BTreeMap::new(),
        }
    }

    /// Builder-style ATR insert, mostly for fixtures.
    pub fn with_atr(mut self, timeframe: impl Into<String>, atr: Decimal) -> Self {
        self.atr_by_timeframe.insert(timeframe.into(), atr);
        self
    }

    /// Positive ATR for `timeframe`, if known.
    pub fn atr(&self, timeframe: &str) -> Option<Decimal> {
        self.atr_by_timeframe
            .get(timeframe)
            .copied()
            .filter(|atr| *atr > Decimal::ZERO)
    }

    /// Check the snapshot carries a usable price.
    pub fn has_price(&self) -> bool {
        self.current_price > Decimal::ZERO
    }
}
