//! Market data lookup used when the caller did not inject a snapshot.

use std::collections::HashMap;

use anyhow::{anyhow, Result};

use crate::models::MarketSnapshot;

/// Source of live market snapshots.
///
/// Production callers should inject snapshots through the validation
/// context so validation stays deterministic; this seam exists for callers
/// that cannot.
pub trait MarketDataSource: Send + Sync {
    fn snapshot(&self, symbol: &str) -> Result<MarketSnapshot>;
}

/// In-memory source backed by a symbol map.
#[derive(Debug, Clone, Default)]
pub struct StaticMarketData {
    snapshots: HashMap<String, MarketSnapshot>,
}

impl StaticMarketData {
    pub fn new(snapshots: impl IntoIterator<Item = MarketSnapshot>) -> Self {
        Self {
            snapshots: snapshots
                .into_iter()
                .map(|s| (s.symbol.clone(), s))
                .collect(),
        }
    }
}

impl MarketDataSource for StaticMarketData {
    fn snapshot(&self, symbol: &str) -> Result<MarketSnapshot> {
        self.snapshots
            .get(symbol)
            .cloned()
            .ok_or_else(|| anyhow!("no market data for {symbol}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_static_lookup() {
        let source = StaticMarketData::new([MarketSnapshot::new("BTCUSDT", dec!(100000))]);
        assert_eq!(source.snapshot("BTCUSDT").unwrap().current_price, dec!(100000));
        assert!(source.snapshot("ETHUSDT").is_err());
    }
}
