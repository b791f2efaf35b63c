//! Position sizing: risk budget and stop distance to a capped notional and quantity.
//!
//! The AI's suggested size is only ever honored when it is smaller than the
//! computed ceiling.

use rust_decimal::Decimal;
use serde::Serialize;
use tracing::{debug, info};

use crate::config::{LeverageLimits, RiskConfig};
use crate::error::SizingError;
use crate::models::{Action, Decision, PositionSide, SymbolClass};

/// Which constraint produced the final notional.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SizeLimit {
    /// Risk budget divided by stop distance
    RiskBudget,
    /// Symbol-class notional ceiling
    ClassCap,
    /// Available margin times leverage
    Margin,
    /// The AI asked for less
    Suggestion,
}

/// Order size ready for the execution layer.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SizedOrder {
    pub symbol: String,
    pub side: PositionSide,
    pub notional: Decimal,
    pub quantity: Decimal,
    /// Entry price if given, otherwise the market price
    pub price: Decimal,
    pub leverage: u32,
    /// Stop distance as a fraction of price
    pub stop_pct: Decimal,
    /// Risk budget applied in USD
    pub risk_usd: Decimal,
    pub limited_by: SizeLimit,
}

impl SizedOrder {
    /// Margin the order posts at its leverage.
    pub fn required_margin(&self) -> Decimal {
        if self.leverage == 0 {
            return self.notional;
        }
        self.notional / Decimal::from(self.leverage)
    }
}

/// Computes safe order sizes for validated open decisions.
#[derive(Debug, Clone)]
pub struct PositionSizer {
    config: RiskConfig,
    leverage: LeverageLimits,
}

impl PositionSizer {
    pub fn new(config: RiskConfig, leverage: LeverageLimits) -> Self {
        Self { config, leverage }
    }

    /// Size an open decision against the available balance.
    ///
    /// Derivation order: stop distance, risk budget, notional by risk, class
    /// cap, margin cap, smaller AI suggestion, exchange minimum, quantity.
    pub fn size(
        &self,
        d: &Decision,
        available_balance: Decimal,
        market_price: Decimal,
    ) -> Result<SizedOrder, SizingError> {
        let side = match d.action {
            Action::OpenLong => PositionSide::Long,
            Action::OpenShort => PositionSide::Short,
            other => {
                return Err(SizingError::NotAnOpen {
                    action: other.to_string(),
                })
            }
        };

        if available_balance <= Decimal::ZERO {
            return Err(SizingError::InsufficientBalance {
                available: available_balance,
            });
        }

        let price = if d.entry_price > Decimal::ZERO {
            d.entry_price
        } else {
            market_price
        };
        if price <= Decimal::ZERO {
            return Err(SizingError::InvalidPrice {
                symbol: d.symbol.clone(),
                price,
            });
        }

        let class = self.config.classify(&d.symbol);
        let leverage = self.effective_leverage(d, class);
        let stop_pct = self.stop_distance(side, d.stop_loss, price)?;

        let mut risk_usd = available_balance * self.config.max_single_trade_risk_pct;
        if let Some(budget) = d.risk_budget() {
            risk_usd = risk_usd.min(budget);
        }

        // A vanishing stop distance sends the risk notional past Decimal range; the class cap still bounds it
        let mut notional = risk_usd.checked_div(stop_pct).unwrap_or(Decimal::MAX);
        let mut limited_by = SizeLimit::RiskBudget;

        let cap = self.config.limits_for(&d.symbol).max_notional;
        if notional > cap {
            notional = cap;
            limited_by = SizeLimit::ClassCap;
        }

        let lev = Decimal::from(leverage);
        if notional / lev > available_balance {
            notional = available_balance
                .checked_mul(lev)
                .and_then(|m| m.checked_mul(self.config.margin_headroom))
                .unwrap_or(notional);
            limited_by = SizeLimit::Margin;
        }

        let suggested = d.suggested_notional();
        if suggested > Decimal::ZERO && suggested < notional {
            debug!(
                symbol = %d.symbol,
                suggested = %suggested,
                ceiling = %notional,
                "Using smaller AI-suggested notional"
            );
            notional = suggested;
            limited_by = SizeLimit::Suggestion;
        }

        let minimum = self.config.min_exchange_notional;
        if notional < minimum {
            return Err(SizingError::BelowMinimumNotional { notional, minimum });
        }

        let quantity = notional
            .checked_div(price)
            .ok_or_else(|| SizingError::Overflow {
                symbol: d.symbol.clone(),
                step: "quantity",
            })?;
        if quantity <= Decimal::ZERO {
            return Err(SizingError::ZeroQuantity {
                symbol: d.symbol.clone(),
            });
        }

        info!(
            symbol = %d.symbol,
            class = class.as_str(),
            side = side.as_str(),
            notional = %notional,
            quantity = %quantity,
            leverage,
            stop_pct = %stop_pct,
            risk_usd = %risk_usd,
            limited_by = ?limited_by,
            "Position sized"
        );

        Ok(SizedOrder {
            symbol: d.symbol.clone(),
            side,
            notional,
            quantity,
            price,
            leverage,
            stop_pct,
            risk_usd,
            limited_by,
        })
    }

    /// Reject a notional above the symbol's class ceiling.
    pub fn ensure_within_cap(&self, symbol: &str, notional: Decimal) -> Result<(), SizingError> {
        let cap = self.config.limits_for(symbol).max_notional;
        if notional > cap {
            return Err(SizingError::NotionalCapExceeded {
                symbol: symbol.to_string(),
                notional,
                cap,
            });
        }
        Ok(())
    }

    fn effective_leverage(&self, d: &Decision, class: SymbolClass) -> u32 {
        u32::try_from(d.leverage)
            .ok()
            .filter(|l| *l > 0)
            .unwrap_or_else(|| self.leverage.limit_for(class).max(1))
    }

    /// Stop distance as a fraction of price, falling back to the default
    /// when the stop is missing or sits exactly at price.
    fn stop_distance(
        &self,
        side: PositionSide,
        stop: Decimal,
        price: Decimal,
    ) -> Result<Decimal, SizingError> {
        if stop > Decimal::ZERO {
            let wrong_side = match side {
                PositionSide::Long => stop > price,
                PositionSide::Short => stop < price,
            };
            if wrong_side {
                return Err(SizingError::StopWrongSide {
                    side: side.as_str(),
                    stop,
                    price,
                });
            }

            let pct = side
                .profit_distance(stop, price)
                .checked_div(price)
                .unwrap_or(Decimal::ZERO);
            if pct > Decimal::ZERO {
                return Ok(pct);
            }
        }
        Ok(self.config.default_stop_loss_pct)
    }
}

/// Recommended minimum order notional for an account of `equity`.
///
/// Majors scale from `min_position_size_usd` at equity 20 up to
/// `major_standard_min_size_usd` at equity 100. Altcoins always use the
/// absolute minimum.
pub fn recommended_min_position_size(config: &RiskConfig, class: SymbolClass, equity: Decimal) -> Decimal {
    const SMALL_ACCOUNT: Decimal = Decimal::from_parts(20, 0, 0, false, 0);
    const STANDARD_ACCOUNT: Decimal = Decimal::from_parts(100, 0, 0, false, 0);

    let min = config.min_position_size_usd;
    match class {
        SymbolClass::Altcoin => min,
        SymbolClass::Major if equity < SMALL_ACCOUNT => min,
        SymbolClass::Major if equity < STANDARD_ACCOUNT => {
            let span = config.major_standard_min_size_usd - min;
            min + span * (equity - SMALL_ACCOUNT) / (STANDARD_ACCOUNT - SMALL_ACCOUNT)
        }
        SymbolClass::Major => config.major_standard_min_size_usd,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn make_sizer() -> PositionSizer {
        PositionSizer::new(RiskConfig::default(), LeverageLimits::new(10, 5))
    }

    fn make_open(symbol: &str, stop: Decimal, leverage: i32) -> Decision {
        let mut d = Decision::new(symbol, Action::OpenLong, "");
        d.stop_loss = stop;
        d.leverage = leverage;
        d
    }

    #[test]
    fn test_respects_smaller_suggestion() {
        let mut d = make_open("BTCUSDT", dec!(98000), 10);
        d.suggested_position_size_usd = dec!(30);

        let order = make_sizer().size(&d, dec!(100), dec!(100000)).unwrap();
        assert_eq!(order.notional, dec!(30));
        assert_eq!(order.quantity, dec!(0.0003));
        assert_eq!(order.limited_by, SizeLimit::Suggestion);
    }

    #[test]
    fn test_oversized_suggestion_is_ignored() {
        let mut d = make_open("BTCUSDT", dec!(98000), 10);
        d.suggested_position_size_usd = dec!(9999999);

        let order = make_sizer().size(&d, dec!(100), dec!(100000)).unwrap();
        assert!(order.notional <= dec!(80));
        assert!(order.notional < d.suggested_position_size_usd);
        assert_eq!(order.limited_by, SizeLimit::ClassCap);
    }

    #[test]
    fn test_risk_based_notional() {
        // Missing stop uses the 2.5% default: 40 * 0.02 / 0.025 = 32
        let d = make_open("BTCUSDT", Decimal::ZERO, 10);
        let order = make_sizer().size(&d, dec!(40), dec!(100000)).unwrap();
        assert_eq!(order.stop_pct, dec!(0.025));
        assert_eq!(order.risk_usd, dec!(0.80));
        assert_eq!(order.notional, dec!(32));
        assert_eq!(order.limited_by, SizeLimit::RiskBudget);
    }

    #[test]
    fn test_margin_cap() {
        let mut d = make_open("BTCUSDT", dec!(50499), 10);
        d.entry_price = dec!(50500);
        d.risk_usd = Some(dec!(1000));

        let order = make_sizer().size(&d, dec!(5), dec!(50500)).unwrap();
        assert_eq!(order.notional, dec!(49.50));
        assert!(order.required_margin() <= dec!(5));
        assert_eq!(order.limited_by, SizeLimit::Margin);
    }

    #[test]
    fn test_below_minimum_notional_fails() {
        let mut d = make_open("BTCUSDT", dec!(25250), 10);
        d.entry_price = dec!(50500);
        d.risk_usd = Some(dec!(1));

        let err = make_sizer().size(&d, dec!(10000), dec!(50500)).unwrap_err();
        assert!(matches!(err, SizingError::BelowMinimumNotional { notional, .. } if notional == dec!(2)));
    }

    #[test]
    fn test_altcoin_cap() {
        let mut d = make_open("DOGEUSDT", dec!(0.0029), 5);
        d.entry_price = dec!(0.003);

        let order = make_sizer().size(&d, dec!(10000), dec!(0.003)).unwrap();
        assert_eq!(order.notional, dec!(60));
        assert_eq!(order.quantity, dec!(20000));
    }

    #[test]
    fn test_stop_wrong_side() {
        let d = make_open("BTCUSDT", dec!(101000), 10);
        let err = make_sizer().size(&d, dec!(100), dec!(100000)).unwrap_err();
        assert!(matches!(err, SizingError::StopWrongSide { side: "long", .. }));

        let mut short = make_open("BTCUSDT", dec!(99000), 10);
        short.action = Action::OpenShort;
        assert!(make_sizer().size(&short, dec!(100), dec!(100000)).is_err());
    }

    #[test]
    fn test_entry_price_and_leverage_fallback() {
        let mut d = make_open("SOLUSDT", Decimal::ZERO, 0);
        d.entry_price = dec!(140);

        let order = make_sizer().size(&d, dec!(100), dec!(150)).unwrap();
        assert_eq!(order.price, dec!(140));
        assert_eq!(order.leverage, 5);
        assert_eq!(order.notional, dec!(60));
    }

    #[test]
    fn test_rejects_non_open_and_empty_balance() {
        let close = Decision::new("BTCUSDT", Action::CloseLong, "");
        assert!(matches!(
            make_sizer().size(&close, dec!(100), dec!(100000)),
            Err(SizingError::NotAnOpen { .. })
        ));

        let d = make_open("BTCUSDT", dec!(98000), 10);
        assert!(matches!(
            make_sizer().size(&d, Decimal::ZERO, dec!(100000)),
            Err(SizingError::InsufficientBalance { .. })
        ));
        assert!(matches!(
            make_sizer().size(&d, dec!(100), Decimal::ZERO),
            Err(SizingError::InvalidPrice { .. })
        ));
    }

    #[test]
    fn test_vanishing_stop_distance_is_capped() {
        let mut d = make_open("BTCUSDT", dec!(99999.99999999999999999999999), 10);
        d.entry_price = dec!(100000);

        let order = make_sizer().size(&d, dec!(1000), dec!(100000)).unwrap();
        assert_eq!(order.stop_pct, dec!(0.0000000000000000000000000001));
        assert_eq!(order.notional, dec!(80));
        assert_eq!(order.limited_by, SizeLimit::ClassCap);
    }

    #[test]
    fn test_dust_entry_price_overflows_quantity() {
        let mut d = make_open("SOLUSDT", Decimal::ZERO, 5);
        d.entry_price = dec!(0.0000000000000000000000000001);

        let err = make_sizer().size(&d, dec!(100), dec!(150)).unwrap_err();
        assert!(matches!(err, SizingError::Overflow { step: "quantity", .. }));
    }

    #[test]
    fn test_huge_balance_does_not_panic() {
        let mut d = make_open("BTCUSDT", dec!(98000), 10);
        d.risk_usd = Some(Decimal::MAX);

        let order = make_sizer().size(&d, Decimal::MAX, dec!(100000)).unwrap();
        assert_eq!(order.notional, dec!(80));
    }

    #[test]
    fn test_ensure_within_cap() {
        let sizer = make_sizer();
        assert!(sizer.ensure_within_cap("BTCUSDT", dec!(80)).is_ok());
        assert!(sizer.ensure_within_cap("BTCUSDT", dec!(81)).is_err());
        assert!(matches!(
            sizer.ensure_within_cap("XRPUSDT", dec!(61)),
            Err(SizingError::NotionalCapExceeded { cap, .. }) if cap == dec!(60)
        ));
    }

    #[test]
    fn test_recommended_min_position_size() {
        let cfg = RiskConfig::default();
        assert_eq!(recommended_min_position_size(&cfg, SymbolClass::Major, dec!(10)), dec!(12));
        assert_eq!(recommended_min_position_size(&cfg, SymbolClass::Major, dec!(20)), dec!(12));
        assert_eq!(recommended_min_position_size(&cfg, SymbolClass::Major, dec!(60)), dec!(36));
        assert_eq!(recommended_min_position_size(&cfg, SymbolClass::Major, dec!(100)), dec!(60));
        assert_eq!(recommended_min_position_size(&cfg, SymbolClass::Altcoin, dec!(1000)), dec!(12));
    }
}
