//! Account-level halt conditions checked before any new position is opened.

use std::fmt;

use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::config::RiskConfig;

/// Running account figures for the current trading day.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AccountRiskState {
    /// Equity at the start of the trading day
    pub daily_baseline_equity: Decimal,

    /// PnL of trades closed today
    pub daily_realized_pnl: Decimal,

    pub current_equity: Decimal,

    /// Highest equity seen
    pub peak_equity: Decimal,
}

impl AccountRiskState {
    /// Fraction of peak equity lost so far.
    pub fn drawdown(&self) -> Decimal {
        if self.peak_equity <= Decimal::ZERO || self.current_equity >= self.peak_equity {
            return Decimal::ZERO;
        }
        (self.peak_equity - self.current_equity) / self.peak_equity
    }
}

/// Why new openings are blocked.
#[derive(Debug, Clone, PartialEq)]
pub enum HaltReason {
    DailyLoss { realized: Decimal, limit: Decimal },
    Drawdown { drawdown: Decimal, limit: Decimal },
}

impl fmt::Display for HaltReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HaltReason::DailyLoss { realized, limit } => write!(
                f,
                "daily realized loss {:.2} reached limit -{:.2}",
                realized.abs(),
                limit
            ),
            HaltReason::Drawdown { drawdown, limit } => write!(
                f,
                "drawdown {}% exceeds limit {}%",
                (drawdown * dec!(100)).round_dp(2),
                (limit * dec!(100)).round_dp(2)
            ),
        }
    }
}

pub struct AccountGuard {
    config: RiskConfig,
}

impl AccountGuard {
    pub fn new(config: RiskConfig) -> Self {
        Self { config }
    }

    /// Check whether trading should halt.
    ///
    /// Only realized PnL counts toward the daily limit. Equity dips from
    /// open positions or margin reserved by unfilled orders do not.
    pub fn check(&self, state: &AccountRiskState) -> Option<HaltReason> {
        let limit = state.daily_baseline_equity * self.config.max_daily_loss_pct;
        if limit > Decimal::ZERO && state.daily_realized_pnl <= -limit {
            let reason = HaltReason::DailyLoss {
                realized: state.daily_realized_pnl,
                limit,
            };
            warn!(reason = %reason, "Trading halted");
            return Some(reason);
        }

        let drawdown = state.drawdown();
        if drawdown >= self.config.max_drawdown_pct {
            let reason = HaltReason::Drawdown {
                drawdown,
                limit: self.config.max_drawdown_pct,
            };
            warn!(reason = %reason, "Trading halted");
            return Some(reason);
        }

        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_guard(max_daily_loss_pct: Decimal) -> AccountGuard {
        AccountGuard::new(RiskConfig {
            max_daily_loss_pct,
            ..Default::default()
        })
    }

    #[test]
    fn test_unrealized_dip_does_not_halt() {
        let guard = AccountGuard::new(RiskConfig {
            max_daily_loss_pct: dec!(0.10),
            max_drawdown_pct: dec!(0.50),
            ..Default::default()
        });
        // Equity is down 15% from margin reserved by an unfilled order; nothing realized
        let state = AccountRiskState {
            daily_baseline_equity: dec!(120.18),
            daily_realized_pnl: Decimal::ZERO,
            current_equity: dec!(120.18) - dec!(18.47),
            peak_equity: dec!(120.18),
        };
        assert!(guard.check(&state).is_none());

        // The same dip does trip a tighter drawdown limit
        let strict = make_guard(dec!(0.10));
        assert!(matches!(strict.check(&state), Some(HaltReason::Drawdown { .. })));
    }

    #[test]
    fn test_realized_loss_halts() {
        let guard = make_guard(dec!(0.10));
        let state = AccountRiskState {
            daily_baseline_equity: dec!(1000),
            daily_realized_pnl: dec!(-100),
            current_equity: dec!(990),
            peak_equity: dec!(1000),
        };
        let reason = guard.check(&state).unwrap();
        assert_eq!(
            reason,
            HaltReason::DailyLoss {
                realized: dec!(-100),
                limit: dec!(100.00)
            }
        );
        assert!(reason.to_string().contains("daily realized loss 100.00"));
    }

    #[test]
    fn test_small_realized_loss_is_fine() {
        let guard = make_guard(dec!(0.05));
        let state = AccountRiskState {
            daily_baseline_equity: dec!(1000),
            daily_realized_pnl: dec!(-49.99),
            current_equity: dec!(950),
            peak_equity: dec!(1000),
        };
        assert!(guard.check(&state).is_none());
        assert_eq!(state.drawdown(), dec!(0.05));
    }
}
