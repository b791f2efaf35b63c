//! Decision validator.
//!
//! Layered checks on every decision in a batch:
//! - Basic well-formedness (symbol present unless hold/wait)
//! - Field checks for stop/take-profit updates and partial closes
//! - For opens only: per-trade risk, position size, stop placement, leverage
//!
//! Validation is batch-atomic. The first decision with a fatal error rejects
//! the whole batch.

mod market_data;

pub use market_data::{MarketDataSource, StaticMarketData};

use std::borrow::Cow;
use std::collections::HashMap;
use std::fmt;

use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::config::{LeverageLimits, RiskConfig};
use crate::error::{ConfigError, ValidationError};
use crate::models::{Action, Decision, MarketSnapshot, PositionInfo, PositionSide};
use crate::sizing::recommended_min_position_size;

/// Risk band of a validated decision.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RiskLevel {
    Low,
    Medium,
    High,
    /// At least one fatal check failed
    Invalid,
}

impl RiskLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            RiskLevel::Low => "low",
            RiskLevel::Medium => "medium",
            RiskLevel::High => "high",
            RiskLevel::Invalid => "invalid",
        }
    }
}

impl fmt::Display for RiskLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outcome of validating one decision.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ValidationResult {
    pub is_valid: bool,

    /// Fatal errors in check order
    pub errors: Vec<String>,

    /// Advisory findings that never reject
    pub warnings: Vec<String>,

    pub risk_level: RiskLevel,

    /// Potential loss as a percent of equity (opens only)
    pub risk_percent: f64,
}

impl ValidationResult {
    fn new() -> Self {
        Self {
            is_valid: true,
            errors: Vec::new(),
            warnings: Vec::new(),
            risk_level: RiskLevel::Low,
            risk_percent: 0.0,
        }
    }

    fn reject(&mut self, error: impl Into<String>) {
        self.errors.push(error.into());
        self.is_valid = false;
        self.risk_level = RiskLevel::Invalid;
    }

    fn warn(&mut self, warning: impl Into<String>) {
        self.warnings.push(warning.into());
    }
}

/// Account and market inputs for one validation run.
#[derive(Debug, Clone, Copy)]
pub struct ValidationContext<'a> {
    pub account_equity: Decimal,
    pub positions: &'a [PositionInfo],
    pub snapshots: &'a HashMap<String, MarketSnapshot>,
}

impl<'a> ValidationContext<'a> {
    pub fn new(
        account_equity: Decimal,
        positions: &'a [PositionInfo],
        snapshots: &'a HashMap<String, MarketSnapshot>,
    ) -> Self {
        Self {
            account_equity,
            positions,
            snapshots,
        }
    }
}

/// Validates AI decisions against the risk configuration.
pub struct DecisionValidator {
    config: RiskConfig,
    leverage: LeverageLimits,
    market_source: Option<Box<dyn MarketDataSource>>,
}

impl DecisionValidator {
    pub fn new(config: RiskConfig, leverage: LeverageLimits) -> Self {
        Self {
            config,
            leverage,
            market_source: None,
        }
    }

    /// Fall back to `source` for symbols missing from the context.
    pub fn with_market_source(mut self, source: Box<dyn MarketDataSource>) -> Self {
        self.market_source = Some(source);
        self
    }

    pub fn config(&self) -> &RiskConfig {
        &self.config
    }

    // ==================== Batch ====================

    /// Validate a batch in order, stopping at the first fatal decision.
    ///
    /// Back-fills the canonical suggested notional from the legacy field
    /// before checking each decision.
    pub fn validate_batch(
        &self,
        decisions: &mut [Decision],
        ctx: &ValidationContext<'_>,
    ) -> Result<(), ValidationError> {
        for (i, decision) in decisions.iter_mut().enumerate() {
            let index = i + 1;

            if decision.backfill_suggested_notional() {
                debug!(
                    index,
                    symbol = %decision.symbol,
                    notional = %decision.suggested_position_size_usd,
                    "Back-filled suggested notional from legacy field"
                );
            }

            let result = self
                .validate_decision(decision, ctx)
                .map_err(|source| ValidationError::Config {
                    index,
                    symbol: decision.symbol.clone(),
                    source,
                })?;

            if !result.warnings.is_empty() {
                warn!(
                    index,
                    symbol = %decision.symbol,
                    warnings = ?result.warnings,
                    "Validation warnings"
                );
            }

            if !result.is_valid {
                warn!(
                    index,
                    symbol = %decision.symbol,
                    action = %decision.action,
                    risk_level = %result.risk_level,
                    risk_percent = result.risk_percent,
                    errors = ?result.errors,
                    "Decision rejected, discarding batch"
                );
                return Err(ValidationError::Rejected {
                    index,
                    symbol: decision.symbol.clone(),
                    action: decision.action.to_string(),
                    errors: result.errors,
                    warnings: result.warnings,
                    risk_level: result.risk_level,
                    risk_percent: result.risk_percent,
                });
            }

            if decision.action.is_open() {
                info!(
                    index,
                    symbol = %decision.symbol,
                    action = %decision.action,
                    risk_level = %result.risk_level,
                    risk_percent = result.risk_percent,
                    leverage = decision.leverage,
                    notional = %decision.suggested_notional(),
                    "Risk checks passed"
                );
            }
        }

        Ok(())
    }

    // ==================== Single decision ====================

    /// Run every applicable check on one decision.
    ///
    /// Errors only when an open needs market data that is unavailable.
    pub fn validate_decision(
        &self,
        d: &Decision,
        ctx: &ValidationContext<'_>,
    ) -> Result<ValidationResult, ConfigError> {
        let mut result = ValidationResult::new();

        if d.action.requires_symbol() && d.symbol.trim().is_empty() {
            result.reject(format!("symbol is required for {}", d.action));
            return Ok(result);
        }

        self.check_action_fields(d, &mut result);

        if d.action.is_open() {
            let snapshot = self.resolve_snapshot(&d.symbol, ctx)?;
            let price = snapshot.current_price;

            self.check_risk(d, price, ctx.account_equity, &mut result);
            self.check_position_size(d, ctx.account_equity, &mut result);
            self.check_stop_loss(d, price, &mut result);
            self.check_leverage(d, &mut result);
            self.check_duplicate(d, ctx.positions, &mut result);
            self.assess_risk_level(&mut result);
        }

        Ok(result)
    }

    fn resolve_snapshot<'c>(
        &self,
        symbol: &str,
        ctx: &ValidationContext<'c>,
    ) -> Result<Cow<'c, MarketSnapshot>, ConfigError> {
        let snapshot = match ctx.snapshots.get(symbol) {
            Some(s) => Cow::Borrowed(s),
            None => {
                let source = self.market_source.as_ref().ok_or_else(|| {
                    ConfigError::MissingMarketData {
                        symbol: symbol.to_string(),
                        reason: "no snapshot supplied".to_string(),
                    }
                })?;
                let fetched = source.snapshot(symbol).map_err(|e| ConfigError::MissingMarketData {
                    symbol: symbol.to_string(),
                    reason: format!("{e:#}"),
                })?;
                Cow::Owned(fetched)
            }
        };

        if !snapshot.has_price() {
            return Err(ConfigError::MissingMarketData {
                symbol: symbol.to_string(),
                reason: format!("non-positive price {}", snapshot.current_price),
            });
        }
        Ok(snapshot)
    }

    fn check_action_fields(&self, d: &Decision, result: &mut ValidationResult) {
        match d.action {
            Action::UpdateStopLoss if d.new_stop_loss <= Decimal::ZERO => {
                result.reject(format!("new_stop_loss must be > 0, got {}", d.new_stop_loss));
            }
            Action::UpdateTakeProfit if d.new_take_profit <= Decimal::ZERO => {
                result.reject(format!("new_take_profit must be > 0, got {}", d.new_take_profit));
            }
            Action::PartialClose => {
                let pct = d.close_percentage;
                if pct <= Decimal::ZERO || pct > dec!(100) {
                    result.reject(format!("close_percentage must be within 1-100, got {pct}"));
                } else if pct < dec!(5) {
                    result.reject(format!(
                        "close_percentage {pct}% is too small, at least 5% is required"
                    ));
                }
            }
            _ => {}
        }
    }

    /// Potential loss at the stop must stay within the per-trade budget.
    fn check_risk(&self, d: &Decision, price: Decimal, equity: Decimal, result: &mut ValidationResult) {
        let notional = d.suggested_notional();
        if notional <= Decimal::ZERO || d.stop_loss <= Decimal::ZERO {
            result.reject("position size and stop loss must be positive");
            return;
        }
        if equity <= Decimal::ZERO {
            result.reject(format!("account equity must be positive, got {equity}"));
            return;
        }

        let figures = notional.checked_div(price).and_then(|quantity| {
            let potential_loss = quantity.checked_mul((price - d.stop_loss).abs())?;
            let risk_percent = potential_loss.checked_div(equity)?.checked_mul(dec!(100))?;
            let max_loss = equity.checked_mul(self.config.max_single_trade_risk_pct)?;
            Some((potential_loss, risk_percent, max_loss))
        });
        let Some((potential_loss, risk_percent, max_loss)) = figures else {
            result.risk_percent = f64::MAX;
            result.reject("risk computation overflowed");
            return;
        };
        result.risk_percent = risk_percent.to_f64().unwrap_or(f64::MAX);

        if potential_loss > max_loss {
            result.reject(format!(
                "risk exceeded: potential loss {:.2} USDT ({:.2}%) > max allowed {:.2} USDT ({}%)",
                potential_loss,
                risk_percent,
                max_loss,
                (self.config.max_single_trade_risk_pct * dec!(100)).normalize()
            ));
        }
    }

    fn check_position_size(&self, d: &Decision, equity: Decimal, result: &mut ValidationResult) {
        let notional = d.suggested_notional();
        let min_size = self.config.min_position_size_usd;

        if notional < min_size {
            result.reject(format!(
                "position size too small: {:.2} USDT < minimum {:.2} USDT",
                notional, min_size
            ));
        } else {
            let class = self.config.classify(&d.symbol);
            let recommended = recommended_min_position_size(&self.config, class, equity);
            if notional < recommended {
                result.warn(format!(
                    "position size {:.2} USDT is below the recommended {:.2} USDT for {}",
                    notional, recommended, d.symbol
                ));
            }
        }

        let ratio = self.config.limits_for(&d.symbol).max_equity_ratio;
        let cap = equity.checked_mul(ratio).unwrap_or(Decimal::MAX);
        if notional > cap {
            result.reject(format!(
                "position value exceeded: {:.2} USDT > max allowed {:.2} USDT ({}% of equity)",
                notional,
                cap,
                (ratio * dec!(100)).normalize()
            ));
        }
    }

    /// Stop must sit on the losing side of price. A tight stop only warns.
    fn check_stop_loss(&self, d: &Decision, price: Decimal, result: &mut ValidationResult) {
        if d.stop_loss <= Decimal::ZERO {
            return;
        }

        let wrong_side = match d.action {
            Action::OpenLong => d.stop_loss >= price,
            Action::OpenShort => d.stop_loss <= price,
            _ => false,
        };
        if wrong_side {
            result.reject(format!(
                "stop loss {} is on the wrong side of price {} for {}",
                d.stop_loss, price, d.action
            ));
        }

        let Some(distance_pct) = (d.stop_loss - price).abs().checked_div(price) else {
            result.reject("stop loss distance computation overflowed");
            return;
        };
        if distance_pct < self.config.min_stop_distance_pct {
            result.warn(format!(
                "stop loss distance {:.2}% is below the suggested minimum {}%",
                distance_pct * dec!(100),
                (self.config.min_stop_distance_pct * dec!(100)).normalize()
            ));
        }
    }

    /// Leverage above the class cap is rejected, never clamped.
    fn check_leverage(&self, d: &Decision, result: &mut ValidationResult) {
        let max = self.leverage.limit_for(self.config.classify(&d.symbol));
        if i64::from(d.leverage) > i64::from(max) {
            result.reject(format!("leverage exceeded: {}x > max allowed {}x", d.leverage, max));
        }
        if d.leverage < 1 {
            result.reject(format!("leverage must be at least 1x, got {}x", d.leverage));
        }
    }

    fn check_duplicate(&self, d: &Decision, positions: &[PositionInfo], result: &mut ValidationResult) {
        let side = match d.action {
            Action::OpenLong => PositionSide::Long,
            Action::OpenShort => PositionSide::Short,
            _ => return,
        };
        if let Some(held) = positions
            .iter()
            .find(|p| p.side == side && p.symbol.eq_ignore_ascii_case(&d.symbol))
        {
            result.warn(format!(
                "already holding a {} {} position ({:.2} USDT at entry {}), opening adds to it",
                held.side.as_str(),
                held.symbol,
                held.notional(),
                held.entry_price
            ));
        }
    }

    fn assess_risk_level(&self, result: &mut ValidationResult) {
        if !result.is_valid {
            result.risk_level = RiskLevel::Invalid;
            return;
        }

        let high = self.config.risk_band_high_pct.to_f64().unwrap_or(1.5);
        let medium = self.config.risk_band_medium_pct.to_f64().unwrap_or(1.0);
        result.risk_level = if result.risk_percent > high {
            RiskLevel::High
        } else if result.risk_percent > medium {
            RiskLevel::Medium
        } else {
            RiskLevel::Low
        };
    }
}

/// Validate a batch with explicit inputs.
pub fn validate_decisions(
    decisions: &mut [Decision],
    account_equity: Decimal,
    leverage_limits: LeverageLimits,
    open_positions: &[PositionInfo],
    market_snapshots: &HashMap<String, MarketSnapshot>,
    config: &RiskConfig,
) -> Result<(), ValidationError> {
    let validator = DecisionValidator::new(config.clone(), leverage_limits);
    let ctx = ValidationContext::new(account_equity, open_positions, market_snapshots);
    validator.validate_batch(decisions, &ctx)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_validator() -> DecisionValidator {
        DecisionValidator::new(RiskConfig::default(), LeverageLimits::new(10, 5))
    }

    fn make_snapshots() -> HashMap<String, MarketSnapshot> {
        [
            MarketSnapshot::new("BTCUSDT", dec!(100000)),
            MarketSnapshot::new("SOLUSDT", dec!(150)),
        ]
        .into_iter()
        .map(|s| (s.symbol.clone(), s))
        .collect()
    }

    fn make_open(symbol: &str, action: Action, notional: Decimal, stop: Decimal, leverage: i32) -> Decision {
        let mut d = Decision::new(symbol, action, "test");
        d.suggested_position_size_usd = notional;
        d.stop_loss = stop;
        d.leverage = leverage;
        d
    }

    #[test]
    fn test_valid_open_long() {
        let v = make_validator();
        let snaps = make_snapshots();
        let ctx = ValidationContext::new(dec!(100), &[], &snaps);

        let d = make_open("BTCUSDT", Action::OpenLong, dec!(40), dec!(98000), 5);
        let r = v.validate_decision(&d, &ctx).unwrap();

        assert!(r.is_valid, "errors: {:?}", r.errors);
        assert_eq!(r.risk_level, RiskLevel::Low);
        assert!((r.risk_percent - 0.8).abs() < 1e-9);
        // 40 is under the 60 USDT recommendation for majors at equity 100
        assert_eq!(r.warnings.len(), 1);
    }

    #[test]
    fn test_huge_notional_and_stop_are_rejected() {
        let v = make_validator();
        let snaps = make_snapshots();
        let ctx = ValidationContext::new(dec!(100), &[], &snaps);

        let huge = dec!(10000000000000000000);
        let d = make_open("BTCUSDT", Action::OpenShort, huge, huge, 5);
        let r = v.validate_decision(&d, &ctx).unwrap();
        assert!(!r.is_valid);
        assert_eq!(r.risk_level, RiskLevel::Invalid);
        assert_eq!(r.errors[0], "risk computation overflowed");
        assert_eq!(r.risk_percent, f64::MAX);

        let d = make_open("BTCUSDT", Action::OpenShort, dec!(40), Decimal::MAX, 5);
        let r = v.validate_decision(&d, &ctx).unwrap();
        assert!(!r.is_valid);
    }

    #[test]
    fn test_leverage_is_rejected_not_clamped() {
        let v = make_validator();
        let snaps = make_snapshots();
        let ctx = ValidationContext::new(dec!(100), &[], &snaps);

        let mut batch = vec![make_open("SOLUSDT", Action::OpenLong, dec!(30), dec!(147), 20)];
        let r = v.validate_decision(&batch[0], &ctx).unwrap();
        assert!(!r.is_valid);
        assert_eq!(r.risk_level, RiskLevel::Invalid);
        assert!(r.errors[0].contains("20x > max allowed 5x"));

        let err = v.validate_batch(&mut batch, &ctx).unwrap_err();
        assert_eq!(err.index(), 1);
        assert_eq!(batch[0].leverage, 20);
    }

    #[test]
    fn test_risk_budget_exceeded() {
        let v = make_validator();
        let snaps = make_snapshots();
        let ctx = ValidationContext::new(dec!(100), &[], &snaps);

        // 80 notional with a 5% stop loses 4 USDT = 4% of equity
        let d = make_open("BTCUSDT", Action::OpenLong, dec!(80), dec!(95000), 5);
        let r = v.validate_decision(&d, &ctx).unwrap();
        assert!(!r.is_valid);
        assert!((r.risk_percent - 4.0).abs() < 1e-9);
        assert!(r.errors[0].starts_with("risk exceeded"));
    }

    #[test]
    fn test_position_size_bounds() {
        let v = make_validator();
        let snaps = make_snapshots();
        let ctx = ValidationContext::new(dec!(100), &[], &snaps);

        let small = make_open("SOLUSDT", Action::OpenShort, dec!(10), dec!(153), 3);
        let r = v.validate_decision(&small, &ctx).unwrap();
        assert!(!r.is_valid);
        assert!(r.errors.iter().any(|e| e.contains("too small")));

        // Altcoin cap is 60% of equity
        let big = make_open("SOLUSDT", Action::OpenShort, dec!(61), dec!(151), 3);
        let r = v.validate_decision(&big, &ctx).unwrap();
        assert!(r.errors.iter().any(|e| e.contains("60% of equity")));
    }

    #[test]
    fn test_stop_wrong_side_and_tight_stop() {
        let v = make_validator();
        let snaps = make_snapshots();
        let ctx = ValidationContext::new(dec!(100), &[], &snaps);

        let wrong = make_open("BTCUSDT", Action::OpenLong, dec!(40), dec!(101000), 5);
        let r = v.validate_decision(&wrong, &ctx).unwrap();
        assert!(r.errors.iter().any(|e| e.contains("wrong side")));

        let short_wrong = make_open("BTCUSDT", Action::OpenShort, dec!(40), dec!(99000), 5);
        assert!(!v.validate_decision(&short_wrong, &ctx).unwrap().is_valid);

        // 1% stop: advisory only
        let tight = make_open("BTCUSDT", Action::OpenLong, dec!(40), dec!(99000), 5);
        let r = v.validate_decision(&tight, &ctx).unwrap();
        assert!(r.is_valid);
        assert!(r.warnings.iter().any(|w| w.contains("stop loss distance")));
    }

    #[test]
    fn test_risk_bands() {
        let v = make_validator();
        let snaps = make_snapshots();
        let ctx = ValidationContext::new(dec!(100), &[], &snaps);

        // 80 * 2.5% = 2.0 -> at the limit, high band
        let high = make_open("BTCUSDT", Action::OpenLong, dec!(80), dec!(97500), 5);
        assert_eq!(v.validate_decision(&high, &ctx).unwrap().risk_level, RiskLevel::High);

        // 60 * 2% = 1.2 -> medium
        let medium = make_open("BTCUSDT", Action::OpenLong, dec!(60), dec!(98000), 5);
        assert_eq!(v.validate_decision(&medium, &ctx).unwrap().risk_level, RiskLevel::Medium);
    }

    #[test]
    fn test_non_open_actions_skip_market_checks() {
        let v = make_validator();
        let empty = HashMap::new();
        let ctx = ValidationContext::new(dec!(100), &[], &empty);

        for action in [Action::Hold, Action::Wait] {
            let d = Decision::new("", action, "nothing to do");
            let r = v.validate_decision(&d, &ctx).unwrap();
            assert!(r.is_valid);
            assert_eq!(r.risk_percent, 0.0);
        }

        let close = Decision::new("ETHUSDT", Action::CloseLong, "take profit");
        assert!(v.validate_decision(&close, &ctx).unwrap().is_valid);
    }

    #[test]
    fn test_symbol_required() {
        let v = make_validator();
        let empty = HashMap::new();
        let ctx = ValidationContext::new(dec!(100), &[], &empty);

        let r = v.validate_decision(&Decision::new("", Action::CloseShort, ""), &ctx).unwrap();
        assert!(!r.is_valid);
        assert_eq!(r.risk_level, RiskLevel::Invalid);
    }

    #[test]
    fn test_adjustment_fields() {
        let v = make_validator();
        let empty = HashMap::new();
        let ctx = ValidationContext::new(dec!(100), &[], &empty);

        let sl = Decision::new("BTCUSDT", Action::UpdateStopLoss, "");
        assert!(!v.validate_decision(&sl, &ctx).unwrap().is_valid);

        let tp = Decision::new("BTCUSDT", Action::UpdateTakeProfit, "");
        assert!(!v.validate_decision(&tp, &ctx).unwrap().is_valid);

        let mut pc = Decision::new("BTCUSDT", Action::PartialClose, "");
        for (pct, ok) in [(dec!(0), false), (dec!(3), false), (dec!(5), true), (dec!(100), true), (dec!(101), false)] {
            pc.close_percentage = pct;
            assert_eq!(v.validate_decision(&pc, &ctx).unwrap().is_valid, ok, "pct {pct}");
        }
    }

    #[test]
    fn test_missing_market_data_is_config_error() {
        let v = make_validator();
        let empty = HashMap::new();
        let ctx = ValidationContext::new(dec!(100), &[], &empty);

        let mut batch = vec![
            Decision::new("", Action::Wait, ""),
            make_open("ETHUSDT", Action::OpenLong, dec!(40), dec!(2900), 5),
        ];
        let err = v.validate_batch(&mut batch, &ctx).unwrap_err();
        assert!(matches!(err, ValidationError::Config { index: 2, .. }));
    }

    #[test]
    fn test_market_source_fallback() {
        let v = make_validator().with_market_source(Box::new(StaticMarketData::new([
            MarketSnapshot::new("ETHUSDT", dec!(3000)),
        ])));
        let empty = HashMap::new();
        let ctx = ValidationContext::new(dec!(100), &[], &empty);

        let d = make_open("ETHUSDT", Action::OpenLong, dec!(40), dec!(2925), 5);
        assert!(v.validate_decision(&d, &ctx).unwrap().is_valid);
    }

    #[test]
    fn test_batch_fails_fast_and_backfills() {
        let v = make_validator();
        let snaps = make_snapshots();
        let ctx = ValidationContext::new(dec!(100), &[], &snaps);

        let mut legacy = make_open("BTCUSDT", Action::OpenLong, Decimal::ZERO, dec!(98000), 5);
        legacy.position_size_usd = dec!(40);

        let mut batch = vec![
            Decision::new("", Action::Hold, ""),
            legacy,
            make_open("SOLUSDT", Action::OpenLong, dec!(30), dec!(147), 20),
            make_open("SOLUSDT", Action::OpenLong, dec!(30), dec!(147), 3),
        ];
        let err = v.validate_batch(&mut batch, &ctx).unwrap_err();
        assert_eq!(err.index(), 3);
        assert_eq!(batch[1].suggested_position_size_usd, dec!(40));

        batch.truncate(2);
        assert!(v.validate_batch(&mut batch, &ctx).is_ok());
    }

    #[test]
    fn test_duplicate_position_warns() {
        let v = make_validator();
        let snaps = make_snapshots();
        let held = vec![PositionInfo {
            symbol: "SOLUSDT".to_string(),
            side: PositionSide::Long,
            entry_price: dec!(140),
            mark_price: dec!(150),
            quantity: dec!(0.2),
            leverage: 3,
            unrealized_pnl: dec!(2),
            peak_pnl_pct: dec!(7),
            stop_loss: dec!(136),
            take_profit: Decimal::ZERO,
        }];
        let ctx = ValidationContext::new(dec!(100), &held, &snaps);

        let d = make_open("SOLUSDT", Action::OpenLong, dec!(30), dec!(147), 3);
        let r = v.validate_decision(&d, &ctx).unwrap();
        assert!(r.is_valid);
        assert!(r.warnings.iter().any(|w| w.contains("already holding")));
    }

    #[test]
    fn test_free_function_matches_validator() {
        let snaps = make_snapshots();
        let mut batch = vec![make_open("SOLUSDT", Action::OpenLong, dec!(30), dec!(147), 20)];
        let res = validate_decisions(
            &mut batch,
            dec!(100),
            LeverageLimits::new(10, 5),
            &[],
            &snaps,
            &RiskConfig::default(),
        );
        assert!(matches!(res, Err(ValidationError::Rejected { index: 1, .. })));
    }
}
