//! Stop-loss lifecycle for open positions.
//!
//! Stages are derived every cycle from the position's current stop, entry,
//! mark price and ATR. Nothing is persisted between evaluations, so the
//! stop price reported by the position tracker is the only source of truth.

use std::fmt;

use rust_decimal::Decimal;
use serde::Serialize;
use tracing::{debug, info};

use crate::config::RiskConfig;
use crate::models::{MarketSnapshot, PositionInfo};

/// Lifecycle stage of a position's stop loss.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LifecycleStage {
    /// No stop is set; one must be placed immediately
    NoStopLoss,
    /// Stop is set but ATR is unavailable, so R:R cannot be computed
    Pending,
    /// Full initial risk is still on
    InitialRisk,
    /// Enough profit to move the stop to breakeven
    RiskRemoval,
    /// Enough profit to lock in 1R
    Trailing,
}

impl LifecycleStage {
    pub fn as_str(&self) -> &'static str {
        match self {
            LifecycleStage::NoStopLoss => "no_stop_loss",
            LifecycleStage::Pending => "pending",
            LifecycleStage::InitialRisk => "initial_risk",
            LifecycleStage::RiskRemoval => "risk_removal",
            LifecycleStage::Trailing => "trailing",
        }
    }
}

impl fmt::Display for LifecycleStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ManagementKind {
    UpdateStopLoss,
    None,
}

/// Stop-loss adjustment for the execution layer.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ManagementAction {
    pub action: ManagementKind,

    /// New stop price; zero when `action` is `None`
    pub new_price: Decimal,

    pub reason: String,
}

impl ManagementAction {
    pub fn none() -> Self {
        Self {
            action: ManagementKind::None,
            new_price: Decimal::ZERO,
            reason: String::new(),
        }
    }

    pub fn update_stop_loss(new_price: Decimal, reason: impl Into<String>) -> Self {
        Self {
            action: ManagementKind::UpdateStopLoss,
            new_price,
            reason: reason.into(),
        }
    }

    pub fn is_update(&self) -> bool {
        self.action == ManagementKind::UpdateStopLoss
    }
}

/// Derived risk geometry of a position with a stop and known ATR.
struct RiskGeometry {
    initial_risk: Decimal,
    rr: Decimal,
}

pub struct StopLossManager {
    config: RiskConfig,
}

impl StopLossManager {
    pub fn new(config: RiskConfig) -> Self {
        Self { config }
    }

    /// Decide whether the stop of `position` should move this cycle.
    pub fn evaluate(
        &self,
        position: &PositionInfo,
        snapshot: Option<&MarketSnapshot>,
    ) -> ManagementAction {
        let cfg = &self.config;
        let side = position.side;
        let entry = position.entry_price;
        let stop = position.stop_loss;

        if !position.has_stop_loss() {
            let new_price = self.emergency_stop(position, snapshot);
            info!(
                symbol = %position.symbol,
                side = side.as_str(),
                entry = %entry,
                new_stop = %new_price,
                "Position has no stop loss, placing emergency stop"
            );
            return ManagementAction::update_stop_loss(
                new_price,
                format!(
                    "emergency: missing stop loss (ATR x{}, max {}%)",
                    cfg.default_stop_loss_atr_multiplier.normalize(),
                    (cfg.max_stop_loss_pct * Decimal::ONE_HUNDRED).normalize()
                ),
            );
        }

        let Some(geometry) = self.geometry(position, snapshot) else {
            debug!(symbol = %position.symbol, "ATR unavailable, skipping stop management");
            return ManagementAction::none();
        };
        let rr = geometry.rr;

        if rr >= cfg.breakeven_rr && !side.stop_reached(stop, entry) {
            let buffer = entry * cfg.breakeven_buffer_pct;
            let new_price = side.toward_profit(entry, buffer);
            info!(
                symbol = %position.symbol,
                rr = %rr.round_dp(2),
                old_stop = %stop,
                new_stop = %new_price,
                "Moving stop to breakeven"
            );
            return ManagementAction::update_stop_loss(
                new_price,
                format!(
                    "risk removal (R:R={:.2} >= {}) -> move stop to breakeven",
                    rr,
                    cfg.breakeven_rr.normalize()
                ),
            );
        }

        if rr >= cfg.trailing_rr {
            let target = side.toward_profit(entry, geometry.initial_risk);
            if !side.stop_reached(stop, target) {
                info!(
                    symbol = %position.symbol,
                    rr = %rr.round_dp(2),
                    old_stop = %stop,
                    new_stop = %target,
                    "Locking in 1R profit"
                );
                return ManagementAction::update_stop_loss(
                    target,
                    format!(
                        "profit lock (R:R={:.2} >= {}) -> lock in 1R",
                        rr,
                        cfg.trailing_rr.normalize()
                    ),
                );
            }
        }

        ManagementAction::none()
    }

    /// Current lifecycle stage and R:R, if computable.
    pub fn stage(
        &self,
        position: &PositionInfo,
        snapshot: Option<&MarketSnapshot>,
    ) -> (LifecycleStage, Option<Decimal>) {
        if !position.has_stop_loss() {
            return (LifecycleStage::NoStopLoss, None);
        }
        let Some(geometry) = self.geometry(position, snapshot) else {
            return (LifecycleStage::Pending, None);
        };

        let rr = geometry.rr;
        let stage = if rr >= self.config.trailing_rr {
            LifecycleStage::Trailing
        } else if rr >= self.config.breakeven_rr {
            LifecycleStage::RiskRemoval
        } else {
            LifecycleStage::InitialRisk
        };
        (stage, Some(rr))
    }

    /// Stop for an unprotected position: `min(ATR * multiplier, entry * max_stop_loss_pct)`
    /// away from entry on the losing side. Without ATR the default stop
    /// percentage of mark price stands in for it.
    fn emergency_stop(&self, position: &PositionInfo, snapshot: Option<&MarketSnapshot>) -> Decimal {
        let cfg = &self.config;
        let atr = snapshot
            .and_then(|s| s.atr(&cfg.atr_timeframe))
            .unwrap_or(position.mark_price * cfg.default_stop_loss_pct);

        let distance = (atr * cfg.default_stop_loss_atr_multiplier)
            .min(position.entry_price * cfg.max_stop_loss_pct);

        position.side.toward_loss(position.entry_price, distance)
    }

    fn geometry(&self, position: &PositionInfo, snapshot: Option<&MarketSnapshot>) -> Option<RiskGeometry> {
        let atr = snapshot?.atr(&self.config.atr_timeframe)?;

        let mut initial_risk = (position.entry_price - position.stop_loss).abs();
        if initial_risk.is_zero() {
            initial_risk = atr;
        }

        let profit = position
            .side
            .profit_distance(position.entry_price, position.mark_price);
        Some(RiskGeometry {
            initial_risk,
            rr: profit / initial_risk,
        })
    }
}
