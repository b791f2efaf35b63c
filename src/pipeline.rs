//! Guardrail pipeline: parse, validate and size one model response.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Serialize;
use tracing::{info, warn};
use uuid::Uuid;

use crate::config::{LeverageLimits, RiskConfig};
use crate::error::{ParseError, SizingError, ValidationError};
use crate::guard::{AccountGuard, AccountRiskState, HaltReason};
use crate::lifecycle::{LifecycleStage, ManagementAction, StopLossManager};
use crate::models::{AccountState, Decision, MarketSnapshot, PositionInfo};
use crate::parser::{ParserConfig, ResponseParser};
use crate::sizing::{PositionSizer, SizedOrder};
use crate::validation::{DecisionValidator, ValidationContext};

/// Sizing outcome for one open decision in a batch.
#[derive(Debug, Clone, PartialEq)]
pub struct OrderOutcome {
    /// 1-based position of the decision in the batch
    pub index: usize,
    pub symbol: String,
    pub result: Result<SizedOrder, SizingError>,
}

/// Everything the guardrail concluded about one model response.
#[derive(Debug, Clone)]
pub struct GuardedBatch {
    pub batch_id: Uuid,
    pub parsed_at: DateTime<Utc>,
    pub reasoning: String,
    pub decisions: Vec<Decision>,
    pub parse_error: Option<ParseError>,
    pub used_fallback: bool,
    pub validation: Result<(), ValidationError>,
    pub halt: Option<HaltReason>,
    pub orders: Vec<OrderOutcome>,
}

impl GuardedBatch {
    /// True if the batch passed validation as a whole.
    pub fn is_accepted(&self) -> bool {
        self.validation.is_ok()
    }

    /// Orders that survived sizing and the cap check.
    pub fn executable_orders(&self) -> impl Iterator<Item = &SizedOrder> {
        self.orders.iter().filter_map(|o| o.result.as_ref().ok())
    }
}

/// Stop-loss review of one open position.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PositionReview {
    pub symbol: String,
    pub stage: LifecycleStage,
    pub rr: Option<Decimal>,
    pub action: ManagementAction,
}

/// Risk guardrail between the model and the execution layer.
pub struct Guardrail {
    parser: ResponseParser,
    validator: DecisionValidator,
    sizer: PositionSizer,
    stop_manager: StopLossManager,
    account_guard: AccountGuard,
}

impl Guardrail {
    pub fn new(config: RiskConfig, leverage: LeverageLimits) -> Self {
        Self {
            parser: ResponseParser::default(),
            validator: DecisionValidator::new(config.clone(), leverage),
            sizer: PositionSizer::new(config.clone(), leverage),
            stop_manager: StopLossManager::new(config.clone()),
            account_guard: AccountGuard::new(config),
        }
    }

    pub fn with_parser_config(mut self, config: ParserConfig) -> Self {
        self.parser = ResponseParser::new(config);
        self
    }

    pub fn config(&self) -> &RiskConfig {
        self.validator.config()
    }

    /// Run one model response through parsing, batch validation and sizing.
    ///
    /// A rejected batch produces no orders. A sizing failure only drops the
    /// order it belongs to. When `risk_state` trips an account halt, every
    /// open decision reports [`SizingError::TradingHalted`].
    pub fn process(
        &self,
        raw: &str,
        account: &AccountState,
        positions: &[PositionInfo],
        snapshots: &HashMap<String, MarketSnapshot>,
        risk_state: Option<&AccountRiskState>,
    ) -> GuardedBatch {
        let batch_id = Uuid::new_v4();
        let parsed_at = Utc::now();

        let parsed = self.parser.parse(raw);
        let mut decisions = parsed.decisions;

        let ctx = ValidationContext::new(account.equity, positions, snapshots);
        let validation = self.validator.validate_batch(&mut decisions, &ctx);

        let halt = risk_state.and_then(|s| self.account_guard.check(s));

        let orders = match &validation {
            Ok(()) => self.size_orders(&decisions, account, snapshots, halt.as_ref()),
            Err(err) => {
                warn!(batch_id = %batch_id, error = %err, "Batch rejected");
                Vec::new()
            }
        };

        info!(
            batch_id = %batch_id,
            decisions = decisions.len(),
            accepted = validation.is_ok(),
            fallback = parsed.used_fallback,
            orders = orders.iter().filter(|o| o.result.is_ok()).count(),
            "Processed model response"
        );

        GuardedBatch {
            batch_id,
            parsed_at,
            reasoning: parsed.reasoning,
            decisions,
            parse_error: parsed.parse_error,
            used_fallback: parsed.used_fallback,
            validation,
            halt,
            orders,
        }
    }

    fn size_orders(
        &self,
        decisions: &[Decision],
        account: &AccountState,
        snapshots: &HashMap<String, MarketSnapshot>,
        halt: Option<&HaltReason>,
    ) -> Vec<OrderOutcome> {
        decisions
            .iter()
            .enumerate()
            .filter(|(_, d)| d.action.is_open())
            .map(|(i, d)| {
                let result = match halt {
                    Some(reason) => Err(SizingError::TradingHalted {
                        reason: reason.to_string(),
                    }),
                    None => {
                        let market_price = snapshots
                            .get(&d.symbol)
                            .map_or(Decimal::ZERO, |s| s.current_price);
                        self.sizer
                            .size(d, account.available_balance, market_price)
                            .and_then(|order| {
                                self.sizer.ensure_within_cap(&order.symbol, order.notional)?;
                                Ok(order)
                            })
                    }
                };

                if let Err(err) = &result {
                    warn!(index = i + 1, symbol = %d.symbol, error = %err, "Order skipped");
                }

                OrderOutcome {
                    index: i + 1,
                    symbol: d.symbol.clone(),
                    result,
                }
            })
            .collect()
    }

    /// Review the stop loss of every open position.
    pub fn manage_positions(
        &self,
        positions: &[PositionInfo],
        snapshots: &HashMap<String, MarketSnapshot>,
    ) -> Vec<PositionReview> {
        positions
            .iter()
            .map(|p| {
                let snapshot = snapshots.get(&p.symbol);
                let (stage, rr) = self.stop_manager.stage(p, snapshot);
                PositionReview {
                    symbol: p.symbol.clone(),
                    stage,
                    rr,
                    action: self.stop_manager.evaluate(p, snapshot),
                }
            })
            .collect()
    }
}
