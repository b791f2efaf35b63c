//! Risk guardrail between an LLM trading advisor and an exchange execution layer.
//!
//! Turns free-form model output into a bounded list of decisions and makes
//! sure none of them exceed the configured risk limits:
//! - [`parser`] recovers reasoning and decision JSON from noisy text
//! - [`validation`] applies batch-atomic risk checks
//! - [`sizing`] derives a capped notional and quantity per open
//! - [`lifecycle`] moves stop losses as positions gain R:R
//! - [`pipeline`] wires them together

pub mod config;
pub mod error;
pub mod guard;
pub mod lifecycle;
pub mod models;
pub mod parser;
pub mod pipeline;
pub mod sizing;
pub mod validation;

pub use config::{LeverageLimits, RiskConfig, SymbolClassLimits};
pub use error::{ConfigError, ParseError, SizingError, ValidationError};
pub use guard::{AccountGuard, AccountRiskState, HaltReason};
pub use lifecycle::{LifecycleStage, ManagementAction, ManagementKind, StopLossManager};
pub use models::{
    AccountState, Action, Decision, MarketSnapshot, PositionInfo, PositionSide, SymbolClass,
};
pub use parser::{ParsedResponse, ParserConfig, ResponseParser};
pub use pipeline::{GuardedBatch, Guardrail, OrderOutcome, PositionReview};
pub use sizing::{recommended_min_position_size, PositionSizer, SizeLimit, SizedOrder};
pub use validation::{
    validate_decisions, DecisionValidator, MarketDataSource, RiskLevel, StaticMarketData,
    ValidationContext, ValidationResult,
};
