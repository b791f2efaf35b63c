//! Error taxonomy for the guardrail.
//!
//! Parse errors degrade to a safe wait decision, validation errors reject a
//! whole batch, sizing errors reject a single order.

use rust_decimal::Decimal;
use thiserror::Error;

use crate::validation::RiskLevel;

/// Longest fragment of model output carried inside an error.
const FRAGMENT_LIMIT: usize = 200;

/// Truncate model output for diagnostics without splitting a UTF-8 character.
pub(crate) fn fragment(s: &str) -> String {
    match s.char_indices().nth(FRAGMENT_LIMIT) {
        Some((idx, _)) => format!("{}...", &s[..idx]),
        None => s.to_string(),
    }
}

/// The decision JSON in an AI response could not be used.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ParseError {
    #[error("decision JSON must be an array of objects starting with [{{, got: {fragment}")]
    InvalidShape { fragment: String },

    #[error("decision JSON contains a range symbol '~'; numbers must be single values: {fragment}")]
    RangeSymbol { fragment: String },

    #[error("decision JSON numbers must not contain thousands separators, found: {found}")]
    ThousandsSeparator { found: String },

    #[error("decision JSON failed to deserialize: {message}; fragment: {fragment}")]
    Deserialize { message: String, fragment: String },
}

/// Configuration or collaborator data needed for validation is missing or bad.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ConfigError {
    #[error("missing or invalid market data for {symbol}: {reason}")]
    MissingMarketData { symbol: String, reason: String },

    #[error("invalid config value {key}={value}: {reason}")]
    InvalidValue {
        key: String,
        value: String,
        reason: String,
    },
}

/// A decision in the batch violated a hard constraint; the whole batch is rejected.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ValidationError {
    #[error(
        "decision #{index} ({action} {symbol}) rejected (risk level: {risk_level}, risk: {risk_percent:.2}%): {}",
        .errors.join("; ")
    )]
    Rejected {
        index: usize,
        symbol: String,
        action: String,
        errors: Vec<String>,
        warnings: Vec<String>,
        risk_level: RiskLevel,
        risk_percent: f64,
    },

    #[error("decision #{index} ({symbol}) could not be validated: {source}")]
    Config {
        index: usize,
        symbol: String,
        #[source]
        source: ConfigError,
    },
}

impl ValidationError {
    /// 1-based position of the offending decision in the batch.
    pub fn index(&self) -> usize {
        match self {
            ValidationError::Rejected { index, .. } | ValidationError::Config { index, .. } => {
                *index
            }
        }
    }
}

/// A single order could not be sized safely. Sibling orders are unaffected.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum SizingError {
    #[error("insufficient or unknown available balance: {available}")]
    InsufficientBalance { available: Decimal },

    #[error("invalid market/entry price for {symbol}: {price}")]
    InvalidPrice { symbol: String, price: Decimal },

    #[error("{side} stop loss {stop} is on the wrong side of price {price}")]
    StopWrongSide {
        side: &'static str,
        stop: Decimal,
        price: Decimal,
    },

    #[error("final notional {notional} is below minimum notional {minimum}")]
    BelowMinimumNotional { notional: Decimal, minimum: Decimal },

    #[error("notional {notional} exceeds cap {cap} for {symbol}")]
    NotionalCapExceeded {
        symbol: String,
        notional: Decimal,
        cap: Decimal,
    },

    #[error("{step} computation overflowed for {symbol}")]
    Overflow { symbol: String, step: &'static str },

    #[error("computed quantity is not positive for {symbol}")]
    ZeroQuantity { symbol: String },

    #[error("trading halted: {reason}")]
    TradingHalted { reason: String },

    #[error("{action} is not a position-opening action")]
    NotAnOpen { action: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fragment_respects_char_boundaries() {
        let long = "价".repeat(300);
        let f = fragment(&long);
        assert!(f.ends_with("..."));
        assert_eq!(f.chars().count(), FRAGMENT_LIMIT + 3);

        assert_eq!(fragment("short"), "short");
    }

    #[test]
    fn test_rejected_message_lists_errors() {
        let err = ValidationError::Rejected {
            index: 2,
            symbol: "SOLUSDT".to_string(),
            action: "open_long".to_string(),
            errors: vec!["leverage too high".to_string(), "stop wrong side".to_string()],
            warnings: vec![],
            risk_level: RiskLevel::Invalid,
            risk_percent: 3.5,
        };
        let msg = err.to_string();
        assert!(msg.contains("#2"));
        assert!(msg.contains("leverage too high; stop wrong side"));
        assert!(msg.contains("3.50%"));
        assert_eq!(err.index(), 2);
    }
}
