//! Risk configuration.

use std::env;
use std::path::Path;
use std::str::FromStr;

use anyhow::{Context, Result};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::models::SymbolClass;

/// Notional caps for one symbol class.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SymbolClassLimits {
    /// Absolute notional ceiling in USD used by the sizing engine
    pub max_notional: Decimal,

    /// Notional ceiling as a fraction of account equity used by the validator
    pub max_equity_ratio: Decimal,
}

/// Maximum leverage per symbol class.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LeverageLimits {
    pub major: u32,
    pub altcoin: u32,
}

impl LeverageLimits {
    pub fn new(major: u32, altcoin: u32) -> Self {
        Self { major, altcoin }
    }

    pub fn limit_for(&self, class: SymbolClass) -> u32 {
        match class {
            SymbolClass::Major => self.major,
            SymbolClass::Altcoin => self.altcoin,
        }
    }
}

impl Default for LeverageLimits {
    fn default() -> Self {
        Self {
            major: 10,
            altcoin: 5,
        }
    }
}

/// Immutable risk parameters shared by every guardrail component.
///
/// All percentages are fractions (0.02 = 2%).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RiskConfig {
    // === Per-trade risk ===
    /// Maximum loss of a single trade as a fraction of equity/balance
    pub max_single_trade_risk_pct: Decimal,

    // === Initial stop loss ===
    /// ATR multiple for an emergency stop
    pub default_stop_loss_atr_multiplier: Decimal,

    /// Stop distance used when no stop or ATR is available
    pub default_stop_loss_pct: Decimal,

    /// Hard ceiling on emergency stop distance
    pub max_stop_loss_pct: Decimal,

    /// Stops tighter than this only produce a warning
    pub min_stop_distance_pct: Decimal,

    /// ATR timeframe read from market snapshots
    pub atr_timeframe: String,

    // === Position management ===
    /// R:R at which the stop moves to breakeven
    pub breakeven_rr: Decimal,

    /// R:R at which the stop locks in 1R
    pub trailing_rr: Decimal,

    /// Buffer beyond entry when moving to breakeven
    pub breakeven_buffer_pct: Decimal,

    // === Risk level bands (risk percent of equity) ===
    pub risk_band_medium_pct: Decimal,
    pub risk_band_high_pct: Decimal,

    // === Notional caps ===
    pub major: SymbolClassLimits,
    pub altcoin: SymbolClassLimits,

    /// Symbols classed as majors
    pub major_symbols: Vec<String>,

    /// Validator minimum order notional (exchange minimum plus margin)
    pub min_position_size_usd: Decimal,

    /// Absolute exchange minimum notional enforced by the sizing engine
    pub min_exchange_notional: Decimal,

    /// Recommended minimum for majors on accounts of 100 USD or more
    pub major_standard_min_size_usd: Decimal,

    /// Shrink factor applied when required margin exceeds the balance
    pub margin_headroom: Decimal,

    // === Account-level ===
    /// Realized daily loss that halts new openings
    pub max_daily_loss_pct: Decimal,

    /// Drawdown from peak equity that halts new openings
    pub max_drawdown_pct: Decimal,
}

impl Default for RiskConfig {
    fn default() -> Self {
        Self {
            max_single_trade_risk_pct: dec!(0.02), // 2% per trade

            default_stop_loss_atr_multiplier: dec!(2.5),
            default_stop_loss_pct: dec!(0.025), // 2.5% fallback
            max_stop_loss_pct: dec!(0.025), // 2.5% ceiling
            min_stop_distance_pct: dec!(0.012), // 1.2% advisory minimum
            atr_timeframe: "4h".to_string(),

            breakeven_rr: dec!(1.0),
            trailing_rr: dec!(2.0),
            breakeven_buffer_pct: dec!(0.001), // 0.1%

            risk_band_medium_pct: dec!(1.0),
            risk_band_high_pct: dec!(1.5),

            major: SymbolClassLimits {
                max_notional: dec!(80),
                max_equity_ratio: dec!(0.85),
            },
            altcoin: SymbolClassLimits {
                max_notional: dec!(60),
                max_equity_ratio: dec!(0.60),
            },
            major_symbols: vec!["BTCUSDT".to_string(), "ETHUSDT".to_string()],

            min_position_size_usd: dec!(12), // 10 USDT + 20% margin
            min_exchange_notional: dec!(10),
            major_standard_min_size_usd: dec!(60),
            margin_headroom: dec!(0.99),

            max_daily_loss_pct: dec!(0.05),
            max_drawdown_pct: dec!(0.10),
        }
    }
}

impl RiskConfig {
    /// Classify a symbol using the configured majors.
    pub fn classify(&self, symbol: &str) -> SymbolClass {
        SymbolClass::classify(symbol, &self.major_symbols)
    }

    /// Caps for the class `symbol` belongs to.
    pub fn limits_for(&self, symbol: &str) -> &SymbolClassLimits {
        match self.classify(symbol) {
            SymbolClass::Major => &self.major,
            SymbolClass::Altcoin => &self.altcoin,
        }
    }

    /// Defaults overlaid with `GUARD_*` environment variables (and `.env`).
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();
        let mut cfg = Self::default();
        cfg.apply_overrides(|key| env::var(key).ok())?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// Parse a JSON config; missing fields keep their defaults.
    pub fn from_json_str(json: &str) -> Result<Self> {
        let cfg: Self = serde_json::from_str(json).context("invalid risk config JSON")?;
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read risk config {}", path.display()))?;
        Self::from_json_str(&raw)
    }

    /// Overlay values from `lookup`, keyed by `GUARD_*` variable name.
    fn apply_overrides<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let decimal_fields: [(&str, &mut Decimal); 20] = [
            ("GUARD_MAX_SINGLE_TRADE_RISK_PCT", &mut self.max_single_trade_risk_pct),
            ("GUARD_DEFAULT_STOP_LOSS_ATR_MULTIPLIER", &mut self.default_stop_loss_atr_multiplier),
            ("GUARD_DEFAULT_STOP_LOSS_PCT", &mut self.default_stop_loss_pct),
            ("GUARD_MAX_STOP_LOSS_PCT", &mut self.max_stop_loss_pct),
            ("GUARD_MIN_STOP_DISTANCE_PCT", &mut self.min_stop_distance_pct),
            ("GUARD_BREAKEVEN_RR", &mut self.breakeven_rr),
            ("GUARD_TRAILING_RR", &mut self.trailing_rr),
            ("GUARD_BREAKEVEN_BUFFER_PCT", &mut self.breakeven_buffer_pct),
            ("GUARD_RISK_BAND_MEDIUM_PCT", &mut self.risk_band_medium_pct),
            ("GUARD_RISK_BAND_HIGH_PCT", &mut self.risk_band_high_pct),
            ("GUARD_MAJOR_MAX_NOTIONAL", &mut self.major.max_notional),
            ("GUARD_MAJOR_MAX_EQUITY_RATIO", &mut self.major.max_equity_ratio),
            ("GUARD_ALTCOIN_MAX_NOTIONAL", &mut self.altcoin.max_notional),
            ("GUARD_ALTCOIN_MAX_EQUITY_RATIO", &mut self.altcoin.max_equity_ratio),
            ("GUARD_MIN_POSITION_SIZE_USD", &mut self.min_position_size_usd),
            ("GUARD_MIN_EXCHANGE_NOTIONAL", &mut self.min_exchange_notional),
            ("GUARD_MAJOR_STANDARD_MIN_SIZE_USD", &mut self.major_standard_min_size_usd),
            ("GUARD_MAX_DAILY_LOSS_PCT", &mut self.max_daily_loss_pct),
            ("GUARD_MAX_DRAWDOWN_PCT", &mut self.max_drawdown_pct),
            ("GUARD_MARGIN_HEADROOM", &mut self.margin_headroom),
        ];

        for (key, field) in decimal_fields {
            if let Some(raw) = lookup(key) {
                *field = parse_decimal(key, &raw)?;
            }
        }

        if let Some(raw) = lookup("GUARD_ATR_TIMEFRAME") {
            self.atr_timeframe = raw.trim().to_string();
        }
        if let Some(raw) = lookup("GUARD_MAJOR_SYMBOLS") {
            self.major_symbols = raw
                .split(',')
                .map(|s| s.trim().to_uppercase())
                .filter(|s| !s.is_empty())
                .collect();
        }

        Ok(())
    }

    /// Reject configurations that would make the risk math meaningless.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let fractions = [
            ("max_single_trade_risk_pct", self.max_single_trade_risk_pct),
            ("default_stop_loss_pct", self.default_stop_loss_pct),
            ("max_stop_loss_pct", self.max_stop_loss_pct),
            ("major.max_equity_ratio", self.major.max_equity_ratio),
            ("altcoin.max_equity_ratio", self.altcoin.max_equity_ratio),
            ("margin_headroom", self.margin_headroom),
            ("max_daily_loss_pct", self.max_daily_loss_pct),
            ("max_drawdown_pct", self.max_drawdown_pct),
        ];
        for (key, value) in fractions {
            if value <= Decimal::ZERO || value > Decimal::ONE {
                return Err(invalid(key, value, "must be in (0, 1]"));
            }
        }

        let positives = [
            ("default_stop_loss_atr_multiplier", self.default_stop_loss_atr_multiplier),
            ("breakeven_rr", self.breakeven_rr),
            ("major.max_notional", self.major.max_notional),
            ("altcoin.max_notional", self.altcoin.max_notional),
            ("min_exchange_notional", self.min_exchange_notional),
        ];
        for (key, value) in positives {
            if value <= Decimal::ZERO {
                return Err(invalid(key, value, "must be positive"));
            }
        }

        if self.min_stop_distance_pct < Decimal::ZERO {
            return Err(invalid("min_stop_distance_pct", self.min_stop_distance_pct, "must not be negative"));
        }
        if self.breakeven_buffer_pct < Decimal::ZERO {
            return Err(invalid("breakeven_buffer_pct", self.breakeven_buffer_pct, "must not be negative"));
        }
        if self.trailing_rr < self.breakeven_rr {
            return Err(invalid("trailing_rr", self.trailing_rr, "must be >= breakeven_rr"));
        }
        if self.risk_band_high_pct < self.risk_band_medium_pct {
            return Err(invalid("risk_band_high_pct", self.risk_band_high_pct, "must be >= risk_band_medium_pct"));
        }
        if self.min_position_size_usd < self.min_exchange_notional {
            return Err(invalid(
                "min_position_size_usd",
                self.min_position_size_usd,
                "must be >= min_exchange_notional",
            ));
        }
        if self.atr_timeframe.is_empty() {
            return Err(ConfigError::InvalidValue {
                key: "atr_timeframe".to_string(),
                value: String::new(),
                reason: "must not be empty".to_string(),
            });
        }

        Ok(())
    }
}

fn parse_decimal(key: &str, raw: &str) -> Result<Decimal, ConfigError> {
    Decimal::from_str(raw.trim()).map_err(|e| ConfigError::InvalidValue {
        key: key.to_string(),
        value: raw.to_string(),
        reason: e.to_string(),
    })
}

fn invalid(key: &str, value: Decimal, reason: &str) -> ConfigError {
    ConfigError::InvalidValue {
        key: key.to_string(),
        value: value.to_string(),
        reason: reason.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_defaults_are_valid() {
        let cfg = RiskConfig::default();
        assert!(cfg.validate().is_ok());
        assert_eq!(cfg.max_single_trade_risk_pct, dec!(0.02));
        assert_eq!(cfg.limits_for("BTCUSDT").max_notional, dec!(80));
        assert_eq!(cfg.limits_for("DOGEUSDT").max_notional, dec!(60));
    }

    #[test]
    fn test_env_overrides() {
        let vars: HashMap<&str, &str> = [
            ("GUARD_MAX_SINGLE_TRADE_RISK_PCT", "0.01"),
            ("GUARD_MAJOR_SYMBOLS", "btcusdt, ethusdt ,SOLUSDT"),
            ("GUARD_ATR_TIMEFRAME", "1h"),
        ]
        .into_iter()
        .collect();

        let mut cfg = RiskConfig::default();
        cfg.apply_overrides(|k| vars.get(k).map(|v| v.to_string())).unwrap();

        assert_eq!(cfg.max_single_trade_risk_pct, dec!(0.01));
        assert_eq!(cfg.major_symbols, vec!["BTCUSDT", "ETHUSDT", "SOLUSDT"]);
        assert_eq!(cfg.classify("SOLUSDT"), SymbolClass::Major);
        assert_eq!(cfg.atr_timeframe, "1h");
        // Untouched fields keep defaults
        assert_eq!(cfg.trailing_rr, dec!(2.0));
    }

    #[test]
    fn test_env_override_rejects_garbage() {
        let mut cfg = RiskConfig::default();
        let err = cfg
            .apply_overrides(|k| (k == "GUARD_TRAILING_RR").then(|| "two".to_string()))
            .unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue { ref key, .. } if key == "GUARD_TRAILING_RR"));
    }

    #[test]
    fn test_validate_rejects_inverted_thresholds() {
        let cfg = RiskConfig {
            breakeven_rr: dec!(2.0),
            trailing_rr: dec!(1.0),
            ..Default::default()
        };
        assert!(cfg.validate().is_err());

        let cfg = RiskConfig {
            max_single_trade_risk_pct: dec!(2),
            ..Default::default()
        };
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn test_json_partial_config_keeps_defaults() {
        let cfg = RiskConfig::from_json_str(
            r#"{"max_single_trade_risk_pct": 0.015, "major": {"max_notional": 100, "max_equity_ratio": 0.9}}"#,
        )
        .unwrap();
        assert_eq!(cfg.max_single_trade_risk_pct, dec!(0.015));
        assert_eq!(cfg.major.max_notional, dec!(100));
        assert_eq!(cfg.altcoin.max_notional, dec!(60));
    }

    #[test]
    fn test_leverage_limits() {
        let limits = LeverageLimits::new(10, 5);
        assert_eq!(limits.limit_for(SymbolClass::Major), 10);
        assert_eq!(limits.limit_for(SymbolClass::Altcoin), 5);
    }
}
