//! Trade guardrail CLI
//!
//! Offline inspection tool: parse model responses, run the full guardrail
//! against account and market fixtures, and review stop losses.

use std::collections::HashMap;
use std::io::Read;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::de::DeserializeOwned;
use serde_json::json;
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

use llm_trade_guard::{
    AccountRiskState, AccountState, GuardedBatch, Guardrail, LeverageLimits, MarketSnapshot,
    PositionInfo, ResponseParser, RiskConfig,
};

/// Risk guardrail for LLM trading decisions.
#[derive(Parser)]
#[command(name = "tradeguard")]
#[command(about = "Parse, validate and size LLM trading decisions", long_about = None)]
struct Cli {
    /// Log level (trace, debug, info, warn, error)
    #[arg(short, long, default_value = "info", global = true)]
    log_level: String,

    /// Risk config JSON file (defaults plus GUARD_* env vars if omitted)
    #[arg(short, long, global = true, env = "GUARD_CONFIG")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Parse a model response into reasoning and decisions
    Parse {
        /// Response file (stdin if omitted)
        #[arg(short, long)]
        input: Option<PathBuf>,
    },

    /// Run a model response through validation and sizing
    Evaluate {
        /// Response file (stdin if omitted)
        #[arg(short, long)]
        input: Option<PathBuf>,

        /// Market snapshots JSON (array)
        #[arg(short, long)]
        market: PathBuf,

        /// Account equity in USDT
        #[arg(long)]
        equity: Decimal,

        /// Available balance in USDT
        #[arg(long)]
        available: Decimal,

        /// Max leverage for major symbols
        #[arg(long, default_value = "10")]
        major_leverage: u32,

        /// Max leverage for altcoins
        #[arg(long, default_value = "5")]
        altcoin_leverage: u32,

        /// Open positions JSON (array)
        #[arg(short, long)]
        positions: Option<PathBuf>,

        /// Daily account risk state JSON
        #[arg(long)]
        risk_state: Option<PathBuf>,
    },

    /// Review stop losses of open positions
    Manage {
        /// Open positions JSON (array)
        #[arg(short, long)]
        positions: PathBuf,

        /// Market snapshots JSON (array)
        #[arg(short, long)]
        market: PathBuf,
    },

    /// Show current risk configuration
    Config,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Setup logging
    let log_level = match cli.log_level.to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };

    let subscriber = FmtSubscriber::builder()
        .with_max_level(log_level)
        .with_target(false)
        .with_writer(std::io::stderr)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let config = load_config(cli.config.as_deref())?;

    match cli.command {
        Commands::Parse { input } => {
            let raw = read_input(input.as_deref())?;
            let parsed = ResponseParser::default().parse(&raw);
            println!("{}", serde_json::to_string_pretty(&parsed)?);
        }

        Commands::Evaluate {
            input,
            market,
            equity,
            available,
            major_leverage,
            altcoin_leverage,
            positions,
            risk_state,
        } => {
            let raw = read_input(input.as_deref())?;
            let snapshots = load_snapshots(&market)?;
            let positions: Vec<PositionInfo> = match positions {
                Some(path) => load_json(&path)?,
                None => Vec::new(),
            };
            let risk_state: Option<AccountRiskState> = match risk_state {
                Some(path) => Some(load_json(&path)?),
                None => None,
            };

            let guardrail = Guardrail::new(config, LeverageLimits::new(major_leverage, altcoin_leverage));
            let account = AccountState::new(equity, available);
            let batch = guardrail.process(&raw, &account, &positions, &snapshots, risk_state.as_ref());

            info!(batch_id = %batch.batch_id, accepted = batch.is_accepted(), "Evaluation complete");
            println!("{}", serde_json::to_string_pretty(&batch_report(&batch))?);
        }

        Commands::Manage { positions, market } => {
            let positions: Vec<PositionInfo> = load_json(&positions)?;
            let snapshots = load_snapshots(&market)?;

            let guardrail = Guardrail::new(config, LeverageLimits::default());
            let reviews = guardrail.manage_positions(&positions, &snapshots);

            println!(
                "\n{:<12} {:<14} {:>8} {:<18} {:>14}",
                "SYMBOL", "STAGE", "R:R", "ACTION", "NEW STOP"
            );
            println!("{}", "-".repeat(70));

            for r in &reviews {
                let rr = r.rr.map(|v| format!("{:.2}", v)).unwrap_or_else(|| "-".to_string());
                let (action, price) = if r.action.is_update() {
                    ("update_stop_loss", r.action.new_price.to_string())
                } else {
                    ("none", "-".to_string())
                };
                println!(
                    "{:<12} {:<14} {:>8} {:<18} {:>14}",
                    r.symbol,
                    r.stage.as_str(),
                    rr,
                    action,
                    price
                );
                if !r.action.reason.is_empty() {
                    println!("  {}", r.action.reason);
                }
            }
        }

        Commands::Config => {
            let pct = |v: Decimal| (v * dec!(100)).normalize();

            println!("\n=== Risk Configuration ===\n");
            println!("Per-Trade Risk:");
            println!("  Max Single Trade Risk: {}%", pct(config.max_single_trade_risk_pct));
            println!("  Risk Bands:            medium > {}%, high > {}%", config.risk_band_medium_pct, config.risk_band_high_pct);

            println!("\nStop Loss:");
            println!("  ATR Multiplier:        {}x ({})", config.default_stop_loss_atr_multiplier, config.atr_timeframe);
            println!("  Default Distance:      {}%", pct(config.default_stop_loss_pct));
            println!("  Max Distance:          {}%", pct(config.max_stop_loss_pct));
            println!("  Min Distance (warn):   {}%", pct(config.min_stop_distance_pct));
            println!("  Breakeven At:          {}R (+{}% buffer)", config.breakeven_rr, pct(config.breakeven_buffer_pct));
            println!("  Trailing At:           {}R", config.trailing_rr);

            println!("\nPosition Size:");
            println!("  Majors:                {}", config.major_symbols.join(", "));
            println!("  Major Cap:             ${} / {}% of equity", config.major.max_notional, pct(config.major.max_equity_ratio));
            println!("  Altcoin Cap:           ${} / {}% of equity", config.altcoin.max_notional, pct(config.altcoin.max_equity_ratio));
            println!("  Min Position:          ${}", config.min_position_size_usd);
            println!("  Min Exchange Notional: ${}", config.min_exchange_notional);
            println!("  Major Standard Min:    ${}", config.major_standard_min_size_usd);
            println!("  Margin Headroom:       {}", config.margin_headroom);

            println!("\nAccount:");
            println!("  Max Daily Loss:        {}%", pct(config.max_daily_loss_pct));
            println!("  Max Drawdown:          {}%", pct(config.max_drawdown_pct));
        }
    }

    Ok(())
}

fn load_config(path: Option<&Path>) -> Result<RiskConfig> {
    match path {
        Some(path) => RiskConfig::from_json_file(path),
        None => RiskConfig::from_env().context("invalid GUARD_* environment configuration"),
    }
}

fn read_input(path: Option<&Path>) -> Result<String> {
    match path {
        Some(path) => std::fs::read_to_string(path)
            .with_context(|| format!("failed to read {}", path.display())),
        None => {
            let mut buf = String::new();
            std::io::stdin()
                .read_to_string(&mut buf)
                .context("failed to read stdin")?;
            Ok(buf)
        }
    }
}

fn load_json<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read {}", path.display()))?;
    serde_json::from_str(&raw).with_context(|| format!("invalid JSON in {}", path.display()))
}

fn load_snapshots(path: &Path) -> Result<HashMap<String, MarketSnapshot>> {
    let list: Vec<MarketSnapshot> = load_json(path)?;
    Ok(list.into_iter().map(|s| (s.symbol.clone(), s)).collect())
}

fn batch_report(batch: &GuardedBatch) -> serde_json::Value {
    let orders: Vec<_> = batch
        .orders
        .iter()
        .map(|o| match &o.result {
            Ok(order) => json!({ "index": o.index, "symbol": o.symbol, "order": order }),
            Err(err) => json!({ "index": o.index, "symbol": o.symbol, "error": err.to_string() }),
        })
        .collect();

    json!({
        "batch_id": batch.batch_id,
        "parsed_at": batch.parsed_at,
        "reasoning": batch.reasoning,
        "decisions": batch.decisions,
        "used_fallback": batch.used_fallback,
        "parse_error": batch.parse_error.as_ref().map(|e| e.to_string()),
        "accepted": batch.is_accepted(),
        "rejection": batch.validation.as_ref().err().map(|e| e.to_string()),
        "halt": batch.halt.as_ref().map(|h| h.to_string()),
        "orders": orders,
    })
}
