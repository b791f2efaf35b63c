//! Account balances supplied by the account subsystem.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Snapshot of the trading account.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AccountState {
    /// Total equity including unrealized PnL
    pub equity: Decimal,

    /// Balance free to post as margin
    pub available_balance: Decimal,
}

impl AccountState {
    pub fn new(equity: Decimal, available_balance: Decimal) -> Self {
        Self {
            equity,
            available_balance,
        }
    }
}
