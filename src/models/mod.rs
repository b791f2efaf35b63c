//! Data models for decisions, positions, market snapshots, and account state.

mod account;
mod decision;
mod market;
mod position;

pub use account::AccountState;
pub use decision::{Action, Decision};
pub use market::{MarketSnapshot, SymbolClass};
pub use position::{PositionInfo, PositionSide};
