//! Risk controls: admission gate, position sizing, daily loss tracking.

mod config;
mod daily;
mod safety;
mod sizer;

pub use config::{RiskLimits, SymbolTable};
pub use daily::DailyStats;
pub use safety::SafetyGate;
pub use sizer::PositionSizer;

use rust_decimal::Decimal;
use thiserror::Error;

/// Why a signal was refused before any order action. Surfaced verbatim to
/// the webhook caller.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RejectReason {
    #[error("trading is disabled")]
    TradingDisabled,

    #[error("daily loss limit reached: {pnl} of {limit}")]
    DailyLossLimit { pnl: Decimal, limit: Decimal },

    #[error("max open positions reached: {open} of {max}")]
    MaxPositionsReached { open: usize, max: usize },

    #[error("symbol not allowed: {symbol}")]
    SymbolNotAllowed { symbol: String },

    #[error("insufficient balance: {free} free, {reserve} reserved")]
    InsufficientBalance { free: Decimal, reserve: Decimal },

    #[error("trading restricted at hour {hour}")]
    OutsideTradingHours { hour: u32 },

    #[error("invalid stop distance")]
    InvalidStopDistance,

    #[error("order size too small: {notional} below exchange minimum {minimum}")]
    OrderTooSmall { notional: Decimal, minimum: Decimal },
}
