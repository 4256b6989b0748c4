//! Order model and lifecycle state machine.
//!
//! An [`Order`] is created on successful placement, lives in the engine's
//! registry while it is non-terminal, and is evicted only on a confirmed
//! `Closed` or `Cancelled` transition. Presence in the registry is therefore
//! equivalent to the order being non-terminal.

use chrono::{DateTime, Duration, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Order side on the exchange.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Side {
    Buy,
    Sell,
}

impl Side {
    /// The side that closes a position opened on this side.
    pub fn opposite(&self) -> Side {
        match self {
            Side::Buy => Side::Sell,
            Side::Sell => Side::Buy,
        }
    }

    /// Lowercase wire representation used by the exchange API.
    pub fn as_str(&self) -> &'static str {
        match self {
            Side::Buy => "buy",
            Side::Sell => "sell",
        }
    }
}

impl std::fmt::Display for Side {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Lifecycle status of a tracked order.
///
/// Valid transitions:
/// `Pending -> Open -> Filled -> Closed`, with `Pending|Open -> Cancelled`
/// when the order ages out unfilled. `Closed` and `Cancelled` are terminal.
/// SL/TP exit evaluation applies only in `Filled`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OrderStatus {
    /// Submitted, not yet confirmed resting on the book.
    Pending,
    /// Confirmed resting on the book, not yet filled.
    Open,
    /// Fully or partially filled; position is live and exit-monitored.
    Filled,
    /// Position closed by the engine; terminal.
    Closed,
    /// Cancelled before fill (timeout or exchange-side); terminal.
    Cancelled,
}

impl OrderStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, OrderStatus::Closed | OrderStatus::Cancelled)
    }

    /// Whether the order still awaits a fill report from the exchange.
    pub fn awaits_fill(&self) -> bool {
        matches!(self, OrderStatus::Pending | OrderStatus::Open)
    }
}

impl std::fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            OrderStatus::Pending => "pending",
            OrderStatus::Open => "open",
            OrderStatus::Filled => "filled",
            OrderStatus::Closed => "closed",
            OrderStatus::Cancelled => "cancelled",
        };
        f.write_str(s)
    }
}

/// A tracked exchange order with its protective exit levels.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Order {
    /// Exchange-assigned order id.
    pub id: String,
    /// Exchange symbol, e.g. `BTCUSDT`.
    pub symbol: String,
    pub side: Side,
    /// Quantity requested at placement.
    pub requested_qty: Decimal,
    /// Slippage-adjusted limit price the order was submitted at.
    pub entry_price: Decimal,
    pub sl_price: Decimal,
    pub tp_price: Decimal,
    pub created_at: DateTime<Utc>,
    pub status: OrderStatus,
    /// Quantity the exchange reported as filled, once known.
    pub filled_qty: Option<Decimal>,
}

impl Order {
    /// Age of the order relative to `now`.
    pub fn age(&self, now: DateTime<Utc>) -> Duration {
        now - self.created_at
    }

    /// Quantity to close: the reported fill, or the requested quantity when
    /// no fill amount was ever recorded.
    pub fn close_qty(&self) -> Decimal {
        self.filled_qty.unwrap_or(self.requested_qty)
    }

    /// Realized P&L for exiting this order at `exit_price`.
    pub fn realized_pnl(&self, exit_price: Decimal, qty: Decimal) -> Decimal {
        match self.side {
            Side::Buy => (exit_price - self.entry_price) * qty,
            Side::Sell => (self.entry_price - exit_price) * qty,
        }
    }
}
