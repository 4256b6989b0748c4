//! Abstract exchange gateway consumed by the engine and monitor.

use anyhow::Result;
use async_trait::async_trait;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::models::Side;

/// Quote-currency balance snapshot.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct Balance {
    pub free: Decimal,
    pub total: Decimal,
}

/// Last-traded price for a symbol.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Ticker {
    pub symbol: String,
    pub last: Decimal,
}

/// Quantity/price precision and minimum order size for an instrument.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct InstrumentPrecision {
    /// Decimal places for order quantity.
    pub amount_dp: u32,
    /// Decimal places for order price.
    pub price_dp: u32,
    /// Minimum order notional the exchange accepts.
    pub min_notional: Decimal,
}

/// Exchange-side order state as reported by the gateway.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GatewayOrderState {
    /// Accepted but not yet resting.
    Submitted,
    /// Resting on the book.
    Open,
    /// Fully executed.
    Filled,
    /// Cancelled exchange-side.
    Cancelled,
}

/// Gateway report for a placed or polled order.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderReport {
    pub id: String,
    pub state: GatewayOrderState,
    pub filled_qty: Decimal,
}

/// Remote exchange operations the core depends on. Every call carries its
/// own network timeout so a hung request cannot stall the monitor loop.
#[async_trait]
pub trait ExchangeGateway: Send + Sync {
    async fn fetch_balance(&self) -> Result<Balance>;

    async fn fetch_ticker(&self, symbol: &str) -> Result<Ticker>;

    async fn create_limit_order(
        &self,
        symbol: &str,
        side: Side,
        quantity: Decimal,
        price: Decimal,
    ) -> Result<OrderReport>;

    async fn create_market_order(
        &self,
        symbol: &str,
        side: Side,
        quantity: Decimal,
    ) -> Result<OrderReport>;

    async fn fetch_order(&self, id: &str, symbol: &str) -> Result<OrderReport>;

    async fn cancel_order(&self, id: &str, symbol: &str) -> Result<()>;

    async fn instrument_precision(&self, symbol: &str) -> Result<InstrumentPrecision>;
}
