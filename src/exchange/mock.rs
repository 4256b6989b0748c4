//! Scriptable in-memory gateway for engine and monitor tests.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};
use std::sync::Mutex;

use anyhow::Result;
use async_trait::async_trait;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;

use crate::models::Side;

use super::{Balance, ExchangeGateway, GatewayOrderState, InstrumentPrecision, OrderReport, Ticker};

/// Test double: every response is scripted through public fields.
pub struct MockGateway {
    pub balance: Mutex<Balance>,
    /// Last price per symbol; missing symbols fall back to 100.
    pub prices: Mutex<HashMap<String, Decimal>>,
    /// Reports returned by `fetch_order`, keyed by order id. Orders without
    /// an entry poll as resting/unfilled.
    pub poll_reports: Mutex<HashMap<String, OrderReport>>,
    /// State reported at limit-order placement time.
    pub place_state: Mutex<GatewayOrderState>,
    /// Number of limit-order attempts to fail before succeeding.
    pub limit_failures: AtomicU32,
    /// Symbols whose market orders always fail.
    pub fail_market_symbols: Mutex<HashSet<String>>,
    /// Record of market orders submitted (symbol, side, quantity).
    pub market_orders: Mutex<Vec<(String, Side, Decimal)>>,
    /// Record of cancelled order ids.
    pub cancelled: Mutex<Vec<String>>,
    next_id: AtomicU64,
}

impl MockGateway {
    pub fn new() -> Self {
        Self {
            balance: Mutex::new(Balance {
                free: dec!(1000),
                total: dec!(1000),
            }),
            prices: Mutex::new(HashMap::new()),
            poll_reports: Mutex::new(HashMap::new()),
            place_state: Mutex::new(GatewayOrderState::Submitted),
            limit_failures: AtomicU32::new(0),
            fail_market_symbols: Mutex::new(HashSet::new()),
            market_orders: Mutex::new(Vec::new()),
            cancelled: Mutex::new(Vec::new()),
            next_id: AtomicU64::new(1),
        }
    }

    pub fn set_price(&self, symbol: &str, price: Decimal) {
        self.prices
            .lock()
            .unwrap()
            .insert(symbol.to_string(), price);
    }

    pub fn script_poll(&self, id: &str, state: GatewayOrderState, filled_qty: Decimal) {
        self.poll_reports.lock().unwrap().insert(
            id.to_string(),
            OrderReport {
                id: id.to_string(),
                state,
                filled_qty,
            },
        );
    }
}

#[async_trait]
impl ExchangeGateway for MockGateway {
    async fn fetch_balance(&self) -> Result<Balance> {
        Ok(*self.balance.lock().unwrap())
    }

    async fn fetch_ticker(&self, symbol: &str) -> Result<Ticker> {
        let last = self
            .prices
            .lock()
            .unwrap()
            .get(symbol)
            .copied()
            .unwrap_or(dec!(100));
        Ok(Ticker {
            symbol: symbol.to_string(),
            last,
        })
    }

    async fn create_limit_order(
        &self,
        _symbol: &str,
        _side: Side,
        quantity: Decimal,
        _price: Decimal,
    ) -> Result<OrderReport> {
        let remaining = self.limit_failures.load(Ordering::SeqCst);
        if remaining > 0 {
            self.limit_failures.store(remaining - 1, Ordering::SeqCst);
            anyhow::bail!("simulated limit-order failure");
        }
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        let state = *self.place_state.lock().unwrap();
        Ok(OrderReport {
            id: format!("MOCK-{}", id),
            state,
            filled_qty: match state {
                GatewayOrderState::Filled => quantity,
                _ => Decimal::ZERO,
            },
        })
    }

    async fn create_market_order(
        &self,
        symbol: &str,
        side: Side,
        quantity: Decimal,
    ) -> Result<OrderReport> {
        if self.fail_market_symbols.lock().unwrap().contains(symbol) {
            anyhow::bail!("simulated market-order failure for {}", symbol);
        }
        self.market_orders
            .lock()
            .unwrap()
            .push((symbol.to_string(), side, quantity));
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        Ok(OrderReport {
            id: format!("MOCK-{}", id),
            state: GatewayOrderState::Filled,
            filled_qty: quantity,
        })
    }

    async fn fetch_order(&self, id: &str, _symbol: &str) -> Result<OrderReport> {
        Ok(self
            .poll_reports
            .lock()
            .unwrap()
            .get(id)
            .cloned()
            .unwrap_or(OrderReport {
                id: id.to_string(),
                state: GatewayOrderState::Open,
                filled_qty: Decimal::ZERO,
            }))
    }

    async fn cancel_order(&self, id: &str, _symbol: &str) -> Result<()> {
        self.cancelled.lock().unwrap().push(id.to_string());
        Ok(())
    }

    async fn instrument_precision(&self, _symbol: &str) -> Result<InstrumentPrecision> {
        Ok(InstrumentPrecision {
            amount_dp: 4,
            price_dp: 2,
            min_notional: dec!(1),
        })
    }
}
