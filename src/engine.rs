//! Order lifecycle engine: places risk-gated orders, tracks them in the
//! shared registry, closes them and accounts realized P&L.
//!
//! The registry and the daily stats live behind one lock. Network calls to
//! the exchange happen outside the critical section; only the resulting
//! state transition is applied under the lock, so a placement, a close and a
//! monitor eviction can never interleave into an inconsistent view.

use std::collections::HashMap;
use std::sync::Arc;

use anyhow::{Context, Result};
use chrono::Utc;
use rust_decimal::Decimal;
use thiserror::Error;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

use crate::exchange::{ExchangeGateway, GatewayOrderState, InstrumentPrecision};
use crate::models::{Order, OrderStatus, Side, Signal};
use crate::notify::Notifier;
use crate::retry::RetryPolicy;
use crate::risk::{DailyStats, PositionSizer, RejectReason, RiskLimits, SafetyGate, SymbolTable};

/// Registry of live orders plus the daily counters. One lock domain: every
/// mutation of either goes through the same `RwLock` write guard.
struct TradeBook {
    orders: HashMap<String, Order>,
    daily: DailyStats,
    /// Placements admitted but not yet registered. Counted against the
    /// open-position bound so concurrent admissions cannot oversubscribe it.
    in_flight: usize,
}

/// Error surfaced by signal handling. Rejections carry the reason string for
/// the caller; exchange errors indicate exhausted retries or transport
/// failure with no registry mutation.
#[derive(Debug, Error)]
pub enum SignalError {
    #[error("{0}")]
    Rejected(#[from] RejectReason),

    #[error(transparent)]
    Exchange(#[from] anyhow::Error),
}

/// Successful placement summary returned to the webhook caller.
#[derive(Debug, Clone)]
pub struct PlacementReceipt {
    pub order: Order,
    pub trades_today: u32,
}

/// A completed close with its realized P&L.
#[derive(Debug, Clone)]
pub struct ClosedTrade {
    pub order_id: String,
    pub symbol: String,
    pub reason: String,
    pub exit_price: Decimal,
    pub pnl: Decimal,
}

/// Outcome of a force-close sweep.
#[derive(Debug, Clone, Copy, Default)]
pub struct CloseAllReport {
    pub closed: usize,
    pub failed: usize,
}

/// Risk-gated order lifecycle manager.
pub struct Engine {
    gateway: Arc<dyn ExchangeGateway>,
    notifier: Arc<Notifier>,
    gate: SafetyGate,
    retry: RetryPolicy,
    book: RwLock<TradeBook>,
    dry_run: bool,
}

impl Engine {
    pub fn new(
        gateway: Arc<dyn ExchangeGateway>,
        notifier: Arc<Notifier>,
        limits: RiskLimits,
        symbols: SymbolTable,
        retry: RetryPolicy,
        dry_run: bool,
    ) -> Self {
        Self {
            gateway,
            notifier,
            gate: SafetyGate::new(limits, symbols),
            retry,
            book: RwLock::new(TradeBook {
                orders: HashMap::new(),
                daily: DailyStats::new(Utc::now().date_naive()),
                in_flight: 0,
            }),
            dry_run,
        }
    }

    pub fn limits(&self) -> &RiskLimits {
        self.gate.limits()
    }

    pub fn gateway(&self) -> Arc<dyn ExchangeGateway> {
        Arc::clone(&self.gateway)
    }

    pub fn dry_run(&self) -> bool {
        self.dry_run
    }

    /// Full inbound path: admission gate, sizing, placement.
    pub async fn handle_signal(&self, signal: Signal) -> Result<PlacementReceipt, SignalError> {
        let balance = self
            .gateway
            .fetch_balance()
            .await
            .context("balance fetch failed")?;

        // Gate under the lock so the position count it reads is consistent
        // with the registry, and reserve the admitted slot in the same
        // acquisition: a concurrent signal sees this placement as in flight
        // and cannot push the registry past the bound. The daily rollover
        // fires inside evaluate.
        let symbol = {
            let mut book = self.book.write().await;
            let TradeBook {
                orders,
                daily,
                in_flight,
            } = &mut *book;
            let symbol = self.gate.evaluate(
                &signal,
                daily,
                &balance,
                orders.len() + *in_flight,
                Utc::now(),
            )?;
            *in_flight += 1;
            symbol
        };

        match self.size_and_place(&signal, &symbol, balance.free).await {
            Ok(receipt) => Ok(receipt),
            Err(e) => {
                // The reservation was never converted into a registry entry.
                self.book.write().await.in_flight -= 1;
                Err(e)
            }
        }
    }

    async fn size_and_place(
        &self,
        signal: &Signal,
        symbol: &str,
        free_balance: Decimal,
    ) -> Result<PlacementReceipt, SignalError> {
        let precision = self
            .gateway
            .instrument_precision(symbol)
            .await
            .context("precision lookup failed")?;

        let quantity = PositionSizer::new(self.gate.limits()).compute(
            signal.price,
            signal.stop_loss,
            free_balance,
            &precision,
        )?;

        let order = self
            .place(
                symbol,
                signal.action,
                quantity,
                signal.price,
                signal.stop_loss,
                signal.take_profit,
                &precision,
            )
            .await?;

        let trades_today = self.book.read().await.daily.trade_count;
        Ok(PlacementReceipt {
            order,
            trades_today,
        })
    }

    /// Submit a protective limit order and register it. On exhausted retries
    /// the registry is untouched: no partial entries.
    #[allow(clippy::too_many_arguments)]
    pub async fn place(
        &self,
        symbol: &str,
        side: Side,
        quantity: Decimal,
        entry_price: Decimal,
        sl_price: Decimal,
        tp_price: Decimal,
        precision: &InstrumentPrecision,
    ) -> Result<Order> {
        let slippage = self.gate.limits().slippage_pct;
        let raw_price = match side {
            Side::Buy => entry_price * (Decimal::ONE + slippage),
            Side::Sell => entry_price * (Decimal::ONE - slippage),
        };
        let limit_price = raw_price.round_dp(precision.price_dp);

        let report = self
            .retry
            .execute(|| {
                self.gateway
                    .create_limit_order(symbol, side, quantity, limit_price)
            })
            .await
            .context("order placement failed")?;

        let (status, filled_qty) = match report.state {
            GatewayOrderState::Open => (OrderStatus::Open, None),
            GatewayOrderState::Filled => {
                let filled = if report.filled_qty > Decimal::ZERO {
                    report.filled_qty
                } else {
                    quantity
                };
                (OrderStatus::Filled, Some(filled))
            }
            _ => (OrderStatus::Pending, None),
        };

        let order = Order {
            id: report.id,
            symbol: symbol.to_string(),
            side,
            requested_qty: quantity,
            entry_price: limit_price,
            sl_price,
            tp_price,
            created_at: Utc::now(),
            status,
            filled_qty,
        };

        {
            let mut book = self.book.write().await;
            book.in_flight = book.in_flight.saturating_sub(1);
            book.orders.insert(order.id.clone(), order.clone());
        }

        info!(
            order_id = %order.id,
            symbol,
            side = %side,
            %quantity,
            %limit_price,
            "order placed"
        );
        self.notifier.send_detached(format!(
            "🚀 <b>New Order</b>\n{} | {} | Qty: {} | Entry: ${}\nSL: ${} | TP: ${}",
            symbol,
            side.as_str().to_uppercase(),
            quantity,
            limit_price,
            sl_price,
            tp_price
        ));

        Ok(order)
    }

    /// Close an order with an opposite-side market order and account the
    /// realized P&L. The order is claimed out of the registry before the
    /// market order goes out, so two close paths racing on the same
    /// snapshot (a monitor tick and a force-close sweep) can never both
    /// submit for one position: the loser finds the claim gone and returns
    /// `Ok(None)` without touching the exchange. On gateway failure the
    /// claim is rolled back and the next monitor tick retries; P&L is
    /// recorded exactly once, on the first successful close.
    pub async fn close(&self, order: &Order, reason: &str) -> Result<Option<ClosedTrade>> {
        let ticker = self
            .gateway
            .fetch_ticker(&order.symbol)
            .await
            .context("price fetch failed")?;

        let Some(claimed) = self.book.write().await.orders.remove(&order.id) else {
            debug!(order_id = %order.id, "close skipped, order already claimed");
            return Ok(None);
        };

        let qty = claimed.close_qty();
        let close_side = claimed.side.opposite();

        let placed = self
            .retry
            .execute(|| {
                self.gateway
                    .create_market_order(&claimed.symbol, close_side, qty)
            })
            .await;
        if let Err(e) = placed {
            self.book
                .write()
                .await
                .orders
                .insert(claimed.id.clone(), claimed);
            return Err(e).context("close order failed");
        }

        let exit_price = ticker.last;
        let pnl = claimed.realized_pnl(exit_price, qty);
        self.book.write().await.daily.record_trade(pnl);

        info!(
            order_id = %claimed.id,
            symbol = %claimed.symbol,
            reason,
            %exit_price,
            %pnl,
            "position closed"
        );
        self.notifier.send_detached(format!(
            "{} <b>Closed</b> | {} | P&L: ${:.2} | {}",
            if pnl > Decimal::ZERO { "✅" } else { "❌" },
            reason,
            pnl,
            claimed.symbol
        ));

        Ok(Some(ClosedTrade {
            order_id: claimed.id,
            symbol: claimed.symbol,
            reason: reason.to_string(),
            exit_price,
            pnl,
        }))
    }

    /// Force-close every tracked order. Failed closes stay registered.
    pub async fn close_all(&self) -> CloseAllReport {
        let snapshot = self.snapshot().await;
        let mut report = CloseAllReport::default();

        for order in snapshot {
            match self.close(&order, "Manual Close").await {
                Ok(Some(_)) => report.closed += 1,
                // Claimed by a concurrent close between snapshot and here.
                Ok(None) => {}
                Err(e) => {
                    warn!(order_id = %order.id, error = %e, "force close failed");
                    report.failed += 1;
                }
            }
        }

        report
    }

    /// Cancel an order that aged past the fill timeout and evict it.
    pub async fn cancel_expired(&self, order: &Order) -> Result<()> {
        self.gateway
            .cancel_order(&order.id, &order.symbol)
            .await
            .context("cancel failed")?;

        self.book.write().await.orders.remove(&order.id);

        info!(
            order_id = %order.id,
            symbol = %order.symbol,
            "unfilled order cancelled after timeout"
        );
        self.notifier.send_detached(format!(
            "⏱ <b>Cancelled</b> | unfilled past timeout | {}",
            order.symbol
        ));
        Ok(())
    }

    /// Poll the gateway for a fill on a `Pending`/`Open` order. Returns the
    /// updated order when it transitioned to `Filled` this poll.
    pub async fn poll_fill(&self, order: &Order) -> Result<Option<Order>> {
        let report = self
            .gateway
            .fetch_order(&order.id, &order.symbol)
            .await
            .context("order status poll failed")?;

        match report.state {
            GatewayOrderState::Filled => {
                let mut book = self.book.write().await;
                if let Some(tracked) = book.orders.get_mut(&order.id) {
                    tracked.status = OrderStatus::Filled;
                    tracked.filled_qty = Some(if report.filled_qty > Decimal::ZERO {
                        report.filled_qty
                    } else {
                        tracked.requested_qty
                    });
                    info!(order_id = %order.id, "order filled");
                    return Ok(Some(tracked.clone()));
                }
                Ok(None)
            }
            GatewayOrderState::Open => {
                let mut book = self.book.write().await;
                if let Some(tracked) = book.orders.get_mut(&order.id) {
                    if tracked.status == OrderStatus::Pending {
                        tracked.status = OrderStatus::Open;
                    }
                }
                Ok(None)
            }
            GatewayOrderState::Cancelled => {
                // Cancelled exchange-side without a fill: nothing to account.
                self.book.write().await.orders.remove(&order.id);
                info!(order_id = %order.id, "order cancelled exchange-side");
                Ok(None)
            }
            GatewayOrderState::Submitted => Ok(None),
        }
    }

    /// Immutable copy of the registry, ordered by creation time.
    pub async fn snapshot(&self) -> Vec<Order> {
        let book = self.book.read().await;
        let mut orders: Vec<Order> = book.orders.values().cloned().collect();
        orders.sort_by_key(|o| o.created_at);
        orders
    }

    pub async fn open_count(&self) -> usize {
        self.book.read().await.orders.len()
    }

    pub async fn daily_stats(&self) -> DailyStats {
        self.book.read().await.daily.clone()
    }

    #[cfg(test)]
    pub(crate) async fn inject_order(&self, order: Order) {
        self.book
            .write()
            .await
            .orders
            .insert(order.id.clone(), order);
    }
}
