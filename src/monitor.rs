//! Periodic order monitor: fill detection, timeout cancellation and SL/TP
//! exit enforcement.
//!
//! Each tick works on an immutable snapshot of the registry, so new
//! placements never race the iteration. Ticks are strictly serial: a slow
//! tick (including its retries) delays the next one but never overlaps it.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use anyhow::Result;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use tokio::time::interval;
use tracing::{debug, error, warn};

use crate::engine::Engine;
use crate::models::{Order, OrderStatus, Side};

/// Evaluate SL/TP exit conditions for a filled order at the current price.
/// Long positions exit on `price <= sl` or `price >= tp`; shorts mirror the
/// inequalities.
pub fn exit_trigger(order: &Order, price: Decimal) -> Option<&'static str> {
    match order.side {
        Side::Buy => {
            if price <= order.sl_price {
                Some("Stop Loss Hit")
            } else if price >= order.tp_price {
                Some("Take Profit Hit")
            } else {
                None
            }
        }
        Side::Sell => {
            if price >= order.sl_price {
                Some("Stop Loss Hit")
            } else if price <= order.tp_price {
                Some("Take Profit Hit")
            } else {
                None
            }
        }
    }
}

/// Background scheduler driving the order lifecycle.
pub struct Monitor {
    engine: Arc<Engine>,
    shutdown: Arc<AtomicBool>,
}

impl Monitor {
    pub fn new(engine: Arc<Engine>, shutdown: Arc<AtomicBool>) -> Self {
        Self { engine, shutdown }
    }

    /// Serial tick loop. Runs until the shutdown flag is set.
    pub async fn run(self) {
        let mut ticker = interval(self.engine.limits().monitor_interval);
        loop {
            ticker.tick().await;
            if self.shutdown.load(Ordering::SeqCst) {
                break;
            }
            if let Err(e) = self.tick().await {
                error!(error = %e, "monitor tick failed");
            }
        }
        debug!("monitor stopped");
    }

    /// One pass over a snapshot of the registry. Per-order failures are
    /// logged and skipped; the remaining orders still get processed.
    pub async fn tick(&self) -> Result<()> {
        let now = Utc::now();
        let snapshot = self.engine.snapshot().await;

        for order in snapshot {
            if let Err(e) = self.process_order(order, now).await {
                warn!(error = %e, "order processing failed this tick");
            }
        }
        Ok(())
    }

    async fn process_order(&self, mut order: Order, now: DateTime<Utc>) -> Result<()> {
        // Timeout cancellation applies only while a fill is still awaited;
        // the state machine has no cancel edge out of Filled.
        if order.status.awaits_fill() {
            let timeout = chrono::Duration::from_std(self.engine.limits().order_timeout)
                .unwrap_or(chrono::Duration::MAX);
            if order.age(now) > timeout {
                return self.engine.cancel_expired(&order).await;
            }

            match self.engine.poll_fill(&order).await? {
                Some(updated) => order = updated,
                // Not filled yet: exit checks do not apply, even if price
                // has already crossed a trigger.
                None => return Ok(()),
            }
        }

        if order.status == OrderStatus::Filled {
            let ticker = self.engine.gateway().fetch_ticker(&order.symbol).await?;
            if let Some(reason) = exit_trigger(&order, ticker.last) {
                if let Some(closed) = self.engine.close(&order, reason).await? {
                    debug!(
                        order_id = %closed.order_id,
                        symbol = %closed.symbol,
                        reason = %closed.reason,
                        exit_price = %closed.exit_price,
                        pnl = %closed.pnl,
                        "exit order executed"
                    );
                }
            }
        }

        Ok(())
    }
}
