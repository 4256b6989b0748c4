//! Rolling per-day P&L and trade counters with date-rollover reset.

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::info;

/// Daily trading statistics. One process-wide instance, owned by the engine's
/// lock domain: read by the safety gate, written only when a close succeeds.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DailyStats {
    pub date: NaiveDate,
    pub pnl: Decimal,
    pub trade_count: u32,
    pub wins: u32,
    pub losses: u32,
}

impl DailyStats {
    pub fn new(date: NaiveDate) -> Self {
        Self {
            date,
            pnl: Decimal::ZERO,
            trade_count: 0,
            wins: 0,
            losses: 0,
        }
    }

    /// Zero all counters when the wall-clock date has advanced past the
    /// stored date. Idempotent within a single day.
    pub fn reset_if_new_day(&mut self, today: NaiveDate) {
        if today > self.date {
            info!(date = %today, "daily tracker reset");
            self.pnl = Decimal::ZERO;
            self.trade_count = 0;
            self.wins = 0;
            self.losses = 0;
            self.date = today;
        }
    }

    /// Record one closed trade's realized P&L.
    pub fn record_trade(&mut self, pnl: Decimal) {
        self.trade_count += 1;
        if pnl > Decimal::ZERO {
            self.wins += 1;
        } else {
            self.losses += 1;
        }
        self.pnl += pnl;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn day(s: &str) -> NaiveDate {
        s.parse().unwrap()
    }

    #[test]
    fn same_day_reset_is_idempotent() {
        let mut stats = DailyStats::new(day("2026-08-29"));
        stats.record_trade(dec!(5));
        stats.reset_if_new_day(day("2026-08-29"));
        stats.reset_if_new_day(day("2026-08-29"));
        assert_eq!(stats.trade_count, 1);
        assert_eq!(stats.pnl, dec!(5));
    }

    #[test]
    fn date_advance_zeroes_all_counters_once() {
        let mut stats = DailyStats::new(day("2026-08-29"));
        stats.record_trade(dec!(5));
        stats.record_trade(dec!(-3));
        assert_eq!(stats.wins, 1);
        assert_eq!(stats.losses, 1);

        stats.reset_if_new_day(day("2026-08-30"));
        assert_eq!(stats.pnl, Decimal::ZERO);
        assert_eq!(stats.trade_count, 0);
        assert_eq!(stats.wins, 0);
        assert_eq!(stats.losses, 0);
        assert_eq!(stats.date, day("2026-08-30"));
    }

    #[test]
    fn zero_pnl_counts_as_loss() {
        let mut stats = DailyStats::new(day("2026-08-29"));
        stats.record_trade(Decimal::ZERO);
        assert_eq!(stats.losses, 1);
        assert_eq!(stats.wins, 0);
    }
}
