//! Admission control for incoming signals.
//!
//! Checks run in a fixed order and short-circuit on the first failure:
//! master switch, daily loss, open-position count, symbol allow-list,
//! reserve balance, trading hours. The daily-stats rollover fires between
//! the first and second check so it happens exactly once per new day no
//! matter which check would otherwise fail.

use chrono::{DateTime, Timelike, Utc};

use crate::exchange::Balance;
use crate::models::Signal;

use super::{DailyStats, RejectReason, RiskLimits, SymbolTable};

/// Signal admission gate. Reads daily stats and the open-position count but
/// owns neither.
pub struct SafetyGate {
    limits: RiskLimits,
    symbols: SymbolTable,
}

impl SafetyGate {
    pub fn new(limits: RiskLimits, symbols: SymbolTable) -> Self {
        Self { limits, symbols }
    }

    pub fn limits(&self) -> &RiskLimits {
        &self.limits
    }

    /// Evaluate a signal against every admission check. Returns the
    /// translated exchange symbol on success.
    pub fn evaluate(
        &self,
        signal: &Signal,
        stats: &mut DailyStats,
        balance: &Balance,
        open_position_count: usize,
        now: DateTime<Utc>,
    ) -> Result<String, RejectReason> {
        if !self.limits.trading_enabled {
            return Err(RejectReason::TradingDisabled);
        }

        // Rollover before the loss check, so a stale date never blocks a
        // fresh day on yesterday's losses.
        stats.reset_if_new_day(now.date_naive());

        if stats.pnl.abs() >= self.limits.max_daily_loss {
            return Err(RejectReason::DailyLossLimit {
                pnl: stats.pnl,
                limit: self.limits.max_daily_loss,
            });
        }

        if open_position_count >= self.limits.max_open_positions {
            return Err(RejectReason::MaxPositionsReached {
                open: open_position_count,
                max: self.limits.max_open_positions,
            });
        }

        let symbol = self.symbols.translate(&signal.symbol);
        if !self.limits.allowed_symbols.iter().any(|s| s == &symbol) {
            return Err(RejectReason::SymbolNotAllowed { symbol });
        }

        if balance.free < self.limits.min_reserve_balance {
            return Err(RejectReason::InsufficientBalance {
                free: balance.free,
                reserve: self.limits.min_reserve_balance,
            });
        }

        if !self.limits.trade_24_7 {
            let hour = now.hour();
            if self.limits.restricted_hours.contains(&hour) {
                return Err(RejectReason::OutsideTradingHours { hour });
            }
        }

        Ok(symbol)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Side;
    use chrono::TimeZone;
    use rust_decimal::Decimal;
    use rust_decimal_macros::dec;

    fn signal() -> Signal {
        Signal {
            symbol: "BTCUSD".to_string(),
            action: Side::Buy,
            price: dec!(100),
            stop_loss: dec!(98),
            take_profit: dec!(104),
        }
    }

    fn gate(limits: RiskLimits) -> SafetyGate {
        SafetyGate::new(limits, SymbolTable::builtin())
    }

    fn balance(free: Decimal) -> Balance {
        Balance {
            free,
            total: free,
        }
    }

    #[test]
    fn admits_valid_signal() {
        let gate = gate(RiskLimits::default());
        let mut stats = DailyStats::new(Utc::now().date_naive());
        let symbol = gate
            .evaluate(&signal(), &mut stats, &balance(dec!(100)), 0, Utc::now())
            .unwrap();
        assert_eq!(symbol, "BTCUSDT");
    }

    #[test]
    fn master_switch_rejects_first() {
        let gate = gate(RiskLimits {
            trading_enabled: false,
            ..RiskLimits::default()
        });
        let mut stats = DailyStats::new(Utc::now().date_naive());
        let err = gate
            .evaluate(&signal(), &mut stats, &balance(dec!(100)), 0, Utc::now())
            .unwrap_err();
        assert_eq!(err, RejectReason::TradingDisabled);
    }

    #[test]
    fn daily_loss_breach_rejects() {
        let gate = gate(RiskLimits::default());
        let mut stats = DailyStats::new(Utc::now().date_naive());
        stats.record_trade(dec!(-30));
        let err = gate
            .evaluate(&signal(), &mut stats, &balance(dec!(100)), 0, Utc::now())
            .unwrap_err();
        assert!(matches!(err, RejectReason::DailyLossLimit { .. }));
    }

    #[test]
    fn rollover_fires_even_when_a_later_check_fails() {
        let gate = gate(RiskLimits::default());
        // Stats from yesterday, over the loss limit.
        let yesterday = Utc::now().date_naive().pred_opt().unwrap();
        let mut stats = DailyStats::new(yesterday);
        stats.record_trade(dec!(-30));

        // Position-count check fails, but the rollover already reset P&L.
        let err = gate
            .evaluate(&signal(), &mut stats, &balance(dec!(100)), 99, Utc::now())
            .unwrap_err();
        assert!(matches!(err, RejectReason::MaxPositionsReached { .. }));
        assert_eq!(stats.pnl, Decimal::ZERO);
        assert_eq!(stats.date, Utc::now().date_naive());
    }

    #[test]
    fn position_cap_rejects() {
        let gate = gate(RiskLimits {
            max_open_positions: 2,
            ..RiskLimits::default()
        });
        let mut stats = DailyStats::new(Utc::now().date_naive());
        let err = gate
            .evaluate(&signal(), &mut stats, &balance(dec!(100)), 2, Utc::now())
            .unwrap_err();
        assert!(matches!(err, RejectReason::MaxPositionsReached { .. }));
    }

    #[test]
    fn disallowed_symbol_rejects_with_translated_name() {
        let gate = gate(RiskLimits::default());
        let mut stats = DailyStats::new(Utc::now().date_naive());
        let mut sig = signal();
        sig.symbol = "SHIBUSD".to_string();
        let err = gate
            .evaluate(&sig, &mut stats, &balance(dec!(100)), 0, Utc::now())
            .unwrap_err();
        assert_eq!(
            err,
            RejectReason::SymbolNotAllowed {
                symbol: "SHIBUSDT".to_string()
            }
        );
    }

    #[test]
    fn low_balance_rejects() {
        let gate = gate(RiskLimits::default());
        let mut stats = DailyStats::new(Utc::now().date_naive());
        let err = gate
            .evaluate(&signal(), &mut stats, &balance(dec!(5)), 0, Utc::now())
            .unwrap_err();
        assert!(matches!(err, RejectReason::InsufficientBalance { .. }));
    }

    #[test]
    fn restricted_hour_rejects_when_not_24_7() {
        let gate = gate(RiskLimits {
            trade_24_7: false,
            restricted_hours: vec![3],
            ..RiskLimits::default()
        });
        let mut stats = DailyStats::new(Utc.with_ymd_and_hms(2026, 8, 29, 3, 0, 0).unwrap().date_naive());
        let now = Utc.with_ymd_and_hms(2026, 8, 29, 3, 15, 0).unwrap();
        let err = gate
            .evaluate(&signal(), &mut stats, &balance(dec!(100)), 0, now)
            .unwrap_err();
        assert_eq!(err, RejectReason::OutsideTradingHours { hour: 3 });
    }
}
