//! Position sizing: converts entry/stop distance and free balance into an
//! order quantity under the configured risk caps.

use rust_decimal::{Decimal, RoundingStrategy};
use tracing::debug;

use crate::exchange::InstrumentPrecision;

use super::{RejectReason, RiskLimits};

/// Risk-based position size calculator. Stateless; reads limits and a
/// balance snapshot per call.
pub struct PositionSizer<'a> {
    limits: &'a RiskLimits,
}

impl<'a> PositionSizer<'a> {
    pub fn new(limits: &'a RiskLimits) -> Self {
        Self { limits }
    }

    /// Compute the order quantity for a trade entering at `entry_price` with
    /// a stop at `stop_loss_price`, given the current free balance.
    ///
    /// Clamp order is fixed: risk cap, position cap, capital cap, precision
    /// rounding (down), then the exchange minimum-notional check.
    pub fn compute(
        &self,
        entry_price: Decimal,
        stop_loss_price: Decimal,
        free_balance: Decimal,
        precision: &InstrumentPrecision,
    ) -> Result<Decimal, RejectReason> {
        let limits = self.limits;

        if free_balance <= limits.min_reserve_balance {
            return Err(RejectReason::InsufficientBalance {
                free: free_balance,
                reserve: limits.min_reserve_balance,
            });
        }
        let available_capital = free_balance - limits.min_reserve_balance;

        let mut risk_amount = available_capital * limits.risk_per_trade_pct;
        if let Some(ceiling) = limits.risk_amount_ceiling {
            risk_amount = risk_amount.min(ceiling);
        }

        let sl_distance_pct = (entry_price - stop_loss_price).abs() / entry_price;
        if sl_distance_pct <= Decimal::ZERO {
            return Err(RejectReason::InvalidStopDistance);
        }

        let mut notional = risk_amount / sl_distance_pct;
        notional = notional.min(limits.max_position_notional);
        notional = notional.min(available_capital * limits.capital_cap_fraction);

        let quantity = (notional / entry_price)
            .round_dp_with_strategy(precision.amount_dp, RoundingStrategy::ToZero);

        let rounded_notional = quantity * entry_price;
        if rounded_notional < precision.min_notional {
            return Err(RejectReason::OrderTooSmall {
                notional: rounded_notional,
                minimum: precision.min_notional,
            });
        }

        debug!(
            %entry_price,
            %stop_loss_price,
            %risk_amount,
            %notional,
            %quantity,
            "position size computed"
        );

        Ok(quantity)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn precision() -> InstrumentPrecision {
        InstrumentPrecision {
            amount_dp: 4,
            price_dp: 2,
            min_notional: dec!(1),
        }
    }

    fn limits() -> RiskLimits {
        RiskLimits {
            min_reserve_balance: dec!(10),
            max_position_notional: dec!(100),
            risk_per_trade_pct: dec!(0.02),
            risk_amount_ceiling: Some(dec!(2)),
            capital_cap_fraction: dec!(0.8),
            ..RiskLimits::default()
        }
    }

    #[test]
    fn notional_never_exceeds_caps() {
        let limits = limits();
        let sizer = PositionSizer::new(&limits);
        // Tight stop would imply a huge notional without the caps.
        let qty = sizer
            .compute(dec!(100), dec!(99.9), dec!(1000), &precision())
            .unwrap();
        let notional = qty * dec!(100);
        assert!(notional <= limits.max_position_notional);
        assert!(notional <= (dec!(1000) - dec!(10)) * dec!(0.8));
    }

    #[test]
    fn zero_stop_distance_rejected_regardless_of_balance() {
        let limits = limits();
        let sizer = PositionSizer::new(&limits);
        let err = sizer
            .compute(dec!(100), dec!(100), dec!(1_000_000), &precision())
            .unwrap_err();
        assert_eq!(err, RejectReason::InvalidStopDistance);
    }

    #[test]
    fn balance_at_reserve_rejected() {
        let limits = limits();
        let sizer = PositionSizer::new(&limits);
        let err = sizer
            .compute(dec!(100), dec!(98), dec!(10), &precision())
            .unwrap_err();
        assert!(matches!(err, RejectReason::InsufficientBalance { .. }));
    }

    #[test]
    fn quantity_rounds_down_to_amount_precision() {
        let limits = limits();
        let sizer = PositionSizer::new(&limits);
        let qty = sizer
            .compute(dec!(3), dec!(2.94), dec!(1000), &precision())
            .unwrap();
        assert_eq!(qty, qty.round_dp_with_strategy(4, RoundingStrategy::ToZero));
        assert!(qty.scale() <= 4);
    }

    #[test]
    fn dust_order_rejected_as_too_small() {
        let mut limits = limits();
        limits.risk_amount_ceiling = Some(dec!(0.001));
        let sizer = PositionSizer::new(&limits);
        // Wide stop keeps the notional under the exchange minimum.
        let err = sizer
            .compute(dec!(50000), dec!(25000), dec!(11), &precision())
            .unwrap_err();
        assert!(matches!(err, RejectReason::OrderTooSmall { .. }));
    }

    #[test]
    fn risk_ceiling_caps_risk_amount() {
        let limits = limits();
        let sizer = PositionSizer::new(&limits);
        // 2% of 990 available = 19.8, ceiling 2. With a 2% stop the notional
        // is 2 / 0.02 = 100, hitting the position cap exactly.
        let qty = sizer
            .compute(dec!(100), dec!(98), dec!(1000), &precision())
            .unwrap();
        assert_eq!(qty * dec!(100), dec!(100));
    }
}
