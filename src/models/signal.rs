//! Inbound trading signal, parsed from the webhook payload.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::Side;

/// A validated trading signal. Ephemeral: exists only while one webhook
/// request is being processed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Signal {
    /// Vendor symbol as sent by the alert source, e.g. `BTCUSD`.
    pub symbol: String,
    pub action: Side,
    pub price: Decimal,
    pub stop_loss: Decimal,
    pub take_profit: Decimal,
}

impl Signal {
    /// Build a signal from raw webhook fields, deriving SL/TP from percentage
    /// offsets around `price` when they are missing or non-positive.
    pub fn from_alert(
        symbol: String,
        action: Side,
        price: Decimal,
        sl: Option<Decimal>,
        tp: Option<Decimal>,
        default_sl_pct: Decimal,
        default_tp_pct: Decimal,
    ) -> Self {
        let stop_loss = match sl {
            Some(v) if v > Decimal::ZERO => v,
            _ => match action {
                Side::Buy => price * (Decimal::ONE - default_sl_pct),
                Side::Sell => price * (Decimal::ONE + default_sl_pct),
            },
        };
        let take_profit = match tp {
            Some(v) if v > Decimal::ZERO => v,
            _ => match action {
                Side::Buy => price * (Decimal::ONE + default_tp_pct),
                Side::Sell => price * (Decimal::ONE - default_tp_pct),
            },
        };

        Self {
            symbol,
            action,
            price,
            stop_loss,
            take_profit,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn explicit_levels_pass_through() {
        let s = Signal::from_alert(
            "BTCUSD".into(),
            Side::Buy,
            dec!(100),
            Some(dec!(98)),
            Some(dec!(104)),
            dec!(0.05),
            dec!(0.10),
        );
        assert_eq!(s.stop_loss, dec!(98));
        assert_eq!(s.take_profit, dec!(104));
    }

    #[test]
    fn missing_levels_derive_from_offsets() {
        let s = Signal::from_alert(
            "BTCUSD".into(),
            Side::Buy,
            dec!(100),
            None,
            Some(Decimal::ZERO),
            dec!(0.05),
            dec!(0.10),
        );
        assert_eq!(s.stop_loss, dec!(95));
        assert_eq!(s.take_profit, dec!(110));
    }

    #[test]
    fn short_offsets_mirror() {
        let s = Signal::from_alert(
            "BTCUSD".into(),
            Side::Sell,
            dec!(100),
            None,
            None,
            dec!(0.05),
            dec!(0.10),
        );
        assert_eq!(s.stop_loss, dec!(105));
        assert_eq!(s.take_profit, dec!(90));
    }
}
