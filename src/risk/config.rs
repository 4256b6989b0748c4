//! Risk limits and symbol translation, loaded from the environment.

use std::collections::HashMap;
use std::time::Duration;

use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

/// Immutable risk configuration, fixed for the process lifetime.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RiskLimits {
    /// Master switch: reject every signal when false.
    pub trading_enabled: bool,

    /// Maximum absolute daily loss in quote currency before trading halts.
    pub max_daily_loss: Decimal,

    /// Maximum notional value of a single position.
    pub max_position_notional: Decimal,

    /// Fraction of available capital risked per trade (0.02 = 2%).
    pub risk_per_trade_pct: Decimal,

    /// Optional absolute ceiling on the per-trade risk amount.
    pub risk_amount_ceiling: Option<Decimal>,

    /// Fraction of available capital a single position may consume.
    pub capital_cap_fraction: Decimal,

    /// Free balance the engine must never trade below.
    pub min_reserve_balance: Decimal,

    /// Maximum number of concurrently tracked orders.
    pub max_open_positions: usize,

    /// Exchange symbols eligible for trading, uppercase.
    pub allowed_symbols: Vec<String>,

    /// When false, hours listed in `restricted_hours` reject signals.
    pub trade_24_7: bool,
    pub restricted_hours: Vec<u32>,

    /// Cancel unfilled orders older than this.
    pub order_timeout: Duration,

    /// Monitor tick interval.
    pub monitor_interval: Duration,

    /// Limit-price offset applied to improve fill probability (0.002 = 0.2%).
    pub slippage_pct: Decimal,

    /// SL/TP offsets used when the alert omits explicit levels.
    pub default_sl_pct: Decimal,
    pub default_tp_pct: Decimal,
}

impl Default for RiskLimits {
    fn default() -> Self {
        let max_position_notional = dec!(100);
        Self {
            trading_enabled: true,
            max_daily_loss: dec!(25),
            max_position_notional,
            risk_per_trade_pct: dec!(0.02),
            // Canonical ceiling: 2% of the position cap.
            risk_amount_ceiling: Some(max_position_notional * dec!(0.02)),
            capital_cap_fraction: dec!(0.8),
            min_reserve_balance: dec!(10),
            max_open_positions: 3,
            allowed_symbols: vec![
                "BTCUSDT".to_string(),
                "ETHUSDT".to_string(),
                "BNBUSDT".to_string(),
                "SOLUSDT".to_string(),
            ],
            trade_24_7: true,
            restricted_hours: Vec::new(),
            order_timeout: Duration::from_secs(30),
            monitor_interval: Duration::from_secs(5),
            slippage_pct: dec!(0.002),
            default_sl_pct: dec!(0.05),
            default_tp_pct: dec!(0.10),
        }
    }
}

impl RiskLimits {
    /// Load limits from the environment, falling back to defaults for any
    /// variable that is missing or unparseable. Percent-style variables
    /// (e.g. `RISK_PER_TRADE_PERCENT=2`) are converted to fractions.
    pub fn from_env() -> Self {
        let mut limits = Self::default();

        if let Some(v) = env_bool("TRADING_ENABLED") {
            limits.trading_enabled = v;
        }
        if let Some(v) = env_decimal("MAX_DAILY_LOSS_USDT") {
            limits.max_daily_loss = v;
        }
        if let Some(v) = env_decimal("MAX_POSITION_SIZE_USDT") {
            limits.max_position_notional = v;
            limits.risk_amount_ceiling = Some(v * dec!(0.02));
        }
        if let Some(v) = env_decimal("RISK_PER_TRADE_PERCENT") {
            limits.risk_per_trade_pct = v / dec!(100);
        }
        if let Some(v) = env_decimal("MIN_BALANCE_USDT") {
            limits.min_reserve_balance = v;
        }
        if let Some(v) = env_parse::<usize>("MAX_OPEN_POSITIONS") {
            limits.max_open_positions = v;
        }
        if let Some(v) = std::env::var("ALLOWED_SYMBOLS").ok().filter(|s| !s.is_empty()) {
            limits.allowed_symbols = v
                .split(',')
                .map(|s| s.trim().to_uppercase())
                .filter(|s| !s.is_empty())
                .collect();
        }
        if let Some(v) = env_bool("TRADING_24_7") {
            limits.trade_24_7 = v;
        }
        if let Some(v) = std::env::var("RESTRICTED_HOURS").ok().filter(|s| !s.is_empty()) {
            limits.restricted_hours = v
                .split(',')
                .filter_map(|s| s.trim().parse().ok())
                .filter(|h| *h < 24)
                .collect();
        }
        if let Some(v) = env_parse::<u64>("ORDER_TIMEOUT_SECONDS") {
            limits.order_timeout = Duration::from_secs(v);
        }
        if let Some(v) = env_parse::<u64>("ORDER_CHECK_INTERVAL_SECONDS") {
            limits.monitor_interval = Duration::from_secs(v.max(1));
        }
        if let Some(v) = env_decimal("SLIPPAGE_PERCENT") {
            limits.slippage_pct = v / dec!(100);
        }
        if let Some(v) = env_decimal("DEFAULT_SL_PERCENT") {
            limits.default_sl_pct = v / dec!(100);
        }
        if let Some(v) = env_decimal("DEFAULT_TP_PERCENT") {
            limits.default_tp_pct = v / dec!(100);
        }

        limits
    }
}

/// Vendor-to-exchange symbol translation table.
#[derive(Debug, Clone, Default)]
pub struct SymbolTable {
    map: HashMap<String, String>,
}

impl SymbolTable {
    /// Built-in table covering the common TradingView tickers.
    pub fn builtin() -> Self {
        let pairs = [
            ("BTCUSD", "BTCUSDT"),
            ("ETHUSD", "ETHUSDT"),
            ("BNBUSD", "BNBUSDT"),
            ("SOLUSD", "SOLUSDT"),
            ("MATICUSD", "MATICUSDT"),
            ("ADAUSD", "ADAUSDT"),
            ("DOGEUSD", "DOGEUSDT"),
            ("XRPUSD", "XRPUSDT"),
        ];
        Self {
            map: pairs
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
        }
    }

    /// Translate a vendor symbol into the exchange symbol. Unmapped symbols
    /// are normalized (uppercase, separator stripped) and gain the USDT
    /// quote suffix when they do not already carry it.
    pub fn translate(&self, vendor: &str) -> String {
        let key = vendor.trim().to_uppercase();
        if let Some(mapped) = self.map.get(&key) {
            return mapped.clone();
        }
        let normalized = key.replace('/', "");
        if normalized.ends_with("USDT") {
            normalized
        } else {
            format!("{}USDT", normalized)
        }
    }
}

fn env_decimal(key: &str) -> Option<Decimal> {
    std::env::var(key).ok()?.trim().parse().ok()
}

fn env_parse<T: std::str::FromStr>(key: &str) -> Option<T> {
    std::env::var(key).ok()?.trim().parse().ok()
}

fn env_bool(key: &str) -> Option<bool> {
    match std::env::var(key).ok()?.trim().to_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn translate_uses_table_first() {
        let table = SymbolTable::builtin();
        assert_eq!(table.translate("BTCUSD"), "BTCUSDT");
        assert_eq!(table.translate("btcusd"), "BTCUSDT");
    }

    #[test]
    fn translate_normalizes_unmapped() {
        let table = SymbolTable::builtin();
        assert_eq!(table.translate("AVAX/USDT"), "AVAXUSDT");
        assert_eq!(table.translate("avax"), "AVAXUSDT");
        assert_eq!(table.translate("LINKUSDT"), "LINKUSDT");
    }

    #[test]
    fn defaults_are_consistent() {
        let limits = RiskLimits::default();
        assert!(limits.risk_per_trade_pct < Decimal::ONE);
        assert!(limits.capital_cap_fraction < Decimal::ONE);
        assert_eq!(
            limits.risk_amount_ceiling,
            Some(limits.max_position_notional * dec!(0.02))
        );
    }
}
