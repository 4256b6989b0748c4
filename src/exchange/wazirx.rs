//! WazirX spot REST gateway.
//!
//! Handles:
//! - HMAC-SHA256 request signing for authenticated endpoints
//! - Balance, ticker and exchange-info lookups
//! - Limit/market order placement, status polling and cancellation
//! - Dry-run mode that fabricates immediate fills without touching the API

use std::collections::HashMap;
use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use hmac::{Hmac, Mac};
use reqwest::Client;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::Deserialize;
use sha2::Sha256;
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, info};

use crate::models::Side;

use super::{Balance, ExchangeGateway, GatewayOrderState, InstrumentPrecision, OrderReport, Ticker};

const API_BASE: &str = "https://api.wazirx.com";
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);
const RECV_WINDOW_MS: u64 = 10_000;

type HmacSha256 = Hmac<Sha256>;

/// REST client for the WazirX spot API.
pub struct WazirxGateway {
    http: Client,
    base_url: String,
    api_key: String,
    api_secret: String,
    dry_run: bool,
    /// Orders fabricated in dry-run mode, so status polls stay consistent.
    dry_ledger: Mutex<HashMap<String, OrderReport>>,
    /// Instrument precision cache populated from exchangeInfo.
    precision_cache: RwLock<HashMap<String, InstrumentPrecision>>,
}

#[derive(Debug, Deserialize)]
struct FundEntry {
    asset: String,
    free: Decimal,
    locked: Decimal,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct TickerResponse {
    symbol: String,
    last_price: Decimal,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct OrderResponse {
    id: serde_json::Value,
    status: String,
    #[serde(default)]
    executed_qty: Option<Decimal>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ExchangeInfoResponse {
    symbols: Vec<SymbolInfo>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SymbolInfo {
    symbol: String,
    base_asset_precision: u32,
    quote_asset_precision: u32,
    #[serde(default)]
    min_notional: Option<Decimal>,
}

impl WazirxGateway {
    pub fn new(api_key: String, api_secret: String, dry_run: bool) -> Result<Self> {
        let http = Client::builder()
            .timeout(DEFAULT_TIMEOUT)
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self {
            http,
            base_url: API_BASE.to_string(),
            api_key,
            api_secret,
            dry_run,
            dry_ledger: Mutex::new(HashMap::new()),
            precision_cache: RwLock::new(HashMap::new()),
        })
    }

    /// Build from `WAZIRX_API_KEY` / `WAZIRX_SECRET_KEY` environment
    /// variables. Credentials may be empty in dry-run mode.
    pub fn from_env(dry_run: bool) -> Result<Self> {
        let api_key = std::env::var("WAZIRX_API_KEY").unwrap_or_default();
        let api_secret = std::env::var("WAZIRX_SECRET_KEY").unwrap_or_default();
        if !dry_run && (api_key.is_empty() || api_secret.is_empty()) {
            anyhow::bail!("WAZIRX_API_KEY / WAZIRX_SECRET_KEY not set");
        }
        Self::new(api_key, api_secret, dry_run)
    }

    fn sign(&self, query: &str) -> String {
        let mut mac = HmacSha256::new_from_slice(self.api_secret.as_bytes())
            .expect("HMAC accepts keys of any length");
        mac.update(query.as_bytes());
        hex::encode(mac.finalize().into_bytes())
    }

    fn signed_query(&self, mut params: Vec<(String, String)>) -> String {
        let timestamp = chrono::Utc::now().timestamp_millis();
        params.push(("recvWindow".to_string(), RECV_WINDOW_MS.to_string()));
        params.push(("timestamp".to_string(), timestamp.to_string()));
        let query = params
            .iter()
            .map(|(k, v)| format!("{}={}", k, v))
            .collect::<Vec<_>>()
            .join("&");
        let signature = self.sign(&query);
        format!("{}&signature={}", query, signature)
    }

    async fn signed_get<T: serde::de::DeserializeOwned>(
        &self,
        path: &str,
        params: Vec<(String, String)>,
    ) -> Result<T> {
        let url = format!("{}{}?{}", self.base_url, path, self.signed_query(params));
        debug!(path, "signed GET");
        let response = self
            .http
            .get(&url)
            .header("X-Api-Key", &self.api_key)
            .send()
            .await
            .with_context(|| format!("GET {} failed", path))?;
        Self::parse(response, path).await
    }

    async fn signed_post<T: serde::de::DeserializeOwned>(
        &self,
        path: &str,
        params: Vec<(String, String)>,
    ) -> Result<T> {
        let body = self.signed_query(params);
        debug!(path, "signed POST");
        let response = self
            .http
            .post(format!("{}{}", self.base_url, path))
            .header("X-Api-Key", &self.api_key)
            .header("Content-Type", "application/x-www-form-urlencoded")
            .body(body)
            .send()
            .await
            .with_context(|| format!("POST {} failed", path))?;
        Self::parse(response, path).await
    }

    async fn signed_delete(&self, path: &str, params: Vec<(String, String)>) -> Result<()> {
        let body = self.signed_query(params);
        let response = self
            .http
            .delete(format!("{}{}", self.base_url, path))
            .header("X-Api-Key", &self.api_key)
            .header("Content-Type", "application/x-www-form-urlencoded")
            .body(body)
            .send()
            .await
            .with_context(|| format!("DELETE {} failed", path))?;
        if !response.status().is_success() {
            let status = response.status();
            let text = response.text().await.unwrap_or_default();
            anyhow::bail!("DELETE {} failed: {} - {}", path, status, text);
        }
        Ok(())
    }

    async fn parse<T: serde::de::DeserializeOwned>(
        response: reqwest::Response,
        path: &str,
    ) -> Result<T> {
        if !response.status().is_success() {
            let status = response.status();
            let text = response.text().await.unwrap_or_default();
            anyhow::bail!("{} failed: {} - {}", path, status, text);
        }
        response
            .json()
            .await
            .with_context(|| format!("Failed to parse {} response", path))
    }

    fn map_state(status: &str) -> GatewayOrderState {
        match status {
            "wait" | "open" => GatewayOrderState::Open,
            "done" | "filled" | "closed" => GatewayOrderState::Filled,
            "cancel" | "cancelled" | "canceled" => GatewayOrderState::Cancelled,
            _ => GatewayOrderState::Submitted,
        }
    }

    fn report_from(response: OrderResponse, requested_qty: Decimal) -> OrderReport {
        let state = Self::map_state(&response.status);
        let filled_qty = response.executed_qty.unwrap_or(match state {
            GatewayOrderState::Filled => requested_qty,
            _ => Decimal::ZERO,
        });
        OrderReport {
            id: match response.id {
                serde_json::Value::String(s) => s,
                other => other.to_string(),
            },
            state,
            filled_qty,
        }
    }

    /// Dry-run placement: fabricate an immediately filled order so the
    /// monitor can exercise the full lifecycle without the exchange.
    async fn dry_place(&self, symbol: &str, side: Side, quantity: Decimal) -> OrderReport {
        let report = OrderReport {
            id: format!("DRY-{}", uuid::Uuid::new_v4()),
            state: GatewayOrderState::Filled,
            filled_qty: quantity,
        };
        info!(
            order_id = %report.id,
            symbol,
            side = %side,
            %quantity,
            "[DRY RUN] order simulated"
        );
        self.dry_ledger
            .lock()
            .await
            .insert(report.id.clone(), report.clone());
        report
    }
}

#[async_trait]
impl ExchangeGateway for WazirxGateway {
    async fn fetch_balance(&self) -> Result<Balance> {
        if self.dry_run {
            return Ok(Balance {
                free: dec!(1000),
                total: dec!(1000),
            });
        }
        let funds: Vec<FundEntry> = self.signed_get("/sapi/v1/funds", Vec::new()).await?;
        let usdt = funds
            .iter()
            .find(|f| f.asset.eq_ignore_ascii_case("usdt"));
        Ok(match usdt {
            Some(f) => Balance {
                free: f.free,
                total: f.free + f.locked,
            },
            None => Balance {
                free: Decimal::ZERO,
                total: Decimal::ZERO,
            },
        })
    }

    async fn fetch_ticker(&self, symbol: &str) -> Result<Ticker> {
        let url = format!(
            "{}/sapi/v1/ticker/24hr?symbol={}",
            self.base_url,
            symbol.to_lowercase()
        );
        let response = self
            .http
            .get(&url)
            .send()
            .await
            .context("Failed to fetch ticker")?;
        let ticker: TickerResponse = Self::parse(response, "/sapi/v1/ticker/24hr").await?;
        Ok(Ticker {
            symbol: ticker.symbol.to_uppercase(),
            last: ticker.last_price,
        })
    }

    async fn create_limit_order(
        &self,
        symbol: &str,
        side: Side,
        quantity: Decimal,
        price: Decimal,
    ) -> Result<OrderReport> {
        if self.dry_run {
            return Ok(self.dry_place(symbol, side, quantity).await);
        }
        let params = vec![
            ("symbol".to_string(), symbol.to_lowercase()),
            ("side".to_string(), side.as_str().to_string()),
            ("type".to_string(), "limit".to_string()),
            ("quantity".to_string(), quantity.to_string()),
            ("price".to_string(), price.to_string()),
        ];
        let response: OrderResponse = self.signed_post("/sapi/v1/order", params).await?;
        Ok(Self::report_from(response, quantity))
    }

    async fn create_market_order(
        &self,
        symbol: &str,
        side: Side,
        quantity: Decimal,
    ) -> Result<OrderReport> {
        if self.dry_run {
            return Ok(self.dry_place(symbol, side, quantity).await);
        }
        let params = vec![
            ("symbol".to_string(), symbol.to_lowercase()),
            ("side".to_string(), side.as_str().to_string()),
            ("type".to_string(), "market".to_string()),
            ("quantity".to_string(), quantity.to_string()),
        ];
        let response: OrderResponse = self.signed_post("/sapi/v1/order", params).await?;
        Ok(Self::report_from(response, quantity))
    }

    async fn fetch_order(&self, id: &str, _symbol: &str) -> Result<OrderReport> {
        if self.dry_run {
            return self
                .dry_ledger
                .lock()
                .await
                .get(id)
                .cloned()
                .with_context(|| format!("Unknown dry-run order {}", id));
        }
        let params = vec![("orderId".to_string(), id.to_string())];
        let response: OrderResponse = self.signed_get("/sapi/v1/order", params).await?;
        Ok(Self::report_from(response, Decimal::ZERO))
    }

    async fn cancel_order(&self, id: &str, symbol: &str) -> Result<()> {
        if self.dry_run {
            self.dry_ledger.lock().await.remove(id);
            return Ok(());
        }
        let params = vec![
            ("symbol".to_string(), symbol.to_lowercase()),
            ("orderId".to_string(), id.to_string()),
        ];
        self.signed_delete("/sapi/v1/order", params).await
    }

    async fn instrument_precision(&self, symbol: &str) -> Result<InstrumentPrecision> {
        if let Some(cached) = self.precision_cache.read().await.get(symbol) {
            return Ok(*cached);
        }

        let url = format!("{}/sapi/v1/exchangeInfo", self.base_url);
        let response = self
            .http
            .get(&url)
            .send()
            .await
            .context("Failed to fetch exchange info")?;
        let info: ExchangeInfoResponse = Self::parse(response, "/sapi/v1/exchangeInfo").await?;

        let mut cache = self.precision_cache.write().await;
        for entry in info.symbols {
            cache.insert(
                entry.symbol.to_uppercase(),
                InstrumentPrecision {
                    amount_dp: entry.base_asset_precision,
                    price_dp: entry.quote_asset_precision,
                    min_notional: entry.min_notional.unwrap_or(dec!(1)),
                },
            );
        }

        cache
            .get(symbol)
            .copied()
            .with_context(|| format!("Symbol {} not listed by exchange", symbol))
    }
}
