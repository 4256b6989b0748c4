//! Exchange gateway abstraction and the WazirX REST implementation.

mod gateway;
mod wazirx;

#[cfg(test)]
pub mod mock;

pub use gateway::{
    Balance, ExchangeGateway, GatewayOrderState, InstrumentPrecision, OrderReport, Ticker,
};
pub use wazirx::WazirxGateway;
