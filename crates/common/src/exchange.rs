use async_trait::async_trait;

use crate::{InstrumentMeta, OrderResult, Position, Quote, Result, TradeIntent};

/// Source of live quotes.
#[async_trait]
pub trait PriceFeed: Send + Sync {
    /// Latest bid/ask for a symbol.
    async fn quote(&self, symbol: &str) -> Result<Quote>;
}

/// Account and instrument information held by the broker.
#[async_trait]
pub trait AccountInfo: Send + Sync {
    /// Current account equity in account currency.
    async fn equity(&self) -> Result<f64>;

    /// Trading specification for a symbol.
    async fn instrument_meta(&self, symbol: &str) -> Result<InstrumentMeta>;
}

/// Abstraction over order submission.
///
/// `PaperBroker` implements this for simulation. Only the decision
/// orchestrator in `crates/engine` submits intents, and only after the
/// intent has passed sizing and stop-level validation.
#[async_trait]
pub trait OrderGateway: Send + Sync {
    /// Submit an entry intent. Broker refusals come back as
    /// `OrderStatus::Rejected`; `Err` means the broker could not be reached.
    async fn submit(&self, intent: TradeIntent) -> Result<OrderResult>;

    /// Positions currently open on a symbol.
    async fn open_positions(&self, symbol: &str) -> Result<Vec<Position>>;
}
