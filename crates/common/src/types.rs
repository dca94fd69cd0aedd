use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A completed price interval. Values never change once the bar is closed.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Bar {
    /// Open time of the bar.
    pub time: DateTime<Utc>,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
}

impl Bar {
    pub fn is_bullish(&self) -> bool {
        self.close > self.open
    }
}

/// Live market data event routed to an engine.
///
/// Every event carries the current quote. `closed_bar` is set on the first
/// event after a bar completes, and carries that completed bar.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MarketEvent {
    pub symbol: String,
    pub time: DateTime<Utc>,
    pub bid: f64,
    pub ask: f64,
    #[serde(default)]
    pub closed_bar: Option<Bar>,
}

impl MarketEvent {
    pub fn quote(&self) -> Quote {
        Quote {
            bid: self.bid,
            ask: self.ask,
            time: self.time,
        }
    }
}

/// Best bid/ask at a point in time.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Quote {
    pub bid: f64,
    pub ask: f64,
    pub time: DateTime<Utc>,
}

impl Quote {
    pub fn is_valid(&self) -> bool {
        self.bid > 0.0 && self.ask > 0.0 && self.bid.is_finite() && self.ask.is_finite()
    }
}

/// One bar's worth of MACD output.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct OscillatorSample {
    pub main: f64,
    pub signal: f64,
}

impl OscillatorSample {
    pub fn new(main: f64, signal: f64) -> Self {
        Self { main, signal }
    }

    /// `main - signal`. Derived on demand, never stored.
    pub fn histogram(&self) -> f64 {
        self.main - self.signal
    }
}

/// Broker-side description of a tradable instrument.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct InstrumentMeta {
    /// Smallest quoted price change.
    pub point_size: f64,
    /// Decimal places prices are quoted with.
    pub price_digits: u32,
    /// Price change that moves P&L by `tick_value` per unit of volume.
    pub tick_size: f64,
    /// Account-currency value of one `tick_size` move for one unit of volume.
    pub tick_value: f64,
    pub volume_min: f64,
    pub volume_max: f64,
    pub volume_step: f64,
    /// Broker minimum distance between entry and SL/TP, in points. `0` = none.
    #[serde(default)]
    pub min_stop_distance_points: i64,
}

/// Side of a trade. The strategy only ever buys.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum OrderSide {
    Buy,
}

impl std::fmt::Display for OrderSide {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OrderSide::Buy => write!(f, "BUY"),
        }
    }
}

/// A fully specified entry order.
///
/// Fields are read-only once built; the intent is handed to the gateway by
/// value and only the gateway turns it into an [`OrderResult`].
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TradeIntent {
    id: String,
    symbol: String,
    side: OrderSide,
    volume: f64,
    entry_price_hint: f64,
    stop_loss: f64,
    take_profit: f64,
    max_slippage_points: u32,
    client_tag: u64,
}

impl TradeIntent {
    #[allow(clippy::too_many_arguments)]
    pub fn buy(
        symbol: impl Into<String>,
        volume: f64,
        entry_price_hint: f64,
        stop_loss: f64,
        take_profit: f64,
        max_slippage_points: u32,
        client_tag: u64,
    ) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            symbol: symbol.into(),
            side: OrderSide::Buy,
            volume,
            entry_price_hint,
            stop_loss,
            take_profit,
            max_slippage_points,
            client_tag,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn symbol(&self) -> &str {
        &self.symbol
    }

    pub fn side(&self) -> OrderSide {
        self.side
    }

    pub fn volume(&self) -> f64 {
        self.volume
    }

    pub fn entry_price_hint(&self) -> f64 {
        self.entry_price_hint
    }

    pub fn stop_loss(&self) -> f64 {
        self.stop_loss
    }

    pub fn take_profit(&self) -> f64 {
        self.take_profit
    }

    pub fn max_slippage_points(&self) -> u32 {
        self.max_slippage_points
    }

    pub fn client_tag(&self) -> u64 {
        self.client_tag
    }
}

/// Broker reason for refusing an order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RejectCode {
    Requote,
    InvalidStops,
    InvalidVolume,
    NoMoney,
    MarketClosed,
    Rejected,
    Other(u32),
}

impl std::fmt::Display for RejectCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RejectCode::Requote => write!(f, "requote"),
            RejectCode::InvalidStops => write!(f, "invalid stops"),
            RejectCode::InvalidVolume => write!(f, "invalid volume"),
            RejectCode::NoMoney => write!(f, "not enough money"),
            RejectCode::MarketClosed => write!(f, "market closed"),
            RejectCode::Rejected => write!(f, "rejected"),
            RejectCode::Other(code) => write!(f, "broker code {code}"),
        }
    }
}

/// What the gateway did with a submitted intent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OrderStatus {
    Filled,
    PartiallyFilled,
    /// Accepted by the broker, fill confirmation pending.
    Placed,
    Rejected(RejectCode),
}

impl OrderStatus {
    pub fn is_accepted(&self) -> bool {
        !matches!(self, OrderStatus::Rejected(_))
    }
}

/// Gateway response to a submitted intent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderResult {
    pub order_id: String,
    pub status: OrderStatus,
    pub fill_price: f64,
    pub volume: f64,
}

impl OrderResult {
    pub fn rejected(order_id: impl Into<String>, code: RejectCode) -> Self {
        Self {
            order_id: order_id.into(),
            status: OrderStatus::Rejected(code),
            fill_price: 0.0,
            volume: 0.0,
        }
    }
}

/// Confirmed entry, recorded as a marker at the fill price.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Fill {
    pub order_id: String,
    pub symbol: String,
    pub side: OrderSide,
    pub fill_price: f64,
    pub volume: f64,
    pub stop_loss: f64,
    pub take_profit: f64,
    pub tag: u64,
    pub time: DateTime<Utc>,
}

/// An open position held at the broker.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Position {
    pub id: String,
    pub symbol: String,
    pub side: OrderSide,
    pub entry_price: f64,
    pub volume: f64,
    pub stop_loss: f64,
    pub take_profit: f64,
    pub tag: u64,
    pub opened_at: DateTime<Utc>,
}

/// Decision pipeline stages. Every tick starts again at `Idle`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DecisionStage {
    Idle,
    AwaitingSignal,
    ParametersComputed,
    Sized,
    Validated,
    Submitted,
    Filled,
    Rejected,
}

impl std::fmt::Display for DecisionStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            DecisionStage::Idle => "idle",
            DecisionStage::AwaitingSignal => "awaiting-signal",
            DecisionStage::ParametersComputed => "parameters-computed",
            DecisionStage::Sized => "sized",
            DecisionStage::Validated => "validated",
            DecisionStage::Submitted => "submitted",
            DecisionStage::Filled => "filled",
            DecisionStage::Rejected => "rejected",
        };
        f.write_str(name)
    }
}

/// Broad class of a no-trade outcome.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FailureClass {
    /// A gate that normally holds most ticks (permission, daily limit, no signal).
    Gate,
    /// Feed read failed or history too short.
    DataUnavailable,
    /// Bad input to a computation (non-positive price, degenerate rounding).
    ComputationInvalid,
    /// Market or account conditions forbid the trade.
    PolicyRejection,
    /// The broker refused or could not be reached.
    GatewayRejection,
}

/// Why a tick ended without a trade.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum SkipReason {
    TradingNotAllowed,
    TradedToday,
    PositionOpen,
    NoSignal,
    DataUnavailable(String),
    InvalidComputation(String),
    PolicyRejection(String),
    GatewayRejected(RejectCode),
    GatewayError(String),
}

impl SkipReason {
    pub fn class(&self) -> FailureClass {
        match self {
            SkipReason::TradingNotAllowed
            | SkipReason::TradedToday
            | SkipReason::PositionOpen
            | SkipReason::NoSignal => FailureClass::Gate,
            SkipReason::DataUnavailable(_) => FailureClass::DataUnavailable,
            SkipReason::InvalidComputation(_) => FailureClass::ComputationInvalid,
            SkipReason::PolicyRejection(_) => FailureClass::PolicyRejection,
            SkipReason::GatewayRejected(_) | SkipReason::GatewayError(_) => {
                FailureClass::GatewayRejection
            }
        }
    }
}

impl std::fmt::Display for SkipReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SkipReason::TradingNotAllowed => write!(f, "trading not allowed"),
            SkipReason::TradedToday => write!(f, "already traded today"),
            SkipReason::PositionOpen => write!(f, "position already open"),
            SkipReason::NoSignal => write!(f, "no entry signal"),
            SkipReason::DataUnavailable(s) => write!(f, "data unavailable: {s}"),
            SkipReason::InvalidComputation(s) => write!(f, "invalid computation: {s}"),
            SkipReason::PolicyRejection(s) => write!(f, "policy rejection: {s}"),
            SkipReason::GatewayRejected(code) => write!(f, "gateway rejected order: {code}"),
            SkipReason::GatewayError(s) => write!(f, "gateway error: {s}"),
        }
    }
}

/// Current state of a trading engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum EngineState {
    #[default]
    Stopped,
    Running,
    Paused,
}

impl EngineState {
    /// Only a running engine may open positions.
    pub fn trading_allowed(&self) -> bool {
        *self == EngineState::Running
    }
}

impl std::fmt::Display for EngineState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EngineState::Stopped => write!(f, "stopped"),
            EngineState::Running => write!(f, "running"),
            EngineState::Paused => write!(f, "paused"),
        }
    }
}

/// Commands sent to an engine via its command channel.
#[derive(Debug, Clone)]
pub enum EngineCommand {
    Start,
    Stop,
    Pause,
    Resume,
}

/// Events emitted by the decision pipeline for journaling and alerts.
#[derive(Debug, Clone)]
pub enum DecisionEvent {
    /// Entry confirmed; marker at the fill price.
    EntryFilled { fill: Fill },
    OrderRejected {
        symbol: String,
        code: RejectCode,
    },
    OrderFailed {
        symbol: String,
        error: String,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn histogram_is_main_minus_signal() {
        let s = OscillatorSample::new(-0.003, -0.001);
        assert!((s.histogram() - -0.002).abs() < 1e-12);
    }

    #[test]
    fn partial_fill_counts_as_accepted() {
        assert!(OrderStatus::Filled.is_accepted());
        assert!(OrderStatus::PartiallyFilled.is_accepted());
        assert!(OrderStatus::Placed.is_accepted());
        assert!(!OrderStatus::Rejected(RejectCode::Requote).is_accepted());
    }

    #[test]
    fn skip_reasons_are_classified() {
        assert_eq!(SkipReason::NoSignal.class(), FailureClass::Gate);
        assert_eq!(
            SkipReason::PolicyRejection("below minimum volume".into()).class(),
            FailureClass::PolicyRejection
        );
        assert_eq!(
            SkipReason::GatewayRejected(RejectCode::NoMoney).class(),
            FailureClass::GatewayRejection
        );
    }

    #[test]
    fn only_running_engine_allows_trading() {
        assert!(EngineState::Running.trading_allowed());
        assert!(!EngineState::Paused.trading_allowed());
        assert!(!EngineState::Stopped.trading_allowed());
    }

    #[test]
    fn quote_with_zero_side_is_invalid() {
        let q = Quote {
            bid: 0.0,
            ask: 1.1,
            time: Utc::now(),
        };
        assert!(!q.is_valid());
    }
}
