use std::sync::Arc;

use chrono::{DateTime, Utc};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use common::{
    AccountInfo, DecisionEvent, DecisionStage, FailureClass, Fill, IndicatorFeed, InstrumentMeta,
    OrderGateway, OrderStatus, PriceFeed, Result, SkipReason, TradeIntent,
};
use risk::{check_stop_levels, LevelCalculator, RiskConfig, RiskSizer, EPSILON};
use strategy::{SignalEvaluator, StrategyConfig};

/// Per-instrument state owned by one decision engine.
///
/// Only a confirmed fill mutates it. Nothing outside the engine reads or
/// writes it.
#[derive(Debug, Clone)]
pub struct StrategyState {
    last_trade_at: Option<DateTime<Utc>>,
    instrument: InstrumentMeta,
}

impl StrategyState {
    pub fn new(instrument: InstrumentMeta) -> Self {
        Self {
            last_trade_at: None,
            instrument,
        }
    }

    pub fn last_trade_at(&self) -> Option<DateTime<Utc>> {
        self.last_trade_at
    }

    pub fn instrument(&self) -> &InstrumentMeta {
        &self.instrument
    }

    /// True if the last trade fell on the same calendar day as `time`.
    pub fn traded_on_day_of(&self, time: DateTime<Utc>) -> bool {
        self.last_trade_at
            .is_some_and(|last| last.date_naive() == time.date_naive())
    }

    fn record_fill(&mut self, time: DateTime<Utc>) {
        self.last_trade_at = Some(time);
    }
}

/// Result of processing one tick.
#[derive(Debug, Clone, PartialEq)]
pub enum TickOutcome {
    NoTrade {
        stage: DecisionStage,
        reason: SkipReason,
    },
    Filled(Fill),
}

impl TickOutcome {
    fn skip(stage: DecisionStage, reason: SkipReason) -> Self {
        TickOutcome::NoTrade { stage, reason }
    }

    /// Stage the pipeline ended in.
    pub fn stage(&self) -> DecisionStage {
        match self {
            TickOutcome::NoTrade { stage, .. } => *stage,
            TickOutcome::Filled(_) => DecisionStage::Filled,
        }
    }

    pub fn is_filled(&self) -> bool {
        matches!(self, TickOutcome::Filled(_))
    }
}

/// Runs the entry pipeline for one instrument once per tick:
/// gates → signal → volatility → levels → size → stop check → submit.
///
/// Every failure ends the tick with a `TickOutcome::NoTrade` and a log line;
/// nothing propagates out of `on_tick`.
pub struct DecisionEngine {
    name: String,
    symbol: String,
    tag: u64,
    max_slippage_points: u32,
    evaluator: SignalEvaluator,
    levels: LevelCalculator,
    sizer: RiskSizer,
    state: StrategyState,
    prices: Arc<dyn PriceFeed>,
    account: Arc<dyn AccountInfo>,
    gateway: Arc<dyn OrderGateway>,
    event_tx: Option<mpsc::Sender<DecisionEvent>>,
}

impl DecisionEngine {
    pub fn new(
        cfg: &StrategyConfig,
        instrument: InstrumentMeta,
        prices: Arc<dyn PriceFeed>,
        account: Arc<dyn AccountInfo>,
        gateway: Arc<dyn OrderGateway>,
    ) -> Self {
        let risk = RiskConfig {
            risk_percent: cfg.risk_percent,
            sl_multiplier: cfg.sl_multiplier,
            reward_ratio: cfg.reward_ratio,
        };
        Self {
            name: cfg.name.clone(),
            symbol: cfg.symbol.clone(),
            tag: cfg.tag,
            max_slippage_points: cfg.max_slippage_points,
            evaluator: SignalEvaluator::new(),
            levels: risk.level_calculator(&instrument),
            sizer: risk.sizer(),
            state: StrategyState::new(instrument),
            prices,
            account,
            gateway,
            event_tx: None,
        }
    }

    /// Build against a single broker that provides quotes, account info and
    /// order routing, reading the instrument spec from it once at setup.
    pub async fn connect<B>(cfg: &StrategyConfig, broker: Arc<B>) -> Result<Self>
    where
        B: PriceFeed + AccountInfo + OrderGateway + 'static,
    {
        let instrument = broker.instrument_meta(&cfg.symbol).await?;
        info!(
            name = %cfg.name,
            symbol = %cfg.symbol,
            digits = instrument.price_digits,
            volume_step = instrument.volume_step,
            "Decision engine connected"
        );
        Ok(Self::new(
            cfg,
            instrument,
            broker.clone(),
            broker.clone(),
            broker,
        ))
    }

    /// Emit fill markers and gateway rejections on this channel.
    pub fn with_events(mut self, event_tx: mpsc::Sender<DecisionEvent>) -> Self {
        self.event_tx = Some(event_tx);
        self
    }

    pub fn symbol(&self) -> &str {
        &self.symbol
    }

    pub fn state(&self) -> &StrategyState {
        &self.state
    }

    /// Process one tick to completion.
    pub async fn on_tick(
        &mut self,
        now: DateTime<Utc>,
        trading_allowed: bool,
        feed: &dyn IndicatorFeed,
    ) -> TickOutcome {
        let outcome = self.decide(now, trading_allowed, feed).await;
        match &outcome {
            TickOutcome::Filled(fill) => info!(
                strategy = %self.name,
                symbol = %fill.symbol,
                price = fill.fill_price,
                volume = fill.volume,
                sl = fill.stop_loss,
                tp = fill.take_profit,
                "Entry filled"
            ),
            TickOutcome::NoTrade { stage, reason } => match reason.class() {
                FailureClass::Gate | FailureClass::DataUnavailable => {
                    debug!(symbol = %self.symbol, %stage, %reason, "No trade this tick")
                }
                FailureClass::ComputationInvalid | FailureClass::PolicyRejection => {
                    info!(symbol = %self.symbol, %stage, %reason, "Entry skipped")
                }
                FailureClass::GatewayRejection => {
                    warn!(symbol = %self.symbol, %stage, %reason, "Entry not filled")
                }
            },
        }
        outcome
    }

    async fn decide(
        &mut self,
        now: DateTime<Utc>,
        trading_allowed: bool,
        feed: &dyn IndicatorFeed,
    ) -> TickOutcome {
        use DecisionStage::*;

        // ── Gates ─────────────────────────────────────────────────────────────
        if !trading_allowed {
            return TickOutcome::skip(Idle, SkipReason::TradingNotAllowed);
        }
        if self.state.traded_on_day_of(now) {
            return TickOutcome::skip(Idle, SkipReason::TradedToday);
        }
        match self.gateway.open_positions(&self.symbol).await {
            Ok(positions) if positions.iter().any(|p| p.tag == self.tag) => {
                return TickOutcome::skip(Idle, SkipReason::PositionOpen);
            }
            Ok(_) => {}
            Err(e) => {
                return TickOutcome::skip(Idle, SkipReason::DataUnavailable(e.to_string()));
            }
        }

        // ── Signal ────────────────────────────────────────────────────────────
        let snapshot = match feed.signal_snapshot() {
            Ok(snapshot) => snapshot,
            Err(e) => {
                return TickOutcome::skip(AwaitingSignal, SkipReason::DataUnavailable(e.to_string()))
            }
        };
        if !self.evaluator.evaluate(&snapshot) {
            return TickOutcome::skip(AwaitingSignal, SkipReason::NoSignal);
        }

        // ── Volatility + levels ───────────────────────────────────────────────
        let volatility = match feed.volatility() {
            Ok(v) => v,
            Err(e) => {
                return TickOutcome::skip(AwaitingSignal, SkipReason::DataUnavailable(e.to_string()))
            }
        };
        if volatility <= EPSILON {
            return TickOutcome::skip(
                AwaitingSignal,
                SkipReason::InvalidComputation(format!("volatility {volatility}")),
            );
        }
        let quote = match self.prices.quote(&self.symbol).await {
            Ok(q) => q,
            Err(e) => {
                return TickOutcome::skip(AwaitingSignal, SkipReason::DataUnavailable(e.to_string()))
            }
        };
        let levels = match self.levels.compute(volatility, quote.ask) {
            Ok(levels) => levels,
            Err(e) => {
                return TickOutcome::skip(
                    AwaitingSignal,
                    SkipReason::InvalidComputation(e.to_string()),
                )
            }
        };
        debug!(
            symbol = %self.symbol,
            atr = volatility,
            ask = quote.ask,
            sl = levels.stop_loss,
            tp = levels.take_profit,
            "Parameters computed"
        );

        // ── Size ──────────────────────────────────────────────────────────────
        let equity = match self.account.equity().await {
            Ok(e) => e,
            Err(e) => {
                return TickOutcome::skip(
                    ParametersComputed,
                    SkipReason::DataUnavailable(e.to_string()),
                )
            }
        };
        let volume = match self
            .sizer
            .size(equity, levels.sl_distance, self.state.instrument())
        {
            Ok(v) if v > 0.0 => v,
            Ok(v) => {
                return TickOutcome::skip(
                    ParametersComputed,
                    SkipReason::InvalidComputation(format!("size {v}")),
                )
            }
            Err(e) if e.is_policy() => {
                return TickOutcome::skip(ParametersComputed, SkipReason::PolicyRejection(e.to_string()))
            }
            Err(e) => {
                return TickOutcome::skip(
                    ParametersComputed,
                    SkipReason::InvalidComputation(e.to_string()),
                )
            }
        };

        // ── Re-check stops against the latest quote ───────────────────────────
        let fresh = match self.prices.quote(&self.symbol).await {
            Ok(q) => q,
            Err(e) => return TickOutcome::skip(Sized, SkipReason::DataUnavailable(e.to_string())),
        };
        if !fresh.is_valid() {
            return TickOutcome::skip(
                Sized,
                SkipReason::InvalidComputation(format!(
                    "quote bid {} ask {}",
                    fresh.bid, fresh.ask
                )),
            );
        }
        let meta = self.state.instrument();
        if let Err(violation) = check_stop_levels(
            fresh.ask,
            fresh.bid,
            levels.stop_loss,
            levels.take_profit,
            meta.min_stop_distance_points,
            meta.point_size,
        ) {
            return TickOutcome::skip(Sized, SkipReason::PolicyRejection(violation.to_string()));
        }

        // ── Submit ────────────────────────────────────────────────────────────
        let intent = TradeIntent::buy(
            &self.symbol,
            volume,
            fresh.ask,
            levels.stop_loss,
            levels.take_profit,
            self.max_slippage_points,
            self.tag,
        );
        let side = intent.side();
        info!(
            symbol = %self.symbol,
            id = %intent.id(),
            volume = volume,
            ask = fresh.ask,
            sl = levels.stop_loss,
            tp = levels.take_profit,
            "Submitting entry"
        );

        let result = match self.gateway.submit(intent).await {
            Ok(result) => result,
            Err(e) => {
                self.emit(DecisionEvent::OrderFailed {
                    symbol: self.symbol.clone(),
                    error: e.to_string(),
                })
                .await;
                return TickOutcome::skip(Submitted, SkipReason::GatewayError(e.to_string()));
            }
        };

        if let OrderStatus::Rejected(code) = result.status {
            self.emit(DecisionEvent::OrderRejected {
                symbol: self.symbol.clone(),
                code,
            })
            .await;
            return TickOutcome::skip(Rejected, SkipReason::GatewayRejected(code));
        }

        self.state.record_fill(now);
        let fill_price = if result.fill_price > 0.0 {
            result.fill_price
        } else {
            warn!(
                symbol = %self.symbol,
                order_id = %result.order_id,
                reported = result.fill_price,
                ask = fresh.ask,
                "Gateway reported no fill price; recording the quoted ask"
            );
            fresh.ask
        };
        let fill = Fill {
            order_id: result.order_id,
            symbol: self.symbol.clone(),
            side,
            fill_price,
            volume: if result.volume > 0.0 { result.volume } else { volume },
            stop_loss: levels.stop_loss,
            take_profit: levels.take_profit,
            tag: self.tag,
            time: now,
        };
        self.emit(DecisionEvent::EntryFilled { fill: fill.clone() })
            .await;
        TickOutcome::Filled(fill)
    }

    async fn emit(&self, event: DecisionEvent) {
        if let Some(tx) = &self.event_tx {
            if tx.send(event).await.is_err() {
                warn!(symbol = %self.symbol, "Decision event channel closed");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::VecDeque;
    use std::sync::Mutex;

    use async_trait::async_trait;
    use chrono::{Duration, TimeZone};
    use common::{
        Bar, Error, FeedError, OrderResult, OrderSide, OscillatorSample, Position, Quote,
        RejectCode,
    };

    // ── Fixtures ──────────────────────────────────────────────────────────────

    fn config() -> StrategyConfig {
        StrategyConfig {
            name: "test".into(),
            symbol: "TEST".into(),
            tag: 42,
            atr_period: 14,
            sl_multiplier: 1.5,
            reward_ratio: 2.0,
            macd_fast: 12,
            macd_slow: 26,
            macd_signal: 9,
            trend_period: 50,
            risk_percent: 2.0,
            max_slippage_points: 10,
        }
    }

    fn instrument() -> InstrumentMeta {
        InstrumentMeta {
            point_size: 0.01,
            price_digits: 2,
            tick_size: 0.01,
            tick_value: 1.0,
            volume_min: 0.01,
            volume_max: 100.0,
            volume_step: 0.01,
            min_stop_distance_points: 10,
        }
    }

    fn at(day: u32, hour: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 5, day, hour, 0, 0).unwrap()
    }

    fn quote(bid: f64, ask: f64) -> Quote {
        Quote {
            bid,
            ask,
            time: at(1, 0),
        }
    }

    /// Indicator feed returning a fixed signal snapshot and ATR.
    struct FixedFeed {
        signal: bool,
        volatility: Result<f64, FeedError>,
        history: Result<(), FeedError>,
    }

    impl FixedFeed {
        fn entry() -> Self {
            Self {
                signal: true,
                volatility: Ok(1.0),
                history: Ok(()),
            }
        }
    }

    impl IndicatorFeed for FixedFeed {
        fn oscillator(&self, _count: usize) -> Result<Vec<OscillatorSample>, FeedError> {
            self.history.clone()?;
            // Histogram on bar 2 is +0.001 with a signal, −0.001 without.
            let bar2_hist = if self.signal { 0.001 } else { -0.001 };
            Ok(vec![
                OscillatorSample::new(-0.003, -0.001),
                OscillatorSample::new(0.0005 + bar2_hist, 0.0005),
                OscillatorSample::new(0.0024, 0.0004),
            ])
        }

        fn trend(&self, _count: usize) -> Result<Vec<f64>, FeedError> {
            self.history.clone()?;
            Ok(vec![99.0, 98.9])
        }

        fn volatility(&self) -> Result<f64, FeedError> {
            self.volatility.clone()
        }

        fn bars(&self, _count: usize) -> Result<Vec<Bar>, FeedError> {
            self.history.clone()?;
            Ok(vec![Bar {
                time: at(1, 0),
                open: 100.0,
                high: 101.2,
                low: 99.8,
                close: 101.0,
            }])
        }
    }

    /// Broker double that records submissions.
    struct FakeBroker {
        equity: f64,
        /// Served in order; the last one repeats.
        quotes: Mutex<VecDeque<Quote>>,
        positions: Mutex<Vec<Position>>,
        next_status: Mutex<Option<Result<OrderStatus>>>,
        /// Report fills without a price.
        omit_fill_price: bool,
        submitted: Mutex<Vec<TradeIntent>>,
    }

    impl FakeBroker {
        fn new() -> Self {
            Self {
                equity: 10_000.0,
                quotes: Mutex::new(VecDeque::from([quote(99.98, 100.0)])),
                positions: Mutex::new(Vec::new()),
                next_status: Mutex::new(None),
                omit_fill_price: false,
                submitted: Mutex::new(Vec::new()),
            }
        }

        fn submissions(&self) -> usize {
            self.submitted.lock().unwrap().len()
        }
    }

    #[async_trait]
    impl PriceFeed for FakeBroker {
        async fn quote(&self, _symbol: &str) -> Result<Quote> {
            let mut quotes = self.quotes.lock().unwrap();
            if quotes.len() > 1 {
                Ok(quotes.pop_front().unwrap())
            } else {
                quotes
                    .front()
                    .copied()
                    .ok_or_else(|| Error::Gateway("no quote".into()))
            }
        }
    }

    #[async_trait]
    impl AccountInfo for FakeBroker {
        async fn equity(&self) -> Result<f64> {
            Ok(self.equity)
        }

        async fn instrument_meta(&self, _symbol: &str) -> Result<InstrumentMeta> {
            Ok(instrument())
        }
    }

    #[async_trait]
    impl OrderGateway for FakeBroker {
        async fn submit(&self, intent: TradeIntent) -> Result<OrderResult> {
            let status = self.next_status.lock().unwrap().take().unwrap_or(Ok(OrderStatus::Filled));
            let id = intent.id().to_string();
            let price = if self.omit_fill_price { 0.0 } else { intent.entry_price_hint() };
            let volume = intent.volume();
            self.submitted.lock().unwrap().push(intent);
            let status = status?;
            Ok(OrderResult {
                order_id: id,
                status,
                fill_price: price,
                volume,
            })
        }

        async fn open_positions(&self, _symbol: &str) -> Result<Vec<Position>> {
            Ok(self.positions.lock().unwrap().clone())
        }
    }

    async fn engine(broker: &Arc<FakeBroker>) -> DecisionEngine {
        DecisionEngine::connect(&config(), broker.clone()).await.unwrap()
    }

    fn open_position(tag: u64) -> Position {
        Position {
            id: "p".into(),
            symbol: "TEST".into(),
            side: OrderSide::Buy,
            entry_price: 100.0,
            volume: 1.0,
            stop_loss: 98.0,
            take_profit: 104.0,
            tag,
            opened_at: at(1, 0),
        }
    }

    fn reason(outcome: &TickOutcome) -> SkipReason {
        match outcome {
            TickOutcome::NoTrade { reason, .. } => reason.clone(),
            TickOutcome::Filled(_) => panic!("expected no trade, got fill"),
        }
    }

    // ── Tests ─────────────────────────────────────────────────────────────────

    #[tokio::test]
    async fn full_pipeline_submits_sized_intent() {
        let broker = Arc::new(FakeBroker::new());
        let mut engine = engine(&broker).await;

        let outcome = engine.on_tick(at(1, 10), true, &FixedFeed::entry()).await;
        let TickOutcome::Filled(fill) = outcome else {
            panic!("expected fill, got {outcome:?}");
        };
        assert_eq!(fill.stop_loss, 98.5);
        assert_eq!(fill.take_profit, 103.0);
        assert_eq!(fill.volume, 1.33);
        assert_eq!(fill.tag, 42);

        let submitted = broker.submitted.lock().unwrap();
        assert_eq!(submitted.len(), 1);
        assert_eq!(submitted[0].side(), OrderSide::Buy);
        assert_eq!(submitted[0].client_tag(), 42);
        assert_eq!(submitted[0].max_slippage_points(), 10);
        assert_eq!(engine.state().last_trade_at(), Some(at(1, 10)));
    }

    #[tokio::test]
    async fn trading_not_allowed_stays_idle() {
        let broker = Arc::new(FakeBroker::new());
        let mut engine = engine(&broker).await;
        let outcome = engine.on_tick(at(1, 10), false, &FixedFeed::entry()).await;
        assert_eq!(outcome.stage(), DecisionStage::Idle);
        assert_eq!(reason(&outcome), SkipReason::TradingNotAllowed);
        assert_eq!(broker.submissions(), 0);
    }

    #[tokio::test]
    async fn one_trade_per_calendar_day() {
        let broker = Arc::new(FakeBroker::new());
        let mut engine = engine(&broker).await;
        let feed = FixedFeed::entry();

        assert!(engine.on_tick(at(1, 10), true, &feed).await.is_filled());
        let second = engine.on_tick(at(1, 23), true, &feed).await;
        assert_eq!(reason(&second), SkipReason::TradedToday);
        assert_eq!(broker.submissions(), 1);

        assert!(engine.on_tick(at(2, 0), true, &feed).await.is_filled());
        assert_eq!(broker.submissions(), 2);
    }

    #[tokio::test]
    async fn open_tagged_position_blocks_entry() {
        let broker = Arc::new(FakeBroker::new());
        broker.positions.lock().unwrap().push(open_position(42));
        let mut engine = engine(&broker).await;
        let outcome = engine.on_tick(at(1, 10), true, &FixedFeed::entry()).await;
        assert_eq!(reason(&outcome), SkipReason::PositionOpen);
    }

    #[tokio::test]
    async fn position_with_other_tag_is_ignored() {
        let broker = Arc::new(FakeBroker::new());
        broker.positions.lock().unwrap().push(open_position(7));
        let mut engine = engine(&broker).await;
        assert!(engine.on_tick(at(1, 10), true, &FixedFeed::entry()).await.is_filled());
    }

    #[tokio::test]
    async fn no_signal_stays_idle() {
        let broker = Arc::new(FakeBroker::new());
        let mut engine = engine(&broker).await;
        let feed = FixedFeed {
            signal: false,
            ..FixedFeed::entry()
        };
        let outcome = engine.on_tick(at(1, 10), true, &feed).await;
        assert_eq!(outcome.stage(), DecisionStage::AwaitingSignal);
        assert_eq!(reason(&outcome), SkipReason::NoSignal);
    }

    #[tokio::test]
    async fn insufficient_history_is_data_unavailable() {
        let broker = Arc::new(FakeBroker::new());
        let mut engine = engine(&broker).await;
        let feed = FixedFeed {
            history: Err(FeedError::InsufficientHistory { have: 10, need: 53 }),
            ..FixedFeed::entry()
        };
        let outcome = engine.on_tick(at(1, 10), true, &feed).await;
        assert!(matches!(reason(&outcome), SkipReason::DataUnavailable(_)));
    }

    #[tokio::test]
    async fn zero_volatility_halts_pipeline() {
        let broker = Arc::new(FakeBroker::new());
        let mut engine = engine(&broker).await;
        let feed = FixedFeed {
            volatility: Ok(0.0),
            ..FixedFeed::entry()
        };
        let outcome = engine.on_tick(at(1, 10), true, &feed).await;
        assert!(matches!(reason(&outcome), SkipReason::InvalidComputation(_)));
        assert_eq!(broker.submissions(), 0);
    }

    #[tokio::test]
    async fn unaffordable_minimum_lot_is_policy_rejection() {
        let broker = Arc::new(FakeBroker {
            equity: 10.0,
            ..FakeBroker::new()
        });
        let mut engine = engine(&broker).await;
        let outcome = engine.on_tick(at(1, 10), true, &FixedFeed::entry()).await;
        assert_eq!(outcome.stage(), DecisionStage::ParametersComputed);
        assert!(matches!(reason(&outcome), SkipReason::PolicyRejection(_)));
    }

    #[tokio::test]
    async fn stops_rechecked_against_fresh_quote() {
        let broker = Arc::new(FakeBroker::new());
        // Levels computed at ask 100.0 (sl 98.5); by submission the ask fell
        // to 98.55, 5 points above the stop with a 10 point minimum.
        *broker.quotes.lock().unwrap() =
            VecDeque::from([quote(99.98, 100.0), quote(98.53, 98.55)]);
        let mut engine = engine(&broker).await;
        let outcome = engine.on_tick(at(1, 10), true, &FixedFeed::entry()).await;
        assert_eq!(outcome.stage(), DecisionStage::Sized);
        assert!(matches!(reason(&outcome), SkipReason::PolicyRejection(_)));
        assert_eq!(broker.submissions(), 0);
    }

    #[tokio::test]
    async fn invalid_fresh_quote_halts_before_submit() {
        let broker = Arc::new(FakeBroker::new());
        // Bid vanished between sizing and submission.
        *broker.quotes.lock().unwrap() =
            VecDeque::from([quote(99.98, 100.0), quote(0.0, 100.0)]);
        let mut engine = engine(&broker).await;
        let outcome = engine.on_tick(at(1, 10), true, &FixedFeed::entry()).await;
        assert_eq!(outcome.stage(), DecisionStage::Sized);
        assert!(matches!(reason(&outcome), SkipReason::InvalidComputation(_)));
        assert_eq!(broker.submissions(), 0);
        assert_eq!(engine.state().last_trade_at(), None);
    }

    #[tokio::test]
    async fn unavailable_volatility_is_data_unavailable() {
        let broker = Arc::new(FakeBroker::new());
        let mut engine = engine(&broker).await;
        let feed = FixedFeed {
            volatility: Err(FeedError::Unavailable("atr buffer not ready".into())),
            ..FixedFeed::entry()
        };
        let outcome = engine.on_tick(at(1, 10), true, &feed).await;
        assert_eq!(outcome.stage(), DecisionStage::AwaitingSignal);
        assert!(matches!(reason(&outcome), SkipReason::DataUnavailable(_)));
        assert_eq!(broker.submissions(), 0);
    }

    #[tokio::test]
    async fn missing_fill_price_falls_back_to_quoted_ask() {
        let broker = Arc::new(FakeBroker {
            omit_fill_price: true,
            ..FakeBroker::new()
        });
        let mut engine = engine(&broker).await;
        let outcome = engine.on_tick(at(1, 10), true, &FixedFeed::entry()).await;
        let TickOutcome::Filled(fill) = outcome else {
            panic!("expected fill, got {outcome:?}");
        };
        assert_eq!(fill.fill_price, 100.0);
        assert_eq!(fill.volume, 1.33);
    }

    #[tokio::test]
    async fn gateway_rejection_leaves_state_untouched() {
        let broker = Arc::new(FakeBroker::new());
        *broker.next_status.lock().unwrap() = Some(Ok(OrderStatus::Rejected(RejectCode::Requote)));
        let (tx, mut rx) = mpsc::channel(8);
        let mut engine = engine(&broker).await.with_events(tx);
        let feed = FixedFeed::entry();

        let outcome = engine.on_tick(at(1, 10), true, &feed).await;
        assert_eq!(outcome.stage(), DecisionStage::Rejected);
        assert_eq!(reason(&outcome), SkipReason::GatewayRejected(RejectCode::Requote));
        assert_eq!(engine.state().last_trade_at(), None);
        assert!(matches!(
            rx.try_recv(),
            Ok(DecisionEvent::OrderRejected { code: RejectCode::Requote, .. })
        ));

        // Same day retry goes through.
        assert!(engine.on_tick(at(1, 10) + Duration::minutes(1), true, &feed).await.is_filled());
        assert!(matches!(rx.try_recv(), Ok(DecisionEvent::EntryFilled { .. })));
    }

    #[tokio::test]
    async fn gateway_error_leaves_state_untouched() {
        let broker = Arc::new(FakeBroker::new());
        *broker.next_status.lock().unwrap() = Some(Err(Error::Gateway("timeout".into())));
        let mut engine = engine(&broker).await;
        let outcome = engine.on_tick(at(1, 10), true, &FixedFeed::entry()).await;
        assert_eq!(outcome.stage(), DecisionStage::Submitted);
        assert!(matches!(reason(&outcome), SkipReason::GatewayError(_)));
        assert_eq!(engine.state().last_trade_at(), None);
    }

    #[tokio::test]
    async fn partial_fill_counts_as_trade() {
        let broker = Arc::new(FakeBroker::new());
        *broker.next_status.lock().unwrap() = Some(Ok(OrderStatus::PartiallyFilled));
        let mut engine = engine(&broker).await;
        assert!(engine.on_tick(at(1, 10), true, &FixedFeed::entry()).await.is_filled());
        assert!(engine.state().traded_on_day_of(at(1, 23)));
        assert!(!engine.state().traded_on_day_of(at(2, 0)));
    }
}
