use crate::{Bar, FeedError, OscillatorSample};

/// Closed-bar indicator data. Index 0 is always the most recently closed bar.
pub trait IndicatorFeed: Send + Sync {
    /// The last `count` MACD samples, newest first.
    fn oscillator(&self, count: usize) -> Result<Vec<OscillatorSample>, FeedError>;

    /// The last `count` trend moving-average values, newest first.
    fn trend(&self, count: usize) -> Result<Vec<f64>, FeedError>;

    /// ATR on the most recently closed bar.
    fn volatility(&self) -> Result<f64, FeedError>;

    /// The last `count` closed bars, newest first.
    fn bars(&self, count: usize) -> Result<Vec<Bar>, FeedError>;

    /// Read everything the signal evaluator needs in one call, so every
    /// condition sees the same bars.
    fn signal_snapshot(&self) -> Result<SignalSnapshot, FeedError> {
        Ok(SignalSnapshot {
            oscillator: self.oscillator(SignalSnapshot::OSCILLATOR_BARS)?,
            trend: self.trend(SignalSnapshot::TREND_BARS)?,
            bars: self.bars(SignalSnapshot::PRICE_BARS)?,
        })
    }
}

/// Samples read together for one signal evaluation, newest first.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct SignalSnapshot {
    pub oscillator: Vec<OscillatorSample>,
    pub trend: Vec<f64>,
    pub bars: Vec<Bar>,
}

impl SignalSnapshot {
    pub const OSCILLATOR_BARS: usize = 3;
    pub const TREND_BARS: usize = 2;
    pub const PRICE_BARS: usize = 1;
}
