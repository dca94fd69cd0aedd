use std::collections::VecDeque;

use tracing::debug;

use common::{Bar, FeedError, IndicatorFeed, OscillatorSample};

use crate::config::StrategyConfig;
use crate::indicators::{ema_series, AtrIndicator, MacdIndicator};

/// Rolling window of closed bars for one instrument, with the indicators
/// computed over it on demand.
///
/// This is the in-process indicator feed: the engine folds every closed bar
/// into it, and the decision pipeline reads MACD, trend and ATR back out.
/// It is created with its engine and dropped with it.
pub struct BarHistory {
    bars: VecDeque<Bar>,
    capacity: usize,
    macd: MacdIndicator,
    atr: AtrIndicator,
    trend_period: usize,
}

impl BarHistory {
    const MIN_CAPACITY: usize = 500;

    pub fn new(cfg: &StrategyConfig) -> Self {
        Self::with_periods(
            cfg.macd_fast,
            cfg.macd_slow,
            cfg.macd_signal,
            cfg.trend_period,
            cfg.atr_period,
        )
    }

    pub fn with_periods(
        fast: usize,
        slow: usize,
        signal: usize,
        trend_period: usize,
        atr_period: usize,
    ) -> Self {
        assert!(trend_period > 0, "trend period must be positive");
        let macd = MacdIndicator::new(fast, slow, signal);
        let atr = AtrIndicator::new(atr_period);
        // EMAs need a few multiples of their period to settle.
        let longest = slow.max(trend_period).max(atr_period);
        let capacity = (longest * 3 + signal + 3).max(Self::MIN_CAPACITY);
        Self {
            bars: VecDeque::with_capacity(capacity),
            capacity,
            macd,
            atr,
            trend_period,
        }
    }

    /// Append a closed bar. Bars at or before the last stored bar's time are
    /// ignored so a replayed bar cannot shift the indices.
    pub fn push(&mut self, bar: Bar) -> bool {
        if let Some(last) = self.bars.back() {
            if bar.time <= last.time {
                debug!(time = %bar.time, last = %last.time, "Ignoring stale bar");
                return false;
            }
        }
        self.bars.push_back(bar);
        if self.bars.len() > self.capacity {
            self.bars.pop_front();
        }
        true
    }

    pub fn len(&self) -> usize {
        self.bars.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bars.is_empty()
    }

    /// `max(slow, trend) + 3` closed bars.
    pub fn min_signal_bars(&self) -> usize {
        self.macd.slow.max(self.trend_period) + 3
    }

    fn require(&self, need: usize) -> Result<(), FeedError> {
        if self.bars.len() < need {
            Err(FeedError::InsufficientHistory {
                have: self.bars.len(),
                need,
            })
        } else {
            Ok(())
        }
    }

    fn closes(&self) -> Vec<f64> {
        self.bars.iter().map(|b| b.close).collect()
    }
}

/// Last `count` items of an oldest-first series, newest first.
fn newest_first<T: Copy>(series: &[T], count: usize) -> Vec<T> {
    series.iter().rev().take(count).copied().collect()
}

impl IndicatorFeed for BarHistory {
    fn oscillator(&self, count: usize) -> Result<Vec<OscillatorSample>, FeedError> {
        self.require(self.min_signal_bars().max(self.macd.min_bars(count)))?;
        let series = self.macd.series(&self.closes());
        Ok(newest_first(&series, count))
    }

    fn trend(&self, count: usize) -> Result<Vec<f64>, FeedError> {
        self.require(
            self.min_signal_bars()
                .max(self.trend_period + count.max(1) - 1),
        )?;
        let series = ema_series(&self.closes(), self.trend_period);
        Ok(newest_first(&series, count))
    }

    fn volatility(&self) -> Result<f64, FeedError> {
        self.require(self.atr.min_bars())?;
        let bars: Vec<Bar> = self.bars.iter().copied().collect();
        match self.atr.compute(&bars) {
            Some(value) if value.is_finite() => Ok(value),
            Some(value) => Err(FeedError::Unavailable(format!("ATR is {value}"))),
            None => Err(FeedError::Unavailable("ATR not computed".into())),
        }
    }

    fn bars(&self, count: usize) -> Result<Vec<Bar>, FeedError> {
        self.require(count)?;
        Ok(self.bars.iter().rev().take(count).copied().collect())
    }
}
