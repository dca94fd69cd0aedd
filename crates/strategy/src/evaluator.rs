use common::SignalSnapshot;

/// The three entry conditions, evaluated on one snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EntryConditions {
    /// Histogram and signal line both below zero on the last closed bar.
    pub momentum_exhausted: bool,
    /// Histogram positive on the two bars before it.
    pub prior_bullish_cycle: bool,
    /// Last closed bar is bullish and closed above the trend line.
    pub bullish_above_trend: bool,
}

impl EntryConditions {
    pub fn all(&self) -> bool {
        self.momentum_exhausted && self.prior_bullish_cycle && self.bullish_above_trend
    }
}

/// Long-entry signal: a bullish MACD cycle that has just flipped negative
/// below the zero line, confirmed by a bullish bar above the trend filter.
#[derive(Debug, Clone, Copy, Default)]
pub struct SignalEvaluator;

impl SignalEvaluator {
    pub fn new() -> Self {
        Self
    }

    /// Returns `None` if the snapshot is too short to judge.
    pub fn conditions(&self, snapshot: &SignalSnapshot) -> Option<EntryConditions> {
        if snapshot.oscillator.len() < SignalSnapshot::OSCILLATOR_BARS
            || snapshot.trend.len() < SignalSnapshot::TREND_BARS
            || snapshot.bars.len() < SignalSnapshot::PRICE_BARS
        {
            return None;
        }

        let bar1 = &snapshot.bars[0];
        let osc1 = &snapshot.oscillator[0];
        let osc2 = &snapshot.oscillator[1];
        let osc3 = &snapshot.oscillator[2];

        Some(EntryConditions {
            momentum_exhausted: osc1.histogram() < 0.0 && osc1.signal < 0.0,
            prior_bullish_cycle: osc2.histogram() > 0.0 && osc3.histogram() > 0.0,
            bullish_above_trend: bar1.is_bullish() && bar1.close > snapshot.trend[0],
        })
    }

    /// True when every entry condition holds. Short or empty snapshots are
    /// never a signal.
    pub fn evaluate(&self, snapshot: &SignalSnapshot) -> bool {
        self.conditions(snapshot).is_some_and(|c| c.all())
    }
}
