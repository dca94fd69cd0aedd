use common::OscillatorSample;

use super::ema::{ema_series, sma_series};

/// MACD (Moving Average Convergence/Divergence) indicator.
///
/// Main line = EMA(fast) − EMA(slow) of closes. Signal line = SMA of the main
/// line over `signal` bars.
#[derive(Debug, Clone)]
pub struct MacdIndicator {
    pub fast: usize,
    pub slow: usize,
    pub signal: usize,
}

impl MacdIndicator {
    pub fn new(fast: usize, slow: usize, signal: usize) -> Self {
        assert!(
            fast > 0 && signal > 0,
            "MACD periods must be positive"
        );
        assert!(
            fast < slow,
            "MACD fast period must be less than slow period"
        );
        Self { fast, slow, signal }
    }

    /// Closes needed to produce `count` samples.
    pub fn min_bars(&self, count: usize) -> usize {
        self.slow + self.signal + count.max(1) - 2
    }

    /// Compute the full sample series from close prices (oldest first).
    /// The last element belongs to the last close. Empty if there isn't
    /// enough data for a single sample.
    pub fn series(&self, closes: &[f64]) -> Vec<OscillatorSample> {
        if closes.len() < self.min_bars(1) {
            return Vec::new();
        }

        let fast_ema = ema_series(closes, self.fast);
        let slow_ema = ema_series(closes, self.slow);

        // slow_ema[i] belongs to closes[i + slow - 1]; align fast_ema to it.
        let offset = self.slow - self.fast;
        let main: Vec<f64> = slow_ema
            .iter()
            .enumerate()
            .map(|(i, slow_val)| fast_ema[i + offset] - slow_val)
            .collect();

        let signal = sma_series(&main, self.signal);
        let lag = self.signal - 1;
        signal
            .iter()
            .enumerate()
            .map(|(i, &sig)| OscillatorSample::new(main[i + lag], sig))
            .collect()
    }
}
