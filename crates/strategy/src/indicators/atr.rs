use common::Bar;

/// ATR (Average True Range) with Wilder smoothing.
///
/// Returns `None` until at least `period + 1` bars are available, since the
/// first true range needs a previous close.
#[derive(Debug, Clone)]
pub struct AtrIndicator {
    pub period: usize,
}

impl AtrIndicator {
    pub fn new(period: usize) -> Self {
        assert!(period >= 1, "ATR period must be >= 1");
        Self { period }
    }

    pub fn min_bars(&self) -> usize {
        self.period + 1
    }

    /// Compute ATR on the last bar of `bars` (oldest first).
    pub fn compute(&self, bars: &[Bar]) -> Option<f64> {
        if bars.len() < self.min_bars() {
            return None;
        }

        let true_ranges: Vec<f64> = bars
            .windows(2)
            .map(|w| {
                let prev_close = w[0].close;
                let bar = &w[1];
                let hl = bar.high - bar.low;
                let hc = (bar.high - prev_close).abs();
                let lc = (bar.low - prev_close).abs();
                hl.max(hc).max(lc)
            })
            .collect();

        let period = self.period as f64;
        let mut atr = true_ranges[..self.period].iter().sum::<f64>() / period;
        for &tr in &true_ranges[self.period..] {
            atr = (atr * (period - 1.0) + tr) / period;
        }
        Some(atr)
    }
}
