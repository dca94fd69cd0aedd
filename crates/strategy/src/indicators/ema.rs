/// Exponential moving average over every window of `values` (oldest first).
///
/// Seeded with the SMA of the first `period` values, so the output has
/// `values.len() - period + 1` entries and `out[i]` lines up with
/// `values[i + period - 1]`. Empty when there are fewer than `period` values.
pub fn ema_series(values: &[f64], period: usize) -> Vec<f64> {
    if period == 0 || values.len() < period {
        return Vec::new();
    }
    let k = 2.0 / (period as f64 + 1.0);

    let seed = values[..period].iter().sum::<f64>() / period as f64;
    let mut out = Vec::with_capacity(values.len() - period + 1);
    out.push(seed);

    let mut ema_val = seed;
    for &value in &values[period..] {
        ema_val = value * k + ema_val * (1.0 - k);
        out.push(ema_val);
    }
    out
}

/// Simple moving average over every window of `values`, aligned like
/// [`ema_series`].
pub fn sma_series(values: &[f64], period: usize) -> Vec<f64> {
    if period == 0 || values.len() < period {
        return Vec::new();
    }
    values
        .windows(period)
        .map(|w| w.iter().sum::<f64>() / period as f64)
        .collect()
}
