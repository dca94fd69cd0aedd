pub mod levels;
pub mod rounding;
pub mod sizer;
pub mod stops;

pub use levels::{LevelCalculator, LevelError, TradeLevels};
pub use sizer::{position_size, RiskSizer, SizingError};
pub use stops::{check_stop_levels, validate_stop_levels, StopLevelViolation};

/// Values at or below this are treated as zero (volatility, loss per unit).
pub const EPSILON: f64 = 1e-10;

/// User-configurable risk parameters for one strategy instance.
#[derive(Debug, Clone)]
pub struct RiskConfig {
    /// Percent of equity lost if the stop-loss is hit (e.g. 1.0 = 1%).
    pub risk_percent: f64,
    /// Stop-loss distance in units of volatility.
    pub sl_multiplier: f64,
    /// Take-profit distance as a multiple of the stop-loss distance.
    pub reward_ratio: f64,
}

impl RiskConfig {
    pub fn level_calculator(&self, meta: &common::InstrumentMeta) -> LevelCalculator {
        LevelCalculator::new(self.sl_multiplier, self.reward_ratio, meta)
    }

    pub fn sizer(&self) -> RiskSizer {
        RiskSizer::new(self.risk_percent)
    }
}
