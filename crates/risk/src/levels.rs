use thiserror::Error;

use common::InstrumentMeta;

use crate::rounding::{round_price, to_decimal, to_f64};

/// Why stop-loss/take-profit levels could not be derived.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum LevelError {
    #[error("invalid volatility {0}")]
    InvalidVolatility(f64),

    #[error("invalid ask {0}")]
    InvalidAsk(f64),

    #[error("distance too small: sl {sl_distance}, tp {tp_distance}, point {point_size}")]
    DistanceTooSmall {
        sl_distance: f64,
        tp_distance: f64,
        point_size: f64,
    },

    #[error("degenerate levels after rounding: sl {stop_loss}, ask {ask}, tp {take_profit}")]
    DegenerateLevels {
        stop_loss: f64,
        ask: f64,
        take_profit: f64,
    },
}

/// Protective levels for a long entry at `ask`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TradeLevels {
    pub sl_distance: f64,
    pub tp_distance: f64,
    pub stop_loss: f64,
    pub take_profit: f64,
}

/// Turns a volatility reading into stop-loss/take-profit prices.
#[derive(Debug, Clone)]
pub struct LevelCalculator {
    sl_multiplier: f64,
    reward_ratio: f64,
    point_size: f64,
    price_digits: u32,
}

impl LevelCalculator {
    pub fn new(sl_multiplier: f64, reward_ratio: f64, meta: &InstrumentMeta) -> Self {
        Self {
            sl_multiplier,
            reward_ratio,
            point_size: meta.point_size,
            price_digits: meta.price_digits,
        }
    }

    /// `sl = volatility × sl_multiplier`, `tp = sl × reward_ratio`, prices
    /// rounded half away from zero at the instrument's precision.
    ///
    /// On success `stop_loss < ask < take_profit`.
    pub fn compute(&self, volatility: f64, ask: f64) -> Result<TradeLevels, LevelError> {
        if !(volatility > 0.0 && volatility.is_finite()) {
            return Err(LevelError::InvalidVolatility(volatility));
        }
        if !(ask > 0.0 && ask.is_finite()) {
            return Err(LevelError::InvalidAsk(ask));
        }

        let Some(levels) = self.levels_at(volatility, ask) else {
            return Err(LevelError::DegenerateLevels {
                stop_loss: f64::NAN,
                ask,
                take_profit: f64::NAN,
            });
        };
        let min_distance = self.point_size * 0.1;
        if !(levels.sl_distance > min_distance && levels.tp_distance > min_distance) {
            return Err(LevelError::DistanceTooSmall {
                sl_distance: levels.sl_distance,
                tp_distance: levels.tp_distance,
                point_size: self.point_size,
            });
        }
        if !(levels.stop_loss < ask && levels.take_profit > ask && levels.take_profit.is_finite()) {
            return Err(LevelError::DegenerateLevels {
                stop_loss: levels.stop_loss,
                ask,
                take_profit: levels.take_profit,
            });
        }
        Ok(levels)
    }

    /// Distances and prices in `Decimal`. `None` if an input or result falls
    /// outside `Decimal`'s range.
    fn levels_at(&self, volatility: f64, ask: f64) -> Option<TradeLevels> {
        let ask = to_decimal(ask)?;
        let sl_distance = to_decimal(volatility)?.checked_mul(to_decimal(self.sl_multiplier)?)?;
        let tp_distance = sl_distance.checked_mul(to_decimal(self.reward_ratio)?)?;
        let stop_loss = round_price(ask.checked_sub(sl_distance)?, self.price_digits);
        let take_profit = round_price(ask.checked_add(tp_distance)?, self.price_digits);
        Some(TradeLevels {
            sl_distance: to_f64(sl_distance)?,
            tp_distance: to_f64(tp_distance)?,
            stop_loss: to_f64(stop_loss)?,
            take_profit: to_f64(take_profit)?,
        })
    }
}
