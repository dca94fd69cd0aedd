use thiserror::Error;

use common::InstrumentMeta;

use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;

use crate::rounding::{floor_to_step, to_decimal, to_f64};
use crate::EPSILON;

/// Why a position size could not be produced.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum SizingError {
    #[error("invalid equity {0}")]
    InvalidEquity(f64),

    #[error("invalid risk amount {0}")]
    InvalidRisk(f64),

    #[error("invalid stop distance {0}")]
    InvalidStopDistance(f64),

    #[error("degenerate instrument meta: {0}")]
    DegenerateInstrumentMeta(String),

    /// The risk budget cannot afford one minimum lot. A market/account
    /// condition, not bad input.
    #[error("size {size} below minimum volume {volume_min}")]
    BelowMinimumVolume { size: f64, volume_min: f64 },
}

impl SizingError {
    /// Policy rejections reflect account/market conditions; everything else
    /// is an invalid input to the computation.
    pub fn is_policy(&self) -> bool {
        matches!(self, SizingError::BelowMinimumVolume { .. })
    }
}

/// Fixed-fractional sizing: risk `risk_percent` of equity between entry and
/// stop-loss.
#[derive(Debug, Clone)]
pub struct RiskSizer {
    risk_percent: f64,
}

impl RiskSizer {
    pub fn new(risk_percent: f64) -> Self {
        Self { risk_percent }
    }

    pub fn risk_percent(&self) -> f64 {
        self.risk_percent
    }

    pub fn size(
        &self,
        equity: f64,
        sl_distance: f64,
        meta: &InstrumentMeta,
    ) -> Result<f64, SizingError> {
        position_size(equity, self.risk_percent, sl_distance, meta)
    }
}

/// Volume that loses `equity × risk_percent / 100` if the stop is hit.
///
/// Computed in `Decimal`. The raw size is floored to the volume step (never
/// rounded up, so the risk budget is never exceeded), rejected if that falls
/// below the minimum volume, then capped at the maximum volume.
pub fn position_size(
    equity: f64,
    risk_percent: f64,
    sl_distance: f64,
    meta: &InstrumentMeta,
) -> Result<f64, SizingError> {
    if !(equity > 0.0 && equity.is_finite()) {
        return Err(SizingError::InvalidEquity(equity));
    }
    let risk_amount = equity * risk_percent / 100.0;
    if !(risk_amount > 0.0 && risk_amount.is_finite()) {
        return Err(SizingError::InvalidRisk(risk_amount));
    }
    if !(sl_distance > meta.point_size * 0.1 && sl_distance.is_finite()) {
        return Err(SizingError::InvalidStopDistance(sl_distance));
    }

    if !(meta.tick_size > 0.0 && meta.tick_value > 0.0) {
        return Err(SizingError::DegenerateInstrumentMeta(format!(
            "tick size {} / tick value {}",
            meta.tick_size, meta.tick_value
        )));
    }
    if !(meta.volume_step > 0.0 && meta.volume_min > 0.0 && meta.volume_max >= meta.volume_min)
    {
        return Err(SizingError::DegenerateInstrumentMeta(format!(
            "volume step {} / min {} / max {}",
            meta.volume_step, meta.volume_min, meta.volume_max
        )));
    }
    let loss_per_unit = sl_distance / meta.tick_size * meta.tick_value;
    if !(loss_per_unit > EPSILON && loss_per_unit.is_finite()) {
        return Err(SizingError::DegenerateInstrumentMeta(format!(
            "loss per unit {loss_per_unit}"
        )));
    }

    let decimal = |value: f64, what: &str| {
        to_decimal(value).ok_or_else(|| {
            SizingError::DegenerateInstrumentMeta(format!("{what} {value} out of range"))
        })
    };
    let risk_amount = decimal(equity, "equity")?
        .checked_mul(decimal(risk_percent, "risk percent")?)
        .map(|amount| amount / Decimal::ONE_HUNDRED)
        .ok_or(SizingError::InvalidRisk(risk_amount))?;
    let tick_size = decimal(meta.tick_size, "tick size")?;
    let tick_value = decimal(meta.tick_value, "tick value")?;
    let loss_per_unit = decimal(sl_distance, "stop distance")?
        .checked_div(tick_size)
        .and_then(|ticks| ticks.checked_mul(tick_value))
        .ok_or_else(|| SizingError::DegenerateInstrumentMeta("loss per unit overflow".into()))?;
    let step = decimal(meta.volume_step, "volume step")?;
    let volume_min = decimal(meta.volume_min, "volume min")?;
    let volume_max = decimal(meta.volume_max, "volume max")?;

    let raw = risk_amount
        .checked_div(loss_per_unit)
        .ok_or_else(|| SizingError::InvalidRisk(risk_amount.to_f64().unwrap_or(f64::NAN)))?;
    let floored = floor_to_step(raw, step);
    if floored < volume_min {
        return Err(SizingError::BelowMinimumVolume {
            size: to_f64(floored).unwrap_or(0.0),
            volume_min: meta.volume_min,
        });
    }
    let capped = floored.min(volume_max);
    to_f64(capped).ok_or_else(|| SizingError::InvalidRisk(f64::NAN))
}
