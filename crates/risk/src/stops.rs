use thiserror::Error;

/// Why proposed stops break the broker's stop-level rules.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum StopLevelViolation {
    #[error("non-positive price in ask {ask} / bid {bid} / sl {stop_loss} / tp {take_profit}")]
    NonPositivePrice {
        ask: f64,
        bid: f64,
        stop_loss: f64,
        take_profit: f64,
    },

    #[error("stop-loss {stop_loss} not below ask {ask}")]
    StopLossNotBelowAsk { stop_loss: f64, ask: f64 },

    #[error("take-profit {take_profit} not above ask {ask}")]
    TakeProfitNotAboveAsk { take_profit: f64, ask: f64 },

    #[error("stop-loss {distance} from ask, broker minimum {min_distance}")]
    StopLossTooClose { distance: f64, min_distance: f64 },

    #[error("take-profit {distance} from ask, broker minimum {min_distance}")]
    TakeProfitTooClose { distance: f64, min_distance: f64 },
}

/// Check long-entry stops against the broker minimum stop distance.
///
/// Distances within a tenth of a point short of the minimum still pass, so an
/// exact-limit stop is not rejected over float noise.
pub fn check_stop_levels(
    ask: f64,
    bid: f64,
    stop_loss: f64,
    take_profit: f64,
    min_stop_distance_points: i64,
    point_size: f64,
) -> Result<(), StopLevelViolation> {
    if !(ask > 0.0 && bid > 0.0 && stop_loss > 0.0 && take_profit > 0.0) {
        return Err(StopLevelViolation::NonPositivePrice {
            ask,
            bid,
            stop_loss,
            take_profit,
        });
    }
    if stop_loss >= ask {
        return Err(StopLevelViolation::StopLossNotBelowAsk { stop_loss, ask });
    }
    if take_profit <= ask {
        return Err(StopLevelViolation::TakeProfitNotAboveAsk { take_profit, ask });
    }
    if min_stop_distance_points <= 0 {
        return Ok(());
    }

    let min_distance = min_stop_distance_points as f64 * point_size;
    let tolerance = point_size * 0.1;

    let sl_distance = ask - stop_loss;
    if sl_distance < min_distance - tolerance {
        return Err(StopLevelViolation::StopLossTooClose {
            distance: sl_distance,
            min_distance,
        });
    }
    let tp_distance = take_profit - ask;
    if tp_distance < min_distance - tolerance {
        return Err(StopLevelViolation::TakeProfitTooClose {
            distance: tp_distance,
            min_distance,
        });
    }
    Ok(())
}

/// Boolean form of [`check_stop_levels`].
pub fn validate_stop_levels(
    ask: f64,
    bid: f64,
    stop_loss: f64,
    take_profit: f64,
    min_stop_distance_points: i64,
    point_size: f64,
) -> bool {
    check_stop_levels(ask, bid, stop_loss, take_profit, min_stop_distance_points, point_size)
        .is_ok()
}
