pub mod atr;
pub mod ema;
pub mod macd;

pub use atr::AtrIndicator;
pub use ema::{ema_series, sma_series};
pub use macd::MacdIndicator;
