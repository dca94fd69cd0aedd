pub mod config;
pub mod error;
pub mod exchange;
pub mod feed;
pub mod types;

pub use config::Config;
pub use error::{Error, FeedError, Result};
pub use exchange::{AccountInfo, OrderGateway, PriceFeed};
pub use feed::{IndicatorFeed, SignalSnapshot};
pub use types::*;
