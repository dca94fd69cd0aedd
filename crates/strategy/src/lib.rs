pub mod config;
pub mod evaluator;
pub mod history;
pub mod indicators;

pub use config::{InstrumentSpec, StrategyConfig, StrategyFileConfig};
pub use evaluator::{EntryConditions, SignalEvaluator};
pub use history::BarHistory;
