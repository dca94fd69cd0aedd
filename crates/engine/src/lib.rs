pub mod journal;
pub mod lifecycle;
pub mod orchestrator;

pub use journal::{FillMarker, TradeJournal};
pub use lifecycle::{Engine, EngineHandle};
pub use orchestrator::{DecisionEngine, StrategyState, TickOutcome};
