use std::sync::Arc;

use tokio::sync::{mpsc, RwLock};
use tracing::{info, warn};

use common::{EngineCommand, EngineState, MarketEvent};
use strategy::BarHistory;

use crate::orchestrator::{DecisionEngine, TickOutcome};

/// Cloneable handle for driving one engine from other tasks.
#[derive(Clone)]
pub struct EngineHandle {
    symbol: String,
    command_tx: mpsc::Sender<EngineCommand>,
    state: Arc<RwLock<EngineState>>,
    market_tx: mpsc::Sender<MarketEvent>,
}

impl EngineHandle {
    pub fn symbol(&self) -> &str {
        &self.symbol
    }

    /// Queue a lifecycle command. Returns false once the engine has shut down.
    pub async fn send(&self, cmd: EngineCommand) -> bool {
        if let Err(mpsc::error::SendError(cmd)) = self.command_tx.send(cmd).await {
            warn!(symbol = %self.symbol, ?cmd, "Engine has shut down; command dropped");
            return false;
        }
        true
    }

    pub async fn state(&self) -> EngineState {
        *self.state.read().await
    }

    /// Queue a market event. Returns false once the engine has shut down.
    pub async fn publish(&self, event: MarketEvent) -> bool {
        self.market_tx.send(event).await.is_ok()
    }
}

/// Event loop for one instrument: applies lifecycle commands and runs the
/// decision pipeline once per market event, in arrival order.
pub struct Engine {
    symbol: String,
    state: Arc<RwLock<EngineState>>,
    history: BarHistory,
    decisions: DecisionEngine,
    command_rx: mpsc::Receiver<EngineCommand>,
    market_rx: mpsc::Receiver<MarketEvent>,
}

impl Engine {
    pub fn new(decisions: DecisionEngine, history: BarHistory) -> (Self, EngineHandle) {
        let (command_tx, command_rx) = mpsc::channel(32);
        let (market_tx, market_rx) = mpsc::channel(1024);
        let state = Arc::new(RwLock::new(EngineState::Stopped));
        let symbol = decisions.symbol().to_string();

        let handle = EngineHandle {
            symbol: symbol.clone(),
            command_tx,
            state: state.clone(),
            market_tx,
        };

        let engine = Engine {
            symbol,
            state,
            history,
            decisions,
            command_rx,
            market_rx,
        };

        (engine, handle)
    }

    /// Run until every handle is dropped. Call from `tokio::spawn`.
    ///
    /// Pending commands are applied before the next market event.
    pub async fn run(mut self) {
        info!(symbol = %self.symbol, "Engine initialized in Stopped state. Waiting for Start command.");

        let mut commands_open = true;
        loop {
            tokio::select! {
                biased;

                cmd = self.command_rx.recv(), if commands_open => match cmd {
                    Some(cmd) => self.apply(cmd).await,
                    None => commands_open = false,
                },

                event = self.market_rx.recv() => match event {
                    Some(event) => {
                        self.handle_market_event(event).await;
                    }
                    None => {
                        warn!(symbol = %self.symbol, "Market channel closed, shutting down");
                        break;
                    }
                },
            }
        }
    }

    async fn apply(&mut self, cmd: EngineCommand) {
        let current = *self.state.read().await;
        let next = match (cmd, current) {
            (EngineCommand::Start, EngineState::Running) => {
                info!(symbol = %self.symbol, "Engine already running");
                return;
            }
            (EngineCommand::Start, _) => EngineState::Running,
            (EngineCommand::Stop, _) => EngineState::Stopped,
            (EngineCommand::Pause, EngineState::Running) => EngineState::Paused,
            (EngineCommand::Resume, EngineState::Paused) => EngineState::Running,
            (cmd, state) => {
                warn!(symbol = %self.symbol, ?cmd, %state, "Command ignored in current state");
                return;
            }
        };
        info!(symbol = %self.symbol, from = %current, to = %next, "Engine state changed");
        *self.state.write().await = next;
    }

    /// Fold a closed bar into history, then run one decision tick.
    pub async fn handle_market_event(&mut self, event: MarketEvent) -> Option<TickOutcome> {
        if event.symbol != self.symbol {
            warn!(expected = %self.symbol, got = %event.symbol, "Market event for another symbol dropped");
            return None;
        }
        if let Some(bar) = event.closed_bar {
            self.history.push(bar);
        }

        let allowed = self.state.read().await.trading_allowed();
        Some(
            self.decisions
                .on_tick(event.time, allowed, &self.history)
                .await,
        )
    }

    pub fn history(&self) -> &BarHistory {
        &self.history
    }
}
