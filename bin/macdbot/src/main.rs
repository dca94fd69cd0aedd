use std::collections::HashMap;
use std::sync::Arc;

use sqlx::SqlitePool;
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::sync::mpsc;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use common::{AccountInfo, Config, DecisionEvent, EngineCommand, MarketEvent};
use engine::{DecisionEngine, Engine, EngineHandle, TradeJournal};
use paper::PaperBroker;
use strategy::{BarHistory, StrategyFileConfig};

#[tokio::main]
async fn main() {
    // ── Logging ──────────────────────────────────────────────────────────────
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("info".parse().unwrap()))
        .init();

    // ── Config ────────────────────────────────────────────────────────────────
    let cfg = Config::from_env();
    info!(config = %cfg.strategy_config_path, ticks = %cfg.tick_source, "MacdBot starting");

    let strategy_file = StrategyFileConfig::load(&cfg.strategy_config_path)
        .unwrap_or_else(|e| panic!("Failed to load strategy config: {e}"));

    // ── Database ──────────────────────────────────────────────────────────────
    let db = SqlitePool::connect(&cfg.database_url)
        .await
        .unwrap_or_else(|e| panic!("Failed to connect to database: {e}"));
    sqlx::migrate!("../../migrations")
        .run(&db)
        .await
        .unwrap_or_else(|e| panic!("Database migration failed: {e}"));
    info!("Database ready");

    // ── Paper broker ──────────────────────────────────────────────────────────
    let broker = Arc::new(PaperBroker::new(
        cfg.paper_equity,
        cfg.paper_slippage_bps,
        strategy_file
            .instruments
            .iter()
            .map(|i| (i.symbol.clone(), i.meta)),
    ));

    // ── Journal ───────────────────────────────────────────────────────────────
    let (event_tx, event_rx) = mpsc::channel::<DecisionEvent>(128);
    let journal_task = tokio::spawn(TradeJournal::new(db.clone()).run(event_rx));

    // ── Engines (one per strategy) ────────────────────────────────────────────
    let mut handles: HashMap<String, EngineHandle> = HashMap::new();
    let mut engine_tasks = Vec::new();
    for strategy in &strategy_file.strategies {
        let decisions = DecisionEngine::connect(strategy, broker.clone())
            .await
            .unwrap_or_else(|e| panic!("Strategy '{}' cannot start: {e}", strategy.name))
            .with_events(event_tx.clone());
        let (engine, handle) = Engine::new(decisions, BarHistory::new(strategy));
        engine_tasks.push(tokio::spawn(engine.run()));
        if !handle.send(EngineCommand::Start).await {
            error!(symbol = %strategy.symbol, "Engine exited before start");
        }
        handles.insert(strategy.symbol.clone(), handle);
    }
    drop(event_tx);
    info!(engines = handles.len(), "All engines started");

    // ── Tick driver ───────────────────────────────────────────────────────────
    let source = open_tick_source(&cfg.tick_source)
        .await
        .unwrap_or_else(|e| panic!("Failed to open tick source '{}': {e}", cfg.tick_source));

    tokio::select! {
        _ = drive_ticks(source, &broker, &handles) => {
            info!("Tick source exhausted. Draining engines.");
        }
        _ = tokio::signal::ctrl_c() => {
            info!("Shutdown signal received. Stopping engines.");
            for handle in handles.values() {
                handle.send(EngineCommand::Stop).await;
            }
        }
    }

    drop(handles);
    for task in engine_tasks {
        if let Err(e) = task.await {
            error!("Engine task failed: {e}");
        }
    }
    if let Err(e) = journal_task.await {
        error!("Journal task failed: {e}");
    }

    let equity = broker.equity().await.unwrap_or_default();
    info!(equity = equity, "Exiting.");
}

type TickSource = Box<dyn AsyncRead + Unpin + Send>;

/// `-` reads stdin; anything else is a file path.
async fn open_tick_source(path: &str) -> common::Result<TickSource> {
    if path == "-" {
        return Ok(Box::new(tokio::io::stdin()));
    }
    Ok(Box::new(tokio::fs::File::open(path).await?))
}

fn parse_tick(line: &str) -> common::Result<MarketEvent> {
    Ok(serde_json::from_str(line)?)
}

/// Read JSON-encoded market events line by line, mark the paper broker to
/// each quote, then route the event to its symbol's engine.
async fn drive_ticks(
    source: TickSource,
    broker: &PaperBroker,
    handles: &HashMap<String, EngineHandle>,
) {
    let mut lines = BufReader::new(source).lines();
    let mut line_no = 0usize;
    loop {
        let line = match lines.next_line().await {
            Ok(Some(line)) => line,
            Ok(None) => break,
            Err(e) => {
                error!("Failed to read tick source: {e}");
                break;
            }
        };
        line_no += 1;
        if line.trim().is_empty() {
            continue;
        }

        let event = match parse_tick(&line) {
            Ok(event) => event,
            Err(e) => {
                warn!(line = line_no, "Skipping malformed tick: {e}");
                continue;
            }
        };

        broker.update_quote(&event.symbol, event.quote()).await;

        match handles.get(&event.symbol) {
            Some(handle) => {
                if !handle.publish(event).await {
                    warn!(symbol = %handle.symbol(), "Engine stopped; tick dropped");
                }
            }
            None => warn!(symbol = %event.symbol, line = line_no, "No engine for symbol"),
        }
    }
}
