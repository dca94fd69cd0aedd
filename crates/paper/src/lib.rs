use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

use common::{
    AccountInfo, Error, InstrumentMeta, OrderGateway, OrderResult, OrderSide, OrderStatus,
    Position, PriceFeed, Quote, RejectCode, Result, TradeIntent,
};
use risk::check_stop_levels;
use risk::rounding::{is_step_multiple, round_to_digits, to_decimal};

/// A position the paper broker closed on a stop-loss or take-profit touch.
#[derive(Debug, Clone)]
pub struct ClosedPosition {
    pub position: Position,
    pub exit_price: f64,
    pub pnl: f64,
}

/// Simulated broker for paper trading.
///
/// Holds quotes, instrument specs, equity and open positions in memory.
/// Entries fill at the ask plus configurable slippage; positions close when
/// the bid touches their stop-loss or take-profit.
pub struct PaperBroker {
    equity: Arc<RwLock<f64>>,
    positions: Arc<RwLock<Vec<Position>>>,
    quotes: Arc<RwLock<HashMap<String, Quote>>>,
    instruments: HashMap<String, InstrumentMeta>,
    /// Slippage in basis points applied to all entry fills.
    slippage_bps: f64,
}

impl PaperBroker {
    pub fn new(
        initial_equity: f64,
        slippage_bps: f64,
        instruments: impl IntoIterator<Item = (String, InstrumentMeta)>,
    ) -> Self {
        let instruments: HashMap<String, InstrumentMeta> = instruments.into_iter().collect();
        info!(
            equity = initial_equity,
            slippage_bps = slippage_bps,
            instruments = instruments.len(),
            "PaperBroker initialized"
        );
        Self {
            equity: Arc::new(RwLock::new(initial_equity)),
            positions: Arc::new(RwLock::new(Vec::new())),
            quotes: Arc::new(RwLock::new(HashMap::new())),
            instruments,
            slippage_bps,
        }
    }

    /// Record the latest quote for a symbol and close any position whose
    /// stop-loss or take-profit the bid has reached.
    pub async fn update_quote(&self, symbol: &str, quote: Quote) -> Vec<ClosedPosition> {
        self.quotes.write().await.insert(symbol.to_string(), quote);

        let Some(meta) = self.instruments.get(symbol) else {
            return Vec::new();
        };

        let mut positions = self.positions.write().await;
        let mut closed = Vec::new();
        let mut i = 0;
        while i < positions.len() {
            let p = &positions[i];
            let hit = p.symbol == symbol
                && p.side == OrderSide::Buy
                && (quote.bid <= p.stop_loss || quote.bid >= p.take_profit);
            if !hit {
                i += 1;
                continue;
            }
            let position = positions.remove(i);
            let exit_price = quote.bid;
            let pnl = (exit_price - position.entry_price) / meta.tick_size
                * meta.tick_value
                * position.volume;
            info!(
                symbol = %position.symbol,
                id = %position.id,
                entry = position.entry_price,
                exit = exit_price,
                pnl = pnl,
                "Paper position closed"
            );
            closed.push(ClosedPosition {
                position,
                exit_price,
                pnl,
            });
        }
        drop(positions);

        if !closed.is_empty() {
            let mut equity = self.equity.write().await;
            *equity += closed.iter().map(|c| c.pnl).sum::<f64>();
        }
        closed
    }

    fn volume_is_valid(volume: f64, meta: &InstrumentMeta) -> bool {
        let (Some(volume), Some(min), Some(max), Some(step)) = (
            to_decimal(volume),
            to_decimal(meta.volume_min),
            to_decimal(meta.volume_max),
            to_decimal(meta.volume_step),
        ) else {
            return false;
        };
        volume >= min && volume <= max && is_step_multiple(volume, step)
    }
}

#[async_trait]
impl PriceFeed for PaperBroker {
    async fn quote(&self, symbol: &str) -> Result<Quote> {
        self.quotes
            .read()
            .await
            .get(symbol)
            .copied()
            .ok_or_else(|| Error::Gateway(format!("No quote available for {symbol}")))
    }
}

#[async_trait]
impl AccountInfo for PaperBroker {
    async fn equity(&self) -> Result<f64> {
        Ok(*self.equity.read().await)
    }

    async fn instrument_meta(&self, symbol: &str) -> Result<InstrumentMeta> {
        self.instruments
            .get(symbol)
            .copied()
            .ok_or_else(|| Error::Gateway(format!("Unknown instrument '{symbol}'")))
    }
}

#[async_trait]
impl OrderGateway for PaperBroker {
    async fn submit(&self, intent: TradeIntent) -> Result<OrderResult> {
        let meta = self.instrument_meta(intent.symbol()).await?;

        let Some(quote) = self.quotes.read().await.get(intent.symbol()).copied() else {
            warn!(symbol = %intent.symbol(), "PaperBroker has no quote; market closed");
            return Ok(OrderResult::rejected(intent.id(), RejectCode::MarketClosed));
        };

        if *self.equity.read().await <= 0.0 {
            return Ok(OrderResult::rejected(intent.id(), RejectCode::NoMoney));
        }
        if !Self::volume_is_valid(intent.volume(), &meta) {
            return Ok(OrderResult::rejected(intent.id(), RejectCode::InvalidVolume));
        }

        // Buys pay the ask plus slippage
        let fill_price = round_to_digits(
            quote.ask * (1.0 + self.slippage_bps / 10_000.0),
            meta.price_digits,
        );
        let slipped_points = (fill_price - intent.entry_price_hint()) / meta.point_size;
        if slipped_points > intent.max_slippage_points() as f64 + 0.5 {
            debug!(
                symbol = %intent.symbol(),
                hint = intent.entry_price_hint(),
                fill = fill_price,
                slipped_points = slipped_points,
                "Paper requote"
            );
            return Ok(OrderResult::rejected(intent.id(), RejectCode::Requote));
        }

        if let Err(violation) = check_stop_levels(
            fill_price,
            quote.bid,
            intent.stop_loss(),
            intent.take_profit(),
            meta.min_stop_distance_points,
            meta.point_size,
        ) {
            debug!(symbol = %intent.symbol(), %violation, "Paper stops rejected");
            return Ok(OrderResult::rejected(intent.id(), RejectCode::InvalidStops));
        }

        debug!(
            symbol = %intent.symbol(),
            ask = quote.ask,
            fill = fill_price,
            volume = intent.volume(),
            "Paper fill simulated"
        );

        self.positions.write().await.push(Position {
            id: intent.id().to_string(),
            symbol: intent.symbol().to_string(),
            side: intent.side(),
            entry_price: fill_price,
            volume: intent.volume(),
            stop_loss: intent.stop_loss(),
            take_profit: intent.take_profit(),
            tag: intent.client_tag(),
            opened_at: quote.time,
        });

        Ok(OrderResult {
            order_id: intent.id().to_string(),
            status: OrderStatus::Filled,
            fill_price,
            volume: intent.volume(),
        })
    }

    async fn open_positions(&self, symbol: &str) -> Result<Vec<Position>> {
        Ok(self
            .positions
            .read()
            .await
            .iter()
            .filter(|p| p.symbol == symbol)
            .cloned()
            .collect())
    }
}
