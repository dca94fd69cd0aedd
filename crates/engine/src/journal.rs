use chrono::{DateTime, Utc};
use sqlx::SqlitePool;
use tokio::sync::mpsc;
use tracing::{error, info, warn};

use common::{DecisionEvent, Fill};

/// A persisted entry marker, read back for charting and audits.
#[derive(Debug, Clone, PartialEq, sqlx::FromRow)]
pub struct FillMarker {
    pub order_id: String,
    pub symbol: String,
    pub side: String,
    pub price: f64,
    pub volume: f64,
    pub stop_loss: f64,
    pub take_profit: f64,
    pub tag: i64,
    pub filled_at: String,
}

impl FillMarker {
    pub fn filled_at(&self) -> Option<DateTime<Utc>> {
        DateTime::parse_from_rfc3339(&self.filled_at)
            .ok()
            .map(|t| t.with_timezone(&Utc))
    }
}

/// Consumes decision events and records a marker for every confirmed entry.
pub struct TradeJournal {
    db: SqlitePool,
}

impl TradeJournal {
    pub fn new(db: SqlitePool) -> Self {
        Self { db }
    }

    /// Run the journal loop until every event sender is dropped.
    /// Call from `tokio::spawn`.
    pub async fn run(self, mut event_rx: mpsc::Receiver<DecisionEvent>) {
        info!("TradeJournal running");
        while let Some(event) = event_rx.recv().await {
            match event {
                DecisionEvent::EntryFilled { fill } => {
                    if let Err(e) = self.record_fill(&fill).await {
                        error!(order_id = %fill.order_id, "Failed to persist fill: {e}");
                    }
                }
                DecisionEvent::OrderRejected { symbol, code } => {
                    warn!(%symbol, %code, "Entry rejected by broker");
                }
                DecisionEvent::OrderFailed { symbol, error } => {
                    error!(%symbol, %error, "Entry submission failed");
                }
            }
        }
        warn!("TradeJournal: event channel closed");
    }

    /// Insert a marker at the fill price. Re-recording the same order is a no-op.
    pub async fn record_fill(&self, fill: &Fill) -> Result<(), sqlx::Error> {
        let side = fill.side.to_string();
        let filled_at = fill.time.to_rfc3339();
        let tag = fill.tag as i64;

        sqlx::query(
            r#"
            INSERT INTO trade_markers
                (order_id, symbol, side, price, volume, stop_loss, take_profit, tag, filled_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
            ON CONFLICT(order_id) DO NOTHING
            "#,
        )
        .bind(&fill.order_id)
        .bind(&fill.symbol)
        .bind(side)
        .bind(fill.fill_price)
        .bind(fill.volume)
        .bind(fill.stop_loss)
        .bind(fill.take_profit)
        .bind(tag)
        .bind(filled_at)
        .execute(&self.db)
        .await?;

        Ok(())
    }

    /// Markers for `symbol`, oldest first.
    pub async fn markers(&self, symbol: &str) -> Result<Vec<FillMarker>, sqlx::Error> {
        sqlx::query_as::<_, FillMarker>(
            r#"
            SELECT order_id, symbol, side, price, volume, stop_loss, take_profit, tag, filled_at
            FROM trade_markers
            WHERE symbol = ?1
            ORDER BY filled_at ASC
            "#,
        )
        .bind(symbol)
        .fetch_all(&self.db)
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use common::{OrderSide, RejectCode};
    use sqlx::sqlite::SqlitePoolOptions;

    async fn pool() -> SqlitePool {
        let db = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .unwrap();
        sqlx::migrate!("../../migrations").run(&db).await.unwrap();
        db
    }

    fn fill(order_id: &str, hour: u32) -> Fill {
        Fill {
            order_id: order_id.into(),
            symbol: "TEST".into(),
            side: OrderSide::Buy,
            fill_price: 100.0,
            volume: 1.33,
            stop_loss: 98.5,
            take_profit: 103.0,
            tag: 42,
            time: Utc.with_ymd_and_hms(2024, 5, 1, hour, 0, 0).unwrap(),
        }
    }

    #[tokio::test]
    async fn records_marker_once() {
        let journal = TradeJournal::new(pool().await);
        journal.record_fill(&fill("a", 10)).await.unwrap();
        journal.record_fill(&fill("a", 10)).await.unwrap();

        let markers = journal.markers("TEST").await.unwrap();
        assert_eq!(markers.len(), 1);
        assert_eq!(markers[0].side, "BUY");
        assert_eq!(markers[0].price, 100.0);
        assert_eq!(markers[0].tag, 42);
        assert_eq!(markers[0].filled_at(), Some(fill("a", 10).time));
        assert!(journal.markers("OTHER").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn run_persists_fills_and_skips_rejections() {
        let db = pool().await;
        let (tx, rx) = mpsc::channel(8);
        let task = tokio::spawn(TradeJournal::new(db.clone()).run(rx));

        tx.send(DecisionEvent::EntryFilled { fill: fill("b", 11) }).await.unwrap();
        tx.send(DecisionEvent::OrderRejected {
            symbol: "TEST".into(),
            code: RejectCode::Requote,
        })
        .await
        .unwrap();
        tx.send(DecisionEvent::EntryFilled { fill: fill("a", 9) }).await.unwrap();
        drop(tx);
        task.await.unwrap();

        let markers = TradeJournal::new(db).markers("TEST").await.unwrap();
        let ids: Vec<_> = markers.iter().map(|m| m.order_id.as_str()).collect();
        assert_eq!(ids, ["a", "b"]);
    }
}
