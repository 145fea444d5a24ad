use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions, SqliteRow};
use sqlx::Row;
use std::str::FromStr;
use tracing::debug;

use crate::domain::{Order, OrderStatus, RateType};
use crate::error::{Result, SwapError};

const TERMS_KEY: &str = "terms_accepted";

/// Local order store: one row per exchange-assigned order id.
///
/// All writes are per-id upserts or updates; there is no full-list rewrite,
/// so concurrent pollers for different orders cannot clobber each other.
pub struct OrderStore {
    pool: SqlitePool,
}

impl OrderStore {
    /// Open (and create if missing) the store at `path`. `":memory:"` gives
    /// an ephemeral store for tests.
    pub async fn open(path: &str) -> Result<Self> {
        let options = if path == ":memory:" || path == "sqlite::memory:" {
            SqliteConnectOptions::from_str("sqlite::memory:")?
        } else {
            SqliteConnectOptions::new()
                .filename(path)
                .create_if_missing(true)
        };

        // Single connection: an in-memory database exists per connection,
        // and the file store has no use for parallel writers.
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect_with(options)
            .await?;

        let store = Self { pool };
        store.init().await?;
        Ok(store)
    }

    async fn init(&self) -> Result<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS orders (
                id TEXT PRIMARY KEY,
                currency_from TEXT NOT NULL,
                currency_to TEXT NOT NULL,
                amount_expected_from TEXT NOT NULL,
                amount_expected_to TEXT NOT NULL,
                payin_address TEXT NOT NULL,
                payout_address TEXT NOT NULL,
                refund_address TEXT,
                rate_type TEXT NOT NULL,
                rate_id TEXT,
                status TEXT NOT NULL,
                created_at_ms INTEGER NOT NULL,
                track_url TEXT
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query("CREATE INDEX IF NOT EXISTS idx_orders_created_at ON orders(created_at_ms)")
            .execute(&self.pool)
            .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS settings (
                key TEXT PRIMARY KEY,
                value TEXT NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Insert an order; a duplicate id overwrites the previous record.
    pub async fn append(&self, order: &Order) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO orders (
                id, currency_from, currency_to,
                amount_expected_from, amount_expected_to,
                payin_address, payout_address, refund_address,
                rate_type, rate_id, status, created_at_ms, track_url
            )
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)
            ON CONFLICT(id) DO UPDATE SET
                currency_from = excluded.currency_from,
                currency_to = excluded.currency_to,
                amount_expected_from = excluded.amount_expected_from,
                amount_expected_to = excluded.amount_expected_to,
                payin_address = excluded.payin_address,
                payout_address = excluded.payout_address,
                refund_address = excluded.refund_address,
                rate_type = excluded.rate_type,
                rate_id = excluded.rate_id,
                status = excluded.status,
                created_at_ms = excluded.created_at_ms,
                track_url = excluded.track_url
            "#,
        )
        .bind(&order.id)
        .bind(&order.currency_from)
        .bind(&order.currency_to)
        .bind(order.amount_expected_from.to_string())
        .bind(order.amount_expected_to.to_string())
        .bind(&order.payin_address)
        .bind(&order.payout_address)
        .bind(&order.refund_address)
        .bind(order.rate_type.as_str())
        .bind(&order.rate_id)
        .bind(order.status.as_str())
        .bind(order.created_at.timestamp_millis())
        .bind(&order.track_url)
        .execute(&self.pool)
        .await?;

        debug!("Stored order {} ({})", order.id, order.route());
        Ok(())
    }

    /// Per-id status write-through; unrelated rows are untouched. Returns
    /// false when the id is not in the store.
    pub async fn update_status(&self, id: &str, status: &OrderStatus) -> Result<bool> {
        let result = sqlx::query("UPDATE orders SET status = ?1 WHERE id = ?2")
            .bind(status.as_str())
            .bind(id)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    pub async fn find_by_id(&self, id: &str) -> Result<Option<Order>> {
        let row = sqlx::query("SELECT * FROM orders WHERE id = ?1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        row.map(|r| row_to_order(&r)).transpose()
    }

    /// Orders created inside the window, most recent first.
    pub async fn list_recent(&self, window: chrono::Duration) -> Result<Vec<Order>> {
        let cutoff_ms = (Utc::now() - window).timestamp_millis();

        let rows = sqlx::query(
            "SELECT * FROM orders WHERE created_at_ms >= ?1 ORDER BY created_at_ms DESC",
        )
        .bind(cutoff_ms)
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(row_to_order).collect()
    }

    pub async fn list_all(&self) -> Result<Vec<Order>> {
        let rows = sqlx::query("SELECT * FROM orders ORDER BY created_at_ms DESC")
            .fetch_all(&self.pool)
            .await?;

        rows.iter().map(row_to_order).collect()
    }

    pub async fn terms_accepted(&self) -> Result<bool> {
        let row = sqlx::query("SELECT value FROM settings WHERE key = ?1")
            .bind(TERMS_KEY)
            .fetch_optional(&self.pool)
            .await?;

        Ok(row
            .map(|r| r.get::<String, _>("value") == "true")
            .unwrap_or(false))
    }

    pub async fn set_terms_accepted(&self, accepted: bool) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO settings (key, value) VALUES (?1, ?2)
            ON CONFLICT(key) DO UPDATE SET value = excluded.value
            "#,
        )
        .bind(TERMS_KEY)
        .bind(if accepted { "true" } else { "false" })
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}

fn row_to_order(row: &SqliteRow) -> Result<Order> {
    let created_at_ms: i64 = row.get("created_at_ms");
    let created_at: DateTime<Utc> = DateTime::from_timestamp_millis(created_at_ms)
        .ok_or_else(|| SwapError::Internal(format!("corrupt created_at_ms: {created_at_ms}")))?;

    let rate_type: String = row.get("rate_type");
    let rate_type = RateType::from_str(&rate_type)
        .map_err(|e| SwapError::Internal(format!("corrupt rate_type: {e}")))?;

    Ok(Order {
        id: row.get("id"),
        currency_from: row.get("currency_from"),
        currency_to: row.get("currency_to"),
        amount_expected_from: parse_amount(row, "amount_expected_from")?,
        amount_expected_to: parse_amount(row, "amount_expected_to")?,
        payin_address: row.get("payin_address"),
        payout_address: row.get("payout_address"),
        refund_address: row.get("refund_address"),
        rate_type,
        rate_id: row.get("rate_id"),
        status: OrderStatus::parse(&row.get::<String, _>("status")),
        created_at,
        track_url: row.get("track_url"),
    })
}

fn parse_amount(row: &SqliteRow, column: &str) -> Result<Decimal> {
    let raw: String = row.get(column);
    Decimal::from_str_exact(&raw)
        .map_err(|e| SwapError::Internal(format!("corrupt {column} value {raw:?}: {e}")))
}
