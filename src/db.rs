use crate::api::*;
use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use sqlx::sqlite::{SqlitePoolOptions, SqliteRow};
use sqlx::{query, Executor, Row, SqlitePool};
use std::str::FromStr;

const DB_CONN: &str = "sqlite::memory:";

#[derive(Debug, Clone, PartialEq)]
pub struct NewPrize {
    pub name: String,
    pub weight: f64,
    pub color: String,
    pub probability_label: Option<String>,
}

#[async_trait]
pub trait DB {
    async fn add_wheel(&self, name: String) -> Result<RowId>;
    /// `None` when the wheel doesn't exist.
    async fn get_wheel_name(&self, wheel: RowId) -> Result<Option<String>>;
    async fn get_wheels(&self) -> Result<Vec<(RowId, String)>>;
    async fn add_prize(&self, wheel: RowId, prize: NewPrize) -> Result<RowId>;
    async fn get_prize(&self, prize: RowId) -> Result<Option<Prize>>;
    async fn update_prize(&self, prize: Prize) -> Result<()>;
    /// Returns whether the prize existed.
    async fn remove_prize(&self, prize: RowId) -> Result<bool>;
    /// Prizes of a wheel in the order their segments appear on it.
    async fn get_prizes(&self, wheel: RowId) -> Result<Vec<Prize>>;
    async fn record_spin(&self, spin: SpinRecord) -> Result<()>;
    async fn get_spin(&self, code: &RedemptionCode) -> Result<Option<SpinRecord>>;
    async fn set_redemption_state(&self, code: &RedemptionCode, state: RedemptionState)
        -> Result<()>;
    async fn get_stats(&self, wheel: RowId) -> Result<WheelStats>;
}
pub struct SQLite {
    connection: SqlitePool,
}
impl SQLite {
    pub async fn new(db_conn: Option<String>) -> Result<Self> {
        let conn = db_conn.unwrap_or(DB_CONN.to_string());
        let mut options = SqlitePoolOptions::new();
        if conn == DB_CONN {
            // the memory database lives only as long as its connection
            options = options
                .max_connections(1)
                .idle_timeout(None)
                .max_lifetime(None);
        }
        let connection: SqlitePool = options
            .connect(conn.as_str())
            .await
            .with_context(|| format!("couldn't connect to {}", conn))?;
        connection
            .execute(
                "CREATE TABLE IF NOT EXISTS wheels (\
                id INTEGER PRIMARY KEY AUTOINCREMENT,\
                name TEXT NOT NULL\
                )",
            )
            .await?;
        connection
            .execute(
                "CREATE TABLE IF NOT EXISTS prizes (\
                id INTEGER PRIMARY KEY AUTOINCREMENT,\
                wheel INTEGER NOT NULL,\
                position INTEGER NOT NULL,\
                name TEXT NOT NULL,\
                weight REAL NOT NULL,\
                color TEXT NOT NULL,\
                probability_label TEXT\
                )",
            )
            .await?;
        connection
            .execute(
                "CREATE TABLE IF NOT EXISTS spins (\
                code TEXT PRIMARY KEY,\
                wheel INTEGER NOT NULL,\
                prize INTEGER NOT NULL,\
                prize_name TEXT NOT NULL,\
                customer TEXT NOT NULL,\
                rating INTEGER NOT NULL,\
                comment TEXT,\
                created_at INTEGER NOT NULL,\
                state TEXT NOT NULL DEFAULT 'Open'\
                )",
            )
            .await?;
        Ok(Self { connection })
    }
    #[cfg(test)]
    pub async fn close(&self) {
        self.connection.close().await;
    }
}
fn prize_from_row(row: &SqliteRow) -> Prize {
    Prize {
        id: row.get("id"),
        name: row.get("name"),
        weight: row.get("weight"),
        color: row.get("color"),
        probability_label: row.get("probability_label"),
    }
}
fn timestamp(seconds: i64) -> Result<DateTime<Utc>> {
    Utc.timestamp_opt(seconds, 0)
        .single()
        .with_context(|| format!("invalid timestamp {}", seconds))
}
#[async_trait]
impl DB for SQLite {
    async fn add_wheel(&self, name: String) -> Result<RowId> {
        let id = self
            .connection
            .execute(query("INSERT INTO wheels (name) VALUES (?)").bind(name))
            .await?
            .last_insert_rowid();
        Ok(id)
    }
    async fn get_wheel_name(&self, wheel: RowId) -> Result<Option<String>> {
        let row = self
            .connection
            .fetch_optional(query("SELECT name FROM wheels WHERE id = ?").bind(wheel))
            .await?;
        Ok(row.map(|row| row.get("name")))
    }
    async fn get_wheels(&self) -> Result<Vec<(RowId, String)>> {
        let rows = self
            .connection
            .fetch_all(query("SELECT id, name FROM wheels ORDER BY id"))
            .await?;
        Ok(rows
            .iter()
            .map(|row| (row.get("id"), row.get("name")))
            .collect())
    }
    async fn add_prize(&self, wheel: RowId, prize: NewPrize) -> Result<RowId> {
        if self.get_wheel_name(wheel).await?.is_none() {
            bail!("Wheel {} doesn't exist", wheel)
        }
        let id = self
            .connection
            .execute(
                query(
                    "INSERT INTO prizes (\
                wheel,\
                position,\
                name,\
                weight,\
                color,\
                probability_label)\
                VALUES (?,\
                (SELECT COALESCE(MAX(position), -1) + 1 FROM prizes WHERE wheel = ?),\
                ?,?,?,?)",
                )
                .bind(wheel)
                .bind(wheel)
                .bind(prize.name)
                .bind(prize.weight)
                .bind(prize.color)
                .bind(prize.probability_label),
            )
            .await?
            .last_insert_rowid();
        Ok(id)
    }
    async fn get_prize(&self, prize: RowId) -> Result<Option<Prize>> {
        let row = self
            .connection
            .fetch_optional(
                query(
                    "SELECT id, name, weight, color, probability_label \
                FROM prizes WHERE id = ?",
                )
                .bind(prize),
            )
            .await?;
        Ok(row.as_ref().map(prize_from_row))
    }
    async fn update_prize(&self, prize: Prize) -> Result<()> {
        let result = self
            .connection
            .execute(
                query(
                    "UPDATE prizes SET \
                name = ?, weight = ?, color = ?, probability_label = ? \
                WHERE id = ?",
                )
                .bind(prize.name)
                .bind(prize.weight)
                .bind(prize.color)
                .bind(prize.probability_label)
                .bind(prize.id),
            )
            .await?;
        if result.rows_affected() == 0 {
            bail!("Prize {} doesn't exist", prize.id)
        }
        Ok(())
    }
    async fn remove_prize(&self, prize: RowId) -> Result<bool> {
        let result = self
            .connection
            .execute(query("DELETE FROM prizes WHERE id = ?").bind(prize))
            .await?;
        Ok(result.rows_affected() > 0)
    }
    async fn get_prizes(&self, wheel: RowId) -> Result<Vec<Prize>> {
        let rows = self
            .connection
            .fetch_all(
                query(
                    "SELECT id, name, weight, color, probability_label \
                FROM prizes WHERE wheel = ? \
                ORDER BY position, id",
                )
                .bind(wheel),
            )
            .await?;
        Ok(rows.iter().map(prize_from_row).collect())
    }
    async fn record_spin(&self, spin: SpinRecord) -> Result<()> {
        self.connection
            .execute(
                query(
                    "INSERT INTO spins (\
                code,\
                wheel,\
                prize,\
                prize_name,\
                customer,\
                rating,\
                comment,\
                created_at,\
                state)\
                VALUES (?,?,?,?,?,?,?,?,?)",
                )
                .bind(spin.code)
                .bind(spin.wheel)
                .bind(spin.prize)
                .bind(spin.prize_name)
                .bind(spin.customer)
                .bind(spin.rating)
                .bind(spin.comment)
                .bind(spin.created_at.timestamp())
                .bind(spin.state.to_string()),
            )
            .await?;
        Ok(())
    }
    async fn get_spin(&self, code: &RedemptionCode) -> Result<Option<SpinRecord>> {
        let row = self
            .connection
            .fetch_optional(
                query(
                    "SELECT code, wheel, prize, prize_name, customer, rating, comment, \
                created_at, state FROM spins WHERE code = ?",
                )
                .bind(code),
            )
            .await?;
        let Some(row) = row else {
            return Ok(None);
        };
        Ok(Some(SpinRecord {
            code: row.get("code"),
            wheel: row.get("wheel"),
            prize: row.get("prize"),
            prize_name: row.get("prize_name"),
            customer: row.get("customer"),
            rating: row.get("rating"),
            comment: row.get("comment"),
            created_at: timestamp(row.get("created_at"))?,
            state: RedemptionState::from_str(row.get("state"))?,
        }))
    }
    async fn set_redemption_state(
        &self,
        code: &RedemptionCode,
        state: RedemptionState,
    ) -> Result<()> {
        let result = self
            .connection
            .execute(
                query("UPDATE spins SET state = ? WHERE code = ?")
                    .bind(state.to_string())
                    .bind(code),
            )
            .await?;
        if result.rows_affected() == 0 {
            bail!("No spin with redemption code {}", code)
        }
        Ok(())
    }
    async fn get_stats(&self, wheel: RowId) -> Result<WheelStats> {
        let totals = self
            .connection
            .fetch_one(
                query(
                    "SELECT COUNT(*) AS spins, \
                COALESCE(SUM(state = 'Redeemed'), 0) AS redeemed, \
                AVG(rating) AS average_rating \
                FROM spins WHERE wheel = ?",
                )
                .bind(wheel),
            )
            .await?;
        let rows = self
            .connection
            .fetch_all(
                query(
                    "SELECT prize, prize_name, COUNT(*) AS spins \
                FROM spins WHERE wheel = ? \
                GROUP BY prize, prize_name \
                ORDER BY spins DESC, prize",
                )
                .bind(wheel),
            )
            .await?;
        let spins: i64 = totals.get("spins");
        let redeemed: i64 = totals.get("redeemed");
        Ok(WheelStats {
            wheel,
            spins: spins as u64,
            redeemed: redeemed as u64,
            average_rating: totals.get("average_rating"),
            prizes: rows
                .iter()
                .map(|row| {
                    let spins: i64 = row.get("spins");
                    PrizeCount {
                        prize: row.get("prize"),
                        name: row.get("prize_name"),
                        spins: spins as u64,
                    }
                })
                .collect(),
        })
    }
}
