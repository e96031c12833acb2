use crate::analyzer::series::{Sample, TimeSeries};
use crate::analyzer::History;
use crate::model::{ItemIdentity, PriceSnapshot, StorageError};
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension};

pub struct SqliteStorage {
    conn: Connection,
}

#[derive(Debug, Clone)]
pub struct StoredHistory {
    pub id: i64,
    pub samples: Vec<Sample>,
    pub created_at: DateTime<Utc>,
}

impl SqliteStorage {
    /// Opens the database and creates missing tables.
    pub fn new(db_path: &str) -> Result<Self, StorageError> {
        Self::init(Connection::open(db_path)?)
    }

    pub fn in_memory() -> Result<Self, StorageError> {
        Self::init(Connection::open_in_memory()?)
    }

    fn init(conn: Connection) -> Result<Self, StorageError> {
        conn.execute_batch(
            "
            CREATE TABLE IF NOT EXISTS items (
                item_name_id INTEGER PRIMARY KEY,
                market_hash_name TEXT NOT NULL,
                created_at TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS histories (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                item_name_id INTEGER NOT NULL REFERENCES items(item_name_id),
                data TEXT NOT NULL,
                statistics TEXT NOT NULL DEFAULT '{}',
                created_at TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS prices (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                item_name_id INTEGER NOT NULL REFERENCES items(item_name_id),
                lowest_sell_order REAL,
                highest_sell_order REAL NOT NULL,
                lowest_buy_order REAL NOT NULL,
                highest_buy_order REAL,
                currency_id INTEGER NOT NULL,
                created_at TEXT NOT NULL
            );
            ",
        )?;
        Ok(Self { conn })
    }

    /// Registers the item; an existing row keeps its original creation time.
    pub fn save_item(&self, item: &ItemIdentity) -> Result<(), StorageError> {
        self.conn.execute(
            "INSERT INTO items (item_name_id, market_hash_name, created_at)
             VALUES (?1, ?2, ?3)
             ON CONFLICT(item_name_id) DO UPDATE SET market_hash_name = excluded.market_hash_name",
            params![
                item.item_name_id as i64,
                &item.market_hash_name,
                Utc::now().to_rfc3339(),
            ],
        )?;
        Ok(())
    }

    /// Stores the raw samples and current statistics of a history, returning its id.
    pub fn save_history(&self, item: &ItemIdentity, history: &History) -> Result<i64, StorageError> {
        let data = serde_json::to_string(history.original.samples())?;
        let statistics = history.statistics_json()?;
        self.conn.execute(
            "INSERT INTO histories (item_name_id, data, statistics, created_at)
             VALUES (?1, ?2, ?3, ?4)",
            params![
                item.item_name_id as i64,
                data,
                statistics,
                history.created_at.to_rfc3339(),
            ],
        )?;
        Ok(self.conn.last_insert_rowid())
    }

    /// Overwrites the statistics of a stored history after re-analysis.
    pub fn update_statistics(&self, history_id: i64, history: &History) -> Result<(), StorageError> {
        self.conn.execute(
            "UPDATE histories SET statistics = ?1 WHERE id = ?2",
            params![history.statistics_json()?, history_id],
        )?;
        Ok(())
    }

    pub fn latest_history(&self, item_name_id: u64) -> Result<Option<StoredHistory>, StorageError> {
        let row = self
            .conn
            .query_row(
                "SELECT id, data, created_at FROM histories
                 WHERE item_name_id = ?1 ORDER BY id DESC LIMIT 1",
                params![item_name_id as i64],
                |row| {
                    Ok((
                        row.get::<_, i64>(0)?,
                        row.get::<_, String>(1)?,
                        row.get::<_, String>(2)?,
                    ))
                },
            )
            .optional()?;

        match row {
            Some((id, data, created_at)) => Ok(Some(StoredHistory {
                id,
                samples: serde_json::from_str(&data)?,
                created_at: created_at.parse()?,
            })),
            None => Ok(None),
        }
    }

    pub fn save_price(&self, price: &PriceSnapshot) -> Result<(), StorageError> {
        self.conn.execute(
            "INSERT INTO prices (
                item_name_id, lowest_sell_order, highest_sell_order,
                lowest_buy_order, highest_buy_order, currency_id, created_at
            )
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![
                price.item_name_id as i64,
                price.lowest_sell_order,
                price.highest_sell_order,
                price.lowest_buy_order,
                price.highest_buy_order,
                price.currency_id,
                price.created_at.to_rfc3339(),
            ],
        )?;
        Ok(())
    }
}

impl StoredHistory {
    pub fn into_series(self) -> Result<TimeSeries, StorageError> {
        TimeSeries::new(self.samples).map_err(|e| StorageError::Corrupt(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    impl SqliteStorage {
        pub(crate) fn history_count(&self, item_name_id: u64) -> Result<usize, StorageError> {
            let count: i64 = self.conn.query_row(
                "SELECT COUNT(*) FROM histories WHERE item_name_id = ?1",
                params![item_name_id as i64],
                |row| row.get(0),
            )?;
            Ok(count as usize)
        }

        pub(crate) fn statistics_of(&self, history_id: i64) -> Result<Option<String>, StorageError> {
            Ok(self
                .conn
                .query_row(
                    "SELECT statistics FROM histories WHERE id = ?1",
                    params![history_id],
                    |row| row.get(0),
                )
                .optional()?)
        }

        pub(crate) fn price_count(&self, item_name_id: u64) -> Result<usize, StorageError> {
            let count: i64 = self.conn.query_row(
                "SELECT COUNT(*) FROM prices WHERE item_name_id = ?1",
                params![item_name_id as i64],
                |row| row.get(0),
            )?;
            Ok(count as usize)
        }
    }

    fn identity() -> ItemIdentity {
        ItemIdentity {
            item_name_id: 175880240,
            market_hash_name: "Raider Crate".into(),
        }
    }

    fn history() -> History {
        let samples = (0..3)
            .map(|h| Sample {
                timestamp: Utc.with_ymd_and_hms(2018, 3, 1, h, 0, 0).unwrap(),
                price: 1.0 + h as f64,
                count: 5,
            })
            .collect();
        History::new(TimeSeries::new(samples).unwrap())
    }

    #[test]
    fn round_trips_history_samples() {
        let storage = SqliteStorage::in_memory().unwrap();
        let item = identity();
        storage.save_item(&item).unwrap();
        storage.save_item(&item).unwrap();

        let history = history();
        let id = storage.save_history(&item, &history).unwrap();

        let stored = storage.latest_history(item.item_name_id).unwrap().unwrap();
        assert_eq!(stored.id, id);
        assert_eq!(stored.samples, history.original.samples());
        assert_eq!(stored.into_series().unwrap(), history.original);
        assert_eq!(storage.history_count(item.item_name_id).unwrap(), 1);
    }

    #[test]
    fn missing_history_is_none() {
        let storage = SqliteStorage::in_memory().unwrap();
        assert!(storage.latest_history(1).unwrap().is_none());
        assert!(storage.statistics_of(99).unwrap().is_none());
    }

    #[test]
    fn stores_price_snapshots() {
        let storage = SqliteStorage::in_memory().unwrap();
        let item = identity();
        storage.save_item(&item).unwrap();
        let snapshot = PriceSnapshot {
            item_name_id: item.item_name_id,
            lowest_sell_order: Some(1.2),
            highest_sell_order: 3.0,
            lowest_buy_order: 0.5,
            highest_buy_order: None,
            currency_id: 1,
            created_at: Utc::now(),
        };
        storage.save_price(&snapshot).unwrap();
        assert_eq!(storage.price_count(item.item_name_id).unwrap(), 1);
    }
}
