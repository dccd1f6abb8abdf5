//! SQLite persistence for the alert ledger.
//!
//! One row per dispatched alert, keyed by the dedup key. Rows are only ever
//! inserted or deleted whole.

use chrono::{DateTime, FixedOffset, SecondsFormat, Utc};
use rusqlite::{params, Connection};
use std::path::Path;
use std::sync::Mutex;
use tracing::{debug, info};

use crate::error::StorageError;
use crate::types::{AlertRecord, SignalKind};

/// Durable, append-only store behind the alert ledger.
pub trait LedgerStore: Send + Sync {
    /// Every stored record, oldest dispatch first.
    fn load_all(&self) -> Result<Vec<AlertRecord>, StorageError>;

    /// Insert a record. Fails if the key is already present.
    fn append(&self, record: &AlertRecord) -> Result<(), StorageError>;

    /// Delete the records with the given keys. Returns how many were deleted.
    fn remove(&self, keys: &[String]) -> Result<usize, StorageError>;

    /// Delete every record. Returns how many were deleted.
    fn clear(&self) -> Result<usize, StorageError>;
}

/// SQLite store for dispatched alerts.
pub struct SqliteLedgerStore {
    conn: Mutex<Connection>,
}

impl SqliteLedgerStore {
    /// Create a new SQLite store at the given path.
    pub fn new<P: AsRef<Path>>(path: P) -> Result<Self, StorageError> {
        if let Some(parent) = path.as_ref().parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let conn = Connection::open(path)?;
        let store = Self {
            conn: Mutex::new(conn),
        };
        store.init_schema()?;
        info!("SQLite ledger store initialized");
        Ok(store)
    }

    /// Create an in-memory SQLite store (for testing).
    pub fn new_in_memory() -> Result<Self, StorageError> {
        let conn = Connection::open_in_memory()?;
        let store = Self {
            conn: Mutex::new(conn),
        };
        store.init_schema()?;
        debug!("In-memory SQLite ledger store initialized");
        Ok(store)
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, Connection>, StorageError> {
        self.conn
            .lock()
            .map_err(|_| StorageError::InvalidRecord("ledger connection poisoned".to_string()))
    }

    /// Initialize database schema.
    fn init_schema(&self) -> Result<(), StorageError> {
        let conn = self.lock()?;

        conn.execute(
            "CREATE TABLE IF NOT EXISTS alerts (
                key TEXT PRIMARY KEY,
                symbol TEXT NOT NULL,
                signal_type TEXT NOT NULL,
                timestamp TEXT NOT NULL,
                sent_at TEXT NOT NULL,
                price REAL NOT NULL,
                signal_value REAL NOT NULL
            )",
            [],
        )?;

        conn.execute(
            "CREATE INDEX IF NOT EXISTS idx_alerts_sent_at ON alerts(sent_at)",
            [],
        )?;

        Ok(())
    }
}

fn parse_record(
    key: String,
    symbol: String,
    signal_type: String,
    timestamp: String,
    sent_at: String,
    price: f64,
    signal_value: f64,
) -> Result<AlertRecord, StorageError> {
    let signal_type: SignalKind = signal_type
        .parse()
        .map_err(|e| StorageError::InvalidRecord(format!("{}: {}", key, e)))?;
    let timestamp = DateTime::<FixedOffset>::parse_from_rfc3339(&timestamp)
        .map_err(|e| StorageError::InvalidRecord(format!("{}: bad timestamp: {}", key, e)))?;
    let sent_at = DateTime::parse_from_rfc3339(&sent_at)
        .map_err(|e| StorageError::InvalidRecord(format!("{}: bad sent_at: {}", key, e)))?
        .with_timezone(&Utc);

    Ok(AlertRecord {
        key,
        symbol,
        signal_type,
        timestamp,
        sent_at,
        price,
        signal_value,
    })
}

impl LedgerStore for SqliteLedgerStore {
    fn load_all(&self) -> Result<Vec<AlertRecord>, StorageError> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare(
            "SELECT key, symbol, signal_type, timestamp, sent_at, price, signal_value
             FROM alerts ORDER BY sent_at ASC",
        )?;

        let rows = stmt.query_map([], |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, String>(2)?,
                row.get::<_, String>(3)?,
                row.get::<_, String>(4)?,
                row.get::<_, f64>(5)?,
                row.get::<_, f64>(6)?,
            ))
        })?;

        let mut records = Vec::new();
        for row in rows {
            let (key, symbol, signal_type, timestamp, sent_at, price, signal_value) = row?;
            records.push(parse_record(
                key,
                symbol,
                signal_type,
                timestamp,
                sent_at,
                price,
                signal_value,
            )?);
        }
        Ok(records)
    }

    fn append(&self, record: &AlertRecord) -> Result<(), StorageError> {
        let conn = self.lock()?;
        conn.execute(
            "INSERT INTO alerts (key, symbol, signal_type, timestamp, sent_at, price, signal_value)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![
                record.key,
                record.symbol,
                record.signal_type.as_str(),
                record.timestamp.to_rfc3339(),
                record.sent_at.to_rfc3339_opts(SecondsFormat::Micros, true),
                record.price,
                record.signal_value,
            ],
        )?;

        debug!("Appended alert {}", record.key);
        Ok(())
    }

    fn remove(&self, keys: &[String]) -> Result<usize, StorageError> {
        let mut conn = self.lock()?;
        let tx = conn.transaction()?;
        let mut removed = 0;
        {
            let mut stmt = tx.prepare("DELETE FROM alerts WHERE key = ?1")?;
            for key in keys {
                removed += stmt.execute(params![key])?;
            }
        }
        tx.commit()?;
        Ok(removed)
    }

    fn clear(&self) -> Result<usize, StorageError> {
        let conn = self.lock()?;
        Ok(conn.execute("DELETE FROM alerts", [])?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn record(key: &str, minute: u32) -> AlertRecord {
        let tz = FixedOffset::east_opt(19800).unwrap();
        AlertRecord {
            key: key.to_string(),
            symbol: "TCS.NS".to_string(),
            signal_type: SignalKind::MacdBullishCrossover,
            timestamp: tz.with_ymd_and_hms(2024, 6, 3, 12, 0, 0).unwrap(),
            sent_at: Utc.with_ymd_and_hms(2024, 6, 3, 10, minute, 0).unwrap(),
            price: 3812.5,
            signal_value: 1.25,
        }
    }

    #[test]
    fn test_append_and_load() {
        let store = SqliteLedgerStore::new_in_memory().unwrap();
        store.append(&record("b", 5)).unwrap();
        store.append(&record("a", 1)).unwrap();

        let loaded = store.load_all().unwrap();
        assert_eq!(loaded.len(), 2);
        assert_eq!(loaded[0], record("a", 1));
        assert_eq!(loaded[1].key, "b");
    }

    #[test]
    fn test_duplicate_key_rejected() {
        let store = SqliteLedgerStore::new_in_memory().unwrap();
        store.append(&record("a", 1)).unwrap();
        assert!(matches!(store.append(&record("a", 2)), Err(StorageError::Sqlite(_))));
        assert_eq!(store.load_all().unwrap().len(), 1);
    }

    #[test]
    fn test_remove_and_clear() {
        let store = SqliteLedgerStore::new_in_memory().unwrap();
        for (key, minute) in [("a", 1), ("b", 2), ("c", 3)] {
            store.append(&record(key, minute)).unwrap();
        }

        let removed = store
            .remove(&["a".to_string(), "missing".to_string()])
            .unwrap();
        assert_eq!(removed, 1);
        assert_eq!(store.clear().unwrap(), 2);
        assert!(store.load_all().unwrap().is_empty());
    }

    #[test]
    fn test_persists_across_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("alerts").join("ledger.db");
        {
            let store = SqliteLedgerStore::new(&path).unwrap();
            store.append(&record("a", 1)).unwrap();
        }
        let store = SqliteLedgerStore::new(&path).unwrap();
        assert_eq!(store.load_all().unwrap(), vec![record("a", 1)]);
    }
}
