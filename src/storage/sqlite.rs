//! SQLite storage implementation
//!
//! [`SqliteStore`] owns the single connection shared by every repository call.
//! The connection sits behind one coarse lock: each closure passed to
//! [`SqliteStore::with_connection`] is a critical section against every other
//! reader and writer.

use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard, PoisonError};

use rusqlite::{Connection, OptionalExtension, params};
use uuid::Uuid;

use super::schema;
use crate::location::{DeathLocationKey, ValidDeathLocation};
use crate::{Error, Result};

#[derive(Debug, Clone)]
enum StoreTarget {
    File(PathBuf),
    Memory,
}

/// SQLite-backed storage for death locations
pub struct SqliteStore {
    target: StoreTarget,
    conn: Mutex<Option<Connection>>,
}

impl SqliteStore {
    /// Store backed by a database file. Nothing is opened until [`SqliteStore::open`].
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            target: StoreTarget::File(path.into()),
            conn: Mutex::new(None),
        }
    }

    /// Store backed by an in-memory database (for testing).
    /// Contents are lost when the connection closes.
    pub fn in_memory() -> Self {
        Self {
            target: StoreTarget::Memory,
            conn: Mutex::new(None),
        }
    }

    pub fn path(&self) -> Option<&Path> {
        match &self.target {
            StoreTarget::File(path) => Some(path),
            StoreTarget::Memory => None,
        }
    }

    pub fn describe(&self) -> String {
        match &self.target {
            StoreTarget::File(path) => path.display().to_string(),
            StoreTarget::Memory => ":memory:".to_string(),
        }
    }

    pub fn is_connected(&self) -> bool {
        self.lock().is_some()
    }

    /// Open the connection, creating the database file and its directory if absent.
    ///
    /// Returns `Ok(false)` without touching the connection if already open.
    pub fn open(&self) -> Result<bool> {
        let mut guard = self.lock();
        if guard.is_some() {
            return Ok(false);
        }

        let conn = match &self.target {
            StoreTarget::File(path) => {
                crate::config::ensure_db_dir(path)?;
                Connection::open(path)?
            }
            StoreTarget::Memory => Connection::open_in_memory()?,
        };
        *guard = Some(conn);
        Ok(true)
    }

    /// Close the connection. The store is disconnected afterwards even if
    /// closing reported an error. Returns `Ok(false)` if nothing was open.
    pub fn close(&self) -> Result<bool> {
        let Some(conn) = self.lock().take() else {
            return Ok(false);
        };
        conn.close().map_err(|(_, e)| Error::Storage(e))?;
        Ok(true)
    }

    /// Run `f` against the open connection while holding the store lock.
    pub fn with_connection<T>(&self, f: impl FnOnce(&mut Connection) -> Result<T>) -> Result<T> {
        let mut guard = self.lock();
        let conn = guard.as_mut().ok_or(Error::Disconnected)?;
        f(conn)
    }

    /// Read the schema version marker
    pub fn schema_version(&self) -> Result<i64> {
        self.with_connection(|conn| user_version(conn))
    }

    /// Get database statistics
    pub fn stats(&self) -> Result<StoreStats> {
        self.with_connection(|conn| {
            Ok(StoreStats {
                schema_version: user_version(conn)?,
                records: count_locations(conn)?,
            })
        })
    }

    fn lock(&self) -> MutexGuard<'_, Option<Connection>> {
        // a panic inside a critical section leaves no partially applied
        // statement behind, so the connection is still usable
        self.conn.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// A row of the current table
#[derive(Debug, Clone, PartialEq)]
pub struct StoredLocation {
    pub location: ValidDeathLocation,
    pub world_name: String,
}

/// Split a UUID into signed most/least significant halves
pub fn split_uuid(uid: Uuid) -> (i64, i64) {
    let (msb, lsb) = uid.as_u64_pair();
    (msb as i64, lsb as i64)
}

pub fn join_uuid(msb: i64, lsb: i64) -> Uuid {
    Uuid::from_u64_pair(msb as u64, lsb as u64)
}

// ========== Schema Operations ==========

pub fn create_tables(conn: &Connection) -> Result<()> {
    conn.execute_batch(schema::CREATE_DEATH_LOCATIONS_TABLE)?;
    Ok(())
}

pub fn table_exists(conn: &Connection, table: &str) -> Result<bool> {
    let found = conn
        .query_row(schema::SELECT_TABLE, [table], |_| Ok(()))
        .optional()?;
    Ok(found.is_some())
}

pub fn user_version(conn: &Connection) -> Result<i64> {
    let version = conn.query_row(schema::GET_USER_VERSION, [], |row| row.get(0))?;
    Ok(version)
}

pub fn set_user_version(conn: &Connection, version: i64) -> Result<()> {
    conn.execute_batch(&schema::set_user_version(version))?;
    Ok(())
}

// ========== Row Operations ==========

/// Select the row for a key
pub fn select_location(conn: &Connection, key: &DeathLocationKey) -> Result<Option<StoredLocation>> {
    let (player_msb, player_lsb) = split_uuid(key.player_uid);
    let (world_msb, world_lsb) = split_uuid(key.world_uid);

    let mut stmt = conn.prepare_cached(schema::SELECT_LOCATION)?;
    stmt.query_row(params![player_msb, player_lsb, world_msb, world_lsb], row_to_location)
        .optional()
        .map_err(Into::into)
}

/// Insert or overwrite the row for the record's key. Returns rows affected.
pub fn insert_location(conn: &Connection, location: &ValidDeathLocation, world_name: &str) -> Result<usize> {
    let (player_msb, player_lsb) = split_uuid(location.player_uid());
    let (world_msb, world_lsb) = split_uuid(location.world_uid());

    let mut stmt = conn.prepare_cached(schema::INSERT_LOCATION)?;
    let count = stmt.execute(params![
        player_msb,
        player_lsb,
        world_name,
        world_msb,
        world_lsb,
        location.x(),
        location.y(),
        location.z(),
    ])?;
    Ok(count)
}

/// Delete the row for a key. Returns rows affected.
pub fn delete_location(conn: &Connection, key: &DeathLocationKey) -> Result<usize> {
    let (player_msb, player_lsb) = split_uuid(key.player_uid);
    let (world_msb, world_lsb) = split_uuid(key.world_uid);

    let mut stmt = conn.prepare_cached(schema::DELETE_LOCATION)?;
    let count = stmt.execute(params![player_msb, player_lsb, world_msb, world_lsb])?;
    Ok(count)
}

pub fn count_locations(conn: &Connection) -> Result<usize> {
    let count: i64 = conn.query_row(schema::COUNT_LOCATIONS, [], |row| row.get(0))?;
    Ok(count as usize)
}

/// Helper to convert a row to a StoredLocation
fn row_to_location(row: &rusqlite::Row) -> rusqlite::Result<StoredLocation> {
    let player_uid = join_uuid(row.get(0)?, row.get(1)?);
    let world_name: String = row.get(2)?;
    let world_uid = join_uuid(row.get(3)?, row.get(4)?);

    Ok(StoredLocation {
        location: ValidDeathLocation::new(player_uid, world_uid, row.get(5)?, row.get(6)?, row.get(7)?),
        world_name,
    })
}

/// Database statistics
#[derive(Debug, Clone, serde::Serialize)]
pub struct StoreStats {
    pub schema_version: i64,
    pub records: usize,
}

impl std::fmt::Display for StoreStats {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "Database Statistics:")?;
        writeln!(f, "  Schema version: {}", self.schema_version)?;
        writeln!(f, "  Death locations: {}", self.records)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn connected() -> SqliteStore {
        let store = SqliteStore::in_memory();
        assert!(store.open().unwrap());
        store.with_connection(|conn| create_tables(conn)).unwrap();
        store
    }

    fn sample(x: f64) -> ValidDeathLocation {
        ValidDeathLocation::new(Uuid::from_u64_pair(1, 2), Uuid::from_u64_pair(3, 4), x, 64.0, -3.0)
    }

    #[test]
    fn test_uuid_split_roundtrip_high_bits() {
        let uid = Uuid::from_u64_pair(u64::MAX, 0x8000_0000_0000_0001);
        let (msb, lsb) = split_uuid(uid);
        assert!(msb < 0 && lsb < 0);
        assert_eq!(join_uuid(msb, lsb), uid);
    }

    #[test]
    fn test_row_crud() {
        let store = connected();
        let location = sample(10.0);

        store.with_connection(|conn| {
            assert_eq!(insert_location(conn, &location, "world")?, 1);

            let stored = select_location(conn, &location.key())?.unwrap();
            assert_eq!(stored.location, location);
            assert_eq!(stored.world_name, "world");

            assert_eq!(delete_location(conn, &location.key())?, 1);
            assert!(select_location(conn, &location.key())?.is_none());
            assert_eq!(delete_location(conn, &location.key())?, 0);
            Ok(())
        })
        .unwrap();
    }

    #[test]
    fn test_insert_overwrites_same_key() {
        let store = connected();

        store.with_connection(|conn| {
            insert_location(conn, &sample(1.0), "world")?;
            assert_eq!(insert_location(conn, &sample(2.0), "world")?, 1);
            assert_eq!(count_locations(conn)?, 1);
            let stored = select_location(conn, &sample(0.0).key())?.unwrap();
            assert_eq!(stored.location.x(), 2.0);
            Ok(())
        })
        .unwrap();
    }

    #[test]
    fn test_disconnected_store() {
        let store = SqliteStore::in_memory();
        assert!(!store.is_connected());
        assert!(matches!(store.schema_version(), Err(Error::Disconnected)));
        assert!(!store.close().unwrap());
    }

    #[test]
    fn test_open_is_idempotent_and_close_disconnects() {
        let store = SqliteStore::in_memory();
        assert!(store.open().unwrap());
        assert!(!store.open().unwrap());
        assert!(store.close().unwrap());
        assert!(!store.is_connected());
        assert!(!store.close().unwrap());
    }

    #[test]
    fn test_file_store_creates_directory() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("plugin").join("deathlocations.db");
        let store = SqliteStore::new(&path);

        assert!(store.open().unwrap());
        assert!(path.exists());
        assert_eq!(store.path(), Some(path.as_path()));
        store.close().unwrap();
    }

    #[test]
    fn test_table_exists_and_version() {
        let store = connected();
        store.with_connection(|conn| {
            assert!(table_exists(conn, "death_locations")?);
            assert!(!table_exists(conn, schema::LEGACY_TABLE)?);
            assert_eq!(user_version(conn)?, 0);
            set_user_version(conn, schema::CURRENT_SCHEMA_VERSION)?;
            Ok(())
        })
        .unwrap();

        let stats = store.stats().unwrap();
        assert_eq!(stats.schema_version, schema::CURRENT_SCHEMA_VERSION);
        assert_eq!(stats.records, 0);
    }
}
