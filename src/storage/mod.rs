//! Storage Layer - SQLite-backed persistence
//!
//! System of record is SQLite with one table:
//! - death_locations(player_uid_msb, player_uid_lsb, world_name, world_uid_msb, world_uid_lsb, x, y, z)
//!
//! Older databases carry the legacy `deathlocations(playerid, worldname, x, y, z)`
//! table, which is migrated on connect.

pub mod cache;
pub mod datastore;
pub mod migrator;
pub mod repository;
pub mod schema;
pub mod sqlite;

pub use cache::DeathLocationCache;
pub use datastore::DataStore;
pub use migrator::{MigrationOutcome, SchemaMigrator, SchemaVersion};
pub use repository::{DeathLocationRepository, SqliteDeathLocationRepository};
pub use sqlite::{SqliteStore, StoreStats, StoredLocation};
