//! Schema migration
//!
//! Two states, one transition: `Legacy (0) -> Current (>= 1)`, recorded in
//! `PRAGMA user_version`.
//!
//! The legacy layout stored the player UUID as text and the world by name.
//! Migrating decodes every legacy row against the live world list, drops the
//! legacy table, creates the current table, advances the version marker, and
//! re-inserts the decoded rows through the repository's batch path. Rows that
//! cannot be decoded are logged and dropped.

use std::collections::HashSet;

use rusqlite::Connection;
use uuid::Uuid;

use super::repository::SqliteDeathLocationRepository;
use super::schema::{self, CURRENT_SCHEMA_VERSION, LEGACY_TABLE};
use super::sqlite;
use crate::location::{DeathLocation, ValidDeathLocation};
use crate::messages::{DATASTORE_NAME, StoreMessage};
use crate::Result;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchemaVersion {
    Legacy,
    Current(i64),
}

impl SchemaVersion {
    pub fn from_marker(version: i64) -> Self {
        if version >= CURRENT_SCHEMA_VERSION {
            SchemaVersion::Current(version)
        } else {
            SchemaVersion::Legacy
        }
    }
}

/// What a migration run did
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MigrationOutcome {
    /// Version marker already current
    UpToDate(i64),
    /// Version 0 with no legacy table: the current table was created and stamped
    Initialized,
    /// Legacy rows were moved into the current layout
    Migrated { migrated: usize, skipped: usize },
    /// Migration could not run; the legacy table is untouched
    Failed,
}

/// A row of the legacy table, before decoding
#[derive(Debug, Clone)]
struct LegacyRow {
    player_id: String,
    world_name: String,
    x: f64,
    y: f64,
    z: f64,
}

pub struct SchemaMigrator<'a> {
    repository: &'a SqliteDeathLocationRepository,
}

impl<'a> SchemaMigrator<'a> {
    pub fn new(repository: &'a SqliteDeathLocationRepository) -> Self {
        Self { repository }
    }

    /// Run the migration. Holds the store lock for the whole run.
    pub fn update(&self) -> MigrationOutcome {
        match self.repository.store().with_connection(|conn| self.update_locked(conn)) {
            Ok(outcome) => outcome,
            Err(e) => {
                let messages = self.repository.messages();
                tracing::warn!(
                    message_id = StoreMessage::SchemaUpdateError.id(),
                    error = ?e,
                    "{}: {}",
                    messages.render(StoreMessage::SchemaUpdateError, &[]),
                    e
                );
                MigrationOutcome::Failed
            }
        }
    }

    /// Read the version marker, treating an unreadable marker as legacy
    pub fn detect_version(&self, conn: &Connection) -> SchemaVersion {
        match sqlite::user_version(conn) {
            Ok(version) => SchemaVersion::from_marker(version),
            Err(e) => {
                let messages = self.repository.messages();
                tracing::warn!(
                    message_id = StoreMessage::SchemaVersionError.id(),
                    error = %e,
                    "{}",
                    messages.render(StoreMessage::SchemaVersionError, &[])
                );
                SchemaVersion::Legacy
            }
        }
    }

    fn update_locked(&self, conn: &mut Connection) -> Result<MigrationOutcome> {
        let messages = self.repository.messages();

        if let SchemaVersion::Current(version) = self.detect_version(conn) {
            tracing::info!(
                message_id = StoreMessage::SchemaUpToDateNotice.id(),
                version,
                "{}",
                messages.render(StoreMessage::SchemaUpToDateNotice, &[])
            );
            return Ok(MigrationOutcome::UpToDate(version));
        }

        if !sqlite::table_exists(conn, LEGACY_TABLE)? {
            sqlite::create_tables(conn)?;
            sqlite::set_user_version(conn, CURRENT_SCHEMA_VERSION)?;
            tracing::debug!(version = CURRENT_SCHEMA_VERSION, "No legacy table, schema stamped current");
            return Ok(MigrationOutcome::Initialized);
        }

        let (locations, skipped) = match self.select_legacy_locations(conn) {
            Ok(decoded) => decoded,
            Err(e) => {
                tracing::warn!(
                    message_id = StoreMessage::SchemaUpdateSelectAllError.id(),
                    error = %e,
                    "{}",
                    messages.render(StoreMessage::SchemaUpdateSelectAllError, &[&DATASTORE_NAME])
                );
                return Err(e);
            }
        };

        // the version marker is the commit point
        let tx = conn.transaction()?;
        tx.execute_batch(schema::DROP_LEGACY_TABLE)?;
        sqlite::create_tables(&tx)?;
        sqlite::set_user_version(&tx, CURRENT_SCHEMA_VERSION)?;
        tx.commit()?;

        let migrated = self.repository.insert_batch(conn, &locations);
        tracing::info!(
            message_id = StoreMessage::SchemaDeathLocationsMigratedNotice.id(),
            migrated,
            skipped,
            "{}",
            messages.render(
                StoreMessage::SchemaDeathLocationsMigratedNotice,
                &[&migrated, &CURRENT_SCHEMA_VERSION]
            )
        );

        Ok(MigrationOutcome::Migrated { migrated, skipped })
    }

    /// Decode every legacy row. Returns one location per key, the first in
    /// table order, and the number of rows dropped.
    fn select_legacy_locations(&self, conn: &Connection) -> Result<(Vec<ValidDeathLocation>, usize)> {
        let mut stmt = conn.prepare(schema::SELECT_ALL_LEGACY_LOCATIONS)?;
        let rows = stmt.query_map([], |row| {
            Ok(LegacyRow {
                player_id: row.get(0)?,
                world_name: row.get(1)?,
                x: row.get(2)?,
                y: row.get(3)?,
                z: row.get(4)?,
            })
        })?;

        let mut seen = HashSet::new();
        let mut locations = Vec::new();
        let mut skipped = 0;

        for row in rows {
            let decoded = match row {
                Ok(row) => self.decode(&row),
                Err(e) => {
                    tracing::warn!(error = %e, "Unreadable legacy death location row. Skipping record.");
                    None
                }
            };

            match decoded {
                Some(location) if seen.insert(location.key()) => locations.push(location),
                Some(location) => {
                    tracing::debug!(key = %location.key(), "Duplicate legacy death location. Skipping record.");
                    skipped += 1;
                }
                None => skipped += 1,
            }
        }

        Ok((locations, skipped))
    }

    fn decode(&self, row: &LegacyRow) -> Option<ValidDeathLocation> {
        let messages = self.repository.messages();

        let Some(world_uid) = self.repository.worlds().world_uid(&row.world_name) else {
            tracing::warn!(
                message_id = StoreMessage::SchemaUpdateWorldInvalid.id(),
                "{}",
                messages.render(StoreMessage::SchemaUpdateWorldInvalid, &[&row.world_name])
            );
            return None;
        };

        let player_uid = match Uuid::parse_str(row.player_id.trim()) {
            Ok(uid) => uid,
            Err(e) => {
                tracing::warn!(
                    message_id = StoreMessage::SchemaUpdatePlayerUuidInvalid.id(),
                    error = %e,
                    "{}",
                    messages.render(StoreMessage::SchemaUpdatePlayerUuidInvalid, &[&row.player_id])
                );
                return None;
            }
        };

        match DeathLocation::of(Some(player_uid), Some(world_uid), row.x, row.y, row.z) {
            DeathLocation::Valid(location) => Some(location),
            DeathLocation::Invalid(reason) => {
                tracing::warn!(world = %row.world_name, %reason, "Legacy death location rejected");
                None
            }
        }
    }
}
