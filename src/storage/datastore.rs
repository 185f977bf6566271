//! Datastore lifecycle
//!
//! [`DataStore`] is built once at startup, connected, handed to the event
//! handlers by reference, and closed at shutdown. Connecting migrates the
//! schema before the repository serves anything.

use std::sync::Arc;

use uuid::Uuid;

use super::migrator::{MigrationOutcome, SchemaMigrator};
use super::repository::SqliteDeathLocationRepository;
use super::sqlite::{self, SqliteStore, StoreStats};
use crate::config::StoreConfig;
use crate::messages::{DATASTORE_NAME, MessageCatalog, StoreMessage};
use crate::world::WorldResolver;
use crate::Result;

pub struct DataStore {
    store: Arc<SqliteStore>,
    repository: SqliteDeathLocationRepository,
    messages: Arc<MessageCatalog>,
}

impl DataStore {
    pub fn new(store: SqliteStore, worlds: Arc<dyn WorldResolver>, messages: MessageCatalog) -> Self {
        let store = Arc::new(store);
        let messages = Arc::new(messages);
        let repository = SqliteDeathLocationRepository::new(store.clone(), worlds, messages.clone());
        Self {
            store,
            repository,
            messages,
        }
    }

    /// Build an unconnected datastore for the configured database file.
    ///
    /// An unreadable messages file is logged and the built-in messages are used.
    pub fn from_config(config: &StoreConfig, worlds: Arc<dyn WorldResolver>) -> Self {
        let messages = match config.messages_path() {
            Some(path) => MessageCatalog::load(&path).unwrap_or_else(|e| {
                tracing::warn!(path = %path.display(), error = %e, "Could not load message overrides");
                MessageCatalog::new()
            }),
            None => MessageCatalog::new(),
        };
        Self::new(SqliteStore::new(config.database_path()), worlds, messages)
    }

    /// Open the database, migrate, and ensure the table exists.
    ///
    /// Connecting twice is a logged no-op. Any failure is logged and leaves
    /// the datastore disconnected; repository calls then report
    /// `StoreException` / zero rows.
    pub fn connect(&self) -> &Self {
        if let Err(e) = self.initialize() {
            tracing::error!(
                message_id = StoreMessage::DatastoreOpenError.id(),
                path = %self.store.describe(),
                error = ?e,
                "{}: {}",
                self.messages.render(StoreMessage::DatastoreOpenError, &[&DATASTORE_NAME]),
                e
            );
            if let Err(e) = self.store.close() {
                tracing::debug!(error = %e, "Discarding half-open connection failed");
            }
        }
        self
    }

    fn initialize(&self) -> Result<()> {
        if !self.store.open()? {
            tracing::info!(
                message_id = StoreMessage::DatastoreInitializeError.id(),
                "{}",
                self.messages.render(StoreMessage::DatastoreInitializeError, &[&DATASTORE_NAME])
            );
            return Ok(());
        }

        if SchemaMigrator::new(&self.repository).update() == MigrationOutcome::Failed {
            tracing::warn!(path = %self.store.describe(), "Schema migration did not complete");
        }

        self.store
            .with_connection(|conn| sqlite::create_tables(conn))
            .inspect_err(|_| {
                tracing::warn!(
                    message_id = StoreMessage::CreateDeathLocationTableError.id(),
                    "{}",
                    self.messages
                        .render(StoreMessage::CreateDeathLocationTableError, &[&DATASTORE_NAME])
                );
            })?;

        tracing::info!(
            message_id = StoreMessage::DatastoreInitializeNotice.id(),
            path = %self.store.describe(),
            "{}",
            self.messages.render(StoreMessage::DatastoreInitializeNotice, &[&DATASTORE_NAME])
        );
        Ok(())
    }

    /// Release the connection. Safe to call repeatedly; never fails.
    pub fn close(&self) {
        match self.store.close() {
            Ok(true) => tracing::info!(
                message_id = StoreMessage::DatastoreCloseNotice.id(),
                "{}",
                self.messages.render(StoreMessage::DatastoreCloseNotice, &[&DATASTORE_NAME])
            ),
            Ok(false) => tracing::debug!("Datastore already closed"),
            Err(e) => tracing::warn!(
                message_id = StoreMessage::DatastoreCloseError.id(),
                error = ?e,
                "{}: {}",
                self.messages.render(StoreMessage::DatastoreCloseError, &[&DATASTORE_NAME]),
                e
            ),
        }
        self.repository.cache().clear();
    }

    pub fn is_connected(&self) -> bool {
        self.store.is_connected()
    }

    pub fn death_locations(&self) -> &SqliteDeathLocationRepository {
        &self.repository
    }

    pub fn messages(&self) -> &MessageCatalog {
        &self.messages
    }

    pub fn store(&self) -> &SqliteStore {
        &self.store
    }

    pub fn stats(&self) -> Result<StoreStats> {
        self.store.stats()
    }

    /// Player disconnect notification from the host
    pub fn player_disconnected(&self, player_uid: Uuid) -> usize {
        self.repository.invalidate_player(player_uid)
    }
}

impl Drop for DataStore {
    fn drop(&mut self) {
        if self.store.is_connected() {
            self.close();
        }
    }
}
