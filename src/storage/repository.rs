//! Death location repository
//!
//! The single entry point callers use. Reads go cache -> store, writes go
//! cache -> store. Nothing here returns an error: every failure becomes a
//! [`DeathLocation::Invalid`] or a zero row count after it has been logged.

use std::sync::Arc;

use rusqlite::Connection;
use uuid::Uuid;

use super::cache::DeathLocationCache;
use super::sqlite::{self, SqliteStore};
use crate::location::{DeathLocation, DeathLocationKey, DeathLocationReason, ValidDeathLocation};
use crate::messages::{DATASTORE_NAME, MessageCatalog, StoreMessage};
use crate::world::WorldResolver;
use crate::Error;

/// Repository contract consumed by the game event handlers.
pub trait DeathLocationRepository: Send + Sync {
    /// Fetch the latest death location for a key
    fn get_death_location(&self, player_uid: Option<Uuid>, world_uid: Option<Uuid>) -> DeathLocation;

    /// Save a death location, overwriting any record for the same key.
    /// Returns rows affected (0 or 1); `None` is a no-op.
    fn save_death_location(&self, location: Option<&ValidDeathLocation>) -> usize;

    /// Save many death locations, skipping the ones that cannot be written.
    /// Returns the total rows affected.
    fn save_death_locations(&self, locations: &[ValidDeathLocation]) -> usize;

    /// Delete the record for a key, returning what was stored
    fn delete_death_location(&self, player_uid: Option<Uuid>, world_uid: Option<Uuid>) -> DeathLocation;
}

/// SQLite-backed repository with a write-through cache
pub struct SqliteDeathLocationRepository {
    store: Arc<SqliteStore>,
    cache: DeathLocationCache,
    worlds: Arc<dyn WorldResolver>,
    messages: Arc<MessageCatalog>,
}

impl SqliteDeathLocationRepository {
    pub fn new(store: Arc<SqliteStore>, worlds: Arc<dyn WorldResolver>, messages: Arc<MessageCatalog>) -> Self {
        Self {
            store,
            cache: DeathLocationCache::new(),
            worlds,
            messages,
        }
    }

    pub fn store(&self) -> &SqliteStore {
        &self.store
    }

    pub fn cache(&self) -> &DeathLocationCache {
        &self.cache
    }

    pub fn worlds(&self) -> &dyn WorldResolver {
        self.worlds.as_ref()
    }

    pub fn messages(&self) -> &MessageCatalog {
        &self.messages
    }

    /// Drop cached entries for a player that disconnected
    pub fn invalidate_player(&self, player_uid: Uuid) -> usize {
        let dropped = self.cache.invalidate_player(player_uid);
        tracing::debug!(player = %player_uid, dropped, "Invalidated cached death locations");
        dropped
    }

    /// Insert each location on an already-locked connection.
    ///
    /// Rows whose world is not loaded or whose insert fails are logged and
    /// skipped. The cache is not touched.
    pub(crate) fn insert_batch(&self, conn: &Connection, locations: &[ValidDeathLocation]) -> usize {
        let mut count = 0;
        for location in locations {
            let Some(world_name) = self.worlds.world_name(location.world_uid()) else {
                self.reject(location);
                continue;
            };
            match sqlite::insert_location(conn, location, &world_name) {
                Ok(inserted) => count += inserted,
                Err(e) => self.fault(StoreMessage::InsertRecordError, &e),
            }
        }
        count
    }

    fn select(&self, key: &DeathLocationKey) -> DeathLocation {
        let stored = match self.store.with_connection(|conn| sqlite::select_location(conn, key)) {
            Ok(Some(stored)) => stored,
            Ok(None) => return DeathLocation::Invalid(DeathLocationReason::RecordNotFound),
            Err(e) => {
                self.fault(StoreMessage::SelectRecordError, &e);
                return DeathLocation::Invalid(DeathLocationReason::StoreException);
            }
        };

        if !self.worlds.is_loaded(stored.location.world_uid()) {
            self.warn(StoreMessage::SelectRecordWorldInvalidError, &[&stored.world_name]);
            return DeathLocation::Invalid(DeathLocationReason::WorldUnavailable);
        }

        self.cache.put(&stored.location);
        DeathLocation::Valid(stored.location)
    }

    fn warn(&self, message: StoreMessage, args: &[&dyn std::fmt::Display]) {
        tracing::warn!(message_id = message.id(), "{}", self.messages.render(message, args));
    }

    fn reject(&self, location: &ValidDeathLocation) {
        let message = StoreMessage::InsertRecordWorldInvalidError;
        tracing::warn!(
            message_id = message.id(),
            player = %location.player_uid(),
            world = %location.world_uid(),
            "{}",
            self.messages.render(message, &[&DATASTORE_NAME])
        );
    }

    fn fault(&self, message: StoreMessage, error: &Error) {
        tracing::warn!(
            message_id = message.id(),
            error = ?error,
            "{}: {}",
            self.messages.render(message, &[&DATASTORE_NAME]),
            error
        );
    }
}

impl DeathLocationRepository for SqliteDeathLocationRepository {
    fn get_death_location(&self, player_uid: Option<Uuid>, world_uid: Option<Uuid>) -> DeathLocation {
        let key = match DeathLocationKey::validate(player_uid, world_uid) {
            Ok(key) => key,
            Err(reason) => return DeathLocation::Invalid(reason),
        };

        if let DeathLocation::Valid(cached) = self.cache.get(player_uid, world_uid) {
            if self.worlds.is_loaded(cached.world_uid()) {
                tracing::debug!(key = %key, "Death location cache hit");
                return DeathLocation::Valid(cached);
            }
            // world went away; never serve an unresolvable entry
            self.cache.evict(&key);
        }

        tracing::debug!(key = %key, "Death location cache miss");
        self.select(&key)
    }

    fn save_death_location(&self, location: Option<&ValidDeathLocation>) -> usize {
        let Some(location) = location else {
            return 0;
        };

        let Some(world_name) = self.worlds.world_name(location.world_uid()) else {
            self.reject(location);
            return 0;
        };

        self.cache.put(location);

        match self
            .store
            .with_connection(|conn| sqlite::insert_location(conn, location, &world_name))
        {
            Ok(count) => count,
            Err(e) => {
                self.fault(StoreMessage::InsertRecordError, &e);
                0
            }
        }
    }

    fn save_death_locations(&self, locations: &[ValidDeathLocation]) -> usize {
        if locations.is_empty() {
            return 0;
        }

        match self
            .store
            .with_connection(|conn| Ok(self.insert_batch(conn, locations)))
        {
            Ok(count) => count,
            Err(e) => {
                self.fault(StoreMessage::InsertRecordError, &e);
                0
            }
        }
    }

    fn delete_death_location(&self, player_uid: Option<Uuid>, world_uid: Option<Uuid>) -> DeathLocation {
        let key = match DeathLocationKey::validate(player_uid, world_uid) {
            Ok(key) => key,
            Err(reason) => return DeathLocation::Invalid(reason),
        };

        // stored rows are returned whether or not their world is loaded
        let outcome = self.store.with_connection(|conn| {
            let Some(stored) = sqlite::select_location(conn, &key)? else {
                return Ok(None);
            };
            let deleted = sqlite::delete_location(conn, &key)?;
            Ok(Some((stored, deleted)))
        });

        match outcome {
            Ok(Some((stored, deleted))) => {
                tracing::debug!(key = %key, deleted, "{} rows deleted.", deleted);
                self.cache.evict(&key);
                DeathLocation::Valid(stored.location)
            }
            Ok(None) => {
                self.cache.evict(&key);
                DeathLocation::Invalid(DeathLocationReason::RecordNotFound)
            }
            Err(e) => {
                self.fault(StoreMessage::DeleteRecordError, &e);
                DeathLocation::Invalid(DeathLocationReason::StoreException)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::world::WorldRegistry;
    use tracing_test::traced_test;

    const P1: Uuid = Uuid::from_u64_pair(0x1111, 0x0001);
    const P2: Uuid = Uuid::from_u64_pair(0x2222, 0x0002);
    const W1: Uuid = Uuid::from_u64_pair(0xAAAA, 0x0001);
    const W2: Uuid = Uuid::from_u64_pair(0xBBBB, 0x0002);

    /// Create a fresh in-memory repository with two loaded worlds
    fn setup() -> (SqliteDeathLocationRepository, Arc<WorldRegistry>) {
        let store = Arc::new(SqliteStore::in_memory());
        store.open().unwrap();
        store.with_connection(|conn| sqlite::create_tables(conn)).unwrap();

        let worlds = Arc::new(WorldRegistry::with_worlds([(W1, "world"), (W2, "world_nether")]));
        let repository = SqliteDeathLocationRepository::new(
            store,
            worlds.clone(),
            Arc::new(MessageCatalog::new()),
        );
        (repository, worlds)
    }

    fn stored_rows(repository: &SqliteDeathLocationRepository) -> usize {
        repository.store().stats().unwrap().records
    }

    #[test]
    fn test_save_then_get_roundtrip() {
        let (repository, _) = setup();
        let location = ValidDeathLocation::new(P1, W1, 10.0, 64.0, -3.0);

        assert_eq!(repository.save_death_location(Some(&location)), 1);

        let fetched = repository.get_death_location(Some(P1), Some(W1));
        assert_eq!(fetched, DeathLocation::Valid(location));

        // same result straight from the store
        repository.cache().clear();
        assert_eq!(repository.get_death_location(Some(P1), Some(W1)), DeathLocation::Valid(location));
    }

    #[test]
    fn test_get_unknown_key_is_record_not_found() {
        let (repository, _) = setup();
        assert_eq!(
            repository.get_death_location(Some(P2), Some(W2)).reason(),
            Some(DeathLocationReason::RecordNotFound)
        );
    }

    #[test]
    fn test_missing_ids_short_circuit() {
        let (repository, _) = setup();
        repository.save_death_location(Some(&ValidDeathLocation::new(P1, W1, 1.0, 2.0, 3.0)));

        for _ in 0..2 {
            assert_eq!(
                repository.get_death_location(None, Some(W1)).reason(),
                Some(DeathLocationReason::PlayerUidMissing)
            );
            assert_eq!(
                repository.get_death_location(Some(P1), None).reason(),
                Some(DeathLocationReason::WorldUidMissing)
            );
            assert_eq!(
                repository.delete_death_location(None, None).reason(),
                Some(DeathLocationReason::PlayerUidMissing)
            );
            repository.cache().clear();
        }
        assert_eq!(repository.save_death_location(None), 0);
        assert_eq!(stored_rows(&repository), 1);
    }

    #[test]
    fn test_second_save_overwrites() {
        let (repository, _) = setup();
        repository.save_death_location(Some(&ValidDeathLocation::new(P1, W1, 1.0, 1.0, 1.0)));
        let second = ValidDeathLocation::new(P1, W1, 2.0, 2.0, 2.0);
        assert_eq!(repository.save_death_location(Some(&second)), 1);

        assert_eq!(repository.get_death_location(Some(P1), Some(W1)), DeathLocation::Valid(second));
        repository.cache().clear();
        assert_eq!(repository.get_death_location(Some(P1), Some(W1)), DeathLocation::Valid(second));
        assert_eq!(stored_rows(&repository), 1);
    }

    #[test]
    fn test_distinct_worlds_are_independent() {
        let (repository, _) = setup();
        let first = ValidDeathLocation::new(P1, W1, 10.0, 64.0, -3.0);
        let second = ValidDeathLocation::new(P1, W2, -50.0, 30.0, 8.0);
        repository.save_death_location(Some(&first));
        repository.save_death_location(Some(&second));

        assert_eq!(repository.get_death_location(Some(P1), Some(W1)), DeathLocation::Valid(first));
        assert_eq!(repository.get_death_location(Some(P1), Some(W2)), DeathLocation::Valid(second));
    }

    #[test]
    fn test_unloaded_world_is_unavailable_and_not_cached() {
        let (repository, worlds) = setup();
        let location = ValidDeathLocation::new(P1, W1, 10.0, 64.0, -3.0);
        repository.save_death_location(Some(&location));

        worlds.unload(W1);
        assert_eq!(
            repository.get_death_location(Some(P1), Some(W1)).reason(),
            Some(DeathLocationReason::WorldUnavailable)
        );
        assert_eq!(
            repository.cache().get(Some(P1), Some(W1)).reason(),
            Some(DeathLocationReason::RecordNotFound)
        );

        // the row survives; once the world is back it resolves again
        worlds.load(W1, "world");
        assert_eq!(repository.get_death_location(Some(P1), Some(W1)), DeathLocation::Valid(location));
    }

    #[test]
    fn test_save_for_unloaded_world_writes_nothing() {
        let (repository, _) = setup();
        let unknown_world = Uuid::from_u64_pair(0xDEAD, 0xBEEF);
        let location = ValidDeathLocation::new(P1, unknown_world, 1.0, 2.0, 3.0);

        assert_eq!(repository.save_death_location(Some(&location)), 0);
        assert!(repository.cache().is_empty());
        assert_eq!(stored_rows(&repository), 0);
    }

    #[test]
    fn test_disconnect_invalidation_forces_store_read() {
        let (repository, _) = setup();
        let cached = ValidDeathLocation::new(P1, W1, 10.0, 64.0, -3.0);
        repository.save_death_location(Some(&cached));

        // change the row behind the cache's back
        let changed = ValidDeathLocation::new(P1, W1, 99.0, 70.0, 12.0);
        repository
            .store()
            .with_connection(|conn| sqlite::insert_location(conn, &changed, "world"))
            .unwrap();
        assert_eq!(repository.get_death_location(Some(P1), Some(W1)), DeathLocation::Valid(cached));

        assert_eq!(repository.invalidate_player(P1), 1);
        assert_eq!(repository.get_death_location(Some(P1), Some(W1)), DeathLocation::Valid(changed));
    }

    #[test]
    fn test_batch_skips_unresolvable_worlds() {
        let (repository, _) = setup();
        let unknown_world = Uuid::from_u64_pair(0xDEAD, 0xBEEF);
        let locations = [
            ValidDeathLocation::new(P1, W1, 1.0, 1.0, 1.0),
            ValidDeathLocation::new(P1, unknown_world, 2.0, 2.0, 2.0),
            ValidDeathLocation::new(P2, W2, 3.0, 3.0, 3.0),
        ];

        assert_eq!(repository.save_death_locations(&locations), 2);
        assert_eq!(repository.save_death_locations(&[]), 0);
        assert_eq!(stored_rows(&repository), 2);
        assert!(repository.cache().is_empty());
    }

    #[test]
    fn test_delete_returns_stored_record() {
        let (repository, _) = setup();
        let location = ValidDeathLocation::new(P1, W1, 5.0, 6.0, 7.0);
        repository.save_death_location(Some(&location));

        assert_eq!(repository.delete_death_location(Some(P1), Some(W1)), DeathLocation::Valid(location));
        assert_eq!(stored_rows(&repository), 0);
        assert_eq!(
            repository.get_death_location(Some(P1), Some(W1)).reason(),
            Some(DeathLocationReason::RecordNotFound)
        );
        assert_eq!(
            repository.delete_death_location(Some(P1), Some(W1)).reason(),
            Some(DeathLocationReason::RecordNotFound)
        );
    }

    #[test]
    fn test_delete_returns_record_of_unloaded_world() {
        let (repository, worlds) = setup();
        let location = ValidDeathLocation::new(P1, W1, 1.0, 2.0, 3.0);
        repository.save_death_location(Some(&location));

        worlds.unload(W1);
        assert_eq!(repository.delete_death_location(Some(P1), Some(W1)), DeathLocation::Valid(location));
        assert_eq!(stored_rows(&repository), 0);
        assert!(repository.cache().is_empty());
    }

    #[test]
    #[traced_test]
    fn test_rejected_save_names_player_and_world() {
        let (repository, _) = setup();
        let unknown_world = Uuid::from_u64_pair(0xDEAD, 0xBEEF);

        repository.save_death_location(Some(&ValidDeathLocation::new(P1, unknown_world, 1.0, 2.0, 3.0)));
        assert!(logs_contain(&format!("world={}", unknown_world)));
        assert!(logs_contain(&format!("player={}", P1)));

        repository.save_death_locations(&[ValidDeathLocation::new(P2, unknown_world, 1.0, 2.0, 3.0)]);
        assert!(logs_contain(&format!("player={}", P2)));
    }

    #[test]
    fn test_disconnected_store_never_panics() {
        let (repository, _) = setup();
        repository.store().close().unwrap();

        assert_eq!(
            repository.get_death_location(Some(P1), Some(W1)).reason(),
            Some(DeathLocationReason::StoreException)
        );
        assert_eq!(repository.save_death_location(Some(&ValidDeathLocation::new(P2, W2, 0.0, 0.0, 0.0))), 0);
        assert_eq!(repository.save_death_locations(&[ValidDeathLocation::new(P2, W1, 0.0, 0.0, 0.0)]), 0);
        assert_eq!(
            repository.delete_death_location(Some(P1), Some(W2)).reason(),
            Some(DeathLocationReason::StoreException)
        );
    }
}
