//! In-memory cache of death locations
//!
//! Entries are grouped by player so that a disconnect drops every world of
//! that player in one removal. The cache is session-scoped: it is never
//! persisted and is rebuilt from the store on demand.

use std::collections::HashMap;

use dashmap::DashMap;
use uuid::Uuid;

use crate::location::{DeathLocation, DeathLocationKey, DeathLocationReason, ValidDeathLocation};

/// Thread-safe cache keyed by `(player, world)`.
///
/// Writes for the same player serialize on the player's shard lock, so two
/// near-simultaneous deaths in different worlds both land; two writes for the
/// same key are last-write-wins.
#[derive(Debug, Default)]
pub struct DeathLocationCache {
    by_player: DashMap<Uuid, HashMap<Uuid, ValidDeathLocation>>,
}

impl DeathLocationCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or overwrite the entry for the record's key
    pub fn put(&self, location: &ValidDeathLocation) {
        self.by_player
            .entry(location.player_uid())
            .or_default()
            .insert(location.world_uid(), *location);
    }

    /// Look up a cached record.
    ///
    /// Key validation happens before any lookup. A miss is reported as
    /// [`DeathLocationReason::RecordNotFound`].
    pub fn get(&self, player_uid: Option<Uuid>, world_uid: Option<Uuid>) -> DeathLocation {
        let key = match DeathLocationKey::validate(player_uid, world_uid) {
            Ok(key) => key,
            Err(reason) => return DeathLocation::Invalid(reason),
        };

        self.by_player
            .get(&key.player_uid)
            .and_then(|worlds| worlds.get(&key.world_uid).copied())
            .map(DeathLocation::Valid)
            .unwrap_or(DeathLocation::Invalid(DeathLocationReason::RecordNotFound))
    }

    /// Remove a single entry. Returns the evicted record.
    pub fn evict(&self, key: &DeathLocationKey) -> Option<ValidDeathLocation> {
        let mut worlds = self.by_player.get_mut(&key.player_uid)?;
        let evicted = worlds.remove(&key.world_uid);
        let now_empty = worlds.is_empty();
        drop(worlds);

        if now_empty {
            self.by_player.remove_if(&key.player_uid, |_, worlds| worlds.is_empty());
        }
        evicted
    }

    /// Drop every entry for a player (disconnect). Returns how many were dropped.
    pub fn invalidate_player(&self, player_uid: Uuid) -> usize {
        self.by_player
            .remove(&player_uid)
            .map(|(_, worlds)| worlds.len())
            .unwrap_or(0)
    }

    /// Number of cached records across all players
    pub fn len(&self) -> usize {
        self.by_player.iter().map(|entry| entry.value().len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn clear(&self) {
        self.by_player.clear();
    }
}
