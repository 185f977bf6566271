//! World resolution - the boundary to the live game server
//!
//! Stored records identify worlds by UUID. Whether that UUID names a loaded
//! world is only known at the moment of asking, so the store asks through
//! [`WorldResolver`] every time it needs an answer.

use dashmap::DashMap;
use uuid::Uuid;

/// Resolves world identifiers against the set of currently loaded worlds.
pub trait WorldResolver: Send + Sync {
    /// Name of the loaded world with this UUID
    fn world_name(&self, world_uid: Uuid) -> Option<String>;

    /// UUID of the loaded world with this name
    fn world_uid(&self, world_name: &str) -> Option<Uuid>;

    fn is_loaded(&self, world_uid: Uuid) -> bool {
        self.world_name(world_uid).is_some()
    }
}

/// In-memory world registry, updated by the host as worlds load and unload.
///
/// Uses DashMap so load/unload notifications and lookups can come from
/// different threads.
#[derive(Debug, Default)]
pub struct WorldRegistry {
    by_uid: DashMap<Uuid, String>,
    by_name: DashMap<String, Uuid>,
}

impl WorldRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a registry from `(uid, name)` pairs
    pub fn with_worlds<I, S>(worlds: I) -> Self
    where
        I: IntoIterator<Item = (Uuid, S)>,
        S: Into<String>,
    {
        let registry = Self::new();
        for (uid, name) in worlds {
            registry.load(uid, name);
        }
        registry
    }

    /// Mark a world as loaded. Reloading a UUID under a new name replaces the old name.
    pub fn load(&self, world_uid: Uuid, world_name: impl Into<String>) {
        let world_name = world_name.into();
        if let Some(previous) = self.by_uid.insert(world_uid, world_name.clone()) {
            self.by_name.remove(&previous);
        }
        self.by_name.insert(world_name, world_uid);
    }

    /// Mark a world as unloaded. Returns the name it was loaded under.
    pub fn unload(&self, world_uid: Uuid) -> Option<String> {
        let (_, name) = self.by_uid.remove(&world_uid)?;
        self.by_name.remove(&name);
        Some(name)
    }

    pub fn len(&self) -> usize {
        self.by_uid.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_uid.is_empty()
    }

    /// Loaded worlds sorted by name
    pub fn worlds(&self) -> Vec<(Uuid, String)> {
        let mut worlds: Vec<_> = self
            .by_uid
            .iter()
            .map(|entry| (*entry.key(), entry.value().clone()))
            .collect();
        worlds.sort_by(|a, b| a.1.cmp(&b.1));
        worlds
    }
}

impl WorldResolver for WorldRegistry {
    fn world_name(&self, world_uid: Uuid) -> Option<String> {
        self.by_uid.get(&world_uid).map(|name| name.value().clone())
    }

    fn world_uid(&self, world_name: &str) -> Option<Uuid> {
        self.by_name.get(world_name).map(|uid| *uid.value())
    }
}
