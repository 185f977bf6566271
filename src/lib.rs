//! # DeathCompass - death location storage
//!
//! Records the most recent death of each player in each world and hands it
//! back so a compass can point at it.
//!
//! DeathCompass provides:
//! - A `Valid`/`Invalid` death location model with typed failure reasons
//! - A session-scoped cache invalidated when a player disconnects
//! - SQLite persistence with UUIDs stored as split 64-bit integers
//! - One-shot migration of the legacy text-UUID/world-name layout
//!
//! Event dispatch, commands and compass targeting live in the host; they call
//! the [`DeathLocationRepository`] contract.

pub mod config;
pub mod location;
pub mod messages;
pub mod storage;
pub mod world;

// Re-exports for convenient access
pub use location::{DeathLocation, DeathLocationKey, DeathLocationReason, Location, ValidDeathLocation};
pub use messages::{MessageCatalog, StoreMessage};
pub use storage::{DataStore, DeathLocationRepository, SqliteDeathLocationRepository, SqliteStore};
pub use world::{WorldRegistry, WorldResolver};

/// Result type alias for DeathCompass operations
pub type Result<T> = std::result::Result<T, Error>;

/// Error types for DeathCompass operations.
///
/// These stay below the repository boundary; callers of the repository see
/// `DeathLocation::Invalid` or a zero row count instead.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Storage error: {0}")]
    Storage(#[from] rusqlite::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Datastore is not connected")]
    Disconnected,

    #[error("Config error: {0}")]
    Config(#[from] toml::de::Error),
}
