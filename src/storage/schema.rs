//! Database schema definitions

/// Schema version written to `PRAGMA user_version` once the current layout is in place.
/// Version 0 is the legacy layout.
pub const CURRENT_SCHEMA_VERSION: i64 = 1;

/// Table name of the legacy layout
pub const LEGACY_TABLE: &str = "deathlocations";

/// SQL to create the death_locations table
///
/// UUIDs are split into most/least significant 64-bit halves. `world_name`
/// is diagnostic only and never part of a lookup.
pub const CREATE_DEATH_LOCATIONS_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS death_locations (
    player_uid_msb INTEGER NOT NULL,
    player_uid_lsb INTEGER NOT NULL,
    world_name TEXT NOT NULL,
    world_uid_msb INTEGER NOT NULL,
    world_uid_lsb INTEGER NOT NULL,
    x REAL NOT NULL,
    y REAL NOT NULL,
    z REAL NOT NULL,
    PRIMARY KEY (player_uid_msb, player_uid_lsb, world_uid_msb, world_uid_lsb)
)
"#;

/// SQL to create the legacy table (player UUID as text, world by name).
/// Only used to build legacy fixtures; nothing writes this layout.
pub const CREATE_LEGACY_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS deathlocations (
    playerid TEXT NOT NULL,
    worldname TEXT NOT NULL,
    x REAL NOT NULL,
    y REAL NOT NULL,
    z REAL NOT NULL
)
"#;

pub const DROP_LEGACY_TABLE: &str = "DROP TABLE IF EXISTS deathlocations";

pub const SELECT_TABLE: &str = "SELECT name FROM sqlite_master WHERE type = 'table' AND name = ?1";

pub const GET_USER_VERSION: &str = "PRAGMA user_version";

pub const SELECT_LOCATION: &str = r#"
SELECT player_uid_msb, player_uid_lsb, world_name, world_uid_msb, world_uid_lsb, x, y, z
FROM death_locations
WHERE player_uid_msb = ?1 AND player_uid_lsb = ?2 AND world_uid_msb = ?3 AND world_uid_lsb = ?4
"#;

pub const INSERT_LOCATION: &str = r#"
INSERT OR REPLACE INTO death_locations
    (player_uid_msb, player_uid_lsb, world_name, world_uid_msb, world_uid_lsb, x, y, z)
VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
"#;

pub const DELETE_LOCATION: &str = r#"
DELETE FROM death_locations
WHERE player_uid_msb = ?1 AND player_uid_lsb = ?2 AND world_uid_msb = ?3 AND world_uid_lsb = ?4
"#;

pub const COUNT_LOCATIONS: &str = "SELECT COUNT(*) FROM death_locations";

pub const SELECT_ALL_LEGACY_LOCATIONS: &str =
    "SELECT playerid, worldname, x, y, z FROM deathlocations";

/// `PRAGMA` does not accept bound parameters
pub fn set_user_version(version: i64) -> String {
    format!("PRAGMA user_version = {}", version)
}
