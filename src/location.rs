//! Death location model
//!
//! A death location is either:
//! - `Valid`: player, world and the three coordinates of the death
//! - `Invalid`: a typed [`DeathLocationReason`] explaining why no location is available
//!
//! Nothing in this crate signals a missing location with an error or a bare
//! `None`; callers branch on the variant.

use crate::world::WorldResolver;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::hash::{Hash, Hasher};
use uuid::Uuid;

/// Why a death location could not be produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeathLocationReason {
    /// The player identifier was absent
    PlayerUidMissing,
    /// The world identifier was absent
    WorldUidMissing,
    /// The world identifier does not resolve to a loaded world
    WorldUnavailable,
    /// No record is stored for the key
    RecordNotFound,
    /// The store faulted (disconnected, SQL or I/O failure)
    StoreException,
}

impl DeathLocationReason {
    /// Stable key used to look up a localized description
    pub fn key(&self) -> &'static str {
        match self {
            DeathLocationReason::PlayerUidMissing => "PLAYER_UUID_MISSING",
            DeathLocationReason::WorldUidMissing => "WORLD_UUID_MISSING",
            DeathLocationReason::WorldUnavailable => "WORLD_UNAVAILABLE",
            DeathLocationReason::RecordNotFound => "RECORD_NOT_FOUND",
            DeathLocationReason::StoreException => "STORE_EXCEPTION",
        }
    }

    /// Default (English) description
    pub fn description(&self) -> &'static str {
        match self {
            DeathLocationReason::PlayerUidMissing => "The player UUID was missing.",
            DeathLocationReason::WorldUidMissing => "The world UUID was missing.",
            DeathLocationReason::WorldUnavailable => "The world was not available.",
            DeathLocationReason::RecordNotFound => "No death location has been recorded.",
            DeathLocationReason::StoreException => "The death location store failed.",
        }
    }

    pub fn all() -> &'static [DeathLocationReason] {
        &[
            DeathLocationReason::PlayerUidMissing,
            DeathLocationReason::WorldUidMissing,
            DeathLocationReason::WorldUnavailable,
            DeathLocationReason::RecordNotFound,
            DeathLocationReason::StoreException,
        ]
    }
}

impl fmt::Display for DeathLocationReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.description())
    }
}

/// Composite `(player, world)` key. At most one record exists per key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DeathLocationKey {
    pub player_uid: Uuid,
    pub world_uid: Uuid,
}

impl DeathLocationKey {
    pub fn new(player_uid: Uuid, world_uid: Uuid) -> Self {
        Self { player_uid, world_uid }
    }

    /// Validate optional key components.
    ///
    /// The player is checked before the world, so a key missing both reports
    /// [`DeathLocationReason::PlayerUidMissing`].
    pub fn validate(
        player_uid: Option<Uuid>,
        world_uid: Option<Uuid>,
    ) -> std::result::Result<Self, DeathLocationReason> {
        let player_uid = player_uid.ok_or(DeathLocationReason::PlayerUidMissing)?;
        let world_uid = world_uid.ok_or(DeathLocationReason::WorldUidMissing)?;
        Ok(Self { player_uid, world_uid })
    }
}

impl fmt::Display for DeathLocationKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}", self.player_uid, self.world_uid)
    }
}

/// A resolved death location: the world was loaded at the time of resolution.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Location {
    pub world_uid: Uuid,
    pub world_name: String,
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

/// The most recent death of a player in a world.
///
/// Immutable once constructed. Equality and hashing compare coordinates by
/// bit pattern, so `0.0` and `-0.0` are different records and `NaN` equals
/// itself.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct ValidDeathLocation {
    player_uid: Uuid,
    world_uid: Uuid,
    x: f64,
    y: f64,
    z: f64,
}

impl ValidDeathLocation {
    pub fn new(player_uid: Uuid, world_uid: Uuid, x: f64, y: f64, z: f64) -> Self {
        Self { player_uid, world_uid, x, y, z }
    }

    pub fn player_uid(&self) -> Uuid {
        self.player_uid
    }

    pub fn world_uid(&self) -> Uuid {
        self.world_uid
    }

    pub fn x(&self) -> f64 {
        self.x
    }

    pub fn y(&self) -> f64 {
        self.y
    }

    pub fn z(&self) -> f64 {
        self.z
    }

    pub fn key(&self) -> DeathLocationKey {
        DeathLocationKey::new(self.player_uid, self.world_uid)
    }

    /// Resolve the world now and return the location if it is loaded.
    ///
    /// World availability is never stored; a world may unload between the
    /// save and this call.
    pub fn location(&self, worlds: &dyn WorldResolver) -> Option<Location> {
        worlds.world_name(self.world_uid).map(|world_name| Location {
            world_uid: self.world_uid,
            world_name,
            x: self.x,
            y: self.y,
            z: self.z,
        })
    }

    fn coordinate_bits(&self) -> [u64; 3] {
        [self.x.to_bits(), self.y.to_bits(), self.z.to_bits()]
    }
}

impl PartialEq for ValidDeathLocation {
    fn eq(&self, other: &Self) -> bool {
        self.player_uid == other.player_uid
            && self.world_uid == other.world_uid
            && self.coordinate_bits() == other.coordinate_bits()
    }
}

impl Eq for ValidDeathLocation {}

impl Hash for ValidDeathLocation {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.player_uid.hash(state);
        self.world_uid.hash(state);
        self.coordinate_bits().hash(state);
    }
}

impl fmt::Display for ValidDeathLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "player {} died in world {} at ({}, {}, {})",
            self.player_uid, self.world_uid, self.x, self.y, self.z
        )
    }
}

/// Result of every lookup or construction of a death location.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum DeathLocation {
    Valid(ValidDeathLocation),
    Invalid(DeathLocationReason),
}

impl DeathLocation {
    /// Build a death location from possibly-absent identifiers.
    ///
    /// A nil world UUID marks a world that could not be resolved when the
    /// values were read, and yields [`DeathLocationReason::WorldUnavailable`].
    pub fn of(player_uid: Option<Uuid>, world_uid: Option<Uuid>, x: f64, y: f64, z: f64) -> Self {
        match DeathLocationKey::validate(player_uid, world_uid) {
            Err(reason) => DeathLocation::Invalid(reason),
            Ok(key) if key.world_uid.is_nil() => {
                DeathLocation::Invalid(DeathLocationReason::WorldUnavailable)
            }
            Ok(key) => DeathLocation::Valid(ValidDeathLocation::new(
                key.player_uid,
                key.world_uid,
                x,
                y,
                z,
            )),
        }
    }

    pub fn invalid(reason: DeathLocationReason) -> Self {
        DeathLocation::Invalid(reason)
    }

    pub fn is_valid(&self) -> bool {
        matches!(self, DeathLocation::Valid(_))
    }

    pub fn as_valid(&self) -> Option<&ValidDeathLocation> {
        match self {
            DeathLocation::Valid(valid) => Some(valid),
            DeathLocation::Invalid(_) => None,
        }
    }

    pub fn reason(&self) -> Option<DeathLocationReason> {
        match self {
            DeathLocation::Valid(_) => None,
            DeathLocation::Invalid(reason) => Some(*reason),
        }
    }
}

impl From<ValidDeathLocation> for DeathLocation {
    fn from(valid: ValidDeathLocation) -> Self {
        DeathLocation::Valid(valid)
    }
}

impl From<DeathLocationReason> for DeathLocation {
    fn from(reason: DeathLocationReason) -> Self {
        DeathLocation::Invalid(reason)
    }
}
