//! Operator messages
//!
//! Every operational log line emitted by the store is identified by a
//! [`StoreMessage`]. The identifier is stable and is logged as the
//! `message_id` field; the text comes from a [`MessageCatalog`], which falls
//! back to the built-in English template when no override is loaded.

use crate::location::DeathLocationReason;
use crate::Result;
use std::borrow::Cow;
use std::collections::HashMap;
use std::fmt::{Display, Write};
use std::path::Path;

/// Name used for the backing store in operator messages
pub const DATASTORE_NAME: &str = "SQLite";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StoreMessage {
    DatastoreInitializeNotice,
    DatastoreInitializeError,
    DatastoreOpenError,
    DatastoreCloseNotice,
    DatastoreCloseError,
    CreateDeathLocationTableError,
    SchemaVersionError,
    SchemaUpdateError,
    SchemaUpToDateNotice,
    SchemaDeathLocationsMigratedNotice,
    SchemaUpdatePlayerUuidInvalid,
    SchemaUpdateWorldInvalid,
    SchemaUpdateSelectAllError,
    SelectRecordError,
    SelectRecordWorldInvalidError,
    InsertRecordError,
    InsertRecordWorldInvalidError,
    DeleteRecordError,
}

impl StoreMessage {
    pub fn id(&self) -> &'static str {
        match self {
            StoreMessage::DatastoreInitializeNotice => "DATASTORE_INITIALIZE_NOTICE",
            StoreMessage::DatastoreInitializeError => "DATASTORE_INITIALIZE_ERROR",
            StoreMessage::DatastoreOpenError => "DATASTORE_OPEN_ERROR",
            StoreMessage::DatastoreCloseNotice => "DATASTORE_CLOSE_NOTICE",
            StoreMessage::DatastoreCloseError => "DATASTORE_CLOSE_ERROR",
            StoreMessage::CreateDeathLocationTableError => "CREATE_DEATH_LOCATION_TABLE_ERROR",
            StoreMessage::SchemaVersionError => "SCHEMA_VERSION_ERROR",
            StoreMessage::SchemaUpdateError => "SCHEMA_UPDATE_ERROR",
            StoreMessage::SchemaUpToDateNotice => "SCHEMA_UP_TO_DATE_NOTICE",
            StoreMessage::SchemaDeathLocationsMigratedNotice => {
                "SCHEMA_DEATH_LOCATIONS_MIGRATED_NOTICE"
            }
            StoreMessage::SchemaUpdatePlayerUuidInvalid => "SCHEMA_UPDATE_PLAYER_UUID_INVALID",
            StoreMessage::SchemaUpdateWorldInvalid => "SCHEMA_UPDATE_WORLD_INVALID",
            StoreMessage::SchemaUpdateSelectAllError => "SCHEMA_UPDATE_SELECT_ALL_ERROR",
            StoreMessage::SelectRecordError => "SELECT_RECORD_ERROR",
            StoreMessage::SelectRecordWorldInvalidError => "SELECT_RECORD_WORLD_INVALID_ERROR",
            StoreMessage::InsertRecordError => "INSERT_RECORD_ERROR",
            StoreMessage::InsertRecordWorldInvalidError => "INSERT_RECORD_WORLD_INVALID_ERROR",
            StoreMessage::DeleteRecordError => "DELETE_RECORD_ERROR",
        }
    }

    /// Built-in English template. `{0}`, `{1}`... are positional arguments.
    pub fn default_template(&self) -> &'static str {
        match self {
            StoreMessage::DatastoreInitializeNotice => "{0} datastore initialized.",
            StoreMessage::DatastoreInitializeError => "The {0} datastore is already initialized.",
            StoreMessage::DatastoreOpenError => "Could not initialize the {0} datastore!",
            StoreMessage::DatastoreCloseNotice => "{0} datastore connection closed.",
            StoreMessage::DatastoreCloseError => {
                "An error occurred while closing the {0} datastore connection."
            }
            StoreMessage::CreateDeathLocationTableError => {
                "An error occurred while trying to create the DeathLocation table in the {0} datastore."
            }
            StoreMessage::SchemaVersionError => "Could not read schema version.",
            StoreMessage::SchemaUpdateError => {
                "An error occurred while trying to update the datastore schema."
            }
            StoreMessage::SchemaUpToDateNotice => "Current schema is up to date.",
            StoreMessage::SchemaDeathLocationsMigratedNotice => {
                "{0} death location records migrated to schema v{1}."
            }
            StoreMessage::SchemaUpdatePlayerUuidInvalid => {
                "Player UUID '{0}' in datastore is invalid! Skipping record."
            }
            StoreMessage::SchemaUpdateWorldInvalid => {
                "Stored record has invalid world '{0}'. Skipping record."
            }
            StoreMessage::SchemaUpdateSelectAllError => {
                "An error occurred while trying to select all records from the {0} datastore."
            }
            StoreMessage::SelectRecordError => {
                "An error occurred while trying to select a record from the {0} datastore."
            }
            StoreMessage::SelectRecordWorldInvalidError => "World '{0}' is not loaded!",
            StoreMessage::InsertRecordError => {
                "An error occurred while inserting a record into the {0} datastore."
            }
            StoreMessage::InsertRecordWorldInvalidError => {
                "An error occurred while inserting a record in the {0} datastore. World invalid!"
            }
            StoreMessage::DeleteRecordError => {
                "An error occurred while attempting to delete a record from the {0} datastore."
            }
        }
    }

    pub fn all() -> &'static [StoreMessage] {
        &[
            StoreMessage::DatastoreInitializeNotice,
            StoreMessage::DatastoreInitializeError,
            StoreMessage::DatastoreOpenError,
            StoreMessage::DatastoreCloseNotice,
            StoreMessage::DatastoreCloseError,
            StoreMessage::CreateDeathLocationTableError,
            StoreMessage::SchemaVersionError,
            StoreMessage::SchemaUpdateError,
            StoreMessage::SchemaUpToDateNotice,
            StoreMessage::SchemaDeathLocationsMigratedNotice,
            StoreMessage::SchemaUpdatePlayerUuidInvalid,
            StoreMessage::SchemaUpdateWorldInvalid,
            StoreMessage::SchemaUpdateSelectAllError,
            StoreMessage::SelectRecordError,
            StoreMessage::SelectRecordWorldInvalidError,
            StoreMessage::InsertRecordError,
            StoreMessage::InsertRecordWorldInvalidError,
            StoreMessage::DeleteRecordError,
        ]
    }
}

/// Message templates keyed by message id, with built-in fallbacks.
#[derive(Debug, Clone, Default)]
pub struct MessageCatalog {
    overrides: HashMap<String, String>,
}

impl MessageCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load overrides from a flat TOML table of `MESSAGE_ID = "template"`.
    pub fn load(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        Self::from_toml(&contents)
    }

    pub fn from_toml(contents: &str) -> Result<Self> {
        let overrides: HashMap<String, String> = toml::from_str(contents)?;
        Ok(Self { overrides })
    }

    pub fn template(&self, message: StoreMessage) -> &str {
        self.overrides
            .get(message.id())
            .map(String::as_str)
            .unwrap_or_else(|| message.default_template())
    }

    /// Render a message, substituting positional arguments.
    pub fn render(&self, message: StoreMessage, args: &[&dyn Display]) -> String {
        substitute(self.template(message), args)
    }

    /// Localized description for an invalid-location reason
    pub fn reason(&self, reason: DeathLocationReason) -> Cow<'_, str> {
        match self.overrides.get(reason.key()) {
            Some(text) => Cow::Borrowed(text.as_str()),
            None => Cow::Borrowed(reason.description()),
        }
    }
}

/// Replace `{N}` placeholders in one pass, so argument text is never rescanned.
/// Placeholders without a matching argument are left as written.
fn substitute(template: &str, args: &[&dyn Display]) -> String {
    let mut rendered = String::with_capacity(template.len());
    let mut rest = template;

    while let Some(open) = rest.find('{') {
        rendered.push_str(&rest[..open]);
        let after = &rest[open + 1..];
        let placeholder = after.find('}').and_then(|close| {
            let index = after[..close].parse::<usize>().ok()?;
            args.get(index).map(|arg| (arg, close))
        });

        match placeholder {
            Some((arg, close)) => {
                let _ = write!(rendered, "{}", arg);
                rest = &after[close + 1..];
            }
            None => {
                rendered.push('{');
                rest = after;
            }
        }
    }

    rendered.push_str(rest);
    rendered
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_default_render() {
        let catalog = MessageCatalog::new();
        assert_eq!(
            catalog.render(StoreMessage::SchemaDeathLocationsMigratedNotice, &[&3, &1]),
            "3 death location records migrated to schema v1."
        );
        assert_eq!(
            catalog.render(StoreMessage::DatastoreInitializeNotice, &[&DATASTORE_NAME]),
            "SQLite datastore initialized."
        );
    }

    #[test]
    fn test_render_does_not_rescan_arguments() {
        let catalog = MessageCatalog::new();
        assert_eq!(
            catalog.render(StoreMessage::SchemaDeathLocationsMigratedNotice, &[&"{1}", &1]),
            "{1} death location records migrated to schema v1."
        );
        assert_eq!(
            catalog.render(StoreMessage::SchemaUpdateWorldInvalid, &[&"{0}"]),
            "Stored record has invalid world '{0}'. Skipping record."
        );
        // missing argument stays visible
        assert_eq!(
            catalog.render(StoreMessage::SchemaDeathLocationsMigratedNotice, &[&2]),
            "2 death location records migrated to schema v{1}."
        );
    }

    #[test]
    fn test_overrides_from_toml() {
        let catalog = MessageCatalog::from_toml(
            r#"
            DATASTORE_CLOSE_NOTICE = "Verbindung zum {0}-Datenspeicher geschlossen."
            RECORD_NOT_FOUND = "Noch kein Todesort gespeichert."
            UNKNOWN_ID = "ignored"
            "#,
        )
        .unwrap();

        assert_eq!(
            catalog.render(StoreMessage::DatastoreCloseNotice, &[&DATASTORE_NAME]),
            "Verbindung zum SQLite-Datenspeicher geschlossen."
        );
        assert_eq!(
            catalog.reason(DeathLocationReason::RecordNotFound),
            "Noch kein Todesort gespeichert."
        );
        assert_eq!(
            catalog.reason(DeathLocationReason::StoreException),
            DeathLocationReason::StoreException.description()
        );
        assert_eq!(
            catalog.template(StoreMessage::DeleteRecordError),
            StoreMessage::DeleteRecordError.default_template()
        );
    }

    #[test]
    fn test_message_ids_are_unique() {
        let ids: HashSet<_> = StoreMessage::all().iter().map(|m| m.id()).collect();
        assert_eq!(ids.len(), StoreMessage::all().len());
    }
}
