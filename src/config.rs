use crate::world::WorldRegistry;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use uuid::Uuid;

pub const DEFAULT_DATABASE_FILE: &str = "deathlocations.db";
pub const DEFAULT_LOCALE: &str = "en-US";

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct StoreConfig {
    /// Private data directory holding the database file
    pub data_dir: Option<String>,
    /// Database file name, relative to `data_dir` unless absolute
    pub database: Option<String>,
    pub locale: Option<String>,
    /// TOML file with message template overrides
    pub messages: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub worlds: Vec<WorldEntry>,
}

/// A world known to the operator tooling
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct WorldEntry {
    pub name: String,
    pub uid: Uuid,
}

impl StoreConfig {
    pub fn data_dir(&self) -> PathBuf {
        self.data_dir
            .as_deref()
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from("."))
    }

    pub fn database_path(&self) -> PathBuf {
        match self.database.as_deref() {
            Some(db) if Path::new(db).is_absolute() => PathBuf::from(db),
            Some(db) => self.data_dir().join(db),
            None => default_database_path_in(&self.data_dir()),
        }
    }

    pub fn locale(&self) -> &str {
        self.locale.as_deref().unwrap_or(DEFAULT_LOCALE)
    }

    pub fn messages_path(&self) -> Option<PathBuf> {
        self.messages.as_deref().map(|m| {
            let path = PathBuf::from(m);
            if path.is_absolute() { path } else { self.data_dir().join(path) }
        })
    }

    pub fn world_registry(&self) -> WorldRegistry {
        WorldRegistry::with_worlds(self.worlds.iter().map(|w| (w.uid, w.name.clone())))
    }
}

pub fn default_config_path() -> PathBuf {
    PathBuf::from("deathcompass.toml")
}

pub fn default_database_path_in(base: &Path) -> PathBuf {
    base.join(DEFAULT_DATABASE_FILE)
}

pub fn load_config(path: Option<&Path>) -> anyhow::Result<Option<StoreConfig>> {
    let path = path.map(Path::to_path_buf).unwrap_or_else(default_config_path);
    if !path.exists() {
        return Ok(None);
    }

    let contents = std::fs::read_to_string(&path)?;
    let config: StoreConfig = toml::from_str(&contents)?;
    Ok(Some(config))
}

pub fn write_config(path: &Path, config: &StoreConfig, force: bool) -> anyhow::Result<()> {
    if path.exists() && !force {
        anyhow::bail!("config already exists at {} (use --force to overwrite)", path.display());
    }

    let contents = toml::to_string_pretty(config)?;
    std::fs::write(path, contents)?;
    Ok(())
}

pub fn ensure_db_dir(db_path: &Path) -> std::io::Result<()> {
    if let Some(parent) = db_path.parent() {
        if !parent.as_os_str().is_empty() && !parent.exists() {
            std::fs::create_dir_all(parent)?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::world::WorldResolver;

    #[test]
    fn test_defaults() {
        let config = StoreConfig::default();
        assert_eq!(config.database_path(), PathBuf::from(".").join(DEFAULT_DATABASE_FILE));
        assert_eq!(config.locale(), DEFAULT_LOCALE);
        assert!(config.messages_path().is_none());
    }

    #[test]
    fn test_parse_with_worlds() {
        let config: StoreConfig = toml::from_str(
            r#"
            data_dir = "plugins/DeathCompass"
            database = "deaths.db"
            messages = "messages.toml"

            [[worlds]]
            name = "world"
            uid = "4a1c2b0e-1111-4c3b-9f1e-2a5b6c7d8e9f"
            "#,
        )
        .unwrap();

        assert_eq!(
            config.database_path(),
            PathBuf::from("plugins/DeathCompass").join("deaths.db")
        );
        assert_eq!(
            config.messages_path(),
            Some(PathBuf::from("plugins/DeathCompass").join("messages.toml"))
        );
        let registry = config.world_registry();
        assert_eq!(registry.world_name(config.worlds[0].uid).as_deref(), Some("world"));
    }

    #[test]
    fn test_write_and_load_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("deathcompass.toml");
        let config = StoreConfig {
            data_dir: Some("data".to_string()),
            ..Default::default()
        };

        write_config(&path, &config, false).unwrap();
        assert!(write_config(&path, &config, false).is_err());
        write_config(&path, &config, true).unwrap();

        let loaded = load_config(Some(&path)).unwrap().unwrap();
        assert_eq!(loaded.data_dir.as_deref(), Some("data"));
        assert!(load_config(Some(&dir.path().join("missing.toml"))).unwrap().is_none());
    }

    #[test]
    fn test_ensure_db_dir_creates_parents() {
        let dir = tempfile::tempdir().unwrap();
        let db_path = dir.path().join("nested").join("deep").join("deathlocations.db");
        ensure_db_dir(&db_path).unwrap();
        assert!(db_path.parent().unwrap().exists());
    }
}
