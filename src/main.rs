//! DeathCompass CLI - operator tooling for the death location store

use clap::{Parser, Subcommand};
use deathcompass::config::{self, StoreConfig};
use deathcompass::{
    DataStore, DeathLocation, DeathLocationRepository, ValidDeathLocation, WorldRegistry, WorldResolver,
};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};
use uuid::Uuid;

#[derive(Parser)]
#[command(name = "deathcompass")]
#[command(version)]
#[command(about = "Inspect and administer the DeathCompass death location store")]
#[command(long_about = r#"
Operates on the same database the game server uses. Opening the store
migrates a legacy database to the current layout.

Worlds are resolved through the [[worlds]] table of the config file.

Example usage:
  deathcompass init
  deathcompass status
  deathcompass get --player 6f1b7a2e-3c4d-4e5f-8a9b-0c1d2e3f4a5b --world world
"#)]
struct Cli {
    /// Path to the config file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Write a default config file
    Init {
        /// Overwrite an existing config file
        #[arg(short, long)]
        force: bool,
    },

    #[command(flatten)]
    Store(StoreCommand),
}

/// Commands that open the datastore
#[derive(Subcommand)]
enum StoreCommand {
    /// Show database path, schema version and record count
    Status {
        /// Emit JSON instead of text
        #[arg(long)]
        json: bool,
    },

    /// Show the stored death location for a player in a world
    Get {
        /// Player UUID
        #[arg(short, long)]
        player: Uuid,

        /// World name or UUID
        #[arg(short, long)]
        world: String,
    },

    /// Record a death location, replacing any existing one
    Save {
        /// Player UUID
        #[arg(short, long)]
        player: Uuid,

        /// World name or UUID
        #[arg(short, long)]
        world: String,

        #[arg(short, long, allow_negative_numbers = true)]
        x: f64,

        #[arg(short, long, allow_negative_numbers = true)]
        y: f64,

        #[arg(short, long, allow_negative_numbers = true)]
        z: f64,
    },

    /// Delete the stored death location for a player in a world
    Delete {
        /// Player UUID
        #[arg(short, long)]
        player: Uuid,

        /// World name or UUID
        #[arg(short, long)]
        world: String,
    },
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        if cli.verbose {
            EnvFilter::new("debug")
        } else {
            EnvFilter::new("info")
        }
    });

    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(filter)
        .init();

    let config_path = cli.config.unwrap_or_else(config::default_config_path);

    match cli.command {
        Commands::Init { force } => {
            config::write_config(&config_path, &StoreConfig::default(), force)?;
            println!("✅ Wrote {}", config_path.display());
            Ok(())
        }
        Commands::Store(command) => run_store_command(&config_path, command),
    }
}

fn run_store_command(config_path: &Path, command: StoreCommand) -> anyhow::Result<()> {
    let store_config = config::load_config(Some(config_path))?.unwrap_or_default();
    let worlds = Arc::new(store_config.world_registry());
    let datastore = DataStore::from_config(&store_config, worlds.clone());
    datastore.connect();
    if !datastore.is_connected() {
        anyhow::bail!("could not open {}", store_config.database_path().display());
    }

    let repository = datastore.death_locations();

    match command {
        StoreCommand::Status { json } => {
            let stats = datastore.stats()?;
            if json {
                let data = serde_json::json!({
                    "database": store_config.database_path().display().to_string(),
                    "locale": store_config.locale(),
                    "schema_version": stats.schema_version,
                    "records": stats.records,
                    "worlds": worlds
                        .worlds()
                        .into_iter()
                        .map(|(uid, name)| serde_json::json!({ "name": name, "uid": uid }))
                        .collect::<Vec<_>>(),
                });
                println!("{}", serde_json::to_string_pretty(&data)?);
            } else {
                println!("📊 DeathCompass Status ({})", store_config.database_path().display());
                println!("------------------------------------");
                println!("  Locale: {}", store_config.locale());
                print!("{}", stats);
                println!("  Worlds: {}", worlds.len());
                for (uid, name) in worlds.worlds() {
                    println!("    - {} ({})", name, uid);
                }
            }
        }

        StoreCommand::Get { player, world } => {
            let world_uid = resolve_world(&worlds, &world)?;
            let location = repository.get_death_location(Some(player), Some(world_uid));
            print_location(&datastore, worlds.as_ref(), &location);
        }

        StoreCommand::Save { player, world, x, y, z } => {
            let world_uid = resolve_world(&worlds, &world)?;
            let location = ValidDeathLocation::new(player, world_uid, x, y, z);
            if repository.save_death_location(Some(&location)) == 0 {
                anyhow::bail!("death location was not saved");
            }
            println!("✅ Saved: {}", location);
        }

        StoreCommand::Delete { player, world } => {
            let world_uid = resolve_world(&worlds, &world)?;
            match repository.delete_death_location(Some(player), Some(world_uid)) {
                DeathLocation::Valid(location) => println!("🗑️  Deleted: {}", location),
                DeathLocation::Invalid(reason) => {
                    println!("∅ Nothing deleted: {}", datastore.messages().reason(reason))
                }
            }
        }
    }

    datastore.close();
    Ok(())
}

/// Accept either a world UUID or the name of a configured world
fn resolve_world(worlds: &WorldRegistry, arg: &str) -> anyhow::Result<Uuid> {
    if let Ok(uid) = Uuid::parse_str(arg) {
        return Ok(uid);
    }
    worlds
        .world_uid(arg)
        .ok_or_else(|| anyhow::anyhow!("unknown world '{}' (add it to [[worlds]] in the config)", arg))
}

fn print_location(datastore: &DataStore, worlds: &dyn WorldResolver, location: &DeathLocation) {
    match location {
        DeathLocation::Valid(valid) => match valid.location(worlds) {
            Some(resolved) => println!(
                "📍 {} died in {} at ({:.1}, {:.1}, {:.1})",
                valid.player_uid(),
                resolved.world_name,
                resolved.x,
                resolved.y,
                resolved.z
            ),
            None => println!("📍 {}", valid),
        },
        DeathLocation::Invalid(reason) => println!("❌ {}", datastore.messages().reason(*reason)),
    }
}
