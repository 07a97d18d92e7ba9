//! Operator entry point for entity deletion.
//!
//! # Responsibility
//! - Preview (`plan`) or run (`delete`) the cascade deletion of one entity
//!   against the database named in a config file.
//! - Print results as JSON on stdout and errors on stderr.
//!
//! Exit codes: 0 = success, 1 = configuration or store error,
//! 2 = entity not found, 3 = concurrent modification (retry).

use std::path::{Path, PathBuf};
use std::process;

use clap::{Parser, Subcommand};
use log::error;
use serde::Serialize;
use uuid::Uuid;

use xm_entity_core::db::open_db;
use xm_entity_core::{
    init_logging, load_config, CoreConfig, DeleteError, DeletionService, EntityTypeRegistry,
};

/// Entity store maintenance tools.
#[derive(Parser)]
#[command(name = "xm-entity", about = "Entity store maintenance tools")]
struct Cli {
    /// Path to the JSON configuration file.
    #[arg(short, long, default_value = "xm-entity.json")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

/// Available subcommands.
#[derive(Subcommand)]
enum Commands {
    /// Show what deleting an entity would remove, without changing anything.
    Plan {
        /// Entity id.
        id: Uuid,
    },
    /// Delete an entity together with its cascade closure.
    Delete {
        /// Entity id.
        id: Uuid,
    },
    /// Print core linkage information.
    Ping,
}

fn main() {
    let cli = Cli::parse();

    let exit_code = match cli.command {
        Commands::Ping => {
            println!("xm_entity_core ping={}", xm_entity_core::ping());
            println!("xm_entity_core version={}", xm_entity_core::core_version());
            0
        }
        Commands::Plan { id } => run(&cli.config, |service| {
            service.plan_delete(id).map(|plan| print_json(&plan))
        }),
        Commands::Delete { id } => run(&cli.config, |service| {
            service.delete_entity(id).map(|ack| print_json(&ack))
        }),
    };
    process::exit(exit_code);
}

/// Loads configuration, opens the store and runs one deletion command.
fn run<F>(config_path: &Path, command: F) -> i32
where
    F: FnOnce(&DeletionService<'_, EntityTypeRegistry>) -> Result<(), DeleteError>,
{
    let config = match load_config(config_path) {
        Ok(config) => config,
        Err(err) => {
            eprintln!("Error: {err}");
            return 1;
        }
    };

    if let Err(message) = start_logging(&config) {
        eprintln!("Error: {message}");
        return 1;
    }

    let registry = match &config.entity_types_path {
        Some(path) => match EntityTypeRegistry::from_path(path) {
            Ok(registry) => registry,
            Err(err) => {
                eprintln!("Error: {err}");
                return 1;
            }
        },
        None => EntityTypeRegistry::new(),
    };

    let conn = match open_db(&config.database_path) {
        Ok(conn) => conn,
        Err(err) => {
            eprintln!(
                "Error: failed to open database '{}': {err}",
                config.database_path.display()
            );
            return 1;
        }
    };

    let service = match DeletionService::try_new(&conn, registry) {
        Ok(service) => service,
        Err(err) => {
            eprintln!("Error: {err}");
            return 1;
        }
    };

    match command(&service) {
        Ok(()) => 0,
        Err(err) => {
            error!(
                "event=cli_command module=cli status=error error_code={} error={}",
                err.code(),
                err
            );
            eprintln!("Error: {err}");
            exit_code_for(&err)
        }
    }
}

fn start_logging(config: &CoreConfig) -> Result<(), String> {
    let Some(log_dir) = &config.log_dir else {
        return Ok(());
    };
    let log_dir = log_dir
        .to_str()
        .ok_or_else(|| format!("log directory is not valid UTF-8: {}", log_dir.display()))?;
    init_logging(config.log_level_or_default(), log_dir)
}

fn exit_code_for(err: &DeleteError) -> i32 {
    match err {
        DeleteError::NotFound(_) => 2,
        _ if err.is_conflict() => 3,
        _ => 1,
    }
}

fn print_json<T: Serialize>(value: &T) {
    match serde_json::to_string_pretty(value) {
        Ok(json) => println!("{json}"),
        Err(err) => eprintln!("Error: failed to render output: {err}"),
    }
}
