use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use honodb_core::{Catalog, DatabaseConfig, FileBackend};
use serde_json::{json, Map, Value};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::warn;

mod logging;
mod parser;
mod shell;

use shell::Session;

#[derive(Parser)]
#[command(name = "honodb")]
#[command(about = "HonoDB CLI - Command-line interface for HonoDB database")]
#[command(version)]
struct Cli {
    /// Data directory holding metadata.json and the chunk files
    #[arg(long, global = true, default_value = "./data")]
    data_dir: PathBuf,

    /// JSON configuration file
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Chunk size threshold in bytes (overrides the config file)
    #[arg(long, global = true)]
    max_chunk_bytes: Option<u64>,

    /// Abort opening a collection on the first undecodable record
    #[arg(long, global = true)]
    strict: bool,

    /// Increase log verbosity (-v info, -vv debug, -vvv trace)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Emit logs as JSON
    #[arg(long, global = true)]
    json_logs: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Interactive shell
    Shell {
        /// Database to select on start
        #[arg(long)]
        db: Option<String>,
    },
    /// Run a single verb or shell command and print the result as JSON
    Exec {
        /// Database to run against
        #[arg(long)]
        db: Option<String>,
        /// Command text, e.g. "find 'students' '{}'"
        command: String,
    },
    /// Import data from JSON file into database
    Import {
        /// JSON file to import
        file: PathBuf,
        /// Target database (created if missing)
        #[arg(long)]
        db: String,
    },
    /// Export database to JSON file
    Export {
        /// Output JSON file
        file: PathBuf,
        /// Database to export
        #[arg(long)]
        db: String,
        /// Export only specific collection
        #[arg(long)]
        collection: Option<String>,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    logging::init_tracing(cli.json_logs, cli.verbose);

    let config = load_config(&cli)?;
    let catalog = Catalog::open_dir(&cli.data_dir, config)
        .with_context(|| format!("Failed to open data directory: {}", cli.data_dir.display()))?;

    match cli.command {
        Commands::Shell { db } => {
            let mut session = Session::new(catalog);
            if let Some(db) = db {
                session.use_database(&db)?;
            }
            shell::run(session)
        }
        Commands::Exec { db, command } => {
            let mut session = Session::new(catalog);
            if let Some(db) = db {
                session.use_database(&db)?;
            }
            shell::exec_once(session, &command)
        }
        Commands::Import { file, db } => import_data(&catalog, &file, &db),
        Commands::Export {
            file,
            db,
            collection,
        } => export_data(&catalog, &file, &db, collection.as_deref()),
    }
}

fn load_config(cli: &Cli) -> Result<DatabaseConfig> {
    let mut config = match &cli.config {
        Some(path) => DatabaseConfig::from_file(path)
            .with_context(|| format!("Failed to load config: {}", path.display()))?,
        None => DatabaseConfig::default(),
    };
    if let Some(size) = cli.max_chunk_bytes {
        config = config.max_chunk_bytes(size);
    }
    if cli.strict {
        config = config.strict_replay(true);
    }
    config.validate().context("Invalid configuration")?;
    Ok(config)
}

/// Import data from JSON file
/// Format: { "collection_name": [documents...], ... }
fn import_data(catalog: &Catalog<FileBackend>, file: &Path, db_name: &str) -> Result<()> {
    let content = fs::read_to_string(file)
        .with_context(|| format!("Failed to read file: {}", file.display()))?;

    let data: Map<String, Value> = serde_json::from_str(&content)
        .with_context(|| format!("Invalid JSON in file: {}", file.display()))?;

    if !catalog.has_database(db_name) {
        catalog
            .create_database(db_name)
            .with_context(|| format!("Failed to create database: {}", db_name))?;
    }
    let db = catalog
        .open_database(db_name)
        .with_context(|| format!("Failed to open database: {}", db_name))?;

    let mut total_docs = 0;

    for (collection_name, documents) in data {
        let docs = match documents {
            Value::Array(docs) => docs,
            _ => anyhow::bail!("Collection '{}' must be an array", collection_name),
        };

        let coll = db
            .get_or_create_collection(&collection_name)
            .with_context(|| format!("Failed to create collection: {}", collection_name))?;

        let result = coll.insert_many(docs);
        for (index, outcome) in result.results.iter().enumerate() {
            if let Err(e) = outcome {
                warn!(collection = %collection_name, index, error = %e, "document not imported");
            }
        }

        println!(
            "Imported {} of {} documents into '{}'",
            result.inserted_count,
            result.results.len(),
            collection_name
        );
        total_docs += result.inserted_count;
    }

    println!("Total: {} documents imported to {}", total_docs, db_name);
    Ok(())
}

/// Export database to JSON file
fn export_data(
    catalog: &Catalog<FileBackend>,
    file: &Path,
    db_name: &str,
    collection_filter: Option<&str>,
) -> Result<()> {
    let db = catalog
        .open_database(db_name)
        .with_context(|| format!("Failed to open database: {}", db_name))?;

    let mut output: Map<String, Value> = Map::new();
    let mut total_docs = 0;

    for coll_name in db.list_collections() {
        if let Some(filter) = collection_filter {
            if coll_name != filter {
                continue;
            }
        }

        let coll = db
            .collection(&coll_name)
            .with_context(|| format!("Failed to get collection: {}", coll_name))?;

        let docs: Vec<Value> = coll
            .find(&json!({}))
            .and_then(|cursor| cursor.to_vec())
            .with_context(|| format!("Failed to query collection: {}", coll_name))?
            .into_iter()
            .map(|doc| doc.into_value())
            .collect();

        println!("Exporting {} documents from '{}'", docs.len(), coll_name);
        total_docs += docs.len();
        output.insert(coll_name.clone(), Value::Array(docs));
    }

    let json =
        serde_json::to_string_pretty(&output).with_context(|| "Failed to serialize to JSON")?;

    fs::write(file, json)
        .with_context(|| format!("Failed to write to file: {}", file.display()))?;

    println!(
        "Total: {} documents exported to {}",
        total_docs,
        file.display()
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_import_then_export() {
        let dir = TempDir::new().unwrap();
        let catalog = Catalog::open_dir(dir.path().join("data"), DatabaseConfig::default()).unwrap();

        let input = dir.path().join("in.json");
        fs::write(
            &input,
            r#"{"students": [{"id": 1, "name": "a"}, {"id": 1}, {"id": 2}], "courses": []}"#,
        )
        .unwrap();
        import_data(&catalog, &input, "school").unwrap();

        let output = dir.path().join("out.json");
        export_data(&catalog, &output, "school", Some("students")).unwrap();
        let exported: Value = serde_json::from_str(&fs::read_to_string(&output).unwrap()).unwrap();
        assert_eq!(
            exported,
            json!({"students": [{"id": 1, "name": "a"}, {"id": 2}]})
        );
    }

    #[test]
    fn test_cli_parses_global_flags() {
        let cli = Cli::try_parse_from([
            "honodb",
            "--data-dir",
            "/tmp/x",
            "-vv",
            "--max-chunk-bytes",
            "100",
            "exec",
            "--db",
            "school",
            "list collection",
        ])
        .unwrap();
        assert_eq!(cli.verbose, 2);
        let config = load_config(&cli).unwrap();
        assert_eq!(config.max_chunk_bytes, 100);
        assert!(matches!(cli.command, Commands::Exec { .. }));
    }
}
