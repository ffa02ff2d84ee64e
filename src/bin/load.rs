use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use env_logger::Env;
use kinship::db::{migrate, Db};
use kinship::loader::{self, LoadOutcome};
use kinship::Config;

#[derive(Parser, Debug)]
#[command(name = "load")]
#[command(about = "Import a family dataset (JSON) into the kinship database")]
struct Args {
    /// Dataset file to import
    #[arg(required_unless_present = "list")]
    dataset: Option<PathBuf>,

    /// Import even if a dataset with the same content was already imported
    #[arg(long)]
    force: bool,

    /// Show recent imports instead of importing
    #[arg(long)]
    list: bool,

    /// Number of imports shown by --list
    #[arg(long, default_value_t = 10)]
    limit: usize,
}

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::Builder::from_env(Env::default().filter_or("RUST_LOG", "info")).init();

    let args = Args::parse();
    let config = Config::load()?;

    let db = Db::new(config.db_path());
    let migrations_dir = config.migrations_dir().to_path_buf();
    db.with_connection(move |conn| migrate::run_migrations(conn, &migrations_dir))
        .await
        .context("Failed to run migrations")?;

    if args.list {
        let limit = args.limit;
        let imports = db
            .with_connection(move |conn| loader::recent_imports(conn, limit))
            .await?;
        if imports.is_empty() {
            println!("No datasets imported yet.");
        }
        for record in imports {
            println!(
                "{}  {}  {} persons, {} relationship rows  {}",
                record.imported_at,
                record.import_id,
                record.person_count,
                record.relationship_count,
                record.file_path
            );
        }
        return Ok(());
    }

    let Some(path) = args.dataset else {
        anyhow::bail!("A dataset path is required unless --list is given");
    };
    if !path.is_file() {
        anyhow::bail!("Dataset not found: {}", path.display());
    }

    let force = args.force;
    let outcome = db
        .with_connection(move |conn| loader::load_file(conn, &path, force))
        .await
        .context("Import failed")?;

    match outcome {
        LoadOutcome::Unchanged { file_hash } => {
            println!("Already imported (sha256 {}). Use --force to import again.", file_hash);
        }
        LoadOutcome::Imported { import_id, stats, .. } => {
            println!("Import {} complete", import_id);
            println!("  persons:            {}", stats.persons);
            println!("  relationship rows:  {}", stats.relationships);
            println!("  inverses derived:   {}", stats.inverses_added);
        }
    }

    Ok(())
}
