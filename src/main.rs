use anyhow::Result;
use kinship::db::{migrate, Db};
use kinship::graph::RelationshipType;
use kinship::mcp::{HttpMcpServer, McpServer};
use kinship::{Config, KinshipError, KinshipService};

#[tokio::main]
async fn main() -> Result<()> {
    let config = Config::load()?;

    // Logs go to stderr; stdout is reserved for the stdio transport.
    env_logger::Builder::from_env(
        env_logger::Env::default().filter_or("RUST_LOG", config.kinship.log_level.as_str()),
    )
    .init();

    let command = std::env::args().nth(1).unwrap_or_else(|| "verify".to_string());

    match command.as_str() {
        "serve" => run_mcp_server(config).await?,
        "serve-http" => run_http_server(config).await?,
        "verify" => run_schema_verification(config).await?,
        other => anyhow::bail!("Unknown command '{}'. Expected serve, serve-http or verify", other),
    }

    Ok(())
}

/// Open the database and bring its schema up to date.
async fn prepare_db(config: &Config) -> Result<Db> {
    let db = Db::new(config.db_path());
    let migrations_dir = config.migrations_dir().to_path_buf();
    let applied = db
        .with_connection(move |conn| migrate::run_migrations(conn, &migrations_dir))
        .await?;
    log::info!(
        "Database ready at {} ({} new migrations)",
        config.db_path().display(),
        applied
    );
    Ok(db)
}

/// Run MCP server (stdio transport)
async fn run_mcp_server(config: Config) -> Result<()> {
    let db = prepare_db(&config).await?;
    let mut server = McpServer::new(KinshipService::new(db, config.traversal.clone()));
    server.run().await?;
    Ok(())
}

async fn run_http_server(config: Config) -> Result<()> {
    log::info!("Starting Kinship HTTP server v{}", env!("CARGO_PKG_VERSION"));
    let db = prepare_db(&config).await?;
    let service = KinshipService::new(db, config.traversal.clone());
    let http_server = HttpMcpServer::new(service, &config.http_server)?;
    http_server.run(config.http_server.port).await?;
    Ok(())
}

async fn run_schema_verification(config: Config) -> Result<()> {
    log::info!("Starting Kinship v{}", env!("CARGO_PKG_VERSION"));
    log::info!(
        "Traversal ceilings: path rounds {}, relatives depth {}, match depth {}, {} persons per traversal",
        config.traversal.max_path_rounds,
        config.traversal.max_relatives_depth,
        config.traversal.max_match_depth,
        config.traversal.max_visited_nodes
    );

    let db = prepare_db(&config).await?;
    verify_database_schema(&db).await?;

    log::info!("✓ Database schema verification complete");
    Ok(())
}

/// Verify that all expected database objects exist
async fn verify_database_schema(db: &Db) -> Result<()> {
    db.with_connection(|conn| {
        let mut stmt = conn.prepare("SELECT name FROM sqlite_master WHERE type='table' ORDER BY name")?;
        let tables: Vec<String> = stmt
            .query_map([], |row| row.get::<_, String>(0))?
            .collect::<std::result::Result<Vec<_>, rusqlite::Error>>()?;

        let expected_tables = [
            "genders",
            "relationship_types",
            "persons",
            "person_addresses",
            "relationships",
            "countries",
            "states",
            "districts",
            "cities",
            "religions",
            "religion_categories",
            "religion_sub_categories",
            "dataset_imports",
            "schema_migrations",
        ];
        let missing: Vec<_> = expected_tables
            .iter()
            .filter(|t| !tables.iter().any(|name| name == *t))
            .collect();
        for table in &missing {
            log::error!("Missing table: {}", table);
        }
        if !missing.is_empty() {
            return Err(KinshipError::Config("Not all required tables exist".to_string()));
        }
        log::debug!("✓ {} tables present", expected_tables.len());

        let applied = migrate::applied_migrations(conn)?;
        if applied.len() < 3 {
            return Err(KinshipError::Config(format!(
                "Expected at least 3 migrations, found {}",
                applied.len()
            )));
        }
        log::debug!("✓ {} migrations applied", applied.len());

        let index_exists = conn
            .prepare("SELECT 1 FROM sqlite_master WHERE type='index' AND name='idx_relationships_person_active'")?
            .exists([])?;
        if index_exists {
            log::debug!("✓ Neighbour index exists");
        } else {
            log::warn!("Index idx_relationships_person_active not found; traversals will scan relationships");
        }

        let genders: i64 = conn.query_row("SELECT COUNT(*) FROM genders", [], |row| row.get(0))?;
        let types: i64 = conn.query_row("SELECT COUNT(*) FROM relationship_types", [], |row| row.get(0))?;
        if genders < 3 || (types as usize) < RelationshipType::ALL.len() {
            return Err(KinshipError::Config(format!(
                "Reference data incomplete: {} genders, {} relationship types",
                genders, types
            )));
        }
        log::debug!("✓ Reference data seeded");

        let journal_mode: String = conn.query_row("PRAGMA journal_mode", [], |row| row.get(0))?;
        if !journal_mode.eq_ignore_ascii_case("wal") {
            return Err(KinshipError::Config(format!("Journal mode is not WAL: {}", journal_mode)));
        }

        let foreign_keys: i32 = conn.query_row("PRAGMA foreign_keys", [], |row| row.get(0))?;
        if foreign_keys != 1 {
            return Err(KinshipError::Config("Foreign keys not enabled".to_string()));
        }

        let integrity: String = conn.query_row("PRAGMA integrity_check", [], |row| row.get(0))?;
        if integrity != "ok" {
            return Err(KinshipError::Config(format!("Database integrity check failed: {}", integrity)));
        }
        log::info!("✓ Database integrity: OK");

        let persons: i64 = conn.query_row("SELECT COUNT(*) FROM persons WHERE is_active = 1", [], |row| row.get(0))?;
        let edges: i64 = conn.query_row("SELECT COUNT(*) FROM relationships WHERE is_active = 1", [], |row| row.get(0))?;
        log::info!("{} active persons, {} active relationship rows", persons, edges);

        Ok(())
    })
    .await?;

    Ok(())
}
