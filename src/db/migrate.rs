//! Schema migrations: `migrations/NNN_name.sql`, applied once each in
//! version order, one transaction per file, recorded in `schema_migrations`.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use rusqlite::{params, Connection};

use crate::error::{KinshipError, Result};

const SCHEMA_MIGRATIONS: &str = "CREATE TABLE IF NOT EXISTS schema_migrations (
    version INTEGER PRIMARY KEY,
    name TEXT NOT NULL,
    applied_at TIMESTAMP DEFAULT CURRENT_TIMESTAMP
)";

/// `"003_dataset_imports.sql"` -> `(3, "003_dataset_imports")`.
fn parse_file_name(file_name: &str) -> Option<(u32, &str)> {
    let stem = file_name.strip_suffix(".sql")?;
    let (digits, rest) = stem.split_once('_')?;
    if rest.is_empty() {
        return None;
    }
    Some((digits.parse().ok()?, stem))
}

/// Migration files of `dir` by version. Non-SQL files are ignored; a
/// misnamed SQL file or two files sharing a version is a config error.
fn migration_files(dir: &Path) -> Result<BTreeMap<u32, (String, PathBuf)>> {
    let mut files = BTreeMap::new();

    for entry in fs::read_dir(dir)? {
        let path = entry?.path();
        let Some(file_name) = path.file_name().and_then(|n| n.to_str()) else {
            continue;
        };
        if !file_name.ends_with(".sql") {
            continue;
        }
        let (version, stem) = parse_file_name(file_name).ok_or_else(|| {
            KinshipError::Config(format!("Migration {} is not named NNN_name.sql", file_name))
        })?;
        let stem = stem.to_string();

        if let Some((existing, _)) = files.insert(version, (stem.clone(), path.clone())) {
            return Err(KinshipError::Config(format!(
                "Migrations {} and {} share version {}",
                existing, stem, version
            )));
        }
    }

    Ok(files)
}

fn recorded(conn: &Connection) -> Result<BTreeMap<u32, String>> {
    conn.execute_batch(SCHEMA_MIGRATIONS)?;
    let mut stmt = conn.prepare("SELECT version, name FROM schema_migrations")?;
    let rows = stmt
        .query_map([], |row| Ok((row.get::<_, u32>(0)?, row.get::<_, String>(1)?)))?
        .collect::<std::result::Result<BTreeMap<_, _>, rusqlite::Error>>()?;
    Ok(rows)
}

/// Names of applied migrations in version order.
pub fn applied_migrations(conn: &Connection) -> Result<Vec<String>> {
    Ok(recorded(conn)?.into_values().collect())
}

/// Apply every migration in `migrations_dir` not yet recorded. Returns how
/// many were applied; a failing file rolls back alone and stops the run.
pub fn run_migrations(conn: &mut Connection, migrations_dir: &Path) -> Result<usize> {
    let done = recorded(conn)?;
    let files = migration_files(migrations_dir)?;

    for (version, name) in &done {
        if !files.contains_key(version) {
            log::warn!("Migration {} is recorded but missing from {}", name, migrations_dir.display());
        }
    }

    let mut applied = 0;
    for (version, (name, path)) in files {
        if done.contains_key(&version) {
            continue;
        }

        let sql = fs::read_to_string(&path)?;
        let tx = conn.transaction()?;
        if let Err(e) = tx.execute_batch(&sql) {
            log::error!("Migration {} failed: {}", name, e);
            return Err(e.into());
        }
        tx.execute(
            "INSERT INTO schema_migrations (version, name) VALUES (?1, ?2)",
            params![version, name],
        )?;
        tx.commit()?;

        log::info!("Applied migration {}", name);
        applied += 1;
    }

    if applied == 0 {
        log::debug!("Schema up to date ({} migrations)", done.len());
    }
    Ok(applied)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn project_migrations() -> PathBuf {
        Path::new(env!("CARGO_MANIFEST_DIR")).join("migrations")
    }

    fn names(conn: &Connection, kind: &str) -> Vec<String> {
        conn.prepare("SELECT name FROM sqlite_master WHERE type = ?1 ORDER BY name")
            .unwrap()
            .query_map([kind], |row| row.get::<_, String>(0))
            .unwrap()
            .collect::<std::result::Result<Vec<_>, rusqlite::Error>>()
            .unwrap()
    }

    fn scratch_dir(files: &[(&str, &str)]) -> TempDir {
        let dir = TempDir::new().unwrap();
        for (name, sql) in files {
            fs::write(dir.path().join(name), sql).unwrap();
        }
        dir
    }

    #[test]
    fn test_parse_file_name() {
        assert_eq!(parse_file_name("001_reference_data.sql"), Some((1, "001_reference_data")));
        assert_eq!(parse_file_name("12_x.sql"), Some((12, "12_x")));
        assert_eq!(parse_file_name("001_.sql"), None);
        assert_eq!(parse_file_name("persons.sql"), None);
        assert_eq!(parse_file_name("abc_persons.sql"), None);
    }

    #[test]
    fn test_migration_files_by_version() {
        let dir = scratch_dir(&[
            ("010_later.sql", "CREATE TABLE later (id INTEGER);"),
            ("002_early.sql", "CREATE TABLE early (id INTEGER);"),
            ("notes.md", "not a migration"),
        ]);

        let files = migration_files(dir.path()).unwrap();
        let order: Vec<_> = files.values().map(|(name, _)| name.as_str()).collect();
        assert_eq!(order, vec!["002_early", "010_later"]);
    }

    #[test]
    fn test_duplicate_or_misnamed_files_rejected() {
        let dup = scratch_dir(&[("001_a.sql", ""), ("1_b.sql", "")]);
        assert!(matches!(migration_files(dup.path()), Err(KinshipError::Config(_))));

        let bad = scratch_dir(&[("persons.sql", "")]);
        assert!(matches!(migration_files(bad.path()), Err(KinshipError::Config(_))));
    }

    #[test]
    fn test_full_migration_schema() {
        let temp_dir = TempDir::new().unwrap();
        let mut conn = Connection::open(temp_dir.path().join("test.db")).unwrap();

        assert_eq!(run_migrations(&mut conn, &project_migrations()).unwrap(), 3);

        let tables = names(&conn, "table");
        for expected in [
            "cities",
            "countries",
            "dataset_imports",
            "districts",
            "genders",
            "person_addresses",
            "persons",
            "relationship_types",
            "relationships",
            "religion_categories",
            "religion_sub_categories",
            "religions",
            "schema_migrations",
            "states",
        ] {
            assert!(tables.contains(&expected.to_string()), "missing table {}", expected);
        }

        let indexes = names(&conn, "index");
        assert!(indexes.contains(&"idx_relationships_person_active".to_string()));
    }

    #[test]
    fn test_migrations_are_idempotent() {
        let temp_dir = TempDir::new().unwrap();
        let mut conn = Connection::open(temp_dir.path().join("test.db")).unwrap();

        run_migrations(&mut conn, &project_migrations()).unwrap();
        let first = applied_migrations(&conn).unwrap();
        assert_eq!(run_migrations(&mut conn, &project_migrations()).unwrap(), 0);

        assert_eq!(first, applied_migrations(&conn).unwrap());
        assert_eq!(first[0], "001_reference_data");
    }

    #[test]
    fn test_failed_migration_is_not_recorded() {
        let dir = scratch_dir(&[
            ("001_ok.sql", "CREATE TABLE ok (id INTEGER);"),
            ("002_broken.sql", "CREATE TABLE half (id INTEGER); NOT SQL;"),
        ]);
        let temp_dir = TempDir::new().unwrap();
        let mut conn = Connection::open(temp_dir.path().join("test.db")).unwrap();

        assert!(matches!(run_migrations(&mut conn, dir.path()), Err(KinshipError::Database(_))));
        assert_eq!(applied_migrations(&conn).unwrap(), vec!["001_ok".to_string()]);
        assert!(!names(&conn, "table").contains(&"half".to_string()));
    }
}
