//! JSON dataset import.
//!
//! A dataset file carries reference data, persons and relationship rows. Each
//! relationship is written as a pair: when the file does not supply the
//! inverse row, it is derived from the row type and the owner's gender.
//! Imports are recorded in `dataset_imports` by file hash so an unchanged
//! file is skipped on the next run.

use std::collections::HashSet;
use std::path::Path;

use chrono::{NaiveDate, Utc};
use rusqlite::{params, Connection, OptionalExtension, Transaction};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use uuid::Uuid;

use crate::error::{KinshipError, Result};
use crate::graph::{Address, FamilyGraph, GenderCode, PersonId, RelationshipType, SqliteGraph};

/// Row of a named reference table. `parent_id` links a state to its country,
/// a district to its state, and so on.
#[derive(Debug, Clone, Deserialize)]
pub struct ReferenceRow {
    pub id: i64,
    pub name: String,
    #[serde(default)]
    pub parent_id: Option<i64>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PersonRecord {
    pub id: PersonId,
    pub first_name: String,
    #[serde(default)]
    pub middle_name: Option<String>,
    pub last_name: String,
    #[serde(default)]
    pub gender: Option<GenderCode>,
    #[serde(default)]
    pub date_of_birth: Option<NaiveDate>,
    #[serde(default)]
    pub date_of_death: Option<NaiveDate>,
    #[serde(default)]
    pub religion_id: Option<i64>,
    #[serde(default)]
    pub religion_category_id: Option<i64>,
    #[serde(default)]
    pub religion_sub_category_id: Option<i64>,
    #[serde(default = "default_true")]
    pub is_active: bool,
    #[serde(default)]
    pub address: Option<Address>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RelationshipRecord {
    pub person_id: PersonId,
    pub related_person_id: PersonId,
    pub relationship_type: RelationshipType,
    #[serde(default = "default_true")]
    pub is_active: bool,
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Dataset {
    #[serde(default)]
    pub countries: Vec<ReferenceRow>,
    #[serde(default)]
    pub states: Vec<ReferenceRow>,
    #[serde(default)]
    pub districts: Vec<ReferenceRow>,
    #[serde(default)]
    pub cities: Vec<ReferenceRow>,
    #[serde(default)]
    pub religions: Vec<ReferenceRow>,
    #[serde(default)]
    pub religion_categories: Vec<ReferenceRow>,
    #[serde(default)]
    pub religion_sub_categories: Vec<ReferenceRow>,
    pub persons: Vec<PersonRecord>,
    #[serde(default)]
    pub relationships: Vec<RelationshipRecord>,
}

impl Dataset {
    pub fn from_path(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&content)?)
    }
}

/// Counts written by one import.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ImportStats {
    pub persons: usize,
    pub relationships: usize,
    /// Rows among `relationships` derived as inverses.
    pub inverses_added: usize,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoadOutcome {
    /// A previous import of the same content exists.
    Unchanged { file_hash: String },
    Imported { import_id: String, file_hash: String, stats: ImportStats },
}

/// One row of `dataset_imports`.
#[derive(Debug, Clone, Serialize)]
pub struct ImportRecord {
    pub import_id: String,
    pub file_path: String,
    pub file_hash: String,
    pub person_count: i64,
    pub relationship_count: i64,
    pub imported_at: String,
}

/// SHA-256 of the file contents, lowercase hex.
pub fn compute_file_hash(path: &Path) -> Result<String> {
    let content = std::fs::read(path)?;
    let mut hasher = Sha256::new();
    hasher.update(&content);
    Ok(format!("{:x}", hasher.finalize()))
}

/// Import `path` unless an import with the same hash is recorded. `force`
/// imports regardless.
pub fn load_file(conn: &mut Connection, path: &Path, force: bool) -> Result<LoadOutcome> {
    let file_hash = compute_file_hash(path)?;

    if !force {
        let previous: Option<String> = conn
            .query_row(
                "SELECT import_id FROM dataset_imports WHERE file_hash = ?1 LIMIT 1",
                params![file_hash],
                |row| row.get(0),
            )
            .optional()?;
        if let Some(import_id) = previous {
            log::info!("{} unchanged since import {}, skipping", path.display(), import_id);
            return Ok(LoadOutcome::Unchanged { file_hash });
        }
    }

    let dataset = Dataset::from_path(path)?;
    let tx = conn.transaction()?;
    let stats = write_dataset(&tx, &dataset)?;

    let import_id = Uuid::new_v4().to_string();
    tx.execute(
        "INSERT INTO dataset_imports \
             (import_id, file_path, file_hash, person_count, relationship_count, imported_at) \
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        params![
            import_id,
            path.display().to_string(),
            file_hash,
            stats.persons as i64,
            stats.relationships as i64,
            Utc::now().to_rfc3339(),
        ],
    )?;
    tx.commit()?;

    log::info!(
        "Imported {}: {} persons, {} relationship rows ({} inverses added)",
        path.display(),
        stats.persons,
        stats.relationships,
        stats.inverses_added
    );
    Ok(LoadOutcome::Imported { import_id, file_hash, stats })
}

/// Write a dataset in one transaction. Nothing is written if any row fails.
pub fn import_dataset(conn: &mut Connection, dataset: &Dataset) -> Result<ImportStats> {
    let tx = conn.transaction()?;
    let stats = write_dataset(&tx, dataset)?;
    tx.commit()?;
    Ok(stats)
}

/// Imports, most recent first.
pub fn recent_imports(conn: &Connection, limit: usize) -> Result<Vec<ImportRecord>> {
    let mut stmt = conn.prepare(
        "SELECT import_id, file_path, file_hash, person_count, relationship_count, imported_at \
         FROM dataset_imports ORDER BY imported_at DESC LIMIT ?1",
    )?;
    let rows = stmt
        .query_map(params![limit as i64], |row| {
            Ok(ImportRecord {
                import_id: row.get(0)?,
                file_path: row.get(1)?,
                file_hash: row.get(2)?,
                person_count: row.get(3)?,
                relationship_count: row.get(4)?,
                imported_at: row.get(5)?,
            })
        })?
        .collect::<std::result::Result<Vec<_>, rusqlite::Error>>()?;
    Ok(rows)
}

fn write_dataset(tx: &Transaction<'_>, dataset: &Dataset) -> Result<ImportStats> {
    write_reference(tx, "countries", None, &dataset.countries)?;
    write_reference(tx, "states", Some("country_id"), &dataset.states)?;
    write_reference(tx, "districts", Some("state_id"), &dataset.districts)?;
    write_reference(tx, "cities", Some("district_id"), &dataset.cities)?;
    write_reference(tx, "religions", None, &dataset.religions)?;
    write_reference(tx, "religion_categories", Some("religion_id"), &dataset.religion_categories)?;
    write_reference(tx, "religion_sub_categories", Some("category_id"), &dataset.religion_sub_categories)?;

    let mut stats = ImportStats::default();
    for person in &dataset.persons {
        write_person(tx, person)?;
        stats.persons += 1;
    }

    let graph = SqliteGraph::new(tx);
    for rel in &dataset.relationships {
        if rel.person_id == rel.related_person_id {
            return Err(KinshipError::Import(format!(
                "Person {} cannot be related to themselves",
                rel.person_id
            )));
        }
        for id in [rel.person_id, rel.related_person_id] {
            if graph.person(id)?.is_none() {
                return Err(KinshipError::Import(format!(
                    "Relationship {} -> {} references unknown person {}",
                    rel.person_id, rel.related_person_id, id
                )));
            }
        }
        if insert_relationship(tx, rel.person_id, rel.related_person_id, rel.relationship_type, rel.is_active)? {
            stats.relationships += 1;
        }
    }

    // Inverses go in after every explicit row so a supplied inverse wins.
    let supplied: HashSet<(PersonId, PersonId)> = dataset
        .relationships
        .iter()
        .map(|r| (r.person_id, r.related_person_id))
        .collect();
    for rel in &dataset.relationships {
        if supplied.contains(&(rel.related_person_id, rel.person_id)) {
            continue;
        }
        let owner_gender_id = graph.person(rel.person_id)?.and_then(|p| p.gender_id);
        let inverse = rel.relationship_type.inverse(graph.gender_code(owner_gender_id)?);
        if insert_relationship(tx, rel.related_person_id, rel.person_id, inverse, rel.is_active)? {
            stats.relationships += 1;
            stats.inverses_added += 1;
        }
    }

    Ok(stats)
}

fn write_reference(
    tx: &Transaction<'_>,
    table: &str,
    parent_column: Option<&str>,
    rows: &[ReferenceRow],
) -> Result<()> {
    // REPLACE deletes the old row first, which rows referencing it forbid.
    let sql = match parent_column {
        Some(col) => format!(
            "INSERT INTO {table} (id, name, {col}) VALUES (?1, ?2, ?3) \
             ON CONFLICT(id) DO UPDATE SET name = excluded.name, {col} = excluded.{col}"
        ),
        None => format!(
            "INSERT INTO {table} (id, name) VALUES (?1, ?2) \
             ON CONFLICT(id) DO UPDATE SET name = excluded.name"
        ),
    };
    let mut stmt = tx.prepare(&sql)?;
    for row in rows {
        match parent_column {
            Some(_) => stmt.execute(params![row.id, row.name, row.parent_id])?,
            None => stmt.execute(params![row.id, row.name])?,
        };
    }
    Ok(())
}

fn write_person(tx: &Transaction<'_>, person: &PersonRecord) -> Result<()> {
    let gender_id: Option<i64> = match person.gender {
        Some(code) => tx
            .query_row(
                "SELECT id FROM genders WHERE code = ?1",
                params![code.as_str()],
                |row| row.get(0),
            )
            .optional()?,
        None => None,
    };

    tx.execute(
        "INSERT INTO persons \
             (id, first_name, middle_name, last_name, gender_id, date_of_birth, date_of_death, \
              religion_id, religion_category_id, religion_sub_category_id, is_active) \
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11) \
         ON CONFLICT(id) DO UPDATE SET \
             first_name = excluded.first_name, middle_name = excluded.middle_name, \
             last_name = excluded.last_name, gender_id = excluded.gender_id, \
             date_of_birth = excluded.date_of_birth, date_of_death = excluded.date_of_death, \
             religion_id = excluded.religion_id, religion_category_id = excluded.religion_category_id, \
             religion_sub_category_id = excluded.religion_sub_category_id, is_active = excluded.is_active",
        params![
            person.id,
            person.first_name,
            person.middle_name,
            person.last_name,
            gender_id,
            person.date_of_birth,
            person.date_of_death,
            person.religion_id,
            person.religion_category_id,
            person.religion_sub_category_id,
            person.is_active,
        ],
    )?;

    if let Some(address) = &person.address {
        tx.execute(
            "UPDATE person_addresses SET is_current = 0 WHERE person_id = ?1",
            params![person.id],
        )?;
        tx.execute(
            "INSERT INTO person_addresses (person_id, country_id, state_id, district_id, city_id, is_current) \
             VALUES (?1, ?2, ?3, ?4, ?5, 1)",
            params![person.id, address.country_id, address.state_id, address.district_id, address.city_id],
        )?;
    }
    Ok(())
}

/// Insert `from -> to` unless a row for that ordered pair already exists.
fn insert_relationship(
    tx: &Transaction<'_>,
    from: PersonId,
    to: PersonId,
    rel: RelationshipType,
    is_active: bool,
) -> Result<bool> {
    let exists: bool = tx
        .prepare_cached("SELECT 1 FROM relationships WHERE person_id = ?1 AND related_person_id = ?2")?
        .exists(params![from, to])?;
    if exists {
        log::debug!("Relationship {} -> {} already stored, skipping", from, to);
        return Ok(false);
    }
    tx.execute(
        "INSERT INTO relationships (person_id, related_person_id, relationship_type, is_active) \
         VALUES (?1, ?2, ?3, ?4)",
        params![from, to, rel.code(), is_active],
    )?;
    Ok(true)
}
