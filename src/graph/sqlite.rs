//! `FamilyGraph` over the SQLite schema in `migrations/`.
//!
//! Every call is an individual read against the borrowed connection.
//! Statements go through the connection's prepared-statement cache since a
//! single traversal issues the same handful of queries many times.

use chrono::NaiveDate;
use rusqlite::types::Type;
use rusqlite::{params, Connection, OptionalExtension, Row};

use crate::error::Result;
use crate::graph::accessor::FamilyGraph;
use crate::graph::model::{Address, GenderCode, Person, PersonId, Relationship, RelationshipType};

pub struct SqliteGraph<'c> {
    conn: &'c Connection,
}

impl<'c> SqliteGraph<'c> {
    pub fn new(conn: &'c Connection) -> Self {
        Self { conn }
    }
}

fn person_from_row(row: &Row<'_>) -> rusqlite::Result<Person> {
    Ok(Person {
        id: row.get(0)?,
        first_name: row.get::<_, Option<String>>(1)?.unwrap_or_default(),
        middle_name: row.get(2)?,
        last_name: row.get::<_, Option<String>>(3)?.unwrap_or_default(),
        gender_id: row.get(4)?,
        date_of_birth: row.get::<_, Option<NaiveDate>>(5)?,
        date_of_death: row.get::<_, Option<NaiveDate>>(6)?,
        religion_id: row.get(7)?,
        religion_category_id: row.get(8)?,
        religion_sub_category_id: row.get(9)?,
        is_active: row.get(10)?,
    })
}

fn relationship_type_at(row: &Row<'_>, idx: usize) -> rusqlite::Result<RelationshipType> {
    let code: String = row.get(idx)?;
    code.parse::<RelationshipType>()
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}

/// Join the non-empty names in hierarchy order.
fn join_names(names: &[Option<String>]) -> String {
    names
        .iter()
        .flatten()
        .map(|s| s.trim())
        .filter(|s| !s.is_empty())
        .collect::<Vec<_>>()
        .join(", ")
}

impl FamilyGraph for SqliteGraph<'_> {
    fn person(&self, id: PersonId) -> Result<Option<Person>> {
        let mut stmt = self.conn.prepare_cached(
            "SELECT id, first_name, middle_name, last_name, gender_id, \
                    date_of_birth, date_of_death, religion_id, religion_category_id, \
                    religion_sub_category_id, is_active \
             FROM persons WHERE id = ?1",
        )?;
        let person = stmt.query_row(params![id], person_from_row).optional()?;
        Ok(person)
    }

    fn relationships(&self, id: PersonId) -> Result<Vec<Relationship>> {
        let mut stmt = self.conn.prepare_cached(
            "SELECT person_id, related_person_id, relationship_type, is_active \
             FROM relationships \
             WHERE person_id = ?1 AND is_active = 1 \
             ORDER BY related_person_id, id",
        )?;
        let rows = stmt
            .query_map(params![id], |row| {
                Ok(Relationship {
                    person_id: row.get(0)?,
                    related_person_id: row.get(1)?,
                    relationship_type: relationship_type_at(row, 2)?,
                    is_active: row.get(3)?,
                })
            })?
            .collect::<std::result::Result<Vec<_>, rusqlite::Error>>()?;
        Ok(rows)
    }

    fn relationship_label(&self, from: PersonId, to: PersonId) -> Result<Option<String>> {
        let mut stmt = self.conn.prepare_cached(
            "SELECT COALESCE(rt.label, r.relationship_type) \
             FROM relationships r \
             LEFT JOIN relationship_types rt ON rt.code = r.relationship_type \
             WHERE r.person_id = ?1 AND r.related_person_id = ?2 AND r.is_active = 1 \
             ORDER BY r.id \
             LIMIT 1",
        )?;
        let label = stmt
            .query_row(params![from, to], |row| row.get::<_, String>(0))
            .optional()?;
        Ok(label)
    }

    fn type_label(&self, rel: RelationshipType) -> Result<String> {
        let mut stmt = self
            .conn
            .prepare_cached("SELECT label FROM relationship_types WHERE code = ?1")?;
        let label = stmt
            .query_row(params![rel.code()], |row| row.get::<_, String>(0))
            .optional()?;
        Ok(label.unwrap_or_else(|| rel.default_label().to_string()))
    }

    fn gender_code(&self, gender_id: Option<i64>) -> Result<GenderCode> {
        let Some(gender_id) = gender_id else {
            return Ok(GenderCode::Unknown);
        };
        let mut stmt = self.conn.prepare_cached("SELECT code FROM genders WHERE id = ?1")?;
        let code = stmt
            .query_row(params![gender_id], |row| row.get::<_, String>(0))
            .optional()?;
        Ok(code
            .and_then(|c| c.parse::<GenderCode>().ok())
            .unwrap_or(GenderCode::Unknown))
    }

    fn current_address(&self, id: PersonId) -> Result<Option<Address>> {
        let mut stmt = self.conn.prepare_cached(
            "SELECT country_id, state_id, district_id, city_id \
             FROM person_addresses \
             WHERE person_id = ?1 AND is_current = 1 \
             ORDER BY id DESC \
             LIMIT 1",
        )?;
        let address = stmt
            .query_row(params![id], |row| {
                Ok(Address {
                    country_id: row.get(0)?,
                    state_id: row.get(1)?,
                    district_id: row.get(2)?,
                    city_id: row.get(3)?,
                })
            })
            .optional()?;
        Ok(address)
    }

    fn address_display(&self, id: PersonId) -> Result<String> {
        let mut stmt = self.conn.prepare_cached(
            "SELECT ci.name, di.name, st.name, co.name \
             FROM person_addresses pa \
             LEFT JOIN cities ci ON ci.id = pa.city_id \
             LEFT JOIN districts di ON di.id = pa.district_id \
             LEFT JOIN states st ON st.id = pa.state_id \
             LEFT JOIN countries co ON co.id = pa.country_id \
             WHERE pa.person_id = ?1 AND pa.is_current = 1 \
             ORDER BY pa.id DESC \
             LIMIT 1",
        )?;
        let names = stmt
            .query_row(params![id], |row| {
                Ok(vec![row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?])
            })
            .optional()?;
        Ok(names.map(|n| join_names(&n)).unwrap_or_default())
    }

    fn religion_display(&self, id: PersonId) -> Result<String> {
        let mut stmt = self.conn.prepare_cached(
            "SELECT r.name, rc.name, rs.name \
             FROM persons p \
             LEFT JOIN religions r ON r.id = p.religion_id \
             LEFT JOIN religion_categories rc ON rc.id = p.religion_category_id \
             LEFT JOIN religion_sub_categories rs ON rs.id = p.religion_sub_category_id \
             WHERE p.id = ?1",
        )?;
        let names = stmt
            .query_row(params![id], |row| Ok(vec![row.get(0)?, row.get(1)?, row.get(2)?]))
            .optional()?;
        Ok(names.map(|n| join_names(&n)).unwrap_or_default())
    }
}
