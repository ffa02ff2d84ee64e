//! Read-only graph access: the capability every traversal is written against.

use std::collections::HashMap;

use crate::error::Result;
use crate::graph::model::{Address, GenderCode, Person, PersonId, Relationship, RelationshipType};

/// Read interface over the person-relationship store.
///
/// Traversals only ever walk a node's own outgoing active rows; undirected
/// behaviour comes from the store holding both rows of every pair.
pub trait FamilyGraph {
    /// Look up a person. Absent is a normal result, not an error.
    fn person(&self, id: PersonId) -> Result<Option<Person>>;

    /// Active outgoing relationship rows of `id`.
    fn relationships(&self, id: PersonId) -> Result<Vec<Relationship>>;

    /// Display label of the active edge `from -> to`, `None` when there is no such row.
    fn relationship_label(&self, from: PersonId, to: PersonId) -> Result<Option<String>>;

    /// Display label the store uses for a relationship type.
    fn type_label(&self, rel: RelationshipType) -> Result<String>;

    fn gender_code(&self, gender_id: Option<i64>) -> Result<GenderCode>;

    fn current_address(&self, id: PersonId) -> Result<Option<Address>>;

    /// Comma-joined address hierarchy names, empty when none.
    fn address_display(&self, id: PersonId) -> Result<String>;

    /// Comma-joined religion hierarchy names, empty when none.
    fn religion_display(&self, id: PersonId) -> Result<String>;

    /// Targets of every active outgoing row, ascending by id without duplicates.
    fn neighbors(&self, id: PersonId) -> Result<Vec<PersonId>> {
        let mut ids: Vec<PersonId> = self
            .relationships(id)?
            .into_iter()
            .filter(|r| r.is_active)
            .map(|r| r.related_person_id)
            .collect();
        ids.sort_unstable();
        ids.dedup();
        Ok(ids)
    }
}

impl<G: FamilyGraph + ?Sized> FamilyGraph for &G {
    fn person(&self, id: PersonId) -> Result<Option<Person>> {
        (**self).person(id)
    }

    fn relationships(&self, id: PersonId) -> Result<Vec<Relationship>> {
        (**self).relationships(id)
    }

    fn relationship_label(&self, from: PersonId, to: PersonId) -> Result<Option<String>> {
        (**self).relationship_label(from, to)
    }

    fn type_label(&self, rel: RelationshipType) -> Result<String> {
        (**self).type_label(rel)
    }

    fn gender_code(&self, gender_id: Option<i64>) -> Result<GenderCode> {
        (**self).gender_code(gender_id)
    }

    fn current_address(&self, id: PersonId) -> Result<Option<Address>> {
        (**self).current_address(id)
    }

    fn address_display(&self, id: PersonId) -> Result<String> {
        (**self).address_display(id)
    }

    fn religion_display(&self, id: PersonId) -> Result<String> {
        (**self).religion_display(id)
    }

    fn neighbors(&self, id: PersonId) -> Result<Vec<PersonId>> {
        (**self).neighbors(id)
    }
}

/// In-memory family graph: adjacency lists plus person metadata.
///
/// Rows are kept per owner in insertion order. Inactive rows are stored but
/// never returned.
#[derive(Debug, Default, Clone)]
pub struct MemoryGraph {
    persons: HashMap<PersonId, Person>,
    outgoing: HashMap<PersonId, Vec<Relationship>>,
    genders: HashMap<i64, GenderCode>,
    addresses: HashMap<PersonId, (Address, String)>,
    religions: HashMap<PersonId, String>,
    labels: HashMap<RelationshipType, String>,
}

impl MemoryGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Map a gender id to its code.
    pub fn add_gender(&mut self, gender_id: i64, code: GenderCode) -> &mut Self {
        self.genders.insert(gender_id, code);
        self
    }

    pub fn add_person(&mut self, person: Person) -> &mut Self {
        self.persons.insert(person.id, person);
        self
    }

    /// Add one directed active row.
    pub fn add_edge(&mut self, from: PersonId, to: PersonId, rel: RelationshipType) -> &mut Self {
        self.outgoing.entry(from).or_default().push(Relationship {
            person_id: from,
            related_person_id: to,
            relationship_type: rel,
            is_active: true,
        });
        self
    }

    /// Add both rows of a family tie: `a -> b: a_to_b` and `b -> a: b_to_a`.
    pub fn add_pair(
        &mut self,
        a: PersonId,
        b: PersonId,
        a_to_b: RelationshipType,
        b_to_a: RelationshipType,
    ) -> &mut Self {
        self.add_edge(a, b, a_to_b);
        self.add_edge(b, a, b_to_a)
    }

    /// Soft-delete every row `from -> to`.
    pub fn deactivate(&mut self, from: PersonId, to: PersonId) -> &mut Self {
        if let Some(rows) = self.outgoing.get_mut(&from) {
            for row in rows.iter_mut().filter(|r| r.related_person_id == to) {
                row.is_active = false;
            }
        }
        self
    }

    pub fn set_address(&mut self, id: PersonId, address: Address, display: &str) -> &mut Self {
        self.addresses.insert(id, (address, display.to_string()));
        self
    }

    pub fn set_religion_display(&mut self, id: PersonId, display: &str) -> &mut Self {
        self.religions.insert(id, display.to_string());
        self
    }

    /// Override the display label of a relationship type.
    pub fn set_label(&mut self, rel: RelationshipType, label: &str) -> &mut Self {
        self.labels.insert(rel, label.to_string());
        self
    }

    fn label_for(&self, rel: RelationshipType) -> String {
        self.labels
            .get(&rel)
            .cloned()
            .unwrap_or_else(|| rel.default_label().to_string())
    }
}

impl FamilyGraph for MemoryGraph {
    fn person(&self, id: PersonId) -> Result<Option<Person>> {
        Ok(self.persons.get(&id).cloned())
    }

    fn relationships(&self, id: PersonId) -> Result<Vec<Relationship>> {
        Ok(self
            .outgoing
            .get(&id)
            .map(|rows| rows.iter().filter(|r| r.is_active).cloned().collect())
            .unwrap_or_default())
    }

    fn relationship_label(&self, from: PersonId, to: PersonId) -> Result<Option<String>> {
        Ok(self
            .outgoing
            .get(&from)
            .and_then(|rows| {
                rows.iter()
                    .find(|r| r.is_active && r.related_person_id == to)
            })
            .map(|r| self.label_for(r.relationship_type)))
    }

    fn type_label(&self, rel: RelationshipType) -> Result<String> {
        Ok(self.label_for(rel))
    }

    fn gender_code(&self, gender_id: Option<i64>) -> Result<GenderCode> {
        Ok(gender_id
            .and_then(|id| self.genders.get(&id).copied())
            .unwrap_or(GenderCode::Unknown))
    }

    fn current_address(&self, id: PersonId) -> Result<Option<Address>> {
        Ok(self.addresses.get(&id).map(|(a, _)| a.clone()))
    }

    fn address_display(&self, id: PersonId) -> Result<String> {
        Ok(self.addresses.get(&id).map(|(_, d)| d.clone()).unwrap_or_default())
    }

    fn religion_display(&self, id: PersonId) -> Result<String> {
        Ok(self.religions.get(&id).cloned().unwrap_or_default())
    }
}
