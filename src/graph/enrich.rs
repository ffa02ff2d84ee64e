//! Person views and path links shared by every traversal result.

use crate::error::Result;
use crate::graph::accessor::FamilyGraph;
use crate::graph::model::{Link, Person, PersonId, PersonView, FALLBACK_LABEL};

/// Resolve gender, address and religion display strings for a person.
pub fn enrich<G: FamilyGraph>(graph: &G, person: &Person) -> Result<PersonView> {
    Ok(PersonView {
        id: person.id,
        first_name: person.first_name.clone(),
        middle_name: person.middle_name.clone(),
        last_name: person.last_name.clone(),
        full_name: person.full_name(),
        gender: graph.gender_code(person.gender_id)?,
        date_of_birth: person.date_of_birth,
        date_of_death: person.date_of_death,
        is_living: person.is_living(),
        address: graph.address_display(person.id)?,
        religion: graph.religion_display(person.id)?,
    })
}

/// Enrich by id, degrading to [`PersonView::unresolved`] when the row is gone.
pub fn enrich_id<G: FamilyGraph>(graph: &G, id: PersonId) -> Result<PersonView> {
    match graph.person(id)? {
        Some(person) => enrich(graph, &person),
        None => {
            log::warn!("Person {} referenced by a relationship row does not exist", id);
            Ok(PersonView::unresolved(id))
        }
    }
}

/// Link from `from` to `to`, labelled from `from`'s side, falling back to
/// [`FALLBACK_LABEL`] when only the inverse row is active.
pub fn link<G: FamilyGraph>(graph: &G, from: PersonId, to: PersonId) -> Result<Link> {
    let label = graph
        .relationship_label(from, to)?
        .unwrap_or_else(|| FALLBACK_LABEL.to_string());
    Ok(Link { id: to, label })
}
