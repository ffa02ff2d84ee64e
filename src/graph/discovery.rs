//! Suggestions of relatives a person is probably missing, found through
//! fixed two-hop patterns around their own ties.

use std::collections::{HashMap, HashSet};

use serde::Serialize;

use crate::error::{KinshipError, Result};
use crate::graph::accessor::FamilyGraph;
use crate::graph::enrich::enrich;
use crate::graph::model::{GenderCode, Person, PersonId, PersonView, RelationshipType};

/// Maximum suggestions returned by one query.
pub const MAX_SUGGESTIONS: usize = 20;

/// Every template reaches its candidates in two hops.
const PROXIMITY: u32 = 2;

#[derive(Debug, Clone, Serialize)]
pub struct Suggestion {
    #[serde(flatten)]
    pub person: PersonView,
    pub inferred_relationship_type: RelationshipType,
    pub inferred_relationship_label: String,
    pub connection_path: String,
    pub proximity_score: u32,
    pub relationship_priority: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Pattern {
    SpouseChild,
    ParentSpouse,
    ChildParent,
}

impl Pattern {
    const ALL: [Pattern; 3] = [Pattern::SpouseChild, Pattern::ParentSpouse, Pattern::ChildParent];

    fn priority(self) -> u32 {
        match self {
            Pattern::SpouseChild => 1,
            Pattern::ParentSpouse => 2,
            Pattern::ChildParent => 3,
        }
    }

    /// Which of the requester's ties the pattern starts from.
    fn first_hop(self, rel: RelationshipType) -> bool {
        match self {
            Pattern::SpouseChild => rel.is_spouse(),
            Pattern::ParentSpouse => rel.is_parent(),
            Pattern::ChildParent => rel.is_child(),
        }
    }

    /// Which of the intermediate person's ties lead to a candidate.
    fn second_hop(self, rel: RelationshipType) -> bool {
        match self {
            Pattern::SpouseChild => rel.is_child(),
            Pattern::ParentSpouse => rel.is_spouse(),
            Pattern::ChildParent => rel.is_parent(),
        }
    }

    fn inferred_type(self, gender: GenderCode) -> RelationshipType {
        match (self, gender) {
            (Pattern::SpouseChild, GenderCode::Female) => RelationshipType::Daughter,
            (Pattern::SpouseChild, _) => RelationshipType::Son,
            (Pattern::ParentSpouse, GenderCode::Female) => RelationshipType::Mother,
            (Pattern::ParentSpouse, _) => RelationshipType::Father,
            (Pattern::ChildParent, _) => RelationshipType::Spouse,
        }
    }

    fn describe(self, via: &str) -> String {
        match self {
            Pattern::SpouseChild => format!("Child of your spouse {}", via),
            Pattern::ParentSpouse => format!("Spouse of your parent {}", via),
            Pattern::ChildParent => format!("Parent of your child {}", via),
        }
    }
}

struct Candidate {
    person: Person,
    inferred: RelationshipType,
    connection_path: String,
    priority: u32,
}

impl Candidate {
    fn rank(&self) -> (u32, u32) {
        (PROXIMITY, self.priority)
    }
}

fn display_name<G: FamilyGraph>(graph: &G, id: PersonId) -> Result<String> {
    Ok(graph
        .person(id)?
        .map(|p| p.full_name())
        .unwrap_or_else(|| format!("#{}", id)))
}

/// Suggest persons two hops from `requester` who are likely relatives but
/// have no direct tie yet.
///
/// Patterns, by priority: spouse's children, parent's spouses, child's other
/// parents. A person reachable by several patterns is reported once, under
/// the highest-priority one. Results are ordered by proximity, priority and
/// first name (case-insensitive), and capped at [`MAX_SUGGESTIONS`].
pub fn suggest_relatives<G: FamilyGraph>(graph: &G, requester: PersonId) -> Result<Vec<Suggestion>> {
    graph.person(requester)?.ok_or(KinshipError::PersonNotFound(requester))?;

    let own: Vec<_> = graph
        .relationships(requester)?
        .into_iter()
        .filter(|r| r.is_active)
        .collect();
    let mut direct: HashSet<PersonId> = own.iter().map(|r| r.related_person_id).collect();
    direct.insert(requester);

    let mut best: HashMap<PersonId, Candidate> = HashMap::new();

    for pattern in Pattern::ALL {
        for tie in own.iter().filter(|r| pattern.first_hop(r.relationship_type)) {
            let via = tie.related_person_id;
            let mut via_name = None;

            for hop in graph.relationships(via)? {
                if !hop.is_active || !pattern.second_hop(hop.relationship_type) {
                    continue;
                }
                let id = hop.related_person_id;
                if direct.contains(&id) {
                    continue;
                }
                let Some(person) = graph.person(id)? else {
                    continue;
                };
                if !person.is_active || !person.has_identity() {
                    continue;
                }

                if via_name.is_none() {
                    via_name = Some(display_name(graph, via)?);
                }
                let candidate = Candidate {
                    inferred: pattern.inferred_type(graph.gender_code(person.gender_id)?),
                    connection_path: pattern.describe(via_name.as_deref().unwrap_or_default()),
                    priority: pattern.priority(),
                    person,
                };

                match best.get(&id) {
                    Some(existing) if existing.rank() <= candidate.rank() => {}
                    _ => {
                        best.insert(id, candidate);
                    }
                }
            }
        }
    }

    let mut ranked: Vec<Candidate> = best.into_values().collect();
    ranked.sort_by(|a, b| {
        a.rank()
            .cmp(&b.rank())
            .then_with(|| {
                a.person
                    .first_name
                    .to_lowercase()
                    .cmp(&b.person.first_name.to_lowercase())
            })
            .then_with(|| a.person.id.cmp(&b.person.id))
    });
    ranked.truncate(MAX_SUGGESTIONS);

    log::debug!("suggest_relatives {}: {} suggestions", requester, ranked.len());

    ranked
        .into_iter()
        .map(|c| {
            Ok(Suggestion {
                person: enrich(graph, &c.person)?,
                inferred_relationship_label: graph.type_label(c.inferred)?,
                inferred_relationship_type: c.inferred,
                connection_path: c.connection_path,
                proximity_score: PROXIMITY,
                relationship_priority: c.priority,
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::fixtures::*;
    use crate::graph::model::RelationshipType::*;
    use crate::graph::MemoryGraph;

    const REQ: PersonId = 1;
    const WIFE: PersonId = 2;
    const STEPSON: PersonId = 3;
    const STEPDAUGHTER: PersonId = 4;
    const FATHER: PersonId = 5;
    const STEPMOM: PersonId = 6;
    const KID: PersonId = 7;
    const KIDS_MOTHER: PersonId = 8;

    /// REQ is married to WIFE, whose two children are not yet linked to REQ.
    /// REQ's FATHER remarried STEPMOM. REQ's KID has another parent.
    fn blended() -> MemoryGraph {
        let mut g = graph();
        g.add_person(person(REQ, "Ravi", MALE, 1970))
            .add_person(person(WIFE, "Wendy", FEMALE, 1972))
            .add_person(person(STEPSON, "Rohan", MALE, 1995))
            .add_person(person(STEPDAUGHTER, "asha", FEMALE, 1997))
            .add_person(person(FATHER, "Farhan", MALE, 1940))
            .add_person(person(STEPMOM, "Sara", FEMALE, 1950))
            .add_person(person(KID, "Kiran", MALE, 2000))
            .add_person(person(KIDS_MOTHER, "Kala", FEMALE, 1975))
            .add_pair(REQ, WIFE, Wife, Husband)
            .add_pair(WIFE, STEPSON, Son, Mother)
            .add_pair(WIFE, STEPDAUGHTER, Daughter, Mother)
            .add_pair(REQ, FATHER, Father, Son)
            .add_pair(FATHER, STEPMOM, Wife, Husband)
            .add_pair(REQ, KID, Son, Father)
            .add_pair(KID, KIDS_MOTHER, Mother, Son);
        g
    }

    fn ids(suggestions: &[Suggestion]) -> Vec<PersonId> {
        suggestions.iter().map(|s| s.person.id).collect()
    }

    #[test]
    fn test_three_patterns_in_priority_order() {
        let g = blended();
        let suggestions = suggest_relatives(&g, REQ).unwrap();
        assert_eq!(ids(&suggestions), vec![STEPDAUGHTER, STEPSON, STEPMOM, KIDS_MOTHER]);

        let labels: Vec<_> = suggestions.iter().map(|s| s.inferred_relationship_label.as_str()).collect();
        assert_eq!(labels, vec!["Daughter", "Son", "Mother", "Spouse"]);

        let priorities: Vec<_> = suggestions.iter().map(|s| s.relationship_priority).collect();
        assert_eq!(priorities, vec![1, 1, 2, 3]);
        assert!(suggestions.iter().all(|s| s.proximity_score == 2));

        assert_eq!(suggestions[0].connection_path, "Child of your spouse Wendy Family");
        assert_eq!(suggestions[2].connection_path, "Spouse of your parent Farhan Family");
        assert_eq!(suggestions[3].connection_path, "Parent of your child Kiran Family");
    }

    #[test]
    fn test_labels_come_from_store() {
        let mut g = blended();
        g.set_label(Son, "Putra").set_label(Spouse, "Partner");

        let suggestions = suggest_relatives(&g, REQ).unwrap();
        let labels: Vec<_> = suggestions.iter().map(|s| s.inferred_relationship_label.as_str()).collect();
        assert_eq!(labels, vec!["Daughter", "Putra", "Mother", "Partner"]);
        assert_eq!(suggestions[1].inferred_relationship_type, RelationshipType::Son);
    }

    #[test]
    fn test_never_suggests_direct_neighbours() {
        for g in [blended(), family()] {
            for id in 1..=8 {
                let neighbours = g.neighbors(id).unwrap();
                for s in suggest_relatives(&g, id).unwrap() {
                    assert_ne!(s.person.id, id);
                    assert!(!neighbours.contains(&s.person.id), "{} suggested to {}", s.person.id, id);
                }
            }
        }
    }

    #[test]
    fn test_fully_linked_family_has_no_suggestions() {
        let g = family();
        assert!(suggest_relatives(&g, MOM).unwrap().is_empty());
        assert!(suggest_relatives(&g, ME).unwrap().is_empty());
    }

    #[test]
    fn test_unresolved_gender_uses_default_labels() {
        let mut g = blended();
        let mut child = person(9, "Nila", 99, 1999);
        child.gender_id = None;
        let mut second = person(10, "Noor", 99, 1955);
        second.gender_id = Some(99);
        g.add_person(child)
            .add_person(second)
            .add_pair(WIFE, 9, Son, Mother)
            .add_pair(FATHER, 10, Spouse, Spouse);

        let suggestions = suggest_relatives(&g, REQ).unwrap();
        let by_id: HashMap<_, _> = suggestions.iter().map(|s| (s.person.id, s)).collect();
        assert_eq!(by_id[&9].inferred_relationship_type, RelationshipType::Son);
        assert_eq!(by_id[&10].inferred_relationship_type, RelationshipType::Father);
    }

    #[test]
    fn test_duplicate_keeps_highest_priority() {
        let mut g = blended();
        // KIDS_MOTHER is also WIFE's daughter: reachable as a spouse's child
        // (priority 1) and as a child's other parent (priority 3).
        g.add_pair(WIFE, KIDS_MOTHER, Daughter, Mother);

        let suggestions = suggest_relatives(&g, REQ).unwrap();
        let hits: Vec<_> = suggestions.iter().filter(|s| s.person.id == KIDS_MOTHER).collect();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].relationship_priority, 1);
        assert_eq!(hits[0].inferred_relationship_type, RelationshipType::Daughter);
    }

    #[test]
    fn test_incomplete_or_inactive_candidates_dropped() {
        let mut g = blended();
        let mut undated = person(9, "Nila", FEMALE, 1999);
        undated.date_of_birth = None;
        let mut retired = person(10, "Omar", MALE, 1998);
        retired.is_active = false;
        g.add_person(undated)
            .add_person(retired)
            .add_pair(WIFE, 9, Daughter, Mother)
            .add_pair(WIFE, 10, Son, Mother);

        let found = ids(&suggest_relatives(&g, REQ).unwrap());
        assert!(!found.contains(&9));
        assert!(!found.contains(&10));
    }

    #[test]
    fn test_inactive_ties_are_ignored() {
        let mut g = blended();
        g.deactivate(REQ, WIFE);
        let found = ids(&suggest_relatives(&g, REQ).unwrap());
        assert!(!found.contains(&STEPSON));
        assert!(!found.contains(&STEPDAUGHTER));
    }

    #[test]
    fn test_capped() {
        let mut g = blended();
        for id in 100..130 {
            g.add_person(person(id, &format!("Child{}", id), MALE, 2001))
                .add_pair(WIFE, id, Son, Mother);
        }
        let suggestions = suggest_relatives(&g, REQ).unwrap();
        assert_eq!(suggestions.len(), MAX_SUGGESTIONS);
        assert!(suggestions.iter().all(|s| s.relationship_priority == 1));
    }

    #[test]
    fn test_unknown_requester() {
        let g = blended();
        assert!(suggest_relatives(&g, 77).unwrap_err().is_not_found());
    }

    #[test]
    fn test_serializes_type_as_code() {
        let g = blended();
        let suggestions = suggest_relatives(&g, REQ).unwrap();
        let json = serde_json::to_value(&suggestions[0]).unwrap();
        assert_eq!(json["inferred_relationship_type"], "DAUGHTER");
        assert_eq!(json["first_name"], "asha");
        assert_eq!(json["proximity_score"], 2);
    }
}
