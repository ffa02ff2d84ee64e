//! Connection path between two persons via bidirectional BFS.
//!
//! Each round expands side A's whole current frontier, then side B's, and
//! stops at the first node seen from both sides. The result is a connecting
//! path found within the round ceiling; with asymmetric branching it is not
//! guaranteed to be the globally shortest one.

use std::collections::{BTreeMap, HashMap, VecDeque};

use serde::Serialize;

use crate::error::{KinshipError, Result};
use crate::graph::accessor::FamilyGraph;
use crate::graph::enrich::{enrich, enrich_id, link};
use crate::graph::model::{Link, PersonId, PersonView};
use crate::graph::TraversalBudget;

/// One person on (or at either end of) a connection path.
#[derive(Debug, Clone, Serialize)]
pub struct PathNode {
    #[serde(flatten)]
    pub person: PersonView,
    /// Previous node on the path, labelled from this node's side.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub from: Option<Link>,
    /// Next node on the path, labelled from this node's side.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub to: Option<Link>,
}

#[derive(Debug, Clone, Serialize)]
pub struct PathResult {
    pub connection_found: bool,
    pub message: String,
    /// Node where the two searches met.
    pub common_node_id: Option<PersonId>,
    /// Hop count of `path`, absent when no connection was found.
    pub degree: Option<usize>,
    /// Person ids from A to B. Empty when no connection was found.
    pub path: Vec<PersonId>,
    pub graph: BTreeMap<PersonId, PathNode>,
}

/// One direction of the search: parent map (root maps to `None`) and the
/// frontier still to be expanded.
struct Side {
    parents: HashMap<PersonId, Option<PersonId>>,
    frontier: VecDeque<PersonId>,
}

impl Side {
    fn rooted_at(root: PersonId) -> Self {
        Self {
            parents: HashMap::from([(root, None)]),
            frontier: VecDeque::from([root]),
        }
    }

    fn parent_of(&self, id: PersonId) -> Option<PersonId> {
        self.parents.get(&id).copied().flatten()
    }
}

enum Expansion {
    Met(PersonId),
    Continue,
    OutOfBudget,
}

/// Expand every node currently in `side`'s frontier by one hop.
fn expand<G: FamilyGraph>(
    graph: &G,
    side: &mut Side,
    other: &Side,
    budget: &TraversalBudget,
) -> Result<Expansion> {
    let level: Vec<PersonId> = side.frontier.drain(..).collect();

    for node in level {
        for next in graph.neighbors(node)? {
            let seen_by_other = other.parents.contains_key(&next);
            if !side.parents.contains_key(&next) {
                // A person the other side already holds is not a new discovery.
                if !seen_by_other && budget.exhausted(side.parents.len() + other.parents.len()) {
                    return Ok(Expansion::OutOfBudget);
                }
                side.parents.insert(next, Some(node));
                side.frontier.push_back(next);
            }
            if seen_by_other {
                return Ok(Expansion::Met(next));
            }
        }
    }

    Ok(Expansion::Continue)
}

/// `[a .. meeting]` from side A followed by `[after meeting .. b]` from side B.
fn reconstruct(meeting: PersonId, side_a: &Side, side_b: &Side) -> Vec<PersonId> {
    let mut path = Vec::new();

    let mut current = Some(meeting);
    while let Some(id) = current {
        path.push(id);
        current = side_a.parent_of(id);
    }
    path.reverse();

    let mut current = side_b.parent_of(meeting);
    while let Some(id) = current {
        path.push(id);
        current = side_b.parent_of(id);
    }

    path
}

/// Find a chain of family ties connecting `a` and `b` within `max_rounds`
/// rounds of bidirectional expansion.
///
/// Returns `PersonNotFound` when either id does not resolve. When no
/// connection is found the result holds just the two endpoints, unlinked.
pub fn find_path<G: FamilyGraph>(
    graph: &G,
    a: PersonId,
    b: PersonId,
    max_rounds: usize,
    budget: TraversalBudget,
) -> Result<PathResult> {
    let person_a = graph.person(a)?.ok_or(KinshipError::PersonNotFound(a))?;
    let person_b = graph.person(b)?.ok_or(KinshipError::PersonNotFound(b))?;

    if a == b {
        let node = PathNode { person: enrich(graph, &person_a)?, from: None, to: None };
        return Ok(PathResult {
            connection_found: true,
            message: "Same person".to_string(),
            common_node_id: Some(a),
            degree: Some(0),
            path: vec![a],
            graph: BTreeMap::from([(a, node)]),
        });
    }

    let mut side_a = Side::rooted_at(a);
    let mut side_b = Side::rooted_at(b);
    let mut meeting = None;
    let mut rounds = 0;

    while rounds < max_rounds && meeting.is_none() {
        // A side with an empty frontier just sits out; directed-only rows
        // can still let the other side reach it.
        if side_a.frontier.is_empty() && side_b.frontier.is_empty() {
            break;
        }
        rounds += 1;

        match expand(graph, &mut side_a, &side_b, &budget)? {
            Expansion::Met(id) => meeting = Some(id),
            Expansion::OutOfBudget => {
                log::warn!("find_path {} -> {}: traversal budget of {} persons exhausted", a, b, budget.max_visited);
                break;
            }
            Expansion::Continue => match expand(graph, &mut side_b, &side_a, &budget)? {
                Expansion::Met(id) => meeting = Some(id),
                Expansion::OutOfBudget => {
                    log::warn!("find_path {} -> {}: traversal budget of {} persons exhausted", a, b, budget.max_visited);
                    break;
                }
                Expansion::Continue => {}
            },
        }
    }

    let Some(meeting) = meeting else {
        log::debug!(
            "find_path {} -> {}: no connection after {} rounds ({} persons visited)",
            a, b, rounds, side_a.parents.len() + side_b.parents.len()
        );
        let graph_nodes = BTreeMap::from([
            (a, PathNode { person: enrich(graph, &person_a)?, from: None, to: None }),
            (b, PathNode { person: enrich(graph, &person_b)?, from: None, to: None }),
        ]);
        return Ok(PathResult {
            connection_found: false,
            message: format!("No relation found within {} degrees", max_rounds),
            common_node_id: None,
            degree: None,
            path: Vec::new(),
            graph: graph_nodes,
        });
    };

    let path = reconstruct(meeting, &side_a, &side_b);
    log::debug!("find_path {} -> {}: met at {} after {} rounds, path {:?}", a, b, meeting, rounds, path);

    let mut nodes: BTreeMap<PersonId, PathNode> = BTreeMap::new();
    for &id in &path {
        let person = if id == a {
            enrich(graph, &person_a)?
        } else if id == b {
            enrich(graph, &person_b)?
        } else {
            enrich_id(graph, id)?
        };
        nodes.insert(id, PathNode { person, from: None, to: None });
    }

    for pair in path.windows(2) {
        let (prev, next) = (pair[0], pair[1]);
        let forward = link(graph, prev, next)?;
        let backward = link(graph, next, prev)?;
        if let Some(node) = nodes.get_mut(&prev) {
            node.to = Some(forward);
        }
        if let Some(node) = nodes.get_mut(&next) {
            node.from = Some(backward);
        }
    }

    let degree = path.len() - 1;
    Ok(PathResult {
        connection_found: true,
        message: format!("Connection found: {} degree(s) of separation", degree),
        common_node_id: Some(meeting),
        degree: Some(degree),
        path,
        graph: nodes,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::fixtures::{graph, person, FEMALE, MALE};
    use crate::graph::model::RelationshipType::*;
    use crate::graph::{MemoryGraph, FALLBACK_LABEL};

    const A: PersonId = 1;
    const F: PersonId = 2;
    const M: PersonId = 3;

    fn parents_fixture() -> MemoryGraph {
        let mut g = graph();
        g.add_person(person(A, "Asha", FEMALE, 1990))
            .add_person(person(F, "Farid", MALE, 1960))
            .add_person(person(M, "Meera", FEMALE, 1962))
            .add_pair(A, F, Father, Son)
            .add_pair(A, M, Mother, Son);
        g
    }

    /// 1 - 2 - 3 - ... - n with SON/FATHER pairs.
    fn chain(n: PersonId) -> MemoryGraph {
        let mut g = graph();
        for id in 1..=n {
            g.add_person(person(id, &format!("P{}", id), MALE, 1900 + id as i32));
        }
        for id in 1..n {
            g.add_pair(id, id + 1, Son, Father);
        }
        g
    }

    #[test]
    fn test_same_person_short_circuits() {
        let g = parents_fixture();
        let result = find_path(&g, A, A, 6, TraversalBudget::default()).unwrap();

        assert!(result.connection_found);
        assert_eq!(result.path, vec![A]);
        assert_eq!(result.graph.len(), 1);
        let node = &result.graph[&A];
        assert!(node.from.is_none());
        assert!(node.to.is_none());
    }

    #[test]
    fn test_direct_parent() {
        let g = parents_fixture();
        let result = find_path(&g, A, F, 6, TraversalBudget::default()).unwrap();

        assert!(result.connection_found);
        assert_eq!(result.path, vec![A, F]);
        assert_eq!(result.degree, Some(1));
        assert_eq!(result.graph[&A].to, Some(Link { id: F, label: "Father".into() }));
        assert_eq!(result.graph[&F].from, Some(Link { id: A, label: "Son".into() }));
        assert!(result.graph[&A].from.is_none());
        assert!(result.graph[&F].to.is_none());
    }

    #[test]
    fn test_path_through_common_child() {
        let g = parents_fixture();
        let result = find_path(&g, F, M, 6, TraversalBudget::default()).unwrap();

        assert!(result.connection_found);
        assert_eq!(result.path, vec![F, A, M]);
        assert_eq!(result.common_node_id, Some(A));
        assert_eq!(result.graph[&F].to.as_ref().unwrap().label, "Son");
        assert_eq!(result.graph[&A].to.as_ref().unwrap().label, "Mother");
        assert_eq!(result.graph[&A].from.as_ref().unwrap().label, "Father");
        assert_eq!(result.graph[&M].from.as_ref().unwrap().label, "Son");
    }

    #[test]
    fn test_disconnected_persons() {
        let mut g = parents_fixture();
        g.add_person(person(9, "Zed", MALE, 1980));
        let result = find_path(&g, A, 9, 6, TraversalBudget::default()).unwrap();

        assert!(!result.connection_found);
        assert!(result.message.contains("within 6"));
        assert!(result.path.is_empty());
        assert_eq!(result.graph.len(), 2);
        assert!(result.graph.values().all(|n| n.from.is_none() && n.to.is_none()));
    }

    #[test]
    fn test_round_ceiling_limits_reach() {
        let g = chain(7);

        let short = find_path(&g, 1, 7, 2, TraversalBudget::default()).unwrap();
        assert!(!short.connection_found);

        let enough = find_path(&g, 1, 7, 3, TraversalBudget::default()).unwrap();
        assert!(enough.connection_found);
        assert_eq!(enough.path, vec![1, 2, 3, 4, 5, 6, 7]);
        assert_eq!(enough.degree, Some(6));
    }

    #[test]
    fn test_inactive_edges_are_invisible() {
        let mut g = parents_fixture();
        g.deactivate(A, F).deactivate(F, A);
        let result = find_path(&g, A, F, 6, TraversalBudget::default()).unwrap();
        assert!(!result.connection_found);
    }

    #[test]
    fn test_missing_inverse_row_uses_fallback_label() {
        let mut g = graph();
        g.add_person(person(1, "A", MALE, 1990))
            .add_person(person(2, "B", MALE, 1960))
            .add_person(person(3, "C", MALE, 1958))
            .add_pair(1, 2, Father, Son)
            .add_edge(2, 3, Brother);

        let result = find_path(&g, 1, 3, 6, TraversalBudget::default()).unwrap();
        assert_eq!(result.path, vec![1, 2, 3]);
        assert_eq!(result.graph[&2].to.as_ref().unwrap().label, "Brother");
        assert_eq!(result.graph[&3].from.as_ref().unwrap().label, FALLBACK_LABEL);
    }

    #[test]
    fn test_budget_stops_search() {
        let g = chain(7);
        let result = find_path(&g, 1, 7, 10, TraversalBudget::new(3)).unwrap();
        assert!(!result.connection_found);
        assert_eq!(result.graph.len(), 2);
    }

    #[test]
    fn test_meeting_at_known_person_ignores_spent_budget() {
        // A holds {1, 2} after round one, which uses the whole budget; B then
        // reaches 2 from 3 without discovering anyone new.
        let g = chain(3);
        let result = find_path(&g, 1, 3, 6, TraversalBudget::new(3)).unwrap();
        assert!(result.connection_found);
        assert_eq!(result.path, vec![1, 2, 3]);
        assert_eq!(result.common_node_id, Some(2));
    }

    #[test]
    fn test_unknown_person_is_not_found() {
        let g = parents_fixture();
        let err = find_path(&g, A, 404, 6, TraversalBudget::default()).unwrap_err();
        assert!(matches!(err, KinshipError::PersonNotFound(404)));
    }
}
