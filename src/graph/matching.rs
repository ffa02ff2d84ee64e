//! Partner matching: explore outward from a seeker and flag eligible
//! persons along the way.

use std::collections::{BTreeMap, HashMap, HashSet, VecDeque};

use serde::{Deserialize, Serialize};

use crate::error::{KinshipError, Result};
use crate::graph::accessor::FamilyGraph;
use crate::graph::enrich::{enrich_id, link};
use crate::graph::model::{GenderCode, Link, Person, PersonId, PersonView};
use crate::graph::TraversalBudget;

/// Eligibility criteria. Every supplied criterion must hold.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct MatchQuery {
    pub target_gender: GenderCode,
    #[serde(default)]
    pub birth_year_min: Option<i32>,
    #[serde(default)]
    pub birth_year_max: Option<i32>,
    #[serde(default)]
    pub religion_id: Option<i64>,
    #[serde(default)]
    pub religion_category_id: Option<i64>,
    #[serde(default)]
    pub religion_sub_category_id: Option<i64>,
    #[serde(default)]
    pub exclude_sub_category_ids: Vec<i64>,
    pub depth: usize,
}

impl MatchQuery {
    pub fn new(target_gender: GenderCode, depth: usize) -> Self {
        Self {
            target_gender,
            birth_year_min: None,
            birth_year_max: None,
            religion_id: None,
            religion_category_id: None,
            religion_sub_category_id: None,
            exclude_sub_category_ids: Vec::new(),
            depth,
        }
    }
}

/// Node of the exploration tree. `from` points at the BFS parent, `to_list`
/// at the nodes this one discovered.
#[derive(Debug, Clone, Serialize)]
pub struct ExplorationNode {
    #[serde(flatten)]
    pub person: PersonView,
    pub depth: usize,
    pub is_match: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub from: Option<Link>,
    pub to_list: Vec<Link>,
}

#[derive(Debug, Clone, Serialize)]
pub struct MatchResult {
    pub seeker_id: PersonId,
    pub total_matches: usize,
    pub matches: Vec<PersonId>,
    pub exploration_graph: BTreeMap<PersonId, ExplorationNode>,
}

fn within(value: Option<i64>, wanted: Option<i64>) -> bool {
    wanted.map_or(true, |w| value == Some(w))
}

/// Evaluate the eligibility checks in order, stopping at the first failure.
fn is_eligible<G: FamilyGraph>(graph: &G, person: &Person, query: &MatchQuery) -> Result<bool> {
    if graph.gender_code(person.gender_id)? != query.target_gender {
        return Ok(false);
    }
    if !person.is_living() {
        return Ok(false);
    }

    let Some(year) = person.birth_year() else {
        return Ok(false);
    };
    if query.birth_year_min.is_some_and(|min| year < min)
        || query.birth_year_max.is_some_and(|max| year > max)
    {
        return Ok(false);
    }

    if !within(person.religion_id, query.religion_id)
        || !within(person.religion_category_id, query.religion_category_id)
        || !within(person.religion_sub_category_id, query.religion_sub_category_id)
    {
        return Ok(false);
    }
    if let Some(sub) = person.religion_sub_category_id {
        if query.exclude_sub_category_ids.contains(&sub) {
            return Ok(false);
        }
    }

    // Married or already a parent.
    let attached = graph
        .relationships(person.id)?
        .iter()
        .any(|r| r.is_active && (r.relationship_type.is_spouse() || r.relationship_type.is_child()));
    Ok(!attached)
}

/// Explore up to `min(query.depth, max_depth)` hops from `seeker` and collect
/// eligible persons in discovery order.
///
/// The exploration graph covers every visited person, matched or not.
pub fn find_matches<G: FamilyGraph>(
    graph: &G,
    seeker: PersonId,
    query: &MatchQuery,
    max_depth: usize,
    budget: TraversalBudget,
) -> Result<MatchResult> {
    graph.person(seeker)?.ok_or(KinshipError::PersonNotFound(seeker))?;

    let depth_limit = query.depth.min(max_depth);
    if depth_limit < query.depth {
        log::debug!("find_matches {}: depth {} clamped to {}", seeker, query.depth, depth_limit);
    }

    let mut parent: HashMap<PersonId, Option<PersonId>> = HashMap::from([(seeker, None)]);
    let mut depth_of: HashMap<PersonId, usize> = HashMap::from([(seeker, 0)]);
    let mut order = vec![seeker];
    let mut matched = HashSet::new();
    let mut matches = Vec::new();
    let mut queue = VecDeque::from([seeker]);

    'bfs: while let Some(node) = queue.pop_front() {
        let depth = depth_of[&node];
        if depth >= depth_limit {
            continue;
        }
        for next in graph.neighbors(node)? {
            if parent.contains_key(&next) {
                continue;
            }
            if budget.exhausted(parent.len()) {
                log::warn!("find_matches {}: traversal budget of {} persons exhausted", seeker, budget.max_visited);
                break 'bfs;
            }
            parent.insert(next, Some(node));
            depth_of.insert(next, depth + 1);
            order.push(next);
            queue.push_back(next);

            if let Some(person) = graph.person(next)? {
                if is_eligible(graph, &person, query)? {
                    matched.insert(next);
                    matches.push(next);
                }
            }
        }
    }

    let mut exploration_graph = BTreeMap::new();
    for &id in &order {
        exploration_graph.insert(
            id,
            ExplorationNode {
                person: enrich_id(graph, id)?,
                depth: depth_of[&id],
                is_match: matched.contains(&id),
                from: None,
                to_list: Vec::new(),
            },
        );
    }
    for &id in &order {
        let Some(Some(up)) = parent.get(&id).copied() else {
            continue;
        };
        let from = link(graph, id, up)?;
        let to = link(graph, up, id)?;
        if let Some(node) = exploration_graph.get_mut(&id) {
            node.from = Some(from);
        }
        if let Some(node) = exploration_graph.get_mut(&up) {
            node.to_list.push(to);
        }
    }

    log::debug!(
        "find_matches {}: {} matches among {} visited (depth {})",
        seeker, matches.len(), order.len(), depth_limit
    );

    Ok(MatchResult {
        seeker_id: seeker,
        total_matches: matches.len(),
        matches,
        exploration_graph,
    })
}
