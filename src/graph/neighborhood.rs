//! Relatives within N hops of a person.

use std::collections::{HashMap, VecDeque};
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{KinshipError, Result};
use crate::graph::accessor::FamilyGraph;
use crate::graph::enrich::enrich;
use crate::graph::model::{Address, Person, PersonId, PersonView};
use crate::graph::TraversalBudget;

/// Maximum relatives returned by one query.
pub const MAX_RELATIVES: usize = 100;

/// Which discovered depths a relatives query keeps.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DepthMode {
    /// Every depth from 1 through N.
    #[default]
    UpTo,
    /// Exactly depth N.
    OnlyAt,
}

impl FromStr for DepthMode {
    type Err = KinshipError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "up_to" | "upto" => Ok(DepthMode::UpTo),
            "only_at" | "onlyat" => Ok(DepthMode::OnlyAt),
            other => Err(KinshipError::InvalidInput(format!("Unknown depth mode: {}", other))),
        }
    }
}

impl fmt::Display for DepthMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            DepthMode::UpTo => "up_to",
            DepthMode::OnlyAt => "only_at",
        })
    }
}

/// Parameters of a relatives query. Absent filters match everyone.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct RelativesQuery {
    pub depth: usize,
    #[serde(default)]
    pub depth_mode: DepthMode,
    #[serde(default)]
    pub living_only: bool,
    #[serde(default)]
    pub gender_id: Option<i64>,
    #[serde(default)]
    pub country_id: Option<i64>,
    #[serde(default)]
    pub state_id: Option<i64>,
    #[serde(default)]
    pub district_id: Option<i64>,
    #[serde(default)]
    pub city_id: Option<i64>,
}

impl RelativesQuery {
    pub fn new(depth: usize, depth_mode: DepthMode) -> Self {
        Self { depth, depth_mode, ..Self::default() }
    }

    fn has_address_filter(&self) -> bool {
        self.country_id.is_some()
            || self.state_id.is_some()
            || self.district_id.is_some()
            || self.city_id.is_some()
    }

    /// Each supplied field must equal the person's current address field.
    fn address_matches(&self, address: Option<&Address>) -> bool {
        let Some(address) = address else {
            return false;
        };
        let field_ok = |wanted: Option<i64>, actual: Option<i64>| match wanted {
            Some(w) => actual == Some(w),
            None => true,
        };
        field_ok(self.country_id, address.country_id)
            && field_ok(self.state_id, address.state_id)
            && field_ok(self.district_id, address.district_id)
            && field_ok(self.city_id, address.city_id)
    }

    fn keeps_depth(&self, depth: usize, effective: usize) -> bool {
        match self.depth_mode {
            DepthMode::UpTo => (1..=effective).contains(&depth),
            DepthMode::OnlyAt => depth == effective,
        }
    }

    fn person_matches<G: FamilyGraph>(&self, graph: &G, person: &Person) -> Result<bool> {
        if self.living_only && !person.is_living() {
            return Ok(false);
        }
        if let Some(gender_id) = self.gender_id {
            if person.gender_id != Some(gender_id) {
                return Ok(false);
            }
        }
        if self.has_address_filter() {
            let address = graph.current_address(person.id)?;
            if !self.address_matches(address.as_ref()) {
                return Ok(false);
            }
        }
        Ok(true)
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct Relative {
    #[serde(flatten)]
    pub person: PersonView,
    pub depth: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct RelativesResult {
    pub person_id: PersonId,
    pub total_count: usize,
    /// Depth actually searched, after clamping to the ceiling.
    pub depth: usize,
    pub depth_mode: DepthMode,
    /// More than [`MAX_RELATIVES`] relatives passed the filters.
    pub truncated: bool,
    pub relatives: Vec<Relative>,
}

/// Level-order BFS from `root` to `max_depth`, returning each newly
/// discovered person with its first-discovery depth, in discovery order.
fn discover<G: FamilyGraph>(
    graph: &G,
    root: PersonId,
    max_depth: usize,
    budget: &TraversalBudget,
) -> Result<Vec<(PersonId, usize)>> {
    let mut depths: HashMap<PersonId, usize> = HashMap::from([(root, 0)]);
    let mut discovered = Vec::new();
    let mut queue = VecDeque::from([(root, 0usize)]);

    'bfs: while let Some((node, depth)) = queue.pop_front() {
        if depth >= max_depth {
            continue;
        }
        for next in graph.neighbors(node)? {
            if depths.contains_key(&next) {
                continue;
            }
            if budget.exhausted(depths.len()) {
                log::warn!("find_relatives {}: traversal budget of {} persons exhausted", root, budget.max_visited);
                break 'bfs;
            }
            depths.insert(next, depth + 1);
            discovered.push((next, depth + 1));
            queue.push_back((next, depth + 1));
        }
    }

    Ok(discovered)
}

/// Relatives of `root` selected by depth mode and filters.
///
/// The requested depth is clamped to `max_depth`. The root is never part of
/// the result, and at most [`MAX_RELATIVES`] relatives are returned in
/// discovery order.
pub fn find_relatives<G: FamilyGraph>(
    graph: &G,
    root: PersonId,
    query: &RelativesQuery,
    max_depth: usize,
    budget: TraversalBudget,
) -> Result<RelativesResult> {
    graph.person(root)?.ok_or(KinshipError::PersonNotFound(root))?;

    let depth = query.depth.min(max_depth);
    if depth < query.depth {
        log::debug!("find_relatives {}: depth {} clamped to {}", root, query.depth, depth);
    }

    let discovered = if depth == 0 {
        Vec::new()
    } else {
        discover(graph, root, depth, &budget)?
    };

    let mut relatives = Vec::new();
    let mut truncated = false;

    for (id, found_at) in discovered {
        if !query.keeps_depth(found_at, depth) {
            continue;
        }
        let Some(person) = graph.person(id)? else {
            continue;
        };
        if !query.person_matches(graph, &person)? {
            continue;
        }
        if relatives.len() == MAX_RELATIVES {
            truncated = true;
            break;
        }
        relatives.push(Relative { person: enrich(graph, &person)?, depth: found_at });
    }

    log::debug!(
        "find_relatives {}: {} relatives at depth {} ({})",
        root, relatives.len(), depth, query.depth_mode
    );

    Ok(RelativesResult {
        person_id: root,
        total_count: relatives.len(),
        depth,
        depth_mode: query.depth_mode,
        truncated,
        relatives,
    })
}
