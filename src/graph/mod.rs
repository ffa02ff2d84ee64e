//! Family relationship graph: data model, store access, and the four
//! traversal queries (connection path, relatives, partner matching,
//! relative suggestions).
//!
//! All traversals are synchronous and generic over [`FamilyGraph`], so they
//! run unchanged against SQLite ([`SqliteGraph`]) or an in-memory graph
//! ([`MemoryGraph`]). Traversal state lives only for the duration of a call.

mod accessor;
mod enrich;
mod model;
mod sqlite;

pub mod discovery;
pub mod matching;
pub mod neighborhood;
pub mod path;

#[cfg(test)]
pub(crate) mod fixtures;

pub use accessor::{FamilyGraph, MemoryGraph};
pub use enrich::{enrich, enrich_id, link};
pub use model::{
    Address, GenderCode, Link, Person, PersonId, PersonView, Relationship, RelationshipType,
    FALLBACK_LABEL,
};
pub use sqlite::SqliteGraph;

pub use discovery::{suggest_relatives, Suggestion, MAX_SUGGESTIONS};
pub use matching::{find_matches, ExplorationNode, MatchQuery, MatchResult};
pub use neighborhood::{find_relatives, DepthMode, Relative, RelativesQuery, RelativesResult, MAX_RELATIVES};
pub use path::{find_path, PathNode, PathResult};

/// Upper bound on distinct persons one traversal may discover.
///
/// Depth ceilings alone do not bound work on densely connected graphs.
/// When the budget runs out a traversal stops expanding and returns what it
/// has found so far.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TraversalBudget {
    pub max_visited: usize,
}

impl TraversalBudget {
    pub fn new(max_visited: usize) -> Self {
        Self { max_visited }
    }

    /// True once `visited` distinct persons use up the budget.
    pub fn exhausted(&self, visited: usize) -> bool {
        visited >= self.max_visited
    }
}

impl Default for TraversalBudget {
    fn default() -> Self {
        Self::new(10_000)
    }
}
