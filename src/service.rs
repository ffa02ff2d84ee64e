//! Async entry points over the SQLite store.
//!
//! Each query opens its own connection on the blocking pool and runs the
//! synchronous traversal there, with ceilings taken from [`TraversalConfig`].

use std::time::Instant;

use crate::config::TraversalConfig;
use crate::db::Db;
use crate::error::Result;
use crate::graph::{
    find_matches, find_path, find_relatives, suggest_relatives, MatchQuery, MatchResult,
    PathResult, PersonId, RelativesQuery, RelativesResult, SqliteGraph, Suggestion,
    TraversalBudget,
};

#[derive(Debug, Clone)]
pub struct KinshipService {
    db: Db,
    traversal: TraversalConfig,
}

impl KinshipService {
    pub fn new(db: Db, traversal: TraversalConfig) -> Self {
        Self { db, traversal }
    }

    pub fn db(&self) -> &Db {
        &self.db
    }

    pub fn traversal(&self) -> &TraversalConfig {
        &self.traversal
    }

    fn budget(&self) -> TraversalBudget {
        TraversalBudget::new(self.traversal.max_visited_nodes)
    }

    /// Connecting path between two persons.
    pub async fn find_path(&self, person_a: PersonId, person_b: PersonId) -> Result<PathResult> {
        let start = Instant::now();
        let rounds = self.traversal.max_path_rounds;
        let budget = self.budget();

        let result = self
            .db
            .with_connection(move |conn| {
                find_path(&SqliteGraph::new(conn), person_a, person_b, rounds, budget)
            })
            .await?;

        log::info!(
            "find_path {} -> {}: found={} in {}ms",
            person_a,
            person_b,
            result.connection_found,
            start.elapsed().as_millis()
        );
        Ok(result)
    }

    /// Relatives of a person by depth and filters.
    pub async fn relatives(&self, person_id: PersonId, query: RelativesQuery) -> Result<RelativesResult> {
        let start = Instant::now();
        let max_depth = self.traversal.max_relatives_depth;
        let budget = self.budget();

        let result = self
            .db
            .with_connection(move |conn| {
                find_relatives(&SqliteGraph::new(conn), person_id, &query, max_depth, budget)
            })
            .await?;

        log::info!(
            "relatives of {}: {} at depth {} in {}ms",
            person_id,
            result.total_count,
            result.depth,
            start.elapsed().as_millis()
        );
        Ok(result)
    }

    /// Eligible partners around a seeker.
    pub async fn matches(&self, seeker: PersonId, query: MatchQuery) -> Result<MatchResult> {
        let start = Instant::now();
        let max_depth = self.traversal.max_match_depth;
        let budget = self.budget();

        let result = self
            .db
            .with_connection(move |conn| {
                find_matches(&SqliteGraph::new(conn), seeker, &query, max_depth, budget)
            })
            .await?;

        log::info!(
            "matches for {}: {} of {} explored in {}ms",
            seeker,
            result.total_matches,
            result.exploration_graph.len(),
            start.elapsed().as_millis()
        );
        Ok(result)
    }

    /// Probable relatives not yet linked to a person.
    pub async fn suggestions(&self, person_id: PersonId) -> Result<Vec<Suggestion>> {
        let start = Instant::now();

        let result = self
            .db
            .with_connection(move |conn| suggest_relatives(&SqliteGraph::new(conn), person_id))
            .await?;

        log::info!(
            "suggestions for {}: {} in {}ms",
            person_id,
            result.len(),
            start.elapsed().as_millis()
        );
        Ok(result)
    }
}
