//! Snapping of arbitrary coordinates onto vertices of the subgraph. Vertices
//! on small islands of the graph, which aren't connected to the surrounding
//! street network, are skipped.

use geo::Point;
use rustc_hash::FxHashSet;

use crate::common::error::{Result, RouteError};
use crate::common::graph_data::{CostMode, NearestEdge, VertexCandidate};
use crate::common::session::CancelToken;
use crate::loading::engine::GraphEngine;
use crate::routing::subgraph::Subgraph;

/// Number of edges examined around each point
pub const NEAREST_EDGE_LIMIT: usize = 20;

/// Maximum number of candidates returned for each point
pub const MAX_CANDIDATES: usize = 10;

/// Candidates further than this beyond the closest accepted one are dropped
pub const CANDIDATE_SPREAD: f64 = 250.0;

/// Turn nearby edges into a list of distinct vertices, ordered by their
/// distance from the point
fn collect_candidates(nearest: &[NearestEdge], point: Point) -> Vec<VertexCandidate> {
    let mut seen = FxHashSet::<i64>::default();
    let mut candidates: Vec<VertexCandidate> = nearest
        .iter()
        .filter_map(|edge| VertexCandidate::from_nearest_edge(edge, point))
        .filter(|candidate| seen.insert(candidate.vertex_id))
        .collect();

    candidates.sort_by(|a, b| {
        a.distance
            .total_cmp(&b.distance)
            .then(a.vertex_id.cmp(&b.vertex_id))
    });
    candidates
}

/// Find the vertices which a point could be snapped onto, closest first.
/// Returns an empty list if nothing usable is nearby
pub async fn nearest_vertices<E: GraphEngine>(
    engine: &E,
    subgraph: &Subgraph,
    point: Point,
    token: &CancelToken,
) -> Result<Vec<VertexCandidate>> {
    let table = subgraph.table();

    let nearest = engine
        .nearest_edges(table, point, NEAREST_EDGE_LIMIT, CostMode::Weighted)
        .await?;
    token.check()?;

    let reference = engine.nearest_major_vertex(table, point).await?;
    token.check()?;

    let mut accepted = Vec::<VertexCandidate>::with_capacity(MAX_CANDIDATES);
    for candidate in collect_candidates(&nearest, point) {
        if let Some(closest) = accepted.first() {
            if candidate.distance > closest.distance + CANDIDATE_SPREAD {
                break;
            }
        }

        if let Some(reference) = reference {
            if candidate.vertex_id != reference {
                let path = engine
                    .shortest_path(table, candidate.vertex_id, reference, CostMode::Weighted)
                    .await?;
                token.check()?;
                if path.is_empty() {
                    log::debug!("Skipping vertex {} on an island", candidate.vertex_id);
                    continue;
                }
            }
        }

        accepted.push(candidate);
        if accepted.len() >= MAX_CANDIDATES {
            break;
        }
    }

    log::debug!(
        "{}/{} snapped to {:?}",
        point.y(),
        point.x(),
        accepted.iter().map(|c| c.vertex_id).collect::<Vec<i64>>()
    );

    Ok(accepted)
}

/// Work out why no vertex could be found for a point. If the only edges
/// nearby are ones which the profile rules out, the route is excluded by the
/// profile, otherwise there is no route
pub async fn explain_missing_vertices<E: GraphEngine>(
    engine: &E,
    subgraph: &Subgraph,
    point: Point,
) -> Result<RouteError> {
    let table = subgraph.table();

    let passable = engine
        .nearest_edges(table, point, 1, CostMode::Weighted)
        .await?;
    if !passable.is_empty() {
        return Ok(RouteError::NoRouteFound);
    }

    let physical = engine.nearest_edges(table, point, 1, CostMode::Length).await?;
    if physical.is_empty() {
        Ok(RouteError::NoRouteFound)
    } else {
        Ok(RouteError::RouteExcludedByProfile)
    }
}
