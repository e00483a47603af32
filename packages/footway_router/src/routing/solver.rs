//! Shortest path queries between the snap candidates of a start and a
//! destination point. Pairs of candidates are tried closest first, until one
//! of them is connected.

use crate::common::error::{Result, RouteError};
use crate::common::graph_data::{CostMode, PathStep, VertexCandidate};
use crate::common::session::CancelToken;
use crate::loading::engine::GraphEngine;
use crate::routing::subgraph::Subgraph;

/// A path through the subgraph, along with the candidates it joins
#[derive(Debug, Clone, PartialEq)]
pub struct SolvedPath {
    pub steps: Vec<PathStep>,
    pub start: VertexCandidate,
    pub dest: VertexCandidate,
}

/// Index pairs into the start & destination candidate lists, in the order in
/// which they should be tried. Pairs with a smaller index sum come first,
/// within a sum the most balanced pair is tried first, each pair directly
/// followed by its swap
pub fn candidate_pairs(num_start: usize, num_dest: usize) -> Vec<(usize, usize)> {
    let mut pairs = Vec::<(usize, usize)>::with_capacity(num_start * num_dest);
    if num_start == 0 || num_dest == 0 {
        return pairs;
    }

    for sum in 0..(num_start + num_dest - 1) {
        for hi in sum.div_ceil(2)..=sum {
            let lo = sum - hi;
            if hi < num_start && lo < num_dest {
                pairs.push((hi, lo));
            }
            if hi != lo && lo < num_start && hi < num_dest {
                pairs.push((lo, hi));
            }
        }
    }

    pairs
}

/// Find a path between the two candidate lists. If none of the pairs are
/// connected under the profile, a second query on physical length decides
/// whether the profile is to blame
pub async fn solve<E: GraphEngine>(
    engine: &E,
    subgraph: &Subgraph,
    start: &[VertexCandidate],
    dest: &[VertexCandidate],
    token: &CancelToken,
) -> Result<SolvedPath> {
    let table = subgraph.table();

    for (start_inx, dest_inx) in candidate_pairs(start.len(), dest.len()) {
        token.check()?;

        let start_vertex = &start[start_inx];
        let dest_vertex = &dest[dest_inx];

        let steps = if start_vertex.vertex_id == dest_vertex.vertex_id {
            Vec::new()
        } else {
            let steps = engine
                .shortest_path(
                    table,
                    start_vertex.vertex_id,
                    dest_vertex.vertex_id,
                    CostMode::Weighted,
                )
                .await?;
            if steps.is_empty() {
                continue;
            }
            steps
        };

        log::info!(
            "Found path of {} edges between {} and {} (candidates {start_inx}/{dest_inx})",
            steps.len(),
            start_vertex.vertex_id,
            dest_vertex.vertex_id
        );
        return Ok(SolvedPath {
            steps: steps,
            start: start_vertex.clone(),
            dest: dest_vertex.clone(),
        });
    }

    let (first_start, first_dest) = match (start.first(), dest.first()) {
        (Some(first_start), Some(first_dest)) => (first_start, first_dest),
        _ => return Err(RouteError::NoRouteFound),
    };

    token.check()?;
    let physical = engine
        .shortest_path(
            table,
            first_start.vertex_id,
            first_dest.vertex_id,
            CostMode::Length,
        )
        .await?;

    if physical.is_empty() {
        Err(RouteError::NoRouteFound)
    } else {
        Err(RouteError::RouteExcludedByProfile)
    }
}
