//! Runs a complete route request: admission through the session registry,
//! then for each pair of consecutive request points a subgraph is opened,
//! both points are snapped onto it, a path is found and narrated, and the
//! subgraph is removed again. Sections are then joined into a single route.

use std::sync::Arc;

use crate::common::config::{RequestPoint, RouteRequest, RoutingProfile, ServerConfig};
use crate::common::error::{Result, RouteError};
use crate::common::geometry;
use crate::common::session::{CancelToken, SessionRegistry};
use crate::enrichment::SemanticEnrichment;
use crate::loading::engine::GraphEngine;
use crate::routing::narrator::{RouteBuilder, narrate};
use crate::routing::snapper::{explain_missing_vertices, nearest_vertices};
use crate::routing::solver::solve;
use crate::routing::structs::RouteResponse;
use crate::routing::structs::point::{PointKind, RoutePoint};
use crate::routing::subgraph::{Subgraph, close_subgraph, open_subgraph};

async fn route_on_subgraph<E: GraphEngine, S: SemanticEnrichment>(
    engine: &E,
    enrichment: &S,
    subgraph: &Subgraph,
    start: &RequestPoint,
    dest: &RequestPoint,
    token: &CancelToken,
) -> Result<RouteBuilder> {
    let start_candidates = nearest_vertices(engine, subgraph, start.position(), token).await?;
    if start_candidates.is_empty() {
        log::info!("No usable vertex near the start");
        return Err(explain_missing_vertices(engine, subgraph, start.position()).await?);
    }

    let dest_candidates = nearest_vertices(engine, subgraph, dest.position(), token).await?;
    if dest_candidates.is_empty() {
        log::info!("No usable vertex near the destination");
        return Err(explain_missing_vertices(engine, subgraph, dest.position()).await?);
    }

    let path = solve(engine, subgraph, &start_candidates, &dest_candidates, token).await?;

    narrate(
        engine,
        enrichment,
        subgraph,
        &path,
        RoutePoint::from_request(start, PointKind::Start),
        RoutePoint::from_request(dest, PointKind::Destination),
        token,
    )
    .await
}

/// Route between two consecutive request points. The subgraph is removed
/// whatever the outcome
pub async fn route_section<E: GraphEngine, S: SemanticEnrichment>(
    engine: &E,
    enrichment: &S,
    config: &ServerConfig,
    session_id: &str,
    generation: u64,
    profile: &RoutingProfile,
    start: &RequestPoint,
    dest: &RequestPoint,
    token: &CancelToken,
) -> Result<RouteBuilder> {
    let direct_distance = geometry::distance_between(start.position(), dest.position());
    if direct_distance > config.max_distance {
        return Err(RouteError::PointTooFarApart {
            distance: direct_distance,
            max: config.max_distance,
        });
    }

    let centre = geometry::centre_point(start.position(), dest.position());
    let radius = profile.search_radius(direct_distance);
    let subgraph =
        open_subgraph(engine, session_id, generation, profile, centre, radius, token).await?;

    let result = route_on_subgraph(engine, enrichment, &subgraph, start, dest, token).await;

    let table = subgraph.table().to_string();
    if let Err(err) = close_subgraph(engine, subgraph).await {
        log::warn!("Unable to remove {table}: {err}");
    }

    result
}

/// Calculate the route for a request. Only one computation may run per
/// session, a newer request for the same session cancels this one
pub async fn compute_route<E: GraphEngine, S: SemanticEnrichment>(
    registry: &Arc<SessionRegistry>,
    engine: &E,
    enrichment: &S,
    config: &ServerConfig,
    request: RouteRequest,
) -> Result<RouteResponse> {
    let guard = registry.admit(&request.session_id).await?;
    let token = guard.token();

    let mut builder = RouteBuilder::new();
    for pair in request.points.windows(2) {
        token.check()?;
        let section = route_section(
            engine,
            enrichment,
            config,
            guard.session_id(),
            guard.generation(),
            &request.profile,
            &pair[0],
            &pair[1],
            &token,
        )
        .await?;
        builder.join(section);
    }

    builder.fill_missing_turns();
    let route = builder.into_route()?;
    let summary = route.summary();

    log::info!(
        "Route for {} covers {}m with {} intersections",
        guard.session_id(),
        summary.distance,
        summary.intersections
    );

    Ok(RouteResponse {
        route: route,
        description: summary,
    })
}
