//! Turns the raw edges of a shortest path into an alternating list of route
//! points and segments. Points which add nothing to the description of a
//! route are dropped while it is being built, and the literal start and
//! destination are spliced onto either end once the path has been walked.

use geo::Point;

use crate::common::error::{Result, RouteError};
use crate::common::geometry;
use crate::common::graph_data::VertexCandidate;
use crate::common::session::CancelToken;
use crate::enrichment::SemanticEnrichment;
use crate::loading::engine::GraphEngine;
use crate::routing::solver::SolvedPath;
use crate::routing::structs::Route;
use crate::routing::structs::point::{PointKind, RoutePoint, WayCategory};
use crate::routing::structs::segment::RouteSegment;
use crate::routing::subgraph::Subgraph;

/// Legs shorter than this between two straight ones are a jog in the path
pub const ZIGZAG_LENGTH: u32 = 4;

/// Two crossings of the same tracks closer than this are merged
pub const DOUBLE_RAIL_LENGTH: u32 = 5;

/// Query points this close to the end of the route simply replace it
pub const SPLICE_DISTANCE: u32 = 5;

/// Snaps onto a way this close to the query point can be trusted
pub const NEAR_WAY_DISTANCE: f64 = 5.0;

/// Snaps onto a street this close to the query point can be trusted
pub const NEAR_STREET_DISTANCE: f64 = 15.0;

/// The most recent elements of a route which is being built
#[derive(Debug, Clone, Copy)]
pub struct Lookback<'a> {
    pub last_point: &'a RoutePoint,
    pub last_segment: &'a RouteSegment,
    pub prev_point: Option<&'a RoutePoint>,
    pub prev_segment: Option<&'a RouteSegment>,
}

/// Start, destination and via points are never removed
pub fn is_anchor(point: &RoutePoint) -> bool {
    matches!(
        point.kind,
        PointKind::Start | PointKind::Destination | PointKind::Via
    )
}

/// Whether a point carries enough information that it must stay in the
/// route. Intersections are important if they join more than one named major
/// street, if they join a single one which differs from the street the route
/// is arriving on, or if tracks cross there
pub fn is_important(point: &RoutePoint, arriving: Option<&RouteSegment>) -> bool {
    if is_anchor(point) {
        return true;
    }
    if !point.is_intersection() {
        return false;
    }
    if point.way_list.iter().any(|way| way.is_rail()) {
        return true;
    }

    let major: Vec<(&str, &WayCategory)> = point
        .way_list
        .iter()
        .filter(|way| way.category.is_major_street())
        .filter_map(|way| way.name.as_deref().map(|name| (name, &way.category)))
        .collect();

    let mut names: Vec<&str> = major.iter().map(|(name, _)| *name).collect();
    names.sort_unstable();
    names.dedup();

    match names.len() {
        0 => false,
        1 => arriving.is_some_and(|segment| {
            major.iter().all(|(_, category)| **category != segment.category)
        }),
        _ => true,
    }
}

/// The last point sits part way along a straight run of the same street
pub fn collapses_straight_through(window: &Lookback, next: &RouteSegment) -> bool {
    let turn = geometry::turn_between(next.bearing, window.last_segment.bearing);
    geometry::is_straight(turn)
        && window.last_segment.same_street(next)
        && !is_important(window.last_point, Some(window.last_segment))
}

/// The last two points form a short jog, after which the route carries on
/// in the same direction as before it
pub fn collapses_zigzag(window: &Lookback, next: &RouteSegment) -> bool {
    let (Some(prev_point), Some(prev_segment)) = (window.prev_point, window.prev_segment) else {
        return false;
    };

    let turn = geometry::turn_between(next.bearing, prev_segment.bearing);
    geometry::is_straight(turn)
        && window.last_segment.distance < ZIGZAG_LENGTH
        && !is_important(window.last_point, Some(window.last_segment))
        && !is_important(prev_point, Some(prev_segment))
}

/// The last two points cross the same pair of tracks
pub fn collapses_double_rail(window: &Lookback, next: &RouteSegment) -> bool {
    let (Some(prev_point), Some(prev_segment)) = (window.prev_point, window.prev_segment) else {
        return false;
    };

    let turn = geometry::turn_between(next.bearing, prev_segment.bearing);
    geometry::is_straight(turn)
        && window.last_segment.distance < DOUBLE_RAIL_LENGTH
        && window.last_point.is_rail_crossing()
        && prev_point.is_rail_crossing()
}

/// Copy of a segment template, running from one point to another
fn placed(from: &RoutePoint, to: &RoutePoint, template: &RouteSegment) -> RouteSegment {
    let mut segment = template.clone();
    segment.bearing = geometry::bearing_between(from.position(), to.position());
    segment.distance = geometry::distance_in_meters(from.position(), to.position());
    segment
}

/// Route under construction. There is always one segment fewer than there
/// are points, as long as there is at least one point
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RouteBuilder {
    points: Vec<RoutePoint>,
    segments: Vec<RouteSegment>,
}

impl RouteBuilder {
    pub fn new() -> Self {
        RouteBuilder::default()
    }

    pub fn points(&self) -> &[RoutePoint] {
        &self.points
    }

    pub fn segments(&self) -> &[RouteSegment] {
        &self.segments
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    fn lookback(&self) -> Option<Lookback<'_>> {
        let num_points = self.points.len();
        if num_points < 2 {
            return None;
        }

        let (prev_point, prev_segment) = if num_points >= 3 {
            (
                Some(&self.points[num_points - 2]),
                Some(&self.segments[num_points - 3]),
            )
        } else {
            (None, None)
        };

        Some(Lookback {
            last_point: &self.points[num_points - 1],
            last_segment: &self.segments[num_points - 2],
            prev_point: prev_point,
            prev_segment: prev_segment,
        })
    }

    fn pop_pair(&mut self) {
        if self.points.len() > 1 {
            self.points.pop();
            self.segments.pop();
        }
    }

    fn place_next(&self, point: &RoutePoint, template: &RouteSegment) -> RouteSegment {
        match self.points.last() {
            Some(last) => placed(last, point, template),
            None => template.clone(),
        }
    }

    /// Add a point to the end of the route, joined to it by a copy of the
    /// template segment. Before it is added, points which no longer carry any
    /// information are removed from the end of the route
    pub fn push(&mut self, point: RoutePoint, template: RouteSegment) {
        if self.points.is_empty() {
            self.points.push(point);
            return;
        }

        let mut next = self.place_next(&point, &template);

        if next.distance == 0 && point.is_intersection() {
            if let Some(last) = self.points.last_mut() {
                if !is_anchor(last) {
                    *last = point;
                    return;
                }
            }
        }

        if self
            .lookback()
            .is_some_and(|window| collapses_straight_through(&window, &next))
        {
            self.pop_pair();
            next = self.place_next(&point, &template);
        }

        if self
            .lookback()
            .is_some_and(|window| collapses_zigzag(&window, &next))
        {
            self.pop_pair();
            self.pop_pair();
            next = self.place_next(&point, &template);
        }

        if self
            .lookback()
            .is_some_and(|window| collapses_double_rail(&window, &next))
        {
            self.pop_pair();
            next = self.place_next(&point, &template);
        }

        if let (Some(last), Some(arriving)) = (self.points.last_mut(), self.segments.last()) {
            last.turn = Some(geometry::turn_between(next.bearing, arriving.bearing));
        }

        self.segments.push(next);
        self.points.push(point);
    }

    /// Append the next section of a route with via points. Its first point
    /// is the same request point as the last point of this one, so it is
    /// dropped and the remaining copy becomes a via point
    pub fn join(&mut self, other: RouteBuilder) {
        if other.points.is_empty() {
            return;
        }
        if self.points.is_empty() {
            *self = other;
            return;
        }

        if other.points.len() > 1 {
            if let Some(via) = self.points.last_mut() {
                via.kind = PointKind::Via;
                via.turn = None;
            }
        }

        self.points.extend(other.points.into_iter().skip(1));
        self.segments.extend(other.segments);
    }

    /// Work out the turn for interior points which don't have one yet
    pub fn fill_missing_turns(&mut self) {
        let num_points = self.points.len();
        for inx in 1..num_points.saturating_sub(1) {
            let point = &mut self.points[inx];
            if point.turn.is_none() {
                point.turn = Some(geometry::turn_between(
                    self.segments[inx].bearing,
                    self.segments[inx - 1].bearing,
                ));
            }
        }
    }

    /// Flag the ways at each intersection which the route arrives & leaves
    /// along
    pub fn annotate_intersections(&mut self) {
        for (inx, point) in self.points.iter_mut().enumerate() {
            if !point.is_intersection() {
                continue;
            }
            let previous = inx
                .checked_sub(1)
                .and_then(|prev| self.segments.get(prev))
                .map(|segment| segment.bearing);
            let next = self.segments.get(inx).map(|segment| segment.bearing);
            annotate_ways(point, previous, next);
        }
    }

    pub fn into_route(self) -> Result<Route> {
        Route::from_parts(self.points, self.segments)
    }
}

/// The way leaving an intersection closest to the provided bearing, ways
/// pointing the opposite direction never match
fn closest_way(point: &RoutePoint, bearing: u16) -> Option<usize> {
    let mut best = None;
    let mut best_diff = 180;
    for (inx, way) in point.way_list.iter().enumerate() {
        let diff = geometry::bearing_difference(bearing, way.bearing);
        if diff < best_diff {
            best_diff = diff;
            best = Some(inx);
        }
    }
    best
}

/// Flag the ways of an intersection which match the bearing of the previous
/// and next segments of the route
pub fn annotate_ways(point: &mut RoutePoint, previous: Option<u16>, next: Option<u16>) {
    let previous_way =
        previous.and_then(|bearing| closest_way(point, geometry::reverse_bearing(bearing)));
    let next_way = next.and_then(|bearing| closest_way(point, bearing));

    for (inx, way) in point.way_list.iter_mut().enumerate() {
        way.part_of_previous_route_segment = previous_way == Some(inx);
        way.part_of_next_route_segment = next_way == Some(inx);
    }
}

/// How a literal query point is attached to the end of a narrated route
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Splice {
    /// Close enough to take the place of the route's endpoint
    Replace,
    /// Lies along the first/last segment, which is shortened
    FoldBack,
    /// Lies straight beyond the endpoint, the segment is lengthened
    Extend,
    /// Joined by a leg following the way it was snapped onto
    NewLeg,
    /// Joined by an unlabeled leg
    Synthetic,
}

/// Whether the query point lies close enough to the way it was snapped
/// through for a leg to be named after that way
fn is_near_way(candidate: &VertexCandidate) -> bool {
    candidate.way_distance <= NEAR_WAY_DISTANCE
        || (candidate.way_class.is_street() && candidate.way_distance <= NEAR_STREET_DISTANCE)
}

/// Decide how to attach a query point distance metres away from the end of
/// the route. Turn is the angle between the route's adjoining segment and
/// the direction of the query point, if the route has a segment
pub fn splice_decision(
    distance: u32,
    turn: Option<u16>,
    endpoint_important: bool,
    candidate: &VertexCandidate,
) -> Splice {
    if distance <= SPLICE_DISTANCE {
        return Splice::Replace;
    }
    if !is_near_way(candidate) {
        return Splice::Synthetic;
    }

    match turn {
        Some(turn) if geometry::is_turn_around(turn) => Splice::FoldBack,
        Some(turn) if geometry::is_straight(turn) && !endpoint_important => Splice::Extend,
        _ => Splice::NewLeg,
    }
}

async fn candidate_segment<S: SemanticEnrichment>(
    enrichment: &S,
    candidate: &VertexCandidate,
) -> Result<RouteSegment> {
    let mut segment = enrichment.resolve_segment(candidate.way_id, false).await?;
    segment.way_class = Some(candidate.way_class);
    Ok(segment)
}

async fn splice_start<S: SemanticEnrichment>(
    builder: &mut RouteBuilder,
    enrichment: &S,
    literal: RoutePoint,
    candidate: &VertexCandidate,
) -> Result<()> {
    let Some(first) = builder.points.first() else {
        builder.points.push(literal);
        return Ok(());
    };

    let distance = geometry::distance_in_meters(literal.position(), first.position());
    let bearing = geometry::bearing_between(literal.position(), first.position());
    let turn = builder
        .segments
        .first()
        .map(|segment| geometry::turn_between(segment.bearing, bearing));
    let decision = splice_decision(distance, turn, is_important(first, None), candidate);
    log::debug!("Start is {distance}m from the route, turn {turn:?}: {decision:?}");

    match decision {
        Splice::Replace => builder.points[0] = literal,
        Splice::FoldBack => {
            if let Some(segment) = builder.segments.first_mut() {
                segment.distance = segment.distance.saturating_sub(distance);
            }
            builder.points[0] = literal;
        }
        Splice::Extend => {
            if let Some(segment) = builder.segments.first_mut() {
                segment.distance += distance;
            }
            builder.points[0] = literal;
        }
        Splice::NewLeg | Splice::Synthetic => {
            let mut segment = if decision == Splice::NewLeg {
                candidate_segment(enrichment, candidate).await?
            } else {
                RouteSegment::synthetic("first segment")
            };
            segment.bearing = bearing;
            segment.distance = distance;

            builder.points[0].turn = turn;
            builder.points.insert(0, literal);
            builder.segments.insert(0, segment);
        }
    }

    Ok(())
}

async fn splice_dest<S: SemanticEnrichment>(
    builder: &mut RouteBuilder,
    enrichment: &S,
    literal: RoutePoint,
    candidate: &VertexCandidate,
) -> Result<()> {
    let Some(last) = builder.points.last() else {
        builder.points.push(literal);
        return Ok(());
    };

    let distance = geometry::distance_in_meters(last.position(), literal.position());
    let bearing = geometry::bearing_between(last.position(), literal.position());
    let arriving = builder.segments.last();
    let turn = arriving.map(|segment| geometry::turn_between(bearing, segment.bearing));
    let decision = splice_decision(distance, turn, is_important(last, arriving), candidate);
    log::debug!("Destination is {distance}m from the route, turn {turn:?}: {decision:?}");

    match decision {
        Splice::Replace => {
            if let Some(last) = builder.points.last_mut() {
                *last = literal;
            }
        }
        Splice::FoldBack => {
            if let Some(segment) = builder.segments.last_mut() {
                segment.distance = segment.distance.saturating_sub(distance);
            }
            if let Some(last) = builder.points.last_mut() {
                *last = literal;
            }
        }
        Splice::Extend => {
            if let Some(segment) = builder.segments.last_mut() {
                segment.distance += distance;
            }
            if let Some(last) = builder.points.last_mut() {
                *last = literal;
            }
        }
        Splice::NewLeg => {
            let segment = candidate_segment(enrichment, candidate).await?;
            builder.push(literal, segment);
        }
        Splice::Synthetic => builder.push(literal, RouteSegment::synthetic("last segment")),
    }

    Ok(())
}

/// Route straight from start to destination, used when the path between
/// them is empty. The leg follows the way both points were snapped through
/// if they lie along the same one
async fn direct_connection<S: SemanticEnrichment>(
    enrichment: &S,
    start: RoutePoint,
    dest: RoutePoint,
    path: &SolvedPath,
) -> Result<RouteBuilder> {
    let mut builder = RouteBuilder::new();
    let distance = geometry::distance_in_meters(start.position(), dest.position());

    builder.points.push(start);
    if distance > 0 {
        let same_way = path.start.way_id == path.dest.way_id
            && is_near_way(&path.start)
            && is_near_way(&path.dest);
        let segment = if same_way {
            candidate_segment(enrichment, &path.start).await?
        } else {
            RouteSegment::synthetic("direct connection")
        };
        builder.push(dest, segment);
    }
    Ok(builder)
}

/// Positions along a polyline at which its direction changes noticeably.
/// Each bend is measured against the direction of the last accepted one, so
/// gradual curves still produce points
pub fn shape_points(coords: &[Point]) -> Vec<Point> {
    if coords.len() < 3 {
        return Vec::new();
    }

    let mut accepted = Vec::<Point>::new();
    let mut last_bearing = geometry::bearing_between(coords[0], coords[1]);
    for pair in coords[1..].windows(2) {
        let bearing = geometry::bearing_between(pair[0], pair[1]);
        if !geometry::is_straight(geometry::turn_between(bearing, last_bearing)) {
            last_bearing = bearing;
            accepted.push(pair[0]);
        }
    }
    accepted
}

async fn resolve_point<S: SemanticEnrichment>(enrichment: &S, node_id: i64) -> Result<RoutePoint> {
    match enrichment.resolve_intersection(node_id).await? {
        Some(intersection) => Ok(intersection),
        None => enrichment.resolve_waypoint(node_id).await,
    }
}

/// Walk the edges of a path in order, building up the route between the
/// two snapped vertices
pub async fn walk_path<E: GraphEngine, S: SemanticEnrichment>(
    engine: &E,
    enrichment: &S,
    subgraph: &Subgraph,
    path: &SolvedPath,
    token: &CancelToken,
) -> Result<RouteBuilder> {
    let edge_ids: Vec<i64> = path.steps.iter().map(|step| step.edge_id).collect();
    let edges = engine.edges(subgraph.table(), &edge_ids).await?;
    token.check()?;

    let mut builder = RouteBuilder::new();
    let mut last_vertex = path.start.vertex_id;

    for edge in edges.iter() {
        let reversed = if edge.source == last_vertex {
            false
        } else if edge.target == last_vertex {
            true
        } else {
            return Err(RouteError::Internal(format!(
                "Edge {} doesn't continue from vertex {last_vertex}",
                edge.id
            )));
        };

        if builder.is_empty() {
            let first_node = if reversed { edge.target_node } else { edge.source_node };
            builder.points.push(resolve_point(enrichment, first_node).await?);
        }

        let (next_vertex, next_node) = if reversed {
            (edge.source, edge.source_node)
        } else {
            (edge.target, edge.target_node)
        };

        let mut template = enrichment.resolve_segment(edge.way_id, reversed).await?;
        template.way_class = Some(edge.way_class);

        for shape in shape_points(&edge.walked_coords(reversed)) {
            builder.push(RoutePoint::shape_point(shape), template.clone());
        }
        builder.push(resolve_point(enrichment, next_node).await?, template);

        last_vertex = next_vertex;
        token.check()?;
    }

    if last_vertex != path.dest.vertex_id {
        return Err(RouteError::Internal(format!(
            "Path ends at vertex {last_vertex} instead of {}",
            path.dest.vertex_id
        )));
    }

    Ok(builder)
}

/// Build the route for a single section, from the literal start point to
/// the literal destination point
pub async fn narrate<E: GraphEngine, S: SemanticEnrichment>(
    engine: &E,
    enrichment: &S,
    subgraph: &Subgraph,
    path: &SolvedPath,
    start: RoutePoint,
    dest: RoutePoint,
    token: &CancelToken,
) -> Result<RouteBuilder> {
    if path.steps.is_empty() {
        return direct_connection(enrichment, start, dest, path).await;
    }

    let mut builder = walk_path(engine, enrichment, subgraph, path, token).await?;
    if builder.points.len() < 2 {
        log::debug!("Path collapsed onto a single point");
        return direct_connection(enrichment, start, dest, path).await;
    }

    splice_start(&mut builder, enrichment, start, &path.start).await?;
    splice_dest(&mut builder, enrichment, dest, &path.dest).await?;
    builder.annotate_intersections();

    log::info!(
        "Narrated {} edges into {} points",
        path.steps.len(),
        builder.points.len()
    );
    Ok(builder)
}

#[cfg(test)]
mod tests {

    use super::*;
    use crate::common::config::{RoutingProfile, WayClass};
    use crate::common::graph_data::PathStep;
    use crate::common::graph_data::tests::make_edge;
    use crate::enrichment::memory::MemoryEnrichment;
    use crate::enrichment::tags::Tags;
    use crate::enrichment::tags::tests::make_tags;
    use crate::loading::petgraph::MemoryGraphEngine;
    use crate::routing::structs::point::IntersectionWay;
    use crate::routing::subgraph::open_subgraph;

    fn residential() -> WayCategory {
        WayCategory::Highway("residential".to_string())
    }

    fn footway() -> WayCategory {
        WayCategory::Highway("footway".to_string())
    }

    fn waypoint(lat: f64, lon: f64) -> RoutePoint {
        RoutePoint::new(PointKind::Waypoint, "way point", "way point", lat, lon)
    }

    fn intersection(lat: f64, lon: f64, ways: &[(&str, WayCategory, u16)]) -> RoutePoint {
        let mut point = RoutePoint::new(PointKind::Intersection, "", "crossing", lat, lon);
        point.way_list = ways
            .iter()
            .enumerate()
            .map(|(inx, (name, category, bearing))| IntersectionWay {
                way_id: inx as i64,
                name: Some(name.to_string()),
                category: category.clone(),
                tram: false,
                bearing: *bearing,
                next_node_id: 0,
                part_of_previous_route_segment: false,
                part_of_next_route_segment: false,
            })
            .collect();
        point
    }

    fn street(name: &str) -> RouteSegment {
        RouteSegment::new(name, residential())
    }

    fn candidate(way_distance: f64, way_class: WayClass) -> VertexCandidate {
        VertexCandidate {
            vertex_id: 1,
            distance: way_distance,
            way_distance: way_distance,
            way_id: 1,
            way_class: way_class,
            way_name: None,
        }
    }

    /// Push every point of a finished route through a fresh builder
    fn renarrate(builder: &RouteBuilder) -> RouteBuilder {
        let mut result = RouteBuilder::new();
        for (inx, point) in builder.points().iter().enumerate() {
            let template = match inx {
                0 => RouteSegment::synthetic(""),
                _ => builder.segments()[inx - 1].clone(),
            };
            result.push(point.clone(), template);
        }
        result
    }

    /// Crossings of two named major streets are always important, a single
    /// major street only matters when arriving from something else
    #[test]
    fn test_is_important() {
        let crossing = intersection(
            52.0,
            13.0,
            &[
                ("Main Street", residential(), 0),
                ("Main Street", residential(), 180),
                ("High Street", residential(), 90),
                ("High Street", residential(), 270),
            ],
        );
        let junction = intersection(
            52.0,
            13.0,
            &[
                ("Main Street", residential(), 0),
                ("Main Street", residential(), 180),
                ("Park Walk", footway(), 90),
            ],
        );
        let paths = intersection(52.0, 13.0, &[("Park Walk", footway(), 0)]);

        assert!(is_important(&crossing, None));
        assert!(is_important(&junction, Some(&RouteSegment::new("Park Walk", footway()))));
        assert!(!is_important(&junction, Some(&street("Main Street"))));
        assert!(!is_important(&junction, None));
        assert!(!is_important(&paths, Some(&street("Main Street"))));
        assert!(!is_important(&waypoint(52.0, 13.0), None));
    }

    /// Tracks make a crossing important, as does being a request point
    #[test]
    fn test_is_important_rail_and_anchor() {
        let mut tram_crossing = intersection(52.0, 13.0, &[("Main Street", residential(), 0)]);
        tram_crossing.way_list[0].tram = true;

        let mut start = waypoint(52.0, 13.0);
        start.kind = PointKind::Start;

        assert!(is_important(&tram_crossing, Some(&street("Main Street"))));
        assert!(is_important(&start, None));
    }

    /// Points along a straight run of one street are dropped
    #[test]
    fn test_push_straight_through() {
        let mut builder = RouteBuilder::new();
        builder.push(waypoint(52.0, 13.0), street("Main Street"));
        builder.push(waypoint(52.0, 13.001), street("Main Street"));
        builder.push(waypoint(52.0, 13.002), street("Main Street"));

        assert_eq!(builder.points().len(), 2);
        assert_eq!(builder.segments().len(), 1);
        assert_eq!(builder.segments()[0].distance, 136);
        assert_eq!(builder.points()[1].lon, 13.002);
    }

    /// A change of street keeps the point, along with its turn
    #[test]
    fn test_push_keeps_street_change() {
        let mut builder = RouteBuilder::new();
        builder.push(waypoint(52.0, 13.0), street("Main Street"));
        builder.push(waypoint(52.0, 13.001), street("Main Street"));
        builder.push(waypoint(52.001, 13.001), street("High Street"));

        assert_eq!(builder.points().len(), 3);
        assert_eq!(builder.points()[0].turn, None);
        assert_eq!(builder.points()[1].turn, Some(271));
        assert_eq!(builder.points()[2].turn, None);
    }

    /// A crossing of two named streets survives even when the route goes
    /// straight through it
    #[test]
    fn test_push_keeps_important_crossing() {
        let crossing = intersection(
            52.0,
            13.001,
            &[
                ("Main Street", residential(), 90),
                ("Main Street", residential(), 270),
                ("High Street", residential(), 0),
                ("High Street", residential(), 180),
            ],
        );

        let mut builder = RouteBuilder::new();
        builder.push(waypoint(52.0, 13.0), street("Main Street"));
        builder.push(crossing, street("Main Street"));
        builder.push(waypoint(52.0, 13.002), street("Main Street"));

        assert_eq!(builder.points().len(), 3);
        assert!(builder.points()[1].is_intersection());
        assert!(geometry::is_straight(builder.points()[1].turn.unwrap()));
    }

    /// A short back and forth jog between unimportant points collapses into
    /// a single straight segment
    #[test]
    fn test_push_zigzag() {
        let minor = |lat, lon| intersection(lat, lon, &[("Main Street", residential(), 90)]);

        let mut builder = RouteBuilder::new();
        builder.push(waypoint(52.0, 12.999), street("Main Street"));
        builder.push(minor(52.0, 13.0), street("Main Street"));
        builder.push(waypoint(52.0, 13.0005), street("Main Street"));
        builder.push(waypoint(52.00003, 13.0005), street("Main Street"));
        builder.push(minor(52.00003, 13.001), street("Main Street"));

        assert_eq!(builder.points().len(), 2);
        assert_eq!(builder.segments().len(), 1);
        assert_eq!(builder.points()[1].lat, 52.00003);
        assert!(geometry::is_straight(geometry::turn_between(
            builder.segments()[0].bearing,
            90
        )));
    }

    /// Of two crossings of the same tracks, the first one is kept
    #[test]
    fn test_push_double_rail() {
        let tracks = |lat, lon| {
            let mut point = intersection(
                lat,
                lon,
                &[("Tramway", WayCategory::Railway("tram".to_string()), 0)],
            );
            point.name = "Tramway".to_string();
            point
        };

        let mut builder = RouteBuilder::new();
        builder.push(waypoint(52.0, 12.999), street("Main Street"));
        builder.push(tracks(52.0, 13.0), street("Main Street"));
        builder.push(tracks(52.0, 13.00005), street("Main Street"));
        builder.push(waypoint(52.0, 13.001), street("Main Street"));

        let lons: Vec<f64> = builder.points().iter().map(|p| p.lon).collect();
        assert_eq!(lons, vec![12.999, 13.0, 13.001]);
    }

    /// An intersection at the position of the last point replaces it
    #[test]
    fn test_push_zero_length_intersection() {
        let mut builder = RouteBuilder::new();
        builder.push(waypoint(52.0, 13.0), street("Main Street"));
        builder.push(
            intersection(52.0, 13.0, &[("Main Street", residential(), 0)]),
            street("Main Street"),
        );

        assert_eq!(builder.points().len(), 1);
        assert!(builder.points()[0].is_intersection());
    }

    /// Running a finished route through the builder again removes nothing
    #[test]
    fn test_push_idempotent() {
        let mut builder = RouteBuilder::new();
        builder.push(waypoint(52.0, 13.0), street("Main Street"));
        builder.push(waypoint(52.0, 13.001), street("Main Street"));
        builder.push(waypoint(52.001, 13.001), street("High Street"));
        builder.push(waypoint(52.001, 13.002), RouteSegment::new("Park Walk", footway()));
        builder.push(waypoint(52.00103, 13.0025), RouteSegment::new("Park Walk", footway()));

        let result = renarrate(&builder);

        assert_eq!(result.points().len(), builder.points().len());
        assert_eq!(result.segments(), builder.segments());
    }

    /// Splicing depends on distance, turn and how close the snapped way is
    #[test]
    fn test_splice_decision() {
        let near = candidate(2.0, WayClass::PavedWays);
        let near_street = candidate(10.0, WayClass::SmallStreets);
        let near_path = candidate(10.0, WayClass::PavedWays);
        let far = candidate(30.0, WayClass::BigStreets);

        assert_eq!(splice_decision(3, Some(90), false, &far), Splice::Replace);
        assert_eq!(splice_decision(20, Some(180), false, &near), Splice::FoldBack);
        assert_eq!(splice_decision(20, Some(5), false, &near), Splice::Extend);
        assert_eq!(splice_decision(20, Some(5), true, &near), Splice::NewLeg);
        assert_eq!(splice_decision(20, Some(90), false, &near_street), Splice::NewLeg);
        assert_eq!(splice_decision(20, None, false, &near), Splice::NewLeg);
        assert_eq!(splice_decision(20, Some(5), false, &near_path), Splice::Synthetic);
        assert_eq!(splice_decision(20, Some(5), false, &far), Splice::Synthetic);
    }

    /// Ways are matched against the reversed incoming and the outgoing
    /// bearing
    #[test]
    fn test_annotate_ways() {
        let mut point = intersection(
            52.0,
            13.0,
            &[
                ("North", residential(), 0),
                ("East", residential(), 90),
                ("South", residential(), 180),
                ("West", residential(), 270),
            ],
        );

        annotate_ways(&mut point, Some(88), Some(3));

        let previous: Vec<bool> = point
            .way_list
            .iter()
            .map(|way| way.part_of_previous_route_segment)
            .collect();
        let next: Vec<bool> = point
            .way_list
            .iter()
            .map(|way| way.part_of_next_route_segment)
            .collect();
        assert_eq!(previous, vec![false, false, false, true]);
        assert_eq!(next, vec![true, false, false, false]);
    }

    /// Via points are kept once, interior turns are filled in
    #[test]
    fn test_join_and_fill_turns() {
        let mut via = waypoint(52.0, 13.001);
        via.kind = PointKind::Destination;
        let mut first = RouteBuilder::new();
        first.push(waypoint(52.0, 13.0), street("Main Street"));
        first.push(via.clone(), street("Main Street"));

        via.kind = PointKind::Start;
        let mut second = RouteBuilder::new();
        second.push(via, street("High Street"));
        second.push(waypoint(52.001, 13.001), street("High Street"));

        first.join(second);
        first.fill_missing_turns();

        assert_eq!(first.points().len(), 3);
        assert_eq!(first.segments().len(), 2);
        assert_eq!(first.points()[1].kind, PointKind::Via);
        assert_eq!(first.points()[1].turn, Some(271));
        assert_eq!(first.points()[2].turn, None);
    }

    /// Curved edges produce points at their bends, in walking order
    #[tokio::test]
    async fn test_walk_path_shape_points() {
        let mut edge = make_edge(
            1,
            (1, 101, 52.0, 13.0),
            (2, 102, 52.001, 13.001),
            1000,
            WayClass::PavedWays,
        );
        edge.lats = vec![52.0, 52.0, 52.001];
        edge.lons = vec![13.0, 13.001, 13.001];
        let engine = MemoryGraphEngine::new(vec![edge]);

        let mut enrichment = MemoryEnrichment::new();
        enrichment.add_node(101, 52.0, 13.0, Tags::default());
        enrichment.add_node(102, 52.001, 13.001, Tags::default());

        let subgraph = open_subgraph(
            &engine,
            "abc",
            0,
            &RoutingProfile::default(),
            geometry::point(52.0, 13.0),
            750.0,
            &CancelToken::detached(),
        )
        .await
        .unwrap();

        let path = SolvedPath {
            steps: vec![PathStep {
                edge_id: 1,
                agg_cost: 0.0,
            }],
            start: VertexCandidate {
                vertex_id: 2,
                ..candidate(1.0, WayClass::PavedWays)
            },
            dest: candidate(1.0, WayClass::PavedWays),
        };

        let result = walk_path(&engine, &enrichment, &subgraph, &path, &CancelToken::detached())
            .await
            .unwrap();

        let nodes: Vec<Option<i64>> = result.points().iter().map(|p| p.node_id).collect();
        assert_eq!(nodes, vec![Some(102), None, Some(101)]);
        assert_eq!(result.points()[1].lat, 52.0);
        assert_eq!(result.points()[1].lon, 13.001);
        assert_eq!(result.segments()[0].way_class, Some(WayClass::PavedWays));
    }

    fn anchor(kind: PointKind, lat: f64, lon: f64) -> RoutePoint {
        RoutePoint::new(kind, "", "street address", lat, lon)
    }

    /// Main Street, running 68m east from 52.0/13.001 to 52.0/13.002
    fn get_main_street() -> RouteBuilder {
        let mut builder = RouteBuilder::new();
        builder.push(waypoint(52.0, 13.001), street("Main Street"));
        builder.push(waypoint(52.0, 13.002), street("Main Street"));
        builder
    }

    /// Way 1 is the footway which query points get snapped through
    fn get_park_walk() -> MemoryEnrichment {
        let mut enrichment = MemoryEnrichment::new();
        enrichment.add_way(
            1,
            make_tags(&[("highway", "footway"), ("name", "Park Walk")]),
        );
        enrichment
    }

    /// A start behind the first point along the route shortens the first
    /// segment
    #[tokio::test]
    async fn test_splice_start_fold_back() {
        let mut builder = get_main_street();
        let start = anchor(PointKind::Start, 52.0, 13.0014);

        splice_start(&mut builder, &get_park_walk(), start, &candidate(1.0, WayClass::PavedWays))
            .await
            .unwrap();

        assert_eq!(builder.points().len(), 2);
        assert_eq!(builder.points()[0].kind, PointKind::Start);
        assert_eq!(builder.points()[0].lon, 13.0014);
        assert_eq!(builder.segments()[0].distance, 68 - 27);
    }

    /// A start straight ahead of the route lengthens the first segment
    #[tokio::test]
    async fn test_splice_start_extend() {
        let mut builder = get_main_street();
        let start = anchor(PointKind::Start, 52.0, 13.0006);

        splice_start(&mut builder, &get_park_walk(), start, &candidate(1.0, WayClass::PavedWays))
            .await
            .unwrap();

        assert_eq!(builder.points().len(), 2);
        assert_eq!(builder.points()[0].kind, PointKind::Start);
        assert_eq!(builder.segments()[0].distance, 68 + 27);
        assert_eq!(builder.segments()[0].name, "Main Street");
    }

    /// A start off to the side gets a leg along the way it was snapped
    /// through, and the old first point records the turn onto the route
    #[tokio::test]
    async fn test_splice_start_new_leg() {
        let mut builder = get_main_street();
        let start = anchor(PointKind::Start, 52.0004, 13.001);

        splice_start(&mut builder, &get_park_walk(), start, &candidate(1.0, WayClass::PavedWays))
            .await
            .unwrap();

        assert_eq!(builder.points().len(), 3);
        assert_eq!(builder.segments().len(), 2);
        assert_eq!(builder.points()[0].kind, PointKind::Start);
        assert_eq!(builder.points()[0].turn, None);
        assert_eq!(builder.points()[1].turn, Some(269));

        let leg = &builder.segments()[0];
        assert_eq!(leg.name, "Park Walk");
        assert_eq!(leg.way_class, Some(WayClass::PavedWays));
        assert_eq!(leg.bearing, 180);
        assert_eq!(leg.distance, 44);
    }

    /// A start far from any way gets an unlabeled leg
    #[tokio::test]
    async fn test_splice_start_synthetic() {
        let mut builder = get_main_street();
        let start = anchor(PointKind::Start, 52.0004, 13.001);

        splice_start(&mut builder, &get_park_walk(), start, &candidate(30.0, WayClass::BigStreets))
            .await
            .unwrap();

        assert_eq!(builder.points().len(), 3);
        assert_eq!(builder.segments()[0].name, "first segment");
        assert_eq!(builder.segments()[0].category, WayCategory::Unlabeled);
        assert_eq!(builder.segments()[0].way_class, None);
        assert_eq!(builder.points()[1].turn, Some(269));
    }

    /// Destinations behind or beyond the last point shorten or lengthen the
    /// last segment, close ones simply take its place
    #[tokio::test]
    async fn test_splice_dest_along_route() {
        let enrichment = get_park_walk();
        let near = candidate(1.0, WayClass::PavedWays);

        let mut folded = get_main_street();
        let dest = anchor(PointKind::Destination, 52.0, 13.0016);
        splice_dest(&mut folded, &enrichment, dest, &near).await.unwrap();

        let mut extended = get_main_street();
        let dest = anchor(PointKind::Destination, 52.0, 13.0024);
        splice_dest(&mut extended, &enrichment, dest, &near).await.unwrap();

        let mut replaced = get_main_street();
        let dest = anchor(PointKind::Destination, 52.0, 13.00203);
        splice_dest(&mut replaced, &enrichment, dest, &near).await.unwrap();

        assert_eq!(folded.segments()[0].distance, 68 - 27);
        assert_eq!(extended.segments()[0].distance, 68 + 27);
        assert_eq!(replaced.segments()[0].distance, 68);
        for builder in [&folded, &extended, &replaced] {
            assert_eq!(builder.points().len(), 2);
            assert_eq!(builder.points()[1].kind, PointKind::Destination);
        }
        assert_eq!(folded.points()[1].lon, 13.0016);
        assert_eq!(extended.points()[1].lon, 13.0024);
    }

    /// A destination off to the side is appended with a leg of its own
    #[tokio::test]
    async fn test_splice_dest_new_leg_and_synthetic() {
        let enrichment = get_park_walk();

        let mut new_leg = get_main_street();
        let dest = anchor(PointKind::Destination, 52.0004, 13.002);
        splice_dest(&mut new_leg, &enrichment, dest, &candidate(1.0, WayClass::PavedWays))
            .await
            .unwrap();

        let mut synthetic = get_main_street();
        let dest = anchor(PointKind::Destination, 52.0004, 13.002);
        splice_dest(&mut synthetic, &enrichment, dest, &candidate(30.0, WayClass::PavedWays))
            .await
            .unwrap();

        assert_eq!(new_leg.points().len(), 3);
        assert_eq!(new_leg.points()[1].turn, Some(271));
        assert_eq!(new_leg.points()[2].kind, PointKind::Destination);
        assert_eq!(new_leg.segments()[1].name, "Park Walk");
        assert_eq!(new_leg.segments()[1].bearing, 0);
        assert_eq!(new_leg.segments()[1].distance, 44);

        assert_eq!(synthetic.points().len(), 3);
        assert_eq!(synthetic.segments()[1].name, "last segment");
        assert_eq!(synthetic.segments()[1].category, WayCategory::Unlabeled);
    }

    /// A destination leg is added like any other point, so it can remove a
    /// short jog at the end of the narrated route
    #[tokio::test]
    async fn test_splice_dest_new_leg_collapses_jog() {
        let mut builder = RouteBuilder::new();
        builder.push(waypoint(52.0, 13.0), street("Main Street"));
        builder.push(waypoint(52.0, 13.001), street("Main Street"));
        builder.push(waypoint(52.00003, 13.001), street("Main Street"));
        assert_eq!(builder.points().len(), 3);

        let dest = anchor(PointKind::Destination, 52.00003, 13.0015);
        splice_dest(&mut builder, &get_park_walk(), dest, &candidate(1.0, WayClass::PavedWays))
            .await
            .unwrap();

        assert_eq!(builder.points().len(), 2);
        assert_eq!(builder.segments().len(), 1);
        assert_eq!(builder.points()[0].lon, 13.0);
        assert_eq!(builder.points()[1].kind, PointKind::Destination);
        assert_eq!(builder.segments()[0].name, "Park Walk");
        assert!(builder.segments()[0].distance > 100);
    }

    /// Points snapped onto the same vertex along one way are joined by a leg
    /// named after that way, anything else by an unlabeled one
    #[tokio::test]
    async fn test_direct_connection() {
        let enrichment = get_park_walk();
        let start = anchor(PointKind::Start, 52.0, 13.0004);
        let dest = anchor(PointKind::Destination, 52.0, 13.0008);
        let path = |dest_candidate: VertexCandidate| SolvedPath {
            steps: Vec::new(),
            start: candidate(1.0, WayClass::PavedWays),
            dest: dest_candidate,
        };

        let same_way = path(candidate(2.0, WayClass::PavedWays));
        let named = direct_connection(&enrichment, start.clone(), dest.clone(), &same_way)
            .await
            .unwrap();

        let other_way = path(VertexCandidate {
            way_id: 2,
            ..candidate(2.0, WayClass::PavedWays)
        });
        let unlabeled = direct_connection(&enrichment, start.clone(), dest.clone(), &other_way)
            .await
            .unwrap();

        let coincident = direct_connection(&enrichment, start.clone(), start, &same_way)
            .await
            .unwrap();

        assert_eq!(named.points().len(), 2);
        assert_eq!(named.segments()[0].name, "Park Walk");
        assert_eq!(named.segments()[0].distance, 27);
        assert_eq!(unlabeled.segments()[0].name, "direct connection");
        assert_eq!(coincident.points().len(), 1);
        assert!(coincident.segments().is_empty());
    }
}
