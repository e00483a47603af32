//! Containers for the street graph data which is passed between the graph
//! engine and the routing components. Vertex ids are internal to the routing
//! table, node & way ids are the ones used in the OSM data.

use geo::Point;

use crate::common::config::WayClass;
use crate::common::geometry;

/// Which cost column a query against the subgraph should use
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CostMode {
    /// Profile weighted cost, only edges with a positive cost can be used
    Weighted,
    /// Physical length, ignoring the profile. Only impassable way classes are
    /// left out
    Length,
}

/// A single edge of the routing graph, along with the geometry of the way
/// section it represents
#[derive(Debug, Clone, PartialEq)]
pub struct GraphEdge {
    pub id: i64,
    pub source: i64,
    pub target: i64,
    /// Length in metres
    pub length: f64,
    pub way_class: WayClass,
    pub way_id: i64,
    pub way_name: Option<String>,
    pub source_node: i64,
    pub target_node: i64,
    pub lats: Vec<f64>,
    pub lons: Vec<f64>,
    /// Only meaningful inside a subgraph, negative values are impassable
    pub cost: f64,
}

impl GraphEdge {
    /// Whether the edge can be used when routing with the provided mode
    pub fn usable(&self, mode: CostMode) -> bool {
        match mode {
            CostMode::Weighted => self.cost > 0.0,
            CostMode::Length => self.way_class != WayClass::Impassable,
        }
    }

    /// Cost of traversing the edge under the provided mode
    pub fn cost_for(&self, mode: CostMode) -> f64 {
        match mode {
            CostMode::Weighted => self.cost,
            CostMode::Length => self.length,
        }
    }

    pub fn source_point(&self) -> Option<Point> {
        Some(geometry::point(*self.lats.first()?, *self.lons.first()?))
    }

    pub fn target_point(&self) -> Option<Point> {
        Some(geometry::point(*self.lats.last()?, *self.lons.last()?))
    }

    /// Polyline coordinates in walking order, reversed if the edge is walked
    /// from target to source
    pub fn walked_coords(&self, reversed: bool) -> Vec<Point> {
        let coords = self
            .lats
            .iter()
            .zip(self.lons.iter())
            .map(|(lat, lon)| geometry::point(*lat, *lon));
        if reversed {
            coords.rev().collect()
        } else {
            coords.collect()
        }
    }
}

/// An edge close to a query point, along with the distance from the point to
/// the closest position on its geometry
#[derive(Debug, Clone, PartialEq)]
pub struct NearestEdge {
    pub edge: GraphEdge,
    pub way_distance: f64,
}

/// A graph vertex which a query point could be snapped onto
#[derive(Debug, Clone, PartialEq)]
pub struct VertexCandidate {
    pub vertex_id: i64,
    /// Distance from the query point to the vertex
    pub distance: f64,
    /// Distance from the query point to the way the vertex was found through
    pub way_distance: f64,
    pub way_id: i64,
    pub way_class: WayClass,
    pub way_name: Option<String>,
}

impl VertexCandidate {
    /// Pick whichever end of a nearby edge is closer to the query point
    pub fn from_nearest_edge(nearest: &NearestEdge, target: Point) -> Option<Self> {
        let edge = &nearest.edge;
        let source_dist = geometry::distance_between(edge.source_point()?, target);
        let target_dist = geometry::distance_between(edge.target_point()?, target);

        let (vertex_id, distance) = if source_dist < target_dist {
            (edge.source, source_dist)
        } else {
            (edge.target, target_dist)
        };

        Some(VertexCandidate {
            vertex_id: vertex_id,
            distance: distance,
            way_distance: nearest.way_distance,
            way_id: edge.way_id,
            way_class: edge.way_class,
            way_name: edge.way_name.clone(),
        })
    }
}

/// One step of a shortest path, as returned by the graph engine
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PathStep {
    pub edge_id: i64,
    pub agg_cost: f64,
}
