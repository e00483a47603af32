//! Enrichment lookups against data held in memory

use rustc_hash::FxHashMap;

use crate::common::error::{Result, RouteError};
use crate::enrichment::SemanticEnrichment;
use crate::enrichment::tags::{
    IntersectionRecord, Tags, build_intersection, build_segment, build_waypoint,
};
use crate::routing::structs::point::RoutePoint;
use crate::routing::structs::segment::RouteSegment;

#[derive(Debug, Clone, PartialEq)]
struct NodeRecord {
    lat: f64,
    lon: f64,
    tags: Tags,
}

#[derive(Debug, Clone, Default)]
pub struct MemoryEnrichment {
    nodes: FxHashMap<i64, NodeRecord>,
    ways: FxHashMap<i64, Tags>,
    intersections: FxHashMap<i64, IntersectionRecord>,
}

impl MemoryEnrichment {
    pub fn new() -> Self {
        MemoryEnrichment::default()
    }

    pub fn add_node(&mut self, node_id: i64, lat: f64, lon: f64, tags: Tags) {
        self.nodes.insert(node_id, NodeRecord { lat, lon, tags });
    }

    pub fn add_way(&mut self, way_id: i64, tags: Tags) {
        self.ways.insert(way_id, tags);
    }

    /// Register an intersection, its node is registered alongside it
    pub fn add_intersection(&mut self, record: IntersectionRecord) {
        self.add_node(record.node_id, record.lat, record.lon, record.tags.clone());
        self.intersections.insert(record.node_id, record);
    }
}

impl SemanticEnrichment for MemoryEnrichment {
    async fn resolve_intersection(&self, node_id: i64) -> Result<Option<RoutePoint>> {
        Ok(self.intersections.get(&node_id).map(build_intersection))
    }

    async fn resolve_waypoint(&self, node_id: i64) -> Result<RoutePoint> {
        match self.nodes.get(&node_id) {
            Some(node) => Ok(build_waypoint(node_id, node.lat, node.lon, &node.tags)),
            None => Err(RouteError::Internal(format!("Unknown node {node_id}"))),
        }
    }

    async fn resolve_segment(&self, way_id: i64, reversed: bool) -> Result<RouteSegment> {
        let tags = self.ways.get(&way_id).cloned().unwrap_or_default();
        Ok(build_segment(way_id, &tags, reversed))
    }
}
