//! Lookups which turn the node & way ids of a raw path into semantic route
//! points and segments. They read from a pre-built dataset of intersections,
//! nodes and ways, and never modify it.

pub mod memory;
pub mod postgres;
pub mod tags;

use std::future::Future;

use crate::common::error::Result;
use crate::routing::structs::point::RoutePoint;
use crate::routing::structs::segment::RouteSegment;

pub trait SemanticEnrichment: Send + Sync {
    /// The intersection registered at a node, if there is one
    fn resolve_intersection(
        &self,
        node_id: i64,
    ) -> impl Future<Output = Result<Option<RoutePoint>>> + Send;

    /// A plain point for any node
    fn resolve_waypoint(&self, node_id: i64) -> impl Future<Output = Result<RoutePoint>> + Send;

    /// A segment following a way. Reversed segments are walked against the
    /// drawing direction of the way
    fn resolve_segment(
        &self,
        way_id: i64,
        reversed: bool,
    ) -> impl Future<Output = Result<RouteSegment>> + Send;
}
