//! The operations which route construction needs from a spatial graph engine.
//! Every subgraph is a named, request scoped copy of part of the master
//! routing table. Implementations must treat the table name as an identifier,
//! never as SQL.

use std::future::Future;

use geo::Point;

use crate::common::bbox::BBox;
use crate::common::config::WayClass;
use crate::common::error::Result;
use crate::common::graph_data::{CostMode, GraphEdge, NearestEdge, PathStep};

pub trait GraphEngine: Send + Sync {
    /// Copy every master edge whose geometry overlaps the bounding box into
    /// a new subgraph. Returns the number of edges copied
    fn create_subgraph(
        &self,
        table: &str,
        bbox: &BBox,
    ) -> impl Future<Output = Result<u64>> + Send;

    /// Remove a subgraph, succeeds if it doesn't exist
    fn drop_subgraph(&self, table: &str) -> impl Future<Output = Result<()>> + Send;

    fn subgraph_exists(&self, table: &str) -> impl Future<Output = Result<bool>> + Send;

    /// Set the cost of every edge of one class to length * factor, or mark
    /// them impassable if no factor is provided
    fn set_class_cost(
        &self,
        table: &str,
        class: WayClass,
        factor: Option<f64>,
    ) -> impl Future<Output = Result<()>> + Send;

    /// Mark every edge belonging to one of the provided ways as impassable
    fn exclude_ways(
        &self,
        table: &str,
        way_ids: &[i64],
    ) -> impl Future<Output = Result<()>> + Send;

    /// Build whatever indexes & statistics shortest path queries rely on
    fn build_indexes(&self, table: &str) -> impl Future<Output = Result<()>> + Send;

    /// Up to limit edges which are usable under the provided mode, ordered by
    /// their distance from the point. Ties are broken by edge id
    fn nearest_edges(
        &self,
        table: &str,
        point: Point,
        limit: usize,
        mode: CostMode,
    ) -> impl Future<Output = Result<Vec<NearestEdge>>> + Send;

    /// The closest vertex which sits on a passable big or small street
    fn nearest_major_vertex(
        &self,
        table: &str,
        point: Point,
    ) -> impl Future<Output = Result<Option<i64>>> + Send;

    /// Edges of the cheapest undirected path between two vertices, in walking
    /// order. Empty if there is no path
    fn shortest_path(
        &self,
        table: &str,
        start: i64,
        dest: i64,
        mode: CostMode,
    ) -> impl Future<Output = Result<Vec<PathStep>>> + Send;

    /// Fetch edges by id, in the order requested. Unknown ids are an error
    fn edges(
        &self,
        table: &str,
        ids: &[i64],
    ) -> impl Future<Output = Result<Vec<GraphEdge>>> + Send;
}
