//! In-memory graph engine. Subgraphs are held as plain edge lists, and
//! shortest paths are found by loading the usable edges into a petgraph
//! graph. Used for tests, and for running against small extracts without a
//! database.
use std::sync::{Mutex, MutexGuard, PoisonError};

use geo::Point;
use petgraph::algo::astar;
use petgraph::graph::NodeIndex;
use petgraph::visit::EdgeRef;
use petgraph::{Graph, Undirected};
use rayon::prelude::*;
use rustc_hash::FxHashMap;

use crate::common::bbox::BBox;
use crate::common::config::WayClass;
use crate::common::error::{Result, RouteError};
use crate::common::geometry;
use crate::common::graph_data::{CostMode, GraphEdge, NearestEdge, PathStep};
use crate::loading::engine::GraphEngine;

type SubgraphMap = FxHashMap<String, Vec<GraphEdge>>;

/// Graph engine which keeps the master graph and every subgraph in memory
#[derive(Debug, Default)]
pub struct MemoryGraphEngine {
    master: Vec<GraphEdge>,
    subgraphs: Mutex<SubgraphMap>,
}

impl MemoryGraphEngine {
    pub fn new(master: Vec<GraphEdge>) -> Self {
        MemoryGraphEngine {
            master: master,
            subgraphs: Mutex::new(FxHashMap::default()),
        }
    }

    fn lock(&self) -> MutexGuard<'_, SubgraphMap> {
        self.subgraphs.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn with_subgraph<T, F>(&self, table: &str, func: F) -> Result<T>
    where
        F: FnOnce(&mut Vec<GraphEdge>) -> T,
    {
        let mut subgraphs = self.lock();
        match subgraphs.get_mut(table) {
            Some(edges) => Ok(func(edges)),
            None => Err(RouteError::Internal(format!("Subgraph {table} does not exist"))),
        }
    }

    /// Names of every subgraph which currently exists
    pub fn subgraph_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.lock().keys().cloned().collect();
        names.sort();
        names
    }

    /// A copy of the edges held in a subgraph
    pub fn subgraph_edges(&self, table: &str) -> Option<Vec<GraphEdge>> {
        self.lock().get(table).cloned()
    }
}

/// Bounding box of an edge's geometry
fn edge_bbox(edge: &GraphEdge) -> Option<BBox> {
    BBox::from_coords(&edge.lats, &edge.lons)
}

/// Load every usable edge into an undirected graph. Node weights hold the
/// vertex ids, edge weights the position of the edge in the provided slice
pub fn create_graph(
    edges: &[GraphEdge],
    mode: CostMode,
) -> (Graph<i64, usize, Undirected, u32>, FxHashMap<i64, NodeIndex>) {
    let mut graph = Graph::<i64, usize, Undirected, u32>::new_undirected();
    let mut vertex_inx_map = FxHashMap::<i64, NodeIndex>::default();

    for (position, edge) in edges.iter().enumerate() {
        if !edge.usable(mode) {
            continue;
        }

        let src_inx = *vertex_inx_map
            .entry(edge.source)
            .or_insert_with(|| graph.add_node(edge.source));
        let dst_inx = *vertex_inx_map
            .entry(edge.target)
            .or_insert_with(|| graph.add_node(edge.target));

        graph.add_edge(src_inx, dst_inx, position);
    }

    (graph, vertex_inx_map)
}

/// Cheapest path between two vertices. Parallel edges are resolved to the
/// cheapest one after the search
pub fn find_path(edges: &[GraphEdge], start: i64, dest: i64, mode: CostMode) -> Vec<PathStep> {
    let (graph, vertex_inx_map) = create_graph(edges, mode);

    let (start_inx, dest_inx) = match (vertex_inx_map.get(&start), vertex_inx_map.get(&dest)) {
        (Some(start_inx), Some(dest_inx)) => (*start_inx, *dest_inx),
        _ => return Vec::new(),
    };

    let found = astar(
        &graph,
        start_inx,
        |inx| inx == dest_inx,
        |edge| edges[*edge.weight()].cost_for(mode),
        |_| 0.0,
    );

    let nodes = match found {
        Some((_, nodes)) => nodes,
        None => return Vec::new(),
    };

    let mut steps = Vec::<PathStep>::with_capacity(nodes.len().saturating_sub(1));
    let mut agg_cost = 0.0;
    for pair in nodes.windows(2) {
        let cheapest = graph
            .edges_connecting(pair[0], pair[1])
            .map(|edge_ref| &edges[*edge_ref.weight()])
            .min_by(|a, b| {
                a.cost_for(mode)
                    .total_cmp(&b.cost_for(mode))
                    .then(a.id.cmp(&b.id))
            });

        if let Some(edge) = cheapest {
            agg_cost += edge.cost_for(mode);
            steps.push(PathStep {
                edge_id: edge.id,
                agg_cost: agg_cost,
            });
        }
    }

    steps
}

impl GraphEngine for MemoryGraphEngine {
    async fn create_subgraph(&self, table: &str, bbox: &BBox) -> Result<u64> {
        let edges: Vec<GraphEdge> = self
            .master
            .par_iter()
            .filter(|edge| edge_bbox(edge).is_some_and(|edge_bbox| edge_bbox.intersects(bbox)))
            .cloned()
            .collect();

        let mut subgraphs = self.lock();
        if subgraphs.contains_key(table) {
            return Err(RouteError::Internal(format!("Subgraph {table} already exists")));
        }

        let num_edges = edges.len() as u64;
        subgraphs.insert(table.to_string(), edges);

        Ok(num_edges)
    }

    async fn drop_subgraph(&self, table: &str) -> Result<()> {
        self.lock().remove(table);
        Ok(())
    }

    async fn subgraph_exists(&self, table: &str) -> Result<bool> {
        Ok(self.lock().contains_key(table))
    }

    async fn set_class_cost(
        &self,
        table: &str,
        class: WayClass,
        factor: Option<f64>,
    ) -> Result<()> {
        self.with_subgraph(table, |edges| {
            for edge in edges.iter_mut().filter(|edge| edge.way_class == class) {
                edge.cost = match factor {
                    Some(factor) => edge.length * factor,
                    None => -1.0,
                };
            }
        })
    }

    async fn exclude_ways(&self, table: &str, way_ids: &[i64]) -> Result<()> {
        self.with_subgraph(table, |edges| {
            for edge in edges.iter_mut().filter(|edge| way_ids.contains(&edge.way_id)) {
                edge.cost = -1.0;
            }
        })
    }

    async fn build_indexes(&self, table: &str) -> Result<()> {
        self.with_subgraph(table, |edges| edges.sort_by_key(|edge| edge.id))
    }

    async fn nearest_edges(
        &self,
        table: &str,
        point: Point,
        limit: usize,
        mode: CostMode,
    ) -> Result<Vec<NearestEdge>> {
        self.with_subgraph(table, |edges| {
            let mut nearest: Vec<NearestEdge> = edges
                .par_iter()
                .filter(|edge| edge.usable(mode))
                .map(|edge| NearestEdge {
                    way_distance: geometry::distance_to_polyline(point, &edge.lats, &edge.lons),
                    edge: edge.clone(),
                })
                .collect();

            nearest.sort_by(|a, b| {
                a.way_distance
                    .total_cmp(&b.way_distance)
                    .then(a.edge.id.cmp(&b.edge.id))
            });
            nearest.truncate(limit);
            nearest
        })
    }

    async fn nearest_major_vertex(&self, table: &str, point: Point) -> Result<Option<i64>> {
        self.with_subgraph(table, |edges| {
            let closest = edges
                .iter()
                .filter(|edge| edge.way_class.is_street() && edge.usable(CostMode::Weighted))
                .map(|edge| {
                    let dist = geometry::distance_to_polyline(point, &edge.lats, &edge.lons);
                    (dist, edge)
                })
                .min_by(|(dist_a, a), (dist_b, b)| dist_a.total_cmp(dist_b).then(a.id.cmp(&b.id)));

            closest.and_then(|(_, edge)| {
                let source_dist = geometry::distance_between(edge.source_point()?, point);
                let target_dist = geometry::distance_between(edge.target_point()?, point);
                if source_dist <= target_dist {
                    Some(edge.source)
                } else {
                    Some(edge.target)
                }
            })
        })
    }

    async fn shortest_path(
        &self,
        table: &str,
        start: i64,
        dest: i64,
        mode: CostMode,
    ) -> Result<Vec<PathStep>> {
        let edges = self
            .subgraph_edges(table)
            .ok_or_else(|| RouteError::Internal(format!("Subgraph {table} does not exist")))?;

        Ok(find_path(&edges, start, dest, mode))
    }

    async fn edges(&self, table: &str, ids: &[i64]) -> Result<Vec<GraphEdge>> {
        self.with_subgraph(table, |edges| {
            let by_id: FxHashMap<i64, &GraphEdge> =
                edges.iter().map(|edge| (edge.id, edge)).collect();
            ids.iter()
                .map(|id| {
                    by_id
                        .get(id)
                        .map(|edge| (*edge).clone())
                        .ok_or_else(|| RouteError::Internal(format!("Edge {id} not in {table}")))
                })
                .collect::<Result<Vec<GraphEdge>>>()
        })?
    }
}
