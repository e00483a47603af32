//! The functions defined here run every subgraph operation against a
//! PostGIS database with the pgRouting extension installed. The master
//! routing table is expected to follow the osm2po layout, with the way class
//! stored in the kmh column and edge lengths in km.
use geo::Point;
use rustc_hash::FxHashMap;
use sqlx;
use sqlx::PgPool;

use crate::common::bbox::BBox;
use crate::common::config::WayClass;
use crate::common::error::{Result, RouteError};
use crate::common::graph_data::{CostMode, GraphEdge, NearestEdge, PathStep};
use crate::loading::engine::GraphEngine;

/// Columns required to build a GraphEdge, the geometry is unpacked into
/// separate latitude & longitude arrays
const EDGE_COLUMNS: &str = "\
    id::bigint AS id, \
    source::bigint AS source, \
    target::bigint AS target, \
    (km * 1000.0)::float8 AS length, \
    kmh::int4 AS way_class, \
    osm_id::bigint AS way_id, \
    osm_name AS way_name, \
    osm_source_id::bigint AS source_node, \
    osm_target_id::bigint AS target_node, \
    ARRAY(SELECT ST_Y(dp.geom) FROM ST_DumpPoints(geom_way) AS dp ORDER BY dp.path) AS lats, \
    ARRAY(SELECT ST_X(dp.geom) FROM ST_DumpPoints(geom_way) AS dp ORDER BY dp.path) AS lons, \
    cost::float8 AS cost";

/// Container for the raw output of the edges SQL queries
#[derive(sqlx::FromRow, Debug, Clone)]
pub struct EdgeRow {
    pub id: i64,
    pub source: i64,
    pub target: i64,
    length: f64,
    way_class: i32,
    way_id: i64,
    way_name: Option<String>,
    source_node: i64,
    target_node: i64,
    lats: Vec<f64>,
    lons: Vec<f64>,
    cost: f64,
}

impl Into<GraphEdge> for EdgeRow {
    /// Unpack the raw edge data into the format used during routing
    fn into(self) -> GraphEdge {
        GraphEdge {
            id: self.id,
            source: self.source,
            target: self.target,
            length: self.length,
            way_class: WayClass::from_id(self.way_class),
            way_id: self.way_id,
            way_name: self.way_name.filter(|name| !name.is_empty()),
            source_node: self.source_node,
            target_node: self.target_node,
            lats: self.lats,
            lons: self.lons,
            cost: self.cost,
        }
    }
}

/// Container for the output of the nearest edges query
#[derive(sqlx::FromRow, Debug)]
pub struct NearestEdgeRow {
    #[sqlx(flatten)]
    edge: EdgeRow,
    way_distance: f64,
}

impl Into<NearestEdge> for NearestEdgeRow {
    fn into(self) -> NearestEdge {
        NearestEdge {
            edge: self.edge.into(),
            way_distance: self.way_distance,
        }
    }
}

/// Container for a single row of pgr_dijkstra output
#[derive(sqlx::FromRow, Debug, Clone, Copy)]
pub struct PathRow {
    edge_id: i64,
    agg_cost: f64,
}

impl Into<PathStep> for PathRow {
    fn into(self) -> PathStep {
        PathStep {
            edge_id: self.edge_id,
            agg_cost: self.agg_cost,
        }
    }
}

/// Quote a table or index name so it can be safely placed into a statement
pub fn quote_ident(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

/// Restriction which limits a query to the edges usable under a cost mode
fn usable_filter(mode: CostMode) -> String {
    match mode {
        CostMode::Weighted => "cost > 0".to_string(),
        CostMode::Length => format!("kmh <> {}", WayClass::Impassable.id()),
    }
}

/// The inner query handed to pgr_dijkstra, which provides the id, source,
/// target and cost of every usable edge
pub fn generate_dijkstra_edges_query(table: &str, mode: CostMode) -> String {
    let cost = match mode {
        CostMode::Weighted => "cost",
        CostMode::Length => "km AS cost",
    };
    format!(
        "SELECT id, source, target, {cost} FROM {} WHERE {}",
        quote_ident(table),
        usable_filter(mode)
    )
}

/// Statements which index a freshly populated subgraph
pub fn generate_index_statements(table: &str) -> String {
    let tbl = quote_ident(table);
    let pkey = quote_ident(&format!("{table}_pk"));
    let src = quote_ident(&format!("{table}_s"));
    let dst = quote_ident(&format!("{table}_t"));
    let geom = quote_ident(&format!("{table}_g"));

    format!(
        "ALTER TABLE ONLY {tbl} ADD CONSTRAINT {pkey} PRIMARY KEY (id);
CREATE INDEX {src} ON {tbl} USING btree (source);
CREATE INDEX {dst} ON {tbl} USING btree (target);
CREATE INDEX {geom} ON {tbl} USING gist (geom_way);
ANALYZE {tbl};"
    )
}

/// Graph engine backed by PostGIS & pgRouting
#[derive(Debug, Clone)]
pub struct PgGraphEngine {
    pool: PgPool,
    routing_table: String,
}

impl PgGraphEngine {
    pub fn new(pool: PgPool, routing_table: &str) -> Self {
        PgGraphEngine {
            pool: pool,
            routing_table: routing_table.to_string(),
        }
    }
}

impl GraphEngine for PgGraphEngine {
    async fn create_subgraph(&self, table: &str, bbox: &BBox) -> Result<u64> {
        let tbl = quote_ident(table);
        let master = quote_ident(&self.routing_table);

        sqlx::query(&format!(
            "CREATE TABLE {tbl} AS SELECT * FROM {master} LIMIT 0"
        ))
        .execute(&self.pool)
        .await?;

        let inserted = sqlx::query(&format!(
            "INSERT INTO {tbl} SELECT * FROM {master} \
             WHERE geom_way && ST_MakeEnvelope($1, $2, $3, $4, 4326)"
        ))
        .bind(bbox.min_lon)
        .bind(bbox.min_lat)
        .bind(bbox.max_lon)
        .bind(bbox.max_lat)
        .execute(&self.pool)
        .await?;

        Ok(inserted.rows_affected())
    }

    async fn drop_subgraph(&self, table: &str) -> Result<()> {
        sqlx::query(&format!("DROP TABLE IF EXISTS {}", quote_ident(table)))
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn subgraph_exists(&self, table: &str) -> Result<bool> {
        let exists: bool = sqlx::query_scalar("SELECT to_regclass($1) IS NOT NULL")
            .bind(quote_ident(table))
            .fetch_one(&self.pool)
            .await?;
        Ok(exists)
    }

    async fn set_class_cost(
        &self,
        table: &str,
        class: WayClass,
        factor: Option<f64>,
    ) -> Result<()> {
        let tbl = quote_ident(table);
        match factor {
            Some(factor) => {
                let query = format!("UPDATE {tbl} SET cost = km * $1 WHERE kmh = $2");
                sqlx::query(&query)
                    .bind(factor)
                    .bind(class.id())
                    .execute(&self.pool)
                    .await?;
            }
            None => {
                let query = format!("UPDATE {tbl} SET cost = -1 WHERE kmh = $1");
                sqlx::query(&query)
                    .bind(class.id())
                    .execute(&self.pool)
                    .await?;
            }
        };
        Ok(())
    }

    async fn exclude_ways(&self, table: &str, way_ids: &[i64]) -> Result<()> {
        if way_ids.is_empty() {
            return Ok(());
        }
        sqlx::query(&format!(
            "UPDATE {} SET cost = -1 WHERE osm_id::bigint = ANY($1)",
            quote_ident(table)
        ))
        .bind(way_ids)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn build_indexes(&self, table: &str) -> Result<()> {
        sqlx::raw_sql(&generate_index_statements(table))
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn nearest_edges(
        &self,
        table: &str,
        point: Point,
        limit: usize,
        mode: CostMode,
    ) -> Result<Vec<NearestEdge>> {
        let query = format!(
            "SELECT {EDGE_COLUMNS}, \
             ST_Distance(geom_way::geography, ST_SetSRID(ST_MakePoint($1, $2), 4326)::geography)::float8 AS way_distance \
             FROM {} WHERE {} \
             ORDER BY way_distance, id LIMIT $3",
            quote_ident(table),
            usable_filter(mode)
        );

        let rows: Vec<NearestEdgeRow> = sqlx::query_as(&query)
            .bind(point.x())
            .bind(point.y())
            .bind(limit as i64)
            .fetch_all(&self.pool)
            .await?;

        Ok(rows.into_iter().map(|row| row.into()).collect())
    }

    async fn nearest_major_vertex(&self, table: &str, point: Point) -> Result<Option<i64>> {
        let query = format!(
            "SELECT (CASE \
                WHEN ST_Distance(ST_StartPoint(geom_way)::geography, q.p) \
                    <= ST_Distance(ST_EndPoint(geom_way)::geography, q.p) \
                THEN source ELSE target END)::bigint \
             FROM {}, (SELECT ST_SetSRID(ST_MakePoint($1, $2), 4326)::geography AS p) AS q \
             WHERE kmh IN ($3, $4) AND cost > 0 \
             ORDER BY ST_Distance(geom_way::geography, q.p), id LIMIT 1",
            quote_ident(table)
        );

        let vertex: Option<i64> = sqlx::query_scalar(&query)
            .bind(point.x())
            .bind(point.y())
            .bind(WayClass::BigStreets.id())
            .bind(WayClass::SmallStreets.id())
            .fetch_optional(&self.pool)
            .await?;

        Ok(vertex)
    }

    async fn shortest_path(
        &self,
        table: &str,
        start: i64,
        dest: i64,
        mode: CostMode,
    ) -> Result<Vec<PathStep>> {
        let rows: Vec<PathRow> = sqlx::query_as(
            "SELECT edge::bigint AS edge_id, agg_cost::float8 AS agg_cost \
             FROM pgr_dijkstra($1, $2::bigint, $3::bigint, false) \
             WHERE edge <> -1 ORDER BY seq",
        )
        .bind(generate_dijkstra_edges_query(table, mode))
        .bind(start)
        .bind(dest)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(|row| row.into()).collect())
    }

    async fn edges(&self, table: &str, ids: &[i64]) -> Result<Vec<GraphEdge>> {
        let query = format!(
            "SELECT {EDGE_COLUMNS} FROM {} WHERE id = ANY($1)",
            quote_ident(table)
        );

        let rows: Vec<EdgeRow> = sqlx::query_as(&query)
            .bind(ids)
            .fetch_all(&self.pool)
            .await?;

        let by_id: FxHashMap<i64, GraphEdge> =
            rows.into_iter().map(|row| (row.id, row.into())).collect();

        ids.iter()
            .map(|id| {
                by_id
                    .get(id)
                    .cloned()
                    .ok_or_else(|| RouteError::Internal(format!("Edge {id} not in {table}")))
            })
            .collect::<Result<Vec<GraphEdge>>>()
    }
}
