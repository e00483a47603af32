//! Enrichment lookups against the intersection, node and way tables of the
//! map database. Tags are stored as hstore, and read back as JSON.
use serde_json::Value;
use sqlx;
use sqlx::PgPool;

use crate::common::config::TableNames;
use crate::common::error::{Result, RouteError};
use crate::enrichment::SemanticEnrichment;
use crate::enrichment::tags::{
    IntersectionRecord, IntersectionWayRecord, build_intersection, build_segment,
    build_waypoint, tags_from_json,
};
use crate::loading::postgres::quote_ident;
use crate::routing::structs::point::RoutePoint;
use crate::routing::structs::segment::RouteSegment;

/// Container for the raw output of the intersection SQL query
#[derive(sqlx::FromRow, Debug)]
pub struct IntersectionRow {
    node_id: i64,
    lat: f64,
    lon: f64,
    name: Option<String>,
    tags: Option<Value>,
    number_of_streets: i32,
    number_of_streets_with_name: i32,
}

/// Container for one of the ways which meet at an intersection
#[derive(sqlx::FromRow, Debug)]
pub struct IntersectionWayRow {
    way_id: i64,
    next_node_id: i64,
    lat: f64,
    lon: f64,
    tags: Option<Value>,
}

impl Into<IntersectionWayRecord> for IntersectionWayRow {
    fn into(self) -> IntersectionWayRecord {
        IntersectionWayRecord {
            way_id: self.way_id,
            next_node_id: self.next_node_id,
            lat: self.lat,
            lon: self.lon,
            tags: tags_from_json(self.tags.unwrap_or(Value::Null)),
        }
    }
}

impl IntersectionRow {
    fn into_record(self, ways: Vec<IntersectionWayRow>) -> IntersectionRecord {
        IntersectionRecord {
            node_id: self.node_id,
            lat: self.lat,
            lon: self.lon,
            name: self.name.unwrap_or_default(),
            tags: tags_from_json(self.tags.unwrap_or(Value::Null)),
            number_of_streets: self.number_of_streets.max(0) as u32,
            number_of_streets_with_name: self.number_of_streets_with_name.max(0) as u32,
            ways: ways.into_iter().map(|way| way.into()).collect(),
        }
    }
}

/// Container for the raw output of the nodes SQL query
#[derive(sqlx::FromRow, Debug)]
pub struct NodeRow {
    lat: f64,
    lon: f64,
    tags: Option<Value>,
}

#[derive(Debug, Clone)]
pub struct PgEnrichment {
    pool: PgPool,
    tables: TableNames,
}

impl PgEnrichment {
    pub fn new(pool: PgPool, tables: TableNames) -> Self {
        PgEnrichment {
            pool: pool,
            tables: tables,
        }
    }
}

impl SemanticEnrichment for PgEnrichment {
    async fn resolve_intersection(&self, node_id: i64) -> Result<Option<RoutePoint>> {
        let query = format!(
            "SELECT id::bigint AS node_id, ST_Y(geom)::float8 AS lat, ST_X(geom)::float8 AS lon, \
             name, hstore_to_json(tags)::jsonb AS tags, \
             number_of_streets::int4 AS number_of_streets, \
             number_of_streets_with_name::int4 AS number_of_streets_with_name \
             FROM {} WHERE id = $1",
            quote_ident(&self.tables.intersections)
        );
        let row: Option<IntersectionRow> = sqlx::query_as(&query)
            .bind(node_id)
            .fetch_optional(&self.pool)
            .await?;

        let row = match row {
            Some(row) => row,
            None => return Ok(None),
        };

        let ways_query = format!(
            "SELECT way_id::bigint AS way_id, node_id::bigint AS next_node_id, \
             ST_Y(geom)::float8 AS lat, ST_X(geom)::float8 AS lon, \
             hstore_to_json(way_tags)::jsonb AS tags \
             FROM {} WHERE id = $1 ORDER BY way_id, node_id",
            quote_ident(&self.tables.intersection_data)
        );
        let ways: Vec<IntersectionWayRow> = sqlx::query_as(&ways_query)
            .bind(node_id)
            .fetch_all(&self.pool)
            .await?;

        Ok(Some(build_intersection(&row.into_record(ways))))
    }

    async fn resolve_waypoint(&self, node_id: i64) -> Result<RoutePoint> {
        let query = format!(
            "SELECT ST_Y(geom)::float8 AS lat, ST_X(geom)::float8 AS lon, \
             hstore_to_json(tags)::jsonb AS tags FROM {} WHERE id = $1",
            quote_ident(&self.tables.nodes)
        );
        let row: Option<NodeRow> = sqlx::query_as(&query)
            .bind(node_id)
            .fetch_optional(&self.pool)
            .await?;

        match row {
            Some(row) => {
                let tags = tags_from_json(row.tags.unwrap_or(Value::Null));
                Ok(build_waypoint(node_id, row.lat, row.lon, &tags))
            }
            None => Err(RouteError::Internal(format!("Unknown node {node_id}"))),
        }
    }

    async fn resolve_segment(&self, way_id: i64, reversed: bool) -> Result<RouteSegment> {
        let query = format!(
            "SELECT hstore_to_json(tags)::jsonb FROM {} WHERE id = $1",
            quote_ident(&self.tables.ways)
        );
        let tags: Option<Option<Value>> = sqlx::query_scalar(&query)
            .bind(way_id)
            .fetch_optional(&self.pool)
            .await?;

        let tags = tags_from_json(tags.flatten().unwrap_or(Value::Null));
        Ok(build_segment(way_id, &tags, reversed))
    }
}
