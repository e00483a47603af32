//! Creation and teardown of the disposable, profile weighted copy of the
//! street graph which every route section is calculated on.

use std::hash::{Hash, Hasher};

use geo::Point;
use rustc_hash::FxHasher;

use crate::common::bbox::BBox;
use crate::common::config::{RoutingProfile, WayClass};
use crate::common::error::{Result, RouteError};
use crate::common::session::CancelToken;
use crate::loading::engine::GraphEngine;

const TABLE_PREFIX: &str = "tmp_routing_";

/// Number of characters of the session id which are kept readable in the
/// table name
const READABLE_CHARS: usize = 28;

/// Handle for a subgraph which has been created and fully prepared
#[derive(Debug, Clone, PartialEq)]
pub struct Subgraph {
    table: String,
    num_edges: u64,
}

impl Subgraph {
    pub fn table(&self) -> &str {
        &self.table
    }

    pub fn num_edges(&self) -> u64 {
        self.num_edges
    }
}

/// Derive the subgraph name for one admission of a session. The readable
/// part only keeps alphanumeric characters, so a hash of the full id and the
/// generation is appended to keep names distinct. Always within the 63 byte
/// limit for identifiers
pub fn table_name(session_id: &str, generation: u64) -> String {
    let readable: String = session_id
        .chars()
        .filter(|chr| chr.is_ascii_alphanumeric())
        .take(READABLE_CHARS)
        .collect();

    let mut hasher = FxHasher::default();
    (session_id, generation).hash(&mut hasher);

    format!("{TABLE_PREFIX}{readable}_{:016x}", hasher.finish())
}

/// Set the cost of every edge based on its way class. Classes without a
/// weight in the profile become impassable
pub async fn apply_cost<E: GraphEngine>(
    engine: &E,
    table: &str,
    profile: &RoutingProfile,
    token: &CancelToken,
) -> Result<()> {
    for class in WayClass::SELECTABLE.into_iter().chain([WayClass::Impassable]) {
        engine
            .set_class_cost(table, class, profile.cost_factor(class))
            .await?;
        token.check()?;
    }
    Ok(())
}

/// Mark every edge of the provided ways as impassable
pub async fn exclude_ways<E: GraphEngine>(
    engine: &E,
    table: &str,
    way_ids: &[i64],
) -> Result<()> {
    if !way_ids.is_empty() {
        log::debug!("Excluding {} ways from {table}", way_ids.len());
    }
    engine.exclude_ways(table, way_ids).await
}

async fn prepare<E: GraphEngine>(
    engine: &E,
    table: &str,
    bbox: &BBox,
    profile: &RoutingProfile,
    token: &CancelToken,
) -> Result<u64> {
    let num_edges = engine.create_subgraph(table, bbox).await?;
    if num_edges == 0 {
        return Err(RouteError::MapIncompatible);
    }
    token.check()?;

    apply_cost(engine, table, profile, token).await?;
    exclude_ways(engine, table, profile.excluded_ways()).await?;
    token.check()?;

    engine.build_indexes(table).await?;
    token.check()?;

    Ok(num_edges)
}

/// Create a subgraph covering radius metres around the centre point, with
/// costs taken from the routing profile. If anything goes wrong while the
/// subgraph is being prepared, it is removed again before returning
pub async fn open_subgraph<E: GraphEngine>(
    engine: &E,
    session_id: &str,
    generation: u64,
    profile: &RoutingProfile,
    centre: Point,
    radius: f64,
    token: &CancelToken,
) -> Result<Subgraph> {
    let table = table_name(session_id, generation);
    let bbox = BBox::around(centre, radius);

    // Left behind by a worker which didn't get to clean up
    engine.drop_subgraph(&table).await?;
    token.check()?;

    match prepare(engine, &table, &bbox, profile, token).await {
        Ok(num_edges) => {
            log::info!("Created {table} with {num_edges} edges, radius {radius:.0}m");
            Ok(Subgraph {
                table: table,
                num_edges: num_edges,
            })
        }
        Err(err) => {
            if let Err(drop_err) = engine.drop_subgraph(&table).await {
                log::warn!("Unable to remove {table}: {drop_err}");
            }
            Err(err)
        }
    }
}

/// Remove a subgraph once it is no longer needed
pub async fn close_subgraph<E: GraphEngine>(engine: &E, subgraph: Subgraph) -> Result<()> {
    engine.drop_subgraph(&subgraph.table).await?;
    log::debug!("Removed {}", subgraph.table);
    Ok(())
}

#[cfg(test)]
mod tests {

    use std::collections::BTreeMap;

    use super::*;
    use crate::common::geometry;
    use crate::common::graph_data::tests::make_edge;
    use crate::loading::petgraph::MemoryGraphEngine;

    fn get_test_engine() -> MemoryGraphEngine {
        MemoryGraphEngine::new(vec![
            make_edge(
                1,
                (1, 101, 52.0, 13.0),
                (2, 102, 52.0, 13.001),
                1000,
                WayClass::BigStreets,
            ),
            make_edge(
                2,
                (2, 102, 52.0, 13.001),
                (3, 103, 52.0, 13.002),
                1001,
                WayClass::Steps,
            ),
            make_edge(
                3,
                (3, 103, 52.0, 13.002),
                (4, 104, 52.0, 13.003),
                1002,
                WayClass::Impassable,
            ),
        ])
    }

    /// Names are readable, distinct and short enough for postgres
    #[test]
    fn test_table_name() {
        let plain = table_name("abc", 0);
        let punctuated = table_name("a-b-c", 0);
        let long = table_name(&"x".repeat(200), u64::MAX);

        assert!(plain.starts_with("tmp_routing_abc_"));
        assert!(punctuated.starts_with("tmp_routing_abc_"));
        assert_ne!(plain, punctuated);
        assert!(long.len() <= 63);
        assert_eq!(table_name("abc", 0), plain);
        assert_ne!(table_name("abc", 1), plain);
    }

    /// Costs follow the profile, and excluded ways become impassable
    #[tokio::test]
    async fn test_open_subgraph_costs() {
        let engine = get_test_engine();
        let mut weights = BTreeMap::new();
        weights.insert(WayClass::BigStreets, 2.0);
        let profile = RoutingProfile::new(weights, vec![]).unwrap();

        let subgraph = open_subgraph(
            &engine,
            "abc",
            0,
            &profile,
            geometry::point(52.0, 13.001),
            750.0,
            &CancelToken::detached(),
        )
        .await
        .unwrap();

        assert_eq!(subgraph.num_edges(), 3);
        let edges = engine.subgraph_edges(subgraph.table()).unwrap();
        for edge in edges {
            match edge.way_class {
                WayClass::BigStreets => assert_eq!(edge.cost, edge.length * 2.0),
                _ => assert_eq!(edge.cost, -1.0),
            }
        }

        close_subgraph(&engine, subgraph).await.unwrap();
        assert!(engine.subgraph_names().is_empty());
    }

    /// Excluded ways are impassable, whatever their class
    #[tokio::test]
    async fn test_open_subgraph_exclusions() {
        let engine = get_test_engine();
        let profile = RoutingProfile::new(
            WayClass::SELECTABLE.into_iter().map(|class| (class, 1.0)).collect(),
            vec![1000],
        )
        .unwrap();

        let subgraph = open_subgraph(
            &engine,
            "abc",
            0,
            &profile,
            geometry::point(52.0, 13.001),
            750.0,
            &CancelToken::detached(),
        )
        .await
        .unwrap();

        let edges = engine.subgraph_edges(subgraph.table()).unwrap();
        assert_eq!(edges[0].cost, -1.0);
        assert_eq!(edges[1].cost, edges[1].length);
        assert_eq!(edges[2].cost, -1.0);
    }

    /// Points outside the map give MapIncompatible, and leave nothing behind
    #[tokio::test]
    async fn test_open_subgraph_outside_map() {
        let engine = get_test_engine();

        let result = open_subgraph(
            &engine,
            "abc",
            0,
            &RoutingProfile::default(),
            geometry::point(48.0, 2.0),
            750.0,
            &CancelToken::detached(),
        )
        .await;

        assert!(matches!(result, Err(RouteError::MapIncompatible)));
        assert!(engine.subgraph_names().is_empty());
    }

    /// Cancellation during preparation removes the subgraph
    #[tokio::test]
    async fn test_open_subgraph_cancelled() {
        let engine = get_test_engine();
        let token = CancelToken::detached();
        token.cancel();

        let result = open_subgraph(
            &engine,
            "abc",
            0,
            &RoutingProfile::default(),
            geometry::point(52.0, 13.001),
            750.0,
            &token,
        )
        .await;

        assert!(matches!(result, Err(RouteError::Cancelled)));
        assert!(engine.subgraph_names().is_empty());
    }

    /// A subgraph left behind under the same name is replaced
    #[tokio::test]
    async fn test_open_subgraph_leftover() {
        let engine = get_test_engine();
        let bbox = BBox::around(geometry::point(52.0, 13.0), 10.0);
        engine.create_subgraph(&table_name("abc", 0), &bbox).await.unwrap();

        let subgraph = open_subgraph(
            &engine,
            "abc",
            0,
            &RoutingProfile::default(),
            geometry::point(52.0, 13.001),
            750.0,
            &CancelToken::detached(),
        )
        .await
        .unwrap();

        assert_eq!(subgraph.num_edges(), 3);
    }

    /// A later admission under the same session id works on its own
    /// subgraph, so the earlier one can't remove it while closing
    #[tokio::test]
    async fn test_open_subgraph_generations() {
        let engine = get_test_engine();
        let profile = RoutingProfile::default();
        let centre = geometry::point(52.0, 13.001);
        let token = CancelToken::detached();

        let earlier = open_subgraph(&engine, "abc", 0, &profile, centre, 750.0, &token)
            .await
            .unwrap();
        let later = open_subgraph(&engine, "abc", 1, &profile, centre, 750.0, &token)
            .await
            .unwrap();
        assert_ne!(earlier.table(), later.table());

        close_subgraph(&engine, earlier).await.unwrap();

        assert!(engine.subgraph_exists(later.table()).await.unwrap());
        assert_eq!(engine.subgraph_names(), vec![later.table().to_string()]);
    }
}
