//! Translation of raw OSM tags into typed route points and segments. Each
//! decision is made by an ordered list of rules, the first rule whose
//! predicate matches provides the value.

use rustc_hash::FxHashMap;
use serde_json::Value;

use crate::common::geometry;
use crate::routing::structs::point::{
    IntersectionWay, PointKind, RoutePoint, TactilePaving, WayCategory, Wheelchair,
};
use crate::routing::structs::segment::{RouteSegment, SegmentAttributes, Sidewalk};

pub type Tags = FxHashMap<String, String>;

/// A rule which yields a value whenever its predicate matches
pub struct Rule<T> {
    pub predicate: fn(&Tags) -> bool,
    pub producer: fn(&Tags) -> T,
}

/// Evaluate rules in priority order
pub fn first_match<T>(rules: &[Rule<T>], tags: &Tags) -> Option<T> {
    rules
        .iter()
        .find(|rule| (rule.predicate)(tags))
        .map(|rule| (rule.producer)(tags))
}

fn tag<'a>(tags: &'a Tags, key: &str) -> Option<&'a str> {
    tags.get(key).map(|val| val.as_str())
}

fn has_tag(tags: &Tags, key: &str, value: &str) -> bool {
    tag(tags, key) == Some(value)
}

fn label(value: &str) -> String {
    value.replace('_', " ")
}

/// Convert a JSON object (as produced by hstore_to_json) into a tag map,
/// anything which isn't a string is skipped
pub fn tags_from_json(value: Value) -> Tags {
    match value {
        Value::Object(map) => map
            .into_iter()
            .filter_map(|(key, val)| match val {
                Value::String(val) => Some((key, val)),
                _ => None,
            })
            .collect(),
        _ => Tags::default(),
    }
}

const POI_KEYS: [&str; 5] = ["amenity", "shop", "tourism", "leisure", "office"];

/// Kind and category label of a node which isn't an intersection
pub const NODE_RULES: [Rule<(PointKind, String)>; 3] = [
    Rule {
        predicate: |tags| {
            matches!(
                tag(tags, "railway"),
                Some("station" | "halt" | "tram_stop")
            ) || has_tag(tags, "highway", "bus_stop")
                || matches!(
                    tag(tags, "public_transport"),
                    Some("stop_position" | "platform" | "station")
                )
        },
        producer: |_| (PointKind::Station, "station".to_string()),
    },
    Rule {
        predicate: |tags| {
            tags.contains_key("name") && POI_KEYS.iter().any(|key| tags.contains_key(*key))
        },
        producer: |tags| {
            let category = POI_KEYS
                .iter()
                .find_map(|key| tag(tags, key))
                .map(label)
                .unwrap_or_else(|| "poi".to_string());
            (PointKind::Poi, category)
        },
    },
    Rule {
        predicate: |_| true,
        producer: |_| (PointKind::Waypoint, "way point".to_string()),
    },
];

/// Category label of an intersection
pub const INTERSECTION_RULES: [Rule<&'static str>; 4] = [
    Rule {
        predicate: |tags| has_tag(tags, "highway", "mini_roundabout"),
        producer: |_| "roundabout",
    },
    Rule {
        predicate: |tags| has_tag(tags, "highway", "traffic_signals"),
        producer: |_| "traffic signals",
    },
    Rule {
        predicate: |tags| has_tag(tags, "railway", "crossing"),
        producer: |_| "railway crossing",
    },
    Rule {
        predicate: |_| true,
        producer: |_| "crossing",
    },
];

/// Category of a way, along with whether it carries a tram line
pub const WAY_RULES: [Rule<(WayCategory, bool)>; 3] = [
    Rule {
        predicate: |tags| tags.contains_key("highway"),
        producer: |tags| {
            (
                WayCategory::Highway(tag(tags, "highway").unwrap_or_default().to_string()),
                has_tag(tags, "railway", "tram"),
            )
        },
    },
    Rule {
        predicate: |tags| tags.contains_key("railway"),
        producer: |tags| {
            (
                WayCategory::Railway(tag(tags, "railway").unwrap_or_default().to_string()),
                has_tag(tags, "railway", "tram"),
            )
        },
    },
    Rule {
        predicate: |_| true,
        producer: |_| (WayCategory::Unknown, false),
    },
];

pub fn way_category(tags: &Tags) -> (WayCategory, bool) {
    first_match(&WAY_RULES, tags).unwrap_or((WayCategory::Unknown, false))
}

/// Display name of a way, falling back on its category and surface
pub fn way_name(tags: &Tags, category: &WayCategory) -> String {
    if let Some(name) = tag(tags, "name") {
        return name.to_string();
    }
    let category = category.label();
    match tag(tags, "surface").or_else(|| tag(tags, "tracktype")) {
        Some(detail) => format!("{category} ({})", label(detail)),
        None => category,
    }
}

pub fn tactile_paving(tags: &Tags) -> Option<TactilePaving> {
    match tag(tags, "tactile_paving")? {
        "no" => Some(TactilePaving::No),
        "yes" | "contrasted" | "primitive" => Some(TactilePaving::Yes),
        "incorrect" => Some(TactilePaving::Incorrect),
        _ => None,
    }
}

pub fn wheelchair(tags: &Tags) -> Option<Wheelchair> {
    match tag(tags, "wheelchair")? {
        "no" => Some(Wheelchair::No),
        "limited" => Some(Wheelchair::Limited),
        "yes" => Some(Wheelchair::Yes),
        _ => None,
    }
}

/// Sidewalk side relative to the walking direction
pub fn sidewalk(tags: &Tags, reversed: bool) -> Option<Sidewalk> {
    let side = match tag(tags, "sidewalk")? {
        "no" | "none" => Sidewalk::No,
        "left" => Sidewalk::Left,
        "right" => Sidewalk::Right,
        "both" => Sidewalk::Both,
        _ => return None,
    };
    if reversed { Some(side.mirrored()) } else { Some(side) }
}

/// Build a segment for a way, bearing & distance are set once the segment is
/// placed into a route
pub fn build_segment(way_id: i64, tags: &Tags, reversed: bool) -> RouteSegment {
    let (category, tram) = way_category(tags);
    let name = way_name(tags, &category);

    let attributes = SegmentAttributes {
        surface: tag(tags, "surface").map(label),
        smoothness: tag(tags, "smoothness").map(label),
        sidewalk: sidewalk(tags, reversed),
        tactile_paving: tactile_paving(tags),
        wheelchair: wheelchair(tags),
        width: tag(tags, "width").and_then(|val| val.parse::<f64>().ok()),
        lanes: tag(tags, "lanes").and_then(|val| val.parse::<u32>().ok()),
        maxspeed: tag(tags, "maxspeed").and_then(|val| val.parse::<u32>().ok()),
        segregated: tag(tags, "segregated").map(|val| val == "yes"),
        description: tag(tags, "description").map(|val| val.to_string()),
        tram: tram,
    };

    let mut segment = RouteSegment::new(&name, category);
    segment.way_id = Some(way_id);
    segment.attributes = attributes;
    segment
}

/// Build a point for a node which isn't an intersection
pub fn build_waypoint(node_id: i64, lat: f64, lon: f64, tags: &Tags) -> RoutePoint {
    let (kind, category) = first_match(&NODE_RULES, tags)
        .unwrap_or((PointKind::Waypoint, "way point".to_string()));
    let name = tag(tags, "name").map(|name| name.to_string()).unwrap_or_else(|| category.clone());

    let mut point = RoutePoint::new(kind, &name, &category, lat, lon);
    point.node_id = Some(node_id);
    point.tactile_paving = tactile_paving(tags);
    point.wheelchair = wheelchair(tags);
    point
}

/// A way which meets at an intersection, as stored in the map database
#[derive(Debug, Clone, PartialEq)]
pub struct IntersectionWayRecord {
    pub way_id: i64,
    pub next_node_id: i64,
    /// Location of the next node along the way
    pub lat: f64,
    pub lon: f64,
    pub tags: Tags,
}

/// An intersection, as stored in the map database
#[derive(Debug, Clone, PartialEq)]
pub struct IntersectionRecord {
    pub node_id: i64,
    pub lat: f64,
    pub lon: f64,
    /// Names of the crossing streets, comma separated
    pub name: String,
    pub tags: Tags,
    pub number_of_streets: u32,
    pub number_of_streets_with_name: u32,
    pub ways: Vec<IntersectionWayRecord>,
}

pub fn build_intersection(record: &IntersectionRecord) -> RoutePoint {
    let mut point = build_waypoint(record.node_id, record.lat, record.lon, &record.tags);
    point.kind = PointKind::Intersection;
    point.category = first_match(&INTERSECTION_RULES, &record.tags)
        .unwrap_or("crossing")
        .to_string();
    point.name = record
        .name
        .split(',')
        .map(|street| label(street.trim()))
        .filter(|street| !street.is_empty())
        .collect::<Vec<String>>()
        .join(", ");
    point.number_of_streets = Some(record.number_of_streets);
    point.number_of_streets_with_name = Some(record.number_of_streets_with_name);

    let origin = point.position();
    point.way_list = record
        .ways
        .iter()
        .map(|way| {
            let (category, tram) = way_category(&way.tags);
            IntersectionWay {
                way_id: way.way_id,
                name: tag(&way.tags, "name").map(|name| name.to_string()),
                category: category,
                tram: tram,
                bearing: geometry::bearing_between(origin, geometry::point(way.lat, way.lon)),
                next_node_id: way.next_node_id,
                part_of_previous_route_segment: false,
                part_of_next_route_segment: false,
            }
        })
        .collect();

    point
}
