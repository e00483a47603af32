//! Semantic points along a route, and the ways which meet at an intersection

use geo::Point;
use serde::{Serialize, Serializer};

use crate::common::config::RequestPoint;
use crate::common::geometry;

/// Category of a street or path, as derived from its OSM tags
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum WayCategory {
    Highway(String),
    Railway(String),
    Unknown,
    /// Segments which don't follow a mapped way
    Unlabeled,
}

/// Street categories which are shared with motor traffic, and which therefore
/// make an intersection worth announcing
const MAJOR_STREETS: [&str; 12] = [
    "primary",
    "primary_link",
    "secondary",
    "secondary_link",
    "tertiary",
    "tertiary_link",
    "residential",
    "unclassified",
    "living_street",
    "trunk",
    "trunk_link",
    "road",
];

impl WayCategory {
    pub fn label(&self) -> String {
        match self {
            WayCategory::Highway(value) | WayCategory::Railway(value) => value.replace('_', " "),
            WayCategory::Unknown => "unknown".to_string(),
            WayCategory::Unlabeled => String::new(),
        }
    }

    pub fn is_major_street(&self) -> bool {
        match self {
            WayCategory::Highway(value) => MAJOR_STREETS.contains(&value.as_str()),
            _ => false,
        }
    }

    pub fn is_rail(&self) -> bool {
        matches!(self, WayCategory::Railway(_))
    }
}

impl Serialize for WayCategory {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.label())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TactilePaving {
    No,
    Yes,
    Incorrect,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Wheelchair {
    No,
    Limited,
    Yes,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PointKind {
    Waypoint,
    Intersection,
    Poi,
    Station,
    Start,
    Destination,
    Via,
}

/// One of the ways which meet at an intersection
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct IntersectionWay {
    pub way_id: i64,
    pub name: Option<String>,
    pub category: WayCategory,
    pub tram: bool,
    /// Bearing from the intersection towards the next node of the way
    pub bearing: u16,
    pub next_node_id: i64,
    pub part_of_previous_route_segment: bool,
    pub part_of_next_route_segment: bool,
}

impl IntersectionWay {
    pub fn is_rail(&self) -> bool {
        self.tram || self.category.is_rail()
    }
}

/// A single point along a route
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RoutePoint {
    #[serde(rename = "type")]
    pub kind: PointKind,
    pub name: String,
    #[serde(rename = "sub_type")]
    pub category: String,
    pub lat: f64,
    pub lon: f64,
    /// Turn taken at this point, relative to the incoming bearing
    #[serde(skip_serializing_if = "Option::is_none")]
    pub turn: Option<u16>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub node_id: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tactile_paving: Option<TactilePaving>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub wheelchair: Option<Wheelchair>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub way_list: Vec<IntersectionWay>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub number_of_streets: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub number_of_streets_with_name: Option<u32>,
}

impl RoutePoint {
    pub fn new(kind: PointKind, name: &str, category: &str, lat: f64, lon: f64) -> Self {
        RoutePoint {
            kind: kind,
            name: name.to_string(),
            category: category.to_string(),
            lat: lat,
            lon: lon,
            turn: None,
            node_id: None,
            tactile_paving: None,
            wheelchair: None,
            way_list: Vec::new(),
            number_of_streets: None,
            number_of_streets_with_name: None,
        }
    }

    /// A plain waypoint taken from the middle of a curved way
    pub fn shape_point(position: Point) -> Self {
        RoutePoint::new(PointKind::Waypoint, "way point", "way point", position.y(), position.x())
    }

    /// The literal start or destination of a request
    pub fn from_request(point: &RequestPoint, kind: PointKind) -> Self {
        let category = point.category.label();
        let name = point.name.clone().unwrap_or_else(|| category.clone());
        RoutePoint::new(kind, &name, &category, point.lat, point.lon)
    }

    pub fn position(&self) -> Point {
        geometry::point(self.lat, self.lon)
    }

    pub fn is_intersection(&self) -> bool {
        self.kind == PointKind::Intersection
    }

    /// Whether this point is a crossing with a tram line or railway
    pub fn is_rail_crossing(&self) -> bool {
        self.is_intersection() && self.way_list.iter().any(|way| way.is_rail())
    }
}
