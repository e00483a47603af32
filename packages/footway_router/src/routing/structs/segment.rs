//! Legs of a route, each one joining two consecutive route points

use serde::Serialize;

use crate::common::config::WayClass;
use crate::routing::structs::point::{TactilePaving, WayCategory, Wheelchair};

/// Side(s) of the way on which a sidewalk is present, relative to the
/// walking direction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Sidewalk {
    No,
    Left,
    Right,
    Both,
}

impl Sidewalk {
    /// Swap sides, for ways which are walked against their drawing direction
    pub fn mirrored(self) -> Self {
        match self {
            Sidewalk::Left => Sidewalk::Right,
            Sidewalk::Right => Sidewalk::Left,
            other => other,
        }
    }
}

/// Optional attributes inherited from the way a segment follows
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct SegmentAttributes {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub surface: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub smoothness: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sidewalk: Option<Sidewalk>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tactile_paving: Option<TactilePaving>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub wheelchair: Option<Wheelchair>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub width: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub lanes: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub maxspeed: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub segregated: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub tram: bool,
}

/// A single leg of a route
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RouteSegment {
    pub bearing: u16,
    /// Whole metres
    pub distance: u32,
    pub name: String,
    #[serde(rename = "sub_type")]
    pub category: WayCategory,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub way_class: Option<WayClass>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub way_id: Option<i64>,
    #[serde(flatten)]
    pub attributes: SegmentAttributes,
}

impl RouteSegment {
    pub fn new(name: &str, category: WayCategory) -> Self {
        RouteSegment {
            bearing: 0,
            distance: 0,
            name: name.to_string(),
            category: category,
            way_class: None,
            way_id: None,
            attributes: SegmentAttributes::default(),
        }
    }

    /// Unlabeled leg joining a query point to a distant snap point
    pub fn synthetic(name: &str) -> Self {
        RouteSegment::new(name, WayCategory::Unlabeled)
    }

    /// Whether both segments appear to follow the same street
    pub fn same_street(&self, other: &RouteSegment) -> bool {
        self.name == other.name && self.category == other.category
    }
}
