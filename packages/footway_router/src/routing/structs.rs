pub mod point;
pub mod segment;

use serde::Serialize;

use crate::common::error::{Result, RouteError};
use crate::routing::structs::point::RoutePoint;
use crate::routing::structs::segment::RouteSegment;

/// Either half of a route
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum RouteElement {
    Point(RoutePoint),
    Segment(RouteSegment),
}

/// A finished route, alternating between points and segments. Always starts
/// and ends with a point
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(transparent)]
pub struct Route {
    elements: Vec<RouteElement>,
}

/// Key figures for a route
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct RouteSummary {
    /// Total length of every segment, in metres
    pub distance: u32,
    /// Intersections between the start and destination
    pub intersections: usize,
}

/// Everything which is returned to the caller for a successful request
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RouteResponse {
    pub route: Route,
    pub description: RouteSummary,
}

impl Route {
    /// Interleave points and segments, there must be exactly one segment
    /// fewer than there are points
    pub fn from_parts(points: Vec<RoutePoint>, segments: Vec<RouteSegment>) -> Result<Self> {
        if points.is_empty() || segments.len() + 1 != points.len() {
            return Err(RouteError::Internal(format!(
                "Can't build a route from {} points and {} segments",
                points.len(),
                segments.len()
            )));
        }

        let mut elements = Vec::<RouteElement>::with_capacity(points.len() + segments.len());
        let mut segments = segments.into_iter();
        for point in points {
            if !elements.is_empty() {
                if let Some(segment) = segments.next() {
                    elements.push(RouteElement::Segment(segment));
                }
            }
            elements.push(RouteElement::Point(point));
        }

        Ok(Route { elements: elements })
    }

    pub fn elements(&self) -> &[RouteElement] {
        &self.elements
    }

    pub fn len(&self) -> usize {
        self.elements.len()
    }

    pub fn is_empty(&self) -> bool {
        self.elements.is_empty()
    }

    pub fn points(&self) -> impl Iterator<Item = &RoutePoint> {
        self.elements.iter().filter_map(|element| match element {
            RouteElement::Point(point) => Some(point),
            RouteElement::Segment(_) => None,
        })
    }

    pub fn segments(&self) -> impl Iterator<Item = &RouteSegment> {
        self.elements.iter().filter_map(|element| match element {
            RouteElement::Segment(segment) => Some(segment),
            RouteElement::Point(_) => None,
        })
    }

    /// Whether elements strictly alternate, starting & ending with a point
    pub fn is_well_formed(&self) -> bool {
        self.elements.len() % 2 == 1
            && self.elements.iter().enumerate().all(|(inx, element)| {
                matches!(
                    (inx % 2, element),
                    (0, RouteElement::Point(_)) | (1, RouteElement::Segment(_))
                )
            })
    }

    pub fn summary(&self) -> RouteSummary {
        let distance = self.segments().map(|segment| segment.distance).sum();

        let num_points = self.points().count();
        let intersections = self
            .points()
            .enumerate()
            .filter(|(inx, point)| *inx > 0 && inx + 1 < num_points && point.is_intersection())
            .count();

        RouteSummary {
            distance: distance,
            intersections: intersections,
        }
    }
}
