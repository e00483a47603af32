//! Defines a struct to represent a bounding box, which is used to represent
//! a 2d square(ish) on the planet's surface. This limits the part of the
//! street graph which is copied into the working table for a single request.

use geo::Point;
use geo::{Destination, Haversine};

/// A bounding box for geographical data. Contains the minimum and maximum
/// latitudes & longitudes, defining a 'rectangle' on the surface of the Earth
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BBox {
    pub min_lat: f64,
    pub min_lon: f64,
    pub max_lat: f64,
    pub max_lon: f64,
}

impl BBox {
    /// Create a new bounding box based on the north-east and south-west points
    /// of a 'rectangle'
    pub fn from_points(ne: &Point, sw: &Point) -> Self {
        BBox {
            min_lat: sw.y(),
            min_lon: sw.x(),
            max_lat: ne.y(),
            max_lon: ne.x(),
        }
    }

    /// Generate a bounding box which reaches at least radius metres from the
    /// centre point in every compass direction
    pub fn around(centre: Point, radius: f64) -> Self {
        let dist_to_corner = radius * 2.0_f64.sqrt();

        let ne = Haversine::destination(centre, 45.0, dist_to_corner);
        let sw = Haversine::destination(centre, 225.0, dist_to_corner);

        BBox::from_points(&ne, &sw)
    }

    /// The smallest bounding box which contains every provided coordinate.
    /// Returns None if no coordinates were provided
    pub fn from_coords(lats: &[f64], lons: &[f64]) -> Option<Self> {
        if lats.is_empty() || lons.is_empty() {
            return None;
        }

        let fold_min = |vals: &[f64]| vals.iter().copied().fold(f64::MAX, f64::min);
        let fold_max = |vals: &[f64]| vals.iter().copied().fold(f64::MIN, f64::max);

        Some(BBox {
            min_lat: fold_min(lats),
            min_lon: fold_min(lons),
            max_lat: fold_max(lats),
            max_lon: fold_max(lons),
        })
    }

    /// Check whether two boxes overlap. Mirrors the behaviour of the PostGIS
    /// `&&` operator, boxes which only touch are considered to overlap
    pub fn intersects(&self, other: &BBox) -> bool {
        self.min_lat <= other.max_lat
            && other.min_lat <= self.max_lat
            && self.min_lon <= other.max_lon
            && other.min_lon <= self.max_lon
    }
}
