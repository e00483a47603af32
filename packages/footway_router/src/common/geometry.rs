//! Pure geometry helpers used throughout route construction. All points are
//! stored as geo Points, with x holding the longitude and y the latitude.
//! Bearings and turns are whole degrees in the range 0..360, distances are
//! metres along the great circle.

use geo::{Bearing, Closest, ClosestPoint, Distance, Haversine, LineString, Point};

/// Turns within this many degrees of straight ahead are treated as going
/// straight on
pub const STRAIGHT_TOLERANCE: u16 = 22;

/// Create a point from a latitude & longitude pair
pub fn point(lat: f64, lon: f64) -> Point {
    Point::new(lon, lat)
}

/// Great circle distance between two points in metres
pub fn distance_between(a: Point, b: Point) -> f64 {
    Haversine::distance(a, b)
}

/// Great circle distance between two points, truncated to whole metres
pub fn distance_in_meters(a: Point, b: Point) -> u32 {
    distance_between(a, b) as u32
}

/// Initial compass bearing when travelling from a to b, in whole degrees
pub fn bearing_between(a: Point, b: Point) -> u16 {
    let bearing = Haversine::bearing(a, b).rem_euclid(360.0);
    (bearing as u16) % 360
}

/// Turn required when leaving along new_bearing after arriving along
/// old_bearing. 0 is straight ahead, 90 a right turn, 180 turning around and
/// 270 a left turn
pub fn turn_between(new_bearing: u16, old_bearing: u16) -> u16 {
    (new_bearing as i32 - old_bearing as i32).rem_euclid(360) as u16
}

/// Whether a turn value represents continuing (roughly) straight on
pub fn is_straight(turn: u16) -> bool {
    turn <= STRAIGHT_TOLERANCE || turn >= 360 - STRAIGHT_TOLERANCE
}

/// Whether a turn value represents (roughly) doubling back
pub fn is_turn_around(turn: u16) -> bool {
    (180 - STRAIGHT_TOLERANCE..=180 + STRAIGHT_TOLERANCE).contains(&turn)
}

/// Smallest angle between two bearings, 0..=180
pub fn bearing_difference(a: u16, b: u16) -> u16 {
    let diff = turn_between(a, b);
    diff.min(360 - diff)
}

/// Bearing pointing in the opposite direction
pub fn reverse_bearing(bearing: u16) -> u16 {
    (bearing + 180) % 360
}

/// Point halfway between a and b on each axis
pub fn centre_point(a: Point, b: Point) -> Point {
    Point::new((a.x() + b.x()) / 2.0, (a.y() + b.y()) / 2.0)
}

/// Distance in metres from a point to the closest position on a polyline.
/// The closest position is found in coordinate space, which is accurate
/// enough at the scale of a single street.
pub fn distance_to_polyline(target: Point, lats: &[f64], lons: &[f64]) -> f64 {
    let line: LineString = lons
        .iter()
        .zip(lats.iter())
        .map(|(lon, lat)| (*lon, *lat))
        .collect();

    match line.closest_point(&target) {
        Closest::Intersection(closest) | Closest::SinglePoint(closest) => {
            distance_between(target, closest)
        }
        Closest::Indeterminate => f64::INFINITY,
    }
}
