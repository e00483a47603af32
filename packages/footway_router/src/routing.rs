//! This module focuses on turning a pair of request points into a finished
//! route. A disposable subgraph is created for each section of the route,
//! the points are snapped onto it, a path is found and then narrated into
//! a simplified list of points and segments.

pub mod narrator;
pub mod pedestrian;
pub mod snapper;
pub mod solver;
pub mod structs;
pub mod subgraph;
