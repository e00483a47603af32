//! Builds pedestrian routes over an OpenStreetMap derived street graph, and
//! turns them into simplified turn-by-turn descriptions.

pub mod common;
pub mod enrichment;
pub mod loading;
pub mod routing;
