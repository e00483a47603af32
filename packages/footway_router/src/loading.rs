//! This module focuses on the street graph itself. It defines the operations
//! which route construction needs from a spatial graph engine, along with a
//! PostGIS/pgRouting backed implementation and an in-memory one.

pub mod engine;
pub mod petgraph;
pub mod postgres;
