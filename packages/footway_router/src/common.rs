//! Building blocks shared by every stage of route construction: geometry
//! helpers, configuration, error types and the session registry.

pub mod bbox;
pub mod config;
pub mod error;
pub mod geometry;
pub mod graph_data;
pub mod session;
