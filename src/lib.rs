//! Offline cache placement for content delivery networks.
//!
//! Given items, endpoints with their latencies to cache servers, and request
//! volumes, the crate searches for an assignment of items to fixed-capacity
//! caches that minimizes demand-weighted latency. Assignments are built by
//! construction heuristics or evolved by a checkpointed, resumable genetic
//! algorithm that evaluates offspring on a worker pool.

mod builder;

pub mod bootstrap;
pub mod models;
pub mod repositories;
pub mod services;

pub use services::optimization::Service;
