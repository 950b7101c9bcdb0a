//! In-memory implementation of the rewards data-access boundary.
//!
//! Tables live in DashMap (development); swap to a hosted relational store
//! for production.

pub mod memory;
mod seed;

pub use memory::MemoryBackend;
