//! Document store emulated on top of an object store
//!
//! Paths stand in for indexes and prefix listing stands in for queries.
//! Nothing here is transactional: a read-modify-write update races with
//! concurrent writers and the last `put` wins.

mod document;
pub mod paths;

pub use document::{DocumentStore, Page};
