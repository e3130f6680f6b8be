//! Batch management for CASTEP-style simulation jobs.
//!
//! Settings are validated against [`schema::SchemaRegistry`], expanded from
//! shortcuts, crossed into calculations by [`generator`], written to job
//! directories and tracked through the files the engine leaves behind.

pub mod calculation;
pub mod config;
pub mod domain;
pub mod engine;
pub mod fleet;
pub mod generator;
pub mod schema;
pub mod serialization;
pub mod setting;
pub mod shortcuts;
